//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{
    BootstrapRepo, CredentialRepo, DocumentRepo, ResourceRepo, SessionRepo, UserRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    UserRepo + CredentialRepo + SessionRepo + DocumentRepo + ResourceRepo + BootstrapRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    #[allow(dead_code)] // Reserved for future timeout wrapper implementation
    query_timeout_secs: u64,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600); // 10 minutes default

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; using a single connection avoids
            // persistent "database is locked" failures under test/axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout_secs,
        };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::ResourceStats;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl UserRepo for SqliteStore {
        async fn create_user(&self, user: &UserRow) -> MetadataResult<()> {
            if self.get_user_by_email(&user.email).await?.is_some() {
                return Err(MetadataError::AlreadyExists(format!(
                    "email '{}' already registered",
                    user.email
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO users (user_id, display_name, email, profile_image, created_at, updated_at, last_logged_in)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user.user_id)
            .bind(&user.display_name)
            .bind(&user.email)
            .bind(&user.profile_image)
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(user.last_logged_in)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>> {
            let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn update_user(&self, user: &UserRow) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE users SET display_name = ?, profile_image = ?, updated_at = ? WHERE user_id = ?",
            )
            .bind(&user.display_name)
            .bind(&user.profile_image)
            .bind(user.updated_at)
            .bind(user.user_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "user {} not found",
                    user.user_id
                )));
            }
            Ok(())
        }

        async fn touch_user_login(&self, user_id: Uuid, at: OffsetDateTime) -> MetadataResult<()> {
            sqlx::query("UPDATE users SET last_logged_in = ? WHERE user_id = ?")
                .bind(at)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn delete_user(&self, user_id: Uuid) -> MetadataResult<()> {
            let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("user {user_id} not found")));
            }
            Ok(())
        }

        async fn list_users(&self) -> MetadataResult<Vec<UserRow>> {
            let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl CredentialRepo for SqliteStore {
        async fn create_credential(&self, credential: &CredentialRow) -> MetadataResult<()> {
            if self.get_credential(&credential.email).await?.is_some() {
                return Err(MetadataError::AlreadyExists(format!(
                    "credential for '{}' already exists",
                    credential.email
                )));
            }

            sqlx::query(
                r#"
                INSERT INTO credentials (email, user_id, salt, password_hash, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&credential.email)
            .bind(credential.user_id)
            .bind(&credential.salt)
            .bind(&credential.password_hash)
            .bind(credential.created_at)
            .bind(credential.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_credential(&self, email: &str) -> MetadataResult<Option<CredentialRow>> {
            let row = sqlx::query_as::<_, CredentialRow>("SELECT * FROM credentials WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn delete_credential(&self, email: &str) -> MetadataResult<()> {
            sqlx::query("DELETE FROM credentials WHERE email = ?")
                .bind(email)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl SessionRepo for SqliteStore {
        async fn create_session(&self, session: &SessionRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO sessions (
                    session_id, user_id, token_hash, scopes, expires_at,
                    revoked_at, created_at, last_used_at, description
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session.session_id)
            .bind(session.user_id)
            .bind(&session.token_hash)
            .bind(&session.scopes)
            .bind(session.expires_at)
            .bind(session.revoked_at)
            .bind(session.created_at)
            .bind(session.last_used_at)
            .bind(&session.description)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_session_by_hash(
            &self,
            token_hash: &str,
        ) -> MetadataResult<Option<SessionRow>> {
            let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_session(&self, session_id: Uuid) -> MetadataResult<Option<SessionRow>> {
            let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn touch_session(
            &self,
            session_id: Uuid,
            used_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query("UPDATE sessions SET last_used_at = ? WHERE session_id = ?")
                .bind(used_at)
                .bind(session_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn revoke_session(
            &self,
            session_id: Uuid,
            revoked_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE sessions SET revoked_at = ? WHERE session_id = ? AND revoked_at IS NULL",
            )
            .bind(revoked_at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "session {session_id} not found or already revoked"
                )));
            }
            Ok(())
        }

        async fn delete_sessions_for_user(&self, user_id: Uuid) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }

    #[async_trait]
    impl DocumentRepo for SqliteStore {
        async fn create_document(&self, document: &DocumentRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO documents (document_id, owner_id, name, text, tags, date_added, last_opened, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document.document_id)
            .bind(document.owner_id)
            .bind(&document.name)
            .bind(&document.text)
            .bind(&document.tags)
            .bind(document.date_added)
            .bind(document.last_opened)
            .bind(document.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_document(&self, document_id: Uuid) -> MetadataResult<Option<DocumentRow>> {
            let row =
                sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE document_id = ?")
                    .bind(document_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn list_documents_for_owner(
            &self,
            owner_id: Uuid,
        ) -> MetadataResult<Vec<DocumentRow>> {
            // NULLs (never opened) sort last; ties broken by creation time.
            let rows = sqlx::query_as::<_, DocumentRow>(
                "SELECT * FROM documents WHERE owner_id = ? ORDER BY last_opened DESC NULLS LAST, date_added DESC",
            )
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn update_document(&self, document: &DocumentRow) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE documents SET name = ?, text = ?, tags = ?, updated_at = ? WHERE document_id = ?",
            )
            .bind(&document.name)
            .bind(&document.text)
            .bind(&document.tags)
            .bind(document.updated_at)
            .bind(document.document_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "document {} not found",
                    document.document_id
                )));
            }
            Ok(())
        }

        async fn touch_document_opened(
            &self,
            document_id: Uuid,
            opened_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query("UPDATE documents SET last_opened = ? WHERE document_id = ?")
                .bind(opened_at)
                .bind(document_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn delete_document(&self, document_id: Uuid) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM documents WHERE document_id = ?)")
                    .bind(document_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(MetadataError::NotFound(format!(
                    "document {document_id} not found"
                )));
            }

            // One decrement per metadata record: two metas sharing a hash
            // must decrement that content row twice.
            let hashes: Vec<(String,)> =
                sqlx::query_as("SELECT content_hash FROM resource_meta WHERE document_id = ?")
                    .bind(document_id)
                    .fetch_all(&mut *tx)
                    .await?;
            for (hash,) in &hashes {
                sqlx::query(
                    "UPDATE resources SET refcount = MAX(0, refcount - 1) WHERE content_hash = ?",
                )
                .bind(hash)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("DELETE FROM folder_entries WHERE document_id = ?")
                .bind(document_id)
                .execute(&mut *tx)
                .await?;

            let metas = sqlx::query("DELETE FROM resource_meta WHERE document_id = ?")
                .bind(document_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM folders WHERE document_id = ?")
                .bind(document_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM documents WHERE document_id = ?")
                .bind(document_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(metas.rows_affected())
        }

        async fn create_folder(&self, folder: &FolderRow) -> MetadataResult<()> {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO folders (document_id, folder_name, created_at) VALUES (?, ?, ?)",
            )
            .bind(folder.document_id)
            .bind(&folder.folder_name)
            .bind(folder.created_at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::AlreadyExists(format!(
                    "folder '{}' already exists in document {}",
                    folder.folder_name, folder.document_id
                )));
            }
            Ok(())
        }

        async fn rename_folder(
            &self,
            document_id: Uuid,
            old_name: &str,
            new_name: &str,
            renamed_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let old: Option<FolderRow> = sqlx::query_as(
                "SELECT * FROM folders WHERE document_id = ? AND folder_name = ?",
            )
            .bind(document_id)
            .bind(old_name)
            .fetch_optional(&mut *tx)
            .await?;
            let old = old.ok_or_else(|| {
                MetadataError::NotFound(format!("folder '{old_name}' not found"))
            })?;

            // Insert the new folder row first, then re-point entries, then
            // drop the old row: entries always reference an existing folder.
            let inserted = sqlx::query(
                "INSERT OR IGNORE INTO folders (document_id, folder_name, created_at) VALUES (?, ?, ?)",
            )
            .bind(document_id)
            .bind(new_name)
            .bind(old.created_at)
            .execute(&mut *tx)
            .await?;
            if inserted.rows_affected() == 0 {
                return Err(MetadataError::AlreadyExists(format!(
                    "folder '{new_name}' already exists in document {document_id}"
                )));
            }

            sqlx::query(
                "UPDATE folder_entries SET folder_name = ? WHERE document_id = ? AND folder_name = ?",
            )
            .bind(new_name)
            .bind(document_id)
            .bind(old_name)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM folders WHERE document_id = ? AND folder_name = ?")
                .bind(document_id)
                .bind(old_name)
                .execute(&mut *tx)
                .await?;

            sqlx::query("UPDATE documents SET updated_at = ? WHERE document_id = ?")
                .bind(renamed_at)
                .bind(document_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        }

        async fn delete_folder(
            &self,
            document_id: Uuid,
            folder_name: &str,
        ) -> MetadataResult<u64> {
            let mut tx = self.pool.begin().await?;

            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM folders WHERE document_id = ? AND folder_name = ?)",
            )
            .bind(document_id)
            .bind(folder_name)
            .fetch_one(&mut *tx)
            .await?;
            if !exists {
                return Err(MetadataError::NotFound(format!(
                    "folder '{folder_name}' not found"
                )));
            }

            let members: Vec<(Uuid, String)> = sqlx::query_as(
                r#"
                SELECT rm.resource_id, rm.content_hash
                FROM folder_entries fe
                JOIN resource_meta rm ON rm.resource_id = fe.resource_id
                WHERE fe.document_id = ? AND fe.folder_name = ?
                "#,
            )
            .bind(document_id)
            .bind(folder_name)
            .fetch_all(&mut *tx)
            .await?;

            let removed = sqlx::query(
                "DELETE FROM folder_entries WHERE document_id = ? AND folder_name = ?",
            )
            .bind(document_id)
            .bind(folder_name)
            .execute(&mut *tx)
            .await?;

            for (resource_id, content_hash) in &members {
                sqlx::query("DELETE FROM resource_meta WHERE resource_id = ?")
                    .bind(resource_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "UPDATE resources SET refcount = MAX(0, refcount - 1) WHERE content_hash = ?",
                )
                .bind(content_hash)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("DELETE FROM folders WHERE document_id = ? AND folder_name = ?")
                .bind(document_id)
                .bind(folder_name)
                .execute(&mut *tx)
                .await?;

            let now = OffsetDateTime::now_utc();
            sqlx::query("UPDATE documents SET updated_at = ? WHERE document_id = ?")
                .bind(now)
                .bind(document_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(removed.rows_affected())
        }

        async fn list_folders(&self, document_id: Uuid) -> MetadataResult<Vec<FolderRow>> {
            let rows = sqlx::query_as::<_, FolderRow>(
                "SELECT * FROM folders WHERE document_id = ? ORDER BY folder_name",
            )
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_folder_entries(
            &self,
            document_id: Uuid,
        ) -> MetadataResult<Vec<FolderEntryRow>> {
            let rows = sqlx::query_as::<_, FolderEntryRow>(
                "SELECT * FROM folder_entries WHERE document_id = ? ORDER BY folder_name, date_added, resource_id",
            )
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn get_folder_entry(
            &self,
            document_id: Uuid,
            resource_id: Uuid,
        ) -> MetadataResult<Option<FolderEntryRow>> {
            let row = sqlx::query_as::<_, FolderEntryRow>(
                "SELECT * FROM folder_entries WHERE document_id = ? AND resource_id = ?",
            )
            .bind(document_id)
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl ResourceRepo for SqliteStore {
        async fn attach_resource(
            &self,
            resource: &ResourceRow,
            meta: &ResourceMetaRow,
            entry: &FolderEntryRow,
        ) -> MetadataResult<bool> {
            // All five steps commit atomically: content upsert, refcount,
            // metadata record, folder, projection entry.
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO resources (content_hash, markdown, object_key, size_bytes, refcount, created_at, last_accessed_at)
                VALUES (?, ?, ?, ?, 0, ?, ?)
                "#,
            )
            .bind(&resource.content_hash)
            .bind(&resource.markdown)
            .bind(&resource.object_key)
            .bind(resource.size_bytes)
            .bind(resource.created_at)
            .bind(resource.last_accessed_at)
            .execute(&mut *tx)
            .await?;

            let inserted = result.rows_affected() > 0;

            if !inserted {
                // Deduplicated: refresh the access timestamp so the sweep's
                // grace period restarts for re-uploaded content.
                sqlx::query(
                    "UPDATE resources SET last_accessed_at = ? WHERE content_hash = ?",
                )
                .bind(resource.last_accessed_at)
                .bind(&resource.content_hash)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("UPDATE resources SET refcount = refcount + 1 WHERE content_hash = ?")
                .bind(&resource.content_hash)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO resource_meta (
                    resource_id, document_id, content_hash, resource_name, file_type,
                    notes, summary, tags, date_added, last_opened, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(meta.resource_id)
            .bind(meta.document_id)
            .bind(&meta.content_hash)
            .bind(&meta.resource_name)
            .bind(&meta.file_type)
            .bind(&meta.notes)
            .bind(&meta.summary)
            .bind(&meta.tags)
            .bind(meta.date_added)
            .bind(meta.last_opened)
            .bind(meta.updated_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT OR IGNORE INTO folders (document_id, folder_name, created_at) VALUES (?, ?, ?)",
            )
            .bind(entry.document_id)
            .bind(&entry.folder_name)
            .bind(entry.date_added)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO folder_entries (
                    document_id, resource_id, folder_name, resource_name,
                    file_type, date_added, last_opened
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.document_id)
            .bind(entry.resource_id)
            .bind(&entry.folder_name)
            .bind(&entry.resource_name)
            .bind(&entry.file_type)
            .bind(entry.date_added)
            .bind(entry.last_opened)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE documents SET updated_at = ? WHERE document_id = ?")
                .bind(meta.date_added)
                .bind(meta.document_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(inserted)
        }

        async fn get_resource(&self, content_hash: &str) -> MetadataResult<Option<ResourceRow>> {
            let row =
                sqlx::query_as::<_, ResourceRow>("SELECT * FROM resources WHERE content_hash = ?")
                    .bind(content_hash)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn get_meta(&self, resource_id: Uuid) -> MetadataResult<Option<ResourceMetaRow>> {
            let row = sqlx::query_as::<_, ResourceMetaRow>(
                "SELECT * FROM resource_meta WHERE resource_id = ?",
            )
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_metas_for_document(
            &self,
            document_id: Uuid,
        ) -> MetadataResult<Vec<ResourceMetaRow>> {
            let rows = sqlx::query_as::<_, ResourceMetaRow>(
                "SELECT * FROM resource_meta WHERE document_id = ? ORDER BY date_added, resource_id",
            )
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_metas_for_hash(&self, content_hash: &str) -> MetadataResult<u64> {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM resource_meta WHERE content_hash = ?")
                    .bind(content_hash)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(count as u64)
        }

        async fn update_meta(&self, meta: &ResourceMetaRow) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                r#"
                UPDATE resource_meta
                SET resource_name = ?, file_type = ?, notes = ?, summary = ?, tags = ?, updated_at = ?
                WHERE resource_id = ?
                "#,
            )
            .bind(&meta.resource_name)
            .bind(&meta.file_type)
            .bind(&meta.notes)
            .bind(&meta.summary)
            .bind(&meta.tags)
            .bind(meta.updated_at)
            .bind(meta.resource_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "resource {} not found",
                    meta.resource_id
                )));
            }

            // Keep the projection's display fields in lockstep with the meta.
            sqlx::query(
                "UPDATE folder_entries SET resource_name = ?, file_type = ? WHERE document_id = ? AND resource_id = ?",
            )
            .bind(&meta.resource_name)
            .bind(&meta.file_type)
            .bind(meta.document_id)
            .bind(meta.resource_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(())
        }

        async fn touch_resource_opened(
            &self,
            resource_id: Uuid,
            opened_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let meta: Option<ResourceMetaRow> =
                sqlx::query_as("SELECT * FROM resource_meta WHERE resource_id = ?")
                    .bind(resource_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let meta = meta.ok_or_else(|| {
                MetadataError::NotFound(format!("resource {resource_id} not found"))
            })?;

            sqlx::query("UPDATE resource_meta SET last_opened = ? WHERE resource_id = ?")
                .bind(opened_at)
                .bind(resource_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "UPDATE folder_entries SET last_opened = ? WHERE document_id = ? AND resource_id = ?",
            )
            .bind(opened_at)
            .bind(meta.document_id)
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE resources SET last_accessed_at = ? WHERE content_hash = ?")
                .bind(opened_at)
                .bind(&meta.content_hash)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        }

        async fn move_resource(
            &self,
            document_id: Uuid,
            resource_id: Uuid,
            target_folder: &str,
            moved_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let entry: Option<FolderEntryRow> = sqlx::query_as(
                "SELECT * FROM folder_entries WHERE document_id = ? AND resource_id = ?",
            )
            .bind(document_id)
            .bind(resource_id)
            .fetch_optional(&mut *tx)
            .await?;
            let entry = entry.ok_or_else(|| {
                MetadataError::NotFound(format!(
                    "resource {resource_id} not attached to document {document_id}"
                ))
            })?;

            if entry.folder_name == target_folder {
                // Already there; repeated moves must not duplicate or lose.
                tx.commit().await?;
                return Ok(());
            }

            sqlx::query(
                "INSERT OR IGNORE INTO folders (document_id, folder_name, created_at) VALUES (?, ?, ?)",
            )
            .bind(document_id)
            .bind(target_folder)
            .bind(moved_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE folder_entries SET folder_name = ? WHERE document_id = ? AND resource_id = ?",
            )
            .bind(target_folder)
            .bind(document_id)
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE documents SET updated_at = ? WHERE document_id = ?")
                .bind(moved_at)
                .bind(document_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        }

        async fn detach_resource(&self, resource_id: Uuid) -> MetadataResult<String> {
            let mut tx = self.pool.begin().await?;

            let meta: Option<ResourceMetaRow> =
                sqlx::query_as("SELECT * FROM resource_meta WHERE resource_id = ?")
                    .bind(resource_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let meta = meta.ok_or_else(|| {
                MetadataError::NotFound(format!("resource {resource_id} not found"))
            })?;

            sqlx::query("DELETE FROM folder_entries WHERE document_id = ? AND resource_id = ?")
                .bind(meta.document_id)
                .bind(resource_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM resource_meta WHERE resource_id = ?")
                .bind(resource_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "UPDATE resources SET refcount = MAX(0, refcount - 1) WHERE content_hash = ?",
            )
            .bind(&meta.content_hash)
            .execute(&mut *tx)
            .await?;

            let now = OffsetDateTime::now_utc();
            sqlx::query("UPDATE documents SET updated_at = ? WHERE document_id = ?")
                .bind(now)
                .bind(meta.document_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(meta.content_hash)
        }

        async fn resource_stats(&self) -> MetadataResult<ResourceStats> {
            let total: (i64, i64) =
                sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM resources")
                    .fetch_one(&self.pool)
                    .await?;

            let referenced: (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM resources WHERE refcount > 0")
                    .fetch_one(&self.pool)
                    .await?;

            Ok(ResourceStats {
                count: total.0 as u64,
                total_size: total.1 as u64,
                referenced_count: referenced.0 as u64,
                unreferenced_count: (total.0 - referenced.0) as u64,
            })
        }

        async fn sweep_unreferenced_resources(
            &self,
            older_than: OffsetDateTime,
            limit: u32,
        ) -> MetadataResult<Vec<ResourceRow>> {
            let mut tx = self.pool.begin().await?;

            let candidates = sqlx::query_as::<_, ResourceRow>(
                r#"
                SELECT * FROM resources
                WHERE refcount = 0
                  AND created_at < ?
                  AND (last_accessed_at IS NULL OR last_accessed_at < ?)
                ORDER BY created_at
                LIMIT ?
                "#,
            )
            .bind(older_than)
            .bind(older_than)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await?;

            // Re-check refcount per row inside the transaction: a record
            // re-referenced between SELECT and DELETE must survive, and its
            // stored object with it.
            let mut deleted = Vec::new();
            for resource in candidates {
                let result = sqlx::query(
                    "DELETE FROM resources WHERE content_hash = ? AND refcount = 0",
                )
                .bind(&resource.content_hash)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() > 0 {
                    deleted.push(resource);
                } else {
                    tracing::debug!(
                        content_hash = %resource.content_hash,
                        "resource re-referenced, skipping sweep (storage preserved)"
                    );
                }
            }

            tx.commit().await?;
            Ok(deleted)
        }
    }

    #[async_trait]
    impl BootstrapRepo for SqliteStore {
        async fn get_bootstrap_session_id(&self) -> MetadataResult<Option<Uuid>> {
            let value: Option<(String,)> =
                sqlx::query_as("SELECT value FROM bootstrap_state WHERE key = 'admin_session_id'")
                    .fetch_optional(&self.pool)
                    .await?;
            match value {
                Some((s,)) => {
                    let id = Uuid::parse_str(&s).map_err(|e| {
                        MetadataError::Internal(format!("corrupt bootstrap state: {e}"))
                    })?;
                    Ok(Some(id))
                }
                None => Ok(None),
            }
        }

        async fn set_bootstrap_session_id(&self, session_id: Uuid) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO bootstrap_state (key, value) VALUES ('admin_session_id', ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
            Ok(())
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Users
CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY,
    display_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    profile_image TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_logged_in TEXT
);

-- Credentials for manual signup/login, keyed by email
CREATE TABLE IF NOT EXISTS credentials (
    email TEXT PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(user_id),
    salt TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_credentials_user ON credentials(user_id);

-- Bearer sessions (secret stored as SHA-256 hash only)
CREATE TABLE IF NOT EXISTS sessions (
    session_id BLOB PRIMARY KEY,
    user_id BLOB,
    token_hash TEXT NOT NULL UNIQUE,
    scopes TEXT NOT NULL,
    expires_at TEXT,
    revoked_at TEXT,
    created_at TEXT NOT NULL,
    last_used_at TEXT,
    description TEXT
);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

-- Documents
CREATE TABLE IF NOT EXISTS documents (
    document_id BLOB PRIMARY KEY,
    owner_id BLOB NOT NULL,
    name TEXT NOT NULL,
    text TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]',
    date_added TEXT NOT NULL,
    last_opened TEXT,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id, last_opened);

-- Folders (names unique within a document)
CREATE TABLE IF NOT EXISTS folders (
    document_id BLOB NOT NULL REFERENCES documents(document_id),
    folder_name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (document_id, folder_name)
);

-- Resource metadata: one record per logical upload within a document
CREATE TABLE IF NOT EXISTS resource_meta (
    resource_id BLOB PRIMARY KEY,
    document_id BLOB NOT NULL REFERENCES documents(document_id),
    content_hash TEXT NOT NULL,
    resource_name TEXT NOT NULL,
    file_type TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]',
    date_added TEXT NOT NULL,
    last_opened TEXT,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_resource_meta_document ON resource_meta(document_id, date_added);
CREATE INDEX IF NOT EXISTS idx_resource_meta_hash ON resource_meta(content_hash);

-- Folder entries: the ResourceCompressed projection.
-- PK (document_id, resource_id): an attached resource lives in exactly
-- one folder, which makes repeated moves loss- and duplication-free.
CREATE TABLE IF NOT EXISTS folder_entries (
    document_id BLOB NOT NULL,
    resource_id BLOB NOT NULL,
    folder_name TEXT NOT NULL,
    resource_name TEXT NOT NULL,
    file_type TEXT NOT NULL,
    date_added TEXT NOT NULL,
    last_opened TEXT,
    PRIMARY KEY (document_id, resource_id),
    FOREIGN KEY (document_id, folder_name) REFERENCES folders(document_id, folder_name),
    FOREIGN KEY (resource_id) REFERENCES resource_meta(resource_id)
);
CREATE INDEX IF NOT EXISTS idx_folder_entries_folder ON folder_entries(document_id, folder_name, date_added);

-- Content records, deduplicated by hash across all documents
CREATE TABLE IF NOT EXISTS resources (
    content_hash TEXT PRIMARY KEY,
    markdown TEXT NOT NULL,
    object_key TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    refcount INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_accessed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_resources_refcount ON resources(refcount, created_at);

-- Server bootstrap state
CREATE TABLE IF NOT EXISTS bootstrap_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
