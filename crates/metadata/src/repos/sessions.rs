//! Session repository.

use crate::error::MetadataResult;
use crate::models::SessionRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for bearer session operations.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Create a session.
    async fn create_session(&self, session: &SessionRow) -> MetadataResult<()>;

    /// Get a session by token hash.
    async fn get_session_by_hash(&self, token_hash: &str) -> MetadataResult<Option<SessionRow>>;

    /// Get a session by ID.
    async fn get_session(&self, session_id: Uuid) -> MetadataResult<Option<SessionRow>>;

    /// Update last used time.
    async fn touch_session(&self, session_id: Uuid, used_at: OffsetDateTime)
    -> MetadataResult<()>;

    /// Revoke a session.
    async fn revoke_session(
        &self,
        session_id: Uuid,
        revoked_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Delete all sessions belonging to a user.
    async fn delete_sessions_for_user(&self, user_id: Uuid) -> MetadataResult<u64>;
}
