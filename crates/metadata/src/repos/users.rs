//! User repository.

use crate::error::MetadataResult;
use crate::models::UserRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for user account operations.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user. Fails if the email is already taken.
    async fn create_user(&self, user: &UserRow) -> MetadataResult<()>;

    /// Get a user by ID.
    async fn get_user(&self, user_id: Uuid) -> MetadataResult<Option<UserRow>>;

    /// Get a user by email.
    async fn get_user_by_email(&self, email: &str) -> MetadataResult<Option<UserRow>>;

    /// Update display name, profile image, and updated_at.
    async fn update_user(&self, user: &UserRow) -> MetadataResult<()>;

    /// Record a successful login.
    async fn touch_user_login(&self, user_id: Uuid, at: OffsetDateTime) -> MetadataResult<()>;

    /// Delete a user record. Documents, credential, and sessions are
    /// removed separately by the caller.
    async fn delete_user(&self, user_id: Uuid) -> MetadataResult<()>;

    /// List all users, newest first.
    async fn list_users(&self) -> MetadataResult<Vec<UserRow>>;
}
