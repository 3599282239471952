//! Bootstrap state repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for server bootstrap state.
#[async_trait]
pub trait BootstrapRepo: Send + Sync {
    /// Get the session ID of the bootstrapped admin token, if any.
    async fn get_bootstrap_session_id(&self) -> MetadataResult<Option<Uuid>>;

    /// Record the session ID of the bootstrapped admin token.
    async fn set_bootstrap_session_id(&self, session_id: Uuid) -> MetadataResult<()>;
}
