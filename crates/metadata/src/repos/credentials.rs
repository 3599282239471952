//! Credential repository.

use crate::error::MetadataResult;
use crate::models::CredentialRow;
use async_trait::async_trait;

/// Repository for password credential records.
#[async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Create a credential. Fails if one exists for the email.
    async fn create_credential(&self, credential: &CredentialRow) -> MetadataResult<()>;

    /// Get the credential for an email.
    async fn get_credential(&self, email: &str) -> MetadataResult<Option<CredentialRow>>;

    /// Delete the credential for an email.
    async fn delete_credential(&self, email: &str) -> MetadataResult<()>;
}
