//! Admin token initialization.

use anyhow::{Result, bail};
use curiocity_core::config::AdminConfig;
use curiocity_metadata::MetadataStore;
use curiocity_metadata::models::SessionRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Ensure the configured admin token exists, rotating the previous one if needed.
///
/// If the token hash changes between restarts, the previous admin token is
/// automatically revoked and a new one is created with the new hash.
pub async fn ensure_admin_token(metadata: &dyn MetadataStore, config: &AdminConfig) -> Result<()> {
    // Normalize to lowercase to match auth.rs hash_token() which uses lowercase
    // hex encoding. Without this, uppercase hashes in config would never match
    // during authentication.
    let hash = config
        .token_hash
        .strip_prefix("sha256:")
        .unwrap_or(&config.token_hash)
        .to_lowercase();
    let hash = hash.as_str();
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("invalid admin token_hash: expected 64 hex chars");
    }

    if let Some(existing) = metadata.get_session_by_hash(hash).await? {
        // Reject if the token was previously revoked
        if existing.revoked_at.is_some() {
            bail!(
                "admin token hash matches a revoked session (id={}); \
                 use a new token hash or clear the revoked session",
                existing.session_id
            );
        }
        // Reject if the token is expired
        let now = OffsetDateTime::now_utc();
        if let Some(expires_at) = existing.expires_at
            && expires_at <= now
        {
            bail!(
                "admin token hash matches an expired session (id={}, expired={}); \
                 use a new token hash",
                existing.session_id,
                expires_at
            );
        }
        metadata.set_bootstrap_session_id(existing.session_id).await?;
        tracing::debug!("Admin token already exists");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    if let Some(prev_id) = metadata.get_bootstrap_session_id().await? {
        metadata.revoke_session(prev_id, now).await?;
        tracing::info!(session_id = %prev_id, "Previous admin token revoked");
    }

    let session = SessionRow {
        session_id: Uuid::new_v4(),
        user_id: None,
        token_hash: hash.to_string(),
        scopes: serde_json::to_string(&["admin"])?,
        expires_at: None,
        revoked_at: None,
        created_at: now,
        last_used_at: None,
        description: config.token_description.clone(),
    };

    metadata.create_session(&session).await?;
    metadata.set_bootstrap_session_id(session.session_id).await?;
    tracing::info!(session_id = %session.session_id, "Admin token created");

    Ok(())
}
