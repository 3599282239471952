//! User account types and validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum length for display names.
pub const MAX_DISPLAY_NAME_LEN: usize = 128;

/// Maximum length for email addresses (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

/// Unique identifier for a user.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidId(format!("invalid user ID: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub display_name: String,
    /// Account email (unique, lowercase).
    pub email: String,
    /// Profile image URL, if set.
    pub profile_image: Option<String>,
    /// When the account was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the account was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// When the user last logged in.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_logged_in: Option<OffsetDateTime>,
}

/// Request to update the caller's own account.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub profile_image: Option<String>,
}

/// Normalize and validate an email address.
///
/// Addresses are lowercased so the credentials table key is
/// case-insensitive. Validation is deliberately shallow: one `@` with
/// non-empty local and domain parts, no whitespace or control characters.
pub fn normalize_email(email: &str) -> crate::Result<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(crate::Error::InvalidEmail(format!(
            "email must be 1-{MAX_EMAIL_LEN} characters"
        )));
    }

    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(crate::Error::InvalidEmail(
            "email contains whitespace or control characters".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(crate::Error::InvalidEmail("missing @".to_string()));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(crate::Error::InvalidEmail(
            "malformed local or domain part".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a display name.
pub fn validate_display_name(name: &str) -> crate::Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_DISPLAY_NAME_LEN {
        return Err(crate::Error::InvalidName(format!(
            "display name must be 1-{MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidName(
            "display name contains control characters".to_string(),
        ));
    }
    Ok(())
}
