//! Session types and authorization scopes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidSession(format!("invalid session ID: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session scopes for authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Read access to the caller's own account and documents.
    #[serde(rename = "account:read")]
    AccountRead,
    /// Write access to the caller's own account and documents.
    #[serde(rename = "account:write")]
    AccountWrite,
    /// Admin access (user listing, sweep, stats).
    #[serde(rename = "admin")]
    Admin,
}

impl Scope {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "account:read" => Ok(Self::AccountRead),
            "account:write" => Ok(Self::AccountWrite),
            "admin" => Ok(Self::Admin),
            _ => Err(crate::Error::InvalidSession(format!("unknown scope: {s}"))),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountRead => "account:read",
            Self::AccountWrite => "account:write",
            Self::Admin => "admin",
        }
    }

    /// Check if this scope implies another scope.
    pub fn implies(&self, other: &Self) -> bool {
        match self {
            Self::Admin => true, // Admin implies all
            Self::AccountWrite => matches!(other, Self::AccountWrite | Self::AccountRead),
            Self::AccountRead => matches!(other, Self::AccountRead),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated session with its metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// User this session belongs to. None for the bootstrap admin token.
    pub user_id: Option<Uuid>,
    /// Granted scopes.
    pub scopes: HashSet<Scope>,
    /// When the session expires.
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// When the session was revoked (if revoked).
    #[serde(with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Description for the session.
    pub description: Option<String>,
}

impl Session {
    /// Check if the session is valid (not expired or revoked).
    pub fn is_valid(&self) -> bool {
        let now = OffsetDateTime::now_utc();

        if self.revoked_at.is_some() {
            return false;
        }

        if let Some(expires_at) = self.expires_at
            && now > expires_at
        {
            return false;
        }

        true
    }

    /// Check if the session has a specific scope.
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.iter().any(|s| s.implies(&scope))
    }

    /// Check if the session has admin access.
    pub fn is_admin(&self) -> bool {
        self.is_valid() && self.has_scope(Scope::Admin)
    }
}

/// Request to create an account via manual signup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    /// Display name for the new user.
    pub display_name: String,
    /// Account email (unique).
    pub email: String,
    /// Plaintext password (hashed before storage, never persisted).
    pub password: String,
}

/// Request to log in with email and password.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response from signup or login.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    /// The user the session belongs to.
    pub user_id: String,
    /// The bearer secret (only returned once).
    pub token_secret: String,
    /// When the session expires.
    pub expires_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_implies() {
        assert!(Scope::Admin.implies(&Scope::AccountRead));
        assert!(Scope::Admin.implies(&Scope::AccountWrite));
        assert!(Scope::Admin.implies(&Scope::Admin));

        assert!(Scope::AccountWrite.implies(&Scope::AccountRead));
        assert!(Scope::AccountWrite.implies(&Scope::AccountWrite));
        assert!(!Scope::AccountWrite.implies(&Scope::Admin));

        assert!(Scope::AccountRead.implies(&Scope::AccountRead));
        assert!(!Scope::AccountRead.implies(&Scope::AccountWrite));
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("account:read").unwrap(), Scope::AccountRead);
        assert_eq!(Scope::parse("account:write").unwrap(), Scope::AccountWrite);
        assert_eq!(Scope::parse("admin").unwrap(), Scope::Admin);
        assert!(Scope::parse("invalid").is_err());
    }

    #[test]
    fn test_session_validity() {
        let now = OffsetDateTime::now_utc();
        let mut session = Session {
            id: SessionId::new(),
            user_id: Some(Uuid::new_v4()),
            scopes: [Scope::AccountWrite].into_iter().collect(),
            expires_at: Some(now + time::Duration::hours(1)),
            revoked_at: None,
            created_at: now,
            description: None,
        };
        assert!(session.is_valid());
        assert!(session.has_scope(Scope::AccountRead));
        assert!(!session.is_admin());

        session.revoked_at = Some(now);
        assert!(!session.is_valid());

        session.revoked_at = None;
        session.expires_at = Some(now - time::Duration::seconds(1));
        assert!(!session.is_valid());
    }
}
