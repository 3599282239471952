//! Authentication and authorization middleware.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use curiocity_core::session::{Scope, Session, SessionId};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is sanitized: truncated to MAX_TRACE_ID_LEN characters and
    /// non-printable characters removed.
    pub fn from_client(value: &str) -> Self {
        // Truncate by character count, not byte count, to safely handle
        // multi-byte UTF-8. Then filter to ASCII-only for log safety.
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    /// Get the trace ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    /// The validated session.
    pub session: Session,
}

impl AuthenticatedUser {
    /// Check if the session has a specific scope.
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.session.has_scope(scope)
    }

    /// Require a specific scope, returning an error if not present.
    pub fn require_scope(&self, scope: Scope) -> ApiResult<()> {
        if self.has_scope(scope) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "missing required scope: {}",
                scope
            )))
        }
    }

    /// Require a user-bound session, returning the user ID.
    /// The bootstrap admin token is not bound to a user and cannot own
    /// documents.
    pub fn require_user_id(&self) -> ApiResult<Uuid> {
        self.session.user_id.ok_or_else(|| {
            ApiError::Forbidden("this operation requires a user-bound session".to_string())
        })
    }
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hash a token for storage lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}

/// Authentication middleware that validates sessions and sets up trace context.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Extract or generate trace ID
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();

    // Store trace ID in request extensions
    req.extensions_mut().insert(trace_id);

    // Extract token from header
    let token_str = extract_bearer_token(&req);

    if let Some(token_str) = token_str {
        let token_hash = hash_token(token_str);

        // Look up session in metadata store
        if let Some(session_row) = state.metadata.get_session_by_hash(&token_hash).await? {
            // Parse scopes from JSON
            let scopes: Vec<String> = serde_json::from_str(&session_row.scopes)
                .map_err(|e| ApiError::Internal(format!("invalid session scopes: {e}")))?;

            let scopes: HashSet<Scope> = scopes
                .iter()
                .filter_map(|s| match Scope::parse(s) {
                    Ok(scope) => Some(scope),
                    Err(_) => {
                        tracing::warn!(
                            session_id = %session_row.session_id,
                            invalid_scope = %s,
                            "Session contains invalid scope, ignoring"
                        );
                        None
                    }
                })
                .collect();

            let session = Session {
                id: SessionId::parse(&session_row.session_id.to_string())?,
                user_id: session_row.user_id,
                scopes,
                expires_at: session_row.expires_at,
                revoked_at: session_row.revoked_at,
                created_at: session_row.created_at,
                description: session_row.description,
            };

            // Check if session is valid
            if !session.is_valid() {
                return Err(ApiError::Unauthorized(
                    "session expired or revoked".to_string(),
                ));
            }

            // Update last used time (fire and forget)
            let metadata = state.metadata.clone();
            let session_id = session_row.session_id;
            tokio::spawn(async move {
                let _ = metadata
                    .touch_session(session_id, OffsetDateTime::now_utc())
                    .await;
            });

            // Add authenticated user to request extensions
            req.extensions_mut().insert(AuthenticatedUser { session });
        }
    }

    // Run the request within a tracing span that includes the trace ID
    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}

/// Require authentication (session must be present).
pub fn require_auth(req: &Request) -> ApiResult<&AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
}

/// Get the trace ID from request extensions.
pub fn get_trace_id(req: &Request) -> Option<&TraceId> {
    req.extensions().get::<TraceId>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_hex_sha256() {
        let hash = hash_token("test-admin-token");
        assert_eq!(hash.len(), 64);
        // Matches AdminConfig::for_testing()
        assert_eq!(
            hash,
            "9f735e0df9a1ddc702bf0a1a7b83033f9f7153a00c29de82cedadc9957289b05"
        );
    }

    #[test]
    fn test_trace_id_sanitization() {
        let id = TraceId::from_client("abc-123");
        assert_eq!(id.as_str(), "abc-123");

        let long = "x".repeat(500);
        assert_eq!(TraceId::from_client(&long).as_str().len(), MAX_TRACE_ID_LEN);

        // All-control input falls back to a generated ID
        let generated = TraceId::from_client("\u{1}\u{2}");
        assert!(!generated.as_str().is_empty());
    }
}
