//! Signup, login, and session endpoints.

use crate::auth::{hash_token, require_auth};
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::read_json_body;
use crate::metrics::SESSIONS_CREATED;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use curiocity_core::MIN_PASSWORD_LEN;
use curiocity_core::session::{LoginRequest, SessionResponse, SignupRequest};
use curiocity_core::user::{normalize_email, validate_display_name};
use curiocity_metadata::models::{CredentialRow, SessionRow, UserRow};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Generate a random token secret using cryptographically secure RNG.
fn generate_token_secret() -> String {
    use base64::Engine;
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a random credential salt, hex encoded.
fn generate_salt() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Hash a password with its salt for storage.
fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}

/// Constant-time string comparison to prevent timing side-channel attacks.
/// XORs all bytes and accumulates differences; the result reveals nothing
/// about *which* byte differed.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let result = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    result == 0
}

/// Open a new session for a user and return the row plus the secret.
/// The secret is returned to the caller exactly once; only its hash is stored.
async fn open_session(
    state: &AppState,
    user_id: Uuid,
    description: &str,
) -> ApiResult<(SessionRow, String)> {
    let token_secret = generate_token_secret();
    let token_hash = hash_token(&token_secret);

    let now = OffsetDateTime::now_utc();
    let session = SessionRow {
        session_id: Uuid::new_v4(),
        user_id: Some(user_id),
        token_hash,
        scopes: serde_json::to_string(&["account:write"])
            .map_err(|e| ApiError::Internal(format!("failed to serialize scopes: {e}")))?,
        expires_at: Some(now + state.config.server.session_ttl()),
        revoked_at: None,
        created_at: now,
        last_used_at: None,
        description: Some(description.to_string()),
    };

    state.metadata.create_session(&session).await?;
    SESSIONS_CREATED.inc();

    Ok((session, token_secret))
}

fn session_response(session: &SessionRow, token_secret: String) -> ApiResult<SessionResponse> {
    let expires_at = session
        .expires_at
        .map(|t| {
            t.format(&Rfc3339)
                .map_err(|e| ApiError::Internal(format!("failed to format expires_at: {e}")))
        })
        .transpose()?;

    Ok(SessionResponse {
        user_id: session
            .user_id
            .map(|id| id.to_string())
            .unwrap_or_default(),
        token_secret,
        expires_at,
    })
}

/// POST /v1/auth/signup - Create an account with email and password.
#[tracing::instrument(skip(state, req))]
pub async fn signup(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let body: SignupRequest = read_json_body(req).await?;

    validate_display_name(&body.display_name)?;
    let email = normalize_email(&body.email)?;
    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if state.metadata.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict(format!(
            "email '{email}' already registered"
        )));
    }

    let now = OffsetDateTime::now_utc();
    let user = UserRow {
        user_id: Uuid::new_v4(),
        display_name: body.display_name.trim().to_string(),
        email: email.clone(),
        profile_image: None,
        created_at: now,
        updated_at: now,
        last_logged_in: Some(now),
    };
    state.metadata.create_user(&user).await?;

    let salt = generate_salt();
    let credential = CredentialRow {
        email: email.clone(),
        user_id: user.user_id,
        password_hash: hash_password(&salt, &body.password),
        salt,
        created_at: now,
        updated_at: now,
    };
    state.metadata.create_credential(&credential).await?;

    let (session, token_secret) = open_session(&state, user.user_id, "signup session").await?;

    tracing::info!(user_id = %user.user_id, "Account created");

    Ok((
        StatusCode::CREATED,
        Json(session_response(&session, token_secret)?),
    ))
}

/// POST /v1/auth/login - Log in with email and password.
///
/// Unknown email and wrong password return the same error so the endpoint
/// doesn't reveal which addresses are registered.
#[tracing::instrument(skip(state, req))]
pub async fn login(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<SessionResponse>> {
    let body: LoginRequest = read_json_body(req).await?;
    let email = normalize_email(&body.email)
        .map_err(|_| ApiError::Unauthorized("invalid email or password".to_string()))?;

    let credential = state
        .metadata
        .get_credential(&email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid email or password".to_string()))?;

    let presented = hash_password(&credential.salt, &body.password);
    if !constant_time_eq(&presented, &credential.password_hash) {
        return Err(ApiError::Unauthorized(
            "invalid email or password".to_string(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    state
        .metadata
        .touch_user_login(credential.user_id, now)
        .await?;

    let (session, token_secret) = open_session(&state, credential.user_id, "login session").await?;

    tracing::info!(user_id = %credential.user_id, "User logged in");

    Ok(Json(session_response(&session, token_secret)?))
}

/// Logout response.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}

/// POST /v1/auth/logout - Revoke the current session.
pub async fn logout(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<LogoutResponse>> {
    let auth = require_auth(&req)?.clone();

    state
        .metadata
        .revoke_session(*auth.session.id.as_uuid(), OffsetDateTime::now_utc())
        .await?;

    Ok(Json(LogoutResponse { revoked: true }))
}

/// Response for the authenticated caller.
#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    pub session_id: String,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: Option<String>,
}

/// GET /v1/auth/whoami - Return session identity and account context.
pub async fn whoami(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<WhoamiResponse>> {
    let auth = require_auth(&req)?;
    let session = &auth.session;

    let user = match session.user_id {
        Some(user_id) => state.metadata.get_user(user_id).await?,
        None => None,
    };

    let mut scopes: Vec<String> = session
        .scopes
        .iter()
        .map(|s| s.as_str().to_string())
        .collect();
    scopes.sort();

    let expires_at = match session.expires_at {
        Some(ts) => Some(
            ts.format(&Rfc3339)
                .map_err(|e| ApiError::Internal(format!("failed to format expires_at: {e}")))?,
        ),
        None => None,
    };

    Ok(Json(WhoamiResponse {
        session_id: session.id.to_string(),
        user_id: session.user_id.map(|id| id.to_string()),
        display_name: user.as_ref().map(|u| u.display_name.clone()),
        email: user.map(|u| u.email),
        scopes,
        expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_deterministic() {
        let hash = hash_password("abcd", "secret-password");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_password("abcd", "secret-password"));
        assert_ne!(hash, hash_password("dcba", "secret-password"));
        assert_ne!(hash, hash_password("abcd", "other-password"));
    }

    #[test]
    fn test_generate_salt_is_random() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_token_secret_is_random() {
        let a = generate_token_secret();
        let b = generate_token_secret();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret-token-123", "secret-token-123"));
        assert!(!constant_time_eq("secret-token-123", "secret-token-124"));
        assert!(!constant_time_eq("short", "much-longer-string"));
        assert!(constant_time_eq("", ""));
    }
}
