//! Buyer session authentication.
//!
//! The identity layer issues HS256 session tokens; handlers behind the
//! auth middleware receive the validated [`AuthedUser`] as a request
//! extension. Server-to-server calls to /internal endpoints authenticate
//! with a shared key instead.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::util::extract_bearer_token;

/// Custom claims carried in a buyer session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The authenticated caller, injected by [`buyer_auth`].
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Issue a session token for a buyer. Used by the dev seed flow and by
/// tests; production tokens come from the identity layer sharing the
/// same signing key.
pub fn sign_session_token(
    key: &HS256Key,
    uid: &str,
    email: Option<&str>,
    name: Option<&str>,
) -> Result<String> {
    let claims = Claims::with_custom_claims(
        SessionClaims {
            email: email.map(String::from),
            name: name.map(String::from),
        },
        Duration::from_hours(24),
    )
    .with_subject(uid);

    key.authenticate(claims)
        .map_err(|e| AppError::Internal(format!("Failed to sign session token: {}", e)))
}

/// Validate a session token and extract the caller identity.
pub fn verify_session_token(key: &HS256Key, token: &str) -> Result<AuthedUser> {
    let claims = key
        .verify_token::<SessionClaims>(token, None)
        .map_err(|_| AppError::Unauthenticated)?;

    let uid = claims.subject.ok_or(AppError::Unauthenticated)?;
    Ok(AuthedUser {
        uid,
        email: claims.custom.email,
        name: claims.custom.name,
    })
}

/// Middleware requiring a valid buyer session token.
pub async fn buyer_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let token = extract_bearer_token(request.headers()).ok_or(AppError::Unauthenticated)?;
    let user = verify_session_token(&state.session_key, token)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Constant-time check of the shared key for /internal endpoints.
pub fn require_internal_key(state: &AppState, headers: &axum::http::HeaderMap) -> Result<()> {
    let provided = headers
        .get("x-internal-key")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;

    let expected = state.internal_api_key.as_bytes();
    let provided = provided.as_bytes();
    if expected.len() != provided.len() || !bool::from(expected.ct_eq(provided)) {
        return Err(AppError::Unauthenticated);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let key = HS256Key::from_bytes(b"test-session-key");
        let token =
            sign_session_token(&key, "user-1", Some("buyer@example.com"), Some("Jess")).unwrap();
        let user = verify_session_token(&key, &token).unwrap();
        assert_eq!(user.uid, "user-1");
        assert_eq!(user.email.as_deref(), Some("buyer@example.com"));
        assert_eq!(user.name.as_deref(), Some("Jess"));
    }

    #[test]
    fn wrong_key_is_unauthenticated() {
        let key = HS256Key::from_bytes(b"test-session-key");
        let other = HS256Key::from_bytes(b"other-key");
        let token = sign_session_token(&key, "user-1", None, None).unwrap();
        assert!(matches!(
            verify_session_token(&other, &token),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn garbage_token_is_unauthenticated() {
        let key = HS256Key::from_bytes(b"test-session-key");
        assert!(matches!(
            verify_session_token(&key, "not-a-token"),
            Err(AppError::Unauthenticated)
        ));
    }
}
