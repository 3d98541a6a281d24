//! Request authentication
//!
//! The softswitch authenticates with HTTP Basic credentials; the admin API
//! uses an API key (`X-API-Key` header or `Bearer` token). All comparisons
//! are constant-time.

use super::AppState;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use subtle::ConstantTimeEq;
use tracing::debug;

fn unauthorized_basic() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, r#"Basic realm="FreeSWITCH""#)],
        "Unauthorized",
    )
        .into_response()
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Decode `Authorization: Basic ...` into (user, password).
fn decode_basic(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Basic auth for softswitch-facing routes.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return unauthorized_basic();
    };

    let Some((user, password)) = decode_basic(value) else {
        return unauthorized_basic();
    };

    let user_ok = constant_time_eq(&user, &state.auth.freeswitch_user);
    let pass_ok = constant_time_eq(&password, &state.auth.freeswitch_password);
    if !user_ok || !pass_ok {
        debug!("basic auth rejected for user {}", user);
        return unauthorized_basic();
    }

    next.run(request).await
}

/// API key auth for admin routes.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();

    let presented = headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string)
        });

    let Some(key) = presented else {
        return (StatusCode::UNAUTHORIZED, "Missing API key").into_response();
    };

    let valid = state
        .auth
        .api_keys
        .iter()
        .any(|candidate| constant_time_eq(&key, candidate));
    if !valid {
        debug!("api key rejected");
        return (StatusCode::UNAUTHORIZED, "Invalid API key").into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_basic() {
        // "fs:secret"
        let header = format!("Basic {}", BASE64.encode("fs:secret"));
        assert_eq!(
            decode_basic(&header),
            Some(("fs".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_decode_basic_rejects_malformed() {
        assert_eq!(decode_basic("Bearer token"), None);
        assert_eq!(decode_basic("Basic !!!not-base64!!!"), None);
        let no_colon = format!("Basic {}", BASE64.encode("nocolon"));
        assert_eq!(decode_basic(&no_colon), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "Secret"));
        assert!(!constant_time_eq("secret", "secret2"));
        assert!(!constant_time_eq("", "x"));
    }
}
