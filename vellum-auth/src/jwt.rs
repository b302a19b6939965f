// JWT payload inspection. Signatures are not verified here; the server does that.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};

use crate::{AuthError, Result};

/// Decode the claims segment of a `header.payload.signature` token.
pub fn decode_payload(token: &str) -> Result<serde_json::Value> {
    let segment = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::InvalidToken("missing payload segment".to_string()))?;
    let trimmed = segment.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// The `exp` claim as a timestamp, when the token is a JWT that carries one.
pub fn expiry(token: &str) -> Option<DateTime<Utc>> {
    if !token.contains('.') {
        return None;
    }
    let exp = decode_payload(token).ok()?.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}

/// Opaque tokens are accepted as-is. Dotted tokens must decode and, when they
/// carry `exp`, must not have reached it.
pub fn validate(token: &str, now: DateTime<Utc>) -> Result<()> {
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    if !token.contains('.') {
        return Ok(());
    }
    let payload = decode_payload(token)?;
    match payload.get("exp").and_then(|exp| exp.as_i64()) {
        Some(exp) if now.timestamp_millis() >= exp * 1000 => Err(AuthError::TokenExpired),
        _ => Ok(()),
    }
}

pub fn is_token_valid(token: &str) -> bool {
    validate(token, Utc::now()).is_ok()
}

#[cfg(test)]
pub(crate) fn make_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_opaque_token_is_valid() {
        assert!(is_token_valid("plain-session-token"));
        assert!(!is_token_valid(""));
    }

    #[test]
    fn test_expired_jwt() {
        let past = Utc::now().timestamp() - 60;
        let token = make_token(json!({"sub": "1", "exp": past}));
        assert!(matches!(validate(&token, Utc::now()), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_live_jwt_and_expiry() {
        let future = Utc::now().timestamp() + 3600;
        let token = make_token(json!({"sub": "1", "exp": future}));
        assert!(is_token_valid(&token));
        assert_eq!(expiry(&token).map(|d| d.timestamp()), Some(future));
    }

    #[test]
    fn test_garbage_jwt_is_invalid() {
        assert!(!is_token_valid("a.!!!.c"));
        assert!(matches!(decode_payload("nodots"), Err(AuthError::InvalidToken(_))));
    }
}
