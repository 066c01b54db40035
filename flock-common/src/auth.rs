//! Request signing for mutating API calls
//!
//! Every request that changes data carries two headers:
//! - `x-flock-timestamp`: Unix epoch milliseconds
//! - `x-flock-signature`: SHA-256 (hex) of method, path, timestamp, body
//!   digest and the shared secret, newline separated
//!
//! The shared secret is an i64 stored in the `settings` table under
//! `api_shared_secret`. A secret of 0 disables checking entirely.
//!
//! This module has no HTTP framework dependencies; the axum middleware in
//! flock-web wraps these functions.

use crate::db::settings::{get_setting, set_setting};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;

/// Header carrying the request timestamp
pub const TIMESTAMP_HEADER: &str = "x-flock-timestamp";

/// Header carrying the request signature
pub const SIGNATURE_HEADER: &str = "x-flock-signature";

/// Settings key holding the shared secret
pub const SHARED_SECRET_KEY: &str = "api_shared_secret";

/// Oldest accepted timestamp, relative to the server clock
pub const MAX_PAST_MS: i64 = 5_000;

/// Furthest accepted timestamp in the future (clock drift only)
pub const MAX_FUTURE_MS: i64 = 1_000;

/// Authentication failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Malformed header {0}: {1}")]
    MalformedHeader(&'static str, String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Load the shared secret, generating one on first use
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, AuthError> {
    let stored = get_setting(db, SHARED_SECRET_KEY)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

    match stored {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|e| AuthError::Database(format!("Invalid {}: {}", SHARED_SECRET_KEY, e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate and store a random non-zero shared secret
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, AuthError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let candidate = rng.gen::<i64>();
        if candidate != 0 {
            break candidate;
        }
    };

    set_setting(db, SHARED_SECRET_KEY, &secret.to_string())
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

    Ok(secret)
}

/// Check that `timestamp` lies inside the accepted window around `now`
pub fn validate_timestamp(timestamp: i64, now: i64) -> Result<(), AuthError> {
    let Some(age) = now.checked_sub(timestamp) else {
        return Err(AuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: "out of range".to_string(),
        });
    };

    if age > MAX_PAST_MS {
        return Err(AuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("{}ms old (max {}ms)", age, MAX_PAST_MS),
        });
    }

    if age < -MAX_FUTURE_MS {
        return Err(AuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("{}ms in the future (max {}ms)", age.unsigned_abs(), MAX_FUTURE_MS),
        });
    }

    Ok(())
}

/// SHA-256 of the raw request body, hex encoded
pub fn body_digest(body: &[u8]) -> String {
    format!("{:x}", Sha256::digest(body))
}

/// Compute the signature a client must send for a request
///
/// # Examples
///
/// ```
/// use flock_common::auth::sign_request;
///
/// let sig = sign_request("POST", "/breeds", 1730000000000, br#"{"name":"Dorper"}"#, 42);
/// assert_eq!(sig.len(), 64);
/// assert_ne!(sig, sign_request("POST", "/breeds", 1730000000000, b"{}", 42));
/// ```
pub fn sign_request(method: &str, path: &str, timestamp: i64, body: &[u8], secret: i64) -> String {
    let payload = format!(
        "{}\n{}\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        path,
        timestamp,
        body_digest(body),
        secret
    );
    format!("{:x}", Sha256::digest(payload.as_bytes()))
}

/// Verify timestamp window and signature of a request
pub fn verify_request(
    method: &str,
    path: &str,
    timestamp: i64,
    body: &[u8],
    provided_signature: &str,
    secret: i64,
    now: i64,
) -> Result<(), AuthError> {
    validate_timestamp(timestamp, now)?;

    let expected = sign_request(method, path, timestamp, body, secret);
    if !expected.eq_ignore_ascii_case(provided_signature.trim()) {
        return Err(AuthError::InvalidSignature);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000_000;

    #[test]
    fn test_timestamp_window() {
        assert!(validate_timestamp(NOW, NOW).is_ok());
        assert!(validate_timestamp(NOW - MAX_PAST_MS, NOW).is_ok());
        assert!(validate_timestamp(NOW + MAX_FUTURE_MS, NOW).is_ok());

        assert!(matches!(
            validate_timestamp(NOW - MAX_PAST_MS - 1, NOW),
            Err(AuthError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            validate_timestamp(NOW + MAX_FUTURE_MS + 1, NOW),
            Err(AuthError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        for ts in [i64::MIN, i64::MAX, -1] {
            assert!(matches!(
                validate_timestamp(ts, NOW),
                Err(AuthError::InvalidTimestamp { .. })
            ));
        }
        assert!(validate_timestamp(i64::MAX, i64::MIN).is_err());
        assert!(validate_timestamp(i64::MIN, i64::MAX).is_err());
    }

    #[test]
    fn test_signature_is_stable_hex() {
        let a = sign_request("post", "/sheep", NOW, b"{}", 7);
        let b = sign_request("POST", "/sheep", NOW, b"{}", 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_covers_every_part() {
        let base = sign_request("PUT", "/sheep/1", NOW, b"{}", 7);
        assert_ne!(base, sign_request("DELETE", "/sheep/1", NOW, b"{}", 7));
        assert_ne!(base, sign_request("PUT", "/sheep/2", NOW, b"{}", 7));
        assert_ne!(base, sign_request("PUT", "/sheep/1", NOW + 1, b"{}", 7));
        assert_ne!(base, sign_request("PUT", "/sheep/1", NOW, b"[]", 7));
        assert_ne!(base, sign_request("PUT", "/sheep/1", NOW, b"{}", 8));
    }

    #[test]
    fn test_verify_request() {
        let body = br#"{"tag_number":"A1"}"#;
        let sig = sign_request("POST", "/sheep", NOW, body, 99);

        assert!(verify_request("POST", "/sheep", NOW, body, &sig, 99, NOW + 10).is_ok());
        assert_eq!(
            verify_request("POST", "/sheep", NOW, body, &sig, 98, NOW),
            Err(AuthError::InvalidSignature)
        );
        assert!(matches!(
            verify_request("POST", "/sheep", NOW, body, &sig, 99, NOW + 60_000),
            Err(AuthError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_body_digest_of_empty_body() {
        assert_eq!(
            body_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
