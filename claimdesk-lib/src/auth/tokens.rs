//! Stateless password-reset tokens.
//!
//! A token is `<unix-seconds>-<signature>`, where the signature is an
//! HMAC-SHA256 (keyed by the secret key) over the user's id, password hash,
//! last login and the timestamp. Changing the password or signing in again
//! invalidates every token issued before.

use crate::models::User;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Encode a user id for the reset URL
pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

/// Decode a user id from the reset URL
pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}

fn token_mac(secret: &str, user: &User, timestamp: i64) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    let last_login = user
        .last_login
        .map(|t| t.timestamp_micros().to_string())
        .unwrap_or_default();
    let payload = format!(
        "{}\n{}\n{}\n{}\n",
        user.id, user.password_hash, last_login, timestamp
    );
    mac.update(payload.as_bytes());
    Some(mac)
}

/// Issue a reset token for `user` at `now`
pub fn make_reset_token(secret: &str, user: &User, now: DateTime<Utc>) -> Option<String> {
    let timestamp = now.timestamp();
    let mac = token_mac(secret, user, timestamp)?;
    Some(format!(
        "{}-{}",
        timestamp,
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    ))
}

/// Verify a reset token: signature matches and it is at most `timeout_secs` old
pub fn check_reset_token(
    secret: &str,
    user: &User,
    token: &str,
    now: DateTime<Utc>,
    timeout_secs: i64,
) -> bool {
    let Some((ts, signature)) = token.split_once('-') else {
        return false;
    };
    let Ok(timestamp) = ts.parse::<i64>() else {
        return false;
    };
    let age = now.timestamp() - timestamp;
    if !(0..=timeout_secs).contains(&age) {
        return false;
    }
    let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
        return false;
    };
    match token_mac(secret, user, timestamp) {
        Some(mac) => mac.verify_slice(&signature).is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User {
            id: 7,
            username: "dana".to_string(),
            email: "dana@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "$argon2id$v=19$stub".to_string(),
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_uid_round_trip() {
        assert_eq!(encode_uid(7), "Nw");
        assert_eq!(decode_uid("Nw"), Some(7));
        assert_eq!(decode_uid("Nw=="), Some(7));
        assert_eq!(decode_uid("!!"), None);
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("abc")), None);
    }

    #[test]
    fn test_valid_token() {
        let now = Utc::now();
        let token = make_reset_token("secret", &user(), now).unwrap();
        assert!(check_reset_token("secret", &user(), &token, now, 86400));
        assert!(check_reset_token(
            "secret",
            &user(),
            &token,
            now + Duration::hours(23),
            86400
        ));
    }

    #[test]
    fn test_token_rejects_tampering_and_expiry() {
        let now = Utc::now();
        let token = make_reset_token("secret", &user(), now).unwrap();

        assert!(!check_reset_token("other", &user(), &token, now, 86400));
        assert!(!check_reset_token(
            "secret",
            &user(),
            &token,
            now + Duration::seconds(86401),
            86400
        ));

        let mut changed = user();
        changed.password_hash = "$argon2id$v=19$new".to_string();
        assert!(!check_reset_token("secret", &changed, &token, now, 86400));

        let mut logged_in = user();
        logged_in.last_login = Some(now);
        assert!(!check_reset_token("secret", &logged_in, &token, now, 86400));

        let (_, sig) = token.split_once('-').unwrap();
        let forged = format!("{}-{}", now.timestamp() + 60, sig);
        assert!(!check_reset_token("secret", &user(), &forged, now, 86400));
        assert!(!check_reset_token("secret", &user(), "garbage", now, 86400));
    }
}
