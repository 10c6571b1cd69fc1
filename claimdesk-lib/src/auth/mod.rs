//! Accounts, password handling and sign-in.

pub mod session;
pub mod tokens;

use crate::models::User;
use crate::queries::users;
use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use regex::Regex;
use sqlx::SqlitePool;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Characters accepted as the required special character
pub const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

pub const MIN_PASSWORD_LEN: usize = 8;

/// Result of checking a username/password pair
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated(User),
    /// Credentials are right but the account is deactivated
    Inactive,
    InvalidCredentials,
}

/// Hash a password with argon2id and a random salt
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!("{}", e))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash; malformed hashes never match
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn uppercase_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Z]").expect("valid regex"))
}

fn lowercase_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z]").expect("valid regex"))
}

fn digit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d").expect("valid regex"))
}

fn special_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("valid regex"))
}

/// Every strength rule the password breaks, in display order
pub fn password_strength_errors(password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must be at least {} characters long.",
            MIN_PASSWORD_LEN
        ));
    }
    if !uppercase_re().is_match(password) {
        errors.push("Password must contain at least one uppercase letter.".to_string());
    }
    if !lowercase_re().is_match(password) {
        errors.push("Password must contain at least one lowercase letter.".to_string());
    }
    if !digit_re().is_match(password) {
        errors.push("Password must contain at least one number.".to_string());
    }
    if !special_re().is_match(password) {
        errors.push(format!(
            "Password must contain at least one special character ({}).",
            PASSWORD_SPECIALS
        ));
    }

    errors
}

/// Look up a user and check the password
pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> Result<AuthOutcome> {
    let user = match users::find_user_by_username(pool, username.trim()).await? {
        Some(user) => user,
        None => {
            warn!(username = %username, "login for unknown user");
            return Ok(AuthOutcome::InvalidCredentials);
        }
    };

    if !verify_password(password, &user.password_hash) {
        warn!(user_id = user.id, "login with wrong password");
        return Ok(AuthOutcome::InvalidCredentials);
    }
    if !user.is_active {
        info!(user_id = user.id, "login refused for inactive account");
        return Ok(AuthOutcome::Inactive);
    }

    Ok(AuthOutcome::Authenticated(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Sup3r$ecret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Sup3r$ecret", &hash));
        assert!(!verify_password("Sup3r$ecreT", &hash));
        assert!(!verify_password("Sup3r$ecret", "not-a-hash"));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("Sup3r$ecret").unwrap();
        let b = hash_password("Sup3r$ecret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_password_strength() {
        assert!(password_strength_errors("Sup3r$ecret").is_empty());

        let errors = password_strength_errors("abc");
        assert_eq!(errors.len(), 4);
        assert!(errors[0].contains("at least 8 characters"));

        let errors = password_strength_errors("NoDigitsHere!");
        assert_eq!(errors, vec!["Password must contain at least one number.".to_string()]);
    }
}
