use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Secret used when running with `debug: true` and no key is configured
pub const INSECURE_DEV_SECRET: &str = "claimdesk-insecure-development-secret";

/// Outgoing mail configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    /// SMTP host
    pub host: String,
    /// SMTP port
    pub port: u16,
    /// Whether to use STARTTLS
    pub use_tls: bool,
    /// Account used to authenticate and as the sender address
    pub host_user: String,
    /// Password for `host_user`
    #[serde(skip_serializing)]
    pub host_password: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            use_tls: true,
            host_user: String::new(),
            host_password: String::new(),
        }
    }
}

impl EmailConfig {
    /// `From:` header used for every message we send
    pub fn default_from(&self) -> String {
        format!("Claims Management System <{}>", self.host_user)
    }
}

/// Application settings
///
/// Loaded from an optional YAML file and then overridden by environment
/// variables (see [`Settings::apply_overrides`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Development mode: relaxed cookies, human readable logs, insecure secret allowed
    pub debug: bool,
    /// Key used to sign password reset tokens
    #[serde(skip_serializing)]
    pub secret_key: String,
    /// sqlx connection string
    pub database_url: String,
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
    /// Host (and port) used when building absolute links in emails
    pub site_domain: String,
    /// Directory holding user uploads
    pub media_root: PathBuf,
    /// URL prefix for user uploads
    pub media_url: String,
    /// Directory holding static assets
    pub static_root: PathBuf,
    /// Claims shown per page
    pub page_size: u32,
    /// Session lifetime in seconds
    pub session_ttl_secs: i64,
    /// Validity of password reset links in seconds
    pub password_reset_timeout_secs: i64,
    /// Maximum size of an uploaded profile picture in bytes
    pub max_picture_bytes: usize,
    /// Maximum size of each uploaded CSV file in bytes
    pub max_csv_bytes: usize,
    pub email: EmailConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            secret_key: String::new(),
            database_url: "sqlite://claimdesk.sqlite3?mode=rwc".to_string(),
            bind_addr: "127.0.0.1:8000".to_string(),
            site_domain: "localhost:8000".to_string(),
            media_root: PathBuf::from("media"),
            media_url: "/media/".to_string(),
            static_root: PathBuf::from("static"),
            page_size: 25,
            session_ttl_secs: 3600,
            password_reset_timeout_secs: 86_400,
            max_picture_bytes: 2 * 1024 * 1024,
            max_csv_bytes: 4 * 1024 * 1024,
            email: EmailConfig::default(),
        }
    }
}

impl Settings {
    /// Apply environment style overrides from `lookup`
    ///
    /// Recognised keys: `DEBUG`, `SECRET_KEY`, `DATABASE_URL`, `BIND_ADDR`,
    /// `SITE_DOMAIN`, `MEDIA_ROOT`, `STATIC_ROOT`, `EMAIL_HOST_USER`,
    /// `EMAIL_HOST_PASSWORD`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(debug) = lookup("DEBUG").as_deref().and_then(parse_bool) {
            self.debug = debug;
        }
        if let Some(value) = lookup("SECRET_KEY") {
            self.secret_key = value;
        }
        if let Some(value) = lookup("DATABASE_URL") {
            self.database_url = value;
        }
        if let Some(value) = lookup("BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Some(value) = lookup("SITE_DOMAIN") {
            self.site_domain = value;
        }
        if let Some(value) = lookup("MEDIA_ROOT") {
            self.media_root = PathBuf::from(value);
        }
        if let Some(value) = lookup("STATIC_ROOT") {
            self.static_root = PathBuf::from(value);
        }
        if let Some(value) = lookup("EMAIL_HOST_USER") {
            self.email.host_user = value;
        }
        if let Some(value) = lookup("EMAIL_HOST_PASSWORD") {
            self.email.host_password = value;
        }
    }

    /// Settings suitable for tests: in-memory database, debug on
    pub fn for_tests() -> Self {
        Self {
            debug: true,
            secret_key: "test-secret-key".to_string(),
            database_url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "true" | "TRUE" | "True" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "False" | "no" | "NO" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_overrides_replace_defaults() {
        let env: HashMap<&str, &str> = [
            ("DEBUG", "true"),
            ("SECRET_KEY", "s3cret"),
            ("EMAIL_HOST_USER", "desk@example.com"),
            ("MEDIA_ROOT", "/srv/media"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert!(settings.debug);
        assert_eq!(settings.secret_key, "s3cret");
        assert_eq!(settings.media_root, PathBuf::from("/srv/media"));
        assert_eq!(
            settings.email.default_from(),
            "Claims Management System <desk@example.com>"
        );
        assert_eq!(settings.page_size, 25);
    }

    #[test]
    fn test_unparseable_debug_is_ignored() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| (key == "DEBUG").then(|| "maybe".to_string()));
        assert!(!settings.debug);
    }
}
