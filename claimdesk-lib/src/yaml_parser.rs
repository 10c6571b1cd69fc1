use crate::config::{Settings, INSECURE_DEV_SECRET};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Parse a YAML settings file
pub async fn parse_yaml_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let content = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read settings file: {}", path.as_ref().display()))?;

    parse_yaml_string(&content)
}

/// Parse YAML settings content; missing keys keep their defaults
pub fn parse_yaml_string(content: &str) -> Result<Settings> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings =
        serde_yaml::from_str(content).with_context(|| "Failed to parse settings YAML")?;

    Ok(settings)
}

/// Load settings the way the server and CLI do
///
/// Reads the file named by `CLAIMDESK_CONFIG` when set, applies the process
/// environment on top and validates the result.
pub async fn load_settings() -> Result<Settings> {
    let path = std::env::var_os("CLAIMDESK_CONFIG").map(PathBuf::from);
    load_settings_from(path.as_deref()).await
}

/// Like [`load_settings`] with an explicit settings file
pub async fn load_settings_from(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => parse_yaml_file(path).await?,
        None => Settings::default(),
    };
    settings.apply_overrides(|key| std::env::var(key).ok());
    validate_settings(&mut settings)?;
    Ok(settings)
}

/// Reject settings the server cannot run with
pub fn validate_settings(settings: &mut Settings) -> Result<()> {
    if settings.secret_key.is_empty() {
        if settings.debug {
            settings.secret_key = INSECURE_DEV_SECRET.to_string();
        } else {
            anyhow::bail!("SECRET_KEY must be set when DEBUG is off");
        }
    }

    if settings.page_size == 0 {
        anyhow::bail!("page_size must be at least 1");
    }

    if !settings.media_url.starts_with('/') || !settings.media_url.ends_with('/') {
        anyhow::bail!(
            "media_url '{}' must start and end with '/'",
            settings.media_url
        );
    }

    if settings.session_ttl_secs <= 0 {
        anyhow::bail!("session_ttl_secs must be positive");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = parse_yaml_string(
            r#"
debug: true
page_size: 10
email:
  host_user: desk@example.com
"#,
        )
        .unwrap();

        assert!(settings.debug);
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.email.host_user, "desk@example.com");
        assert_eq!(settings.email.port, 587);
        assert_eq!(settings.session_ttl_secs, 3600);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(parse_yaml_string("page_size: [oops").is_err());
    }

    #[test]
    fn test_secret_required_outside_debug() {
        let mut settings = Settings::default();
        assert!(validate_settings(&mut settings).is_err());

        settings.debug = true;
        validate_settings(&mut settings).unwrap();
        assert_eq!(settings.secret_key, INSECURE_DEV_SECRET);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut settings = Settings::for_tests();
        settings.page_size = 0;
        assert!(validate_settings(&mut settings).is_err());
    }
}
