//! Form-level account workflows: signup, profile edits, profile pictures and
//! password resets. Each returns [`Validation::Invalid`] with user-facing
//! messages when the input is rejected and an error only for real failures.

use crate::auth::{self, tokens};
use crate::config::Settings;
use crate::mail::{Email, Mailer};
use crate::models::User;
use crate::queries::{profiles, sessions, users};
use crate::utils::escape_html;
use anyhow::{Context, Result};
use chrono::Utc;
use rand::RngCore;
use regex::Regex;
use sqlx::SqlitePool;
use std::sync::OnceLock;
use tracing::{info, warn};

pub const SITE_NAME: &str = "Claims Management System";

const MAX_NAME_LEN: usize = 30;
const MAX_BIO_LEN: usize = 500;
const MAX_PHONE_LEN: usize = 15;
const PICTURE_DIR: &str = "profile_pictures";

/// Outcome of validating and applying a form
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    Valid(T),
    Invalid(Vec<String>),
}

impl<T> Validation<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bio: String,
    pub phone_number: String,
}

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.@+-]{1,150}$").expect("valid regex"))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_re().is_match(email)
}

/// Validate a signup and create the account (with its profile)
pub async fn register(pool: &SqlitePool, form: &SignupForm) -> Result<Validation<User>> {
    let username = form.username.trim();
    let email = form.email.trim();

    if !username_re().is_match(username) {
        return Ok(Validation::Invalid(vec![
            "Enter a valid username: letters, digits and @/./+/-/_ only.".to_string(),
        ]));
    }
    if !is_valid_email(email) {
        return Ok(Validation::Invalid(vec!["Enter a valid email address.".to_string()]));
    }
    if form.password1 != form.password2 {
        return Ok(Validation::Invalid(vec!["Passwords do not match.".to_string()]));
    }
    if users::username_exists(pool, username).await? {
        return Ok(Validation::Invalid(vec!["Username already exists.".to_string()]));
    }
    if users::email_exists(pool, email).await? {
        return Ok(Validation::Invalid(vec!["Email already registered.".to_string()]));
    }
    let strength = auth::password_strength_errors(&form.password1);
    if !strength.is_empty() {
        return Ok(Validation::Invalid(strength));
    }

    let user = users::create_user(
        pool,
        &users::NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: auth::hash_password(&form.password1)?,
            ..Default::default()
        },
    )
    .await
    .with_context(|| format!("Failed to create user {}", username))?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(Validation::Valid(user))
}

/// Validate and save the profile page form
pub async fn update_profile(
    pool: &SqlitePool,
    user_id: i64,
    form: &ProfileForm,
) -> Result<Validation<()>> {
    let mut errors = Vec::new();
    let first_name = form.first_name.trim();
    let last_name = form.last_name.trim();
    let email = form.email.trim();
    let bio = form.bio.trim();
    let phone = form.phone_number.trim();

    if first_name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("First name must be at most {} characters.", MAX_NAME_LEN));
    }
    if last_name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("Last name must be at most {} characters.", MAX_NAME_LEN));
    }
    if email.is_empty() {
        errors.push("Email is required.".to_string());
    } else if !is_valid_email(email) {
        errors.push("Enter a valid email address.".to_string());
    }
    if bio.chars().count() > MAX_BIO_LEN {
        errors.push(format!("Bio must be at most {} characters.", MAX_BIO_LEN));
    }
    if phone.chars().count() > MAX_PHONE_LEN {
        errors.push(format!("Phone number must be at most {} characters.", MAX_PHONE_LEN));
    }
    if !errors.is_empty() {
        return Ok(Validation::Invalid(errors));
    }

    users::update_user_names(pool, user_id, first_name, last_name, email).await?;
    profiles::get_or_create_profile(pool, user_id).await?;
    profiles::update_profile_details(pool, user_id, bio, phone).await?;
    info!(user_id, "profile updated");
    Ok(Validation::Valid(()))
}

/// Image formats accepted for profile pictures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureKind {
    Jpeg,
    Png,
}

impl PictureKind {
    pub fn extension(&self) -> &'static str {
        match self {
            PictureKind::Jpeg => "jpg",
            PictureKind::Png => "png",
        }
    }

    /// Identify the image from its declared type and leading bytes
    pub fn detect(content_type: &str, data: &[u8]) -> Option<Self> {
        let declared = match content_type.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => PictureKind::Jpeg,
            "image/png" => PictureKind::Png,
            _ => return None,
        };
        let sniffed = if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            PictureKind::Jpeg
        } else if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            PictureKind::Png
        } else {
            return None;
        };
        (declared == sniffed).then_some(declared)
    }
}

/// Store a new profile picture and return its public URL
pub async fn save_profile_picture(
    pool: &SqlitePool,
    settings: &Settings,
    user_id: i64,
    content_type: &str,
    data: &[u8],
) -> Result<Validation<String>> {
    if data.is_empty() {
        return Ok(Validation::Invalid(vec!["Please choose an image to upload.".to_string()]));
    }
    if data.len() > settings.max_picture_bytes {
        return Ok(Validation::Invalid(vec![
            "Image file too large. Maximum size is 2MB.".to_string(),
        ]));
    }
    let Some(kind) = PictureKind::detect(content_type, data) else {
        warn!(user_id, %content_type, "rejected profile picture type");
        return Ok(Validation::Invalid(vec![
            "Invalid file type. Only JPEG and PNG images are allowed.".to_string(),
        ]));
    };

    let dir = settings.media_root.join(PICTURE_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create media directory: {}", dir.display()))?;

    let relative = format!(
        "{}/user_{}_{:08x}.{}",
        PICTURE_DIR,
        user_id,
        rand::thread_rng().next_u32(),
        kind.extension()
    );
    let target = settings.media_root.join(&relative);
    tokio::fs::write(&target, data)
        .await
        .with_context(|| format!("Failed to write profile picture: {}", target.display()))?;

    let previous = profiles::get_or_create_profile(pool, user_id).await?.profile_picture;
    profiles::set_profile_picture(pool, user_id, Some(&relative)).await?;

    if let Some(previous) = previous.filter(|p| p.starts_with(PICTURE_DIR) && *p != relative) {
        if let Err(e) = tokio::fs::remove_file(settings.media_root.join(&previous)).await {
            warn!(user_id, error = %e, "failed to remove old profile picture");
        }
    }

    info!(user_id, path = %relative, "profile picture updated");
    Ok(Validation::Valid(format!("{}{}", settings.media_url, relative)))
}

fn reset_email(settings: &Settings, user: &User, reset_url: &str) -> Email {
    let text_body = format!(
        "Hello {},\n\nYou requested a password reset for your {} account.\n\
         Open the link below to choose a new password:\n\n{}\n\n\
         The link expires in {} hours. If you did not ask for this, ignore this email.\n",
        user.display_name(),
        SITE_NAME,
        reset_url,
        settings.password_reset_timeout_secs / 3600
    );
    let html_body = format!(
        "<p>Hello {},</p><p>You requested a password reset for your {} account.</p>\
         <p><a href=\"{}\">Reset your password</a></p>\
         <p>If you did not ask for this, ignore this email.</p>",
        escape_html(&user.display_name()),
        SITE_NAME,
        escape_html(reset_url)
    );
    Email {
        from: settings.email.default_from(),
        to: vec![user.email.clone()],
        subject: format!("Password Reset - {}", SITE_NAME),
        text_body,
        html_body: Some(html_body),
    }
}

/// Absolute password reset link for `user`
pub fn reset_link(settings: &Settings, user: &User) -> Option<String> {
    let token = tokens::make_reset_token(&settings.secret_key, user, Utc::now())?;
    Some(format!(
        "http://{}/auth/password-reset-confirm/{}/{}/",
        settings.site_domain,
        tokens::encode_uid(user.id),
        token
    ))
}

/// Mail a reset link to every active account using `email`
pub async fn request_password_reset(
    pool: &SqlitePool,
    settings: &Settings,
    mailer: &dyn Mailer,
    email: &str,
) -> Result<Validation<usize>> {
    let email = email.trim();
    let matches = users::find_active_users_by_email(pool, email).await?;
    if email.is_empty() || matches.is_empty() {
        return Ok(Validation::Invalid(vec![
            "No user found with this email address.".to_string(),
        ]));
    }

    for user in &matches {
        let Some(link) = reset_link(settings, user) else {
            anyhow::bail!("Failed to sign password reset token");
        };
        mailer
            .send(reset_email(settings, user, &link))
            .await
            .with_context(|| format!("Failed to send password reset email to user {}", user.id))?;
        info!(user_id = user.id, "password reset email sent");
    }
    Ok(Validation::Valid(matches.len()))
}

/// User addressed by a reset link, if the link is still valid
pub async fn resolve_reset_link(
    pool: &SqlitePool,
    settings: &Settings,
    uidb64: &str,
    token: &str,
) -> Result<Option<User>> {
    let Some(user_id) = tokens::decode_uid(uidb64) else {
        return Ok(None);
    };
    let Some(user) = users::find_user_by_id(pool, user_id).await? else {
        return Ok(None);
    };
    if !user.is_active {
        return Ok(None);
    }
    let valid = tokens::check_reset_token(
        &settings.secret_key,
        &user,
        token,
        Utc::now(),
        settings.password_reset_timeout_secs,
    );
    Ok(valid.then_some(user))
}

/// Set a new password from the reset form and sign out every session
pub async fn complete_password_reset(
    pool: &SqlitePool,
    user: &User,
    password1: &str,
    password2: &str,
) -> Result<Validation<()>> {
    if password1 != password2 {
        return Ok(Validation::Invalid(vec!["Passwords do not match.".to_string()]));
    }
    let strength = auth::password_strength_errors(password1);
    if !strength.is_empty() {
        return Ok(Validation::Invalid(strength));
    }

    users::update_password(pool, user.id, &auth::hash_password(password1)?).await?;
    let dropped = sessions::delete_user_sessions(pool, user.id).await?;
    info!(user_id = user.id, sessions = dropped, "password reset");
    Ok(Validation::Valid(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_connection::DatabaseConnection;
    use crate::mail::MemoryMailer;

    async fn pool() -> SqlitePool {
        DatabaseConnection::open_and_migrate("sqlite::memory:")
            .await
            .unwrap()
            .into_pool()
    }

    fn signup(username: &str, email: &str, password: &str) -> SignupForm {
        SignupForm {
            username: username.to_string(),
            email: email.to_string(),
            password1: password.to_string(),
            password2: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_validations() {
        let pool = pool().await;

        let created = register(&pool, &signup("dana", "dana@example.com", "Sup3r$ecret"))
            .await
            .unwrap();
        assert!(created.is_valid());

        let duplicate = register(&pool, &signup("dana", "other@example.com", "Sup3r$ecret"))
            .await
            .unwrap();
        assert_eq!(
            duplicate,
            Validation::Invalid(vec!["Username already exists.".to_string()])
        );

        let same_email = register(&pool, &signup("eli", "DANA@example.com", "Sup3r$ecret"))
            .await
            .unwrap();
        assert_eq!(
            same_email,
            Validation::Invalid(vec!["Email already registered.".to_string()])
        );

        let weak = register(&pool, &signup("eli", "eli@example.com", "weak"))
            .await
            .unwrap();
        assert!(matches!(weak, Validation::Invalid(errors) if errors.len() == 4));

        let mut mismatch = signup("eli", "eli@example.com", "Sup3r$ecret");
        mismatch.password2 = "Different1!".to_string();
        assert!(!register(&pool, &mismatch).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_profile_update_limits() {
        let pool = pool().await;
        let Validation::Valid(user) =
            register(&pool, &signup("dana", "dana@example.com", "Sup3r$ecret"))
                .await
                .unwrap()
        else {
            panic!("signup failed");
        };

        let form = ProfileForm {
            first_name: "Dana".to_string(),
            last_name: "Scully".to_string(),
            email: "dana@fbi.gov".to_string(),
            bio: "Reviewer".to_string(),
            phone_number: "+1 555 0100".to_string(),
        };
        assert!(update_profile(&pool, user.id, &form).await.unwrap().is_valid());
        let user = users::find_user_by_id(&pool, user.id).await.unwrap().unwrap();
        assert_eq!(user.display_name(), "Dana Scully");
        let profile = profiles::get_or_create_profile(&pool, user.id).await.unwrap();
        assert_eq!(profile.bio, "Reviewer");

        let mut bad = form.clone();
        bad.phone_number = "1".repeat(16);
        bad.email = String::new();
        let Validation::Invalid(errors) = update_profile(&pool, user.id, &bad).await.unwrap()
        else {
            panic!("expected errors");
        };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_picture_detection() {
        let png = b"\x89PNG\r\n\x1a\n....";
        assert_eq!(PictureKind::detect("image/png", png), Some(PictureKind::Png));
        assert_eq!(PictureKind::detect("image/jpeg", png), None);
        assert_eq!(
            PictureKind::detect("image/jpg", &[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(PictureKind::Jpeg)
        );
        assert_eq!(PictureKind::detect("image/gif", b"GIF89a"), None);
    }

    #[tokio::test]
    async fn test_save_profile_picture_replaces_old_file() {
        let pool = pool().await;
        let media = tempfile::tempdir().unwrap();
        let mut settings = Settings::for_tests();
        settings.media_root = media.path().to_path_buf();

        let Validation::Valid(user) =
            register(&pool, &signup("dana", "dana@example.com", "Sup3r$ecret"))
                .await
                .unwrap()
        else {
            panic!("signup failed");
        };

        let png = b"\x89PNG\r\n\x1a\nfake".to_vec();
        let Validation::Valid(first_url) =
            save_profile_picture(&pool, &settings, user.id, "image/png", &png)
                .await
                .unwrap()
        else {
            panic!("upload rejected");
        };
        assert!(first_url.starts_with("/media/profile_pictures/user_"));
        let first_path = media
            .path()
            .join(first_url.trim_start_matches("/media/"));
        assert!(first_path.exists());

        let Validation::Valid(_) = save_profile_picture(&pool, &settings, user.id, "image/png", &png)
            .await
            .unwrap()
        else {
            panic!("upload rejected");
        };
        assert!(!first_path.exists());

        let too_big = vec![0u8; settings.max_picture_bytes + 1];
        assert!(!save_profile_picture(&pool, &settings, user.id, "image/png", &too_big)
            .await
            .unwrap()
            .is_valid());
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let pool = pool().await;
        let settings = Settings::for_tests();
        let mailer = MemoryMailer::new();
        let Validation::Valid(user) =
            register(&pool, &signup("dana", "dana@example.com", "Sup3r$ecret"))
                .await
                .unwrap()
        else {
            panic!("signup failed");
        };

        let unknown = request_password_reset(&pool, &settings, &mailer, "nobody@example.com")
            .await
            .unwrap();
        assert!(!unknown.is_valid());

        let sent = request_password_reset(&pool, &settings, &mailer, "dana@example.com")
            .await
            .unwrap();
        assert_eq!(sent, Validation::Valid(1));
        let outbox = mailer.sent().await;
        assert_eq!(outbox[0].to, vec!["dana@example.com".to_string()]);

        let link = outbox[0]
            .text_body
            .lines()
            .find(|line| line.starts_with("http://"))
            .unwrap()
            .to_string();
        let parts: Vec<&str> = link.trim_end_matches('/').rsplit('/').take(2).collect();
        let (token, uidb64) = (parts[0], parts[1]);

        let resolved = resolve_reset_link(&pool, &settings, uidb64, token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, user.id);

        assert!(complete_password_reset(&pool, &resolved, "New9!pass", "New9!pass")
            .await
            .unwrap()
            .is_valid());
        assert!(resolve_reset_link(&pool, &settings, uidb64, token)
            .await
            .unwrap()
            .is_none());

        let refreshed = users::find_user_by_id(&pool, user.id).await.unwrap().unwrap();
        assert!(auth::verify_password("New9!pass", &refreshed.password_hash));
    }
}
