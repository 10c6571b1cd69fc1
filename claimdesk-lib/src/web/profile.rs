//! Profile page and picture upload.

use super::error::{AppError, AppResult};
use super::extract::CurrentUser;
use super::flash::{FlashPage, Flashes};
use super::AppState;
use crate::accounts::{self, ProfileForm, Validation};
use crate::queries::profiles;
use crate::render::{profile as views, Layout};
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

const PROFILE_URL: &str = "/profile/";
const PICTURE_FIELD: &str = "profile_picture";

#[derive(Debug, Default, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub phone_number: String,
}

/// `GET /profile/`
pub async fn profile_view(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flashes: Flashes,
) -> AppResult<FlashPage> {
    let profile = profiles::get_or_create_profile(&state.pool, user.id).await?;
    let layout = Layout::new("My profile")
        .user(Some(&user))
        .messages(flashes.messages());
    Ok(FlashPage(views::profile_page(
        &layout,
        &user,
        &profile,
        &state.settings.media_url,
    )))
}

/// `POST /profile/`
pub async fn profile_update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flashes: Flashes,
    Form(fields): Form<ProfileFields>,
) -> AppResult<Response> {
    let form = ProfileForm {
        first_name: fields.first_name,
        last_name: fields.last_name,
        email: fields.email,
        bio: fields.bio,
        phone_number: fields.phone_number,
    };

    match accounts::update_profile(&state.pool, user.id, &form).await? {
        Validation::Valid(()) => Ok(flashes
            .success("Profile updated successfully!")
            .redirect(PROFILE_URL, state.secure_cookies())),
        Validation::Invalid(errors) => {
            // Re-render with what was submitted so nothing typed is lost.
            let mut shown_user = user.clone();
            shown_user.first_name = form.first_name.clone();
            shown_user.last_name = form.last_name.clone();
            shown_user.email = form.email.clone();
            let mut profile = profiles::get_or_create_profile(&state.pool, user.id).await?;
            profile.bio = form.bio.clone();
            profile.phone_number = form.phone_number.clone();

            let flashes = flashes.errors(errors);
            let layout = Layout::new("My profile")
                .user(Some(&user))
                .messages(flashes.messages());
            Ok(FlashPage(views::profile_page(
                &layout,
                &shown_user,
                &profile,
                &state.settings.media_url,
            ))
            .into_response())
        }
    }
}

fn picture_errors(errors: Vec<String>) -> Json<Value> {
    Json(json!({ "success": false, "errors": errors }))
}

/// `POST /profile/upload-picture/`: answers with JSON for the page script
pub async fn upload_picture(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<Value>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some(PICTURE_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Malformed upload: {}", e)))?;
        upload = Some((content_type, data));
        break;
    }

    let Some((content_type, data)) = upload else {
        warn!(user_id = user.id, "picture upload without a file");
        return Ok(picture_errors(vec!["Please choose an image to upload.".to_string()]));
    };

    match accounts::save_profile_picture(&state.pool, &state.settings, user.id, &content_type, &data)
        .await?
    {
        Validation::Valid(url) => Ok(Json(json!({
            "success": true,
            "picture_url": url,
            "message": "Profile picture updated successfully!",
        }))),
        Validation::Invalid(errors) => Ok(picture_errors(errors)),
    }
}
