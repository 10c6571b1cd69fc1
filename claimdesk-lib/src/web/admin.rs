//! Staff-only pages: dashboard, CSV upload, user management and statistics.

use super::error::{AppError, AppResult};
use super::extract::StaffUser;
use super::flash::{FlashPage, Flashes};
use super::AppState;
use crate::loader::merge_csv_files;
use crate::queries::{sessions, users};
use crate::render::{admin as views, Layout};
use crate::stats;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use tracing::{error, info, warn};

const CSV_UPLOAD_URL: &str = "/admin-dashboard/csv-upload/";
const MANAGE_USERS_URL: &str = "/admin-dashboard/manage-users/";
const CSV_FIELDS: [&str; 2] = ["csv_file_1", "csv_file_2"];

#[derive(Debug, Default, Deserialize)]
pub struct UserActionForm {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub action: String,
}

/// `GET /admin-dashboard/`
pub async fn dashboard(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    flashes: Flashes,
) -> AppResult<FlashPage> {
    let stats = stats::dashboard_stats(&state.pool).await?;
    let layout = Layout::new("Admin dashboard")
        .user(Some(&user))
        .messages(flashes.messages());
    Ok(FlashPage(views::dashboard_page(&layout, &stats)))
}

/// `GET /admin-dashboard/csv-upload/`
pub async fn csv_upload_form(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    flashes: Flashes,
) -> FlashPage {
    let layout = Layout::new("Upload claims")
        .user(Some(&user))
        .messages(flashes.messages());
    FlashPage(views::csv_upload_page(&layout, state.settings.max_csv_bytes))
}

/// Check one uploaded file; the message names it by its form position
fn csv_file_error(position: usize, name: &str, size: usize, max_bytes: usize) -> Option<String> {
    if !name.to_ascii_lowercase().ends_with(".csv") {
        return Some(format!("File {} must be a valid CSV file.", position));
    }
    if size > max_bytes {
        return Some(format!(
            "File {} is too large. Please use files under {}MB.",
            position,
            max_bytes / (1024 * 1024)
        ));
    }
    None
}

/// `POST /admin-dashboard/process-csv/`
pub async fn process_csv(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    flashes: Flashes,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let secure = state.secure_cookies();
    let mut files: Vec<(usize, String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        let Some(position) = field
            .name()
            .and_then(|name| CSV_FIELDS.iter().position(|f| *f == name))
        else {
            continue;
        };
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Malformed upload: {}", e)))?;
        // Browsers send an empty part for a file input left blank.
        if file_name.is_empty() && data.is_empty() {
            continue;
        }
        files.push((position + 1, file_name, data.to_vec()));
    }

    if files.is_empty() {
        return Ok(flashes
            .error("Please select at least one CSV file.")
            .redirect(CSV_UPLOAD_URL, secure));
    }
    files.sort_by_key(|(position, _, _)| *position);

    let problems: Vec<String> = files
        .iter()
        .filter_map(|(position, name, data)| {
            csv_file_error(*position, name, data.len(), state.settings.max_csv_bytes)
        })
        .collect();
    if !problems.is_empty() {
        warn!(user_id = user.id, "csv upload rejected");
        return Ok(flashes.errors(problems).redirect(CSV_UPLOAD_URL, secure));
    }

    let named: Vec<(String, Vec<u8>)> = files
        .into_iter()
        .map(|(_, name, data)| (name, data))
        .collect();
    let summary = match merge_csv_files(&state.pool, &named).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(user_id = user.id, error = ?e, "csv upload failed");
            return Ok(flashes
                .error(format!("Error processing file: {:#}", e))
                .redirect(CSV_UPLOAD_URL, secure));
        }
    };

    info!(
        user_id = user.id,
        files = named.len(),
        created = summary.created,
        updated = summary.updated,
        errors = summary.errors,
        "csv upload processed"
    );
    let flashes = flashes.success(format!(
        "Upload completed! {} created, {} updated, {} errors.",
        summary.created, summary.updated, summary.errors
    ));
    let layout = Layout::new("Upload results")
        .user(Some(&user))
        .messages(flashes.messages());
    Ok(FlashPage(views::csv_results_page(&layout, &summary)).into_response())
}

/// `GET /admin-dashboard/manage-users/`
pub async fn manage_users_form(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    flashes: Flashes,
) -> AppResult<FlashPage> {
    let all_users = users::list_users(&state.pool).await?;
    let counts = users::count_users(&state.pool).await?;
    let layout = Layout::new("Manage users")
        .user(Some(&user))
        .messages(flashes.messages());
    Ok(FlashPage(views::manage_users_page(&layout, &all_users, &counts, user.id)))
}

/// `POST /admin-dashboard/manage-users/`
pub async fn manage_users(
    State(state): State<AppState>,
    StaffUser(me): StaffUser,
    flashes: Flashes,
    Form(form): Form<UserActionForm>,
) -> AppResult<Response> {
    let secure = state.secure_cookies();
    let target = match form.user_id.trim().parse::<i64>() {
        Ok(id) => users::find_user_by_id(&state.pool, id).await?,
        Err(_) => None,
    };
    let Some(target) = target else {
        return Ok(flashes.error("User not found.").redirect(MANAGE_USERS_URL, secure));
    };
    if target.is_superuser {
        return Ok(flashes
            .error("Cannot modify super admin accounts.")
            .redirect(MANAGE_USERS_URL, secure));
    }
    if target.id == me.id {
        return Ok(flashes
            .error("Cannot modify your own account.")
            .redirect(MANAGE_USERS_URL, secure));
    }

    let name = target.username.as_str();
    let message = match form.action.trim() {
        "make_staff" => {
            users::set_user_staff(&state.pool, target.id, true).await?;
            format!("{} is now a staff member.", name)
        }
        "remove_staff" => {
            users::set_user_staff(&state.pool, target.id, false).await?;
            format!("{} is no longer a staff member.", name)
        }
        "deactivate" => {
            users::set_user_active(&state.pool, target.id, false).await?;
            sessions::delete_user_sessions(&state.pool, target.id).await?;
            format!("{} has been deactivated.", name)
        }
        "activate" => {
            users::set_user_active(&state.pool, target.id, true).await?;
            format!("{} has been activated.", name)
        }
        other => {
            warn!(action = %other, "unknown user action");
            return Ok(flashes.error("Unknown action.").redirect(MANAGE_USERS_URL, secure));
        }
    };

    info!(staff_id = me.id, user_id = target.id, action = %form.action.trim(), "user updated");
    Ok(flashes.success(message).redirect(MANAGE_USERS_URL, secure))
}

/// `GET /admin-dashboard/system-stats/`
pub async fn system_stats(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    flashes: Flashes,
) -> AppResult<FlashPage> {
    let stats = stats::system_stats(&state.pool).await?;
    let layout = Layout::new("System statistics")
        .user(Some(&user))
        .messages(flashes.messages());
    Ok(FlashPage(views::system_stats_page(&layout, &stats)))
}
