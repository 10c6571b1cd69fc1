//! Claims list, detail modal, flag toggle, notes and the printable report.

use super::error::{AppError, AppResult};
use super::extract::{CurrentUser, HxRequest};
use super::flash::{FlashPage, Flashes};
use super::AppState;
use crate::models::NoteType;
use crate::queries::{claims, notes};
use crate::render::{claims as views, Layout};
use crate::report::{build_report, report_filename};
use crate::search::ClaimFilter;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::HeaderValue;
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    /// Kept as text so a malformed page falls back instead of rejecting
    pub page: Option<String>,
}

impl ListParams {
    fn filter(&self) -> ClaimFilter {
        ClaimFilter::from_params(self.search.as_deref(), self.status.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FlagForm {
    pub flagged: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteForm {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub format: Option<String>,
}

/// `GET /`
pub async fn claims_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    flashes: Flashes,
    Query(params): Query<ListParams>,
) -> AppResult<FlashPage> {
    let filter = params.filter();
    let page = claims::paginate_claims(
        &state.pool,
        &filter,
        params.page.as_deref(),
        state.settings.page_size,
    )
    .await?;

    let layout = Layout::new("Claims")
        .user(Some(&user))
        .messages(flashes.messages());
    Ok(FlashPage(views::claims_list_page(&layout, &page, &filter)))
}

/// `GET /api/search/`: the table fragment for live search
pub async fn search_claims(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(params): Query<ListParams>,
) -> AppResult<Html<String>> {
    let filter = params.filter();
    let page = claims::paginate_claims(
        &state.pool,
        &filter,
        params.page.as_deref(),
        state.settings.page_size,
    )
    .await?;
    Ok(Html(views::claims_table(&page, &filter)))
}

/// `GET /claim/:claim_id/`: modal fragment for htmx, full page otherwise
pub async fn claim_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    HxRequest(htmx): HxRequest,
    flashes: Flashes,
    Path(claim_id): Path<String>,
) -> AppResult<Response> {
    let claim = claims::find_claim_by_claim_id(&state.pool, &claim_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let notes = notes::list_notes_for_claim(&state.pool, claim.id, true).await?;

    if htmx {
        return Ok(Html(views::claim_detail_partial(&claim, &notes, &user)).into_response());
    }
    let title = format!("Claim {}", claim.claim_id);
    let layout = Layout::new(&title)
        .user(Some(&user))
        .messages(flashes.messages());
    Ok(FlashPage(views::claim_detail_page(&layout, &claim, &notes, &user)).into_response())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// `POST /api/flag/:claim_id/`
///
/// An explicit `flagged` value makes repeated submissions idempotent; without
/// one the flag is toggled.
pub async fn flag_claim(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(claim_id): Path<String>,
    form: Option<Form<FlagForm>>,
) -> AppResult<Html<String>> {
    let requested = form.and_then(|Form(form)| form.flagged);
    let updated = match requested.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => {
            let flagged = parse_flag(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid flag value: {}", raw)))?;
            claims::set_claim_flag(&state.pool, &claim_id, flagged).await?
        }
        None => claims::toggle_claim_flag(&state.pool, &claim_id).await?,
    };
    let claim = updated.ok_or(AppError::NotFound)?;

    info!(claim_id = %claim.claim_id, flagged = claim.is_flagged, user_id = user.id, "claim flag updated");
    Ok(Html(views::flag_button(&claim)))
}

/// `POST /api/add-note/:claim_id/`
pub async fn add_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(claim_id): Path<String>,
    form: Option<Form<NoteForm>>,
) -> AppResult<Response> {
    let claim = claims::find_claim_by_claim_id(&state.pool, &claim_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let content = form
        .map(|Form(form)| form.content.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        let mut response = Html(views::note_warning("Please enter a note.")).into_response();
        let headers = response.headers_mut();
        headers.insert("hx-retarget", HeaderValue::from_static("#note-feedback"));
        headers.insert("hx-reswap", HeaderValue::from_static("innerHTML"));
        return Ok(response);
    }

    let note_type = if user.is_staff {
        NoteType::Admin
    } else {
        NoteType::User
    };
    let note = notes::insert_note(&state.pool, claim.id, note_type, &content, Some(user.id)).await?;

    info!(claim_id = %claim.claim_id, note_id = note.id, user_id = user.id, "note added");
    Ok(Html(views::note_added(&note)).into_response())
}

/// `GET /report/:claim_id/`; `?format=pdf` marks it for download-and-print
pub async fn claim_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(claim_id): Path<String>,
    Query(params): Query<ReportParams>,
) -> AppResult<Response> {
    let report = build_report(&state.pool, &claim_id, &user)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut response = Html(views::report_page(&report)).into_response();
    if params.format.as_deref() == Some("pdf") {
        let disposition = format!("inline; filename=\"{}\"", report_filename(&report.claim.claim_id));
        let value = HeaderValue::from_str(&disposition)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid header value: {}", e)))?;
        response.headers_mut().insert(CONTENT_DISPOSITION, value);
    }
    info!(claim_id = %report.claim.claim_id, user_id = user.id, "report generated");
    Ok(response)
}

