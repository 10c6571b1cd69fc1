//! Login, signup, logout and password reset pages.

use super::cookies::{build_cookie, removal_cookie};
use super::error::{AppResult, LOGIN_URL};
use super::extract::{MaybeUser, SessionToken};
use super::flash::{FlashPage, Flashes};
use super::AppState;
use crate::accounts::{self, SignupForm, Validation};
use crate::auth::session::{end_session, start_session, SESSION_COOKIE};
use crate::auth::{authenticate, AuthOutcome};
use crate::render::{auth as views, Layout};
use crate::utils::safe_next;
use axum::extract::{Path, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;
use tracing::{info, warn};

const HOME_URL: &str = "/";
const RESET_DONE_URL: &str = "/auth/password-reset-done/";

#[derive(Debug, Default, Deserialize)]
pub struct NextParams {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupFields {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequestForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewPasswordForm {
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

fn append_cookie(response: &mut Response, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

/// `GET /auth/login/`
pub async fn login_form(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flashes: Flashes,
    Query(params): Query<NextParams>,
) -> Response {
    if user.is_some() {
        return flashes.redirect(HOME_URL, state.secure_cookies());
    }
    let next = safe_next(params.next.as_deref());
    let layout = Layout::new("Log in").messages(flashes.messages());
    FlashPage(views::login_page(&layout, next, "")).into_response()
}

/// `POST /auth/login/`
pub async fn login(
    State(state): State<AppState>,
    flashes: Flashes,
    Query(params): Query<NextParams>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let next = safe_next(params.next.as_deref());
    let username = form.username.trim();

    let message = match authenticate(&state.pool, username, &form.password).await? {
        AuthOutcome::Authenticated(user) => {
            let token =
                start_session(&state.pool, user.id, state.settings.session_ttl_secs).await?;
            let secure = state.secure_cookies();
            let mut response = flashes
                .success(format!("Welcome back, {}!", user.display_name()))
                .redirect(next.unwrap_or(HOME_URL), secure);
            append_cookie(
                &mut response,
                &build_cookie(SESSION_COOKIE, &token, None, secure),
            );
            return Ok(response);
        }
        AuthOutcome::Inactive => "Your account has been deactivated. Contact administrator.",
        AuthOutcome::InvalidCredentials => "Invalid username or password.",
    };

    warn!(%username, "login rejected");
    let flashes = flashes.error(message);
    let layout = Layout::new("Log in").messages(flashes.messages());
    Ok(FlashPage(views::login_page(&layout, next, username)).into_response())
}

/// `GET /auth/signup/`
pub async fn signup_form(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flashes: Flashes,
) -> Response {
    if user.is_some() {
        return flashes.redirect(HOME_URL, state.secure_cookies());
    }
    let layout = Layout::new("Sign up").messages(flashes.messages());
    FlashPage(views::signup_page(&layout, "", "")).into_response()
}

/// `POST /auth/signup/`
pub async fn signup(
    State(state): State<AppState>,
    flashes: Flashes,
    Form(fields): Form<SignupFields>,
) -> AppResult<Response> {
    let form = SignupForm {
        username: fields.username,
        email: fields.email,
        password1: fields.password1,
        password2: fields.password2,
    };
    match accounts::register(&state.pool, &form).await? {
        Validation::Valid(user) => {
            info!(user_id = user.id, "account created");
            Ok(flashes
                .success("Account created successfully! Please log in.")
                .redirect(LOGIN_URL, state.secure_cookies()))
        }
        Validation::Invalid(errors) => {
            let flashes = flashes.errors(errors);
            let layout = Layout::new("Sign up").messages(flashes.messages());
            Ok(FlashPage(views::signup_page(&layout, form.username.trim(), form.email.trim())).into_response())
        }
    }
}

/// `GET /auth/logout/`
pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
    flashes: Flashes,
) -> AppResult<Response> {
    if let Some(token) = token {
        end_session(&state.pool, &token).await?;
    }
    let secure = state.secure_cookies();
    let mut response = flashes
        .success("Successfully logged out.")
        .redirect(LOGIN_URL, secure);
    append_cookie(&mut response, &removal_cookie(SESSION_COOKIE, secure));
    Ok(response)
}

/// `GET /auth/password-reset/`
pub async fn password_reset_form(flashes: Flashes) -> FlashPage {
    let layout = Layout::new("Reset password").messages(flashes.messages());
    FlashPage(views::password_reset_page(&layout, ""))
}

/// `POST /auth/password-reset/`
pub async fn password_reset(
    State(state): State<AppState>,
    flashes: Flashes,
    Form(form): Form<ResetRequestForm>,
) -> AppResult<Response> {
    let outcome = accounts::request_password_reset(
        &state.pool,
        &state.settings,
        state.mailer.as_ref(),
        &form.email,
    )
    .await?;
    match outcome {
        Validation::Valid(_) => Ok(flashes
            .success("Password reset instructions have been sent to your email address.")
            .redirect(RESET_DONE_URL, state.secure_cookies())),
        Validation::Invalid(errors) => {
            let flashes = flashes.errors(errors);
            let layout = Layout::new("Reset password").messages(flashes.messages());
            Ok(FlashPage(views::password_reset_page(&layout, form.email.trim())).into_response())
        }
    }
}

/// `GET /auth/password-reset-done/`
pub async fn password_reset_done(flashes: Flashes) -> FlashPage {
    let layout = Layout::new("Check your email").messages(flashes.messages());
    FlashPage(views::password_reset_done_page(&layout))
}

fn confirm_action(uidb64: &str, token: &str) -> String {
    format!("/auth/password-reset-confirm/{}/{}/", uidb64, token)
}

/// `GET /auth/password-reset-confirm/:uidb64/:token/`
pub async fn password_reset_confirm_form(
    State(state): State<AppState>,
    flashes: Flashes,
    Path((uidb64, token)): Path<(String, String)>,
) -> AppResult<FlashPage> {
    let user = accounts::resolve_reset_link(&state.pool, &state.settings, &uidb64, &token).await?;
    let layout = Layout::new("Choose a new password").messages(flashes.messages());
    Ok(FlashPage(views::password_reset_confirm_page(
        &layout,
        user.is_some(),
        &confirm_action(&uidb64, &token),
    )))
}

/// `POST /auth/password-reset-confirm/:uidb64/:token/`
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    flashes: Flashes,
    Path((uidb64, token)): Path<(String, String)>,
    Form(form): Form<NewPasswordForm>,
) -> AppResult<Response> {
    let action = confirm_action(&uidb64, &token);
    let Some(user) =
        accounts::resolve_reset_link(&state.pool, &state.settings, &uidb64, &token).await?
    else {
        warn!("password reset with invalid link");
        let layout = Layout::new("Choose a new password").messages(flashes.messages());
        return Ok(FlashPage(views::password_reset_confirm_page(&layout, false, &action)).into_response());
    };

    match accounts::complete_password_reset(&state.pool, &user, &form.password1, &form.password2)
        .await?
    {
        Validation::Valid(()) => Ok(flashes
            .success("Your password has been reset successfully! Please log in.")
            .redirect(LOGIN_URL, state.secure_cookies())),
        Validation::Invalid(errors) => {
            let flashes = flashes.errors(errors);
            let layout = Layout::new("Choose a new password").messages(flashes.messages());
            Ok(FlashPage(views::password_reset_confirm_page(&layout, true, &action)).into_response())
        }
    }
}
