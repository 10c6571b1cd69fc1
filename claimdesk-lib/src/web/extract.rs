use super::error::AppError;
use super::AppState;
use crate::auth::session::{resolve_session, SESSION_COOKIE};
use crate::models::User;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

/// Whether the request was issued by htmx
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HxRequest(pub bool);

fn is_htmx(parts: &Parts) -> bool {
    parts.headers.contains_key("hx-request")
}

#[async_trait]
impl<S> FromRequestParts<S> for HxRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(HxRequest(is_htmx(parts)))
    }
}

/// Session token sent by the client, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(
            super::cookies::read_cookie(&parts.headers, SESSION_COOKIE).map(str::to_string),
        ))
    }
}

async fn session_user(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    match super::cookies::read_cookie(&parts.headers, SESSION_COOKIE) {
        Some(token) => Ok(resolve_session(&state.pool, token).await?),
        None => Ok(None),
    }
}

/// The signed-in user, if there is one
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(session_user(parts, state).await?))
    }
}

/// A signed-in user; anonymous requests are sent to the login page
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match session_user(parts, state).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| "/".to_string());
                Err(AppError::LoginRequired {
                    next,
                    htmx: is_htmx(parts),
                })
            }
        }
    }
}

/// A signed-in staff member
#[derive(Debug, Clone)]
pub struct StaffUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.is_staff {
            Ok(StaffUser(user))
        } else {
            Err(AppError::Forbidden)
        }
    }
}
