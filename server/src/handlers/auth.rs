//! Login, signup and logout pages.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AppError;
use crate::identity::{expired_session_cookie, session_cookie, Identity, IdentityError, Registration};
use crate::negotiate::found;
use crate::render;
use crate::AppState;

const LOGIN: &str = "/login/";
const HOME: &str = "/";

/// Login page URL that returns to `next` afterwards.
pub fn login_url(next: &str) -> String {
    match serde_urlencoded::to_string([("next", next)]) {
        Ok(query) => format!("{LOGIN}?{query}"),
        Err(_) => LOGIN.to_string(),
    }
}

/// Only same-site absolute paths are followed after login.
///
/// Browsers read `\` as `/` and drop tabs and newlines, so `/\host` and
/// `/\t/host` are as off-site as `//host`.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n)
            if n.starts_with('/')
                && !matches!(n.as_bytes().get(1), Some(b'/' | b'\\'))
                && !n.chars().any(char::is_control) =>
        {
            n
        }
        _ => HOME,
    }
}

async fn signed_in(state: &AppState, identity: &Identity, next: &str) -> Response {
    let sid = state.identity.start_session(identity).await;
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, next.to_string()),
            (header::SET_COOKIE, state.identity.session_set_cookie(sid)),
        ],
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    next: Option<String>,
}

pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if state.identity.current_identity(&headers).await?.is_some() {
        return Ok(found(HOME));
    }
    Ok(Html(render::login(None, query.next.as_deref())).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    username: Option<String>,
    password: Option<String>,
    next: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if state.identity.current_identity(&headers).await?.is_some() {
        return Ok(found(HOME));
    }

    let next = form.next.as_deref();
    let (Some(username), Some(password)) = (
        form.username.as_deref().filter(|s| !s.is_empty()),
        form.password.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return Ok(Html(render::login(Some("Please enter both username and password."), next)).into_response());
    };

    match state.identity.authenticate(username, password).await? {
        Some(identity) => {
            info!(user_id = %identity.user_id, "login");
            Ok(signed_in(&state, &identity, safe_next(next)).await)
        }
        None => {
            warn!(%username, "rejected login");
            Ok(Html(render::login(Some("Invalid username or password."), next)).into_response())
        }
    }
}

pub async fn signup_page(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if state.identity.current_identity(&headers).await?.is_some() {
        return Ok(found(HOME));
    }
    Ok(Html(render::signup(None)).into_response())
}

pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<Registration>,
) -> Result<Response, AppError> {
    if state.identity.current_identity(&headers).await?.is_some() {
        return Ok(found(HOME));
    }

    match state.identity.register(form).await {
        Ok(identity) => Ok(signed_in(&state, &identity, HOME).await),
        Err(IdentityError::Backend(e)) => Err(IdentityError::Backend(e).into()),
        Err(rejected) => Ok(Html(render::signup(Some(&rejected.to_string()))).into_response()),
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(sid) = session_cookie(&headers) {
        state.identity.end_session(sid).await;
    }
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, LOGIN.to_string()),
            (header::SET_COOKIE, expired_session_cookie()),
        ],
    )
        .into_response()
}
