//! Sign-in action and the login mount point.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use super::{safe_redirect, valid_email};
use crate::identity::{AuthError, CookieJar};
use crate::soglia::GateState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Return-to path from the gateway's login redirect, if any.
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub redirect_to: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Sign in against the identity provider.
///
/// On success the provider has already set the session cookies (recorded in
/// the jar and replayed here); the body tells the caller where to navigate.
/// Failures return a user-safe message and never navigate.
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Malformed credentials", body = ErrorResponse),
        (status = 503, description = "Identity provider unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<GateState>>,
    Json(request): Json<LoginRequest>,
) -> impl IntoResponse {
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "email and password are required",
        );
    }
    if !valid_email(email) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "malformed email address");
    }

    let mut jar = CookieJar::from_headers(&headers);
    let secret = SecretString::from(request.password);

    match state.identity().sign_in(email, &secret, &mut jar).await {
        Ok(identity) => {
            info!("Signed in {}", identity.email);
            let redirect_to = safe_redirect(
                request.redirect.as_deref(),
                state.config().dashboard_path(),
            );
            let mut response =
                (StatusCode::OK, Json(LoginResponse { redirect_to })).into_response();
            jar.write_to(response.headers_mut());
            response
        }
        Err(AuthError::InvalidCredentials) => {
            error_response(StatusCode::UNAUTHORIZED, "invalid email or password")
        }
        Err(err) => {
            // Provider detail stays in the logs; the caller gets a generic
            // transient failure.
            error!("Sign-in failed upstream: {err}");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "sign-in is temporarily unavailable",
            )
        }
    }
}

/// Mount point for the login form; markup lives with the pages, outside
/// this crate.
pub async fn login_page() -> impl IntoResponse {
    Html("<!doctype html><title>Sign in</title>")
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
