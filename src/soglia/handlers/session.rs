//! Session introspection endpoint.
//!
//! Classified public: browser-side guards need a plain 200/204 answer, not
//! a redirect, so this handler resolves the cookie itself instead of
//! relying on the gateway.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::identity::CookieJar;
use crate::soglia::GateState;

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
}

#[utoipa::path(
    get,
    path = "/admin/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, state: Extension<Arc<GateState>>) -> impl IntoResponse {
    let mut jar = CookieJar::from_headers(&headers);

    // Failures fall back to "no session"; this endpoint never leaks
    // provider errors to an unauthenticated viewer.
    let resolved = match state.identity().resolve_identity(&mut jar).await {
        Ok(resolved) => resolved,
        Err(err) => {
            debug!("Session introspection failed, reporting no session: {err}");
            None
        }
    };

    let mut response = match resolved {
        Some(identity) => (
            StatusCode::OK,
            Json(SessionResponse {
                user_id: identity.id.to_string(),
                email: identity.email,
            }),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    jar.write_to(response.headers_mut());
    response
}
