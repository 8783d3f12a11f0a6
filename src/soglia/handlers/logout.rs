//! Sign-out action.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Redirect},
};
use tracing::error;

use crate::identity::CookieJar;
use crate::soglia::GateState;

/// Invalidate the session and send the caller back to the login route.
///
/// Idempotent: a second call with no active session behaves identically.
/// Even when the provider call fails the response still clears whatever
/// cookies were recorded and navigates to login; sign-out never strands the
/// user on a protected page.
#[utoipa::path(
    post,
    path = "/admin/logout",
    responses(
        (status = 303, description = "Session cleared, redirected to login")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<GateState>>) -> impl IntoResponse {
    let mut jar = CookieJar::from_headers(&headers);

    if let Err(err) = state.identity().sign_out(&mut jar).await {
        error!("Sign-out failed upstream: {err}");
    }

    let mut response = Redirect::to(state.config().login_path()).into_response();
    jar.write_to(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::logout;
    use crate::identity::{CookieJar, IdentityService, MemoryIdentity, SessionEvents};
    use crate::soglia::routes::RouteTable;
    use crate::soglia::{GateConfig, GateState};
    use axum::extract::Extension;
    use axum::http::{
        header::{COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    };
    use axum::response::IntoResponse;
    use secrecy::SecretString;
    use std::sync::Arc;

    async fn signed_in_state() -> (Arc<GateState>, HeaderMap) {
        let backend = Arc::new(MemoryIdentity::new(SessionEvents::new()));
        backend.register("ops@example.com", "hunter2").await;
        let mut jar = CookieJar::default();
        backend
            .sign_in(
                "ops@example.com",
                &SecretString::from("hunter2".to_string()),
                &mut jar,
            )
            .await
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&jar.cookie_header().unwrap()).unwrap(),
        );
        let state = Arc::new(GateState::new(
            GateConfig::new(),
            RouteTable::admin_defaults().unwrap(),
            backend as Arc<dyn IdentityService>,
        ));
        (state, headers)
    }

    #[tokio::test]
    async fn logout_clears_cookies_and_redirects_to_login() {
        let (state, headers) = signed_in_state().await;
        let response = logout(headers, Extension(state)).await.into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/admin/login"
        );
        let cleared: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert!(!cleared.is_empty());
    }

    #[tokio::test]
    async fn logout_without_session_still_succeeds() {
        let (state, _) = signed_in_state().await;
        let response = logout(HeaderMap::new(), Extension(state.clone()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        // And again, to pin down idempotence.
        let response = logout(HeaderMap::new(), Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
