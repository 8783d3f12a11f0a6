//! Edge gateway middleware.
//!
//! Runs before every admin page handler: classifies the path, resolves or
//! refreshes the session, and either forwards the request or redirects.
//! Whatever the decision, cookie mutations recorded during resolution are
//! replayed onto the outgoing response; a redirect that dropped a freshly
//! rotated credential would force another refresh on the next hop and can
//! loop forever.
//!
//! Every failure mode of the identity call, timeouts included, collapses to
//! "no identity" and a redirect to login. The gateway never forwards an
//! unauthenticated request to a protected handler and never surfaces an
//! upstream error to the caller.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::COOKIE,
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tokio::time::timeout;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::identity::{CookieJar, Identity};
use crate::soglia::routes::RouteClass;
use crate::soglia::GateState;

pub(crate) async fn gateway(
    State(state): State<Arc<GateState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let class = state.routes().classify(&path);

    // Public routes skip the identity service entirely.
    if class == RouteClass::Public {
        return next.run(request).await;
    }

    let mut jar = CookieJar::from_headers(request.headers());
    let resolved = timeout(
        state.config().resolve_timeout(),
        state.identity().resolve_identity(&mut jar),
    )
    .await;

    let identity = match resolved {
        Ok(Ok(identity)) => identity,
        Ok(Err(err)) => {
            warn!("Identity resolution failed, treating as no identity: {err}");
            None
        }
        Err(_) => {
            warn!("Identity resolution timed out after {:?}", state.config().resolve_timeout());
            None
        }
    };

    let mut response = match (class, identity) {
        (RouteClass::Protected, Some(identity)) => {
            debug!("Allowing {} for {}", path, identity.email);
            forward_with_jar(request, &jar, identity, next).await
        }
        (RouteClass::Protected, None) => {
            login_redirect(state.config().login_path(), &path).into_response()
        }
        (RouteClass::AuthEntry, Some(_)) => {
            // Already signed in; no reason to show the login form again.
            Redirect::temporary(state.config().dashboard_path()).into_response()
        }
        (RouteClass::AuthEntry, None) => next.run(request).await,
        // Public was handled above.
        (RouteClass::Public, _) => unreachable!("public routes never reach the identity check"),
    };

    // Cookie propagation happens on every code path, redirects included.
    jar.write_to(response.headers_mut());
    response
}

/// Forward the request with the (possibly refreshed) credential and the
/// resolved identity attached for the page handler.
async fn forward_with_jar(
    mut request: Request,
    jar: &CookieJar,
    identity: Identity,
    next: Next,
) -> Response {
    if jar.refreshed() {
        match jar.cookie_header().as_deref().map(HeaderValue::from_str) {
            Some(Ok(value)) => {
                request.headers_mut().insert(COOKIE, value);
            }
            Some(Err(err)) => warn!("Could not rebuild Cookie header: {err}"),
            None => {
                request.headers_mut().remove(COOKIE);
            }
        }
    }
    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn login_redirect(login_path: &str, original_path: &str) -> Redirect {
    let redirect: String = form_urlencoded::byte_serialize(original_path.as_bytes()).collect();
    Redirect::temporary(&format!("{login_path}?redirect={redirect}"))
}
