//! Server wiring for the admin gateway.

use crate::identity::{AuthError, IdentityService};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod gateway;
pub(crate) mod handlers;
pub mod routes;

use routes::RouteTable;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

const DEFAULT_LOGIN_PATH: &str = "/admin/login";
const DEFAULT_DASHBOARD_PATH: &str = "/admin/dashboard";
const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(3);

/// Gateway configuration: redirect targets and the identity-resolution
/// bound. The timeout is not optional; a hung provider must fail closed
/// instead of stalling the request.
#[derive(Clone, Debug)]
pub struct GateConfig {
    login_path: String,
    dashboard_path: String,
    resolve_timeout: Duration,
}

impl GateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            dashboard_path: DEFAULT_DASHBOARD_PATH.to_string(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_login_path(mut self, path: String) -> Self {
        self.login_path = path;
        self
    }

    #[must_use]
    pub fn with_dashboard_path(mut self, path: String) -> Self {
        self.dashboard_path = path;
        self
    }

    #[must_use]
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    #[must_use]
    pub fn resolve_timeout(&self) -> Duration {
        self.resolve_timeout
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the gateway and the auth handlers share, passed explicitly
/// rather than looked up ambiently.
pub struct GateState {
    config: GateConfig,
    routes: RouteTable,
    identity: Arc<dyn IdentityService>,
}

impl GateState {
    #[must_use]
    pub fn new(config: GateConfig, routes: RouteTable, identity: Arc<dyn IdentityService>) -> Self {
        Self {
            config,
            routes,
            identity,
        }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityService> {
        &self.identity
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login::login,
        handlers::logout::logout,
        handlers::session::session,
    ),
    tags((name = "auth", description = "Admin session endpoints"))
)]
struct ApiDoc;

/// The documented API surface.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the admin router with the edge gateway layered over it.
#[must_use]
pub fn router(state: Arc<GateState>) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route(
            "/admin/login",
            get(handlers::login::login_page).post(handlers::login::login),
        )
        .route("/admin/logout", post(handlers::logout::logout))
        .route("/admin/session", get(handlers::session::session))
        .route("/admin/dashboard", get(handlers::dashboard::dashboard))
        .route(
            "/admin/dashboard/*rest",
            get(handlers::dashboard::dashboard),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gateway::gateway,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &Request<Body>| {
                        HeaderValue::from_str(Ulid::new().to_string().as_str()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: Arc<GateState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Validate the route table before the server starts; a misconfigured rule
/// set must never be discovered lazily at request time.
///
/// # Errors
/// Propagates `MisconfiguredRoute` from table construction.
pub fn admin_route_table() -> Result<RouteTable, AuthError> {
    RouteTable::admin_defaults()
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::{openapi, GateConfig};
    use std::time::Duration;

    #[test]
    fn gate_config_defaults_and_overrides() {
        let config = GateConfig::new();
        assert_eq!(config.login_path(), "/admin/login");
        assert_eq!(config.dashboard_path(), "/admin/dashboard");
        assert_eq!(config.resolve_timeout(), Duration::from_secs(3));

        let config = config
            .with_login_path("/backoffice/login".to_string())
            .with_dashboard_path("/backoffice".to_string())
            .with_resolve_timeout(Duration::from_millis(500));
        assert_eq!(config.login_path(), "/backoffice/login");
        assert_eq!(config.dashboard_path(), "/backoffice");
        assert_eq!(config.resolve_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn openapi_documents_the_auth_routes() {
        let doc = openapi();
        assert!(doc.paths.paths.contains_key("/admin/login"));
        assert!(doc.paths.paths.contains_key("/admin/logout"));
        assert!(doc.paths.paths.contains_key("/admin/session"));
    }
}
