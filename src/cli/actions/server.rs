use crate::cli::actions::Action;
use crate::identity::{HttpIdentity, SessionEvents};
use crate::soglia::{self, GateConfig, GateState};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        identity_url,
        resolve_timeout_ms,
    } = action;

    let events = SessionEvents::new();
    let identity = HttpIdentity::new(&identity_url, events)
        .with_context(|| format!("Invalid identity provider URL: {identity_url}"))?;

    let config =
        GateConfig::new().with_resolve_timeout(Duration::from_millis(resolve_timeout_ms));
    // Route misconfiguration is fatal here, before the listener binds.
    let routes = soglia::admin_route_table().context("Invalid route table")?;

    let state = Arc::new(GateState::new(config, routes, Arc::new(identity)));

    soglia::new(port, state).await
}
