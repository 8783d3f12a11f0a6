use axum::{
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde_json::json;
use tracing::error;

use crate::soglia::GIT_COMMIT_HASH;

// axum handler for health
pub async fn health() -> impl IntoResponse {
    let body = Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "build": GIT_COMMIT_HASH,
    }));

    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };

    let mut headers = HeaderMap::new();
    match format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )
    .parse()
    {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => error!("Could not build X-App header: {err}"),
    }

    (headers, body)
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::{health, root};
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn health_sets_app_header() {
        let response = health().await.into_response();
        assert!(response.headers().contains_key("X-App"));
    }

    #[tokio::test]
    async fn root_is_ok() {
        let response = root().await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
