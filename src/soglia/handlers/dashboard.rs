//! Dashboard mount point.
//!
//! The gateway only forwards authenticated requests here and attaches the
//! resolved identity to the request extensions; the actual dashboard pages
//! live outside this crate.

use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::identity::Identity;

pub async fn dashboard(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    Json(json!({
        "view": "dashboard",
        "user": {
            "id": identity.id,
            "email": identity.email,
        },
    }))
}
