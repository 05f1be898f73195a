//! Embedded web UI
//!
//! A single page with the upload form and the gallery of previous results.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET /
pub async fn serve_index() -> Response {
    (
        StatusCode::OK,
        [
            ("content-type", "text/html; charset=utf-8"),
            ("cache-control", "no-cache, no-store, must-revalidate"),
        ],
        INDEX_HTML,
    )
        .into_response()
}

pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(serve_index))
}
