use axum::{Router, routing::post};

use crate::AppState;

mod webhook;

pub fn build_router(path: &str) -> Router<AppState> {
    Router::new().route(path, post(webhook::webhook))
}
