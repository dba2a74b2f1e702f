use axum::Router;
use axum::routing::post;
use crate::state::AppState;

pub mod dto;
pub mod duration;
pub mod error;
pub mod handler;
pub mod page;
pub mod service;
pub mod workspace;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(handler::render_job))
}
