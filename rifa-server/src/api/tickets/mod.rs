//! Tickets API 模块 (可用性 / 预订 / 清扫)

pub mod handler;

pub use handler::ReservationView;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/tickets", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/available/{drawing_id}", get(handler::available))
        .route("/reserve", post(handler::reserve))
        .route(
            "/reservation/{id}",
            get(handler::get_reservation).delete(handler::cancel_reservation),
        )
        .route("/cleanup-expired", post(handler::cleanup_expired))
        .route("/drawing/{drawing_id}", get(handler::drawing_roster))
}
