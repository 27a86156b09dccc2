//! Payments API 模块 (扣款 / 退款 / webhook)

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/payments", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/create-charge", post(handler::create_charge))
        .route("/complete-charge", post(handler::complete_charge))
        .route("/status/{charge_id}", get(handler::charge_status))
        .route("/webhook", post(handler::webhook))
        .route("/refund/{charge_id}", post(handler::refund))
}
