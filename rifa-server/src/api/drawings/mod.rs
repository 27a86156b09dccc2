//! Drawings API 模块 (抽奖活动播种)
//!
//! 引擎侧最小化的活动管理面：创建和查询。
//! 状态流转 (completed / cancelled) 属于外部活动管理方。

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/drawings", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id))
}
