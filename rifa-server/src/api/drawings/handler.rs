//! Drawings API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::{Drawing, DrawingCreate, serde_helpers};
use crate::utils::{AppError, AppResult};

/// POST /api/drawings 请求体
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DrawingCreateBody {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    pub total_tickets: u32,
    pub ticket_price: f64,
    pub min_tickets: Option<u32>,
    /// 开奖时间 (Unix millis)，必须在未来
    pub draw_date: i64,
    pub created_by: Option<String>,
}

/// 抽奖对外视图
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingView {
    pub drawing_id: String,
    pub title: String,
    pub total_tickets: u32,
    pub ticket_price: f64,
    pub min_tickets: u32,
    pub status: String,
    pub draw_date: i64,
    pub created_by: Option<String>,
    pub created_at: i64,
}

impl DrawingView {
    fn from_drawing(d: &Drawing) -> Self {
        Self {
            drawing_id: d
                .id
                .as_ref()
                .map(serde_helpers::record_key)
                .unwrap_or_default(),
            title: d.title.clone(),
            total_tickets: d.total_tickets,
            ticket_price: d.ticket_price,
            min_tickets: d.min_tickets,
            status: format!("{:?}", d.status).to_lowercase(),
            draw_date: d.draw_date,
            created_by: d.created_by.clone(),
            created_at: d.created_at,
        }
    }
}

/// POST /api/drawings - 创建抽奖
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<DrawingCreateBody>,
) -> AppResult<(StatusCode, Json<DrawingView>)> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let drawing = state
        .drawings()
        .create(DrawingCreate {
            title: payload.title,
            total_tickets: payload.total_tickets,
            ticket_price: payload.ticket_price,
            min_tickets: payload.min_tickets,
            draw_date: payload.draw_date,
            created_by: payload.created_by,
        })
        .await?;

    tracing::info!(
        drawing = %drawing.id.as_ref().map(serde_helpers::record_key).unwrap_or_default(),
        total = drawing.total_tickets,
        "Drawing created"
    );

    Ok((StatusCode::CREATED, Json(DrawingView::from_drawing(&drawing))))
}

/// GET /api/drawings/:id - 查询抽奖
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<DrawingView>> {
    let drawing = state.drawings().get(&id).await?;
    Ok(Json(DrawingView::from_drawing(&drawing)))
}
