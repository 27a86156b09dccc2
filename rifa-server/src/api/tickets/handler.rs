//! Tickets API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::ServerState;
use crate::db::models::{BuyerInfo, Drawing, Reservation, serde_helpers};
use crate::tickets::DrawingAvailability;
use crate::utils::{AppError, AppResponse, AppResult, time};

/// POST /api/tickets/reserve 请求体
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    #[validate(length(min = 1, message = "drawingId must not be empty"))]
    pub drawing_id: String,
    #[validate(length(min = 1, max = 120, message = "buyerName must be 1-120 characters"))]
    pub buyer_name: String,
    #[validate(email(message = "buyerEmail must be a valid email"))]
    pub buyer_email: String,
    #[validate(length(max = 40, message = "buyerPhone too long"))]
    pub buyer_phone: Option<String>,
    /// 已认证调用方附带的外部账号引用 (可选，匿名购买允许)
    pub buyer_account: Option<String>,
    pub ticket_numbers: Vec<u32>,
}

/// 预订对外视图
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    pub reservation_id: String,
    pub drawing_id: String,
    pub ticket_numbers: Vec<u32>,
    pub buyer_name: String,
    pub buyer_email: String,
    pub total_price: f64,
    pub status: String,
    pub created_at: i64,
    pub expires_at: i64,
}

impl ReservationView {
    pub fn from_reservation(r: &Reservation) -> Self {
        Self {
            reservation_id: r
                .id
                .as_ref()
                .map(serde_helpers::record_key)
                .unwrap_or_default(),
            drawing_id: serde_helpers::record_key(&r.drawing),
            ticket_numbers: r.numbers.clone(),
            buyer_name: r.buyer.name.clone(),
            buyer_email: r.buyer.email.clone(),
            total_price: r.total_price,
            status: format!("{:?}", r.status).to_lowercase(),
            created_at: r.created_at,
            expires_at: r.expires_at,
        }
    }
}

/// GET /api/tickets/available/:drawing_id - 查询可用票号
pub async fn available(
    State(state): State<ServerState>,
    Path(drawing_id): Path<String>,
) -> AppResult<Json<DrawingAvailability>> {
    let availability = state.availability().get_availability(&drawing_id).await?;
    Ok(Json(availability))
}

/// POST /api/tickets/reserve - 占号下单
pub async fn reserve(
    State(state): State<ServerState>,
    Json(payload): Json<ReserveRequest>,
) -> AppResult<(StatusCode, Json<ReservationView>)> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let buyer = BuyerInfo {
        name: payload.buyer_name,
        email: payload.buyer_email,
        phone: payload.buyer_phone,
        account: payload.buyer_account,
    };

    let reservation = state
        .reservations()
        .reserve(&payload.drawing_id, buyer, payload.ticket_numbers)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReservationView::from_reservation(&reservation)),
    ))
}

/// 预订详情 (附抽奖摘要)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDetail {
    #[serde(flatten)]
    pub reservation: ReservationView,
    pub drawing_title: String,
    pub draw_date: i64,
}

impl ReservationDetail {
    fn new(reservation: &Reservation, drawing: &Drawing) -> Self {
        Self {
            reservation: ReservationView::from_reservation(reservation),
            drawing_title: drawing.title.clone(),
            draw_date: drawing.draw_date,
        }
    }
}

/// GET /api/tickets/reservation/:id - 查询预订
pub async fn get_reservation(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ReservationDetail>> {
    let (reservation, drawing) = state.reservations().get_reservation(&id).await?;
    Ok(Json(ReservationDetail::new(&reservation, &drawing)))
}

/// DELETE /api/tickets/reservation/:id - 买家提前取消
pub async fn cancel_reservation(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ReservationView>> {
    let reservation = state.reservations().cancel_reservation(&id).await?;
    Ok(Json(ReservationView::from_reservation(&reservation)))
}

/// 清扫结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub swept: usize,
}

/// POST /api/tickets/cleanup-expired - 手动触发过期清扫
pub async fn cleanup_expired(
    State(state): State<ServerState>,
) -> AppResult<Json<AppResponse<SweepResult>>> {
    let swept = state.ledger().sweep_all(time::now_millis()).await?;
    if swept > 0 {
        tracing::info!(count = swept, "Manual sweep released expired holds");
    }
    Ok(Json(AppResponse::success_with_message(
        SweepResult { swept },
        format!("{} expired reservation(s) released", swept),
    )))
}

/// 票号行对外视图 (创建者/管理方查看全量名单)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub number: u32,
    pub status: String,
    pub buyer_name: Option<String>,
    pub buyer_email: Option<String>,
    pub expires_at: Option<i64>,
}

/// GET /api/tickets/drawing/:drawing_id - 抽奖全量票号名单
///
/// 能力门禁：`x-admin-token` 匹配配置令牌，或 `x-requester-account`
/// 匹配抽奖的 created_by。两者都不满足返回 403。
pub async fn drawing_roster(
    State(state): State<ServerState>,
    Path(drawing_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<RosterEntry>>> {
    let drawing = state.drawings().get(&drawing_id).await?;

    let is_admin = match (&state.config.admin_token, headers.get("x-admin-token")) {
        (Some(expected), Some(got)) => got.to_str().is_ok_and(|t| t == expected),
        _ => false,
    };
    let is_creator = match (&drawing.created_by, headers.get("x-requester-account")) {
        (Some(creator), Some(got)) => got.to_str().is_ok_and(|a| a == creator),
        _ => false,
    };
    if !is_admin && !is_creator {
        return Err(AppError::Forbidden(
            "Only the drawing creator or an admin may view the full roster".to_string(),
        ));
    }

    let id = drawing
        .id
        .clone()
        .ok_or_else(|| AppError::internal("Drawing record missing id"))?;
    let rows = state.ledger().tickets_for_drawing(&id).await?;

    Ok(Json(
        rows.into_iter()
            .map(|r| RosterEntry {
                number: r.number,
                status: r.status,
                buyer_name: r.buyer_name,
                buyer_email: r.buyer_email,
                expires_at: r.expires_at,
            })
            .collect(),
    ))
}
