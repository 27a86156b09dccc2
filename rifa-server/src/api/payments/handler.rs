//! Payments API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::tickets::ReservationView;
use crate::core::ServerState;
use crate::payments::{ChargeHandle, GatewayEvent, GatewayEventKind};
use crate::utils::{AppError, AppResult};

/// POST /api/payments/create-charge 请求体
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChargeBody {
    #[validate(length(min = 1, message = "reservationId must not be empty"))]
    pub reservation_id: String,
    #[validate(url(message = "returnUrl must be a valid URL"))]
    pub return_url: String,
    #[validate(url(message = "cancelUrl must be a valid URL"))]
    pub cancel_url: String,
}

/// POST /api/payments/create-charge - 创建网关扣款
pub async fn create_charge(
    State(state): State<ServerState>,
    Json(payload): Json<CreateChargeBody>,
) -> AppResult<(StatusCode, Json<ChargeHandle>)> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let handle = state
        .settlement()
        .begin_charge(
            &payload.reservation_id,
            &payload.return_url,
            &payload.cancel_url,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(handle)))
}

/// POST /api/payments/complete-charge 请求体
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteChargeBody {
    #[validate(length(min = 1, message = "chargeId must not be empty"))]
    pub charge_id: String,
    #[validate(length(min = 1, message = "approvalToken must not be empty"))]
    pub approval_token: String,
}

/// POST /api/payments/complete-charge - 买家审批后执行扣款并结算
pub async fn complete_charge(
    State(state): State<ServerState>,
    Json(payload): Json<CompleteChargeBody>,
) -> AppResult<Json<ReservationView>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let reservation = state
        .settlement()
        .complete_charge(&payload.charge_id, &payload.approval_token)
        .await?;

    Ok(Json(ReservationView::from_reservation(&reservation)))
}

/// 扣款状态视图
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeStatusView {
    pub charge_id: String,
    pub status: String,
    pub amount: f64,
    pub currency: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub reservation: ReservationView,
}

/// GET /api/payments/status/:charge_id - 扣款 + 关联预订状态
pub async fn charge_status(
    State(state): State<ServerState>,
    Path(charge_id): Path<String>,
) -> AppResult<Json<ChargeStatusView>> {
    let (charge, reservation) = state.settlement().charge_status(&charge_id).await?;
    Ok(Json(ChargeStatusView {
        charge_id: charge.gateway_id(),
        status: format!("{:?}", charge.status).to_lowercase(),
        amount: charge.amount,
        currency: charge.currency,
        created_at: charge.created_at,
        updated_at: charge.updated_at,
        reservation: ReservationView::from_reservation(&reservation),
    }))
}

/// webhook 请求体 (网关事件通知)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    pub event_type: String,
    pub charge_id: String,
}

/// webhook 应答：`handled=false` 表示事件类型未知，已确认收到但不动账
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub handled: bool,
}

/// POST /api/payments/webhook - 网关异步事件入口
///
/// 重复投递安全；未知事件类型确认收到即可，网关不应重试。
pub async fn webhook(
    State(state): State<ServerState>,
    Json(payload): Json<WebhookBody>,
) -> AppResult<Json<WebhookAck>> {
    let Some(kind) = GatewayEventKind::parse(&payload.event_type) else {
        tracing::debug!(event = %payload.event_type, "Ignoring unknown gateway event type");
        return Ok(Json(WebhookAck {
            received: true,
            handled: false,
        }));
    };

    state
        .settlement()
        .handle_gateway_event(GatewayEvent {
            kind,
            charge_id: payload.charge_id,
        })
        .await?;

    Ok(Json(WebhookAck {
        received: true,
        handled: true,
    }))
}

/// 退款应答
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundAck {
    pub charge_id: String,
    pub status: &'static str,
}

/// POST /api/payments/refund/:charge_id - 退款 completed 扣款
pub async fn refund(
    State(state): State<ServerState>,
    Path(charge_id): Path<String>,
) -> AppResult<Json<RefundAck>> {
    state.settlement().refund_charge(&charge_id).await?;
    Ok(Json(RefundAck {
        charge_id,
        status: "refunded",
    }))
}
