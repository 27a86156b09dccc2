//! 统一错误处理
//!
//! 提供应用级错误类型和响应结构：
//! - [`AppError`] - 应用错误枚举
//! - [`AppResponse`] - API 响应结构
//!
//! # 错误码规范
//!
//! | 前缀 | 分类 | 示例 |
//! |------|------|------|
//! | E0xxx | 通用错误 | E0003 资源不存在 |
//! | E1xxx | 票务/支付业务错误 | E1001 票号已被占用 |
//! | E2xxx | 权限错误 | E2001 无权限 |
//! | E9xxx | 系统错误 | E9002 数据库错误 |
//!
//! # 使用示例
//!
//! ```ignore
//! // 返回错误
//! Err(AppError::not_found("Reservation not found"))
//!
//! // 返回成功响应
//! Ok(Json(AppResponse::success(data)))
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// 应用错误枚举
///
/// # 错误分类
///
/// | 分类 | 说明 |
/// |------|------|
/// | 验证错误 | 非法票号、低于最低购买量、联系方式格式错误 |
/// | 冲突错误 | 票号已被其他交易占用 |
/// | 时效错误 | 抽奖已截止、预订已过期 |
/// | 外部依赖错误 | 支付网关不可达 |
/// | 系统错误 | 数据库错误、内部错误 |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== 通用错误 (4xx) ==========
    #[error("Resource not found: {0}")]
    /// 资源不存在 (404)
    NotFound(String),

    #[error("Validation failed: {0}")]
    /// 验证失败 (400)
    Validation(String),

    #[error("Conflict: {0}")]
    /// 资源冲突 (409)
    Conflict(String),

    #[error("Permission denied: {0}")]
    /// 无权限 (403)
    Forbidden(String),

    // ========== 票务/支付业务错误 ==========
    #[error("Tickets unavailable: {}", format_numbers(.0))]
    /// 票号已被占用 (409)，包含全部冲突票号
    TicketsUnavailable(Vec<u32>),

    #[error("Invalid ticket numbers: {}", format_numbers(.0))]
    /// 票号越界或重复 (400)
    InvalidTicketNumber(Vec<u32>),

    #[error("Minimum purchase is {required} ticket(s), got {got}")]
    /// 低于最低购买量 (400)
    BelowMinimumPurchase { required: u32, got: u32 },

    #[error("Drawing is closed: {0}")]
    /// 抽奖不在售票状态或已截止 (400)
    DrawingClosed(String),

    #[error("Drawing is not active: {0}")]
    /// 抽奖不在 active 状态，可用性查询拒绝 (400)
    DrawingNotActive(String),

    #[error("Reservation expired: {0}")]
    /// 预订已过期，需重新选号 (410)
    ReservationExpired(String),

    #[error("Payment failed: {0}")]
    /// 网关拒绝支付 (400)
    PaymentFailed(String),

    #[error("Charge not refundable: {0}")]
    /// 仅 completed 状态可退款 (409)
    ChargeNotRefundable(String),

    // ========== 外部依赖错误 (5xx) ==========
    #[error("Payment gateway unavailable: {0}")]
    /// 网关不可达，调用方可重试 (502)
    GatewayUnavailable(String),

    // ========== 系统错误 (5xx) ==========
    #[error("Database error: {0}")]
    /// 数据库错误 (500)
    Database(String),

    #[error("Internal server error: {0}")]
    /// 内部错误 (500)
    Internal(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// 冲突/非法票号列表格式化: "3, 7, 9"
fn format_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 错误响应体
///
/// ```json
/// {
///   "code": "E1001",
///   "message": "Tickets unavailable: 7",
///   "tickets": [7]
/// }
/// ```
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    /// 冲突或非法的票号列表 (仅票号相关错误)
    #[serde(skip_serializing_if = "Option::is_none")]
    tickets: Option<Vec<u32>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let tickets = match &self {
            AppError::TicketsUnavailable(n) | AppError::InvalidTicketNumber(n) => Some(n.clone()),
            _ => None,
        };

        let (status, code, message) = match &self {
            // Generic errors
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "E0003", self.to_string()),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "E0002", self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "E0004", self.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "E2001", self.to_string()),

            // Ticket / payment business errors
            AppError::TicketsUnavailable(_) => (StatusCode::CONFLICT, "E1001", self.to_string()),
            AppError::InvalidTicketNumber(_) => {
                (StatusCode::BAD_REQUEST, "E1002", self.to_string())
            }
            AppError::BelowMinimumPurchase { .. } => {
                (StatusCode::BAD_REQUEST, "E1003", self.to_string())
            }
            AppError::DrawingClosed(_) => (StatusCode::BAD_REQUEST, "E1004", self.to_string()),
            AppError::DrawingNotActive(_) => (StatusCode::BAD_REQUEST, "E1008", self.to_string()),
            AppError::ReservationExpired(_) => (StatusCode::GONE, "E1005", self.to_string()),
            AppError::PaymentFailed(_) => (StatusCode::BAD_REQUEST, "E1006", self.to_string()),
            AppError::ChargeNotRefundable(_) => (StatusCode::CONFLICT, "E1007", self.to_string()),

            // External dependency errors (502)
            AppError::GatewayUnavailable(msg) => {
                error!(target: "gateway", error = %msg, "Payment gateway unavailable");
                (StatusCode::BAD_GATEWAY, "E9003", self.to_string())
            }

            // System errors (500) - 记录详细信息但不暴露
            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9002",
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            code: code.to_string(),
            message,
            tickets,
        };

        (status, Json(body)).into_response()
    }
}

/// 处理器的 Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

/// API 统一响应结构
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> AppResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// 创建带消息的成功响应
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_unavailable_names_every_number() {
        let err = AppError::TicketsUnavailable(vec![3, 7, 9]);
        assert_eq!(err.to_string(), "Tickets unavailable: 3, 7, 9");
    }

    #[test]
    fn below_minimum_message() {
        let err = AppError::BelowMinimumPurchase {
            required: 3,
            got: 2,
        };
        assert_eq!(err.to_string(), "Minimum purchase is 3 ticket(s), got 2");
    }
}
