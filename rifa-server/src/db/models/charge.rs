//! Charge Model
//!
//! 支付网关关联对象，与一次预订的支付尝试 1:1。
//! record key 直接使用网关 charge id，webhook 查找即按主键。

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Charge status
///
/// `pending → completed → refunded` / `pending → failed`。
/// 终态后的重复事件必须是 no-op。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl ChargeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChargeStatus::Pending)
    }
}

/// 扣款记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    #[serde(with = "serde_helpers::record_id")]
    pub reservation: RecordId,
    pub amount: f64,
    pub currency: String,
    pub status: ChargeStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Charge {
    /// 网关 charge id (record key)
    ///
    /// 网关 id 含 `-` 等字符时 SurrealDB 会用 ⟨⟩ 转义，这里去掉
    pub fn gateway_id(&self) -> String {
        self.id
            .as_ref()
            .map(|id| {
                id.key()
                    .to_string()
                    .trim_matches(|c| c == '⟨' || c == '⟩')
                    .to_string()
            })
            .unwrap_or_default()
    }
}
