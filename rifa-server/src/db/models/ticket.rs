//! Ticket Slot Model
//!
//! 一行 = 一个被占用的票号。空闲票号没有行；过期持有的行会被清扫删除。
//! `(drawing, number)` 上的唯一索引是整个子系统互斥性的强制点。

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Ticket slot status
///
/// `pending` 行带 `expires_at`；结算后转为 `settled` 且不再过期。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Settled,
}

/// 票号占用记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    #[serde(with = "serde_helpers::record_id")]
    pub drawing: RecordId,
    pub number: u32,
    #[serde(with = "serde_helpers::record_id")]
    pub reservation: RecordId,
    pub status: TicketStatus,
    /// 持有到期时间 (Unix millis)；settled 后为 None
    pub expires_at: Option<i64>,
    pub created_at: i64,
}
