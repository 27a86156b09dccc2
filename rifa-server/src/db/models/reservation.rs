//! Reservation Model
//!
//! 买家对一组票号的时效性持有。由 ReservationManager 创建，
//! 只能经 Ledger 的条件更新走向终态；settled 的预订永不删除，
//! expired/released 的预订保留作审计，其票号行被删除即视为释放。

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Reservation status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Settled,
    Expired,
    Released,
}

impl ReservationStatus {
    /// 终态判断：除 pending 外都是终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }
}

/// 买家联系信息
///
/// 匿名购买允许：`account` 仅在调用方已认证时由其附带。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerInfo {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// 预订实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    #[serde(with = "serde_helpers::record_id")]
    pub drawing: RecordId,
    /// 已排序的票号集合 (非空、去重、范围内)
    pub numbers: Vec<u32>,
    pub buyer: BuyerInfo,
    pub total_price: f64,
    pub status: ReservationStatus,
    pub created_at: i64,
    /// 持有到期时间 = created_at + hold window
    pub expires_at: i64,
}

impl Reservation {
    /// 持有是否已过期 (仅对 pending 有意义)
    pub fn is_expired(&self, now: i64) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at <= now
    }
}
