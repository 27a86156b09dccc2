//! Drawing Model
//!
//! 抽奖活动参考数据。引擎只读取 `total_tickets` / `ticket_price` /
//! `min_tickets` / `status` / `draw_date`，其余字段属于外部的活动管理方。

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Drawing status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DrawingStatus {
    Active,
    Completed,
    Cancelled,
}

/// 抽奖活动实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drawing {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub title: String,
    /// 票池大小 N，票号范围 [1, N]
    pub total_tickets: u32,
    /// 单张票价
    pub ticket_price: f64,
    /// 单次购买最低张数
    pub min_tickets: u32,
    pub status: DrawingStatus,
    /// 开奖时间 (Unix millis)，到点后停售
    pub draw_date: i64,
    /// 创建者 (外部账号引用，可为空；缺省时不落库为 null)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: i64,
}

impl Drawing {
    /// 是否仍在售票：active 且未到开奖时间
    pub fn is_open_for_sales(&self, now: i64) -> bool {
        self.status == DrawingStatus::Active && now < self.draw_date
    }
}

/// 创建抽奖的输入
#[derive(Debug, Clone, Deserialize)]
pub struct DrawingCreate {
    pub title: String,
    pub total_tickets: u32,
    pub ticket_price: f64,
    pub min_tickets: Option<u32>,
    pub draw_date: i64,
    pub created_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawing(status: DrawingStatus, draw_date: i64) -> Drawing {
        Drawing {
            id: None,
            title: "Test".to_string(),
            total_tickets: 100,
            ticket_price: 5.0,
            min_tickets: 1,
            status,
            draw_date,
            created_by: None,
            created_at: 0,
        }
    }

    #[test]
    fn open_only_when_active_and_before_draw_date() {
        assert!(drawing(DrawingStatus::Active, 2_000).is_open_for_sales(1_000));
        assert!(!drawing(DrawingStatus::Active, 1_000).is_open_for_sales(1_000));
        assert!(!drawing(DrawingStatus::Completed, 2_000).is_open_for_sales(1_000));
        assert!(!drawing(DrawingStatus::Cancelled, 2_000).is_open_for_sales(1_000));
    }
}
