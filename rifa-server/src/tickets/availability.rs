//! Availability Query Service
//!
//! 从 Ledger 推导抽奖的可用票号集合。读之前先对该抽奖做一次懒清扫，
//! 避免被放弃的持有把反复失败的买家永久挡在门外。

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::models::Drawing;
use crate::db::repository::{DrawingRepository, TicketLedger};
use crate::utils::{AppError, AppResult, time};

/// 一次可用性查询的结果
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingAvailability {
    pub drawing_id: String,
    pub total_tickets: u32,
    pub min_tickets: u32,
    pub ticket_price: f64,
    /// 已占用票号 (held + settled，升序)
    pub sold_tickets: Vec<u32>,
    pub sold_tickets_count: usize,
    /// 可购票号 (升序)
    pub available_tickets: Vec<u32>,
    pub available_count: usize,
}

/// 可用性查询服务
#[derive(Clone)]
pub struct AvailabilityService {
    drawings: DrawingRepository,
    ledger: TicketLedger,
}

impl AvailabilityService {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            drawings: DrawingRepository::new(db.clone()),
            ledger: TicketLedger::new(db),
        }
    }

    /// 查询抽奖可用票号
    ///
    /// 失败：抽奖不存在 (`NotFound`) 或不在售票状态 (`DrawingNotActive`)。
    /// 副作用仅限懒清扫。
    pub async fn get_availability(&self, drawing_id: &str) -> AppResult<DrawingAvailability> {
        let drawing = self.drawings.get(drawing_id).await?;
        let now = time::now_millis();

        if !drawing.is_open_for_sales(now) {
            return Err(AppError::DrawingNotActive(format!(
                "Drawing {} is not open for sales",
                drawing_id
            )));
        }

        let id = drawing
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Drawing record missing id"))?;

        // 懒清扫：过期持有的票号立即回归可用集合
        let swept = self.ledger.sweep_drawing(&id, now).await?;
        if swept > 0 {
            tracing::debug!(drawing = %id, count = swept, "Lazy sweep released expired holds");
        }

        let sold = self.ledger.occupied_numbers(&id).await?;
        Ok(Self::build(drawing, sold))
    }

    fn build(drawing: Drawing, sold: Vec<u32>) -> DrawingAvailability {
        let total = drawing.total_tickets;
        let mut available = Vec::with_capacity(total as usize - sold.len());
        let mut sold_iter = sold.iter().peekable();
        for n in 1..=total {
            if sold_iter.peek() == Some(&&n) {
                sold_iter.next();
            } else {
                available.push(n);
            }
        }

        DrawingAvailability {
            drawing_id: drawing
                .id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            total_tickets: total,
            min_tickets: drawing.min_tickets,
            ticket_price: drawing.ticket_price,
            sold_tickets_count: sold.len(),
            sold_tickets: sold,
            available_count: available.len(),
            available_tickets: available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DrawingStatus;

    #[test]
    fn build_splits_sold_and_available() {
        let drawing = Drawing {
            id: None,
            title: "t".into(),
            total_tickets: 5,
            ticket_price: 2.0,
            min_tickets: 1,
            status: DrawingStatus::Active,
            draw_date: i64::MAX,
            created_by: None,
            created_at: 0,
        };
        let result = AvailabilityService::build(drawing, vec![2, 4]);
        assert_eq!(result.sold_tickets, vec![2, 4]);
        assert_eq!(result.available_tickets, vec![1, 3, 5]);
        assert_eq!(result.available_count, 3);
        assert_eq!(result.sold_tickets_count, 2);
    }
}
