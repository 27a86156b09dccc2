//! Drawing Repository
//!
//! 抽奖活动参考数据。引擎侧只读；create/set_status 供外部活动管理
//! 协作方和测试播种使用。

use super::{BaseRepository, LedgerError, LedgerResult};
use crate::db::models::{Drawing, DrawingCreate, DrawingStatus};
use crate::utils::time;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};
use uuid::Uuid;

const TABLE: &str = "drawing";

#[derive(Clone)]
pub struct DrawingRepository {
    base: BaseRepository,
}

impl DrawingRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// "drawing:key" 或裸 key → RecordId
    fn record_id(id: &str) -> LedgerResult<RecordId> {
        if id.contains(':') {
            id.parse()
                .map_err(|_| LedgerError::Validation(format!("Invalid drawing ID: {}", id)))
        } else {
            Ok(RecordId::from_table_key(TABLE, id))
        }
    }

    /// Find drawing by id
    pub async fn find_by_id(&self, id: &str) -> LedgerResult<Option<Drawing>> {
        let drawing: Option<Drawing> = self.base.db().select(Self::record_id(id)?).await?;
        Ok(drawing)
    }

    /// Find drawing by id, failing if missing
    pub async fn get(&self, id: &str) -> LedgerResult<Drawing> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Drawing {} not found", id)))
    }

    /// Create a new drawing
    pub async fn create(&self, data: DrawingCreate) -> LedgerResult<Drawing> {
        if data.total_tickets == 0 || data.total_tickets > 1_000_000 {
            return Err(LedgerError::Validation(format!(
                "total_tickets must be in [1, 1000000], got {}",
                data.total_tickets
            )));
        }
        if !data.ticket_price.is_finite() || data.ticket_price <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "ticket_price must be positive, got {}",
                data.ticket_price
            )));
        }
        let now = time::now_millis();
        if data.draw_date <= now {
            return Err(LedgerError::Validation(
                "draw_date must be in the future".to_string(),
            ));
        }
        let min_tickets = data.min_tickets.unwrap_or(1).max(1);
        if min_tickets > data.total_tickets {
            return Err(LedgerError::Validation(format!(
                "min_tickets ({}) exceeds total_tickets ({})",
                min_tickets, data.total_tickets
            )));
        }

        let id = RecordId::from_table_key(TABLE, Uuid::new_v4().simple().to_string());
        // id 由 create 目标指定，CONTENT 内不可再携带
        let drawing = Drawing {
            id: None,
            title: data.title,
            total_tickets: data.total_tickets,
            ticket_price: data.ticket_price,
            min_tickets,
            status: DrawingStatus::Active,
            draw_date: data.draw_date,
            created_by: data.created_by,
            created_at: now,
        };

        let created: Option<Drawing> = self.base.db().create(id).content(drawing).await?;
        created.ok_or_else(|| LedgerError::Database("Failed to create drawing".to_string()))
    }

    /// 状态流转由外部管理方驱动 (completed / cancelled)
    pub async fn set_status(&self, id: &str, status: DrawingStatus) -> LedgerResult<Drawing> {
        let thing = Self::record_id(id)?;
        let mut result = self
            .base
            .db()
            .query("UPDATE $thing SET status = $status RETURN AFTER")
            .bind(("thing", thing))
            .bind(("status", status))
            .await?;
        let drawings: Vec<Drawing> = result.take(0)?;
        drawings
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::NotFound(format!("Drawing {} not found", id)))
    }
}
