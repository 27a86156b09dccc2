//! Charge Repository
//!
//! 扣款行的创建与查询。record key 即网关 charge id，
//! webhook 按主键直查。状态变更一律走 [`super::TicketLedger`] 的事务接口。

use super::{BaseRepository, LedgerError, LedgerResult};
use crate::db::models::Charge;
use crate::utils::time;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "charge";

#[derive(Clone)]
pub struct ChargeRepository {
    base: BaseRepository,
}

impl ChargeRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// 网关 id → RecordId
    pub fn record_id(gateway_charge_id: &str) -> RecordId {
        RecordId::from_table_key(TABLE, gateway_charge_id)
    }

    /// 创建 pending 扣款行
    ///
    /// `reservation` 必须以 record link 落库，`find_by_reservation`
    /// 按 RecordId 等值比较。
    pub async fn create(
        &self,
        gateway_charge_id: &str,
        reservation: &RecordId,
        amount: f64,
        currency: &str,
    ) -> LedgerResult<Charge> {
        let now = time::now_millis();
        let id = Self::record_id(gateway_charge_id);
        let mut result = self
            .base
            .db()
            .query(
                r#"
                CREATE $id CONTENT {
                    reservation: $rid,
                    amount: $amount,
                    currency: $currency,
                    status: 'pending',
                    created_at: $now,
                    updated_at: $now
                }
                "#,
            )
            .bind(("id", id))
            .bind(("rid", reservation.clone()))
            .bind(("amount", amount))
            .bind(("currency", currency.to_string()))
            .bind(("now", now))
            .await?;
        let created: Vec<Charge> = result.take(0)?;
        created.into_iter().next().ok_or_else(|| {
            LedgerError::Database(format!(
                "Failed to create charge {}",
                gateway_charge_id
            ))
        })
    }

    /// Find charge by gateway id
    pub async fn find_by_gateway_id(&self, gateway_charge_id: &str) -> LedgerResult<Option<Charge>> {
        let charge: Option<Charge> = self
            .base
            .db()
            .select(Self::record_id(gateway_charge_id))
            .await?;
        Ok(charge)
    }

    /// Find charge by gateway id, failing if missing
    pub async fn get(&self, gateway_charge_id: &str) -> LedgerResult<Charge> {
        self.find_by_gateway_id(gateway_charge_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Charge {} not found", gateway_charge_id))
            })
    }

    /// 预订对应的扣款行 (状态查询用)
    pub async fn find_by_reservation(
        &self,
        reservation: &RecordId,
    ) -> LedgerResult<Vec<Charge>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM charge WHERE reservation = $rid ORDER BY created_at")
            .bind(("rid", reservation.clone()))
            .await?;
        let charges: Vec<Charge> = result.take(0)?;
        Ok(charges)
    }
}
