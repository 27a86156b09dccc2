//! Ticket Ledger
//!
//! 票号/预订/扣款状态的唯一变更入口 (Inventory Ledger)。
//! ReservationManager、ExpirySweeper、SettlementCoordinator 都是写入方，
//! 但全部经由这里的事务接口：
//!
//! - 占号互斥由 `idx_ticket_slot` 唯一索引在事务提交时强制，
//!   冲突时整个事务回滚，不存在部分占用
//! - 所有终态转换是条件更新 (`WHERE status = 'pending'`)，
//!   竞争双方谁先提交谁赢，输方静默跳过
//! - 过期清扫删除 pending 票号行即视为释放，预订行保留作审计

use super::{BaseRepository, LedgerError, LedgerResult};
use crate::db::models::{BuyerInfo, Reservation, ReservationStatus, TicketRecord};
use serde::Deserialize;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

#[derive(Clone)]
pub struct TicketLedger {
    base: BaseRepository,
}

/// 票号行 + 买家信息 (活动创建者查看全量票号用)
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct DrawingTicketRow {
    pub number: u32,
    pub status: String,
    pub buyer_name: Option<String>,
    pub buyer_email: Option<String>,
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

impl TicketLedger {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn db(&self) -> &Surreal<Db> {
        self.base.db()
    }

    // ========================================================================
    // Atomic claim
    // ========================================================================

    /// 原子占号：同一事务内先清扫本抽奖的过期持有，再逐号插入票号行并
    /// 创建预订行。任何一个票号撞上唯一索引，整个事务回滚。
    ///
    /// 冲突时查出请求中所有已被占用的票号，返回
    /// [`LedgerError::TicketsUnavailable`] 列出全部冲突号，调用方可直接换号重试。
    #[allow(clippy::too_many_arguments)]
    pub async fn claim(
        &self,
        drawing: &RecordId,
        reservation_id: &RecordId,
        buyer: &BuyerInfo,
        numbers: &[u32],
        total_price: f64,
        now: i64,
        expires_at: i64,
    ) -> LedgerResult<Reservation> {
        let result = self
            .db()
            .query(
                r#"
                BEGIN TRANSACTION;
                UPDATE reservation SET status = 'expired'
                    WHERE drawing = $drawing AND status = 'pending' AND expires_at <= $now;
                DELETE ticket
                    WHERE drawing = $drawing AND status = 'pending' AND expires_at <= $now;
                FOR $n IN $numbers {
                    CREATE ticket CONTENT {
                        drawing: $drawing,
                        number: $n,
                        reservation: $rid,
                        status: 'pending',
                        expires_at: $expires_at,
                        created_at: $now
                    };
                };
                CREATE $rid CONTENT {
                    drawing: $drawing,
                    numbers: $numbers,
                    buyer: $buyer,
                    total_price: $total_price,
                    status: 'pending',
                    created_at: $now,
                    expires_at: $expires_at
                };
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("drawing", drawing.clone()))
            .bind(("rid", reservation_id.clone()))
            .bind(("numbers", numbers.to_vec()))
            .bind(("buyer", buyer.clone()))
            .bind(("total_price", total_price))
            .bind(("now", now))
            .bind(("expires_at", expires_at))
            .await?;

        if let Err(err) = result.check() {
            // 事务失败：大概率是唯一索引冲突。查出请求中当前被占用的
            // 全部票号；查不出冲突才当数据库错误上报。
            let taken = self.taken_numbers(drawing, numbers).await?;
            if taken.is_empty() {
                return Err(LedgerError::Database(err.to_string()));
            }
            return Err(LedgerError::TicketsUnavailable(taken));
        }

        Ok(Reservation {
            id: Some(reservation_id.clone()),
            drawing: drawing.clone(),
            numbers: numbers.to_vec(),
            buyer: buyer.clone(),
            total_price,
            status: ReservationStatus::Pending,
            created_at: now,
            expires_at,
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// 请求票号中当前已被占用的子集 (已排序)
    pub async fn taken_numbers(
        &self,
        drawing: &RecordId,
        among: &[u32],
    ) -> LedgerResult<Vec<u32>> {
        let mut result = self
            .db()
            .query("SELECT VALUE number FROM ticket WHERE drawing = $drawing AND number IN $numbers")
            .bind(("drawing", drawing.clone()))
            .bind(("numbers", among.to_vec()))
            .await?;
        let mut taken: Vec<u32> = result.take(0)?;
        taken.sort_unstable();
        taken.dedup();
        Ok(taken)
    }

    /// 抽奖当前全部占用票号 (held + settled，已排序)
    pub async fn occupied_numbers(&self, drawing: &RecordId) -> LedgerResult<Vec<u32>> {
        let mut result = self
            .db()
            .query("SELECT VALUE number FROM ticket WHERE drawing = $drawing")
            .bind(("drawing", drawing.clone()))
            .await?;
        let mut numbers: Vec<u32> = result.take(0)?;
        numbers.sort_unstable();
        Ok(numbers)
    }

    /// Find reservation by id ("reservation:key" 或裸 key 均可)
    pub async fn find_reservation(&self, id: &str) -> LedgerResult<Option<Reservation>> {
        let thing: RecordId = if id.contains(':') {
            id.parse()
                .map_err(|_| LedgerError::Validation(format!("Invalid reservation ID: {}", id)))?
        } else {
            RecordId::from_table_key("reservation", id)
        };
        let reservation: Option<Reservation> = self.db().select(thing).await?;
        Ok(reservation)
    }

    /// 预订的票号行
    pub async fn tickets_for_reservation(
        &self,
        reservation: &RecordId,
    ) -> LedgerResult<Vec<TicketRecord>> {
        let mut result = self
            .db()
            .query("SELECT * FROM ticket WHERE reservation = $rid ORDER BY number")
            .bind(("rid", reservation.clone()))
            .await?;
        let tickets: Vec<TicketRecord> = result.take(0)?;
        Ok(tickets)
    }

    /// 抽奖全量票号行 + 买家信息 (record link 遍历到 reservation)
    pub async fn tickets_for_drawing(
        &self,
        drawing: &RecordId,
    ) -> LedgerResult<Vec<DrawingTicketRow>> {
        let mut result = self
            .db()
            .query(
                r#"
                SELECT
                    number,
                    status,
                    reservation.buyer.name AS buyer_name,
                    reservation.buyer.email AS buyer_email,
                    expires_at,
                    created_at
                FROM ticket
                WHERE drawing = $drawing
                ORDER BY number
                "#,
            )
            .bind(("drawing", drawing.clone()))
            .await?;
        let rows: Vec<DrawingTicketRow> = result.take(0)?;
        Ok(rows)
    }

    // ========================================================================
    // Expiry sweep
    // ========================================================================

    /// 清扫单个抽奖的过期持有，返回被转为 expired 的预订数。
    ///
    /// 与结算竞争安全：两条语句都以 pending + 过期为条件，
    /// 已 settled 的预订和已结算的票号行不会被碰到。
    pub async fn sweep_drawing(&self, drawing: &RecordId, now: i64) -> LedgerResult<usize> {
        let stale = self.count_stale(Some(drawing), now).await?;
        self.db()
            .query(
                r#"
                BEGIN TRANSACTION;
                UPDATE reservation SET status = 'expired'
                    WHERE drawing = $drawing AND status = 'pending' AND expires_at <= $now;
                DELETE ticket
                    WHERE drawing = $drawing AND status = 'pending' AND expires_at <= $now;
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("drawing", drawing.clone()))
            .bind(("now", now))
            .await?
            .check()?;
        Ok(stale)
    }

    /// 清扫全部抽奖的过期持有 (定时任务和手动端点用)
    pub async fn sweep_all(&self, now: i64) -> LedgerResult<usize> {
        let stale = self.count_stale(None, now).await?;
        self.db()
            .query(
                r#"
                BEGIN TRANSACTION;
                UPDATE reservation SET status = 'expired'
                    WHERE status = 'pending' AND expires_at <= $now;
                DELETE ticket
                    WHERE status = 'pending' AND expires_at <= $now;
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("now", now))
            .await?
            .check()?;
        Ok(stale)
    }

    /// 过期待清扫的预订数 (信息用途，与清扫本身非原子)
    async fn count_stale(&self, drawing: Option<&RecordId>, now: i64) -> LedgerResult<usize> {
        let mut result = match drawing {
            Some(d) => {
                self.db()
                    .query(
                        "SELECT VALUE id FROM reservation \
                         WHERE drawing = $drawing AND status = 'pending' AND expires_at <= $now",
                    )
                    .bind(("drawing", d.clone()))
                    .bind(("now", now))
                    .await?
            }
            None => {
                self.db()
                    .query(
                        "SELECT VALUE id FROM reservation \
                         WHERE status = 'pending' AND expires_at <= $now",
                    )
                    .bind(("now", now))
                    .await?
            }
        };
        let ids: Vec<RecordId> = result.take(0)?;
        Ok(ids.len())
    }

    // ========================================================================
    // Terminal transitions (settlement / release / refund)
    // ========================================================================

    /// 结算：pending 预订转 settled，票号行永久化，扣款行转 completed。
    /// 预订 CAS 未命中 (清扫方先赢) 时什么都不改。
    ///
    /// 返回事务后的预订状态，调用方据此判断是否输掉竞争。
    pub async fn settle(
        &self,
        reservation_id: &RecordId,
        charge_id: &RecordId,
        now: i64,
    ) -> LedgerResult<Reservation> {
        self.db()
            .query(
                r#"
                BEGIN TRANSACTION;
                LET $res = (UPDATE $rid SET status = 'settled' WHERE status = 'pending' RETURN AFTER);
                IF array::len($res) > 0 {
                    UPDATE ticket SET status = 'settled', expires_at = NONE
                        WHERE reservation = $rid AND status = 'pending';
                    UPDATE $cid SET status = 'completed', updated_at = $now
                        WHERE status = 'pending';
                };
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("rid", reservation_id.clone()))
            .bind(("cid", charge_id.clone()))
            .bind(("now", now))
            .await?
            .check()?;

        let reservation: Option<Reservation> = self.db().select(reservation_id.clone()).await?;
        reservation.ok_or_else(|| {
            LedgerError::NotFound(format!("Reservation {} not found", reservation_id))
        })
    }

    /// 失败释放：扣款行转 failed，pending 预订转 released，票号行删除。
    /// 任一 CAS 未命中都静默跳过，重复调用是 no-op。
    pub async fn release_on_failure(
        &self,
        reservation_id: &RecordId,
        charge_id: &RecordId,
        now: i64,
    ) -> LedgerResult<()> {
        self.db()
            .query(
                r#"
                BEGIN TRANSACTION;
                UPDATE $cid SET status = 'failed', updated_at = $now WHERE status = 'pending';
                LET $res = (UPDATE $rid SET status = 'released' WHERE status = 'pending' RETURN AFTER);
                IF array::len($res) > 0 {
                    DELETE ticket WHERE reservation = $rid;
                };
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("rid", reservation_id.clone()))
            .bind(("cid", charge_id.clone()))
            .bind(("now", now))
            .await?
            .check()?;
        Ok(())
    }

    /// 买家主动取消：pending 预订转 released 并删除票号行，无扣款参与
    pub async fn release_pending(&self, reservation_id: &RecordId) -> LedgerResult<Reservation> {
        self.db()
            .query(
                r#"
                BEGIN TRANSACTION;
                LET $res = (UPDATE $rid SET status = 'released' WHERE status = 'pending' RETURN AFTER);
                IF array::len($res) > 0 {
                    DELETE ticket WHERE reservation = $rid;
                };
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("rid", reservation_id.clone()))
            .await?
            .check()?;

        let reservation: Option<Reservation> = self.db().select(reservation_id.clone()).await?;
        reservation.ok_or_else(|| {
            LedgerError::NotFound(format!("Reservation {} not found", reservation_id))
        })
    }

    /// 退款：completed 扣款转 refunded，settled 预订转 released，
    /// 票号行删除回归票池。扣款 CAS 未命中时不碰预订。
    pub async fn refund_settled(
        &self,
        reservation_id: &RecordId,
        charge_id: &RecordId,
        now: i64,
    ) -> LedgerResult<()> {
        self.db()
            .query(
                r#"
                BEGIN TRANSACTION;
                LET $c = (UPDATE $cid SET status = 'refunded', updated_at = $now
                    WHERE status = 'completed' RETURN AFTER);
                IF array::len($c) > 0 {
                    UPDATE $rid SET status = 'released' WHERE status = 'settled';
                    DELETE ticket WHERE reservation = $rid;
                };
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("rid", reservation_id.clone()))
            .bind(("cid", charge_id.clone()))
            .bind(("now", now))
            .await?
            .check()?;
        Ok(())
    }

    /// 失落竞争对账：网关已扣款但持有已过期，网关侧退款后把
    /// pending 扣款直接标记 refunded
    pub async fn mark_charge_refunded_after_lost_race(
        &self,
        charge_id: &RecordId,
        now: i64,
    ) -> LedgerResult<()> {
        self.db()
            .query("UPDATE $cid SET status = 'refunded', updated_at = $now WHERE status = 'pending'")
            .bind(("cid", charge_id.clone()))
            .bind(("now", now))
            .await?
            .check()?;
        Ok(())
    }

    /// 过期未执行的扣款标记 failed (网关侧尚未捕获资金)
    pub async fn mark_charge_failed(&self, charge_id: &RecordId, now: i64) -> LedgerResult<()> {
        self.db()
            .query("UPDATE $cid SET status = 'failed', updated_at = $now WHERE status = 'pending'")
            .bind(("cid", charge_id.clone()))
            .bind(("now", now))
            .await?
            .check()?;
        Ok(())
    }
}
