//! Reservation Manager
//!
//! 购买请求的前置校验 + 原子占号。校验按序进行，每一步失败返回
//! 独立的错误；校验全部不触碰 Ledger。占号本身是全有或全无：
//! 任何一个票号冲突，整个请求失败并列出全部冲突号。

use surrealdb::{RecordId, Surreal};
use surrealdb::engine::local::Db;
use uuid::Uuid;

use super::money;
use crate::db::models::{BuyerInfo, Drawing, Reservation, ReservationStatus};
use crate::db::repository::{DrawingRepository, TicketLedger};
use crate::utils::{AppError, AppResult, time};

/// 预订管理器
#[derive(Clone)]
pub struct ReservationManager {
    drawings: DrawingRepository,
    ledger: TicketLedger,
    /// 持有窗口 (millis)，创建时定死，结算时仍以它为准
    hold_window_millis: i64,
}

impl ReservationManager {
    pub fn new(db: Surreal<Db>, hold_window_millis: i64) -> Self {
        Self {
            drawings: DrawingRepository::new(db.clone()),
            ledger: TicketLedger::new(db),
            hold_window_millis,
        }
    }

    /// 占号下单
    ///
    /// 前置校验顺序固定：
    /// 1. 抽奖存在、active、未到开奖 → `DrawingClosed`
    /// 2. 票号非空、无重复、都在 `[1, N]` → `InvalidTicketNumber`
    /// 3. 张数 ≥ 最低购买量 → `BelowMinimumPurchase`
    ///
    /// 成功返回的预订在结算/释放/过期前独占其票号。
    pub async fn reserve(
        &self,
        drawing_id: &str,
        buyer: BuyerInfo,
        numbers: Vec<u32>,
    ) -> AppResult<Reservation> {
        let now = time::now_millis();

        // 1. 抽奖状态
        let drawing = self.drawings.get(drawing_id).await?;
        if !drawing.is_open_for_sales(now) {
            return Err(AppError::DrawingClosed(format!(
                "Drawing {} is not open for sales",
                drawing_id
            )));
        }

        // 2. 票号合法性
        if numbers.is_empty() {
            return Err(AppError::validation("ticketNumbers must not be empty"));
        }
        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        let mut invalid: Vec<u32> = sorted
            .windows(2)
            .filter(|w| w[0] == w[1])
            .map(|w| w[0])
            .collect();
        invalid.extend(
            sorted
                .iter()
                .filter(|&&n| n < 1 || n > drawing.total_tickets),
        );
        if !invalid.is_empty() {
            invalid.sort_unstable();
            invalid.dedup();
            return Err(AppError::InvalidTicketNumber(invalid));
        }

        // 3. 最低购买量
        if (sorted.len() as u32) < drawing.min_tickets {
            return Err(AppError::BelowMinimumPurchase {
                required: drawing.min_tickets,
                got: sorted.len() as u32,
            });
        }

        let total_price = money::total_price(drawing.ticket_price, sorted.len() as u32)?;
        let drawing_thing = drawing
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Drawing record missing id"))?;
        let reservation_id =
            RecordId::from_table_key("reservation", Uuid::new_v4().simple().to_string());
        let expires_at = now + self.hold_window_millis;

        // 4. 原子占号 (事务内先清扫过期持有，冲突回滚并列出全部冲突号)
        let reservation = self
            .ledger
            .claim(
                &drawing_thing,
                &reservation_id,
                &buyer,
                &sorted,
                total_price,
                now,
                expires_at,
            )
            .await?;

        tracing::info!(
            reservation = %reservation_id,
            drawing = %drawing_thing,
            count = sorted.len(),
            total = total_price,
            "Tickets reserved"
        );

        Ok(reservation)
    }

    /// 查询预订；先对其抽奖懒清扫，过期的 pending 读回来就是 expired
    pub async fn get_reservation(&self, id: &str) -> AppResult<(Reservation, Drawing)> {
        let reservation = self
            .ledger
            .find_reservation(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Reservation {} not found", id)))?;

        let now = time::now_millis();
        if reservation.is_expired(now) {
            self.ledger.sweep_drawing(&reservation.drawing, now).await?;
        }

        // 清扫后重读，拿到终态
        let reservation = self
            .ledger
            .find_reservation(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Reservation {} not found", id)))?;
        let drawing = self.drawings.get(&reservation.drawing.to_string()).await?;
        Ok((reservation, drawing))
    }

    /// 买家提前取消仍 pending 的预订，票号立即回归票池
    pub async fn cancel_reservation(&self, id: &str) -> AppResult<Reservation> {
        let reservation = self
            .ledger
            .find_reservation(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Reservation {} not found", id)))?;

        if reservation.status != ReservationStatus::Pending {
            return Err(AppError::conflict(format!(
                "Reservation {} can no longer be cancelled",
                id
            )));
        }

        let rid = reservation
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Reservation record missing id"))?;
        let after = self.ledger.release_pending(&rid).await?;

        match after.status {
            // released: 本次取消或此前的失败释放，两者等价
            ReservationStatus::Released | ReservationStatus::Expired => {
                tracing::info!(reservation = %rid, "Reservation cancelled, tickets released");
                Ok(after)
            }
            // CAS 未命中且状态不是释放类：结算方先赢了
            _ => Err(AppError::conflict(format!(
                "Reservation {} can no longer be cancelled",
                id
            ))),
        }
    }
}
