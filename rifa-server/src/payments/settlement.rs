//! Settlement Coordinator
//!
//! 驱动预订/扣款对走完状态机：`pending → {settled, released}`，
//! 终态后一切重复事件都是 no-op。
//!
//! 关键原则 (完整性优先)：网关确认过的扣款绝不允许落成未结算或
//! 重复占号的票——拿不准时宁可退款，也不少分配或多分配。
//! 持有窗口是权威时限：即使网关往返超过了它，结算前都要重查。

use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::gateway::{CreateChargeRequest, GatewayError, PaymentGateway};
use crate::db::models::{Charge, ChargeStatus, Reservation, ReservationStatus};
use crate::db::repository::{ChargeRepository, DrawingRepository, TicketLedger};
use crate::tickets::money;
use crate::utils::{AppError, AppResult, time};

/// begin_charge 的返回：交给前端跳转网关审批
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeHandle {
    pub charge_id: String,
    pub approval_url: String,
    pub amount: f64,
    pub currency: String,
}

/// 网关异步事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEventKind {
    ChargeCompleted,
    ChargeFailed,
    ChargeRefunded,
}

impl GatewayEventKind {
    /// webhook 事件名解析；未知类型返回 None，由处理器确认收到但不动账
    pub fn parse(event_type: &str) -> Option<Self> {
        match event_type {
            "charge.completed" => Some(Self::ChargeCompleted),
            "charge.failed" => Some(Self::ChargeFailed),
            "charge.refunded" => Some(Self::ChargeRefunded),
            _ => None,
        }
    }
}

/// 网关异步事件
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub kind: GatewayEventKind,
    pub charge_id: String,
}

/// 结算协调器
#[derive(Clone)]
pub struct SettlementCoordinator {
    drawings: DrawingRepository,
    ledger: TicketLedger,
    charges: ChargeRepository,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl SettlementCoordinator {
    pub fn new(db: Surreal<Db>, gateway: Arc<dyn PaymentGateway>, currency: String) -> Self {
        Self {
            drawings: DrawingRepository::new(db.clone()),
            ledger: TicketLedger::new(db.clone()),
            charges: ChargeRepository::new(db),
            gateway,
            currency,
        }
    }

    // ========================================================================
    // BeginCharge
    // ========================================================================

    /// 为 pending 预订创建网关扣款，返回审批跳转句柄。
    ///
    /// 失败：持有已过期 (`ReservationExpired`)、网关不可达
    /// (`GatewayUnavailable`，可重试，不会留下超出自然过期的持有)。
    pub async fn begin_charge(
        &self,
        reservation_id: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> AppResult<ChargeHandle> {
        let reservation = self.require_reservation(reservation_id).await?;
        let now = time::now_millis();

        match reservation.status {
            ReservationStatus::Pending if reservation.expires_at > now => {}
            ReservationStatus::Settled => {
                return Err(AppError::conflict(format!(
                    "Reservation {} is already settled",
                    reservation_id
                )));
            }
            _ => {
                return Err(AppError::ReservationExpired(format!(
                    "Reservation {} has expired",
                    reservation_id
                )));
            }
        }

        let rid = reservation
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Reservation record missing id"))?;

        // 同一预订不允许并挂多个未终结的扣款
        let existing = self.charges.find_by_reservation(&rid).await?;
        if let Some(open) = existing
            .iter()
            .find(|c| !c.status.is_terminal() || c.status == ChargeStatus::Completed)
        {
            return Err(AppError::conflict(format!(
                "Reservation {} already has charge {}",
                reservation_id,
                open.gateway_id()
            )));
        }

        let drawing = self.drawings.get(&reservation.drawing.to_string()).await?;
        let created = self
            .gateway
            .create_charge(CreateChargeRequest {
                amount: reservation.total_price,
                currency: self.currency.clone(),
                description: format!(
                    "{} ticket(s) for drawing: {}",
                    reservation.numbers.len(),
                    drawing.title
                ),
                return_url: return_url.to_string(),
                cancel_url: cancel_url.to_string(),
            })
            .await
            .map_err(map_gateway_error)?;

        let charge = self
            .charges
            .create(
                &created.charge_id,
                &rid,
                reservation.total_price,
                &self.currency,
            )
            .await?;

        tracing::info!(
            charge = %created.charge_id,
            reservation = %rid,
            amount = charge.amount,
            "Gateway charge created"
        );

        Ok(ChargeHandle {
            charge_id: created.charge_id,
            approval_url: created.approval_url,
            amount: charge.amount,
            currency: charge.currency,
        })
    }

    // ========================================================================
    // CompleteCharge
    // ========================================================================

    /// 买家网关侧审批后执行扣款并结算。
    ///
    /// 结算前重查持有：网关往返可能比持有窗口还长，过期就回滚网关侧
    /// 扣款 (标记 failed，不结算)。执行成功后结算 CAS 输给清扫方时，
    /// 对账方向是退款，绝不把已被别人占走的票号判给本单。
    pub async fn complete_charge(
        &self,
        charge_id: &str,
        approval_token: &str,
    ) -> AppResult<Reservation> {
        let charge = self.charges.get(charge_id).await?;
        let reservation = self
            .require_reservation(&charge.reservation.to_string())
            .await?;

        // 幂等：重复 complete 直接返回既有结果
        match charge.status {
            ChargeStatus::Pending => {}
            ChargeStatus::Completed => return Ok(reservation),
            ChargeStatus::Failed | ChargeStatus::Refunded => {
                return Err(AppError::conflict(format!(
                    "Charge {} is already {:?}",
                    charge_id, charge.status
                )));
            }
        }

        let now = time::now_millis();
        let rid = reservation
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Reservation record missing id"))?;
        let cid = ChargeRepository::record_id(charge_id);

        // 持有窗口权威：过期则放弃，资金尚未捕获，仅本地标记
        if reservation.status != ReservationStatus::Pending || reservation.expires_at <= now {
            self.ledger.mark_charge_failed(&cid, now).await?;
            self.ledger.sweep_drawing(&reservation.drawing, now).await?;
            return Err(AppError::ReservationExpired(format!(
                "Reservation {} expired before payment completion",
                rid
            )));
        }

        // 网关执行 (资金捕获点)
        match self.gateway.execute_charge(charge_id, approval_token).await {
            Ok(()) => {}
            Err(GatewayError::Transport(msg)) => {
                // 未捕获资金，扣款保持 pending，调用方可重试
                return Err(AppError::GatewayUnavailable(msg));
            }
            Err(GatewayError::Rejected(msg)) => {
                self.ledger.release_on_failure(&rid, &cid, now).await?;
                tracing::warn!(charge = %charge_id, reservation = %rid, "Gateway rejected charge");
                return Err(AppError::PaymentFailed(msg));
            }
        }

        self.settle_or_reconcile(&rid, charge_id, charge.amount).await
    }

    /// 结算；CAS 输给清扫方时退款对账
    async fn settle_or_reconcile(
        &self,
        rid: &surrealdb::RecordId,
        charge_id: &str,
        amount: f64,
    ) -> AppResult<Reservation> {
        let now = time::now_millis();
        let cid = ChargeRepository::record_id(charge_id);
        let after = self.ledger.settle(rid, &cid, now).await?;

        if after.status == ReservationStatus::Settled {
            tracing::info!(
                charge = %charge_id,
                reservation = %rid,
                "Charge completed, reservation settled"
            );
            return Ok(after);
        }

        // 失落竞争：清扫方先把持有判了过期，票号可能已被他人占走。
        // 网关侧已捕获资金 → 退款，本地扣款标记 refunded。
        tracing::error!(
            charge = %charge_id,
            reservation = %rid,
            status = ?after.status,
            "Settlement lost race with expiry sweep, refunding gateway charge"
        );
        let amount = money::round_amount(amount).unwrap_or(amount);
        if let Err(e) = self
            .gateway
            .refund_charge(charge_id, amount, &self.currency)
            .await
        {
            // 退款失败只能记录，留待人工/重试对账
            tracing::error!(charge = %charge_id, error = %e, "Reconciliation refund failed");
        }
        self.ledger
            .mark_charge_refunded_after_lost_race(&cid, now)
            .await?;

        Err(AppError::ReservationExpired(format!(
            "Reservation {} expired during payment, charge refunded",
            rid
        )))
    }

    // ========================================================================
    // HandleGatewayEvent (webhook)
    // ========================================================================

    /// webhook 路径：按网关 id 找扣款并施加同样的终态转换。
    /// 同一事件重复投递安全：扣款已在终态则确认收到且不再动账。
    pub async fn handle_gateway_event(&self, event: GatewayEvent) -> AppResult<()> {
        let charge = self.charges.get(&event.charge_id).await?;

        if charge.status.is_terminal() {
            tracing::debug!(
                charge = %event.charge_id,
                status = ?charge.status,
                "Duplicate gateway event ignored"
            );
            return Ok(());
        }

        let reservation = self
            .require_reservation(&charge.reservation.to_string())
            .await?;
        let rid = reservation
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Reservation record missing id"))?;
        let cid = ChargeRepository::record_id(&event.charge_id);
        let now = time::now_millis();

        match event.kind {
            GatewayEventKind::ChargeCompleted => {
                // 事件断言资金已捕获；过期/失落竞争走退款对账
                if reservation.status != ReservationStatus::Pending
                    || reservation.expires_at <= now
                {
                    tracing::error!(
                        charge = %event.charge_id,
                        reservation = %rid,
                        "Completed event for expired reservation, refunding"
                    );
                    if let Err(e) = self
                        .gateway
                        .refund_charge(&event.charge_id, charge.amount, &charge.currency)
                        .await
                    {
                        tracing::error!(charge = %event.charge_id, error = %e, "Reconciliation refund failed");
                    }
                    self.ledger
                        .mark_charge_refunded_after_lost_race(&cid, now)
                        .await?;
                    return Ok(());
                }
                match self
                    .settle_or_reconcile(&rid, &event.charge_id, charge.amount)
                    .await
                {
                    Ok(_) | Err(AppError::ReservationExpired(_)) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            GatewayEventKind::ChargeFailed => {
                self.ledger.release_on_failure(&rid, &cid, now).await?;
                tracing::info!(charge = %event.charge_id, "Charge failed, tickets released");
                Ok(())
            }
            GatewayEventKind::ChargeRefunded => {
                // 网关侧已退款：先标记 refunded 再释放，
                // 后面的 failed CAS 撞上 refunded 终态会静默跳过
                self.ledger
                    .mark_charge_refunded_after_lost_race(&cid, now)
                    .await?;
                self.ledger.release_on_failure(&rid, &cid, now).await?;
                tracing::info!(charge = %event.charge_id, "Charge refunded via webhook");
                Ok(())
            }
        }
    }

    // ========================================================================
    // RefundCharge
    // ========================================================================

    /// 退款 completed 扣款，票号回归票池
    pub async fn refund_charge(&self, charge_id: &str) -> AppResult<()> {
        let charge = self.charges.get(charge_id).await?;
        if charge.status != ChargeStatus::Completed {
            return Err(AppError::ChargeNotRefundable(format!(
                "Charge {} is {:?}, only completed charges can be refunded",
                charge_id, charge.status
            )));
        }

        let amount = money::round_amount(charge.amount)?;
        match self
            .gateway
            .refund_charge(charge_id, amount, &charge.currency)
            .await
        {
            Ok(refund_id) => {
                tracing::info!(charge = %charge_id, refund = %refund_id, "Gateway refund issued");
            }
            Err(GatewayError::Transport(msg)) => {
                return Err(AppError::GatewayUnavailable(msg));
            }
            Err(GatewayError::Rejected(msg)) => {
                return Err(AppError::internal(format!(
                    "Gateway refused refund for {}: {}",
                    charge_id, msg
                )));
            }
        }

        let now = time::now_millis();
        let cid = ChargeRepository::record_id(charge_id);
        self.ledger
            .refund_settled(&charge.reservation, &cid, now)
            .await?;

        tracing::info!(
            charge = %charge_id,
            reservation = %charge.reservation,
            "Charge refunded, tickets returned to pool"
        );
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// 扣款 + 关联预订 (状态端点用)
    pub async fn charge_status(&self, charge_id: &str) -> AppResult<(Charge, Reservation)> {
        let charge = self.charges.get(charge_id).await?;
        let reservation = self
            .require_reservation(&charge.reservation.to_string())
            .await?;
        Ok((charge, reservation))
    }

    async fn require_reservation(&self, id: &str) -> AppResult<Reservation> {
        self.ledger
            .find_reservation(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Reservation {} not found", id)))
    }
}

fn map_gateway_error(err: GatewayError) -> AppError {
    match err {
        GatewayError::Transport(msg) => AppError::GatewayUnavailable(msg),
        GatewayError::Rejected(msg) => AppError::PaymentFailed(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_event_types() {
        assert_eq!(
            GatewayEventKind::parse("charge.completed"),
            Some(GatewayEventKind::ChargeCompleted)
        );
        assert_eq!(
            GatewayEventKind::parse("charge.failed"),
            Some(GatewayEventKind::ChargeFailed)
        );
        assert_eq!(
            GatewayEventKind::parse("charge.refunded"),
            Some(GatewayEventKind::ChargeRefunded)
        );
        assert_eq!(GatewayEventKind::parse("payout.created"), None);
    }
}
