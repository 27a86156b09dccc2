//! 结算/退款生命周期集成测试 (内存数据库 + mock 网关)

use std::sync::Arc;
use std::time::Duration;

use rifa_server::db::DbService;
use rifa_server::db::models::serde_helpers::record_key;
use rifa_server::db::models::{
    BuyerInfo, ChargeStatus, DrawingCreate, ReservationStatus, TicketStatus,
};
use rifa_server::db::repository::{ChargeRepository, DrawingRepository, TicketLedger};
use rifa_server::payments::{GatewayEvent, GatewayEventKind, MockGateway, SettlementCoordinator};
use rifa_server::tickets::{AvailabilityService, ReservationManager};
use rifa_server::utils::{AppError, time};

const HOUR_MS: i64 = 3_600_000;

struct Harness {
    db: DbService,
    drawing_id: String,
    gateway: Arc<MockGateway>,
    coordinator: SettlementCoordinator,
}

impl Harness {
    async fn new() -> Self {
        let db = DbService::new_in_memory().await.unwrap();
        let drawings = DrawingRepository::new(db.db.clone());
        let drawing = drawings
            .create(DrawingCreate {
                title: "Settlement drawing".to_string(),
                total_tickets: 20,
                ticket_price: 2.5,
                min_tickets: Some(1),
                draw_date: time::now_millis() + 24 * HOUR_MS,
                created_by: None,
            })
            .await
            .unwrap();
        let drawing_id = record_key(drawing.id.as_ref().unwrap());

        let gateway = Arc::new(MockGateway::new());
        let coordinator =
            SettlementCoordinator::new(db.db.clone(), gateway.clone(), "USD".to_string());

        Self {
            db,
            drawing_id,
            gateway,
            coordinator,
        }
    }

    async fn reserve(&self, numbers: Vec<u32>, hold_ms: i64) -> String {
        let manager = ReservationManager::new(self.db.db.clone(), hold_ms);
        let reservation = manager
            .reserve(
                &self.drawing_id,
                BuyerInfo {
                    name: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    phone: None,
                    account: None,
                },
                numbers,
            )
            .await
            .unwrap();
        record_key(reservation.id.as_ref().unwrap())
    }

    async fn begin(&self, reservation_id: &str) -> String {
        self.coordinator
            .begin_charge(
                reservation_id,
                "http://localhost/return",
                "http://localhost/cancel",
            )
            .await
            .unwrap()
            .charge_id
    }

    async fn charge_status(&self, charge_id: &str) -> ChargeStatus {
        ChargeRepository::new(self.db.db.clone())
            .get(charge_id)
            .await
            .unwrap()
            .status
    }

    async fn reservation_status(&self, reservation_id: &str) -> ReservationStatus {
        TicketLedger::new(self.db.db.clone())
            .find_reservation(reservation_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    async fn sold_numbers(&self) -> Vec<u32> {
        AvailabilityService::new(self.db.db.clone())
            .get_availability(&self.drawing_id)
            .await
            .unwrap()
            .sold_tickets
    }
}

#[tokio::test]
async fn happy_path_settles_reservation() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![1, 2, 3], HOUR_MS).await;

    let charge_id = h.begin(&rid).await;
    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Pending);

    let settled = h
        .coordinator
        .complete_charge(&charge_id, "approval-token")
        .await
        .unwrap();
    assert_eq!(settled.status, ReservationStatus::Settled);
    assert!(h.gateway.is_executed(&charge_id));
    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Completed);

    // 已结算的票号保持占用，票号行永久化 (不再带过期时间)
    assert_eq!(h.sold_numbers().await, vec![1, 2, 3]);
    let ledger = TicketLedger::new(h.db.db.clone());
    let reservation = ledger.find_reservation(&rid).await.unwrap().unwrap();
    let tickets = ledger
        .tickets_for_reservation(reservation.id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(tickets.len(), 3);
    assert!(
        tickets
            .iter()
            .all(|t| t.status == TicketStatus::Settled && t.expires_at.is_none())
    );

    // 状态端点看到的是同一事实
    let (charge, reservation) = h.coordinator.charge_status(&charge_id).await.unwrap();
    assert_eq!(charge.status, ChargeStatus::Completed);
    assert_eq!(reservation.status, ReservationStatus::Settled);
}

#[tokio::test]
async fn duplicate_completion_is_idempotent() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![4], HOUR_MS).await;
    let charge_id = h.begin(&rid).await;

    h.coordinator
        .complete_charge(&charge_id, "token")
        .await
        .unwrap();

    // 重复 complete：直接返回既有结果，不再动账
    let again = h
        .coordinator
        .complete_charge(&charge_id, "token")
        .await
        .unwrap();
    assert_eq!(again.status, ReservationStatus::Settled);

    // 重复 webhook：终态 no-op
    h.coordinator
        .handle_gateway_event(GatewayEvent {
            kind: GatewayEventKind::ChargeCompleted,
            charge_id: charge_id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Completed);
    assert_eq!(h.reservation_status(&rid).await, ReservationStatus::Settled);
}

#[tokio::test]
async fn gateway_rejection_releases_tickets() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![5, 6], HOUR_MS).await;
    let charge_id = h.begin(&rid).await;

    h.gateway.set_fail_execute(true);
    let err = h
        .coordinator
        .complete_charge(&charge_id, "token")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PaymentFailed(_)));

    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Failed);
    assert_eq!(h.reservation_status(&rid).await, ReservationStatus::Released);
    assert!(h.sold_numbers().await.is_empty());
}

#[tokio::test]
async fn transport_failure_keeps_charge_retryable() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![7], HOUR_MS).await;
    let charge_id = h.begin(&rid).await;

    h.gateway.set_fail_transport(true);
    let err = h
        .coordinator
        .complete_charge(&charge_id, "token")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GatewayUnavailable(_)));

    // 资金未捕获，扣款保持 pending，持有不变，可重试
    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Pending);
    assert_eq!(h.reservation_status(&rid).await, ReservationStatus::Pending);

    h.gateway.set_fail_transport(false);
    let settled = h
        .coordinator
        .complete_charge(&charge_id, "token")
        .await
        .unwrap();
    assert_eq!(settled.status, ReservationStatus::Settled);
}

#[tokio::test]
async fn expired_hold_fails_completion_without_settling() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![8, 9], 80).await;
    let charge_id = h.begin(&rid).await;

    tokio::time::sleep(Duration::from_millis(150)).await;

    let err = h
        .coordinator
        .complete_charge(&charge_id, "token")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ReservationExpired(_)));

    // 网关从未执行，本地扣款 failed，票号回归票池
    assert!(!h.gateway.is_executed(&charge_id));
    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Failed);
    assert_eq!(h.reservation_status(&rid).await, ReservationStatus::Expired);
    assert!(h.sold_numbers().await.is_empty());
}

#[tokio::test]
async fn completed_event_after_sweep_refunds_instead_of_settling() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![10], 80).await;
    let charge_id = h.begin(&rid).await;

    // 清扫方先赢：持有过期，票号已释放
    tokio::time::sleep(Duration::from_millis(150)).await;
    TicketLedger::new(h.db.db.clone())
        .sweep_all(time::now_millis())
        .await
        .unwrap();
    assert_eq!(h.reservation_status(&rid).await, ReservationStatus::Expired);

    // 迟到的 completed 事件：退款对账，绝不结算
    h.coordinator
        .handle_gateway_event(GatewayEvent {
            kind: GatewayEventKind::ChargeCompleted,
            charge_id: charge_id.clone(),
        })
        .await
        .unwrap();

    assert!(h.gateway.is_refunded(&charge_id));
    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Refunded);
    assert_eq!(h.reservation_status(&rid).await, ReservationStatus::Expired);
    assert!(h.sold_numbers().await.is_empty());
}

#[tokio::test]
async fn failed_event_releases_tickets() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![11, 12], HOUR_MS).await;
    let charge_id = h.begin(&rid).await;

    h.coordinator
        .handle_gateway_event(GatewayEvent {
            kind: GatewayEventKind::ChargeFailed,
            charge_id: charge_id.clone(),
        })
        .await
        .unwrap();

    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Failed);
    assert_eq!(h.reservation_status(&rid).await, ReservationStatus::Released);
    assert!(h.sold_numbers().await.is_empty());
}

#[tokio::test]
async fn refund_returns_numbers_to_pool() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![13, 14], HOUR_MS).await;
    let charge_id = h.begin(&rid).await;
    h.coordinator
        .complete_charge(&charge_id, "token")
        .await
        .unwrap();

    h.coordinator.refund_charge(&charge_id).await.unwrap();

    assert!(h.gateway.is_refunded(&charge_id));
    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Refunded);
    assert_eq!(h.reservation_status(&rid).await, ReservationStatus::Released);
    assert!(h.sold_numbers().await.is_empty());

    // 票号可被重新占用
    h.reserve(vec![13, 14], HOUR_MS).await;
}

#[tokio::test]
async fn only_completed_charges_are_refundable() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![15], HOUR_MS).await;
    let charge_id = h.begin(&rid).await;

    let err = h.coordinator.refund_charge(&charge_id).await.unwrap_err();
    assert!(matches!(err, AppError::ChargeNotRefundable(_)));
    assert_eq!(h.charge_status(&charge_id).await, ChargeStatus::Pending);
}

#[tokio::test]
async fn charge_row_links_back_to_reservation() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![19], HOUR_MS).await;
    let charge_id = h.begin(&rid).await;

    // reservation 字段是 record link：按 RecordId 查询必须命中
    let ledger = TicketLedger::new(h.db.db.clone());
    let reservation = ledger.find_reservation(&rid).await.unwrap().unwrap();
    let charges = ChargeRepository::new(h.db.db.clone())
        .find_by_reservation(reservation.id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].gateway_id(), charge_id);
    assert_eq!(record_key(&charges[0].reservation), rid);
    assert_eq!(charges[0].status, ChargeStatus::Pending);
}

#[tokio::test]
async fn begin_charge_rejects_expired_and_duplicate() {
    let h = Harness::new().await;

    // 过期持有不可开始支付
    let rid = h.reserve(vec![16], 0).await;
    let err = h
        .coordinator
        .begin_charge(&rid, "http://l/r", "http://l/c")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ReservationExpired(_)));

    // 同一预订不允许并挂两个扣款
    let rid = h.reserve(vec![17], HOUR_MS).await;
    h.begin(&rid).await;
    let err = h
        .coordinator
        .begin_charge(&rid, "http://l/r", "http://l/c")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn transport_failure_during_begin_leaves_no_charge() {
    let h = Harness::new().await;
    let rid = h.reserve(vec![18], HOUR_MS).await;

    h.gateway.set_fail_transport(true);
    let err = h
        .coordinator
        .begin_charge(&rid, "http://l/r", "http://l/c")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GatewayUnavailable(_)));

    let ledger = TicketLedger::new(h.db.db.clone());
    let reservation = ledger.find_reservation(&rid).await.unwrap().unwrap();
    let charges = ChargeRepository::new(h.db.db.clone())
        .find_by_reservation(reservation.id.as_ref().unwrap())
        .await
        .unwrap();
    assert!(charges.is_empty());

    // 持有原样保留，恢复后可正常支付
    h.gateway.set_fail_transport(false);
    h.begin(&rid).await;
}
