//! 预订生命周期集成测试 (内存数据库)

use rifa_server::db::DbService;
use rifa_server::db::models::serde_helpers::record_key;
use rifa_server::db::models::{BuyerInfo, DrawingCreate, ReservationStatus};
use rifa_server::db::repository::{DrawingRepository, TicketLedger};
use rifa_server::tickets::{AvailabilityService, ReservationManager};
use rifa_server::utils::{AppError, time};

const HOUR_MS: i64 = 3_600_000;

async fn setup(total_tickets: u32, min_tickets: u32) -> (DbService, String) {
    let db = DbService::new_in_memory().await.unwrap();
    let drawings = DrawingRepository::new(db.db.clone());
    let drawing = drawings
        .create(DrawingCreate {
            title: "Test drawing".to_string(),
            total_tickets,
            ticket_price: 5.0,
            min_tickets: Some(min_tickets),
            draw_date: time::now_millis() + 24 * HOUR_MS,
            created_by: Some("creator-1".to_string()),
        })
        .await
        .unwrap();
    let id = record_key(drawing.id.as_ref().unwrap());
    (db, id)
}

fn buyer(name: &str) -> BuyerInfo {
    BuyerInfo {
        name: name.to_string(),
        email: format!("{name}@example.com"),
        phone: None,
        account: None,
    }
}

#[tokio::test]
async fn created_drawing_reads_back_with_generated_id() {
    let (db, drawing_id) = setup(10, 1).await;
    let drawings = DrawingRepository::new(db.db.clone());

    let drawing = drawings.get(&drawing_id).await.unwrap();
    assert_eq!(record_key(drawing.id.as_ref().unwrap()), drawing_id);
    assert_eq!(drawing.title, "Test drawing");
    assert_eq!(drawing.total_tickets, 10);
    assert_eq!(drawing.created_by.as_deref(), Some("creator-1"));
}

#[tokio::test]
async fn reserve_marks_numbers_sold() {
    let (db, drawing_id) = setup(10, 1).await;
    let manager = ReservationManager::new(db.db.clone(), HOUR_MS);
    let availability = AvailabilityService::new(db.db.clone());

    let reservation = manager
        .reserve(&drawing_id, buyer("alice"), vec![3, 1, 2])
        .await
        .unwrap();

    // 票号已排序，总价精确
    assert_eq!(reservation.numbers, vec![1, 2, 3]);
    assert_eq!(reservation.total_price, 15.0);
    assert_eq!(reservation.status, ReservationStatus::Pending);

    let avail = availability.get_availability(&drawing_id).await.unwrap();
    assert_eq!(avail.sold_tickets, vec![1, 2, 3]);
    assert_eq!(avail.available_tickets, vec![4, 5, 6, 7, 8, 9, 10]);
}

#[tokio::test]
async fn conflicting_claim_names_every_conflict() {
    let (db, drawing_id) = setup(10, 1).await;
    let manager = ReservationManager::new(db.db.clone(), HOUR_MS);

    manager
        .reserve(&drawing_id, buyer("alice"), vec![1, 5, 7])
        .await
        .unwrap();

    // 部分冲突：全有或全无，列出全部冲突号
    let err = manager
        .reserve(&drawing_id, buyer("bob"), vec![3, 5, 7, 9])
        .await
        .unwrap_err();
    match err {
        AppError::TicketsUnavailable(numbers) => assert_eq!(numbers, vec![5, 7]),
        other => panic!("expected TicketsUnavailable, got {other:?}"),
    }

    // 未冲突的 3 和 9 没有被部分占用
    let availability = AvailabilityService::new(db.db.clone());
    let avail = availability.get_availability(&drawing_id).await.unwrap();
    assert!(avail.available_tickets.contains(&3));
    assert!(avail.available_tickets.contains(&9));
    assert_eq!(avail.sold_tickets, vec![1, 5, 7]);
}

#[tokio::test]
async fn concurrent_reserves_have_exactly_one_winner() {
    let (db, drawing_id) = setup(20, 1).await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let manager = ReservationManager::new(db.db.clone(), HOUR_MS);
        let id = drawing_id.clone();
        handles.push(tokio::spawn(async move {
            manager
                .reserve(&id, buyer(&format!("racer{i}")), vec![10, 11])
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one concurrent claim must win");

    let ledger = TicketLedger::new(db.db.clone());
    let drawing = DrawingRepository::new(db.db.clone())
        .get(&drawing_id)
        .await
        .unwrap();
    let occupied = ledger
        .occupied_numbers(drawing.id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(occupied, vec![10, 11]);
}

#[tokio::test]
async fn expired_hold_releases_all_numbers() {
    let (db, drawing_id) = setup(10, 1).await;
    // 持有窗口为 0：创建即过期
    let manager = ReservationManager::new(db.db.clone(), 0);

    let reservation = manager
        .reserve(&drawing_id, buyer("alice"), vec![4, 5])
        .await
        .unwrap();
    let rid = record_key(reservation.id.as_ref().unwrap());

    let ledger = TicketLedger::new(db.db.clone());
    let swept = ledger.sweep_all(time::now_millis() + 1).await.unwrap();
    assert_eq!(swept, 1);

    // 全量释放，无部分残留
    let availability = AvailabilityService::new(db.db.clone());
    let avail = availability.get_availability(&drawing_id).await.unwrap();
    assert!(avail.sold_tickets.is_empty());

    // 预订行保留作审计，状态 expired
    let (after, _) = ReservationManager::new(db.db.clone(), HOUR_MS)
        .get_reservation(&rid)
        .await
        .unwrap();
    assert_eq!(after.status, ReservationStatus::Expired);

    // 同样的票号可被重新占用
    ReservationManager::new(db.db.clone(), HOUR_MS)
        .reserve(&drawing_id, buyer("bob"), vec![4, 5])
        .await
        .unwrap();
}

#[tokio::test]
async fn read_path_lazily_expires_stale_hold() {
    let (db, drawing_id) = setup(10, 1).await;
    let manager = ReservationManager::new(db.db.clone(), 0);

    let reservation = manager
        .reserve(&drawing_id, buyer("alice"), vec![7])
        .await
        .unwrap();
    let rid = record_key(reservation.id.as_ref().unwrap());

    // 无后台清扫介入：查询自身触发懒清扫
    let (after, _) = manager.get_reservation(&rid).await.unwrap();
    assert_eq!(after.status, ReservationStatus::Expired);
}

#[tokio::test]
async fn below_minimum_purchase_touches_nothing() {
    let (db, drawing_id) = setup(10, 3).await;
    let manager = ReservationManager::new(db.db.clone(), HOUR_MS);

    let err = manager
        .reserve(&drawing_id, buyer("alice"), vec![1, 2])
        .await
        .unwrap_err();
    match err {
        AppError::BelowMinimumPurchase { required, got } => {
            assert_eq!(required, 3);
            assert_eq!(got, 2);
        }
        other => panic!("expected BelowMinimumPurchase, got {other:?}"),
    }

    let availability = AvailabilityService::new(db.db.clone());
    let avail = availability.get_availability(&drawing_id).await.unwrap();
    assert!(avail.sold_tickets.is_empty());
}

#[tokio::test]
async fn invalid_numbers_are_named() {
    let (db, drawing_id) = setup(100, 1).await;
    let manager = ReservationManager::new(db.db.clone(), HOUR_MS);

    // 越界
    let err = manager
        .reserve(&drawing_id, buyer("alice"), vec![0, 5, 200])
        .await
        .unwrap_err();
    match err {
        AppError::InvalidTicketNumber(numbers) => assert_eq!(numbers, vec![0, 200]),
        other => panic!("expected InvalidTicketNumber, got {other:?}"),
    }

    // 重复
    let err = manager
        .reserve(&drawing_id, buyer("alice"), vec![4, 4])
        .await
        .unwrap_err();
    match err {
        AppError::InvalidTicketNumber(numbers) => assert_eq!(numbers, vec![4]),
        other => panic!("expected InvalidTicketNumber, got {other:?}"),
    }

    // 空集
    let err = manager
        .reserve(&drawing_id, buyer("alice"), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn cancel_frees_numbers_immediately() {
    let (db, drawing_id) = setup(10, 1).await;
    let manager = ReservationManager::new(db.db.clone(), HOUR_MS);

    let reservation = manager
        .reserve(&drawing_id, buyer("alice"), vec![8, 9])
        .await
        .unwrap();
    let rid = record_key(reservation.id.as_ref().unwrap());

    let cancelled = manager.cancel_reservation(&rid).await.unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Released);

    let availability = AvailabilityService::new(db.db.clone());
    let avail = availability.get_availability(&drawing_id).await.unwrap();
    assert!(avail.sold_tickets.is_empty());

    // 终态后重复取消被拒
    let err = manager.cancel_reservation(&rid).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn rocksdb_engine_backs_the_same_flow() {
    let dir = tempfile::tempdir().unwrap();
    let db = DbService::new(&dir.path().join("rifa.db")).await.unwrap();

    let drawings = DrawingRepository::new(db.db.clone());
    let drawing = drawings
        .create(DrawingCreate {
            title: "On disk".to_string(),
            total_tickets: 5,
            ticket_price: 1.0,
            min_tickets: None,
            draw_date: time::now_millis() + HOUR_MS,
            created_by: None,
        })
        .await
        .unwrap();
    let drawing_id = record_key(drawing.id.as_ref().unwrap());

    let manager = ReservationManager::new(db.db.clone(), HOUR_MS);
    manager
        .reserve(&drawing_id, buyer("alice"), vec![1, 2])
        .await
        .unwrap();

    let avail = AvailabilityService::new(db.db.clone())
        .get_availability(&drawing_id)
        .await
        .unwrap();
    assert_eq!(avail.sold_tickets, vec![1, 2]);

    // 对外序列化是 camelCase
    let json = serde_json::to_value(&avail).unwrap();
    assert!(json.get("availableTickets").is_some());
    assert!(json.get("soldTicketsCount").is_some());
}

#[tokio::test]
async fn closed_drawing_rejects_reservations() {
    let (db, drawing_id) = setup(10, 1).await;
    let drawings = DrawingRepository::new(db.db.clone());
    drawings
        .set_status(&drawing_id, rifa_server::db::models::DrawingStatus::Cancelled)
        .await
        .unwrap();

    let manager = ReservationManager::new(db.db.clone(), HOUR_MS);
    let err = manager
        .reserve(&drawing_id, buyer("alice"), vec![1])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DrawingClosed(_)));

    // 可用性查询走自己的错误类别
    let availability = AvailabilityService::new(db.db.clone());
    let err = availability.get_availability(&drawing_id).await.unwrap_err();
    assert!(matches!(err, AppError::DrawingNotActive(_)));
}

#[tokio::test]
async fn roster_is_gated_to_creator_or_admin() {
    use axum::extract::{Path, State};
    use axum::http::HeaderMap;
    use rifa_server::api::tickets::handler::drawing_roster;
    use rifa_server::core::{Config, ServerState};
    use rifa_server::payments::MockGateway;
    use std::sync::Arc;

    let (db, drawing_id) = setup(10, 1).await;
    ReservationManager::new(db.db.clone(), HOUR_MS)
        .reserve(&drawing_id, buyer("alice"), vec![2, 3])
        .await
        .unwrap();

    let config = Config {
        admin_token: Some("sesame".to_string()),
        ..Config::default()
    };
    let state = ServerState::new(config, db.db.clone(), Arc::new(MockGateway::new()));

    // 无凭据：拒绝
    let err = drawing_roster(
        State(state.clone()),
        Path(drawing_id.clone()),
        HeaderMap::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // 错误令牌：拒绝
    let mut headers = HeaderMap::new();
    headers.insert("x-admin-token", "wrong".parse().unwrap());
    let err = drawing_roster(State(state.clone()), Path(drawing_id.clone()), headers)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // 创建者：放行，买家信息经 record link 遍历取回
    let mut headers = HeaderMap::new();
    headers.insert("x-requester-account", "creator-1".parse().unwrap());
    let rows = drawing_roster(State(state.clone()), Path(drawing_id.clone()), headers)
        .await
        .unwrap()
        .0;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].number, 2);
    assert_eq!(rows[0].status, "pending");
    assert_eq!(rows[0].buyer_name.as_deref(), Some("alice"));
    assert_eq!(rows[1].buyer_email.as_deref(), Some("alice@example.com"));

    // 管理令牌：放行
    let mut headers = HeaderMap::new();
    headers.insert("x-admin-token", "sesame".parse().unwrap());
    let rows = drawing_roster(State(state), Path(drawing_id), headers)
        .await
        .unwrap()
        .0;
    assert_eq!(rows.len(), 2);
}
