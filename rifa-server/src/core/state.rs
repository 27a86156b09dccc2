use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::core::Config;
use crate::db::DbService;
use crate::db::repository::{ChargeRepository, DrawingRepository, TicketLedger};
use crate::payments::{HttpGateway, MockGateway, PaymentGateway, SettlementCoordinator};
use crate::tickets::{AvailabilityService, ReservationManager};

/// 服务器状态 - 持有数据库句柄和网关的共享引用
///
/// 使用 Arc / SurrealDB 句柄的浅拷贝，Clone 成本极低。
/// 各业务服务按需从这里构造，它们内部只持有同一个数据库句柄。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | Surreal<Db> | 嵌入式数据库 |
/// | gateway | Arc<dyn PaymentGateway> | 支付网关 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 嵌入式数据库 (SurrealDB)
    pub db: Surreal<Db>,
    /// 支付网关 (mock 或 http)
    pub gateway: Arc<dyn PaymentGateway>,
}

impl ServerState {
    /// 创建服务器状态 (手动构造，测试和 [`initialize()`] 使用)
    pub fn new(config: Config, db: Surreal<Db>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            config,
            db,
            gateway,
        }
    }

    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/rifa.db)
    /// 3. 支付网关 (按 GATEWAY_MODE 选择实现)
    pub async fn initialize(config: &Config) -> anyhow::Result<Self> {
        config.ensure_work_dir_structure()?;

        let db_path = config.database_dir().join("rifa.db");
        let db_service = DbService::new(&db_path).await?;

        let gateway: Arc<dyn PaymentGateway> = match config.gateway_mode.as_str() {
            "http" => {
                tracing::info!(url = %config.gateway_base_url, "Using HTTP payment gateway");
                Arc::new(HttpGateway::new(
                    config.gateway_base_url.clone(),
                    config.gateway_timeout(),
                ))
            }
            _ => {
                tracing::info!("Using mock payment gateway");
                Arc::new(MockGateway::new())
            }
        };

        Ok(Self::new(config.clone(), db_service.db, gateway))
    }

    /// 获取数据库实例
    pub fn get_db(&self) -> Surreal<Db> {
        self.db.clone()
    }

    // ========== 业务服务构造 ==========

    pub fn availability(&self) -> AvailabilityService {
        AvailabilityService::new(self.db.clone())
    }

    pub fn reservations(&self) -> ReservationManager {
        ReservationManager::new(self.db.clone(), self.config.hold_window_millis())
    }

    pub fn settlement(&self) -> SettlementCoordinator {
        SettlementCoordinator::new(
            self.db.clone(),
            self.gateway.clone(),
            self.config.currency.clone(),
        )
    }

    pub fn ledger(&self) -> TicketLedger {
        TicketLedger::new(self.db.clone())
    }

    pub fn drawings(&self) -> DrawingRepository {
        DrawingRepository::new(self.db.clone())
    }

    pub fn charges(&self) -> ChargeRepository {
        ChargeRepository::new(self.db.clone())
    }
}
