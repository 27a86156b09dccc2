//! Rifa Server - 抽奖票务预订与结算引擎
//!
//! # 架构概述
//!
//! 固定票池 `[1, N]` 的抽奖售票引擎，提供以下核心功能：
//!
//! - **票务** (`tickets`): 可用性查询、原子占号、过期清扫
//! - **结算** (`payments`): 支付网关抽象 + 结算协调 (幂等终态转换)
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储，唯一索引强制占号互斥
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! rifa-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── api/           # HTTP 路由和处理器
//! ├── tickets/       # 可用性、预订、清扫、金额
//! ├── payments/      # 网关抽象、结算协调
//! ├── db/            # 模型、仓储、票号 Ledger
//! └── utils/         # 错误、日志、时间
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod payments;
pub mod tickets;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use db::DbService;
pub use payments::{MockGateway, PaymentGateway, SettlementCoordinator};
pub use tickets::{AvailabilityService, ReservationManager};
pub use utils::{AppError, AppResponse, AppResult};

// Re-export logger functions
pub use utils::logger::init_logger;

/// 设置运行环境: dotenv + 日志
pub fn setup_environment() -> anyhow::Result<()> {
    // .env 不存在不是错误
    let _ = dotenv::dotenv();
    init_logger();
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ____  _ ____
   / __ \(_) __/___ _
  / /_/ / / /_/ __ `/
 / _, _/ / __/ /_/ /
/_/ |_/_/_/  \__,_/
    "#
    );
}
