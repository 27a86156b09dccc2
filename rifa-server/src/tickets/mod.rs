//! Ticket Reservation Module
//!
//! 票务核心：可用性查询、原子占号、过期清扫。
//!
//! - **availability**: 可用性查询服务 (读为主，先懒清扫)
//! - **reservation**: 预订管理器 (前置校验 + 原子占号 + 查询/取消)
//! - **sweeper**: 过期清扫 (定时任务 + 读路径懒触发)
//! - **money**: rust_decimal 金额计算
//!
//! # 数据流
//!
//! ```text
//! client → AvailabilityService (read)
//!        → ReservationManager (claim) → TicketLedger (transactional)
//!        → [gateway round-trip] → SettlementCoordinator (finalize)
//! ExpirySweeper 与结算方在同一批预订行上竞争，CAS 决胜。
//! ```

pub mod availability;
pub mod money;
pub mod reservation;
pub mod sweeper;

pub use availability::{AvailabilityService, DrawingAvailability};
pub use reservation::ReservationManager;
pub use sweeper::ExpirySweeper;
