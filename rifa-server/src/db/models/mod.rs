//! Database Models
//!
//! SurrealDB 表结构对应的 serde 模型。
//!
//! # 表
//!
//! - `drawing` - 抽奖活动 (只读参考数据)
//! - `ticket` - 票号占用记录，(drawing, number) 唯一索引
//! - `reservation` - 买家预订 (时效性持有)
//! - `charge` - 支付网关扣款对象，record key = 网关 charge id

pub mod charge;
pub mod drawing;
pub mod reservation;
pub mod serde_helpers;
pub mod ticket;

pub use charge::{Charge, ChargeStatus};
pub use drawing::{Drawing, DrawingCreate, DrawingStatus};
pub use reservation::{BuyerInfo, Reservation, ReservationStatus};
pub use ticket::{TicketRecord, TicketStatus};
