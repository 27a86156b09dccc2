//! Payments Module
//!
//! 支付网关抽象与结算协调。
//!
//! - **gateway**: `PaymentGateway` trait + HTTP 实现 + Mock 实现。
//!   网关被视为不透明服务：create / execute / refund 三个操作
//!   加异步 webhook 通知，具体线协议不在引擎范围内。
//! - **settlement**: SettlementCoordinator，驱动预订走完生命周期，
//!   对重复/乱序的网关回调幂等。

pub mod gateway;
pub mod settlement;

pub use gateway::{
    CreateChargeRequest, CreatedCharge, GatewayError, HttpGateway, MockGateway, PaymentGateway,
};
pub use settlement::{ChargeHandle, GatewayEvent, GatewayEventKind, SettlementCoordinator};
