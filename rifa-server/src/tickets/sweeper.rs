//! 过期持有清扫器
//!
//! 周期性释放超过持有窗口仍未结算的预订，把票号还回票池。
//! 读路径另有懒清扫，这里兜底长期无人访问的抽奖。
//!
//! 注册为 `TaskKind::Periodic`，在 `start_background_tasks()` 中启动。

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::db::repository::TicketLedger;
use crate::utils::time;

/// 过期清扫调度器
///
/// 与 SettlementCoordinator 在同一批预订行上竞争；
/// 清扫只做条件更新，结算先提交时静默跳过。
pub struct ExpirySweeper {
    ledger: TicketLedger,
    interval: Duration,
    shutdown: CancellationToken,
}

impl ExpirySweeper {
    pub fn new(ledger: TicketLedger, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            ledger,
            interval,
            shutdown,
        }
    }

    /// 主循环：启动先扫一次，之后按固定间隔扫
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        self.sweep_once().await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // 第一次 tick 立即返回，上面已经扫过
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }
    }

    /// 扫一轮；没有可扫的不是错误
    async fn sweep_once(&self) {
        match self.ledger.sweep_all(time::now_millis()).await {
            Ok(0) => {
                tracing::debug!("No expired holds to sweep");
            }
            Ok(count) => {
                tracing::info!(count, "Expired holds swept, tickets returned to pool");
            }
            Err(e) => {
                tracing::error!("Expiry sweep failed: {}", e);
            }
        }
    }
}
