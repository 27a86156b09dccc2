//! Server Implementation
//!
//! HTTP 服务器启动和管理

use crate::api;
use crate::core::{BackgroundTasks, Config, ServerState, TaskKind};
use crate::tickets::ExpirySweeper;

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state (测试/嵌入场景共享 state)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        // 后台任务：过期清扫器
        let mut tasks = BackgroundTasks::new();
        let sweeper = ExpirySweeper::new(
            state.ledger(),
            self.config.sweep_interval(),
            tasks.shutdown_token(),
        );
        tasks.spawn("expiry_sweeper", TaskKind::Periodic, sweeper.run());
        tasks.log_summary();

        let app = api::build_app().with_state(state);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("🎟️ Rifa server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutting down...");
            })
            .await?;

        tasks.shutdown().await;

        Ok(())
    }
}
