//! Logging Infrastructure
//!
//! Structured logging setup with support for both development and production environments.

/// Initialize the logger
///
/// 日志级别由 `RUST_LOG` 控制，未设置时默认 `rifa_server=info`。
pub fn init_logger() {
    init_logger_with_level(None);
}

/// Initialize the logger with an explicit default level
pub fn init_logger_with_level(default_level: Option<&str>) {
    let default = default_level.unwrap_or("rifa_server=info,tower_http=info");

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default.into());

    // try_init: 测试中重复初始化时静默忽略
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false)
        .try_init();
}
