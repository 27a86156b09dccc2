use std::path::PathBuf;
use std::time::Duration;

/// 服务器配置 - 票务引擎的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/rifa | 工作目录 (数据库等) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | HOLD_WINDOW_SECS | 900 | 预订持有窗口 (秒) |
/// | SWEEP_INTERVAL_SECS | 60 | 过期清扫间隔 (秒) |
/// | GATEWAY_MODE | mock | 支付网关模式: mock \| http |
/// | GATEWAY_BASE_URL | http://localhost:3001 | HTTP 网关地址 |
/// | GATEWAY_TIMEOUT_MS | 10000 | 网关请求超时 (毫秒) |
/// | CURRENCY | USD | 扣款币种 |
/// | ADMIN_TOKEN | (未设置) | 管理能力令牌，未设置时管理端点只认创建者 |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/rifa HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 预订持有窗口 (秒)，到期未结算即释放
    pub hold_window_secs: u64,
    /// 后台过期清扫间隔 (秒)
    pub sweep_interval_secs: u64,
    /// 支付网关模式: mock | http
    pub gateway_mode: String,
    /// HTTP 网关基地址 (gateway_mode=http 时生效)
    pub gateway_base_url: String,
    /// 网关请求超时 (毫秒)
    pub gateway_timeout_ms: u64,
    /// 扣款币种
    pub currency: String,
    /// 管理能力令牌 (创建者之外查看全量票号用)
    pub admin_token: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/rifa".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            hold_window_secs: std::env::var("HOLD_WINDOW_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(900),
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(60),
            gateway_mode: std::env::var("GATEWAY_MODE").unwrap_or_else(|_| "mock".into()),
            gateway_base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3001".into()),
            gateway_timeout_ms: std::env::var("GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10_000),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "USD".into()),
            admin_token: std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 数据库目录: work_dir/database
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())
    }

    /// 持有窗口 (millis)
    pub fn hold_window_millis(&self) -> i64 {
        crate::utils::time::secs_to_millis(self.hold_window_secs)
    }

    /// 清扫间隔
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// 网关超时
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
