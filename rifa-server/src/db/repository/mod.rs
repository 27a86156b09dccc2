//! Repository Module
//!
//! 存储层唯一的读写入口。票号/预订/扣款行的所有变更都经由
//! [`TicketLedger`] 的事务接口，唯一索引在存储层强制互斥，
//! 应用逻辑不做 SELECT-then-INSERT 式的检查。

pub mod charge;
pub mod drawing;
pub mod ledger;

pub use charge::ChargeRepository;
pub use drawing::DrawingRepository;
pub use ledger::TicketLedger;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

use crate::utils::AppError;

/// Ledger / repository error types
///
/// 每个失败在返回前都已分类，不抛出含义不明的错误。
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// 占用冲突，包含全部冲突票号
    #[error("Tickets unavailable: {0:?}")]
    TicketsUnavailable(Vec<u32>),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<surrealdb::Error> for LedgerError {
    fn from(err: surrealdb::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(msg) => AppError::NotFound(msg),
            LedgerError::Validation(msg) => AppError::Validation(msg),
            LedgerError::TicketsUnavailable(numbers) => AppError::TicketsUnavailable(numbers),
            LedgerError::Database(msg) => AppError::Database(msg),
        }
    }
}

/// Result type for repository operations
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// ID Convention: 全栈统一使用 "table:id" 格式
// =============================================================================
//
// 使用 surrealdb::RecordId 处理所有 ID：
//   - 解析: let id: RecordId = "drawing:abc".parse()?;
//   - 创建: let id = RecordId::from_table_key("drawing", "abc");
//   - 获取表名: id.table()
//   - CRUD: db.select(id) / db.delete(id) 直接使用 RecordId

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}
