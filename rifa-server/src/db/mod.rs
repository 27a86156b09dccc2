//! Database Module
//!
//! 嵌入式 SurrealDB 存储层。磁盘模式使用 RocksDB 引擎，
//! 测试使用内存引擎。启动时定义表结构和唯一索引。

pub mod models;
pub mod repository;

use crate::utils::AppError;
use std::path::Path;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, RocksDb};

/// Database service — owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// 打开磁盘数据库并初始化 schema
    pub async fn new(db_path: &Path) -> Result<Self, AppError> {
        let db: Surreal<Db> = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        db.use_ns("rifa")
            .use_db("rifa")
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;

        define_schema(&db).await?;

        tracing::info!(path = %db_path.display(), "Database ready (SurrealDB embedded)");

        Ok(Self { db })
    }

    /// 测试用内存数据库
    pub async fn new_in_memory() -> Result<Self, AppError> {
        use surrealdb::engine::local::Mem;

        let db: Surreal<Db> = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::database(format!("Failed to open in-memory db: {e}")))?;

        db.use_ns("rifa")
            .use_db("rifa")
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;

        define_schema(&db).await?;

        Ok(Self { db })
    }
}

/// 定义表结构和索引 (幂等，可重复执行)
///
/// 关键约束：`ticket` 表 `(drawing, number)` 唯一索引。
/// 占用互斥不靠应用逻辑，靠这个索引在事务提交时强制。
/// 表为 SCHEMAFULL，record link 字段带表类型。
async fn define_schema(db: &Surreal<Db>) -> Result<(), AppError> {
    db.query(
        r#"
        DEFINE TABLE IF NOT EXISTS drawing SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS title ON drawing TYPE string;
        DEFINE FIELD IF NOT EXISTS total_tickets ON drawing TYPE int;
        DEFINE FIELD IF NOT EXISTS ticket_price ON drawing TYPE number;
        DEFINE FIELD IF NOT EXISTS min_tickets ON drawing TYPE int;
        DEFINE FIELD IF NOT EXISTS status ON drawing TYPE string;
        DEFINE FIELD IF NOT EXISTS draw_date ON drawing TYPE int;
        DEFINE FIELD IF NOT EXISTS created_by ON drawing TYPE option<string>;
        DEFINE FIELD IF NOT EXISTS created_at ON drawing TYPE int;

        DEFINE TABLE IF NOT EXISTS ticket SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS drawing ON ticket TYPE record<drawing>;
        DEFINE FIELD IF NOT EXISTS number ON ticket TYPE int;
        DEFINE FIELD IF NOT EXISTS reservation ON ticket TYPE record<reservation>;
        DEFINE FIELD IF NOT EXISTS status ON ticket TYPE string;
        DEFINE FIELD IF NOT EXISTS expires_at ON ticket TYPE option<int>;
        DEFINE FIELD IF NOT EXISTS created_at ON ticket TYPE int;

        DEFINE TABLE IF NOT EXISTS reservation SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS drawing ON reservation TYPE record<drawing>;
        DEFINE FIELD IF NOT EXISTS numbers ON reservation TYPE array<int>;
        DEFINE FIELD IF NOT EXISTS buyer ON reservation FLEXIBLE TYPE object;
        DEFINE FIELD IF NOT EXISTS total_price ON reservation TYPE number;
        DEFINE FIELD IF NOT EXISTS status ON reservation TYPE string;
        DEFINE FIELD IF NOT EXISTS created_at ON reservation TYPE int;
        DEFINE FIELD IF NOT EXISTS expires_at ON reservation TYPE int;

        DEFINE TABLE IF NOT EXISTS charge SCHEMAFULL;
        DEFINE FIELD IF NOT EXISTS reservation ON charge TYPE record<reservation>;
        DEFINE FIELD IF NOT EXISTS amount ON charge TYPE number;
        DEFINE FIELD IF NOT EXISTS currency ON charge TYPE string;
        DEFINE FIELD IF NOT EXISTS status ON charge TYPE string;
        DEFINE FIELD IF NOT EXISTS created_at ON charge TYPE int;
        DEFINE FIELD IF NOT EXISTS updated_at ON charge TYPE int;

        DEFINE INDEX IF NOT EXISTS idx_ticket_slot ON ticket FIELDS drawing, number UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_ticket_reservation ON ticket FIELDS reservation;
        DEFINE INDEX IF NOT EXISTS idx_reservation_expiry ON reservation FIELDS status, expires_at;
        "#,
    )
    .await
    .map_err(|e| AppError::database(format!("Failed to define schema: {e}")))?
    .check()
    .map_err(|e| AppError::database(format!("Schema definition error: {e}")))?;

    Ok(())
}
