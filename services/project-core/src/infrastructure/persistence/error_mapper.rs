//! 数据库错误映射工具
//!
//! 提供统一的 SQLx 错误到 AppError 的转换

use pm_errors::AppError;

/// 将 SQLx 错误转换为 AppError，区分不同错误类型
pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::RowNotFound => AppError::not_found("Record not found"),
        sqlx::Error::Database(db_err) => match db_err.code() {
            // PostgreSQL 约束违规代码
            Some(code) => match code.as_ref() {
                "23505" => AppError::conflict("Duplicate entry violates unique constraint"),
                "23503" => AppError::validation("Foreign key constraint violation"),
                "23514" => AppError::validation("Check constraint violation"),
                "23502" => AppError::validation("Not null constraint violation"),
                "22001" => AppError::validation("String data too long"),
                "22P02" => AppError::validation("Invalid input syntax"),
                // 可串行化冲突与死锁，调用方可重试
                "40001" | "40P01" => AppError::conflict(format!("Transaction aborted: {}", db_err)),
                _ => AppError::database(format!("Database error ({}): {}", code, db_err)),
            },
            None => AppError::database(db_err.to_string()),
        },
        sqlx::Error::PoolTimedOut => AppError::internal("Database connection pool timeout"),
        sqlx::Error::PoolClosed => AppError::internal("Database connection pool is closed"),
        sqlx::Error::Protocol(msg) => AppError::internal(format!("Database protocol error: {}", msg)),
        _ => AppError::database(e.to_string()),
    }
}
