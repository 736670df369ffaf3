//! PostgreSQL 持久化

pub mod error_mapper;
mod permission_repository;
mod tables;
mod tx_repositories;
mod unit_of_work;
mod user_directory;

pub use permission_repository::PostgresPermissionRepository;
pub use tx_repositories::{SharedTx, TxGrantRepository, TxTreeRepository, TxWorkflowRepository};
pub use unit_of_work::{PostgresUnitOfWork, PostgresUnitOfWorkFactory};
pub use user_directory::PostgresUserDirectory;

/// 内嵌的建表迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
