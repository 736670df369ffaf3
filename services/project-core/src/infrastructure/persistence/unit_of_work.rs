//! PostgreSQL Unit of Work 实现

use async_trait::async_trait;
use pm_errors::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::tx_repositories::{SharedTx, TxGrantRepository, TxTreeRepository, TxWorkflowRepository};
use crate::domain::hierarchy::TreeRepository;
use crate::domain::permission::GrantRepository;
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};
use crate::domain::workflow::WorkflowRepository;

/// Postgres Unit of Work 工厂
pub struct PostgresUnitOfWorkFactory {
    pool: PgPool,
}

impl PostgresUnitOfWorkFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PostgresUnitOfWorkFactory {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(PostgresUnitOfWork::new(tx)))
    }
}

/// Postgres Unit of Work 实现
pub struct PostgresUnitOfWork {
    tx: SharedTx,
    grant_repo: TxGrantRepository,
    tree_repo: TxTreeRepository,
    workflow_repo: TxWorkflowRepository,
}

impl PostgresUnitOfWork {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        let tx = Arc::new(Mutex::new(Some(tx)));

        Self {
            tx: tx.clone(),
            grant_repo: TxGrantRepository::new(tx.clone()),
            tree_repo: TxTreeRepository::new(tx.clone()),
            workflow_repo: TxWorkflowRepository::new(tx),
        }
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    fn grants(&self) -> &dyn GrantRepository {
        &self.grant_repo
    }

    fn trees(&self) -> &dyn TreeRepository {
        &self.tree_repo
    }

    fn workflows(&self) -> &dyn WorkflowRepository {
        &self.workflow_repo
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .take()
            .ok_or_else(|| AppError::internal("Transaction already consumed"))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard
            .take()
            .ok_or_else(|| AppError::internal("Transaction already consumed"))?;

        tx.rollback()
            .await
            .map_err(|e| AppError::database(format!("Failed to rollback transaction: {}", e)))?;

        Ok(())
    }
}
