//! Unit of Work 模式
//!
//! 协调授权、树节点、工作流仓储在同一事务中的操作，确保原子性。

use async_trait::async_trait;
use pm_errors::AppResult;
use tracing::warn;

use crate::domain::hierarchy::TreeRepository;
use crate::domain::permission::GrantRepository;
use crate::domain::workflow::WorkflowRepository;

/// Unit of Work trait
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// 获取授权写 Repository
    fn grants(&self) -> &dyn GrantRepository;

    /// 获取树节点 Repository
    fn trees(&self) -> &dyn TreeRepository;

    /// 获取工作流 Repository
    fn workflows(&self) -> &dyn WorkflowRepository;

    /// 提交事务
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// 回滚事务
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Unit of Work 工厂 trait
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    /// 开始新的事务
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}

/// 按业务结果提交或回滚；回滚失败只记录日志，返回原始错误
pub async fn finish<T>(uow: Box<dyn UnitOfWork>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}
