use async_trait::async_trait;
use pm_errors::AppResult;

use super::{IssueChange, IssueRecord, ModuleRecord, ModuleStatus, RequirementRecord, RequirementStatus};

/// 工作流仓储，在工作单元事务内使用
///
/// 所有更新都以 `expected_version` 做乐观锁校验，失败返回 Conflict，并使版本号加一。
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn find_issue(&self, id: i64) -> AppResult<Option<IssueRecord>>;

    async fn apply_issue_change(
        &self,
        id: i64,
        expected_version: i64,
        change: &IssueChange,
    ) -> AppResult<()>;

    async fn find_requirement(&self, id: i64) -> AppResult<Option<RequirementRecord>>;

    async fn update_requirement_status(
        &self,
        id: i64,
        expected_version: i64,
        status: RequirementStatus,
    ) -> AppResult<()>;

    async fn find_module(&self, id: i64) -> AppResult<Option<ModuleRecord>>;

    async fn update_module_status(
        &self,
        id: i64,
        expected_version: i64,
        status: ModuleStatus,
    ) -> AppResult<()>;

    /// 把锚点为 `anchor_id` 且路径在 `paths` 中、状态不在 `keep` 中的模块置为 `target`，返回更新行数
    async fn promote_modules(
        &self,
        anchor_id: Option<i64>,
        paths: &[String],
        target: ModuleStatus,
        keep: &[ModuleStatus],
    ) -> AppResult<u64>;
}
