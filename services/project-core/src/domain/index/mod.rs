//! 搜索索引领域

use async_trait::async_trait;
use pm_common::UserId;
use pm_errors::AppResult;

/// 用户 ID 到显示名的解析
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 返回找到的用户显示名，顺序与入参一致，不存在的用户跳过
    async fn display_names(&self, ids: &[UserId]) -> AppResult<Vec<String>>;
}
