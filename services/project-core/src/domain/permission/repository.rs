use async_trait::async_trait;
use pm_common::UserId;
use pm_errors::AppResult;

use super::{Role, RoleId};

/// 授权数据只读仓储（连接池）
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// 用户持有的角色 ID
    async fn find_user_role_ids(&self, user_id: UserId) -> AppResult<Vec<RoleId>>;

    /// 角色被授予的资源码
    async fn find_role_codes(&self, role_id: RoleId) -> AppResult<Vec<String>>;

    /// 批量加载启用状态的角色，停用或不存在的角色不会返回
    async fn find_enabled_roles(&self, ids: &[RoleId]) -> AppResult<Vec<Role>>;
}

/// 授权数据写仓储，在工作单元事务内使用
#[async_trait]
pub trait GrantRepository: Send + Sync {
    async fn role_exists(&self, role_id: RoleId) -> AppResult<bool>;

    /// 整体替换角色的资源码（先删后插）
    async fn replace_role_codes(&self, role_id: RoleId, codes: &[String]) -> AppResult<()>;

    /// 整体替换用户的角色（先删后插）
    async fn replace_user_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> AppResult<()>;
}
