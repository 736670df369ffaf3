//! 授权分配
//!
//! 数据库先删后插并提交，之后替换缓存。缓存替换失败时删除对应键，
//! 下次读取回源数据库。

use pm_common::UserId;
use pm_errors::AppResult;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::permission::{ResourceRegistry, RoleId};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory, finish};
use crate::error::ProjectError;
use crate::infrastructure::cache::PermissionCache;

pub struct PermissionDispatchService {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    registry: Arc<ResourceRegistry>,
    cache: Option<Arc<PermissionCache>>,
}

impl PermissionDispatchService {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>, registry: Arc<ResourceRegistry>) -> Self {
        Self {
            uow_factory,
            registry,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<PermissionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 整体替换角色的资源码，返回归一化后的资源码
    pub async fn dispatch_resources(
        &self,
        role_id: RoleId,
        codes: &[String],
    ) -> AppResult<Vec<String>> {
        let codes = self.registry.validate_codes(codes)?;

        let uow = self.uow_factory.begin().await?;
        let result = Self::replace_role_codes(uow.as_ref(), role_id, &codes).await;
        finish(uow, result).await?;

        info!(role_id = %role_id, count = codes.len(), "Role resources dispatched");

        if let Some(cache) = &self.cache
            && let Err(e) = cache.replace_role_codes(role_id, &codes).await
        {
            warn!(role_id = %role_id, error = %e, "Role code cache replace failed");
            if let Err(e) = cache.invalidate_role(role_id).await {
                warn!(role_id = %role_id, error = %e, "Role cache invalidation failed");
            }
        }
        Ok(codes)
    }

    /// 整体替换用户的角色
    pub async fn dispatch_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> AppResult<()> {
        let mut role_ids = role_ids.to_vec();
        role_ids.sort();
        role_ids.dedup();

        let uow = self.uow_factory.begin().await?;
        let result = Self::replace_user_roles(uow.as_ref(), user_id, &role_ids).await;
        finish(uow, result).await?;

        info!(user_id = %user_id, count = role_ids.len(), "User roles dispatched");

        if let Some(cache) = &self.cache
            && let Err(e) = cache.replace_user_roles(user_id, &role_ids).await
        {
            warn!(user_id = %user_id, error = %e, "User role cache replace failed");
            if let Err(e) = cache.invalidate_user(user_id).await {
                warn!(user_id = %user_id, error = %e, "User cache invalidation failed");
            }
        }
        Ok(())
    }

    /// 角色信息（状态、数据权限）变更后调用
    pub async fn invalidate_role(&self, role_id: RoleId) -> AppResult<()> {
        if let Some(cache) = &self.cache {
            cache.invalidate_role(role_id).await?;
        }
        Ok(())
    }

    async fn replace_role_codes(
        uow: &dyn UnitOfWork,
        role_id: RoleId,
        codes: &[String],
    ) -> AppResult<()> {
        if !uow.grants().role_exists(role_id).await? {
            return Err(ProjectError::RoleNotFound(role_id).into());
        }
        uow.grants().replace_role_codes(role_id, codes).await
    }

    async fn replace_user_roles(
        uow: &dyn UnitOfWork,
        user_id: UserId,
        role_ids: &[RoleId],
    ) -> AppResult<()> {
        for role_id in role_ids {
            if !uow.grants().role_exists(*role_id).await? {
                return Err(ProjectError::RoleNotFound(*role_id).into());
            }
        }
        uow.grants().replace_user_roles(user_id, role_ids).await
    }
}
