//! 授权缓存
//!
//! 角色 → 资源码集合、用户 → 角色 ID 集合、角色 → 数据权限范围。
//! 替换操作是先删后写，不是原子的：并发读者可能短暂看到空集合，
//! 因此空集合一律按未命中处理，由调用方回源数据库。

use pm_common::UserId;
use pm_config::PermissionConfig;
use pm_errors::AppResult;
use pm_ports::SetCachePort;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::permission::{DataScope, RoleId};

/// 授权缓存配置
#[derive(Debug, Clone)]
pub struct PermissionCacheConfig {
    pub prefix: String,
    /// 缺省不过期，依赖显式失效
    pub ttl: Option<Duration>,
}

impl Default for PermissionCacheConfig {
    fn default() -> Self {
        Self::from(&PermissionConfig::default())
    }
}

impl From<&PermissionConfig> for PermissionCacheConfig {
    fn from(config: &PermissionConfig) -> Self {
        Self {
            prefix: config.cache_prefix.clone(),
            ttl: config.cache_ttl_secs.map(Duration::from_secs),
        }
    }
}

pub struct PermissionCache {
    cache: Arc<dyn SetCachePort>,
    config: PermissionCacheConfig,
}

impl PermissionCache {
    pub fn new(cache: Arc<dyn SetCachePort>) -> Self {
        Self {
            cache,
            config: PermissionCacheConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PermissionCacheConfig) -> Self {
        self.config = config;
        self
    }

    fn role_codes_key(&self, role_id: RoleId) -> String {
        format!("{}:role_codes:{}", self.config.prefix, role_id)
    }

    fn user_roles_key(&self, user_id: UserId) -> String {
        format!("{}:user_roles:{}", self.config.prefix, user_id)
    }

    fn role_scope_key(&self, role_id: RoleId) -> String {
        format!("{}:role_scope:{}", self.config.prefix, role_id)
    }

    // ============ 角色资源码 ============

    /// 角色的资源码，None 表示未命中（含空集合）
    pub async fn role_codes(&self, role_id: RoleId) -> AppResult<Option<Vec<String>>> {
        let members = self.cache.set_members(&self.role_codes_key(role_id)).await?;
        Ok((!members.is_empty()).then_some(members))
    }

    /// 先删后写；空列表只删除，下次读取回源
    pub async fn replace_role_codes(&self, role_id: RoleId, codes: &[String]) -> AppResult<()> {
        let key = self.role_codes_key(role_id);
        self.replace_set(&key, codes).await
    }

    // ============ 用户角色 ============

    /// 用户的角色 ID，None 表示未命中（含空集合）
    pub async fn user_roles(&self, user_id: UserId) -> AppResult<Option<Vec<RoleId>>> {
        let members = self.cache.set_members(&self.user_roles_key(user_id)).await?;
        if members.is_empty() {
            return Ok(None);
        }
        let mut role_ids = Vec::with_capacity(members.len());
        for member in members {
            match member.parse::<RoleId>() {
                Ok(id) => role_ids.push(id),
                Err(_) => {
                    // 脏数据按未命中处理，回源后覆盖
                    tracing::warn!(user_id = %user_id, member = %member, "Malformed role id in cache");
                    return Ok(None);
                }
            }
        }
        role_ids.sort();
        Ok(Some(role_ids))
    }

    pub async fn replace_user_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> AppResult<()> {
        let key = self.user_roles_key(user_id);
        let members: Vec<String> = role_ids.iter().map(|id| id.to_string()).collect();
        self.replace_set(&key, &members).await
    }

    // ============ 角色数据权限 ============

    pub async fn role_scope(&self, role_id: RoleId) -> AppResult<Option<DataScope>> {
        let value = self.cache.get(&self.role_scope_key(role_id)).await?;
        Ok(value
            .and_then(|v| v.parse::<i16>().ok())
            .and_then(DataScope::from_code))
    }

    pub async fn set_role_scope(&self, role_id: RoleId, scope: DataScope) -> AppResult<()> {
        self.cache
            .set(
                &self.role_scope_key(role_id),
                &scope.code().to_string(),
                self.config.ttl,
            )
            .await
    }

    /// 角色被修改或停用后清除其全部缓存
    pub async fn invalidate_role(&self, role_id: RoleId) -> AppResult<()> {
        self.cache.delete(&self.role_codes_key(role_id)).await?;
        self.cache.delete(&self.role_scope_key(role_id)).await
    }

    pub async fn invalidate_user(&self, user_id: UserId) -> AppResult<()> {
        self.cache.delete(&self.user_roles_key(user_id)).await
    }

    async fn replace_set(&self, key: &str, members: &[String]) -> AppResult<()> {
        self.cache.delete(key).await?;
        if members.is_empty() {
            return Ok(());
        }
        self.cache.set_add(key, members).await?;
        if let Some(ttl) = self.config.ttl {
            self.cache.expire(key, ttl).await?;
        }
        Ok(())
    }
}
