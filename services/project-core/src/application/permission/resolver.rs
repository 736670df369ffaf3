//! 授权决策
//!
//! 给定 (用户, 资源码) 返回是否允许及有效数据权限范围。
//! 读取顺序：缓存 → 数据库 → 回填缓存。缓存故障只降级到数据库，不影响决策。

use metrics::{counter, histogram};
use pm_common::UserId;
use pm_errors::AppResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::permission::{
    AccessRequirement, DataScope, PermissionRepository, RoleId, code_grants,
};
use crate::infrastructure::cache::PermissionCache;

/// 授权决策结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub data_scope: DataScope,
    pub source: DecisionSource,
}

/// 决策来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// 匿名资源
    Anonymous,
    /// 登录即可访问
    Authenticated,
    SuperAdmin,
    /// 角色授予的资源码
    RoleGrant,
    /// 默认拒绝
    DefaultDeny,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anonymous => "ANONYMOUS",
            Self::Authenticated => "AUTHENTICATED",
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::RoleGrant => "ROLE_GRANT",
            Self::DefaultDeny => "DEFAULT_DENY",
        };
        f.write_str(name)
    }
}

pub struct PermissionResolver<R>
where
    R: PermissionRepository,
{
    repo: Arc<R>,
    cache: Option<Arc<PermissionCache>>,
    super_admin_role_id: RoleId,
}

impl<R> PermissionResolver<R>
where
    R: PermissionRepository,
{
    pub fn new(repo: Arc<R>, super_admin_role_id: RoleId) -> Self {
        Self {
            repo,
            cache: None,
            super_admin_role_id,
        }
    }

    pub fn with_cache(mut self, cache: Arc<PermissionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 执行授权检查
    pub async fn authorize(
        &self,
        user_id: UserId,
        resource_code: &str,
    ) -> AppResult<AuthorizationDecision> {
        let start = std::time::Instant::now();

        let result = self.authorize_internal(user_id, resource_code).await;

        match &result {
            Ok(decision) => {
                counter!("permission_authorize_total",
                    "allowed" => decision.allowed.to_string(),
                    "source" => decision.source.to_string()
                )
                .increment(1);
            }
            Err(e) => {
                warn!(user_id = %user_id, resource_code, error = %e, "Authorization failed");
                counter!("permission_authorize_errors_total").increment(1);
            }
        }
        histogram!("permission_authorize_duration_ms").record(start.elapsed().as_millis() as f64);

        result
    }

    async fn authorize_internal(
        &self,
        user_id: UserId,
        resource_code: &str,
    ) -> AppResult<AuthorizationDecision> {
        let requirement = AccessRequirement::parse(resource_code);
        if requirement == AccessRequirement::Anonymous {
            return Ok(AuthorizationDecision {
                allowed: true,
                data_scope: DataScope::SelfOnly,
                source: DecisionSource::Anonymous,
            });
        }

        // 1. 用户角色
        let role_ids = self.user_role_ids(user_id).await?;
        if role_ids.contains(&self.super_admin_role_id) {
            return Ok(AuthorizationDecision {
                allowed: true,
                data_scope: DataScope::All,
                source: DecisionSource::SuperAdmin,
            });
        }

        // 2. 启用角色及其数据权限，停用或不存在的角色不参与授权
        let scopes = self.role_scopes(&role_ids).await?;
        let data_scope = DataScope::widest(scopes.values().copied());

        let code = match requirement {
            AccessRequirement::Resource(code) => code,
            _ => {
                return Ok(AuthorizationDecision {
                    allowed: true,
                    data_scope,
                    source: DecisionSource::Authenticated,
                });
            }
        };

        // 3. 任一启用角色的资源码覆盖请求资源码即允许
        for role_id in role_ids.iter().filter(|id| scopes.contains_key(id)) {
            let granted = self.role_codes(*role_id).await?;
            if granted.iter().any(|g| code_grants(g, &code)) {
                debug!(user_id = %user_id, role_id = %role_id, code = %code, "Granted by role");
                return Ok(AuthorizationDecision {
                    allowed: true,
                    data_scope,
                    source: DecisionSource::RoleGrant,
                });
            }
        }

        Ok(AuthorizationDecision {
            allowed: false,
            data_scope,
            source: DecisionSource::DefaultDeny,
        })
    }

    async fn user_role_ids(&self, user_id: UserId) -> AppResult<Vec<RoleId>> {
        if let Some(cache) = &self.cache {
            match cache.user_roles(user_id).await {
                Ok(Some(ids)) => {
                    counter!("permission_cache_hits_total", "kind" => "user_roles").increment(1);
                    return Ok(ids);
                }
                Ok(None) => {}
                Err(e) => warn!(user_id = %user_id, error = %e, "User role cache read failed"),
            }
            counter!("permission_cache_misses_total", "kind" => "user_roles").increment(1);
        }

        let ids = self.repo.find_user_role_ids(user_id).await?;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.replace_user_roles(user_id, &ids).await
        {
            warn!(user_id = %user_id, error = %e, "User role cache fill failed");
        }
        Ok(ids)
    }

    async fn role_codes(&self, role_id: RoleId) -> AppResult<Vec<String>> {
        if let Some(cache) = &self.cache {
            match cache.role_codes(role_id).await {
                Ok(Some(codes)) => {
                    counter!("permission_cache_hits_total", "kind" => "role_codes").increment(1);
                    return Ok(codes);
                }
                Ok(None) => {}
                Err(e) => warn!(role_id = %role_id, error = %e, "Role code cache read failed"),
            }
            counter!("permission_cache_misses_total", "kind" => "role_codes").increment(1);
        }

        let codes: Vec<String> = self
            .repo
            .find_role_codes(role_id)
            .await?
            .iter()
            .map(|c| pm_common::normalize_code(c))
            .collect();

        if let Some(cache) = &self.cache
            && let Err(e) = cache.replace_role_codes(role_id, &codes).await
        {
            warn!(role_id = %role_id, error = %e, "Role code cache fill failed");
        }
        Ok(codes)
    }

    async fn role_scopes(&self, role_ids: &[RoleId]) -> AppResult<HashMap<RoleId, DataScope>> {
        let mut scopes = HashMap::with_capacity(role_ids.len());
        let mut missing = Vec::new();

        for role_id in role_ids {
            let cached = match &self.cache {
                Some(cache) => match cache.role_scope(*role_id).await {
                    Ok(scope) => scope,
                    Err(e) => {
                        warn!(role_id = %role_id, error = %e, "Role scope cache read failed");
                        None
                    }
                },
                None => None,
            };
            match cached {
                Some(scope) => {
                    scopes.insert(*role_id, scope);
                }
                None => missing.push(*role_id),
            }
        }

        if missing.is_empty() {
            return Ok(scopes);
        }

        let roles = self.repo.find_enabled_roles(&missing).await?;
        for role in roles {
            if let Some(cache) = &self.cache
                && let Err(e) = cache.set_role_scope(role.id, role.data_scope).await
            {
                warn!(role_id = %role.id, error = %e, "Role scope cache fill failed");
            }
            scopes.insert(role.id, role.data_scope);
        }
        Ok(scopes)
    }
}
