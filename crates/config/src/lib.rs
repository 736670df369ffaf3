//! pm-config - 配置加载库
//!
//! 加载顺序：`default.toml` → `{APP_ENV}.toml` → `PM_` 前缀环境变量（`__` 分隔层级）

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::Secret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    // 开发环境: 10, 生产环境: 50
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 权限配置
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionConfig {
    /// 超级管理员角色 ID，持有该角色的用户跳过所有权限检查
    #[serde(default = "default_super_admin_role_id")]
    pub super_admin_role_id: i64,
    /// 缓存键前缀
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    /// 缓存过期时间，缺省表示永不过期，仅依赖显式失效
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            super_admin_role_id: default_super_admin_role_id(),
            cache_prefix: default_cache_prefix(),
            cache_ttl_secs: None,
        }
    }
}

fn default_super_admin_role_id() -> i64 {
    1
}

fn default_cache_prefix() -> String {
    "pm:perm".to_string()
}

/// 树节点删除策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// 存在子节点或挂载数据时拒绝删除
    RejectIfChildren,
    /// 级联删除整棵子树及挂载数据
    Cascade,
}

/// 层级路径配置
#[derive(Debug, Clone, Deserialize)]
pub struct HierarchyConfig {
    #[serde(default = "reject_if_children")]
    pub department_delete: DeleteMode,
    #[serde(default = "cascade")]
    pub project_delete: DeleteMode,
    #[serde(default = "cascade")]
    pub module_delete: DeleteMode,
    #[serde(default = "reject_if_children")]
    pub requirement_delete: DeleteMode,
    #[serde(default = "reject_if_children")]
    pub task_delete: DeleteMode,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            department_delete: DeleteMode::RejectIfChildren,
            project_delete: DeleteMode::Cascade,
            module_delete: DeleteMode::Cascade,
            requirement_delete: DeleteMode::RejectIfChildren,
            task_delete: DeleteMode::RejectIfChildren,
        }
    }
}

fn reject_if_children() -> DeleteMode {
    DeleteMode::RejectIfChildren
}

fn cascade() -> DeleteMode {
    DeleteMode::Cascade
}

/// 工作流配置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// 非法状态迁移是否以错误返回；关闭时仅返回 applied=false
    #[serde(default = "default_true")]
    pub strict_transitions: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            strict_transitions: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// 索引同步配置
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSyncConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for IndexSyncConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

/// 搜索引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub host: String,
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index() -> String {
    "pm_documents".to_string()
}

fn default_search_timeout_secs() -> u64 {
    10
}

/// 雪花 ID 配置
#[derive(Debug, Clone, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_node_id")]
    pub node_id: u16,
    #[serde(default = "default_node_id")]
    pub worker_id: u16,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            worker_id: default_node_id(),
        }
    }
}

fn default_node_id() -> u16 {
    1
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub permission: PermissionConfig,
    #[serde(default)]
    pub hierarchy: HierarchyConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub index_sync: IndexSyncConfig,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub id: IdConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let figment = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("PM_").split("__"));

        Self::from_figment(figment)
    }

    /// 从已组装的 Figment 提取配置
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
