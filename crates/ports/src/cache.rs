//! Cache trait 定义

use async_trait::async_trait;
use pm_errors::AppResult;
use std::time::Duration;

/// 键值缓存
#[async_trait]
pub trait CachePort: Send + Sync {
    /// 获取缓存值
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 设置缓存值，`ttl` 为空时不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()>;

    /// 删除缓存
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// 检查是否存在
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// 设置过期时间
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()>;
}

/// 集合语义缓存（SADD / SMEMBERS / DEL）
///
/// 不存在的键与空集合不可区分，调用方必须把空结果当作未命中处理。
#[async_trait]
pub trait SetCachePort: CachePort {
    /// 向集合添加成员，`members` 为空时不做任何操作
    async fn set_add(&self, key: &str, members: &[String]) -> AppResult<()>;

    /// 枚举集合成员，键不存在时返回空集合
    async fn set_members(&self, key: &str) -> AppResult<Vec<String>>;

    /// 从集合移除成员
    async fn set_remove(&self, key: &str, members: &[String]) -> AppResult<()>;
}
