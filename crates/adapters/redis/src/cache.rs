//! Redis Cache 实现

use async_trait::async_trait;
use pm_errors::{AppError, AppResult};
use pm_ports::{CachePort, SetCachePort};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Redis Cache
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// 获取 TTL（秒），返回 None 表示键不存在或没有过期时间
    pub async fn ttl(&self, key: &str) -> AppResult<Option<i64>> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn
            .ttl(key)
            .await
            .map_err(|e| AppError::internal(format!("Redis ttl failed: {}", e)))?;

        // -2 表示键不存在，-1 表示没有过期时间
        match ttl {
            -2 | -1 => Ok(None),
            t => Ok(Some(t)),
        }
    }
}

#[async_trait]
impl CachePort for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| AppError::internal(format!("Redis get failed: {}", e)))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(duration) => conn
                .set_ex(key, value, duration.as_secs())
                .await
                .map_err(|e| AppError::internal(format!("Redis set failed: {}", e))),
            None => conn
                .set(key, value)
                .await
                .map_err(|e| AppError::internal(format!("Redis set failed: {}", e))),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del(key)
            .await
            .map_err(|e| AppError::internal(format!("Redis delete failed: {}", e)))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key)
            .await
            .map_err(|e| AppError::internal(format!("Redis exists failed: {}", e)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl.as_secs() as i64)
            .await
            .map_err(|e| AppError::internal(format!("Redis expire failed: {}", e)))
    }
}

#[async_trait]
impl SetCachePort for RedisCache {
    async fn set_add(&self, key: &str, members: &[String]) -> AppResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(key, members)
            .await
            .map_err(|e| AppError::internal(format!("Redis sadd failed: {}", e)))
    }

    async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(key)
            .await
            .map_err(|e| AppError::internal(format!("Redis smembers failed: {}", e)))
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> AppResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(key, members)
            .await
            .map_err(|e| AppError::internal(format!("Redis srem failed: {}", e)))
    }
}
