//! 基础设施资源管理
//!
//! 统一管理服务共享的基础设施资源

use pm_adapter_postgres::{PostgresConfig, create_pool};
use pm_adapter_redis::{RedisCache, create_connection_manager};
use pm_common::{RetryConfig, is_retryable_error, with_conditional_retry};
use pm_config::AppConfig;
use pm_errors::{AppError, AppResult};
use pm_telemetry::HealthStatus;
use redis::aio::ConnectionManager;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    postgres_pool: PgPool,
    redis_conn: ConnectionManager,
}

impl Infrastructure {
    /// 从配置创建基础设施资源，瞬时连接错误会按退避策略重试
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let retry_config = RetryConfig::default();
        let should_retry = |e: &AppError| is_retryable_error(&e.to_string());

        let pg_config = PostgresConfig::new(config.database.url.expose_secret())
            .with_max_connections(config.database.max_connections);
        let postgres_pool = with_conditional_retry(
            &retry_config,
            "PostgreSQL connection",
            || {
                let cfg = pg_config.clone();
                async move { create_pool(&cfg).await }
            },
            should_retry,
        )
        .await?;
        info!(
            max_connections = config.database.max_connections,
            "PostgreSQL connection pool created"
        );

        let redis_url = config.redis.url.expose_secret().clone();
        let redis_conn = with_conditional_retry(
            &retry_config,
            "Redis connection",
            || {
                let url = redis_url.clone();
                async move { create_connection_manager(&url).await }
            },
            should_retry,
        )
        .await?;
        info!("Redis connection created");

        Ok(Self {
            config,
            postgres_pool,
            redis_conn,
        })
    }

    /// 获取应用配置
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取 PostgreSQL 连接池
    pub fn postgres_pool(&self) -> PgPool {
        self.postgres_pool.clone()
    }

    /// 获取 Redis 连接管理器
    pub fn redis_connection_manager(&self) -> ConnectionManager {
        self.redis_conn.clone()
    }

    /// 获取 Redis 缓存
    pub fn redis_cache(&self) -> RedisCache {
        RedisCache::new(self.redis_conn.clone())
    }

    /// 检查所有依赖的连接状态
    pub async fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new();

        match pm_adapter_postgres::check_connection(&self.postgres_pool).await {
            Ok(()) => status.add_check("postgres", true, None),
            Err(e) => status.add_check("postgres", false, Some(e.to_string())),
        }

        match pm_adapter_redis::check_connection(&self.redis_conn).await {
            Ok(()) => status.add_check("redis", true, None),
            Err(e) => status.add_check("redis", false, Some(e.to_string())),
        }

        status
    }
}
