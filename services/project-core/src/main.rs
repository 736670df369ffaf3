//! project-core 服务入口
//!
//! 装配权限、层级、工作流与索引同步组件，运行至收到关闭信号

use std::sync::Arc;

use pm_bootstrap::{Infrastructure, ShutdownController, run};
use pm_common::SnowflakeGenerator;
use pm_errors::AppError;
use tracing::{info, warn};

use project_core::application::hierarchy::HierarchyPathManager;
use project_core::application::index_sync::AsyncIndexSync;
use project_core::application::permission::{PermissionDispatchService, PermissionResolver};
use project_core::application::workflow::WorkflowEngine;
use project_core::domain::hierarchy::DeletePolicies;
use project_core::domain::permission::{ResourceRegistry, RoleId, register_core_resources};
use project_core::infrastructure::cache::{PermissionCache, PermissionCacheConfig};
use project_core::infrastructure::persistence::{
    MIGRATOR, PostgresPermissionRepository, PostgresUnitOfWorkFactory, PostgresUserDirectory,
};
use project_core::infrastructure::search::HttpSearchIndex;
use project_core::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    run("config", |infra: Infrastructure, shutdown: ShutdownController| async move {
        info!("Initializing project core...");

        let pool = infra.postgres_pool();
        let config = infra.config().clone();

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {}", e)))?;
        info!("Database migrated");

        let registry = Arc::new(register_core_resources(ResourceRegistry::builder()).build()?);
        info!(resources = registry.len(), "Resource registry built");

        // 缓存
        let cache = Arc::new(
            PermissionCache::new(Arc::new(infra.redis_cache()))
                .with_config(PermissionCacheConfig::from(&config.permission)),
        );

        let uow_factory = Arc::new(PostgresUnitOfWorkFactory::new(pool.clone()));

        let resolver = PermissionResolver::new(
            Arc::new(PostgresPermissionRepository::new(pool.clone())),
            RoleId(config.permission.super_admin_role_id),
        )
        .with_cache(cache.clone());
        let dispatch =
            PermissionDispatchService::new(uow_factory.clone(), registry.clone()).with_cache(cache);

        let hierarchy = HierarchyPathManager::new(
            uow_factory.clone(),
            Arc::new(SnowflakeGenerator::new(config.id.node_id, config.id.worker_id)),
        )
        .with_policies(DeletePolicies::from(&config.hierarchy));

        let workflow = WorkflowEngine::new(uow_factory)
            .with_strict_transitions(config.workflow.strict_transitions);

        // 未配置搜索引擎时不启动索引同步
        let index_sync = match &config.search {
            Some(search) => Some(Arc::new(AsyncIndexSync::start(
                Arc::new(HttpSearchIndex::new(search)?),
                Arc::new(PostgresUserDirectory::new(pool.clone())),
                &config.index_sync,
            ))),
            None => {
                warn!("Search engine not configured, index sync disabled");
                None
            }
        };

        // 对外接口层不在本服务内，持有状态直到关闭
        let state = AppState::new(
            Arc::new(resolver),
            Arc::new(dispatch),
            Arc::new(hierarchy),
            Arc::new(workflow),
            index_sync,
        );
        info!(
            index_sync = state.index_sync.is_some(),
            "Project core ready"
        );

        shutdown.wait().await;
        state.shutdown().await;
        pool.close().await;
        Ok(())
    })
    .await
}
