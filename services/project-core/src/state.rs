//! 应用状态，供对外接口层共享

use std::sync::Arc;

use tracing::info;

use crate::application::hierarchy::HierarchyPathManager;
use crate::application::index_sync::AsyncIndexSync;
use crate::application::permission::{PermissionDispatchService, PermissionResolver};
use crate::application::workflow::WorkflowEngine;
use crate::infrastructure::persistence::PostgresPermissionRepository;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<PermissionResolver<PostgresPermissionRepository>>,
    pub dispatch: Arc<PermissionDispatchService>,
    pub hierarchy: Arc<HierarchyPathManager>,
    pub workflow: Arc<WorkflowEngine>,
    /// 未配置搜索引擎时为 None
    pub index_sync: Option<Arc<AsyncIndexSync>>,
}

impl AppState {
    pub fn new(
        resolver: Arc<PermissionResolver<PostgresPermissionRepository>>,
        dispatch: Arc<PermissionDispatchService>,
        hierarchy: Arc<HierarchyPathManager>,
        workflow: Arc<WorkflowEngine>,
        index_sync: Option<Arc<AsyncIndexSync>>,
    ) -> Self {
        Self {
            resolver,
            dispatch,
            hierarchy,
            workflow,
            index_sync,
        }
    }

    /// 等待索引同步队列排空
    pub async fn shutdown(&self) {
        if let Some(index_sync) = &self.index_sync {
            index_sync.shutdown().await;
            let stats = index_sync.stats();
            info!(
                succeeded = stats.succeeded,
                failed = stats.failed,
                dropped = stats.dropped,
                "Index sync drained"
            );
        }
    }
}
