//! Graceful Shutdown

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shutdown 控制器
///
/// 先触发后等待也能立即返回，不会丢失信号。
#[derive(Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发关闭
    pub fn shutdown(&self) {
        info!("Triggering shutdown");
        self.token.cancel();
    }

    /// 是否已触发关闭
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 等待关闭信号
    pub fn wait(&self) -> impl Future<Output = ()> + Send + '_ {
        self.token.cancelled()
    }
}
