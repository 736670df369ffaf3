//! 服务启动器
//!
//! 提供统一的服务启动模式

use std::future::Future;

use pm_config::AppConfig;
use pm_errors::AppResult;
use pm_telemetry::init_metrics;
use tracing::{info, warn};

use crate::infrastructure::Infrastructure;
use crate::runtime::{init_runtime, shutdown_signal};
use crate::shutdown::ShutdownController;

/// 运行服务
///
/// 1. 加载 `.env` 与配置
/// 2. 初始化日志与 Prometheus recorder
/// 3. 创建基础设施资源
/// 4. 安装关闭信号监听
/// 5. 调用 `service` 完成装配并运行，直到其返回
///
/// ```ignore
/// run("config", |infra, shutdown| async move {
///     let service = MyService::new(infra.postgres_pool());
///     shutdown.wait().await;
///     service.drain().await;
///     Ok(())
/// })
/// .await
/// ```
pub async fn run<F, Fut>(config_dir: &str, service: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(Infrastructure, ShutdownController) -> Fut,
    Fut: Future<Output = AppResult<()>>,
{
    // .env 可选
    dotenvy::dotenv().ok();

    let config = AppConfig::load(config_dir)?;
    init_runtime(&config);

    info!("Starting {} service", config.app_name);

    // 测试等场景下 recorder 可能已安装，失败不影响服务运行
    let _metrics_handle = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics recorder not installed");
            None
        }
    };

    let infra = Infrastructure::from_config(config).await?;

    let health = infra.health_check().await;
    for check in &health.checks {
        info!(name = %check.name, healthy = check.healthy, "Dependency health");
    }

    let shutdown = ShutdownController::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.shutdown();
    });

    service(infra, shutdown).await?;

    info!("Service stopped");

    Ok(())
}
