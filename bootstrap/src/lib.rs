//! pm-bootstrap - 统一服务启动骨架
//!
//! 加载配置、初始化日志与指标、连接基础设施，并处理优雅关闭

mod infrastructure;
mod runtime;
mod shutdown;
mod starter;

pub use infrastructure::*;
pub use runtime::*;
pub use shutdown::*;
pub use starter::*;
