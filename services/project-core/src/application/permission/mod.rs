//! 权限应用服务

mod dispatch;
mod resolver;

pub use dispatch::PermissionDispatchService;
pub use resolver::{AuthorizationDecision, DecisionSource, PermissionResolver};
