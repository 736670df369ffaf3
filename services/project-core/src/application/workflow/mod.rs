//! 状态迁移

mod commands;
mod service;

pub use commands::{StatusTarget, TransitionCommand, TransitionOutcome};
pub use service::WorkflowEngine;
