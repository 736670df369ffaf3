//! 层级路径维护

mod commands;
mod service;

pub use commands::{CreateNodeCommand, DeleteNodeCommand, DeleteOutcome, MoveNodeCommand, MoveOutcome};
pub use service::HierarchyPathManager;
