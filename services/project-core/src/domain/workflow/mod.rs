//! 工作流领域
//!
//! 问题、需求、模块三类实体的状态机。迁移表之外的目标状态一律视为非法。

mod issue;
mod machine;
mod module;
mod repository;
mod requirement;

pub use issue::{IssueChange, IssueRecord, IssueStatus, IssueTransitionExtra};
pub use machine::{StatusMachine, TransitionDecision, WorkflowEntityKind, decide};
pub use module::{ModuleRecord, ModuleStatus};
pub use repository::WorkflowRepository;
pub use requirement::{RequirementRecord, RequirementStatus};
