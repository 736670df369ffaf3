//! 层级树领域
//!
//! 部门、项目、模块、需求、任务都以 `full_path`（`/A/B/C`）物化整条祖先链。
//! 模块挂在项目下，需求挂在模块下，任务挂在需求下，挂载节点称为锚点，
//! 被挂载记录的路径以锚点路径为前缀。

mod filter;
mod node;
mod path;
mod policy;
mod repository;

pub use filter::NodeFilter;
pub use node::{NodeId, NodeKind, TreeNode};
pub use path::{ancestor_paths, child_path, is_within, rebase_path, validate_name};
pub use policy::{DeletePolicies, DeletePolicy};
pub use repository::TreeRepository;
