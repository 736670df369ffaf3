//! project-core - 项目管理后端核心
//!
//! 资源权限判定、层级路径维护、状态工作流与搜索索引同步

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;

#[cfg(test)]
mod testing;
