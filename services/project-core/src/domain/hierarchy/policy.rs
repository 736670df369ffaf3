use pm_config::{DeleteMode, HierarchyConfig};

use super::NodeKind;

/// 删除策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// 仍有子节点或挂载记录时拒绝
    RejectIfChildren,
    /// 删除整棵子树及挂载记录
    Cascade,
}

impl From<DeleteMode> for DeletePolicy {
    fn from(mode: DeleteMode) -> Self {
        match mode {
            DeleteMode::RejectIfChildren => Self::RejectIfChildren,
            DeleteMode::Cascade => Self::Cascade,
        }
    }
}

/// 各节点种类的删除策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletePolicies {
    pub department: DeletePolicy,
    pub project: DeletePolicy,
    pub module: DeletePolicy,
    pub requirement: DeletePolicy,
    pub task: DeletePolicy,
}

impl DeletePolicies {
    pub fn uniform(policy: DeletePolicy) -> Self {
        Self {
            department: policy,
            project: policy,
            module: policy,
            requirement: policy,
            task: policy,
        }
    }

    pub fn for_kind(&self, kind: NodeKind) -> DeletePolicy {
        match kind {
            NodeKind::Department => self.department,
            NodeKind::Project => self.project,
            NodeKind::Module => self.module,
            NodeKind::Requirement => self.requirement,
            NodeKind::Task => self.task,
        }
    }
}

impl Default for DeletePolicies {
    fn default() -> Self {
        Self::from(&HierarchyConfig::default())
    }
}

impl From<&HierarchyConfig> for DeletePolicies {
    fn from(config: &HierarchyConfig) -> Self {
        Self {
            department: config.department_delete.into(),
            project: config.project_delete.into(),
            module: config.module_delete.into(),
            requirement: config.requirement_delete.into(),
            task: config.task_delete.into(),
        }
    }
}
