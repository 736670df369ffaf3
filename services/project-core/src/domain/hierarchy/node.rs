use serde::{Deserialize, Serialize};
use std::fmt;

pub type NodeId = i64;

/// 树节点种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Department,
    Project,
    Module,
    Requirement,
    Task,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Department,
        NodeKind::Project,
        NodeKind::Module,
        NodeKind::Requirement,
        NodeKind::Task,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::Project => "project",
            Self::Module => "module",
            Self::Requirement => "requirement",
            Self::Task => "task",
        }
    }

    /// 根节点可挂载的锚点种类
    pub fn anchor_kind(self) -> Option<NodeKind> {
        match self {
            Self::Module => Some(Self::Project),
            Self::Requirement => Some(Self::Module),
            Self::Task => Some(Self::Requirement),
            Self::Department | Self::Project => None,
        }
    }

    /// 共享同一路径空间的种类，同一路径在其中只能出现一次。
    /// 挂载记录按路径前缀随锚点改写或删除，路径唯一才能保证前缀只对应一条锚点链。
    pub fn path_namespace(self) -> &'static [NodeKind] {
        match self {
            Self::Department => &[Self::Department],
            Self::Project | Self::Module | Self::Requirement | Self::Task => {
                &[Self::Project, Self::Module, Self::Requirement, Self::Task]
            }
        }
    }

    /// 路径以本种类节点路径为前缀的其他种类，改名或删除时需要一起处理
    pub fn dependents(self) -> &'static [NodeKind] {
        match self {
            Self::Project => &[Self::Module, Self::Requirement, Self::Task],
            Self::Module => &[Self::Requirement, Self::Task],
            Self::Requirement => &[Self::Task],
            Self::Department | Self::Task => &[],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 树节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// 同种类父节点，根节点为 None
    pub parent_id: Option<NodeId>,
    /// 锚点，整棵子树共享根节点的锚点
    pub anchor_id: Option<NodeId>,
    pub name: String,
    pub full_path: String,
    pub children_count: i64,
    /// 乐观锁版本号，每次结构变化递增
    pub version: i64,
}

impl TreeNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_chain() {
        assert_eq!(NodeKind::Task.anchor_kind(), Some(NodeKind::Requirement));
        assert_eq!(NodeKind::Requirement.anchor_kind(), Some(NodeKind::Module));
        assert_eq!(NodeKind::Module.anchor_kind(), Some(NodeKind::Project));
        assert_eq!(NodeKind::Department.anchor_kind(), None);
    }

    #[test]
    fn test_dependents_share_path_namespace() {
        for kind in NodeKind::ALL {
            assert!(kind.path_namespace().contains(&kind));
            for dependent in kind.dependents() {
                assert!(kind.path_namespace().contains(dependent));
            }
        }
        assert_eq!(NodeKind::Department.path_namespace(), &[NodeKind::Department]);
    }

    #[test]
    fn test_dependents_follow_anchor_chain() {
        for kind in NodeKind::ALL {
            for dependent in kind.dependents() {
                let mut anchor = dependent.anchor_kind();
                let mut reached = false;
                while let Some(current) = anchor {
                    if current == kind {
                        reached = true;
                        break;
                    }
                    anchor = current.anchor_kind();
                }
                assert!(reached, "{} should anchor under {}", dependent, kind);
            }
        }
    }
}
