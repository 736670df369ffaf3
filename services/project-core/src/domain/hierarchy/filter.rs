use super::{NodeId, NodeKind};

/// 节点列表查询条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFilter {
    pub kind: NodeKind,
    pub parent_id: Option<NodeId>,
    /// 只查根节点
    pub roots_only: bool,
    pub anchor_id: Option<NodeId>,
    /// 子树查询，包含该路径本身
    pub path_prefix: Option<String>,
    /// 名称模糊匹配
    pub name_contains: Option<String>,
}

impl NodeFilter {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent_id: None,
            roots_only: false,
            anchor_id: None,
            path_prefix: None,
            name_contains: None,
        }
    }

    pub fn with_parent(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn roots(mut self) -> Self {
        self.roots_only = true;
        self
    }

    pub fn with_anchor(mut self, anchor_id: NodeId) -> Self {
        self.anchor_id = Some(anchor_id);
        self
    }

    pub fn under_path(mut self, path: impl Into<String>) -> Self {
        self.path_prefix = Some(path.into());
        self
    }

    pub fn name_contains(mut self, keyword: impl Into<String>) -> Self {
        self.name_contains = Some(keyword.into());
        self
    }
}
