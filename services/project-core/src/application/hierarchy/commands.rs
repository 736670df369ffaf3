use crate::domain::hierarchy::{DeletePolicy, NodeId, NodeKind, TreeNode};

/// 创建节点
#[derive(Debug, Clone)]
pub struct CreateNodeCommand {
    pub kind: NodeKind,
    pub name: String,
    /// 同种类父节点
    pub parent_id: Option<NodeId>,
    /// 根节点的锚点，有父节点时沿用父节点的锚点
    pub anchor_id: Option<NodeId>,
}

impl CreateNodeCommand {
    pub fn root(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parent_id: None,
            anchor_id: None,
        }
    }

    pub fn child(kind: NodeKind, parent_id: NodeId, name: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::root(kind, name)
        }
    }

    pub fn anchored(kind: NodeKind, anchor_id: NodeId, name: impl Into<String>) -> Self {
        Self {
            anchor_id: Some(anchor_id),
            ..Self::root(kind, name)
        }
    }
}

/// 移动或改名，父节点与名称都未变化时不做结构修改
#[derive(Debug, Clone)]
pub struct MoveNodeCommand {
    pub kind: NodeKind,
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub anchor_id: Option<NodeId>,
    pub name: String,
    pub expected_version: Option<i64>,
}

impl MoveNodeCommand {
    /// 基于当前节点构造，保持位置与名称
    pub fn from_node(node: &TreeNode) -> Self {
        Self {
            kind: node.kind,
            id: node.id,
            parent_id: node.parent_id,
            anchor_id: node.anchor_id,
            name: node.name.clone(),
            expected_version: Some(node.version),
        }
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn under(mut self, parent_id: Option<NodeId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn anchored(mut self, anchor_id: Option<NodeId>) -> Self {
        self.anchor_id = anchor_id;
        self
    }

    pub fn any_version(mut self) -> Self {
        self.expected_version = None;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub node: TreeNode,
    /// 是否发生了路径变化
    pub structural: bool,
    /// 被改写路径的后代及挂载记录数
    pub rewritten: u64,
}

#[derive(Debug, Clone)]
pub struct DeleteNodeCommand {
    pub kind: NodeKind,
    pub id: NodeId,
    pub expected_version: Option<i64>,
}

impl DeleteNodeCommand {
    pub fn new(kind: NodeKind, id: NodeId) -> Self {
        Self {
            kind,
            id,
            expected_version: None,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub policy: DeletePolicy,
    /// 被删除的记录，含节点自身
    pub deleted: Vec<(NodeKind, NodeId)>,
}
