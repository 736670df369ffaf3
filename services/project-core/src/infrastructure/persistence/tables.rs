//! 节点种类到表结构的映射

use crate::domain::hierarchy::{NodeId, NodeKind, TreeNode};

pub(crate) struct TableSpec {
    pub table: &'static str,
    /// 锚点外键列
    pub anchor_column: Option<&'static str>,
}

impl TableSpec {
    pub fn of(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Department => Self {
                table: "t_department",
                anchor_column: None,
            },
            NodeKind::Project => Self {
                table: "t_project",
                anchor_column: None,
            },
            NodeKind::Module => Self {
                table: "t_project_module",
                anchor_column: Some("project_id"),
            },
            NodeKind::Requirement => Self {
                table: "t_project_requirement",
                anchor_column: Some("module_id"),
            },
            NodeKind::Task => Self {
                table: "t_project_task",
                anchor_column: Some("requirement_id"),
            },
        }
    }

    /// 统一列名的 SELECT 列表
    pub fn select_columns(&self) -> String {
        let anchor = self.anchor_column.unwrap_or("NULL::BIGINT");
        format!(
            "id, parent_id, {} AS anchor_id, name, full_path, children_count, version",
            anchor
        )
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct NodeRow {
    pub id: NodeId,
    pub parent_id: Option<NodeId>,
    pub anchor_id: Option<NodeId>,
    pub name: String,
    pub full_path: String,
    pub children_count: i64,
    pub version: i64,
}

impl NodeRow {
    pub fn into_node(self, kind: NodeKind) -> TreeNode {
        TreeNode {
            id: self.id,
            kind,
            parent_id: self.parent_id,
            anchor_id: self.anchor_id,
            name: self.name,
            full_path: self.full_path,
            children_count: self.children_count,
            version: self.version,
        }
    }
}
