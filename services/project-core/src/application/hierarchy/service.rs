//! 层级路径管理
//!
//! 节点的 `full_path` 始终等于父节点（或锚点）路径加 `/name`。
//! 创建、移动、删除都在单个事务内完成：节点自身、同种类后代、
//! 以路径为前缀的挂载记录以及父节点的子节点计数一起提交或一起回滚。
//! 项目、模块、需求、任务共用一个路径空间，任一路径只属于一个节点。

use metrics::counter;
use pm_common::{IdGenerator, PagedResult, Pagination};
use pm_errors::AppResult;
use std::sync::Arc;
use tracing::{debug, info};

use super::commands::{
    CreateNodeCommand, DeleteNodeCommand, DeleteOutcome, MoveNodeCommand, MoveOutcome,
};
use crate::domain::hierarchy::{
    DeletePolicies, DeletePolicy, NodeFilter, NodeId, NodeKind, TreeNode, TreeRepository,
    child_path, is_within, validate_name,
};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory, finish};
use crate::error::ProjectError;

/// 新路径的挂载基准
struct Placement {
    parent: Option<TreeNode>,
    base_path: Option<String>,
    anchor_id: Option<NodeId>,
}

pub struct HierarchyPathManager {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    ids: Arc<dyn IdGenerator>,
    policies: DeletePolicies,
}

impl HierarchyPathManager {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            uow_factory,
            ids,
            policies: DeletePolicies::default(),
        }
    }

    pub fn with_policies(mut self, policies: DeletePolicies) -> Self {
        self.policies = policies;
        self
    }

    /// 创建节点
    pub async fn create(&self, mut cmd: CreateNodeCommand) -> AppResult<TreeNode> {
        cmd.name = cmd.name.trim().to_string();
        validate_name(cmd.kind, &cmd.name)?;
        if cmd.anchor_id.is_some() && cmd.kind.anchor_kind().is_none() {
            return Err(ProjectError::AnchorNotSupported(cmd.kind).into());
        }

        let uow = self.uow_factory.begin().await?;
        let result = self.create_in(uow.as_ref(), &cmd).await;
        let node = finish(uow, result).await?;

        counter!("hierarchy_operations_total", "kind" => cmd.kind.as_str(), "op" => "create")
            .increment(1);
        info!(kind = %node.kind, id = node.id, path = %node.full_path, "Node created");
        Ok(node)
    }

    /// 移动或改名，级联改写后代与挂载记录的路径
    pub async fn move_node(&self, mut cmd: MoveNodeCommand) -> AppResult<MoveOutcome> {
        cmd.name = cmd.name.trim().to_string();
        validate_name(cmd.kind, &cmd.name)?;
        if cmd.anchor_id.is_some() && cmd.kind.anchor_kind().is_none() {
            return Err(ProjectError::AnchorNotSupported(cmd.kind).into());
        }

        let uow = self.uow_factory.begin().await?;
        let result = self.move_in(uow.as_ref(), &cmd).await;
        let outcome = finish(uow, result).await?;

        if outcome.structural {
            counter!("hierarchy_operations_total", "kind" => cmd.kind.as_str(), "op" => "move")
                .increment(1);
            info!(
                kind = %cmd.kind,
                id = cmd.id,
                path = %outcome.node.full_path,
                rewritten = outcome.rewritten,
                "Node moved"
            );
        }
        Ok(outcome)
    }

    /// 按种类的删除策略删除节点
    pub async fn delete(&self, cmd: DeleteNodeCommand) -> AppResult<DeleteOutcome> {
        let uow = self.uow_factory.begin().await?;
        let result = self.delete_in(uow.as_ref(), &cmd).await;
        let outcome = finish(uow, result).await?;

        counter!("hierarchy_operations_total", "kind" => cmd.kind.as_str(), "op" => "delete")
            .increment(1);
        info!(
            kind = %cmd.kind,
            id = cmd.id,
            deleted = outcome.deleted.len(),
            "Node deleted"
        );
        Ok(outcome)
    }

    pub async fn get(&self, kind: NodeKind, id: NodeId) -> AppResult<Option<TreeNode>> {
        let uow = self.uow_factory.begin().await?;
        let result = uow.trees().find_node(kind, id).await;
        finish(uow, result).await
    }

    /// 按条件分页查询
    pub async fn list(
        &self,
        filter: &NodeFilter,
        pagination: &Pagination,
    ) -> AppResult<PagedResult<TreeNode>> {
        let uow = self.uow_factory.begin().await?;
        let result = uow.trees().find_nodes(filter, pagination).await;
        let (items, total) = finish(uow, result).await?;
        Ok(PagedResult::new(items, total, pagination))
    }

    async fn create_in(&self, uow: &dyn UnitOfWork, cmd: &CreateNodeCommand) -> AppResult<TreeNode> {
        let trees = uow.trees();
        let placement = Self::resolve_placement(trees, cmd.kind, cmd.parent_id, cmd.anchor_id).await?;

        let full_path = child_path(placement.base_path.as_deref(), &cmd.name);
        Self::ensure_path_free(trees, cmd.kind, &full_path, None).await?;

        let node = TreeNode {
            id: self.ids.next_id(),
            kind: cmd.kind,
            parent_id: placement.parent.as_ref().map(|p| p.id),
            anchor_id: placement.anchor_id,
            name: cmd.name.clone(),
            full_path,
            children_count: 0,
            version: 0,
        };
        trees.insert_node(&node).await?;

        // 校验父节点版本，父节点被并发改名时本事务冲突回滚
        if let Some(parent) = &placement.parent {
            trees
                .adjust_children_count(cmd.kind, parent.id, 1, Some(parent.version))
                .await?;
        }
        Ok(node)
    }

    async fn move_in(&self, uow: &dyn UnitOfWork, cmd: &MoveNodeCommand) -> AppResult<MoveOutcome> {
        let trees = uow.trees();
        let node = trees
            .find_node(cmd.kind, cmd.id)
            .await?
            .ok_or(ProjectError::NodeNotFound {
                kind: cmd.kind,
                id: cmd.id,
            })?;
        if let Some(expected) = cmd.expected_version
            && expected != node.version
        {
            return Err(ProjectError::version_conflict(cmd.kind, cmd.id, expected).into());
        }

        let same_anchor = cmd.parent_id.is_some() || cmd.anchor_id == node.anchor_id;
        if cmd.parent_id == node.parent_id && cmd.name == node.name && same_anchor {
            debug!(kind = %cmd.kind, id = cmd.id, "Move without structural change");
            return Ok(MoveOutcome {
                node,
                structural: false,
                rewritten: 0,
            });
        }

        if cmd.parent_id == Some(node.id) {
            return Err(ProjectError::CyclicMove {
                kind: cmd.kind,
                id: cmd.id,
            }
            .into());
        }
        let placement = Self::resolve_placement(trees, cmd.kind, cmd.parent_id, cmd.anchor_id).await?;
        if let Some(parent) = &placement.parent
            && is_within(&parent.full_path, &node.full_path)
        {
            return Err(ProjectError::CyclicMove {
                kind: cmd.kind,
                id: cmd.id,
            }
            .into());
        }

        let old_path = node.full_path.clone();
        let new_path = child_path(placement.base_path.as_deref(), &cmd.name);
        if new_path != old_path {
            Self::ensure_path_free(trees, cmd.kind, &new_path, Some(node.id)).await?;
        }

        let mut updated = node.clone();
        updated.parent_id = placement.parent.as_ref().map(|p| p.id);
        updated.anchor_id = placement.anchor_id;
        updated.name = cmd.name.clone();
        updated.full_path = new_path.clone();
        trees.update_structure(&updated, node.version).await?;
        updated.version = node.version + 1;

        let mut rewritten = 0;
        if new_path != old_path {
            rewritten += trees.rewrite_path_prefix(cmd.kind, &old_path, &new_path).await?;
            for dependent in cmd.kind.dependents() {
                rewritten += trees
                    .rewrite_path_prefix(*dependent, &old_path, &new_path)
                    .await?;
            }
        }
        if updated.anchor_id != node.anchor_id {
            trees
                .reassign_anchor(cmd.kind, &new_path, updated.anchor_id)
                .await?;
        }

        if updated.parent_id != node.parent_id {
            if let Some(old_parent) = node.parent_id {
                trees
                    .adjust_children_count(cmd.kind, old_parent, -1, None)
                    .await?;
            }
            if let Some(parent) = &placement.parent {
                trees
                    .adjust_children_count(cmd.kind, parent.id, 1, Some(parent.version))
                    .await?;
            }
        }

        Ok(MoveOutcome {
            node: updated,
            structural: true,
            rewritten,
        })
    }

    async fn delete_in(&self, uow: &dyn UnitOfWork, cmd: &DeleteNodeCommand) -> AppResult<DeleteOutcome> {
        let trees = uow.trees();
        let node = trees
            .find_node(cmd.kind, cmd.id)
            .await?
            .ok_or(ProjectError::NodeNotFound {
                kind: cmd.kind,
                id: cmd.id,
            })?;
        if let Some(expected) = cmd.expected_version
            && expected != node.version
        {
            return Err(ProjectError::version_conflict(cmd.kind, cmd.id, expected).into());
        }

        let policy = self.policies.for_kind(cmd.kind);
        let mut deleted = vec![(node.kind, node.id)];
        match policy {
            DeletePolicy::RejectIfChildren => {
                if node.children_count > 0 {
                    return Err(ProjectError::HasChildren {
                        kind: node.kind,
                        id: node.id,
                        children: node.children_count,
                    }
                    .into());
                }
                for dependent in node.kind.dependents() {
                    let count = trees.count_under_prefix(*dependent, &node.full_path).await?;
                    if count > 0 {
                        return Err(ProjectError::HasDependents {
                            kind: node.kind,
                            id: node.id,
                            dependent: *dependent,
                            count,
                        }
                        .into());
                    }
                }
                trees.delete_node(node.kind, node.id, node.version).await?;
            }
            DeletePolicy::Cascade => {
                trees.delete_node(node.kind, node.id, node.version).await?;
                for id in trees.delete_under_prefix(node.kind, &node.full_path).await? {
                    deleted.push((node.kind, id));
                }
                for dependent in node.kind.dependents() {
                    for id in trees.delete_under_prefix(*dependent, &node.full_path).await? {
                        deleted.push((*dependent, id));
                    }
                }
            }
        }

        if let Some(parent) = node.parent_id {
            trees
                .adjust_children_count(node.kind, parent, -1, None)
                .await?;
        }

        Ok(DeleteOutcome { policy, deleted })
    }

    /// 路径在整个路径空间内未被占用，`exclude` 只排除同种类的节点自身
    async fn ensure_path_free(
        trees: &dyn TreeRepository,
        kind: NodeKind,
        full_path: &str,
        exclude: Option<NodeId>,
    ) -> AppResult<()> {
        for other in kind.path_namespace() {
            let exclude = if *other == kind { exclude } else { None };
            if trees.path_exists(*other, full_path, exclude).await? {
                return Err(ProjectError::DuplicatePath {
                    kind: *other,
                    path: full_path.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    async fn resolve_placement(
        trees: &dyn TreeRepository,
        kind: NodeKind,
        parent_id: Option<NodeId>,
        anchor_id: Option<NodeId>,
    ) -> AppResult<Placement> {
        if let Some(parent_id) = parent_id {
            let parent = trees
                .find_node(kind, parent_id)
                .await?
                .ok_or(ProjectError::ParentNotFound { kind, id: parent_id })?;
            return Ok(Placement {
                base_path: Some(parent.full_path.clone()),
                anchor_id: parent.anchor_id,
                parent: Some(parent),
            });
        }

        if let Some(anchor_id) = anchor_id {
            let anchor_kind = kind
                .anchor_kind()
                .ok_or(ProjectError::AnchorNotSupported(kind))?;
            let anchor = trees
                .find_node(anchor_kind, anchor_id)
                .await?
                .ok_or(ProjectError::AnchorNotFound {
                    kind: anchor_kind,
                    id: anchor_id,
                })?;
            return Ok(Placement {
                parent: None,
                base_path: Some(anchor.full_path),
                anchor_id: Some(anchor_id),
            });
        }

        Ok(Placement {
            parent: None,
            base_path: None,
            anchor_id: None,
        })
    }
}
