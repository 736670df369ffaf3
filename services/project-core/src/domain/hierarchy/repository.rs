use async_trait::async_trait;
use pm_common::Pagination;
use pm_errors::AppResult;

use super::{NodeFilter, NodeId, NodeKind, TreeNode};

/// 树节点仓储，在工作单元事务内使用
///
/// 带 `expected_version` 的写操作在版本不匹配（含记录已不存在）时返回 Conflict。
#[async_trait]
pub trait TreeRepository: Send + Sync {
    async fn find_node(&self, kind: NodeKind, id: NodeId) -> AppResult<Option<TreeNode>>;

    /// 同种类中是否已有该路径，`exclude` 用于排除节点自身
    async fn path_exists(
        &self,
        kind: NodeKind,
        full_path: &str,
        exclude: Option<NodeId>,
    ) -> AppResult<bool>;

    async fn insert_node(&self, node: &TreeNode) -> AppResult<()>;

    /// 写入 parent/anchor/name/full_path，版本号加一
    async fn update_structure(&self, node: &TreeNode, expected_version: i64) -> AppResult<()>;

    /// 调整子节点计数，版本号加一；给出 `expected_version` 时做版本校验
    async fn adjust_children_count(
        &self,
        kind: NodeKind,
        id: NodeId,
        delta: i64,
        expected_version: Option<i64>,
    ) -> AppResult<()>;

    /// 把 `kind` 中位于 `old_prefix` 之下（不含自身）的路径改写到 `new_prefix`，返回改写行数
    async fn rewrite_path_prefix(
        &self,
        kind: NodeKind,
        old_prefix: &str,
        new_prefix: &str,
    ) -> AppResult<u64>;

    /// 子树换锚点：`kind` 中位于 `prefix` 之下（不含自身）的节点改用 `anchor_id`
    async fn reassign_anchor(
        &self,
        kind: NodeKind,
        prefix: &str,
        anchor_id: Option<NodeId>,
    ) -> AppResult<u64>;

    /// `kind` 中位于 `prefix` 之下（不含自身）的记录数
    async fn count_under_prefix(&self, kind: NodeKind, prefix: &str) -> AppResult<i64>;

    /// 删除 `kind` 中位于 `prefix` 之下（不含自身）的记录，返回被删除的 ID
    async fn delete_under_prefix(&self, kind: NodeKind, prefix: &str) -> AppResult<Vec<NodeId>>;

    async fn delete_node(&self, kind: NodeKind, id: NodeId, expected_version: i64) -> AppResult<()>;

    /// 按条件分页查询，返回 (节点, 总数)，按 full_path 排序
    async fn find_nodes(
        &self,
        filter: &NodeFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<TreeNode>, u64)>;
}
