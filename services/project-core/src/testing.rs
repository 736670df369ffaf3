//! 测试用内存实现
//!
//! `InMemoryStore` 同时充当工作单元工厂、授权只读仓储与用户目录。
//! 事务串行执行：`begin` 独占整个状态，在副本上修改，提交时整体写回。

use async_trait::async_trait;
use parking_lot::Mutex;
use pm_common::{IdGenerator, Pagination, UserId};
use pm_errors::{AppError, AppResult};
use pm_ports::{CachePort, SetCachePort};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

use crate::domain::hierarchy::{
    NodeFilter, NodeId, NodeKind, TreeNode, TreeRepository, child_path, is_within,
};
use crate::domain::index::UserDirectory;
use crate::domain::permission::{GrantRepository, PermissionRepository, Role, RoleId};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};
use crate::domain::workflow::{
    IssueChange, IssueRecord, ModuleRecord, ModuleStatus, RequirementRecord, RequirementStatus,
    WorkflowRepository,
};
use crate::error::ProjectError;

// ============ 缓存 ============

/// 支持集合语义的内存缓存，每次操作先让出调度以便交错执行
#[derive(Default)]
pub struct MockCache {
    values: std::sync::Mutex<HashMap<String, String>>,
    sets: std::sync::Mutex<HashMap<String, BTreeSet<String>>>,
    ttls: std::sync::Mutex<HashMap<String, Duration>>,
    failing: AtomicBool,
}

impl MockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn members(&self, key: &str) -> Vec<String> {
        self.sets
            .lock()
            .unwrap()
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.ttls.lock().unwrap().get(key).copied()
    }

    pub fn put_members(&self, key: &str, members: &[&str]) {
        self.sets.lock().unwrap().insert(
            key.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
    }

    async fn enter(&self) -> AppResult<()> {
        tokio::task::yield_now().await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::internal("Mock cache error"));
        }
        Ok(())
    }
}

#[async_trait]
impl CachePort for MockCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.enter().await?;
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.enter().await?;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        if let Some(ttl) = ttl {
            self.ttls.lock().unwrap().insert(key.to_string(), ttl);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.enter().await?;
        self.values.lock().unwrap().remove(key);
        self.sets.lock().unwrap().remove(key);
        self.ttls.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.enter().await?;
        Ok(self.values.lock().unwrap().contains_key(key)
            || self.sets.lock().unwrap().contains_key(key))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        self.enter().await?;
        self.ttls.lock().unwrap().insert(key.to_string(), ttl);
        Ok(())
    }
}

#[async_trait]
impl SetCachePort for MockCache {
    async fn set_add(&self, key: &str, members: &[String]) -> AppResult<()> {
        self.enter().await?;
        if members.is_empty() {
            return Ok(());
        }
        self.sets
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .extend(members.iter().cloned());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        self.enter().await?;
        Ok(self.members(key))
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> AppResult<()> {
        self.enter().await?;
        let mut sets = self.sets.lock().unwrap();
        if let Some(set) = sets.get_mut(key) {
            for member in members {
                set.remove(member);
            }
            if set.is_empty() {
                sets.remove(key);
            }
        }
        Ok(())
    }
}

// ============ ID ============

/// 自增 ID
pub struct SequenceIds(AtomicI64);

impl SequenceIds {
    pub fn starting_at(first: i64) -> Self {
        Self(AtomicI64::new(first))
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

// ============ 存储 ============

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub roles: HashMap<RoleId, Role>,
    pub role_codes: HashMap<RoleId, Vec<String>>,
    pub user_roles: HashMap<UserId, Vec<RoleId>>,
    pub users: HashMap<i64, String>,
    pub nodes: BTreeMap<(NodeKind, NodeId), TreeNode>,
    pub module_status: HashMap<NodeId, ModuleStatus>,
    pub requirements: HashMap<i64, RequirementRecord>,
    pub issues: HashMap<i64, IssueRecord>,
}

impl MemoryState {
    fn node_mut(&mut self, kind: NodeKind, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(&(kind, id))
    }

    fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values().filter(move |n| n.kind == kind)
    }
}

#[derive(Default)]
struct ReadCounters {
    user_roles: AtomicUsize,
    role_codes: AtomicUsize,
    roles: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<tokio::sync::Mutex<MemoryState>>,
    fail_rewrites: Arc<AtomicBool>,
    reads: Arc<ReadCounters>,
    commits: Arc<AtomicUsize>,
    rollbacks: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, f: impl FnOnce(&mut MemoryState)) {
        f(&mut *self.state.lock().await);
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn add_role(&self, role: Role) {
        self.state.lock().await.roles.insert(role.id, role);
    }

    pub async fn grant(&self, role_id: RoleId, codes: &[&str]) {
        self.state
            .lock()
            .await
            .role_codes
            .insert(role_id, codes.iter().map(|c| c.to_string()).collect());
    }

    pub async fn assign(&self, user_id: UserId, role_ids: &[RoleId]) {
        self.state
            .lock()
            .await
            .user_roles
            .insert(user_id, role_ids.to_vec());
    }

    /// 按父节点或锚点计算路径后直接写入，不维护父节点计数
    pub async fn insert_node(
        &self,
        kind: NodeKind,
        id: NodeId,
        parent_id: Option<NodeId>,
        anchor_id: Option<NodeId>,
        name: &str,
    ) -> TreeNode {
        let mut state = self.state.lock().await;
        let base = match (parent_id, anchor_id, kind.anchor_kind()) {
            (Some(parent), _, _) => state.nodes.get(&(kind, parent)).map(|p| p.full_path.clone()),
            (None, Some(anchor), Some(anchor_kind)) => state
                .nodes
                .get(&(anchor_kind, anchor))
                .map(|a| a.full_path.clone()),
            _ => None,
        };
        let node = TreeNode {
            id,
            kind,
            parent_id,
            anchor_id,
            name: name.to_string(),
            full_path: child_path(base.as_deref(), name),
            children_count: 0,
            version: 0,
        };
        if let Some(parent) = parent_id
            && let Some(p) = state.node_mut(kind, parent)
        {
            p.children_count += 1;
        }
        state.nodes.insert((kind, id), node.clone());
        node
    }

    pub async fn node(&self, kind: NodeKind, id: NodeId) -> Option<TreeNode> {
        self.state.lock().await.nodes.get(&(kind, id)).cloned()
    }

    pub async fn paths_of(&self, kind: NodeKind) -> Vec<String> {
        let state = self.state.lock().await;
        let mut paths: Vec<String> = state.nodes_of(kind).map(|n| n.full_path.clone()).collect();
        paths.sort();
        paths
    }

    pub async fn module_status(&self, id: NodeId) -> Option<ModuleStatus> {
        self.state.lock().await.module_status.get(&id).copied()
    }

    pub async fn issue(&self, id: i64) -> Option<IssueRecord> {
        self.state.lock().await.issues.get(&id).cloned()
    }

    pub async fn role_codes(&self, role_id: RoleId) -> Vec<String> {
        self.state
            .lock()
            .await
            .role_codes
            .get(&role_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn user_roles(&self, user_id: UserId) -> Vec<RoleId> {
        self.state
            .lock()
            .await
            .user_roles
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// 路径改写时注入数据库错误
    pub fn fail_path_rewrites(&self, fail: bool) {
        self.fail_rewrites.store(fail, Ordering::SeqCst);
    }

    pub fn user_role_reads(&self) -> usize {
        self.reads.user_roles.load(Ordering::SeqCst)
    }

    pub fn role_code_reads(&self) -> usize {
        self.reads.role_codes.load(Ordering::SeqCst)
    }

    pub fn role_reads(&self) -> usize {
        self.reads.roles.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working: Mutex::new(working),
            fail_rewrites: self.fail_rewrites.clone(),
            commits: self.commits.clone(),
            rollbacks: self.rollbacks.clone(),
        }))
    }
}

#[async_trait]
impl PermissionRepository for InMemoryStore {
    async fn find_user_role_ids(&self, user_id: UserId) -> AppResult<Vec<RoleId>> {
        self.reads.user_roles.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        let mut ids = state.user_roles.get(&user_id).cloned().unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    async fn find_role_codes(&self, role_id: RoleId) -> AppResult<Vec<String>> {
        self.reads.role_codes.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        Ok(state.role_codes.get(&role_id).cloned().unwrap_or_default())
    }

    async fn find_enabled_roles(&self, ids: &[RoleId]) -> AppResult<Vec<Role>> {
        self.reads.roles.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.roles.get(id))
            .filter(|r| r.is_enabled())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn display_names(&self, ids: &[UserId]) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.users.get(&id.0).cloned()).collect())
    }
}

// ============ 事务 ============

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: Mutex<MemoryState>,
    fail_rewrites: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
    rollbacks: Arc<AtomicUsize>,
}

fn version_conflict(entity: impl ToString, id: i64, expected: i64) -> AppError {
    ProjectError::version_conflict(entity, id, expected).into()
}

#[async_trait]
impl UnitOfWork for MemoryTx {
    fn grants(&self) -> &dyn GrantRepository {
        self
    }

    fn trees(&self) -> &dyn TreeRepository {
        self
    }

    fn workflows(&self) -> &dyn WorkflowRepository {
        self
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTx {
            mut guard,
            working,
            commits,
            ..
        } = *self;
        *guard = working.into_inner();
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl GrantRepository for MemoryTx {
    async fn role_exists(&self, role_id: RoleId) -> AppResult<bool> {
        tokio::task::yield_now().await;
        Ok(self.working.lock().roles.contains_key(&role_id))
    }

    async fn replace_role_codes(&self, role_id: RoleId, codes: &[String]) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.working.lock().role_codes.insert(role_id, codes.to_vec());
        Ok(())
    }

    async fn replace_user_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.working.lock().user_roles.insert(user_id, role_ids.to_vec());
        Ok(())
    }
}

fn under(path: &str, prefix: &str) -> bool {
    path.len() > prefix.len() && is_within(path, prefix)
}

#[async_trait]
impl TreeRepository for MemoryTx {
    async fn find_node(&self, kind: NodeKind, id: NodeId) -> AppResult<Option<TreeNode>> {
        tokio::task::yield_now().await;
        Ok(self.working.lock().nodes.get(&(kind, id)).cloned())
    }

    async fn path_exists(
        &self,
        kind: NodeKind,
        full_path: &str,
        exclude: Option<NodeId>,
    ) -> AppResult<bool> {
        tokio::task::yield_now().await;
        let state = self.working.lock();
        let exists = state
            .nodes_of(kind)
            .any(|n| n.full_path == full_path && Some(n.id) != exclude);
        Ok(exists)
    }

    async fn insert_node(&self, node: &TreeNode) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.working.lock();
        if state.nodes_of(node.kind).any(|n| n.full_path == node.full_path) {
            return Err(AppError::conflict("Unique constraint violated"));
        }
        state.nodes.insert((node.kind, node.id), node.clone());
        Ok(())
    }

    async fn update_structure(&self, node: &TreeNode, expected_version: i64) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.working.lock();
        match state.node_mut(node.kind, node.id) {
            Some(stored) if stored.version == expected_version => {
                stored.parent_id = node.parent_id;
                stored.anchor_id = node.anchor_id;
                stored.name = node.name.clone();
                stored.full_path = node.full_path.clone();
                stored.version += 1;
                Ok(())
            }
            _ => Err(version_conflict(node.kind, node.id, expected_version)),
        }
    }

    async fn adjust_children_count(
        &self,
        kind: NodeKind,
        id: NodeId,
        delta: i64,
        expected_version: Option<i64>,
    ) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.working.lock();
        match state.node_mut(kind, id) {
            Some(stored) if expected_version.is_none_or(|v| v == stored.version) => {
                stored.children_count = (stored.children_count + delta).max(0);
                stored.version += 1;
                Ok(())
            }
            _ => Err(version_conflict(kind, id, expected_version.unwrap_or(-1))),
        }
    }

    async fn rewrite_path_prefix(
        &self,
        kind: NodeKind,
        old_prefix: &str,
        new_prefix: &str,
    ) -> AppResult<u64> {
        tokio::task::yield_now().await;
        if self.fail_rewrites.load(Ordering::SeqCst) {
            return Err(AppError::database("Injected rewrite failure"));
        }
        let mut state = self.working.lock();
        let mut rewritten = 0;
        for node in state.nodes.values_mut().filter(|n| n.kind == kind) {
            if under(&node.full_path, old_prefix) {
                node.full_path = format!("{}{}", new_prefix, &node.full_path[old_prefix.len()..]);
                node.version += 1;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    async fn reassign_anchor(
        &self,
        kind: NodeKind,
        prefix: &str,
        anchor_id: Option<NodeId>,
    ) -> AppResult<u64> {
        tokio::task::yield_now().await;
        if kind.anchor_kind().is_none() {
            return Ok(0);
        }
        let mut state = self.working.lock();
        let mut updated = 0;
        for node in state.nodes.values_mut().filter(|n| n.kind == kind) {
            if under(&node.full_path, prefix) {
                node.anchor_id = anchor_id;
                node.version += 1;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count_under_prefix(&self, kind: NodeKind, prefix: &str) -> AppResult<i64> {
        tokio::task::yield_now().await;
        let state = self.working.lock();
        Ok(state.nodes_of(kind).filter(|n| under(&n.full_path, prefix)).count() as i64)
    }

    async fn delete_under_prefix(&self, kind: NodeKind, prefix: &str) -> AppResult<Vec<NodeId>> {
        tokio::task::yield_now().await;
        let mut state = self.working.lock();
        let ids: Vec<NodeId> = state
            .nodes_of(kind)
            .filter(|n| under(&n.full_path, prefix))
            .map(|n| n.id)
            .collect();
        for id in &ids {
            state.nodes.remove(&(kind, *id));
        }
        Ok(ids)
    }

    async fn delete_node(&self, kind: NodeKind, id: NodeId, expected_version: i64) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.working.lock();
        match state.nodes.get(&(kind, id)) {
            Some(stored) if stored.version == expected_version => {
                state.nodes.remove(&(kind, id));
                Ok(())
            }
            _ => Err(version_conflict(kind, id, expected_version)),
        }
    }

    async fn find_nodes(
        &self,
        filter: &NodeFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<TreeNode>, u64)> {
        tokio::task::yield_now().await;
        let state = self.working.lock();
        let mut matched: Vec<TreeNode> = state
            .nodes_of(filter.kind)
            .filter(|n| filter.parent_id.is_none_or(|p| n.parent_id == Some(p)))
            .filter(|n| !filter.roots_only || n.parent_id.is_none())
            .filter(|n| filter.anchor_id.is_none_or(|a| n.anchor_id == Some(a)))
            .filter(|n| {
                filter
                    .path_prefix
                    .as_deref()
                    .is_none_or(|p| is_within(&n.full_path, p))
            })
            .filter(|n| {
                filter.name_contains.as_deref().is_none_or(|k| {
                    n.name.to_lowercase().contains(&k.to_lowercase())
                })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.full_path.cmp(&b.full_path));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .collect();
        Ok((items, total))
    }
}

#[async_trait]
impl WorkflowRepository for MemoryTx {
    async fn find_issue(&self, id: i64) -> AppResult<Option<IssueRecord>> {
        tokio::task::yield_now().await;
        Ok(self.working.lock().issues.get(&id).cloned())
    }

    async fn apply_issue_change(
        &self,
        id: i64,
        expected_version: i64,
        change: &IssueChange,
    ) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.working.lock();
        match state.issues.get_mut(&id) {
            Some(record) if record.version == expected_version => {
                record.apply(change);
                Ok(())
            }
            _ => Err(version_conflict("issue", id, expected_version)),
        }
    }

    async fn find_requirement(&self, id: i64) -> AppResult<Option<RequirementRecord>> {
        tokio::task::yield_now().await;
        Ok(self.working.lock().requirements.get(&id).cloned())
    }

    async fn update_requirement_status(
        &self,
        id: i64,
        expected_version: i64,
        status: RequirementStatus,
    ) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.working.lock();
        match state.requirements.get_mut(&id) {
            Some(record) if record.version == expected_version => {
                record.status = status;
                record.version += 1;
                Ok(())
            }
            _ => Err(version_conflict("requirement", id, expected_version)),
        }
    }

    async fn find_module(&self, id: i64) -> AppResult<Option<ModuleRecord>> {
        tokio::task::yield_now().await;
        let state = self.working.lock();
        Ok(state.nodes.get(&(NodeKind::Module, id)).map(|node| ModuleRecord {
            id,
            status: state
                .module_status
                .get(&id)
                .copied()
                .unwrap_or(ModuleStatus::PendingReview),
            anchor_id: node.anchor_id,
            full_path: node.full_path.clone(),
            version: node.version,
        }))
    }

    async fn update_module_status(
        &self,
        id: i64,
        expected_version: i64,
        status: ModuleStatus,
    ) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.working.lock();
        match state.node_mut(NodeKind::Module, id) {
            Some(node) if node.version == expected_version => {
                node.version += 1;
                state.module_status.insert(id, status);
                Ok(())
            }
            _ => Err(version_conflict("module", id, expected_version)),
        }
    }

    async fn promote_modules(
        &self,
        anchor_id: Option<i64>,
        paths: &[String],
        target: ModuleStatus,
        keep: &[ModuleStatus],
    ) -> AppResult<u64> {
        tokio::task::yield_now().await;
        let mut state = self.working.lock();
        let ids: Vec<NodeId> = state
            .nodes_of(NodeKind::Module)
            .filter(|n| n.anchor_id == anchor_id && paths.contains(&n.full_path))
            .map(|n| n.id)
            .collect();

        let mut promoted = 0;
        for id in ids {
            let current = state
                .module_status
                .get(&id)
                .copied()
                .unwrap_or(ModuleStatus::PendingReview);
            if keep.contains(&current) {
                continue;
            }
            state.module_status.insert(id, target);
            if let Some(node) = state.node_mut(NodeKind::Module, id) {
                node.version += 1;
            }
            promoted += 1;
        }
        Ok(promoted)
    }
}
