//! 事务内仓储
//!
//! 共享同一个事务而不是连接池。带版本号的更新影响行数为 0 时返回 Conflict。

use async_trait::async_trait;
use pm_common::{Pagination, UserId, now_millis};
use pm_errors::{AppError, AppResult};
use sqlx::{Postgres, QueryBuilder, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::error_mapper::map_sqlx_error;
use super::tables::{NodeRow, TableSpec};
use crate::domain::hierarchy::{NodeFilter, NodeId, NodeKind, TreeNode, TreeRepository};
use crate::domain::permission::{GrantRepository, RoleId};
use crate::domain::workflow::{
    IssueChange, IssueRecord, IssueStatus, ModuleRecord, ModuleStatus, RequirementRecord,
    RequirementStatus, StatusMachine, WorkflowRepository,
};
use crate::error::ProjectError;

/// Shared transaction type
pub type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// Macro to define a TxRepository structure
macro_rules! define_tx_repo {
    ($name:ident) => {
        pub struct $name {
            tx: SharedTx,
        }

        impl $name {
            pub fn new(tx: SharedTx) -> Self {
                Self { tx }
            }
        }
    };
}

define_tx_repo!(TxGrantRepository);
define_tx_repo!(TxTreeRepository);
define_tx_repo!(TxWorkflowRepository);

/// 取出事务，已提交或回滚后返回错误
macro_rules! active_tx {
    ($guard:ident) => {
        $guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?
    };
}

fn status_code_error(entity: &str, code: i16) -> AppError {
    AppError::internal(format!("Unknown {} status code {}", entity, code))
}

// ============ 授权 ============

#[async_trait]
impl GrantRepository for TxGrantRepository {
    async fn role_exists(&self, role_id: RoleId) -> AppResult<bool> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM t_role WHERE id = $1)")
            .bind(role_id.0)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.0)
    }

    async fn replace_role_codes(&self, role_id: RoleId, codes: &[String]) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query("DELETE FROM t_role_resource WHERE role_id = $1")
            .bind(role_id.0)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        if !codes.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO t_role_resource (role_id, resource_code)
                SELECT $1, UNNEST($2::VARCHAR[])
                "#,
            )
            .bind(role_id.0)
            .bind(codes)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        Ok(())
    }

    async fn replace_user_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query("DELETE FROM t_user_role WHERE user_id = $1")
            .bind(user_id.0)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        if !role_ids.is_empty() {
            let ids: Vec<i64> = role_ids.iter().map(|id| id.0).collect();
            sqlx::query(
                r#"
                INSERT INTO t_user_role (user_id, role_id)
                SELECT $1, UNNEST($2::BIGINT[])
                "#,
            )
            .bind(user_id.0)
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        Ok(())
    }
}

// ============ 树节点 ============

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &NodeFilter, spec: &TableSpec) {
    qb.push(" WHERE TRUE");
    if let Some(parent_id) = filter.parent_id {
        qb.push(" AND parent_id = ").push_bind(parent_id);
    }
    if filter.roots_only {
        qb.push(" AND parent_id IS NULL");
    }
    if let Some(anchor_id) = filter.anchor_id {
        match spec.anchor_column {
            Some(column) => {
                qb.push(format!(" AND {} = ", column)).push_bind(anchor_id);
            }
            None => {
                qb.push(" AND FALSE");
            }
        }
    }
    if let Some(prefix) = &filter.path_prefix {
        qb.push(" AND (full_path = ")
            .push_bind(prefix.clone())
            .push(" OR starts_with(full_path, ")
            .push_bind(format!("{}/", prefix))
            .push("))");
    }
    if let Some(keyword) = &filter.name_contains {
        let escaped = keyword
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        qb.push(" AND name ILIKE ")
            .push_bind(format!("%{}%", escaped));
    }
}

#[async_trait]
impl TreeRepository for TxTreeRepository {
    async fn find_node(&self, kind: NodeKind, id: NodeId) -> AppResult<Option<TreeNode>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(kind);

        let sql = format!("SELECT {} FROM {} WHERE id = $1", spec.select_columns(), spec.table);
        let row = sqlx::query_as::<_, NodeRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|r| r.into_node(kind)))
    }

    async fn path_exists(
        &self,
        kind: NodeKind,
        full_path: &str,
        exclude: Option<NodeId>,
    ) -> AppResult<bool> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(kind);

        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE full_path = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
            spec.table
        );
        let row: (bool,) = sqlx::query_as(&sql)
            .bind(full_path)
            .bind(exclude)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.0)
    }

    async fn insert_node(&self, node: &TreeNode) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(node.kind);
        let now = now_millis();

        let sql = match spec.anchor_column {
            Some(column) => format!(
                r#"
                INSERT INTO {} (id, parent_id, name, full_path, children_count, version, create_time, update_time, {})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
                "#,
                spec.table, column
            ),
            None => format!(
                r#"
                INSERT INTO {} (id, parent_id, name, full_path, children_count, version, create_time, update_time)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
                "#,
                spec.table
            ),
        };

        let mut query = sqlx::query(&sql)
            .bind(node.id)
            .bind(node.parent_id)
            .bind(&node.name)
            .bind(&node.full_path)
            .bind(node.children_count)
            .bind(node.version)
            .bind(now);
        if spec.anchor_column.is_some() {
            query = query.bind(node.anchor_id);
        }
        query.execute(&mut **tx).await.map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update_structure(&self, node: &TreeNode, expected_version: i64) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(node.kind);

        let anchor_set = spec
            .anchor_column
            .map(|column| format!(", {} = $7", column))
            .unwrap_or_default();
        let sql = format!(
            r#"
            UPDATE {}
            SET parent_id = $2, name = $3, full_path = $4, version = version + 1, update_time = $5{}
            WHERE id = $1 AND version = $6
            "#,
            spec.table, anchor_set
        );

        let mut query = sqlx::query(&sql)
            .bind(node.id)
            .bind(node.parent_id)
            .bind(&node.name)
            .bind(&node.full_path)
            .bind(now_millis())
            .bind(expected_version);
        if spec.anchor_column.is_some() {
            query = query.bind(node.anchor_id);
        }
        let result = query.execute(&mut **tx).await.map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(ProjectError::version_conflict(node.kind, node.id, expected_version).into());
        }
        Ok(())
    }

    async fn adjust_children_count(
        &self,
        kind: NodeKind,
        id: NodeId,
        delta: i64,
        expected_version: Option<i64>,
    ) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(kind);

        let sql = format!(
            r#"
            UPDATE {}
            SET children_count = GREATEST(children_count + $2, 0), version = version + 1, update_time = $4
            WHERE id = $1 AND ($3::BIGINT IS NULL OR version = $3)
            "#,
            spec.table
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(delta)
            .bind(expected_version)
            .bind(now_millis())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(ProjectError::version_conflict(kind, id, expected_version.unwrap_or(-1)).into());
        }
        Ok(())
    }

    async fn rewrite_path_prefix(
        &self,
        kind: NodeKind,
        old_prefix: &str,
        new_prefix: &str,
    ) -> AppResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(kind);

        let sql = format!(
            r#"
            UPDATE {}
            SET full_path = $2 || substring(full_path from char_length($1) + 1),
                version = version + 1,
                update_time = $3
            WHERE starts_with(full_path, $1 || '/')
            "#,
            spec.table
        );
        let result = sqlx::query(&sql)
            .bind(old_prefix)
            .bind(new_prefix)
            .bind(now_millis())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn reassign_anchor(
        &self,
        kind: NodeKind,
        prefix: &str,
        anchor_id: Option<NodeId>,
    ) -> AppResult<u64> {
        let spec = TableSpec::of(kind);
        let Some(column) = spec.anchor_column else {
            return Ok(0);
        };
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let sql = format!(
            r#"
            UPDATE {}
            SET {} = $2, version = version + 1, update_time = $3
            WHERE starts_with(full_path, $1 || '/')
            "#,
            spec.table, column
        );
        let result = sqlx::query(&sql)
            .bind(prefix)
            .bind(anchor_id)
            .bind(now_millis())
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_under_prefix(&self, kind: NodeKind, prefix: &str) -> AppResult<i64> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(kind);

        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE starts_with(full_path, $1 || '/')",
            spec.table
        );
        let row: (i64,) = sqlx::query_as(&sql)
            .bind(prefix)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.0)
    }

    async fn delete_under_prefix(&self, kind: NodeKind, prefix: &str) -> AppResult<Vec<NodeId>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(kind);

        let sql = format!(
            "DELETE FROM {} WHERE starts_with(full_path, $1 || '/') RETURNING id",
            spec.table
        );
        let rows: Vec<(i64,)> = sqlx::query_as(&sql)
            .bind(prefix)
            .fetch_all(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn delete_node(&self, kind: NodeKind, id: NodeId, expected_version: i64) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(kind);

        let sql = format!("DELETE FROM {} WHERE id = $1 AND version = $2", spec.table);
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(expected_version)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(ProjectError::version_conflict(kind, id, expected_version).into());
        }
        Ok(())
    }

    async fn find_nodes(
        &self,
        filter: &NodeFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<TreeNode>, u64)> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);
        let spec = TableSpec::of(filter.kind);

        let mut count_qb = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", spec.table));
        push_filter(&mut count_qb, filter, &spec);
        let total: (i64,) = count_qb
            .build_query_as()
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            spec.select_columns(),
            spec.table
        ));
        push_filter(&mut qb, filter, &spec);
        qb.push(" ORDER BY full_path LIMIT ")
            .push_bind(pagination.limit() as i64)
            .push(" OFFSET ")
            .push_bind(pagination.offset() as i64);
        let rows: Vec<NodeRow> = qb
            .build_query_as()
            .fetch_all(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok((
            rows.into_iter().map(|r| r.into_node(filter.kind)).collect(),
            total.0.max(0) as u64,
        ))
    }
}

// ============ 工作流 ============

#[derive(sqlx::FromRow)]
struct IssueRow {
    id: i64,
    status: i16,
    assignee_id: Option<i64>,
    start_time: i64,
    end_time: i64,
    resolved_time: i64,
    solve_duration: i64,
    rejected_reason: Option<String>,
    version: i64,
}

impl TryFrom<IssueRow> for IssueRecord {
    type Error = AppError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            status: IssueStatus::from_code(row.status)
                .ok_or_else(|| status_code_error("issue", row.status))?,
            assignee_id: row.assignee_id,
            start_time: row.start_time,
            end_time: row.end_time,
            resolved_time: row.resolved_time,
            solve_duration: row.solve_duration,
            rejected_reason: row.rejected_reason,
            version: row.version,
        })
    }
}

#[async_trait]
impl WorkflowRepository for TxWorkflowRepository {
    async fn find_issue(&self, id: i64) -> AppResult<Option<IssueRecord>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row = sqlx::query_as::<_, IssueRow>(
            r#"
            SELECT id, status, assignee_id, start_time, end_time, resolved_time,
                   solve_duration, rejected_reason, version
            FROM t_project_issue WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(IssueRecord::try_from).transpose()
    }

    async fn apply_issue_change(
        &self,
        id: i64,
        expected_version: i64,
        change: &IssueChange,
    ) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        // 累计时长做增量更新，不覆盖
        let result = sqlx::query(
            r#"
            UPDATE t_project_issue
            SET status = $3,
                assignee_id = COALESCE($4, assignee_id),
                start_time = COALESCE($5, start_time),
                end_time = COALESCE($6, end_time),
                resolved_time = COALESCE($7, resolved_time),
                solve_duration = solve_duration + $8,
                rejected_reason = COALESCE($9, rejected_reason),
                version = version + 1,
                update_time = $10
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(change.status.code())
        .bind(change.assignee_id)
        .bind(change.start_time)
        .bind(change.end_time)
        .bind(change.resolved_time)
        .bind(change.solve_duration_delta)
        .bind(&change.rejected_reason)
        .bind(now_millis())
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(ProjectError::version_conflict("issue", id, expected_version).into());
        }
        Ok(())
    }

    async fn find_requirement(&self, id: i64) -> AppResult<Option<RequirementRecord>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row: Option<(i64, i16, i64)> =
            sqlx::query_as("SELECT id, status, version FROM t_project_requirement WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;

        row.map(|(id, status, version)| {
            Ok(RequirementRecord {
                id,
                status: RequirementStatus::from_code(status)
                    .ok_or_else(|| status_code_error("requirement", status))?,
                version,
            })
        })
        .transpose()
    }

    async fn update_requirement_status(
        &self,
        id: i64,
        expected_version: i64,
        status: RequirementStatus,
    ) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let result = sqlx::query(
            r#"
            UPDATE t_project_requirement
            SET status = $3, version = version + 1, update_time = $4
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(status.code())
        .bind(now_millis())
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(ProjectError::version_conflict("requirement", id, expected_version).into());
        }
        Ok(())
    }

    async fn find_module(&self, id: i64) -> AppResult<Option<ModuleRecord>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row: Option<(i64, i16, Option<i64>, String, i64)> = sqlx::query_as(
            "SELECT id, status, project_id, full_path, version FROM t_project_module WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|(id, status, anchor_id, full_path, version)| {
            Ok(ModuleRecord {
                id,
                status: ModuleStatus::from_code(status)
                    .ok_or_else(|| status_code_error("module", status))?,
                anchor_id,
                full_path,
                version,
            })
        })
        .transpose()
    }

    async fn update_module_status(
        &self,
        id: i64,
        expected_version: i64,
        status: ModuleStatus,
    ) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let result = sqlx::query(
            r#"
            UPDATE t_project_module
            SET status = $3, version = version + 1, update_time = $4
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(status.code())
        .bind(now_millis())
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(ProjectError::version_conflict("module", id, expected_version).into());
        }
        Ok(())
    }

    async fn promote_modules(
        &self,
        anchor_id: Option<i64>,
        paths: &[String],
        target: ModuleStatus,
        keep: &[ModuleStatus],
    ) -> AppResult<u64> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let keep: Vec<i16> = keep.iter().map(|s| s.code()).collect();
        let result = sqlx::query(
            r#"
            UPDATE t_project_module
            SET status = $2, version = version + 1, update_time = $4
            WHERE full_path = ANY($1) AND NOT (status = ANY($3))
              AND project_id IS NOT DISTINCT FROM $5
            "#,
        )
        .bind(paths)
        .bind(target.code())
        .bind(keep)
        .bind(now_millis())
        .bind(anchor_id)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
