//! PostgreSQL 授权数据只读仓储

use async_trait::async_trait;
use pm_common::{UserId, normalize_code};
use pm_errors::{AppError, AppResult};
use sqlx::PgPool;

use super::error_mapper::map_sqlx_error;
use crate::domain::permission::{
    DataScope, PermissionRepository, Role, RoleId, RoleStatus, RoleType,
};

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    role_type: i16,
    data_scope: i16,
    status: i16,
    is_default: bool,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let role_type = RoleType::from_code(row.role_type).ok_or_else(|| {
            AppError::internal(format!("Unknown role type {} for role {}", row.role_type, row.id))
        })?;
        let data_scope = DataScope::from_code(row.data_scope).ok_or_else(|| {
            AppError::internal(format!("Unknown data scope {} for role {}", row.data_scope, row.id))
        })?;
        let status = RoleStatus::from_code(row.status).ok_or_else(|| {
            AppError::internal(format!("Unknown role status {} for role {}", row.status, row.id))
        })?;

        Ok(Self {
            id: RoleId(row.id),
            name: row.name,
            role_type,
            data_scope,
            status,
            is_default: row.is_default,
        })
    }
}

pub struct PostgresPermissionRepository {
    pool: PgPool,
}

impl PostgresPermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for PostgresPermissionRepository {
    async fn find_user_role_ids(&self, user_id: UserId) -> AppResult<Vec<RoleId>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT role_id FROM t_user_role WHERE user_id = $1 ORDER BY role_id")
                .bind(user_id.0)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|r| RoleId(r.0)).collect())
    }

    async fn find_role_codes(&self, role_id: RoleId) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT resource_code FROM t_role_resource WHERE role_id = $1 ORDER BY resource_code",
        )
        .bind(role_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        // 历史数据可能带空白或大小写差异
        let mut codes: Vec<String> = rows
            .into_iter()
            .map(|r| normalize_code(&r.0))
            .filter(|c| !c.is_empty())
            .collect();
        codes.dedup();
        Ok(codes)
    }

    async fn find_enabled_roles(&self, ids: &[RoleId]) -> AppResult<Vec<Role>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();

        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, role_type, data_scope, status, is_default
            FROM t_role
            WHERE id = ANY($1) AND status = $2
            "#,
        )
        .bind(ids)
        .bind(RoleStatus::Normal as i16)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Role::try_from).collect()
    }
}
