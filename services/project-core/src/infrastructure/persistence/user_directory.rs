//! 用户显示名查询

use async_trait::async_trait;
use pm_common::UserId;
use pm_errors::AppResult;
use sqlx::PgPool;
use std::collections::HashMap;

use super::error_mapper::map_sqlx_error;
use crate::domain::index::UserDirectory;

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn display_names(&self, ids: &[UserId]) -> AppResult<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();

        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, COALESCE(NULLIF(real_name, ''), username) FROM t_user WHERE id = ANY($1)",
        )
        .bind(&raw)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let names: HashMap<i64, String> = rows.into_iter().collect();
        Ok(raw.iter().filter_map(|id| names.get(id).cloned()).collect())
    }
}
