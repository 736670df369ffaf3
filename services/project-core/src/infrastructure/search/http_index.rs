//! 基于 HTTP 的搜索引擎客户端
//!
//! 文档以字符串 id 为主键，新增与覆盖同一个接口。

use async_trait::async_trait;
use pm_config::SearchConfig;
use pm_errors::{AppError, AppResult};
use pm_ports::{IndexDocument, SearchIndexPort};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;
use tracing::debug;

pub struct HttpSearchIndex {
    client: Client,
    host: String,
    index: String,
    api_key: Option<Secret<String>>,
}

impl HttpSearchIndex {
    pub fn new(config: &SearchConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build search client: {}", e)))?;

        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn documents_url(&self) -> String {
        format!("{}/indexes/{}/documents?primaryKey=id", self.host, self.index)
    }

    fn delete_batch_url(&self) -> String {
        format!("{}/indexes/{}/documents/delete-batch", self.host, self.index)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    async fn check(response: Response, action: &str) -> AppResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::external_service(format!(
            "Search {} failed with status {}: {}",
            action, status, body
        )))
    }
}

#[async_trait]
impl SearchIndexPort for HttpSearchIndex {
    async fn upsert(&self, documents: &[IndexDocument]) -> AppResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let response = self
            .authorize(self.client.post(self.documents_url()))
            .json(documents)
            .send()
            .await
            .map_err(|e| AppError::external_service(format!("Search upsert request failed: {}", e)))?;

        Self::check(response, "upsert").await?;
        debug!(index = %self.index, count = documents.len(), "Documents upserted");
        Ok(())
    }

    async fn delete(&self, ids: &[i64]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let response = self
            .authorize(self.client.post(self.delete_batch_url()))
            .json(&ids)
            .send()
            .await
            .map_err(|e| AppError::external_service(format!("Search delete request failed: {}", e)))?;

        Self::check(response, "delete").await?;
        debug!(index = %self.index, count = ids.len(), "Documents deleted");
        Ok(())
    }
}
