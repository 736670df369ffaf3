//! 搜索索引 trait 定义

use async_trait::async_trait;
use pm_errors::AppResult;
use serde::{Deserialize, Serialize};

/// 搜索索引文档
///
/// 派生数据，可随时由业务表重建，不作为权威来源。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    #[serde(with = "id_as_string")]
    pub id: i64,
    pub title: String,
    pub content: String,
    pub route: String,
    #[serde(rename = "relatedUsers", default)]
    pub related_user_names: Vec<String>,
    /// 毫秒时间戳
    pub create_time: i64,
    /// 毫秒时间戳
    pub update_time: i64,
}

impl IndexDocument {
    pub fn new(id: i64, title: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            route: route.into(),
            ..Default::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_times(mut self, create_time: i64, update_time: i64) -> Self {
        self.create_time = create_time;
        self.update_time = update_time;
        self
    }

    /// 合并关联用户名，保持顺序并去重
    pub fn merge_related_users(&mut self, names: impl IntoIterator<Item = String>) {
        for name in names {
            if !self.related_user_names.contains(&name) {
                self.related_user_names.push(name);
            }
        }
    }
}

/// 搜索引擎客户端
#[async_trait]
pub trait SearchIndexPort: Send + Sync {
    /// 按 id 新增或覆盖文档
    async fn upsert(&self, documents: &[IndexDocument]) -> AppResult<()>;

    /// 按 id 删除文档
    async fn delete(&self, ids: &[i64]) -> AppResult<()>;
}

mod id_as_string {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
