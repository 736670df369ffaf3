//! 搜索索引异步同步

mod service;

pub use service::{AsyncIndexSync, IndexOp, IndexSyncStats, IndexTaskOutcome, IndexTaskStatus};

#[cfg(test)]
mod tests;
