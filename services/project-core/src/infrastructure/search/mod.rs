//! 搜索引擎适配

mod http_index;

pub use http_index::HttpSearchIndex;
