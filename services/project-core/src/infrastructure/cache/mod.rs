//! 缓存层

mod permission_cache;

pub use permission_cache::{PermissionCache, PermissionCacheConfig};

#[cfg(test)]
mod tests;
