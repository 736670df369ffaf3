//! 授权缓存测试

use super::{PermissionCache, PermissionCacheConfig};
use crate::domain::permission::{DataScope, RoleId};
use crate::testing::MockCache;
use pm_common::UserId;
use std::sync::Arc;
use std::time::Duration;

fn cache_with(mock: Arc<MockCache>, ttl: Option<Duration>) -> PermissionCache {
    PermissionCache::new(mock).with_config(PermissionCacheConfig {
        prefix: "pm:perm".to_string(),
        ttl,
    })
}

#[tokio::test]
async fn test_role_codes_replace_and_read() {
    let mock = Arc::new(MockCache::new());
    let cache = cache_with(mock.clone(), None);

    cache
        .replace_role_codes(RoleId(7), &["project".to_string(), "user:list".to_string()])
        .await
        .unwrap();
    let codes = cache.role_codes(RoleId(7)).await.unwrap().unwrap();
    assert_eq!(codes, vec!["project", "user:list"]);
    assert_eq!(mock.members("pm:perm:role_codes:7").len(), 2);

    // 替换为更少的资源码，旧成员不残留
    cache
        .replace_role_codes(RoleId(7), &["user:list".to_string()])
        .await
        .unwrap();
    assert_eq!(cache.role_codes(RoleId(7)).await.unwrap().unwrap(), vec!["user:list"]);
}

#[tokio::test]
async fn test_empty_set_reads_as_miss() {
    let mock = Arc::new(MockCache::new());
    let cache = cache_with(mock.clone(), None);

    assert_eq!(cache.role_codes(RoleId(1)).await.unwrap(), None);

    cache
        .replace_role_codes(RoleId(1), &["project".to_string()])
        .await
        .unwrap();
    cache.replace_role_codes(RoleId(1), &[]).await.unwrap();
    assert_eq!(cache.role_codes(RoleId(1)).await.unwrap(), None);
    assert!(mock.members("pm:perm:role_codes:1").is_empty());
}

#[tokio::test]
async fn test_user_roles_sorted_and_malformed_is_miss() {
    let mock = Arc::new(MockCache::new());
    let cache = cache_with(mock.clone(), None);

    cache
        .replace_user_roles(UserId(3), &[RoleId(9), RoleId(2)])
        .await
        .unwrap();
    assert_eq!(
        cache.user_roles(UserId(3)).await.unwrap(),
        Some(vec![RoleId(2), RoleId(9)])
    );

    mock.put_members("pm:perm:user_roles:4", &["5", "abc"]);
    assert_eq!(cache.user_roles(UserId(4)).await.unwrap(), None);
}

#[tokio::test]
async fn test_ttl_applied_to_sets_and_scope() {
    let mock = Arc::new(MockCache::new());
    let cache = cache_with(mock.clone(), Some(Duration::from_secs(600)));

    cache
        .replace_role_codes(RoleId(1), &["project".to_string()])
        .await
        .unwrap();
    cache.set_role_scope(RoleId(1), DataScope::Dept).await.unwrap();

    assert_eq!(mock.ttl("pm:perm:role_codes:1"), Some(Duration::from_secs(600)));
    assert_eq!(mock.ttl("pm:perm:role_scope:1"), Some(Duration::from_secs(600)));
    assert_eq!(mock.value("pm:perm:role_scope:1").as_deref(), Some("3"));
}

#[tokio::test]
async fn test_role_scope_round_trip_and_garbage() {
    let mock = Arc::new(MockCache::new());
    let cache = cache_with(mock.clone(), None);

    cache.set_role_scope(RoleId(2), DataScope::DeptAndSub).await.unwrap();
    assert_eq!(cache.role_scope(RoleId(2)).await.unwrap(), Some(DataScope::DeptAndSub));

    use pm_ports::CachePort;
    mock.set("pm:perm:role_scope:3", "42", None).await.unwrap();
    assert_eq!(cache.role_scope(RoleId(3)).await.unwrap(), None);
}

#[tokio::test]
async fn test_invalidate_role_clears_codes_and_scope() {
    let mock = Arc::new(MockCache::new());
    let cache = cache_with(mock.clone(), None);

    cache
        .replace_role_codes(RoleId(5), &["project".to_string()])
        .await
        .unwrap();
    cache.set_role_scope(RoleId(5), DataScope::All).await.unwrap();
    cache.replace_user_roles(UserId(1), &[RoleId(5)]).await.unwrap();

    cache.invalidate_role(RoleId(5)).await.unwrap();
    assert_eq!(cache.role_codes(RoleId(5)).await.unwrap(), None);
    assert_eq!(cache.role_scope(RoleId(5)).await.unwrap(), None);
    // 用户角色不受影响
    assert!(cache.user_roles(UserId(1)).await.unwrap().is_some());

    cache.invalidate_user(UserId(1)).await.unwrap();
    assert_eq!(cache.user_roles(UserId(1)).await.unwrap(), None);
}

#[tokio::test]
async fn test_backend_failure_propagates() {
    let mock = Arc::new(MockCache::new());
    let cache = cache_with(mock.clone(), None);
    mock.set_failing(true);

    assert!(cache.role_codes(RoleId(1)).await.is_err());
    assert!(cache.replace_user_roles(UserId(1), &[RoleId(1)]).await.is_err());
}
