//! 异步索引同步测试

use super::{AsyncIndexSync, IndexOp, IndexSyncStats, IndexTaskOutcome, IndexTaskStatus};
use crate::domain::index::UserDirectory;
use async_trait::async_trait;
use mockall::mock;
use pm_common::UserId;
use pm_config::IndexSyncConfig;
use pm_errors::{AppError, AppResult};
use pm_ports::{IndexDocument, SearchIndexPort};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore, broadcast};

mock! {
    pub Index {}

    #[async_trait]
    impl SearchIndexPort for Index {
        async fn upsert(&self, documents: &[IndexDocument]) -> AppResult<()>;
        async fn delete(&self, ids: &[i64]) -> AppResult<()>;
    }
}

mock! {
    pub Directory {}

    #[async_trait]
    impl UserDirectory for Directory {
        async fn display_names(&self, ids: &[UserId]) -> AppResult<Vec<String>>;
    }
}

fn config(workers: usize, queue_capacity: usize) -> IndexSyncConfig {
    IndexSyncConfig {
        workers,
        queue_capacity,
    }
}

async fn next_outcome(rx: &mut broadcast::Receiver<IndexTaskOutcome>) -> IndexTaskOutcome {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("outcome timed out")
        .expect("outcome channel closed")
}

#[tokio::test]
async fn test_upsert_resolves_related_users() {
    let mut directory = MockDirectory::new();
    directory
        .expect_display_names()
        .withf(|ids| ids == [UserId(1), UserId(2)])
        .times(1)
        .returning(|_| Ok(vec!["张三".to_string(), "李四".to_string()]));

    let mut index = MockIndex::new();
    index
        .expect_upsert()
        .withf(|docs| docs.len() == 1 && docs[0].related_user_names == ["张三", "李四"])
        .times(1)
        .returning(|_| Ok(()));

    let sync = AsyncIndexSync::start(Arc::new(index), Arc::new(directory), &config(2, 16));
    let mut rx = sync.subscribe();

    let task_id = sync.enqueue_upsert(
        IndexDocument::new(42, "登录失败", "/project/issue/42"),
        vec![UserId(1), UserId(2)],
    );
    let outcome = next_outcome(&mut rx).await;
    assert_eq!(outcome.task_id, task_id);
    assert_eq!(outcome.op, IndexOp::Upsert);
    assert_eq!(outcome.document_ids, vec![42]);
    assert_eq!(outcome.status, IndexTaskStatus::Succeeded);

    sync.shutdown().await;
    assert_eq!(
        sync.stats(),
        IndexSyncStats {
            enqueued: 1,
            succeeded: 1,
            failed: 0,
            dropped: 0,
        }
    );
}

#[tokio::test]
async fn test_upsert_without_users_skips_directory() {
    let mut directory = MockDirectory::new();
    directory.expect_display_names().times(0);
    let mut index = MockIndex::new();
    index.expect_upsert().times(1).returning(|_| Ok(()));

    let sync = AsyncIndexSync::start(Arc::new(index), Arc::new(directory), &config(1, 4));
    let mut rx = sync.subscribe();
    sync.enqueue_upsert(IndexDocument::new(1, "t", "/r"), Vec::new());

    assert_eq!(next_outcome(&mut rx).await.status, IndexTaskStatus::Succeeded);
    sync.shutdown().await;
}

#[tokio::test]
async fn test_delete_forwards_ids() {
    let mut index = MockIndex::new();
    index
        .expect_delete()
        .withf(|ids| ids == [3i64, 4])
        .times(1)
        .returning(|_| Ok(()));

    let sync = AsyncIndexSync::start(Arc::new(index), Arc::new(MockDirectory::new()), &config(1, 4));
    let mut rx = sync.subscribe();
    sync.enqueue_delete(vec![3, 4]);

    let outcome = next_outcome(&mut rx).await;
    assert_eq!(outcome.op, IndexOp::Delete);
    assert_eq!(outcome.document_ids, vec![3, 4]);
    assert_eq!(outcome.status, IndexTaskStatus::Succeeded);
    sync.shutdown().await;
}

#[tokio::test]
async fn test_index_failure_is_reported_not_retried() {
    let mut index = MockIndex::new();
    index
        .expect_upsert()
        .times(1)
        .returning(|_| Err(AppError::external_service("search down")));

    let sync = AsyncIndexSync::start(Arc::new(index), Arc::new(MockDirectory::new()), &config(1, 4));
    let mut rx = sync.subscribe();
    sync.enqueue_upsert(IndexDocument::new(1, "t", "/r"), Vec::new());

    let outcome = next_outcome(&mut rx).await;
    assert!(matches!(outcome.status, IndexTaskStatus::Failed(ref msg) if msg.contains("search down")));
    sync.shutdown().await;
    assert_eq!(sync.stats().failed, 1);
}

#[tokio::test]
async fn test_directory_failure_fails_task() {
    let mut directory = MockDirectory::new();
    directory
        .expect_display_names()
        .returning(|_| Err(AppError::database("db down")));
    let mut index = MockIndex::new();
    index.expect_upsert().times(0);

    let sync = AsyncIndexSync::start(Arc::new(index), Arc::new(directory), &config(1, 4));
    let mut rx = sync.subscribe();
    sync.enqueue_upsert(IndexDocument::new(1, "t", "/r"), vec![UserId(9)]);

    assert!(matches!(
        next_outcome(&mut rx).await.status,
        IndexTaskStatus::Failed(_)
    ));
    sync.shutdown().await;
}

/// 第一次调用时通知并阻塞，直到测试放行
struct GatedIndex {
    entered: Notify,
    gate: Semaphore,
    calls: AtomicUsize,
}

#[async_trait]
impl SearchIndexPort for GatedIndex {
    async fn upsert(&self, _documents: &[IndexDocument]) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| AppError::internal(e.to_string()))?;
        permit.forget();
        Ok(())
    }

    async fn delete(&self, _ids: &[i64]) -> AppResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_full_queue_drops_and_shutdown_drains() {
    let index = Arc::new(GatedIndex {
        entered: Notify::new(),
        gate: Semaphore::new(0),
        calls: AtomicUsize::new(0),
    });
    let sync = AsyncIndexSync::start(index.clone(), Arc::new(MockDirectory::new()), &config(1, 1));
    let mut rx = sync.subscribe();

    // worker 取走第一个任务并阻塞
    sync.enqueue_upsert(IndexDocument::new(1, "a", "/a"), Vec::new());
    index.entered.notified().await;

    // 第二个占满队列，第三个被丢弃
    sync.enqueue_upsert(IndexDocument::new(2, "b", "/b"), Vec::new());
    let dropped_id = sync.enqueue_upsert(IndexDocument::new(3, "c", "/c"), Vec::new());

    let outcome = next_outcome(&mut rx).await;
    assert_eq!(outcome.task_id, dropped_id);
    assert_eq!(outcome.status, IndexTaskStatus::Dropped);

    index.gate.add_permits(2);
    sync.shutdown().await;

    assert_eq!(index.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        sync.stats(),
        IndexSyncStats {
            enqueued: 2,
            succeeded: 2,
            failed: 0,
            dropped: 1,
        }
    );

    // 关闭后投递直接丢弃
    sync.enqueue_delete(vec![1]);
    assert_eq!(sync.stats().dropped, 2);
}
