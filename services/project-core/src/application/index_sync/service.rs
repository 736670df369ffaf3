//! 异步索引同步
//!
//! 业务写入后把索引任务投递到有界队列，立即返回；固定数量的 worker
//! 消费队列并调用搜索引擎。队列满或已关闭时任务被丢弃。每个任务的结果
//! 通过广播通道和计数器对外可见，不做重试：索引是派生数据，可全量重建。

use metrics::counter;
use parking_lot::Mutex;
use pm_common::UserId;
use pm_config::IndexSyncConfig;
use pm_errors::AppResult;
use pm_ports::{IndexDocument, SearchIndexPort};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::index::UserDirectory;

const OUTCOME_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOp {
    Upsert,
    Delete,
}

impl IndexOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for IndexOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTaskStatus {
    Succeeded,
    Failed(String),
    /// 队列已满或已关闭，任务未执行
    Dropped,
}

impl IndexTaskStatus {
    fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed(_) => "failed",
            Self::Dropped => "dropped",
        }
    }
}

/// 单个任务的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTaskOutcome {
    pub task_id: u64,
    pub op: IndexOp,
    pub document_ids: Vec<i64>,
    pub status: IndexTaskStatus,
}

/// 累计计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSyncStats {
    pub enqueued: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

enum IndexTask {
    Upsert {
        document: IndexDocument,
        related_user_ids: Vec<UserId>,
    },
    Delete {
        ids: Vec<i64>,
    },
}

impl IndexTask {
    fn op(&self) -> IndexOp {
        match self {
            Self::Upsert { .. } => IndexOp::Upsert,
            Self::Delete { .. } => IndexOp::Delete,
        }
    }

    fn document_ids(&self) -> Vec<i64> {
        match self {
            Self::Upsert { document, .. } => vec![document.id],
            Self::Delete { ids } => ids.clone(),
        }
    }
}

struct Envelope {
    task_id: u64,
    task: IndexTask,
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Envelope>>>;

/// worker 共享的依赖
struct WorkerContext {
    index: Arc<dyn SearchIndexPort>,
    directory: Arc<dyn UserDirectory>,
    outcomes: broadcast::Sender<IndexTaskOutcome>,
    counters: Arc<Counters>,
}

impl WorkerContext {
    async fn run(self: Arc<Self>, worker: usize, queue: SharedReceiver) {
        debug!(worker, "Index worker started");
        loop {
            // 只在取任务时持锁，执行期间其他 worker 可继续取
            let next = { queue.lock().await.recv().await };
            let Some(envelope) = next else {
                break;
            };

            let op = envelope.task.op();
            let document_ids = envelope.task.document_ids();
            let status = match self.execute(envelope.task).await {
                Ok(()) => IndexTaskStatus::Succeeded,
                Err(e) => {
                    error!(task_id = envelope.task_id, op = %op, error = %e, "Index task failed");
                    IndexTaskStatus::Failed(e.to_string())
                }
            };
            self.report(IndexTaskOutcome {
                task_id: envelope.task_id,
                op,
                document_ids,
                status,
            });
        }
        debug!(worker, "Index worker stopped");
    }

    async fn execute(&self, task: IndexTask) -> AppResult<()> {
        match task {
            IndexTask::Upsert {
                mut document,
                related_user_ids,
            } => {
                if !related_user_ids.is_empty() {
                    let names = self.directory.display_names(&related_user_ids).await?;
                    document.merge_related_users(names);
                }
                self.index.upsert(std::slice::from_ref(&document)).await
            }
            IndexTask::Delete { ids } => self.index.delete(&ids).await,
        }
    }

    fn report(&self, outcome: IndexTaskOutcome) {
        let slot = match outcome.status {
            IndexTaskStatus::Succeeded => &self.counters.succeeded,
            IndexTaskStatus::Failed(_) => &self.counters.failed,
            IndexTaskStatus::Dropped => &self.counters.dropped,
        };
        slot.fetch_add(1, Ordering::Relaxed);
        counter!("index_sync_tasks_total",
            "op" => outcome.op.as_str(),
            "outcome" => outcome.status.label()
        )
        .increment(1);
        // 没有订阅者时发送失败，忽略
        let _ = self.outcomes.send(outcome);
    }
}

pub struct AsyncIndexSync {
    sender: Mutex<Option<mpsc::Sender<Envelope>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    context: Arc<WorkerContext>,
    next_task_id: AtomicU64,
}

impl AsyncIndexSync {
    /// 启动 worker，须在 tokio 运行时内调用
    pub fn start(
        index: Arc<dyn SearchIndexPort>,
        directory: Arc<dyn UserDirectory>,
        config: &IndexSyncConfig,
    ) -> Self {
        let workers = config.workers.max(1);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);

        let context = Arc::new(WorkerContext {
            index,
            directory,
            outcomes,
            counters: Arc::new(Counters::default()),
        });

        let queue = Arc::new(tokio::sync::Mutex::new(receiver));
        let handles = (0..workers)
            .map(|worker| tokio::spawn(context.clone().run(worker, queue.clone())))
            .collect();

        info!(workers, queue_capacity = config.queue_capacity, "Index sync started");

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            context,
            next_task_id: AtomicU64::new(1),
        }
    }

    /// 投递新增或覆盖任务，关联用户在 worker 内解析为显示名。返回任务 ID
    pub fn enqueue_upsert(&self, document: IndexDocument, related_user_ids: Vec<UserId>) -> u64 {
        self.enqueue(IndexTask::Upsert {
            document,
            related_user_ids,
        })
    }

    /// 投递删除任务。返回任务 ID
    pub fn enqueue_delete(&self, ids: Vec<i64>) -> u64 {
        self.enqueue(IndexTask::Delete { ids })
    }

    /// 订阅之后完成的任务结果
    pub fn subscribe(&self) -> broadcast::Receiver<IndexTaskOutcome> {
        self.context.outcomes.subscribe()
    }

    pub fn stats(&self) -> IndexSyncStats {
        let counters = &self.context.counters;
        IndexSyncStats {
            enqueued: counters.enqueued.load(Ordering::Relaxed),
            succeeded: counters.succeeded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// 关闭队列并等待已入队任务执行完毕
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Index worker panicked");
            }
        }
        info!("Index sync stopped");
    }

    fn enqueue(&self, task: IndexTask) -> u64 {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let op = task.op();
        let document_ids = task.document_ids();

        let sender = self.sender.lock().clone();
        let accepted = match sender {
            Some(sender) => match sender.try_send(Envelope { task_id, task }) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(task_id, op = %op, "Index queue full, task dropped");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(task_id, op = %op, "Index queue closed, task dropped");
                    false
                }
            },
            None => {
                warn!(task_id, op = %op, "Index sync stopped, task dropped");
                false
            }
        };

        if accepted {
            self.context.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        } else {
            self.context.report(IndexTaskOutcome {
                task_id,
                op,
                document_ids,
                status: IndexTaskStatus::Dropped,
            });
        }
        task_id
    }
}
