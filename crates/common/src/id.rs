//! 雪花 ID 生成器
//!
//! 64 位布局：1 位符号 | 41 位毫秒时间戳 | 5 位节点 | 5 位工作线程 | 12 位序列号。
//! 多进程部署时以 (node_id, worker_id) 区分实例，保证全局唯一且按时间有序。

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// 自定义纪元：2023-01-01T00:00:00Z
pub const DEFAULT_EPOCH_MS: u64 = 1_672_531_200_000;

const NODE_BITS: u64 = 5;
const WORKER_BITS: u64 = 5;
const SEQUENCE_BITS: u64 = 12;

const MAX_NODE_ID: u64 = (1 << NODE_BITS) - 1;
const MAX_WORKER_ID: u64 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

const WORKER_SHIFT: u64 = SEQUENCE_BITS;
const NODE_SHIFT: u64 = SEQUENCE_BITS + WORKER_BITS;
const TIMESTAMP_SHIFT: u64 = SEQUENCE_BITS + WORKER_BITS + NODE_BITS;

const MAX_SPINS: u32 = 1_000_000;

/// ID 生成器抽象，便于在测试中注入确定性实现
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> i64;
}

/// 拆解后的雪花 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnowflakeParts {
    pub timestamp_ms: u64,
    pub node_id: u64,
    pub worker_id: u64,
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct State {
    last_timestamp: u64,
    sequence: u64,
}

/// 线程安全的雪花 ID 生成器
#[derive(Debug)]
pub struct SnowflakeGenerator {
    node_id: u64,
    worker_id: u64,
    epoch_ms: u64,
    state: Mutex<State>,
}

impl SnowflakeGenerator {
    /// 节点号和工作线程号各取低 5 位
    pub fn new(node_id: u16, worker_id: u16) -> Self {
        Self {
            node_id: node_id as u64 & MAX_NODE_ID,
            worker_id: worker_id as u64 & MAX_WORKER_ID,
            epoch_ms: DEFAULT_EPOCH_MS,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_epoch(mut self, epoch_ms: u64) -> Self {
        self.epoch_ms = epoch_ms;
        self
    }

    /// 生成下一个 ID
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock();

        // 时钟回拨时沿用上一次的时间戳，保证单调递增
        let mut timestamp = self.current_millis().max(state.last_timestamp);

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // 同一毫秒内序列号耗尽，等待下一毫秒
                timestamp = self.wait_next_millis(state.last_timestamp);
            }
        } else {
            state.sequence = 0;
        }

        state.last_timestamp = timestamp;

        ((timestamp << TIMESTAMP_SHIFT)
            | (self.node_id << NODE_SHIFT)
            | (self.worker_id << WORKER_SHIFT)
            | state.sequence) as i64
    }

    /// 拆解 ID，时间戳还原为 Unix 毫秒
    pub fn decompose(&self, id: i64) -> SnowflakeParts {
        let raw = id as u64;
        SnowflakeParts {
            timestamp_ms: (raw >> TIMESTAMP_SHIFT) + self.epoch_ms,
            node_id: (raw >> NODE_SHIFT) & MAX_NODE_ID,
            worker_id: (raw >> WORKER_SHIFT) & MAX_WORKER_ID,
            sequence: raw & SEQUENCE_MASK,
        }
    }

    fn current_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
            .saturating_sub(self.epoch_ms)
    }

    fn wait_next_millis(&self, last: u64) -> u64 {
        let mut timestamp = self.current_millis();
        let mut spins = 0;
        while timestamp <= last {
            if spins >= MAX_SPINS {
                // 时钟长时间停滞，逻辑上借用下一毫秒
                return last + 1;
            }
            std::hint::spin_loop();
            timestamp = self.current_millis();
            spins += 1;
        }
        timestamp
    }
}

impl IdGenerator for SnowflakeGenerator {
    fn next_id(&self) -> i64 {
        self.generate()
    }
}
