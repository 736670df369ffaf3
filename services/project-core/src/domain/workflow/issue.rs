use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StatusMachine, WorkflowEntityKind};

/// 问题状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum IssueStatus {
    New = 1,
    Assigned = 2,
    Processing = 3,
    Verifying = 4,
    Resolved = 5,
    Closed = 9,
    Rejected = -1,
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Assigned => "assigned",
            Self::Processing => "processing",
            Self::Verifying => "verifying",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

impl StatusMachine for IssueStatus {
    const ENTITY: WorkflowEntityKind = WorkflowEntityKind::Issue;

    fn allowed_targets(self) -> &'static [Self] {
        use IssueStatus::*;
        match self {
            New => &[Closed, Assigned],
            Assigned => &[Closed, Processing, Rejected],
            Processing => &[Closed, Verifying],
            Verifying => &[Closed, Resolved, Assigned],
            Resolved => &[Closed],
            Rejected => &[Closed, New],
            Closed => &[],
        }
    }

    fn code(self) -> i16 {
        self as i16
    }

    /// 历史数据中的 0 按新建处理
    fn from_code(code: i16) -> Option<Self> {
        match code {
            0 | 1 => Some(Self::New),
            2 => Some(Self::Assigned),
            3 => Some(Self::Processing),
            4 => Some(Self::Verifying),
            5 => Some(Self::Resolved),
            9 => Some(Self::Closed),
            -1 => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// 问题记录中与工作流相关的字段，时间均为毫秒
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRecord {
    pub id: i64,
    pub status: IssueStatus,
    pub assignee_id: Option<i64>,
    pub start_time: i64,
    pub end_time: i64,
    pub resolved_time: i64,
    /// 累计处理时长
    pub solve_duration: i64,
    pub rejected_reason: Option<String>,
    pub version: i64,
}

impl IssueRecord {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            status: IssueStatus::New,
            assignee_id: None,
            start_time: 0,
            end_time: 0,
            resolved_time: 0,
            solve_duration: 0,
            rejected_reason: None,
            version: 0,
        }
    }

    /// 计算迁移到 `target` 需要写入的字段，调用前须已确认迁移合法
    pub fn plan_change(
        &self,
        target: IssueStatus,
        extra: &IssueTransitionExtra,
        now: i64,
    ) -> IssueChange {
        let mut change = IssueChange::to(target);
        match target {
            IssueStatus::Assigned => change.assignee_id = extra.assignee_id,
            IssueStatus::Processing => change.start_time = Some(now),
            IssueStatus::Verifying => {
                change.end_time = Some(now);
                // 未开始计时的问题不累计时长
                if self.start_time > 0 {
                    change.solve_duration_delta = (now - self.start_time).max(0);
                }
            }
            IssueStatus::Resolved => change.resolved_time = Some(now),
            IssueStatus::Rejected => change.rejected_reason = extra.reject_reason.clone(),
            IssueStatus::New | IssueStatus::Closed => {}
        }
        change
    }

    /// 把变更应用到内存记录
    pub fn apply(&mut self, change: &IssueChange) {
        self.status = change.status;
        if let Some(assignee_id) = change.assignee_id {
            self.assignee_id = Some(assignee_id);
        }
        if let Some(start_time) = change.start_time {
            self.start_time = start_time;
        }
        if let Some(end_time) = change.end_time {
            self.end_time = end_time;
        }
        if let Some(resolved_time) = change.resolved_time {
            self.resolved_time = resolved_time;
        }
        self.solve_duration += change.solve_duration_delta;
        if let Some(reason) = &change.rejected_reason {
            self.rejected_reason = Some(reason.clone());
        }
        self.version += 1;
    }
}

/// 迁移附带参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueTransitionExtra {
    /// 迁移到驳回时必填
    pub reject_reason: Option<String>,
    /// 迁移到已指派时可选
    pub assignee_id: Option<i64>,
}

impl IssueTransitionExtra {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            reject_reason: Some(reason.into()),
            assignee_id: None,
        }
    }

    pub fn assigned(assignee_id: i64) -> Self {
        Self {
            reject_reason: None,
            assignee_id: Some(assignee_id),
        }
    }

    pub fn has_reject_reason(&self) -> bool {
        self.reject_reason
            .as_deref()
            .is_some_and(|reason| !reason.trim().is_empty())
    }
}

/// 一次合法迁移产生的字段变化，None 表示不修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueChange {
    pub status: IssueStatus,
    pub assignee_id: Option<i64>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub resolved_time: Option<i64>,
    pub solve_duration_delta: i64,
    pub rejected_reason: Option<String>,
}

impl IssueChange {
    pub fn to(status: IssueStatus) -> Self {
        Self {
            status,
            assignee_id: None,
            start_time: None,
            end_time: None,
            resolved_time: None,
            solve_duration_delta: 0,
            rejected_reason: None,
        }
    }
}
