use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StatusMachine, WorkflowEntityKind};

/// 模块状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum ModuleStatus {
    PendingReview = 1,
    PendingDev = 2,
    Completed = 9,
    Rejected = -1,
}

impl ModuleStatus {
    /// 子模块进入待开发时，祖先模块处于这些状态则保持不变
    pub const PROMOTION_KEEPS: [ModuleStatus; 2] = [ModuleStatus::PendingDev, ModuleStatus::Completed];
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PendingReview => "pending_review",
            Self::PendingDev => "pending_dev",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

impl StatusMachine for ModuleStatus {
    const ENTITY: WorkflowEntityKind = WorkflowEntityKind::Module;

    fn allowed_targets(self) -> &'static [Self] {
        use ModuleStatus::*;
        match self {
            PendingReview | Rejected => &[PendingDev],
            PendingDev => &[Completed],
            Completed => &[],
        }
    }

    fn code(self) -> i16 {
        self as i16
    }

    fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::PendingReview),
            2 => Some(Self::PendingDev),
            9 => Some(Self::Completed),
            -1 => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub id: i64,
    pub status: ModuleStatus,
    /// 所属项目，同一模块树共享
    pub anchor_id: Option<i64>,
    pub full_path: String,
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{TransitionDecision, decide};

    #[test]
    fn test_transition_table() {
        use ModuleStatus::*;
        assert_eq!(decide(PendingReview, PendingDev), TransitionDecision::Allowed);
        assert_eq!(decide(PendingReview, Completed), TransitionDecision::Illegal);
        assert_eq!(decide(Rejected, PendingDev), TransitionDecision::Allowed);
        assert_eq!(decide(PendingDev, Completed), TransitionDecision::Allowed);
        assert_eq!(decide(PendingDev, PendingReview), TransitionDecision::Illegal);
        assert_eq!(decide(PendingReview, Rejected), TransitionDecision::Illegal);
        assert_eq!(decide(Completed, Completed), TransitionDecision::Unchanged);
    }
}
