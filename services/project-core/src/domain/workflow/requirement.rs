use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StatusMachine, WorkflowEntityKind};

/// 需求状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum RequirementStatus {
    PendingDesign = 1,
    PendingReview = 2,
    Reviewed = 3,
    Completed = 9,
    Rejected = -1,
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PendingDesign => "pending_design",
            Self::PendingReview => "pending_review",
            Self::Reviewed => "reviewed",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

impl StatusMachine for RequirementStatus {
    const ENTITY: WorkflowEntityKind = WorkflowEntityKind::Requirement;

    fn allowed_targets(self) -> &'static [Self] {
        use RequirementStatus::*;
        match self {
            PendingDesign | Rejected => &[PendingReview],
            PendingReview => &[Reviewed, Rejected],
            Reviewed => &[Completed],
            Completed => &[],
        }
    }

    fn code(self) -> i16 {
        self as i16
    }

    fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::PendingDesign),
            2 => Some(Self::PendingReview),
            3 => Some(Self::Reviewed),
            9 => Some(Self::Completed),
            -1 => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementRecord {
    pub id: i64,
    pub status: RequirementStatus,
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{TransitionDecision, decide};

    #[test]
    fn test_transition_table() {
        use RequirementStatus::*;
        assert_eq!(decide(PendingDesign, PendingReview), TransitionDecision::Allowed);
        assert_eq!(decide(PendingDesign, Reviewed), TransitionDecision::Illegal);
        assert_eq!(decide(PendingReview, Rejected), TransitionDecision::Allowed);
        assert_eq!(decide(Rejected, PendingReview), TransitionDecision::Allowed);
        assert_eq!(decide(Reviewed, Completed), TransitionDecision::Allowed);
        assert_eq!(decide(Completed, PendingDesign), TransitionDecision::Illegal);
        assert_eq!(decide(Rejected, Completed), TransitionDecision::Illegal);
    }
}
