use std::fmt;

/// 工作流实体种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowEntityKind {
    Issue,
    Requirement,
    Module,
}

impl WorkflowEntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Requirement => "requirement",
            Self::Module => "module",
        }
    }
}

impl fmt::Display for WorkflowEntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 状态机
pub trait StatusMachine: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    const ENTITY: WorkflowEntityKind;

    /// 当前状态允许迁移到的目标
    fn allowed_targets(self) -> &'static [Self];

    fn code(self) -> i16;

    fn from_code(code: i16) -> Option<Self>;

    fn can_transition(self, target: Self) -> bool {
        self.allowed_targets().contains(&target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDecision {
    /// 目标与当前相同，不做任何写入
    Unchanged,
    Allowed,
    Illegal,
}

pub fn decide<S: StatusMachine>(current: S, target: S) -> TransitionDecision {
    if current == target {
        TransitionDecision::Unchanged
    } else if current.can_transition(target) {
        TransitionDecision::Allowed
    } else {
        TransitionDecision::Illegal
    }
}
