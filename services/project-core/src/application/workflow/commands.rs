use crate::domain::workflow::{
    IssueStatus, IssueTransitionExtra, ModuleStatus, RequirementStatus, StatusMachine,
    WorkflowEntityKind,
};

/// 目标状态，按实体种类区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTarget {
    Issue(IssueStatus),
    Requirement(RequirementStatus),
    Module(ModuleStatus),
}

impl StatusTarget {
    pub fn entity(&self) -> WorkflowEntityKind {
        match self {
            Self::Issue(_) => IssueStatus::ENTITY,
            Self::Requirement(_) => RequirementStatus::ENTITY,
            Self::Module(_) => ModuleStatus::ENTITY,
        }
    }
}

/// 状态迁移请求
#[derive(Debug, Clone)]
pub struct TransitionCommand {
    pub entity_id: i64,
    pub target: StatusTarget,
    pub extra: IssueTransitionExtra,
    pub expected_version: Option<i64>,
}

impl TransitionCommand {
    fn new(entity_id: i64, target: StatusTarget) -> Self {
        Self {
            entity_id,
            target,
            extra: IssueTransitionExtra::default(),
            expected_version: None,
        }
    }

    pub fn issue(id: i64, target: IssueStatus) -> Self {
        Self::new(id, StatusTarget::Issue(target))
    }

    pub fn requirement(id: i64, target: RequirementStatus) -> Self {
        Self::new(id, StatusTarget::Requirement(target))
    }

    pub fn module(id: i64, target: ModuleStatus) -> Self {
        Self::new(id, StatusTarget::Module(target))
    }

    pub fn with_extra(mut self, extra: IssueTransitionExtra) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// 迁移结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// 已写入；`cascaded` 为连带变更的祖先模块数
    Applied {
        from: String,
        to: String,
        cascaded: u64,
    },
    /// 目标与当前相同，未写入
    Unchanged,
    /// 不在迁移表内，未写入
    Illegal { from: String, to: String },
}

impl TransitionOutcome {
    /// 兼容布尔语义：同状态也视为成功
    pub fn applied(&self) -> bool {
        !matches!(self, Self::Illegal { .. })
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Unchanged => "unchanged",
            Self::Illegal { .. } => "illegal",
        }
    }
}
