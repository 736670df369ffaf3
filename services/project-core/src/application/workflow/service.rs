//! 工作流引擎
//!
//! 状态写入与副作用（时间戳、累计时长、祖先模块联动）在同一事务内完成。

use metrics::counter;
use pm_common::now_millis;
use pm_errors::AppResult;
use std::sync::Arc;
use tracing::{info, warn};

use super::commands::{StatusTarget, TransitionCommand, TransitionOutcome};
use crate::domain::hierarchy::ancestor_paths;
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory, finish};
use crate::domain::workflow::{
    IssueStatus, ModuleStatus, RequirementStatus, StatusMachine, TransitionDecision,
    WorkflowEntityKind, decide,
};
use crate::error::ProjectError;

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct WorkflowEngine {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    strict: bool,
    clock: Clock,
}

impl WorkflowEngine {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self {
            uow_factory,
            strict: true,
            clock: Arc::new(now_millis),
        }
    }

    /// 关闭后非法迁移以 `TransitionOutcome::Illegal` 返回而不是错误
    pub fn with_strict_transitions(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// 执行状态迁移
    pub async fn transition_status(&self, cmd: TransitionCommand) -> AppResult<TransitionOutcome> {
        let entity = cmd.target.entity();

        let uow = self.uow_factory.begin().await?;
        let result = match cmd.target {
            StatusTarget::Issue(target) => self.transition_issue(uow.as_ref(), &cmd, target).await,
            StatusTarget::Requirement(target) => {
                self.transition_requirement(uow.as_ref(), &cmd, target).await
            }
            StatusTarget::Module(target) => self.transition_module(uow.as_ref(), &cmd, target).await,
        };
        let outcome = finish(uow, result).await?;

        counter!("workflow_transitions_total",
            "entity" => entity.as_str(),
            "outcome" => outcome.label()
        )
        .increment(1);

        match &outcome {
            TransitionOutcome::Applied { from, to, cascaded } => {
                info!(entity = %entity, id = cmd.entity_id, from = %from, to = %to, cascaded, "Status changed");
            }
            TransitionOutcome::Illegal { from, to } => {
                warn!(entity = %entity, id = cmd.entity_id, from = %from, to = %to, "Illegal transition");
                if self.strict {
                    return Err(ProjectError::IllegalTransition {
                        entity,
                        id: cmd.entity_id,
                        from: from.clone(),
                        to: to.clone(),
                    }
                    .into());
                }
            }
            TransitionOutcome::Unchanged => {}
        }
        Ok(outcome)
    }

    async fn transition_issue(
        &self,
        uow: &dyn UnitOfWork,
        cmd: &TransitionCommand,
        target: IssueStatus,
    ) -> AppResult<TransitionOutcome> {
        let repo = uow.workflows();
        let record = repo
            .find_issue(cmd.entity_id)
            .await?
            .ok_or(ProjectError::EntityNotFound {
                entity: WorkflowEntityKind::Issue,
                id: cmd.entity_id,
            })?;
        check_version(WorkflowEntityKind::Issue, cmd, record.version)?;

        match decide(record.status, target) {
            TransitionDecision::Unchanged => Ok(TransitionOutcome::Unchanged),
            TransitionDecision::Illegal => Ok(illegal(record.status, target)),
            TransitionDecision::Allowed => {
                // 只有真正进入驳回状态时才要求原因
                if target == IssueStatus::Rejected && !cmd.extra.has_reject_reason() {
                    return Err(ProjectError::MissingRejectReason.into());
                }
                let change = record.plan_change(target, &cmd.extra, (self.clock)());
                repo.apply_issue_change(record.id, record.version, &change)
                    .await?;
                Ok(applied(record.status, target, 0))
            }
        }
    }

    async fn transition_requirement(
        &self,
        uow: &dyn UnitOfWork,
        cmd: &TransitionCommand,
        target: RequirementStatus,
    ) -> AppResult<TransitionOutcome> {
        let repo = uow.workflows();
        let record = repo
            .find_requirement(cmd.entity_id)
            .await?
            .ok_or(ProjectError::EntityNotFound {
                entity: WorkflowEntityKind::Requirement,
                id: cmd.entity_id,
            })?;
        check_version(WorkflowEntityKind::Requirement, cmd, record.version)?;

        match decide(record.status, target) {
            TransitionDecision::Unchanged => Ok(TransitionOutcome::Unchanged),
            TransitionDecision::Illegal => Ok(illegal(record.status, target)),
            TransitionDecision::Allowed => {
                repo.update_requirement_status(record.id, record.version, target)
                    .await?;
                Ok(applied(record.status, target, 0))
            }
        }
    }

    async fn transition_module(
        &self,
        uow: &dyn UnitOfWork,
        cmd: &TransitionCommand,
        target: ModuleStatus,
    ) -> AppResult<TransitionOutcome> {
        let repo = uow.workflows();
        let record = repo
            .find_module(cmd.entity_id)
            .await?
            .ok_or(ProjectError::EntityNotFound {
                entity: WorkflowEntityKind::Module,
                id: cmd.entity_id,
            })?;
        check_version(WorkflowEntityKind::Module, cmd, record.version)?;

        match decide(record.status, target) {
            TransitionDecision::Unchanged => Ok(TransitionOutcome::Unchanged),
            TransitionDecision::Illegal => Ok(illegal(record.status, target)),
            TransitionDecision::Allowed => {
                repo.update_module_status(record.id, record.version, target)
                    .await?;

                // 子模块进入待开发，同一项目下的祖先模块一并进入待开发
                let mut cascaded = 0;
                if target == ModuleStatus::PendingDev {
                    let ancestors = ancestor_paths(&record.full_path);
                    if !ancestors.is_empty() {
                        cascaded = repo
                            .promote_modules(
                                record.anchor_id,
                                &ancestors,
                                ModuleStatus::PendingDev,
                                &ModuleStatus::PROMOTION_KEEPS,
                            )
                            .await?;
                    }
                }
                Ok(applied(record.status, target, cascaded))
            }
        }
    }
}

fn check_version(entity: WorkflowEntityKind, cmd: &TransitionCommand, actual: i64) -> AppResult<()> {
    match cmd.expected_version {
        Some(expected) if expected != actual => {
            Err(ProjectError::version_conflict(entity, cmd.entity_id, expected).into())
        }
        _ => Ok(()),
    }
}

fn applied<S: StatusMachine>(from: S, to: S, cascaded: u64) -> TransitionOutcome {
    TransitionOutcome::Applied {
        from: from.to_string(),
        to: to.to_string(),
        cascaded,
    }
}

fn illegal<S: StatusMachine>(from: S, to: S) -> TransitionOutcome {
    TransitionOutcome::Illegal {
        from: from.to_string(),
        to: to.to_string(),
    }
}
