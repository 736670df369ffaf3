use pm_errors::AppError;
use thiserror::Error;

use crate::domain::hierarchy::{NodeId, NodeKind};
use crate::domain::permission::RoleId;
use crate::domain::workflow::WorkflowEntityKind;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{0} name is required")]
    NameRequired(NodeKind),
    #[error("invalid name {0:?}: must not contain '/'")]
    InvalidName(String),
    #[error("{kind} {id} not found")]
    NodeNotFound { kind: NodeKind, id: NodeId },
    #[error("parent {kind} {id} not found")]
    ParentNotFound { kind: NodeKind, id: NodeId },
    #[error("{0} cannot be attached to an anchor")]
    AnchorNotSupported(NodeKind),
    #[error("anchor {kind} {id} not found")]
    AnchorNotFound { kind: NodeKind, id: NodeId },
    #[error("cannot move {kind} {id} under its own subtree")]
    CyclicMove { kind: NodeKind, id: NodeId },
    #[error("{kind} path {path} already exists")]
    DuplicatePath { kind: NodeKind, path: String },
    #[error("{kind} {id} still has {children} children")]
    HasChildren {
        kind: NodeKind,
        id: NodeId,
        children: i64,
    },
    #[error("{kind} {id} still has {count} attached {dependent} records")]
    HasDependents {
        kind: NodeKind,
        id: NodeId,
        dependent: NodeKind,
        count: i64,
    },
    #[error("{entity} {id} was modified concurrently (expected version {expected})")]
    VersionConflict {
        entity: String,
        id: i64,
        expected: i64,
    },
    #[error("{entity} {id} not found")]
    EntityNotFound { entity: WorkflowEntityKind, id: i64 },
    #[error("{entity} {id} cannot move from {from} to {to}")]
    IllegalTransition {
        entity: WorkflowEntityKind,
        id: i64,
        from: String,
        to: String,
    },
    #[error("reject reason is required")]
    MissingRejectReason,
    #[error("invalid resource code {0:?}")]
    InvalidResourceCode(String),
    #[error("resource code {0:?} registered twice")]
    DuplicateResource(String),
    #[error("unknown resource code {0:?}")]
    UnknownResource(String),
    #[error("role {0} not found")]
    RoleNotFound(RoleId),
}

impl ProjectError {
    pub fn version_conflict(entity: impl ToString, id: i64, expected: i64) -> Self {
        Self::VersionConflict {
            entity: entity.to_string(),
            id,
            expected,
        }
    }
}

impl From<ProjectError> for AppError {
    fn from(error: ProjectError) -> Self {
        let message = error.to_string();
        match error {
            ProjectError::NameRequired(_)
            | ProjectError::InvalidName(_)
            | ProjectError::AnchorNotSupported(_)
            | ProjectError::CyclicMove { .. }
            | ProjectError::MissingRejectReason
            | ProjectError::InvalidResourceCode(_)
            | ProjectError::DuplicateResource(_)
            | ProjectError::UnknownResource(_) => AppError::validation(message),
            ProjectError::NodeNotFound { .. }
            | ProjectError::ParentNotFound { .. }
            | ProjectError::AnchorNotFound { .. }
            | ProjectError::EntityNotFound { .. }
            | ProjectError::RoleNotFound(_) => AppError::not_found(message),
            ProjectError::DuplicatePath { .. } | ProjectError::VersionConflict { .. } => {
                AppError::conflict(message)
            }
            ProjectError::HasChildren { .. }
            | ProjectError::HasDependents { .. }
            | ProjectError::IllegalTransition { .. } => AppError::failed_precondition(message),
        }
    }
}
