//! Reconciliation error types.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Remote call attempted when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    List,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::List => "list",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Failure below the HTTP status level: the request never produced a
/// usable response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, TLS, timeout or body decoding failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Transport unavailable for another reason.
    #[error("{0}")]
    Unavailable(String),
}

/// Errors returned by [`crate::Reconciler`] operations.
///
/// Every variant names the resource kind; variants produced by a remote call
/// also carry the operation, the target identifier and the status code.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Identifier absent remotely.
    #[error("{kind} {id} was not found")]
    NotFound { kind: &'static str, id: String },

    /// Lookup by display name matched more than one object.
    #[error("found {count} {kind} objects named '{name}'")]
    AmbiguousName {
        kind: &'static str,
        name: String,
        count: usize,
    },

    /// Object vanished since it was last read.
    #[error("{kind} {id} was deleted")]
    Deleted { kind: &'static str, id: String },

    /// Update rejected because the supplied revision is no longer current.
    #[error("{kind} {id}: revision {revision} is stale")]
    StaleRevision {
        kind: &'static str,
        id: String,
        revision: i64,
    },

    /// Network or transport failure.
    #[error("{kind} {op} of {target} failed: {source}")]
    Transport {
        kind: &'static str,
        op: Operation,
        target: String,
        #[source]
        source: TransportError,
    },

    /// Remote answered with a success status other than the one the
    /// operation is documented to return.
    #[error("unexpected status {status} during {kind} {op} of {target}")]
    ContractViolation {
        kind: &'static str,
        op: Operation,
        target: String,
        status: StatusCode,
    },

    /// Remote answered with a non-success status.
    #[error(
        "{kind} {op} of {target} failed with status {status}{}",
        .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
    )]
    Rejected {
        kind: &'static str,
        op: Operation,
        target: String,
        status: StatusCode,
        message: Option<String>,
    },

    /// Update hit a 404: the object disappeared between read and write.
    #[error("{kind} {id} disappeared before it could be updated")]
    Vanished { kind: &'static str, id: String },

    /// Neither id nor display name supplied.
    #[error("no identifying field supplied for {kind}")]
    MissingIdentity { kind: &'static str },

    /// Update requested without the revision from the last refresh.
    #[error("{kind} {id} has no revision, refresh before updating")]
    MissingRevision { kind: &'static str, id: String },

    /// Desired state failed validation, or the remote returned an object of
    /// another kind.
    #[error("invalid {kind}: {reason}")]
    Invalid { kind: &'static str, reason: String },
}

impl ReconcileError {
    /// Status code returned by the remote, if the error came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ReconcileError::ContractViolation { status, .. }
            | ReconcileError::Rejected { status, .. } => Some(*status),
            ReconcileError::NotFound { .. }
            | ReconcileError::Deleted { .. }
            | ReconcileError::Vanished { .. } => Some(StatusCode::NOT_FOUND),
            ReconcileError::StaleRevision { .. } => Some(StatusCode::PRECONDITION_FAILED),
            _ => None,
        }
    }

    /// Operation that failed, when one was attempted.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ReconcileError::Transport { op, .. }
            | ReconcileError::ContractViolation { op, .. }
            | ReconcileError::Rejected { op, .. } => Some(*op),
            ReconcileError::StaleRevision { .. } | ReconcileError::Vanished { .. } => {
                Some(Operation::Update)
            }
            _ => None,
        }
    }

    /// Whether a caller may re-read and try again. Nothing here retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::StaleRevision { .. } | ReconcileError::Transport { .. }
        )
    }
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_formatting() {
        let err = ReconcileError::Rejected {
            kind: "DhcpRelayProfile",
            op: Operation::Create,
            target: "relay-1".to_string(),
            status: StatusCode::BAD_REQUEST,
            message: Some("Invalid server address".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "DhcpRelayProfile create of relay-1 failed with status 400 Bad Request: Invalid server address"
        );

        let err = ReconcileError::Rejected {
            kind: "DhcpRelayProfile",
            op: Operation::Delete,
            target: "p1".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
        };
        assert_eq!(
            err.to_string(),
            "DhcpRelayProfile delete of p1 failed with status 500 Internal Server Error"
        );
    }

    #[test]
    fn test_status_and_operation() {
        let err = ReconcileError::ContractViolation {
            kind: "NsGroup",
            op: Operation::Create,
            target: "g".to_string(),
            status: StatusCode::OK,
        };
        assert_eq!(err.status(), Some(StatusCode::OK));
        assert_eq!(err.operation(), Some(Operation::Create));
        assert!(!err.is_retryable());

        let err = ReconcileError::StaleRevision {
            kind: "NsGroup",
            id: "g".to_string(),
            revision: 3,
        };
        assert_eq!(err.status(), Some(StatusCode::PRECONDITION_FAILED));
        assert!(err.is_retryable());

        let err = ReconcileError::MissingIdentity { kind: "NsGroup" };
        assert_eq!(err.status(), None);
        assert_eq!(err.operation(), None);
    }
}
