use serde::Serialize;

use crate::intake::state::{SessionEvent, SessionState};
use crate::repositories::StoreError;

/// How the operator-facing shell should treat an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The specific scan is refused; the session is otherwise unaffected.
    Rejection,
    /// A warning only, nothing changed.
    Informational,
    /// Transport or store failure; the same action may be retried.
    Retryable,
    /// Something must happen first (confirmation, evidence, completion).
    Precondition,
    /// The caller asked for something that makes no sense in the current state.
    Usage,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum IntakeError {
    #[error("No declared shipment for tracking number {0}")]
    NotFound(String),

    #[error("Shipment {tracking_number} is already fully inbounded ({inbounded} of {declared})")]
    AlreadyComplete {
        tracking_number: String,
        declared: u64,
        inbounded: u64,
    },

    #[error("LPN {0} was already scanned in this session")]
    AlreadyScannedThisSession(String),

    #[error("LPN {0} has already been inbounded")]
    AlreadyInbounded(String),

    #[error("LPN {pending} is waiting for SKU confirmation")]
    ConfirmationPending { pending: String },

    #[error("SKU {sku} is not one of the candidates {candidates:?}")]
    InvalidSkuSelection { sku: String, candidates: Vec<String> },

    #[error("Missing required evidence: {0}")]
    MissingRequiredEvidence(String),

    #[error("Shipment {tracking_number} reached its over-quantity ceiling of {ceiling}")]
    OverQuantityLimit { tracking_number: String, ceiling: u64 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid transition: {event} while {from}")]
    InvalidTransition {
        from: SessionState,
        event: SessionEvent,
    },

    #[error("Package not ready to complete: {inbounded} of {declared} inbounded")]
    NotReadyToComplete { declared: u64, inbounded: u64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntakeError {
    /// Single source of truth for how each error is surfaced.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_)
            | Self::AlreadyScannedThisSession(_)
            | Self::AlreadyInbounded(_)
            | Self::OverQuantityLimit { .. } => ErrorKind::Rejection,
            Self::AlreadyComplete { .. } => ErrorKind::Informational,
            Self::StoreUnavailable(_) | Self::SessionStore(_) => ErrorKind::Retryable,
            Self::ConfirmationPending { .. }
            | Self::MissingRequiredEvidence(_)
            | Self::NotReadyToComplete { .. } => ErrorKind::Precondition,
            Self::InvalidSkuSelection { .. }
            | Self::InvalidTransition { .. }
            | Self::InvalidInput(_)
            | Self::Validation(_) => ErrorKind::Usage,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}

impl From<StoreError> for IntakeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { lpn } => IntakeError::AlreadyInbounded(lpn),
            other => IntakeError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for IntakeError {
    fn from(err: validator::ValidationErrors) -> Self {
        IntakeError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sea_orm::DbErr;

    #[test]
    fn intake_error_kind_mapping() {
        assert_eq!(IntakeError::NotFound("x".into()).kind(), ErrorKind::Rejection);
        assert_eq!(
            IntakeError::AlreadyComplete {
                tracking_number: "x".into(),
                declared: 1,
                inbounded: 1
            }
            .kind(),
            ErrorKind::Informational
        );
        assert_eq!(
            IntakeError::AlreadyInbounded("x".into()).kind(),
            ErrorKind::Rejection
        );
        assert_eq!(
            IntakeError::StoreUnavailable("x".into()).kind(),
            ErrorKind::Retryable
        );
        assert_eq!(
            IntakeError::MissingRequiredEvidence("x".into()).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            IntakeError::InvalidTransition {
                from: SessionState::Idle,
                event: SessionEvent::CompletePackage
            }
            .kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn only_store_failures_are_retryable() {
        assert!(IntakeError::StoreUnavailable("down".into()).is_retryable());
        assert!(IntakeError::SessionStore("disk full".into()).is_retryable());
        assert!(!IntakeError::AlreadyInbounded("L1".into()).is_retryable());
        assert!(!IntakeError::NotFound("T1".into()).is_retryable());
    }

    #[test]
    fn unique_violation_becomes_already_inbounded() {
        let err: IntakeError = StoreError::UniqueViolation { lpn: "LPN1".into() }.into();
        assert_matches!(err, IntakeError::AlreadyInbounded(lpn) if lpn == "LPN1");
    }

    #[test]
    fn other_store_errors_are_unavailable() {
        let err: IntakeError = StoreError::Database(DbErr::Custom("connection reset".into())).into();
        assert_matches!(err, IntakeError::StoreUnavailable(msg) if msg.contains("connection reset"));

        let err: IntakeError = StoreError::Unavailable("timeout".into()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn transition_error_names_state_and_event() {
        let err = IntakeError::InvalidTransition {
            from: SessionState::AwaitingLpn,
            event: SessionEvent::CompletePackage,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition: complete_package while awaiting_lpn"
        );
    }
}
