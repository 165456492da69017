use serde::{Deserialize, Serialize};

use crate::errors::IntakeError;

/// Where a scan session currently is.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    /// A tracking lookup is in flight.
    AwaitingTracking,
    AwaitingLpn,
    ReadyToComplete,
    ForceCompleted,
}

impl SessionState {
    /// A session is active while a matched group is held.
    pub fn is_active(self) -> bool {
        matches!(self, Self::AwaitingLpn | Self::ReadyToComplete)
    }

    /// States that accept a new tracking scan.
    pub fn accepts_tracking(self) -> bool {
        matches!(self, Self::Idle | Self::ForceCompleted)
    }
}

/// Inputs driving [`transition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionEvent {
    TrackingSubmitted,
    TrackingMatched,
    TrackingRejected,
    /// An LPN was committed while the group still expects units.
    LpnAccepted,
    /// Live count reached the declared total.
    QuantityReached,
    /// Live count fell back below the declared total.
    QuantityDropped,
    CompletePackage,
    ForceComplete,
    /// A persisted snapshot was resumed.
    Resume,
    Reset,
}

/// The session state machine. Every pair not listed is an invalid transition.
pub fn transition(from: SessionState, event: SessionEvent) -> Result<SessionState, IntakeError> {
    use SessionEvent as E;
    use SessionState as S;

    let next = match (from, event) {
        (_, E::Reset) => S::Idle,

        (S::Idle | S::ForceCompleted, E::TrackingSubmitted) => S::AwaitingTracking,
        (S::Idle | S::ForceCompleted, E::Resume) => S::AwaitingLpn,
        (S::AwaitingTracking, E::TrackingMatched) => S::AwaitingLpn,
        (S::AwaitingTracking, E::TrackingRejected) => S::Idle,

        (S::AwaitingLpn, E::LpnAccepted) => S::AwaitingLpn,
        (S::AwaitingLpn | S::ReadyToComplete, E::QuantityReached) => S::ReadyToComplete,
        (S::ReadyToComplete, E::LpnAccepted) => S::ReadyToComplete,
        (S::ReadyToComplete | S::AwaitingLpn, E::QuantityDropped) => S::AwaitingLpn,

        (S::ReadyToComplete, E::CompletePackage) => S::Idle,
        (S::AwaitingLpn | S::ReadyToComplete, E::ForceComplete) => S::ForceCompleted,

        (
            S::Idle | S::ForceCompleted,
            E::TrackingMatched
            | E::TrackingRejected
            | E::LpnAccepted
            | E::QuantityReached
            | E::QuantityDropped
            | E::CompletePackage
            | E::ForceComplete,
        )
        | (
            S::AwaitingTracking,
            E::TrackingSubmitted
            | E::LpnAccepted
            | E::QuantityReached
            | E::QuantityDropped
            | E::CompletePackage
            | E::ForceComplete
            | E::Resume,
        )
        | (
            S::AwaitingLpn,
            E::TrackingSubmitted
            | E::TrackingMatched
            | E::TrackingRejected
            | E::CompletePackage
            | E::Resume,
        )
        | (
            S::ReadyToComplete,
            E::TrackingSubmitted | E::TrackingMatched | E::TrackingRejected | E::Resume,
        ) => return Err(IntakeError::InvalidTransition { from, event }),
    };

    Ok(next)
}
