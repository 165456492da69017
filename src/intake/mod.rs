//! Pure reconciliation logic for returns intake.
//!
//! Nothing in here holds session state; the scan-session service in
//! [`crate::services::scan_session`] composes these pieces.

pub mod duplicates;
pub mod evidence;
pub mod force_completion;
pub mod matcher;
pub mod mismatch;
pub mod normalize;
pub mod scan_input;
pub mod state;

pub use duplicates::{DuplicateFilter, DuplicateFlag, ScannedLpns};
pub use evidence::{EvidencePolicy, IntakeDetails};
pub use force_completion::{discrepancy, Discrepancy};
pub use matcher::{match_tracking, MatchOutcome, ShipmentGroup};
pub use mismatch::{resolve, MismatchFinding};
pub use normalize::NormalizedKey;
pub use scan_input::{LineScanSource, ScanInputSource, ScriptedScans};
pub use state::{transition, SessionEvent, SessionState};
