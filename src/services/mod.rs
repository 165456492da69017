// Scan-session engine
pub mod scan_session;
pub mod session_observer;
pub mod session_persistence;

// Back-office operations on declared shipments
pub mod duplicate_review;
pub mod reconciliation;

pub use duplicate_review::{DuplicateReview, FlaggedLine};
pub use reconciliation::{ReconciliationOutcome, ShipmentReconciler};
pub use scan_session::{
    CommitReceipt, CompletionReport, EngineSettings, LpnOutcome, ProgressReport, ScanOutcome,
    ScanSession, TrackingMatch,
};
pub use session_observer::{SessionActivity, SessionObserver};
pub use session_persistence::{
    FileSessionStore, InMemorySessionStore, ResumeOffer, SessionSnapshot, SessionStore,
};
