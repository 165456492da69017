use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    commands::{Command, CommitInboundRecordCommand, TransitionShipmentStatusCommand},
    errors::IntakeError,
    events::{EventSender, IntakeEvent},
    intake::{
        duplicates::admit_lpn,
        force_completion::{discrepancy, force_completion_note, Discrepancy},
        match_tracking, resolve, transition, EvidencePolicy, IntakeDetails, MatchOutcome,
        MismatchFinding, NormalizedKey, ScannedLpns, SessionEvent, SessionState, ShipmentGroup,
    },
    models::{InboundRecord, ShipmentLine, ShipmentStatus},
    repositories::{InboundStore, NewInboundRecord},
    services::{
        session_observer::{SessionActivity, SessionObserver, SessionObservers},
        session_persistence::{ResumeOffer, SessionSnapshot, SessionStore},
    },
};

/// Engine knobs, usually projected from [`crate::config::IntakeConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// Snapshots at least this old are never offered for resume.
    pub session_max_age: Duration,
    /// When set, scans that would push the live count past `ceil(declared * ratio)` are refused.
    pub over_quantity_ceiling_ratio: Option<f64>,
    pub evidence: EvidencePolicy,
    pub device_id: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            session_max_age: Duration::hours(24),
            over_quantity_ceiling_ratio: None,
            evidence: EvidencePolicy::default(),
            device_id: None,
        }
    }
}

impl EngineSettings {
    /// Highest live count a group may reach, if a ceiling is configured.
    pub fn over_quantity_ceiling(&self, declared: u64) -> Option<u64> {
        self.over_quantity_ceiling_ratio
            .map(|ratio| (declared as f64 * ratio.max(1.0)).ceil() as u64)
    }
}

/// An accepted LPN waiting for the operator to pick a SKU.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StagedScan {
    pub lpn: NormalizedKey,
    pub shipment_line_id: Uuid,
    pub finding: MismatchFinding,
}

/// Successful tracking lookup.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackingMatch {
    pub tracking_number: String,
    pub carrier: Option<String>,
    pub lines: usize,
    pub declared: u64,
    pub inbounded: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommitReceipt {
    pub record: InboundRecord,
    /// The store already held `declared` or more units before this one.
    pub over_quantity: bool,
    pub declared: u64,
    pub inbounded: u64,
    pub session_scanned: usize,
    pub state: SessionState,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LpnOutcome {
    Committed(CommitReceipt),
    /// Staged; call [`ScanSession::confirm_sku`] with one of the finding's candidates.
    ConfirmationRequired { lpn: String, finding: MismatchFinding },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Tracking(TrackingMatch),
    Lpn(LpnOutcome),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineProgress {
    pub line_id: Uuid,
    pub sku: String,
    pub declared: u64,
    /// Live count for this line's SKU under the tracking number.
    pub inbounded: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressReport {
    pub tracking_number: String,
    pub declared: u64,
    pub inbounded: u64,
    pub remaining: u64,
    pub session_scanned: usize,
    pub lines: Vec<LineProgress>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionReport {
    pub tracking_number: String,
    pub declared: u64,
    pub inbounded: u64,
    pub discrepancy: Discrepancy,
    pub note: Option<String>,
    pub state: SessionState,
}

/// Live progress for a group, read entirely from the store.
pub async fn group_progress(
    store: &dyn InboundStore,
    group: &ShipmentGroup,
    session_scanned: usize,
) -> Result<ProgressReport, IntakeError> {
    let declared = group.declared_total_quantity();
    let inbounded = store.count_inbounded_by_tracking(&group.tracking_number).await?;

    let lines = try_join_all(group.lines.iter().map(|line| async move {
        let sku = NormalizedKey::new(&line.sku);
        let inbounded = store
            .count_inbounded_by_sku_and_tracking(&group.tracking_number, &sku)
            .await?;
        Ok::<_, IntakeError>(LineProgress {
            line_id: line.id,
            sku: sku.into_inner(),
            declared: line.declared_quantity(),
            inbounded,
        })
    }))
    .await?;

    Ok(ProgressReport {
        tracking_number: group.tracking_number.to_string(),
        declared,
        inbounded,
        remaining: declared.saturating_sub(inbounded),
        session_scanned,
        lines,
    })
}

/// Looks up and classifies a tracking number using live counts.
pub async fn lookup_group(
    store: &dyn InboundStore,
    tracking: &NormalizedKey,
) -> Result<MatchOutcome, IntakeError> {
    let lines = store.find_shipment_lines(tracking).await?;
    let inbounded = store.count_inbounded_by_tracking(tracking).await?;
    Ok(match_tracking(tracking.as_str(), &lines, inbounded))
}

#[derive(Debug)]
struct ActiveSession {
    group: ShipmentGroup,
    scanned: ScannedLpns,
    started_at: DateTime<Utc>,
    staged: Option<StagedScan>,
}

impl ActiveSession {
    fn new(group: ShipmentGroup) -> Self {
        Self {
            group,
            scanned: ScannedLpns::new(),
            started_at: Utc::now(),
            staged: None,
        }
    }
}

/// One device's scan session.
///
/// The engine is a single logical actor: every operation takes `&mut self` and runs to
/// completion before the next one starts. Other devices may be committing against the
/// same tracking number at any time, so every admission and completion decision is made
/// from a live store query.
pub struct ScanSession {
    store: Arc<dyn InboundStore>,
    sessions: Arc<dyn SessionStore>,
    event_sender: Arc<EventSender>,
    settings: EngineSettings,
    state: SessionState,
    active: Option<ActiveSession>,
    resume_offer: Option<ResumeOffer>,
    observers: SessionObservers,
}

impl ScanSession {
    pub fn new(
        store: Arc<dyn InboundStore>,
        sessions: Arc<dyn SessionStore>,
        event_sender: Arc<EventSender>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            sessions,
            event_sender,
            settings,
            state: SessionState::Idle,
            active: None,
            resume_offer: None,
            observers: SessionObservers::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn group(&self) -> Option<&ShipmentGroup> {
        self.active.as_ref().map(|session| &session.group)
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.group().map(|group| group.tracking_number.as_str())
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.active.as_ref().map(|session| session.started_at)
    }

    /// LPNs accepted in this session, in scan order.
    pub fn scanned_lpns(&self) -> Vec<String> {
        self.active
            .as_ref()
            .map(|session| session.scanned.iter().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    pub fn staged(&self) -> Option<&StagedScan> {
        self.active.as_ref().and_then(|session| session.staged.as_ref())
    }

    pub fn resume_offer(&self) -> Option<&ResumeOffer> {
        self.resume_offer.as_ref()
    }

    /// Subscribes the shell to state changes. The observer is told the current state at once.
    pub fn on_session_active<O>(&mut self, observer: O)
    where
        O: SessionObserver + 'static,
    {
        let observer: Arc<dyn SessionObserver> = Arc::new(observer);
        observer.on_session_activity(&self.activity());
        self.observers.register(observer);
    }

    fn activity(&self) -> SessionActivity {
        SessionActivity {
            active: self.state.is_active(),
            state: self.state,
            tracking_number: self.tracking_number().map(str::to_string),
        }
    }

    /// Checks for an interrupted session. Stale, unmatched or already complete snapshots
    /// are cleared and never offered.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> Result<Option<ResumeOffer>, IntakeError> {
        self.resume_offer = None;
        let Some(snapshot) = self.sessions.load().await? else {
            return Ok(None);
        };

        if snapshot.is_stale(Utc::now(), self.settings.session_max_age) {
            info!(tracking = %snapshot.tracking_number, saved_at = %snapshot.saved_at, "Discarding stale session snapshot");
            self.sessions.clear().await?;
            return Ok(None);
        }

        let Some(tracking) = NormalizedKey::parse(&snapshot.tracking_number) else {
            self.sessions.clear().await?;
            return Ok(None);
        };

        match lookup_group(self.store.as_ref(), &tracking).await? {
            MatchOutcome::Matched { group, inbounded } => {
                let offer = ResumeOffer {
                    tracking_number: group.tracking_number.to_string(),
                    saved_at: snapshot.saved_at,
                    declared: group.declared_total_quantity(),
                    inbounded,
                };
                info!(tracking = %offer.tracking_number, inbounded, declared = offer.declared, "Offering session resume");
                self.resume_offer = Some(offer.clone());
                Ok(Some(offer))
            }
            MatchOutcome::AlreadyComplete { .. } | MatchOutcome::NotFound { .. } => {
                info!(tracking = %tracking, "Discarding snapshot for a group that no longer needs scanning");
                self.sessions.clear().await?;
                Ok(None)
            }
        }
    }

    /// Accepts the pending resume offer. The group is recomputed fresh and the session
    /// starts with an empty scanned set; progress comes from the store.
    #[instrument(skip(self))]
    pub async fn resume(&mut self) -> Result<TrackingMatch, IntakeError> {
        transition(self.state, SessionEvent::Resume)?;
        let offer = self
            .resume_offer
            .clone()
            .ok_or_else(|| IntakeError::InvalidInput("No session to resume".to_string()))?;

        let tracking = NormalizedKey::new(&offer.tracking_number);
        // A failed lookup keeps the offer so the operator can retry
        let outcome = lookup_group(self.store.as_ref(), &tracking).await?;
        self.resume_offer = None;
        match outcome {
            MatchOutcome::Matched { group, inbounded } => {
                let matched = TrackingMatch {
                    tracking_number: group.tracking_number.to_string(),
                    carrier: group.carrier.clone(),
                    lines: group.lines.len(),
                    declared: group.declared_total_quantity(),
                    inbounded,
                };
                self.active = Some(ActiveSession::new(group));
                self.apply(SessionEvent::Resume).await?;

                self.event_sender
                    .send_or_log(IntakeEvent::SessionResumed {
                        tracking_number: matched.tracking_number.clone(),
                        saved_at: offer.saved_at,
                    });
                counter!("returns_intake.sessions.resumed", 1);
                Ok(matched)
            }
            MatchOutcome::AlreadyComplete {
                group, inbounded, ..
            } => {
                self.clear_snapshot().await;
                Err(IntakeError::AlreadyComplete {
                    tracking_number: group.tracking_number.to_string(),
                    declared: group.declared_total_quantity(),
                    inbounded,
                })
            }
            MatchOutcome::NotFound { tracking_number } => {
                self.clear_snapshot().await;
                Err(IntakeError::NotFound(tracking_number))
            }
        }
    }

    /// Declines the pending resume offer and deletes the snapshot.
    pub async fn discard(&mut self) -> Result<(), IntakeError> {
        self.resume_offer = None;
        self.sessions.clear().await
    }

    /// Routes a decoded scan: tracking numbers while no session is active, LPNs otherwise.
    pub async fn handle_scan(&mut self, raw: &str) -> Result<ScanOutcome, IntakeError> {
        if self.state.accepts_tracking() {
            self.scan_tracking(raw).await.map(ScanOutcome::Tracking)
        } else {
            self.scan_lpn(raw, IntakeDetails::default())
                .await
                .map(ScanOutcome::Lpn)
        }
    }

    #[instrument(skip(self))]
    pub async fn scan_tracking(&mut self, raw: &str) -> Result<TrackingMatch, IntakeError> {
        let tracking = NormalizedKey::parse(raw)
            .ok_or_else(|| IntakeError::InvalidInput("Tracking number is empty".to_string()))?;

        self.apply(SessionEvent::TrackingSubmitted).await?;

        let outcome = match lookup_group(self.store.as_ref(), &tracking).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.apply(SessionEvent::TrackingRejected).await?;
                return Err(e);
            }
        };

        match outcome {
            MatchOutcome::Matched { group, inbounded } => {
                let matched = TrackingMatch {
                    tracking_number: group.tracking_number.to_string(),
                    carrier: group.carrier.clone(),
                    lines: group.lines.len(),
                    declared: group.declared_total_quantity(),
                    inbounded,
                };
                self.resume_offer = None;
                self.active = Some(ActiveSession::new(group));
                self.apply(SessionEvent::TrackingMatched).await?;

                info!(
                    tracking = %matched.tracking_number,
                    declared = matched.declared,
                    inbounded = matched.inbounded,
                    "Tracking matched"
                );
                self.event_sender
                    .send_or_log(IntakeEvent::TrackingMatched {
                        tracking_number: matched.tracking_number.clone(),
                        declared: matched.declared,
                        inbounded: matched.inbounded,
                    });
                Ok(matched)
            }
            MatchOutcome::NotFound { tracking_number } => {
                self.apply(SessionEvent::TrackingRejected).await?;
                counter!("returns_intake.tracking.not_found", 1);
                Err(IntakeError::NotFound(tracking_number))
            }
            MatchOutcome::AlreadyComplete { group, inbounded } => {
                self.apply(SessionEvent::TrackingRejected).await?;
                counter!("returns_intake.tracking.already_complete", 1);
                Err(IntakeError::AlreadyComplete {
                    tracking_number: group.tracking_number.to_string(),
                    declared: group.declared_total_quantity(),
                    inbounded,
                })
            }
        }
    }

    /// Admits an LPN. Matched SKUs commit immediately with `details`; mismatched or
    /// indeterminate ones are staged for [`Self::confirm_sku`].
    #[instrument(skip(self, details))]
    pub async fn scan_lpn(
        &mut self,
        raw: &str,
        details: IntakeDetails,
    ) -> Result<LpnOutcome, IntakeError> {
        if !self.state.is_active() {
            return Err(IntakeError::InvalidTransition {
                from: self.state,
                event: SessionEvent::LpnAccepted,
            });
        }
        let lpn = NormalizedKey::parse(raw)
            .ok_or_else(|| IntakeError::InvalidInput("LPN is empty".to_string()))?;

        let (group, scanned) = {
            let session = self.active_session()?;
            if let Some(staged) = &session.staged {
                if staged.lpn != lpn {
                    return Err(IntakeError::ConfirmationPending {
                        pending: staged.lpn.to_string(),
                    });
                }
            }
            (session.group.clone(), session.scanned.clone())
        };

        self.settings.evidence.check(&details)?;

        if let Err(e) = admit_lpn(&scanned, self.store.as_ref(), &lpn).await {
            counter!("returns_intake.scans.rejected", 1);
            debug!(lpn = %lpn, error = %e, "LPN rejected");
            return Err(e);
        }

        let orders = self.store.find_orders_by_lpn(&lpn).await?;
        let order_skus: Vec<String> = orders.iter().map(|order| order.sku.clone()).collect();
        let line = self.select_line(&group, &order_skus).await?;
        let finding = resolve(&line.sku, &order_skus)?;

        match finding {
            MismatchFinding::Matched { sku } => {
                let receipt = self.commit(lpn, line.id, sku, details).await?;
                Ok(LpnOutcome::Committed(receipt))
            }
            finding => {
                let shipment_sku = NormalizedKey::new(&line.sku).into_inner();
                let candidates = finding.candidates();
                warn!(lpn = %lpn, shipment_sku = %shipment_sku, candidates = ?candidates, "SKU needs confirmation");
                counter!("returns_intake.advisories.sku_mismatch", 1);
                self.event_sender
                    .send_or_log(IntakeEvent::SkuMismatchDetected {
                        lpn: lpn.to_string(),
                        shipment_sku,
                        candidate_skus: candidates.into_iter().map(NormalizedKey::into_inner).collect(),
                        order_sku_missing: finding.order_sku_missing(),
                    });

                let session = self.active_session_mut()?;
                session.staged = Some(StagedScan {
                    lpn: lpn.clone(),
                    shipment_line_id: line.id,
                    finding: finding.clone(),
                });
                Ok(LpnOutcome::ConfirmationRequired {
                    lpn: lpn.into_inner(),
                    finding,
                })
            }
        }
    }

    /// Commits the staged scan with the operator's SKU pick.
    #[instrument(skip(self, details))]
    pub async fn confirm_sku(
        &mut self,
        sku: &str,
        details: IntakeDetails,
    ) -> Result<CommitReceipt, IntakeError> {
        let (staged, group, scanned) = {
            let session = self.active_session()?;
            let staged = session.staged.clone().ok_or_else(|| {
                IntakeError::InvalidInput("No scan is waiting for SKU confirmation".to_string())
            })?;
            (staged, session.group.clone(), session.scanned.clone())
        };

        let confirmed = staged.finding.confirm(sku)?;
        self.settings.evidence.check(&details)?;

        // Time has passed since staging; another device may have committed it.
        if let Err(e) = admit_lpn(&scanned, self.store.as_ref(), &staged.lpn).await {
            if matches!(e, IntakeError::AlreadyInbounded(_)) {
                self.drop_staged();
            }
            return Err(e);
        }

        let line_id = group
            .lines
            .iter()
            .find(|line| confirmed.matches(&line.sku))
            .map(|line| line.id)
            .unwrap_or(staged.shipment_line_id);

        self.commit(staged.lpn, line_id, confirmed, details).await
    }

    /// Drops the staged scan, returning its LPN. Nothing was committed for it.
    pub fn cancel_pending(&mut self) -> Option<String> {
        self.drop_staged().map(|staged| staged.lpn.into_inner())
    }

    fn drop_staged(&mut self) -> Option<StagedScan> {
        self.active.as_mut().and_then(|session| session.staged.take())
    }

    /// Parts checklist for the confirmed SKU, for missing-parts entry.
    pub async fn parts_checklist(&self, sku: &str) -> Result<Vec<String>, IntakeError> {
        let sku = NormalizedKey::parse(sku)
            .ok_or_else(|| IntakeError::InvalidInput("SKU is empty".to_string()))?;
        Ok(self.store.find_product_parts(&sku).await?)
    }

    pub async fn progress(&self) -> Result<ProgressReport, IntakeError> {
        let session = self.active_session()?;
        group_progress(self.store.as_ref(), &session.group, session.scanned.len()).await
    }

    /// Marks every line of the group `inbound`. Requires the live count to have reached
    /// the declared total at the moment of the call.
    #[instrument(skip(self))]
    pub async fn complete_package(&mut self) -> Result<CompletionReport, IntakeError> {
        if self.state != SessionState::AwaitingLpn {
            transition(self.state, SessionEvent::CompletePackage)?;
        }
        let group = self.pending_free_group()?;
        let declared = group.declared_total_quantity();
        let inbounded = self
            .store
            .count_inbounded_by_tracking(&group.tracking_number)
            .await?;

        if inbounded < declared {
            if self.state == SessionState::ReadyToComplete {
                warn!(tracking = %group.tracking_number, inbounded, declared, "Live count dropped below declared");
                self.apply(SessionEvent::QuantityDropped).await?;
            }
            return Err(IntakeError::NotReadyToComplete {
                declared,
                inbounded,
            });
        }
        if self.state == SessionState::AwaitingLpn {
            // Other devices filled the group since our last scan.
            self.apply(SessionEvent::QuantityReached).await?;
        }

        TransitionShipmentStatusCommand {
            tracking_number: group.tracking_number.to_string(),
            line_ids: group.line_ids(),
            status: ShipmentStatus::Inbound,
            note: None,
        }
        .execute(self.store.clone(), self.event_sender.clone())
        .await?;

        self.active = None;
        self.apply(SessionEvent::CompletePackage).await?;

        info!(tracking = %group.tracking_number, inbounded, declared, "Package completed");
        counter!("returns_intake.packages.completed", 1);
        self.event_sender
            .send_or_log(IntakeEvent::PackageCompleted {
                tracking_number: group.tracking_number.to_string(),
                declared,
                inbounded,
            });

        Ok(CompletionReport {
            tracking_number: group.tracking_number.into_inner(),
            declared,
            inbounded,
            discrepancy: discrepancy(declared, inbounded),
            note: None,
            state: self.state,
        })
    }

    /// Closes the group despite a shortfall, writing the discrepancy onto every line.
    #[instrument(skip(self))]
    pub async fn force_complete(
        &mut self,
        reason: Option<&str>,
    ) -> Result<CompletionReport, IntakeError> {
        transition(self.state, SessionEvent::ForceComplete)?;
        let group = self.pending_free_group()?;
        let declared = group.declared_total_quantity();
        let inbounded = self
            .store
            .count_inbounded_by_tracking(&group.tracking_number)
            .await?;
        let gap = discrepancy(declared, inbounded);
        let note = force_completion_note(declared, inbounded, reason);
        if gap.is_inconsistent() {
            warn!(tracking = %group.tracking_number, inbounded, declared, "Force completing a group that exceeds its declared quantity");
        }

        TransitionShipmentStatusCommand {
            tracking_number: group.tracking_number.to_string(),
            line_ids: group.line_ids(),
            status: ShipmentStatus::Inbound,
            note: Some(note.clone()),
        }
        .execute(self.store.clone(), self.event_sender.clone())
        .await?;

        self.active = None;
        self.apply(SessionEvent::ForceComplete).await?;

        warn!(tracking = %group.tracking_number, shortfall = gap.shortfall(), "Package force completed");
        counter!("returns_intake.packages.force_completed", 1);
        self.event_sender
            .send_or_log(IntakeEvent::PackageForceCompleted {
                tracking_number: group.tracking_number.to_string(),
                declared,
                inbounded,
                note: note.clone(),
            });

        Ok(CompletionReport {
            tracking_number: group.tracking_number.into_inner(),
            declared,
            inbounded,
            discrepancy: gap,
            note: Some(note),
            state: self.state,
        })
    }

    /// Abandons the session. Committed records stay; only the bookkeeping goes.
    #[instrument(skip(self))]
    pub async fn reset(&mut self) -> Result<(), IntakeError> {
        let tracking_number = self.tracking_number().map(str::to_string);
        self.active = None;
        self.resume_offer = None;
        self.apply(SessionEvent::Reset).await?;

        self.event_sender
            .send_or_log(IntakeEvent::SessionReset { tracking_number });
        Ok(())
    }

    async fn commit(
        &mut self,
        lpn: NormalizedKey,
        line_id: Uuid,
        sku: NormalizedKey,
        details: IntakeDetails,
    ) -> Result<CommitReceipt, IntakeError> {
        let group = self.active_session()?.group.clone();
        let declared = group.declared_total_quantity();
        let before = self
            .store
            .count_inbounded_by_tracking(&group.tracking_number)
            .await?;

        if let Some(ceiling) = self.settings.over_quantity_ceiling(declared) {
            if before + 1 > ceiling {
                counter!("returns_intake.scans.rejected", 1);
                return Err(IntakeError::OverQuantityLimit {
                    tracking_number: group.tracking_number.to_string(),
                    ceiling,
                });
            }
        }
        let over_quantity = before + 1 > declared;

        let command = CommitInboundRecordCommand {
            record: NewInboundRecord {
                lpn: lpn.to_string(),
                shipment_line_id: line_id,
                tracking_number: group.tracking_number.to_string(),
                sku: sku.to_string(),
                grade: details.grade,
                missing_parts: details.missing_parts,
                processed_at: Utc::now(),
            },
        };
        let record = match command
            .execute(self.store.clone(), self.event_sender.clone())
            .await
        {
            Ok(record) => record,
            Err(e) => {
                if matches!(e, IntakeError::AlreadyInbounded(_)) {
                    self.drop_staged();
                }
                counter!("returns_intake.scans.rejected", 1);
                return Err(e);
            }
        };

        let session_scanned = {
            let session = self.active_session_mut()?;
            session.scanned.insert(lpn);
            session.staged = None;
            session.scanned.len()
        };
        counter!("returns_intake.scans.accepted", 1);

        if over_quantity {
            warn!(tracking = %group.tracking_number, declared, inbounded = before + 1, "Over-quantity scan accepted");
            counter!("returns_intake.advisories.over_quantity", 1);
            self.event_sender
                .send_or_log(IntakeEvent::OverQuantityDetected {
                    tracking_number: group.tracking_number.to_string(),
                    declared,
                    inbounded: before + 1,
                });
        }

        let inbounded = match self
            .store
            .count_inbounded_by_tracking(&group.tracking_number)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Could not re-read live count after commit");
                before + 1
            }
        };

        let event = if inbounded >= declared {
            SessionEvent::QuantityReached
        } else if self.state == SessionState::ReadyToComplete {
            SessionEvent::QuantityDropped
        } else {
            SessionEvent::LpnAccepted
        };
        let state = self.apply(event).await?;

        Ok(CommitReceipt {
            record,
            over_quantity,
            declared,
            inbounded,
            session_scanned,
            state,
        })
    }

    /// Line an LPN is attached to: one whose SKU an order names, else the only line, else
    /// the first line still short on its SKU, else the first line.
    async fn select_line(
        &self,
        group: &ShipmentGroup,
        order_skus: &[String],
    ) -> Result<ShipmentLine, IntakeError> {
        let first = group
            .lines
            .first()
            .cloned()
            .ok_or_else(|| IntakeError::NotFound(group.tracking_number.to_string()))?;

        if let Some(line) = group
            .lines
            .iter()
            .find(|line| order_skus.iter().any(|sku| NormalizedKey::new(&line.sku).matches(sku)))
        {
            return Ok(line.clone());
        }
        if group.lines.len() == 1 {
            return Ok(first);
        }
        for line in &group.lines {
            let inbounded = self
                .store
                .count_inbounded_by_sku_and_tracking(
                    &group.tracking_number,
                    &NormalizedKey::new(&line.sku),
                )
                .await?;
            if inbounded < line.declared_quantity() {
                return Ok(line.clone());
            }
        }
        Ok(first)
    }

    /// Applies `event` through the state machine, persisting or clearing the snapshot and
    /// notifying observers as needed.
    async fn apply(&mut self, event: SessionEvent) -> Result<SessionState, IntakeError> {
        let from = self.state;
        let next = transition(from, event)?;
        self.state = next;

        if next == SessionState::AwaitingLpn && from != SessionState::AwaitingLpn {
            self.save_snapshot().await;
        }
        if matches!(next, SessionState::Idle | SessionState::ForceCompleted)
            && (from.is_active() || event == SessionEvent::Reset)
        {
            self.clear_snapshot().await;
        }
        if from != next {
            debug!(from = %from, to = %next, event = %event, "Session state changed");
            self.observers.publish(&self.activity());
        }
        Ok(next)
    }

    async fn save_snapshot(&self) {
        let Some(tracking) = self.tracking_number() else {
            return;
        };
        let snapshot = SessionSnapshot::new(tracking, self.settings.device_id.clone());
        if let Err(e) = self.sessions.save(&snapshot).await {
            warn!(error = %e, "Session snapshot not saved; resume will be unavailable");
        }
    }

    async fn clear_snapshot(&self) {
        if let Err(e) = self.sessions.clear().await {
            warn!(error = %e, "Session snapshot not cleared");
        }
    }

    fn active_session(&self) -> Result<&ActiveSession, IntakeError> {
        self.active
            .as_ref()
            .ok_or_else(|| IntakeError::InvalidInput("No active scan session".to_string()))
    }

    fn active_session_mut(&mut self) -> Result<&mut ActiveSession, IntakeError> {
        self.active
            .as_mut()
            .ok_or_else(|| IntakeError::InvalidInput("No active scan session".to_string()))
    }

    /// The active group, refusing while a scan still waits for SKU confirmation.
    fn pending_free_group(&self) -> Result<ShipmentGroup, IntakeError> {
        let session = self.active_session()?;
        if let Some(staged) = &session.staged {
            return Err(IntakeError::ConfirmationPending {
                pending: staged.lpn.to_string(),
            });
        }
        Ok(session.group.clone())
    }
}
