use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use super::normalize::{normalize_identifier, normalize_text, NormalizedKey};
use crate::errors::IntakeError;
use crate::models::ShipmentLine;
use crate::repositories::InboundStore;

/// Fields two declared lines must share to be considered the same declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeclarationKey {
    order_id: String,
    tracking_number: String,
    sku: String,
    quantity: i32,
    product_name: String,
}

impl DeclarationKey {
    pub fn of(line: &ShipmentLine) -> Self {
        Self {
            order_id: normalize_identifier(&line.order_id),
            tracking_number: normalize_identifier(&line.tracking_number),
            sku: normalize_identifier(line.sku_or_fnsku()),
            quantity: line.quantity,
            product_name: normalize_text(&line.declared_name),
        }
    }
}

/// Advisory duplicate flag for one declared line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DuplicateFlag {
    pub line_id: Uuid,
    /// Another declared line shares this line's [`DeclarationKey`].
    pub duplicate: bool,
    pub confirmed: bool,
}

impl DuplicateFlag {
    /// Flagged and not yet accepted by an operator.
    pub fn needs_review(&self) -> bool {
        self.duplicate && !self.confirmed
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateFilter {
    /// Every line that shares a key with another, confirmed or not.
    #[default]
    All,
    /// Only lines still awaiting review.
    Unconfirmed,
}

impl DuplicateFilter {
    pub fn includes(self, flag: &DuplicateFlag) -> bool {
        match self {
            Self::All => flag.duplicate,
            Self::Unconfirmed => flag.needs_review(),
        }
    }
}

/// Flags every line whose declaration key is shared with at least one other line.
/// Returned in input order.
pub fn flag_duplicates(lines: &[ShipmentLine]) -> Vec<DuplicateFlag> {
    let keys: Vec<DeclarationKey> = lines.iter().map(DeclarationKey::of).collect();
    let mut occurrences: HashMap<&DeclarationKey, usize> = HashMap::new();
    for key in &keys {
        *occurrences.entry(key).or_default() += 1;
    }

    lines
        .iter()
        .zip(keys.iter())
        .map(|(line, key)| DuplicateFlag {
            line_id: line.id,
            duplicate: occurrences.get(key).copied().unwrap_or(0) > 1,
            confirmed: line.duplicate_confirmed,
        })
        .collect()
}

/// LPNs accepted in the current session, in scan order, without repeats.
#[derive(Clone, Debug, Default)]
pub struct ScannedLpns {
    order: Vec<NormalizedKey>,
    seen: HashSet<NormalizedKey>,
}

impl ScannedLpns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, lpn: &NormalizedKey) -> bool {
        self.seen.contains(lpn)
    }

    /// Returns false if the LPN was already present.
    pub fn insert(&mut self, lpn: NormalizedKey) -> bool {
        if self.seen.insert(lpn.clone()) {
            self.order.push(lpn);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NormalizedKey> {
        self.order.iter()
    }
}

/// Scan admission: the session's own set first, then the authoritative store.
///
/// The store check always runs, even when the session check passes, because another
/// device may have committed the same LPN.
pub async fn admit_lpn(
    scanned: &ScannedLpns,
    store: &dyn InboundStore,
    lpn: &NormalizedKey,
) -> Result<(), IntakeError> {
    if scanned.contains(lpn) {
        return Err(IntakeError::AlreadyScannedThisSession(lpn.to_string()));
    }
    if store.exists_inbound_record(lpn).await? {
        debug!(lpn = %lpn, "LPN already inbounded elsewhere");
        return Err(IntakeError::AlreadyInbounded(lpn.to_string()));
    }
    Ok(())
}
