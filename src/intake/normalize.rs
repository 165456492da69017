use serde::{Deserialize, Serialize};
use std::fmt;

/// Case- and whitespace-insensitive identifier used for tracking numbers, SKUs and LPNs.
///
/// Scanners and manual entry disagree on casing and often pad or split codes with
/// spaces, so every comparison in the intake flow goes through this type. The inner
/// value is upper-cased with all whitespace removed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Normalizes `raw`, returning `None` when nothing but whitespace remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = normalize_identifier(raw);
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    /// Normalizes `raw` unconditionally. The result may be empty.
    pub fn new(raw: &str) -> Self {
        Self(normalize_identifier(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true when `raw` normalizes to this key.
    pub fn matches(&self, raw: &str) -> bool {
        !self.0.is_empty() && self.0 == normalize_identifier(raw)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Upper-cases and strips every whitespace character.
pub fn normalize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Normalizes free text such as product names: trimmed, lower-cased, inner runs of
/// whitespace collapsed to a single space.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compares two identifiers ignoring case and whitespace. Two blank values never match.
pub fn same_identifier(a: &str, b: &str) -> bool {
    let a = normalize_identifier(a);
    !a.is_empty() && a == normalize_identifier(b)
}
