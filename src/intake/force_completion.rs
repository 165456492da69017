use serde::Serialize;

/// Difference between what a group declared and what was actually inbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "units", rename_all = "snake_case")]
pub enum Discrepancy {
    Exact,
    Shortfall(u64),
    /// More inbounded than declared. Recorded as an inconsistency, never as a negative shortfall.
    Surplus(u64),
}

impl Discrepancy {
    /// Units still missing; zero unless this is a shortfall.
    pub fn shortfall(self) -> u64 {
        match self {
            Self::Shortfall(units) => units,
            Self::Exact | Self::Surplus(_) => 0,
        }
    }

    pub fn is_inconsistent(self) -> bool {
        matches!(self, Self::Surplus(_))
    }
}

/// `declared - actual`, without ever going negative.
pub fn discrepancy(declared: u64, actual: u64) -> Discrepancy {
    match declared.cmp(&actual) {
        std::cmp::Ordering::Greater => Discrepancy::Shortfall(declared - actual),
        std::cmp::Ordering::Equal => Discrepancy::Exact,
        std::cmp::Ordering::Less => Discrepancy::Surplus(actual - declared),
    }
}

/// Audit note written onto every line of a force-completed group.
pub fn force_completion_note(declared: u64, actual: u64, reason: Option<&str>) -> String {
    let gap = discrepancy(declared, actual);
    let mut note = format!(
        "Force completed: declared {}, inbounded {}, short {}",
        declared,
        actual,
        gap.shortfall()
    );
    if let Discrepancy::Surplus(extra) = gap {
        note.push_str(&format!("; inconsistency: inbounded exceeds declared by {}", extra));
    }
    if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
        note.push_str(&format!("; reason: {}", reason));
    }
    note
}

/// Note written when a deleted record pushes an inbound group back below its declared total.
pub fn reversion_note(declared: u64, actual: u64) -> String {
    format!(
        "Reverted after record deletion: inbounded {} of {}, short {}",
        actual,
        declared,
        discrepancy(declared, actual).shortfall()
    )
}
