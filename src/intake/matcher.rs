use serde::Serialize;

use super::normalize::NormalizedKey;
use crate::models::ShipmentLine;

/// All declared lines that share one normalized tracking number.
///
/// Derived on every lookup and never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShipmentGroup {
    pub tracking_number: NormalizedKey,
    pub carrier: Option<String>,
    pub lines: Vec<ShipmentLine>,
}

impl ShipmentGroup {
    /// Σ quantity over the group's lines.
    pub fn declared_total_quantity(&self) -> u64 {
        self.lines.iter().map(ShipmentLine::declared_quantity).sum()
    }

    pub fn line_ids(&self) -> Vec<uuid::Uuid> {
        self.lines.iter().map(|line| line.id).collect()
    }

    /// True when the group and `other` cover the same tracking number and line set.
    pub fn same_lines_as(&self, other: &ShipmentGroup) -> bool {
        let mut ours = self.line_ids();
        let mut theirs = other.line_ids();
        ours.sort();
        theirs.sort();
        self.tracking_number == other.tracking_number && ours == theirs
    }
}

/// Result of matching a tracking scan against the declared manifest.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum MatchOutcome {
    /// The group still expects units.
    Matched {
        group: ShipmentGroup,
        inbounded: u64,
    },
    /// Nothing is declared under this tracking number.
    NotFound { tracking_number: String },
    /// Every declared unit has already been inbounded.
    AlreadyComplete {
        group: ShipmentGroup,
        inbounded: u64,
    },
}

/// Groups `declared_lines` under `tracking_number`. Pure; the caller supplies the live count.
pub fn match_tracking(
    tracking_number: &str,
    declared_lines: &[ShipmentLine],
    externally_inbounded: u64,
) -> MatchOutcome {
    let Some(key) = NormalizedKey::parse(tracking_number) else {
        return MatchOutcome::NotFound {
            tracking_number: tracking_number.trim().to_string(),
        };
    };

    let lines: Vec<ShipmentLine> = declared_lines
        .iter()
        .filter(|line| key.matches(&line.tracking_number))
        .cloned()
        .collect();

    if lines.is_empty() {
        return MatchOutcome::NotFound {
            tracking_number: key.into_inner(),
        };
    }

    let carrier = lines.iter().find_map(|line| line.carrier.clone());
    let group = ShipmentGroup {
        tracking_number: key,
        carrier,
        lines,
    };

    if group.declared_total_quantity() <= externally_inbounded {
        MatchOutcome::AlreadyComplete {
            group,
            inbounded: externally_inbounded,
        }
    } else {
        MatchOutcome::Matched {
            group,
            inbounded: externally_inbounded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn manifest() -> Vec<ShipmentLine> {
        vec![
            ShipmentLine::declared("TRK1", "ORD-1", "SKU-A", "Widget", 3).with_carrier("UPS"),
            ShipmentLine::declared("trk1 ", "ORD-1", "SKU-B", "Gadget", 2),
            ShipmentLine::declared("TRK2", "ORD-2", "SKU-C", "Gizmo", 1),
        ]
    }

    #[test]
    fn groups_every_line_under_the_tracking_number() {
        let outcome = match_tracking(" Trk1", &manifest(), 0);
        assert_matches!(outcome, MatchOutcome::Matched { group, inbounded: 0 } => {
            assert_eq!(group.tracking_number.as_str(), "TRK1");
            assert_eq!(group.lines.len(), 2);
            assert_eq!(group.declared_total_quantity(), 5);
            assert_eq!(group.carrier.as_deref(), Some("UPS"));
        });
    }

    #[test]
    fn unknown_tracking_is_not_found() {
        assert_matches!(
            match_tracking("TRK9", &manifest(), 0),
            MatchOutcome::NotFound { tracking_number } if tracking_number == "TRK9"
        );
        assert_matches!(match_tracking("   ", &manifest(), 0), MatchOutcome::NotFound { .. });
    }

    #[test]
    fn fully_inbounded_group_is_already_complete() {
        assert_matches!(
            match_tracking("TRK1", &manifest(), 5),
            MatchOutcome::AlreadyComplete { inbounded: 5, .. }
        );
        assert_matches!(
            match_tracking("TRK1", &manifest(), 4),
            MatchOutcome::Matched { inbounded: 4, .. }
        );
    }
}
