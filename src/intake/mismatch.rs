use serde::Serialize;

use super::normalize::NormalizedKey;
use crate::errors::IntakeError;

/// Outcome of comparing a shipment line's SKU with the order SKUs found for a scanned LPN.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "finding", rename_all = "snake_case")]
pub enum MismatchFinding {
    /// Commit with this SKU without prompting.
    Matched { sku: NormalizedKey },
    /// The sources disagree; the operator picks one candidate.
    Mismatch {
        shipment_sku: NormalizedKey,
        order_skus: Vec<NormalizedKey>,
        candidate_skus: Vec<NormalizedKey>,
    },
    /// No order SKU to compare against; still needs explicit confirmation.
    Indeterminate {
        shipment_sku: NormalizedKey,
        candidate_skus: Vec<NormalizedKey>,
    },
}

impl MismatchFinding {
    pub fn requires_confirmation(&self) -> bool {
        !matches!(self, Self::Matched { .. })
    }

    pub fn order_sku_missing(&self) -> bool {
        matches!(self, Self::Indeterminate { .. })
    }

    pub fn candidates(&self) -> Vec<NormalizedKey> {
        match self {
            Self::Matched { sku } => vec![sku.clone()],
            Self::Mismatch { candidate_skus, .. } | Self::Indeterminate { candidate_skus, .. } => {
                candidate_skus.clone()
            }
        }
    }

    /// Validates an operator pick and returns it normalized.
    pub fn confirm(&self, selected: &str) -> Result<NormalizedKey, IntakeError> {
        let candidates = self.candidates();
        match NormalizedKey::parse(selected) {
            Some(sku) if candidates.contains(&sku) => Ok(sku),
            _ => Err(IntakeError::InvalidSkuSelection {
                sku: selected.trim().to_string(),
                candidates: candidates.into_iter().map(NormalizedKey::into_inner).collect(),
            }),
        }
    }
}

/// Compares `shipment_sku` against the order SKUs found for the scanned LPN.
///
/// The candidate set is the shipment SKU plus every order SKU, normalized, deduplicated
/// and with blanks dropped. Two or more candidates is a mismatch. A single candidate
/// with no order SKUs at all cannot be compared and is indeterminate. Anything else
/// matches. With no candidate at all there is nothing the operator could confirm, so the
/// scan is refused.
pub fn resolve<S: AsRef<str>>(
    shipment_sku: &str,
    order_skus: &[S],
) -> Result<MismatchFinding, IntakeError> {
    let shipment = NormalizedKey::new(shipment_sku);

    let mut orders: Vec<NormalizedKey> = Vec::new();
    for sku in order_skus.iter().filter_map(|s| NormalizedKey::parse(s.as_ref())) {
        if !orders.contains(&sku) {
            orders.push(sku);
        }
    }

    let mut candidates: Vec<NormalizedKey> = Vec::new();
    if !shipment.is_empty() {
        candidates.push(shipment.clone());
    }
    for sku in &orders {
        if !candidates.contains(sku) {
            candidates.push(sku.clone());
        }
    }

    let finding = match candidates.len() {
        0 => {
            return Err(IntakeError::InvalidInput(
                "Neither the shipment line nor the order carries a SKU".to_string(),
            ))
        }
        1 if orders.is_empty() => MismatchFinding::Indeterminate {
            shipment_sku: shipment,
            candidate_skus: candidates,
        },
        1 => MismatchFinding::Matched {
            sku: candidates.remove(0),
        },
        _ => MismatchFinding::Mismatch {
            shipment_sku: shipment,
            order_skus: orders,
            candidate_skus: candidates,
        },
    };
    Ok(finding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn keys(values: &[&str]) -> Vec<NormalizedKey> {
        values.iter().map(|v| NormalizedKey::new(v)).collect()
    }

    #[test]
    fn same_sku_matches() {
        assert_matches!(
            resolve("SKU-A", &["sku-a "]).unwrap(),
            MismatchFinding::Matched { sku } if sku.as_str() == "SKU-A"
        );
    }

    #[test]
    fn differing_order_sku_is_a_mismatch() {
        let finding = resolve("SKU-A", &["SKU-C"]).unwrap();
        assert_eq!(
            finding,
            MismatchFinding::Mismatch {
                shipment_sku: NormalizedKey::new("SKU-A"),
                order_skus: keys(&["SKU-C"]),
                candidate_skus: keys(&["SKU-A", "SKU-C"]),
            }
        );
        assert!(finding.requires_confirmation());
    }

    #[test]
    fn missing_order_sku_is_indeterminate() {
        let finding = resolve::<&str>("SKU-A", &[]).unwrap();
        assert!(finding.order_sku_missing());
        assert_eq!(finding.candidates(), keys(&["SKU-A"]));

        let finding = resolve("SKU-A", &["", "  "]).unwrap();
        assert!(finding.order_sku_missing());
    }

    #[test]
    fn blank_shipment_sku_with_one_order_sku_matches_the_order() {
        assert_matches!(
            resolve(" ", &["SKU-C"]).unwrap(),
            MismatchFinding::Matched { sku } if sku.as_str() == "SKU-C"
        );
    }

    #[test]
    fn no_sku_anywhere_is_refused() {
        assert_matches!(resolve::<&str>(" ", &[]), Err(IntakeError::InvalidInput(_)));
        assert_matches!(resolve("", &["", " "]), Err(IntakeError::InvalidInput(_)));
    }

    #[test]
    fn candidates_are_deduplicated() {
        let finding = resolve("SKU-A", &["SKU-C", "sku-c", "SKU-A"]).unwrap();
        assert_eq!(finding.candidates(), keys(&["SKU-A", "SKU-C"]));
    }

    #[test]
    fn confirm_accepts_only_candidates() {
        let finding = resolve("SKU-A", &["SKU-C"]).unwrap();
        assert_eq!(finding.confirm("sku-c").unwrap().as_str(), "SKU-C");
        assert_matches!(
            finding.confirm("SKU-Z"),
            Err(IntakeError::InvalidSkuSelection { sku, candidates })
                if sku == "SKU-Z" && candidates == vec!["SKU-A", "SKU-C"]
        );
        assert_matches!(finding.confirm(""), Err(IntakeError::InvalidSkuSelection { .. }));
    }
}
