use serde::{Deserialize, Serialize};

use crate::errors::IntakeError;
use crate::models::Grade;

/// Inspection details captured for one unit before it is committed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeDetails {
    pub grade: Grade,
    pub missing_parts: Vec<String>,
    pub damage_flagged: bool,
    /// Photos attached by the capture collaborator. Only the count matters here.
    pub photos_attached: u32,
}

impl IntakeDetails {
    pub fn graded(grade: Grade) -> Self {
        Self {
            grade,
            ..Self::default()
        }
    }

    pub fn with_missing_parts<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing_parts = parts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_damage(mut self) -> Self {
        self.damage_flagged = true;
        self
    }

    pub fn with_photos(mut self, count: u32) -> Self {
        self.photos_attached = count;
        self
    }
}

/// Which findings need photographic evidence before commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidencePolicy {
    pub require_photo_for_damage: bool,
    pub require_photo_for_missing_parts: bool,
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        Self {
            require_photo_for_damage: true,
            require_photo_for_missing_parts: true,
        }
    }
}

impl EvidencePolicy {
    /// Precondition the shell calls before allowing a commit. The engine calls it too.
    pub fn check(&self, details: &IntakeDetails) -> Result<(), IntakeError> {
        if details.photos_attached > 0 {
            return Ok(());
        }
        if self.require_photo_for_damage && details.damage_flagged {
            return Err(IntakeError::MissingRequiredEvidence(
                "damage flagged without a photo".to_string(),
            ));
        }
        if self.require_photo_for_missing_parts && !details.missing_parts.is_empty() {
            return Err(IntakeError::MissingRequiredEvidence(format!(
                "missing parts ({}) recorded without a photo",
                details.missing_parts.join(", ")
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn clean_unit_needs_no_photo() {
        assert!(EvidencePolicy::default().check(&IntakeDetails::default()).is_ok());
    }

    #[test]
    fn damage_without_photo_is_refused() {
        let details = IntakeDetails::graded(Grade::C).with_damage();
        assert_matches!(
            EvidencePolicy::default().check(&details),
            Err(IntakeError::MissingRequiredEvidence(_))
        );
        assert!(EvidencePolicy::default().check(&details.with_photos(1)).is_ok());
    }

    #[test]
    fn missing_parts_requirement_can_be_disabled() {
        let details = IntakeDetails::graded(Grade::B).with_missing_parts(["charger"]);
        assert!(EvidencePolicy::default().check(&details).is_err());

        let lenient = EvidencePolicy {
            require_photo_for_missing_parts: false,
            ..EvidencePolicy::default()
        };
        assert!(lenient.check(&details).is_ok());
    }
}
