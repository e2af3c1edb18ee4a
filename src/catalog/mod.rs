//! Stimulus catalog: the read-only set of sub-test definitions a battery is
//! assembled from.

mod builtin;

use std::{collections::HashSet, fs, path::Path};

use crate::error::{AssessmentError, Result};
use crate::models::SubTestDefinition;

pub use builtin::{builtin_definitions, BUILTIN_STIMULUS_SEED};

/// Longest response window a catalog entry may declare.
pub const MAX_TIME_LIMIT_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    definitions: Vec<SubTestDefinition>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids and definitions without a
    /// response deadline within a day or without a score range.
    pub fn new(definitions: Vec<SubTestDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for def in &definitions {
            if def.id.trim().is_empty() {
                return Err(AssessmentError::Catalog("sub-test with empty id".into()));
            }
            if !seen.insert(def.id.as_str()) {
                return Err(AssessmentError::Catalog(format!(
                    "duplicate sub-test id '{}'",
                    def.id
                )));
            }
            if def.time_limit_seconds == 0 {
                return Err(AssessmentError::Catalog(format!(
                    "sub-test '{}' has no time limit",
                    def.id
                )));
            }
            if def.time_limit_seconds > MAX_TIME_LIMIT_SECONDS {
                return Err(AssessmentError::Catalog(format!(
                    "sub-test '{}' time limit {}s exceeds {}s",
                    def.id, def.time_limit_seconds, MAX_TIME_LIMIT_SECONDS
                )));
            }
            if !(def.max_score.is_finite() && def.max_score > 0.0) {
                return Err(AssessmentError::Catalog(format!(
                    "sub-test '{}' has invalid max score {}",
                    def.id, def.max_score
                )));
            }
        }
        Ok(Self { definitions })
    }

    /// The canonical battery shipped with the engine.
    pub fn builtin() -> Self {
        Self::builtin_with_seed(BUILTIN_STIMULUS_SEED)
    }

    /// Canonical battery with digit sequences drawn from `seed`.
    pub fn builtin_with_seed(seed: u64) -> Self {
        Self {
            definitions: builtin_definitions(seed),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let definitions: Vec<SubTestDefinition> = serde_json::from_str(json)
            .map_err(|err| AssessmentError::Catalog(format!("invalid catalog JSON: {err}")))?;
        Self::new(definitions)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            AssessmentError::Catalog(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn get(&self, id: &str) -> Option<&SubTestDefinition> {
        self.definitions.iter().find(|def| def.id == id)
    }

    /// Definitions in declaration order.
    pub fn definitions(&self) -> &[SubTestDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessibilityTag, Modality, StimulusPayload, TestCategory};

    #[test]
    fn builtin_catalog_passes_validation() {
        let builtin = Catalog::builtin();
        let revalidated = Catalog::new(builtin.definitions().to_vec()).unwrap();
        assert_eq!(revalidated.len(), builtin.len());
        assert!(builtin.get("avlt-immediate").is_some());
    }

    #[test]
    fn builtin_catalog_is_reproducible() {
        assert_eq!(Catalog::builtin(), Catalog::builtin());
        assert_ne!(Catalog::builtin_with_seed(1), Catalog::builtin_with_seed(2));
    }

    #[test]
    fn builtin_has_audio_only_coverage_for_blind_users() {
        let catalog = Catalog::builtin();
        let audio_only = catalog
            .definitions()
            .iter()
            .filter(|def| def.has_tag(AccessibilityTag::AudioOnly))
            .count();
        assert!(audio_only >= 3);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let def = Catalog::builtin().definitions()[0].clone();
        let err = Catalog::new(vec![def.clone(), def]).unwrap_err();
        assert!(matches!(err, AssessmentError::Catalog(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn zero_time_limit_is_rejected() {
        let mut def = Catalog::builtin().definitions()[0].clone();
        def.time_limit_seconds = 0;
        assert!(Catalog::new(vec![def]).is_err());
    }

    #[test]
    fn time_limits_are_capped_at_a_day() {
        let mut def = Catalog::builtin().definitions()[0].clone();
        def.time_limit_seconds = MAX_TIME_LIMIT_SECONDS;
        assert!(Catalog::new(vec![def.clone()]).is_ok());

        def.time_limit_seconds = 10_u64.pow(16);
        let err = Catalog::new(vec![def]).unwrap_err();
        assert!(matches!(err, AssessmentError::Catalog(msg) if msg.contains("exceeds")));
    }

    #[test]
    fn loads_from_json() {
        let json = r#"[
            {
                "id": "fluency",
                "name": "Animal fluency",
                "modality": "audio",
                "category": "speech",
                "instructionText": "Name as many animals as you can.",
                "stimulus": { "kind": "prompt", "text": "animals" },
                "timeLimitSeconds": 60,
                "maxScore": 20,
                "accessibilityTags": ["audioOnly"]
            }
        ]"#;
        let catalog = Catalog::from_json_str(json).unwrap();
        let def = catalog.get("fluency").unwrap();
        assert_eq!(def.modality, Modality::Audio);
        assert_eq!(def.category, TestCategory::Speech);
        assert!(def.supported_locales.is_empty());
        assert!(matches!(def.stimulus, StimulusPayload::Prompt { .. }));
    }

    #[test]
    fn malformed_json_is_a_catalog_error() {
        let err = Catalog::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, AssessmentError::Catalog(_)));
    }
}
