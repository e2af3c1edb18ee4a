use std::time::Duration;

use crate::catalog::Catalog;
use crate::error::{AssessmentError, Result};
use crate::models::{SubTestDefinition, UserAccessibilityProfile};

/// Ordered battery for one session. Fixed once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct TestPlan {
    steps: Vec<SubTestDefinition>,
}

impl TestPlan {
    pub fn ids(&self) -> Vec<String> {
        self.steps.iter().map(|def| def.id.clone()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&SubTestDefinition> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[SubTestDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of every step's response window.
    pub fn total_time_limit(&self) -> Duration {
        Duration::from_secs(self.steps.iter().map(|def| def.time_limit_seconds).sum())
    }

    pub fn max_possible_score(&self) -> f64 {
        self.steps.iter().map(|def| def.max_score).sum()
    }
}

/// Select and order the sub-tests `profile` can take.
///
/// Drops definitions carrying any tag the profile excludes or not normed for
/// the profile's language, then orders by category (memory, speech, drawing).
/// The sort is stable so catalog order breaks ties, which keeps plans
/// reproducible for identical inputs.
pub fn resolve_plan(profile: &UserAccessibilityProfile, catalog: &Catalog) -> Result<TestPlan> {
    let excluded = profile.excluded_tags();

    let mut steps: Vec<SubTestDefinition> = catalog
        .definitions()
        .iter()
        .filter(|def| !excluded.iter().any(|tag| def.has_tag(*tag)))
        .filter(|def| def.supports_language(&profile.language_code))
        .cloned()
        .collect();

    if steps.is_empty() {
        return Err(AssessmentError::NoEligibleTests {
            profile: profile.to_string(),
        });
    }

    steps.sort_by_key(|def| def.category);

    Ok(TestPlan { steps })
}
