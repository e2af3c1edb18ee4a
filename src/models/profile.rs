use std::fmt;

use serde::{Deserialize, Serialize};

use super::subtest::AccessibilityTag;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum VisionCapability {
    Sighted,
    LowVision,
    Blind,
}

impl VisionCapability {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisionCapability::Sighted => "sighted",
            VisionCapability::LowVision => "lowVision",
            VisionCapability::Blind => "blind",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum LiteracyLevel {
    Literate,
    NonLiterate,
}

impl LiteracyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiteracyLevel::Literate => "literate",
            LiteracyLevel::NonLiterate => "nonLiterate",
        }
    }
}

/// What the user can see and read. Supplied once when a session is created
/// and never changed while it runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct UserAccessibilityProfile {
    pub vision_capability: VisionCapability,
    pub literacy_level: LiteracyLevel,
    pub language_code: String,
}

impl UserAccessibilityProfile {
    pub fn new(
        vision_capability: VisionCapability,
        literacy_level: LiteracyLevel,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            vision_capability,
            literacy_level,
            language_code: language_code.into(),
        }
    }

    /// Tags a sub-test must not carry to be presented to this user.
    pub fn excluded_tags(&self) -> Vec<AccessibilityTag> {
        let mut excluded = Vec::new();
        match self.vision_capability {
            VisionCapability::Blind => {
                excluded.push(AccessibilityTag::RequiresVision);
                excluded.push(AccessibilityTag::RequiresFineVision);
            }
            VisionCapability::LowVision => excluded.push(AccessibilityTag::RequiresFineVision),
            VisionCapability::Sighted => {}
        }
        if self.literacy_level == LiteracyLevel::NonLiterate {
            excluded.push(AccessibilityTag::RequiresLiteracy);
        }
        excluded
    }

    /// Instructions are read aloud for users who cannot read them on screen.
    pub fn needs_voice_guidance(&self) -> bool {
        self.vision_capability == VisionCapability::Blind
            || self.literacy_level == LiteracyLevel::NonLiterate
    }

    /// Primary language subtag, lowercased (`en-US` -> `en`).
    pub fn primary_language(&self) -> String {
        primary_subtag(&self.language_code)
    }
}

impl fmt::Display for UserAccessibilityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{vision: {}, literacy: {}, language: {}}}",
            self.vision_capability.as_str(),
            self.literacy_level.as_str(),
            self.language_code
        )
    }
}

pub(crate) fn primary_subtag(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blind_profile_excludes_all_vision_tags() {
        let profile =
            UserAccessibilityProfile::new(VisionCapability::Blind, LiteracyLevel::Literate, "en");
        let excluded = profile.excluded_tags();
        assert!(excluded.contains(&AccessibilityTag::RequiresVision));
        assert!(excluded.contains(&AccessibilityTag::RequiresFineVision));
        assert!(!excluded.contains(&AccessibilityTag::RequiresLiteracy));
    }

    #[test]
    fn low_vision_keeps_coarse_visual_tasks() {
        let profile = UserAccessibilityProfile::new(
            VisionCapability::LowVision,
            LiteracyLevel::NonLiterate,
            "hi",
        );
        let excluded = profile.excluded_tags();
        assert_eq!(
            excluded,
            vec![
                AccessibilityTag::RequiresFineVision,
                AccessibilityTag::RequiresLiteracy
            ]
        );
        assert!(profile.needs_voice_guidance());
    }

    #[test]
    fn primary_language_strips_region() {
        let profile =
            UserAccessibilityProfile::new(VisionCapability::Sighted, LiteracyLevel::Literate, "en-US");
        assert_eq!(profile.primary_language(), "en");
        assert_eq!(primary_subtag("pt_BR"), "pt");
    }

    #[test]
    fn profile_serializes_camel_case() {
        let profile =
            UserAccessibilityProfile::new(VisionCapability::LowVision, LiteracyLevel::Literate, "en");
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"visionCapability\":\"lowVision\""));
        assert!(json.contains("\"languageCode\":\"en\""));
    }
}
