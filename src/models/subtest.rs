use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::profile::primary_subtag;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Modality {
    Text,
    Audio,
    Drawing,
    Choice,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Audio => "audio",
            Modality::Drawing => "drawing",
            Modality::Choice => "choice",
        }
    }

    /// Audio and drawing responses are captured through an exclusive device
    /// (microphone or canvas). Text and choice answers are not.
    pub fn uses_device(&self) -> bool {
        matches!(self, Modality::Audio | Modality::Drawing)
    }
}

/// Plan ordering key: memory tasks run first, drawing tasks last.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TestCategory {
    Memory,
    Speech,
    Drawing,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AccessibilityTag {
    RequiresVision,
    RequiresFineVision,
    RequiresLiteracy,
    AudioOnly,
    RequiresTranscript,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StimulusPayload {
    Words { words: Vec<String> },
    DigitSequences { sequences: Vec<Vec<u8>> },
    Image { image_ref: String, key_elements: Vec<String> },
    Shapes { shapes: Vec<String> },
    Prompt { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubTestDefinition {
    pub id: String,
    pub name: String,
    pub modality: Modality,
    pub category: TestCategory,
    pub instruction_text: String,
    pub stimulus: StimulusPayload,
    pub time_limit_seconds: u64,
    pub max_score: f64,
    #[serde(default)]
    pub accessibility_tags: BTreeSet<AccessibilityTag>,
    /// Primary language subtags this item is normed for. Empty means any.
    #[serde(default)]
    pub supported_locales: Vec<String>,
}

impl SubTestDefinition {
    pub fn has_tag(&self, tag: AccessibilityTag) -> bool {
        self.accessibility_tags.contains(&tag)
    }

    pub fn requires_transcript(&self) -> bool {
        self.has_tag(AccessibilityTag::RequiresTranscript)
    }

    pub fn supports_language(&self, language_code: &str) -> bool {
        if self.supported_locales.is_empty() {
            return true;
        }
        let wanted = primary_subtag(language_code);
        self.supported_locales
            .iter()
            .any(|locale| primary_subtag(locale) == wanted)
    }
}
