use std::collections::BTreeSet;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::models::{
    AccessibilityTag, Modality, StimulusPayload, SubTestDefinition, TestCategory,
};

pub const BUILTIN_STIMULUS_SEED: u64 = 0x5eed_c0de;

const AVLT_WORDS: [&str; 15] = [
    "drum", "curtain", "bell", "coffee", "school", "parent", "moon", "garden", "hat", "farmer",
    "nose", "turkey", "color", "house", "river",
];
const REGISTRATION_WORDS: [&str; 3] = ["apple", "penny", "table"];
const RECALL_OBJECTS: [&str; 5] = ["apple", "dog", "car", "house", "book"];
const SENTENCES: [&str; 3] = [
    "The quick brown fox jumps over the lazy dog",
    "She sells seashells by the seashore",
    "Peter Piper picked a peck of pickled peppers",
];
const COOKIE_THEFT_ELEMENTS: [&str; 11] = [
    "woman", "dishes", "sink", "water overflowing", "boy", "girl", "cookies", "jar", "stool",
    "falling", "kitchen",
];
const NAMING_OBJECTS: [&str; 10] = [
    "cactus", "harmonica", "rhinoceros", "acorn", "igloo", "stilts", "dominoes", "calipers",
    "escalator", "tongs",
];
const STORY: &str = "Anna Thompson of South Boston, employed as a cook in a school cafeteria, \
reported at the police station that she had been held up on State Street the night before \
and robbed of fifty-six dollars. She had four small children, the rent was due, and they \
had not eaten for two days.";

const DIGIT_SPAN_MIN: usize = 3;
const DIGIT_SPAN_MAX: usize = 8;

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn tags(list: &[AccessibilityTag]) -> BTreeSet<AccessibilityTag> {
    list.iter().copied().collect()
}

fn digit_sequences(seed: u64) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (DIGIT_SPAN_MIN..=DIGIT_SPAN_MAX)
        .map(|len| (0..len).map(|_| rng.gen_range(0..=9)).collect())
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn def(
    id: &str,
    name: &str,
    modality: Modality,
    category: TestCategory,
    instruction: &str,
    stimulus: StimulusPayload,
    time_limit_seconds: u64,
    max_score: f64,
    accessibility_tags: BTreeSet<AccessibilityTag>,
) -> SubTestDefinition {
    SubTestDefinition {
        id: id.into(),
        name: name.into(),
        modality,
        category,
        instruction_text: instruction.into(),
        stimulus,
        time_limit_seconds,
        max_score,
        accessibility_tags,
        supported_locales: Vec::new(),
    }
}

/// Canonical battery. Declaration order is the tie-breaker inside a category.
pub fn builtin_definitions(seed: u64) -> Vec<SubTestDefinition> {
    use AccessibilityTag::*;

    let sequences = digit_sequences(seed);
    let digit_span_max = sequences.len() as f64;

    vec![
        def(
            "avlt-immediate",
            "Auditory Verbal Learning",
            Modality::Audio,
            TestCategory::Memory,
            "I will read you a list of 15 words. Listen carefully. When I finish, tell me as many words as you can remember, in any order.",
            StimulusPayload::Words { words: words(&AVLT_WORDS) },
            90,
            AVLT_WORDS.len() as f64,
            tags(&[AudioOnly, RequiresTranscript]),
        ),
        def(
            "digit-span-forward",
            "Digit Span (forward)",
            Modality::Audio,
            TestCategory::Memory,
            "I will say some numbers. Repeat them back to me in the same order.",
            StimulusPayload::DigitSequences { sequences },
            120,
            digit_span_max,
            tags(&[AudioOnly, RequiresTranscript]),
        ),
        def(
            "word-registration",
            "Word Registration",
            Modality::Text,
            TestCategory::Memory,
            "Read these three words, then type them back from memory.",
            StimulusPayload::Words { words: words(&REGISTRATION_WORDS) },
            60,
            REGISTRATION_WORDS.len() as f64,
            tags(&[RequiresVision, RequiresLiteracy]),
        ),
        def(
            "story-recall",
            "Logical Memory",
            Modality::Audio,
            TestCategory::Memory,
            "Listen to this short story. When it ends, tell it back to me with as much detail as you can.",
            StimulusPayload::Prompt { text: STORY.into() },
            120,
            10.0,
            tags(&[AudioOnly, RequiresTranscript]),
        ),
        def(
            "picture-recall",
            "Picture Recall",
            Modality::Choice,
            TestCategory::Memory,
            "Look at these pictures. In a moment, pick the ones you saw.",
            StimulusPayload::Image {
                image_ref: "images/simple_objects.png".into(),
                key_elements: words(&RECALL_OBJECTS),
            },
            60,
            RECALL_OBJECTS.len() as f64,
            tags(&[RequiresVision]),
        ),
        def(
            "category-fluency-animals",
            "Semantic Fluency (animals)",
            Modality::Audio,
            TestCategory::Speech,
            "Name as many animals as you can think of. You have one minute.",
            StimulusPayload::Prompt { text: "animals".into() },
            60,
            20.0,
            tags(&[AudioOnly, RequiresTranscript]),
        ),
        def(
            "sentence-repetition",
            "Sentence Repetition",
            Modality::Audio,
            TestCategory::Speech,
            "Repeat each sentence exactly as you hear it.",
            StimulusPayload::Words { words: words(&SENTENCES) },
            90,
            SENTENCES.len() as f64,
            tags(&[AudioOnly, RequiresTranscript]),
        ),
        def(
            "cookie-theft-description",
            "Picture Description",
            Modality::Audio,
            TestCategory::Speech,
            "Tell me everything you see happening in this picture.",
            StimulusPayload::Image {
                image_ref: "images/cookie_theft.jpg".into(),
                key_elements: words(&COOKIE_THEFT_ELEMENTS),
            },
            120,
            COOKIE_THEFT_ELEMENTS.len() as f64,
            tags(&[RequiresVision, RequiresTranscript]),
        ),
        def(
            "confrontation-naming",
            "Confrontation Naming",
            Modality::Audio,
            TestCategory::Speech,
            "Say the name of each object you see.",
            StimulusPayload::Image {
                image_ref: "images/naming_objects.png".into(),
                key_elements: words(&NAMING_OBJECTS),
            },
            120,
            NAMING_OBJECTS.len() as f64,
            tags(&[RequiresVision, RequiresTranscript]),
        ),
        def(
            "written-command",
            "Written Command",
            Modality::Choice,
            TestCategory::Speech,
            "Read the sentence on the screen and do what it says.",
            StimulusPayload::Prompt { text: "Close your eyes".into() },
            45,
            1.0,
            tags(&[RequiresVision, RequiresLiteracy]),
        ),
        def(
            "clock-drawing",
            "Clock Drawing",
            Modality::Drawing,
            TestCategory::Drawing,
            "Draw a clock showing all the numbers, with the hands at ten past eleven.",
            StimulusPayload::Prompt { text: "10 past 11".into() },
            180,
            3.0,
            tags(&[RequiresVision]),
        ),
        def(
            "cube-copy",
            "Cube Copy",
            Modality::Drawing,
            TestCategory::Drawing,
            "Copy this drawing as accurately as you can.",
            StimulusPayload::Shapes { shapes: words(&["cube"]) },
            120,
            1.0,
            tags(&[RequiresVision, RequiresFineVision]),
        ),
        def(
            "trail-making",
            "Alternating Trail",
            Modality::Drawing,
            TestCategory::Drawing,
            "Draw a line going from a number to a letter in ascending order: 1 to A, A to 2, and so on.",
            StimulusPayload::Shapes {
                shapes: words(&["1", "A", "2", "B", "3", "C", "4", "D", "5", "E"]),
            },
            180,
            1.0,
            tags(&[RequiresVision, RequiresFineVision]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_sequences_grow_from_three_to_eight() {
        let sequences = digit_sequences(7);
        let lengths: Vec<usize> = sequences.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![3, 4, 5, 6, 7, 8]);
        assert!(sequences.iter().flatten().all(|d| *d <= 9));
    }

    #[test]
    fn digit_span_max_score_matches_sequence_count() {
        let defs = builtin_definitions(BUILTIN_STIMULUS_SEED);
        let span = defs.iter().find(|d| d.id == "digit-span-forward").unwrap();
        assert_eq!(span.max_score, 6.0);
    }
}
