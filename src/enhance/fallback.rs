//! Local prompt enhancement used whenever the text provider is not called.

use rand::Rng;
use rand::seq::SliceRandom;

/// Trigger words and their richer replacements, scanned in this order.
const DESCRIPTIVE_WORDS: &[(&str, &[&str])] = &[
    ("cute", &["adorable", "charming", "sweet"]),
    ("baby", &["infant", "newborn", "little one"]),
    ("cat", &["feline", "kitten", "cat"]),
    ("dog", &["puppy", "canine", "dog"]),
    (
        "photo",
        &["professional photography", "high-quality image", "crystal clear"],
    ),
    (
        "drawing",
        &["artistic illustration", "detailed artwork", "digital painting"],
    ),
    (
        "landscape",
        &["breathtaking landscape", "scenic view", "natural beauty"],
    ),
    (
        "portrait",
        &["professional portrait", "character study", "expressive face"],
    ),
];

pub const QUALITY_TERMS: &[&str] = &[
    "high resolution",
    "detailed",
    "sharp focus",
    "well-lit",
    "professional",
];

pub fn enhance(prompt: &str) -> String {
    enhance_with(prompt, &mut rand::thread_rng())
}

/// Applies at most one word substitution, then appends a quality term unless
/// one is already present. Never shortens the prompt.
pub fn enhance_with<R: Rng + ?Sized>(prompt: &str, rng: &mut R) -> String {
    let mut improved = prompt.to_string();

    for (word, options) in DESCRIPTIVE_WORDS {
        if improved.to_ascii_lowercase().contains(word) {
            if let Some(replacement) = options.choose(rng) {
                improved = replace_ignore_ascii_case(&improved, word, replacement);
            }
            break;
        }
    }

    let lowered = improved.to_ascii_lowercase();
    if !QUALITY_TERMS.iter().any(|term| lowered.contains(term)) {
        if let Some(term) = QUALITY_TERMS.choose(rng) {
            improved.push_str(", ");
            improved.push_str(term);
        }
    }

    improved
}

/// ASCII lower-casing keeps byte offsets, so matches found in the lowered
/// copy index straight into the original.
fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    let lowered = haystack.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len() + replacement.len());
    let mut last = 0;
    for (start, _) in lowered.match_indices(needle) {
        out.push_str(&haystack[last..start]);
        out.push_str(replacement);
        last = start + needle.len();
    }
    out.push_str(&haystack[last..]);
    out
}
