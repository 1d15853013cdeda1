//! Placeholder image selection used when no engine produced an image.

use md5::{Digest, Md5};
use rand::Rng;
use rand::seq::SliceRandom;

pub const PLACEHOLDER_SIZE: u32 = 512;
const SEED_LEN: usize = 10;

struct Category {
    keyword: &'static str,
    synonyms: &'static [&'static str],
    ids: &'static [u32],
}

/// Checked in order; the first category with any matching word wins.
const CATEGORIES: &[Category] = &[
    Category {
        keyword: "cat",
        synonyms: &["kitten", "feline", "kitty"],
        ids: &[237, 219, 222, 257, 96],
    },
    Category {
        keyword: "dog",
        synonyms: &["puppy", "canine", "doggy"],
        ids: &[1062, 1074, 1080, 1081, 1084],
    },
    Category {
        keyword: "baby",
        synonyms: &["child", "infant", "toddler"],
        ids: &[1005, 1011, 1012, 1018, 1025],
    },
    Category {
        keyword: "panda",
        synonyms: &["bear"],
        ids: &[1024, 1031, 1035, 1036, 1039],
    },
    Category {
        keyword: "landscape",
        synonyms: &["mountain", "nature", "scenery", "view"],
        ids: &[1015, 1016, 1018, 1020, 1021, 1022, 1023, 1028],
    },
    Category {
        keyword: "portrait",
        synonyms: &["person", "face", "people", "human"],
        ids: &[1005, 1009, 1011, 1012, 1019, 1027],
    },
    Category {
        keyword: "art",
        synonyms: &["painting", "drawing", "sketch", "artwork"],
        ids: &[100, 101, 102, 103, 104],
    },
];

impl Category {
    fn matches(&self, lowered: &str) -> bool {
        lowered.contains(self.keyword) || self.synonyms.iter().any(|word| lowered.contains(word))
    }
}

/// Maps prompts to placeholder-service URLs.
///
/// Category matches pick a random curated id, so repeated calls may differ.
/// Prompts matching no category get a seed derived from their hash, which is
/// stable across calls and restarts.
#[derive(Debug, Clone)]
pub struct FallbackImageSelector {
    base_url: String,
}

impl FallbackImageSelector {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn select(&self, prompt: &str) -> String {
        self.select_with(prompt, &mut rand::thread_rng())
    }

    pub fn select_with<R: Rng + ?Sized>(&self, prompt: &str, rng: &mut R) -> String {
        let lowered = prompt.to_lowercase();
        for category in CATEGORIES {
            if category.matches(&lowered) {
                if let Some(id) = category.ids.choose(rng) {
                    return self.id_url(*id);
                }
            }
        }
        self.seed_url(&seed_for(prompt))
    }

    pub fn id_url(&self, id: u32) -> String {
        format!(
            "{}/id/{id}/{PLACEHOLDER_SIZE}/{PLACEHOLDER_SIZE}",
            self.base_url
        )
    }

    pub fn seed_url(&self, seed: &str) -> String {
        format!(
            "{}/seed/{seed}/{PLACEHOLDER_SIZE}/{PLACEHOLDER_SIZE}",
            self.base_url
        )
    }

    /// Ids a category may yield, for callers checking a returned URL.
    pub fn category_ids(keyword: &str) -> Option<&'static [u32]> {
        CATEGORIES
            .iter()
            .find(|category| category.keyword == keyword)
            .map(|category| category.ids)
    }
}

/// First hex characters of the prompt's MD5 digest.
pub fn seed_for(prompt: &str) -> String {
    let mut hash = hex::encode(Md5::digest(prompt.as_bytes()));
    hash.truncate(SEED_LEN);
    hash
}
