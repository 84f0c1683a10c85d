//! Text Normalizer (C6) and the `TransformationStore` backing the `WordTransformationMap`.
//!
//! Grounded on `original_source/data_parser/content_parser.py`'s
//! `aggregate_word_counts_stemming_numeric_filter` (the canonical stemming/length/numeric
//! pipeline; the lemmatizing variant in the same corpus is explicitly NOT ported — spec
//! §4.6/§9). The mutex-guarded, write-temp-then-rename persistence design follows spec §9's
//! Design Notes resolution of "replace the ad-hoc read-modify-write with a dedicated store".

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use rust_stemmers::{Algorithm, Stemmer};
use tokio::sync::Mutex;

use crate::error::PipelineError;
use crate::stopwords::ENGLISH_STOP_WORDS;

static STOP_WORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

// ASCII punctuation, matching Python's `string.punctuation` set used by
// `str.translate(str.maketrans('', '', string.punctuation))`.
const ASCII_PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

static PUNCTUATION: Lazy<HashSet<char>> =
    Lazy::new(|| ASCII_PUNCTUATION.chars().collect());

const MIN_TOKEN_LENGTH: usize = 4; // length filter drops tokens with length <= 3

/// Surface forms recorded for one stem, in first-seen order (a plain `HashSet` would discard
/// the order `pick_surface_form`'s fallback needs).
pub type SurfaceForms = Vec<String>;

/// Counts surviving tokens and records every stem/surface transformation it produces into
/// `transforms`. Pure given its inputs (spec §8 testable property 4), aside from the shared
/// transformation map, which is additive and does not affect the returned counts.
pub fn normalize_and_count(
    text: &str,
    transforms: &mut HashMap<String, SurfaceForms>,
) -> HashMap<String, i64> {
    let stemmer = Stemmer::create(Algorithm::English);
    let mut counts: HashMap<String, i64> = HashMap::new();

    // Step 1: newline coalescing, step 4: whitespace tokenization (matches Python's
    // `text.replace('\n', ' ').split()`).
    let coalesced = text.replace('\n', " ");
    for original in coalesced.split_whitespace() {
        let mut current = original.to_string();

        // Step 2: lowercasing.
        let lowered = current.to_lowercase();
        if lowered != current {
            record_transform(transforms, &lowered, &current);
            current = lowered;
        }

        // Step 3: punctuation removal.
        let stripped: String = current.chars().filter(|c| !PUNCTUATION.contains(c)).collect();
        if stripped != current {
            record_transform(transforms, &stripped, &current);
            current = stripped;
        }

        if current.is_empty() || STOP_WORDS.contains(current.as_str()) {
            continue;
        }

        // Step 6: Porter stemming.
        let stemmed = stemmer.stem(&current).into_owned();
        if stemmed != current {
            record_transform(transforms, &stemmed, &current);
            current = stemmed;
        }

        if current.is_empty() {
            continue;
        }

        // Step 7: numeric filter, step 8: length filter.
        if contains_digit(&current) || current.chars().count() < MIN_TOKEN_LENGTH {
            continue;
        }

        *counts.entry(current).or_insert(0) += 1;
    }

    counts
}

fn contains_digit(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit())
}

fn record_transform(transforms: &mut HashMap<String, SurfaceForms>, key: &str, surface: &str) {
    let surfaces = transforms.entry(key.to_string()).or_default();
    if !surfaces.iter().any(|s| s == surface) {
        surfaces.push(surface.to_string());
    }
}

fn extend_surfaces(existing: &mut SurfaceForms, additions: SurfaceForms) {
    for surface in additions {
        if !existing.iter().any(|s| *s == surface) {
            existing.push(surface);
        }
    }
}

/// Mutex-guarded store over `word_transformation_map.json`, merged read-modify-write, with
/// write-temp-then-rename persistence for crash safety (spec §5 "Shared resources").
pub struct TransformationStore {
    path: PathBuf,
    map: Mutex<HashMap<String, SurfaceForms>>,
}

impl TransformationStore {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        let map = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                PipelineError::Config(format!("unreadable transformation map: {e}"))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            map: Mutex::new(map),
        })
    }

    /// Unions `additions` into the shared map (never overwrites an existing surface-form
    /// set, per spec §4.6) and persists the merged result.
    pub async fn merge(&self, additions: HashMap<String, SurfaceForms>) -> Result<(), PipelineError> {
        let mut guard = self.map.lock().await;
        for (stem, surfaces) in additions {
            extend_surfaces(guard.entry(stem).or_default(), surfaces);
        }
        persist(&self.path, &guard).await
    }

    pub async fn lookup(&self, stem: &str) -> Option<SurfaceForms> {
        self.map.lock().await.get(stem).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, SurfaceForms> {
        self.map.lock().await.clone()
    }
}

async fn persist(path: &Path, map: &HashMap<String, SurfaceForms>) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(map).map_err(|e| PipelineError::Data(e.to_string()))?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pipeline_scenario_b() {
        let mut transforms = HashMap::new();
        let counts = normalize_and_count(
            "Running runs runner 1999 a the",
            &mut transforms,
        );
        assert_eq!(counts.len(), 1);
        let (stem, count) = counts.iter().next().unwrap();
        assert_eq!(*count, 3);
        // Every surviving stem must have a recorded surface form whose stem equals it
        // (spec §8 testable property 7).
        let stemmer = Stemmer::create(Algorithm::English);
        let surfaces = transforms.get(stem).expect("stem must be recorded");
        assert!(surfaces
            .iter()
            .any(|s| stemmer.stem(&s.to_lowercase()).into_owned() == *stem));
    }

    #[test]
    fn numeric_tokens_are_dropped() {
        let mut transforms = HashMap::new();
        let counts = normalize_and_count("abc123 wordword 4567", &mut transforms);
        assert!(!counts.keys().any(|k| k.chars().any(|c| c.is_ascii_digit())));
    }

    #[test]
    fn short_tokens_are_dropped() {
        let mut transforms = HashMap::new();
        let counts = normalize_and_count("cat dog ox big longword", &mut transforms);
        assert!(!counts.keys().any(|k| k.chars().count() <= 3));
    }

    #[test]
    fn is_deterministic() {
        let mut t1 = HashMap::new();
        let mut t2 = HashMap::new();
        let a = normalize_and_count("Regulatory Agencies Report Reports Reported", &mut t1);
        let b = normalize_and_count("Regulatory Agencies Report Reports Reported", &mut t2);
        assert_eq!(a, b);
    }
}
