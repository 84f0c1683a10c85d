//! Aggregator (C8): rolls persisted word counts up into the per-agency, per-year JSON
//! artifacts consumed downstream.
//!
//! Grounded on `original_source/misc/final_pack.py` (`create_title_agency_map`, the
//! year/agency rollup with its top-100 truncation) and `original_source/misc/counts.py`
//! (the monthly/yearly totals and the per-(year, agency) top-10 pack). `d3_stacked_data.json`
//! and `agency_chart_data.json` are visualization-only reshapes of these artifacts and are a
//! Non-goal (spec §1, §4.8) — not produced here.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Datelike;
use futures::TryStreamExt;
use serde::Serialize;
use tracing::warn;

use crate::error::PipelineError;
use crate::models::{AgencyInfo, TitleAgencyMap, WordCountRecord};
use crate::normalizer::{SurfaceForms, TransformationStore};
use crate::store::CatalogStore;

const TOP_WORDS_LIMIT: usize = 100;
const TOP_10_LIMIT: usize = 10;

#[derive(Debug, Default)]
struct YearAgencyBucket {
    agency: Option<AgencyInfo>,
    word_counts: HashMap<String, i64>,
    monthly_counts: HashMap<u32, i64>,
    yearly_total: i64,
}

#[derive(Debug, Serialize)]
struct TopWord {
    word: String,
    count: i64,
}

#[derive(Debug, Serialize)]
struct YearAgencyTopWords {
    year: i32,
    agency_id: String,
    agency_display_name: String,
    top_words: Vec<TopWord>,
}

#[derive(Debug, Serialize)]
struct MonthlyYearlyCounts {
    year: i32,
    agency_id: String,
    agency_display_name: String,
    monthly_word_counts: HashMap<String, i64>,
    yearly_word_count: i64,
}

#[derive(Debug, Serialize)]
struct Top10Entry {
    year: i32,
    agency_id: String,
    agency_display_name: String,
    word: String,
    count: i64,
}

/// Reads every persisted word count, rewrites stems back to a representative surface form,
/// attributes each record to its owning agencies, rolls the result up by `(year, agency)`,
/// and writes the three JSON artifacts named in spec §4.8 into `output_dir`.
pub async fn run(
    store: &CatalogStore,
    transforms: &TransformationStore,
    agency_map: &TitleAgencyMap,
    output_dir: impl AsRef<Path>,
) -> Result<(), PipelineError> {
    let surfaces = transforms.snapshot().await;

    let mut buckets: HashMap<(i32, String), YearAgencyBucket> = HashMap::new();

    let mut records = Box::pin(store.stream_word_counts());
    while let Some(record) = records.try_next().await? {
        let Some(owners) = owning_agencies(agency_map, &record) else {
            warn!(
                title_number = record.title_number,
                r#type = %record.r#type,
                code = %record.code,
                "word count record has no owning agency; dropping"
            );
            continue;
        };

        let year = record.version_date.year();
        let month = record.version_date.month();

        for (stem, count) in &record.word_statistics {
            let surface = pick_surface_form(stem, surfaces.get(stem));

            for agency in &owners {
                let bucket = buckets
                    .entry((year, agency.id.clone()))
                    .or_insert_with(YearAgencyBucket::default);
                bucket.agency.get_or_insert_with(|| agency.clone());
                *bucket.word_counts.entry(surface.clone()).or_insert(0) += count;
                *bucket.monthly_counts.entry(month).or_insert(0) += count;
                bucket.yearly_total += count;
            }
        }
    }

    let top_words = build_top_words(&buckets);
    let monthly_yearly = build_monthly_yearly(&buckets);
    let top_10 = build_top_10(&buckets);

    write_json(output_dir.as_ref().join("year_agency_top_words.json"), &top_words).await?;
    write_json(
        output_dir.as_ref().join("monthly_yearly_counts.json"),
        &monthly_yearly,
    )
    .await?;
    write_json(output_dir.as_ref().join("top_10_words.json"), &top_10).await?;

    Ok(())
}

/// A record's owning agencies are the union of every agency whose `docs` selector set
/// contains `(record.type, record.code)` for `record.title_number`. `None` when the title
/// isn't in the map at all or the subdivision matches no agency (spec §4.8: drop + log).
fn owning_agencies(agency_map: &TitleAgencyMap, record: &WordCountRecord) -> Option<HashSet<AgencyInfo>> {
    let owners = agency_map
        .get(&record.title_number)?
        .get(&record.r#type)?
        .get(&record.code)?;
    if owners.is_empty() {
        None
    } else {
        Some(owners.clone())
    }
}

/// Prefers a surface form carrying an internal uppercase letter and no period (proper nouns
/// and abbreviations the stemmer otherwise mangles, e.g. "OSHA" -> "osha"); falls back to the
/// first form the normalizer ever recorded for this stem when no such surface form exists,
/// and to the stem itself when the transformation map has nothing for it at all.
fn pick_surface_form(stem: &str, surfaces: Option<&SurfaceForms>) -> String {
    let Some(surfaces) = surfaces else {
        return stem.to_string();
    };
    surfaces
        .iter()
        .find(|s| has_internal_uppercase(s) && !s.contains('.'))
        .or_else(|| surfaces.first())
        .cloned()
        .unwrap_or_else(|| stem.to_string())
}

fn has_internal_uppercase(word: &str) -> bool {
    word.chars().skip(1).any(|c| c.is_uppercase())
}

fn build_top_words(buckets: &HashMap<(i32, String), YearAgencyBucket>) -> Vec<YearAgencyTopWords> {
    let mut out = Vec::with_capacity(buckets.len());
    for ((year, agency_id), bucket) in buckets {
        let Some(agency) = &bucket.agency else { continue };
        let mut words: Vec<(&String, &i64)> = bucket.word_counts.iter().collect();
        // Count desc, tie-broken by word ascending, matching final_pack.py's stable sort.
        words.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        words.truncate(TOP_WORDS_LIMIT);

        out.push(YearAgencyTopWords {
            year: *year,
            agency_id: agency_id.clone(),
            agency_display_name: agency.display_name.clone(),
            top_words: words
                .into_iter()
                .map(|(word, count)| TopWord {
                    word: word.clone(),
                    count: *count,
                })
                .collect(),
        });
    }
    out.sort_by(|a, b| a.year.cmp(&b.year).then_with(|| a.agency_id.cmp(&b.agency_id)));
    out
}

fn build_monthly_yearly(
    buckets: &HashMap<(i32, String), YearAgencyBucket>,
) -> Vec<MonthlyYearlyCounts> {
    let mut out = Vec::with_capacity(buckets.len());
    for ((year, agency_id), bucket) in buckets {
        let Some(agency) = &bucket.agency else { continue };
        let monthly_word_counts = bucket
            .monthly_counts
            .iter()
            .map(|(month, count)| (month.to_string(), *count))
            .collect();

        out.push(MonthlyYearlyCounts {
            year: *year,
            agency_id: agency_id.clone(),
            agency_display_name: agency.display_name.clone(),
            monthly_word_counts,
            yearly_word_count: bucket.yearly_total,
        });
    }
    out.sort_by(|a, b| a.year.cmp(&b.year).then_with(|| a.agency_id.cmp(&b.agency_id)));
    out
}

/// Each `(year, agency)`'s own top 10, matching `misc/counts.py::process_json_file`'s
/// `top_10_words_data[year][agency] = top 10 of that agency's own top_words` — not one flat
/// ranking shared across every agency and year.
fn build_top_10(buckets: &HashMap<(i32, String), YearAgencyBucket>) -> Vec<Top10Entry> {
    let mut out = Vec::new();
    for ((year, agency_id), bucket) in buckets {
        let Some(agency) = &bucket.agency else { continue };
        let mut words: Vec<(&String, &i64)> = bucket.word_counts.iter().collect();
        words.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        out.extend(words.into_iter().take(TOP_10_LIMIT).map(|(word, count)| Top10Entry {
            year: *year,
            agency_id: agency_id.clone(),
            agency_display_name: agency.display_name.clone(),
            word: word.clone(),
            count: *count,
        }));
    }
    out.sort_by(|a, b| {
        a.year
            .cmp(&b.year)
            .then_with(|| a.agency_id.cmp(&b.agency_id))
            .then_with(|| b.count.cmp(&a.count))
            .then_with(|| a.word.cmp(&b.word))
    });
    out
}

async fn write_json<T: Serialize>(path: std::path::PathBuf, value: &T) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| PipelineError::Data(e.to_string()))?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(agency_id: &str, word_counts: HashMap<String, i64>) -> YearAgencyBucket {
        YearAgencyBucket {
            agency: Some(AgencyInfo {
                id: agency_id.to_string(),
                short_name: agency_id.to_string(),
                display_name: agency_id.to_string(),
            }),
            word_counts,
            monthly_counts: HashMap::new(),
            yearly_total: 0,
        }
    }

    #[test]
    fn prefers_uppercase_surface_over_lowercase() {
        let surfaces: SurfaceForms = vec!["osha".to_string(), "OSHA".to_string()];
        assert_eq!(pick_surface_form("osha", Some(&surfaces)), "OSHA");
    }

    #[test]
    fn falls_back_to_first_seen_surface_with_no_uppercase_candidate() {
        let surfaces: SurfaceForms = vec!["zebra".to_string(), "apple".to_string()];
        assert_eq!(pick_surface_form("word", Some(&surfaces)), "zebra");
    }

    #[test]
    fn falls_back_to_stem_with_no_recorded_surfaces() {
        assert_eq!(pick_surface_form("regul", None), "regul");
    }

    #[test]
    fn top_10_is_scoped_per_year_and_agency() {
        let mut buckets = HashMap::new();
        let mut epa_counts = HashMap::new();
        epa_counts.insert("zebra".to_string(), 5);
        epa_counts.insert("apple".to_string(), 5);
        buckets.insert((2020, "epa".to_string()), bucket("epa", epa_counts));

        let mut fcc_counts = HashMap::new();
        fcc_counts.insert("mango".to_string(), 9);
        buckets.insert((2020, "fcc".to_string()), bucket("fcc", fcc_counts));

        let top = build_top_10(&buckets);
        assert_eq!(top.len(), 3);

        let epa_words: Vec<&str> = top
            .iter()
            .filter(|e| e.agency_id == "epa")
            .map(|e| e.word.as_str())
            .collect();
        assert_eq!(epa_words, vec!["apple", "zebra"]);

        let fcc_words: Vec<&str> = top
            .iter()
            .filter(|e| e.agency_id == "fcc")
            .map(|e| e.word.as_str())
            .collect();
        assert_eq!(fcc_words, vec!["mango"]);
    }

    #[test]
    fn build_top_words_truncates_to_100_sorted_desc_with_ascending_tiebreak() {
        let mut word_counts = HashMap::new();
        for i in 0..150 {
            word_counts.insert(format!("word{i:03}"), 1);
        }
        // Give the last 50 stems (by insertion) a higher count so the top 100 is
        // deterministic: the 100 count-5 words plus, for ties, ascending stem order.
        for i in 0..100 {
            word_counts.insert(format!("word{i:03}"), 5);
        }

        let mut buckets = HashMap::new();
        buckets.insert((2021, "epa".to_string()), bucket("epa", word_counts));

        let top_words = build_top_words(&buckets);
        assert_eq!(top_words.len(), 1);
        let words = &top_words[0].top_words;
        assert_eq!(words.len(), 100);

        for pair in words.windows(2) {
            assert!(
                pair[0].count > pair[1].count
                    || (pair[0].count == pair[1].count && pair[0].word < pair[1].word)
            );
        }
        assert!(words.iter().all(|w| w.count == 5));
    }
}
