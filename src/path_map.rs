//! Path Map Builder (C4): a pure function from agency document references to the
//! `TitlePathMap` and `TitleAgencyMap` the extractor and aggregator consume.
//!
//! Grounded on `original_source/data_parser/title_map.py::prepare_title_path_maps` and
//! `original_source/misc/final_pack.py::prepare_title_agency_maps`, merged into a single
//! pass since both walk the same `(title, selectors)` structure.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::models::{Agency, AgencyInfo, TitleAgencyMap, TitlePathMap};

/// Builds both maps in one pass over every agency's `docs`. A `DocumentReference` whose
/// `title` field doesn't coerce to an integer is skipped with a warning (spec §4.4, a
/// DataError-class condition that must not fail the batch).
pub fn build_path_maps(agencies: &[Agency]) -> (TitlePathMap, TitleAgencyMap) {
    let mut path_map: TitlePathMap = HashMap::new();
    let mut agency_map: TitleAgencyMap = HashMap::new();

    for agency in agencies {
        let info = AgencyInfo {
            id: agency.agency_id.clone(),
            short_name: agency
                .short_name
                .clone()
                .unwrap_or_else(|| initials(&agency.display_name)),
            display_name: agency.display_name.clone(),
        };

        for doc in &agency.docs {
            let title_number = match coerce_title(&doc.title) {
                Some(n) => n,
                None => {
                    warn!(
                        agency = %agency.agency_id,
                        title = ?doc.title,
                        "document reference has a non-numeric title; skipping"
                    );
                    continue;
                }
            };

            let title_entry = path_map.entry(title_number).or_default();
            let agency_title_entry = agency_map.entry(title_number).or_default();

            for (selector_type, value) in &doc.selectors {
                let Some(code) = scalar_to_string(value) else {
                    continue;
                };
                title_entry
                    .entry(selector_type.clone())
                    .or_default()
                    .insert(code.clone());

                agency_title_entry
                    .entry(selector_type.clone())
                    .or_default()
                    .entry(code)
                    .or_default()
                    .insert(info.clone());
            }
        }
    }

    (path_map, agency_map)
}

fn coerce_title(value: &serde_json::Value) -> Option<i32> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().map(|v| v as i32),
        serde_json::Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Fallback short name when an agency has none: the capitalized-word initials of its
/// display name, matching `original_source/misc/final_pack.py::create_title_agency_map`'s
/// `''.join([word[0] for word in agency.display_name.split() if word[0].isupper()])`.
fn initials(display_name: &str) -> String {
    display_name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .filter(|c| c.is_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap as Map;

    fn agency(agency_id: &str, display_name: &str, docs: Vec<(serde_json::Value, Map<String, serde_json::Value>)>) -> Agency {
        Agency {
            agency_id: agency_id.to_string(),
            name: display_name.to_string(),
            short_name: None,
            display_name: display_name.to_string(),
            sortable_name: None,
            docs: docs
                .into_iter()
                .map(|(title, selectors)| crate::models::DocumentReference { title, selectors })
                .collect(),
            slug: agency_id.to_string(),
        }
    }

    #[test]
    fn builds_path_map_from_selectors() {
        let mut selectors = Map::new();
        selectors.insert("chapter".to_string(), json!("III"));
        let agencies = vec![agency("a1", "Alpha Bureau", vec![(json!(7), selectors)])];

        let (path_map, agency_map) = build_path_maps(&agencies);

        assert_eq!(
            path_map.get(&7).unwrap().get("chapter").unwrap(),
            &HashSet::from(["III".to_string()])
        );
        let owners = &agency_map[&7]["chapter"]["III"];
        assert_eq!(owners.len(), 1);
        assert_eq!(owners.iter().next().unwrap().id, "a1");
    }

    #[test]
    fn skips_non_numeric_title() {
        let mut selectors = Map::new();
        selectors.insert("chapter".to_string(), json!("III"));
        let agencies = vec![agency("a1", "Alpha Bureau", vec![(json!("not-a-number"), selectors)])];

        let (path_map, _) = build_path_maps(&agencies);
        assert!(path_map.is_empty());
    }

    #[test]
    fn falls_back_to_initials_for_short_name() {
        assert_eq!(initials("Department of Example Affairs"), "DEA");
    }
}
