//! XML Subdivision Extractor (C5).
//!
//! Grounded on the teacher's `citations_of_part` tree walk (`rust_rewrite/src/main.rs`):
//! a `quick_xml::Reader` pull-parser driven by an explicit ancestor stack over
//! `Event::Start`/`Event::End`/`Event::Text`. The teacher's single hard-coded `CITA`-tag
//! regex search is generalized here into the general `(TYPE, N) in selector` predicate from
//! `original_source/data_parser/content_parser.py::extract_content_from_xml` /
//! `get_element_full_text`.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::PipelineError;
use crate::models::TitlePathMap;

/// `{ type -> set<code> }` for a single title, the slice of a `TitlePathMap` entry the
/// extractor matches against.
pub type Selector<'a> = &'a HashMap<String, std::collections::HashSet<String>>;

/// `{ type -> { code -> concatenated_text } }`. Every requested type gets an entry, even an
/// empty one, per spec §4.5.
pub type ExtractedText = HashMap<String, HashMap<String, String>>;

/// Extracts subdivision text from `xml` per `selector`. A malformed document surfaces
/// `PipelineError::Parse`; callers MUST treat that as a job failure, not an empty success
/// (spec §4.5).
pub fn extract_subdivisions(xml: &str, selector: Selector) -> Result<ExtractedText, PipelineError> {
    let mut result: ExtractedText = selector
        .keys()
        .map(|t| (t.clone(), HashMap::new()))
        .collect();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    // Stack of (owned tag name, accumulated text) so each element's full descendant text
    // (its own text + every child's full text + that child's tail) can be folded into its
    // parent on close, matching `get_element_full_text`'s recursive concatenation.
    struct Frame {
        match_key: Option<(String, String)>,
        text: String,
    }
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        match reader.read_event().map_err(|e| {
            PipelineError::Parse(format!("at position {}: {e}", reader.error_position()))
        })? {
            Event::Eof => break,
            Event::Start(e) => {
                let match_key = matched_selector_key(&e, selector);
                stack.push(Frame {
                    match_key,
                    text: String::new(),
                });
            }
            Event::Empty(e) => {
                // A self-closing element can still carry TYPE/N; it simply has no text.
                if let Some((ty, code)) = matched_selector_key(&e, selector) {
                    result.entry(ty).or_default().entry(code).or_default();
                }
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|err| PipelineError::Parse(err.to_string()))?
                    .to_string();
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                let text = e
                    .decode()
                    .map_err(|err| PipelineError::Parse(err.to_string()))?
                    .to_string();
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let frame = match stack.pop() {
                    Some(f) => f,
                    None => continue,
                };
                if let Some((ty, code)) = frame.match_key {
                    let slot = result.entry(ty).or_default().entry(code).or_default();
                    slot.push_str(frame.text.trim());
                }
                // Fold this element's full text (itself + descendants) into the parent as
                // "tail"-adjacent text, so an ancestor match still gathers nested content.
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(&frame.text);
                }
            }
            _ => {}
        }
    }

    for slot in result.values_mut() {
        for text in slot.values_mut() {
            *text = text.trim().to_string();
        }
    }

    Ok(result)
}

/// An element is a MATCH iff it carries a `TYPE` attribute whose lowercased value is a
/// selector key AND an `N` attribute whose exact value is in that key's code set (spec
/// §4.5). `TYPE`/`N` are compared as-written; `TYPE` values are compared case-insensitively.
fn matched_selector_key(start: &BytesStart, selector: Selector) -> Option<(String, String)> {
    let ty = start
        .try_get_attribute("TYPE")
        .ok()
        .flatten()
        .map(|a| String::from_utf8_lossy(&a.value).to_lowercase())?;
    let codes = selector.get(&ty)?;
    let n = start
        .try_get_attribute("N")
        .ok()
        .flatten()
        .map(|a| String::from_utf8_lossy(&a.value).to_string())?;
    if codes.contains(&n) {
        Some((ty, n))
    } else {
        None
    }
}

/// Convenience wrapper used by the dispatcher: looks up the title's selector in a full
/// `TitlePathMap` before delegating to [`extract_subdivisions`].
pub fn extract_for_title(
    xml: &str,
    title_number: i32,
    path_map: &TitlePathMap,
) -> Option<Result<ExtractedText, PipelineError>> {
    path_map
        .get(&title_number)
        .map(|selector| extract_subdivisions(xml, selector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn selector(pairs: &[(&str, &[&str])]) -> HashMap<String, HashSet<String>> {
        pairs
            .iter()
            .map(|(k, vs)| {
                (
                    k.to_string(),
                    vs.iter().map(|v| v.to_string()).collect::<HashSet<_>>(),
                )
            })
            .collect()
    }

    #[test]
    fn extracts_matched_element_text() {
        let xml = r#"<ROOT><DIV TYPE="CHAPTER" N="III">Alpha <B>Beta</B></DIV></ROOT>"#;
        let sel = selector(&[("chapter", &["III"])]);
        let out = extract_subdivisions(xml, &sel).unwrap();
        assert_eq!(out["chapter"]["III"], "Alpha Beta");
    }

    #[test]
    fn empty_selector_yields_empty_slot_but_not_failure() {
        let xml = r#"<ROOT><DIV TYPE="CHAPTER" N="I">hi</DIV></ROOT>"#;
        let sel = selector(&[("chapter", &["II"])]);
        let out = extract_subdivisions(xml, &sel).unwrap();
        assert!(out["chapter"].is_empty());
    }

    #[test]
    fn type_matching_is_case_insensitive_but_n_is_exact() {
        let xml = r#"<ROOT><DIV TYPE="Chapter" N="III">text</DIV><DIV TYPE="chapter" N="iii">nope</DIV></ROOT>"#;
        let sel = selector(&[("chapter", &["III"])]);
        let out = extract_subdivisions(xml, &sel).unwrap();
        assert_eq!(out["chapter"].len(), 1);
        assert_eq!(out["chapter"]["III"], "text");
    }

    #[test]
    fn malformed_xml_surfaces_parse_error() {
        let xml = "<ROOT><DIV TYPE=\"CHAPTER\" N=\"I\">unterminated";
        let sel = selector(&[("chapter", &["I"])]);
        assert!(matches!(
            extract_subdivisions(xml, &sel),
            Err(PipelineError::Parse(_))
        ));
    }

    #[test]
    fn preserves_sibling_order_in_mixed_content() {
        let xml = r#"<ROOT><DIV TYPE="CHAPTER" N="I">first<SUB>middle</SUB>last</DIV></ROOT>"#;
        let sel = selector(&[("chapter", &["I"])]);
        let out = extract_subdivisions(xml, &sel).unwrap();
        assert_eq!(out["chapter"]["I"], "firstmiddlelast");
    }
}
