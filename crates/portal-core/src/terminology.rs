//! In-memory index of applied terminology mappings.
//!
//! Built from the `terminology_map` rows that are both active and
//! verified. Applying the index rewrites user phrases to their canonical
//! terms before the built-in dictionaries run, longest phrase first.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{MapType, TerminologyMapping};
use crate::text::{find_phrase, tokenize};

/// A mapping that fired while applying the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermHit {
    pub map_type: MapType,
    pub user_term: String,
    pub canonical_term: String,
}

/// Result of [`TerminologyIndex::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermApplication {
    /// The query with every matched phrase replaced by its canonical term.
    pub rewritten: String,
    pub hits: Vec<TermHit>,
}

#[derive(Debug, Clone)]
struct Entry {
    map_type: MapType,
    user_term: String,
    phrase: Vec<String>,
    canonical_term: String,
}

/// Applied mappings, ready for phrase matching.
#[derive(Debug, Clone, Default)]
pub struct TerminologyIndex {
    entries: Vec<Entry>,
}

impl TerminologyIndex {
    /// Build from stored rows; rows that are not active and verified are skipped.
    pub fn from_mappings(mappings: &[TerminologyMapping]) -> Self {
        let mut entries: Vec<Entry> = mappings
            .iter()
            .filter(|m| m.is_applied())
            .filter_map(|m| {
                let phrase = tokenize(&m.user_term);
                if phrase.is_empty() {
                    return None;
                }
                Some(Entry {
                    map_type: m.map_type,
                    user_term: m.user_term.to_lowercase(),
                    phrase,
                    canonical_term: m.canonical_term.clone(),
                })
            })
            .collect();
        // Longest phrases first; the sort is stable so insertion order breaks ties.
        entries.sort_by(|a, b| b.phrase.len().cmp(&a.phrase.len()));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when an applied mapping exists for this exact user term.
    pub fn contains(&self, map_type: MapType, user_term: &str) -> bool {
        let lower = user_term.trim().to_lowercase();
        self.entries
            .iter()
            .any(|e| e.map_type == map_type && e.user_term == lower)
    }

    /// Rewrite matched phrases in `query` to canonical terms.
    pub fn apply(&self, query: &str) -> TermApplication {
        let raw: Vec<&str> = query.split_whitespace().collect();
        let tokens: Vec<String> = raw.iter().map(|w| w.to_lowercase()).collect();
        let mut consumed = vec![false; tokens.len()];
        let mut replacement: Vec<Option<String>> = vec![None; tokens.len()];
        let mut hits = Vec::new();

        // Compare on cleaned tokens but rewrite on the raw words.
        let cleaned: Vec<String> = tokens
            .iter()
            .map(|t| tokenize(t).join(" "))
            .collect();

        for entry in &self.entries {
            while let Some(start) = find_phrase(&cleaned, &entry.phrase, &consumed) {
                for slot in consumed.iter_mut().skip(start).take(entry.phrase.len()) {
                    *slot = true;
                }
                replacement[start] = Some(entry.canonical_term.clone());
                for slot in replacement
                    .iter_mut()
                    .skip(start + 1)
                    .take(entry.phrase.len() - 1)
                {
                    *slot = Some(String::new());
                }
                if !hits.iter().any(|h: &TermHit| {
                    h.map_type == entry.map_type && h.user_term == entry.user_term
                }) {
                    hits.push(TermHit {
                        map_type: entry.map_type,
                        user_term: entry.user_term.clone(),
                        canonical_term: entry.canonical_term.clone(),
                    });
                }
            }
        }

        let rewritten = raw
            .iter()
            .zip(replacement)
            .filter_map(|(word, rep)| match rep {
                Some(r) if r.is_empty() => None,
                Some(r) => Some(r),
                None => Some(word.to_string()),
            })
            .collect::<Vec<_>>()
            .join(" ");

        TermApplication { rewritten, hits }
    }

    /// Applied mappings grouped by type: `{map_type: {user_term: canonical}}`.
    pub fn grouped(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut out: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for e in &self.entries {
            out.entry(e.map_type.as_str().to_string())
                .or_default()
                .insert(e.user_term.clone(), e.canonical_term.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MappingSource;
    use chrono::Utc;

    fn mapping(map_type: MapType, user: &str, canonical: &str, active: bool, verified: bool) -> TerminologyMapping {
        let now = Utc::now();
        TerminologyMapping {
            id: format!("{}-{}", map_type, user),
            map_type,
            user_term: user.to_string(),
            canonical_term: canonical.to_string(),
            confidence: 1.0,
            source: MappingSource::Seed,
            usage_count: 0,
            last_used_at: None,
            is_active: active,
            is_verified: verified,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_only_active_verified_are_applied() {
        let idx = TerminologyIndex::from_mappings(&[
            mapping(MapType::ContentType, "fact sheet", "1-Pager", true, true),
            mapping(MapType::ContentType, "flyer", "1-Pager", false, false),
            mapping(MapType::ContentType, "brochure", "1-Pager", true, false),
        ]);
        assert_eq!(idx.len(), 1);
        assert!(idx.contains(MapType::ContentType, "Fact Sheet"));
        assert!(!idx.contains(MapType::ContentType, "flyer"));
    }

    #[test]
    fn test_apply_rewrites_longest_phrase_first() {
        let idx = TerminologyIndex::from_mappings(&[
            mapping(MapType::Persona, "counselor", "counselors", true, true),
            mapping(MapType::Persona, "guidance counselor", "counselors", true, true),
            mapping(MapType::Topic, "wbl", "work-based learning", true, true),
        ]);
        let app = idx.apply("WBL guides for a guidance counselor");
        assert_eq!(app.rewritten, "work-based learning guides for a counselors");
        assert_eq!(app.hits.len(), 2);
        assert_eq!(app.hits[0].user_term, "guidance counselor");
    }

    #[test]
    fn test_apply_no_match_is_identity() {
        let idx = TerminologyIndex::default();
        let app = idx.apply("Texas videos");
        assert_eq!(app.rewritten, "Texas videos");
        assert!(app.hits.is_empty());
    }

    #[test]
    fn test_grouped_shape() {
        let idx = TerminologyIndex::from_mappings(&[
            mapping(MapType::Competitor, "navience", "naviance", true, true),
        ]);
        let grouped = idx.grouped();
        assert_eq!(grouped["competitor"]["navience"], "naviance");
    }
}
