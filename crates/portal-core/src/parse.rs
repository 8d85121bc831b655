//! Local natural-language query parser.
//!
//! Turns a raw query plus the UI's selected filters into a
//! [`ParsedQuery`]. This is the fallback used whenever the LLM parse is
//! disabled or fails, and the baseline the LLM result is merged onto.
//!
//! Order of operations:
//!
//! 1. Autocorrect known misspellings ([`vocab::autocorrect`]).
//! 2. Apply terminology mappings ([`TerminologyIndex::apply`]).
//! 3. Match content types, competitors, personas and states against the
//!    built-in dictionaries, consuming matched tokens.
//! 4. Remaining non-stopword tokens longer than two characters become
//!    search terms.
//! 5. Union with the selected filters and derive the primary intent.

use serde::Deserialize;

use crate::models::{ParsedQuery, PrimaryIntent, SelectedFilters};
use crate::terminology::{TermHit, TerminologyIndex};
use crate::text::{find_phrase, push_unique, tokenize, tokenize_cased};
use crate::vocab::{self, AMBIGUOUS_ABBREVIATIONS, COMPETITORS, PERSONAS, TYPE_KEYWORDS, US_STATES};

/// Output of [`parse_local`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocalParse {
    pub parsed: ParsedQuery,
    /// The query after autocorrect and terminology rewriting.
    pub normalized_query: String,
    pub term_hits: Vec<TermHit>,
}

/// Parse a query with dictionaries only.
pub fn parse_local(
    query: &str,
    selected: &SelectedFilters,
    terminology: Option<&TerminologyIndex>,
) -> LocalParse {
    let corrected = vocab::autocorrect(query);
    let (normalized_query, term_hits) = match terminology {
        Some(index) => {
            let applied = index.apply(&corrected);
            (applied.rewritten, applied.hits)
        }
        None => (corrected, Vec::new()),
    };

    let cased = tokenize_cased(&normalized_query);
    let tokens = tokenize(&normalized_query);
    let mut consumed = vec![false; tokens.len()];
    let mut parsed = ParsedQuery::default();

    // Longest phrases first so "video clips" never also yields "Video".
    let mut type_phrases: Vec<(Vec<String>, &str)> = TYPE_KEYWORDS
        .iter()
        .map(|(k, t)| (tokenize(k), *t))
        .collect();
    type_phrases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    for (phrase, canonical) in &type_phrases {
        while let Some(start) = find_phrase(&tokens, phrase, &consumed) {
            mark(&mut consumed, start, phrase.len());
            push_unique(&mut parsed.types, canonical);
        }
    }

    for (canonical, names) in COMPETITORS {
        for name in names.iter() {
            let phrase = tokenize(name);
            while let Some(start) = find_phrase(&tokens, &phrase, &consumed) {
                mark(&mut consumed, start, phrase.len());
                push_unique(&mut parsed.competitors, canonical);
            }
        }
    }

    for (canonical, names) in PERSONAS {
        let mut phrases: Vec<Vec<String>> = names.iter().map(|n| tokenize(n)).collect();
        phrases.sort_by(|a, b| b.len().cmp(&a.len()));
        for phrase in &phrases {
            while let Some(start) = find_phrase(&tokens, phrase, &consumed) {
                mark(&mut consumed, start, phrase.len());
                push_unique(&mut parsed.personas, canonical);
            }
        }
    }

    detect_states(&tokens, &cased, &mut consumed, &mut parsed.states);

    for (i, token) in tokens.iter().enumerate() {
        if consumed[i] || token.chars().count() <= 2 || vocab::is_stopword(token) {
            continue;
        }
        push_unique(&mut parsed.search_terms, token);
    }

    apply_selected(&mut parsed, selected);
    parsed.primary_intent = detect_primary_intent(&parsed);

    LocalParse {
        parsed,
        normalized_query,
        term_hits,
    }
}

fn mark(consumed: &mut [bool], start: usize, len: usize) {
    for slot in consumed.iter_mut().skip(start).take(len) {
        *slot = true;
    }
}

/// Full names first (multi-word names before single-word ones), then
/// two-letter abbreviations. Abbreviations that are also common words
/// (`in`, `or`, `me`, ...) only count when typed upper-case; the others
/// match in any case.
fn detect_states(tokens: &[String], cased: &[&str], consumed: &mut [bool], states: &mut Vec<String>) {
    let mut names: Vec<(Vec<String>, &str)> = US_STATES
        .iter()
        .map(|(abbr, name)| (tokenize(name), *abbr))
        .collect();
    names.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    for (phrase, abbr) in &names {
        while let Some(start) = find_phrase(tokens, phrase, consumed) {
            // "washington dc" is the district, not the state.
            if *abbr == "WA" && tokens.get(start + 1).map(String::as_str) == Some("dc") {
                mark(consumed, start, 2);
                push_unique(states, "DC");
                continue;
            }
            mark(consumed, start, phrase.len());
            push_unique(states, abbr);
        }
    }

    for (i, token) in tokens.iter().enumerate() {
        if consumed[i] || token.len() != 2 {
            continue;
        }
        let Some(abbr) = US_STATES
            .iter()
            .map(|(a, _)| *a)
            .find(|a| a.eq_ignore_ascii_case(token))
        else {
            continue;
        };
        let typed_upper = cased.get(i).is_some_and(|raw| *raw == abbr);
        if typed_upper || !AMBIGUOUS_ABBREVIATIONS.contains(&token.as_str()) {
            consumed[i] = true;
            push_unique(states, abbr);
        }
    }
}

fn apply_selected(parsed: &mut ParsedQuery, selected: &SelectedFilters) {
    for t in &selected.types {
        let canonical = vocab::canonical_type(t).unwrap_or(t.as_str());
        push_unique(&mut parsed.types, canonical);
    }
    for s in &selected.states {
        let abbr = vocab::state_abbreviation(s).unwrap_or(s.as_str());
        push_unique(&mut parsed.states, abbr);
    }
}

/// Competitor beats state beats persona beats topic.
pub fn detect_primary_intent(parsed: &ParsedQuery) -> PrimaryIntent {
    if !parsed.competitors.is_empty() {
        PrimaryIntent::Competitor
    } else if !parsed.states.is_empty() {
        PrimaryIntent::State
    } else if !parsed.personas.is_empty() {
        PrimaryIntent::Persona
    } else if !parsed.search_terms.is_empty() {
        PrimaryIntent::Topic
    } else {
        PrimaryIntent::General
    }
}

/// Fill states and competitors a follow-up message leaves out from the
/// previous turn, so "any videos?" after "texas stories" stays in Texas.
/// Returns true when anything was carried.
pub fn carry_forward(parsed: &mut ParsedQuery, previous: &ParsedQuery) -> bool {
    let mut carried = false;
    if parsed.states.is_empty() && !previous.states.is_empty() {
        parsed.states = previous.states.clone();
        carried = true;
    }
    if parsed.competitors.is_empty() && !previous.competitors.is_empty() {
        parsed.competitors = previous.competitors.clone();
        carried = true;
    }
    if carried {
        parsed.primary_intent = detect_primary_intent(parsed);
    }
    carried
}

/// Shape the LLM is asked to return for the parse prompt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmParse {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub primary_intent: Option<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub personas: Vec<String>,
}

/// Merge a validated LLM parse onto the local one.
///
/// Types and states the LLM invents are dropped unless they resolve to a
/// known canonical value. Dictionary hits from the local pass are always
/// kept. The LLM's search terms replace the local ones when it returned
/// any; its intent label is used when it is consistent with the filters.
pub fn merge_llm_parse(local: &ParsedQuery, llm: &LlmParse) -> ParsedQuery {
    let mut merged = local.clone();

    for t in &llm.types {
        if let Some(canonical) = vocab::canonical_type(t) {
            push_unique(&mut merged.types, canonical);
        }
    }
    for s in &llm.states {
        if let Some(abbr) = vocab::state_abbreviation(s) {
            push_unique(&mut merged.states, abbr);
        }
    }
    for c in &llm.competitors {
        let lower = c.trim().to_lowercase();
        if let Some((canonical, _)) = COMPETITORS
            .iter()
            .find(|(canon, names)| *canon == lower || names.contains(&lower.as_str()))
        {
            push_unique(&mut merged.competitors, canonical);
        }
    }
    for p in &llm.personas {
        let lower = p.trim().to_lowercase();
        if let Some((canonical, _)) = PERSONAS
            .iter()
            .find(|(canon, names)| canon.to_lowercase() == lower || names.contains(&lower.as_str()))
        {
            push_unique(&mut merged.personas, canonical);
        }
    }

    let terms: Vec<String> = llm
        .search_terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && !vocab::is_stopword(t))
        .collect();
    if !terms.is_empty() {
        merged.search_terms.clear();
        for t in &terms {
            push_unique(&mut merged.search_terms, t);
        }
    }

    let fallback = detect_primary_intent(&merged);
    merged.primary_intent = match llm.primary_intent.as_deref().map(PrimaryIntent::parse_lenient) {
        Some(PrimaryIntent::Competitor) if merged.competitors.is_empty() => fallback,
        Some(PrimaryIntent::State) if merged.states.is_empty() => fallback,
        Some(intent) => intent,
        None => fallback,
    };
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MapType, MappingSource, TerminologyMapping};
    use chrono::Utc;

    fn parse(query: &str) -> ParsedQuery {
        parse_local(query, &SelectedFilters::default(), None).parsed
    }

    #[test]
    fn test_misspelled_state_resolves() {
        let p = parse("texs");
        assert_eq!(p.states, vec!["TX"]);
        assert_eq!(p.primary_intent, PrimaryIntent::State);
    }

    #[test]
    fn test_types_and_state_from_phrase() {
        let p = parse("customer stories from New York");
        assert_eq!(p.types, vec!["Customer Story"]);
        assert_eq!(p.states, vec!["NY"]);
        assert!(p.search_terms.is_empty());
    }

    #[test]
    fn test_video_clip_does_not_also_match_video() {
        let p = parse("video clips about fafsa");
        assert_eq!(p.types, vec!["Video Clip"]);
        assert_eq!(p.search_terms, vec!["fafsa"]);
        assert_eq!(p.primary_intent, PrimaryIntent::Topic);
    }

    #[test]
    fn test_lowercase_ambiguous_abbreviation_is_a_word() {
        let p = parse("videos in or around schools");
        assert!(p.states.is_empty());
        let p = parse("videos in OR");
        assert_eq!(p.states, vec!["OR"]);
    }

    #[test]
    fn test_abbreviation_survives_punctuation_words() {
        let p = parse("ebooks - TX");
        assert_eq!(p.states, vec!["TX"]);
        assert_eq!(p.primary_intent, PrimaryIntent::State);

        let p = parse("webinars for TX/CA");
        assert_eq!(p.states, vec!["TX", "CA"]);
        assert_eq!(p.types, vec!["Webinar"]);

        let p = parse("videos & stories in OR");
        assert_eq!(p.states, vec!["OR"]);
    }

    #[test]
    fn test_unambiguous_lowercase_abbreviation() {
        let p = parse("ebooks for tx counselors");
        assert_eq!(p.states, vec!["TX"]);
        assert_eq!(p.personas, vec!["counselors"]);
        assert_eq!(p.types, vec!["Ebook"]);
    }

    #[test]
    fn test_competitor_intent_wins() {
        let p = parse("naviance comparison for texas");
        assert_eq!(p.competitors, vec!["naviance"]);
        assert_eq!(p.states, vec!["TX"]);
        assert_eq!(p.primary_intent, PrimaryIntent::Competitor);
        assert_eq!(p.search_terms, vec!["comparison"]);
    }

    #[test]
    fn test_persona_intent() {
        let p = parse("something for principals");
        assert_eq!(p.primary_intent, PrimaryIntent::Persona);
        assert_eq!(p.personas, vec!["administrators"]);
    }

    #[test]
    fn test_empty_query_is_general() {
        let p = parse("   ");
        assert_eq!(p.primary_intent, PrimaryIntent::General);
    }

    #[test]
    fn test_selected_filters_union() {
        let selected = SelectedFilters {
            types: vec!["webinar".to_string()],
            states: vec!["California".to_string()],
        };
        let p = parse_local("texas ebooks", &selected, None).parsed;
        assert_eq!(p.types, vec!["Ebook", "Webinar"]);
        assert_eq!(p.states, vec!["TX", "CA"]);
    }

    #[test]
    fn test_washington_dc() {
        let p = parse("washington dc webinars");
        assert_eq!(p.states, vec!["DC"]);
    }

    #[test]
    fn test_terminology_applied_before_dictionaries() {
        let now = Utc::now();
        let idx = TerminologyIndex::from_mappings(&[TerminologyMapping {
            id: "1".to_string(),
            map_type: MapType::ContentType,
            user_term: "sell sheet".to_string(),
            canonical_term: "1-Pager".to_string(),
            confidence: 1.0,
            source: MappingSource::Seed,
            usage_count: 0,
            last_used_at: None,
            is_active: true,
            is_verified: true,
            created_at: now,
            updated_at: now,
        }]);
        let out = parse_local("sell sheet on graduation", &SelectedFilters::default(), Some(&idx));
        assert_eq!(out.parsed.types, vec!["1-Pager"]);
        assert_eq!(out.parsed.search_terms, vec!["graduation"]);
        assert_eq!(out.term_hits.len(), 1);
    }

    #[test]
    fn test_follow_up_inherits_state() {
        let previous = parse("texas customer stories");
        let mut follow_up = parse("any videos?");
        assert!(carry_forward(&mut follow_up, &previous));
        assert_eq!(follow_up.states, vec!["TX"]);
        assert_eq!(follow_up.types, vec!["Video"]);
        assert_eq!(follow_up.primary_intent, PrimaryIntent::State);

        let mut own_state = parse("ohio webinars");
        assert!(!carry_forward(&mut own_state, &previous));
        assert_eq!(own_state.states, vec!["OH"]);
    }

    #[test]
    fn test_merge_llm_drops_unknown_values() {
        let local = parse("texas stuff");
        let llm = LlmParse {
            types: vec!["case study".to_string(), "Podcast".to_string()],
            states: vec!["Texas".to_string(), "Narnia".to_string()],
            search_terms: vec!["college readiness".to_string()],
            primary_intent: Some("competitor".to_string()),
            ..Default::default()
        };
        let merged = merge_llm_parse(&local, &llm);
        assert_eq!(merged.types, vec!["Customer Story"]);
        assert_eq!(merged.states, vec!["TX"]);
        assert_eq!(merged.search_terms, vec!["college readiness"]);
        // no competitor present, so the label falls back to the heuristic
        assert_eq!(merged.primary_intent, PrimaryIntent::State);
    }
}
