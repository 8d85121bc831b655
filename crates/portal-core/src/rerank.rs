//! Re-ranking of query results.
//!
//! Two paths produce the final order:
//!
//! - **LLM ranking**: the model returns `rankedTitles` plus `primary` and
//!   `additional` groupings. Titles are matched back onto rows by exact
//!   string equality ([`match_titles`]). A title that matches no row is
//!   dropped; a duplicated title resolves to the first row carrying it.
//! - **Manual scoring** ([`manual_score`]): keyword boosts used whenever
//!   the LLM is disabled or its reply is unusable.

use std::collections::HashSet;

use serde::Deserialize;

use crate::models::{ContentItem, ParsedQuery, Recommendation};
use crate::text::contains_phrase;
use crate::vocab::COMPETITORS;

/// Hard cap on how many rows are ever sent to the model for ranking.
pub const MAX_RERANK: usize = 50;

/// Recommendations taken from the top of a manually scored list.
pub const MANUAL_PRIMARY: usize = 5;
pub const MANUAL_ADDITIONAL: usize = 5;

/// A recommendation as the model writes it: a bare title or an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecommendationRef {
    Title(String),
    Detailed {
        title: String,
        #[serde(default, alias = "why")]
        reason: Option<String>,
    },
}

impl RecommendationRef {
    pub fn title(&self) -> &str {
        match self {
            RecommendationRef::Title(t) => t,
            RecommendationRef::Detailed { title, .. } => title,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RecommendationRef::Title(_) => None,
            RecommendationRef::Detailed { reason, .. } => reason.as_deref(),
        }
    }
}

/// Shape the LLM is asked to return for the ranking prompt.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingResponse {
    #[serde(default)]
    pub ranked_titles: Vec<String>,
    #[serde(default)]
    pub primary: Vec<RecommendationRef>,
    #[serde(default)]
    pub additional: Vec<RecommendationRef>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// How the final order was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankSource {
    Llm,
    Manual,
}

/// A reordered result set with its recommendation groupings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Reranked {
    pub items: Vec<ContentItem>,
    pub primary: Vec<Recommendation>,
    pub additional: Vec<Recommendation>,
    pub summary: Option<String>,
    pub ranked_by: RankSource,
    /// Titles the model returned that matched no row.
    #[serde(skip)]
    pub unmatched_titles: Vec<String>,
}

/// Indices of the rows whose title equals each requested title, in
/// request order. Unknown titles are returned separately; repeats of an
/// already-matched row are ignored.
pub fn match_titles<'a>(items: &[ContentItem], titles: impl IntoIterator<Item = &'a str>) -> (Vec<usize>, Vec<String>) {
    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();
    for title in titles {
        match items.iter().position(|it| it.title == title) {
            Some(idx) => {
                if seen.insert(idx) {
                    matched.push(idx);
                }
            }
            None => unmatched.push(title.to_string()),
        }
    }
    (matched, unmatched)
}

fn recommendations(items: &[ContentItem], refs: &[RecommendationRef]) -> (Vec<Recommendation>, Vec<String>) {
    let (indices, unmatched) = match_titles(items, refs.iter().map(|r| r.title()));
    let recs = indices
        .into_iter()
        .map(|idx| {
            let reason = refs
                .iter()
                .find(|r| r.title() == items[idx].title)
                .and_then(|r| r.reason())
                .map(str::to_string);
            Recommendation::from_item(&items[idx], reason)
        })
        .collect();
    (recs, unmatched)
}

/// Apply a model ranking to `items`.
///
/// Ranked rows come first in the model's order; the rest keep their
/// original relative order. Nothing is ever removed.
pub fn apply_ranking(items: Vec<ContentItem>, response: &RankingResponse) -> Reranked {
    let (order, mut unmatched) = match_titles(&items, response.ranked_titles.iter().map(String::as_str));
    let (primary, unmatched_primary) = recommendations(&items, &response.primary);
    let (additional, unmatched_additional) = recommendations(&items, &response.additional);
    unmatched.extend(unmatched_primary);
    unmatched.extend(unmatched_additional);

    let ranked: HashSet<usize> = order.iter().copied().collect();
    let mut slots: Vec<Option<ContentItem>> = items.into_iter().map(Some).collect();
    let mut reordered = Vec::with_capacity(slots.len());
    for idx in &order {
        if let Some(item) = slots[*idx].take() {
            reordered.push(item);
        }
    }
    for (idx, slot) in slots.into_iter().enumerate() {
        if !ranked.contains(&idx) {
            if let Some(item) = slot {
                reordered.push(item);
            }
        }
    }

    Reranked {
        items: reordered,
        primary,
        additional,
        summary: response.summary.clone(),
        ranked_by: RankSource::Llm,
        unmatched_titles: unmatched,
    }
}

/// Keyword score of one row against the parsed query.
///
/// +10 per search term found in the title, +5 per term matching a tag,
/// +3 per term found in a summary, +4 for a requested type, +4 for a
/// requested state.
pub fn manual_score(item: &ContentItem, parsed: &ParsedQuery) -> i64 {
    let title = item.title.to_lowercase();
    let summary = item.best_summary().unwrap_or("").to_lowercase();
    let mut score = 0;

    for term in &parsed.search_terms {
        let term = term.to_lowercase();
        if title.contains(&term) {
            score += 10;
        }
        score += 5 * item
            .all_tags()
            .filter(|tag| tag.to_lowercase().contains(&term))
            .count() as i64;
        if summary.contains(&term) {
            score += 3;
        }
    }
    if parsed
        .types
        .iter()
        .any(|t| t.eq_ignore_ascii_case(&item.content_type))
    {
        score += 4;
    }
    if let Some(state) = &item.state {
        if parsed.states.iter().any(|s| s.eq_ignore_ascii_case(state)) {
            score += 4;
        }
    }
    score
}

/// Order rows by [`manual_score`], highest first; ties keep store order.
pub fn manual_rank(items: Vec<ContentItem>, parsed: &ParsedQuery) -> Reranked {
    let mut scored: Vec<(i64, ContentItem)> = items
        .into_iter()
        .map(|it| (manual_score(&it, parsed), it))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    let items: Vec<ContentItem> = scored.into_iter().map(|(_, it)| it).collect();

    let primary = items
        .iter()
        .take(MANUAL_PRIMARY)
        .map(|it| Recommendation::from_item(it, None))
        .collect();
    let additional = items
        .iter()
        .skip(MANUAL_PRIMARY)
        .take(MANUAL_ADDITIONAL)
        .map(|it| Recommendation::from_item(it, None))
        .collect();

    Reranked {
        items,
        primary,
        additional,
        summary: None,
        ranked_by: RankSource::Manual,
        unmatched_titles: Vec::new(),
    }
}

fn mentions(item: &ContentItem, names: &[&str]) -> bool {
    let hay = item.haystack();
    names.iter().any(|n| contains_phrase(&hay, n))
}

/// Drop rows about a different competitor than the one asked for.
///
/// A row survives if it mentions a requested competitor or mentions no
/// competitor at all.
pub fn filter_competitor_exclusive(items: Vec<ContentItem>, requested: &[String]) -> Vec<ContentItem> {
    if requested.is_empty() {
        return items;
    }
    let (wanted, others): (Vec<_>, Vec<_>) = COMPETITORS
        .iter()
        .partition(|(canon, _)| requested.iter().any(|r| r.eq_ignore_ascii_case(canon)));
    items
        .into_iter()
        .filter(|it| {
            wanted.iter().any(|(_, names)| mentions(it, names))
                || !others.iter().any(|(_, names)| mentions(it, names))
        })
        .collect()
}

/// Split off the head that may be sent to the model.
pub fn split_for_rerank(mut items: Vec<ContentItem>, limit: usize) -> (Vec<ContentItem>, Vec<ContentItem>) {
    let cap = limit.clamp(1, MAX_RERANK);
    if items.len() <= cap {
        return (items, Vec::new());
    }
    let tail = items.split_off(cap);
    (items, tail)
}
