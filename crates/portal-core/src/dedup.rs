//! Duplicate detection over content rows.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::ContentItem;
use crate::text::tokenize;

pub const DEFAULT_SIMILARITY: f64 = 0.85;

/// Canonical form of a link used for equality checks.
///
/// Lower-cases, drops the scheme, `www.`, query string, fragment and any
/// trailing slash.
pub fn normalize_url(url: &str) -> String {
    let mut s = url.trim().to_lowercase();
    if let Some(idx) = s.find(|c: char| c == '?' || c == '#') {
        s.truncate(idx);
    }
    if let Some(rest) = s.strip_prefix("https://").or_else(|| s.strip_prefix("http://")) {
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    s.trim_end_matches('/').to_string()
}

/// Jaccard similarity of the two titles' word sets.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let wa: HashSet<String> = tokenize(a).into_iter().collect();
    let wb: HashSet<String> = tokenize(b).into_iter().collect();
    if wa.is_empty() && wb.is_empty() {
        return 0.0;
    }
    let inter = wa.intersection(&wb).count() as f64;
    let union = wa.union(&wb).count() as f64;
    inter / union
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    SameUrl,
    SimilarTitle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicatePair {
    pub first_id: String,
    pub first_title: String,
    pub second_id: String,
    pub second_title: String,
    pub reason: DuplicateReason,
    pub similarity: f64,
}

fn link_key(item: &ContentItem) -> Option<String> {
    item.primary_link()
        .map(normalize_url)
        .filter(|k| !k.is_empty())
}

/// Every pair that shares a normalized link or whose titles are at least
/// `threshold` similar. Each pair is reported once, in input order.
pub fn find_duplicates(items: &[ContentItem], threshold: f64) -> Vec<DuplicatePair> {
    let keys: Vec<Option<String>> = items.iter().map(link_key).collect();
    let mut pairs = Vec::new();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let (a, b) = (&items[i], &items[j]);
            let same_url = matches!((&keys[i], &keys[j]), (Some(x), Some(y)) if x == y);
            let similarity = title_similarity(&a.title, &b.title);
            let reason = if same_url {
                DuplicateReason::SameUrl
            } else if similarity >= threshold {
                DuplicateReason::SimilarTitle
            } else {
                continue;
            };
            pairs.push(DuplicatePair {
                first_id: a.id.clone(),
                first_title: a.title.clone(),
                second_id: b.id.clone(),
                second_title: b.title.clone(),
                reason,
                similarity,
            });
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, title: &str, link: Option<&str>) -> ContentItem {
        let now = Utc::now();
        ContentItem {
            id: id.to_string(),
            title: title.to_string(),
            content_type: "Blog".to_string(),
            state: None,
            summary: None,
            enhanced_summary: None,
            tags: Vec::new(),
            auto_tags: Vec::new(),
            platform: None,
            live_link: link.map(str::to_string),
            ungated_link: None,
            external_id: None,
            created_at: now,
            last_updated: now,
        }
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("HTTPS://www.Example.com/Blog/Post/?utm=1#top"),
            "example.com/blog/post"
        );
        assert_eq!(normalize_url("http://example.com/a/"), "example.com/a");
    }

    #[test]
    fn test_title_similarity() {
        assert_eq!(title_similarity("FAFSA Guide", "fafsa guide"), 1.0);
        assert!(title_similarity("FAFSA Guide", "Texas Story") < 0.1);
        assert_eq!(title_similarity("", ""), 0.0);
    }

    #[test]
    fn test_find_duplicates() {
        let items = vec![
            item("1", "Counselor Toolkit", Some("https://example.com/toolkit")),
            item("2", "Toolkit for Counselors", Some("http://example.com/toolkit/")),
            item("3", "FAFSA Completion Guide", None),
            item("4", "FAFSA Completion Guide", None),
            item("5", "Something Else", None),
        ];
        let pairs = find_duplicates(&items, DEFAULT_SIMILARITY);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].reason, DuplicateReason::SameUrl);
        assert_eq!((pairs[1].first_id.as_str(), pairs[1].second_id.as_str()), ("3", "4"));
        assert_eq!(pairs[1].reason, DuplicateReason::SimilarTitle);
    }
}
