//! Aggregate metrics over prompt logs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::PromptLog;

/// Queries returning fewer recommendations than this count as low-result.
pub const LOW_RECOMMENDATION_THRESHOLD: i64 = 2;

/// Substrings marking a query as competitor-related.
pub const COMPETITOR_KEYWORDS: &[&str] = &[
    "naviance",
    "xello",
    "scoir",
    "majorclarity",
    "powerschool",
    "kuder",
    "youscience",
    "maia",
    "maialearning",
    "ccgi",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogMetrics {
    pub total_queries: usize,
    pub avg_recommendations: f64,
    pub zero_result_queries: usize,
    pub low_result_queries: usize,
    pub competitor_queries: usize,
    /// Detected state abbreviation to number of queries naming it.
    pub state_usage: BTreeMap<String, usize>,
    pub avg_response_time_ms: Option<f64>,
}

impl LogMetrics {
    pub fn calculate(logs: &[PromptLog]) -> Self {
        if logs.is_empty() {
            return Self::default();
        }
        let total = logs.len();
        let recs: i64 = logs.iter().map(|l| l.recommendations_count).sum();
        let mut state_usage = BTreeMap::new();
        for log in logs {
            for state in &log.detected_states {
                *state_usage.entry(state.clone()).or_insert(0) += 1;
            }
        }
        let timings: Vec<i64> = logs.iter().filter_map(|l| l.response_time_ms).collect();
        let avg_response_time_ms = if timings.is_empty() {
            None
        } else {
            Some(timings.iter().sum::<i64>() as f64 / timings.len() as f64)
        };

        Self {
            total_queries: total,
            avg_recommendations: recs as f64 / total as f64,
            zero_result_queries: logs.iter().filter(|l| l.recommendations_count == 0).count(),
            low_result_queries: logs
                .iter()
                .filter(|l| l.recommendations_count < LOW_RECOMMENDATION_THRESHOLD)
                .count(),
            competitor_queries: logs.iter().filter(|l| is_competitor_query(&l.query)).count(),
            state_usage,
            avg_response_time_ms,
        }
    }

    /// States ordered by usage, most used first.
    pub fn top_states(&self, n: usize) -> Vec<(&str, usize)> {
        let mut states: Vec<(&str, usize)> = self
            .state_usage
            .iter()
            .map(|(s, c)| (s.as_str(), *c))
            .collect();
        states.sort_by(|a, b| b.1.cmp(&a.1));
        states.truncate(n);
        states
    }

    /// One-sentence description used when no model is available.
    pub fn summary_sentence(&self) -> String {
        if self.total_queries == 0 {
            return "No queries were logged in this period.".to_string();
        }
        let mut out = format!(
            "Analyzed {} queries averaging {:.1} recommendations; {} returned nothing and {} returned fewer than {}.",
            self.total_queries,
            self.avg_recommendations,
            self.zero_result_queries,
            self.low_result_queries,
            LOW_RECOMMENDATION_THRESHOLD
        );
        if self.competitor_queries > 0 {
            out.push_str(&format!(" {} mentioned a competitor.", self.competitor_queries));
        }
        let top = self.top_states(3);
        if !top.is_empty() {
            let names: Vec<String> = top.iter().map(|(s, c)| format!("{} ({})", s, c)).collect();
            out.push_str(&format!(" Most requested states: {}.", names.join(", ")));
        }
        out
    }
}

pub fn is_competitor_query(query: &str) -> bool {
    let lower = query.to_lowercase();
    COMPETITOR_KEYWORDS.iter().any(|k| lower.contains(k))
}
