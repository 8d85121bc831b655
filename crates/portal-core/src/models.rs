//! Core data models used throughout the portal.
//!
//! These types represent the content rows, terminology mappings, chat
//! messages, and log records that flow between the query heuristics, the
//! store, and the LLM gateway.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the `marketing_content` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: String,
    /// Two-letter US abbreviation or `"National"`.
    pub state: Option<String>,
    pub summary: Option<String>,
    pub enhanced_summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub auto_tags: Vec<String>,
    pub platform: Option<String>,
    pub live_link: Option<String>,
    pub ungated_link: Option<String>,
    /// Identifier of the item in the upstream CMS, set by the webhook.
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ContentItem {
    /// The richest summary available: enhanced first, then the plain one.
    pub fn best_summary(&self) -> Option<&str> {
        self.enhanced_summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.summary.as_deref())
    }

    /// Manual and automatic tags together.
    pub fn all_tags(&self) -> impl Iterator<Item = &String> {
        self.tags.iter().chain(self.auto_tags.iter())
    }

    /// The link shown to users: live first, then ungated.
    pub fn primary_link(&self) -> Option<&str> {
        self.live_link
            .as_deref()
            .or(self.ungated_link.as_deref())
    }

    /// Lower-cased concatenation of every searchable text field.
    pub fn haystack(&self) -> String {
        let mut out = self.title.to_lowercase();
        for part in [self.summary.as_deref(), self.enhanced_summary.as_deref()]
            .into_iter()
            .flatten()
        {
            out.push(' ');
            out.push_str(&part.to_lowercase());
        }
        for tag in self.all_tags() {
            out.push(' ');
            out.push_str(&tag.to_lowercase());
        }
        out
    }
}

/// Field values for inserting or updating a content row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewContent {
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub state: Option<String>,
    pub summary: Option<String>,
    pub enhanced_summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub auto_tags: Vec<String>,
    pub platform: Option<String>,
    pub live_link: Option<String>,
    pub ungated_link: Option<String>,
    pub external_id: Option<String>,
}

/// Filter for [`Store::query_content`](crate::store::Store::query_content).
///
/// Mirrors the hosted query builder: `types` and `states` are `IN`
/// filters, `any_terms` is an OR of case-insensitive substring matches
/// over title, summaries and tags, and every entry of `all_terms` must
/// match somewhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentQuery {
    pub types: Vec<String>,
    pub states: Vec<String>,
    pub any_terms: Vec<String>,
    pub all_terms: Vec<String>,
    pub limit: usize,
}

impl ContentQuery {
    /// Evaluate the filter against one row. Used by in-memory stores.
    pub fn matches(&self, item: &ContentItem) -> bool {
        if !self.types.is_empty()
            && !self
                .types
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&item.content_type))
        {
            return false;
        }
        if !self.states.is_empty() {
            let state = item.state.as_deref().unwrap_or("");
            if !self.states.iter().any(|s| s.eq_ignore_ascii_case(state)) {
                return false;
            }
        }
        let hay = item.haystack();
        if !self.any_terms.is_empty()
            && !self
                .any_terms
                .iter()
                .any(|t| hay.contains(&t.to_lowercase()))
        {
            return false;
        }
        self.all_terms
            .iter()
            .all(|t| hay.contains(&t.to_lowercase()))
    }
}

/// Aggregate counts over the content table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentStats {
    pub total: i64,
    pub by_type: BTreeMap<String, i64>,
    pub by_state: BTreeMap<String, i64>,
    /// Rows created on or after the `since` bound of the query.
    pub recent: i64,
}

// ============ Terminology ============

/// Category of a terminology mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    ContentType,
    State,
    Topic,
    Competitor,
    Persona,
    Feature,
}

impl MapType {
    pub const ALL: [MapType; 6] = [
        MapType::ContentType,
        MapType::State,
        MapType::Topic,
        MapType::Competitor,
        MapType::Persona,
        MapType::Feature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::ContentType => "content_type",
            MapType::State => "state",
            MapType::Topic => "topic",
            MapType::Competitor => "competitor",
            MapType::Persona => "persona",
            MapType::Feature => "feature",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "content_type" | "type" => Ok(MapType::ContentType),
            "state" => Ok(MapType::State),
            "topic" => Ok(MapType::Topic),
            "competitor" => Ok(MapType::Competitor),
            "persona" => Ok(MapType::Persona),
            "feature" => Ok(MapType::Feature),
            other => bail!(
                "invalid map type '{}': expected content_type, state, topic, competitor, persona, or feature",
                other
            ),
        }
    }
}

/// Where a terminology mapping came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    Manual,
    AiSuggested,
    LogAnalysis,
    Seed,
}

impl MappingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingSource::Manual => "manual",
            MappingSource::AiSuggested => "ai_suggested",
            MappingSource::LogAnalysis => "log_analysis",
            MappingSource::Seed => "seed",
        }
    }
}

impl FromStr for MappingSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "manual" => Ok(MappingSource::Manual),
            "ai_suggested" => Ok(MappingSource::AiSuggested),
            "log_analysis" => Ok(MappingSource::LogAnalysis),
            "seed" => Ok(MappingSource::Seed),
            other => bail!("invalid mapping source: {}", other),
        }
    }
}

/// A row of the `terminology_map` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminologyMapping {
    pub id: String,
    pub map_type: MapType,
    pub user_term: String,
    pub canonical_term: String,
    pub confidence: f64,
    pub source: MappingSource,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TerminologyMapping {
    /// Only these rows are applied to queries.
    pub fn is_applied(&self) -> bool {
        self.is_active && self.is_verified
    }

    pub fn is_pending(&self) -> bool {
        !self.is_verified
    }
}

/// Field values for inserting a terminology mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMapping {
    pub map_type: MapType,
    pub user_term: String,
    pub canonical_term: String,
    pub confidence: f64,
    pub source: MappingSource,
    pub is_active: bool,
    pub is_verified: bool,
}

impl NewMapping {
    /// An admin-entered mapping: applied immediately.
    pub fn manual(map_type: MapType, user_term: &str, canonical_term: &str) -> Self {
        Self {
            map_type,
            user_term: user_term.trim().to_lowercase(),
            canonical_term: canonical_term.trim().to_string(),
            confidence: 1.0,
            source: MappingSource::Manual,
            is_active: true,
            is_verified: true,
        }
    }

    /// A machine-suggested mapping: stored inactive until approved.
    pub fn suggested(
        map_type: MapType,
        user_term: &str,
        canonical_term: &str,
        confidence: f64,
        source: MappingSource,
    ) -> Self {
        Self {
            map_type,
            user_term: user_term.trim().to_lowercase(),
            canonical_term: canonical_term.trim().to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            source,
            is_active: false,
            is_verified: false,
        }
    }
}

/// Which terminology rows to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFilter {
    All,
    /// Active and verified rows only.
    Applied,
    /// Rows awaiting admin review.
    Pending,
}

// ============ Query interpretation ============

/// Heuristic label deciding which filter conditions apply to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryIntent {
    State,
    Competitor,
    Persona,
    Topic,
    #[default]
    General,
}

impl PrimaryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryIntent::State => "state",
            PrimaryIntent::Competitor => "competitor",
            PrimaryIntent::Persona => "persona",
            PrimaryIntent::Topic => "topic",
            PrimaryIntent::General => "general",
        }
    }

    /// Lenient parse used on LLM output; unknown labels become `General`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "state" => PrimaryIntent::State,
            "competitor" => PrimaryIntent::Competitor,
            "persona" => PrimaryIntent::Persona,
            "topic" => PrimaryIntent::Topic,
            _ => PrimaryIntent::General,
        }
    }
}

/// Structured interpretation of a natural-language query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub primary_intent: PrimaryIntent,
    #[serde(default)]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub personas: Vec<String>,
}

/// Filters the user already ticked in the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedFilters {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
}

// ============ Chat ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A content row recommended to the user, with an optional reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub state: Option<String>,
    pub link: Option<String>,
    pub reason: Option<String>,
}

impl Recommendation {
    pub fn from_item(item: &ContentItem, reason: Option<String>) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            content_type: item.content_type.clone(),
            state: item.state.clone(),
            link: item.primary_link().map(str::to_string),
            reason,
        }
    }
}

/// One entry of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub recommendations: Vec<Recommendation>,
    pub timestamp: DateTime<Utc>,
}

// ============ AI context, logs, reports ============

/// A row of the `ai_context` knowledge table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiContextEntry {
    pub id: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewContextEntry {
    pub category: String,
    pub subcategory: Option<String>,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A row of `ai_prompt_logs`, written once per search or chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptLog {
    pub id: String,
    pub query: String,
    pub query_type: PrimaryIntent,
    pub detected_states: Vec<String>,
    pub model_used: Option<String>,
    pub recommendations_count: i64,
    pub ai_quick_answer: Option<String>,
    pub response_time_ms: Option<i64>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPromptLog {
    pub query: String,
    pub query_type: PrimaryIntent,
    pub detected_states: Vec<String>,
    pub model_used: Option<String>,
    pub recommendations_count: i64,
    pub ai_quick_answer: Option<String>,
    pub response_time_ms: Option<i64>,
    pub session_id: Option<String>,
}

/// Kind of row stored in `log_analysis_reports`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Weekly,
    LogAnalysis,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Weekly => "weekly",
            ReportType::LogAnalysis => "log_analysis",
        }
    }
}

impl FromStr for ReportType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "weekly" => Ok(ReportType::Weekly),
            "log_analysis" => Ok(ReportType::LogAnalysis),
            other => bail!("invalid report type: {}", other),
        }
    }
}

/// A stored report, either weekly or log analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub id: String,
    pub report_type: ReportType,
    pub analysis_date: String,
    pub logs_analyzed: i64,
    pub summary: String,
    /// Metrics, issues, suggestions and insights as stored JSON.
    pub details: serde_json::Value,
    pub model_used: Option<String>,
    pub execution_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub report_type: ReportType,
    pub analysis_date: String,
    pub logs_analyzed: i64,
    pub summary: String,
    pub details: serde_json::Value,
    pub model_used: Option<String>,
    pub execution_time_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, content_type: &str, state: Option<&str>, tags: &[&str]) -> ContentItem {
        let now = Utc::now();
        ContentItem {
            id: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            content_type: content_type.to_string(),
            state: state.map(str::to_string),
            summary: Some("Counselors use the platform daily".to_string()),
            enhanced_summary: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            auto_tags: Vec::new(),
            platform: None,
            live_link: None,
            ungated_link: Some("https://example.com/ungated".to_string()),
            external_id: None,
            created_at: now,
            last_updated: now,
        }
    }

    #[test]
    fn test_query_matches_type_case_insensitive() {
        let q = ContentQuery {
            types: vec!["customer story".to_string()],
            ..Default::default()
        };
        assert!(q.matches(&item("Frisco ISD", "Customer Story", Some("TX"), &[])));
        assert!(!q.matches(&item("Frisco ISD", "Video", Some("TX"), &[])));
    }

    #[test]
    fn test_query_any_terms_is_or_all_terms_is_and() {
        let it = item("Work-Based Learning in Texas", "Ebook", Some("TX"), &["wbl"]);
        let any = ContentQuery {
            any_terms: vec!["fafsa".to_string(), "wbl".to_string()],
            ..Default::default()
        };
        assert!(any.matches(&it));

        let all = ContentQuery {
            all_terms: vec!["texas".to_string(), "naviance".to_string()],
            ..Default::default()
        };
        assert!(!all.matches(&it));
    }

    #[test]
    fn test_query_state_filter_excludes_missing_state() {
        let q = ContentQuery {
            states: vec!["TX".to_string()],
            ..Default::default()
        };
        assert!(!q.matches(&item("Untagged", "Blog", None, &[])));
    }

    #[test]
    fn test_primary_link_falls_back_to_ungated() {
        let it = item("A", "Blog", None, &[]);
        assert_eq!(it.primary_link(), Some("https://example.com/ungated"));
    }

    #[test]
    fn test_map_type_round_trip_names() {
        for t in MapType::ALL {
            assert_eq!(t.as_str().parse::<MapType>().unwrap(), t);
        }
        assert!("colour".parse::<MapType>().is_err());
    }

    #[test]
    fn test_suggested_mapping_is_inactive() {
        let m = NewMapping::suggested(
            MapType::Topic,
            "  Grad Plan ",
            "graduation tracking",
            1.7,
            MappingSource::AiSuggested,
        );
        assert_eq!(m.user_term, "grad plan");
        assert!(!m.is_active && !m.is_verified);
        assert_eq!(m.confidence, 1.0);
    }
}
