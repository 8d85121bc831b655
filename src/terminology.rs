//! Terminology administration and the live mapping cache.
//!
//! The [`TerminologyCache`] holds the applied (active and verified)
//! mappings used by every query. Admin operations write through the
//! [`Store`] and then call [`TerminologyCache::reload`] so changes take
//! effect on the next query.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use portal_core::llm_json::parse_embedded;
use portal_core::models::{
    MapType, MappingFilter, MappingSource, NewMapping, TerminologyMapping,
};
use portal_core::store::Store;
use portal_core::terminology::{TermHit, TerminologyIndex};

use crate::llm::ChatModel;
use crate::prompts;

/// Default vocabulary inserted by `portal terminology seed`.
pub const SEED_MAPPINGS: &[(MapType, &str, &str)] = &[
    (MapType::ContentType, "one pager", "1-Pager"),
    (MapType::ContentType, "one-pager", "1-Pager"),
    (MapType::ContentType, "onepager", "1-Pager"),
    (MapType::ContentType, "1 pager", "1-Pager"),
    (MapType::ContentType, "fact sheet", "1-Pager"),
    (MapType::ContentType, "factsheet", "1-Pager"),
    (MapType::ContentType, "data sheet", "1-Pager"),
    (MapType::ContentType, "datasheet", "1-Pager"),
    (MapType::ContentType, "sell sheet", "1-Pager"),
    (MapType::ContentType, "flyer", "1-Pager"),
    (MapType::ContentType, "flier", "1-Pager"),
    (MapType::ContentType, "brochure", "1-Pager"),
    (MapType::ContentType, "infographic", "1-Pager"),
    (MapType::ContentType, "case study", "Customer Story"),
    (MapType::ContentType, "case studies", "Customer Story"),
    (MapType::ContentType, "success story", "Customer Story"),
    (MapType::ContentType, "testimonial", "Customer Story"),
    (MapType::ContentType, "client story", "Customer Story"),
    (MapType::ContentType, "whitepaper", "Ebook"),
    (MapType::ContentType, "white paper", "Ebook"),
    (MapType::ContentType, "e-book", "Ebook"),
    (MapType::ContentType, "guide", "Ebook"),
    (MapType::ContentType, "handbook", "Ebook"),
    (MapType::ContentType, "playbook", "Ebook"),
    (MapType::ContentType, "tutorial", "Video"),
    (MapType::ContentType, "demo", "Video"),
    (MapType::ContentType, "recorded webinar", "Video"),
    (MapType::ContentType, "clip", "Video Clip"),
    (MapType::ContentType, "clips", "Video Clip"),
    (MapType::ContentType, "short video", "Video Clip"),
    (MapType::ContentType, "teaser", "Video Clip"),
    (MapType::ContentType, "highlights", "Video Clip"),
    (MapType::ContentType, "webiner", "Webinar"),
    (MapType::ContentType, "web seminar", "Webinar"),
    (MapType::ContentType, "online seminar", "Webinar"),
    (MapType::ContentType, "article", "Blog"),
    (MapType::ContentType, "articles", "Blog"),
    (MapType::ContentType, "blog post", "Blog"),
    (MapType::Competitor, "navience", "naviance"),
    (MapType::Competitor, "naviannce", "naviance"),
    (MapType::Competitor, "navance", "naviance"),
    (MapType::Competitor, "powerschol", "powerschool"),
    (MapType::Competitor, "majorclairty", "majorclarity"),
    (MapType::Competitor, "xelo", "xello"),
    (MapType::Competitor, "zelo", "xello"),
    (MapType::Competitor, "xcello", "xello"),
    (MapType::Persona, "councelor", "counselors"),
    (MapType::Persona, "counsler", "counselors"),
    (MapType::Persona, "guidance counselor", "counselors"),
    (MapType::Persona, "school counselor", "counselors"),
    (MapType::Persona, "principal", "administrators"),
    (MapType::Persona, "superintendent", "administrators"),
    (MapType::Persona, "cte director", "CTE coordinators"),
    (MapType::Persona, "career coach", "CTE coordinators"),
    (MapType::Persona, "family", "parents"),
    (MapType::Persona, "guardian", "parents"),
    (MapType::Topic, "financial aid", "FAFSA"),
    (MapType::Topic, "wbl", "work-based learning"),
    (MapType::Topic, "internship", "work-based learning"),
    (MapType::Topic, "internships", "work-based learning"),
    (MapType::Topic, "apprenticeship", "work-based learning"),
    (MapType::Topic, "job shadow", "work-based learning"),
    (MapType::Topic, "grad tracking", "graduation tracking"),
    (MapType::Topic, "on track", "graduation tracking"),
    (MapType::Topic, "ccr", "college career readiness"),
    (MapType::Topic, "college readiness", "college career readiness"),
    (MapType::Topic, "career readiness", "college career readiness"),
    (MapType::Topic, "career interest", "career exploration"),
    (MapType::Topic, "course planning", "course planner"),
    (MapType::Topic, "4 year plan", "course planner"),
    (MapType::Topic, "four year plan", "course planner"),
    (MapType::Feature, "kri", "Key Readiness Indicators"),
    (MapType::Feature, "key readiness", "Key Readiness Indicators"),
    (MapType::Feature, "plp", "Personalized Learning Plan"),
    (MapType::Feature, "ilp", "Personalized Learning Plan"),
    (MapType::Feature, "ecap", "Personalized Learning Plan"),
    (MapType::Feature, "pgp", "Personalized Learning Plan"),
    (MapType::Feature, "hsbp", "Personalized Learning Plan"),
    (MapType::Feature, "college app", "College Application Management"),
    (MapType::Feature, "game of life", "Game of Life"),
    (MapType::Feature, "sel", "Pulse"),
    (MapType::Feature, "social emotional", "Pulse"),
];

/// Applied mappings shared across requests.
#[derive(Default)]
pub struct TerminologyCache {
    index: RwLock<Arc<TerminologyIndex>>,
}

impl TerminologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read applied mappings from the store. Returns the mapping count.
    pub async fn reload(&self, store: &dyn Store) -> Result<usize> {
        let rows = store
            .list_mappings(MappingFilter::Applied)
            .await
            .context("failed to load terminology mappings")?;
        let index = TerminologyIndex::from_mappings(&rows);
        let n = index.len();
        *self.index.write().await = Arc::new(index);
        info!(mappings = n, "terminology cache loaded");
        Ok(n)
    }

    /// The current index. Cheap to clone; later reloads do not affect it.
    pub async fn snapshot(&self) -> Arc<TerminologyIndex> {
        self.index.read().await.clone()
    }
}

/// Record usage for every mapping that fired. Failures are logged only.
pub async fn record_usage(store: &dyn Store, hits: &[TermHit]) {
    for hit in hits {
        if let Err(e) = store
            .increment_terminology_usage(hit.map_type, &hit.user_term)
            .await
        {
            warn!(error = %e, term = %hit.user_term, "failed to record terminology usage");
        }
    }
}

pub async fn list(store: &dyn Store, pending_only: bool) -> Result<Vec<TerminologyMapping>> {
    let filter = if pending_only {
        MappingFilter::Pending
    } else {
        MappingFilter::All
    };
    store.list_mappings(filter).await
}

/// Add an admin mapping, applied immediately.
pub async fn add_manual(
    store: &dyn Store,
    cache: &TerminologyCache,
    map_type: MapType,
    user_term: &str,
    canonical_term: &str,
) -> Result<TerminologyMapping> {
    if user_term.trim().is_empty() || canonical_term.trim().is_empty() {
        bail!("user_term and canonical_term must not be empty");
    }
    let row = store
        .insert_mapping(&NewMapping::manual(map_type, user_term, canonical_term))
        .await?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "a {} mapping for '{}' already exists",
                map_type,
                user_term.trim().to_lowercase()
            )
        })?;
    cache.reload(store).await?;
    Ok(row)
}

/// Verify and activate a mapping. Returns the updated row.
pub async fn approve(store: &dyn Store, cache: &TerminologyCache, id: &str) -> Result<TerminologyMapping> {
    if !store.set_mapping_status(id, true, true).await? {
        bail!("terminology mapping not found: {}", id);
    }
    cache.reload(store).await?;
    store
        .get_mapping(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("terminology mapping not found: {}", id))
}

/// Delete a pending mapping. Verified rows cannot be rejected.
pub async fn reject(store: &dyn Store, id: &str) -> Result<()> {
    let row = store
        .get_mapping(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("terminology mapping not found: {}", id))?;
    if row.is_verified {
        bail!("invalid request: mapping {} is already verified", id);
    }
    store.delete_mapping(id).await?;
    Ok(())
}

/// Insert [`SEED_MAPPINGS`]; existing pairs are left alone. Returns the
/// number of rows inserted.
pub async fn seed(store: &dyn Store, cache: &TerminologyCache) -> Result<usize> {
    let mut inserted = 0;
    for (map_type, user, canonical) in SEED_MAPPINGS {
        let mut m = NewMapping::manual(*map_type, user, canonical);
        m.source = MappingSource::Seed;
        if store.insert_mapping(&m).await?.is_some() {
            inserted += 1;
        }
    }
    cache.reload(store).await?;
    Ok(inserted)
}

/// A mapping proposed by the model.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedMapping {
    pub map_type: String,
    pub user_term: String,
    pub canonical_term: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
struct SuggestionResponse {
    #[serde(default)]
    suggestions: Vec<SuggestedMapping>,
}

/// Insert model suggestions as inactive rows. Invalid map types, empty
/// terms and already-known pairs are skipped.
pub async fn store_suggestions(
    store: &dyn Store,
    suggestions: &[SuggestedMapping],
    source: MappingSource,
) -> Result<Vec<TerminologyMapping>> {
    let mut inserted = Vec::new();
    for s in suggestions {
        let Ok(map_type) = MapType::from_str(&s.map_type) else {
            warn!(map_type = %s.map_type, "skipping suggestion with unknown map type");
            continue;
        };
        if s.user_term.trim().is_empty() || s.canonical_term.trim().is_empty() {
            continue;
        }
        if s.user_term.trim().eq_ignore_ascii_case(s.canonical_term.trim()) {
            continue;
        }
        let m = NewMapping::suggested(map_type, &s.user_term, &s.canonical_term, s.confidence, source);
        if let Some(row) = store.insert_mapping(&m).await? {
            inserted.push(row);
        }
    }
    Ok(inserted)
}

/// Ask the model for new mappings based on the last `days` of prompt logs.
pub async fn suggest(
    store: &dyn Store,
    llm: &dyn ChatModel,
    cache: &TerminologyCache,
    days: i64,
) -> Result<Vec<TerminologyMapping>> {
    if !llm.is_enabled() {
        bail!("terminology suggestions require an LLM provider");
    }
    let logs = store.prompt_logs_since(Utc::now() - Duration::days(days)).await?;
    if logs.is_empty() {
        info!(days, "no prompt logs to learn from");
        return Ok(Vec::new());
    }
    let index = cache.snapshot().await;
    let reply = llm
        .complete(&prompts::suggest_terminology(&logs, &index))
        .await?;
    let parsed: SuggestionResponse = parse_embedded(&reply)?;
    let rows = store_suggestions(store, &parsed.suggestions, MappingSource::AiSuggested).await?;
    info!(suggested = parsed.suggestions.len(), inserted = rows.len(), "stored terminology suggestions");
    Ok(rows)
}

/// Table view of mappings for the CLI.
pub fn print_mappings(rows: &[TerminologyMapping]) {
    if rows.is_empty() {
        println!("No mappings.");
        return;
    }
    println!(
        "{:<36}  {:<12} {:<24} {:<28} {:>5}  {:<12} {}",
        "ID", "TYPE", "USER TERM", "CANONICAL", "USES", "SOURCE", "STATUS"
    );
    for m in rows {
        let status = match (m.is_active, m.is_verified) {
            (true, true) => "applied",
            (_, false) => "pending",
            (false, true) => "inactive",
        };
        println!(
            "{:<36}  {:<12} {:<24} {:<28} {:>5}  {:<12} {}",
            m.id,
            m.map_type.as_str(),
            m.user_term,
            m.canonical_term,
            m.usage_count,
            m.source.as_str(),
            status
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::store::memory::InMemoryStore;

    #[tokio::test]
    async fn test_approve_makes_suggestion_applied() {
        let store = InMemoryStore::new();
        let cache = TerminologyCache::new();
        let rows = store_suggestions(
            &store,
            &[SuggestedMapping {
                map_type: "topic".into(),
                user_term: "grad plan".into(),
                canonical_term: "graduation tracking".into(),
                confidence: 0.9,
                reason: None,
            }],
            MappingSource::AiSuggested,
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        cache.reload(&store).await.unwrap();
        assert!(cache.snapshot().await.is_empty());

        let approved = approve(&store, &cache, &rows[0].id).await.unwrap();
        assert!(approved.is_active && approved.is_verified);
        assert!(cache.snapshot().await.contains(MapType::Topic, "grad plan"));
    }

    #[tokio::test]
    async fn test_reject_deletes_pending_only() {
        let store = InMemoryStore::new();
        let cache = TerminologyCache::new();
        let manual = add_manual(&store, &cache, MapType::Topic, "wbl", "work-based learning").await.unwrap();
        assert!(reject(&store, &manual.id).await.is_err());

        let pending = store
            .insert_mapping(&NewMapping::suggested(MapType::Topic, "jobs", "careers", 0.4, MappingSource::AiSuggested))
            .await
            .unwrap()
            .unwrap();
        reject(&store, &pending.id).await.unwrap();
        assert!(store.get_mapping(&pending.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = InMemoryStore::new();
        let cache = TerminologyCache::new();
        let first = seed(&store, &cache).await.unwrap();
        assert_eq!(first, SEED_MAPPINGS.len());
        assert_eq!(seed(&store, &cache).await.unwrap(), 0);
        assert!(cache.snapshot().await.contains(MapType::ContentType, "sell sheet"));
    }

    #[tokio::test]
    async fn test_bad_suggestions_skipped() {
        let store = InMemoryStore::new();
        let rows = store_suggestions(
            &store,
            &[
                SuggestedMapping {
                    map_type: "colour".into(),
                    user_term: "x".into(),
                    canonical_term: "y".into(),
                    confidence: 0.5,
                    reason: None,
                },
                SuggestedMapping {
                    map_type: "topic".into(),
                    user_term: "FAFSA".into(),
                    canonical_term: "fafsa".into(),
                    confidence: 0.5,
                    reason: None,
                },
            ],
            MappingSource::LogAnalysis,
        )
        .await
        .unwrap();
        assert!(rows.is_empty());
    }
}
