//! In-memory [`Store`] implementation for tests.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Content filters are evaluated
//! with [`ContentQuery::matches`].

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::dedup::normalize_url;
use crate::models::{
    AiContextEntry, AnalysisReport, ContentItem, ContentQuery, ContentStats, MapType,
    MappingFilter, NewContent, NewContextEntry, NewMapping, NewPromptLog, NewReport, PromptLog,
    ReportType, TerminologyMapping,
};

use super::Store;

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    content: RwLock<Vec<ContentItem>>,
    mappings: RwLock<Vec<TerminologyMapping>>,
    context: RwLock<Vec<AiContextEntry>>,
    logs: RwLock<Vec<PromptLog>>,
    reports: RwLock<Vec<AnalysisReport>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn apply_fields(item: &mut ContentItem, c: &NewContent) {
    item.title = c.title.clone();
    item.content_type = c.content_type.clone();
    item.state = c.state.clone();
    item.summary = c.summary.clone();
    item.enhanced_summary = c.enhanced_summary.clone();
    item.tags = c.tags.clone();
    item.auto_tags = c.auto_tags.clone();
    item.platform = c.platform.clone();
    item.live_link = c.live_link.clone();
    item.ungated_link = c.ungated_link.clone();
    item.external_id = c.external_id.clone();
    item.last_updated = Utc::now();
}

fn matches_filter(m: &TerminologyMapping, filter: MappingFilter) -> bool {
    match filter {
        MappingFilter::All => true,
        MappingFilter::Applied => m.is_applied(),
        MappingFilter::Pending => m.is_pending(),
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn query_content(&self, query: &ContentQuery) -> Result<Vec<ContentItem>> {
        let content = read(&self.content)?;
        let mut rows: Vec<ContentItem> = content
            .iter()
            .filter(|it| query.matches(it))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        if query.limit > 0 {
            rows.truncate(query.limit);
        }
        Ok(rows)
    }

    async fn get_content(&self, id: &str) -> Result<Option<ContentItem>> {
        Ok(read(&self.content)?.iter().find(|it| it.id == id).cloned())
    }

    async fn list_content(&self) -> Result<Vec<ContentItem>> {
        Ok(read(&self.content)?.clone())
    }

    async fn find_existing_content(
        &self,
        external_id: Option<&str>,
        link_key: Option<&str>,
        title: Option<&str>,
    ) -> Result<Option<ContentItem>> {
        let content = read(&self.content)?;
        if let Some(ext) = external_id {
            if let Some(it) = content.iter().find(|it| it.external_id.as_deref() == Some(ext)) {
                return Ok(Some(it.clone()));
            }
        }
        if let Some(key) = link_key {
            if let Some(it) = content
                .iter()
                .find(|it| it.primary_link().map(normalize_url).as_deref() == Some(key))
            {
                return Ok(Some(it.clone()));
            }
        }
        if let Some(title) = title {
            let lower = title.trim().to_lowercase();
            if let Some(it) = content.iter().find(|it| it.title.to_lowercase() == lower) {
                return Ok(Some(it.clone()));
            }
        }
        Ok(None)
    }

    async fn insert_content(&self, c: &NewContent) -> Result<String> {
        let now = Utc::now();
        let mut item = ContentItem {
            id: new_id(),
            title: String::new(),
            content_type: String::new(),
            state: None,
            summary: None,
            enhanced_summary: None,
            tags: Vec::new(),
            auto_tags: Vec::new(),
            platform: None,
            live_link: None,
            ungated_link: None,
            external_id: None,
            created_at: now,
            last_updated: now,
        };
        apply_fields(&mut item, c);
        let id = item.id.clone();
        write(&self.content)?.push(item);
        Ok(id)
    }

    async fn update_content(&self, id: &str, c: &NewContent) -> Result<bool> {
        let mut content = write(&self.content)?;
        match content.iter_mut().find(|it| it.id == id) {
            Some(item) => {
                apply_fields(item, c);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_enrichment(&self, id: &str, enhanced_summary: &str, auto_tags: &[String]) -> Result<bool> {
        let mut content = write(&self.content)?;
        match content.iter_mut().find(|it| it.id == id) {
            Some(item) => {
                item.enhanced_summary = Some(enhanced_summary.to_string());
                item.auto_tags = auto_tags.to_vec();
                item.last_updated = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_content_by_external_id(&self, external_id: &str) -> Result<u64> {
        let mut content = write(&self.content)?;
        let before = content.len();
        content.retain(|it| it.external_id.as_deref() != Some(external_id));
        Ok((before - content.len()) as u64)
    }

    async fn rename_content_type(&self, from: &str, to: &str) -> Result<u64> {
        let mut content = write(&self.content)?;
        let mut n = 0;
        for it in content.iter_mut().filter(|it| it.content_type == from) {
            it.content_type = to.to_string();
            n += 1;
        }
        Ok(n)
    }

    async fn content_stats(&self, since: DateTime<Utc>) -> Result<ContentStats> {
        let content = read(&self.content)?;
        let mut stats = ContentStats {
            total: content.len() as i64,
            ..Default::default()
        };
        for it in content.iter() {
            *stats.by_type.entry(it.content_type.clone()).or_insert(0) += 1;
            let state = it.state.clone().unwrap_or_else(|| "Unspecified".to_string());
            *stats.by_state.entry(state).or_insert(0) += 1;
            if it.created_at >= since {
                stats.recent += 1;
            }
        }
        Ok(stats)
    }

    async fn list_mappings(&self, filter: MappingFilter) -> Result<Vec<TerminologyMapping>> {
        Ok(read(&self.mappings)?
            .iter()
            .filter(|m| matches_filter(m, filter))
            .cloned()
            .collect())
    }

    async fn insert_mapping(&self, m: &NewMapping) -> Result<Option<TerminologyMapping>> {
        let mut mappings = write(&self.mappings)?;
        let term = m.user_term.to_lowercase();
        if mappings
            .iter()
            .any(|e| e.map_type == m.map_type && e.user_term == term)
        {
            return Ok(None);
        }
        let now = Utc::now();
        let row = TerminologyMapping {
            id: new_id(),
            map_type: m.map_type,
            user_term: term,
            canonical_term: m.canonical_term.clone(),
            confidence: m.confidence,
            source: m.source,
            usage_count: 0,
            last_used_at: None,
            is_active: m.is_active,
            is_verified: m.is_verified,
            created_at: now,
            updated_at: now,
        };
        mappings.push(row.clone());
        Ok(Some(row))
    }

    async fn get_mapping(&self, id: &str) -> Result<Option<TerminologyMapping>> {
        Ok(read(&self.mappings)?.iter().find(|m| m.id == id).cloned())
    }

    async fn set_mapping_status(&self, id: &str, is_active: bool, is_verified: bool) -> Result<bool> {
        let mut mappings = write(&self.mappings)?;
        match mappings.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                m.is_active = is_active;
                m.is_verified = is_verified;
                m.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_mapping(&self, id: &str) -> Result<bool> {
        let mut mappings = write(&self.mappings)?;
        let before = mappings.len();
        mappings.retain(|m| m.id != id);
        Ok(mappings.len() != before)
    }

    async fn increment_terminology_usage(&self, map_type: MapType, user_term: &str) -> Result<()> {
        let term = user_term.to_lowercase();
        let mut mappings = write(&self.mappings)?;
        if let Some(m) = mappings
            .iter_mut()
            .find(|m| m.map_type == map_type && m.user_term == term)
        {
            m.usage_count += 1;
            m.last_used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_context(&self, category: Option<&str>) -> Result<Vec<AiContextEntry>> {
        Ok(read(&self.context)?
            .iter()
            .filter(|e| category.map_or(true, |c| e.category == c))
            .cloned()
            .collect())
    }

    async fn insert_context(&self, entry: &NewContextEntry) -> Result<String> {
        let id = new_id();
        write(&self.context)?.push(AiContextEntry {
            id: id.clone(),
            category: entry.category.clone(),
            subcategory: entry.subcategory.clone(),
            title: entry.title.clone(),
            content: entry.content.clone(),
            summary: entry.summary.clone(),
            tags: entry.tags.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn log_prompt(&self, log: &NewPromptLog) -> Result<String> {
        let id = new_id();
        write(&self.logs)?.push(PromptLog {
            id: id.clone(),
            query: log.query.clone(),
            query_type: log.query_type,
            detected_states: log.detected_states.clone(),
            model_used: log.model_used.clone(),
            recommendations_count: log.recommendations_count,
            ai_quick_answer: log.ai_quick_answer.clone(),
            response_time_ms: log.response_time_ms,
            session_id: log.session_id.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn prompt_logs_since(&self, since: DateTime<Utc>) -> Result<Vec<PromptLog>> {
        Ok(read(&self.logs)?
            .iter()
            .filter(|l| l.created_at >= since)
            .cloned()
            .collect())
    }

    async fn save_report(&self, report: &NewReport) -> Result<String> {
        let id = new_id();
        write(&self.reports)?.push(AnalysisReport {
            id: id.clone(),
            report_type: report.report_type,
            analysis_date: report.analysis_date.clone(),
            logs_analyzed: report.logs_analyzed,
            summary: report.summary.clone(),
            details: report.details.clone(),
            model_used: report.model_used.clone(),
            execution_time_ms: report.execution_time_ms,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_reports(&self, report_type: Option<ReportType>, limit: usize) -> Result<Vec<AnalysisReport>> {
        Ok(read(&self.reports)?
            .iter()
            .rev()
            .filter(|r| report_type.map_or(true, |t| r.report_type == t))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MappingSource;

    fn content(title: &str, link: Option<&str>, ext: Option<&str>) -> NewContent {
        NewContent {
            title: title.to_string(),
            content_type: "Blog".to_string(),
            live_link: link.map(str::to_string),
            external_id: ext.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_find_existing_priority() {
        let store = InMemoryStore::new();
        let by_link = store
            .insert_content(&content("Link Row", Some("https://example.com/a/"), None))
            .await
            .unwrap();
        let by_ext = store
            .insert_content(&content("Ext Row", None, Some("cms-1")))
            .await
            .unwrap();

        let found = store
            .find_existing_content(Some("cms-1"), Some("example.com/a"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, by_ext);

        let found = store
            .find_existing_content(Some("cms-9"), Some("example.com/a"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, by_link);

        let found = store
            .find_existing_content(None, None, Some("  link row "))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, by_link);
    }

    #[tokio::test]
    async fn test_insert_mapping_conflict_returns_none() {
        let store = InMemoryStore::new();
        let m = NewMapping::manual(MapType::ContentType, "Fact Sheet", "1-Pager");
        assert!(store.insert_mapping(&m).await.unwrap().is_some());
        assert!(store.insert_mapping(&m).await.unwrap().is_none());

        let pending = NewMapping::suggested(MapType::Topic, "grad plan", "graduation", 0.7, MappingSource::AiSuggested);
        let row = store.insert_mapping(&pending).await.unwrap().unwrap();
        let listed = store.list_mappings(MappingFilter::Pending).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, row.id);
    }

    #[tokio::test]
    async fn test_usage_increment() {
        let store = InMemoryStore::new();
        let row = store
            .insert_mapping(&NewMapping::manual(MapType::Topic, "wbl", "work-based learning"))
            .await
            .unwrap()
            .unwrap();
        store
            .increment_terminology_usage(MapType::Topic, "WBL")
            .await
            .unwrap();
        let row = store.get_mapping(&row.id).await.unwrap().unwrap();
        assert_eq!(row.usage_count, 1);
        assert!(row.last_used_at.is_some());
    }
}
