//! Storage abstraction for the portal.
//!
//! The [`Store`] trait covers every persistence operation the query,
//! chat, terminology, webhook and reporting flows need. The application
//! crate implements it over SQLite; [`memory::InMemoryStore`] backs unit
//! tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    AiContextEntry, AnalysisReport, ContentItem, ContentQuery, ContentStats, MapType,
    MappingFilter, NewContent, NewContextEntry, NewMapping, NewPromptLog, NewReport, PromptLog,
    ReportType, TerminologyMapping,
};

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`query_content`](Store::query_content) | Filtered content search, newest first |
/// | [`find_existing_content`](Store::find_existing_content) | Webhook match by id, link, title |
/// | [`set_enrichment`](Store::set_enrichment) | Write generated summary and tags |
/// | [`list_mappings`](Store::list_mappings) | Terminology rows by review state |
/// | [`insert_mapping`](Store::insert_mapping) | Add a mapping unless `(map_type, user_term)` exists |
/// | [`log_prompt`](Store::log_prompt) | Record a search or chat turn |
/// | [`save_report`](Store::save_report) | Persist a weekly or log-analysis report |
#[async_trait]
pub trait Store: Send + Sync {
    // ---- content ----

    /// Rows matching `query`, most recently updated first, capped at `query.limit`.
    async fn query_content(&self, query: &ContentQuery) -> Result<Vec<ContentItem>>;

    async fn get_content(&self, id: &str) -> Result<Option<ContentItem>>;

    /// Every row in insertion order.
    async fn list_content(&self) -> Result<Vec<ContentItem>>;

    /// First row matching, in priority order: `external_id`, normalized
    /// link, case-insensitive title.
    async fn find_existing_content(
        &self,
        external_id: Option<&str>,
        link_key: Option<&str>,
        title: Option<&str>,
    ) -> Result<Option<ContentItem>>;

    /// Insert a row and return its id.
    async fn insert_content(&self, content: &NewContent) -> Result<String>;

    /// Overwrite the fields of an existing row. Returns false if absent.
    async fn update_content(&self, id: &str, content: &NewContent) -> Result<bool>;

    /// Replace `enhanced_summary` and `auto_tags` of one row, leaving the
    /// CMS fields alone. Returns false if absent.
    async fn set_enrichment(&self, id: &str, enhanced_summary: &str, auto_tags: &[String]) -> Result<bool>;

    /// Delete rows carrying `external_id`, returning how many were removed.
    async fn delete_content_by_external_id(&self, external_id: &str) -> Result<u64>;

    /// Rewrite every row of type `from` to `to`, returning the row count.
    async fn rename_content_type(&self, from: &str, to: &str) -> Result<u64>;

    /// Totals by type and state; `recent` counts rows created at or after `since`.
    async fn content_stats(&self, since: DateTime<Utc>) -> Result<ContentStats>;

    // ---- terminology ----

    async fn list_mappings(&self, filter: MappingFilter) -> Result<Vec<TerminologyMapping>>;

    /// Insert unless the `(map_type, user_term)` pair already exists, in
    /// which case `None` is returned and nothing changes.
    async fn insert_mapping(&self, mapping: &NewMapping) -> Result<Option<TerminologyMapping>>;

    async fn get_mapping(&self, id: &str) -> Result<Option<TerminologyMapping>>;

    /// Set the review flags of a row. Returns false if absent.
    async fn set_mapping_status(&self, id: &str, is_active: bool, is_verified: bool) -> Result<bool>;

    async fn delete_mapping(&self, id: &str) -> Result<bool>;

    /// Bump `usage_count` and `last_used_at` for a fired mapping.
    async fn increment_terminology_usage(&self, map_type: MapType, user_term: &str) -> Result<()>;

    // ---- AI context ----

    /// Entries of `category`, or all entries when `None`.
    async fn list_context(&self, category: Option<&str>) -> Result<Vec<AiContextEntry>>;

    async fn insert_context(&self, entry: &NewContextEntry) -> Result<String>;

    // ---- logs and reports ----

    async fn log_prompt(&self, log: &NewPromptLog) -> Result<String>;

    /// Logs created at or after `since`, oldest first.
    async fn prompt_logs_since(&self, since: DateTime<Utc>) -> Result<Vec<PromptLog>>;

    async fn save_report(&self, report: &NewReport) -> Result<String>;

    /// Most recent reports first, optionally restricted to one type.
    async fn list_reports(&self, report_type: Option<ReportType>, limit: usize) -> Result<Vec<AnalysisReport>>;
}
