//! SQLite-backed [`Store`] implementation.
//!
//! Timestamps are stored as Unix seconds and list columns (`tags`,
//! `auto_tags`, `detected_states`) as comma-separated text. Each content
//! row also carries a `link_key`, the normalized primary link, so the
//! webhook can match rows by URL with an indexed lookup.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use portal_core::dedup::normalize_url;
use portal_core::models::{
    AiContextEntry, AnalysisReport, ContentItem, ContentQuery, ContentStats, MapType,
    MappingFilter, NewContent, NewContextEntry, NewMapping, NewPromptLog, NewReport,
    PrimaryIntent, PromptLog, ReportType, TerminologyMapping,
};
use portal_core::store::Store;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn join_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn link_key(content: &NewContent) -> Option<String> {
    content
        .live_link
        .as_deref()
        .or(content.ungated_link.as_deref())
        .map(normalize_url)
        .filter(|k| !k.is_empty())
}

fn row_to_item(row: &SqliteRow) -> Result<ContentItem> {
    Ok(ContentItem {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content_type: row.try_get("type")?,
        state: row.try_get("state")?,
        summary: row.try_get("summary")?,
        enhanced_summary: row.try_get("enhanced_summary")?,
        tags: split_list(&row.try_get::<String, _>("tags")?),
        auto_tags: split_list(&row.try_get::<String, _>("auto_tags")?),
        platform: row.try_get("platform")?,
        live_link: row.try_get("live_link")?,
        ungated_link: row.try_get("ungated_link")?,
        external_id: row.try_get("external_id")?,
        created_at: from_ts(row.try_get("created_at")?),
        last_updated: from_ts(row.try_get("last_updated")?),
    })
}

fn row_to_mapping(row: &SqliteRow) -> Result<TerminologyMapping> {
    let map_type: String = row.try_get("map_type")?;
    let source: String = row.try_get("source")?;
    Ok(TerminologyMapping {
        id: row.try_get("id")?,
        map_type: map_type.parse()?,
        user_term: row.try_get("user_term")?,
        canonical_term: row.try_get("canonical_term")?,
        confidence: row.try_get("confidence")?,
        source: source.parse()?,
        usage_count: row.try_get("usage_count")?,
        last_used_at: row.try_get::<Option<i64>, _>("last_used_at")?.map(from_ts),
        is_active: row.try_get("is_active")?,
        is_verified: row.try_get("is_verified")?,
        created_at: from_ts(row.try_get("created_at")?),
        updated_at: from_ts(row.try_get("updated_at")?),
    })
}

fn row_to_context(row: &SqliteRow) -> Result<AiContextEntry> {
    Ok(AiContextEntry {
        id: row.try_get("id")?,
        category: row.try_get("category")?,
        subcategory: row.try_get("subcategory")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        summary: row.try_get("summary")?,
        tags: split_list(&row.try_get::<String, _>("tags")?),
        created_at: from_ts(row.try_get("created_at")?),
    })
}

fn row_to_log(row: &SqliteRow) -> Result<PromptLog> {
    let query_type: String = row.try_get("query_type")?;
    Ok(PromptLog {
        id: row.try_get("id")?,
        query: row.try_get("query")?,
        query_type: PrimaryIntent::parse_lenient(&query_type),
        detected_states: split_list(&row.try_get::<String, _>("detected_states")?),
        model_used: row.try_get("model_used")?,
        recommendations_count: row.try_get("recommendations_count")?,
        ai_quick_answer: row.try_get("ai_quick_answer")?,
        response_time_ms: row.try_get("response_time_ms")?,
        session_id: row.try_get("session_id")?,
        created_at: from_ts(row.try_get("created_at")?),
    })
}

fn row_to_report(row: &SqliteRow) -> Result<AnalysisReport> {
    let report_type: String = row.try_get("report_type")?;
    let details: String = row.try_get("details_json")?;
    Ok(AnalysisReport {
        id: row.try_get("id")?,
        report_type: report_type.parse()?,
        analysis_date: row.try_get("analysis_date")?,
        logs_analyzed: row.try_get("logs_analyzed")?,
        summary: row.try_get("summary")?,
        details: serde_json::from_str(&details).unwrap_or(serde_json::json!({})),
        model_used: row.try_get("model_used")?,
        execution_time_ms: row.try_get("execution_time_ms")?,
        created_at: from_ts(row.try_get("created_at")?),
    })
}

/// Escape `%`, `_` and `\` so a term matches literally under `ESCAPE '\'`.
fn like_escape(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `(title LIKE ? OR summary LIKE ? OR …)` for one term.
fn push_term_match(qb: &mut QueryBuilder<'_, Sqlite>, term: &str) {
    let pattern = format!("%{}%", like_escape(&term.to_lowercase()));
    qb.push("(");
    for (i, col) in ["title", "summary", "enhanced_summary", "tags", "auto_tags"]
        .iter()
        .enumerate()
    {
        if i > 0 {
            qb.push(" OR ");
        }
        qb.push(format!("lower(coalesce({}, '')) LIKE ", col));
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\'");
    }
    qb.push(")");
}

fn push_in_list(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, values: &[String]) {
    qb.push(format!(" AND lower({}) IN (", column));
    let mut sep = qb.separated(", ");
    for v in values {
        sep.push_bind(v.to_lowercase());
    }
    sep.push_unseparated(")");
}

#[async_trait]
impl Store for SqliteStore {
    async fn query_content(&self, query: &ContentQuery) -> Result<Vec<ContentItem>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM marketing_content WHERE 1 = 1");
        if !query.types.is_empty() {
            push_in_list(&mut qb, "type", &query.types);
        }
        if !query.states.is_empty() {
            push_in_list(&mut qb, "state", &query.states);
        }
        if !query.any_terms.is_empty() {
            qb.push(" AND (");
            for (i, term) in query.any_terms.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_term_match(&mut qb, term);
            }
            qb.push(")");
        }
        for term in &query.all_terms {
            qb.push(" AND ");
            push_term_match(&mut qb, term);
        }
        qb.push(" ORDER BY last_updated DESC, rowid ASC");
        if query.limit > 0 {
            qb.push(" LIMIT ");
            qb.push_bind(query.limit as i64);
        }

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("content query failed")?;
        rows.iter().map(row_to_item).collect()
    }

    async fn get_content(&self, id: &str) -> Result<Option<ContentItem>> {
        let row = sqlx::query("SELECT * FROM marketing_content WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn list_content(&self) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query("SELECT * FROM marketing_content ORDER BY rowid ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn find_existing_content(
        &self,
        external_id: Option<&str>,
        link_key: Option<&str>,
        title: Option<&str>,
    ) -> Result<Option<ContentItem>> {
        if let Some(ext) = external_id {
            let row = sqlx::query(
                "SELECT * FROM marketing_content WHERE external_id = ? ORDER BY rowid LIMIT 1",
            )
            .bind(ext)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(row) = row {
                return Ok(Some(row_to_item(&row)?));
            }
        }
        if let Some(key) = link_key {
            let row = sqlx::query(
                "SELECT * FROM marketing_content WHERE link_key = ? ORDER BY rowid LIMIT 1",
            )
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(row) = row {
                return Ok(Some(row_to_item(&row)?));
            }
        }
        if let Some(title) = title {
            let row = sqlx::query(
                "SELECT * FROM marketing_content WHERE lower(title) = ? ORDER BY rowid LIMIT 1",
            )
            .bind(title.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
            if let Some(row) = row {
                return Ok(Some(row_to_item(&row)?));
            }
        }
        Ok(None)
    }

    async fn insert_content(&self, c: &NewContent) -> Result<String> {
        let id = new_id();
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO marketing_content (id, title, type, state, summary, enhanced_summary,
                                           tags, auto_tags, platform, live_link, ungated_link,
                                           external_id, link_key, created_at, last_updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&c.title)
        .bind(&c.content_type)
        .bind(&c.state)
        .bind(&c.summary)
        .bind(&c.enhanced_summary)
        .bind(join_list(&c.tags))
        .bind(join_list(&c.auto_tags))
        .bind(&c.platform)
        .bind(&c.live_link)
        .bind(&c.ungated_link)
        .bind(&c.external_id)
        .bind(link_key(c))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_content(&self, id: &str, c: &NewContent) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE marketing_content SET
                title = ?, type = ?, state = ?, summary = ?, enhanced_summary = ?,
                tags = ?, auto_tags = ?, platform = ?, live_link = ?, ungated_link = ?,
                external_id = ?, link_key = ?, last_updated = ?
            WHERE id = ?
            "#,
        )
        .bind(&c.title)
        .bind(&c.content_type)
        .bind(&c.state)
        .bind(&c.summary)
        .bind(&c.enhanced_summary)
        .bind(join_list(&c.tags))
        .bind(join_list(&c.auto_tags))
        .bind(&c.platform)
        .bind(&c.live_link)
        .bind(&c.ungated_link)
        .bind(&c.external_id)
        .bind(link_key(c))
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_enrichment(&self, id: &str, enhanced_summary: &str, auto_tags: &[String]) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE marketing_content SET enhanced_summary = ?, auto_tags = ?, last_updated = ? WHERE id = ?",
        )
        .bind(enhanced_summary)
        .bind(join_list(auto_tags))
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_content_by_external_id(&self, external_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM marketing_content WHERE external_id = ?")
            .bind(external_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn rename_content_type(&self, from: &str, to: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE marketing_content SET type = ? WHERE type = ?")
            .bind(to)
            .bind(from)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn content_stats(&self, since: DateTime<Utc>) -> Result<ContentStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM marketing_content")
            .fetch_one(&self.pool)
            .await?;
        let recent: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM marketing_content WHERE created_at >= ?")
                .bind(since.timestamp())
                .fetch_one(&self.pool)
                .await?;

        let mut stats = ContentStats {
            total,
            recent,
            ..Default::default()
        };

        let rows = sqlx::query("SELECT type, COUNT(*) AS n FROM marketing_content GROUP BY type")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            stats
                .by_type
                .insert(row.try_get("type")?, row.try_get("n")?);
        }

        let rows = sqlx::query(
            "SELECT coalesce(state, 'Unspecified') AS state, COUNT(*) AS n FROM marketing_content GROUP BY 1",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            stats
                .by_state
                .insert(row.try_get("state")?, row.try_get("n")?);
        }

        Ok(stats)
    }

    async fn list_mappings(&self, filter: MappingFilter) -> Result<Vec<TerminologyMapping>> {
        let sql = match filter {
            MappingFilter::All => "SELECT * FROM terminology_map ORDER BY map_type, user_term",
            MappingFilter::Applied => {
                "SELECT * FROM terminology_map WHERE is_active = 1 AND is_verified = 1 ORDER BY map_type, user_term"
            }
            MappingFilter::Pending => {
                "SELECT * FROM terminology_map WHERE is_verified = 0 ORDER BY created_at DESC, rowid DESC"
            }
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_mapping).collect()
    }

    async fn insert_mapping(&self, m: &NewMapping) -> Result<Option<TerminologyMapping>> {
        let id = new_id();
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO terminology_map (id, map_type, user_term, canonical_term, confidence,
                                         source, is_active, is_verified, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(map_type, user_term) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(m.map_type.as_str())
        .bind(m.user_term.to_lowercase())
        .bind(&m.canonical_term)
        .bind(m.confidence)
        .bind(m.source.as_str())
        .bind(m.is_active)
        .bind(m.is_verified)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_mapping(&id).await
    }

    async fn get_mapping(&self, id: &str) -> Result<Option<TerminologyMapping>> {
        let row = sqlx::query("SELECT * FROM terminology_map WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_mapping).transpose()
    }

    async fn set_mapping_status(&self, id: &str, is_active: bool, is_verified: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE terminology_map SET is_active = ?, is_verified = ?, updated_at = ? WHERE id = ?",
        )
        .bind(is_active)
        .bind(is_verified)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_mapping(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM terminology_map WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_terminology_usage(&self, map_type: MapType, user_term: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE terminology_map
            SET usage_count = usage_count + 1, last_used_at = ?
            WHERE map_type = ? AND user_term = ?
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(map_type.as_str())
        .bind(user_term.to_lowercase())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_context(&self, category: Option<&str>) -> Result<Vec<AiContextEntry>> {
        let rows = match category {
            Some(c) => {
                sqlx::query("SELECT * FROM ai_context WHERE category = ? ORDER BY rowid ASC")
                    .bind(c)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM ai_context ORDER BY rowid ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(row_to_context).collect()
    }

    async fn insert_context(&self, entry: &NewContextEntry) -> Result<String> {
        let id = new_id();
        sqlx::query(
            r#"
            INSERT INTO ai_context (id, category, subcategory, title, content, summary, tags, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&entry.category)
        .bind(&entry.subcategory)
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(&entry.summary)
        .bind(join_list(&entry.tags))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn log_prompt(&self, log: &NewPromptLog) -> Result<String> {
        let id = new_id();
        sqlx::query(
            r#"
            INSERT INTO ai_prompt_logs (id, query, query_type, detected_states, model_used,
                                        recommendations_count, ai_quick_answer,
                                        response_time_ms, session_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&log.query)
        .bind(log.query_type.as_str())
        .bind(join_list(&log.detected_states))
        .bind(&log.model_used)
        .bind(log.recommendations_count)
        .bind(&log.ai_quick_answer)
        .bind(log.response_time_ms)
        .bind(&log.session_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn prompt_logs_since(&self, since: DateTime<Utc>) -> Result<Vec<PromptLog>> {
        let rows = sqlx::query(
            "SELECT * FROM ai_prompt_logs WHERE created_at >= ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_log).collect()
    }

    async fn save_report(&self, report: &NewReport) -> Result<String> {
        let id = new_id();
        sqlx::query(
            r#"
            INSERT INTO log_analysis_reports (id, report_type, analysis_date, logs_analyzed,
                                              summary, details_json, model_used,
                                              execution_time_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(report.report_type.as_str())
        .bind(&report.analysis_date)
        .bind(report.logs_analyzed)
        .bind(&report.summary)
        .bind(report.details.to_string())
        .bind(&report.model_used)
        .bind(report.execution_time_ms)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn list_reports(&self, report_type: Option<ReportType>, limit: usize) -> Result<Vec<AnalysisReport>> {
        let rows = match report_type {
            Some(t) => {
                sqlx::query(
                    "SELECT * FROM log_analysis_reports WHERE report_type = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
                )
                .bind(t.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM log_analysis_reports ORDER BY created_at DESC, rowid DESC LIMIT ?",
                )
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_report).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::migrate;
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let cfg = Config::minimal(dir.path().join("portal.sqlite"));
        let pool = crate::db::connect(&cfg).await.unwrap();
        migrate::create_schema(&pool).await.unwrap();
        (dir, SqliteStore::new(pool))
    }

    fn content(title: &str, ty: &str, state: Option<&str>, tags: &[&str]) -> NewContent {
        NewContent {
            title: title.to_string(),
            content_type: ty.to_string(),
            state: state.map(str::to_string),
            summary: Some(format!("About {}", title)),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            live_link: Some(format!("https://example.com/{}", title.to_lowercase().replace(' ', "-"))),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_query_filters_and_terms() {
        let (_dir, store) = store().await;
        store.insert_content(&content("Frisco Story", "Customer Story", Some("TX"), &["graduation"])).await.unwrap();
        store.insert_content(&content("Ohio Story", "Customer Story", Some("OH"), &[])).await.unwrap();
        store.insert_content(&content("FAFSA Guide", "Ebook", Some("TX"), &["fafsa"])).await.unwrap();

        let rows = store
            .query_content(&ContentQuery {
                types: vec!["customer story".into()],
                states: vec!["TX".into()],
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Frisco Story");
        assert_eq!(rows[0].tags, vec!["graduation"]);

        let rows = store
            .query_content(&ContentQuery {
                any_terms: vec!["FAFSA".into(), "graduation".into()],
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_wildcard_characters_match_literally() {
        let (_dir, store) = store().await;
        store.insert_content(&content("100% Graduation Rate", "Customer Story", Some("TX"), &[])).await.unwrap();
        store.insert_content(&content("FAFSA Guide", "Ebook", Some("TX"), &["fafsa"])).await.unwrap();

        for (term, expected) in [("100%", 1), ("%", 1), ("fafsa_", 0), ("_", 0)] {
            let rows = store
                .query_content(&ContentQuery {
                    any_terms: vec![term.into()],
                    limit: 10,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(rows.len(), expected, "term {:?}", term);
        }
    }

    #[tokio::test]
    async fn test_find_existing_by_link_key() {
        let (_dir, store) = store().await;
        let id = store.insert_content(&content("Frisco Story", "Customer Story", Some("TX"), &[])).await.unwrap();
        let found = store
            .find_existing_content(None, Some("example.com/frisco-story"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn test_mapping_lifecycle() {
        let (_dir, store) = store().await;
        let row = store
            .insert_mapping(&NewMapping::suggested(
                MapType::Topic,
                "grad plan",
                "graduation tracking",
                0.8,
                portal_core::models::MappingSource::AiSuggested,
            ))
            .await
            .unwrap()
            .unwrap();
        assert!(!row.is_active && !row.is_verified);
        assert_eq!(store.list_mappings(MappingFilter::Pending).await.unwrap().len(), 1);

        assert!(store.set_mapping_status(&row.id, true, true).await.unwrap());
        let applied = store.list_mappings(MappingFilter::Applied).await.unwrap();
        assert_eq!(applied.len(), 1);
        assert!(store.list_mappings(MappingFilter::Pending).await.unwrap().is_empty());

        let dup = store
            .insert_mapping(&NewMapping::manual(MapType::Topic, "Grad Plan", "other"))
            .await
            .unwrap();
        assert!(dup.is_none());
    }

    #[tokio::test]
    async fn test_reports_newest_first() {
        let (_dir, store) = store().await;
        for summary in ["first", "second"] {
            store
                .save_report(&NewReport {
                    report_type: ReportType::Weekly,
                    analysis_date: "2026-01-05".into(),
                    logs_analyzed: 0,
                    summary: summary.into(),
                    details: serde_json::json!({"k": 1}),
                    model_used: None,
                    execution_time_ms: 3,
                })
                .await
                .unwrap();
        }
        let reports = store.list_reports(Some(ReportType::Weekly), 5).await.unwrap();
        assert_eq!(reports[0].summary, "second");
        assert_eq!(reports[0].details["k"], 1);
    }
}
