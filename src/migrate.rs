use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Open the configured database and create every table and index.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation on an open pool.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS marketing_content (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            type TEXT NOT NULL,
            state TEXT,
            summary TEXT,
            enhanced_summary TEXT,
            tags TEXT NOT NULL DEFAULT '',
            auto_tags TEXT NOT NULL DEFAULT '',
            platform TEXT,
            live_link TEXT,
            ungated_link TEXT,
            external_id TEXT,
            link_key TEXT,
            created_at INTEGER NOT NULL,
            last_updated INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS terminology_map (
            id TEXT PRIMARY KEY,
            map_type TEXT NOT NULL CHECK (map_type IN ('content_type', 'state', 'topic', 'competitor', 'persona', 'feature')),
            user_term TEXT NOT NULL,
            canonical_term TEXT NOT NULL,
            confidence REAL NOT NULL DEFAULT 1.0,
            source TEXT NOT NULL DEFAULT 'manual' CHECK (source IN ('manual', 'ai_suggested', 'log_analysis', 'seed')),
            usage_count INTEGER NOT NULL DEFAULT 0,
            last_used_at INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_verified INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(map_type, user_term)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_context (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            subcategory TEXT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            summary TEXT,
            tags TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ai_prompt_logs (
            id TEXT PRIMARY KEY,
            query TEXT NOT NULL,
            query_type TEXT NOT NULL,
            detected_states TEXT NOT NULL DEFAULT '',
            model_used TEXT,
            recommendations_count INTEGER NOT NULL DEFAULT 0,
            ai_quick_answer TEXT,
            response_time_ms INTEGER,
            session_id TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS log_analysis_reports (
            id TEXT PRIMARY KEY,
            report_type TEXT NOT NULL CHECK (report_type IN ('weekly', 'log_analysis')),
            analysis_date TEXT NOT NULL,
            logs_analyzed INTEGER NOT NULL DEFAULT 0,
            summary TEXT NOT NULL,
            details_json TEXT NOT NULL DEFAULT '{}',
            model_used TEXT,
            execution_time_ms INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for stmt in [
        "CREATE INDEX IF NOT EXISTS idx_content_type ON marketing_content(type)",
        "CREATE INDEX IF NOT EXISTS idx_content_state ON marketing_content(state)",
        "CREATE INDEX IF NOT EXISTS idx_content_external_id ON marketing_content(external_id)",
        "CREATE INDEX IF NOT EXISTS idx_content_link_key ON marketing_content(link_key)",
        "CREATE INDEX IF NOT EXISTS idx_content_updated ON marketing_content(last_updated DESC)",
        "CREATE INDEX IF NOT EXISTS idx_terminology_active ON terminology_map(is_active, is_verified)",
        "CREATE INDEX IF NOT EXISTS idx_context_category ON ai_context(category)",
        "CREATE INDEX IF NOT EXISTS idx_prompt_logs_created ON ai_prompt_logs(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_reports_created ON log_analysis_reports(created_at DESC)",
    ] {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}
