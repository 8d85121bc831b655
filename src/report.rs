//! Weekly reports and prompt-log analysis.
//!
//! Both reports are stored in `log_analysis_reports`. The weekly report
//! aggregates content and search metrics and asks the model for a short
//! prose note, falling back to a deterministic sentence. Log analysis
//! sends the logs in batches and collects issues, mapping suggestions
//! and insights.

use std::time::Instant;

use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use portal_core::llm_json::parse_embedded;
use portal_core::metrics::LogMetrics;
use portal_core::models::{AnalysisReport, ContentStats, MappingSource, NewReport, ReportType};

use crate::portal::Portal;
use crate::prompts;
use crate::search::log_llm_failure;
use crate::terminology::{store_suggestions, SuggestedMapping};

/// Logs sent to the model per analysis request.
pub const ANALYSIS_BATCH: usize = 20;
const REPORT_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub id: String,
    pub summary: String,
    pub stats: ContentStats,
    pub metrics: LogMetrics,
    pub model_used: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Issue {
    pub query: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchAnalysis {
    #[serde(default)]
    issues: Vec<Issue>,
    #[serde(default)]
    suggested_mappings: Vec<SuggestedMapping>,
    #[serde(default)]
    pattern_insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogAnalysis {
    pub id: String,
    pub logs_analyzed: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub issues: Vec<Issue>,
    pub suggestions: Vec<SuggestedMapping>,
    pub insights: Vec<String>,
    /// Suggestions inserted as pending terminology rows.
    pub mappings_stored: usize,
    pub summary: String,
}

/// Build, store and return this week's report.
pub async fn weekly(portal: &Portal) -> Result<WeeklyReport> {
    let started = Instant::now();
    let since = Utc::now() - Duration::days(REPORT_DAYS);
    let stats = portal.store.content_stats(since).await?;
    let logs = portal.store.prompt_logs_since(since).await?;
    let metrics = LogMetrics::calculate(&logs);

    let stats_json = serde_json::to_string_pretty(&stats)?;
    let metrics_json = serde_json::to_string_pretty(&metrics)?;

    let mut model_used = None;
    let summary = if portal.llm.is_enabled() {
        match portal
            .llm
            .complete(&prompts::weekly_summary(&stats_json, &metrics_json))
            .await
        {
            Ok(text) if !text.trim().is_empty() => {
                model_used = portal.model_used();
                text.trim().to_string()
            }
            Ok(_) => fallback_summary(&stats, &metrics),
            Err(e) => {
                log_llm_failure("weekly_report", &e);
                fallback_summary(&stats, &metrics)
            }
        }
    } else {
        fallback_summary(&stats, &metrics)
    };

    let id = portal
        .store
        .save_report(&NewReport {
            report_type: ReportType::Weekly,
            analysis_date: Utc::now().format("%Y-%m-%d").to_string(),
            logs_analyzed: logs.len() as i64,
            summary: summary.clone(),
            details: serde_json::json!({ "stats": stats, "metrics": metrics }),
            model_used: model_used.clone(),
            execution_time_ms: started.elapsed().as_millis() as i64,
        })
        .await?;
    info!(id = %id, logs = logs.len(), "weekly report saved");

    Ok(WeeklyReport {
        id,
        summary,
        stats,
        metrics,
        model_used,
    })
}

fn fallback_summary(stats: &ContentStats, metrics: &LogMetrics) -> String {
    format!(
        "The library holds {} items, {} added in the last {} days. {}",
        stats.total,
        stats.recent,
        REPORT_DAYS,
        metrics.summary_sentence()
    )
}

/// Analyze the last `days` of prompt logs. When `store_mappings` is set,
/// suggested mappings are inserted as pending `log_analysis` rows.
pub async fn analyze(portal: &Portal, days: i64, store_mappings: bool) -> Result<LogAnalysis> {
    if !portal.llm.is_enabled() {
        bail!("log analysis requires an LLM provider");
    }
    let started = Instant::now();
    let logs = portal
        .store
        .prompt_logs_since(Utc::now() - Duration::days(days))
        .await?;

    let mut issues = Vec::new();
    let mut suggestions = Vec::new();
    let mut insights = Vec::new();
    let mut failed_batches = 0;
    let batches = logs.chunks(ANALYSIS_BATCH).count();

    for (i, batch) in logs.chunks(ANALYSIS_BATCH).enumerate() {
        let reply = match portal.llm.complete(&prompts::analyze_logs(batch)).await {
            Ok(reply) => reply,
            Err(e) => {
                log_llm_failure("log_analysis", &e);
                failed_batches += 1;
                continue;
            }
        };
        match parse_embedded::<BatchAnalysis>(&reply) {
            Ok(parsed) => {
                issues.extend(parsed.issues);
                suggestions.extend(parsed.suggested_mappings);
                insights.extend(parsed.pattern_insights);
            }
            Err(e) => {
                warn!(batch = i, error = %e, "analysis reply unusable");
                failed_batches += 1;
            }
        }
    }

    let mappings_stored = if store_mappings {
        store_suggestions(portal.store.as_ref(), &suggestions, MappingSource::LogAnalysis)
            .await?
            .len()
    } else {
        0
    };

    let metrics = LogMetrics::calculate(&logs);
    let summary = format!(
        "{} Found {} issues and {} suggested mappings across {} batches.",
        metrics.summary_sentence(),
        issues.len(),
        suggestions.len(),
        batches
    );

    let id = portal
        .store
        .save_report(&NewReport {
            report_type: ReportType::LogAnalysis,
            analysis_date: Utc::now().format("%Y-%m-%d").to_string(),
            logs_analyzed: logs.len() as i64,
            summary: summary.clone(),
            details: serde_json::json!({
                "metrics": metrics,
                "issues": issues,
                "suggestions": suggestions,
                "insights": insights,
                "failedBatches": failed_batches,
            }),
            model_used: portal.model_used(),
            execution_time_ms: started.elapsed().as_millis() as i64,
        })
        .await?;
    info!(id = %id, logs = logs.len(), batches, failed_batches, "log analysis saved");

    Ok(LogAnalysis {
        id,
        logs_analyzed: logs.len(),
        batches,
        failed_batches,
        issues,
        suggestions,
        insights,
        mappings_stored,
        summary,
    })
}

/// Most recent stored reports of one kind.
pub async fn recent(portal: &Portal, report_type: ReportType, limit: usize) -> Result<Vec<AnalysisReport>> {
    portal.store.list_reports(Some(report_type), limit).await
}

pub async fn run_weekly(portal: &Portal, json: bool) -> Result<()> {
    let report = weekly(portal).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("Weekly report {}\n", report.id);
    println!("{}\n", report.summary);
    println!("Content: {} total, {} new this week", report.stats.total, report.stats.recent);
    for (t, n) in &report.stats.by_type {
        println!("  {:<20} {}", t, n);
    }
    println!("\nSearches: {}", report.metrics.total_queries);
    println!("  avg recommendations  {:.1}", report.metrics.avg_recommendations);
    println!("  zero results         {}", report.metrics.zero_result_queries);
    println!("  low results          {}", report.metrics.low_result_queries);
    println!("  competitor queries   {}", report.metrics.competitor_queries);
    Ok(())
}

pub async fn run_analyze(portal: &Portal, days: i64, store_mappings: bool, json: bool) -> Result<()> {
    let analysis = analyze(portal, days, store_mappings).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }
    println!("{}\n", analysis.summary);
    if !analysis.issues.is_empty() {
        println!("Issues:");
        for issue in &analysis.issues {
            println!(
                "  [{}] \"{}\": {}",
                issue.severity.as_deref().unwrap_or("-"),
                issue.query,
                issue.problem
            );
        }
    }
    if !analysis.suggestions.is_empty() {
        println!("\nSuggested mappings:");
        for s in &analysis.suggestions {
            println!(
                "  {:<12} {} -> {} ({:.2})",
                s.map_type, s.user_term, s.canonical_term, s.confidence
            );
        }
        if store_mappings {
            println!("  {} stored for review", analysis.mappings_stored);
        }
    }
    if !analysis.insights.is_empty() {
        println!("\nInsights:");
        for line in &analysis.insights {
            println!("  - {}", line);
        }
    }
    Ok(())
}
