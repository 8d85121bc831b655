//! LLM content enrichment.
//!
//! Sends each item's title, type, state, tags and summary to the model
//! and stores the returned `enhanced_summary` and `auto_tags`. Rows that
//! already carry an enhanced summary are skipped unless `force` is set.
//! A dry run only lists the rows that would be sent.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use portal_core::llm_json::parse_embedded;
use portal_core::models::ContentItem;
use portal_core::text::push_unique;

use crate::portal::Portal;
use crate::prompts;
use crate::webhook::TagField;

/// Generated tags kept per item.
pub const MAX_AUTO_TAGS: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichOptions {
    /// Items sent to the model at most; `None` for all candidates.
    pub limit: Option<usize>,
    pub force: bool,
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct EnrichReply {
    #[serde(default, alias = "enhancedSummary")]
    enhanced_summary: Option<String>,
    #[serde(default, alias = "autoTags")]
    auto_tags: Option<TagField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedItem {
    pub id: String,
    pub title: String,
    pub auto_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichRun {
    pub candidates: usize,
    pub enriched: Vec<EnrichedItem>,
    pub failed: usize,
    pub dry_run: bool,
}

/// Rows due for enrichment, in insertion order.
pub fn candidates(items: Vec<ContentItem>, opts: &EnrichOptions) -> Vec<ContentItem> {
    let due = items.into_iter().filter(|it| {
        opts.force
            || it
                .enhanced_summary
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
    });
    match opts.limit {
        Some(n) => due.take(n).collect(),
        None => due.collect(),
    }
}

/// Clean the generated tags: trimmed, case-insensitively unique, capped.
fn clean_tags(raw: Vec<String>) -> Vec<String> {
    let mut out = Vec::new();
    for tag in raw {
        let tag = tag.trim().trim_start_matches('#');
        if !tag.is_empty() {
            push_unique(&mut out, tag);
        }
    }
    out.truncate(MAX_AUTO_TAGS);
    out
}

async fn enrich_one(portal: &Portal, item: &ContentItem) -> Result<EnrichedItem> {
    let text = portal.llm.complete(&prompts::enrich_item(item)).await?;
    let reply: EnrichReply = parse_embedded(&text)?;
    let summary = reply
        .enhanced_summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let Some(summary) = summary else {
        bail!("reply has no enhanced_summary");
    };
    let auto_tags = clean_tags(reply.auto_tags.map(TagField::into_vec).unwrap_or_default());

    if !portal.store.set_enrichment(&item.id, &summary, &auto_tags).await? {
        bail!("content {} not found", item.id);
    }
    Ok(EnrichedItem {
        id: item.id.clone(),
        title: item.title.clone(),
        auto_tags,
    })
}

/// Enrich the candidate rows one at a time. A failed item is logged and
/// counted; the run continues with the next one.
pub async fn enrich(portal: &Portal, opts: &EnrichOptions) -> Result<EnrichRun> {
    if !opts.dry_run && !portal.llm.is_enabled() {
        bail!("enrichment requires an LLM provider");
    }
    let due = candidates(portal.store.list_content().await?, opts);
    let mut run = EnrichRun {
        candidates: due.len(),
        dry_run: opts.dry_run,
        ..Default::default()
    };

    if opts.dry_run {
        run.enriched = due
            .into_iter()
            .map(|it| EnrichedItem {
                id: it.id,
                title: it.title,
                auto_tags: Vec::new(),
            })
            .collect();
        return Ok(run);
    }

    for item in &due {
        match enrich_one(portal, item).await {
            Ok(done) => {
                info!(id = %done.id, tags = done.auto_tags.len(), "enriched");
                run.enriched.push(done);
            }
            Err(e) => {
                warn!(id = %item.id, error = %e, "enrichment failed");
                run.failed += 1;
            }
        }
    }
    info!(
        candidates = run.candidates,
        enriched = run.enriched.len(),
        failed = run.failed,
        "enrichment finished"
    );
    Ok(run)
}

pub async fn run_enrich(portal: &Portal, opts: &EnrichOptions, json: bool) -> Result<()> {
    let run = enrich(portal, opts).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(());
    }
    if run.candidates == 0 {
        println!("Nothing to enrich.");
        return Ok(());
    }
    if run.dry_run {
        println!("Would enrich {} items:", run.candidates);
        for item in &run.enriched {
            println!("  {}  {}", item.id, item.title);
        }
        return Ok(());
    }
    for item in &run.enriched {
        println!("  {}  [{}]", item.title, item.auto_tags.join(", "));
    }
    println!(
        "\nEnriched {} of {} items ({} failed)",
        run.enriched.len(),
        run.candidates,
        run.failed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, enhanced: Option<&str>) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            title: format!("Item {}", id),
            content_type: "Ebook".to_string(),
            state: None,
            summary: None,
            enhanced_summary: enhanced.map(str::to_string),
            tags: Vec::new(),
            auto_tags: Vec::new(),
            platform: None,
            live_link: None,
            ungated_link: None,
            external_id: None,
            created_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_candidates_skip_enriched_unless_forced() {
        let rows = vec![item("a", Some("done")), item("b", None), item("c", Some("  ")), item("d", None)];

        let due = candidates(rows.clone(), &EnrichOptions::default());
        let ids: Vec<&str> = due.iter().map(|it| it.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);

        let opts = EnrichOptions {
            limit: Some(2),
            force: true,
            dry_run: false,
        };
        let ids: Vec<String> = candidates(rows, &opts).into_iter().map(|it| it.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_clean_tags() {
        let raw = vec![
            " FAFSA ".to_string(),
            "fafsa".to_string(),
            "#counselors".to_string(),
            "".to_string(),
        ];
        assert_eq!(clean_tags(raw), vec!["FAFSA", "counselors"]);
        let many: Vec<String> = (0..12).map(|i| format!("t{}", i)).collect();
        assert_eq!(clean_tags(many).len(), MAX_AUTO_TAGS);
    }
}
