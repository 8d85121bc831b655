//! Natural-language search pipeline.
//!
//! ```text
//! query ─▶ parse (local, then optional LLM) ─▶ store query ─▶ rerank ─▶ log
//! ```
//!
//! Every LLM step degrades to the local heuristics: a failed parse keeps
//! the dictionary parse, a failed ranking falls back to manual scoring.
//! A disabled provider is expected and never logged as a warning.

use std::time::Instant;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use portal_core::llm_json::parse_embedded;
use portal_core::models::{
    ContentItem, ContentQuery, NewPromptLog, ParsedQuery, PrimaryIntent, Recommendation,
    SelectedFilters,
};
use portal_core::parse::{merge_llm_parse, parse_local, LlmParse};
use portal_core::rerank::{
    apply_ranking, filter_competitor_exclusive, manual_rank, split_for_rerank, RankSource,
    RankingResponse, Reranked,
};
use portal_core::store::Store;
use portal_core::vocab::{COMPETITORS, PERSONAS};

use crate::llm::{ChatModel, LlmError};
use crate::portal::Portal;
use crate::prompts;
use crate::terminology::record_usage;

/// Request body for `POST /search`, also built by the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Skip the LLM rerank even when a provider is configured.
    #[serde(default)]
    pub no_rerank: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub normalized_query: String,
    pub parsed: ParsedQuery,
    pub results: Vec<ContentItem>,
    pub primary: Vec<Recommendation>,
    pub additional: Vec<Recommendation>,
    pub summary: Option<String>,
    pub ranked_by: RankSource,
    pub response_time_ms: i64,
}

/// Parsed query plus the rewritten text it came from.
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub parsed: ParsedQuery,
    pub normalized_query: String,
}

pub(crate) fn log_llm_failure(step: &str, err: &LlmError) {
    if !err.is_disabled() {
        warn!(step, error = %err, "LLM call failed, using local fallback");
    }
}

/// Local parse, terminology usage bookkeeping, then optional LLM merge.
pub async fn interpret(portal: &Portal, query: &str, selected: &SelectedFilters) -> Interpretation {
    let index = if portal.config.search.use_terminology {
        Some(portal.terminology.snapshot().await)
    } else {
        None
    };
    let local = parse_local(query, selected, index.as_deref());
    record_usage(portal.store.as_ref(), &local.term_hits).await;
    debug!(parsed = ?local.parsed, hits = local.term_hits.len(), "local parse");

    let mut parsed = local.parsed;
    if portal.llm.is_enabled() {
        match llm_parse(portal.llm.as_ref(), query, selected, index.as_deref()).await {
            Ok(llm) => parsed = merge_llm_parse(&parsed, &llm),
            Err(e) => warn!(error = %e, "LLM parse unusable, keeping local parse"),
        }
    }

    Interpretation {
        parsed,
        normalized_query: local.normalized_query,
    }
}

async fn llm_parse(
    llm: &dyn ChatModel,
    query: &str,
    selected: &SelectedFilters,
    index: Option<&portal_core::terminology::TerminologyIndex>,
) -> Result<LlmParse> {
    let reply = llm
        .complete(&prompts::parse_query(query, selected, index))
        .await?;
    parse_embedded(&reply)
}

fn persona_names(canonical: &str) -> Vec<String> {
    PERSONAS
        .iter()
        .filter(|(c, _)| c.eq_ignore_ascii_case(canonical))
        .flat_map(|(c, names)| std::iter::once(*c).chain(names.iter().copied()))
        .map(str::to_lowercase)
        .collect()
}

fn competitor_names(canonical: &str) -> Vec<String> {
    COMPETITORS
        .iter()
        .filter(|(c, _)| c.eq_ignore_ascii_case(canonical))
        .flat_map(|(_, names)| names.iter().map(|n| n.to_string()))
        .collect()
}

/// Turn a parsed query into store filters.
///
/// Types and states always filter. Which words must match depends on
/// the intent: a competitor query requires a competitor name, a persona
/// or topic query requires any persona name or search term, and a state
/// query relies on the state filter alone and uses its terms for ranking.
pub fn build_query(parsed: &ParsedQuery, limit: usize) -> ContentQuery {
    let mut query = ContentQuery {
        types: parsed.types.clone(),
        states: parsed.states.clone(),
        limit,
        ..Default::default()
    };
    match parsed.primary_intent {
        PrimaryIntent::Competitor => {
            query.any_terms = parsed
                .competitors
                .iter()
                .flat_map(|c| competitor_names(c))
                .collect();
        }
        PrimaryIntent::Persona | PrimaryIntent::Topic => {
            query.any_terms = parsed
                .personas
                .iter()
                .flat_map(|p| persona_names(p))
                .chain(parsed.search_terms.iter().cloned())
                .collect();
        }
        PrimaryIntent::State | PrimaryIntent::General => {}
    }
    query
}

/// Query the store, widening to the plain type/state filter when the
/// term filter finds nothing.
pub async fn fetch_candidates(store: &dyn Store, query: &ContentQuery) -> Result<Vec<ContentItem>> {
    let rows = store.query_content(query).await?;
    if !rows.is_empty() || (query.any_terms.is_empty() && query.all_terms.is_empty()) {
        return Ok(rows);
    }
    debug!("term filter returned nothing, widening");
    let widened = ContentQuery {
        any_terms: Vec::new(),
        all_terms: Vec::new(),
        ..query.clone()
    };
    store.query_content(&widened).await
}

/// Rerank with the model when possible, else by manual score.
pub async fn rerank(
    llm: &dyn ChatModel,
    query: &str,
    parsed: &ParsedQuery,
    items: Vec<ContentItem>,
    rerank_limit: usize,
    use_llm: bool,
) -> Reranked {
    let items = if parsed.primary_intent == PrimaryIntent::Competitor {
        filter_competitor_exclusive(items, &parsed.competitors)
    } else {
        items
    };
    if items.is_empty() || !use_llm || !llm.is_enabled() {
        return manual_rank(items, parsed);
    }

    let (head, tail) = split_for_rerank(items, rerank_limit);
    let reply = match llm.complete(&prompts::rank_results(query, &head)).await {
        Ok(reply) => reply,
        Err(e) => {
            log_llm_failure("rank", &e);
            let mut all = head;
            all.extend(tail);
            return manual_rank(all, parsed);
        }
    };
    match parse_embedded::<RankingResponse>(&reply) {
        Ok(response) => {
            let mut ranked = apply_ranking(head, &response);
            if !ranked.unmatched_titles.is_empty() {
                debug!(titles = ?ranked.unmatched_titles, "dropped unknown ranked titles");
            }
            ranked.items.extend(tail);
            ranked
        }
        Err(e) => {
            warn!(error = %e, "ranking reply unusable, using manual scoring");
            let mut all = head;
            all.extend(tail);
            manual_rank(all, parsed)
        }
    }
}

/// Run a full search and log it.
pub async fn search(portal: &Portal, req: &SearchRequest) -> Result<SearchOutcome> {
    if req.query.trim().is_empty() {
        bail!("query must not be empty");
    }
    let started = Instant::now();
    let selected = SelectedFilters {
        types: req.types.clone(),
        states: req.states.clone(),
    };
    let interp = interpret(portal, &req.query, &selected).await;
    let limit = req.limit.unwrap_or(portal.config.search.result_limit).max(1);
    let query = build_query(&interp.parsed, limit);
    let rows = fetch_candidates(portal.store.as_ref(), &query).await?;
    let ranked = rerank(
        portal.llm.as_ref(),
        &req.query,
        &interp.parsed,
        rows,
        portal.config.search.rerank_limit,
        !req.no_rerank,
    )
    .await;
    let elapsed = started.elapsed().as_millis() as i64;

    let log = NewPromptLog {
        query: req.query.clone(),
        query_type: interp.parsed.primary_intent,
        detected_states: interp.parsed.states.clone(),
        model_used: portal.model_used(),
        recommendations_count: (ranked.primary.len() + ranked.additional.len()) as i64,
        ai_quick_answer: ranked.summary.clone(),
        response_time_ms: Some(elapsed),
        session_id: None,
    };
    if let Err(e) = portal.store.log_prompt(&log).await {
        warn!(error = %e, "failed to write prompt log");
    }
    info!(
        query = %req.query,
        intent = interp.parsed.primary_intent.as_str(),
        results = ranked.items.len(),
        elapsed_ms = elapsed,
        "search complete"
    );

    Ok(SearchOutcome {
        query: req.query.clone(),
        normalized_query: interp.normalized_query,
        parsed: interp.parsed,
        results: ranked.items,
        primary: ranked.primary,
        additional: ranked.additional,
        summary: ranked.summary,
        ranked_by: ranked.ranked_by,
        response_time_ms: elapsed,
    })
}

/// `portal search`: print the outcome as a table or JSON.
pub async fn run_search(portal: &Portal, req: SearchRequest, json: bool) -> Result<()> {
    let outcome = search(portal, &req).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let p = &outcome.parsed;
    println!(
        "Intent: {}  types: [{}]  states: [{}]  terms: [{}]",
        p.primary_intent.as_str(),
        p.types.join(", "),
        p.states.join(", "),
        p.search_terms.join(", ")
    );
    if let Some(summary) = &outcome.summary {
        println!("\n{}", summary);
    }
    if outcome.results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    println!();
    for (i, item) in outcome.results.iter().enumerate() {
        println!(
            "{}. {} [{}{}]",
            i + 1,
            item.title,
            item.content_type,
            item.state
                .as_deref()
                .map(|s| format!(", {}", s))
                .unwrap_or_default()
        );
        if let Some(link) = item.primary_link() {
            println!("    {}", link);
        }
    }
    println!(
        "\n{} results ({} ranking, {} ms)",
        outcome.results.len(),
        match outcome.ranked_by {
            RankSource::Llm => "LLM",
            RankSource::Manual => "manual",
        },
        outcome.response_time_ms
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_state_intent_has_no_term_filter() {
        let parsed = ParsedQuery {
            states: vec!["TX".into()],
            search_terms: vec!["graduation".into()],
            primary_intent: PrimaryIntent::State,
            ..Default::default()
        };
        let q = build_query(&parsed, 100);
        assert_eq!(q.states, vec!["TX"]);
        assert!(q.any_terms.is_empty());
        assert_eq!(q.limit, 100);
    }

    #[test]
    fn test_build_query_competitor_uses_aliases() {
        let parsed = ParsedQuery {
            competitors: vec!["maialearning".into()],
            primary_intent: PrimaryIntent::Competitor,
            ..Default::default()
        };
        let q = build_query(&parsed, 10);
        assert!(q.any_terms.contains(&"maia learning".to_string()));
    }

    #[test]
    fn test_build_query_persona_expands_names() {
        let parsed = ParsedQuery {
            personas: vec!["counselors".into()],
            primary_intent: PrimaryIntent::Persona,
            ..Default::default()
        };
        let q = build_query(&parsed, 10);
        assert!(q.any_terms.contains(&"counselors".to_string()));
    }
}
