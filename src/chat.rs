//! Conversational assistant.
//!
//! Sessions live in process memory, keyed by an arbitrary session id.
//! Each turn re-runs the search pipeline for the new message, keeping the
//! states and competitors of earlier turns when the message names none,
//! adds any stored AI context for them, and asks the model for an
//! `{answer, recommendations}` reply.

use std::collections::HashMap;
use std::time::Instant;

use anyhow::{bail, Result};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use portal_core::conversation::{parse_assistant_reply, Conversation};
use portal_core::parse::carry_forward;
use portal_core::models::{
    AiContextEntry, ChatMessage, ChatRole, ContentItem, NewPromptLog, ParsedQuery,
    Recommendation, SelectedFilters,
};
use portal_core::rerank::{manual_rank, match_titles};
use portal_core::store::Store;

use crate::portal::Portal;
use crate::prompts;
use crate::search::{build_query, fetch_candidates, interpret, log_llm_failure};

/// Results included in the chat prompt.
const PROMPT_RESULTS: usize = 15;
/// Recommendations used when the reply carries none.
const FALLBACK_RECOMMENDATIONS: usize = 5;

pub const STATE_CONTEXT: &str = "state_context";
pub const COMPETITOR_INTEL: &str = "competitor_intel";

#[derive(Default)]
pub struct ChatSessions {
    inner: RwLock<HashMap<String, Conversation>>,
}

impl ChatSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transcript(&self, session: &str) -> Vec<ChatMessage> {
        self.inner
            .read()
            .await
            .get(session)
            .map(|c| c.messages().to_vec())
            .unwrap_or_default()
    }

    /// Empty a session's transcript. Returns the number of messages removed.
    pub async fn clear(&self, session: &str) -> usize {
        let mut sessions = self.inner.write().await;
        match sessions.get_mut(session) {
            Some(conv) => {
                let n = conv.len();
                conv.clear();
                n
            }
            None => 0,
        }
    }

    async fn history(&self, session: &str) -> Vec<ChatMessage> {
        self.inner
            .read()
            .await
            .get(session)
            .map(|c| c.history_window().to_vec())
            .unwrap_or_default()
    }

    async fn focus(&self, session: &str) -> Option<ParsedQuery> {
        self.inner.read().await.get(session).map(|c| c.focus().clone())
    }

    async fn append(
        &self,
        session: &str,
        parsed: &ParsedQuery,
        user: &str,
        answer: &str,
        recs: Vec<Recommendation>,
    ) -> usize {
        let mut sessions = self.inner.write().await;
        let conv = sessions.entry(session.to_string()).or_default();
        conv.set_focus(parsed);
        conv.push(ChatRole::User, user, Vec::new());
        conv.push(ChatRole::Assistant, answer, recs);
        conv.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub answer: String,
    pub recommendations: Vec<Recommendation>,
    pub parsed: ParsedQuery,
    /// Messages in the transcript after this turn.
    pub transcript_len: usize,
}

/// Stored context entries relevant to the detected states and competitors.
pub async fn relevant_context(store: &dyn Store, parsed: &ParsedQuery) -> Result<Vec<AiContextEntry>> {
    let mut out = Vec::new();
    if !parsed.states.is_empty() {
        out.extend(
            store
                .list_context(Some(STATE_CONTEXT))
                .await?
                .into_iter()
                .filter(|e| {
                    e.subcategory
                        .as_deref()
                        .is_some_and(|s| parsed.states.iter().any(|st| st.eq_ignore_ascii_case(s)))
                }),
        );
    }
    if !parsed.competitors.is_empty() {
        out.extend(
            store
                .list_context(Some(COMPETITOR_INTEL))
                .await?
                .into_iter()
                .filter(|e| {
                    e.subcategory
                        .as_deref()
                        .is_some_and(|s| parsed.competitors.iter().any(|c| c.eq_ignore_ascii_case(s)))
                }),
        );
    }
    Ok(out)
}

fn fallback_answer(results: &[ContentItem]) -> String {
    match results.len() {
        0 => "I couldn't find any content matching that request. Try different wording or fewer filters.".to_string(),
        1 => "I found 1 item that matches.".to_string(),
        n => format!(
            "I found {} items that match. Here are the top {}.",
            n,
            n.min(FALLBACK_RECOMMENDATIONS)
        ),
    }
}

fn top_recommendations(results: &[ContentItem]) -> Vec<Recommendation> {
    results
        .iter()
        .take(FALLBACK_RECOMMENDATIONS)
        .map(|it| Recommendation::from_item(it, None))
        .collect()
}

/// Run one chat turn for `session`.
pub async fn send_message(portal: &Portal, session: &str, message: &str) -> Result<ChatReply> {
    if message.trim().is_empty() {
        bail!("message must not be empty");
    }
    let started = Instant::now();

    let mut interp = interpret(portal, message, &SelectedFilters::default()).await;
    if let Some(previous) = portal.sessions.focus(session).await {
        if carry_forward(&mut interp.parsed, &previous) {
            debug!(session, states = ?interp.parsed.states, "carried filters from earlier turn");
        }
    }
    let query = build_query(&interp.parsed, portal.config.search.result_limit);
    let rows = fetch_candidates(portal.store.as_ref(), &query).await?;
    let results = manual_rank(rows, &interp.parsed).items;
    let prompt_results = &results[..results.len().min(PROMPT_RESULTS)];

    let (answer, recommendations) = if portal.llm.is_enabled() {
        let history = portal.sessions.history(session).await;
        let context = relevant_context(portal.store.as_ref(), &interp.parsed).await?;
        let messages = prompts::chat_turn(message, &history, prompt_results, &context);
        match portal.llm.complete(&messages).await {
            Ok(text) => {
                let reply = parse_assistant_reply(&text);
                let titles = reply.recommended.iter().map(|(t, _)| t.as_str());
                let (matched, _) = match_titles(prompt_results, titles);
                let recs: Vec<Recommendation> = matched
                    .into_iter()
                    .map(|idx| {
                        let item = &prompt_results[idx];
                        let reason = reply
                            .recommended
                            .iter()
                            .find(|(t, _)| *t == item.title)
                            .and_then(|(_, r)| r.clone());
                        Recommendation::from_item(item, reason)
                    })
                    .collect();
                if reply.structured && !recs.is_empty() {
                    (reply.answer, recs)
                } else {
                    (reply.answer, top_recommendations(&results))
                }
            }
            Err(e) => {
                log_llm_failure("chat", &e);
                (fallback_answer(&results), top_recommendations(&results))
            }
        }
    } else {
        (fallback_answer(&results), top_recommendations(&results))
    };

    let transcript_len = portal
        .sessions
        .append(session, &interp.parsed, message, &answer, recommendations.clone())
        .await;
    let elapsed = started.elapsed().as_millis() as i64;

    let log = NewPromptLog {
        query: message.to_string(),
        query_type: interp.parsed.primary_intent,
        detected_states: interp.parsed.states.clone(),
        model_used: portal.model_used(),
        recommendations_count: recommendations.len() as i64,
        ai_quick_answer: Some(answer.clone()),
        response_time_ms: Some(elapsed),
        session_id: Some(session.to_string()),
    };
    if let Err(e) = portal.store.log_prompt(&log).await {
        warn!(error = %e, "failed to write prompt log");
    }
    info!(session, recommendations = recommendations.len(), elapsed_ms = elapsed, "chat turn complete");

    Ok(ChatReply {
        session_id: session.to_string(),
        answer,
        recommendations,
        parsed: interp.parsed,
        transcript_len,
    })
}

/// `portal chat`: a line-oriented session on stdin.
///
/// `/clear` empties the transcript; `/quit` or end of input exits.
pub async fn run_chat(portal: &Portal, session: &str) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    println!("Chat session '{}'. Type /clear to reset, /quit to exit.", session);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                portal.sessions.clear(session).await;
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }
        let reply = send_message(portal, session, line).await?;
        println!("\n{}\n", reply.answer);
        for (i, rec) in reply.recommendations.iter().enumerate() {
            println!(
                "  {}. {} [{}] {}",
                i + 1,
                rec.title,
                rec.content_type,
                rec.link.as_deref().unwrap_or("")
            );
            if let Some(reason) = &rec.reason {
                println!("     {}", reason);
            }
        }
        println!();
    }
    Ok(())
}
