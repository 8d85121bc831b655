//! Prompt builders for every LLM call.
//!
//! Each builder returns the `[system, user]` message pair (plus history
//! for chat). The JSON shapes named in the system prompts are the ones
//! parsed back in `search`, `chat`, `terminology` and `report`.

use portal_core::models::{AiContextEntry, ChatMessage, ChatRole, ContentItem, PromptLog, SelectedFilters};
use portal_core::terminology::TerminologyIndex;
use portal_core::vocab::{CONTENT_TYPES, COMPETITORS, PERSONAS};

use crate::llm::Message;

const SUMMARY_CHARS: usize = 280;

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}…", cut.trim_end())
}

fn item_line(i: usize, item: &ContentItem) -> String {
    let mut tags: Vec<&str> = item.all_tags().map(String::as_str).collect();
    tags.truncate(8);
    format!(
        "{}. \"{}\" [{}; state: {}] tags: {} :: {}",
        i + 1,
        item.title,
        item.content_type,
        item.state.as_deref().unwrap_or("none"),
        tags.join(", "),
        truncate(item.best_summary().unwrap_or(""), SUMMARY_CHARS)
    )
}

fn vocabulary() -> String {
    let competitors: Vec<&str> = COMPETITORS.iter().map(|(c, _)| *c).collect();
    let personas: Vec<&str> = PERSONAS.iter().map(|(p, _)| *p).collect();
    format!(
        "Content types: {}.\nCompetitors: {}.\nPersonas: {}.",
        CONTENT_TYPES.join(", "),
        competitors.join(", "),
        personas.join(", ")
    )
}

pub fn parse_query(query: &str, selected: &SelectedFilters, terms: Option<&TerminologyIndex>) -> Vec<Message> {
    let mut system = String::from(
        "You turn marketing-content search requests into filters. Reply with one JSON object:\n\
         {\"types\": [...], \"states\": [\"TX\", ...], \"searchTerms\": [...], \
         \"primaryIntent\": \"state|competitor|persona|topic|general\", \
         \"competitors\": [...], \"personas\": [...]}\n\
         Use two-letter US state abbreviations. Only use content types from the list. \
         Do not treat the words \"in\" or \"or\" as states unless clearly meant.\n",
    );
    system.push_str(&vocabulary());
    if let Some(index) = terms.filter(|t| !t.is_empty()) {
        if let Ok(json) = serde_json::to_string(&index.grouped()) {
            system.push_str("\nKnown terminology (user term → canonical): ");
            system.push_str(&json);
        }
    }

    let mut user = format!("Query: {}", query);
    if !selected.types.is_empty() || !selected.states.is_empty() {
        user.push_str(&format!(
            "\nAlready selected: types [{}], states [{}]",
            selected.types.join(", "),
            selected.states.join(", ")
        ));
    }
    vec![Message::system(system), Message::user(user)]
}

pub fn rank_results(query: &str, items: &[ContentItem]) -> Vec<Message> {
    let system = "You rank marketing content for a sales rep. Reply with one JSON object:\n\
         {\"rankedTitles\": [exact titles, best first], \
         \"primary\": [{\"title\": ..., \"reason\": ...}] (up to 5), \
         \"additional\": [{\"title\": ..., \"reason\": ...}] (up to 5), \
         \"summary\": one or two sentences}\n\
         Copy titles exactly as given. Never invent titles.";
    let listing: Vec<String> = items.iter().enumerate().map(|(i, it)| item_line(i, it)).collect();
    let user = format!("Request: {}\n\nCandidates:\n{}", query, listing.join("\n"));
    vec![Message::system(system), Message::user(user)]
}

pub fn chat_turn(
    message: &str,
    history: &[ChatMessage],
    results: &[ContentItem],
    context: &[AiContextEntry],
) -> Vec<Message> {
    let mut system = String::from(
        "You are a content assistant helping the sales and marketing team find the right \
         assets. Recommend only items from the provided results. Reply with one JSON object:\n\
         {\"answer\": conversational reply, \"recommendations\": [{\"title\": exact title, \"reason\": ...}]}",
    );
    if !context.is_empty() {
        system.push_str("\n\nBackground knowledge:");
        for entry in context {
            system.push_str(&format!(
                "\n- {} ({}): {}",
                entry.title,
                entry.category,
                truncate(entry.summary.as_deref().unwrap_or(&entry.content), 600)
            ));
        }
    }

    let mut messages = vec![Message::system(system)];
    for m in history {
        messages.push(match m.role {
            ChatRole::User => Message::user(m.content.clone()),
            ChatRole::Assistant => Message::assistant(m.content.clone()),
        });
    }

    let listing: Vec<String> = results.iter().enumerate().map(|(i, it)| item_line(i, it)).collect();
    let results_block = if listing.is_empty() {
        "No matching content was found.".to_string()
    } else {
        listing.join("\n")
    };
    messages.push(Message::user(format!(
        "{}\n\nSearch results:\n{}",
        message, results_block
    )));
    messages
}

pub fn suggest_terminology(logs: &[PromptLog], existing: &TerminologyIndex) -> Vec<Message> {
    let mut system = String::from(
        "You maintain a synonym table for a marketing-content search tool. From the user \
         queries below, propose new mappings from words users type to canonical terms. \
         Reply with one JSON object:\n\
         {\"suggestions\": [{\"mapType\": \"content_type|state|topic|competitor|persona|feature\", \
         \"userTerm\": ..., \"canonicalTerm\": ..., \"confidence\": 0.0-1.0, \"reason\": ...}]}\n\
         Do not repeat existing mappings.\n",
    );
    system.push_str(&vocabulary());
    if let Ok(json) = serde_json::to_string(&existing.grouped()) {
        system.push_str("\nExisting mappings: ");
        system.push_str(&json);
    }
    vec![Message::system(system), Message::user(log_listing(logs))]
}

pub fn analyze_logs(logs: &[PromptLog]) -> Vec<Message> {
    let mut system = String::from(
        "You review search logs for a marketing-content tool. Identify queries that went \
         badly and why. Reply with one JSON object:\n\
         {\"issues\": [{\"query\": ..., \"problem\": ..., \"severity\": \"low|medium|high\"}], \
         \"suggestedMappings\": [{\"mapType\": ..., \"userTerm\": ..., \"canonicalTerm\": ..., \"confidence\": 0.0-1.0}], \
         \"patternInsights\": [short observations]}\n",
    );
    system.push_str(&vocabulary());
    vec![Message::system(system), Message::user(log_listing(logs))]
}

pub fn weekly_summary(stats_json: &str, metrics_json: &str) -> Vec<Message> {
    let system = "You write a short weekly status note (3 to 5 sentences, plain prose, no JSON) \
         for the marketing team about their content library and how people searched it.";
    let user = format!("Content stats:\n{}\n\nSearch metrics:\n{}", stats_json, metrics_json);
    vec![Message::system(system), Message::user(user)]
}

pub fn enrich_item(item: &ContentItem) -> Vec<Message> {
    let mut system = String::from(
        "You write search metadata for one marketing-content item. Reply with one JSON object:\n\
         {\"enhanced_summary\": \"2 to 3 sentences on what the item covers\", \
         \"auto_tags\": [3 to 8 short tags]}\n\
         Only tag competitors, personas and topics the item actually covers.\n",
    );
    system.push_str(&vocabulary());
    let tags: Vec<&str> = item.tags.iter().map(String::as_str).collect();
    let user = format!(
        "Title: {}\nType: {}\nState: {}\nTags: {}\nSummary: {}",
        item.title,
        item.content_type,
        item.state.as_deref().unwrap_or("National/Unknown"),
        if tags.is_empty() { "none".to_string() } else { tags.join(", ") },
        item.summary.as_deref().unwrap_or("none")
    );
    vec![Message::system(system), Message::user(user)]
}

fn log_listing(logs: &[PromptLog]) -> String {
    logs.iter()
        .map(|l| {
            format!(
                "- \"{}\" (intent: {}, states: [{}], recommendations: {})",
                l.query,
                l.query_type.as_str(),
                l.detected_states.join(", "),
                l.recommendations_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd…");
    }

    #[test]
    fn test_chat_turn_includes_history_and_results() {
        let history = vec![ChatMessage {
            role: ChatRole::User,
            content: "earlier".to_string(),
            recommendations: Vec::new(),
            timestamp: Utc::now(),
        }];
        let msgs = chat_turn("now", &history, &[], &[]);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].content, "earlier");
        assert!(msgs[2].content.contains("No matching content"));
    }
}
