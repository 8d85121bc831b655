//! Conversation transcripts and assistant reply parsing.

use chrono::Utc;
use serde::Deserialize;

use crate::llm_json::extract_json_object;
use crate::models::{ChatMessage, ChatRole, ParsedQuery, Recommendation};
use crate::rerank::RecommendationRef;

/// Messages of prior context sent with each chat turn.
pub const HISTORY_WINDOW: usize = 10;

/// Ordered transcript of one chat session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    /// States and competitors of the latest turn that named any.
    focus: ParsedQuery,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: ChatRole, content: impl Into<String>, recommendations: Vec<Recommendation>) {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
            recommendations,
            timestamp: Utc::now(),
        });
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.focus = ParsedQuery::default();
    }

    pub fn focus(&self) -> &ParsedQuery {
        &self.focus
    }

    /// Remember the states and competitors of `parsed` for follow-ups.
    pub fn set_focus(&mut self, parsed: &ParsedQuery) {
        if !parsed.states.is_empty() {
            self.focus.states = parsed.states.clone();
        }
        if !parsed.competitors.is_empty() {
            self.focus.competitors = parsed.competitors.clone();
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The last [`HISTORY_WINDOW`] messages, oldest first.
    pub fn history_window(&self) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(HISTORY_WINDOW);
        &self.messages[start..]
    }
}

#[derive(Debug, Deserialize)]
struct ReplyShape {
    #[serde(default, alias = "response", alias = "message")]
    answer: Option<String>,
    #[serde(default)]
    recommendations: Vec<RecommendationRef>,
}

/// A chat reply split into prose and recommended titles.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub answer: String,
    /// `(title, reason)` pairs, in the model's order.
    pub recommended: Vec<(String, Option<String>)>,
    /// False when the reply was not valid JSON and was used verbatim.
    pub structured: bool,
}

/// Parse a model reply of the form `{"answer": …, "recommendations": […]}`.
///
/// Anything else is treated as plain prose with no recommendations.
pub fn parse_assistant_reply(text: &str) -> AssistantReply {
    let parsed = extract_json_object(text)
        .and_then(|v| serde_json::from_value::<ReplyShape>(v).ok())
        .and_then(|shape| shape.answer.map(|a| (a, shape.recommendations)));

    match parsed {
        Some((answer, recs)) => AssistantReply {
            answer,
            recommended: recs
                .iter()
                .map(|r| (r.title().to_string(), r.reason().map(str::to_string)))
                .collect(),
            structured: true,
        },
        None => AssistantReply {
            answer: text.trim().to_string(),
            recommended: Vec::new(),
            structured: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_window_keeps_last_ten() {
        let mut conv = Conversation::new();
        for i in 0..14 {
            conv.push(ChatRole::User, format!("m{}", i), Vec::new());
        }
        let window = conv.history_window();
        assert_eq!(window.len(), HISTORY_WINDOW);
        assert_eq!(window[0].content, "m4");
        assert_eq!(window[9].content, "m13");
    }

    #[test]
    fn test_clear_empties_transcript() {
        let mut conv = Conversation::new();
        conv.push(ChatRole::User, "hi", Vec::new());
        conv.set_focus(&ParsedQuery {
            states: vec!["TX".to_string()],
            ..Default::default()
        });
        conv.clear();
        assert!(conv.is_empty());
        assert!(conv.history_window().is_empty());
        assert!(conv.focus().states.is_empty());
    }

    #[test]
    fn test_focus_keeps_last_named_values() {
        let mut conv = Conversation::new();
        conv.set_focus(&ParsedQuery {
            states: vec!["TX".to_string()],
            competitors: vec!["naviance".to_string()],
            ..Default::default()
        });
        conv.set_focus(&ParsedQuery {
            types: vec!["Video".to_string()],
            ..Default::default()
        });
        assert_eq!(conv.focus().states, vec!["TX"]);
        assert_eq!(conv.focus().competitors, vec!["naviance"]);
        assert!(conv.focus().types.is_empty());
    }

    #[test]
    fn test_structured_reply() {
        let reply = r#"{"answer": "Try these.", "recommendations": [{"title": "TX Story", "reason": "Texas"}, "Other"]}"#;
        let parsed = parse_assistant_reply(reply);
        assert!(parsed.structured);
        assert_eq!(parsed.answer, "Try these.");
        assert_eq!(
            parsed.recommended,
            vec![
                ("TX Story".to_string(), Some("Texas".to_string())),
                ("Other".to_string(), None)
            ]
        );
    }

    #[test]
    fn test_plain_reply_falls_back() {
        let parsed = parse_assistant_reply("  Here is what I found.  ");
        assert!(!parsed.structured);
        assert_eq!(parsed.answer, "Here is what I found.");
        assert!(parsed.recommended.is_empty());
    }
}
