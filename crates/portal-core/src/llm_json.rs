//! Extraction of JSON objects embedded in LLM replies.
//!
//! Chat models wrap JSON in prose or Markdown fences. The extractor tries
//! a fenced block first and then the first balanced `{ … }` span.

use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::de::DeserializeOwned;

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("fence regex is valid")
    })
}

/// First balanced `{…}` span, ignoring braces inside string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pull the first JSON object out of a model reply.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    if let Some(caps) = fence_regex().captures(text) {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&caps[1]) {
            if v.is_object() {
                return Some(v);
            }
        }
    }
    let candidate = balanced_object(text)?;
    serde_json::from_str::<serde_json::Value>(candidate)
        .ok()
        .filter(|v| v.is_object())
}

/// Extract and deserialize the embedded JSON object.
pub fn parse_embedded<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value = extract_json_object(text)
        .ok_or_else(|| anyhow!("no JSON object found in model reply"))?;
    Ok(serde_json::from_value(value)?)
}
