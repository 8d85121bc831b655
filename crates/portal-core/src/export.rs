//! CSV rendering of content rows.
//!
//! Every field is quoted and embedded quotes are doubled. Rows are joined
//! with `\n` and there is no trailing newline.

use crate::models::ContentItem;

pub const CSV_HEADER: [&str; 9] = [
    "Title",
    "Type",
    "State",
    "Platform",
    "Summary",
    "Tags",
    "Live Link",
    "Ungated Link",
    "Last Updated",
];

/// Quote one field.
pub fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn row(item: &ContentItem) -> String {
    let tags = item.tags.join(", ");
    let updated = item.last_updated.format("%Y-%m-%d").to_string();
    [
        item.title.as_str(),
        item.content_type.as_str(),
        item.state.as_deref().unwrap_or(""),
        item.platform.as_deref().unwrap_or(""),
        item.best_summary().unwrap_or(""),
        tags.as_str(),
        item.live_link.as_deref().unwrap_or(""),
        item.ungated_link.as_deref().unwrap_or(""),
        updated.as_str(),
    ]
    .iter()
    .map(|f| csv_field(f))
    .collect::<Vec<_>>()
    .join(",")
}

/// Render the header and one line per item.
pub fn to_csv(items: &[ContentItem]) -> String {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(CSV_HEADER.join(","));
    lines.extend(items.iter().map(row));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item() -> ContentItem {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        ContentItem {
            id: "1".to_string(),
            title: "The \"Best\" Guide".to_string(),
            content_type: "Ebook".to_string(),
            state: Some("TX".to_string()),
            summary: Some("Line one, line two".to_string()),
            enhanced_summary: None,
            tags: vec!["fafsa".to_string(), "counselors".to_string()],
            auto_tags: vec!["ignored".to_string()],
            platform: None,
            live_link: Some("https://example.com/guide".to_string()),
            ungated_link: None,
            external_id: None,
            created_at: ts,
            last_updated: ts,
        }
    }

    #[test]
    fn test_header_only_for_empty_list() {
        assert_eq!(
            to_csv(&[]),
            "Title,Type,State,Platform,Summary,Tags,Live Link,Ungated Link,Last Updated"
        );
    }

    #[test]
    fn test_row_quoting() {
        let csv = to_csv(&[item()]);
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            r#""The ""Best"" Guide","Ebook","TX","","Line one, line two","fafsa, counselors","https://example.com/guide","","2024-03-05""#
        );
    }
}
