//! CMS webhook handling.
//!
//! Accepts `collection_item_created`, `collection_item_changed` and
//! `collection_item_deleted` events. Create and change events upsert a
//! content row, matched in order by CMS id, normalized link, then
//! case-insensitive title. Delete removes rows by CMS id.
//!
//! When a secret is configured, the request must carry
//! `x-webflow-timestamp` and `x-webflow-signature`, the latter being the
//! hex HMAC-SHA256 of `"{timestamp}:{body}"`.

use anyhow::{bail, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::info;

use portal_core::dedup::normalize_url;
use portal_core::models::NewContent;
use portal_core::store::Store;
use portal_core::vocab;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webflow-signature";
pub const TIMESTAMP_HEADER: &str = "x-webflow-timestamp";

/// Type used when the payload carries none.
const DEFAULT_TYPE: &str = "Blog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CollectionItemCreated,
    CollectionItemChanged,
    CollectionItemDeleted,
}

/// Tags sent either as a list or as comma-separated text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagField {
    List(Vec<String>),
    Text(String),
}

impl TagField {
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            TagField::List(v) => v,
            TagField::Text(s) => s.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "type", alias = "resource-type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, alias = "meta-description")]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Option<TagField>,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemPayload {
    pub id: String,
    #[serde(default, rename = "fieldData")]
    pub field_data: FieldData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "triggerType")]
    pub trigger_type: EventKind,
    pub payload: ItemPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Created { id: String },
    Updated { id: String },
    Deleted { count: u64 },
}

/// Check the signature headers against `secret`. Returns false on any
/// missing header, malformed hex or mismatch.
pub fn verify_signature(secret: &str, timestamp: Option<&str>, signature: Option<&str>, body: &[u8]) -> bool {
    let (Some(ts), Some(sig)) = (timestamp, signature) else {
        return false;
    };
    let Ok(expected) = hex::decode(sig.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(ts.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Hex signature for `"{timestamp}:{body}"`; used by senders and tests.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("HMAC init failed: {}", e))?;
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Map CMS fields onto content values.
pub fn to_new_content(item: &ItemPayload, link_base: &str) -> Result<NewContent> {
    let f = &item.field_data;
    let title = f.name.as_deref().map(str::trim).unwrap_or("");
    if title.is_empty() {
        bail!("invalid payload: fieldData.name is required");
    }

    let live_link = match (f.url.as_deref(), f.slug.as_deref()) {
        (Some(url), _) if !url.trim().is_empty() => Some(url.trim().to_string()),
        (_, Some(slug)) if !slug.trim().is_empty() => Some(format!(
            "{}/{}",
            link_base.trim_end_matches('/'),
            slug.trim().trim_start_matches('/')
        )),
        _ => None,
    };

    let content_type = f
        .content_type
        .as_deref()
        .map(|t| {
            vocab::standardize_type(t)
                .or_else(|| vocab::canonical_type(t))
                .map(str::to_string)
                .unwrap_or_else(|| t.trim().to_string())
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TYPE.to_string());

    let state = f.state.as_deref().and_then(|s| {
        let s = s.trim();
        if s.is_empty() {
            None
        } else {
            Some(
                vocab::state_abbreviation(s)
                    .map(str::to_string)
                    .unwrap_or_else(|| s.to_string()),
            )
        }
    });

    Ok(NewContent {
        title: title.to_string(),
        content_type,
        state,
        summary: f.summary.clone().filter(|s| !s.trim().is_empty()),
        tags: f.tags.clone().map(TagField::into_vec).unwrap_or_default(),
        platform: f.platform.clone(),
        live_link,
        external_id: Some(item.id.clone()),
        ..Default::default()
    })
}

/// Apply one event to the store.
pub async fn handle_event(store: &dyn Store, event: &WebhookEvent, link_base: &str) -> Result<WebhookOutcome> {
    let item = &event.payload;
    if item.id.trim().is_empty() {
        bail!("invalid payload: payload.id is required");
    }

    if event.trigger_type == EventKind::CollectionItemDeleted {
        let count = store.delete_content_by_external_id(&item.id).await?;
        info!(external_id = %item.id, count, "webhook delete");
        return Ok(WebhookOutcome::Deleted { count });
    }

    let content = to_new_content(item, link_base)?;
    let link_key = content.live_link.as_deref().map(normalize_url);
    let existing = store
        .find_existing_content(Some(&item.id), link_key.as_deref(), Some(&content.title))
        .await?;

    match existing {
        Some(row) => {
            // Keep enrichment the CMS does not send.
            let merged = NewContent {
                enhanced_summary: row.enhanced_summary.clone(),
                auto_tags: row.auto_tags.clone(),
                ungated_link: row.ungated_link.clone(),
                summary: content.summary.clone().or(row.summary.clone()),
                state: content.state.clone().or(row.state.clone()),
                platform: content.platform.clone().or(row.platform.clone()),
                ..content
            };
            store.update_content(&row.id, &merged).await?;
            info!(id = %row.id, external_id = %item.id, "webhook update");
            Ok(WebhookOutcome::Updated { id: row.id })
        }
        None => {
            let id = store.insert_content(&content).await?;
            info!(id = %id, external_id = %item.id, "webhook insert");
            Ok(WebhookOutcome::Created { id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::store::memory::InMemoryStore;

    const BASE: &str = "https://www.example.com/resources";

    fn event(kind: &str, id: &str, fields: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(serde_json::json!({
            "triggerType": kind,
            "payload": {"id": id, "fieldData": fields}
        }))
        .unwrap()
    }

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"triggerType":"collection_item_deleted"}"#;
        let sig = sign("s3cret", "1700000000", body).unwrap();
        assert!(verify_signature("s3cret", Some("1700000000"), Some(&sig), body));
        assert!(!verify_signature("other", Some("1700000000"), Some(&sig), body));
        assert!(!verify_signature("s3cret", Some("1700000001"), Some(&sig), body));
        assert!(!verify_signature("s3cret", None, Some(&sig), body));
        assert!(!verify_signature("s3cret", Some("1"), Some("zz-not-hex"), body));
    }

    #[test]
    fn test_field_mapping() {
        let ev = event(
            "collection_item_created",
            "cms-1",
            serde_json::json!({"name": " FAFSA Guide ", "slug": "fafsa-guide", "type": "e-book", "state": "Texas", "tags": "fafsa, counselors"}),
        );
        let c = to_new_content(&ev.payload, BASE).unwrap();
        assert_eq!(c.title, "FAFSA Guide");
        assert_eq!(c.live_link.as_deref(), Some("https://www.example.com/resources/fafsa-guide"));
        assert_eq!(c.content_type, "Ebook");
        assert_eq!(c.state.as_deref(), Some("TX"));
        assert_eq!(c.tags, vec!["fafsa", "counselors"]);
        assert_eq!(c.external_id.as_deref(), Some("cms-1"));
    }

    #[tokio::test]
    async fn test_existing_url_updates_instead_of_inserting() {
        let store = InMemoryStore::new();
        let existing = store
            .insert_content(&NewContent {
                title: "Old Title".into(),
                content_type: "Blog".into(),
                live_link: Some("http://example.com/resources/fafsa-guide/".into()),
                enhanced_summary: Some("enriched".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let ev = event(
            "collection_item_changed",
            "cms-9",
            serde_json::json!({"name": "New Title", "slug": "fafsa-guide"}),
        );
        let outcome = handle_event(&store, &ev, BASE).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Updated { id: existing.clone() });

        let rows = store.list_content().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "New Title");
        assert_eq!(rows[0].external_id.as_deref(), Some("cms-9"));
        assert_eq!(rows[0].enhanced_summary.as_deref(), Some("enriched"));
    }

    #[tokio::test]
    async fn test_create_then_delete_by_external_id() {
        let store = InMemoryStore::new();
        let created = handle_event(
            &store,
            &event("collection_item_created", "cms-2", serde_json::json!({"name": "Story"})),
            BASE,
        )
        .await
        .unwrap();
        assert!(matches!(created, WebhookOutcome::Created { .. }));

        let deleted = handle_event(
            &store,
            &event("collection_item_deleted", "cms-2", serde_json::json!({})),
            BASE,
        )
        .await
        .unwrap();
        assert_eq!(deleted, WebhookOutcome::Deleted { count: 1 });
        assert!(store.list_content().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_name_rejected() {
        let store = InMemoryStore::new();
        let ev = event("collection_item_created", "cms-3", serde_json::json!({"slug": "x"}));
        assert!(handle_event(&store, &ev, BASE).await.is_err());
    }
}
