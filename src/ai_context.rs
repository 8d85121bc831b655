//! `portal context`: manage the knowledge entries fed to the chat prompt.
//!
//! Entries in the `state_context` and `competitor_intel` categories are
//! matched by subcategory against detected states and competitors.

use anyhow::{bail, Result};

use portal_core::models::NewContextEntry;
use portal_core::store::Store;

pub async fn run_list(store: &dyn Store, category: Option<&str>, json: bool) -> Result<()> {
    let entries = store.list_context(category).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No context entries.");
        return Ok(());
    }
    for e in &entries {
        println!(
            "{}  [{}{}] {}",
            e.id,
            e.category,
            e.subcategory
                .as_deref()
                .map(|s| format!("/{}", s))
                .unwrap_or_default(),
            e.title
        );
        if let Some(summary) = &e.summary {
            println!("    {}", summary);
        }
    }
    Ok(())
}

pub async fn add(store: &dyn Store, entry: NewContextEntry) -> Result<String> {
    if entry.category.trim().is_empty() {
        bail!("category must not be empty");
    }
    if entry.title.trim().is_empty() || entry.content.trim().is_empty() {
        bail!("title and content must not be empty");
    }
    store.insert_context(&entry).await
}
