//! Library maintenance: duplicate scan and type standardization.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::info;

use portal_core::dedup::{find_duplicates, DuplicatePair, DuplicateReason};
use portal_core::store::Store;
use portal_core::vocab::standardize_type;

/// A variant type value and what it is rewritten to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeChange {
    pub from: String,
    pub to: String,
    /// Rows affected; in a dry run, rows that would be.
    pub rows: u64,
}

pub async fn duplicates(store: &dyn Store, threshold: f64) -> Result<Vec<DuplicatePair>> {
    if !(0.0..=1.0).contains(&threshold) {
        bail!("threshold must be in [0.0, 1.0]");
    }
    let items = store.list_content().await?;
    Ok(find_duplicates(&items, threshold))
}

/// Rewrite known variant spellings of the type column.
pub async fn standardize_types(store: &dyn Store, dry_run: bool) -> Result<Vec<TypeChange>> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for item in store.list_content().await? {
        *counts.entry(item.content_type).or_insert(0) += 1;
    }

    let mut changes = Vec::new();
    for (from, count) in counts {
        let Some(to) = standardize_type(&from) else {
            continue;
        };
        if to == from {
            continue;
        }
        let rows = if dry_run {
            count
        } else {
            store.rename_content_type(&from, to).await?
        };
        info!(from = %from, to, rows, dry_run, "standardize type");
        changes.push(TypeChange {
            from,
            to: to.to_string(),
            rows,
        });
    }
    Ok(changes)
}

pub async fn run_dedup(store: &dyn Store, threshold: f64, json: bool) -> Result<()> {
    let pairs = duplicates(store, threshold).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&pairs)?);
        return Ok(());
    }
    if pairs.is_empty() {
        println!("No duplicates found.");
        return Ok(());
    }
    for p in &pairs {
        let why = match p.reason {
            DuplicateReason::SameUrl => "same link".to_string(),
            DuplicateReason::SimilarTitle => format!("title similarity {:.2}", p.similarity),
        };
        println!("{}  \"{}\"", p.first_id, p.first_title);
        println!("{}  \"{}\"", p.second_id, p.second_title);
        println!("    ({})\n", why);
    }
    println!("{} possible duplicate pairs", pairs.len());
    Ok(())
}

pub async fn run_standardize(store: &dyn Store, dry_run: bool) -> Result<()> {
    let changes = standardize_types(store, dry_run).await?;
    if changes.is_empty() {
        println!("All content types are already standard.");
        return Ok(());
    }
    for c in &changes {
        println!("  {:<20} -> {:<16} {} rows", c.from, c.to, c.rows);
    }
    if dry_run {
        println!("\nDry run: nothing was changed.");
    }
    Ok(())
}
