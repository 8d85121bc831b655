//! CSV export of content rows.
//!
//! With a query, exports the results of a full search in ranked order;
//! without one, exports every row matching the type and state filters.

use anyhow::{Context, Result};
use std::path::Path;

use portal_core::export::to_csv;
use portal_core::models::{ContentItem, ContentQuery};

use crate::portal::Portal;
use crate::search::{search, SearchRequest};

/// Upper bound on rows exported without a query.
const EXPORT_LIMIT: usize = 10_000;

/// Rows to export for the given filters.
pub async fn collect_rows(
    portal: &Portal,
    query: Option<&str>,
    types: &[String],
    states: &[String],
) -> Result<Vec<ContentItem>> {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => {
            let req = SearchRequest {
                query: q.to_string(),
                types: types.to_vec(),
                states: states.to_vec(),
                ..Default::default()
            };
            Ok(search(portal, &req).await?.results)
        }
        None => {
            let filter = ContentQuery {
                types: types.to_vec(),
                states: states.to_vec(),
                limit: EXPORT_LIMIT,
                ..Default::default()
            };
            portal.store.query_content(&filter).await
        }
    }
}

/// `portal export`: write CSV to `output`, or stdout when `None`.
pub async fn run_export(
    portal: &Portal,
    query: Option<&str>,
    types: &[String],
    states: &[String],
    output: Option<&Path>,
) -> Result<()> {
    let rows = collect_rows(portal, query, types, states).await?;
    let csv = to_csv(&rows);

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &csv)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} rows to {}", rows.len(), path.display());
        }
        None => println!("{}", csv),
    }
    Ok(())
}
