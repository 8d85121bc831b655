//! Content library overview for `portal stats`.

use anyhow::Result;
use chrono::{Duration, Utc};

use crate::portal::Portal;

pub async fn run_stats(portal: &Portal, days: i64, json: bool) -> Result<()> {
    let stats = portal
        .store
        .content_stats(Utc::now() - Duration::days(days))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&portal.config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Content Portal Library Stats");
    println!("============================");
    println!();
    println!("  Database:    {}", portal.config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Items:       {}", stats.total);
    println!("  New ({}d):    {}", days, stats.recent);

    if !stats.by_type.is_empty() {
        println!();
        println!("  By type:");
        let mut types: Vec<_> = stats.by_type.iter().collect();
        types.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (t, n) in types {
            println!("    {:<22} {:>6}", t, n);
        }
    }
    if !stats.by_state.is_empty() {
        println!();
        println!("  By state:");
        let mut states: Vec<_> = stats.by_state.iter().collect();
        states.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (s, n) in states {
            println!("    {:<22} {:>6}", s, n);
        }
    }
    println!();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
