//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use matrix::config::MatrixConfig;
use matrix::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &MatrixConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `matrix serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;
    let stats = matrix::scrapbook::stats::scrapbook_stats(&conn)
        .context("failed to read scrapbook")?;

    println!("Matrix Health Report");
    println!("====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("Roles directory:   {}", config.resolved_roles_dir().display());
    println!();
    println!("Keys:");
    println!("  Total:           {}", report.key_count);
    println!("  Story items:     {}", report.story_key_count);
    println!();
    if stats.stale_counts.is_empty() {
        println!("Story counts:      OK");
    } else {
        println!(
            "Story counts:      {} stale ({})",
            stats.stale_counts.len(),
            stats.stale_counts.join(", ")
        );
    }
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }

    if !report.integrity_ok {
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a copy: cp backup.db ~/.matrix/matrix.db");
        println!("  2. Or export from a good copy and reimport:");
        println!("     matrix export > backup.json");
        println!("     matrix import backup.json");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
