//! CLI `reset` command: clear the scrapbook after user confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use matrix::config::MatrixConfig;

/// Delete every moment, story, and overlay. Agents are kept.
pub fn reset(config: &MatrixConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    println!("WARNING: This will permanently delete the heap, trash, all stories, and overlays.");
    println!("Database: {}", db_path.display());
    print!("\nType YES to confirm: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim() != "YES" {
        bail!("reset cancelled");
    }

    let conn = matrix::db::open_database(&db_path)?;
    let removed = matrix::store::clear_scrapbook(&conn)?;

    println!("Removed {removed} keys. Scrapbook reset complete.");
    Ok(())
}
