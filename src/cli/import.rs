use anyhow::{Context, Result};
use std::path::Path;

use matrix::config::MatrixConfig;

/// Replace the scrapbook with the backup in `file`.
///
/// Agents are kept. Nothing is written if the file cannot be read as a backup.
pub fn import(config: &MatrixConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;

    let db_path = config.resolved_db_path();
    let mut conn = matrix::db::open_database(&db_path)?;

    let report = matrix::backup::import_backup(&mut conn, &json)?;

    println!("Import complete:");
    println!("  Heap:            {}", report.heap);
    println!("  Trash:           {}", report.trash);
    println!("  Stories:         {}", report.stories);
    println!("  Story moments:   {}", report.story_moments);
    println!("  Overlays:        {}", report.overlays);

    Ok(())
}
