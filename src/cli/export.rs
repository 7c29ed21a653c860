use anyhow::Result;

use matrix::backup;
use matrix::config::MatrixConfig;

/// Write the backup (or its `src`-free preview) as JSON to stdout.
pub fn export(config: &MatrixConfig, preview: bool) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = matrix::db::open_database(&db_path)?;

    if preview {
        let value = backup::preview(&conn)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        eprintln!("Preview written (src fields removed).");
        return Ok(());
    }

    let snapshot = backup::export_snapshot(&conn)?;
    println!("{}", backup::render_backup(&snapshot)?);

    eprintln!(
        "Exported {} heap, {} trash, {} stories, {} overlays.",
        snapshot.heap.len(),
        snapshot.trash.len(),
        snapshot.stories.len(),
        snapshot.overlays.len()
    );

    Ok(())
}
