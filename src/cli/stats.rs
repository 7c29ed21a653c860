use anyhow::Result;

use matrix::config::MatrixConfig;

/// Display scrapbook counts in the terminal.
pub fn stats(config: &MatrixConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = matrix::db::open_database(&db_path)?;

    let stats = matrix::scrapbook::stats::scrapbook_stats(&conn)?;

    println!("Scrapbook Statistics");
    println!("{}", "=".repeat(40));
    println!("  Heap:                {}", stats.heap);
    println!("  Selected:            {}", stats.selected);
    println!("  Trash:               {}", stats.trash);
    println!("  Stories:             {}", stats.stories);
    println!("  Moments in stories:  {}", stats.story_moments);
    println!("  Overlays:            {}", stats.overlays);
    println!("  Agents:              {}", stats.agents);

    if !stats.stale_counts.is_empty() {
        println!();
        println!("Stories with a stale count:");
        for id in &stats.stale_counts {
            println!("  {id}");
        }
    }

    Ok(())
}
