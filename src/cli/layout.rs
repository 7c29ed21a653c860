use anyhow::{Context, Result};
use std::path::Path;

use matrix::config::MatrixConfig;
use matrix::layout::{self, LayoutItem, LayoutOptions};

/// Print row heights and item widths for a container `width` pixels wide.
pub fn layout(config: &MatrixConfig, file: Option<&Path>, width: f64) -> Result<()> {
    anyhow::ensure!(width.is_finite() && width > 0.0, "width must be positive");

    let items: Vec<LayoutItem> = match file {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&json).context("expected a JSON array of {id, aspect}")?
        }
        None => {
            let conn = matrix::db::open_database(config.resolved_db_path())?;
            matrix::scrapbook::heap::list_heap(&conn)?
                .into_iter()
                .map(|m| LayoutItem::new(m.id, None))
                .collect()
        }
    };

    let result = layout::pack_rows(&items, width, LayoutOptions::from(&config.layout));

    println!("Layout for {} items at {width}px", items.len());
    println!("{}", "=".repeat(40));
    for row in &result.rows {
        let flag = if row.clamped {
            " (clamped)"
        } else if row.filled {
            ""
        } else {
            " (last)"
        };
        println!("Row {:>3}  height {:>7.1}{flag}", row.index, row.height);
        for item in result.items.iter().filter(|p| p.row == row.index) {
            println!("    {:<40} {:>7.1}px  {:>5.1}%", item.id, item.width, item.width_pct);
        }
    }

    Ok(())
}
