//! Justified row packing for the moment grid.
//!
//! Items are laid out left to right in rows of near-equal height, the way
//! photo sites tile images of mixed shapes. Packing is greedy: items join the
//! current row while the row, drawn at the target height with gaps, still fits
//! the container. When the next item would overflow, the row is closed either
//! just before or just after it, whichever leaves the row height closer to the
//! target, and its height is rescaled so the row spans the container exactly.
//! The trailing row is left at the target height.
//!
//! An item that is wider than the container on its own sits alone in its row,
//! shrunk to fit but never below half the target height; past that point it is
//! capped at the container width and cropped by the renderer.
//!
//! Aspect ratios are width / height. Unmeasured items count as square until a
//! measurement lands in [`AspectCache`]; the caller then lays out again.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::LayoutConfig;

/// Fallback for items whose image has not loaded yet.
pub const DEFAULT_ASPECT: f64 = 1.0;

/// Lower bound on row height as a fraction of the target height.
pub const MIN_HEIGHT_FACTOR: f64 = 0.5;

/// Upper bound on a scaled row. Only reached by a short row stuck in front of
/// an item too wide to join it; such a row stops short of the container.
pub const MAX_HEIGHT_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    pub target_row_height: f64,
    pub gap: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            target_row_height: 220.0,
            gap: 16.0,
        }
    }
}

impl From<&LayoutConfig> for LayoutOptions {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            target_row_height: config.target_row_height,
            gap: config.gap,
        }
    }
}

/// One item to place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutItem {
    pub id: String,
    /// Width / height. `None` until measured.
    #[serde(default)]
    pub aspect: Option<f64>,
}

impl LayoutItem {
    pub fn new(id: impl Into<String>, aspect: Option<f64>) -> Self {
        Self {
            id: id.into(),
            aspect,
        }
    }
}

/// Placement of a single item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedItem {
    pub id: String,
    pub row: usize,
    /// Share of the container width, in percent.
    pub width_pct: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRow {
    pub index: usize,
    pub height: f64,
    pub len: usize,
    /// Scaled so its widths and gaps span the container.
    pub filled: bool,
    /// Height hit a bound: below, the item is cropped; above, the row stops
    /// short of the container.
    pub clamped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub container_width: f64,
    pub rows: Vec<LayoutRow>,
    pub items: Vec<PlacedItem>,
}

fn sanitize_aspect(aspect: Option<f64>) -> f64 {
    match aspect {
        Some(a) if a.is_finite() && a > 0.0 => a,
        _ => DEFAULT_ASPECT,
    }
}

/// Pack `items` into justified rows for a container `container_width` pixels wide.
pub fn pack_rows(items: &[LayoutItem], container_width: f64, options: LayoutOptions) -> Layout {
    let mut layout = Layout {
        container_width,
        rows: Vec::new(),
        items: Vec::with_capacity(items.len()),
    };
    if items.is_empty() || !(container_width > 0.0) {
        return layout;
    }

    let target = options.target_row_height;
    let gap = options.gap.max(0.0);

    let mut row: Vec<(&str, f64)> = Vec::new();
    let mut aspect_sum = 0.0;

    for item in items {
        let aspect = sanitize_aspect(item.aspect);
        if !row.is_empty() {
            let width_with_next = (aspect_sum + aspect) * target + gap * row.len() as f64;
            if width_with_next > container_width {
                if takes_overflowing_item(&row, aspect_sum, aspect, container_width, options) {
                    row.push((item.id.as_str(), aspect));
                    aspect_sum += aspect;
                    close_row(&mut layout, &row, aspect_sum, options, true);
                    row.clear();
                    aspect_sum = 0.0;
                    continue;
                }
                close_row(&mut layout, &row, aspect_sum, options, true);
                row.clear();
                aspect_sum = 0.0;
            }
        }
        row.push((item.id.as_str(), aspect));
        aspect_sum += aspect;
    }
    close_row(&mut layout, &row, aspect_sum, options, false);

    layout
}

/// Whether the item that overflowed should close out the current row.
///
/// Without it the row scales up to at least the target height; with it the
/// row scales down below the target. The row takes whichever height lands
/// closer to the target, but never drops below the floor to do so.
fn takes_overflowing_item(
    row: &[(&str, f64)],
    aspect_sum: f64,
    aspect: f64,
    container_width: f64,
    options: LayoutOptions,
) -> bool {
    let target = options.target_row_height;
    let gap = options.gap.max(0.0);
    let without = (container_width - gap * (row.len() - 1) as f64) / aspect_sum;
    let with = (container_width - gap * row.len() as f64) / (aspect_sum + aspect);

    with >= target * MIN_HEIGHT_FACTOR && (target - with) < (without - target)
}

fn close_row(
    layout: &mut Layout,
    row: &[(&str, f64)],
    aspect_sum: f64,
    options: LayoutOptions,
    fill: bool,
) {
    if row.is_empty() {
        return;
    }

    let container = layout.container_width;
    let target = options.target_row_height;
    let gap = options.gap.max(0.0);
    let min_height = target * MIN_HEIGHT_FACTOR;
    let gaps = gap * (row.len() - 1) as f64;
    let oversized = row.len() == 1 && aspect_sum * target > container;

    let mut height = if fill || oversized {
        (container - gaps) / aspect_sum
    } else {
        target
    };
    let max_height = target * MAX_HEIGHT_FACTOR;
    let clamped = height < min_height || height > max_height;
    height = height.clamp(min_height, max_height);

    let index = layout.rows.len();
    for &(id, aspect) in row {
        let width = (aspect * height).min(container);
        layout.items.push(PlacedItem {
            id: id.to_string(),
            row: index,
            width_pct: width / container * 100.0,
            width,
            height,
        });
    }
    layout.rows.push(LayoutRow {
        index,
        height,
        len: row.len(),
        filled: fill || oversized,
        clamped,
    });
}

/// Measured aspect ratios keyed by item id.
#[derive(Debug, Clone, Default)]
pub struct AspectCache {
    ratios: HashMap<String, f64>,
}

impl AspectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the natural size of an image. Returns `true` when the stored
    /// ratio changed, meaning the layout should be recomputed.
    pub fn record(&mut self, id: &str, width: f64, height: f64) -> bool {
        if !(width > 0.0 && height > 0.0) || !width.is_finite() || !height.is_finite() {
            return false;
        }
        let ratio = width / height;
        match self.ratios.insert(id.to_string(), ratio) {
            Some(previous) => (previous - ratio).abs() > f64::EPSILON,
            None => true,
        }
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.ratios.get(id).copied()
    }

    pub fn forget(&mut self, id: &str) {
        self.ratios.remove(id);
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }
}

/// Layout engine that remembers measurements between passes.
#[derive(Debug, Clone, Default)]
pub struct JustifiedLayout {
    options: LayoutOptions,
    cache: AspectCache,
}

impl JustifiedLayout {
    pub fn new(options: LayoutOptions) -> Self {
        Self {
            options,
            cache: AspectCache::new(),
        }
    }

    pub fn options(&self) -> LayoutOptions {
        self.options
    }

    pub fn measure(&mut self, id: &str, width: f64, height: f64) -> bool {
        self.cache.record(id, width, height)
    }

    pub fn cache(&self) -> &AspectCache {
        &self.cache
    }

    /// Lay out the given ids, using cached ratios where known.
    pub fn layout<S: AsRef<str>>(&self, ids: &[S], container_width: f64) -> Layout {
        let items: Vec<LayoutItem> = ids
            .iter()
            .map(|id| LayoutItem::new(id.as_ref(), self.cache.get(id.as_ref())))
            .collect();
        pack_rows(&items, container_width, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(aspects: &[f64]) -> Vec<LayoutItem> {
        aspects
            .iter()
            .enumerate()
            .map(|(i, a)| LayoutItem::new(format!("m{i}"), Some(*a)))
            .collect()
    }

    fn row_span(layout: &Layout, row: usize, gap: f64) -> f64 {
        let placed: Vec<&PlacedItem> = layout.items.iter().filter(|p| p.row == row).collect();
        placed.iter().map(|p| p.width).sum::<f64>() + gap * (placed.len() - 1) as f64
    }

    #[test]
    fn full_row_spans_container() {
        // 2.0 + 1.0 + 0.5 fit at 220px; the trailing square forces the row closed.
        let layout = pack_rows(&items(&[2.0, 1.0, 0.5, 1.0]), 900.0, LayoutOptions::default());

        assert_eq!(layout.rows[0].len, 3);
        assert!(layout.rows[0].filled);
        assert!((row_span(&layout, 0, 16.0) - 900.0).abs() <= 1.0);
        let pct: f64 = layout.items[..3].iter().map(|p| p.width_pct).sum();
        assert!((pct - (900.0 - 32.0) / 900.0 * 100.0).abs() < 0.2);
    }

    #[test]
    fn trailing_row_is_not_stretched() {
        let layout = pack_rows(&items(&[2.0, 1.0, 0.5]), 900.0, LayoutOptions::default());
        assert_eq!(layout.rows.len(), 1);
        assert!(!layout.rows[0].filled);
        assert_eq!(layout.rows[0].height, 220.0);
        assert!(row_span(&layout, 0, 16.0) < 900.0);
    }

    #[test]
    fn oversized_item_sits_alone_at_half_height() {
        let layout = pack_rows(&items(&[5.0, 1.0]), 300.0, LayoutOptions::default());

        assert_eq!(layout.items[0].row, 0);
        assert_eq!(layout.items[1].row, 1);
        assert_eq!(layout.rows[0].len, 1);
        assert!(layout.rows[0].height >= 110.0);
        assert!(layout.rows[0].clamped);
        assert!(layout.items[0].width <= 300.0);
    }

    #[test]
    fn oversized_item_shrinks_without_clamp_when_possible() {
        // 3.0 * 220 = 660 > 600, so the row shrinks to 200px which is above the floor.
        let layout = pack_rows(&items(&[3.0]), 600.0, LayoutOptions::default());
        assert!((layout.rows[0].height - 200.0).abs() < 1e-9);
        assert!(!layout.rows[0].clamped);
        assert!((layout.items[0].width_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn row_heights_stay_above_floor() {
        let aspects = [0.4, 3.7, 1.2, 9.0, 0.8, 1.0, 1.5, 2.2, 0.6, 4.0, 1.1];
        let layout = pack_rows(&items(&aspects), 640.0, LayoutOptions::default());
        assert_eq!(layout.items.len(), aspects.len());
        for row in &layout.rows {
            assert!(row.height >= 110.0, "row {} too short: {}", row.index, row.height);
            assert!(row.height <= 330.0, "row {} too tall: {}", row.index, row.height);
            if row.filled && !row.clamped {
                assert!((row_span(&layout, row.index, 16.0) - 640.0).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn narrow_rows_take_the_overflowing_item() {
        // Without the square, the portrait alone would stretch to 1000px.
        let layout = pack_rows(&items(&[0.3, 1.0]), 300.0, LayoutOptions::default());
        assert_eq!(layout.rows.len(), 1);
        assert_eq!(layout.rows[0].len, 2);
        assert!(layout.rows[0].filled);
        assert!((layout.rows[0].height - 284.0 / 1.3).abs() < 1e-9);
        assert!(layout.rows[0].height <= 220.0);
        assert!((row_span(&layout, 0, 16.0) - 300.0).abs() <= 1.0);

        let layout = pack_rows(&items(&[1.0, 1.0]), 400.0, LayoutOptions::default());
        assert_eq!(layout.rows.len(), 1);
        assert!((layout.rows[0].height - 192.0).abs() < 1e-9);
    }

    #[test]
    fn filled_rows_stay_near_target() {
        let aspects = [0.4, 0.7, 1.0, 0.5, 1.2, 0.6, 0.9, 1.0, 0.3, 0.8, 1.1, 0.5];
        for width in [300.0, 400.0, 520.0, 640.0, 900.0] {
            let layout = pack_rows(&items(&aspects), width, LayoutOptions::default());
            for row in layout.rows.iter().filter(|r| r.filled) {
                assert!(
                    (110.0..=330.0).contains(&row.height),
                    "row {} at {width}px is {}",
                    row.index,
                    row.height
                );
            }
        }
    }

    #[test]
    fn row_before_a_panorama_stops_at_the_ceiling() {
        // The 9:1 item cannot join without a 61px row; alone the square would be 533px.
        let layout = pack_rows(&items(&[1.2, 9.0]), 640.0, LayoutOptions::default());
        assert_eq!(layout.rows[0].len, 1);
        assert_eq!(layout.rows[0].height, 330.0);
        assert!(layout.rows[0].clamped);
        assert!(layout.items[0].width < 640.0);
    }

    #[test]
    fn overflowing_item_is_skipped_when_it_would_breach_the_floor() {
        // Taking the square would push the panorama row to 47px.
        let layout = pack_rows(&items(&[5.0, 1.0]), 300.0, LayoutOptions::default());
        assert_eq!(layout.rows[0].len, 1);
        assert_eq!(layout.items[1].row, 1);
    }

    #[test]
    fn identical_inputs_give_identical_layout() {
        let input = items(&[1.3, 0.7, 2.5, 1.0, 1.0, 0.5]);
        let a = pack_rows(&input, 800.0, LayoutOptions::default());
        let b = pack_rows(&input, 800.0, LayoutOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn appending_keeps_closed_rows() {
        let base = items(&[1.3, 0.7, 2.5, 1.0, 1.0, 0.5, 1.8]);
        let before = pack_rows(&base, 800.0, LayoutOptions::default());

        let mut extended = base.clone();
        extended.push(LayoutItem::new("late", Some(1.4)));
        let after = pack_rows(&extended, 800.0, LayoutOptions::default());

        let closed: Vec<&LayoutRow> = before.rows.iter().filter(|r| r.filled).collect();
        for row in closed {
            assert_eq!(&after.rows[row.index], row);
        }
        let closed_items = before.rows.iter().filter(|r| r.filled).map(|r| r.len).sum::<usize>();
        assert_eq!(before.items[..closed_items], after.items[..closed_items]);
    }

    #[test]
    fn unmeasured_items_default_to_square() {
        let input = vec![LayoutItem::new("a", None), LayoutItem::new("b", Some(f64::NAN))];
        let layout = pack_rows(&input, 1000.0, LayoutOptions::default());
        assert!(layout.items.iter().all(|p| (p.width - 220.0).abs() < 1e-9));
    }

    #[test]
    fn empty_or_zero_width_yields_nothing() {
        assert!(pack_rows(&[], 500.0, LayoutOptions::default()).rows.is_empty());
        assert!(pack_rows(&items(&[1.0]), 0.0, LayoutOptions::default()).items.is_empty());
    }

    #[test]
    fn measurement_changes_layout() {
        let mut engine = JustifiedLayout::new(LayoutOptions::default());
        let ids = ["a", "b", "c"];
        let before = engine.layout(&ids[..], 700.0);
        assert_eq!(before.rows.len(), 1);

        assert!(engine.measure("a", 1600.0, 400.0));
        assert!(!engine.measure("a", 800.0, 200.0), "same ratio is not a change");
        assert!(!engine.measure("b", 0.0, 100.0));

        let after = engine.layout(&ids[..], 700.0);
        assert_eq!(after.rows.len(), 2);
        assert_eq!(engine.cache().get("a"), Some(4.0));
    }
}
