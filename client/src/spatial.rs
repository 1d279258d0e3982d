use frontline_shared::{Contour, HexGridIndex};

const MIN_BUCKETS: usize = 16;
const MAX_BUCKETS: usize = 256;

/// A flat lon/lat bucket grid for O(1) hex hit-testing.
/// Rebuilt only when the grid dataset reloads.
pub struct HexHitGrid {
    cells: Vec<Vec<usize>>,
    ids: Vec<String>,
    contours: Vec<Contour>,
    cols: usize,
    rows: usize,
    min_x: f64,
    min_y: f64,
    cell_w: f64,
    cell_h: f64,
}

impl HexHitGrid {
    pub fn build(grid: &HexGridIndex) -> Self {
        let Some((min_x, min_y, max_x, max_y)) = grid.bounds() else {
            return Self {
                cells: Vec::new(),
                ids: Vec::new(),
                contours: Vec::new(),
                cols: 0,
                rows: 0,
                min_x: 0.0,
                min_y: 0.0,
                cell_w: 1.0,
                cell_h: 1.0,
            };
        };

        // Roughly one tile per bucket along each axis.
        let side = ((grid.len() as f64).sqrt().ceil() as usize).clamp(MIN_BUCKETS, MAX_BUCKETS);
        let (cols, rows) = (side, side);
        let cell_w = ((max_x - min_x) / cols as f64).max(f64::EPSILON);
        let cell_h = ((max_y - min_y) / rows as f64).max(f64::EPSILON);

        let mut cells = vec![Vec::new(); cols * rows];
        let mut ids = Vec::with_capacity(grid.len());
        let mut contours = Vec::with_capacity(grid.len());

        for (idx, tile) in grid.iter().enumerate() {
            ids.push(tile.id.clone());
            contours.push(tile.contour);

            // Insert into all overlapping buckets
            let (l, t, r, b) = tile.bbox();
            let col_start = ((l - min_x) / cell_w).floor().max(0.0) as usize;
            let col_end = (((r - min_x) / cell_w).floor() as usize).min(cols - 1);
            let row_start = ((t - min_y) / cell_h).floor().max(0.0) as usize;
            let row_end = (((b - min_y) / cell_h).floor() as usize).min(rows - 1);

            for row in row_start..=row_end {
                for col in col_start..=col_end {
                    cells[row * cols + col].push(idx);
                }
            }
        }

        Self {
            cells,
            ids,
            contours,
            cols,
            rows,
            min_x,
            min_y,
            cell_w,
            cell_h,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Id of the hex containing a geographic point, if any.
    pub fn find_at(&self, lon: f64, lat: f64) -> Option<String> {
        if self.cells.is_empty() || !lon.is_finite() || !lat.is_finite() {
            return None;
        }

        let col = ((lon - self.min_x) / self.cell_w).floor();
        let row = ((lat - self.min_y) / self.cell_h).floor();
        // Points exactly on the max edge still belong to the last bucket.
        if col < 0.0 || row < 0.0 || col > self.cols as f64 || row > self.rows as f64 {
            return None;
        }
        let col = (col as usize).min(self.cols - 1);
        let row = (row as usize).min(self.rows - 1);

        self.cells[row * self.cols + col]
            .iter()
            .find(|&&idx| polygon_contains(&self.contours[idx], lon, lat))
            .map(|&idx| self.ids[idx].clone())
    }
}

fn polygon_contains(contour: &Contour, x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = contour.len() - 1;
    for i in 0..contour.len() {
        let [xi, yi] = contour[i];
        let [xj, yj] = contour[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Collapses repeated hover reports over the same hex into one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoverTracker {
    current: Option<String>,
}

impl HoverTracker {
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Record the hovered id. Returns the new value only when it changed.
    pub fn update(&mut self, hovered: Option<String>) -> Option<Option<String>> {
        if self.current == hovered {
            return None;
        }
        self.current = hovered.clone();
        Some(hovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontline_shared::hex::{odd_r_center, regular_contour};
    use frontline_shared::{HexId, HexTile};

    fn grid(rows: i32, cols: i32) -> HexGridIndex {
        let mut tiles = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let center = odd_r_center(HexId::new(r, c), 0.5);
                tiles.push(HexTile {
                    id: HexId::new(r, c).to_string(),
                    contour: regular_contour(center, 0.5),
                    center,
                });
            }
        }
        HexGridIndex::build(tiles)
    }

    #[test]
    fn finds_hex_at_every_center() {
        let g = grid(12, 15);
        let hits = HexHitGrid::build(&g);
        for tile in g.iter() {
            assert_eq!(hits.find_at(tile.center[0], tile.center[1]).as_deref(), Some(tile.id.as_str()));
        }
    }

    #[test]
    fn misses_outside_and_in_gaps() {
        let g = grid(3, 3);
        let hits = HexHitGrid::build(&g);
        assert_eq!(hits.find_at(-50.0, -50.0), None);
        assert_eq!(hits.find_at(f64::NAN, 0.0), None);
        // Below row 0 between two pointy tops.
        let gap = [3f64.sqrt() * 0.5 * 0.5, -0.45];
        assert_eq!(hits.find_at(gap[0], gap[1]), None);
    }

    #[test]
    fn empty_grid_finds_nothing() {
        let hits = HexHitGrid::build(&HexGridIndex::default());
        assert!(hits.is_empty());
        assert_eq!(hits.find_at(0.0, 0.0), None);
    }

    #[test]
    fn hover_tracker_dedupes() {
        let mut hover = HoverTracker::default();
        assert_eq!(hover.update(Some("1-1".into())), Some(Some("1-1".into())));
        assert_eq!(hover.update(Some("1-1".into())), None);
        assert_eq!(hover.update(None), Some(None));
        assert_eq!(hover.update(None), None);
        assert_eq!(hover.current(), None);
    }
}
