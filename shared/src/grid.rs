use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hex::{Contour, HexId};

/// Static geometry of one grid cell. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexTile {
    pub id: String,
    pub contour: Contour,
    pub center: [f64; 2],
}

impl HexTile {
    pub fn hex_id(&self) -> Option<HexId> {
        HexId::parse(&self.id)
    }

    /// Distance from center to the nearest edge midpoint, in degrees.
    pub fn apothem(&self) -> f64 {
        let [cx, cy] = self.center;
        (0..6)
            .map(|i| {
                let a = self.contour[i];
                let b = self.contour[(i + 1) % 6];
                let mx = (a[0] + b[0]) * 0.5 - cx;
                let my = (a[1] + b[1]) * 0.5 - cy;
                (mx * mx + my * my).sqrt()
            })
            .fold(f64::INFINITY, f64::min)
    }

    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for [x, y] in self.contour {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        (min_x, min_y, max_x, max_y)
    }

    /// Even-odd point-in-hexagon test in lon/lat space.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let mut inside = false;
        let mut j = 5;
        for i in 0..6 {
            let [xi, yi] = self.contour[i];
            let [xj, yj] = self.contour[j];
            if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Raw dataset record; contours are checked before becoming a [`HexTile`].
#[derive(Debug, Deserialize)]
struct RawTile {
    id: String,
    contour: Vec<Vec<f64>>,
    center: Vec<f64>,
}

fn point(raw: &[f64]) -> Option<[f64; 2]> {
    match raw {
        [x, y] | [x, y, _] if x.is_finite() && y.is_finite() => Some([*x, *y]),
        _ => None,
    }
}

impl RawTile {
    fn into_tile(self) -> Option<HexTile> {
        HexId::parse(&self.id)?;
        let center = point(&self.center)?;
        // Some exports close the ring by repeating the first vertex.
        let mut raw = self.contour;
        if raw.len() == 7 && raw.first() == raw.last() {
            raw.pop();
        }
        if raw.len() != 6 {
            return None;
        }
        let mut contour = [[0.0; 2]; 6];
        for (slot, p) in contour.iter_mut().zip(&raw) {
            *slot = point(p)?;
        }
        Some(HexTile {
            id: self.id,
            contour,
            center,
        })
    }
}

/// Result of parsing the static grid dataset.
#[derive(Debug, Clone, Default)]
pub struct GridParse {
    pub tiles: Vec<HexTile>,
    pub rejected: usize,
}

/// Parse the grid dataset JSON array. Malformed records are dropped and counted,
/// a malformed document is an error.
pub fn parse_grid_dataset(json: &str) -> Result<GridParse, String> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(json).map_err(|e| format!("parse error: {e}"))?;
    let mut out = GridParse {
        tiles: Vec::with_capacity(values.len()),
        rejected: 0,
    };
    for value in values {
        match serde_json::from_value::<RawTile>(value)
            .ok()
            .and_then(RawTile::into_tile)
        {
            Some(tile) => out.tiles.push(tile),
            None => out.rejected += 1,
        }
    }
    Ok(out)
}

/// Read-only id → tile lookup, built once per dataset load.
#[derive(Debug, Clone, Default)]
pub struct HexGridIndex {
    tiles: HashMap<String, HexTile>,
    bounds: Option<(f64, f64, f64, f64)>,
}

impl HexGridIndex {
    pub fn build(tiles: Vec<HexTile>) -> Self {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        let mut map = HashMap::with_capacity(tiles.len());
        for tile in tiles {
            let (x0, y0, x1, y1) = tile.bbox();
            bounds = Some(match bounds {
                Some((a, b, c, d)) => (a.min(x0), b.min(y0), c.max(x1), d.max(y1)),
                None => (x0, y0, x1, y1),
            });
            map.insert(tile.id.clone(), tile);
        }
        Self { tiles: map, bounds }
    }

    pub fn get(&self, id: &str) -> Option<&HexTile> {
        self.tiles.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tiles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HexTile> {
        self.tiles.values()
    }

    /// `(min_lon, min_lat, max_lon, max_lat)` over every contour.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.bounds
    }

    /// Existing grid neighbors of `id`.
    pub fn neighbors_of(&self, id: &str) -> Vec<&HexTile> {
        let Some(hex) = HexId::parse(id) else {
            return Vec::new();
        };
        hex.neighbors()
            .iter()
            .filter_map(|n| self.tiles.get(&n.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::{odd_r_center, regular_contour};
    use serde_json::json;

    fn tile_json(row: i32, col: i32) -> serde_json::Value {
        let hex = HexId::new(row, col);
        let c = odd_r_center(hex, 0.5);
        let contour: Vec<Vec<f64>> = regular_contour(c, 0.5)
            .iter()
            .map(|p| vec![p[0], p[1]])
            .collect();
        json!({ "id": hex.to_string(), "contour": contour, "center": [c[0], c[1]] })
    }

    #[test]
    fn parses_valid_records_and_drops_bad_ones() {
        let doc = json!([
            tile_json(0, 0),
            tile_json(0, 1),
            { "id": "1-1", "contour": [[0.0, 0.0], [1.0, 0.0]], "center": [0.5, 0.5] },
            { "id": "bogus", "contour": [], "center": [0.0, 0.0] },
            { "id": "2-2", "center": [0.0, 0.0] },
        ]);
        let parsed = parse_grid_dataset(&doc.to_string()).expect("document should parse");
        assert_eq!(parsed.tiles.len(), 2);
        assert_eq!(parsed.rejected, 3);
    }

    #[test]
    fn malformed_document_reports_one_parse_prefix() {
        let err = parse_grid_dataset("{ not json").unwrap_err();
        assert!(err.starts_with("parse error: "));
        assert_eq!(err.matches("parse error").count(), 1);
    }

    #[test]
    fn closed_rings_are_accepted() {
        let mut record = tile_json(3, 3);
        let contour = record["contour"].as_array_mut().expect("contour array");
        let first = contour[0].clone();
        contour.push(first);
        let parsed = parse_grid_dataset(&json!([record]).to_string()).expect("parse");
        assert_eq!(parsed.tiles.len(), 1);
    }

    #[test]
    fn non_array_document_is_an_error() {
        assert!(parse_grid_dataset("{\"id\": 1}").is_err());
    }

    #[test]
    fn index_lookup_bounds_and_neighbors() {
        let doc = json!([tile_json(10, 10), tile_json(10, 11), tile_json(14, 14)]);
        let parsed = parse_grid_dataset(&doc.to_string()).expect("parse");
        let index = HexGridIndex::build(parsed.tiles);
        assert_eq!(index.len(), 3);
        assert!(index.contains("10-11"));
        assert!(index.get("99-99").is_none());
        let ids: Vec<&str> = index
            .neighbors_of("10-10")
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["10-11"]);
        assert!(index.neighbors_of("2147483647-0").is_empty());
        let (x0, y0, x1, y1) = index.bounds().expect("bounds");
        assert!(x0 < x1 && y0 < y1);
    }

    #[test]
    fn contains_and_apothem_match_regular_hexagon() {
        let c = [2.0, 3.0];
        let tile = HexTile {
            id: "0-0".into(),
            contour: regular_contour(c, 1.0),
            center: c,
        };
        assert!(tile.contains(2.0, 3.0));
        assert!(tile.contains(2.8, 3.0));
        assert!(!tile.contains(3.2, 3.0));
        assert!((tile.apothem() - 3f64.sqrt() / 2.0).abs() < 1e-12);
    }
}
