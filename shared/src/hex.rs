use std::fmt;

/// Coordinate tolerance for matching contour vertices between adjacent cells.
pub const EDGE_EPSILON: f64 = 1e-5;

/// Closed hexagon boundary: 6 `[lon, lat]` vertices, edge `i` runs from
/// vertex `i` to vertex `(i + 1) % 6`.
pub type Contour = [[f64; 2]; 6];

/// Odd-r neighbor offsets as `(drow, dcol)` for even rows.
const EVEN_ROW_OFFSETS: [(i32, i32); 6] = [(0, 1), (-1, 0), (-1, -1), (0, -1), (1, -1), (1, 0)];

/// Odd-r neighbor offsets for odd rows (shifted right by half a cell).
const ODD_ROW_OFFSETS: [(i32, i32); 6] = [(0, 1), (-1, 1), (-1, 0), (0, -1), (1, 0), (1, 1)];

/// Largest row or column a parsed id may carry, so every neighbor
/// coordinate stays representable.
pub const MAX_COORD: i32 = i32::MAX - 1;

/// Grid address of a cell in the odd-r offset grid.
///
/// Parsed ids are always non-negative; neighbors of boundary cells can carry
/// negative coordinates, whose ids never match a dataset entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexId {
    pub row: i32,
    pub col: i32,
}

impl HexId {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Parse a `"row-col"` id. Anything not matching `^\d+-\d+$`, or with a
    /// part above [`MAX_COORD`], is rejected.
    pub fn parse(id: &str) -> Option<Self> {
        let (row, col) = id.split_once('-')?;
        Some(Self {
            row: parse_digits(row)?,
            col: parse_digits(col)?,
        })
    }

    /// The six candidate neighbors, existence in the grid not guaranteed.
    pub fn neighbors(self) -> [HexId; 6] {
        let offsets = if self.row.rem_euclid(2) == 0 {
            &EVEN_ROW_OFFSETS
        } else {
            &ODD_ROW_OFFSETS
        };
        offsets.map(|(dr, dc)| HexId::new(self.row + dr, self.col + dc))
    }

    pub fn is_neighbor_of(self, other: HexId) -> bool {
        self.neighbors().contains(&other)
    }
}

impl fmt::Display for HexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

fn parse_digits(part: &str) -> Option<i32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok().filter(|&v| v <= MAX_COORD)
}

pub fn make_id(row: i32, col: i32) -> String {
    HexId::new(row, col).to_string()
}

/// Six neighbor ids for `id`, or `None` when `id` is malformed.
pub fn neighbors(id: &str) -> Option<[String; 6]> {
    HexId::parse(id).map(|hex| hex.neighbors().map(|n| n.to_string()))
}

#[inline]
fn same_point(a: [f64; 2], b: [f64; 2]) -> bool {
    (a[0] - b[0]).abs() <= EDGE_EPSILON && (a[1] - b[1]).abs() <= EDGE_EPSILON
}

/// Index of the edge in `a` that coincides with some edge of `b`, in either
/// winding direction.
pub fn find_shared_edge_index(a: &Contour, b: &Contour) -> Option<usize> {
    for i in 0..6 {
        let a0 = a[i];
        let a1 = a[(i + 1) % 6];
        for j in 0..6 {
            let b0 = b[j];
            let b1 = b[(j + 1) % 6];
            if (same_point(a0, b0) && same_point(a1, b1))
                || (same_point(a0, b1) && same_point(a1, b0))
            {
                return Some(i);
            }
        }
    }
    None
}

/// Planar hexagon contour around `center` (pointy-top, vertex 0 at 30°).
pub fn regular_contour(center: [f64; 2], radius: f64) -> Contour {
    std::array::from_fn(|i| {
        let angle = (60.0 * i as f64 + 30.0).to_radians();
        [
            center[0] + radius * angle.cos(),
            center[1] + radius * angle.sin(),
        ]
    })
}

/// Planar center of cell `(row, col)` in an odd-r layout of pointy-top hexes
/// with circumradius `radius`, rows growing along +y.
pub fn odd_r_center(hex: HexId, radius: f64) -> [f64; 2] {
    let width = 3f64.sqrt() * radius;
    let shift = if hex.row.rem_euclid(2) == 1 { 0.5 } else { 0.0 };
    [
        width * (hex.col as f64 + shift),
        1.5 * radius * hex.row as f64,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_row_col() {
        assert_eq!(HexId::parse("10-11"), Some(HexId::new(10, 11)));
        assert_eq!(HexId::parse("0-0"), Some(HexId::new(0, 0)));
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        for bad in ["", "10", "10-", "-10", "a-b", "1-2-3", "10_11", " 1-2", "+1-2", "1--2"] {
            assert_eq!(HexId::parse(bad), None, "{bad:?} should not parse");
        }
    }

    #[test]
    fn parse_bounds_keep_neighbors_representable() {
        assert_eq!(HexId::parse("2147483647-0"), None);
        assert_eq!(HexId::parse("0-2147483647"), None);
        assert_eq!(HexId::parse("99999999999-1"), None);

        let edge = HexId::parse("2147483646-2147483646").unwrap();
        assert_eq!(edge, HexId::new(MAX_COORD, MAX_COORD));
        let around = edge.neighbors();
        assert!(around.contains(&HexId::new(MAX_COORD + 1, MAX_COORD)));
        assert_eq!(neighbors("2147483646-0").map(|n| n.len()), Some(6));
    }

    #[test]
    fn make_id_roundtrips_through_parse() {
        for row in 0..40 {
            for col in [0, 1, 7, 99, 1234] {
                let id = make_id(row, col);
                assert_eq!(HexId::parse(&id), Some(HexId::new(row, col)));
            }
        }
    }

    #[test]
    fn neighbors_always_returns_six() {
        assert_eq!(neighbors("0-0").map(|n| n.len()), Some(6));
        assert_eq!(neighbors("5-9").map(|n| n.len()), Some(6));
        assert!(neighbors("nope").is_none());
    }

    #[test]
    fn neighbor_tables_depend_on_row_parity() {
        let even = HexId::new(10, 10).neighbors();
        assert!(even.contains(&HexId::new(9, 9)));
        assert!(even.contains(&HexId::new(11, 9)));
        assert!(!even.contains(&HexId::new(9, 11)));

        let odd = HexId::new(11, 10).neighbors();
        assert!(odd.contains(&HexId::new(10, 11)));
        assert!(odd.contains(&HexId::new(12, 11)));
        assert!(!odd.contains(&HexId::new(10, 9)));
    }

    #[test]
    fn neighbor_relation_is_symmetric() {
        for row in 1..20 {
            for col in 1..20 {
                let hex = HexId::new(row, col);
                for n in hex.neighbors() {
                    assert!(
                        n.is_neighbor_of(hex),
                        "{n} lists no back-reference to {hex}"
                    );
                }
            }
        }
    }

    #[test]
    fn neighbors_are_geometrically_adjacent() {
        let radius = 1.0;
        let spacing = 3f64.sqrt() * radius;
        let hex = HexId::new(6, 4);
        let c = odd_r_center(hex, radius);
        for n in hex.neighbors() {
            let nc = odd_r_center(n, radius);
            let d = ((nc[0] - c[0]).powi(2) + (nc[1] - c[1]).powi(2)).sqrt();
            assert!((d - spacing).abs() < 1e-9, "{n} is {d} away");
        }
    }

    #[test]
    fn shared_edge_found_for_adjacent_contours() {
        let radius = 0.5;
        let a = HexId::new(3, 3);
        let ca = regular_contour(odd_r_center(a, radius), radius);
        for n in a.neighbors() {
            let cb = regular_contour(odd_r_center(n, radius), radius);
            let ab = find_shared_edge_index(&ca, &cb);
            let ba = find_shared_edge_index(&cb, &ca);
            assert!(ab.is_some(), "no shared edge with {n}");
            assert_eq!(ab.is_some(), ba.is_some());
        }
    }

    #[test]
    fn shared_edge_handles_reversed_winding() {
        let radius = 0.5;
        let ca = regular_contour(odd_r_center(HexId::new(2, 2), radius), radius);
        let mut cb = regular_contour(odd_r_center(HexId::new(2, 3), radius), radius);
        cb.reverse();
        assert!(find_shared_edge_index(&ca, &cb).is_some());
    }

    #[test]
    fn distant_contours_share_no_edge() {
        let radius = 0.5;
        let ca = regular_contour(odd_r_center(HexId::new(2, 2), radius), radius);
        let cb = regular_contour(odd_r_center(HexId::new(2, 4), radius), radius);
        assert_eq!(find_shared_edge_index(&ca, &cb), None);
    }
}
