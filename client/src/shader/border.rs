use std::collections::{HashMap, HashSet, VecDeque};

use bytemuck::{Pod, Zeroable};
use frontline_shared::{HexGridIndex, HexId, find_shared_edge_index};

use super::mesh::{HexMeshLayer, ProjectedHex, pack_local_vertices};
use super::smoothstep;

pub const DEFAULT_BORDER_WIDTH_PX: f32 = 2.0;
pub const DEFAULT_BORDER_FEATHER_PX: f32 = 0.75;
pub const SELECTION_BORDER_WIDTH_PX: f32 = 3.0;
/// Delay between consecutive cells of a zone reveal.
pub const DEFAULT_STEP_DELAY_MS: f32 = 45.0;
pub const DEFAULT_FADE_DURATION_MS: f32 = 320.0;

/// One hex's border band. Colors may be 0..1 or 0..255.
#[derive(Debug, Clone, PartialEq)]
pub struct HexBorderDatum {
    pub hex_id: String,
    pub center: [f64; 2],
    pub vertices: Vec<[f64; 2]>,
    pub color: [f32; 3],
    pub alpha: f32,
    pub border_width: f32,
    pub feather: f32,
    /// `false` suppresses the edge (shared with a same-group neighbor).
    pub edge_mask: [bool; 6],
    /// Position in the reveal sequence; `None` draws immediately.
    pub order: Option<u32>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct HexBorderVertex {
    pub position: [f32; 2],
    pub local: [f32; 2],
    pub verts_a: [f32; 4],
    pub verts_b: [f32; 4],
    pub verts_c: [f32; 4],
    pub color: [f32; 4],
    /// border_width px, feather px, order (-1 = none), unused.
    pub params: [f32; 4],
    pub mask_a: [f32; 4],
    pub mask_b: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct HexBorderUniforms {
    pub time_ms: f32,
    pub step_delay_ms: f32,
    pub fade_duration_ms: f32,
    pub animate: f32,
    pub world_size: f32,
    pub _pad: [f32; 3],
}

impl Default for HexBorderUniforms {
    fn default() -> Self {
        Self {
            time_ms: 0.0,
            step_delay_ms: DEFAULT_STEP_DELAY_MS,
            fade_duration_ms: DEFAULT_FADE_DURATION_MS,
            animate: 0.0,
            world_size: 512.0,
            _pad: [0.0; 3],
        }
    }
}

pub struct HexBorderLayer;

impl HexMeshLayer for HexBorderLayer {
    type Datum = HexBorderDatum;
    type Vertex = HexBorderVertex;

    fn build_vertices(data: &[HexBorderDatum]) -> Vec<HexBorderVertex> {
        let mut out = Vec::with_capacity(data.len() * super::FAN_VERTICES_PER_HEX);
        for d in data {
            let Some(hex) = ProjectedHex::from_lnglat(d.center, &d.vertices) else {
                continue;
            };
            if d.edge_mask.iter().all(|m| !m) {
                continue;
            }
            let [verts_a, verts_b, verts_c] = pack_local_vertices(&hex.local_vertices());
            let rgb = frontline_shared::colors::normalize_rgb(d.color);
            let color = [
                rgb[0],
                rgb[1],
                rgb[2],
                frontline_shared::colors::normalize_alpha(d.alpha),
            ];
            let params = [
                d.border_width.max(0.0),
                d.feather.max(0.0),
                d.order.map_or(-1.0, |o| o as f32),
                0.0,
            ];
            let bit = |i: usize| if d.edge_mask[i] { 1.0 } else { 0.0 };
            let mask_a = [bit(0), bit(1), bit(2), bit(3)];
            let mask_b = [bit(4), bit(5)];
            for p in hex.fan() {
                out.push(HexBorderVertex {
                    position: [p[0] as f32, p[1] as f32],
                    local: hex.local(p),
                    verts_a,
                    verts_b,
                    verts_c,
                    color,
                    params,
                    mask_a,
                    mask_b,
                });
            }
        }
        out
    }
}

/// CPU mirror of the shader's reveal ramp.
pub fn step_alpha(time_ms: f32, order: u32, step_delay_ms: f32, fade_duration_ms: f32) -> f32 {
    let start = order as f32 * step_delay_ms;
    if fade_duration_ms <= 0.0 {
        return if time_ms >= start { 1.0 } else { 0.0 };
    }
    ((time_ms - start) / fade_duration_ms).clamp(0.0, 1.0)
}

fn segment_distance(p: [f32; 2], a: [f32; 2], b: [f32; 2]) -> f32 {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let t = ((ap[0] * ab[0] + ap[1] * ab[1]) / (ab[0] * ab[0] + ab[1] * ab[1]).max(1e-20)).clamp(0.0, 1.0);
    let dx = ap[0] - ab[0] * t;
    let dy = ap[1] - ab[1] * t;
    (dx * dx + dy * dy).sqrt()
}

/// Nearest of the six edges to `p` and its distance. Edge `i` runs from
/// `verts[i]` to `verts[i + 1]`.
pub fn nearest_edge(p: [f32; 2], verts: &[[f32; 2]; 6]) -> (usize, f32) {
    (0..6)
        .map(|i| (i, segment_distance(p, verts[i], verts[(i + 1) % 6])))
        .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// CPU mirror of the border fragment coverage. Only the nearest edge
/// counts; a masked-off nearest edge draws nothing even when a visible
/// edge is within the band.
pub fn border_coverage(p: [f32; 2], verts: &[[f32; 2]; 6], mask: [bool; 6], width_px: f32, feather_px: f32, world_size: f32) -> f32 {
    let (edge, d) = nearest_edge(p, verts);
    if !mask[edge] {
        return 0.0;
    }
    let d = d * world_size;
    let feather = feather_px.max(1e-3);
    1.0 - smoothstep(width_px - feather, width_px + feather, d)
}

/// Edges of `hex_id` that face outside `group`. Edges shared with a group
/// member are masked off.
pub fn edge_mask_for_group(hex_id: &str, group: &HashSet<&str>, grid: &HexGridIndex) -> [bool; 6] {
    let mut mask = [true; 6];
    let Some(tile) = grid.get(hex_id) else {
        return mask;
    };
    for neighbor in grid.neighbors_of(hex_id) {
        if !group.contains(neighbor.id.as_str()) {
            continue;
        }
        if let Some(edge) = find_shared_edge_index(&tile.contour, &neighbor.contour) {
            mask[edge] = false;
        }
    }
    mask
}

/// Breadth-first reveal order over `group`, starting at `start` (or the
/// smallest id). Disconnected parts continue the numbering from their own
/// smallest id.
pub fn reveal_order(start: Option<&str>, group: &HashSet<&str>) -> HashMap<String, u32> {
    let mut remaining: Vec<&str> = group.iter().copied().collect();
    remaining.sort_unstable();
    let mut order = HashMap::with_capacity(group.len());
    let mut next = 0u32;
    let mut seeds: VecDeque<&str> = start.filter(|s| group.contains(s)).into_iter().collect();
    seeds.extend(remaining.iter().copied());

    for seed in seeds {
        if order.contains_key(seed) {
            continue;
        }
        let mut queue = VecDeque::from([seed]);
        order.insert(seed.to_string(), next);
        next += 1;
        while let Some(id) = queue.pop_front() {
            let Some(hex) = HexId::parse(id) else {
                continue;
            };
            for n in hex.neighbors() {
                let nid = n.to_string();
                if let Some(member) = group.get(nid.as_str())
                    && !order.contains_key(*member)
                {
                    order.insert(nid, next);
                    next += 1;
                    queue.push_back(*member);
                }
            }
        }
    }
    order
}

/// Border datums outlining a group of hexes as one blob.
pub fn group_border_data(
    ids: &[&str],
    grid: &HexGridIndex,
    color: [f32; 3],
    alpha: f32,
    border_width: f32,
    order: Option<&HashMap<String, u32>>,
) -> Vec<HexBorderDatum> {
    let group: HashSet<&str> = ids.iter().copied().collect();
    ids.iter()
        .filter_map(|id| {
            let tile = grid.get(id)?;
            Some(HexBorderDatum {
                hex_id: tile.id.clone(),
                center: tile.center,
                vertices: tile.contour.to_vec(),
                color,
                alpha,
                border_width,
                feather: DEFAULT_BORDER_FEATHER_PX,
                edge_mask: edge_mask_for_group(id, &group, grid),
                order: order.and_then(|o| o.get(*id).copied()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontline_shared::HexTile;
    use frontline_shared::hex::{odd_r_center, regular_contour};

    fn grid(cells: &[(i32, i32)]) -> HexGridIndex {
        HexGridIndex::build(
            cells
                .iter()
                .map(|&(r, c)| {
                    let center = odd_r_center(HexId::new(r, c), 0.5);
                    HexTile {
                        id: HexId::new(r, c).to_string(),
                        contour: regular_contour(center, 0.5),
                        center,
                    }
                })
                .collect(),
        )
    }


    fn pointy_hex() -> [[f32; 2]; 6] {
        std::array::from_fn(|i| {
            let a = (30.0 + 60.0 * i as f32).to_radians();
            [a.cos(), a.sin()]
        })
    }

    #[test]
    fn hidden_nearest_edge_suppresses_band_at_corner() {
        let verts = pointy_hex();
        // Edge 0 visible, edge 1 hidden; they meet at verts[1] = (0, 1).
        let mut mask = [true; 6];
        mask[1] = false;
        let near_corner = [-0.02, 0.97];
        assert_eq!(nearest_edge(near_corner, &verts).0, 1);
        // Edge 0 is ~1.8 px away, inside the band, but edge 1 is nearer.
        assert_eq!(border_coverage(near_corner, &verts, mask, 3.0, 0.75, 50.0), 0.0);

        let near_visible = [0.428, 0.741];
        assert_eq!(nearest_edge(near_visible, &verts).0, 0);
        assert_eq!(border_coverage(near_visible, &verts, mask, 3.0, 0.75, 50.0), 1.0);
    }

    #[test]
    fn feather_straddles_border_width() {
        let verts = pointy_hex();
        let mask = [true; 6];
        // Inward from the midpoint of edge 0 by exactly the width (3 px at 100 px/unit).
        let n = [0.5f32, 0.866_025_4];
        let mid = [(verts[0][0] + verts[1][0]) / 2.0, (verts[0][1] + verts[1][1]) / 2.0];
        let at = |px: f32| [mid[0] - n[0] * px / 100.0, mid[1] - n[1] * px / 100.0];
        assert!((border_coverage(at(3.0), &verts, mask, 3.0, 0.75, 100.0) - 0.5).abs() < 1e-2);
        assert!(border_coverage(at(2.5), &verts, mask, 3.0, 0.75, 100.0) > 0.5);
        assert_eq!(border_coverage(at(4.0), &verts, mask, 3.0, 0.75, 100.0), 0.0);
    }

    fn datum(vertices: Vec<[f64; 2]>) -> HexBorderDatum {
        HexBorderDatum {
            hex_id: "1-1".into(),
            center: [0.0, 0.0],
            vertices,
            color: [255.0, 128.0, 0.0],
            alpha: 1.0,
            border_width: DEFAULT_BORDER_WIDTH_PX,
            feather: DEFAULT_BORDER_FEATHER_PX,
            edge_mask: [true; 6],
            order: Some(3),
        }
    }

    #[test]
    fn builds_18_vertices_per_valid_datum_and_skips_malformed() {
        let good = datum(regular_contour([0.0, 0.0], 0.5).to_vec());
        let short = datum(regular_contour([0.0, 0.0], 0.5)[..4].to_vec());
        let verts = HexBorderLayer::build_vertices(&[good.clone(), short.clone(), good]);
        assert_eq!(verts.len(), 36);
        assert!(HexBorderLayer::build_vertices(&[short]).is_empty());
        assert_eq!(verts[0].color, [1.0, 128.0 / 255.0, 0.0, 1.0]);
        assert_eq!(verts[0].params[2], 3.0);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let data = vec![datum(regular_contour([3.0, 4.0], 0.5).to_vec())];
        assert_eq!(
            HexBorderLayer::build_vertices(&data),
            HexBorderLayer::build_vertices(&data)
        );
    }

    #[test]
    fn interior_edges_are_masked() {
        let g = grid(&[(2, 2), (2, 3), (3, 2), (6, 6)]);
        let group: HashSet<&str> = ["2-2", "2-3", "3-2"].into_iter().collect();
        let mask = edge_mask_for_group("2-2", &group, &g);
        assert_eq!(mask.iter().filter(|m| !**m).count(), 2);
        let alone = edge_mask_for_group("6-6", &group, &g);
        assert_eq!(alone, [true; 6]);
    }

    #[test]
    fn reveal_order_is_breadth_first_from_start() {
        let group: HashSet<&str> = ["4-4", "4-5", "4-6", "4-7", "9-9"].into_iter().collect();
        let order = reveal_order(Some("4-6"), &group);
        assert_eq!(order["4-6"], 0);
        assert!(order["4-5"] <= 2 && order["4-7"] <= 2);
        assert_eq!(order["4-4"], 3);
        assert_eq!(order["9-9"], 4);
        assert_eq!(order.len(), group.len());
    }

    #[test]
    fn step_alpha_ramps_per_order() {
        assert_eq!(step_alpha(0.0, 0, 45.0, 300.0), 0.0);
        assert_eq!(step_alpha(150.0, 0, 45.0, 300.0), 0.5);
        assert_eq!(step_alpha(90.0, 2, 45.0, 300.0), 0.0);
        assert_eq!(step_alpha(10_000.0, 2, 45.0, 300.0), 1.0);
        assert_eq!(step_alpha(45.0, 1, 45.0, 0.0), 1.0);
    }

    #[test]
    fn group_border_skips_unknown_ids() {
        let g = grid(&[(1, 1), (1, 2)]);
        let data = group_border_data(&["1-1", "1-2", "7-7"], &g, [1.0, 1.0, 1.0], 1.0, 2.0, None);
        assert_eq!(data.len(), 2);
        assert!(data.iter().all(|d| d.edge_mask.iter().filter(|m| !**m).count() == 1));
    }
}
