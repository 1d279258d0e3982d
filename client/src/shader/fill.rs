use bytemuck::{Pod, Zeroable};
use frontline_shared::BoundarySet;

use super::mesh::{FAN_VERTICES_PER_HEX, HexMeshLayer, ProjectedHex};
use crate::viewport::lnglat_to_mercator;

/// Flat-colored vertex shared by the tile fill, resource overlay and basemap outline.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FillVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileFillDatum {
    pub center: [f64; 2],
    pub vertices: [[f64; 2]; 6],
    /// Normalized RGBA.
    pub color: [f32; 4],
}

pub struct TileFillLayer;

impl HexMeshLayer for TileFillLayer {
    type Datum = TileFillDatum;
    type Vertex = FillVertex;

    fn build_vertices(data: &[TileFillDatum]) -> Vec<FillVertex> {
        let mut out = Vec::with_capacity(data.len() * FAN_VERTICES_PER_HEX);
        for d in data {
            let Some(hex) = ProjectedHex::from_lnglat(d.center, &d.vertices) else {
                continue;
            };
            out.extend(hex.fan().iter().map(|p| FillVertex {
                position: [p[0] as f32, p[1] as f32],
                color: d.color,
            }));
        }
        out
    }
}

/// Line-list vertices (two per segment) for every boundary outline.
pub fn basemap_line_vertices(sets: &[&BoundarySet], color: [f32; 4]) -> Vec<FillVertex> {
    let mut out = Vec::new();
    for set in sets {
        for (a, b) in set.outline_segments() {
            // Antimeridian-crossing segments would streak across the map.
            if (a[0] - b[0]).abs() > 180.0 {
                continue;
            }
            for p in [a, b] {
                let m = lnglat_to_mercator(p[0], p[1]);
                out.push(FillVertex {
                    position: [m[0] as f32, m[1] as f32],
                    color,
                });
            }
        }
    }
    out
}
