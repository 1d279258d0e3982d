use bytemuck::{Pod, Zeroable};
use frontline_shared::colors::{normalize_alpha, normalize_rgb};

use super::mesh::{FAN_VERTICES_PER_HEX, HexMeshLayer, ProjectedHex};
use super::smoothstep;

/// Ring geometry as fractions of the hex apothem.
pub const CAPITAL_RING_RADIUS_RATIO: f32 = 0.58;
pub const CAPITAL_RING_WIDTH_RATIO: f32 = 0.14;
pub const CAPITAL_RING_FEATHER_RATIO: f32 = 0.05;
pub const CAPITAL_RING_ALPHA: f32 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct HexCapitalRingDatum {
    pub hex_id: String,
    pub center: [f64; 2],
    pub vertices: Vec<[f64; 2]>,
    pub color: [f32; 3],
    pub alpha: f32,
    pub radius_ratio: f32,
    pub width_ratio: f32,
    pub feather_ratio: f32,
}

impl HexCapitalRingDatum {
    pub fn new(hex_id: String, center: [f64; 2], vertices: Vec<[f64; 2]>, color: [f32; 3]) -> Self {
        Self {
            hex_id,
            center,
            vertices,
            color,
            alpha: CAPITAL_RING_ALPHA,
            radius_ratio: CAPITAL_RING_RADIUS_RATIO,
            width_ratio: CAPITAL_RING_WIDTH_RATIO,
            feather_ratio: CAPITAL_RING_FEATHER_RATIO,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct HexCapitalRingVertex {
    pub position: [f32; 2],
    pub local: [f32; 2],
    pub color: [f32; 4],
    /// radius, width, feather (mercator units), unused.
    pub ring: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct HexCapitalRingUniforms {
    pub opacity: f32,
    pub _pad: [f32; 3],
}

impl Default for HexCapitalRingUniforms {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            _pad: [0.0; 3],
        }
    }
}

pub struct HexCapitalRingLayer;

impl HexMeshLayer for HexCapitalRingLayer {
    type Datum = HexCapitalRingDatum;
    type Vertex = HexCapitalRingVertex;

    fn build_vertices(data: &[HexCapitalRingDatum]) -> Vec<HexCapitalRingVertex> {
        let mut out = Vec::with_capacity(data.len() * FAN_VERTICES_PER_HEX);
        for d in data {
            let Some(hex) = ProjectedHex::from_lnglat(d.center, &d.vertices) else {
                continue;
            };
            let apothem = hex.apothem() as f32;
            if apothem.is_nan() || apothem <= 0.0 {
                continue;
            }
            let rgb = normalize_rgb(d.color);
            let color = [rgb[0], rgb[1], rgb[2], normalize_alpha(d.alpha)];
            let ring = [
                apothem * d.radius_ratio,
                apothem * d.width_ratio,
                apothem * d.feather_ratio,
                0.0,
            ];
            for p in hex.fan() {
                out.push(HexCapitalRingVertex {
                    position: [p[0] as f32, p[1] as f32],
                    local: hex.local(p),
                    color,
                    ring,
                });
            }
        }
        out
    }
}

/// CPU mirror of the annulus coverage at distance `dist` from the center.
pub fn ring_alpha(dist: f32, radius: f32, width: f32, feather: f32) -> f32 {
    let inner = radius - width * 0.5;
    let outer = radius + width * 0.5;
    let feather = feather.max(1e-9);
    smoothstep(inner - feather, inner, dist) * (1.0 - smoothstep(outer, outer + feather, dist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontline_shared::hex::regular_contour;

    #[test]
    fn ring_scales_with_apothem() {
        let small = HexCapitalRingDatum::new(
            "1-1".into(),
            [0.0, 0.0],
            regular_contour([0.0, 0.0], 0.5).to_vec(),
            [1.0, 0.0, 0.0],
        );
        let mut large = small.clone();
        large.vertices = regular_contour([0.0, 0.0], 1.0).to_vec();
        let a = HexCapitalRingLayer::build_vertices(&[small]);
        let b = HexCapitalRingLayer::build_vertices(&[large]);
        assert_eq!(a.len(), 18);
        let ratio = b[0].ring[0] / a[0].ring[0];
        assert!((ratio - 2.0).abs() < 0.01, "ratio was {ratio}");
    }

    #[test]
    fn malformed_ring_datum_yields_no_vertices() {
        let d = HexCapitalRingDatum::new("1-1".into(), [0.0, 0.0], vec![[0.0, 0.0]; 5], [255.0, 0.0, 0.0]);
        assert!(HexCapitalRingLayer::build_vertices(&[d]).is_empty());
    }

    #[test]
    fn annulus_is_opaque_on_the_ring_and_clear_elsewhere() {
        let (r, w, f) = (0.6, 0.14, 0.05);
        assert_eq!(ring_alpha(0.6, r, w, f), 1.0);
        assert_eq!(ring_alpha(0.0, r, w, f), 0.0);
        assert_eq!(ring_alpha(0.9, r, w, f), 0.0);
        let edge = ring_alpha(0.6 + 0.07 + 0.025, r, w, f);
        assert!(edge > 0.0 && edge < 1.0);
    }
}
