use crate::viewport::lnglat_to_mercator;

/// Center plus 6 boundary points expanded to 6 triangles.
pub const FAN_VERTICES_PER_HEX: usize = 18;

/// A validated hexagon projected to Web-Mercator unit space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedHex {
    pub center: [f64; 2],
    pub vertices: [[f64; 2]; 6],
}

impl ProjectedHex {
    /// `None` unless there are exactly 6 finite vertices and a finite center.
    pub fn from_lnglat(center: [f64; 2], vertices: &[[f64; 2]]) -> Option<Self> {
        let finite = |p: &[f64; 2]| p[0].is_finite() && p[1].is_finite();
        if vertices.len() != 6 || !finite(&center) || !vertices.iter().all(finite) {
            return None;
        }
        let mut projected = [[0.0; 2]; 6];
        for (out, v) in projected.iter_mut().zip(vertices) {
            *out = lnglat_to_mercator(v[0], v[1]);
        }
        Some(Self {
            center: lnglat_to_mercator(center[0], center[1]),
            vertices: projected,
        })
    }

    /// Vertex offsets from the center, small enough to keep full f32 precision.
    pub fn local_vertices(&self) -> [[f32; 2]; 6] {
        self.vertices.map(|v| self.local(v))
    }

    pub fn local(&self, p: [f64; 2]) -> [f32; 2] {
        [(p[0] - self.center[0]) as f32, (p[1] - self.center[1]) as f32]
    }

    /// Mean center-to-edge-midpoint distance, in mercator units.
    pub fn apothem(&self) -> f64 {
        let sum: f64 = (0..6)
            .map(|i| {
                let a = self.vertices[i];
                let b = self.vertices[(i + 1) % 6];
                let mid = [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0];
                (mid[0] - self.center[0]).hypot(mid[1] - self.center[1])
            })
            .sum();
        sum / 6.0
    }

    /// Triangle-fan corners in draw order: `center, v[i], v[i+1]` for each edge.
    pub fn fan(&self) -> [[f64; 2]; FAN_VERTICES_PER_HEX] {
        let mut out = [[0.0; 2]; FAN_VERTICES_PER_HEX];
        for i in 0..6 {
            out[i * 3] = self.center;
            out[i * 3 + 1] = self.vertices[i];
            out[i * 3 + 2] = self.vertices[(i + 1) % 6];
        }
        out
    }
}

/// Pack six local vertex offsets into the three vec4 attributes the hex shaders read.
pub fn pack_local_vertices(local: &[[f32; 2]; 6]) -> [[f32; 4]; 3] {
    [
        [local[0][0], local[0][1], local[1][0], local[1][1]],
        [local[2][0], local[2][1], local[3][0], local[3][1]],
        [local[4][0], local[4][1], local[5][0], local[5][1]],
    ]
}

/// A shader layer's CPU half: turns datums into a flat vertex buffer.
///
/// Malformed datums contribute no vertices; a batch of only malformed datums
/// yields an empty buffer and the layer issues no draw call.
pub trait HexMeshLayer {
    type Datum;
    type Vertex: bytemuck::Pod;

    fn build_vertices(data: &[Self::Datum]) -> Vec<Self::Vertex>;
}
