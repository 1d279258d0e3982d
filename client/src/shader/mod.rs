//! CPU halves of the hex shader layers: datum types, vertex layouts,
//! uniform records and the mesh builders that feed `crate::gpu`.

pub mod border;
pub mod capital_ring;
pub mod fill;
pub mod mesh;
pub mod overlay;
pub mod prototype;

pub use border::{HexBorderDatum, HexBorderLayer, HexBorderUniforms, HexBorderVertex};
pub use capital_ring::{HexCapitalRingDatum, HexCapitalRingLayer, HexCapitalRingUniforms, HexCapitalRingVertex};
pub use fill::{FillVertex, TileFillDatum, TileFillLayer};
pub use mesh::{FAN_VERTICES_PER_HEX, HexMeshLayer, ProjectedHex};
pub use overlay::OverlayVertex;
pub use prototype::{PatternKind, PrototypeHexDatum, PrototypeHexStyle, PrototypeHexStyleLayer, PrototypeHexUniforms, PrototypeHexVertex};

/// Hermite step matching WGSL `smoothstep`.
pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
