use bytemuck::{Pod, Zeroable};
use frontline_shared::HexId;
use frontline_shared::colors::normalize_rgb;

use super::mesh::{FAN_VERTICES_PER_HEX, HexMeshLayer, ProjectedHex};

/// Procedural fill selected per hex. Discriminants match `prototype_hex.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PatternKind {
    Grain = 0,
    Mountain = 1,
    MixedTerrain = 2,
    ForestCanopy = 3,
}

impl PatternKind {
    /// Terrain pattern suggested by a resource key.
    pub fn for_resource(key: &str) -> Self {
        let key = key.to_ascii_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| key.contains(w));
        if has(&["grain", "wheat", "food", "crop"]) {
            PatternKind::Grain
        } else if has(&["stone", "iron", "ore", "metal", "coal"]) {
            PatternKind::Mountain
        } else if has(&["wood", "timber", "lumber", "forest"]) {
            PatternKind::ForestCanopy
        } else {
            PatternKind::MixedTerrain
        }
    }
}

pub const DEFAULT_PATTERN_SCALE: f32 = 7.0;
pub const DEFAULT_PROTOTYPE_BORDER_RATIO: f32 = 0.08;
pub const DEFAULT_BORDER_COLOR: [f32; 3] = [0.95, 0.92, 0.78];
pub const DEFAULT_FILL_INTENSITY: f32 = 0.85;
pub const DEFAULT_GLOSS_INTENSITY: f32 = 0.25;
pub const DEFAULT_NOISE_INTENSITY: f32 = 0.12;
pub const DEFAULT_CUBE_SHADING_INTENSITY: f32 = 0.3;

/// One independently switchable effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectToggle {
    pub enabled: bool,
    pub color: [f32; 3],
    pub intensity: f32,
}

impl EffectToggle {
    pub const fn on(color: [f32; 3], intensity: f32) -> Self {
        Self {
            enabled: true,
            color,
            intensity,
        }
    }

    /// `rgb + intensity`, intensity zeroed when disabled.
    fn packed(&self) -> [f32; 4] {
        let rgb = normalize_rgb(self.color);
        let k = if self.enabled {
            self.intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        [rgb[0], rgb[1], rgb[2], k]
    }
}

/// Layer-wide look of the decorative hex style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrototypeHexStyle {
    pub pattern_scale: f32,
    pub border_width_ratio: f32,
    pub border: EffectToggle,
    pub fill: EffectToggle,
    pub gloss: EffectToggle,
    pub noise: EffectToggle,
    pub cube_shading: EffectToggle,
}

impl Default for PrototypeHexStyle {
    fn default() -> Self {
        Self {
            pattern_scale: DEFAULT_PATTERN_SCALE,
            border_width_ratio: DEFAULT_PROTOTYPE_BORDER_RATIO,
            border: EffectToggle::on(DEFAULT_BORDER_COLOR, 1.0),
            fill: EffectToggle::on([1.0, 1.0, 1.0], DEFAULT_FILL_INTENSITY),
            gloss: EffectToggle::on([1.0, 1.0, 1.0], DEFAULT_GLOSS_INTENSITY),
            noise: EffectToggle::on([0.0, 0.0, 0.0], DEFAULT_NOISE_INTENSITY),
            cube_shading: EffectToggle::on([0.0, 0.0, 0.0], DEFAULT_CUBE_SHADING_INTENSITY),
        }
    }
}

impl PrototypeHexStyle {
    pub fn uniforms(&self) -> PrototypeHexUniforms {
        PrototypeHexUniforms {
            border: self.border.packed(),
            fill: self.fill.packed(),
            gloss: self.gloss.packed(),
            noise: self.noise.packed(),
            cube: self.cube_shading.packed(),
            params: [self.pattern_scale.max(1.0), self.border_width_ratio.max(0.0), 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PrototypeHexUniforms {
    pub border: [f32; 4],
    pub fill: [f32; 4],
    pub gloss: [f32; 4],
    pub noise: [f32; 4],
    pub cube: [f32; 4],
    /// pattern scale, border width ratio, unused, unused.
    pub params: [f32; 4],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrototypeHexDatum {
    pub hex_id: String,
    pub center: [f64; 2],
    pub vertices: Vec<[f64; 2]>,
    pub base_color: [f32; 3],
    pub pattern: PatternKind,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PrototypeHexVertex {
    pub position: [f32; 2],
    pub local: [f32; 2],
    pub color: [f32; 4],
    /// kind, seed, apothem, unused.
    pub pattern: [f32; 4],
}

pub struct PrototypeHexStyleLayer;

impl HexMeshLayer for PrototypeHexStyleLayer {
    type Datum = PrototypeHexDatum;
    type Vertex = PrototypeHexVertex;

    fn build_vertices(data: &[PrototypeHexDatum]) -> Vec<PrototypeHexVertex> {
        let mut out = Vec::with_capacity(data.len() * FAN_VERTICES_PER_HEX);
        for d in data {
            let Some(hex) = ProjectedHex::from_lnglat(d.center, &d.vertices) else {
                continue;
            };
            let rgb = normalize_rgb(d.base_color);
            let pattern = [
                d.pattern as u32 as f32,
                position_seed(&d.hex_id) as f32,
                hex.apothem() as f32,
                0.0,
            ];
            for p in hex.fan() {
                out.push(PrototypeHexVertex {
                    position: [p[0] as f32, p[1] as f32],
                    local: hex.local(p),
                    color: [rgb[0], rgb[1], rgb[2], 1.0],
                    pattern,
                });
            }
        }
        out
    }
}

/// Seed derived from grid position. Kept below 2^24 so it survives the f32 attribute.
pub fn position_seed(hex_id: &str) -> u32 {
    let (row, col) = HexId::parse(hex_id).map_or((0, 0), |h| (h.row, h.col));
    ((row as u32).wrapping_mul(73_856_093) ^ (col as u32).wrapping_mul(19_349_663)) & 0x00ff_ffff
}

fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// Integer lattice hash in [0, 1). Same bit operations as the WGSL `hash2`.
pub fn hash2(x: i32, y: i32, seed: u32) -> f32 {
    let h = hash_u32(
        (x as u32).wrapping_mul(0x8da6_b343)
            ^ (y as u32).wrapping_mul(0xd816_3841)
            ^ seed.wrapping_mul(0xcb1a_b31f),
    );
    (h >> 8) as f32 / 16_777_216.0
}

fn mountain_ridge(x: f32) -> f32 {
    (0.72 - (x - 0.28).abs() * 1.6).max(0.5 - (x + 0.36).abs() * 1.8)
}

/// CPU mirror of the fragment pattern value at `p` (apothem-normalized local
/// coordinates, y pointing south). Deterministic in its inputs.
pub fn pattern_value(kind: PatternKind, p: [f32; 2], seed: u32, scale: f32) -> f32 {
    let cell = [(p[0] * scale).floor() as i32, (p[1] * scale).floor() as i32];
    match kind {
        PatternKind::Grain => 0.25 + 0.75 * hash2(cell[0], cell[1], seed),
        PatternKind::Mountain => {
            let up = -p[1];
            let ridge = mountain_ridge(p[0]);
            if up > ridge {
                0.0
            } else if ridge > 0.45 && up > ridge - 0.14 {
                1.0
            } else {
                0.7
            }
        }
        PatternKind::ForestCanopy => forest(p, cell, seed, scale),
        PatternKind::MixedTerrain => {
            let coarse = [(p[0] * 2.0).floor() as i32, (p[1] * 2.0).floor() as i32];
            if hash2(coarse[0], coarse[1], seed ^ 0x5bd1) < 0.5 {
                0.25 + 0.75 * hash2(cell[0], cell[1], seed)
            } else {
                forest(p, cell, seed, scale)
            }
        }
    }
}

fn forest(p: [f32; 2], cell: [i32; 2], seed: u32, scale: f32) -> f32 {
    let jx = 0.3 + 0.4 * hash2(cell[0], cell[1], seed);
    let jy = 0.3 + 0.4 * hash2(cell[1], cell[0], seed ^ 0x9e37);
    let fx = p[0] * scale - cell[0] as f32 - jx;
    let fy = p[1] * scale - cell[1] as f32 - jy;
    if fx * fx + fy * fy < 0.32 * 0.32 { 1.0 } else { 0.15 }
}
