use std::collections::HashMap;

use frontline_shared::colors::mix_rgb;
use frontline_shared::lighting::{daylight, tile_normal};
use frontline_shared::{HexTile, OwnershipMap};

/// Alpha for tiles carrying an explicit ownership color.
pub const OWNED_ALPHA: u8 = 180;
/// Alpha for lit (unowned) tiles.
pub const LIT_ALPHA: u8 = 215;
/// Floor for the eviction threshold; the effective bound is `max(this, grid size)`.
pub const MIN_CACHE_CAPACITY: usize = 2000;
const EVICT_FRACTION: f64 = 0.2;

const DAYLIGHT_GAMMA: f64 = 0.55;
const HIGHLIGHT_THRESHOLD: f64 = 0.6;
const HIGHLIGHT_EXPONENT: f64 = 1.35;
/// Base blend toward the highlight color before theme scaling.
pub const HIGHLIGHT_MIX: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => DARK_PALETTE,
            Theme::Light => LIGHT_PALETTE,
        }
    }

    /// Canvas clear color, normalized.
    pub fn background(self) -> [f64; 3] {
        match self {
            Theme::Dark => [0.047, 0.055, 0.090],
            Theme::Light => [0.86, 0.88, 0.91],
        }
    }

    fn highlight_strength(self) -> f64 {
        match self {
            Theme::Dark => 0.55,
            Theme::Light => 1.35,
        }
    }

    fn shadow_exponent(self) -> f64 {
        match self {
            Theme::Dark => 1.0,
            Theme::Light => 1.35,
        }
    }

    /// Most a channel can be darkened in full shadow.
    fn shadow_depth(self) -> f64 {
        match self {
            Theme::Dark => 10.0,
            Theme::Light => 34.0,
        }
    }
}

/// Base colors an unowned tile blends between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub night: [f64; 3],
    pub day: [f64; 3],
    pub highlight: [f64; 3],
}

pub const DARK_PALETTE: Palette = Palette {
    night: [14.0, 20.0, 34.0],
    day: [52.0, 68.0, 92.0],
    highlight: [168.0, 188.0, 214.0],
};

pub const LIGHT_PALETTE: Palette = Palette {
    night: [118.0, 130.0, 150.0],
    day: [212.0, 220.0, 228.0],
    highlight: [255.0, 248.0, 230.0],
};

/// Everything a cached tile color depends on besides the tile itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorInputs {
    pub lighting_enabled: bool,
    pub sun: [f64; 3],
    pub theme: Theme,
    pub ownership_generation: u64,
}

impl ColorInputs {
    fn signature(&self) -> (bool, [u64; 3], Theme, u64) {
        (
            self.lighting_enabled,
            self.sun.map(f64::to_bits),
            self.theme,
            self.ownership_generation,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileColor {
    pub rgb: [u8; 3],
    pub alpha: u8,
}

impl TileColor {
    /// Normalized RGBA for vertex upload.
    pub fn to_rgba_f32(self) -> [f32; 4] {
        [
            self.rgb[0] as f32 / 255.0,
            self.rgb[1] as f32 / 255.0,
            self.rgb[2] as f32 / 255.0,
            self.alpha as f32 / 255.0,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    color: TileColor,
    last_access: u64,
}

/// Per-tile fill color cache, cleared wholesale when any [`ColorInputs`] field changes.
#[derive(Debug, Clone, Default)]
pub struct ColorCache {
    entries: HashMap<String, Entry>,
    tick: u64,
    signature: Option<(bool, [u64; 3], Theme, u64)>,
    grid_size: usize,
}

impl ColorCache {
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid_size,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity_limit(&self) -> usize {
        MIN_CACHE_CAPACITY.max(self.grid_size)
    }

    pub fn set_grid_size(&mut self, grid_size: usize) {
        self.grid_size = grid_size;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Clear when the inputs changed since the last call. Returns true if cleared.
    pub fn sync(&mut self, inputs: &ColorInputs) -> bool {
        let sig = inputs.signature();
        if self.signature == Some(sig) {
            return false;
        }
        self.signature = Some(sig);
        self.clear();
        true
    }

    pub fn compute_tile_color(
        &mut self,
        tile: &HexTile,
        inputs: &ColorInputs,
        ownership: &OwnershipMap,
    ) -> TileColor {
        self.sync(inputs);
        self.tick += 1;
        let tick = self.tick;
        if let Some(entry) = self.entries.get_mut(&tile.id) {
            entry.last_access = tick;
            return entry.color;
        }

        let color = match ownership.get(&tile.id).and_then(|o| o.color()) {
            Some((r, g, b)) => TileColor {
                rgb: [r, g, b],
                alpha: OWNED_ALPHA,
            },
            None => {
                let d = daylight(tile_normal(tile.center[0], tile.center[1]), inputs.sun);
                lit_color(d, inputs.theme, inputs.lighting_enabled)
            }
        };

        self.entries.insert(
            tile.id.clone(),
            Entry {
                color,
                last_access: tick,
            },
        );
        if self.entries.len() > self.capacity_limit() {
            self.evict_oldest();
        }
        color
    }

    fn evict_oldest(&mut self) {
        let mut by_age: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(id, e)| (e.last_access, id.clone()))
            .collect();
        by_age.sort_unstable();
        let count = ((by_age.len() as f64 * EVICT_FRACTION).ceil() as usize).max(1);
        for (_, id) in by_age.into_iter().take(count) {
            self.entries.remove(&id);
        }
    }
}

/// Color of an unowned tile at a given daylight scalar.
pub fn lit_color(daylight: f64, theme: Theme, lighting_enabled: bool) -> TileColor {
    let d = daylight.clamp(0.0, 1.0);
    let palette = theme.palette();
    let mut rgb = mix_rgb(palette.night, palette.day, d.powf(DAYLIGHT_GAMMA));

    if lighting_enabled {
        if d > HIGHLIGHT_THRESHOLD {
            let k = ((d - HIGHLIGHT_THRESHOLD) / (1.0 - HIGHLIGHT_THRESHOLD)).powf(HIGHLIGHT_EXPONENT);
            let mix = (k * theme.highlight_strength() * HIGHLIGHT_MIX).clamp(0.0, 1.0);
            rgb = mix_rgb(rgb, palette.highlight, mix);
        }
        if d < 1.0 {
            let shadow = (1.0 - d).powf(theme.shadow_exponent());
            let darken = shadow * theme.shadow_depth();
            rgb = rgb.map(|c| (c - darken).max(0.0));
        }
    }

    TileColor {
        rgb: rgb.map(|c| c.round().clamp(0.0, 255.0) as u8),
        alpha: LIT_ALPHA,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontline_shared::hex::regular_contour;
    use serde_json::json;

    fn tile(id: &str, lon: f64, lat: f64) -> HexTile {
        HexTile {
            id: id.to_string(),
            contour: regular_contour([lon, lat], 0.5),
            center: [lon, lat],
        }
    }

    fn inputs() -> ColorInputs {
        ColorInputs {
            lighting_enabled: true,
            sun: [1.0, 0.0, 0.0],
            theme: Theme::Dark,
            ownership_generation: 0,
        }
    }

    fn owned_map() -> OwnershipMap {
        serde_json::from_value(json!({
            "10-10": { "owner_community_id": "A", "communities": { "color": "#ff0000" } }
        }))
        .expect("ownership should deserialize")
    }

    #[test]
    fn ownership_color_wins_over_lighting() {
        let mut cache = ColorCache::new(10);
        let own = owned_map();
        for lighting_enabled in [true, false] {
            let mut i = inputs();
            i.lighting_enabled = lighting_enabled;
            let c = cache.compute_tile_color(&tile("10-10", 180.0, 0.0), &i, &own);
            assert_eq!(c, TileColor { rgb: [255, 0, 0], alpha: OWNED_ALPHA });
        }
    }

    #[test]
    fn lit_tiles_use_lit_alpha_and_get_brighter_toward_noon() {
        let night = lit_color(0.0, Theme::Dark, true);
        let dusk = lit_color(0.3, Theme::Dark, true);
        let noon = lit_color(1.0, Theme::Dark, true);
        assert_eq!(noon.alpha, LIT_ALPHA);
        let lum = |c: TileColor| c.rgb.iter().map(|v| *v as u32).sum::<u32>();
        assert!(lum(night) < lum(dusk));
        assert!(lum(dusk) < lum(noon));
    }

    #[test]
    fn full_shadow_darkens_by_theme_depth() {
        let dark_off = lit_color(0.0, Theme::Dark, false);
        let dark_on = lit_color(0.0, Theme::Dark, true);
        assert_eq!(dark_off.rgb[2] - dark_on.rgb[2], 10);
        let light_off = lit_color(0.0, Theme::Light, false);
        let light_on = lit_color(0.0, Theme::Light, true);
        assert_eq!(light_off.rgb[2] - light_on.rgb[2], 34);
    }

    #[test]
    fn highlight_only_above_threshold() {
        let palette = Theme::Dark.palette();
        let at_threshold = lit_color(0.6, Theme::Dark, true);
        let base = mix_rgb(palette.night, palette.day, 0.6f64.powf(DAYLIGHT_GAMMA));
        let shadow = 0.4 * 10.0;
        assert_eq!(at_threshold.rgb[0], (base[0] - shadow).round() as u8);
        let noon = lit_color(1.0, Theme::Dark, true);
        let noon_plain = lit_color(1.0, Theme::Dark, false);
        assert!(noon.rgb[0] > noon_plain.rgb[0]);
    }

    #[test]
    fn repeated_calls_are_deterministic() {
        let mut cache = ColorCache::new(10);
        let t = tile("3-4", 20.0, 10.0);
        let a = cache.compute_tile_color(&t, &inputs(), &OwnershipMap::new());
        let b = cache.compute_tile_color(&t, &inputs(), &OwnershipMap::new());
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn any_input_change_clears_the_cache() {
        let mut cache = ColorCache::new(10);
        let own = OwnershipMap::new();
        cache.compute_tile_color(&tile("0-0", 0.0, 0.0), &inputs(), &own);
        cache.compute_tile_color(&tile("0-1", 1.0, 0.0), &inputs(), &own);
        assert_eq!(cache.len(), 2);

        let mut toggled = inputs();
        toggled.lighting_enabled = false;
        assert!(cache.sync(&toggled));
        assert!(cache.is_empty());

        cache.compute_tile_color(&tile("0-0", 0.0, 0.0), &toggled, &own);
        let mut themed = toggled;
        themed.theme = Theme::Light;
        let light = cache.compute_tile_color(&tile("0-0", 0.0, 0.0), &themed, &own);
        assert_eq!(cache.len(), 1);
        assert_eq!(light, lit_color(1.0, Theme::Light, false));

        let mut recolored = themed;
        recolored.ownership_generation = 7;
        assert!(cache.sync(&recolored));
        assert!(!cache.sync(&recolored));
    }

    #[test]
    fn eviction_keeps_size_bounded_and_drops_oldest() {
        let mut cache = ColorCache::new(0);
        let own = OwnershipMap::new();
        let limit = cache.capacity_limit();
        let tiles: Vec<HexTile> = (0..limit + 50)
            .map(|i| tile(&format!("{}-{}", i / 100, i % 100), 0.0, 0.0))
            .collect();
        for t in &tiles {
            cache.compute_tile_color(t, &inputs(), &own);
            assert!(cache.len() <= limit);
        }
        // The first tiles were the least recently used and must be gone.
        assert!(!cache.entries.contains_key(&tiles[0].id));
        assert!(cache.entries.contains_key(&tiles[limit + 49].id));
    }
}
