use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use frontline_shared::colors::lighten;
use frontline_shared::overlay::{capital_hexes, hexes_by_owner, ownership_color_generation, resource_zone};
use frontline_shared::{BattleRecord, BoundarySet, HexGridIndex, OwnershipMap, ResourceDistribution, faction_color};

use crate::battle::{BattleVisual, battle_overlay_vertices, ping_state, resolve_battle_visuals};
use crate::color_cache::{ColorCache, ColorInputs, Theme};
use crate::shader::border::{
    DEFAULT_BORDER_WIDTH_PX, SELECTION_BORDER_WIDTH_PX, group_border_data, reveal_order,
};
use crate::shader::fill::basemap_line_vertices;
use crate::shader::{
    FillVertex, HexBorderLayer, HexBorderUniforms, HexBorderVertex, HexCapitalRingDatum, HexCapitalRingLayer,
    HexCapitalRingUniforms, HexCapitalRingVertex, HexMeshLayer, OverlayVertex, PatternKind, PrototypeHexDatum,
    PrototypeHexStyle, PrototypeHexStyleLayer, PrototypeHexUniforms, PrototypeHexVertex, TileFillDatum, TileFillLayer,
};
use crate::viewport::TILE_SIZE;

const TERRITORY_BORDER_ALPHA: f32 = 0.9;
const ZONE_BORDER_ALPHA: f32 = 1.0;
const ZONE_LIGHTEN: f64 = 0.15;
const RESOURCE_BASE_ALPHA: f32 = 0.22;
const RESOURCE_PERCENT_ALPHA: f32 = 0.45;
const SELECTION_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
const PREVIEW_BASE_COLOR: [f32; 3] = [70.0, 110.0, 70.0];

fn basemap_color(theme: Theme) -> [f32; 4] {
    match theme {
        Theme::Dark => [0.55, 0.62, 0.72, 0.45],
        Theme::Light => [0.25, 0.28, 0.32, 0.5],
    }
}

/// Draw order, bottom to top.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum LayerKind {
    Basemap,
    TileFill,
    ResourceOverlay,
    TerritoryBorders,
    ZoneBorders,
    SelectionBorder,
    CapitalRings,
    PrototypeStyle,
    Battles,
}

impl LayerKind {
    pub const ALL: [LayerKind; 9] = [
        LayerKind::Basemap,
        LayerKind::TileFill,
        LayerKind::ResourceOverlay,
        LayerKind::TerritoryBorders,
        LayerKind::ZoneBorders,
        LayerKind::SelectionBorder,
        LayerKind::CapitalRings,
        LayerKind::PrototypeStyle,
        LayerKind::Battles,
    ];
}

/// Vertex data for one layer, tagged with the pipeline that draws it.
#[derive(Clone, Debug)]
pub enum LayerData {
    Lines(Rc<Vec<FillVertex>>),
    Fill(Rc<Vec<FillVertex>>),
    Border(Rc<Vec<HexBorderVertex>>),
    CapitalRing(Rc<Vec<HexCapitalRingVertex>>),
    Prototype(Rc<Vec<PrototypeHexVertex>>),
    Overlay(Rc<Vec<OverlayVertex>>),
}

impl LayerData {
    pub fn vertex_count(&self) -> usize {
        match self {
            LayerData::Lines(v) | LayerData::Fill(v) => v.len(),
            LayerData::Border(v) => v.len(),
            LayerData::CapitalRing(v) => v.len(),
            LayerData::Prototype(v) => v.len(),
            LayerData::Overlay(v) => v.len(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            LayerData::Lines(v) | LayerData::Fill(v) => bytemuck::cast_slice(v.as_slice()),
            LayerData::Border(v) => bytemuck::cast_slice(v.as_slice()),
            LayerData::CapitalRing(v) => bytemuck::cast_slice(v.as_slice()),
            LayerData::Prototype(v) => bytemuck::cast_slice(v.as_slice()),
            LayerData::Overlay(v) => bytemuck::cast_slice(v.as_slice()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Layer {
    pub kind: LayerKind,
    /// Bumped whenever the vertex data is recomputed.
    pub generation: u64,
    pub data: LayerData,
}

/// Complete, ordered set of layers for one frame.
#[derive(Debug, Default)]
pub struct LayerList {
    pub layers: Vec<Layer>,
}

impl LayerList {
    pub fn get(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind == kind)
    }

    /// Layers that will issue a draw call.
    pub fn draw_calls(&self) -> usize {
        self.layers.iter().filter(|l| l.data.vertex_count() > 0).count()
    }
}

/// Identity handle: equal only to clones of the same allocation.
#[derive(Debug)]
pub struct ByPtr<T>(pub Arc<T>);

impl<T> Clone for ByPtr<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for ByPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn by_ptr<T>(arc: &Arc<T>) -> ByPtr<T> {
    ByPtr(Arc::clone(arc))
}

/// A value recomputed only when its input signature changes.
#[derive(Debug)]
pub struct Memo<K, T> {
    key: Option<K>,
    value: Option<Rc<T>>,
    generation: u64,
}

impl<K, T> Default for Memo<K, T> {
    fn default() -> Self {
        Self {
            key: None,
            value: None,
            generation: 0,
        }
    }
}

impl<K: PartialEq, T> Memo<K, T> {
    pub fn get(&mut self, key: K, compute: impl FnOnce() -> T) -> Rc<T> {
        if let (Some(k), Some(v)) = (&self.key, &self.value)
            && *k == key
        {
            return Rc::clone(v);
        }
        let value = Rc::new(compute());
        self.key = Some(key);
        self.value = Some(Rc::clone(&value));
        self.generation += 1;
        value
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// User-facing switches that affect layer content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    pub theme: Theme,
    pub lighting_enabled: bool,
    pub show_basemap: bool,
    pub show_resources: bool,
    pub show_territory_borders: bool,
    pub zone_reveal: bool,
    pub terrain_preview: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            lighting_enabled: true,
            show_basemap: true,
            show_resources: false,
            show_territory_borders: true,
            zone_reveal: true,
            terrain_preview: true,
        }
    }
}

/// Everything layer composition reads. Shared data is passed as `Arc` and
/// compared by identity, so a new allocation means "changed".
#[derive(Clone, Debug)]
pub struct SceneInputs {
    pub grid: Arc<HexGridIndex>,
    pub ownership: Arc<OwnershipMap>,
    pub battles: Arc<Vec<BattleRecord>>,
    pub resources: Option<Arc<ResourceDistribution>>,
    pub countries: Option<Arc<BoundarySet>>,
    pub provinces: Option<Arc<BoundarySet>>,
    pub options: RenderOptions,
    pub sun: [f64; 3],
    pub selected: Option<String>,
    /// Resource key whose zone is highlighted.
    pub selected_zone: Option<String>,
    pub anim_time_ms: f64,
    pub visual_zoom: f64,
}

impl SceneInputs {
    pub fn new(grid: Arc<HexGridIndex>) -> Self {
        Self {
            grid,
            ownership: Arc::default(),
            battles: Arc::default(),
            resources: None,
            countries: None,
            provinces: None,
            options: RenderOptions::default(),
            sun: [1.0, 0.0, 0.0],
            selected: None,
            selected_zone: None,
            anim_time_ms: 0.0,
            visual_zoom: 2.0,
        }
    }
}

/// Scalar values written to the uniform buffers every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    pub territory_border: HexBorderUniforms,
    pub zone_border: HexBorderUniforms,
    pub selection_border: HexBorderUniforms,
    pub capital_ring: HexCapitalRingUniforms,
    pub prototype: PrototypeHexUniforms,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            territory_border: HexBorderUniforms::default(),
            zone_border: HexBorderUniforms::default(),
            selection_border: HexBorderUniforms::default(),
            capital_ring: HexCapitalRingUniforms::default(),
            prototype: PrototypeHexStyle::default().uniforms(),
        }
    }
}

/// Per-frame metrics for perf instrumentation and telemetry.
#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct FrameMetrics {
    pub frame_cpu_ms: f64,
    pub draw_calls: u32,
    pub layers_rebuilt: u32,
    pub vertices_uploaded: u64,
    pub bytes_uploaded: u64,
    pub fps_estimate: f64,
}

fn rgb_f32((r, g, b): (u8, u8, u8)) -> [f32; 3] {
    [r as f32, g as f32, b as f32]
}

type GridKey = ByPtr<HexGridIndex>;
type OwnKey = ByPtr<OwnershipMap>;

/// Composes every layer from memoized parts.
#[derive(Default)]
pub struct HexMapRenderer {
    colors: ColorCache,
    color_generation: Memo<OwnKey, u64>,
    basemap: Memo<(Option<ByPtr<BoundarySet>>, Option<ByPtr<BoundarySet>>, bool, Theme), Vec<FillVertex>>,
    tile_fill: Memo<(GridKey, OwnKey, bool, [u64; 3], Theme), Vec<FillVertex>>,
    resource_fill: Memo<(GridKey, Option<ByPtr<ResourceDistribution>>, bool), Vec<FillVertex>>,
    territory_borders: Memo<(GridKey, OwnKey, bool), Vec<HexBorderVertex>>,
    zone_borders: Memo<(GridKey, Option<ByPtr<ResourceDistribution>>, Option<String>, Option<String>), Vec<HexBorderVertex>>,
    selection_border: Memo<(GridKey, Option<String>), Vec<HexBorderVertex>>,
    capital_rings: Memo<(GridKey, OwnKey), Vec<HexCapitalRingVertex>>,
    prototype: Memo<(GridKey, Option<ByPtr<ResourceDistribution>>, OwnKey, Option<String>, bool), Vec<PrototypeHexVertex>>,
    battle_visuals: Memo<(GridKey, OwnKey, ByPtr<Vec<BattleRecord>>), Vec<BattleVisual>>,
    battle_overlay: Memo<(u64, u64, u64), Vec<OverlayVertex>>,
    last: Option<(Vec<u64>, Rc<LayerList>)>,
}

impl HexMapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the ordered layer list. Returns the previous `Rc` untouched
    /// when no layer was recomputed.
    pub fn compose(&mut self, inputs: &SceneInputs) -> Rc<LayerList> {
        let grid = by_ptr(&inputs.grid);
        let own = by_ptr(&inputs.ownership);
        let res = inputs.resources.as_ref().map(by_ptr);
        let opts = inputs.options;

        self.colors.set_grid_size(inputs.grid.len());
        let ownership = &inputs.ownership;
        let ownership_generation = *self
            .color_generation
            .get(own.clone(), || ownership_color_generation(ownership));

        let basemap = self.basemap.get(
            (
                inputs.countries.as_ref().map(by_ptr),
                inputs.provinces.as_ref().map(by_ptr),
                opts.show_basemap,
                opts.theme,
            ),
            || {
                if !opts.show_basemap {
                    return Vec::new();
                }
                let sets: Vec<&BoundarySet> = inputs
                    .countries
                    .iter()
                    .chain(inputs.provinces.iter())
                    .map(|s| s.as_ref())
                    .collect();
                basemap_line_vertices(&sets, basemap_color(opts.theme))
            },
        );

        let color_inputs = ColorInputs {
            lighting_enabled: opts.lighting_enabled,
            sun: inputs.sun,
            theme: opts.theme,
            ownership_generation,
        };
        let colors = &mut self.colors;
        let tile_fill = self.tile_fill.get(
            (
                grid.clone(),
                own.clone(),
                opts.lighting_enabled,
                inputs.sun.map(f64::to_bits),
                opts.theme,
            ),
            || {
                let data: Vec<TileFillDatum> = inputs
                    .grid
                    .iter()
                    .map(|tile| TileFillDatum {
                        center: tile.center,
                        vertices: tile.contour,
                        color: colors.compute_tile_color(tile, &color_inputs, ownership).to_rgba_f32(),
                    })
                    .collect();
                TileFillLayer::build_vertices(&data)
            },
        );

        let resource_fill = self.resource_fill.get((grid.clone(), res.clone(), opts.show_resources), || {
            match (&inputs.resources, opts.show_resources) {
                (Some(dist), true) => resource_fill_vertices(&inputs.grid, dist),
                _ => Vec::new(),
            }
        });

        let territory_borders = self.territory_borders.get(
            (grid.clone(), own.clone(), opts.show_territory_borders),
            || {
                if opts.show_territory_borders {
                    territory_border_vertices(&inputs.grid, ownership)
                } else {
                    Vec::new()
                }
            },
        );

        let zone_start = inputs.selected_zone.as_ref().and(inputs.selected.clone());
        let zone_borders = self.zone_borders.get(
            (grid.clone(), res.clone(), inputs.selected_zone.clone(), zone_start.clone()),
            || match (&inputs.resources, &inputs.selected_zone) {
                (Some(dist), Some(key)) => zone_border_vertices(&inputs.grid, dist, key, zone_start.as_deref()),
                _ => Vec::new(),
            },
        );

        let selection_border = self.selection_border.get((grid.clone(), inputs.selected.clone()), || {
            let Some(id) = inputs.selected.as_deref() else {
                return Vec::new();
            };
            let data = group_border_data(
                &[id],
                &inputs.grid,
                SELECTION_COLOR,
                1.0,
                SELECTION_BORDER_WIDTH_PX,
                None,
            );
            HexBorderLayer::build_vertices(&data)
        });

        let capital_rings = self.capital_rings.get((grid.clone(), own.clone()), || {
            HexCapitalRingLayer::build_vertices(&capital_ring_data(&inputs.grid, ownership))
        });

        let prototype = self.prototype.get(
            (
                grid.clone(),
                res.clone(),
                own.clone(),
                inputs.selected.clone(),
                opts.terrain_preview,
            ),
            || {
                if !opts.terrain_preview {
                    return Vec::new();
                }
                let data: Vec<PrototypeHexDatum> = inputs
                    .selected
                    .as_deref()
                    .and_then(|id| preview_datum(&inputs.grid, inputs.resources.as_deref(), ownership, id))
                    .into_iter()
                    .collect();
                PrototypeHexStyleLayer::build_vertices(&data)
            },
        );

        let battles = &inputs.battles;
        let visuals = self.battle_visuals.get((grid.clone(), own.clone(), by_ptr(battles)), || {
            resolve_battle_visuals(battles, &inputs.grid, ownership)
        });
        // Idle battle sets must not rebuild on every clock tick.
        let (time_key, zoom_key) = if visuals.is_empty() {
            (0, 0)
        } else {
            (inputs.anim_time_ms.to_bits(), inputs.visual_zoom.to_bits())
        };
        let battle_overlay = self.battle_overlay.get((self.battle_visuals.generation(), time_key, zoom_key), || {
            let ping = ping_state(inputs.anim_time_ms, inputs.visual_zoom);
            battle_overlay_vertices(&visuals, &ping, inputs.visual_zoom, world_size(inputs.visual_zoom))
        });

        let layers = vec![
            Layer {
                kind: LayerKind::Basemap,
                generation: self.basemap.generation(),
                data: LayerData::Lines(basemap),
            },
            Layer {
                kind: LayerKind::TileFill,
                generation: self.tile_fill.generation(),
                data: LayerData::Fill(tile_fill),
            },
            Layer {
                kind: LayerKind::ResourceOverlay,
                generation: self.resource_fill.generation(),
                data: LayerData::Fill(resource_fill),
            },
            Layer {
                kind: LayerKind::TerritoryBorders,
                generation: self.territory_borders.generation(),
                data: LayerData::Border(territory_borders),
            },
            Layer {
                kind: LayerKind::ZoneBorders,
                generation: self.zone_borders.generation(),
                data: LayerData::Border(zone_borders),
            },
            Layer {
                kind: LayerKind::SelectionBorder,
                generation: self.selection_border.generation(),
                data: LayerData::Border(selection_border),
            },
            Layer {
                kind: LayerKind::CapitalRings,
                generation: self.capital_rings.generation(),
                data: LayerData::CapitalRing(capital_rings),
            },
            Layer {
                kind: LayerKind::PrototypeStyle,
                generation: self.prototype.generation(),
                data: LayerData::Prototype(prototype),
            },
            Layer {
                kind: LayerKind::Battles,
                generation: self.battle_overlay.generation(),
                data: LayerData::Overlay(battle_overlay),
            },
        ];

        let generations: Vec<u64> = layers.iter().map(|l| l.generation).collect();
        if let Some((prev, list)) = &self.last
            && *prev == generations
        {
            return Rc::clone(list);
        }
        let list = Rc::new(LayerList { layers });
        self.last = Some((generations, Rc::clone(&list)));
        list
    }

    /// Uniform values for the current frame.
    pub fn frame_uniforms(&self, inputs: &SceneInputs, world_size: f32, style: &PrototypeHexStyle) -> FrameUniforms {
        let base = HexBorderUniforms {
            world_size,
            ..HexBorderUniforms::default()
        };
        FrameUniforms {
            territory_border: base,
            zone_border: HexBorderUniforms {
                time_ms: inputs.anim_time_ms as f32,
                animate: if inputs.options.zone_reveal { 1.0 } else { 0.0 },
                ..base
            },
            selection_border: base,
            capital_ring: HexCapitalRingUniforms::default(),
            prototype: style.uniforms(),
        }
    }

    /// Battle visuals from the last `compose`.
    pub fn battle_visuals(&self) -> Option<Rc<Vec<BattleVisual>>> {
        self.battle_visuals.value.clone()
    }

    pub fn color_cache_len(&self) -> usize {
        self.colors.len()
    }
}

pub fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * zoom.exp2()
}

fn resource_fill_vertices(grid: &HexGridIndex, dist: &ResourceDistribution) -> Vec<FillVertex> {
    let data: Vec<TileFillDatum> = dist
        .iter()
        .filter_map(|(id, bonus)| {
            let tile = grid.get(id)?;
            let (r, g, b) = faction_color(&bonus.resource_key);
            let pct = (bonus.percentage as f32 / 100.0).clamp(0.0, 1.0);
            Some(TileFillDatum {
                center: tile.center,
                vertices: tile.contour,
                color: [
                    r as f32 / 255.0,
                    g as f32 / 255.0,
                    b as f32 / 255.0,
                    RESOURCE_BASE_ALPHA + RESOURCE_PERCENT_ALPHA * pct,
                ],
            })
        })
        .collect();
    TileFillLayer::build_vertices(&data)
}

fn territory_border_vertices(grid: &HexGridIndex, ownership: &OwnershipMap) -> Vec<HexBorderVertex> {
    let mut groups: Vec<(&str, Vec<&str>)> = hexes_by_owner(ownership).into_iter().collect();
    groups.sort_unstable_by_key(|(owner, _)| *owner);
    let mut data = Vec::new();
    for (owner, ids) in groups {
        let color = ids
            .iter()
            .find_map(|id| ownership.get(*id).and_then(|o| o.color()))
            .unwrap_or_else(|| faction_color(owner));
        data.extend(group_border_data(
            &ids,
            grid,
            rgb_f32(color),
            TERRITORY_BORDER_ALPHA,
            DEFAULT_BORDER_WIDTH_PX,
            None,
        ));
    }
    HexBorderLayer::build_vertices(&data)
}

fn zone_border_vertices(
    grid: &HexGridIndex,
    dist: &ResourceDistribution,
    key: &str,
    start: Option<&str>,
) -> Vec<HexBorderVertex> {
    let ids: Vec<&str> = resource_zone(dist, key)
        .into_iter()
        .filter(|id| grid.contains(id))
        .collect();
    let group = ids.iter().copied().collect();
    let order: HashMap<String, u32> = reveal_order(start, &group);
    let color = rgb_f32(lighten(faction_color(key), ZONE_LIGHTEN));
    let data = group_border_data(&ids, grid, color, ZONE_BORDER_ALPHA, DEFAULT_BORDER_WIDTH_PX, Some(&order));
    HexBorderLayer::build_vertices(&data)
}

fn capital_ring_data(grid: &HexGridIndex, ownership: &OwnershipMap) -> Vec<HexCapitalRingDatum> {
    capital_hexes(ownership)
        .into_iter()
        .filter_map(|cap| {
            let tile = grid.get(&cap.hex_id)?;
            let color = cap.color.unwrap_or_else(|| faction_color(&cap.community_id));
            Some(HexCapitalRingDatum::new(
                tile.id.clone(),
                tile.center,
                tile.contour.to_vec(),
                rgb_f32(color),
            ))
        })
        .collect()
}

fn preview_datum(
    grid: &HexGridIndex,
    resources: Option<&ResourceDistribution>,
    ownership: &OwnershipMap,
    hex_id: &str,
) -> Option<PrototypeHexDatum> {
    let tile = grid.get(hex_id)?;
    let bonus = resources.and_then(|r| r.get(hex_id));
    let pattern = bonus.map_or(PatternKind::MixedTerrain, |b| PatternKind::for_resource(&b.resource_key));
    let base_color = ownership
        .get(hex_id)
        .and_then(|o| o.color())
        .map(rgb_f32)
        .unwrap_or(PREVIEW_BASE_COLOR);
    Some(PrototypeHexDatum {
        hex_id: tile.id.clone(),
        center: tile.center,
        vertices: tile.contour.to_vec(),
        base_color,
        pattern,
    })
}
