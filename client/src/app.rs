use std::sync::Arc;

use gloo_storage::Storage;
use leptos::prelude::*;
use wasm_bindgen::JsValue;

use frontline_shared::overlay::display_name;
use frontline_shared::{BattleRecord, BoundarySet, HexGridIndex, OwnershipMap, ResourceDistribution};

use crate::color_cache::Theme;
use crate::data::{self, AliveFlag, DataSources};
use crate::location::LocationCache;
use crate::map::HexMap;
use crate::renderer::RenderOptions;
use crate::viewport::ViewportState;

const SETTINGS_KEY: &str = "frontline_map_settings";
/// Window property the host-side minimap reads the viewport from.
const VIEWPORT_GLOBAL: &str = "frontlineViewport";
const FOCUS_ZOOM: f64 = 6.0;

/// Newtype wrappers so same-typed signals get distinct context slots.
#[derive(Clone, Copy)]
pub(crate) struct Hovered(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct Selected(pub RwSignal<Option<String>>);
/// Resource key whose zone is outlined.
#[derive(Clone, Copy)]
pub(crate) struct SelectedZone(pub RwSignal<Option<String>>);
#[derive(Clone, Copy)]
pub(crate) struct GridData(pub RwSignal<Option<Arc<HexGridIndex>>>);
#[derive(Clone, Copy)]
pub(crate) struct CountryBoundaries(pub RwSignal<Option<Arc<BoundarySet>>>);
#[derive(Clone, Copy)]
pub(crate) struct ProvinceBoundaries(pub RwSignal<Option<Arc<BoundarySet>>>);
#[derive(Clone, Copy)]
pub(crate) struct ResourceData(pub RwSignal<Option<Arc<ResourceDistribution>>>);
#[derive(Clone, Copy)]
pub(crate) struct OwnershipData(pub RwSignal<Arc<OwnershipMap>>);
#[derive(Clone, Copy)]
pub(crate) struct BattleData(pub RwSignal<Arc<Vec<BattleRecord>>>);
#[derive(Clone, Copy)]
pub(crate) struct MapOptions(pub Memo<RenderOptions>);
#[derive(Clone, Copy)]
pub(crate) struct ThreeD(pub RwSignal<bool>);
#[derive(Clone, Copy)]
pub(crate) struct MapCommands(pub RwSignal<Vec<MapCommand>>);

/// Camera requests from outside the map widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MapCommand {
    ZoomIn,
    ZoomOut,
    FlyTo { longitude: f64, latitude: f64, zoom: f64 },
    FitGrid,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct MapSettings {
    theme: Theme,
    lighting_enabled: bool,
    three_d: bool,
    show_resources: bool,
    zone_reveal: bool,
    show_basemap: bool,
    show_territory_borders: bool,
}

impl Default for MapSettings {
    fn default() -> Self {
        let options = RenderOptions::default();
        Self {
            theme: options.theme,
            lighting_enabled: options.lighting_enabled,
            three_d: false,
            show_resources: options.show_resources,
            zone_reveal: options.zone_reveal,
            show_basemap: options.show_basemap,
            show_territory_borders: options.show_territory_borders,
        }
    }
}

/// Fetch every dataset independently; only the grid is required to render.
fn spawn_loaders(sources: DataSources, alive: AliveFlag, location_cache: StoredValue<LocationCache>) {
    let GridData(grid) = expect_context();
    let CountryBoundaries(countries) = expect_context();
    let ProvinceBoundaries(provinces) = expect_context();
    let ResourceData(resources) = expect_context();
    let OwnershipData(ownership) = expect_context();
    let BattleData(battles) = expect_context();

    let DataSources {
        grid: grid_url,
        countries: countries_url,
        provinces: provinces_url,
        resources: resources_url,
        demo_state: demo_url,
    } = sources;

    {
        let alive = alive.clone();
        wasm_bindgen_futures::spawn_local(async move {
            match data::fetch_grid(&grid_url).await {
                Ok(parsed) => {
                    if !alive.is_alive() {
                        return;
                    }
                    web_sys::console::log_1(
                        &format!("grid: loaded {} tiles ({} rejected)", parsed.tiles.len(), parsed.rejected).into(),
                    );
                    grid.set(Some(Arc::new(HexGridIndex::build(parsed.tiles))));
                }
                Err(e) => web_sys::console::error_1(&format!("grid: {e}").into()),
            }
        });
    }

    for (label, url, sink) in [("countries", countries_url, countries), ("provinces", provinces_url, provinces)] {
        let alive = alive.clone();
        wasm_bindgen_futures::spawn_local(async move {
            match data::fetch_boundaries(&url).await {
                Ok(set) => {
                    if !alive.is_alive() {
                        return;
                    }
                    web_sys::console::log_1(&format!("boundaries: {label} loaded ({} regions)", set.len()).into());
                    location_cache.update_value(|cache| cache.invalidate());
                    sink.set(Some(Arc::new(set)));
                }
                Err(e) => web_sys::console::warn_1(&format!("boundaries: {label}: {e}").into()),
            }
        });
    }

    {
        let alive = alive.clone();
        wasm_bindgen_futures::spawn_local(async move {
            match data::fetch_resource_distribution(&resources_url).await {
                Ok(dist) => {
                    if alive.is_alive() {
                        resources.set(Some(Arc::new(dist)));
                    }
                }
                Err(e) => web_sys::console::warn_1(&format!("resources: {e}").into()),
            }
        });
    }

    wasm_bindgen_futures::spawn_local(async move {
        match data::fetch_demo_state(&demo_url).await {
            Ok(state) => {
                if !alive.is_alive() {
                    return;
                }
                ownership.set(Arc::new(state.ownership));
                battles.set(Arc::new(state.battles));
            }
            Err(e) => web_sys::console::warn_1(&format!("demo state: {e}").into()),
        }
    });
}

fn publish_viewport(state: &ViewportState) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Ok(value) = serde_wasm_bindgen::to_value(state) else {
        return;
    };
    let _ = js_sys::Reflect::set(window.as_ref(), &JsValue::from_str(VIEWPORT_GLOBAL), &value);
}

/// Root application component. Owns settings and host data, provides them via context.
#[component]
pub fn App() -> impl IntoView {
    let hovered: RwSignal<Option<String>> = RwSignal::new(None);
    let selected: RwSignal<Option<String>> = RwSignal::new(None);
    let selected_zone: RwSignal<Option<String>> = RwSignal::new(None);
    let grid: RwSignal<Option<Arc<HexGridIndex>>> = RwSignal::new(None);
    let countries: RwSignal<Option<Arc<BoundarySet>>> = RwSignal::new(None);
    let provinces: RwSignal<Option<Arc<BoundarySet>>> = RwSignal::new(None);
    let resources: RwSignal<Option<Arc<ResourceDistribution>>> = RwSignal::new(None);
    let ownership: RwSignal<Arc<OwnershipMap>> = RwSignal::new(Arc::default());
    let battles: RwSignal<Arc<Vec<BattleRecord>>> = RwSignal::new(Arc::default());
    let commands: RwSignal<Vec<MapCommand>> = RwSignal::new(Vec::new());
    let location_cache: StoredValue<LocationCache> = StoredValue::new(LocationCache::default());

    let saved: MapSettings = gloo_storage::LocalStorage::get(SETTINGS_KEY).unwrap_or_default();
    let theme: RwSignal<Theme> = RwSignal::new(saved.theme);
    let lighting_enabled: RwSignal<bool> = RwSignal::new(saved.lighting_enabled);
    let three_d: RwSignal<bool> = RwSignal::new(saved.three_d);
    let show_resources: RwSignal<bool> = RwSignal::new(saved.show_resources);
    let zone_reveal: RwSignal<bool> = RwSignal::new(saved.zone_reveal);
    let show_basemap: RwSignal<bool> = RwSignal::new(saved.show_basemap);
    let show_territory_borders: RwSignal<bool> = RwSignal::new(saved.show_territory_borders);

    let options = Memo::new(move |_| RenderOptions {
        theme: theme.get(),
        lighting_enabled: lighting_enabled.get(),
        show_basemap: show_basemap.get(),
        show_resources: show_resources.get(),
        show_territory_borders: show_territory_borders.get(),
        zone_reveal: zone_reveal.get(),
        ..RenderOptions::default()
    });

    provide_context(Hovered(hovered));
    provide_context(Selected(selected));
    provide_context(SelectedZone(selected_zone));
    provide_context(GridData(grid));
    provide_context(CountryBoundaries(countries));
    provide_context(ProvinceBoundaries(provinces));
    provide_context(ResourceData(resources));
    provide_context(OwnershipData(ownership));
    provide_context(BattleData(battles));
    provide_context(MapOptions(options));
    provide_context(ThreeD(three_d));
    provide_context(MapCommands(commands));
    provide_context(location_cache);
    provide_context(theme);
    provide_context(lighting_enabled);

    // Persist settings to localStorage on any change
    Effect::new(move || {
        let settings = MapSettings {
            theme: theme.get(),
            lighting_enabled: lighting_enabled.get(),
            three_d: three_d.get(),
            show_resources: show_resources.get(),
            zone_reveal: zone_reveal.get(),
            show_basemap: show_basemap.get(),
            show_territory_borders: show_territory_borders.get(),
        };
        let _ = gloo_storage::LocalStorage::set(SETTINGS_KEY, &settings);
    });

    let alive = AliveFlag::new();
    on_cleanup({
        let alive = alive.clone();
        move || alive.clear()
    });
    spawn_loaders(DataSources::default(), alive, location_cache);

    let on_select = Callback::new(move |hit: Option<String>| {
        // A zone outline belongs to the hex it was opened from.
        if hit.is_none() {
            selected_zone.set(None);
        }
    });
    let on_viewport = Callback::new(move |state: ViewportState| publish_viewport(&state));

    let background = move || match theme.get() {
        Theme::Dark => "#0c0e17",
        Theme::Light => "#dde1e8",
    };

    view! {
        <div style="width: 100%; height: 100%; position: relative; overflow: hidden;" style:background=background>
            // GPU faults are logged where they are raised; the controls and panel outlive the map.
            <ErrorBoundary fallback=|_errors| view! { <div class="hex-map-placeholder">"WebGL unavailable"</div> }>
                <HexMap on_select=on_select on_viewport=on_viewport />
            </ErrorBoundary>
            <MapControls
                show_resources=show_resources
                zone_reveal=zone_reveal
                show_basemap=show_basemap
                show_territory_borders=show_territory_borders
            />
            <InfoPanel />
        </div>
    }
}

const PANEL_STYLE: &str = "position: absolute; z-index: 10; background: rgba(19,22,31,0.92); border: 1px solid #282c3e; border-radius: 6px; padding: 8px; color: #e2e0d8; font-family: 'Inter', system-ui, sans-serif; font-size: 0.75rem;";
const BUTTON_STYLE: &str = "min-width: 32px; height: 28px; background: #13161f; border: 1px solid #282c3e; border-radius: 4px; color: #e2e0d8; cursor: pointer; font-family: 'JetBrains Mono', monospace; font-size: 0.75rem; padding: 0 8px;";

#[component]
fn ToggleButton(label: &'static str, value: RwSignal<bool>) -> impl IntoView {
    view! {
        <button
            style=BUTTON_STYLE
            style:border-color=move || if value.get() { "rgba(245,197,66,0.6)" } else { "#282c3e" }
            style:color=move || if value.get() { "#f5c542" } else { "#e2e0d8" }
            on:click=move |_| value.update(|v| *v = !*v)
        >
            {label}
        </button>
    }
}

/// Zoom, 3D, theme and overlay switches.
#[component]
fn MapControls(
    show_resources: RwSignal<bool>,
    zone_reveal: RwSignal<bool>,
    show_basemap: RwSignal<bool>,
    show_territory_borders: RwSignal<bool>,
) -> impl IntoView {
    let MapCommands(commands) = expect_context();
    let ThreeD(three_d) = expect_context();
    let theme: RwSignal<Theme> = expect_context();
    let lighting_enabled: RwSignal<bool> = expect_context();

    let push = move |command: MapCommand| commands.update(|queue| queue.push(command));
    let toggle_theme = move |_: web_sys::MouseEvent| {
        theme.update(|t| {
            *t = match *t {
                Theme::Dark => Theme::Light,
                Theme::Light => Theme::Dark,
            }
        })
    };

    view! {
        <div style=PANEL_STYLE style:top="12px" style:left="12px">
            <div style="display: flex; gap: 4px; margin-bottom: 6px;">
                <button style=BUTTON_STYLE title="Zoom in" on:click=move |_| push(MapCommand::ZoomIn)>"+"</button>
                <button style=BUTTON_STYLE title="Zoom out" on:click=move |_| push(MapCommand::ZoomOut)>"\u{2212}"</button>
                <button style=BUTTON_STYLE title="Fit map" on:click=move |_| push(MapCommand::FitGrid)>"Fit"</button>
                <ToggleButton label="3D" value=three_d />
                <button style=BUTTON_STYLE title="Switch theme" on:click=toggle_theme>
                    {move || match theme.get() {
                        Theme::Dark => "Dark",
                        Theme::Light => "Light",
                    }}
                </button>
            </div>
            <div style="display: flex; flex-wrap: wrap; gap: 4px; max-width: 260px;">
                <ToggleButton label="Lighting" value=lighting_enabled />
                <ToggleButton label="Resources" value=show_resources />
                <ToggleButton label="Zone reveal" value=zone_reveal />
                <ToggleButton label="Basemap" value=show_basemap />
                <ToggleButton label="Borders" value=show_territory_borders />
            </div>
        </div>
    }
}

/// Details for the selected hex: name, owner, resource bonus and location.
#[component]
fn InfoPanel() -> impl IntoView {
    let Selected(selected) = expect_context();
    let Hovered(hovered) = expect_context();
    let SelectedZone(selected_zone) = expect_context();
    let GridData(grid) = expect_context();
    let OwnershipData(ownership) = expect_context();
    let BattleData(battles) = expect_context();
    let ResourceData(resources) = expect_context();
    let CountryBoundaries(countries) = expect_context();
    let ProvinceBoundaries(provinces) = expect_context();
    let MapCommands(commands) = expect_context();
    let location_cache: StoredValue<LocationCache> = expect_context();

    let hover_label = move || {
        let id = hovered.get()?;
        Some(ownership.with(|o| display_name(o, &id).to_string()))
    };

    move || {
        let Some(id) = selected.get() else {
            return view! {
                <div style=PANEL_STYLE style:bottom="12px" style:left="12px" style:color="#5a5860">
                    {move || hover_label().unwrap_or_else(|| "Click a hex for details".to_string())}
                </div>
            }
            .into_any();
        };

        let center = grid.with(|g| g.as_ref().and_then(|g| g.get(&id)).map(|t| t.center));
        let (name, owner, fortification) = ownership.with(|o| {
            let record = o.get(&id);
            (
                display_name(o, &id).to_string(),
                record
                    .and_then(|r| r.communities.as_ref().and_then(|c| c.name.clone()))
                    .or_else(|| record.and_then(|r| r.owner().map(str::to_string))),
                record.map(|r| r.fortification_level).unwrap_or_default(),
            )
        });
        let siege = battles.with(|b| {
            b.iter().find(|b| b.is_active() && b.target_hex_id == id).map(|b| {
                let attacker = b
                    .attacker
                    .as_ref()
                    .and_then(|s| s.name.clone())
                    .unwrap_or_else(|| b.attacker_community_id.clone());
                format!("Under attack by {attacker}, defense {:.0}%", b.defense_fraction() * 100.0)
            })
        });
        let bonus = resources.with(|r| r.as_ref().and_then(|r| r.get(&id)).cloned());
        let location = center.and_then(|center| {
            let countries = countries.get();
            let provinces = provinces.get();
            location_cache
                .try_update_value(|cache| cache.resolve(&id, center, countries.as_deref(), provinces.as_deref()))
                .flatten()
        });
        let place = location
            .map(|l| match (l.province, l.country) {
                (Some(p), Some(c)) => format!("{p}, {c}"),
                (p, c) => p.or(c).unwrap_or_default(),
            })
            .unwrap_or_else(|| "Location unknown".to_string());

        let focus = center.map(|[lon, lat]| {
            view! {
                <button
                    style=BUTTON_STYLE
                    on:click=move |_| commands.update(|queue| {
                        queue.push(MapCommand::FlyTo { longitude: lon, latitude: lat, zoom: FOCUS_ZOOM })
                    })
                >
                    "Focus"
                </button>
            }
        });

        let zone = bonus.map(|bonus| {
            let key = bonus.resource_key.clone();
            let label = bonus.resource_name.clone().unwrap_or_else(|| bonus.resource_key.clone());
            let percent = bonus.percentage;
            let is_open = {
                let key = key.clone();
                move || selected_zone.get().as_deref() == Some(key.as_str())
            };
            let toggle = {
                let key = key.clone();
                move |_: web_sys::MouseEvent| {
                    selected_zone.update(|z| {
                        *z = if z.as_deref() == Some(key.as_str()) { None } else { Some(key.clone()) };
                    })
                }
            };
            view! {
                <div style="display: flex; align-items: center; gap: 6px; margin-top: 4px;">
                    <span>{format!("{label} +{percent:.0}%")}</span>
                    <button style=BUTTON_STYLE on:click=toggle>
                        {move || if is_open() { "Hide zone" } else { "Show zone" }}
                    </button>
                </div>
            }
        });

        view! {
            <div style=PANEL_STYLE style:bottom="12px" style:left="12px" style:min-width="220px">
                <div style="font-weight: 600; font-size: 0.85rem;">{name}</div>
                <div style="color: #5a5860; font-family: 'JetBrains Mono', monospace; font-size: 0.65rem;">{id.clone()}</div>
                <div style="margin-top: 4px;">{owner.unwrap_or_else(|| "Unclaimed".to_string())}</div>
                {(fortification > 0).then(|| view! { <div>{format!("Fortification {fortification}")}</div> })}
                {siege.map(|line| view! { <div style="color: #e0605a;">{line}</div> })}
                <div style="color: #9a98a0;">{place}</div>
                {zone}
                <div style="display: flex; gap: 4px; margin-top: 6px;">
                    {focus}
                    <button style=BUTTON_STYLE on:click=move |_| {
                        selected.set(None);
                        selected_zone.set(None);
                    }>"Close"</button>
                </div>
            </div>
        }
        .into_any()
    }
}
