use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, MouseEvent, PointerEvent, WheelEvent};

use frontline_shared::LightingModel;

use crate::animation::{AnimationClock, FrameMonitor, animation_required};
use crate::app::{
    BattleData, CountryBoundaries, GridData, Hovered, MapCommand, MapCommands, MapOptions, OwnershipData,
    ProvinceBoundaries, ResourceData, Selected, SelectedZone, ThreeD,
};
use crate::gpu::{FrameInput, GpuRenderer};
use crate::gpu_error::GpuFault;
use crate::render_loop::{AnimationLoop, FrameBatcher};
use crate::renderer::{FrameMetrics, HexMapRenderer, SceneInputs};
use crate::shader::PrototypeHexStyle;
use crate::spatial::{HexHitGrid, HoverTracker};
use crate::viewport::{ViewportController, ViewportState, VisualZoom, unproject, view_projection_f32};

/// Pointer travel below which a press/release pair counts as a click.
const CLICK_SLOP_PX: f64 = 5.0;
/// Wheel-equivalent delta per pixel of pinch distance change.
const PINCH_WHEEL_SCALE: f64 = 2.0;
const SUN_CHECK_INTERVAL_MS: u32 = 60_000;

thread_local! {
    static MAP_RUNTIME: RefCell<Option<MapRuntime>> = const { RefCell::new(None) };
}

/// Handles that must not outlive the map widget.
struct MapRuntime {
    animation: Rc<AnimationLoop>,
    _sun_interval: gloo_timers::callback::Interval,
}

impl Drop for MapRuntime {
    fn drop(&mut self) {
        self.animation.stop();
    }
}

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or_else(js_sys::Date::now)
}

/// Everything the frame callback and the input handlers share.
struct MapState {
    viewport: ViewportController,
    renderer: HexMapRenderer,
    /// `None` until the grid dataset has loaded.
    scene: Option<SceneInputs>,
    hit_grid: Option<HexHitGrid>,
    hover: HoverTracker,
    clock: AnimationClock,
    monitor: FrameMonitor,
    visual_zoom: VisualZoom,
    lighting: LightingModel,
    prototype_style: PrototypeHexStyle,
    last_metrics: FrameMetrics,
    last_viewport: Option<ViewportState>,
    /// CSS pixel size of the canvas at the last frame.
    size: (f64, f64),
    fitted: bool,
}

impl MapState {
    fn new() -> Self {
        let viewport = ViewportController::default();
        let zoom = viewport.camera().zoom;
        Self {
            viewport,
            renderer: HexMapRenderer::default(),
            scene: None,
            hit_grid: None,
            hover: HoverTracker::default(),
            clock: AnimationClock::default(),
            monitor: FrameMonitor::default(),
            visual_zoom: VisualZoom::new(zoom),
            lighting: LightingModel::at(chrono::Utc::now()),
            prototype_style: PrototypeHexStyle::default(),
            last_metrics: FrameMetrics::default(),
            last_viewport: None,
            size: (0.0, 0.0),
            fitted: false,
        }
    }

    /// Record the raw zoom after direct manipulation; the mirror flushes on the next frame.
    fn note_zoom(&mut self) {
        let zoom = self.viewport.camera().zoom;
        self.visual_zoom.request(zoom);
    }

    /// Hex under a canvas-local point.
    fn hit_test(&self, x: f64, y: f64) -> Option<String> {
        let (w, h) = self.size;
        let [lon, lat] = unproject(&self.viewport.camera(), w, h, x, y)?;
        self.hit_grid.as_ref()?.find_at(lon, lat)
    }

    /// Start or stop the clock to match what the scene needs. Returns the
    /// new running state when it changed; the scene time restarts at 0 on
    /// every transition.
    fn update_clock(&mut self, now: f64) -> Option<bool> {
        let required = self
            .scene
            .as_ref()
            .is_some_and(|s| animation_required(&s.battles, s.selected_zone.as_deref()));
        if !self.clock.set_required(required, now) {
            return None;
        }
        if let Some(scene) = self.scene.as_mut() {
            scene.anim_time_ms = 0.0;
        }
        Some(self.clock.is_running())
    }

    /// Start or stop the frame loop to match what the scene needs.
    fn sync_clock(&mut self, animation: &AnimationLoop) {
        let Some(running) = self.update_clock(now_ms()) else {
            return;
        };
        if running {
            self.monitor.reset_gap();
            animation.start();
        } else {
            animation.stop();
        }
    }
}

fn canvas_local(canvas_ref: NodeRef<leptos::html::Canvas>, client_x: i32, client_y: i32) -> Option<(f64, f64)> {
    let canvas = canvas_ref.get_untracked()?;
    let rect = canvas.get_bounding_client_rect();
    Some((client_x as f64 - rect.left(), client_y as f64 - rect.top()))
}

/// The interactive hex map widget.
///
/// Reads its data from context (see [`crate::app`]) and reports clicks,
/// hover changes and viewport changes through the optional callbacks.
#[component]
pub fn HexMap(
    #[prop(optional)] on_select: Option<Callback<Option<String>>>,
    #[prop(optional)] on_hover: Option<Callback<Option<String>>>,
    #[prop(optional)] on_viewport: Option<Callback<ViewportState>>,
) -> impl IntoView {
    let GridData(grid) = expect_context();
    let OwnershipData(ownership) = expect_context();
    let BattleData(battles) = expect_context();
    let ResourceData(resources) = expect_context();
    let CountryBoundaries(countries) = expect_context();
    let ProvinceBoundaries(provinces) = expect_context();
    let MapOptions(options) = expect_context();
    let Hovered(hovered) = expect_context();
    let Selected(selected) = expect_context();
    let SelectedZone(selected_zone) = expect_context();
    let ThreeD(three_d) = expect_context();
    let MapCommands(commands) = expect_context();

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let gpu_fault: RwSignal<Option<GpuFault>> = RwSignal::new(None);

    let state = Rc::new(RefCell::new(MapState::new()));

    // GPU renderer (initialized async, None until ready)
    let gpu: Rc<RefCell<Option<GpuRenderer>>> = Rc::new(RefCell::new(None));
    let gpu_init_started = Rc::new(Cell::new(false));

    // Drag state
    let is_dragging = Rc::new(Cell::new(false));
    let drag_start = Rc::new(Cell::new((0.0f64, 0.0f64)));
    let last_pos = Rc::new(Cell::new((0.0f64, 0.0f64)));
    let pinch_dist = Rc::new(Cell::new(0.0f64));

    let repaint = Rc::new(FrameBatcher::new({
        let state = state.clone();
        let gpu = gpu.clone();
        move |ts| {
            let Some(canvas) = canvas_ref.get_untracked() else {
                return false;
            };
            let canvas: &HtmlCanvasElement = &canvas;
            let Some(parent) = canvas.parent_element() else {
                return false;
            };
            let w = parent.client_width() as f64;
            let h = parent.client_height() as f64;
            if w <= 0.0 || h <= 0.0 {
                return false;
            }
            let dpr = web_sys::window().map(|w| w.device_pixel_ratio()).unwrap_or(1.0).max(1.0);
            let pixel_w = (w * dpr).round() as u32;
            let pixel_h = (h * dpr).round() as u32;
            if canvas.width() != pixel_w || canvas.height() != pixel_h {
                canvas.set_width(pixel_w);
                canvas.set_height(pixel_h);
            }

            let started = now_ms();
            let (transitioning, viewport_changed, view_state) = {
                let mut st = state.borrow_mut();
                st.size = (w, h);
                if !st.fitted
                    && let Some(bounds) = st.scene.as_ref().and_then(|s| s.grid.bounds())
                {
                    st.viewport.fit_bounds(bounds, w, h);
                    st.fitted = true;
                }
                let transitioning = st.viewport.advance(ts);
                st.note_zoom();
                let flushed = st.visual_zoom.flush();
                let camera = st.viewport.camera();
                let view_state = st.viewport.state(w, h);
                let viewport_changed = st.last_viewport != Some(view_state);
                st.last_viewport = Some(view_state);
                let fps = st.monitor.fps().unwrap_or_default();

                let st = &mut *st;
                if let Some(scene) = st.scene.as_mut() {
                    if let Some(zoom) = flushed {
                        scene.visual_zoom = zoom;
                    }
                    let layers = st.renderer.compose(scene);
                    let world_size = camera.world_size() as f32;
                    let uniforms = st.renderer.frame_uniforms(scene, world_size, &st.prototype_style);
                    let view_proj = view_projection_f32(&camera, w, h).to_cols_array_2d();
                    let mut gpu_slot = gpu.borrow_mut();
                    if let Some(ref mut renderer) = *gpu_slot {
                        renderer.resize(pixel_w, pixel_h);
                        if let Some(mut metrics) = renderer.render(FrameInput {
                            layers: &layers,
                            view_proj,
                            world_size,
                            uniforms: &uniforms,
                            clear_color: scene.options.theme.background(),
                        }) {
                            metrics.frame_cpu_ms = now_ms() - started;
                            metrics.fps_estimate = fps;
                            st.last_metrics = metrics;
                        }
                        // A faulted device stops drawing; the error boundary takes over.
                        if let Some(fault) = renderer.take_fault() {
                            *gpu_slot = None;
                            gpu_fault.set(Some(fault));
                        }
                    }
                }
                (transitioning, viewport_changed, view_state)
            };

            if viewport_changed && let Some(cb) = on_viewport {
                cb.run(view_state);
            }
            transitioning
        }
    }));

    let animation = Rc::new(AnimationLoop::new({
        let state = state.clone();
        let repaint = repaint.clone();
        move |ts| {
            let mut st = state.borrow_mut();
            st.monitor.record(ts);
            if let Some(report) = st.monitor.take_report(ts) {
                let draw_calls = st.last_metrics.draw_calls;
                web_sys::console::log_1(&format!("{report}, {draw_calls} draw calls").into());
            }
            let Some(elapsed) = st.clock.on_frame(ts) else {
                return;
            };
            if let Some(scene) = st.scene.as_mut() {
                scene.anim_time_ms = elapsed;
            }
            drop(st);
            repaint.request();
        }
    }));

    let sun_interval = gloo_timers::callback::Interval::new(SUN_CHECK_INTERVAL_MS, {
        let state = state.clone();
        let repaint = repaint.clone();
        move || {
            let mut st = state.borrow_mut();
            if !st.lighting.refresh_if_stale(chrono::Utc::now()) {
                return;
            }
            let sun = st.lighting.sun();
            if let Some(scene) = st.scene.as_mut() {
                scene.sun = sun;
            }
            drop(st);
            repaint.request();
        }
    });

    MAP_RUNTIME.with(|slot| {
        *slot.borrow_mut() = Some(MapRuntime {
            animation: animation.clone(),
            _sun_interval: sun_interval,
        });
    });
    on_cleanup(|| {
        MAP_RUNTIME.with(|slot| {
            slot.borrow_mut().take();
        });
    });

    // Initialize GPU renderer asynchronously
    Effect::new({
        let gpu = gpu.clone();
        let repaint = repaint.clone();
        move || {
            if gpu_init_started.get() {
                return;
            }
            let Some(canvas_el) = canvas_ref.get() else {
                return;
            };
            gpu_init_started.set(true);

            let canvas: &HtmlCanvasElement = &canvas_el;
            let canvas: HtmlCanvasElement = canvas.clone();
            let gpu = gpu.clone();
            let repaint = repaint.clone();

            wasm_bindgen_futures::spawn_local(async move {
                match GpuRenderer::init(canvas).await {
                    Ok(renderer) => {
                        *gpu.borrow_mut() = Some(renderer);
                        repaint.request();
                    }
                    Err(e) => {
                        web_sys::console::warn_1(&format!("wgpu init failed: {e}").into());
                        gpu_fault.set(Some(GpuFault::new(e)));
                    }
                }
            });
        }
    });

    // Data effect: any overlay, boundary or option change rebuilds the scene inputs.
    Effect::new({
        let state = state.clone();
        let animation = animation.clone();
        let repaint = repaint.clone();
        move || {
            let grid = grid.get();
            let ownership = ownership.get();
            let battles = battles.get();
            let resources = resources.get();
            let countries = countries.get();
            let provinces = provinces.get();
            let options = options.get();
            let Some(grid) = grid else {
                return;
            };

            let mut st = state.borrow_mut();
            let grid_changed = st.scene.as_ref().is_none_or(|s| !Arc::ptr_eq(&s.grid, &grid));
            if grid_changed {
                st.hit_grid = Some(HexHitGrid::build(&grid));
                st.hover = HoverTracker::default();
                st.fitted = false;
            }
            let sun = st.lighting.sun();
            let visual_zoom = st.visual_zoom.get();
            let scene = st.scene.get_or_insert_with(|| SceneInputs::new(grid.clone()));
            scene.grid = grid;
            scene.ownership = ownership;
            scene.battles = battles;
            scene.resources = resources;
            scene.countries = countries;
            scene.provinces = provinces;
            scene.options = options;
            scene.sun = sun;
            scene.visual_zoom = visual_zoom;
            scene.selected = selected.get_untracked();
            scene.selected_zone = selected_zone.get_untracked();
            st.sync_clock(&animation);
            drop(st);
            repaint.request();
        }
    });

    // Selection effect: only the selection-dependent layers change.
    Effect::new({
        let state = state.clone();
        let animation = animation.clone();
        let repaint = repaint.clone();
        move || {
            let sel = selected.get();
            let zone = selected_zone.get();
            let mut st = state.borrow_mut();
            if let Some(scene) = st.scene.as_mut() {
                scene.selected = sel;
                scene.selected_zone = zone;
            }
            st.sync_clock(&animation);
            drop(st);
            repaint.request();
        }
    });

    Effect::new({
        let state = state.clone();
        let repaint = repaint.clone();
        move || {
            let want_3d = three_d.get();
            let mut st = state.borrow_mut();
            if st.viewport.is_3d() != want_3d {
                st.viewport.toggle_3d(now_ms());
            }
            drop(st);
            repaint.request();
        }
    });

    // Host commands (zoom buttons, fly-to) are queued in a signal and drained here.
    Effect::new({
        let state = state.clone();
        let repaint = repaint.clone();
        move || {
            let pending = commands.get();
            if pending.is_empty() {
                return;
            }
            commands.update_untracked(|queue| queue.clear());
            let now = now_ms();
            let mut st = state.borrow_mut();
            for command in pending {
                match command {
                    MapCommand::ZoomIn => st.viewport.zoom_in(now),
                    MapCommand::ZoomOut => st.viewport.zoom_out(now),
                    MapCommand::FlyTo {
                        longitude,
                        latitude,
                        zoom,
                    } => st.viewport.fly_to(longitude, latitude, zoom, now),
                    MapCommand::FitGrid => st.fitted = false,
                }
            }
            drop(st);
            repaint.request();
        }
    });

    // --- Input handlers ---

    let on_wheel = {
        let state = state.clone();
        let repaint = repaint.clone();
        move |e: WheelEvent| {
            e.prevent_default();
            let (x, y) = canvas_local(canvas_ref, e.client_x(), e.client_y())
                .unwrap_or((e.offset_x() as f64, e.offset_y() as f64));
            let mut st = state.borrow_mut();
            let (w, h) = st.size;
            st.viewport.wheel_zoom(e.delta_y(), x, y, w, h);
            st.note_zoom();
            drop(st);
            repaint.request();
        }
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let drag_start = drag_start.clone();
        let last_pos = last_pos.clone();
        move |e: PointerEvent| {
            is_dragging.set(true);
            let pos = (e.client_x() as f64, e.client_y() as f64);
            drag_start.set(pos);
            last_pos.set(pos);

            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let state = state.clone();
        let repaint = repaint.clone();
        let is_dragging = is_dragging.clone();
        let last_pos = last_pos.clone();
        move |e: PointerEvent| {
            if is_dragging.get() {
                let (lx, ly) = last_pos.get();
                let pos = (e.client_x() as f64, e.client_y() as f64);
                last_pos.set(pos);
                state.borrow_mut().viewport.pan_by_pixels(pos.0 - lx, pos.1 - ly);
                repaint.request();
                return;
            }
            let Some((x, y)) = canvas_local(canvas_ref, e.client_x(), e.client_y()) else {
                return;
            };
            let change = {
                let mut st = state.borrow_mut();
                let hit = st.hit_test(x, y);
                st.hover.update(hit)
            };
            if let Some(hit) = change {
                hovered.set(hit.clone());
                if let Some(cb) = on_hover {
                    cb.run(hit);
                }
            }
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |e: PointerEvent| {
            is_dragging.set(false);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_click = {
        let state = state.clone();
        let drag_start = drag_start.clone();
        move |e: MouseEvent| {
            let (sx, sy) = drag_start.get();
            let dx = (e.client_x() as f64 - sx).abs();
            let dy = (e.client_y() as f64 - sy).abs();
            if dx >= CLICK_SLOP_PX || dy >= CLICK_SLOP_PX {
                return;
            }
            let Some((x, y)) = canvas_local(canvas_ref, e.client_x(), e.client_y()) else {
                return;
            };
            let hit = state.borrow().hit_test(x, y);
            if hit != selected.get_untracked() {
                selected.set(hit.clone());
            }
            if let Some(cb) = on_select {
                cb.run(hit);
            }
        }
    };

    let on_pointer_leave = {
        let state = state.clone();
        let is_dragging = is_dragging.clone();
        move |_: PointerEvent| {
            is_dragging.set(false);
            let change = state.borrow_mut().hover.update(None);
            if let Some(hit) = change {
                hovered.set(hit.clone());
                if let Some(cb) = on_hover {
                    cb.run(hit);
                }
            }
        }
    };

    let on_touch_start = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = (t1.client_x() - t0.client_x()) as f64;
                let dy = (t1.client_y() - t0.client_y()) as f64;
                pinch_dist.set((dx * dx + dy * dy).sqrt());
            }
        }
    };

    let on_touch_move = {
        let state = state.clone();
        let repaint = repaint.clone();
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() != 2 {
                return;
            }
            e.prevent_default();
            let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                return;
            };
            let dx = (t1.client_x() - t0.client_x()) as f64;
            let dy = (t1.client_y() - t0.client_y()) as f64;
            let new_dist = (dx * dx + dy * dy).sqrt();
            let old_dist = pinch_dist.replace(new_dist);
            if old_dist <= 0.0 {
                return;
            }
            let mid_x = (t0.client_x() + t1.client_x()) / 2;
            let mid_y = (t0.client_y() + t1.client_y()) / 2;
            let Some((x, y)) = canvas_local(canvas_ref, mid_x, mid_y) else {
                return;
            };
            let mut st = state.borrow_mut();
            let (w, h) = st.size;
            st.viewport.wheel_zoom(-(new_dist - old_dist) * PINCH_WHEEL_SCALE, x, y, w, h);
            st.note_zoom();
            drop(st);
            repaint.request();
        }
    };

    let loading = move || grid.with(Option::is_none);

    view! {
        <div
            class="hex-map"
            style="position: relative; width: 100%; height: 100%; overflow: hidden;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:pointerleave=on_pointer_leave
            on:click=on_click
            on:touchstart=on_touch_start
            on:touchmove=on_touch_move
        >
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
            />
            <Show when=loading>
                <div class="hex-map-placeholder">"Loading map\u{2026}"</div>
            </Show>
            {move || gpu_fault.get().map_or(Ok(()), Err)}
        </div>
    }
}
