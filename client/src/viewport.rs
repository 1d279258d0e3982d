use glam::{DMat4, DVec3, DVec4, Mat4};

use crate::animation::cubic_ease_out;

/// World size in pixels at zoom 0 (one Web-Mercator tile).
pub const TILE_SIZE: f64 = 512.0;
pub const MIN_ZOOM: f64 = 1.5;
pub const MAX_ZOOM: f64 = 10.0;
pub const ZOOM_STEP: f64 = 1.0;
pub const ZOOM_TRANSITION_MS: f64 = 300.0;
pub const PITCH_3D_DEG: f64 = 45.0;
pub const PITCH_TRANSITION_MS: f64 = 500.0;
/// Vertical field of view used for pitched views.
pub const FOV_RAD: f64 = 0.6435;
const WHEEL_ZOOM_SENSITIVITY: f64 = 0.0025;
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Camera pose in geographic terms. Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CameraState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            longitude: 10.0,
            latitude: 30.0,
            zoom: 2.5,
            pitch: 0.0,
            bearing: 0.0,
        }
    }
}

impl CameraState {
    fn lerp(&self, to: &CameraState, t: f64) -> CameraState {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        CameraState {
            longitude: mix(self.longitude, to.longitude),
            latitude: mix(self.latitude, to.latitude),
            zoom: mix(self.zoom, to.zoom),
            pitch: mix(self.pitch, to.pitch),
            bearing: mix(self.bearing, to.bearing),
        }
    }

    /// Pixel size of the whole world at this zoom.
    pub fn world_size(&self) -> f64 {
        TILE_SIZE * self.zoom.exp2()
    }
}

/// Viewport state handed to the host (minimap, URL sync).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ViewportState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub width: f64,
    pub height: f64,
}

/// Longitude/latitude to Web-Mercator unit coordinates (x east, y south, both 0..1).
pub fn lnglat_to_mercator(lon: f64, lat: f64) -> [f64; 2] {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (lon + 180.0) / 360.0;
    let y = (1.0 - (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln() / std::f64::consts::PI) / 2.0;
    [x, y]
}

pub fn mercator_to_lnglat(x: f64, y: f64) -> [f64; 2] {
    let lon = x * 360.0 - 180.0;
    let n = std::f64::consts::PI * (1.0 - 2.0 * y);
    let lat = n.sinh().atan().to_degrees();
    [lon, lat]
}

/// Maps Web-Mercator unit coordinates to clip space for a `width`×`height` CSS-pixel viewport.
pub fn view_projection(camera: &CameraState, width: f64, height: f64) -> DMat4 {
    let width = width.max(1.0);
    let height = height.max(1.0);
    let camera_distance = 0.5 / (FOV_RAD / 2.0).tan() * height;
    let projection = DMat4::perspective_rh(FOV_RAD, width / height, 1.0, camera_distance * 100.0);
    let [cx, cy] = lnglat_to_mercator(camera.longitude, camera.latitude);
    let ws = camera.world_size();

    projection
        * DMat4::from_translation(DVec3::new(0.0, 0.0, -camera_distance))
        * DMat4::from_rotation_x(-camera.pitch.to_radians())
        * DMat4::from_rotation_z(camera.bearing.to_radians())
        * DMat4::from_scale(DVec3::new(ws, -ws, 1.0))
        * DMat4::from_translation(DVec3::new(-cx, -cy, 0.0))
}

/// Single-precision copy for the GPU camera uniform.
pub fn view_projection_f32(camera: &CameraState, width: f64, height: f64) -> Mat4 {
    view_projection(camera, width, height).as_mat4()
}

/// Screen position (CSS px, origin top-left) of a geographic point, or `None`
/// when it lies behind the camera.
pub fn project(camera: &CameraState, width: f64, height: f64, lon: f64, lat: f64) -> Option<[f64; 2]> {
    let [x, y] = lnglat_to_mercator(lon, lat);
    let clip = view_projection(camera, width, height) * DVec4::new(x, y, 0.0, 1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc_x = clip.x / clip.w;
    let ndc_y = clip.y / clip.w;
    Some([(ndc_x + 1.0) * 0.5 * width, (1.0 - ndc_y) * 0.5 * height])
}

/// Geographic point under a screen position, intersecting the view ray with
/// the map plane. `None` above the horizon.
pub fn unproject(camera: &CameraState, width: f64, height: f64, sx: f64, sy: f64) -> Option<[f64; 2]> {
    let inverse = view_projection(camera, width, height).inverse();
    let ndc_x = sx / width.max(1.0) * 2.0 - 1.0;
    let ndc_y = 1.0 - sy / height.max(1.0) * 2.0;
    let near = inverse * DVec4::new(ndc_x, ndc_y, 0.0, 1.0);
    let far = inverse * DVec4::new(ndc_x, ndc_y, 1.0, 1.0);
    if near.w == 0.0 || far.w == 0.0 {
        return None;
    }
    let near = near.truncate() / near.w;
    let far = far.truncate() / far.w;
    let dz = far.z - near.z;
    if dz.abs() < f64::EPSILON {
        return None;
    }
    let t = -near.z / dz;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let hit = near + (far - near) * t;
    Some(mercator_to_lnglat(hit.x, hit.y))
}

#[derive(Debug, Clone, Copy)]
struct CameraTransition {
    from: CameraState,
    to: CameraState,
    start: f64,
    duration: f64,
}

/// Owns the camera: clamps zoom, runs programmatic transitions, applies
/// direct manipulation immediately.
#[derive(Debug, Clone)]
pub struct ViewportController {
    camera: CameraState,
    transition: Option<CameraTransition>,
    min_zoom: f64,
    max_zoom: f64,
    is_3d: bool,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(CameraState::default(), MIN_ZOOM, MAX_ZOOM)
    }
}

impl ViewportController {
    pub fn new(initial: CameraState, min_zoom: f64, max_zoom: f64) -> Self {
        let mut camera = initial;
        camera.zoom = camera.zoom.clamp(min_zoom, max_zoom);
        camera.latitude = camera.latitude.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        Self {
            camera,
            transition: None,
            min_zoom,
            max_zoom,
            is_3d: camera.pitch > 0.0,
        }
    }

    pub fn camera(&self) -> CameraState {
        self.camera
    }

    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn state(&self, width: f64, height: f64) -> ViewportState {
        let c = self.camera;
        ViewportState {
            longitude: c.longitude,
            latitude: c.latitude,
            zoom: c.zoom,
            pitch: c.pitch,
            bearing: c.bearing,
            width,
            height,
        }
    }

    /// Camera the pending transition is heading to, or the current one.
    fn target(&self) -> CameraState {
        self.transition.map(|t| t.to).unwrap_or(self.camera)
    }

    fn start_transition(&mut self, to: CameraState, now: f64, duration: f64) {
        self.transition = Some(CameraTransition {
            from: self.camera,
            to,
            start: now,
            duration,
        });
    }

    pub fn zoom_in(&mut self, now: f64) {
        let mut to = self.target();
        to.zoom = (to.zoom + ZOOM_STEP).clamp(self.min_zoom, self.max_zoom);
        self.start_transition(to, now, ZOOM_TRANSITION_MS);
    }

    pub fn zoom_out(&mut self, now: f64) {
        let mut to = self.target();
        to.zoom = (to.zoom - ZOOM_STEP).clamp(self.min_zoom, self.max_zoom);
        self.start_transition(to, now, ZOOM_TRANSITION_MS);
    }

    pub fn toggle_3d(&mut self, now: f64) {
        self.is_3d = !self.is_3d;
        let mut to = self.target();
        to.pitch = if self.is_3d { PITCH_3D_DEG } else { 0.0 };
        self.start_transition(to, now, PITCH_TRANSITION_MS);
    }

    /// Move the camera to `to` programmatically (animated).
    pub fn fly_to(&mut self, longitude: f64, latitude: f64, zoom: f64, now: f64) {
        let mut to = self.target();
        to.longitude = longitude;
        to.latitude = latitude.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        to.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        self.start_transition(to, now, ZOOM_TRANSITION_MS * 2.0);
    }

    /// Step the running transition. Returns true while one is still in flight.
    pub fn advance(&mut self, now: f64) -> bool {
        let Some(tr) = self.transition else {
            return false;
        };
        let t = if tr.duration <= 0.0 {
            1.0
        } else {
            ((now - tr.start) / tr.duration).clamp(0.0, 1.0)
        };
        self.camera = tr.from.lerp(&tr.to, cubic_ease_out(t));
        if t >= 1.0 {
            self.camera = tr.to;
            self.transition = None;
            return false;
        }
        true
    }

    /// Drag by a screen-space delta. Immediate; cancels any transition.
    pub fn pan_by_pixels(&mut self, dx: f64, dy: f64) {
        self.transition = None;
        let ws = self.camera.world_size();
        let bearing = self.camera.bearing.to_radians();
        let (sin, cos) = bearing.sin_cos();
        // Undo the bearing rotation so drags follow the cursor.
        let ux = (dx * cos + dy * sin) / ws;
        let uy = (-dx * sin + dy * cos) / ws;
        let [cx, cy] = lnglat_to_mercator(self.camera.longitude, self.camera.latitude);
        let [lon, lat] = mercator_to_lnglat(cx - ux, (cy - uy).clamp(0.0, 1.0));
        self.camera.longitude = (lon + 540.0).rem_euclid(360.0) - 180.0;
        self.camera.latitude = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    }

    /// Wheel zoom around a screen point, keeping the point under the cursor fixed.
    pub fn wheel_zoom(&mut self, delta_y: f64, sx: f64, sy: f64, width: f64, height: f64) {
        let dz = -delta_y * WHEEL_ZOOM_SENSITIVITY;
        self.zoom_at(dz, sx, sy, width, height);
    }

    pub fn zoom_at(&mut self, dz: f64, sx: f64, sy: f64, width: f64, height: f64) {
        self.transition = None;
        let before = unproject(&self.camera, width, height, sx, sy);
        self.camera.zoom = (self.camera.zoom + dz).clamp(self.min_zoom, self.max_zoom);
        let after = unproject(&self.camera, width, height, sx, sy);
        if let (Some(b), Some(a)) = (before, after) {
            let mb = lnglat_to_mercator(b[0], b[1]);
            let ma = lnglat_to_mercator(a[0], a[1]);
            let [cx, cy] = lnglat_to_mercator(self.camera.longitude, self.camera.latitude);
            let [lon, lat] = mercator_to_lnglat(cx + mb[0] - ma[0], (cy + mb[1] - ma[1]).clamp(0.0, 1.0));
            self.camera.longitude = lon;
            self.camera.latitude = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        }
    }

    /// Center and zoom so `(min_lon, min_lat, max_lon, max_lat)` fills the view with padding.
    pub fn fit_bounds(&mut self, bounds: (f64, f64, f64, f64), width: f64, height: f64) {
        let (min_lon, min_lat, max_lon, max_lat) = bounds;
        let a = lnglat_to_mercator(min_lon, max_lat);
        let b = lnglat_to_mercator(max_lon, min_lat);
        let span_x = (b[0] - a[0]).abs();
        let span_y = (b[1] - a[1]).abs();
        if span_x <= 0.0 || span_y <= 0.0 || width <= 0.0 || height <= 0.0 {
            return;
        }

        let padding = 0.05;
        let zx = (width / (span_x * TILE_SIZE * (1.0 + padding * 2.0))).log2();
        let zy = (height / (span_y * TILE_SIZE * (1.0 + padding * 2.0))).log2();
        self.transition = None;
        self.camera.zoom = zx.min(zy).clamp(self.min_zoom, self.max_zoom);
        let [lon, lat] = mercator_to_lnglat((a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0);
        self.camera.longitude = lon;
        self.camera.latitude = lat;
    }
}

/// Zoom mirror updated at most once per animation frame. Many raw zoom
/// changes between frames collapse into one `flush`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualZoom {
    current: f64,
    pending: Option<f64>,
}

impl VisualZoom {
    pub fn new(zoom: f64) -> Self {
        Self {
            current: zoom,
            pending: None,
        }
    }

    pub fn get(&self) -> f64 {
        self.current
    }

    /// Record a raw zoom value. Returns true if a frame flush must be scheduled.
    pub fn request(&mut self, zoom: f64) -> bool {
        let needs_schedule = self.pending.is_none();
        self.pending = Some(zoom);
        needs_schedule
    }

    /// Apply the latest requested value. Returns it when it differs from the current one.
    pub fn flush(&mut self) -> Option<f64> {
        let next = self.pending.take()?;
        if (next - self.current).abs() < f64::EPSILON {
            return None;
        }
        self.current = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff < tol, "expected {expected}, got {actual} (diff: {diff})");
    }

    #[test]
    fn mercator_roundtrip() {
        for (lon, lat) in [(0.0, 0.0), (-120.5, 45.25), (179.0, -70.0)] {
            let [x, y] = lnglat_to_mercator(lon, lat);
            let [lon2, lat2] = mercator_to_lnglat(x, y);
            assert_close(lon2, lon, 1e-9);
            assert_close(lat2, lat, 1e-9);
        }
    }

    #[test]
    fn camera_center_projects_to_screen_center() {
        let cam = CameraState {
            longitude: 12.0,
            latitude: 41.0,
            zoom: 5.0,
            pitch: 0.0,
            bearing: 0.0,
        };
        let p = project(&cam, 800.0, 600.0, 12.0, 41.0).expect("visible");
        assert_close(p[0], 400.0, 1e-6);
        assert_close(p[1], 300.0, 1e-6);
    }

    #[test]
    fn flat_projection_scales_with_world_size() {
        let cam = CameraState {
            longitude: 0.0,
            latitude: 0.0,
            zoom: 3.0,
            pitch: 0.0,
            bearing: 0.0,
        };
        // 1/8 of the world east of center is world_size/8 pixels to the right.
        let p = project(&cam, 1000.0, 800.0, 45.0, 0.0).expect("visible");
        assert_close(p[0], 500.0 + cam.world_size() / 8.0, 1e-6);
        assert_close(p[1], 400.0, 1e-6);
        let north = project(&cam, 1000.0, 800.0, 0.0, 10.0).expect("visible");
        assert!(north[1] < 400.0, "north should be up");
    }

    #[test]
    fn unproject_inverts_project_flat_and_pitched() {
        for pitch in [0.0, PITCH_3D_DEG] {
            let cam = CameraState {
                longitude: -3.0,
                latitude: 50.0,
                zoom: 6.0,
                pitch,
                bearing: 20.0,
            };
            let p = project(&cam, 900.0, 700.0, -2.5, 50.3).expect("visible");
            let ll = unproject(&cam, 900.0, 700.0, p[0], p[1]).expect("on map");
            assert_close(ll[0], -2.5, 1e-6);
            assert_close(ll[1], 50.3, 1e-6);
        }
    }

    #[test]
    fn zoom_is_clamped() {
        let mut vc = ViewportController::new(CameraState::default(), 2.0, 4.0);
        for i in 0..5 {
            vc.zoom_in(i as f64 * 1000.0);
            vc.advance(i as f64 * 1000.0 + 999.0);
        }
        assert_close(vc.camera().zoom, 4.0, 1e-12);
        vc.zoom_at(-10.0, 10.0, 10.0, 100.0, 100.0);
        assert_close(vc.camera().zoom, 2.0, 1e-12);
    }

    #[test]
    fn zoom_in_transitions_over_time() {
        let mut vc = ViewportController::default();
        let z0 = vc.camera().zoom;
        vc.zoom_in(0.0);
        assert!(vc.advance(100.0));
        let mid = vc.camera().zoom;
        assert!(mid > z0 && mid < z0 + ZOOM_STEP);
        assert!(!vc.advance(ZOOM_TRANSITION_MS));
        assert_close(vc.camera().zoom, z0 + ZOOM_STEP, 1e-12);
    }

    #[test]
    fn toggle_3d_interpolates_pitch_and_back() {
        let mut vc = ViewportController::default();
        vc.toggle_3d(0.0);
        vc.advance(PITCH_TRANSITION_MS / 2.0);
        let p = vc.camera().pitch;
        assert!(p > 0.0 && p < PITCH_3D_DEG);
        vc.advance(PITCH_TRANSITION_MS);
        assert_close(vc.camera().pitch, PITCH_3D_DEG, 1e-12);
        vc.toggle_3d(1000.0);
        vc.advance(1000.0 + PITCH_TRANSITION_MS);
        assert_close(vc.camera().pitch, 0.0, 1e-12);
    }

    #[test]
    fn pan_cancels_transition_and_moves_immediately() {
        let mut vc = ViewportController::default();
        vc.zoom_in(0.0);
        let lon0 = vc.camera().longitude;
        vc.pan_by_pixels(-100.0, 0.0);
        assert!(!vc.is_transitioning());
        assert!(vc.camera().longitude > lon0, "dragging left moves the view east");
    }

    #[test]
    fn zoom_at_keeps_cursor_point_fixed() {
        let mut vc = ViewportController::default();
        let (w, h) = (1024.0, 768.0);
        let before = unproject(&vc.camera(), w, h, 200.0, 150.0).expect("on map");
        vc.zoom_at(0.75, 200.0, 150.0, w, h);
        let after = unproject(&vc.camera(), w, h, 200.0, 150.0).expect("on map");
        assert_close(after[0], before[0], 1e-6);
        assert_close(after[1], before[1], 1e-6);
    }

    #[test]
    fn fit_bounds_contains_the_box() {
        let mut vc = ViewportController::default();
        let (w, h) = (800.0, 600.0);
        vc.fit_bounds((-10.0, 35.0, 30.0, 60.0), w, h);
        let cam = vc.camera();
        for (lon, lat) in [(-10.0, 35.0), (30.0, 60.0)] {
            let p = project(&cam, w, h, lon, lat).expect("visible");
            assert!(p[0] >= 0.0 && p[0] <= w && p[1] >= 0.0 && p[1] <= h);
        }
    }

    #[test]
    fn visual_zoom_coalesces_requests() {
        let mut vz = VisualZoom::new(3.0);
        assert!(vz.request(3.2));
        assert!(!vz.request(3.4));
        assert!(!vz.request(3.6));
        assert_eq!(vz.get(), 3.0);
        assert_eq!(vz.flush(), Some(3.6));
        assert_eq!(vz.flush(), None);
        assert!(vz.request(3.6));
        assert_eq!(vz.flush(), None);
    }
}
