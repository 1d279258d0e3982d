use chrono::{DateTime, Datelike, Timelike, Utc};

/// Seconds between sun vector recomputations.
pub const SUN_REFRESH_SECS: i64 = 60;

const AXIAL_TILT_DEG: f64 = 23.44;

/// Solar declination in degrees for a 1-based day of year.
pub fn solar_declination_deg(day_of_year: u32) -> f64 {
    -AXIAL_TILT_DEG * (std::f64::consts::TAU / 365.0 * (day_of_year as f64 + 10.0)).cos()
}

/// Longitude directly under the sun for a fractional UTC hour.
pub fn subsolar_longitude_deg(utc_hours: f64) -> f64 {
    let lon = -15.0 * (utc_hours - 12.0);
    (lon + 540.0).rem_euclid(360.0) - 180.0
}

/// Unit vector pointing at a geographic position on the unit sphere.
pub fn tile_normal(lon_deg: f64, lat_deg: f64) -> [f64; 3] {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Normalized direction to the sun at `at`.
pub fn sun_vector(at: DateTime<Utc>) -> [f64; 3] {
    let hours = at.hour() as f64 + at.minute() as f64 / 60.0 + at.second() as f64 / 3600.0;
    tile_normal(
        subsolar_longitude_deg(hours),
        solar_declination_deg(at.ordinal()),
    )
}

/// How directly a point faces the sun, 0 (night side) to 1 (subsolar).
pub fn daylight(normal: [f64; 3], sun: [f64; 3]) -> f64 {
    let dot = normal[0] * sun[0] + normal[1] * sun[1] + normal[2] * sun[2];
    dot.clamp(0.0, 1.0)
}

/// Sun state shared by every tile color computation, refreshed on a fixed cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct LightingModel {
    sun: [f64; 3],
    refreshed_at: Option<i64>,
}

impl Default for LightingModel {
    fn default() -> Self {
        Self {
            sun: [1.0, 0.0, 0.0],
            refreshed_at: None,
        }
    }
}

impl LightingModel {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            sun: sun_vector(now),
            refreshed_at: Some(now.timestamp()),
        }
    }

    pub fn sun(&self) -> [f64; 3] {
        self.sun
    }

    /// Recompute the sun vector when the last refresh is older than
    /// [`SUN_REFRESH_SECS`]. Returns true when the vector changed.
    pub fn refresh_if_stale(&mut self, now: DateTime<Utc>) -> bool {
        let ts = now.timestamp();
        if let Some(last) = self.refreshed_at
            && ts - last < SUN_REFRESH_SECS
        {
            return false;
        }
        self.refreshed_at = Some(ts);
        let next = sun_vector(now);
        if next == self.sun {
            return false;
        }
        self.sun = next;
        true
    }

    pub fn daylight_at(&self, lon: f64, lat: f64) -> f64 {
        daylight(tile_normal(lon, lat), self.sun)
    }

    /// Bit pattern of the sun vector, for cache signatures.
    pub fn signature(&self) -> [u64; 3] {
        self.sun.map(f64::to_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff < tol, "expected {expected}, got {actual} (diff: {diff})");
    }

    #[test]
    fn sun_vector_is_unit_length() {
        let at = Utc.with_ymd_and_hms(2026, 7, 3, 17, 45, 12).unwrap();
        let s = sun_vector(at);
        assert_close((s[0] * s[0] + s[1] * s[1] + s[2] * s[2]).sqrt(), 1.0, 1e-12);
    }

    #[test]
    fn declination_peaks_near_solstices() {
        assert!(solar_declination_deg(172) > 23.0);
        assert!(solar_declination_deg(355) < -23.0);
        assert_close(solar_declination_deg(81), 0.0, 1.5);
    }

    #[test]
    fn noon_utc_lights_greenwich_and_darkens_antimeridian() {
        let at = Utc.with_ymd_and_hms(2026, 3, 21, 12, 0, 0).unwrap();
        let model = LightingModel::at(at);
        assert!(model.daylight_at(0.0, 0.0) > 0.99);
        assert_eq!(model.daylight_at(180.0, 0.0), 0.0);
        assert!(model.daylight_at(90.0, 0.0) < 0.05);
    }

    #[test]
    fn subsolar_longitude_moves_west_over_the_day() {
        assert_close(subsolar_longitude_deg(12.0), 0.0, 1e-12);
        assert_close(subsolar_longitude_deg(18.0), -90.0, 1e-12);
        assert_close(subsolar_longitude_deg(6.0), 90.0, 1e-12);
        assert_close(subsolar_longitude_deg(0.0), -180.0, 1e-12);
    }

    #[test]
    fn refresh_respects_cadence() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let mut model = LightingModel::at(t0);
        let before = model.sun();
        assert!(!model.refresh_if_stale(t0 + chrono::Duration::seconds(30)));
        assert_eq!(model.sun(), before);
        assert!(model.refresh_if_stale(t0 + chrono::Duration::seconds(90)));
        assert_ne!(model.sun(), before);
    }
}
