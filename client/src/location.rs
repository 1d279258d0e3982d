use std::collections::HashMap;

use frontline_shared::BoundarySet;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LocationInfo {
    pub country: Option<String>,
    pub province: Option<String>,
}

/// Per-hex reverse lookup against the loaded boundary sets.
///
/// Misses are cached as `None` ("no data") so selecting the same hex again
/// does not repeat a failing lookup. Call [`LocationCache::invalidate`] when
/// a boundary set finishes loading.
#[derive(Debug, Clone, Default)]
pub struct LocationCache {
    entries: HashMap<String, Option<LocationInfo>>,
    lookups: usize,
}

impl LocationCache {
    pub fn resolve(
        &mut self,
        hex_id: &str,
        center: [f64; 2],
        countries: Option<&BoundarySet>,
        provinces: Option<&BoundarySet>,
    ) -> Option<LocationInfo> {
        if let Some(cached) = self.entries.get(hex_id) {
            return cached.clone();
        }
        self.lookups += 1;
        let [lon, lat] = center;
        let country = countries.and_then(|s| s.locate(lon, lat)).map(str::to_string);
        let province = provinces.and_then(|s| s.locate(lon, lat)).map(str::to_string);
        let info = (country.is_some() || province.is_some()).then_some(LocationInfo { country, province });
        self.entries.insert(hex_id.to_string(), info.clone());
        info
    }

    /// Number of uncached lookups performed so far.
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }
}
