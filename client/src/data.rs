use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;

use frontline_shared::grid::GridParse;
use frontline_shared::{BattleRecord, BoundarySet, OwnershipMap, ResourceDistribution, parse_grid_dataset};

/// Where the static datasets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSources {
    pub grid: String,
    pub countries: String,
    pub provinces: String,
    pub resources: String,
    pub demo_state: String,
}

impl Default for DataSources {
    fn default() -> Self {
        Self {
            grid: "/data/hex-grid.json".into(),
            countries: "/data/world-countries.geojson".into(),
            provinces: "/data/world-provinces.geojson".into(),
            resources: "/data/resource-distribution.json".into(),
            demo_state: "/data/demo-state.json".into(),
        }
    }
}

/// Host-side overlay data used when the map runs standalone.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct DemoState {
    pub ownership: OwnershipMap,
    pub battles: Vec<BattleRecord>,
}

/// Cleared on unmount; async loads check it before writing state.
/// `Send` so it can be moved into an `on_cleanup` hook.
#[derive(Debug, Clone)]
pub struct AliveFlag(Arc<AtomicBool>);

impl Default for AliveFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl AliveFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

async fn fetch_text(url: &str) -> Result<String, String> {
    let resp = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    resp.text().await.map_err(|e| format!("fetch error: {e}"))
}

async fn fetch_json<T: DeserializeOwned>(url: &str) -> Result<T, String> {
    let resp = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    resp.json::<T>().await.map_err(|e| format!("parse error: {e}"))
}

/// Fetch and validate the static hex grid. Malformed entries are dropped and counted.
pub async fn fetch_grid(url: &str) -> Result<GridParse, String> {
    let body = fetch_text(url).await?;
    parse_grid_dataset(&body)
}

pub async fn fetch_boundaries(url: &str) -> Result<BoundarySet, String> {
    let body = fetch_text(url).await?;
    BoundarySet::parse_geojson(&body)
}

pub async fn fetch_resource_distribution(url: &str) -> Result<ResourceDistribution, String> {
    fetch_json(url).await
}

pub async fn fetch_demo_state(url: &str) -> Result<DemoState, String> {
    fetch_json(url).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn demo_state_fields_default_when_missing() {
        let state: DemoState = serde_json::from_value(json!({
            "battles": [
                { "id": "b1", "target_hex_id": "4-4", "attacker_community_id": "red" }
            ]
        }))
        .expect("demo state should deserialize");
        assert!(state.ownership.is_empty());
        assert_eq!(state.battles.len(), 1);
        assert_eq!(state.battles[0].target_hex_id, "4-4");

        let empty: DemoState = serde_json::from_value(json!({})).expect("empty object");
        assert_eq!(empty, DemoState::default());
    }

    #[test]
    fn alive_flag_is_shared_between_clones() {
        let flag = AliveFlag::new();
        let task_copy = flag.clone();
        assert!(task_copy.is_alive());
        flag.clear();
        assert!(!task_copy.is_alive());
    }

    #[test]
    fn default_sources_point_at_static_data() {
        let sources = DataSources::default();
        assert!(sources.grid.ends_with("hex-grid.json"));
        assert!(sources.countries.ends_with(".geojson"));
        assert!(sources.provinces.ends_with(".geojson"));
    }
}
