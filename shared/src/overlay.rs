use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::colors::parse_hex_color;

pub type OwnershipMap = HashMap<String, RegionOwnership>;
pub type ResourceDistribution = HashMap<String, ResourceBonus>;

/// Owning community as embedded in an ownership record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommunityInfo {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capital_hex_id: Option<String>,
}

/// Per-hex ownership overlay supplied by the host application.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionOwnership {
    #[serde(default)]
    pub owner_community_id: Option<String>,
    #[serde(default)]
    pub communities: Option<CommunityInfo>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub province_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub fortification_level: i32,
    #[serde(default)]
    pub resource_yield: f64,
}

impl RegionOwnership {
    /// Explicit community color, if present and parseable.
    pub fn color(&self) -> Option<(u8, u8, u8)> {
        self.communities
            .as_ref()
            .and_then(|c| c.color.as_deref())
            .and_then(parse_hex_color)
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner_community_id.as_deref()
    }

    pub fn is_capital(&self, hex_id: &str) -> bool {
        self.communities
            .as_ref()
            .and_then(|c| c.capital_hex_id.as_deref())
            == Some(hex_id)
    }
}

/// Label for a hex: custom name, then display name, then province, then the id.
pub fn display_name<'a>(ownership: &'a OwnershipMap, hex_id: &'a str) -> &'a str {
    ownership
        .get(hex_id)
        .and_then(|o| {
            o.custom_name
                .as_deref()
                .or(o.display_name.as_deref())
                .or(o.province_name.as_deref())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or(hex_id)
}

/// Stable signature of the hex → color assignment. Changes whenever any
/// hex gains, loses or changes its explicit color.
pub fn ownership_color_generation(ownership: &OwnershipMap) -> u64 {
    let mut entries: Vec<(&str, (u8, u8, u8))> = ownership
        .iter()
        .filter_map(|(id, o)| o.color().map(|c| (id.as_str(), c)))
        .collect();
    entries.sort_unstable();
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    entries.hash(&mut hasher);
    hasher.finish()
}

/// A capital cell: hex id, owning community id, explicit color if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Capital {
    pub hex_id: String,
    pub community_id: String,
    pub color: Option<(u8, u8, u8)>,
}

/// Every hex that is the declared capital of the community owning it.
pub fn capital_hexes(ownership: &OwnershipMap) -> Vec<Capital> {
    let mut out: Vec<Capital> = ownership
        .iter()
        .filter(|(id, o)| o.is_capital(id))
        .filter_map(|(id, o)| {
            Some(Capital {
                hex_id: id.clone(),
                community_id: o.owner()?.to_string(),
                color: o.color(),
            })
        })
        .collect();
    out.sort_by(|a, b| a.hex_id.cmp(&b.hex_id));
    out
}

/// Hex ids grouped by owning community.
pub fn hexes_by_owner(ownership: &OwnershipMap) -> HashMap<&str, Vec<&str>> {
    let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, o) in ownership {
        if let Some(owner) = o.owner() {
            groups.entry(owner).or_default().push(id.as_str());
        }
    }
    for ids in groups.values_mut() {
        ids.sort_unstable();
    }
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleStatus {
    Active,
    #[default]
    #[serde(other)]
    Ended,
}

/// Side summary attached to a battle record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BattleSide {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Battle as reported by the host. Mechanics are opaque; only ids, status and
/// side colors matter for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRecord {
    pub id: String,
    pub target_hex_id: String,
    pub attacker_community_id: String,
    #[serde(default)]
    pub defender_community_id: Option<String>,
    #[serde(default)]
    pub status: BattleStatus,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub initial_defense: f64,
    #[serde(default)]
    pub current_defense: f64,
    #[serde(default)]
    pub attacker: Option<BattleSide>,
    #[serde(default)]
    pub defender: Option<BattleSide>,
}

impl BattleRecord {
    pub fn is_active(&self) -> bool {
        self.status == BattleStatus::Active
    }

    /// Remaining defense as a 0..1 fraction of the initial value.
    pub fn defense_fraction(&self) -> f64 {
        if self.initial_defense <= 0.0 {
            return 0.0;
        }
        (self.current_defense / self.initial_defense).clamp(0.0, 1.0)
    }

    pub fn attacker_color(&self) -> Option<(u8, u8, u8)> {
        self.attacker
            .as_ref()
            .and_then(|s| s.color.as_deref())
            .and_then(parse_hex_color)
    }
}

/// Resource bonus attached to a hex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBonus {
    pub resource_key: String,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub percentage: f64,
}

/// All hexes carrying resource `key`, sorted by id.
pub fn resource_zone<'a>(distribution: &'a ResourceDistribution, key: &str) -> Vec<&'a str> {
    let mut ids: Vec<&str> = distribution
        .iter()
        .filter(|(_, bonus)| bonus.resource_key == key)
        .map(|(id, _)| id.as_str())
        .collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ownership_fixture() -> OwnershipMap {
        serde_json::from_value(json!({
            "10-10": {
                "owner_community_id": "A",
                "communities": { "color": "#ff0000", "name": "Red", "capital_hex_id": "10-10" },
                "fortification_level": 3
            },
            "10-11": {
                "owner_community_id": "B",
                "communities": { "name": "Blue", "capital_hex_id": "4-4" },
                "custom_name": "Bluehold"
            },
            "10-12": { "province_name": "Marches" }
        }))
        .expect("fixture should deserialize")
    }

    #[test]
    fn ownership_color_parses_community_color() {
        let map = ownership_fixture();
        assert_eq!(map["10-10"].color(), Some((255, 0, 0)));
        assert_eq!(map["10-11"].color(), None);
    }

    #[test]
    fn capitals_only_include_declared_capital_cells() {
        let caps = capital_hexes(&ownership_fixture());
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].hex_id, "10-10");
        assert_eq!(caps[0].community_id, "A");
        assert_eq!(caps[0].color, Some((255, 0, 0)));
    }

    #[test]
    fn display_name_precedence() {
        let map = ownership_fixture();
        assert_eq!(display_name(&map, "10-11"), "Bluehold");
        assert_eq!(display_name(&map, "10-12"), "Marches");
        assert_eq!(display_name(&map, "10-10"), "10-10");
        assert_eq!(display_name(&map, "0-0"), "0-0");
    }

    #[test]
    fn color_generation_tracks_color_changes_only() {
        let mut map = ownership_fixture();
        let before = ownership_color_generation(&map);
        map.get_mut("10-11").expect("hex").fortification_level = 9;
        assert_eq!(ownership_color_generation(&map), before);
        if let Some(c) = map.get_mut("10-10").and_then(|o| o.communities.as_mut()) {
            c.color = Some("#00ff00".into());
        }
        assert_ne!(ownership_color_generation(&map), before);
    }

    #[test]
    fn battle_status_unknown_values_are_ended() {
        let battles: Vec<BattleRecord> = serde_json::from_value(json!([
            { "id": "b1", "target_hex_id": "10-11", "attacker_community_id": "A", "status": "active" },
            { "id": "b2", "target_hex_id": "1-1", "attacker_community_id": "A", "status": "resolved" },
            { "id": "b3", "target_hex_id": "1-2", "attacker_community_id": "A" }
        ]))
        .expect("battles should deserialize");
        let active: Vec<&str> = battles
            .iter()
            .filter(|b| b.is_active())
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(active, vec!["b1"]);
    }

    #[test]
    fn defense_fraction_is_clamped_share_of_initial() {
        let battles: Vec<BattleRecord> = serde_json::from_value(json!([
            { "id": "b1", "target_hex_id": "1-1", "attacker_community_id": "A",
              "initial_defense": 200.0, "current_defense": 50.0 },
            { "id": "b2", "target_hex_id": "1-2", "attacker_community_id": "A",
              "initial_defense": 100.0, "current_defense": 140.0 },
            { "id": "b3", "target_hex_id": "1-3", "attacker_community_id": "A" }
        ]))
        .expect("battles should deserialize");
        let fractions: Vec<f64> = battles.iter().map(BattleRecord::defense_fraction).collect();
        assert_eq!(fractions, vec![0.25, 1.0, 0.0]);
    }

    #[test]
    fn resource_zone_collects_matching_keys() {
        let dist: ResourceDistribution = serde_json::from_value(json!({
            "1-1": { "resource_key": "iron", "percentage": 12.5 },
            "1-2": { "resource_key": "grain" },
            "0-4": { "resource_key": "iron", "resource_name": "Iron" }
        }))
        .expect("distribution should deserialize");
        assert_eq!(resource_zone(&dist, "iron"), vec!["0-4", "1-1"]);
        assert!(resource_zone(&dist, "gold").is_empty());
    }
}
