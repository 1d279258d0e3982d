use frontline_shared::{BattleRecord, HexGridIndex, HexTile, OwnershipMap, faction_color};

use crate::animation::ease_in_out_sine;
use crate::shader::overlay::{OverlayVertex, push_disc, push_line, push_ring, push_triangle};
use crate::viewport::lnglat_to_mercator;

pub const PING_CYCLE_MS: f64 = 2600.0;
pub const PING_CORE_RADIUS_PX: f64 = 5.0;
pub const PING_CORE_PULSE_PX: f64 = 2.5;
pub const PING_RING_SPREAD_PX: f64 = 18.0;
pub const PING_RING_FADE_EXPONENT: f64 = 2.6;
pub const PING_RING_INNER_RATIO: f32 = 0.78;
pub const LINE_WIDTH_MIN_PX: f64 = 0.8;
pub const LINE_WIDTH_MAX_PX: f64 = 2.8;
/// Arrow length bounds in cos(lat)-scaled degrees.
pub const ARROW_MIN_LEN: f64 = 0.08;
pub const ARROW_MAX_LEN: f64 = 0.9;
const ARROW_LEN_RATIO: f64 = 0.3;
const ARROW_HALF_WIDTH_RATIO: f64 = 0.55;
/// The arrow tip stops this fraction of the way short of the defender center.
const ARROW_TIP_SETBACK: f64 = 0.22;
const SDF_FEATHER: f32 = 0.12;

/// Everything needed to draw one live battle.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleVisual {
    pub battle_id: String,
    pub attacker_hex: String,
    pub defender_hex: String,
    pub attacker_pos: [f64; 2],
    pub defender_pos: [f64; 2],
    /// Unit vector attacker → defender in cos(lat)-scaled space.
    pub direction: [f64; 2],
    /// Tip, then the two back corners, in lon/lat.
    pub arrow: [[f64; 2]; 3],
    /// Normalized RGB.
    pub color: [f32; 3],
}

fn owned_by(ownership: &OwnershipMap, id: &str, community: &str) -> bool {
    ownership.get(id).and_then(|o| o.owner()) == Some(community)
}

/// Adjacent attacker-owned hex if any, otherwise the attacker-owned hex
/// closest to the target.
fn resolve_attacker_tile<'g>(
    battle: &BattleRecord,
    target: &HexTile,
    grid: &'g HexGridIndex,
    ownership: &OwnershipMap,
) -> Option<&'g HexTile> {
    let attacker = battle.attacker_community_id.as_str();
    if let Some(adjacent) = grid
        .neighbors_of(&target.id)
        .into_iter()
        .find(|t| owned_by(ownership, &t.id, attacker))
    {
        return Some(adjacent);
    }

    let dist2 = |t: &HexTile| {
        let dx = t.center[0] - target.center[0];
        let dy = t.center[1] - target.center[1];
        dx * dx + dy * dy
    };
    ownership
        .iter()
        .filter(|(id, o)| o.owner() == Some(attacker) && id.as_str() != target.id)
        .filter_map(|(id, _)| grid.get(id))
        .min_by(|a, b| dist2(a).total_cmp(&dist2(b)).then_with(|| a.id.cmp(&b.id)))
}

fn battle_color(battle: &BattleRecord, ownership: &OwnershipMap, attacker_hex: &str) -> [f32; 3] {
    let (r, g, b) = battle
        .attacker_color()
        .or_else(|| ownership.get(attacker_hex).and_then(|o| o.color()))
        .unwrap_or_else(|| faction_color(&battle.attacker_community_id));
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
}

/// Arrowhead for a segment, plus the unit direction. `None` when the
/// endpoints coincide.
pub fn arrow_polygon(from: [f64; 2], to: [f64; 2]) -> Option<([f64; 2], [[f64; 2]; 3])> {
    let lat_scale = ((from[1] + to[1]) * 0.5).to_radians().cos().max(1e-6);
    let dx = (to[0] - from[0]) * lat_scale;
    let dy = to[1] - from[1];
    let dist = dx.hypot(dy);
    if !dist.is_finite() || dist <= f64::EPSILON {
        return None;
    }
    let dir = [dx / dist, dy / dist];
    let perp = [-dir[1], dir[0]];
    let len = (dist * ARROW_LEN_RATIO).clamp(ARROW_MIN_LEN, ARROW_MAX_LEN);
    let half = len * ARROW_HALF_WIDTH_RATIO;

    // Work relative to `from` in scaled space, then unscale longitude.
    let tip = [dx - dir[0] * dist * ARROW_TIP_SETBACK, dy - dir[1] * dist * ARROW_TIP_SETBACK];
    let base = [tip[0] - dir[0] * len, tip[1] - dir[1] * len];
    let unscale = |p: [f64; 2]| [from[0] + p[0] / lat_scale, from[1] + p[1]];
    let arrow = [
        unscale(tip),
        unscale([base[0] + perp[0] * half, base[1] + perp[1] * half]),
        unscale([base[0] - perp[0] * half, base[1] - perp[1] * half]),
    ];
    Some((dir, arrow))
}

/// One visual per active battle whose target and attacker tile both resolve.
pub fn resolve_battle_visuals(
    battles: &[BattleRecord],
    grid: &HexGridIndex,
    ownership: &OwnershipMap,
) -> Vec<BattleVisual> {
    battles
        .iter()
        .filter(|b| b.is_active())
        .filter_map(|battle| {
            let defender = grid.get(&battle.target_hex_id)?;
            let attacker = resolve_attacker_tile(battle, defender, grid, ownership)?;
            let (direction, arrow) = arrow_polygon(attacker.center, defender.center)?;
            Some(BattleVisual {
                battle_id: battle.id.clone(),
                attacker_hex: attacker.id.clone(),
                defender_hex: defender.id.clone(),
                attacker_pos: attacker.center,
                defender_pos: defender.center,
                direction,
                arrow,
                color: battle_color(battle, ownership, &attacker.id),
            })
        })
        .collect()
}

/// Connecting line width for a zoom level.
pub fn line_width_px(zoom: f64) -> f64 {
    (0.8 + (zoom - 2.0) * 0.3).clamp(LINE_WIDTH_MIN_PX, LINE_WIDTH_MAX_PX)
}

fn zoom_compensation(zoom: f64) -> f64 {
    (0.6 + zoom * 0.1).clamp(0.7, 1.6)
}

/// Ping animation sample shared by every battle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingState {
    /// 0..1 position within the cycle.
    pub phase: f64,
    pub core_radius_px: f64,
    pub core_alpha: f64,
    pub ring_radius_px: f64,
    /// Zero during the second half of the cycle.
    pub ring_alpha: f64,
}

pub fn ping_state(anim_time_ms: f64, zoom: f64) -> PingState {
    let phase = anim_time_ms.max(0.0).rem_euclid(PING_CYCLE_MS) / PING_CYCLE_MS;
    let breath = ease_in_out_sine(if phase < 0.5 { phase * 2.0 } else { 2.0 - phase * 2.0 });
    let k = zoom_compensation(zoom);

    let (ring_radius_px, ring_alpha) = if phase < 0.5 {
        let p = phase / 0.5;
        (
            (PING_CORE_RADIUS_PX + p * PING_RING_SPREAD_PX) * k,
            (1.0 - p).powf(PING_RING_FADE_EXPONENT),
        )
    } else {
        (0.0, 0.0)
    };

    PingState {
        phase,
        core_radius_px: (PING_CORE_RADIUS_PX + PING_CORE_PULSE_PX * breath) * k,
        core_alpha: 0.7 + 0.3 * breath,
        ring_radius_px,
        ring_alpha,
    }
}

/// Per-frame overlay geometry for every battle, sized in pixels via `world_size`.
pub fn battle_overlay_vertices(
    visuals: &[BattleVisual],
    ping: &PingState,
    zoom: f64,
    world_size: f64,
) -> Vec<OverlayVertex> {
    if world_size <= 0.0 {
        return Vec::new();
    }
    let px = |v: f64| v / world_size;
    let merc = |p: [f64; 2]| lnglat_to_mercator(p[0], p[1]);
    let line_width = px(line_width_px(zoom));
    let mut out = Vec::with_capacity(visuals.len() * 21);

    for v in visuals {
        let [r, g, b] = v.color;
        let solid = [r, g, b, 0.9];
        let tip = merc(v.arrow[0]);
        push_line(&mut out, merc(v.attacker_pos), tip, line_width, solid);
        push_triangle(&mut out, [tip, merc(v.arrow[1]), merc(v.arrow[2])], solid);

        let center = merc(v.defender_pos);
        if ping.ring_alpha > 0.0 {
            push_ring(
                &mut out,
                center,
                px(ping.ring_radius_px),
                PING_RING_INNER_RATIO,
                [r, g, b, ping.ring_alpha as f32],
                SDF_FEATHER,
            );
        }
        push_disc(
            &mut out,
            center,
            px(ping.core_radius_px),
            [r, g, b, ping.core_alpha as f32],
            SDF_FEATHER,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontline_shared::HexId;
    use frontline_shared::hex::{odd_r_center, regular_contour};
    use serde_json::json;

    fn grid(cells: &[(i32, i32)]) -> HexGridIndex {
        HexGridIndex::build(
            cells
                .iter()
                .map(|&(r, c)| {
                    let center = odd_r_center(HexId::new(r, c), 0.5);
                    HexTile {
                        id: HexId::new(r, c).to_string(),
                        contour: regular_contour(center, 0.5),
                        center,
                    }
                })
                .collect(),
        )
    }

    fn battle(target: &str, attacker: &str, status: &str) -> BattleRecord {
        serde_json::from_value(json!({
            "id": format!("b-{target}"),
            "target_hex_id": target,
            "attacker_community_id": attacker,
            "status": status
        }))
        .expect("battle should deserialize")
    }

    fn owners(pairs: &[(&str, &str)]) -> OwnershipMap {
        pairs
            .iter()
            .map(|(id, owner)| {
                let rec = serde_json::from_value(json!({ "owner_community_id": owner }))
                    .expect("ownership should deserialize");
                (id.to_string(), rec)
            })
            .collect()
    }

    #[test]
    fn adjacent_attacker_hex_beats_closer_looking_ids() {
        let g = grid(&[(4, 4), (4, 5), (4, 1), (0, 0)]);
        let own = owners(&[("0-0", "A"), ("4-1", "A"), ("4-5", "A"), ("4-4", "B")]);
        let v = resolve_battle_visuals(&[battle("4-4", "A", "active")], &g, &own);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].attacker_hex, "4-5");
        assert_eq!(v[0].defender_hex, "4-4");
    }

    #[test]
    fn falls_back_to_nearest_owned_hex() {
        let g = grid(&[(4, 4), (4, 7), (4, 1), (9, 9)]);
        let own = owners(&[("9-9", "A"), ("4-7", "A"), ("4-1", "C")]);
        let v = resolve_battle_visuals(&[battle("4-4", "A", "active")], &g, &own);
        assert_eq!(v[0].attacker_hex, "4-7");
    }

    #[test]
    fn skips_unresolvable_and_inactive_battles() {
        let g = grid(&[(4, 4), (4, 5)]);
        let own = owners(&[("4-5", "A")]);
        let battles = [
            battle("4-4", "Z", "active"),
            battle("8-8", "A", "active"),
            battle("4-4", "A", "ended"),
        ];
        assert!(resolve_battle_visuals(&battles, &g, &own).is_empty());
    }

    #[test]
    fn attacker_never_resolves_to_the_target_itself() {
        let g = grid(&[(4, 4)]);
        let own = owners(&[("4-4", "A")]);
        assert!(resolve_battle_visuals(&[battle("4-4", "A", "active")], &g, &own).is_empty());
    }

    #[test]
    fn arrow_points_at_defender_and_is_clamped() {
        let (dir, arrow) = arrow_polygon([0.0, 0.0], [10.0, 0.0]).expect("distinct points");
        assert!((dir[0] - 1.0).abs() < 1e-12 && dir[1].abs() < 1e-12);
        assert!(arrow[0][0] < 10.0 && arrow[0][0] > arrow[1][0]);
        let len = arrow[0][0] - arrow[1][0];
        assert!((len - ARROW_MAX_LEN).abs() < 1e-9);

        let (_, tiny) = arrow_polygon([0.0, 0.0], [0.01, 0.0]).expect("distinct points");
        assert!((tiny[0][0] - tiny[1][0] - ARROW_MIN_LEN).abs() < 1e-9);
        assert!(arrow_polygon([1.0, 1.0], [1.0, 1.0]).is_none());
    }

    #[test]
    fn direction_accounts_for_latitude() {
        let (dir, _) = arrow_polygon([0.0, 60.0], [1.0, 61.0]).expect("distinct points");
        // One degree of longitude is about half a degree of latitude at 60°.
        assert!(dir[1] > dir[0]);
    }

    #[test]
    fn line_width_is_clamped() {
        assert_eq!(line_width_px(0.0), LINE_WIDTH_MIN_PX);
        assert_eq!(line_width_px(20.0), LINE_WIDTH_MAX_PX);
        let mid = line_width_px(5.0);
        assert!(mid > LINE_WIDTH_MIN_PX && mid < LINE_WIDTH_MAX_PX);
    }

    #[test]
    fn ping_ring_expands_then_disappears() {
        let start = ping_state(0.0, 5.0);
        let quarter = ping_state(PING_CYCLE_MS * 0.25, 5.0);
        let late = ping_state(PING_CYCLE_MS * 0.75, 5.0);
        assert_eq!(start.ring_alpha, 1.0);
        assert!(quarter.ring_radius_px > start.ring_radius_px);
        assert!(quarter.ring_alpha < 0.5f64.powf(2.0));
        assert_eq!(late.ring_alpha, 0.0);
        // Periodic.
        assert_eq!(ping_state(PING_CYCLE_MS * 3.25, 5.0), quarter);
    }

    #[test]
    fn ping_core_breathes() {
        let rest = ping_state(0.0, 5.0).core_radius_px;
        let peak = ping_state(PING_CYCLE_MS * 0.5, 5.0).core_radius_px;
        assert!(peak > rest);
        assert!((ping_state(PING_CYCLE_MS, 5.0).core_radius_px - rest).abs() < 1e-9);
    }

    #[test]
    fn overlay_vertices_per_battle() {
        let g = grid(&[(4, 4), (4, 5)]);
        let own = owners(&[("4-5", "A")]);
        let visuals = resolve_battle_visuals(&[battle("4-4", "A", "active")], &g, &own);
        let with_ring = battle_overlay_vertices(&visuals, &ping_state(100.0, 4.0), 4.0, 8192.0);
        // Line quad 6, arrow 3, ring quad 6, core quad 6.
        assert_eq!(with_ring.len(), 21);
        let no_ring = battle_overlay_vertices(&visuals, &ping_state(2000.0, 4.0), 4.0, 8192.0);
        assert_eq!(no_ring.len(), 15);
    }
}
