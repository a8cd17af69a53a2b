//! Zone model: 800-block grid tiles with gameplay-facing classification,
//! plus the spatial influence index used for O(1)-ish "which zones am I in"
//! queries.

use crate::{util, world::feature::WorldPoint};
use fnv::{FnvBuildHasher, FnvHashMap};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Side length of one zone grid cell, in blocks.
pub const ZONE_GRID_SIZE: f64 = 800.0;
/// Influence radius of a zone around its center, in blocks.
pub const ZONE_RADIUS: f64 = 400.0;
/// Side length of one influence-index cell, in blocks. Deliberately smaller
/// than the zone grid: a zone's influence disc overlaps several index cells
/// even though the zone owns exactly one grid cell.
pub const ZONE_INDEX_CELL_SIZE: f64 = 256.0;

/// Zone map keyed by grid key. IndexMap preserves insertion order, which is
/// the deterministic placement order, so iteration and re-serialization are
/// stable.
pub type ZoneMap = IndexMap<String, Zone, FnvBuildHasher>;
/// Landmark map keyed by grid key (same ordering rationale as [ZoneMap]).
pub type LandmarkMap = IndexMap<String, crate::world::feature::Landmark, FnvBuildHasher>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ZoneType {
    Haven,
    Crossroads,
    Borderlands,
    Wilderness,
    Mountains,
    Coast,
    Forest,
    Desert,
    Ocean,
}

impl ZoneType {
    /// Anchor zone types are placed by targeted discovery (top candidate
    /// wins) rather than by the procedural grid fill.
    pub fn is_anchor(self) -> bool {
        matches!(self, Self::Haven | Self::Crossroads | Self::Borderlands)
    }
}

/// Atmosphere knobs carried by each zone for downstream content systems.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneFeel {
    pub mood: String,
    pub openness: f64,
    pub danger: f64,
}

/// Suggested character-level band for a zone, inclusive, within `[1, 20]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LevelRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    pub center: WorldPoint,
    /// "gx,gz" of the owning 800-block grid cell. At most one zone per key.
    pub grid_key: String,
    pub radius: f64,
    pub levels: LevelRange,
    pub feel: ZoneFeel,
    /// Grid keys of 8-connected neighbor zones. Only keys that exist in the
    /// zone map appear here.
    pub adjacent_zones: Vec<String>,
}

/// Grid cell containing a world position.
pub fn grid_cell_of(x: f64, z: f64) -> (i32, i32) {
    (
        (x / ZONE_GRID_SIZE).floor() as i32,
        (z / ZONE_GRID_SIZE).floor() as i32,
    )
}

pub fn grid_key(gx: i32, gz: i32) -> String {
    format!("{},{}", gx, gz)
}

pub fn grid_key_of(x: f64, z: f64) -> String {
    let (gx, gz) = grid_cell_of(x, z);
    grid_key(gx, gz)
}

pub fn parse_grid_key(key: &str) -> Option<(i32, i32)> {
    let (gx, gz) = key.split_once(',')?;
    Some((gx.parse().ok()?, gz.parse().ok()?))
}

/// Center of a grid cell in world space.
pub fn grid_cell_center(gx: i32, gz: i32) -> WorldPoint {
    WorldPoint::new(
        (gx as f64 + 0.5) * ZONE_GRID_SIZE,
        (gz as f64 + 0.5) * ZONE_GRID_SIZE,
    )
}

/// Spatial index over zone influence discs. Buckets each zone into every
/// 256-block index cell its `center ± radius` square overlaps; queries scan
/// the 3×3 neighborhood of the query cell.
///
/// Built lazily by callers (construction walks the whole zone map once).
pub struct ZoneInfluenceIndex<'a> {
    cells: FnvHashMap<(i32, i32), Vec<&'a Zone>>,
}

impl<'a> ZoneInfluenceIndex<'a> {
    pub fn new(zones: &'a ZoneMap) -> Self {
        let mut cells: FnvHashMap<(i32, i32), Vec<&'a Zone>> = FnvHashMap::default();
        for zone in zones.values() {
            let min_cx = ((zone.center.x - zone.radius) / ZONE_INDEX_CELL_SIZE).floor() as i32;
            let max_cx = ((zone.center.x + zone.radius) / ZONE_INDEX_CELL_SIZE).floor() as i32;
            let min_cz = ((zone.center.z - zone.radius) / ZONE_INDEX_CELL_SIZE).floor() as i32;
            let max_cz = ((zone.center.z + zone.radius) / ZONE_INDEX_CELL_SIZE).floor() as i32;
            for cx in min_cx..=max_cx {
                for cz in min_cz..=max_cz {
                    cells.entry((cx, cz)).or_default().push(zone);
                }
            }
        }
        Self { cells }
    }

    /// All zones with positive influence at a world position, strongest
    /// first (ties broken by zone id for determinism).
    pub fn influence_at(&self, x: f64, z: f64) -> Vec<(&'a Zone, f64)> {
        let cx = (x / ZONE_INDEX_CELL_SIZE).floor() as i32;
        let cz = (z / ZONE_INDEX_CELL_SIZE).floor() as i32;

        let mut seen: Vec<u32> = Vec::new();
        let mut results: Vec<(&'a Zone, f64)> = Vec::new();
        for dx in -1..=1 {
            for dz in -1..=1 {
                let Some(bucket) = self.cells.get(&(cx + dx, cz + dz)) else {
                    continue;
                };
                for &zone in bucket {
                    if seen.contains(&zone.id) {
                        continue;
                    }
                    seen.push(zone.id);
                    let influence = zone_influence(zone, x, z);
                    if influence > 0.0 {
                        results.push((zone, influence));
                    }
                }
            }
        }
        results.sort_by(|(za, ia), (zb, ib)| {
            util::cmp_unwrap(ib, ia).then_with(|| za.id.cmp(&zb.id))
        });
        results
    }
}

/// Influence of a zone at a position: full strength out to half the radius,
/// smoothstepping to zero at the radius edge.
pub fn zone_influence(zone: &Zone, x: f64, z: f64) -> f64 {
    let distance = (x - zone.center.x).hypot(z - zone.center.z);
    1.0 - util::smoothstep(0.5, 1.0, distance / zone.radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn test_zone(id: u32, x: f64, z: f64) -> Zone {
        Zone {
            id,
            name: format!("Zone {}", id),
            zone_type: ZoneType::Wilderness,
            center: WorldPoint::new(x, z),
            grid_key: grid_key_of(x, z),
            radius: ZONE_RADIUS,
            levels: LevelRange { min: 1, max: 5 },
            feel: ZoneFeel {
                mood: "quiet".into(),
                openness: 0.5,
                danger: 0.2,
            },
            adjacent_zones: Vec::new(),
        }
    }

    #[test]
    fn test_grid_keys() {
        assert_eq!(grid_key_of(0.0, 0.0), "0,0");
        assert_eq!(grid_key_of(-1.0, 799.0), "-1,0");
        assert_eq!(grid_key_of(800.0, -800.0), "1,-1");
        assert_eq!(parse_grid_key("3,-4"), Some((3, -4)));
        assert_eq!(parse_grid_key("nope"), None);
    }

    #[test]
    fn test_zone_influence_profile() {
        let zone = test_zone(1, 0.0, 0.0);
        // Full influence inside half the radius
        assert_approx_eq!(zone_influence(&zone, 0.0, 0.0), 1.0);
        assert_approx_eq!(zone_influence(&zone, 190.0, 0.0), 1.0);
        // Zero at and beyond the radius
        assert_approx_eq!(zone_influence(&zone, 400.0, 0.0), 0.0);
        assert_approx_eq!(zone_influence(&zone, 600.0, 0.0), 0.0);
        // Monotone in between
        let near = zone_influence(&zone, 250.0, 0.0);
        let far = zone_influence(&zone, 350.0, 0.0);
        assert!(near > far && far > 0.0);
    }

    #[test]
    fn test_influence_index_query() {
        let mut zones = ZoneMap::default();
        let a = test_zone(1, 400.0, 400.0);
        let b = test_zone(2, 1000.0, 400.0);
        zones.insert(a.grid_key.clone(), a);
        zones.insert(b.grid_key.clone(), b);

        let index = ZoneInfluenceIndex::new(&zones);
        // Point near zone 1's center sees only zone 1
        let hits = index.influence_at(400.0, 400.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, 1);
        assert_approx_eq!(hits[0].1, 1.0);

        // Point midway between the two sees both (300 blocks from each
        // center), sorted by influence
        let hits = index.influence_at(700.0, 400.0);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].1 >= hits[1].1);
    }

    #[test]
    fn test_zone_spans_multiple_index_cells() {
        let mut zones = ZoneMap::default();
        let zone = test_zone(1, 0.0, 0.0);
        zones.insert(zone.grid_key.clone(), zone);
        let index = ZoneInfluenceIndex::new(&zones);
        // radius 400 over 256-block cells: the disc square spans cells
        // [-2..1] on each axis
        assert!(index.cells.len() >= 9);
        // A query from an adjacent cell still finds the zone
        let hits = index.influence_at(-300.0, -300.0);
        assert_eq!(hits.len(), 1);
    }
}
