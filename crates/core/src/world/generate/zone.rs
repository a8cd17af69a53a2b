use crate::{
    rng::{derive_seed, hash32},
    template::WorldBounds,
    terrain::{Biome, TerrainSampler, WaterType},
    world::{
        feature::WorldPoint,
        generate::{Stage, StageContext, StageId},
        zone::{
            grid_cell_of, grid_key, LevelRange, Zone, ZoneFeel, ZoneMap, ZoneType, ZONE_GRID_SIZE,
            ZONE_RADIUS,
        },
    },
};
use log::debug;

/// Sampling step for haven and pass discovery, blocks.
const ANCHOR_GRID_STEP: f64 = 128.0;
/// Sampling step for lake-shore discovery, blocks.
const LAKE_GRID_STEP: f64 = 64.0;
/// Bucket size for deduplicating lake candidates, blocks.
const LAKE_BUCKET: f64 = 256.0;
/// Radius at which a lake candidate's surroundings are probed.
const LAKE_NEIGHBOR_RADIUS: f64 = 256.0;
/// Coast-proximity sweep: radii up to this limit.
const COAST_SWEEP_MAX: f64 = 512.0;
/// Saddle test: cardinal probes this far out must be higher by the margin.
const SADDLE_PROBE: f64 = 64.0;
const SADDLE_MARGIN: f64 = 0.1;
/// Minimum land fraction for a grid cell to become a zone.
const MIN_LAND_RATIO: f64 = 0.3;

/// Discovers the zone layer: anchor zones first (haven, lake shore,
/// mountain pass), then a procedural fill over every remaining land-bearing
/// grid cell, then adjacency. First claim on a grid key wins, so anchors
/// always beat the fill.
#[derive(Debug)]
pub struct ZoneStage;

impl Stage for ZoneStage {
    fn id(&self) -> StageId {
        StageId::Zones
    }

    fn version(&self) -> &'static str {
        "2"
    }

    fn weight(&self) -> u32 {
        2
    }

    fn active_form(&self) -> &'static str {
        "Discovering the zones"
    }

    fn generate(&self, cx: &mut StageContext<'_>) -> anyhow::Result<()> {
        let naming_salt = derive_seed(cx.seed, "zone-names");
        let mut zones = ZoneMap::default();
        let mut next_id = 1u32;

        let bounds = cx.template.world_bounds();

        // Anchors, in fixed order
        if let Some(candidate) = find_haven(cx.sampler, bounds) {
            place_zone(
                &mut zones,
                &mut next_id,
                ZoneType::Haven,
                candidate,
                LevelRange { min: 1, max: 3 },
                naming_salt,
            );
        }
        if let Some(candidate) = find_lake_shore(cx.sampler, bounds) {
            place_zone(
                &mut zones,
                &mut next_id,
                ZoneType::Borderlands,
                candidate,
                LevelRange { min: 5, max: 9 },
                naming_salt,
            );
        }
        if let Some(candidate) = find_mountain_pass(cx.sampler, bounds) {
            place_zone(
                &mut zones,
                &mut next_id,
                ZoneType::Crossroads,
                candidate,
                LevelRange { min: 8, max: 12 },
                naming_salt,
            );
        }

        // Procedural fill over the remaining grid
        let haven_center = zones
            .values()
            .find(|z| z.zone_type == ZoneType::Haven)
            .map(|z| z.center);
        fill_grid(cx.sampler, bounds, &mut zones, &mut next_id, haven_center, naming_salt);

        connect_adjacency(&mut zones);
        debug!("Discovered {} zones", zones.len());
        cx.data.zones = zones;
        Ok(())
    }
}

struct AnchorCandidate {
    position: WorldPoint,
    height: f64,
}

/// Distance-based coast proximity: 0 when no water is within the sweep,
/// approaching 1 right at the shore.
fn coast_proximity(sampler: &TerrainSampler<'_>, x: f64, z: f64) -> f64 {
    for ring in 1..=8u32 {
        let radius = ring as f64 * 64.0;
        if radius > COAST_SWEEP_MAX {
            break;
        }
        for az in 0..8u32 {
            let angle = az as f64 / 8.0 * std::f64::consts::TAU;
            let qx = x + radius * angle.cos();
            let qz = z + radius * angle.sin();
            if sampler.height_for_river_gen(qx, qz) < crate::terrain::SEA_LEVEL {
                return 1.0 - radius / COAST_SWEEP_MAX;
            }
        }
    }
    0.0
}

/// Best haven site: dry land near the coast, flat and low. Top candidate
/// wins outright.
fn find_haven(sampler: &TerrainSampler<'_>, bounds: WorldBounds) -> Option<AnchorCandidate> {
    let mut best: Option<(f64, AnchorCandidate)> = None;

    let mut x = bounds.min + ANCHOR_GRID_STEP * 0.5;
    while x < bounds.max {
        let mut z = bounds.min + ANCHOR_GRID_STEP * 0.5;
        while z < bounds.max {
            let params = sampler.params(x, z);
            if params.water_type == WaterType::None {
                let coast = coast_proximity(sampler, x, z);
                if coast > 0.2 {
                    let score = 0.4 * coast
                        + 0.3 * (1.0 - params.ridgeness)
                        + 0.3 * (1.0 - params.height_normalized);
                    if best.as_ref().map_or(true, |(s, _)| score > *s) {
                        best = Some((
                            score,
                            AnchorCandidate {
                                position: WorldPoint::new(x, z),
                                height: params.height_normalized,
                            },
                        ));
                    }
                }
            }
            z += ANCHOR_GRID_STEP;
        }
        x += ANCHOR_GRID_STEP;
    }
    best.map(|(_, c)| c)
}

/// Best lake-shore site: a shallow-water pocket mostly enclosed by land,
/// anchored at the nearest dry shore point.
fn find_lake_shore(sampler: &TerrainSampler<'_>, bounds: WorldBounds) -> Option<AnchorCandidate> {
    let mut visited_buckets: Vec<(i32, i32)> = Vec::new();
    let mut best: Option<(u32, AnchorCandidate)> = None;

    let mut x = bounds.min + LAKE_GRID_STEP * 0.5;
    while x < bounds.max {
        let mut z = bounds.min + LAKE_GRID_STEP * 0.5;
        while z < bounds.max {
            let params = sampler.params(x, z);
            if params.water_type != WaterType::Shallow {
                z += LAKE_GRID_STEP;
                continue;
            }
            let bucket = ((x / LAKE_BUCKET).floor() as i32, (z / LAKE_BUCKET).floor() as i32);
            if visited_buckets.contains(&bucket) {
                z += LAKE_GRID_STEP;
                continue;
            }
            visited_buckets.push(bucket);

            // Mostly-enclosed check: at least 4 of 8 points on the
            // surrounding ring are dry land
            let mut land_neighbors = 0u32;
            for az in 0..8u32 {
                let angle = az as f64 / 8.0 * std::f64::consts::TAU;
                let qx = x + LAKE_NEIGHBOR_RADIUS * angle.cos();
                let qz = z + LAKE_NEIGHBOR_RADIUS * angle.sin();
                if sampler.params(qx, qz).water_type == WaterType::None {
                    land_neighbors += 1;
                }
            }
            if land_neighbors >= 4 {
                if let Some(shore) = best_shore(sampler, x, z) {
                    let better = best.as_ref().map_or(true, |(n, _)| land_neighbors > *n);
                    if better {
                        let height = sampler.params(shore.x, shore.z).height_normalized;
                        best = Some((
                            land_neighbors,
                            AnchorCandidate {
                                position: shore,
                                height,
                            },
                        ));
                    }
                }
            }
            z += LAKE_GRID_STEP;
        }
        x += LAKE_GRID_STEP;
    }
    best.map(|(_, c)| c)
}

/// Nearest dry land around a water point, from radial sweeps.
fn best_shore(sampler: &TerrainSampler<'_>, x: f64, z: f64) -> Option<WorldPoint> {
    for ring in 1..=8u32 {
        let radius = ring as f64 * 64.0;
        for az in 0..8u32 {
            let angle = az as f64 / 8.0 * std::f64::consts::TAU;
            let qx = x + radius * angle.cos();
            let qz = z + radius * angle.sin();
            if sampler.params(qx, qz).water_type == WaterType::None {
                return Some(WorldPoint::new(qx, qz));
            }
        }
    }
    None
}

/// Best mountain-pass site: mid-elevation saddle inside a mountain biome
/// (at least two of the four cardinal probes clearly higher).
fn find_mountain_pass(
    sampler: &TerrainSampler<'_>,
    bounds: WorldBounds,
) -> Option<AnchorCandidate> {
    let mut best: Option<(u32, AnchorCandidate)> = None;

    let mut x = bounds.min + ANCHOR_GRID_STEP * 0.5;
    while x < bounds.max {
        let mut z = bounds.min + ANCHOR_GRID_STEP * 0.5;
        while z < bounds.max {
            let params = sampler.params(x, z);
            let height = params.height_normalized;
            if params.biome.is_mountainous() && (0.35..=0.6).contains(&height) {
                let mut higher = 0u32;
                for (dx, dz) in [(SADDLE_PROBE, 0.0), (-SADDLE_PROBE, 0.0), (0.0, SADDLE_PROBE), (0.0, -SADDLE_PROBE)]
                {
                    if sampler.height_for_river_gen(x + dx, z + dz) >= height + SADDLE_MARGIN {
                        higher += 1;
                    }
                }
                if higher >= 2 {
                    let better = best.as_ref().map_or(true, |(h, _)| higher > *h);
                    if better {
                        best = Some((
                            higher,
                            AnchorCandidate {
                                position: WorldPoint::new(x, z),
                                height,
                            },
                        ));
                    }
                }
            }
            z += ANCHOR_GRID_STEP;
        }
        x += ANCHOR_GRID_STEP;
    }
    best.map(|(_, c)| c)
}

/// Insert an anchor zone unless its grid cell is already claimed.
fn place_zone(
    zones: &mut ZoneMap,
    next_id: &mut u32,
    zone_type: ZoneType,
    candidate: AnchorCandidate,
    levels: LevelRange,
    naming_salt: u32,
) {
    let (gx, gz) = grid_cell_of(candidate.position.x, candidate.position.z);
    let key = grid_key(gx, gz);
    if zones.contains_key(&key) {
        return;
    }
    let id = *next_id;
    *next_id += 1;
    let zone = Zone {
        id,
        name: zone_name(zone_type, gx, gz, naming_salt),
        zone_type,
        center: candidate.position,
        grid_key: key.clone(),
        radius: ZONE_RADIUS,
        levels,
        feel: feel_for(zone_type, levels, candidate.height),
        adjacent_zones: Vec::new(),
    };
    zones.insert(key, zone);
}

/// Procedural fill: every unclaimed grid cell with enough land becomes a
/// zone classified from its center biome, leveled by distance from the
/// haven.
fn fill_grid(
    sampler: &TerrainSampler<'_>,
    bounds: WorldBounds,
    zones: &mut ZoneMap,
    next_id: &mut u32,
    haven_center: Option<WorldPoint>,
    naming_salt: u32,
) {
    let min_cell = (bounds.min / ZONE_GRID_SIZE).floor() as i32;
    let max_cell = ((bounds.max - 1.0) / ZONE_GRID_SIZE).floor() as i32;

    for gx in min_cell..=max_cell {
        for gz in min_cell..=max_cell {
            let key = grid_key(gx, gz);
            if zones.contains_key(&key) {
                continue;
            }

            // 3x3 land ratio across the cell
            let mut land = 0u32;
            for ix in 0..3 {
                for iz in 0..3 {
                    let sx = (gx as f64 + 0.25 * (ix + 1) as f64) * ZONE_GRID_SIZE;
                    let sz = (gz as f64 + 0.25 * (iz + 1) as f64) * ZONE_GRID_SIZE;
                    if sampler.params(sx, sz).water_type == WaterType::None {
                        land += 1;
                    }
                }
            }
            if (land as f64 / 9.0) < MIN_LAND_RATIO {
                continue;
            }

            let center = crate::world::zone::grid_cell_center(gx, gz);
            let params = sampler.params(center.x, center.z);
            let zone_type = zone_type_for_biome(params.biome);

            let levels = level_range(
                haven_center,
                center,
                params.height_normalized,
            );
            let id = *next_id;
            *next_id += 1;
            let zone = Zone {
                id,
                name: zone_name(zone_type, gx, gz, naming_salt),
                zone_type,
                center,
                grid_key: key.clone(),
                radius: ZONE_RADIUS,
                levels,
                feel: feel_for(zone_type, levels, params.height_normalized),
                adjacent_zones: Vec::new(),
            };
            zones.insert(key, zone);
        }
    }
}

/// Map a center biome to the zone classification used by the fill.
fn zone_type_for_biome(biome: Biome) -> ZoneType {
    use Biome::*;
    match biome {
        Ocean | Beach => ZoneType::Coast,
        Mountains | Alpine | Highlands | Glacier | Badlands | Volcanic => ZoneType::Mountains,
        Jungle | Rainforest | DeciduousForest | AutumnForest | Taiga => ZoneType::Forest,
        Desert | RedDesert => ZoneType::Desert,
        Plains | Meadow | Savanna | Swamp | Tundra | Snow => ZoneType::Wilderness,
    }
}

/// Level band from distance to the haven, plus an elevation bonus. With no
/// haven the continent is all deep wilderness.
fn level_range(haven: Option<WorldPoint>, center: WorldPoint, height: f64) -> LevelRange {
    let (mut min, mut max) = match haven {
        Some(haven) => {
            let distance = haven.distance_to(&center);
            if distance < 500.0 {
                (1, 5)
            } else if distance < 1000.0 {
                (5, 10)
            } else if distance < 1500.0 {
                (10, 15)
            } else {
                (15, 20)
            }
        }
        None => (15, 20),
    };
    let bonus = (3.0 * height).floor() as u32;
    min = (min + bonus).min(20);
    max = (max + bonus).min(20);
    LevelRange { min, max }
}

fn feel_for(zone_type: ZoneType, levels: LevelRange, height: f64) -> ZoneFeel {
    use ZoneType::*;
    let (mood, openness) = match zone_type {
        Haven => ("sheltered", 0.7),
        Crossroads => ("windswept", 0.5),
        Borderlands => ("uneasy", 0.6),
        Wilderness => ("untamed", 0.6),
        Mountains => ("forbidding", 0.3),
        Coast => ("bright", 0.8),
        Forest => ("hushed", 0.2),
        Desert => ("desolate", 0.9),
        Ocean => ("endless", 1.0),
    };
    ZoneFeel {
        mood: mood.to_string(),
        openness: (openness - 0.2 * height).clamp(0.0, 1.0),
        danger: levels.max as f64 / 20.0,
    }
}

/// Two-part name from per-type word lists, indexed by the position hash so
/// names are stable for a given seed and cell.
fn zone_name(zone_type: ZoneType, gx: i32, gz: i32, naming_salt: u32) -> String {
    use ZoneType::*;
    let (prefixes, suffixes): (&[&str], &[&str]) = match zone_type {
        Haven => (
            &["Last", "Quiet", "Golden", "Safe"],
            &["Harbor", "Anchorage", "Rest", "Landing"],
        ),
        Crossroads => (
            &["High", "Broken", "Old", "Windy"],
            &["Pass", "Gap", "Crossing", "Saddle"],
        ),
        Borderlands => (
            &["Still", "Gray", "Far", "Mirror"],
            &["Shore", "Marches", "Reach", "Banks"],
        ),
        Wilderness => (
            &["Wild", "Lost", "Rolling", "Silent"],
            &["Expanse", "Steppe", "Fields", "Barrens"],
        ),
        Mountains => (
            &["Iron", "Thunder", "Frost", "Shattered"],
            &["Peaks", "Crags", "Heights", "Spires"],
        ),
        Coast => (
            &["Salt", "Gull", "Pearl", "Storm"],
            &["Coast", "Strand", "Cliffs", "Sands"],
        ),
        Forest => (
            &["Elder", "Deep", "Whispering", "Tangled"],
            &["Wood", "Thicket", "Grove", "Wilds"],
        ),
        Desert => (
            &["Burning", "Amber", "Hollow", "Sunken"],
            &["Wastes", "Dunes", "Flats", "Basin"],
        ),
        Ocean => (
            &["Endless", "Dark", "Shining", "Cold"],
            &["Sea", "Deep", "Gulf", "Expanse"],
        ),
    };
    let prefix = prefixes[hash32(gx, gz, naming_salt) as usize % prefixes.len()];
    let suffix = suffixes[hash32(gz, gx, naming_salt.wrapping_add(1)) as usize % suffixes.len()];
    format!("{} {}", prefix, suffix)
}

/// 8-connected adjacency among placed zones. Only existing keys are
/// recorded.
fn connect_adjacency(zones: &mut ZoneMap) {
    let keys: Vec<String> = zones.keys().cloned().collect();
    for key in &keys {
        let Some((gx, gz)) = crate::world::zone::parse_grid_key(key) else {
            continue;
        };
        let mut adjacent = Vec::new();
        for dx in -1..=1 {
            for dz in -1..=1 {
                if dx == 0 && dz == 0 {
                    continue;
                }
                let neighbor = grid_key(gx + dx, gz + dz);
                if zones.contains_key(&neighbor) {
                    adjacent.push(neighbor);
                }
            }
        }
        if let Some(zone) = zones.get_mut(key) {
            zone.adjacent_zones = adjacent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_type_mapping_is_total() {
        // Every biome maps somewhere sensible
        assert_eq!(zone_type_for_biome(Biome::Alpine), ZoneType::Mountains);
        assert_eq!(zone_type_for_biome(Biome::Taiga), ZoneType::Forest);
        assert_eq!(zone_type_for_biome(Biome::RedDesert), ZoneType::Desert);
        assert_eq!(zone_type_for_biome(Biome::Beach), ZoneType::Coast);
        assert_eq!(zone_type_for_biome(Biome::Swamp), ZoneType::Wilderness);
    }

    #[test]
    fn test_level_tiers() {
        let haven = Some(WorldPoint::new(0.0, 0.0));
        assert_eq!(
            level_range(haven, WorldPoint::new(100.0, 0.0), 0.0),
            LevelRange { min: 1, max: 5 }
        );
        assert_eq!(
            level_range(haven, WorldPoint::new(700.0, 0.0), 0.0),
            LevelRange { min: 5, max: 10 }
        );
        assert_eq!(
            level_range(haven, WorldPoint::new(1200.0, 0.0), 0.0),
            LevelRange { min: 10, max: 15 }
        );
        assert_eq!(
            level_range(haven, WorldPoint::new(3000.0, 0.0), 0.0),
            LevelRange { min: 15, max: 20 }
        );
        // Elevation bonus, capped at 20
        assert_eq!(
            level_range(haven, WorldPoint::new(100.0, 0.0), 0.9),
            LevelRange { min: 3, max: 7 }
        );
        assert_eq!(
            level_range(haven, WorldPoint::new(3000.0, 0.0), 1.0),
            LevelRange { min: 18, max: 20 }
        );
        // No haven: deep wilderness everywhere
        assert_eq!(
            level_range(None, WorldPoint::new(0.0, 0.0), 0.0),
            LevelRange { min: 15, max: 20 }
        );
    }

    #[test]
    fn test_zone_names_deterministic() {
        let a = zone_name(ZoneType::Forest, 3, -2, 1234);
        let b = zone_name(ZoneType::Forest, 3, -2, 1234);
        assert_eq!(a, b);
        assert!(a.contains(' '));
        // Different cells usually differ; at minimum the function must not
        // depend on hidden state
        let c = zone_name(ZoneType::Forest, 4, -2, 1234);
        let d = zone_name(ZoneType::Forest, 4, -2, 1234);
        assert_eq!(c, d);
    }

    #[test]
    fn test_adjacency_only_existing_keys() {
        let mut zones = ZoneMap::default();
        for (gx, gz) in [(0, 0), (1, 0), (5, 5)] {
            let key = grid_key(gx, gz);
            zones.insert(
                key.clone(),
                Zone {
                    id: zones.len() as u32 + 1,
                    name: "Test".into(),
                    zone_type: ZoneType::Wilderness,
                    center: crate::world::zone::grid_cell_center(gx, gz),
                    grid_key: key,
                    radius: ZONE_RADIUS,
                    levels: LevelRange { min: 1, max: 5 },
                    feel: feel_for(ZoneType::Wilderness, LevelRange { min: 1, max: 5 }, 0.2),
                    adjacent_zones: Vec::new(),
                },
            );
        }
        connect_adjacency(&mut zones);
        assert_eq!(zones["0,0"].adjacent_zones, vec!["1,0".to_string()]);
        assert_eq!(zones["1,0"].adjacent_zones, vec!["0,0".to_string()]);
        assert!(zones["5,5"].adjacent_zones.is_empty());
    }
}
