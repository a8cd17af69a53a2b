use crate::{
    rng::{derive_seed, hash_unit},
    template::WorldBounds,
    terrain::{TerrainSampler, WaterType},
    util::{self, Point2, Vector2},
    world::{
        feature::{RiverFeature, RiverProperties, RiverType, WorldPoint},
        generate::{Stage, StageContext, StageId},
        sdf,
    },
};
use log::debug;

/// Tuning constants for river generation. All distances in blocks, all
/// elevations normalized.
#[derive(Copy, Clone, Debug)]
pub struct RiverConfig {
    pub source_grid_size: f64,
    pub min_source_elevation: f64,
    pub min_humidity: f64,
    pub step_size: f64,
    pub max_path_length: usize,
    pub min_path_length: usize,
    pub sea_level: f64,
    pub gradient_epsilon: f64,
    pub meander_strength: f64,
    pub min_gradient: f64,
    pub min_descent_per_step: f64,
}

pub const RIVER_CONFIG: RiverConfig = RiverConfig {
    source_grid_size: 300.0,
    min_source_elevation: 0.25,
    min_humidity: 0.15,
    step_size: 12.0,
    max_path_length: 800,
    min_path_length: 15,
    sea_level: crate::terrain::SEA_LEVEL,
    gradient_epsilon: 16.0,
    meander_strength: 0.25,
    min_gradient: 0.0005,
    min_descent_per_step: 0.001,
};

/// Narrowest stream width, blocks.
const STREAM_MIN_WIDTH: f64 = 2.0;
/// Base width a fully grown river approaches before humidity/length scaling.
const RIVER_MAX_WIDTH: f64 = 14.0;
/// Tributary mouths within this distance of another river merge into it.
const MERGE_DISTANCE: f64 = 32.0;

/// Traces rivers from high, humid sources downhill to the sea.
#[derive(Debug)]
pub struct RiverStage;

impl Stage for RiverStage {
    fn id(&self) -> StageId {
        StageId::Rivers
    }

    fn version(&self) -> &'static str {
        "3"
    }

    fn weight(&self) -> u32 {
        3
    }

    fn active_form(&self) -> &'static str {
        "Carving the rivers"
    }

    fn generate(&self, cx: &mut StageContext<'_>) -> anyhow::Result<()> {
        let salt = derive_seed(cx.seed, "rivers");
        let bounds = cx.template.world_bounds();
        let sources = discover_sources(cx.sampler, bounds, salt);
        debug!("{} river source candidates", sources.len());

        let mut rivers: Vec<RiverFeature> = Vec::new();
        for source in &sources {
            let trace_salt = salt.wrapping_add(rivers.len() as u32 + 1);
            let trace = trace_river(cx.sampler, bounds, source, trace_salt);
            if trace.path.len() < RIVER_CONFIG.min_path_length {
                continue;
            }
            let id = rivers.len() as u32 + 1;
            rivers.push(build_river(id, source, trace));
        }

        merge_tributaries(&mut rivers);
        debug!("Kept {} rivers", rivers.len());
        cx.data.rivers = rivers;
        Ok(())
    }
}

/// A qualified river source.
#[derive(Copy, Clone, Debug)]
pub(crate) struct RiverSource {
    pub x: f64,
    pub z: f64,
    pub elevation: f64,
    pub humidity: f64,
}

impl RiverSource {
    fn score(&self) -> f64 {
        self.elevation + self.humidity
    }
}

/// One source candidate per grid cell, at a deterministic jittered offset;
/// qualified by elevation, humidity and dry ground, ordered by score
/// (best first).
fn discover_sources(
    sampler: &TerrainSampler<'_>,
    bounds: WorldBounds,
    salt: u32,
) -> Vec<RiverSource> {
    let cell = RIVER_CONFIG.source_grid_size;
    let min_cell = (bounds.min / cell).floor() as i32;
    let max_cell = ((bounds.max - 1.0) / cell).floor() as i32;

    let mut sources = Vec::new();
    for gx in min_cell..=max_cell {
        for gz in min_cell..=max_cell {
            let offset_x = (0.1 + 0.8 * hash_unit(gx, gz, salt)) * cell;
            let offset_z = (0.1 + 0.8 * hash_unit(gx, gz, salt.wrapping_add(1))) * cell;
            let x = gx as f64 * cell + offset_x;
            let z = gz as f64 * cell + offset_z;
            if !bounds.contains(x, z) {
                continue;
            }
            let params = sampler.params(x, z);
            if params.height_normalized >= RIVER_CONFIG.min_source_elevation
                && params.humidity >= RIVER_CONFIG.min_humidity
                && params.water_type == WaterType::None
            {
                sources.push(RiverSource {
                    x,
                    z,
                    elevation: params.height_normalized,
                    humidity: params.humidity,
                });
            }
        }
    }
    // Stable sort keeps scan order as the tie-break, so equal scores are
    // still deterministic
    sources.sort_by(|a, b| util::cmp_unwrap(&b.score(), &a.score()));
    sources
}

/// Result of one downhill trace.
pub(crate) struct RiverTrace {
    pub path: Vec<WorldPoint>,
    pub elevations: Vec<f64>,
    /// Total steps on which the gradient was below the minimum.
    pub stuck_steps: usize,
    pub ended_at_sea: bool,
    pub clamped_at_bounds: bool,
}

/// Trace downhill from a source with ocean-bias blending, meander, and
/// monotonic elevation recording. The recorded elevation can only go down
/// (by at least `min_descent_per_step` while the gradient is flat) and
/// never drops below sea level, regardless of what the raw terrain does.
pub(crate) fn trace_river(
    sampler: &TerrainSampler<'_>,
    bounds: WorldBounds,
    source: &RiverSource,
    trace_salt: u32,
) -> RiverTrace {
    let cfg = &RIVER_CONFIG;
    let ocean_dir = nearest_ocean_direction(sampler, source.x, source.z);

    let mut path = vec![WorldPoint::new(source.x, source.z)];
    let mut elevations = vec![source.elevation];
    let mut current_elevation = source.elevation;

    let mut pos = Point2::new(source.x, source.z);
    let mut stuck = 0usize;
    let mut stuck_total = 0usize;
    let mut ended_at_sea = false;
    let mut clamped_at_bounds = false;

    for i in 0..cfg.max_path_length {
        // Central-difference gradient of the pure height field
        let e = cfg.gradient_epsilon;
        let h_left = sampler.height_for_river_gen(pos.x - e, pos.y);
        let h_right = sampler.height_for_river_gen(pos.x + e, pos.y);
        let h_back = sampler.height_for_river_gen(pos.x, pos.y - e);
        let h_front = sampler.height_for_river_gen(pos.x, pos.y + e);
        let grad = Vector2::new((h_right - h_left) / (2.0 * e), (h_front - h_back) / (2.0 * e));
        let magnitude = grad.norm();
        let flow = if magnitude > 1e-12 {
            -grad / magnitude
        } else {
            Vector2::new(0.0, 0.0)
        };

        let mut dir = if magnitude < cfg.min_gradient {
            stuck += 1;
            stuck_total += 1;
            if stuck >= 3 {
                let angle =
                    std::f64::consts::TAU * hash_unit(i as i32, 7, trace_salt);
                ocean_dir * 0.8 + Vector2::new(angle.cos(), angle.sin()) * 0.2
            } else {
                flow * 0.4 + ocean_dir * 0.6
            }
        } else {
            stuck = 0;
            flow * 0.8 + ocean_dir * 0.2
        };
        if dir.norm() < 1e-9 {
            dir = ocean_dir;
        } else {
            dir = dir.normalize();
        }

        // Meander: stronger on flat ground, direction from a coarse
        // position hash so nearby steps wiggle coherently
        let flatness = 1.0 - (10.0 * magnitude).min(1.0);
        let meander_angle = std::f64::consts::TAU
            * hash_unit(
                (pos.x / 32.0).floor() as i32,
                (pos.y / 32.0).floor() as i32,
                trace_salt.wrapping_add(i as u32),
            );
        let meander = Vector2::new(meander_angle.cos(), meander_angle.sin())
            * (cfg.meander_strength * flatness * cfg.step_size);

        let mut next = pos + dir * cfg.step_size + meander;

        let out_of_bounds = !bounds.contains(next.x, next.y);
        if out_of_bounds {
            let (cx, cz) = bounds.clamp(next.x, next.y);
            next = Point2::new(cx, cz);
            clamped_at_bounds = true;
        }

        let terrain_height = sampler.height_for_river_gen(next.x, next.y);

        // Monotonic descent by construction: the recorded elevation never
        // rises, drops by at least the minimum while stuck, and bottoms
        // out at sea level
        let mut elevation = current_elevation.min(terrain_height);
        if stuck > 0 {
            elevation = elevation.min(current_elevation - cfg.min_descent_per_step);
        }
        elevation = elevation.max(cfg.sea_level);

        path.push(WorldPoint::new(next.x, next.y));
        elevations.push(elevation);
        current_elevation = elevation;

        if terrain_height < cfg.sea_level {
            ended_at_sea = true;
            break;
        }
        if out_of_bounds {
            break;
        }
        pos = next;
    }

    RiverTrace {
        path,
        elevations,
        stuck_steps: stuck_total,
        ended_at_sea,
        clamped_at_bounds,
    }
}

/// Direction toward the nearest ocean sample, scanned over fixed radii and
/// 16 azimuths. Defaults to north when no ocean is in range.
fn nearest_ocean_direction(sampler: &TerrainSampler<'_>, x: f64, z: f64) -> Vector2 {
    for radius in [150.0, 300.0, 500.0, 800.0, 1200.0, 1600.0] {
        for az in 0..16u32 {
            let angle = az as f64 / 16.0 * std::f64::consts::TAU;
            let dir = Vector2::new(angle.cos(), angle.sin());
            let q = Point2::new(x, z) + dir * radius;
            if sampler.height_for_river_gen(q.x, q.y) < RIVER_CONFIG.sea_level {
                return dir;
            }
        }
    }
    Vector2::new(0.0, -1.0)
}

/// Attach the width profile and classify the river.
fn build_river(id: u32, source: &RiverSource, trace: RiverTrace) -> RiverFeature {
    let n = trace.path.len();
    let humidity_scale = 0.6 + 0.6 * source.humidity;
    let length_scale = (1.0 + n as f64 / 100.0).min(2.0);
    let mouth_width = RIVER_MAX_WIDTH * humidity_scale * length_scale;

    let widths: Vec<f64> = (0..n)
        .map(|i| {
            let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
            round_tenth(STREAM_MIN_WIDTH + (mouth_width - STREAM_MIN_WIDTH) * t * t)
        })
        .collect();

    let river_type = classify_river(*widths.last().unwrap());
    RiverFeature {
        id,
        kind: RiverFeature::KIND.to_string(),
        path: trace.path,
        widths,
        elevations: trace.elevations,
        properties: RiverProperties {
            source_elevation: source.elevation,
            river_type,
            merged_into: None,
            junction_point: None,
        },
    }
}

fn classify_river(final_width: f64) -> RiverType {
    if final_width < 3.0 {
        RiverType::Stream
    } else if final_width < 6.0 {
        RiverType::Creek
    } else if final_width < 12.0 {
        RiverType::River
    } else {
        RiverType::GreatRiver
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Merge tributaries: for each ordered pair `(main, tributary)` with the
/// tributary traced later, a tributary mouth within [MERGE_DISTANCE] of the
/// main course becomes a confluence. The main river widens downstream of
/// the junction, the tributary's tail elevation eases onto the main's, and
/// the tributary is tagged (never deleted).
pub(crate) fn merge_tributaries(rivers: &mut [RiverFeature]) {
    for j in 1..rivers.len() {
        if rivers[j].properties.merged_into.is_some() {
            continue;
        }
        for i in 0..j {
            let mouth = *rivers[j].path.last().unwrap();
            let main_points: Vec<Point2> =
                rivers[i].path.iter().map(|p| Point2::new(p.x, p.z)).collect();
            let Some(hit) = sdf::distance_to_polyline(Point2::new(mouth.x, mouth.z), &main_points)
            else {
                continue;
            };
            if hit.distance >= MERGE_DISTANCE {
                continue;
            }

            let junction = if hit.t > 0.5 { hit.segment + 1 } else { hit.segment };
            let (head, tail) = rivers.split_at_mut(j);
            let main = &mut head[i];
            let tributary = &mut tail[0];

            // Widen the main river downstream of the confluence
            let extra = round_tenth(*tributary.widths.last().unwrap() * 0.5);
            for width in main.widths.iter_mut().skip(junction) {
                *width = round_tenth(*width + extra);
            }

            // Ease the tributary's tail elevations onto the main course,
            // then re-enforce monotonic descent over the touched span
            let junction_elevation = main.elevations[junction];
            let len = tributary.elevations.len();
            let count = 5.min(len - 1);
            for s in 0..count {
                let idx = len - count + s;
                let t = (s + 1) as f64 / count as f64;
                tributary.elevations[idx] =
                    util::lerp(tributary.elevations[idx], junction_elevation, t * t);
            }
            for idx in (len - count)..len {
                tributary.elevations[idx] =
                    tributary.elevations[idx].min(tributary.elevations[idx - 1]);
            }

            tributary.properties.merged_into = Some(main.id);
            tributary.properties.junction_point = Some(main.path[junction]);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{
        ContinentTemplate, FlattenRegion, MountainBoost, NormRegion, Template,
    };

    /// A template whose interior is a perfectly flat plateau at height 0.5:
    /// constant region boost, zeroed ridge weight, fully flattened relief.
    fn plateau_template() -> ContinentTemplate {
        let mut raw = Template::default();
        raw.elevation.mountain_boost = MountainBoost {
            region: Some(NormRegion {
                min_x: 0.3,
                min_z: 0.3,
                max_x: 0.7,
                max_z: 0.7,
            }),
            strength: 0.5,
            ridge_weight: 0.0,
        };
        raw.elevation.flatten_region = FlattenRegion {
            region: None,
            flatness: 1.0,
        };
        ContinentTemplate::resolve(raw).unwrap()
    }

    #[test]
    fn test_trace_on_flat_plateau_enforces_descent() {
        let template = plateau_template();
        let sampler = TerrainSampler::new(99, &template);
        let source = RiverSource {
            x: 0.0,
            z: 0.0,
            elevation: sampler.height_for_river_gen(0.0, 0.0),
            humidity: 0.5,
        };
        assert!(source.elevation > 0.45, "plateau height {}", source.elevation);

        let trace = trace_river(&sampler, template.world_bounds(), &source, 4242);
        // Zero gradient on the plateau: the stuck path must have engaged
        assert!(trace.stuck_steps > 0);
        // Monotonic non-increasing elevations, by construction
        for pair in trace.elevations.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12, "elevation rose: {:?}", pair);
        }
        // While stuck, descent is at least the configured minimum
        assert!(trace.elevations[1] <= trace.elevations[0] - RIVER_CONFIG.min_descent_per_step);
        // Parallel arrays
        assert_eq!(trace.path.len(), trace.elevations.len());
        // Recorded elevations never dip below sea level
        for e in &trace.elevations {
            assert!(*e >= RIVER_CONFIG.sea_level - 1e-12);
        }
    }

    #[test]
    fn test_width_profile_monotone() {
        let source = RiverSource {
            x: 0.0,
            z: 0.0,
            elevation: 0.5,
            humidity: 0.8,
        };
        let n = 60;
        let trace = RiverTrace {
            path: (0..n).map(|i| WorldPoint::new(i as f64 * 12.0, 0.0)).collect(),
            elevations: (0..n).map(|i| 0.5 - i as f64 * 0.005).collect(),
            stuck_steps: 0,
            ended_at_sea: true,
            clamped_at_bounds: false,
        };
        let river = build_river(1, &source, trace);
        assert_eq!(river.widths.len(), n);
        assert_eq!(river.widths[0], STREAM_MIN_WIDTH);
        for pair in river.widths.windows(2) {
            assert!(pair[1] >= pair[0], "width shrank: {:?}", pair);
        }
        // Widths are rounded to 0.1
        for w in &river.widths {
            assert!((w * 10.0 - (w * 10.0).round()).abs() < 1e-9);
        }
    }

    fn synthetic_river(id: u32, points: Vec<(f64, f64)>, start_elev: f64) -> RiverFeature {
        let n = points.len();
        RiverFeature {
            id,
            kind: RiverFeature::KIND.to_string(),
            path: points.iter().map(|&(x, z)| WorldPoint::new(x, z)).collect(),
            widths: vec![4.0; n],
            elevations: (0..n).map(|i| start_elev - i as f64 * 0.01).collect(),
            properties: RiverProperties {
                source_elevation: start_elev,
                river_type: RiverType::Creek,
                merged_into: None,
                junction_point: None,
            },
        }
    }

    #[test]
    fn test_tributary_merge() {
        // Main river flows east along z=0; tributary approaches from the
        // north and ends 10 blocks from the main course near x=500
        let main = synthetic_river(
            1,
            (0..100).map(|i| (i as f64 * 12.0, 0.0)).collect(),
            0.9,
        );
        let tributary = synthetic_river(
            2,
            (0..30).map(|i| (500.0, 300.0 - i as f64 * 10.0)).collect(),
            0.6,
        );
        let before_widths = main.widths.clone();
        let mut rivers = vec![main, tributary];
        merge_tributaries(&mut rivers);

        let trib = &rivers[1];
        assert_eq!(trib.properties.merged_into, Some(1));
        let junction = trib.properties.junction_point.expect("junction point");
        assert!((junction.z - 0.0).abs() < 1e-9);
        assert!((junction.x - 500.0).abs() <= 12.0);

        // Main widened downstream of the junction by half the tributary's
        // mouth width
        let main = &rivers[0];
        let junction_idx = main
            .path
            .iter()
            .position(|p| (p.x - junction.x).abs() < 1e-9)
            .unwrap();
        for m in junction_idx..main.widths.len() {
            assert!(main.widths[m] >= before_widths[m] + 2.0 - 1e-9);
        }
        for m in 0..junction_idx {
            assert_eq!(main.widths[m], before_widths[m]);
        }

        // Tributary elevations still monotonically non-increasing after
        // the tail easing
        for pair in trib.elevations.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
    }

    #[test]
    fn test_distant_rivers_do_not_merge() {
        let a = synthetic_river(1, (0..40).map(|i| (i as f64 * 12.0, 0.0)).collect(), 0.8);
        let b = synthetic_river(
            2,
            (0..40).map(|i| (i as f64 * 12.0, 500.0)).collect(),
            0.8,
        );
        let mut rivers = vec![a, b];
        merge_tributaries(&mut rivers);
        assert_eq!(rivers[1].properties.merged_into, None);
        assert_eq!(rivers[1].properties.junction_point, None);
    }

    #[test]
    fn test_classify_river_bands() {
        assert_eq!(classify_river(2.0), RiverType::Stream);
        assert_eq!(classify_river(4.0), RiverType::Creek);
        assert_eq!(classify_river(8.0), RiverType::River);
        assert_eq!(classify_river(20.0), RiverType::GreatRiver);
    }
}
