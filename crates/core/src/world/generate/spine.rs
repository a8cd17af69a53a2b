use crate::{
    noise,
    rng::{derive_seed, hash_unit},
    template::ShapeRegime,
    terrain::TerrainSampler,
    util::{cosine_taper, Point2, Vector2},
    world::{
        feature::{Direction8, SpineFeature, SpinePoint, SpineType},
        generate::{Stage, StageContext, StageId},
    },
};
use log::{debug, warn};

/// Sampling resolution of the land grid used for blob detection, blocks.
const BLOB_GRID_STEP: f64 = 100.0;
/// Blobs smaller than this many grid cells are noise, not landmasses.
const MIN_BLOB_CELLS: usize = 20;
/// Spacing of traced spine points along the principal axis, blocks.
const TRACE_SPACING: f64 = 50.0;
/// Frequency / amplitude of the organic warp applied orthogonally to the
/// traced axis.
const WARP_FREQUENCY: f64 = 0.003;
const WARP_AMPLITUDE: f64 = 30.0;
/// Traced points closer than this to the coast get pushed inland.
const COAST_CLEARANCE: f64 = 200.0;
/// Elevation taper endpoints for traced spines.
const END_ELEVATION: f64 = 0.4;
const CENTER_ELEVATION: f64 = 0.9;
/// Secondary branch tuning.
const BRANCH_PROBABILITY: f64 = 0.4;
const BRANCH_LENGTH_RATIO: f64 = 0.4;
const SECONDARY_ELEVATION_SCALE: f64 = 0.7;

/// Emits the mountain ridgelines. Spine-first templates have their authored
/// polylines lifted into world space; templates that request mountains
/// without authoring a ridgeline (`elevation.mountainBoost.strength > 0`)
/// get spines discovered from the continentalness field. Flat templates
/// emit none.
#[derive(Debug)]
pub struct SpineStage;

impl Stage for SpineStage {
    fn id(&self) -> StageId {
        StageId::Mountains
    }

    fn version(&self) -> &'static str {
        "3"
    }

    fn weight(&self) -> u32 {
        2
    }

    fn active_form(&self) -> &'static str {
        "Raising the mountain spines"
    }

    fn generate(&self, cx: &mut StageContext<'_>) -> anyhow::Result<()> {
        let template = cx.template;
        let spines = match template.regime() {
            ShapeRegime::SpineFirst => lift_from_template(cx),
            ShapeRegime::LegacyRadial
                if template.template().elevation.mountain_boost.strength > 0.0 =>
            {
                discover_spines(cx)
            }
            ShapeRegime::LegacyRadial => Vec::new(),
        };
        debug!("Emitted {} spine(s)", spines.len());
        cx.data.spines = spines;
        Ok(())
    }
}

/// Convert the authored spine polylines into world-space spine features.
/// Authored polylines are sparse control points, so each one is resampled
/// at trace spacing before the elevation profile is applied; otherwise a
/// two-point spine would have no center to peak at.
fn lift_from_template(cx: &StageContext<'_>) -> Vec<SpineFeature> {
    let template = cx.template;
    let t = template.template();
    let mut spines = Vec::new();
    let mut next_id = 1u32;

    let primary_points: Vec<Point2> = t
        .spine
        .points
        .iter()
        .map(|p| template.norm_to_world(*p))
        .collect();
    let primary_points = resample_polyline(&primary_points, TRACE_SPACING);
    let primary_id = next_id;
    next_id += 1;
    spines.push(build_spine(
        primary_id,
        SpineType::Primary,
        &primary_points,
        END_ELEVATION.min(t.spine.elevation),
        t.spine.elevation,
        1.0,
        None,
    ));

    for secondary in &t.secondary_spines {
        let points: Vec<Point2> = secondary
            .points
            .iter()
            .map(|p| template.norm_to_world(*p))
            .collect();
        let points = resample_polyline(&points, TRACE_SPACING);
        let id = next_id;
        next_id += 1;
        spines.push(build_spine(
            id,
            SpineType::Secondary,
            &points,
            END_ELEVATION.min(secondary.elevation),
            secondary.elevation,
            1.0,
            Some(primary_id),
        ));
    }

    spines
}

/// Resample a polyline at (roughly) fixed arc-length spacing, keeping the
/// exact endpoints.
fn resample_polyline(points: &[Point2], spacing: f64) -> Vec<Point2> {
    debug_assert!(points.len() >= 2);
    let mut result = vec![points[0]];
    let mut carry = 0.0;
    for pair in points.windows(2) {
        let segment = pair[1] - pair[0];
        let length = segment.norm();
        if length < f64::EPSILON {
            continue;
        }
        let dir = segment / length;
        let mut travelled = spacing - carry;
        while travelled < length {
            result.push(pair[0] + dir * travelled);
            travelled += spacing;
        }
        carry = length - (travelled - spacing);
    }
    let last = points[points.len() - 1];
    if (result[result.len() - 1] - last).norm() > f64::EPSILON {
        result.push(last);
    }
    result
}

/// Build a spine feature with the cosine elevation/prominence profile.
fn build_spine(
    id: u32,
    spine_type: SpineType,
    points: &[Point2],
    end_elevation: f64,
    center_elevation: f64,
    elevation_scale: f64,
    parent_id: Option<u32>,
) -> SpineFeature {
    let n = points.len();
    let path: Vec<SpinePoint> = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.5 };
            let falloff = cosine_taper(t);
            SpinePoint {
                x: p.x,
                z: p.y,
                elevation: (end_elevation + (center_elevation - end_elevation) * falloff)
                    * elevation_scale,
                prominence: 0.5 + 0.5 * falloff,
            }
        })
        .collect();

    let first = points[0];
    let last = points[n - 1];
    SpineFeature {
        id,
        spine_type,
        path,
        direction: Direction8::from_delta(last.x - first.x, last.y - first.y),
        parent_id,
    }
}

/// Discover ridgelines from the continentalness field: find land blobs,
/// trace each blob's principal axis with an organic warp, and branch
/// secondary ridges off the interior.
fn discover_spines(cx: &StageContext<'_>) -> Vec<SpineFeature> {
    let sampler = cx.sampler;
    let bounds = cx.template.world_bounds();
    let cells_per_axis = (bounds.extent() / BLOB_GRID_STEP).round() as usize;

    // Land grid at blob resolution
    let cell_center = |i: usize, j: usize| {
        Point2::new(
            bounds.min + (i as f64 + 0.5) * BLOB_GRID_STEP,
            bounds.min + (j as f64 + 0.5) * BLOB_GRID_STEP,
        )
    };
    let mut land = vec![false; cells_per_axis * cells_per_axis];
    for i in 0..cells_per_axis {
        for j in 0..cells_per_axis {
            let p = cell_center(i, j);
            land[i * cells_per_axis + j] = sampler.is_land(p.x, p.y);
        }
    }

    let blobs = find_blobs(&land, cells_per_axis);
    let spines_seed = derive_seed(cx.seed, "spines");

    let mut spines = Vec::new();
    let mut next_id = 1u32;
    for (blob_id, blob) in blobs.iter().enumerate() {
        if blob.len() < MIN_BLOB_CELLS {
            continue;
        }
        let branch_seed = spines_seed.wrapping_add(blob_id as u32);
        let points: Vec<Point2> = blob.iter().map(|&(i, j)| cell_center(i, j)).collect();

        let Some(path) = trace_blob_axis(sampler, &points, branch_seed) else {
            continue;
        };

        let primary_id = next_id;
        next_id += 1;
        spines.push(build_spine(
            primary_id,
            SpineType::Primary,
            &path,
            END_ELEVATION,
            CENTER_ELEVATION,
            1.0,
            None,
        ));

        for branch in trace_branches(sampler, &path, branch_seed) {
            let id = next_id;
            next_id += 1;
            spines.push(build_spine(
                id,
                SpineType::Secondary,
                &branch,
                END_ELEVATION,
                CENTER_ELEVATION,
                SECONDARY_ELEVATION_SCALE,
                Some(primary_id),
            ));
        }
    }
    spines
}

/// 4-connected flood fill over the land grid, in scan order (deterministic
/// blob ids).
fn find_blobs(land: &[bool], cells_per_axis: usize) -> Vec<Vec<(usize, usize)>> {
    let index = |i: usize, j: usize| i * cells_per_axis + j;
    let mut visited = vec![false; land.len()];
    let mut blobs = Vec::new();

    for i in 0..cells_per_axis {
        for j in 0..cells_per_axis {
            if !land[index(i, j)] || visited[index(i, j)] {
                continue;
            }
            let mut blob = Vec::new();
            let mut queue = vec![(i, j)];
            visited[index(i, j)] = true;
            while let Some((ci, cj)) = queue.pop() {
                blob.push((ci, cj));
                let mut push = |ni: usize, nj: usize, visited: &mut Vec<bool>| {
                    if land[index(ni, nj)] && !visited[index(ni, nj)] {
                        visited[index(ni, nj)] = true;
                        queue.push((ni, nj));
                    }
                };
                if ci > 0 {
                    push(ci - 1, cj, &mut visited);
                }
                if ci + 1 < cells_per_axis {
                    push(ci + 1, cj, &mut visited);
                }
                if cj > 0 {
                    push(ci, cj - 1, &mut visited);
                }
                if cj + 1 < cells_per_axis {
                    push(ci, cj + 1, &mut visited);
                }
            }
            blob.sort_unstable();
            blobs.push(blob);
        }
    }
    blobs
}

/// Principal axis of a blob via the closed-form 2×2 eigenvector, then a
/// warped trace along it, pushed away from the coast.
fn trace_blob_axis(
    sampler: &TerrainSampler<'_>,
    cells: &[Point2],
    warp_salt: u32,
) -> Option<Vec<Point2>> {
    let n = cells.len() as f64;
    let centroid = Point2::new(
        cells.iter().map(|p| p.x).sum::<f64>() / n,
        cells.iter().map(|p| p.y).sum::<f64>() / n,
    );

    // 2x2 covariance; the principal direction of a symmetric 2x2 matrix has
    // the closed form theta = atan2(2cxz, cxx - czz) / 2
    let (mut cxx, mut cxz, mut czz) = (0.0, 0.0, 0.0);
    for p in cells {
        let dx = p.x - centroid.x;
        let dz = p.y - centroid.y;
        cxx += dx * dx;
        cxz += dx * dz;
        czz += dz * dz;
    }
    let theta = 0.5 * (2.0 * cxz).atan2(cxx - czz);
    let axis = Vector2::new(theta.cos(), theta.sin());
    let ortho = Vector2::new(-axis.y, axis.x);

    let mut min_proj = f64::INFINITY;
    let mut max_proj = f64::NEG_INFINITY;
    for p in cells {
        let proj = (p - centroid).dot(&axis);
        min_proj = min_proj.min(proj);
        max_proj = max_proj.max(proj);
    }

    let start = 0.9 * min_proj;
    let end = 0.9 * max_proj;
    if end - start < TRACE_SPACING {
        return None;
    }

    let mut path = Vec::new();
    let steps = ((end - start) / TRACE_SPACING).floor() as usize;
    for k in 0..=steps {
        let base = centroid + axis * (start + k as f64 * TRACE_SPACING);
        let warp = (noise::warped_noise_2d(
            base.x,
            base.y,
            3,
            WARP_FREQUENCY,
            WARP_AMPLITUDE,
            warp_salt,
        ) - 0.5)
            * 2.0
            * WARP_AMPLITUDE;
        let mut p = base + ortho * warp;

        // Keep the ridge off the beach: push points near the coast inland
        if let Some(coast) = coast_distance(sampler, p) {
            if coast < COAST_CLEARANCE {
                let to_center = centroid - p;
                if to_center.norm() > f64::EPSILON {
                    let adjusted =
                        p + to_center.normalize() * (COAST_CLEARANCE - coast + 50.0);
                    if sampler.is_land(adjusted.x, adjusted.y) {
                        p = adjusted;
                    } else {
                        warn!(
                            "spine point at {} adjusted past all land, dropping point",
                            crate::world::feature::WorldPoint::new(p.x, p.y)
                        );
                        continue;
                    }
                }
            }
        }
        path.push(p);
    }

    (path.len() >= 2).then_some(path)
}

/// Distance to the nearest ocean sample, searched over growing radii with
/// 12 azimuths. `None` when no ocean is found within the search range.
fn coast_distance(sampler: &TerrainSampler<'_>, p: Point2) -> Option<f64> {
    for ring in 1..=8u32 {
        let radius = ring as f64 * 50.0;
        for az in 0..12u32 {
            let angle = az as f64 / 12.0 * std::f64::consts::TAU;
            let q = p + Vector2::new(angle.cos(), angle.sin()) * radius;
            if !sampler.is_land(q.x, q.y) {
                return Some(radius);
            }
        }
    }
    None
}

/// Branch secondary ridges off the interior of a traced primary path.
fn trace_branches(
    sampler: &TerrainSampler<'_>,
    primary: &[Point2],
    branch_seed: u32,
) -> Vec<Vec<Point2>> {
    let n = primary.len();
    let primary_length: f64 = primary
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).norm())
        .sum();

    let lo = (0.2 * n as f64).ceil() as usize;
    let hi = (0.8 * n as f64).floor() as usize;

    let mut branches = Vec::new();
    for idx in lo..hi {
        if hash_unit(idx as i32, 0, branch_seed) >= BRANCH_PROBABILITY {
            continue;
        }
        // Branch direction: 30-60 degrees off the local tangent, random side
        let prev = primary[idx.saturating_sub(1)];
        let next = primary[(idx + 1).min(n - 1)];
        let tangent = next - prev;
        if tangent.norm() < f64::EPSILON {
            continue;
        }
        let tangent = tangent.normalize();
        let angle = (30.0 + 30.0 * hash_unit(idx as i32, 1, branch_seed)).to_radians();
        let side = if hash_unit(idx as i32, 2, branch_seed) < 0.5 {
            1.0
        } else {
            -1.0
        };
        let (sin, cos) = (side * angle).sin_cos();
        let dir = Vector2::new(
            tangent.x * cos - tangent.y * sin,
            tangent.x * sin + tangent.y * cos,
        );

        let length = BRANCH_LENGTH_RATIO * primary_length;
        let steps = (length / TRACE_SPACING).floor() as usize;
        let origin = primary[idx];
        let mut branch = vec![origin];
        for k in 1..=steps {
            let p = origin + dir * (k as f64 * TRACE_SPACING);
            if !sampler.is_land(p.x, p.y) {
                break;
            }
            branch.push(p);
        }
        if branch.len() >= 2 {
            branches.push(branch);
        }
    }
    branches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        host::NoopHost,
        template::{ContinentTemplate, MountainBoost, NormPoint, SpineDef, Template},
        world::ContinentData,
    };

    fn run_stage(template: ContinentTemplate, seed: u32) -> Vec<SpineFeature> {
        let sampler = TerrainSampler::new(seed, &template);
        let mut data = ContinentData {
            seed,
            template_name: template.name().to_string(),
            spines: Vec::new(),
            rivers: Vec::new(),
            lakes: Vec::new(),
            zones: Default::default(),
            roads: Vec::new(),
            settlements: Vec::new(),
            landmarks: Default::default(),
            stage_versions: Default::default(),
            textures: Vec::new(),
        };
        let mut cx = StageContext {
            seed,
            template: &template,
            sampler: &sampler,
            data: &mut data,
            host: &NoopHost,
        };
        SpineStage.generate(&mut cx).unwrap();
        data.spines
    }

    #[test]
    fn test_flat_template_emits_no_spines() {
        let template = ContinentTemplate::resolve(Template::default()).unwrap();
        assert!(run_stage(template, 12345).is_empty());
    }

    #[test]
    fn test_lifted_spine_profile() {
        let template = ContinentTemplate::resolve(Template {
            spine: SpineDef {
                points: vec![
                    NormPoint::new(0.2, 0.5),
                    NormPoint::new(0.35, 0.5),
                    NormPoint::new(0.5, 0.5),
                    NormPoint::new(0.65, 0.5),
                    NormPoint::new(0.8, 0.5),
                ],
                elevation: 0.8,
                width: None,
            },
            ..Template::default()
        })
        .unwrap();
        let spines = run_stage(template, 42);
        assert_eq!(spines.len(), 1);
        let spine = &spines[0];
        assert_eq!(spine.spine_type, SpineType::Primary);
        assert_eq!(spine.direction, Direction8::E);
        // Authored control points resample densely at trace spacing
        assert!(spine.path.len() > 10, "only {} points", spine.path.len());
        // Ends taper to 0.4; the middle peaks at the template elevation
        let n = spine.path.len();
        assert!((spine.path[0].elevation - 0.4).abs() < 1e-9);
        assert!((spine.path[n - 1].elevation - 0.4).abs() < 1e-9);
        let peak = spine
            .path
            .iter()
            .map(|p| p.elevation)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!((peak - 0.8).abs() < 0.01, "peak {}", peak);
        // Prominence in [0.5, 1.0], peaking mid-path
        for p in &spine.path {
            assert!((0.5..=1.0).contains(&p.prominence));
        }
        assert!(spine.path[n / 2].prominence > spine.path[0].prominence);
    }

    #[test]
    fn test_procedural_discovery_on_boosted_template() {
        let mut raw = Template::default();
        raw.elevation.mountain_boost = MountainBoost {
            region: None,
            strength: 0.6,
            ridge_weight: 0.5,
        };
        let template = ContinentTemplate::resolve(raw).unwrap();
        let spines = run_stage(template.clone(), 777);
        assert!(!spines.is_empty(), "expected discovered spines");

        let primary = &spines[0];
        assert_eq!(primary.spine_type, SpineType::Primary);
        assert!(primary.path.len() >= 2);
        for p in &primary.path {
            assert!((0.0..=1.0).contains(&p.elevation));
            assert!(p.elevation >= END_ELEVATION - 1e-9);
            assert!(p.elevation <= CENTER_ELEVATION + 1e-9);
        }
        // Secondary branches, if any, reference the primary and carry the
        // scaled elevation profile
        for spine in &spines[1..] {
            if spine.spine_type == SpineType::Secondary {
                assert_eq!(spine.parent_id, Some(primary.id));
                let peak = spine
                    .path
                    .iter()
                    .map(|p| p.elevation)
                    .fold(f64::NEG_INFINITY, f64::max);
                assert!(peak <= CENTER_ELEVATION * SECONDARY_ELEVATION_SCALE + 1e-9);
            }
        }

        // Deterministic across runs
        let again = run_stage(template, 777);
        assert_eq!(spines, again);
    }

    #[test]
    fn test_blob_detection_rejects_small_blobs() {
        // A 3x3 island in a 10x10 grid: below MIN_BLOB_CELLS
        let mut land = vec![false; 100];
        for i in 4..7 {
            for j in 4..7 {
                land[i * 10 + j] = true;
            }
        }
        let blobs = find_blobs(&land, 10);
        assert_eq!(blobs.len(), 1);
        assert!(blobs[0].len() < MIN_BLOB_CELLS);
    }
}
