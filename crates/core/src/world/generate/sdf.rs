use crate::{
    util::{lerp, Point2},
    world::{
        generate::{Stage, StageContext, StageId},
        sdf::{distance_to_polyline, SdfBounds, SdfTexture, TextureType},
    },
};
use log::debug;

/// Resolution of every baked texture (square).
const TEXTURE_SIZE: u32 = 512;
/// Rivers farther than this from a texel leave the hydro channel at the
/// infinity sentinel.
const HYDRO_MAX_DISTANCE: f64 = 200.0;
/// Range cap for the mountain-spine distance channel.
const SPINE_MAX_DISTANCE: f64 = 1500.0;
/// Bucket size for the river-segment spatial index, blocks. Must be at
/// least [HYDRO_MAX_DISTANCE] so one-bucket lookups see every segment in
/// range.
const SEGMENT_BUCKET: f64 = 256.0;

/// Bakes the four lookup textures over the world bounds. Each bake is
/// followed by a yield point so UI hosts can stay responsive through the
/// heaviest stage of the pipeline.
#[derive(Debug)]
pub struct SdfStage;

impl Stage for SdfStage {
    fn id(&self) -> StageId {
        StageId::Sdf
    }

    fn version(&self) -> &'static str {
        "2"
    }

    fn weight(&self) -> u32 {
        3
    }

    fn active_form(&self) -> &'static str {
        "Baking the lookup textures"
    }

    fn generate(&self, cx: &mut StageContext<'_>) -> anyhow::Result<()> {
        let world = cx.template.world_bounds();
        let bounds = SdfBounds {
            min_x: world.min,
            max_x: world.max,
            min_z: world.min,
            max_z: world.max,
        };

        let mut textures = Vec::with_capacity(4);

        let hydro = bake_hydro(cx, bounds);
        debug!("Baked hydro texture");
        textures.push((TextureType::Hydro, hydro));
        cx.host.yield_to_host();

        let terrain = bake_terrain(cx, bounds);
        debug!("Baked terrain texture");
        textures.push((TextureType::Terrain, terrain));
        cx.host.yield_to_host();

        let infra = bake_infra(cx, bounds);
        debug!("Baked infra texture");
        textures.push((TextureType::Infra, infra));
        cx.host.yield_to_host();

        let sampler = cx.sampler;
        let climate = bake_climate(
            bounds,
            &|x, z| sampler.temperature(x, z),
            &|x, z| sampler.humidity_at(x, z),
            &|x, z| sampler.erosion(x, z),
        );
        debug!("Baked climate texture");
        textures.push((TextureType::Climate, climate));
        cx.host.yield_to_host();

        cx.data.textures = textures;
        Ok(())
    }
}

/// One river segment with endpoint widths, flattened for spatial lookup.
struct RiverSegment {
    a: Point2,
    b: Point2,
    width_a: f64,
    width_b: f64,
}

/// Hydrology texture: R river distance (≤ [HYDRO_MAX_DISTANCE], else +∞),
/// G width interpolated at the nearest point, B flow direction encoded as
/// `(atan2(dx, dz)/2π + 1) mod 1` (so a +x flow encodes to 0.25), A depth
/// `min(1, (width/4)/10)`.
fn bake_hydro(cx: &StageContext<'_>, bounds: SdfBounds) -> SdfTexture {
    let mut texture = SdfTexture::new(TEXTURE_SIZE, TEXTURE_SIZE, 4, bounds);

    // Flatten river polylines into segments, bucketed on a coarse grid so
    // each texel only tests nearby segments
    let mut segments = Vec::new();
    for river in &cx.data.rivers {
        for i in 0..river.path.len().saturating_sub(1) {
            segments.push(RiverSegment {
                a: Point2::new(river.path[i].x, river.path[i].z),
                b: Point2::new(river.path[i + 1].x, river.path[i + 1].z),
                width_a: river.widths[i],
                width_b: river.widths[i + 1],
            });
        }
    }
    let index = bucket_segments(&segments);

    for iz in 0..TEXTURE_SIZE {
        for ix in 0..TEXTURE_SIZE {
            let (x, z) = texture.texel_center(ix, iz);
            let point = Point2::new(x, z);
            let cell = bucket_cell(x, z);

            let mut best: Option<(f64, f64, f64)> = None; // distance, width, flow
            if let Some(candidates) = index.get(&cell) {
                for &si in candidates {
                    let segment = &segments[si];
                    let (closest, t) =
                        crate::util::project_onto_segment(point, segment.a, segment.b);
                    let distance = (point - closest).norm();
                    if best.map_or(true, |(d, _, _)| distance < d) {
                        let width = lerp(segment.width_a, segment.width_b, t);
                        let flow = segment.b - segment.a;
                        best = Some((distance, width, encode_flow(flow.x, flow.y)));
                    }
                }
            }

            match best {
                Some((distance, width, flow)) if distance <= HYDRO_MAX_DISTANCE => {
                    texture.set(ix, iz, 0, distance as f32);
                    texture.set(ix, iz, 1, width as f32);
                    texture.set(ix, iz, 2, flow as f32);
                    texture.set(ix, iz, 3, ((width / 4.0) / 10.0).min(1.0) as f32);
                }
                _ => {
                    texture.set(ix, iz, 0, f32::INFINITY);
                    texture.set(ix, iz, 1, 0.0);
                    texture.set(ix, iz, 2, 0.0);
                    texture.set(ix, iz, 3, 0.0);
                }
            }
        }
    }
    texture
}

/// Flow direction encoding shared with downstream samplers: bearing from
/// +z, wrapped to [0, 1).
fn encode_flow(dx: f64, dz: f64) -> f64 {
    (dx.atan2(dz) / std::f64::consts::TAU + 1.0).rem_euclid(1.0)
}

fn bucket_cell(x: f64, z: f64) -> (i32, i32) {
    (
        (x / SEGMENT_BUCKET).floor() as i32,
        (z / SEGMENT_BUCKET).floor() as i32,
    )
}

/// Bucket segment indices into every cell their padded bounding box
/// overlaps, so a single-cell lookup finds all segments within
/// [HYDRO_MAX_DISTANCE].
fn bucket_segments(
    segments: &[RiverSegment],
) -> std::collections::HashMap<(i32, i32), Vec<usize>, fnv::FnvBuildHasher> {
    let mut index: std::collections::HashMap<(i32, i32), Vec<usize>, fnv::FnvBuildHasher> =
        Default::default();
    for (si, segment) in segments.iter().enumerate() {
        let min_x = segment.a.x.min(segment.b.x) - HYDRO_MAX_DISTANCE;
        let max_x = segment.a.x.max(segment.b.x) + HYDRO_MAX_DISTANCE;
        let min_z = segment.a.y.min(segment.b.y) - HYDRO_MAX_DISTANCE;
        let max_z = segment.a.y.max(segment.b.y) + HYDRO_MAX_DISTANCE;
        let (cx0, cz0) = bucket_cell(min_x, min_z);
        let (cx1, cz1) = bucket_cell(max_x, max_z);
        for cell_x in cx0..=cx1 {
            for cell_z in cz0..=cz1 {
                index.entry((cell_x, cell_z)).or_default().push(si);
            }
        }
    }
    index
}

/// Terrain texture: R signed ocean distance (negative in ocean, positive
/// inland), G distance to the nearest mountain spine, B signed lake
/// distance (+∞ while lakes are an extension stub), A unused.
fn bake_terrain(cx: &StageContext<'_>, bounds: SdfBounds) -> SdfTexture {
    let mut texture = SdfTexture::new(TEXTURE_SIZE, TEXTURE_SIZE, 4, bounds);
    let size = TEXTURE_SIZE as usize;

    // Land/ocean classification per texel, then a chamfer transform for
    // the signed coastline distance
    let mut land = vec![false; size * size];
    for iz in 0..TEXTURE_SIZE {
        for ix in 0..TEXTURE_SIZE {
            let (x, z) = texture.texel_center(ix, iz);
            land[iz as usize * size + ix as usize] = cx.sampler.is_land(x, z);
        }
    }
    let coast_distance = chamfer_boundary_distance(&land, size);
    let texel_size = texture.blocks_per_texel();

    let spine_paths: Vec<Vec<Point2>> = cx
        .data
        .spines
        .iter()
        .map(|s| s.path.iter().map(|p| Point2::new(p.x, p.z)).collect())
        .collect();

    for iz in 0..TEXTURE_SIZE {
        for ix in 0..TEXTURE_SIZE {
            let i = iz as usize * size + ix as usize;
            let signed = coast_distance[i] as f64 * texel_size;
            let signed = if land[i] { signed } else { -signed };
            texture.set(ix, iz, 0, signed as f32);

            let (x, z) = texture.texel_center(ix, iz);
            let mut spine_distance = f64::INFINITY;
            for path in &spine_paths {
                if let Some(hit) = distance_to_polyline(Point2::new(x, z), path) {
                    spine_distance = spine_distance.min(hit.distance);
                }
            }
            let g = if spine_distance <= SPINE_MAX_DISTANCE {
                spine_distance as f32
            } else {
                f32::INFINITY
            };
            texture.set(ix, iz, 1, g);
            texture.set(ix, iz, 2, f32::INFINITY);
            texture.set(ix, iz, 3, 0.0);
        }
    }
    texture
}

/// Two-pass 3x3 chamfer distance transform to the land/ocean boundary, in
/// texel units. Boundary texels (any 4-neighbor of the opposite class)
/// seed at zero.
fn chamfer_boundary_distance(land: &[bool], size: usize) -> Vec<f32> {
    const DIAG: f32 = std::f32::consts::SQRT_2;
    let mut dist = vec![f32::INFINITY; size * size];

    for iz in 0..size {
        for ix in 0..size {
            let i = iz * size + ix;
            let here = land[i];
            let mut boundary = false;
            if ix > 0 && land[i - 1] != here {
                boundary = true;
            }
            if ix + 1 < size && land[i + 1] != here {
                boundary = true;
            }
            if iz > 0 && land[i - size] != here {
                boundary = true;
            }
            if iz + 1 < size && land[i + size] != here {
                boundary = true;
            }
            if boundary {
                dist[i] = 0.0;
            }
        }
    }

    // Forward pass
    for iz in 0..size {
        for ix in 0..size {
            let i = iz * size + ix;
            let mut d = dist[i];
            if ix > 0 {
                d = d.min(dist[i - 1] + 1.0);
            }
            if iz > 0 {
                d = d.min(dist[i - size] + 1.0);
                if ix > 0 {
                    d = d.min(dist[i - size - 1] + DIAG);
                }
                if ix + 1 < size {
                    d = d.min(dist[i - size + 1] + DIAG);
                }
            }
            dist[i] = d;
        }
    }
    // Backward pass
    for iz in (0..size).rev() {
        for ix in (0..size).rev() {
            let i = iz * size + ix;
            let mut d = dist[i];
            if ix + 1 < size {
                d = d.min(dist[i + 1] + 1.0);
            }
            if iz + 1 < size {
                d = d.min(dist[i + size] + 1.0);
                if ix > 0 {
                    d = d.min(dist[i + size - 1] + DIAG);
                }
                if ix + 1 < size {
                    d = d.min(dist[i + size + 1] + DIAG);
                }
            }
            dist[i] = d;
        }
    }
    dist
}

/// Infrastructure texture: R road distance, G road type, B settlement
/// distance, A unused. Roads and settlements are extension stubs, so the
/// distance channels bake to the +∞ sentinel until those stages emit
/// features.
fn bake_infra(cx: &StageContext<'_>, bounds: SdfBounds) -> SdfTexture {
    let mut texture = SdfTexture::new(TEXTURE_SIZE, TEXTURE_SIZE, 4, bounds);

    let road_paths: Vec<Vec<Point2>> = cx
        .data
        .roads
        .iter()
        .map(|r| r.path.iter().map(|p| Point2::new(p.x, p.z)).collect())
        .collect();
    let settlements: Vec<Point2> = cx
        .data
        .settlements
        .iter()
        .map(|s| Point2::new(s.position.x, s.position.z))
        .collect();

    for iz in 0..TEXTURE_SIZE {
        for ix in 0..TEXTURE_SIZE {
            let (x, z) = texture.texel_center(ix, iz);
            let point = Point2::new(x, z);

            let mut road_distance = f64::INFINITY;
            for path in &road_paths {
                if let Some(hit) = distance_to_polyline(point, path) {
                    road_distance = road_distance.min(hit.distance);
                }
            }
            let mut settlement_distance = f64::INFINITY;
            for s in &settlements {
                settlement_distance = settlement_distance.min((point - s).norm());
            }

            texture.set(ix, iz, 0, road_distance as f32);
            texture.set(ix, iz, 1, 0.0);
            texture.set(ix, iz, 2, settlement_distance as f32);
            texture.set(ix, iz, 3, 0.0);
        }
    }
    texture
}

/// Climate texture: R temperature, G humidity, B erosion, A unused. The
/// samplers are injected so the bake itself stays agnostic of where the
/// climate model lives.
fn bake_climate(
    bounds: SdfBounds,
    temperature: &dyn Fn(f64, f64) -> f64,
    humidity: &dyn Fn(f64, f64) -> f64,
    erosion: &dyn Fn(f64, f64) -> f64,
) -> SdfTexture {
    let mut texture = SdfTexture::new(TEXTURE_SIZE, TEXTURE_SIZE, 4, bounds);
    for iz in 0..TEXTURE_SIZE {
        for ix in 0..TEXTURE_SIZE {
            let (x, z) = texture.texel_center(ix, iz);
            texture.set(ix, iz, 0, temperature(x, z) as f32);
            texture.set(ix, iz, 1, humidity(x, z) as f32);
            texture.set(ix, iz, 2, erosion(x, z) as f32);
            texture.set(ix, iz, 3, 0.0);
        }
    }
    texture
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_encode_flow() {
        // +x flow: atan2(1, 0) = pi/2 -> 0.25
        assert_approx_eq!(encode_flow(1.0, 0.0), 0.25);
        // +z flow: atan2(0, 1) = 0 -> 0.0
        assert_approx_eq!(encode_flow(0.0, 1.0), 0.0);
        // -x flow -> 0.75
        assert_approx_eq!(encode_flow(-1.0, 0.0), 0.75);
        // -z flow -> 0.5
        assert_approx_eq!(encode_flow(0.0, -1.0), 0.5);
        for (dx, dz) in [(3.0, 4.0), (-2.0, 0.5), (0.1, -9.0)] {
            let e = encode_flow(dx, dz);
            assert!((0.0..1.0).contains(&e));
        }
    }

    #[test]
    fn test_hydro_bake_single_segment() {
        use crate::{
            host::NoopHost,
            template::{ContinentTemplate, Template},
            terrain::TerrainSampler,
            world::feature::{
                RiverFeature, RiverProperties, RiverType, WorldPoint,
            },
            world::ContinentData,
        };

        let template = ContinentTemplate::resolve(Template::default()).unwrap();
        let sampler = TerrainSampler::new(1, &template);
        let river = RiverFeature {
            id: 1,
            kind: RiverFeature::KIND.to_string(),
            path: vec![WorldPoint::new(-500.0, 0.0), WorldPoint::new(500.0, 0.0)],
            widths: vec![10.0, 10.0],
            elevations: vec![0.3, 0.12],
            properties: RiverProperties {
                source_elevation: 0.3,
                river_type: RiverType::River,
                merged_into: None,
                junction_point: None,
            },
        };
        let mut data = ContinentData {
            seed: 1,
            template_name: "default".into(),
            spines: Vec::new(),
            rivers: vec![river],
            lakes: Vec::new(),
            zones: Default::default(),
            roads: Vec::new(),
            settlements: Vec::new(),
            landmarks: Default::default(),
            stage_versions: Default::default(),
            textures: Vec::new(),
        };
        let cx = StageContext {
            seed: 1,
            template: &template,
            sampler: &sampler,
            data: &mut data,
            host: &NoopHost,
        };
        let bounds = SdfBounds {
            min_x: -2000.0,
            max_x: 2000.0,
            min_z: -2000.0,
            max_z: 2000.0,
        };
        let texture = bake_hydro(&cx, bounds);

        // On the river: distance ~0 (within a texel), width 10, flow +x
        // encodes to 0.25, depth (10/4)/10 = 0.25
        let texel = texture.blocks_per_texel();
        let r = texture.sample_bilinear(0.0, 0.0, 0) as f64;
        assert!(r <= texel, "river distance {} > texel {}", r, texel);
        assert_approx_eq!(texture.sample_bilinear(0.0, 0.0, 1) as f64, 10.0, 1e-3);
        assert_approx_eq!(texture.sample_bilinear(0.0, 0.0, 2) as f64, 0.25, 1e-6);
        assert_approx_eq!(texture.sample_bilinear(0.0, 0.0, 3) as f64, 0.25, 1e-6);

        // 1000 blocks off the river: beyond max distance, sentinel
        assert!(texture.sample_bilinear(0.0, 1000.0, 0).is_infinite());
    }

    #[test]
    fn test_chamfer_distance_straight_boundary() {
        // Left half land, right half ocean, 16x16
        let size = 16;
        let mut land = vec![false; size * size];
        for iz in 0..size {
            for ix in 0..8 {
                land[iz * size + ix] = true;
            }
        }
        let dist = chamfer_boundary_distance(&land, size);
        // The two columns adjacent to the split are boundary texels
        for iz in 0..size {
            assert_eq!(dist[iz * size + 7], 0.0);
            assert_eq!(dist[iz * size + 8], 0.0);
        }
        // Distance grows by one per column away from the boundary
        for iz in 0..size {
            assert_approx_eq!(dist[iz * size + 5] as f64, 2.0);
            assert_approx_eq!(dist[iz * size + 11] as f64, 3.0);
        }
    }
}
