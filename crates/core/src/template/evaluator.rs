//! The template evaluator: turns a world position plus a resolved template
//! into the four scalar modifiers every terrain sample starts from. This is
//! pure geometry; no noise and no seed involvement, so a template fully
//! determines the continental silhouette before any randomness enters.

use crate::{
    template::{ContinentTemplate, NormRegion, Shape, ShapeRegime, SpineDef},
    util::{self, Point2},
};

/// Width of the smooth transition band around region edges, in normalized
/// units.
const REGION_EDGE_WIDTH: f64 = 0.05;

/// Scalar modifiers for one world position. All values are in `[0, 1]`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TemplateModifiers {
    /// Continental silhouette: 1 inland, 0 in open ocean.
    pub shape_mask: f64,
    /// Scale on the base terrain relief (flatten regions pull it down; the
    /// shape mask pulls it to zero in open ocean).
    pub elevation_multiplier: f64,
    /// Additive mountain elevation near spines / boost regions.
    pub mountain_boost: f64,
    /// How strongly ridged noise shapes the terrain here.
    pub ridge_weight: f64,
}

/// Evaluate the template modifiers at a world position.
pub fn modifiers(x: f64, z: f64, template: &ContinentTemplate) -> TemplateModifiers {
    let mut m = match template.regime() {
        ShapeRegime::SpineFirst => spine_first_modifiers(x, z, template),
        ShapeRegime::LegacyRadial => legacy_modifiers(x, z, template),
    };

    // No mountains in the ocean, and relief dies out with the shelf
    m.shape_mask = m.shape_mask.clamp(0.0, 1.0);
    m.elevation_multiplier = (m.elevation_multiplier * m.shape_mask).clamp(0.0, 1.0);
    m.mountain_boost = (m.mountain_boost * m.shape_mask).clamp(0.0, 1.0);
    m.ridge_weight = (m.ridge_weight * m.shape_mask).clamp(0.0, 1.0);
    m
}

/// Nearest point over all spine polylines (primary + secondaries).
struct SpineHit {
    /// Distance from the query to the polyline, normalized units.
    distance: f64,
    /// Closest point on the polyline.
    nearest: Point2,
    /// Peak elevation of the polyline that was hit.
    elevation: f64,
    /// Ridge half-width of the polyline that was hit.
    width: f64,
    /// Distance from the query to the nearer endpoint of the hit polyline.
    endpoint_distance: f64,
}

fn nearest_spine_hit(query: Point2, template: &ContinentTemplate) -> Option<SpineHit> {
    let t = template.template();
    let mut best: Option<SpineHit> = None;

    let primary = (&t.spine.points, t.spine.elevation, t.spine.width());
    let spines = std::iter::once(primary).chain(
        t.secondary_spines
            .iter()
            .map(|s| (&s.points, s.elevation, SpineDef::DEFAULT_WIDTH)),
    );

    for (points, elevation, width) in spines {
        if points.len() < 2 {
            continue;
        }
        for pair in points.windows(2) {
            let a = pair[0].to_point();
            let b = pair[1].to_point();
            let (nearest, _) = util::project_onto_segment(query, a, b);
            let distance = (query - nearest).norm();
            if best.as_ref().map_or(true, |hit| distance < hit.distance) {
                let first = points[0].to_point();
                let last = points[points.len() - 1].to_point();
                let endpoint_distance =
                    (query - first).norm().min((query - last).norm());
                best = Some(SpineHit {
                    distance,
                    nearest,
                    elevation,
                    width,
                    endpoint_distance,
                });
            }
        }
    }
    best
}

fn spine_first_modifiers(x: f64, z: f64, template: &ContinentTemplate) -> TemplateModifiers {
    let t = template.template();
    let (nx, nz) = template.world_to_norm(x, z);
    let query = Point2::new(nx, nz);

    // The regime tag guarantees a primary spine with >= 2 points
    let hit = match nearest_spine_hit(query, template) {
        Some(hit) => hit,
        None => return TemplateModifiers::default(),
    };

    // Which side of the spine are we on? The inner side faces the bay
    // center (or the spine centroid when no bay is authored).
    let inner_ref = template.inner_reference();
    let to_inner = inner_ref - hit.nearest;
    let to_query = query - hit.nearest;
    let is_inner = to_inner.dot(&to_query) > 0.0;

    let extent = &t.land_extent;
    let max_extent = if is_inner { extent.inner } else { extent.outer };
    let endpoint_cap = 1.2 * extent.inner.max(extent.outer);

    let spine_mask = if hit.endpoint_distance < endpoint_cap {
        // Circular cap around the spine ends, so land wraps the tips
        // instead of ending in a perpendicular cliff
        1.0 - util::smoothstep(0.6 * endpoint_cap, endpoint_cap, hit.endpoint_distance)
    } else {
        1.0 - util::smoothstep(0.7 * max_extent, max_extent, hit.distance)
    };

    let shape_mask = spine_mask * radial_falloff(x, z, &t.shape);

    // Mountain profile: Gaussian over distance to the ridgeline
    let sigma = 1.5 * hit.width;
    let mut mountain_boost = if sigma > f64::EPSILON {
        hit.elevation * (-(hit.distance * hit.distance) / (2.0 * sigma * sigma)).exp()
    } else {
        0.0
    };
    let mut ridge_weight = mountain_boost * 0.6;

    // Region knobs still apply on spine-first templates
    let boost = &t.elevation.mountain_boost;
    if boost.strength > 0.0 {
        if let Some(region) = boost.region {
            let factor = region_factor(&region, nx, nz);
            mountain_boost += boost.strength * factor;
            ridge_weight += boost.strength * boost.ridge_weight * factor;
        }
    }

    TemplateModifiers {
        shape_mask,
        elevation_multiplier: flatten_multiplier(nx, nz, t),
        mountain_boost,
        ridge_weight,
    }
}

fn legacy_modifiers(x: f64, z: f64, template: &ContinentTemplate) -> TemplateModifiers {
    let t = template.template();
    let (nx, nz) = template.world_to_norm(x, z);

    let mut shape_mask = radial_falloff(x, z, &t.shape);
    if t.features.bay {
        if let Some(bay) = t.bay_center {
            shape_mask *= 1.0 - bay_carving(nx, nz, bay.x, bay.z);
        }
    }

    let mut mountain_boost = 0.0;
    let mut ridge_weight = 0.0;

    // Legacy spine: a Gaussian ridge across the middle of the template
    // square, perpendicular falloff only
    if t.features.legacy_spine {
        let sigma = 0.1;
        let perpendicular = (nz - 0.5).abs();
        let along = nx.clamp(0.0, 1.0);
        let boost = t.spine.elevation
            * (-(perpendicular * perpendicular) / (2.0 * sigma * sigma)).exp()
            * util::cosine_taper(along);
        mountain_boost += boost;
        ridge_weight += boost * 0.6;
    }

    let boost = &t.elevation.mountain_boost;
    if boost.strength > 0.0 {
        if let Some(region) = boost.region {
            let factor = region_factor(&region, nx, nz);
            mountain_boost += boost.strength * factor;
            ridge_weight += boost.strength * boost.ridge_weight * factor;
        }
    }

    TemplateModifiers {
        shape_mask,
        elevation_multiplier: flatten_multiplier(nx, nz, t),
        mountain_boost,
        ridge_weight,
    }
}

/// Radial boundary falloff around the shape center: 1 inside the core,
/// smoothstepping to 0 at the shape radius. A zero radius means the
/// template authors no landmass at all.
fn radial_falloff(x: f64, z: f64, shape: &Shape) -> f64 {
    if shape.radius <= f64::EPSILON {
        return 0.0;
    }
    let dx = x - shape.center_x;
    let dz = z - shape.center_z;
    let distance = dx.hypot(dz);
    let falloff_start = shape.radius * (0.5 - 0.3 * shape.falloff_sharpness);
    1.0 - util::smoothstep(falloff_start, shape.radius, distance)
}

/// Carve a bay into the legacy radial mask. The bay opens from the template
/// edge nearest the bay center and reaches inward with smooth depth and
/// width profiles; carving never removes more than 70% of the mask.
fn bay_carving(nx: f64, nz: f64, bay_x: f64, bay_z: f64) -> f64 {
    // Pick the cardinal direction the bay opens toward (dominant offset of
    // the bay center from the template middle)
    let off_x = bay_x - 0.5;
    let off_z = bay_z - 0.5;
    let (depth_coord, width_coord, width_center) = if off_z.abs() >= off_x.abs() {
        // North/south bay: depth runs along z
        let depth = if off_z >= 0.0 { nz } else { 1.0 - nz };
        (depth, nx, bay_x)
    } else {
        let depth = if off_x >= 0.0 { nx } else { 1.0 - nx };
        (depth, nz, bay_z)
    };

    // Depth factor grows toward the opening edge; width factor peaks on the
    // bay axis
    let depth_factor = util::smoothstep(0.35, 0.85, depth_coord);
    let width_factor = 1.0 - util::smoothstep(0.1, 0.4, (width_coord - width_center).abs());
    0.7 * depth_factor * width_factor
}

/// Smooth inside-region factor: 1 well inside, 0 outside, with a
/// [REGION_EDGE_WIDTH]-wide transition at each edge.
fn region_factor(region: &NormRegion, nx: f64, nz: f64) -> f64 {
    let fx = util::smoothstep(region.min_x, region.min_x + REGION_EDGE_WIDTH, nx)
        * (1.0 - util::smoothstep(region.max_x - REGION_EDGE_WIDTH, region.max_x, nx));
    let fz = util::smoothstep(region.min_z, region.min_z + REGION_EDGE_WIDTH, nz)
        * (1.0 - util::smoothstep(region.max_z - REGION_EDGE_WIDTH, region.max_z, nz));
    fx * fz
}

/// Relief multiplier from the flatten region: 1 everywhere except inside
/// the flatten region, where it drops toward `1 - flatness`.
fn flatten_multiplier(nx: f64, nz: f64, t: &crate::template::Template) -> f64 {
    let flatten = &t.elevation.flatten_region;
    if flatten.flatness <= 0.0 {
        return 1.0;
    }
    let factor = match flatten.region {
        Some(region) => region_factor(&region, nx, nz),
        // No region: flatten the whole continent
        None => 1.0,
    };
    1.0 - flatten.flatness * factor
}
