pub mod evaluator;
mod presets;

use crate::util::{Point2, Vector2};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A continent template: a designer-authored, high-level description of a
/// landmass. Geometry is authored in normalized `[0,1]²` space; the template
/// also carries the affine mapping into world (block) space. Two continents
/// generated from the same `(seed, template)` pair are always identical.
///
/// Templates are the JSON-facing input format, so field names serialize in
/// camelCase. All fields have defaults; an empty `{}` file is a valid (flat,
/// featureless) continent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Template {
    /// Stable name used to identify this template in persisted records.
    pub name: String,

    /// World-space square bounds of the continent, in blocks.
    #[validate(custom = "validate_world_bounds")]
    pub world_bounds: WorldBounds,

    /// Overall radial footprint of the continent in world space.
    #[validate]
    pub shape: Shape,

    /// Primary mountain spine. With two or more points this switches the
    /// whole template into spine-first generation; see
    /// [has_spine_first_generation].
    #[validate]
    pub spine: SpineDef,

    /// Additional ridgelines, evaluated together with the primary spine.
    #[validate]
    pub secondary_spines: Vec<SecondarySpineDef>,

    /// How far land extends perpendicular to the spine, per side.
    #[validate]
    pub land_extent: LandExtent,

    /// Reference point marking the "inner" side of the spine (e.g. the
    /// middle of a bay enclosed by a C-shaped continent). When absent, the
    /// centroid of all spine points is used instead.
    #[validate]
    pub bay_center: Option<NormPoint>,

    #[validate]
    pub climate: ClimateKnobs,

    #[validate]
    pub elevation: ElevationKnobs,

    pub features: FeatureFlags,
}

/// Square world-space bounds, in blocks.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldBounds {
    pub min: f64,
    pub max: f64,
}

impl WorldBounds {
    pub fn extent(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, x: f64, z: f64) -> bool {
        x >= self.min && x <= self.max && z >= self.min && z <= self.max
    }

    /// Clamp a world point into the bounds.
    pub fn clamp(&self, x: f64, z: f64) -> (f64, f64) {
        (x.clamp(self.min, self.max), z.clamp(self.min, self.max))
    }
}

fn validate_world_bounds(bounds: &WorldBounds) -> Result<(), ValidationError> {
    if !bounds.min.is_finite() || !bounds.max.is_finite() || bounds.min >= bounds.max {
        return Err(ValidationError::new("world bounds must be finite with min < max"));
    }
    Ok(())
}

/// Radial footprint of the continent in world space.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Shape {
    #[validate(range(min = -10000000.0, max = 10000000.0))]
    pub center_x: f64,
    #[validate(range(min = -10000000.0, max = 10000000.0))]
    pub center_z: f64,
    /// Radius in blocks. Zero means the template authors no landmass of its
    /// own (everything becomes deep ocean).
    #[validate(range(min = 0.0, max = 10000000.0))]
    pub radius: f64,
    /// How abruptly land falls off toward the world boundary.
    #[validate(range(min = 0.0, max = 1.0))]
    pub falloff_sharpness: f64,
}

/// A point in normalized `[0,1]²` template space.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NormPoint {
    #[validate(range(min = 0.0, max = 1.0))]
    pub x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub z: f64,
}

impl NormPoint {
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    pub fn to_point(self) -> Point2 {
        Point2::new(self.x, self.z)
    }
}

/// The primary mountain spine polyline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
#[validate(schema(function = "validate_spine_def"))]
pub struct SpineDef {
    /// Ridgeline control points in normalized space. Zero points means no
    /// authored spine; one point is invalid (a ridge needs a direction).
    #[validate]
    pub points: Vec<NormPoint>,
    /// Peak elevation of the ridge, normalized.
    #[validate(range(min = 0.0, max = 1.0))]
    pub elevation: f64,
    /// Half-width of the ridge in normalized space. Defaults to
    /// [SpineDef::DEFAULT_WIDTH] when unset.
    #[validate(range(min = 0.0, max = 1.0))]
    pub width: Option<f64>,
}

impl SpineDef {
    pub const DEFAULT_WIDTH: f64 = 0.05;

    pub fn width(&self) -> f64 {
        self.width.unwrap_or(Self::DEFAULT_WIDTH)
    }
}

fn validate_spine_def(spine: &SpineDef) -> Result<(), ValidationError> {
    if spine.points.len() == 1 {
        return Err(ValidationError::new(
            "spine-first generation requires at least two spine points",
        ));
    }
    Ok(())
}

/// A secondary ridgeline branching off (or independent of) the primary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
#[validate(schema(function = "validate_secondary_spine_def"))]
pub struct SecondarySpineDef {
    #[validate]
    pub points: Vec<NormPoint>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub elevation: f64,
}

fn validate_secondary_spine_def(spine: &SecondarySpineDef) -> Result<(), ValidationError> {
    if spine.points.len() < 2 {
        return Err(ValidationError::new(
            "a secondary spine needs at least two points",
        ));
    }
    Ok(())
}

/// Maximum perpendicular distance (normalized) that land extends from the
/// spine, asymmetrically per side. The inner side faces the bay center.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LandExtent {
    #[validate(custom = "validate_extent")]
    pub inner: f64,
    #[validate(custom = "validate_extent")]
    pub outer: f64,
}

fn validate_extent(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        return Err(ValidationError::new("land extent must be in (0, 1)"));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ClimateKnobs {
    #[validate]
    pub temperature_gradient: TemperatureGradient,
    #[validate(range(min = 0.0, max = 1.0))]
    pub base_humidity: f64,
    /// Biome names (snake_case) that must never be produced on this
    /// continent. Matched against [crate::terrain::Biome] names.
    pub excluded_biomes: Vec<String>,
}

/// Large-scale temperature trend across the continent.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct TemperatureGradient {
    #[validate]
    pub direction: GradientDirection,
    #[validate(range(min = 0.0, max = 1.0))]
    pub strength: f64,
}

/// Unnormalized gradient direction; normalized on template resolution. The
/// zero vector falls back to the default north-south gradient.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GradientDirection {
    #[validate(range(min = -1000.0, max = 1000.0))]
    pub x: f64,
    #[validate(range(min = -1000.0, max = 1000.0))]
    pub z: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ElevationKnobs {
    #[validate]
    pub mountain_boost: MountainBoost,
    #[validate]
    pub flatten_region: FlattenRegion,
}

/// Raise elevation inside a region (or, with no region, request procedural
/// mountain discovery on templates without an authored spine).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct MountainBoost {
    #[validate]
    pub region: Option<NormRegion>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub strength: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub ridge_weight: f64,
}

/// Suppress terrain relief inside a region.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct FlattenRegion {
    #[validate]
    pub region: Option<NormRegion>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub flatness: f64,
}

/// Axis-aligned region in normalized space.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct NormRegion {
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_z: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_z: f64,
}

/// Optional legacy feature toggles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureFlags {
    pub bay: bool,
    pub lake: bool,
    pub legacy_spine: bool,
}

/// True when the template authors its shape through the spine-first
/// algorithm (a primary spine polyline with at least two points).
pub fn has_spine_first_generation(template: &Template) -> bool {
    template.spine.points.len() >= 2
}

impl Default for Template {
    fn default() -> Self {
        // Source of truth for a "plain" continent: a round, flat landmass
        // with mild climate and no authored ridgelines.
        Self {
            name: "default".into(),
            world_bounds: WorldBounds::default(),
            shape: Shape::default(),
            spine: SpineDef::default(),
            secondary_spines: Vec::new(),
            land_extent: LandExtent::default(),
            bay_center: None,
            climate: ClimateKnobs::default(),
            elevation: ElevationKnobs::default(),
            features: FeatureFlags::default(),
        }
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min: -2000.0,
            max: 2000.0,
        }
    }
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_z: 0.0,
            radius: 1600.0,
            falloff_sharpness: 0.3,
        }
    }
}

impl Default for NormPoint {
    fn default() -> Self {
        Self { x: 0.5, z: 0.5 }
    }
}

impl Default for SpineDef {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            elevation: 0.7,
            width: None,
        }
    }
}

impl Default for SecondarySpineDef {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            elevation: 0.5,
        }
    }
}

impl Default for LandExtent {
    fn default() -> Self {
        Self {
            inner: 0.25,
            outer: 0.25,
        }
    }
}

impl Default for ClimateKnobs {
    fn default() -> Self {
        Self {
            temperature_gradient: TemperatureGradient::default(),
            base_humidity: 0.5,
            excluded_biomes: Vec::new(),
        }
    }
}

impl Default for TemperatureGradient {
    fn default() -> Self {
        Self {
            direction: GradientDirection::default(),
            strength: 0.3,
        }
    }
}

impl Default for GradientDirection {
    fn default() -> Self {
        // North-south: colder toward -z
        Self { x: 0.0, z: 1.0 }
    }
}

impl Default for ElevationKnobs {
    fn default() -> Self {
        Self {
            mountain_boost: MountainBoost::default(),
            flatten_region: FlattenRegion::default(),
        }
    }
}

impl Default for MountainBoost {
    fn default() -> Self {
        Self {
            region: None,
            strength: 0.0,
            ridge_weight: 0.5,
        }
    }
}

impl Default for FlattenRegion {
    fn default() -> Self {
        Self {
            region: None,
            flatness: 0.0,
        }
    }
}

impl Default for NormRegion {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            min_z: 0.0,
            max_x: 1.0,
            max_z: 1.0,
        }
    }
}

/// How a template's continental shape is evaluated. Resolved exactly once at
/// ingestion; the per-sample evaluator just matches on the tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShapeRegime {
    /// Shape and mountains follow the authored spine polylines.
    SpineFirst,
    /// Shape is a radial falloff around the center with optional bay
    /// carving and region-based elevation knobs.
    LegacyRadial,
}

/// A validated, resolved template ready for sampling. Wraps the raw
/// [Template] with everything that should be computed once rather than per
/// sample: the shape-regime tag and the normalized climate gradient.
#[derive(Clone, Debug, PartialEq)]
pub struct ContinentTemplate {
    template: Template,
    regime: ShapeRegime,
    gradient_direction: Vector2,
}

impl ContinentTemplate {
    /// Validate and resolve a raw template. Fails with field-path validation
    /// errors on any structural problem (out-of-range normalized values,
    /// one-point spines, inverted bounds, non-finite numbers).
    pub fn resolve(template: Template) -> anyhow::Result<Self> {
        template
            .validate()
            .with_context(|| format!("invalid template {:?}", template.name))?;

        let regime = if has_spine_first_generation(&template) {
            ShapeRegime::SpineFirst
        } else {
            ShapeRegime::LegacyRadial
        };

        let raw = Vector2::new(
            template.climate.temperature_gradient.direction.x,
            template.climate.temperature_gradient.direction.z,
        );
        let gradient_direction = if raw.norm() < 1e-9 {
            // Zero vector: default north-south gradient
            Vector2::new(0.0, 1.0)
        } else {
            raw.normalize()
        };

        Ok(Self {
            template,
            regime,
            gradient_direction,
        })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn regime(&self) -> ShapeRegime {
        self.regime
    }

    /// Normalized temperature-gradient direction (never zero).
    pub fn gradient_direction(&self) -> Vector2 {
        self.gradient_direction
    }

    pub fn world_bounds(&self) -> WorldBounds {
        self.template.world_bounds
    }

    /// Convert normalized template space to world space. Normalized `[0,1]²`
    /// spans a square of side `2·radius` centered on the shape center.
    pub fn norm_to_world(&self, p: NormPoint) -> Point2 {
        let shape = &self.template.shape;
        Point2::new(
            shape.center_x + (p.x - 0.5) * 2.0 * shape.radius,
            shape.center_z + (p.z - 0.5) * 2.0 * shape.radius,
        )
    }

    /// Convert world space to normalized template space. The inverse of
    /// [Self::norm_to_world]; values outside `[0,1]` mean the point is
    /// outside the authored template square.
    pub fn world_to_norm(&self, x: f64, z: f64) -> (f64, f64) {
        let shape = &self.template.shape;
        if shape.radius <= f64::EPSILON {
            return (0.5, 0.5);
        }
        (
            0.5 + (x - shape.center_x) / (2.0 * shape.radius),
            0.5 + (z - shape.center_z) / (2.0 * shape.radius),
        )
    }

    /// The reference point marking the inner side of the spine: the authored
    /// bay center, or the centroid of all spine points as a fallback.
    pub fn inner_reference(&self) -> Point2 {
        if let Some(bay) = self.template.bay_center {
            return bay.to_point();
        }
        let all_points = self
            .template
            .spine
            .points
            .iter()
            .chain(self.template.secondary_spines.iter().flat_map(|s| s.points.iter()));
        let (mut sum_x, mut sum_z, mut count) = (0.0, 0.0, 0usize);
        for p in all_points {
            sum_x += p.x;
            sum_z += p.z;
            count += 1;
        }
        if count == 0 {
            Point2::new(0.5, 0.5)
        } else {
            Point2::new(sum_x / count as f64, sum_z / count as f64)
        }
    }
}
