//! Feature types emitted by the generation stages. Features reference each
//! other by id (rivers name their merge target, zones name their neighbors
//! by grid key) rather than by owning pointers, so the aggregate stays an
//! acyclic value type that serializes cleanly.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A bare world-space position, in blocks.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize, derive_more::Display,
)]
#[display(fmt = "({:.0}, {:.0})", x, z)]
pub struct WorldPoint {
    pub x: f64,
    pub z: f64,
}

impl WorldPoint {
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    pub fn distance_to(&self, other: &WorldPoint) -> f64 {
        (self.x - other.x).hypot(self.z - other.z)
    }
}

/// Eight-way compass direction. North is `-z`, following voxel-world
/// convention.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Direction8 {
    E,
    NE,
    N,
    NW,
    W,
    SW,
    S,
    SE,
}

impl Direction8 {
    /// Bin a world-space delta into the nearest compass direction.
    pub fn from_delta(dx: f64, dz: f64) -> Self {
        use Direction8::*;
        const ORDER: [Direction8; 8] = [E, NE, N, NW, W, SW, S, SE];
        // atan2 with -z as north puts E at 0 and walks counterclockwise
        let angle = (-dz).atan2(dx);
        let sector = (angle / std::f64::consts::FRAC_PI_4).round().rem_euclid(8.0) as usize;
        ORDER[sector % 8]
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpineType {
    Primary,
    Secondary,
}

/// One point along a mountain spine.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpinePoint {
    pub x: f64,
    pub z: f64,
    /// Normalized ridge elevation at this point. Peaks at the path center
    /// and tapers toward the ends.
    pub elevation: f64,
    /// How prominently this point reads as a peak, in `[0.5, 1.0]`.
    pub prominence: f64,
}

/// A mountain ridgeline, either lifted from the template or discovered
/// procedurally. Immutable once emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpineFeature {
    pub id: u32,
    #[serde(rename = "type")]
    pub spine_type: SpineType,
    /// At least two points, in path order.
    pub path: Vec<SpinePoint>,
    /// Compass bearing from the first path point to the last.
    pub direction: Direction8,
    /// For secondary spines: the primary spine this branches from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u32>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum RiverType {
    Stream,
    Creek,
    River,
    GreatRiver,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiverProperties {
    /// Terrain height at the source when the trace started.
    pub source_elevation: f64,
    pub river_type: RiverType,
    /// Id of the river this one merges into, if the mouth reached another
    /// river's course.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_into: Option<u32>,
    /// Where on the parent river the confluence sits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junction_point: Option<WorldPoint>,
}

/// A traced river. The three parallel arrays (`path`, `widths`,
/// `elevations`) always have identical length; elevations are monotonically
/// non-increasing along the path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiverFeature {
    pub id: u32,
    /// Linear-feature discriminator; always "river" for rivers.
    pub kind: String,
    pub path: Vec<WorldPoint>,
    pub widths: Vec<f64>,
    pub elevations: Vec<f64>,
    pub properties: RiverProperties,
}

impl RiverFeature {
    pub const KIND: &'static str = "river";
}

/// Reserved: standing water bodies. The core pipeline emits none, but the
/// stage and collection stay in place so downstream consumers and the
/// persistence format don't shift when lake discovery lands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lake {
    pub id: u32,
    pub center: WorldPoint,
    pub radius: f64,
}

/// Reserved: road network (extension point).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Road {
    pub id: u32,
    pub path: Vec<WorldPoint>,
    pub road_type: String,
}

/// Reserved: settlements (extension point).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub id: u32,
    pub name: String,
    pub position: WorldPoint,
}

/// Reserved: per-cell landmarks (extension point).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Landmark {
    pub id: u32,
    pub name: String,
    pub position: WorldPoint,
    pub landmark_type: String,
}
