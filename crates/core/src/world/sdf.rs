//! Multi-channel 2D float textures with distance-field helpers. Chunk
//! generators sample these instead of re-deriving spatial queries per block:
//! "how far is the nearest river and how wide is it there" becomes one
//! bilinear fetch.

use crate::util::{self, Point2};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The four baked texture kinds. The names double as the `textureType`
/// discriminator in the persistence format.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TextureType {
    Terrain,
    Hydro,
    Infra,
    Climate,
}

/// World-space rectangle covered by a texture.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdfBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_z: f64,
    pub max_z: f64,
}

/// A 2D float texture with 1-4 interleaved channels, row-major. The sentinel
/// for "no feature within range" is `+∞`; consumers must handle it.
#[derive(Clone, Debug, PartialEq)]
pub struct SdfTexture {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub bounds: SdfBounds,
    /// Row-major, channel-interleaved samples. Length is always
    /// `width * height * channels`.
    pub data: Vec<f32>,
}

impl SdfTexture {
    pub fn new(width: u32, height: u32, channels: u32, bounds: SdfBounds) -> Self {
        assert!((1..=4).contains(&channels), "1-4 channels supported");
        Self {
            width,
            height,
            channels,
            bounds,
            data: vec![f32::INFINITY; (width * height * channels) as usize],
        }
    }

    /// World-space size of one texel on the x axis.
    pub fn blocks_per_texel(&self) -> f64 {
        (self.bounds.max_x - self.bounds.min_x) / self.width as f64
    }

    /// World coordinate of a texel center.
    pub fn texel_center(&self, ix: u32, iz: u32) -> (f64, f64) {
        let sx = (self.bounds.max_x - self.bounds.min_x) / self.width as f64;
        let sz = (self.bounds.max_z - self.bounds.min_z) / self.height as f64;
        (
            self.bounds.min_x + (ix as f64 + 0.5) * sx,
            self.bounds.min_z + (iz as f64 + 0.5) * sz,
        )
    }

    fn index(&self, ix: u32, iz: u32, channel: u32) -> usize {
        debug_assert!(ix < self.width && iz < self.height && channel < self.channels);
        ((iz * self.width + ix) * self.channels + channel) as usize
    }

    pub fn get(&self, ix: u32, iz: u32, channel: u32) -> f32 {
        self.data[self.index(ix, iz, channel)]
    }

    pub fn set(&mut self, ix: u32, iz: u32, channel: u32, value: f32) {
        let index = self.index(ix, iz, channel);
        self.data[index] = value;
    }

    /// Bilinear sample of one channel at a world position, with edge
    /// clamping. Infinite texel values propagate (any infinite corner makes
    /// the sample infinite), which is the desired sentinel behavior.
    pub fn sample_bilinear(&self, x: f64, z: f64, channel: u32) -> f32 {
        let sx = (self.bounds.max_x - self.bounds.min_x) / self.width as f64;
        let sz = (self.bounds.max_z - self.bounds.min_z) / self.height as f64;

        // Continuous texel coordinates, centered on texel middles
        let tx = (x - self.bounds.min_x) / sx - 0.5;
        let tz = (z - self.bounds.min_z) / sz - 0.5;

        let x0 = tx.floor();
        let z0 = tz.floor();
        let fx = tx - x0;
        let fz = tz - z0;

        let clamp_x = |v: f64| (v.max(0.0) as u32).min(self.width - 1);
        let clamp_z = |v: f64| (v.max(0.0) as u32).min(self.height - 1);
        let ix0 = clamp_x(x0);
        let ix1 = clamp_x(x0 + 1.0);
        let iz0 = clamp_z(z0);
        let iz1 = clamp_z(z0 + 1.0);

        let c00 = self.get(ix0, iz0, channel) as f64;
        let c10 = self.get(ix1, iz0, channel) as f64;
        let c01 = self.get(ix0, iz1, channel) as f64;
        let c11 = self.get(ix1, iz1, channel) as f64;

        let top = c00 + (c10 - c00) * fx;
        let bottom = c01 + (c11 - c01) * fx;
        (top + (bottom - top) * fz) as f32
    }
}

/// Distance from a point to a polyline, plus where the closest approach
/// lies: the segment index and the parameter along that segment.
pub struct PolylineHit {
    pub distance: f64,
    pub segment: usize,
    pub t: f64,
    pub closest: Point2,
}

/// Closest approach of `point` to the polyline. Returns `None` for paths
/// with fewer than two points.
pub fn distance_to_polyline(point: Point2, path: &[Point2]) -> Option<PolylineHit> {
    if path.len() < 2 {
        return None;
    }
    let mut best: Option<PolylineHit> = None;
    for (segment, pair) in path.windows(2).enumerate() {
        let (closest, t) = util::project_onto_segment(point, pair[0], pair[1]);
        let distance = (point - closest).norm();
        if best.as_ref().map_or(true, |hit| distance < hit.distance) {
            best = Some(PolylineHit {
                distance,
                segment,
                t,
                closest,
            });
        }
    }
    best
}

/// Bake a single-channel distance field over a set of polylines. Texels
/// farther than `max_distance` from every polyline hold the `+∞` sentinel.
pub fn generate_polyline_df(
    polylines: &[Vec<Point2>],
    width: u32,
    height: u32,
    bounds: SdfBounds,
    max_distance: f64,
) -> SdfTexture {
    let mut texture = SdfTexture::new(width, height, 1, bounds);
    for iz in 0..height {
        for ix in 0..width {
            let (x, z) = texture.texel_center(ix, iz);
            let point = Point2::new(x, z);
            let mut min_distance = f64::INFINITY;
            for path in polylines {
                if let Some(hit) = distance_to_polyline(point, path) {
                    min_distance = min_distance.min(hit.distance);
                }
            }
            let value = if min_distance <= max_distance {
                min_distance as f32
            } else {
                f32::INFINITY
            };
            texture.set(ix, iz, 0, value);
        }
    }
    texture
}

/// Signed distance from a point to a closed polygon boundary: negative
/// inside, positive outside, ~zero on the boundary. The sign comes from a
/// winding-number point-in-polygon test, so self-consistent for any simple
/// polygon regardless of vertex order.
pub fn signed_distance_to_polygon(point: Point2, polygon: &[Point2]) -> f64 {
    if polygon.len() < 3 {
        return f64::INFINITY;
    }

    let mut min_distance = f64::INFINITY;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        let (closest, _) = util::project_onto_segment(point, a, b);
        min_distance = min_distance.min((point - closest).norm());
    }

    if winding_number(point, polygon) != 0 {
        -min_distance
    } else {
        min_distance
    }
}

/// Standard winding-number test. Nonzero means inside.
fn winding_number(point: Point2, polygon: &[Point2]) -> i32 {
    let mut winding = 0;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        if a.y <= point.y {
            if b.y > point.y && cross(b - a, point - a) > 0.0 {
                winding += 1;
            }
        } else if b.y <= point.y && cross(b - a, point - a) < 0.0 {
            winding -= 1;
        }
    }
    winding
}

fn cross(a: crate::util::Vector2, b: crate::util::Vector2) -> f64 {
    a.x * b.y - a.y * b.x
}
