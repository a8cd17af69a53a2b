//! Portable snapshot records for generated continents. The metadata record
//! is JSON-compatible; textures are stored separately as raw little-endian
//! float32 blobs. Both layouts are external contracts shared with chunk
//! generators and editor tooling.

use crate::{
    error::StorageError,
    host::ContinentStore,
    world::{
        feature::{Lake, RiverFeature, Road, Settlement, SpineFeature},
        sdf::{SdfBounds, SdfTexture, TextureType},
        zone::{LandmarkMap, ZoneMap},
        Continent, ContinentData, CONTINENTAL_VERSION,
    },
};
#[cfg(feature = "json")]
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Integer world bounds as persisted (templates author float bounds, but
/// the persisted contract is whole blocks).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BoundsRecord {
    pub min: i32,
    pub max: i32,
}

/// The root metadata record for one generated continent.
///
/// Keyed maps (zones, landmarks) serialize as ordered `[key, value]` pair
/// sequences rather than JSON objects: iteration order is insertion order,
/// so re-serializing a loaded record is byte-stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinentRecord {
    /// Pipeline schema version ([CONTINENTAL_VERSION] at write time).
    pub version: u32,
    pub world_id: String,
    pub continent_id: String,
    pub seed: u32,
    pub template_name: String,
    pub bounds: BoundsRecord,
    pub spines: Vec<SpineFeature>,
    pub rivers: Vec<RiverFeature>,
    #[serde(with = "keyed_pairs")]
    pub zones: ZoneMap,
    pub lakes: Vec<Lake>,
    pub roads: Vec<Road>,
    pub settlements: Vec<Settlement>,
    #[serde(with = "keyed_pairs")]
    pub landmarks: LandmarkMap,
    pub stage_versions: BTreeMap<String, String>,
}

impl ContinentRecord {
    /// Snapshot a generated continent under the given storage ids.
    pub fn from_continent(
        continent: &Continent,
        world_id: impl Into<String>,
        continent_id: impl Into<String>,
    ) -> Self {
        let data = continent.data();
        let bounds = continent.template().world_bounds();
        Self {
            version: CONTINENTAL_VERSION,
            world_id: world_id.into(),
            continent_id: continent_id.into(),
            seed: data.seed,
            template_name: data.template_name.clone(),
            bounds: BoundsRecord {
                min: bounds.min.round() as i32,
                max: bounds.max.round() as i32,
            },
            spines: data.spines.clone(),
            rivers: data.rivers.clone(),
            zones: data.zones.clone(),
            lakes: data.lakes.clone(),
            roads: data.roads.clone(),
            settlements: data.settlements.clone(),
            landmarks: data.landmarks.clone(),
            stage_versions: data.stage_versions.clone(),
        }
    }

    /// Rebuild continent data from this record. Textures are persisted
    /// separately; restoring without them leaves the bake stage stale, and
    /// partial regeneration will re-run it.
    pub fn into_data(self) -> ContinentData {
        ContinentData {
            seed: self.seed,
            template_name: self.template_name,
            spines: self.spines,
            rivers: self.rivers,
            lakes: self.lakes,
            zones: self.zones,
            roads: self.roads,
            settlements: self.settlements,
            landmarks: self.landmarks,
            stage_versions: self.stage_versions,
            textures: Vec::new(),
        }
    }

    /// Serialize to JSON. The inverse of [Self::from_json].
    #[cfg(feature = "json")]
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("error serializing continent record")
    }

    /// Deserialize from JSON produced by [Self::to_json].
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("error deserializing continent record")
    }
}

/// Persisted form of one baked texture: raw float32 samples, row-major,
/// channel-interleaved, little-endian.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureRecord {
    pub world_id: String,
    pub continent_id: String,
    pub texture_type: TextureType,
    pub resolution: Resolution,
    /// Sample format tag; always "float32".
    pub format: String,
    pub data: Vec<u8>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl TextureRecord {
    pub const FORMAT: &'static str = "float32";

    pub fn from_texture(
        texture: &SdfTexture,
        texture_type: TextureType,
        world_id: impl Into<String>,
        continent_id: impl Into<String>,
    ) -> Self {
        let mut data = Vec::with_capacity(texture.data.len() * 4);
        for value in &texture.data {
            data.extend_from_slice(&value.to_le_bytes());
        }
        Self {
            world_id: world_id.into(),
            continent_id: continent_id.into(),
            texture_type,
            resolution: Resolution {
                width: texture.width,
                height: texture.height,
            },
            format: Self::FORMAT.to_string(),
            data,
        }
    }

    /// Decode back into a texture. The bounds aren't part of the blob (they
    /// equal the continent's world bounds), so the caller supplies them.
    pub fn to_texture(&self, bounds: SdfBounds) -> anyhow::Result<SdfTexture> {
        if self.format != Self::FORMAT {
            anyhow::bail!("unsupported texture format {:?}", self.format);
        }
        let texel_count = (self.resolution.width * self.resolution.height) as usize;
        if texel_count == 0 || self.data.len() % 4 != 0 {
            anyhow::bail!("malformed texture blob ({} bytes)", self.data.len());
        }
        let sample_count = self.data.len() / 4;
        if sample_count % texel_count != 0 {
            anyhow::bail!(
                "texture blob size {} doesn't divide into {}x{} texels",
                sample_count,
                self.resolution.width,
                self.resolution.height
            );
        }
        let channels = (sample_count / texel_count) as u32;
        if !(1..=4).contains(&channels) {
            anyhow::bail!("texture blob implies {} channels", channels);
        }

        let mut data = Vec::with_capacity(sample_count);
        for chunk in self.data.chunks_exact(4) {
            data.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Ok(SdfTexture {
            width: self.resolution.width,
            height: self.resolution.height,
            channels,
            bounds,
            data,
        })
    }
}

/// Persist a generated continent through a store: the metadata record plus
/// one blob per baked texture, all under the same ids.
pub fn save_continent(
    store: &mut dyn ContinentStore,
    continent: &Continent,
    world_id: &str,
    continent_id: &str,
) -> Result<(), StorageError> {
    let record = ContinentRecord::from_continent(continent, world_id, continent_id);
    store.save_continent_metadata(&record)?;
    for (texture_type, texture) in &continent.data().textures {
        let blob = TextureRecord::from_texture(texture, *texture_type, world_id, continent_id);
        store.save_texture(&blob)?;
    }
    Ok(())
}

/// Serde adapter that writes an insertion-ordered keyed map as a sequence
/// of `[key, value]` pairs and reads it back preserving order.
mod keyed_pairs {
    use fnv::FnvBuildHasher;
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<V, S>(
        map: &IndexMap<String, V, FnvBuildHasher>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, V, D>(
        deserializer: D,
    ) -> Result<IndexMap<String, V, FnvBuildHasher>, D::Error>
    where
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs: Vec<(String, V)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{
        feature::WorldPoint,
        zone::{grid_key, LevelRange, Zone, ZoneFeel, ZoneType},
    };

    fn sample_record() -> ContinentRecord {
        let mut zones = ZoneMap::default();
        for (id, gx) in [(1u32, 0i32), (2, 1), (3, -2)] {
            let key = grid_key(gx, 0);
            zones.insert(
                key.clone(),
                Zone {
                    id,
                    name: format!("Zone {}", id),
                    zone_type: ZoneType::Wilderness,
                    center: WorldPoint::new(gx as f64 * 800.0, 0.0),
                    grid_key: key,
                    radius: 400.0,
                    levels: LevelRange { min: 1, max: 5 },
                    feel: ZoneFeel {
                        mood: "quiet".into(),
                        openness: 0.5,
                        danger: 0.25,
                    },
                    adjacent_zones: Vec::new(),
                },
            );
        }
        ContinentRecord {
            version: CONTINENTAL_VERSION,
            world_id: "world-1".into(),
            continent_id: "continent-1".into(),
            seed: 12345,
            template_name: "default".into(),
            bounds: BoundsRecord {
                min: -2000,
                max: 2000,
            },
            spines: Vec::new(),
            rivers: Vec::new(),
            zones,
            lakes: Vec::new(),
            roads: Vec::new(),
            settlements: Vec::new(),
            landmarks: LandmarkMap::default(),
            stage_versions: [("shape".to_string(), "2".to_string())].into_iter().collect(),
        }
    }

    #[test]
    fn test_record_json_round_trip_preserves_zone_order() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        // Maps persist as pair sequences, not objects
        assert!(json.contains("\"zones\":[["));
        let back: ContinentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
        let keys: Vec<&String> = back.zones.keys().collect();
        assert_eq!(keys, vec!["0,0", "1,0", "-2,0"]);
        // Re-serialization is stable
        assert_eq!(json, serde_json::to_string(&back).unwrap());
    }

    #[test]
    fn test_texture_record_round_trip() {
        let bounds = SdfBounds {
            min_x: -100.0,
            max_x: 100.0,
            min_z: -100.0,
            max_z: 100.0,
        };
        let mut texture = SdfTexture::new(4, 4, 2, bounds);
        texture.set(1, 1, 0, 7.25);
        texture.set(3, 2, 1, -0.5);
        texture.set(0, 0, 1, f32::INFINITY);

        let record =
            TextureRecord::from_texture(&texture, TextureType::Hydro, "world-1", "continent-1");
        assert_eq!(record.format, "float32");
        assert_eq!(record.data.len(), 4 * 4 * 2 * 4);
        // Little-endian contract: first sample's bytes
        assert_eq!(&record.data[0..4], &texture.data[0].to_le_bytes());

        let back = record.to_texture(bounds).unwrap();
        assert_eq!(back, texture);
    }

    #[test]
    fn test_texture_record_rejects_bad_blob() {
        let bounds = SdfBounds {
            min_x: 0.0,
            max_x: 1.0,
            min_z: 0.0,
            max_z: 1.0,
        };
        let mut record = TextureRecord {
            world_id: "w".into(),
            continent_id: "c".into(),
            texture_type: TextureType::Climate,
            resolution: Resolution {
                width: 4,
                height: 4,
            },
            format: "float64".into(),
            data: vec![0; 64],
        };
        assert!(record.to_texture(bounds).is_err());
        record.format = "float32".into();
        record.data = vec![0; 63];
        assert!(record.to_texture(bounds).is_err());
    }
}
