//! The terrain sampler: composes the template evaluator with the noise
//! primitives into a pure function of `(seed, template, position)`. Every
//! stage of the pipeline (and, downstream, every voxel chunk generator)
//! reads the world through this interface, so it must stay side-effect free
//! and deterministic.

use crate::{
    noise,
    rng::derive_seed,
    template::{evaluator, ContinentTemplate},
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Continentalness at or above this value is land.
pub const LAND_THRESHOLD: f64 = 0.25;

/// Normalized sea level. Heights below this are under water.
pub const SEA_LEVEL: f64 = 0.12;

/// Heights below this are deep water (ocean floor far from shore).
const DEEP_WATER_LEVEL: f64 = 0.06;

/// Base terrain relief scale. Chosen so that un-boosted lowland tops out at
/// `0.32 * (0.3 + 0.4) = 0.224`: above sea level for most of the landmass,
/// but below the river-source elevation threshold, so flat continents don't
/// spawn rivers.
const RELIEF_SCALE: f64 = 0.32;

/// Large-scale classification of the local environment.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Biome {
    Ocean,
    Beach,
    Plains,
    Meadow,
    Savanna,
    Desert,
    RedDesert,
    Swamp,
    Jungle,
    Rainforest,
    DeciduousForest,
    AutumnForest,
    Taiga,
    Tundra,
    Snow,
    Mountains,
    Alpine,
    Highlands,
    Glacier,
    Badlands,
    Volcanic,
}

impl Biome {
    /// Is this one of the mountain-family biomes (used by pass discovery)?
    pub fn is_mountainous(self) -> bool {
        matches!(self, Self::Mountains | Self::Alpine | Self::Highlands)
    }
}

/// Water classification of a sample.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WaterType {
    None,
    Shallow,
    Deep,
}

/// Everything the sampler knows about one world position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TerrainParams {
    pub continentalness: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub height_normalized: f64,
    pub ridgeness: f64,
    pub biome: Biome,
    pub water_type: WaterType,
}

/// A benchmark point mapping a (temperature, humidity) coordinate to a
/// lowland biome. Classification picks the nearest point, so the table is
/// the whole tuning surface.
struct BiomePoint(Biome, f64, f64);

impl BiomePoint {
    fn distance_to(&self, temperature: f64, humidity: f64) -> f64 {
        (self.1 - temperature).abs() + (self.2 - humidity).abs()
    }
}

const LOWLAND_POINTS: &[BiomePoint] = &[
    BiomePoint(Biome::Snow, 0.05, 0.5),
    BiomePoint(Biome::Tundra, 0.15, 0.35),
    BiomePoint(Biome::Taiga, 0.25, 0.6),
    BiomePoint(Biome::Plains, 0.5, 0.35),
    BiomePoint(Biome::Meadow, 0.45, 0.55),
    BiomePoint(Biome::DeciduousForest, 0.5, 0.7),
    BiomePoint(Biome::AutumnForest, 0.35, 0.72),
    BiomePoint(Biome::Savanna, 0.75, 0.3),
    BiomePoint(Biome::Desert, 0.8, 0.08),
    BiomePoint(Biome::RedDesert, 0.95, 0.05),
    BiomePoint(Biome::Jungle, 0.8, 0.75),
    BiomePoint(Biome::Rainforest, 0.85, 0.9),
    BiomePoint(Biome::Swamp, 0.6, 0.92),
];

/// Samples terrain parameters for one `(seed, template)` pair. Cheap to
/// construct; holds only the derived noise-field seeds, so it can be shared
/// freely (or rebuilt) by parallel workers.
#[derive(Clone, Debug)]
pub struct TerrainSampler<'a> {
    template: &'a ContinentTemplate,
    continentalness_salt: u32,
    elevation_salt: u32,
    ridge_salt: u32,
    temperature_salt: u32,
    humidity_salt: u32,
    erosion_salt: u32,
}

impl<'a> TerrainSampler<'a> {
    pub fn new(seed: u32, template: &'a ContinentTemplate) -> Self {
        Self {
            template,
            continentalness_salt: derive_seed(seed, "continentalness"),
            elevation_salt: derive_seed(seed, "elevation"),
            ridge_salt: derive_seed(seed, "ridge"),
            temperature_salt: derive_seed(seed, "temperature"),
            humidity_salt: derive_seed(seed, "humidity"),
            erosion_salt: derive_seed(seed, "erosion"),
        }
    }

    pub fn template(&self) -> &'a ContinentTemplate {
        self.template
    }

    /// Full parameter sample at a world position.
    pub fn params(&self, x: f64, z: f64) -> TerrainParams {
        let m = evaluator::modifiers(x, z, self.template);

        let continentalness = m.shape_mask * noise::octave_noise(x, z, 4, 0.0015, self.continentalness_salt);

        let relief = RELIEF_SCALE
            * (0.3 + 0.4 * noise::octave_noise(x, z, 4, 0.002, self.elevation_salt));
        let ridge = noise::ridged_noise(x, z, 3, 0.004, self.ridge_salt);
        let height_normalized =
            (m.mountain_boost + relief * m.elevation_multiplier + m.ridge_weight * ridge)
                .clamp(0.0, 1.0);

        let ridgeness = (m.ridge_weight * ridge).clamp(0.0, 1.0);

        let temperature = self.temperature(x, z);
        let humidity = self.humidity(x, z, continentalness);
        let water_type = water_type_for_height(height_normalized);
        let biome = self.classify(
            continentalness,
            height_normalized,
            temperature,
            humidity,
        );

        TerrainParams {
            continentalness,
            temperature,
            humidity,
            height_normalized,
            ridgeness,
            biome,
            water_type,
        }
    }

    /// Pure height query used by the river tracer's gradient sampling. A
    /// strict restriction of [Self::params]: same arithmetic, no caching,
    /// no shared state, so concurrent gradient queries always agree.
    pub fn height_for_river_gen(&self, x: f64, z: f64) -> f64 {
        let m = evaluator::modifiers(x, z, self.template);
        let relief = RELIEF_SCALE
            * (0.3 + 0.4 * noise::octave_noise(x, z, 4, 0.002, self.elevation_salt));
        let ridge = noise::ridged_noise(x, z, 3, 0.004, self.ridge_salt);
        (m.mountain_boost + relief * m.elevation_multiplier + m.ridge_weight * ridge)
            .clamp(0.0, 1.0)
    }

    /// Is the position land (continentalness at or above the threshold)?
    pub fn is_land(&self, x: f64, z: f64) -> bool {
        let m = evaluator::modifiers(x, z, self.template);
        m.shape_mask * noise::octave_noise(x, z, 4, 0.0015, self.continentalness_salt)
            >= LAND_THRESHOLD
    }

    /// Erosion strength field, baked into the climate texture.
    pub fn erosion(&self, x: f64, z: f64) -> f64 {
        noise::octave_noise(x, z, 4, 0.004, self.erosion_salt)
    }

    pub fn temperature(&self, x: f64, z: f64) -> f64 {
        let (nx, nz) = self.template.world_to_norm(x, z);
        let dir = self.template.gradient_direction();
        let latitude = (nx - 0.5) * dir.x + (nz - 0.5) * dir.y;
        let strength = self
            .template
            .template()
            .climate
            .temperature_gradient
            .strength;
        let local = noise::octave_noise(x, z, 3, 0.003, self.temperature_salt);
        (0.5 + latitude * strength + (local - 0.5) * 0.2).clamp(0.0, 1.0)
    }

    fn humidity(&self, x: f64, z: f64, continentalness: f64) -> f64 {
        let base = self.template.template().climate.base_humidity;
        let local = noise::octave_noise(x, z, 3, 0.0025, self.humidity_salt);
        // Coastal band bonus: positions near the land threshold sit close
        // to open water and pick up extra moisture
        let coastal = 0.15
            * (1.0 - crate::util::smoothstep(0.05, 0.3, (continentalness - LAND_THRESHOLD).abs()));
        (base + (local - 0.5) * 0.4 + coastal).clamp(0.0, 1.0)
    }

    /// Public humidity sample (recomputes continentalness internally).
    pub fn humidity_at(&self, x: f64, z: f64) -> f64 {
        let m = evaluator::modifiers(x, z, self.template);
        let continentalness =
            m.shape_mask * noise::octave_noise(x, z, 4, 0.0015, self.continentalness_salt);
        self.humidity(x, z, continentalness)
    }

    fn classify(
        &self,
        continentalness: f64,
        height: f64,
        temperature: f64,
        humidity: f64,
    ) -> Biome {
        let biome = classify_unfiltered(continentalness, height, temperature, humidity);
        self.apply_exclusions(biome, temperature, humidity)
    }

    /// Remap biomes the template forbids. Benchmark biomes fall back to the
    /// nearest allowed benchmark; structural biomes fall back to plains.
    fn apply_exclusions(&self, biome: Biome, temperature: f64, humidity: f64) -> Biome {
        let excluded = &self.template.template().climate.excluded_biomes;
        if excluded.is_empty() || !is_excluded(biome, excluded) {
            return biome;
        }

        let mut candidates: Vec<&BiomePoint> = LOWLAND_POINTS
            .iter()
            .filter(|p| !is_excluded(p.0, excluded))
            .collect();
        candidates.sort_by(|a, b| {
            crate::util::cmp_unwrap(
                &a.distance_to(temperature, humidity),
                &b.distance_to(temperature, humidity),
            )
        });
        match candidates.first() {
            Some(point) => point.0,
            // Everything excluded; at that point the template gets plains
            None => Biome::Plains,
        }
    }
}

fn is_excluded(biome: Biome, excluded: &[String]) -> bool {
    let name = biome.to_string();
    excluded.iter().any(|e| e == &name)
}

fn water_type_for_height(height: f64) -> WaterType {
    if height < DEEP_WATER_LEVEL {
        WaterType::Deep
    } else if height < SEA_LEVEL {
        WaterType::Shallow
    } else {
        WaterType::None
    }
}

fn classify_unfiltered(continentalness: f64, height: f64, temperature: f64, humidity: f64) -> Biome {
    if continentalness < LAND_THRESHOLD {
        return Biome::Ocean;
    }
    if height < SEA_LEVEL {
        // Submerged land: tidal flats and wetlands
        return if humidity > 0.65 { Biome::Swamp } else { Biome::Beach };
    }
    if height < SEA_LEVEL + 0.025 {
        return Biome::Beach;
    }

    // Mountain bands by elevation, refined by climate
    if height >= 0.8 {
        return if temperature < 0.25 {
            Biome::Glacier
        } else if temperature > 0.85 {
            Biome::Volcanic
        } else {
            Biome::Alpine
        };
    }
    if height >= 0.62 {
        return Biome::Mountains;
    }
    if height >= 0.5 {
        return if humidity < 0.2 {
            Biome::Badlands
        } else {
            Biome::Highlands
        };
    }

    // Lowland: nearest benchmark point wins. The table is never empty, so
    // the unwrap can't fire.
    LOWLAND_POINTS
        .iter()
        .map(|p| (p.0, p.distance_to(temperature, humidity)))
        .min_by(|(_, a), (_, b)| crate::util::cmp_unwrap(a, b))
        .map(|(biome, _)| biome)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ContinentTemplate, LandExtent, NormPoint, Shape, SpineDef, Template};

    fn spine_template() -> ContinentTemplate {
        ContinentTemplate::resolve(Template {
            shape: Shape {
                center_x: 0.0,
                center_z: 0.0,
                radius: 2000.0,
                falloff_sharpness: 0.0,
            },
            spine: SpineDef {
                points: vec![NormPoint::new(0.2, 0.5), NormPoint::new(0.8, 0.5)],
                elevation: 0.8,
                width: None,
            },
            land_extent: LandExtent {
                inner: 0.2,
                outer: 0.2,
            },
            ..Template::default()
        })
        .unwrap()
    }

    #[test]
    fn test_params_deterministic_and_bounded() {
        let template = spine_template();
        let sampler = TerrainSampler::new(42, &template);
        for i in -10..=10 {
            for j in -10..=10 {
                let (x, z) = (i as f64 * 190.0, j as f64 * 190.0);
                let a = sampler.params(x, z);
                let b = sampler.params(x, z);
                // Bit-identical across calls
                assert_eq!(a, b);
                for value in [
                    a.continentalness,
                    a.temperature,
                    a.humidity,
                    a.height_normalized,
                    a.ridgeness,
                ] {
                    assert!((0.0..=1.0).contains(&value), "out of range: {}", value);
                }
            }
        }
    }

    #[test]
    fn test_height_for_river_gen_matches_params() {
        let template = spine_template();
        let sampler = TerrainSampler::new(7, &template);
        for i in 0..50 {
            let x = i as f64 * 77.0 - 1900.0;
            let z = i as f64 * -31.0 + 800.0;
            assert_eq!(
                sampler.height_for_river_gen(x, z),
                sampler.params(x, z).height_normalized
            );
        }
    }

    #[test]
    fn test_open_ocean_is_deep() {
        let template = spine_template();
        let sampler = TerrainSampler::new(42, &template);
        // Far beyond the shape radius: zero mask, zero height
        let params = sampler.params(3000.0, 3000.0);
        assert_eq!(params.biome, Biome::Ocean);
        assert_eq!(params.water_type, WaterType::Deep);
        assert_eq!(params.height_normalized, 0.0);
    }

    #[test]
    fn test_spine_ridge_is_high_land() {
        let template = spine_template();
        let sampler = TerrainSampler::new(42, &template);
        let params = sampler.params(0.0, 0.0);
        assert!(params.height_normalized > 0.7, "height {}", params.height_normalized);
        assert_eq!(params.water_type, WaterType::None);
    }

    #[test]
    fn test_flat_template_has_no_river_sources() {
        // Without mountain boosts, relief alone cannot reach the 0.25
        // source threshold anywhere
        let template = ContinentTemplate::resolve(Template::default()).unwrap();
        let sampler = TerrainSampler::new(12345, &template);
        for i in -15..=15 {
            for j in -15..=15 {
                let h = sampler.height_for_river_gen(i as f64 * 130.0, j as f64 * 130.0);
                assert!(h < 0.25, "flat template produced height {}", h);
            }
        }
    }

    #[test]
    fn test_excluded_biomes_remap() {
        let mut raw = Template::default();
        raw.climate.excluded_biomes = vec!["desert".into(), "red_desert".into()];
        let template = ContinentTemplate::resolve(raw).unwrap();
        let sampler = TerrainSampler::new(5, &template);
        // Hot and bone dry would normally classify as desert; exclusion
        // forces the nearest allowed benchmark instead
        let biome = sampler.classify(0.5, 0.3, 0.9, 0.02);
        assert_ne!(biome, Biome::Desert);
        assert_ne!(biome, Biome::RedDesert);
    }

    #[test]
    fn test_classifier_structural_bands() {
        assert_eq!(classify_unfiltered(0.1, 0.0, 0.5, 0.5), Biome::Ocean);
        assert_eq!(classify_unfiltered(0.5, 0.13, 0.5, 0.3), Biome::Beach);
        assert_eq!(classify_unfiltered(0.5, 0.9, 0.5, 0.5), Biome::Alpine);
        assert_eq!(classify_unfiltered(0.5, 0.9, 0.1, 0.5), Biome::Glacier);
        assert_eq!(classify_unfiltered(0.5, 0.7, 0.5, 0.5), Biome::Mountains);
        assert_eq!(classify_unfiltered(0.5, 0.55, 0.5, 0.1), Biome::Badlands);
        // Lowland benchmarks
        assert_eq!(classify_unfiltered(0.5, 0.3, 0.8, 0.05), Biome::Desert);
        assert_eq!(classify_unfiltered(0.5, 0.3, 0.82, 0.78), Biome::Jungle);
    }
}
