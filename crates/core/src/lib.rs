//! Continent is a deterministic continent-feature generation kit for voxel
//! worlds. This crate contains all the core generation logic: a 32-bit seed
//! plus a designer-authored template go in, and a reproducible set of
//! global features comes out — the continental silhouette, mountain
//! spines, river networks, gameplay zones, and pre-baked spatial-lookup
//! textures that voxel chunk generators consume through pure sampling
//! functions. Presentation layers (editors, renderers, chunk synthesis)
//! are implemented elsewhere.
//!
//! ```
//! use continent::{Continent, ContinentTemplate, NoopHost, Template};
//!
//! let template = ContinentTemplate::resolve(Template::default()).unwrap();
//! let continent = Continent::generate(12345, template, &NoopHost, &mut |_| {}).unwrap();
//! println!("{} zones", continent.data().zones.len());
//! ```
//!
//! Determinism is the core contract: for a fixed `(seed, template)` pair,
//! every sample and every generated feature is identical across runs on the
//! same platform. Everything randomized bottoms out in the 32-bit hash
//! substrate in [rng].
//!
//! ## Features
//!
//! - `json` - Import/export snapshot records as JSON
//!   (`ContinentRecord::to_json` / `ContinentRecord::from_json`)

mod error;
mod host;
pub mod noise;
pub mod rng;
mod snapshot;
mod template;
mod terrain;
mod util;
mod world;

pub use crate::{
    error::{GenerateError, StorageError},
    host::{ContinentStore, Host, MemoryStore, NoopHost, Progress},
    snapshot::{save_continent, BoundsRecord, ContinentRecord, Resolution, TextureRecord},
    template::{
        evaluator::{modifiers, TemplateModifiers},
        has_spine_first_generation, ClimateKnobs, ContinentTemplate, ElevationKnobs, FeatureFlags,
        FlattenRegion, GradientDirection, LandExtent, MountainBoost, NormPoint, NormRegion, Shape,
        ShapeRegime, SecondarySpineDef, SpineDef, Template, TemperatureGradient, WorldBounds,
    },
    terrain::{Biome, TerrainParams, TerrainSampler, WaterType, LAND_THRESHOLD, SEA_LEVEL},
    util::{Point2, Vector2},
    world::{
        feature::{
            Direction8, Lake, Landmark, RiverFeature, RiverProperties, RiverType, Road,
            Settlement, SpineFeature, SpinePoint, SpineType, WorldPoint,
        },
        sdf::{
            distance_to_polyline, generate_polyline_df, signed_distance_to_polygon, PolylineHit,
            SdfBounds, SdfTexture, TextureType,
        },
        zone::{
            grid_key, grid_key_of, parse_grid_key, LandmarkMap, LevelRange, Zone, ZoneFeel,
            ZoneInfluenceIndex, ZoneMap, ZoneType, ZONE_GRID_SIZE, ZONE_INDEX_CELL_SIZE,
            ZONE_RADIUS,
        },
        Continent, ContinentData, StageId, CONTINENTAL_VERSION,
    },
};
pub use anyhow;
pub use validator;
