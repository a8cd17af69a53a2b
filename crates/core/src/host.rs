//! Contracts between the generation core and its host. The core never does
//! I/O and never blocks on the outside world: the host injects progress
//! handling, cooperative yielding, cancellation, and (optionally) a blob
//! store for persistence.

use crate::{
    error::StorageError,
    snapshot::{ContinentRecord, TextureRecord},
    world::{sdf::TextureType, CONTINENTAL_VERSION},
};
use std::collections::HashMap;

/// One progress report, emitted after each completed stage (and only for
/// stages that actually ran). No report is delivered after generation
/// returns.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub stage_id: String,
    pub stage_index: u32,
    pub stage_count: u32,
    /// Weighted overall completion in `[0, 1]`.
    pub progress: f32,
    /// Completion of the current stage in `[0, 1]`.
    pub stage_progress: f32,
    /// User-facing activity description ("Carving the rivers").
    pub message: String,
}

/// The host side of the cooperative scheduling contract. The scheduler
/// calls [Host::yield_to_host] at every suspension point (stage boundaries,
/// and between individual texture bakes) and checks
/// [Host::is_cancelled] at stage boundaries.
///
/// A UI host would typically wait a frame in `yield_to_host`; a server host
/// can return immediately.
pub trait Host {
    fn yield_to_host(&self) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Host that never yields and never cancels. The right choice for batch
/// tools and tests.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopHost;

impl Host for NoopHost {}

/// Abstract key/blob store for generated continents. The core only depends
/// on these signatures; durability, formats-on-disk and caching strategy
/// all belong to the implementor.
pub trait ContinentStore {
    fn save_continent_metadata(&mut self, record: &ContinentRecord) -> Result<(), StorageError>;

    fn save_texture(&mut self, texture: &TextureRecord) -> Result<(), StorageError>;

    fn get_continent_metadata(
        &self,
        world_id: &str,
        continent_id: &str,
    ) -> Result<Option<ContinentRecord>, StorageError>;

    /// Should this continent be regenerated (missing, or persisted by an
    /// incompatible pipeline version)?
    fn needs_regeneration(&self, world_id: &str, continent_id: &str) -> Result<bool, StorageError>;
}

/// In-memory store: useful for tests and for hosts that keep generated
/// continents alive only for the current session.
#[derive(Debug, Default)]
pub struct MemoryStore {
    continents: HashMap<(String, String), ContinentRecord>,
    textures: HashMap<(String, String, TextureType), TextureRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(
        &self,
        world_id: &str,
        continent_id: &str,
        texture_type: TextureType,
    ) -> Option<&TextureRecord> {
        self.textures
            .get(&(world_id.to_string(), continent_id.to_string(), texture_type))
    }
}

impl ContinentStore for MemoryStore {
    fn save_continent_metadata(&mut self, record: &ContinentRecord) -> Result<(), StorageError> {
        self.continents.insert(
            (record.world_id.clone(), record.continent_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn save_texture(&mut self, texture: &TextureRecord) -> Result<(), StorageError> {
        self.textures.insert(
            (
                texture.world_id.clone(),
                texture.continent_id.clone(),
                texture.texture_type,
            ),
            texture.clone(),
        );
        Ok(())
    }

    fn get_continent_metadata(
        &self,
        world_id: &str,
        continent_id: &str,
    ) -> Result<Option<ContinentRecord>, StorageError> {
        Ok(self
            .continents
            .get(&(world_id.to_string(), continent_id.to_string()))
            .cloned())
    }

    fn needs_regeneration(&self, world_id: &str, continent_id: &str) -> Result<bool, StorageError> {
        match self.get_continent_metadata(world_id, continent_id)? {
            None => Ok(true),
            Some(record) => Ok(record.version != CONTINENTAL_VERSION),
        }
    }
}
