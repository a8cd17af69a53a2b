//! Directory-backed implementation of the continent store: one JSON
//! metadata file plus one raw float32 blob per texture, all under a flat
//! output directory.

use continent::{
    ContinentRecord, ContinentStore, StorageError, TextureRecord, CONTINENTAL_VERSION,
};
use log::debug;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn metadata_path(&self, continent_id: &str) -> PathBuf {
        self.root.join(continent_id).with_extension("json")
    }
}

impl ContinentStore for DirStore {
    fn save_continent_metadata(&mut self, record: &ContinentRecord) -> Result<(), StorageError> {
        let path = self.metadata_path(&record.continent_id);
        let json = record
            .to_json()
            .map_err(|err| StorageError(err.to_string()))?;
        fs::write(&path, json)?;
        debug!("Wrote continent metadata to {:?}", path);
        Ok(())
    }

    fn save_texture(&mut self, texture: &TextureRecord) -> Result<(), StorageError> {
        let path = self
            .root
            .join(format!("{}.{}", texture.continent_id, texture.texture_type))
            .with_extension("f32");
        fs::write(&path, &texture.data)?;
        debug!("Wrote texture blob to {:?}", path);
        Ok(())
    }

    fn get_continent_metadata(
        &self,
        _world_id: &str,
        continent_id: &str,
    ) -> Result<Option<ContinentRecord>, StorageError> {
        let path = self.metadata_path(continent_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        ContinentRecord::from_json(&json)
            .map(Some)
            .map_err(|err| StorageError(err.to_string()))
    }

    fn needs_regeneration(
        &self,
        world_id: &str,
        continent_id: &str,
    ) -> Result<bool, StorageError> {
        match self.get_continent_metadata(world_id, continent_id)? {
            None => Ok(true),
            Some(record) => Ok(record.version != CONTINENTAL_VERSION),
        }
    }
}
