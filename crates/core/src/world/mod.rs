pub mod feature;
mod generate;
pub mod sdf;
pub mod zone;

use crate::{
    error::GenerateError,
    host::{Host, Progress},
    template::ContinentTemplate,
    timed,
    world::{
        feature::{Lake, RiverFeature, Road, Settlement, SpineFeature},
        sdf::{SdfTexture, TextureType},
        zone::{LandmarkMap, ZoneMap},
    },
};
use log::info;
use std::collections::BTreeMap;

pub use generate::{StageId, CONTINENTAL_VERSION};

/// Everything the pipeline generates for one continent. Mutated only by the
/// stage scheduler, and only between stages: stage `k+1` observes stage
/// `k`'s outputs, never partial ones.
///
/// Lakes, roads, settlements and landmarks are reserved extension points:
/// the collections (and their stages) exist, but the core emits them empty.
#[derive(Clone, Debug, PartialEq)]
pub struct ContinentData {
    pub seed: u32,
    pub template_name: String,
    pub spines: Vec<SpineFeature>,
    pub rivers: Vec<RiverFeature>,
    pub lakes: Vec<Lake>,
    pub zones: ZoneMap,
    pub roads: Vec<Road>,
    pub settlements: Vec<Settlement>,
    pub landmarks: LandmarkMap,
    /// Per-stage version strings recorded when each stage last ran; the
    /// staleness input for partial regeneration.
    pub stage_versions: BTreeMap<String, String>,
    /// Baked lookup textures, in bake order. Persisted separately from the
    /// metadata record.
    pub textures: Vec<(TextureType, SdfTexture)>,
}

impl ContinentData {
    fn new(seed: u32, template_name: impl Into<String>) -> Self {
        Self {
            seed,
            template_name: template_name.into(),
            spines: Vec::new(),
            rivers: Vec::new(),
            lakes: Vec::new(),
            zones: ZoneMap::default(),
            roads: Vec::new(),
            settlements: Vec::new(),
            landmarks: LandmarkMap::default(),
            stage_versions: BTreeMap::new(),
            textures: Vec::new(),
        }
    }
}

/// A fully generated continent: the immutable inputs plus the generated
/// aggregate. Pass this around explicitly; there is deliberately no shared
/// global generator.
#[derive(Clone, Debug)]
pub struct Continent {
    seed: u32,
    template: ContinentTemplate,
    data: ContinentData,
}

impl Continent {
    /// Run the full generation pipeline. After every stage the scheduler
    /// yields to the host and reports progress; if the host signals
    /// cancellation the run aborts at the next stage boundary with
    /// [GenerateError::Cancelled] and no partial data escapes.
    pub fn generate(
        seed: u32,
        template: ContinentTemplate,
        host: &dyn Host,
        progress: &mut dyn FnMut(&Progress),
    ) -> anyhow::Result<Self> {
        info!(
            "Generating continent from template {:?} with seed {}",
            template.name(),
            seed
        );
        let data = timed!(
            "Continent generation",
            log::Level::Info,
            generate::run(seed, &template, host, progress, None, None)?
        );
        Ok(Self {
            seed,
            template,
            data,
        })
    }

    /// Re-run only the stages whose versions differ from the ones recorded
    /// in `previous` (plus their transitive dependents); outputs of skipped
    /// stages are carried over. When nothing is stale, `previous` is
    /// returned untouched without invoking any stage.
    pub fn regenerate_stale(
        previous: Self,
        host: &dyn Host,
        progress: &mut dyn FnMut(&Progress),
    ) -> anyhow::Result<Self> {
        let stale = generate::stale_stages(&previous.data);
        if stale.is_empty() {
            info!(
                "Continent {:?} is up to date, nothing to regenerate",
                previous.template.name()
            );
            return Ok(previous);
        }

        info!("Regenerating stale stages: {:?}", stale);
        let data = generate::run(
            previous.seed,
            &previous.template,
            host,
            progress,
            Some(&stale),
            Some(&previous.data),
        )?;
        Ok(Self {
            seed: previous.seed,
            template: previous.template,
            data,
        })
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn template(&self) -> &ContinentTemplate {
        &self.template
    }

    pub fn data(&self) -> &ContinentData {
        &self.data
    }

    /// Rebuild an in-memory continent from previously generated data (e.g.
    /// loaded from a host store) so it can be partially regenerated. The
    /// data must have been generated from the same template.
    pub fn from_parts(
        seed: u32,
        template: ContinentTemplate,
        data: ContinentData,
    ) -> anyhow::Result<Self> {
        if data.template_name != template.name() {
            return Err(GenerateError::TemplateMismatch {
                expected: data.template_name.clone(),
                actual: template.name().to_string(),
            }
            .into());
        }
        Ok(Self {
            seed,
            template,
            data,
        })
    }

    /// Test-only handle for mutating recorded stage versions (to simulate
    /// version drift between code releases).
    #[doc(hidden)]
    pub fn data_mut(&mut self) -> &mut ContinentData {
        &mut self.data
    }
}
