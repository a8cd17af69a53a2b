//! The stage scheduler. Generation is a fixed, ordered list of versioned
//! stages, each of which reads the terrain sampler and the outputs of
//! earlier stages, and appends its own outputs to the [ContinentData]
//! under construction.
//!
//! In the stage code you'll see a lot of algorithms that generate candidate
//! values into local collections and commit them to the continent data in a
//! final pass. That's deliberate: stages observe each other's outputs only
//! across stage boundaries, which is what makes partial regeneration (and
//! any future per-stage parallelism) sound.

mod lake;
mod river;
mod road;
mod sdf;
mod shape;
mod spine;
mod zone;

use crate::{
    error::GenerateError,
    host::{Host, Progress},
    template::ContinentTemplate,
    terrain::TerrainSampler,
    timed,
    world::ContinentData,
};
use anyhow::Context;
use std::fmt::Debug;
use strum::{Display, EnumString};

/// Schema version of the pipeline as a whole. Bump when the persisted
/// record layout changes shape (per-stage algorithm changes are tracked by
/// the individual stage versions instead).
pub const CONTINENTAL_VERSION: u32 = 3;

/// Identifier of one pipeline stage; doubles as the key in
/// [ContinentData::stage_versions].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StageId {
    Shape,
    Mountains,
    Rivers,
    Lakes,
    Zones,
    Roads,
    Sdf,
}

/// Everything a stage gets to work with. Stages may read anything here and
/// may mutate only `data`.
pub(crate) struct StageContext<'a> {
    pub seed: u32,
    pub template: &'a ContinentTemplate,
    pub sampler: &'a TerrainSampler<'a>,
    pub data: &'a mut ContinentData,
    pub host: &'a dyn Host,
}

/// A single unit of the generation pipeline. Failures returned from
/// [Stage::generate] indicate bugs or impossible inputs, not user error;
/// the scheduler wraps them with the stage id and aborts the run.
pub(crate) trait Stage: Debug {
    fn id(&self) -> StageId;

    /// Version of this stage's algorithm. Changing the version marks
    /// previously generated continents stale for this stage (and its
    /// dependents).
    fn version(&self) -> &'static str;

    /// Relative share of the progress bar.
    fn weight(&self) -> u32;

    /// User-facing activity description, shown while the stage runs.
    fn active_form(&self) -> &'static str;

    fn generate(&self, cx: &mut StageContext<'_>) -> anyhow::Result<()>;
}

/// The pipeline, in execution order. The order is very important: each
/// stage consumes outputs of the ones before it.
fn stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(shape::ShapeStage),
        Box::new(spine::SpineStage),
        Box::new(river::RiverStage),
        Box::new(lake::LakeStage),
        Box::new(zone::ZoneStage),
        Box::new(road::RoadStage),
        Box::new(sdf::SdfStage),
    ]
}

/// Direct dependents in the static stage DAG. Used to take the transitive
/// closure of stale stages: anything downstream of a stale stage is stale
/// too.
fn direct_dependents(id: StageId) -> &'static [StageId] {
    use StageId::*;
    match id {
        Shape => &[Mountains, Lakes, Sdf],
        Mountains => &[Rivers, Sdf],
        Rivers => &[Zones, Sdf],
        Lakes => &[Sdf],
        Zones => &[Roads, Sdf],
        Roads => &[Sdf],
        Sdf => &[],
    }
}

/// Stages of `previous` that are stale under the current code: version
/// mismatch or missing record, expanded to the transitive dependent
/// closure. Returned in pipeline order.
pub(crate) fn stale_stages(previous: &ContinentData) -> Vec<StageId> {
    let all = stages();
    let mut stale: Vec<StageId> = Vec::new();

    for stage in &all {
        let id = stage.id();
        let recorded = previous.stage_versions.get(&id.to_string());
        let mut is_stale = recorded.map(String::as_str) != Some(stage.version());
        // Textures live outside the metadata record; data restored from a
        // store without its texture blobs needs the bake stage re-run
        if id == StageId::Sdf && previous.textures.is_empty() {
            is_stale = true;
        }
        if is_stale {
            mark_with_dependents(id, &mut stale);
        }
    }

    // Normalize to pipeline order
    let order: Vec<StageId> = all.iter().map(|s| s.id()).collect();
    let mut result: Vec<StageId> = order.into_iter().filter(|id| stale.contains(id)).collect();
    result.dedup();
    result
}

fn mark_with_dependents(id: StageId, stale: &mut Vec<StageId>) {
    if stale.contains(&id) {
        return;
    }
    stale.push(id);
    for &dependent in direct_dependents(id) {
        mark_with_dependents(dependent, stale);
    }
}

/// Drive the pipeline. With `only = None` every stage runs (full
/// generation); otherwise only the listed stages run and the outputs of
/// skipped stages are restored from `previous`.
///
/// Progress callbacks fire in stage order, once per stage that actually
/// ran, and never after this function returns. Cancellation is honored at
/// stage boundaries; a cancelled run returns [GenerateError::Cancelled]
/// and discards all partial data.
pub(crate) fn run(
    seed: u32,
    template: &ContinentTemplate,
    host: &dyn Host,
    progress: &mut dyn FnMut(&Progress),
    only: Option<&[StageId]>,
    previous: Option<&ContinentData>,
) -> anyhow::Result<ContinentData> {
    let all = stages();
    let total_weight: u32 = all.iter().map(|s| s.weight()).sum();
    let stage_count = all.len() as u32;

    let mut data = ContinentData::new(seed, template.name());
    let sampler = TerrainSampler::new(seed, template);

    let mut completed_weight = 0u32;
    for (index, stage) in all.iter().enumerate() {
        if host.is_cancelled() {
            return Err(GenerateError::Cancelled.into());
        }

        let id = stage.id();
        let should_run = only.map_or(true, |ids| ids.contains(&id));
        if should_run {
            let mut cx = StageContext {
                seed,
                template,
                sampler: &sampler,
                data: &mut data,
                host,
            };
            timed!(&format!("Stage {}", id), stage.generate(&mut cx))
                .with_context(|| format!("error in stage {}", id))?;
            data.stage_versions
                .insert(id.to_string(), stage.version().to_string());
        } else {
            let previous = previous
                .with_context(|| format!("stage {} skipped without previous data", id))?;
            restore_stage_output(id, previous, &mut data);
        }

        completed_weight += stage.weight();

        if should_run {
            host.yield_to_host();
            progress(&Progress {
                stage_id: id.to_string(),
                stage_index: index as u32,
                stage_count,
                progress: completed_weight as f32 / total_weight as f32,
                stage_progress: 1.0,
                message: stage.active_form().to_string(),
            });
        }
    }

    Ok(data)
}

/// Copy one stage's outputs (and its recorded version) from a previous run
/// into the data under construction.
fn restore_stage_output(id: StageId, previous: &ContinentData, data: &mut ContinentData) {
    match id {
        StageId::Shape => {
            // The shape stage only anchors the template ingest; its output
            // is the template name already present on the fresh data
        }
        StageId::Mountains => data.spines = previous.spines.clone(),
        StageId::Rivers => data.rivers = previous.rivers.clone(),
        StageId::Lakes => data.lakes = previous.lakes.clone(),
        StageId::Zones => data.zones = previous.zones.clone(),
        StageId::Roads => {
            data.roads = previous.roads.clone();
            data.settlements = previous.settlements.clone();
            data.landmarks = previous.landmarks.clone();
        }
        StageId::Sdf => data.textures = previous.textures.clone(),
    }
    if let Some(version) = previous.stage_versions.get(&id.to_string()) {
        data.stage_versions.insert(id.to_string(), version.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_ids() {
        let ids: Vec<StageId> = stages().iter().map(|s| s.id()).collect();
        assert_eq!(
            ids,
            vec![
                StageId::Shape,
                StageId::Mountains,
                StageId::Rivers,
                StageId::Lakes,
                StageId::Zones,
                StageId::Roads,
                StageId::Sdf,
            ]
        );
    }

    #[test]
    fn test_stage_id_strings() {
        assert_eq!(StageId::Mountains.to_string(), "mountains");
        assert_eq!(StageId::Sdf.to_string(), "sdf");
    }

    #[test]
    fn test_dependent_closure_of_mountains() {
        let mut stale = Vec::new();
        mark_with_dependents(StageId::Mountains, &mut stale);
        for id in [
            StageId::Mountains,
            StageId::Rivers,
            StageId::Zones,
            StageId::Roads,
            StageId::Sdf,
        ] {
            assert!(stale.contains(&id), "missing {}", id);
        }
        assert!(!stale.contains(&StageId::Shape));
        assert!(!stale.contains(&StageId::Lakes));
    }

    #[test]
    fn test_total_weight_positive() {
        let total: u32 = stages().iter().map(|s| s.weight()).sum();
        assert!(total > 0);
    }
}
