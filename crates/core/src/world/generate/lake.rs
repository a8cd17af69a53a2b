use crate::world::generate::{Stage, StageContext, StageId};

/// Reserved stage: standing-water discovery. Emits no lakes yet, but the
/// stage participates in versioning and progress so the pipeline shape (and
/// persisted records) won't shift when lake discovery is implemented.
#[derive(Debug)]
pub struct LakeStage;

impl Stage for LakeStage {
    fn id(&self) -> StageId {
        StageId::Lakes
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn weight(&self) -> u32 {
        1
    }

    fn active_form(&self) -> &'static str {
        "Filling the lakes"
    }

    fn generate(&self, cx: &mut StageContext<'_>) -> anyhow::Result<()> {
        cx.data.lakes = Vec::new();
        Ok(())
    }
}
