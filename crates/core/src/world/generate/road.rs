use crate::world::generate::{Stage, StageContext, StageId};

/// Reserved stage: road network, settlements and landmarks. All three are
/// extension points emitted empty; see the lake stage for the rationale.
#[derive(Debug)]
pub struct RoadStage;

impl Stage for RoadStage {
    fn id(&self) -> StageId {
        StageId::Roads
    }

    fn version(&self) -> &'static str {
        "1"
    }

    fn weight(&self) -> u32 {
        1
    }

    fn active_form(&self) -> &'static str {
        "Laying out the roads"
    }

    fn generate(&self, cx: &mut StageContext<'_>) -> anyhow::Result<()> {
        cx.data.roads = Vec::new();
        cx.data.settlements = Vec::new();
        cx.data.landmarks = Default::default();
        Ok(())
    }
}
