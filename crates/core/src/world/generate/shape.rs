use crate::world::generate::{Stage, StageContext, StageId};
use log::info;

/// Anchor stage for the continental silhouette. The shape itself is pure
/// sampling (template evaluator + continentalness noise), so this stage has
/// no outputs of its own; it exists so that silhouette-affecting changes
/// have a version to bump, which marks everything downstream stale.
#[derive(Debug)]
pub struct ShapeStage;

impl Stage for ShapeStage {
    fn id(&self) -> StageId {
        StageId::Shape
    }

    fn version(&self) -> &'static str {
        "2"
    }

    fn weight(&self) -> u32 {
        1
    }

    fn active_form(&self) -> &'static str {
        "Shaping the continent"
    }

    fn generate(&self, cx: &mut StageContext<'_>) -> anyhow::Result<()> {
        // Coarse land-coverage estimate, for operator logs only
        let bounds = cx.template.world_bounds();
        let step = bounds.extent() / 24.0;
        let mut land = 0u32;
        let mut total = 0u32;
        let mut x = bounds.min + step * 0.5;
        while x < bounds.max {
            let mut z = bounds.min + step * 0.5;
            while z < bounds.max {
                if cx.sampler.is_land(x, z) {
                    land += 1;
                }
                total += 1;
                z += step;
            }
            x += step;
        }
        info!(
            "Continent {:?}: ~{:.0}% land coverage",
            cx.template.name(),
            100.0 * land as f64 / total.max(1) as f64
        );
        Ok(())
    }
}
