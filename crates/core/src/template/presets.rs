//! Built-in templates. These are the canonical continents shipped with the
//! generator; host projects usually author their own as JSON files and load
//! them through serde instead.

use crate::template::{
    ClimateKnobs, LandExtent, NormPoint, Shape, SpineDef, Template, WorldBounds,
};

impl Template {
    /// Verdania: a C-shaped continent opening south, enclosing a large bay.
    /// The seven-point spine wraps the bay; land extends 0.2 normalized
    /// units to either side of it, and the bay center marks the inner side.
    pub fn verdania() -> Self {
        Self {
            name: "verdania".into(),
            world_bounds: WorldBounds {
                min: -2000.0,
                max: 2000.0,
            },
            shape: Shape {
                center_x: 0.0,
                center_z: 0.0,
                radius: 2000.0,
                falloff_sharpness: 0.0,
            },
            spine: SpineDef {
                points: vec![
                    NormPoint::new(0.26, 0.72),
                    NormPoint::new(0.22, 0.5),
                    NormPoint::new(0.28, 0.34),
                    NormPoint::new(0.5, 0.28),
                    NormPoint::new(0.72, 0.34),
                    NormPoint::new(0.78, 0.5),
                    NormPoint::new(0.74, 0.72),
                ],
                elevation: 0.75,
                width: None,
            },
            land_extent: LandExtent {
                inner: 0.2,
                outer: 0.2,
            },
            bay_center: Some(NormPoint::new(0.5, 0.85)),
            climate: ClimateKnobs {
                base_humidity: 0.55,
                ..ClimateKnobs::default()
            },
            ..Template::default()
        }
    }
}
