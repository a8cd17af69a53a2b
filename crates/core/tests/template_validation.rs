use continent::{
    ContinentTemplate, LandExtent, NormPoint, Shape, SpineDef, Template,
};
use continent::validator::ValidationErrors;

#[test]
fn test_template_validation_reports_field_paths() {
    let template = Template {
        shape: Shape {
            center_x: 0.0,
            center_z: 0.0,
            radius: -100.0,         // invalid (negative)
            falloff_sharpness: 0.3, // valid
        },
        spine: SpineDef {
            points: vec![NormPoint::new(0.5, 0.5)], // invalid (one point)
            elevation: 0.8,
            width: None,
        },
        land_extent: LandExtent {
            inner: 1.5, // invalid (must be in (0, 1))
            outer: 0.2, // valid
        },
        ..Template::default()
    };

    // This is a bit of a lazy check but it works well enough
    let err = ContinentTemplate::resolve(template).unwrap_err();
    let validation_errors = err.downcast::<ValidationErrors>().unwrap();
    let mut error_fields = validation_errors
        .errors()
        .keys()
        .copied()
        .collect::<Vec<&str>>();
    error_fields.sort_unstable();
    assert_eq!(
        error_fields,
        vec!["land_extent", "shape", "spine"],
        "incorrect validation errors in {:#?}",
        validation_errors
    );
}

#[test]
fn test_non_finite_values_are_rejected() {
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let template = Template {
            shape: Shape {
                radius: bad,
                ..Shape::default()
            },
            ..Template::default()
        };
        assert!(
            ContinentTemplate::resolve(template).is_err(),
            "accepted radius {}",
            bad
        );
    }

    let template = Template {
        spine: SpineDef {
            points: vec![NormPoint::new(f64::NAN, 0.5), NormPoint::new(0.8, 0.5)],
            elevation: 0.8,
            width: None,
        },
        ..Template::default()
    };
    assert!(ContinentTemplate::resolve(template).is_err());
}

#[test]
fn test_template_file_round_trip() {
    // The on-disk format: camelCase JSON of normalized values
    let json = r#"{
        "name": "isle",
        "worldBounds": {"min": -1000.0, "max": 1000.0},
        "shape": {"centerX": 0.0, "centerZ": 0.0, "radius": 900.0, "falloffSharpness": 0.2},
        "spine": {"points": [{"x": 0.3, "z": 0.4}, {"x": 0.7, "z": 0.6}], "elevation": 0.7},
        "landExtent": {"inner": 0.3, "outer": 0.2},
        "climate": {"baseHumidity": 0.6}
    }"#;
    let template: Template = serde_json::from_str(json).unwrap();
    assert_eq!(template.name, "isle");
    assert_eq!(template.spine.points.len(), 2);
    assert_eq!(template.climate.base_humidity, 0.6);
    // Unspecified fields fall back to defaults
    assert_eq!(template.climate.temperature_gradient.strength, 0.3);

    let resolved = ContinentTemplate::resolve(template).unwrap();
    assert_eq!(resolved.regime(), continent::ShapeRegime::SpineFirst);
}
