use std::cmp::Ordering;

/// 2D point in world space (block units)
pub type Point2 = nalgebra::Point2<f64>;
/// 2D vector in world space (block units)
pub type Vector2 = nalgebra::Vector2<f64>;

/// A macro to measure the evaluation time of an expression. Wraps an
/// expression, and logs the elapsed time at the given level (debug by
/// default) once the expression finishes.
#[macro_export]
macro_rules! timed {
    ($label:expr, $ex:expr) => {
        timed!($label, log::Level::Debug, $ex)
    };
    ($label:expr, $log_level:expr, $ex:expr) => {{
        let now = std::time::Instant::now();
        let value = $ex;
        let elapsed = now.elapsed();
        log::log!($log_level, "{} took {} ms", $label, elapsed.as_millis());
        value
    }};
}

/// Hermite smoothstep between two edges. Returns 0 at/below `edge0`, 1
/// at/above `edge1`, and `3t²-2t³` in between. `edge0 < edge1` is assumed.
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Linear interpolation between `a` and `b`, unclamped.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Cosine falloff over a normalized position `t ∈ [0,1]`: peaks at 1.0 in
/// the middle (`t = 0.5`) and tapers to 0.0 at both ends. Used for spine
/// elevation/prominence profiles.
pub fn cosine_taper(t: f64) -> f64 {
    0.5 * (std::f64::consts::TAU * (t - 0.5).abs()).cos() + 0.5
}

/// Compare two `PartialOrd` values dangerously. If the partial comparison
/// fails (returns `None`), this will panic. This is useful if you have floats
/// that you know for a fact will not be `NaN`.
pub fn cmp_unwrap<T: PartialOrd>(a: &T, b: &T) -> Ordering {
    a.partial_cmp(b).unwrap()
}

/// Project point `p` onto the segment `a→b`. Returns the closest point on the
/// segment and the clamped parameter `t ∈ [0,1]` along it. Degenerate
/// segments (`a == b`) project onto `a` with `t = 0`.
pub fn project_onto_segment(p: Point2, a: Point2, b: Point2) -> (Point2, f64) {
    let ab = b - a;
    let len_sq = ab.dot(&ab);
    if len_sq < f64::EPSILON {
        return (a, 0.0);
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_smoothstep() {
        assert_approx_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_approx_eq!(smoothstep(0.0, 1.0, 0.0), 0.0);
        assert_approx_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
        assert_approx_eq!(smoothstep(0.0, 1.0, 1.0), 1.0);
        assert_approx_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        // Midpoint of a shifted range
        assert_approx_eq!(smoothstep(10.0, 20.0, 15.0), 0.5);
    }

    #[test]
    fn test_cosine_taper() {
        assert_approx_eq!(cosine_taper(0.0), 0.0);
        assert_approx_eq!(cosine_taper(0.5), 1.0);
        assert_approx_eq!(cosine_taper(1.0), 0.0);
        // Symmetric around the center
        assert_approx_eq!(cosine_taper(0.25), cosine_taper(0.75));
    }

    #[test]
    fn test_project_onto_segment() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(10.0, 0.0);
        let (p, t) = project_onto_segment(Point2::new(5.0, 3.0), a, b);
        assert_approx_eq!(p.x, 5.0);
        assert_approx_eq!(p.y, 0.0);
        assert_approx_eq!(t, 0.5);

        // Beyond an endpoint clamps to it
        let (p, t) = project_onto_segment(Point2::new(-4.0, 1.0), a, b);
        assert_approx_eq!(p.x, 0.0);
        assert_approx_eq!(t, 0.0);
    }
}
