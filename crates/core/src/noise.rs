//! Noise primitives built on the hash substrate in [crate::rng]. Value noise
//! on an integer lattice rather than gradient noise: cheaper, and its corner
//! values come straight out of [hash_unit], which keeps the whole field a
//! pure function of `(position, salt)`.

use crate::rng::hash_unit;

/// Single-octave value noise at the given frequency-scaled coordinate.
/// Corner values come from the hash substrate; interpolation is smoothstep
/// (`fx²·(3-2fx)`) on both axes. Output is in `[0, 1)`.
pub fn value_noise(x: f64, z: f64, salt: u32) -> f64 {
    let xf = x.floor();
    let zf = z.floor();
    let ix = xf as i32;
    let iz = zf as i32;
    let fx = x - xf;
    let fz = z - zf;

    let c00 = hash_unit(ix, iz, salt);
    let c10 = hash_unit(ix + 1, iz, salt);
    let c01 = hash_unit(ix, iz + 1, salt);
    let c11 = hash_unit(ix + 1, iz + 1, salt);

    let ux = fx * fx * (3.0 - 2.0 * fx);
    let uz = fz * fz * (3.0 - 2.0 * fz);

    let x0 = c00 + (c10 - c00) * ux;
    let x1 = c01 + (c11 - c01) * ux;
    x0 + (x1 - x0) * uz
}

/// Fractal Brownian motion: sum `octaves` layers of value noise with
/// geometric frequency doubling and amplitude halving, normalized by the
/// amplitude sum so the output stays in `[0, 1)`.
///
/// Each octave gets its own salt (`salt + octave`) so layers don't share
/// lattice artifacts.
pub fn octave_noise(x: f64, z: f64, octaves: u32, base_frequency: f64, salt: u32) -> f64 {
    let mut frequency = base_frequency;
    let mut amplitude = 1.0;
    let mut total = 0.0;
    let mut amplitude_sum = 0.0;

    for octave in 0..octaves {
        total += value_noise(x * frequency, z * frequency, salt.wrapping_add(octave)) * amplitude;
        amplitude_sum += amplitude;
        frequency *= 2.0;
        amplitude *= 0.5;
    }

    if amplitude_sum > 0.0 {
        total / amplitude_sum
    } else {
        0.0
    }
}

/// Domain-warped fBm: sample the field at a position offset by its own
/// low-frequency value. One shared warp offset on both axes is enough to
/// break up the grid alignment of plain value noise.
pub fn warped_noise_2d(
    x: f64,
    z: f64,
    octaves: u32,
    frequency: f64,
    warp_strength: f64,
    salt: u32,
) -> f64 {
    let warp = warp_strength * (octave_noise(x, z, octaves, frequency, salt) - 0.5);
    octave_noise(x + warp, z + warp, octaves, frequency, salt.wrapping_add(0x9E37))
}

/// Ridged transform of fBm: `1 - |2n - 1|`. Produces sharp crests where the
/// underlying field crosses its midpoint, which reads as ridgelines once
/// multiplied into the elevation field.
pub fn ridged_noise(x: f64, z: f64, octaves: u32, base_frequency: f64, salt: u32) -> f64 {
    let n = octave_noise(x, z, octaves, base_frequency, salt);
    1.0 - (2.0 * n - 1.0).abs()
}
