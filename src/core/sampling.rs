//! Random variate generators for Thompson sampling.
//!
//! All generators draw from a caller-supplied [`rand::Rng`], so production code
//! passes a thread-local generator and tests pass a seeded `StdRng`.

use rand::Rng;
use std::f64::consts::PI;

/// Uniform variate in (0, 1]
#[inline]
fn open_uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    1.0 - rng.random::<f64>()
}

/// Standard normal variate via the Box-Muller transform
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = open_uniform(rng);
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Gamma(shape, 1) variate
///
/// Marsaglia-Tsang squeeze/rejection for `shape >= 1`; smaller shapes are
/// boosted to `shape + 1` and scaled by `U^(1/shape)`. Returns 0 for a
/// non-positive or non-finite shape.
pub fn gamma<R: Rng + ?Sized>(shape: f64, rng: &mut R) -> f64 {
    if !shape.is_finite() || shape <= 0.0 {
        return 0.0;
    }

    if shape < 1.0 {
        let u = open_uniform(rng);
        return gamma(shape + 1.0, rng) * u.powf(1.0 / shape);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();

    loop {
        let x = standard_normal(rng);
        let v = 1.0 + c * x;
        if v <= 0.0 {
            continue;
        }
        let v = v * v * v;
        let u = open_uniform(rng);
        let x2 = x * x;

        // Squeeze
        if u < 1.0 - 0.0331 * x2 * x2 {
            return d * v;
        }
        if u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

/// Beta(alpha, beta) variate by the gamma ratio method
pub fn beta<R: Rng + ?Sized>(alpha: f64, beta: f64, rng: &mut R) -> f64 {
    let ga = gamma(alpha, rng);
    let gb = gamma(beta, rng);
    let total = ga + gb;
    if total > 0.0 {
        ga / total
    } else {
        0.0
    }
}
