//! Discrete Gaussian sampling over the integers.
//!
//! Three layers: a table-driven half-Gaussian base sampler, a Bernoulli
//! gate that accepts with probability `ccs * exp(-x)`, and the rejection
//! sampler combining the two around an arbitrary center. The base-sampler
//! comparison, the Bernoulli byte scan and the sign selection all avoid
//! branching on secret data.

use crate::fpr;
use crate::rng::Prng;

/// Integer Gaussian source used by the fast Fourier sampling recursion.
/// The second argument is `1/sigma`, with `sigma` between `sigma_min` and
/// the base deviation 1.8205.
pub trait GaussianSampler {
    fn sample(&mut self, mu: f64, isigma: f64) -> i32;
}

/// Production sampler state: a PRNG plus the per-degree `sigma_min`.
pub struct SamplerContext {
    pub sigma_min: f64,
    pub prng: Prng,
}

impl SamplerContext {
    pub fn new(logn: u32, prng: Prng) -> Self {
        SamplerContext {
            sigma_min: fpr::SIGMA_MIN[logn as usize],
            prng,
        }
    }
}

impl GaussianSampler for SamplerContext {
    fn sample(&mut self, mu: f64, isigma: f64) -> i32 {
        sampler_z(&mut self.prng, self.sigma_min, mu, isigma)
    }
}

/// Cumulative table of the half-Gaussian with deviation 1.8205, truncated
/// at 18, as 19 values of 72 bits split into three 24-bit limbs
/// (high, middle, low).
const GAUSS0: [[u32; 3]; 19] = [
    [10745844, 3068844, 3741698],
    [5559083, 1580863, 8248194],
    [2260429, 13669192, 2736639],
    [708981, 4421575, 10046180],
    [169348, 7122675, 4136815],
    [30538, 13063405, 7650655],
    [4132, 14505003, 7826148],
    [417, 16768101, 11363290],
    [31, 8444042, 8086568],
    [1, 12844466, 265321],
    [0, 1232676, 13644283],
    [0, 38047, 9111839],
    [0, 870, 6138264],
    [0, 14, 12545723],
    [0, 0, 3104126],
    [0, 0, 28824],
    [0, 0, 198],
    [0, 0, 1],
    [0, 0, 0],
];

/// Sample a non-negative integer along the base half-Gaussian.
///
/// A 72-bit random value is compared against every table entry without an
/// early exit; the result is the number of entries strictly above it.
/// An outcome of zero is kept only with probability one half, which moves
/// the effective center of the folded distribution to 1/2 and keeps the
/// outer rejection loop stable for any target center.
pub(crate) fn gaussian0_sampler(p: &mut Prng) -> i32 {
    loop {
        let lo = p.next_u64();
        let hi = p.next_u8();
        let v0 = (lo as u32) & 0xFFFFFF;
        let v1 = ((lo >> 24) as u32) & 0xFFFFFF;
        let v2 = ((lo >> 48) as u32) | ((hi as u32) << 16);

        let mut z = 0i32;
        for w in GAUSS0.iter() {
            let cc = v0.wrapping_sub(w[2]) >> 31;
            let cc = v1.wrapping_sub(w[1]).wrapping_sub(cc) >> 31;
            let cc = v2.wrapping_sub(w[0]).wrapping_sub(cc) >> 31;
            z += cc as i32;
        }
        if z != 0 {
            return z;
        }
        if p.next_u8() & 1 != 0 {
            return 0;
        }
    }
}

/// Fixed-point evaluation of `ccs * exp(-x) * 2^63` for `0 <= x < ln(2)`.
fn expm_p63(x: f64, ccs: f64) -> u64 {
    const C: [u64; 13] = [
        0x00000004741183A3,
        0x00000036548CFC06,
        0x0000024FDCBF140A,
        0x0000171D939DE045,
        0x0000D00CF58F6F84,
        0x000680681CF796E3,
        0x002D82D8305B0FEA,
        0x011111110E066FD0,
        0x0555555555070F00,
        0x155555555581FF00,
        0x400000000002B400,
        0x7FFFFFFFFFFF4800,
        0x8000000000000000,
    ];

    let mut y = C[0];
    let z = (fpr::trunc(x * fpr::PTWO63) as u64) << 1;
    for &c in C[1..].iter() {
        let w = ((z as u128) * (y as u128)) >> 64;
        y = c.wrapping_sub(w as u64);
    }
    let z = (fpr::trunc(ccs * fpr::PTWO63) as u64) << 1;
    (((z as u128) * (y as u128)) >> 64) as u64
}

/// Return true with probability `ccs * exp(-x)` for `x >= 0`.
pub(crate) fn ber_exp(p: &mut Prng, x: f64, ccs: f64) -> bool {
    // x = s*ln(2) + r with 0 <= r < ln(2).
    let s = fpr::trunc(x * fpr::INV_LOG2);
    let r = x - (s as f64) * fpr::LOG2;

    // Saturate s at 63. Beyond that the acceptance probability is below
    // 2^-64 and the clamp cannot change the outcome.
    let mut sw = s as u32;
    sw ^= (sw ^ 63) & (63u32.wrapping_sub(sw) >> 31).wrapping_neg();

    // ccs * exp(-x) = 2^-s * (ccs * exp(-r)), scaled to 64 bits. The -1
    // keeps the value on 64 bits when r = 0.
    let z = ((expm_p63(r, ccs) << 1).wrapping_sub(1)) >> sw;

    // Lazy byte-by-byte comparison against the random stream, high bytes
    // first. The sign of the first nonzero difference decides.
    let mut i = 64i32;
    loop {
        i -= 8;
        let w = (p.next_u8() as u32).wrapping_sub(((z >> i) as u32) & 0xFF);
        if w != 0 || i <= 0 {
            return (w >> 31) != 0;
        }
    }
}

/// Sample an integer along a Gaussian of center `mu` and deviation
/// `1/isigma`, by rejection from the shifted base sampler.
pub(crate) fn sampler_z(prng: &mut Prng, sigma_min: f64, mu: f64, isigma: f64) -> i32 {
    // mu = s + r with s integer (nearest, ties to even) and r the residue.
    let s = fpr::rint(mu);
    let r = mu - s as f64;

    let dss = fpr::half(fpr::sqr(isigma));
    let ccs = isigma * sigma_min;

    loop {
        let y_plus = gaussian0_sampler(prng);
        let b = (prng.next_u8() & 1) as i32;

        // y = y_plus if b == 1, else -y_plus, selected by mask.
        let nm = b - 1;
        let y = (y_plus ^ nm) - nm;

        let x = fpr::sqr(y as f64 - r) * dss
            - (fpr::sqr(y_plus as f64) - y_plus as f64) * fpr::INV_2SQRSIGMA0;
        if ber_exp(prng, x, ccs) {
            return (s as i32) + y;
        }
    }
}
