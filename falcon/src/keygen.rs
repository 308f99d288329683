//! NTRU key generation.
//!
//! Draws `(f, g)` from the key distribution, screens them (invertibility
//! mod q, Gram-Schmidt norm), then solves the NTRU equation
//! `f*G - g*F = q` by the tower-of-rings method: push `(f, g)` down
//! through repeated field norms until degree 1, solve with the extended
//! GCD, and lift the solution back up while size-reducing `(F, G)`
//! against `(f, g)` at every level.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};

use crate::fft::{fft, ifft, poly_add, poly_mul_fft, poly_muladj_fft, poly_mulselfadj_fft};
use crate::fpr::Q;
use crate::rng::Prng;
use crate::sampler::sampler_z;
use crate::zq;

/// Deviation of the elementary draws; 4096/n of them are summed per
/// coefficient so that `(f, g)` ends up with deviation `1.17*sqrt(q/2n)`.
const SIGMA_STAR: f64 = 1.43300980528773;

/// Generate a complete key: `(f, g, F, G)` and the public `h = g/f mod q`.
/// Deterministic for a fixed PRNG stream.
pub(crate) fn generate(
    logn: u32,
    prng: &mut Prng,
) -> (Vec<i8>, Vec<i8>, Vec<i8>, Vec<i8>, Vec<u16>) {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let Some(f) = gen_poly(logn, prng) else {
            continue;
        };
        let Some(g) = gen_poly(logn, prng) else {
            continue;
        };
        if !gram_schmidt_norm_ok(&f, &g, logn) {
            continue;
        }
        let Some(h) = zq::compute_public(&f, &g, logn) else {
            continue;
        };
        let fb: Vec<BigInt> = f.iter().map(|&x| BigInt::from(x)).collect();
        let gb: Vec<BigInt> = g.iter().map(|&x| BigInt::from(x)).collect();
        let Some((big_f, big_g)) = ntru_solve(&fb, &gb) else {
            continue;
        };
        let Some(big_f) = to_small(&big_f) else {
            continue;
        };
        let Some(big_g) = to_small(&big_g) else {
            continue;
        };
        log::debug!("ntru key found after {attempts} attempt(s)");
        return (f, g, big_f, big_g, h);
    }
}

/// One secret polynomial: each coefficient is the sum of `4096/n` draws
/// from the elementary Gaussian. Fails when a coefficient overflows the
/// trimmed storage width for this degree, so every generated key encodes.
fn gen_poly(logn: u32, prng: &mut Prng) -> Option<Vec<i8>> {
    let n = 1usize << logn;
    let k = 4096 / n;
    let sigma_min = crate::fpr::SIGMA_MIN[logn as usize];
    let isigma = 1.0 / SIGMA_STAR;
    let limit = (1i32 << (crate::codec::MAX_FG_BITS[logn as usize] - 1)) - 1;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let mut acc = 0i32;
        for _ in 0..k {
            acc += sampler_z(prng, sigma_min, 0.0, isigma);
        }
        out.push(acc);
    }
    out.into_iter()
        .map(|c| {
            if (-limit..=limit).contains(&c) {
                Some(c as i8)
            } else {
                None
            }
        })
        .collect::<Option<Vec<i8>>>()
}

/// Accept `(f, g)` only when both the primal and the dual Gram-Schmidt
/// row norms stay below `(1.17)^2 * q`.
fn gram_schmidt_norm_ok(f: &[i8], g: &[i8], logn: u32) -> bool {
    let n = 1usize << logn;
    let bound = 1.17 * 1.17 * Q as f64;

    let sq_fg: f64 = f
        .iter()
        .chain(g)
        .map(|&x| (x as f64) * (x as f64))
        .sum();
    if sq_fg > bound {
        return false;
    }

    let mut fh: Vec<f64> = f.iter().map(|&x| x as f64).collect();
    let mut gh: Vec<f64> = g.iter().map(|&x| x as f64).collect();
    fft(&mut fh, logn);
    fft(&mut gh, logn);
    let hn = n >> 1;
    let qf = Q as f64;
    let mut sq_dual = 0.0;
    for u in 0..hn {
        let t = fh[u] * fh[u] + fh[u + hn] * fh[u + hn] + gh[u] * gh[u] + gh[u + hn] * gh[u + hn];
        if t < 1e-9 {
            return false;
        }
        sq_dual += qf * qf / t;
    }
    sq_dual *= 2.0 / n as f64;
    sq_dual <= bound
}

/// Squeeze solver output into signed bytes; `-128` is excluded because
/// the trimmed encodings reserve the minimum pattern.
fn to_small(p: &[BigInt]) -> Option<Vec<i8>> {
    p.iter()
        .map(|x| {
            x.to_i32().and_then(|v| {
                if (-127..=127).contains(&v) {
                    Some(v as i8)
                } else {
                    None
                }
            })
        })
        .collect()
}

/// Full Karatsuba product of two length-n slices (n a power of two),
/// result of length 2n.
fn karatsuba(a: &[BigInt], b: &[BigInt]) -> Vec<BigInt> {
    let n = a.len();
    if n <= 16 {
        let mut out = vec![BigInt::zero(); 2 * n];
        for (i, ai) in a.iter().enumerate() {
            if ai.is_zero() {
                continue;
            }
            for (j, bj) in b.iter().enumerate() {
                out[i + j] += ai * bj;
            }
        }
        return out;
    }
    let m = n / 2;
    let (a0, a1) = a.split_at(m);
    let (b0, b1) = b.split_at(m);
    let ax: Vec<BigInt> = a0.iter().zip(a1).map(|(x, y)| x + y).collect();
    let bx: Vec<BigInt> = b0.iter().zip(b1).map(|(x, y)| x + y).collect();
    let lo = karatsuba(a0, b0);
    let hi = karatsuba(a1, b1);
    let mid = karatsuba(&ax, &bx);
    let mut out = vec![BigInt::zero(); 2 * n];
    for i in 0..2 * m {
        out[i] += &lo[i];
        out[i + m] += &mid[i] - &lo[i] - &hi[i];
        out[i + n] += &hi[i];
    }
    out
}

/// Product in `Z[X]/(X^n + 1)`.
fn poly_mul_big(a: &[BigInt], b: &[BigInt]) -> Vec<BigInt> {
    let n = a.len();
    let full = karatsuba(a, b);
    (0..n).map(|i| &full[i] - &full[i + n]).collect()
}

/// `N(a)(X^2) = a(X) * a(-X)`: the field norm relative to the subring of
/// even powers.
fn field_norm(a: &[BigInt]) -> Vec<BigInt> {
    let m = a.len() / 2;
    let even: Vec<BigInt> = a.iter().step_by(2).cloned().collect();
    let odd: Vec<BigInt> = a.iter().skip(1).step_by(2).cloned().collect();
    let e2 = poly_mul_big(&even, &even);
    let o2 = poly_mul_big(&odd, &odd);
    let mut out = e2;
    // subtract X * o2 mod X^m + 1
    out[0] += &o2[m - 1];
    for i in 1..m {
        out[i] -= &o2[i - 1];
    }
    out
}

/// Map back into the ring of twice the degree by spacing coefficients on
/// the even powers.
fn lift(a: &[BigInt]) -> Vec<BigInt> {
    let mut out = vec![BigInt::zero(); 2 * a.len()];
    for (i, x) in a.iter().enumerate() {
        out[2 * i] = x.clone();
    }
    out
}

/// `a(-X)`: negate the odd coefficients.
fn galois_conjugate(a: &[BigInt]) -> Vec<BigInt> {
    a.iter()
        .enumerate()
        .map(|(i, x)| if i & 1 == 1 { -x } else { x.clone() })
        .collect()
}

/// Byte-granular size of the largest coefficient.
fn bitsize(a: &[BigInt]) -> u64 {
    a.iter()
        .map(|x| (x.magnitude().bits() + 7) / 8 * 8)
        .max()
        .unwrap_or(0)
}

fn to_f64_scaled(a: &[BigInt], shift: u64) -> Vec<f64> {
    a.iter()
        .map(|x| (x >> shift).to_f64().unwrap_or(0.0))
        .collect()
}

/// Babai size reduction of `(F, G)` against `(f, g)`, working on the top
/// 53 bits of every coefficient and repeating until the quotient rounds
/// to zero.
fn reduce(f: &[BigInt], g: &[BigInt], big_f: &mut Vec<BigInt>, big_g: &mut Vec<BigInt>) {
    let n = f.len();
    let logn = n.trailing_zeros();

    let size = 53u64.max(bitsize(f)).max(bitsize(g));
    let mut fa = to_f64_scaled(f, size - 53);
    let mut ga = to_f64_scaled(g, size - 53);
    fft(&mut fa, logn);
    fft(&mut ga, logn);

    // denominator f*adj(f) + g*adj(g)
    let mut den = fa.clone();
    poly_mulselfadj_fft(&mut den, logn);
    let mut gg = ga.clone();
    poly_mulselfadj_fft(&mut gg, logn);
    poly_add(&mut den, &gg);

    loop {
        let cap = 53u64.max(bitsize(big_f)).max(bitsize(big_g));
        if cap < size {
            break;
        }
        let mut fa_big = to_f64_scaled(big_f, cap - 53);
        let mut ga_big = to_f64_scaled(big_g, cap - 53);
        fft(&mut fa_big, logn);
        fft(&mut ga_big, logn);

        // numerator F*adj(f) + G*adj(g)
        poly_muladj_fft(&mut fa_big, &fa, logn);
        poly_muladj_fft(&mut ga_big, &ga, logn);
        poly_add(&mut fa_big, &ga_big);

        let hn = n >> 1;
        let mut k = fa_big;
        for u in 0..hn {
            let d = den[u];
            k[u] /= d;
            k[u + hn] /= d;
        }
        ifft(&mut k, logn);
        let k: Vec<BigInt> = k
            .iter()
            .map(|&x| BigInt::from(crate::fpr::rint(x)))
            .collect();
        if k.iter().all(|x| x.is_zero()) {
            break;
        }

        let fk = poly_mul_big(f, &k);
        let gk = poly_mul_big(g, &k);
        let back = cap - size;
        for i in 0..n {
            big_f[i] -= &fk[i] << back;
            big_g[i] -= &gk[i] << back;
        }
    }
}

/// Solve `f*G - g*F = q` over `Z[X]/(X^n + 1)`. `None` when the equation
/// has no solution for this pair (the caller redraws).
fn ntru_solve(f: &[BigInt], g: &[BigInt]) -> Option<(Vec<BigInt>, Vec<BigInt>)> {
    let n = f.len();
    if n == 1 {
        let e = f[0].extended_gcd(&g[0]);
        if !e.gcd.is_one() {
            return None;
        }
        let q = BigInt::from(Q);
        return Some((vec![-&q * e.y], vec![q * e.x]));
    }

    let fp = field_norm(f);
    let gp = field_norm(g);
    let (big_fp, big_gp) = ntru_solve(&fp, &gp)?;
    let mut big_f = poly_mul_big(&lift(&big_fp), &galois_conjugate(g));
    let mut big_g = poly_mul_big(&lift(&big_gp), &galois_conjugate(f));
    reduce(f, g, &mut big_f, &mut big_g);
    Some((big_f, big_g))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_equation_holds(f: &[i8], g: &[i8], big_f: &[i8], big_g: &[i8]) -> bool {
        let n = f.len();
        let fb: Vec<BigInt> = f.iter().map(|&x| BigInt::from(x)).collect();
        let gb: Vec<BigInt> = g.iter().map(|&x| BigInt::from(x)).collect();
        let fbig: Vec<BigInt> = big_f.iter().map(|&x| BigInt::from(x)).collect();
        let gbig: Vec<BigInt> = big_g.iter().map(|&x| BigInt::from(x)).collect();
        let mut lhs = poly_mul_big(&fb, &gbig);
        let rhs = poly_mul_big(&gb, &fbig);
        for (a, b) in lhs.iter_mut().zip(&rhs) {
            *a -= b;
        }
        lhs[0] == BigInt::from(Q) && lhs[1..].iter().all(|x| x.is_zero())
    }

    #[test]
    fn solver_satisfies_the_ntru_equation() {
        for logn in 2..=5 {
            let mut prng = Prng::from_seed(format!("ntru solve {logn}").as_bytes());
            let (f, g, big_f, big_g, _h) = generate(logn, &mut prng);
            assert!(
                key_equation_holds(&f, &g, &big_f, &big_g),
                "logn={logn}"
            );
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let run = || {
            let mut prng = Prng::from_seed(b"deterministic keygen");
            generate(4, &mut prng)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn karatsuba_matches_schoolbook() {
        let a: Vec<BigInt> = (0..64).map(|i| BigInt::from(i * 7 - 100)).collect();
        let b: Vec<BigInt> = (0..64).map(|i| BigInt::from(-3 * i + 40)).collect();
        let got = karatsuba(&a, &b);
        let mut want = vec![BigInt::zero(); 128];
        for i in 0..64 {
            for j in 0..64 {
                want[i + j] += &a[i] * &b[j];
            }
        }
        assert_eq!(got, want);
    }

    #[test]
    fn field_norm_is_multiplicative() {
        let a: Vec<BigInt> = vec![3, -1, 4, 1, -5, 9, 2, -6]
            .into_iter()
            .map(BigInt::from)
            .collect();
        let b: Vec<BigInt> = vec![2, 7, -1, 8, 2, -8, 1, 8]
            .into_iter()
            .map(BigInt::from)
            .collect();
        let ab = poly_mul_big(&a, &b);
        let lhs = field_norm(&ab);
        let rhs = poly_mul_big(&field_norm(&a), &field_norm(&b));
        assert_eq!(lhs, rhs);
    }
}
