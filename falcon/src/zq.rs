//! Arithmetic in `Z_q[X]/(X^n + 1)` for `q = 12289`.
//!
//! Used on public data only: deriving the public key `h = g/f`, completing
//! a stored private key, and recomputing `s1` during verification. The
//! negacyclic NTT works for every supported degree since `2^11` divides
//! `q - 1 = 2^12 * 3`.

use crate::fpr::Q;

#[inline]
fn mq_add(a: u32, b: u32) -> u32 {
    (a + b) % Q
}

#[inline]
fn mq_sub(a: u32, b: u32) -> u32 {
    (a + Q - b) % Q
}

#[inline]
fn mq_mul(a: u32, b: u32) -> u32 {
    (a * b) % Q
}

fn mq_pow(mut base: u32, mut exp: u32) -> u32 {
    let mut acc = 1u32;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mq_mul(acc, base);
        }
        base = mq_mul(base, base);
        exp >>= 1;
    }
    acc
}

#[inline]
fn mq_inv(a: u32) -> u32 {
    mq_pow(a, Q - 2)
}

/// Smallest primitive `2n`-th root of unity mod q.
fn primitive_root(logn: u32) -> u32 {
    let order = 2u32 << logn;
    for candidate in 2..Q {
        let g = mq_pow(candidate, (Q - 1) / order);
        // order exactly 2n: g^n = -1
        if mq_pow(g, order >> 1) == Q - 1 {
            return g;
        }
    }
    unreachable!("q - 1 admits roots of order up to 2^12");
}

fn bit_reverse(x: usize, bits: u32) -> usize {
    x.reverse_bits() >> (usize::BITS - bits)
}

/// Forward negacyclic NTT, Cooley-Tukey with the root powers folded in.
pub fn ntt(a: &mut [u32], logn: u32) {
    let n = 1usize << logn;
    let psi = primitive_root(logn);
    let mut psi_rev = vec![0u32; n];
    for (i, slot) in psi_rev.iter_mut().enumerate() {
        *slot = mq_pow(psi, bit_reverse(i, logn) as u32);
    }

    let mut t = n;
    let mut m = 1usize;
    while m < n {
        t >>= 1;
        for i in 0..m {
            let s = psi_rev[m + i];
            let j1 = 2 * i * t;
            for j in j1..j1 + t {
                let u = a[j];
                let v = mq_mul(a[j + t], s);
                a[j] = mq_add(u, v);
                a[j + t] = mq_sub(u, v);
            }
        }
        m <<= 1;
    }
}

/// Inverse negacyclic NTT, Gentleman-Sande, including the `1/n` scaling.
pub fn intt(a: &mut [u32], logn: u32) {
    let n = 1usize << logn;
    let psi = primitive_root(logn);
    let ipsi = mq_inv(psi);
    let mut ipsi_rev = vec![0u32; n];
    for (i, slot) in ipsi_rev.iter_mut().enumerate() {
        *slot = mq_pow(ipsi, bit_reverse(i, logn) as u32);
    }

    let mut t = 1usize;
    let mut m = n;
    while m > 1 {
        let h = m >> 1;
        let mut j1 = 0;
        for i in 0..h {
            let s = ipsi_rev[h + i];
            for j in j1..j1 + t {
                let u = a[j];
                let v = a[j + t];
                a[j] = mq_add(u, v);
                a[j + t] = mq_mul(mq_sub(u, v), s);
            }
            j1 += t << 1;
        }
        t <<= 1;
        m = h;
    }
    let ni = mq_inv(n as u32);
    for x in a.iter_mut() {
        *x = mq_mul(*x, ni);
    }
}

/// Map a balanced small polynomial into `[0, q)`.
pub fn small_to_mq(f: &[i8]) -> Vec<u32> {
    f.iter()
        .map(|&x| (x as i32).rem_euclid(Q as i32) as u32)
        .collect()
}

/// Public key derivation: `h = g * f^-1 mod q`. Fails when `f` is not
/// invertible.
pub fn compute_public(f: &[i8], g: &[i8], logn: u32) -> Option<Vec<u16>> {
    let mut fq = small_to_mq(f);
    let mut gq = small_to_mq(g);
    ntt(&mut fq, logn);
    ntt(&mut gq, logn);
    if fq.iter().any(|&x| x == 0) {
        return None;
    }
    let mut h: Vec<u32> = fq
        .iter()
        .zip(&gq)
        .map(|(&fv, &gv)| mq_mul(gv, mq_inv(fv)))
        .collect();
    intt(&mut h, logn);
    Some(h.into_iter().map(|x| x as u16).collect())
}

/// Recover the last basis element from `(f, g, F)` through
/// `G = g * F / f mod q`; all coefficients of the true `G` are small, so
/// the balanced lift is exact.
pub fn complete_private(f: &[i8], g: &[i8], big_f: &[i8], logn: u32) -> Option<Vec<i8>> {
    let mut fq = small_to_mq(f);
    let mut gq = small_to_mq(g);
    let mut bfq = small_to_mq(big_f);
    ntt(&mut fq, logn);
    ntt(&mut gq, logn);
    ntt(&mut bfq, logn);
    if fq.iter().any(|&x| x == 0) {
        return None;
    }
    let mut bg: Vec<u32> = (0..fq.len())
        .map(|i| mq_mul(mq_mul(gq[i], bfq[i]), mq_inv(fq[i])))
        .collect();
    intt(&mut bg, logn);
    bg.into_iter()
        .map(|x| {
            let v = if x > Q / 2 { x as i32 - Q as i32 } else { x as i32 };
            if (-127..=127).contains(&v) {
                Some(v as i8)
            } else {
                None
            }
        })
        .collect()
}

/// Squared-norm acceptance test for a full `(s1, s2)` pair. The
/// accumulator saturates at `2^32 - 1` instead of branching, so the scan
/// always covers every coefficient.
pub fn is_short(s1: &[i16], s2: &[i16], logn: u32) -> bool {
    let mut sqn = 0u32;
    let mut ng = 0u32;
    for &v in s1.iter().chain(s2) {
        let z = v as i32;
        sqn = sqn.wrapping_add(z.wrapping_mul(z) as u32);
        ng |= sqn;
    }
    sqn |= (ng >> 31).wrapping_neg();
    sqn <= crate::fpr::L2_BOUND[logn as usize]
}

/// Same test when the `s1` half has already been accumulated into `sqn`
/// (saturation state carried in the top bit).
pub fn is_short_half(sqn: u32, s2: &[i16], logn: u32) -> bool {
    let mut sqn = sqn;
    let mut ng = (sqn >> 31).wrapping_neg();
    for &v in s2 {
        let z = v as i32;
        sqn = sqn.wrapping_add(z.wrapping_mul(z) as u32);
        ng |= sqn;
    }
    sqn |= (ng >> 31).wrapping_neg();
    sqn <= crate::fpr::L2_BOUND[logn as usize]
}

/// Verification-side recovery of `s1 = hm - s2 * h mod q`, balanced
/// representation.
pub fn recover_s1(hm: &[u16], s2: &[i16], h: &[u16], logn: u32) -> Vec<i16> {
    let mut s2q: Vec<u32> = s2
        .iter()
        .map(|&x| (x as i32).rem_euclid(Q as i32) as u32)
        .collect();
    let mut hq: Vec<u32> = h.iter().map(|&x| x as u32).collect();
    ntt(&mut s2q, logn);
    ntt(&mut hq, logn);
    for (a, b) in s2q.iter_mut().zip(&hq) {
        *a = mq_mul(*a, *b);
    }
    intt(&mut s2q, logn);
    hm.iter()
        .zip(&s2q)
        .map(|(&c, &p)| {
            let d = mq_sub(c as u32, p);
            if d > Q / 2 {
                (d as i32 - Q as i32) as i16
            } else {
                d as i16
            }
        })
        .collect()
}
