//! FFT on real polynomials modulo `X^n + 1`.
//!
//! A polynomial of length `n = 2^logn` is evaluated at one primitive
//! `2n`-th root of unity out of each conjugate pair, which gives `n/2`
//! complex values. The storage convention keeps real parts in the first
//! half of the slice and imaginary parts in the second half, so a length-n
//! slice holds a full FFT image and every operation below works on that
//! split layout in place.
//!
//! The roots are organized as a heap: node 1 is `i`, and the children of
//! node `k` are the two square roots of its value (`G[2k]^2 = G[k]`,
//! `G[2k+1]^2 = -G[k]`). A size-n image pairs slots `(2u, 2u+1)` under the
//! roots `±G[n/2 + u]`, which is what `poly_split_fft` and
//! `poly_merge_fft` exploit.

use std::sync::OnceLock;

/// Largest supported degree parameter.
pub const MAX_LOGN: u32 = 10;

static ROOTS: OnceLock<Vec<(f64, f64)>> = OnceLock::new();

/// Heap-indexed table of roots of unity, `G[k] = exp(i * angle[k])` with
/// `angle[1] = pi/2`, `angle[2k] = angle[k]/2`, `angle[2k+1] = angle[k]/2 + pi/2`.
fn roots() -> &'static [(f64, f64)] {
    ROOTS.get_or_init(|| {
        let len = 1usize << MAX_LOGN;
        let mut angle = vec![0.0f64; len];
        angle[1] = std::f64::consts::FRAC_PI_2;
        for k in 2..len {
            angle[k] = angle[k >> 1] * 0.5;
            if k & 1 == 1 {
                angle[k] += std::f64::consts::FRAC_PI_2;
            }
        }
        angle.iter().map(|&a| (a.cos(), a.sin())).collect()
    })
}

/// In-place FFT: coefficients to the split complex layout.
pub fn fft(f: &mut [f64], logn: u32) {
    let n = 1usize << logn;
    debug_assert_eq!(f.len(), n);
    if n <= 2 {
        // A size-2 polynomial a + bX evaluated at i is a + b*i, which is
        // already the stored form.
        return;
    }
    let hn = n >> 1;
    let mut f0 = vec![0.0; hn];
    let mut f1 = vec![0.0; hn];
    for j in 0..hn {
        f0[j] = f[2 * j];
        f1[j] = f[2 * j + 1];
    }
    fft(&mut f0, logn - 1);
    fft(&mut f1, logn - 1);
    poly_merge_fft(f, &f0, &f1, logn);
}

/// In-place inverse FFT: split complex layout back to coefficients.
pub fn ifft(f: &mut [f64], logn: u32) {
    let n = 1usize << logn;
    debug_assert_eq!(f.len(), n);
    if n <= 2 {
        return;
    }
    let hn = n >> 1;
    let mut f0 = vec![0.0; hn];
    let mut f1 = vec![0.0; hn];
    poly_split_fft(&mut f0, &mut f1, f, logn);
    ifft(&mut f0, logn - 1);
    ifft(&mut f1, logn - 1);
    for j in 0..hn {
        f[2 * j] = f0[j];
        f[2 * j + 1] = f1[j];
    }
}

pub fn poly_add(a: &mut [f64], b: &[f64]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x += y;
    }
}

pub fn poly_sub(a: &mut [f64], b: &[f64]) {
    for (x, y) in a.iter_mut().zip(b) {
        *x -= y;
    }
}

pub fn poly_neg(a: &mut [f64]) {
    for x in a.iter_mut() {
        *x = -*x;
    }
}

pub fn poly_mulconst(a: &mut [f64], c: f64) {
    for x in a.iter_mut() {
        *x *= c;
    }
}

/// Pointwise product of two FFT images: `a <- a * b`.
pub fn poly_mul_fft(a: &mut [f64], b: &[f64], logn: u32) {
    let hn = (1usize << logn) >> 1;
    for u in 0..hn {
        let (a_re, a_im) = (a[u], a[u + hn]);
        let (b_re, b_im) = (b[u], b[u + hn]);
        a[u] = a_re * b_re - a_im * b_im;
        a[u + hn] = a_re * b_im + a_im * b_re;
    }
}

/// Pointwise product with the adjoint: `a <- a * conj(b)`.
pub fn poly_muladj_fft(a: &mut [f64], b: &[f64], logn: u32) {
    let hn = (1usize << logn) >> 1;
    for u in 0..hn {
        let (a_re, a_im) = (a[u], a[u + hn]);
        let (b_re, b_im) = (b[u], b[u + hn]);
        a[u] = a_re * b_re + a_im * b_im;
        a[u + hn] = a_im * b_re - a_re * b_im;
    }
}

/// `a <- conj(a)`: negate the imaginary half.
pub fn poly_adj_fft(a: &mut [f64], logn: u32) {
    let n = 1usize << logn;
    for x in a[n >> 1..n].iter_mut() {
        *x = -*x;
    }
}

/// `a <- a * conj(a)`. The result is real; the imaginary half is zeroed.
pub fn poly_mulselfadj_fft(a: &mut [f64], logn: u32) {
    let hn = (1usize << logn) >> 1;
    for u in 0..hn {
        let (a_re, a_im) = (a[u], a[u + hn]);
        a[u] = a_re * a_re + a_im * a_im;
        a[u + hn] = 0.0;
    }
}

#[inline]
fn fpc_div(a_re: f64, a_im: f64, b_re: f64, b_im: f64) -> (f64, f64) {
    let m = 1.0 / (b_re * b_re + b_im * b_im);
    (
        (a_re * b_re + a_im * b_im) * m,
        (a_im * b_re - a_re * b_im) * m,
    )
}

/// In-place LDL decomposition of the auto-adjoint matrix
/// `[[g00, g01], [adj(g01), g11]]`. On output `g01` holds `l10` and `g11`
/// holds `d11`; `d00` is the untouched `g00`.
pub fn poly_ldl_fft(g00: &[f64], g01: &mut [f64], g11: &mut [f64], logn: u32) {
    let hn = (1usize << logn) >> 1;
    for u in 0..hn {
        let (g00_re, g00_im) = (g00[u], g00[u + hn]);
        let (g01_re, g01_im) = (g01[u], g01[u + hn]);
        let (g11_re, g11_im) = (g11[u], g11[u + hn]);
        let (mu_re, mu_im) = fpc_div(g01_re, g01_im, g00_re, g00_im);
        let zo_re = mu_re * g01_re + mu_im * g01_im;
        let zo_im = mu_im * g01_re - mu_re * g01_im;
        g11[u] = g11_re - zo_re;
        g11[u + hn] = g11_im - zo_im;
        g01[u] = mu_re;
        g01[u + hn] = -mu_im;
    }
}

/// Same decomposition with out-of-place outputs `d11` and `l10`.
pub fn poly_ldlmv_fft(
    d11: &mut [f64],
    l10: &mut [f64],
    g00: &[f64],
    g01: &[f64],
    g11: &[f64],
    logn: u32,
) {
    let hn = (1usize << logn) >> 1;
    for u in 0..hn {
        let (g00_re, g00_im) = (g00[u], g00[u + hn]);
        let (g01_re, g01_im) = (g01[u], g01[u + hn]);
        let (g11_re, g11_im) = (g11[u], g11[u + hn]);
        let (mu_re, mu_im) = fpc_div(g01_re, g01_im, g00_re, g00_im);
        let zo_re = mu_re * g01_re + mu_im * g01_im;
        let zo_im = mu_im * g01_re - mu_re * g01_im;
        d11[u] = g11_re - zo_re;
        d11[u + hn] = g11_im - zo_im;
        l10[u] = mu_re;
        l10[u + hn] = -mu_im;
    }
}

/// Split a length-n FFT image into the images of the even and odd
/// sub-polynomials (`f = f0(X^2) + X*f1(X^2)`).
pub fn poly_split_fft(f0: &mut [f64], f1: &mut [f64], f: &[f64], logn: u32) {
    let n = 1usize << logn;
    let hn = n >> 1;
    let qn = hn >> 1;
    if logn == 1 {
        f0[0] = f[0];
        f1[0] = f[1];
        return;
    }
    let gm = roots();
    for u in 0..qn {
        let (a_re, a_im) = (f[(u << 1)], f[(u << 1) + hn]);
        let (b_re, b_im) = (f[(u << 1) + 1], f[(u << 1) + 1 + hn]);

        let (t_re, t_im) = (a_re + b_re, a_im + b_im);
        f0[u] = crate::fpr::half(t_re);
        f0[u + qn] = crate::fpr::half(t_im);

        let (t_re, t_im) = (a_re - b_re, a_im - b_im);
        let (g_re, g_im) = gm[hn + u];
        f1[u] = crate::fpr::half(t_re * g_re + t_im * g_im);
        f1[u + qn] = crate::fpr::half(t_im * g_re - t_re * g_im);
    }
}

/// Inverse of [`poly_split_fft`].
pub fn poly_merge_fft(f: &mut [f64], f0: &[f64], f1: &[f64], logn: u32) {
    let n = 1usize << logn;
    let hn = n >> 1;
    let qn = hn >> 1;
    if logn == 1 {
        f[0] = f0[0];
        f[1] = f1[0];
        return;
    }
    let gm = roots();
    for u in 0..qn {
        let (a_re, a_im) = (f0[u], f0[u + qn]);
        let (g_re, g_im) = gm[hn + u];
        let b_re = f1[u] * g_re - f1[u + qn] * g_im;
        let b_im = f1[u] * g_im + f1[u + qn] * g_re;
        f[u << 1] = a_re + b_re;
        f[(u << 1) + hn] = a_im + b_im;
        f[(u << 1) + 1] = a_re - b_re;
        f[(u << 1) + 1 + hn] = a_im - b_im;
    }
}
