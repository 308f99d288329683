//! Signature generation: LDL tree construction over the secret basis and
//! the randomized nearest-plane walk that produces short lattice vectors.
//!
//! Two equivalent paths exist. The tree path precomputes the LDL tree
//! once (`expand_private_key`) and reuses it per signature; the dynamic
//! path rebuilds the decomposition on the fly from `(f, g, F, G)` and
//! trades time for memory. Both consume the integer sampler through the
//! same recursion order and yield statistically identical signatures.

use crate::fft::{
    fft, ifft, poly_add, poly_ldl_fft, poly_ldlmv_fft, poly_merge_fft, poly_mul_fft,
    poly_mulconst, poly_muladj_fft, poly_mulselfadj_fft, poly_neg, poly_split_fft, poly_sub,
};
use crate::fpr;
use crate::sampler::GaussianSampler;
use crate::zq;

/// Number of values in the LDL tree for degree `2^logn`.
///
/// A node stores one polynomial of its size and two half-size subtrees:
/// `s(0) = 1`, `s(logn) = 2^logn + 2*s(logn - 1)`.
pub(crate) fn treesize(logn: u32) -> usize {
    ((logn + 1) as usize) << logn
}

/// Offsets of the basis polynomials and the tree inside an expanded key.
pub(crate) fn skoff_b00(_logn: u32) -> usize {
    0
}
pub(crate) fn skoff_b01(logn: u32) -> usize {
    1 << logn
}
pub(crate) fn skoff_b10(logn: u32) -> usize {
    2 << logn
}
pub(crate) fn skoff_b11(logn: u32) -> usize {
    3 << logn
}
pub(crate) fn skoff_tree(logn: u32) -> usize {
    4 << logn
}

/// Total length of an expanded key.
pub(crate) fn expanded_key_len(logn: u32) -> usize {
    skoff_tree(logn) + treesize(logn)
}

/// Recursive tree construction. The Gram operands double as scratch and
/// are consumed.
fn ffldl_fft_inner(tree: &mut [f64], g0: &mut [f64], g1: &mut [f64], logn: u32, tmp: &mut [f64]) {
    let n = 1usize << logn;
    if n == 1 {
        tree[0] = g0[0];
        return;
    }
    let hn = n >> 1;

    // l10 goes into this node, d11 into tmp; d00 is g0 itself.
    poly_ldlmv_fft(tmp, &mut tree[..n], g0, g1, g0, logn);

    // d00 splits into g1, d11 splits into g0.
    {
        let (f0, f1) = g1.split_at_mut(hn);
        poly_split_fft(f0, f1, g0, logn);
    }
    {
        let d11 = tmp[..n].to_vec();
        let (f0, f1) = g0.split_at_mut(hn);
        poly_split_fft(f0, f1, &d11, logn);
    }

    let ts = treesize(logn - 1);
    {
        let (g1a, g1b) = g1.split_at_mut(hn);
        ffldl_fft_inner(&mut tree[n..n + ts], g1a, g1b, logn - 1, tmp);
    }
    {
        let (g0a, g0b) = g0.split_at_mut(hn);
        ffldl_fft_inner(&mut tree[n + ts..n + 2 * ts], g0a, g0b, logn - 1, tmp);
    }
}

/// Build the LDL tree of the auto-adjoint Gram matrix `(g00, g01, g11)`
/// given in FFT representation. `tree` must hold `treesize(logn)` values.
pub(crate) fn ffldl_fft(tree: &mut [f64], g00: &[f64], g01: &[f64], g11: &[f64], logn: u32) {
    let n = 1usize << logn;
    if n == 1 {
        tree[0] = g00[0];
        return;
    }
    let hn = n >> 1;

    let mut d11 = vec![0.0; n];
    poly_ldlmv_fft(&mut d11, &mut tree[..n], g00, g01, g11, logn);

    let mut s00 = vec![0.0; n];
    {
        let (f0, f1) = s00.split_at_mut(hn);
        poly_split_fft(f0, f1, g00, logn);
    }
    let mut s11 = vec![0.0; n];
    {
        let (f0, f1) = s11.split_at_mut(hn);
        poly_split_fft(f0, f1, &d11, logn);
    }

    let ts = treesize(logn - 1);
    let mut tmp = vec![0.0; n];
    {
        let (a, b) = s00.split_at_mut(hn);
        ffldl_fft_inner(&mut tree[n..n + ts], a, b, logn - 1, &mut tmp);
    }
    {
        let (a, b) = s11.split_at_mut(hn);
        ffldl_fft_inner(&mut tree[n + ts..n + 2 * ts], a, b, logn - 1, &mut tmp);
    }
}

/// Replace each leaf value `x` with `sqrt(x)/sigma`, the inverse of the
/// per-leaf deviation, so the sampler receives its `1/sigma` argument by
/// a plain multiply.
pub(crate) fn ffldl_binary_normalize(tree: &mut [f64], orig_logn: u32, logn: u32) {
    let n = 1usize << logn;
    if n == 1 {
        tree[0] = tree[0].sqrt() * fpr::INV_SIGMA[orig_logn as usize];
    } else {
        let ts = treesize(logn - 1);
        ffldl_binary_normalize(&mut tree[n..n + ts], orig_logn, logn - 1);
        ffldl_binary_normalize(&mut tree[n + ts..n + 2 * ts], orig_logn, logn - 1);
    }
}

fn smallints_to_fpr(t: &[i8]) -> Vec<f64> {
    t.iter().map(|&x| x as f64).collect()
}

/// Expand `(f, g, F, G)` into the FFT basis `B = [[g, -f], [G, -F]]`
/// followed by the normalized LDL tree, in one contiguous buffer.
pub(crate) fn expand_private_key(
    expanded: &mut [f64],
    f: &[i8],
    g: &[i8],
    big_f: &[i8],
    big_g: &[i8],
    logn: u32,
) {
    let n = 1usize << logn;
    debug_assert_eq!(expanded.len(), expanded_key_len(logn));

    let mut rf = smallints_to_fpr(f);
    let mut rg = smallints_to_fpr(g);
    let mut rbf = smallints_to_fpr(big_f);
    let mut rbg = smallints_to_fpr(big_g);
    fft(&mut rf, logn);
    fft(&mut rg, logn);
    fft(&mut rbf, logn);
    fft(&mut rbg, logn);
    poly_neg(&mut rf);
    poly_neg(&mut rbf);

    expanded[skoff_b00(logn)..skoff_b00(logn) + n].copy_from_slice(&rg);
    expanded[skoff_b01(logn)..skoff_b01(logn) + n].copy_from_slice(&rf);
    expanded[skoff_b10(logn)..skoff_b10(logn) + n].copy_from_slice(&rbg);
    expanded[skoff_b11(logn)..skoff_b11(logn) + n].copy_from_slice(&rbf);

    // Gram matrix G = B*adj(B), upper triangle only.
    let mut g00 = rg.clone();
    poly_mulselfadj_fft(&mut g00, logn);
    let mut t = rf.clone();
    poly_mulselfadj_fft(&mut t, logn);
    poly_add(&mut g00, &t);

    let mut g01 = rg.clone();
    poly_muladj_fft(&mut g01, &rbg, logn);
    let mut t = rf.clone();
    poly_muladj_fft(&mut t, &rbf, logn);
    poly_add(&mut g01, &t);

    let mut g11 = rbg;
    poly_mulselfadj_fft(&mut g11, logn);
    let mut t = rbf;
    poly_mulselfadj_fft(&mut t, logn);
    poly_add(&mut g11, &t);

    let tree = &mut expanded[skoff_tree(logn)..];
    ffldl_fft(tree, &g00, &g01, &g11, logn);
    ffldl_binary_normalize(tree, logn, logn);

    for x in g00.iter_mut().chain(g01.iter_mut()).chain(g11.iter_mut()) {
        *x = 0.0;
    }
}

/// Fast Fourier nearest-plane sampling over a precomputed tree. The last
/// two recursion levels are unrolled; the first split there uses the
/// `±1/sqrt(2)` rotation expressions and the second the combined
/// `1/sqrt(8)` form. Changing either changes rounding, and with it the
/// exact signatures produced from a fixed random stream.
pub(crate) fn ff_sampling_fft<S: GaussianSampler>(
    samp: &mut S,
    z0: &mut [f64],
    z1: &mut [f64],
    tree: &[f64],
    t0: &[f64],
    t1: &[f64],
    logn: u32,
) {
    if logn == 2 {
        let tree0 = &tree[4..8];
        let tree1 = &tree[8..12];

        // Split t1, sample both halves, merge back into z1.
        let a_re = t1[0];
        let a_im = t1[2];
        let b_re = t1[1];
        let b_im = t1[3];
        let c_re = a_re + b_re;
        let c_im = a_im + b_im;
        let mut w0 = fpr::half(c_re);
        let mut w1 = fpr::half(c_im);
        let c_re = a_re - b_re;
        let c_im = a_im - b_im;
        let mut w2 = fpr::half(c_re * fpr::INVSQRT2 - c_im * (-fpr::INVSQRT2));
        let mut w3 = fpr::half(c_re * (-fpr::INVSQRT2) + c_im * fpr::INVSQRT2);

        let x0 = w2;
        let x1 = w3;
        let sigma = tree1[3];
        w2 = samp.sample(x0, sigma) as f64;
        w3 = samp.sample(x1, sigma) as f64;
        let a_re = x0 - w2;
        let a_im = x1 - w3;
        let b_re = tree1[0];
        let b_im = tree1[1];
        let c_re = a_re * b_re - a_im * b_im;
        let c_im = a_re * b_im + a_im * b_re;
        let x0 = c_re + w0;
        let x1 = c_im + w1;
        let sigma = tree1[2];
        w0 = samp.sample(x0, sigma) as f64;
        w1 = samp.sample(x1, sigma) as f64;

        let a_re = w0;
        let a_im = w1;
        let b_re = w2;
        let b_im = w3;
        let c_re = b_re * fpr::INVSQRT2 - b_im * fpr::INVSQRT2;
        let c_im = b_re * fpr::INVSQRT2 + b_im * fpr::INVSQRT2;
        z1[0] = a_re + c_re;
        z1[2] = a_im + c_im;
        z1[1] = a_re - c_re;
        z1[3] = a_im - c_im;
        let (zw0, zw1, zw2, zw3) = (z1[0], z1[1], z1[2], z1[3]);

        // tb0 = t0 + (t1 - z1) * l10
        let w0 = t1[0] - zw0;
        let w1 = t1[1] - zw1;
        let w2 = t1[2] - zw2;
        let w3 = t1[3] - zw3;

        let a_re = w0;
        let a_im = w2;
        let b_re = tree[0];
        let b_im = tree[2];
        let w0 = a_re * b_re - a_im * b_im;
        let w2 = a_re * b_im + a_im * b_re;
        let a_re = w1;
        let a_im = w3;
        let b_re = tree[1];
        let b_im = tree[3];
        let w1 = a_re * b_re - a_im * b_im;
        let w3 = a_re * b_im + a_im * b_re;

        let w0 = w0 + t0[0];
        let w1 = w1 + t0[1];
        let w2 = w2 + t0[2];
        let w3 = w3 + t0[3];

        // Second half, on tb0.
        let a_re = w0;
        let a_im = w2;
        let b_re = w1;
        let b_im = w3;
        let c_re = a_re + b_re;
        let c_im = a_im + b_im;
        let mut w0 = fpr::half(c_re);
        let mut w1 = fpr::half(c_im);
        let c_re = a_re - b_re;
        let c_im = a_im - b_im;
        let mut w2 = (c_re + c_im) * fpr::INVSQRT8;
        let mut w3 = (c_im - c_re) * fpr::INVSQRT8;

        let x0 = w2;
        let x1 = w3;
        let sigma = tree0[3];
        let y0 = samp.sample(x0, sigma) as f64;
        let y1 = samp.sample(x1, sigma) as f64;
        w2 = y0;
        w3 = y1;
        let a_re = x0 - y0;
        let a_im = x1 - y1;
        let b_re = tree0[0];
        let b_im = tree0[1];
        let c_re = a_re * b_re - a_im * b_im;
        let c_im = a_re * b_im + a_im * b_re;
        let x0 = c_re + w0;
        let x1 = c_im + w1;
        let sigma = tree0[2];
        w0 = samp.sample(x0, sigma) as f64;
        w1 = samp.sample(x1, sigma) as f64;

        let a_re = w0;
        let a_im = w1;
        let b_re = w2;
        let b_im = w3;
        let c_re = (b_re - b_im) * fpr::INVSQRT2;
        let c_im = (b_re + b_im) * fpr::INVSQRT2;
        z0[0] = a_re + c_re;
        z0[2] = a_im + c_im;
        z0[1] = a_re - c_re;
        z0[3] = a_im - c_im;
        return;
    }

    if logn == 1 {
        let x0 = t1[0];
        let x1 = t1[1];
        let sigma = tree[3];
        let y0 = samp.sample(x0, sigma) as f64;
        let y1 = samp.sample(x1, sigma) as f64;
        z1[0] = y0;
        z1[1] = y1;
        let a_re = x0 - y0;
        let a_im = x1 - y1;
        let b_re = tree[0];
        let b_im = tree[1];
        let c_re = a_re * b_re - a_im * b_im;
        let c_im = a_re * b_im + a_im * b_re;
        let x0 = c_re + t0[0];
        let x1 = c_im + t0[1];
        let sigma = tree[2];
        z0[0] = samp.sample(x0, sigma) as f64;
        z0[1] = samp.sample(x1, sigma) as f64;
        return;
    }

    // General case, logn >= 3.
    let n = 1usize << logn;
    let hn = n >> 1;
    let tree0 = &tree[n..];
    let tree1 = &tree[n + treesize(logn - 1)..];

    // z1 half of the target first.
    let mut s0 = vec![0.0; hn];
    let mut s1 = vec![0.0; hn];
    poly_split_fft(&mut s0, &mut s1, t1, logn);
    let mut r0 = vec![0.0; hn];
    let mut r1 = vec![0.0; hn];
    ff_sampling_fft(samp, &mut r0, &mut r1, tree1, &s0, &s1, logn - 1);
    poly_merge_fft(z1, &r0, &r1, logn);

    // tb0 = t0 + (t1 - z1) * l10
    let mut tb0 = t1.to_vec();
    poly_sub(&mut tb0, z1);
    poly_mul_fft(&mut tb0, &tree[..n], logn);
    poly_add(&mut tb0, t0);

    // then the z0 half.
    poly_split_fft(&mut s0, &mut s1, &tb0, logn);
    ff_sampling_fft(samp, &mut r0, &mut r1, tree0, &s0, &s1, logn - 1);
    poly_merge_fft(z0, &r0, &r1, logn);
}

/// Nearest-plane sampling without a precomputed tree: the LDL
/// decomposition happens level by level, consuming the Gram operands.
/// Output overwrites `(t0, t1)`.
pub(crate) fn ff_sampling_fft_dyntree<S: GaussianSampler>(
    samp: &mut S,
    t0: &mut [f64],
    t1: &mut [f64],
    g00: &mut [f64],
    g01: &mut [f64],
    g11: &mut [f64],
    orig_logn: u32,
    logn: u32,
) {
    if logn == 0 {
        // Leaf: g00 holds the variance; normalize against sigma here.
        let leaf = g00[0].sqrt() * fpr::INV_SIGMA[orig_logn as usize];
        t0[0] = samp.sample(t0[0], leaf) as f64;
        t1[0] = samp.sample(t1[0], leaf) as f64;
        return;
    }

    let n = 1usize << logn;
    let hn = n >> 1;

    // In-place LDL: l10 lands in g01, d11 in g11, d00 is g00.
    poly_ldl_fft(g00, g01, g11, logn);

    // Each diagonal splits into a half-size quasi-cyclic Gram matrix.
    let mut d00_0 = vec![0.0; hn];
    let mut d00_1 = vec![0.0; hn];
    poly_split_fft(&mut d00_0, &mut d00_1, g00, logn);
    let mut d11_0 = vec![0.0; hn];
    let mut d11_1 = vec![0.0; hn];
    poly_split_fft(&mut d11_0, &mut d11_1, g11, logn);
    let l10 = g01[..n].to_vec();

    // Right subtree over the odd/even split of t1.
    let mut z1_0 = vec![0.0; hn];
    let mut z1_1 = vec![0.0; hn];
    poly_split_fft(&mut z1_0, &mut z1_1, t1, logn);
    let mut rg11 = d11_0.clone();
    ff_sampling_fft_dyntree(
        samp,
        &mut z1_0,
        &mut z1_1,
        &mut d11_0,
        &mut d11_1,
        &mut rg11,
        orig_logn,
        logn - 1,
    );
    let mut z1m = vec![0.0; n];
    poly_merge_fft(&mut z1m, &z1_0, &z1_1, logn);

    // tb0 = t0 + (t1 - z1) * l10; z1 replaces t1.
    let mut diff = t1.to_vec();
    poly_sub(&mut diff, &z1m);
    t1.copy_from_slice(&z1m);
    let mut prod = l10;
    poly_mul_fft(&mut prod, &diff, logn);
    poly_add(t0, &prod);

    // Left subtree on tb0.
    let mut z0_0 = vec![0.0; hn];
    let mut z0_1 = vec![0.0; hn];
    poly_split_fft(&mut z0_0, &mut z0_1, t0, logn);
    let mut lg11 = d00_0.clone();
    ff_sampling_fft_dyntree(
        samp,
        &mut z0_0,
        &mut z0_1,
        &mut d00_0,
        &mut d00_1,
        &mut lg11,
        orig_logn,
        logn - 1,
    );
    poly_merge_fft(t0, &z0_0, &z0_1, logn);
}

/// One signing attempt over an expanded key. On success `s2` receives the
/// short vector and `true` is returned; on failure nothing is written and
/// the caller retries with fresh sampler randomness. The hashed message
/// is left untouched either way.
pub(crate) fn do_sign_tree<S: GaussianSampler>(
    samp: &mut S,
    s2: &mut [i16],
    expanded: &[f64],
    hm: &[u16],
    logn: u32,
) -> bool {
    let n = 1usize << logn;
    let b00 = &expanded[skoff_b00(logn)..skoff_b00(logn) + n];
    let b01 = &expanded[skoff_b01(logn)..skoff_b01(logn) + n];
    let b10 = &expanded[skoff_b10(logn)..skoff_b10(logn) + n];
    let b11 = &expanded[skoff_b11(logn)..skoff_b11(logn) + n];
    let tree = &expanded[skoff_tree(logn)..];

    // Target vector (hm, 0) * B^-1, normalized by 1/q.
    let mut t0: Vec<f64> = hm.iter().map(|&x| x as f64).collect();
    fft(&mut t0, logn);
    let ni = fpr::INVERSE_OF_Q;
    let mut t1 = t0.clone();
    poly_mul_fft(&mut t1, b01, logn);
    poly_mulconst(&mut t1, -ni);
    poly_mul_fft(&mut t0, b11, logn);
    poly_mulconst(&mut t0, ni);

    let mut tx = vec![0.0; n];
    let mut ty = vec![0.0; n];
    ff_sampling_fft(samp, &mut tx, &mut ty, tree, &t0, &t1, logn);

    // Back to the lattice: (tx, ty) * B.
    t0.copy_from_slice(&tx);
    t1.copy_from_slice(&ty);
    poly_mul_fft(&mut tx, b00, logn);
    poly_mul_fft(&mut ty, b10, logn);
    poly_add(&mut tx, &ty);
    ty.copy_from_slice(&t0);
    poly_mul_fft(&mut ty, b01, logn);
    t0.copy_from_slice(&tx);
    poly_mul_fft(&mut t1, b11, logn);
    poly_add(&mut t1, &ty);

    ifft(&mut t0, logn);
    ifft(&mut t1, logn);

    let accepted = finish_signature(s2, hm, &t0, &t1, logn);
    for x in t0.iter_mut().chain(t1.iter_mut()).chain(tx.iter_mut()).chain(ty.iter_mut()) {
        *x = 0.0;
    }
    accepted
}

/// One signing attempt from the raw basis, using the dynamic LDL walk.
pub(crate) fn do_sign_dyn<S: GaussianSampler>(
    samp: &mut S,
    s2: &mut [i16],
    f: &[i8],
    g: &[i8],
    big_f: &[i8],
    big_g: &[i8],
    hm: &[u16],
    logn: u32,
) -> bool {
    // Basis B = [[g, -f], [G, -F]] in FFT representation.
    let mut b00 = smallints_to_fpr(g);
    let mut b01 = smallints_to_fpr(f);
    let mut b10 = smallints_to_fpr(big_g);
    let mut b11 = smallints_to_fpr(big_f);
    fft(&mut b01, logn);
    fft(&mut b00, logn);
    fft(&mut b11, logn);
    fft(&mut b10, logn);
    poly_neg(&mut b01);
    poly_neg(&mut b11);

    // Gram matrix, upper triangle.
    let mut g00 = b00.clone();
    poly_mulselfadj_fft(&mut g00, logn);
    let mut t = b01.clone();
    poly_mulselfadj_fft(&mut t, logn);
    poly_add(&mut g00, &t);

    let mut g01 = b00.clone();
    poly_muladj_fft(&mut g01, &b10, logn);
    let mut t = b01.clone();
    poly_muladj_fft(&mut t, &b11, logn);
    poly_add(&mut g01, &t);

    let mut g11 = b10.clone();
    poly_mulselfadj_fft(&mut g11, logn);
    let mut t = b11.clone();
    poly_mulselfadj_fft(&mut t, logn);
    poly_add(&mut g11, &t);

    // Target vector (hm, 0) * B^-1.
    let mut t0: Vec<f64> = hm.iter().map(|&x| x as f64).collect();
    fft(&mut t0, logn);
    let ni = fpr::INVERSE_OF_Q;
    let mut t1 = t0.clone();
    poly_mul_fft(&mut t1, &b01, logn);
    poly_mulconst(&mut t1, -ni);
    poly_mul_fft(&mut t0, &b11, logn);
    poly_mulconst(&mut t0, ni);

    ff_sampling_fft_dyntree(
        samp, &mut t0, &mut t1, &mut g00, &mut g01, &mut g11, logn, logn,
    );

    // The basis was kept around, so the lattice point follows directly.
    let mut tx = t0.clone();
    poly_mul_fft(&mut tx, &b00, logn);
    let mut ty = t1.clone();
    poly_mul_fft(&mut ty, &b10, logn);
    poly_add(&mut tx, &ty);
    ty.copy_from_slice(&t0);
    poly_mul_fft(&mut ty, &b01, logn);
    let mut s0 = tx;
    poly_mul_fft(&mut t1, &b11, logn);
    poly_add(&mut t1, &ty);

    ifft(&mut s0, logn);
    ifft(&mut t1, logn);

    let accepted = finish_signature(s2, hm, &s0, &t1, logn);
    for x in s0
        .iter_mut()
        .chain(t1.iter_mut())
        .chain(t0.iter_mut())
        .chain(ty.iter_mut())
        .chain(b00.iter_mut())
        .chain(b01.iter_mut())
        .chain(b10.iter_mut())
        .chain(b11.iter_mut())
        .chain(g00.iter_mut())
        .chain(g01.iter_mut())
        .chain(g11.iter_mut())
    {
        *x = 0.0;
    }
    accepted
}

/// Round the sampled point, derive `(s1, s2)` and keep `s2` only when the
/// aggregate vector is short enough. The squared norm accumulates on 32
/// bits with saturation.
fn finish_signature(s2: &mut [i16], hm: &[u16], t0: &[f64], t1: &[f64], logn: u32) -> bool {
    let n = 1usize << logn;
    let mut sqn = 0u32;
    let mut ng = 0u32;
    for u in 0..n {
        let z = (hm[u] as i32).wrapping_sub(fpr::rint(t0[u]) as i32);
        sqn = sqn.wrapping_add(z.wrapping_mul(z) as u32);
        ng |= sqn;
    }
    sqn |= (ng >> 31).wrapping_neg();

    let s2tmp: Vec<i16> = t1.iter().map(|&x| (-fpr::rint(x)) as i16).collect();
    if zq::is_short_half(sqn, &s2tmp, logn) {
        s2.copy_from_slice(&s2tmp);
        return true;
    }
    false
}

/// Retry loop around [`do_sign_tree`]. The sampler context keeps its
/// random stream across attempts.
pub(crate) fn sign_tree<S: GaussianSampler>(
    sig: &mut [i16],
    samp: &mut S,
    expanded: &[f64],
    hm: &[u16],
    logn: u32,
) {
    let mut attempts = 0u32;
    while !do_sign_tree(samp, sig, expanded, hm, logn) {
        attempts += 1;
    }
    if attempts > 0 {
        log::trace!("signature accepted after {attempts} rejected attempt(s)");
    }
}

/// Retry loop around [`do_sign_dyn`].
pub(crate) fn sign_dyn<S: GaussianSampler>(
    sig: &mut [i16],
    samp: &mut S,
    f: &[i8],
    g: &[i8],
    big_f: &[i8],
    big_g: &[i8],
    hm: &[u16],
    logn: u32,
) {
    let mut attempts = 0u32;
    while !do_sign_dyn(samp, sig, f, g, big_f, big_g, hm, logn) {
        attempts += 1;
    }
    if attempts > 0 {
        log::trace!("signature accepted after {attempts} rejected attempt(s)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen;
    use crate::rng::Prng;

    /// Deterministic stand-in for the integer sampler: plain rounding.
    struct RoundingStub;

    impl GaussianSampler for RoundingStub {
        fn sample(&mut self, mu: f64, _isigma: f64) -> i32 {
            crate::fpr::rint(mu) as i32
        }
    }

    fn gram_of(basis: &[Vec<f64>; 4], logn: u32) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let (b00, b01, b10, b11) = (&basis[0], &basis[1], &basis[2], &basis[3]);
        let mut g00 = b00.clone();
        poly_mulselfadj_fft(&mut g00, logn);
        let mut t = b01.clone();
        poly_mulselfadj_fft(&mut t, logn);
        poly_add(&mut g00, &t);
        let mut g01 = b00.clone();
        poly_muladj_fft(&mut g01, b10, logn);
        let mut t = b01.clone();
        poly_muladj_fft(&mut t, b11, logn);
        poly_add(&mut g01, &t);
        let mut g11 = b10.clone();
        poly_mulselfadj_fft(&mut g11, logn);
        let mut t = b11.clone();
        poly_mulselfadj_fft(&mut t, logn);
        poly_add(&mut g11, &t);
        (g00, g01, g11)
    }

    fn fft_basis(f: &[i8], g: &[i8], big_f: &[i8], big_g: &[i8], logn: u32) -> [Vec<f64>; 4] {
        let mut b00 = smallints_to_fpr(g);
        let mut b01 = smallints_to_fpr(f);
        let mut b10 = smallints_to_fpr(big_g);
        let mut b11 = smallints_to_fpr(big_f);
        fft(&mut b00, logn);
        fft(&mut b01, logn);
        fft(&mut b10, logn);
        fft(&mut b11, logn);
        poly_neg(&mut b01);
        poly_neg(&mut b11);
        [b00, b01, b10, b11]
    }

    #[test]
    fn treesize_matches_recurrence() {
        assert_eq!(treesize(0), 1);
        for logn in 1..=10 {
            assert_eq!(
                treesize(logn),
                (1usize << logn) + 2 * treesize(logn - 1)
            );
        }
    }

    #[test]
    fn ldl_tree_build_is_bit_reproducible() {
        let logn = 4;
        let mut prng = Prng::from_seed(b"ldl determinism");
        let (f, g, big_f, big_g, _h) = keygen::generate(logn, &mut prng);
        let basis = fft_basis(&f, &g, &big_f, &big_g, logn);
        let (g00, g01, g11) = gram_of(&basis, logn);

        let build = || {
            let mut tree = vec![0.0f64; treesize(logn)];
            ffldl_fft(&mut tree, &g00, &g01, &g11, logn);
            ffldl_binary_normalize(&mut tree, logn, logn);
            tree
        };
        let t1 = build();
        let t2 = build();
        let bits1: Vec<u64> = t1.iter().map(|x| x.to_bits()).collect();
        let bits2: Vec<u64> = t2.iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits1, bits2);
    }

    #[test]
    fn normalized_leaves_are_positive_and_finite() {
        let logn = 5;
        let mut prng = Prng::from_seed(b"ldl leaves");
        let (f, g, big_f, big_g, _h) = keygen::generate(logn, &mut prng);
        let mut expanded = vec![0.0f64; expanded_key_len(logn)];
        expand_private_key(&mut expanded, &f, &g, &big_f, &big_g, logn);

        // collect leaves by walking the heap layout
        fn leaves(tree: &[f64], logn: u32, out: &mut Vec<f64>) {
            let n = 1usize << logn;
            if n == 1 {
                out.push(tree[0]);
                return;
            }
            let ts = treesize(logn - 1);
            leaves(&tree[n..n + ts], logn - 1, out);
            leaves(&tree[n + ts..n + 2 * ts], logn - 1, out);
        }
        let mut values = Vec::new();
        leaves(&expanded[skoff_tree(logn)..], logn, &mut values);
        assert_eq!(values.len(), 1 << logn);
        for v in values {
            assert!(v.is_finite() && v > 0.0, "leaf {v}");
        }
    }

    #[test]
    fn tree_walk_and_dynamic_walk_agree_with_a_deterministic_sampler() {
        let logn = 4;
        let n = 1usize << logn;
        let mut prng = Prng::from_seed(b"walk agreement");
        let (f, g, big_f, big_g, _h) = keygen::generate(logn, &mut prng);

        let mut expanded = vec![0.0f64; expanded_key_len(logn)];
        expand_private_key(&mut expanded, &f, &g, &big_f, &big_g, logn);

        let hm: Vec<u16> = (0..n).map(|i| ((i * 2654 + 17) % 12289) as u16).collect();

        let mut s2_tree = vec![0i16; n];
        let ok_tree = do_sign_tree(&mut RoundingStub, &mut s2_tree, &expanded, &hm, logn);

        let mut s2_dyn = vec![0i16; n];
        let ok_dyn = do_sign_dyn(
            &mut RoundingStub,
            &mut s2_dyn,
            &f,
            &g,
            &big_f,
            &big_g,
            &hm,
            logn,
        );

        assert_eq!(ok_tree, ok_dyn);
        if ok_tree {
            assert_eq!(s2_tree, s2_dyn);
        }
    }

    #[test]
    fn expanded_key_layout_offsets() {
        let logn = 6;
        assert_eq!(skoff_b01(logn), 64);
        assert_eq!(skoff_b10(logn), 128);
        assert_eq!(skoff_b11(logn), 192);
        assert_eq!(skoff_tree(logn), 256);
        assert_eq!(expanded_key_len(logn), 256 + treesize(logn));
    }
}
