//! Key and signature types with the interoperable byte encodings.

use rand::rngs::OsRng;
use rand::RngCore;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use thiserror::Error;

use crate::codec;
use crate::keygen;
use crate::rng::Prng;
use crate::sampler::SamplerContext;
use crate::sign;
use crate::zq;

/// Salt length prepended to the message before hashing to a point.
pub const NONCE_LEN: usize = 40;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FalconError {
    #[error("unsupported degree parameter")]
    InvalidLogn,
    #[error("byte length does not match any supported format")]
    BadEncodingLength,
    #[error("header byte does not match the expected format")]
    InvalidHeader,
    #[error("malformed bit-level payload")]
    BadEncoding,
    #[error("secret key cannot be completed")]
    BadSecretKey,
}

fn check_logn(logn: u32) -> Result<(), FalconError> {
    if (1..=10).contains(&logn) {
        Ok(())
    } else {
        Err(FalconError::InvalidLogn)
    }
}

/// Hash a salted message to a polynomial with coefficients in `[0, q)`,
/// by rejection over 16-bit chunks of a SHAKE-256 stream.
pub fn hash_to_point(nonce: &[u8], msg: &[u8], logn: u32) -> Vec<u16> {
    let n = 1usize << logn;
    let mut shake = Shake256::default();
    shake.update(nonce);
    shake.update(msg);
    let mut xof = shake.finalize_xof();
    let mut hm = Vec::with_capacity(n);
    while hm.len() < n {
        let mut b = [0u8; 2];
        xof.read(&mut b);
        let w = u16::from_be_bytes(b) as u32;
        if w < 61445 {
            hm.push((w % 12289) as u16);
        }
    }
    hm
}

/// NTRU secret basis `(f, g, F, G)`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SecretKey {
    logn: u32,
    f: Vec<i8>,
    g: Vec<i8>,
    big_f: Vec<i8>,
    big_g: Vec<i8>,
}

/// Public polynomial `h = g * f^-1 mod q`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PublicKey {
    logn: u32,
    h: Vec<u16>,
}

/// A salted compressed signature.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature {
    logn: u32,
    nonce: [u8; NONCE_LEN],
    s2: Vec<i16>,
}

impl SecretKey {
    /// Deterministic key generation from a seed.
    pub fn keygen_from_seed(logn: u32, seed: &[u8]) -> Result<(SecretKey, PublicKey), FalconError> {
        check_logn(logn)?;
        let mut prng = Prng::from_seed(seed);
        let (f, g, big_f, big_g, h) = keygen::generate(logn, &mut prng);
        Ok((
            SecretKey {
                logn,
                f,
                g,
                big_f,
                big_g,
            },
            PublicKey { logn, h },
        ))
    }

    /// Key generation from system entropy.
    pub fn generate(logn: u32) -> Result<(SecretKey, PublicKey), FalconError> {
        let mut seed = [0u8; 48];
        OsRng.fill_bytes(&mut seed);
        Self::keygen_from_seed(logn, &seed)
    }

    pub fn logn(&self) -> u32 {
        self.logn
    }

    /// Re-derive the public key from the basis.
    pub fn public_key(&self) -> Result<PublicKey, FalconError> {
        let h = zq::compute_public(&self.f, &self.g, self.logn)
            .ok_or(FalconError::BadSecretKey)?;
        Ok(PublicKey {
            logn: self.logn,
            h,
        })
    }

    /// Precompute the LDL tree for repeated signing.
    pub fn expand(&self) -> ExpandedKey {
        let mut data = vec![0.0f64; sign::expanded_key_len(self.logn)];
        sign::expand_private_key(&mut data, &self.f, &self.g, &self.big_f, &self.big_g, self.logn);
        ExpandedKey {
            logn: self.logn,
            data,
        }
    }

    /// Sign with a fresh random salt and sampler stream.
    pub fn sign(&self, msg: &[u8]) -> Signature {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        self.sign_with(msg, nonce, Prng::from_system_entropy())
    }

    /// Sign with caller-supplied salt and randomness; reproducible when
    /// both are fixed. Rebuilds the LDL decomposition on the fly.
    pub fn sign_with(&self, msg: &[u8], nonce: [u8; NONCE_LEN], prng: Prng) -> Signature {
        let logn = self.logn;
        let n = 1usize << logn;
        let hm = hash_to_point(&nonce, msg, logn);
        let mut spc = SamplerContext::new(logn, prng);
        let mut s2 = vec![0i16; n];
        let max_body = codec::signature_max_size(logn) - NONCE_LEN - 1;
        loop {
            sign::sign_dyn(
                &mut s2, &mut spc, &self.f, &self.g, &self.big_f, &self.big_g, &hm, logn,
            );
            if codec::comp_encode(&s2, max_body).is_some() {
                break;
            }
            log::trace!("signature does not fit the compressed format, resampling");
        }
        Signature {
            logn,
            nonce,
            s2,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let bits = codec::MAX_FG_BITS[self.logn as usize];
        let mut out = Vec::with_capacity(codec::private_key_size(self.logn));
        out.push(0x50 + self.logn as u8);
        // widths are fixed per degree, so the three encodings cannot fail
        out.extend(codec::trim_i8_encode(&self.f, bits).expect("f fits its trimmed width"));
        out.extend(codec::trim_i8_encode(&self.g, bits).expect("g fits its trimmed width"));
        out.extend(
            codec::trim_i8_encode(&self.big_f, codec::MAX_FG_BIG_BITS)
                .expect("F fits eight bits"),
        );
        out
    }

    /// Decode `(f, g, F)` and complete the basis with
    /// `G = g * F / f mod q`.
    pub fn from_bytes(bytes: &[u8]) -> Result<SecretKey, FalconError> {
        let header = *bytes.first().ok_or(FalconError::BadEncodingLength)?;
        if header & 0xF0 != 0x50 {
            return Err(FalconError::InvalidHeader);
        }
        let logn = (header & 0x0F) as u32;
        check_logn(logn)?;
        if bytes.len() != codec::private_key_size(logn) {
            return Err(FalconError::BadEncodingLength);
        }
        let n = 1usize << logn;
        let bits = codec::MAX_FG_BITS[logn as usize];
        let fg_len = (n * bits as usize + 7) / 8;
        let big_len = (n * codec::MAX_FG_BIG_BITS as usize + 7) / 8;
        let body = &bytes[1..];
        let f = codec::trim_i8_decode(&body[..fg_len], n, bits).ok_or(FalconError::BadEncoding)?;
        let g = codec::trim_i8_decode(&body[fg_len..2 * fg_len], n, bits)
            .ok_or(FalconError::BadEncoding)?;
        let big_f =
            codec::trim_i8_decode(&body[2 * fg_len..2 * fg_len + big_len], n, codec::MAX_FG_BIG_BITS)
                .ok_or(FalconError::BadEncoding)?;
        let big_g =
            zq::complete_private(&f, &g, &big_f, logn).ok_or(FalconError::BadSecretKey)?;
        Ok(SecretKey {
            logn,
            f,
            g,
            big_f,
            big_g,
        })
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        for x in self
            .f
            .iter_mut()
            .chain(self.g.iter_mut())
            .chain(self.big_f.iter_mut())
            .chain(self.big_g.iter_mut())
        {
            *x = 0;
        }
    }
}

/// Expanded form of a secret key: the FFT basis and the normalized LDL
/// tree, ready for the tree-walk signer.
pub struct ExpandedKey {
    logn: u32,
    data: Vec<f64>,
}

impl ExpandedKey {
    pub fn logn(&self) -> u32 {
        self.logn
    }

    /// Sign using the precomputed tree.
    pub fn sign(&self, msg: &[u8]) -> Signature {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        self.sign_with(msg, nonce, Prng::from_system_entropy())
    }

    pub fn sign_with(&self, msg: &[u8], nonce: [u8; NONCE_LEN], prng: Prng) -> Signature {
        let logn = self.logn;
        let n = 1usize << logn;
        let hm = hash_to_point(&nonce, msg, logn);
        let mut spc = SamplerContext::new(logn, prng);
        let mut s2 = vec![0i16; n];
        let max_body = codec::signature_max_size(logn) - NONCE_LEN - 1;
        loop {
            sign::sign_tree(&mut s2, &mut spc, &self.data, &hm, logn);
            if codec::comp_encode(&s2, max_body).is_some() {
                break;
            }
            log::trace!("signature does not fit the compressed format, resampling");
        }
        Signature {
            logn,
            nonce,
            s2,
        }
    }
}

impl Drop for ExpandedKey {
    fn drop(&mut self) {
        for x in self.data.iter_mut() {
            *x = 0.0;
        }
    }
}

impl PublicKey {
    pub fn logn(&self) -> u32 {
        self.logn
    }

    pub fn coefficients(&self) -> &[u16] {
        &self.h
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(codec::public_key_size(self.logn));
        out.push(self.logn as u8);
        out.extend(codec::modq_encode(&self.h).expect("coefficients are reduced mod q"));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<PublicKey, FalconError> {
        let header = *bytes.first().ok_or(FalconError::BadEncodingLength)?;
        if header & 0xF0 != 0x00 {
            return Err(FalconError::InvalidHeader);
        }
        let logn = (header & 0x0F) as u32;
        check_logn(logn)?;
        if bytes.len() != codec::public_key_size(logn) {
            return Err(FalconError::BadEncodingLength);
        }
        let h = codec::modq_decode(&bytes[1..], 1usize << logn).ok_or(FalconError::BadEncoding)?;
        Ok(PublicKey { logn, h })
    }
}

impl Signature {
    pub fn logn(&self) -> u32 {
        self.logn
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn s2(&self) -> &[i16] {
        &self.s2
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let max_body = codec::signature_max_size(self.logn) - NONCE_LEN - 1;
        let body = codec::comp_encode(&self.s2, max_body)
            .expect("accepted signatures fit the compressed format");
        let mut out = Vec::with_capacity(1 + NONCE_LEN + body.len());
        out.push(0x30 + self.logn as u8);
        out.extend_from_slice(&self.nonce);
        out.extend(body);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Signature, FalconError> {
        let header = *bytes.first().ok_or(FalconError::BadEncodingLength)?;
        if header & 0xF0 != 0x30 {
            return Err(FalconError::InvalidHeader);
        }
        let logn = (header & 0x0F) as u32;
        check_logn(logn)?;
        if bytes.len() < 1 + NONCE_LEN + 1 || bytes.len() > codec::signature_max_size(logn) {
            return Err(FalconError::BadEncodingLength);
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[1..1 + NONCE_LEN]);
        let s2 = codec::comp_decode(&bytes[1 + NONCE_LEN..], 1usize << logn)
            .ok_or(FalconError::BadEncoding)?;
        Ok(Signature { logn, nonce, s2 })
    }
}

/// Check a signature: recompute `s1 = hm - s2 * h` and test the aggregate
/// squared norm against the degree bound.
pub fn verify(pk: &PublicKey, msg: &[u8], sig: &Signature) -> bool {
    if pk.logn != sig.logn {
        return false;
    }
    let hm = hash_to_point(&sig.nonce, msg, pk.logn);
    let s1 = zq::recover_s1(&hm, &sig.s2, &pk.h, pk.logn);
    zq::is_short(&s1, &sig.s2, pk.logn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_nonce(tag: u8) -> [u8; NONCE_LEN] {
        [tag; NONCE_LEN]
    }

    #[test]
    fn hash_to_point_is_reduced_and_deterministic() {
        let a = hash_to_point(&fixed_nonce(1), b"message", 4);
        let b = hash_to_point(&fixed_nonce(1), b"message", 4);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.iter().all(|&x| x < 12289));
        let c = hash_to_point(&fixed_nonce(2), b"message", 4);
        assert_ne!(a, c);
    }

    #[test]
    fn sign_and_verify_roundtrip_small_degree() {
        let (sk, pk) = SecretKey::keygen_from_seed(4, b"roundtrip seed").unwrap();
        let msg = b"attack at dawn";
        let sig = sk.sign_with(msg, fixed_nonce(7), Prng::from_seed(b"sig rng"));
        assert!(verify(&pk, msg, &sig));
        assert!(!verify(&pk, b"attack at dusk", &sig));
    }

    #[test]
    fn tree_signer_matches_verifier_too() {
        let (sk, pk) = SecretKey::keygen_from_seed(4, b"tree signer seed").unwrap();
        let expanded = sk.expand();
        let msg = b"tree walk";
        let sig = expanded.sign_with(msg, fixed_nonce(9), Prng::from_seed(b"tree sig rng"));
        assert!(verify(&pk, msg, &sig));
    }

    #[test]
    fn signing_is_reproducible_for_fixed_randomness() {
        let (sk, _pk) = SecretKey::keygen_from_seed(4, b"repro seed").unwrap();
        let s1 = sk.sign_with(b"m", fixed_nonce(3), Prng::from_seed(b"r"));
        let s2 = sk.sign_with(b"m", fixed_nonce(3), Prng::from_seed(b"r"));
        assert_eq!(s1, s2);
    }

    #[test]
    fn secret_key_bytes_roundtrip() {
        let (sk, _pk) = SecretKey::keygen_from_seed(4, b"sk codec seed").unwrap();
        let bytes = sk.to_bytes();
        assert_eq!(bytes.len(), codec::private_key_size(4));
        let back = SecretKey::from_bytes(&bytes).unwrap();
        assert_eq!(sk, back);
    }

    #[test]
    fn public_key_bytes_roundtrip() {
        let (_sk, pk) = SecretKey::keygen_from_seed(4, b"pk codec seed").unwrap();
        let bytes = pk.to_bytes();
        assert_eq!(bytes.len(), codec::public_key_size(4));
        let back = PublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(pk, back);
    }

    #[test]
    fn signature_bytes_roundtrip() {
        let (sk, pk) = SecretKey::keygen_from_seed(4, b"sig codec seed").unwrap();
        let msg = b"serialize me";
        let sig = sk.sign_with(msg, fixed_nonce(5), Prng::from_seed(b"sig codec rng"));
        let bytes = sig.to_bytes();
        assert!(bytes.len() <= codec::signature_max_size(4));
        let back = Signature::from_bytes(&bytes).unwrap();
        assert_eq!(sig, back);
        assert!(verify(&pk, msg, &back));
    }

    #[test]
    fn malformed_encodings_are_rejected() {
        assert_eq!(
            PublicKey::from_bytes(&[]),
            Err(FalconError::BadEncodingLength)
        );
        assert_eq!(
            PublicKey::from_bytes(&[0x74; 10]),
            Err(FalconError::InvalidHeader)
        );
        assert_eq!(
            SecretKey::from_bytes(&[0x54; 3]).unwrap_err(),
            FalconError::BadEncodingLength
        );
        assert_eq!(
            Signature::from_bytes(&[0x34; 10]).unwrap_err(),
            FalconError::BadEncodingLength
        );
    }
}
