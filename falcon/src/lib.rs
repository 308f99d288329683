//! Falcon signatures over NTRU lattices.
//!
//! Signing samples a short lattice vector close to the hashed message by a
//! randomized nearest-plane walk over the LDL decomposition of the secret
//! basis, entirely in the FFT domain. Key generation solves the NTRU
//! equation `f*G - g*F = q` and is deterministic for a fixed seed, which
//! lets a caller re-derive one-time keys on demand.
//!
//! Degrees `2^1` through `2^10` are supported; byte encodings follow the
//! standard Falcon formats (897-byte public keys, 1281-byte private keys
//! and compressed signatures of at most 752 bytes at degree 512).

pub mod codec;
pub mod fft;
pub mod fpr;
mod keygen;
mod keys;
pub mod rng;
pub mod sampler;
mod sign;
pub mod zq;

pub use keys::{
    hash_to_point, verify, ExpandedKey, FalconError, PublicKey, SecretKey, Signature, NONCE_LEN,
};
