//! Incremental verifiable random function over Falcon one-time keys.
//!
//! A short public root commits to `2^logn` leaves. Each leaf binds the
//! head of a length-`t` hash ladder to a deterministically derived
//! one-time Falcon public key; both are reproduced on demand from two
//! chained AES-CTR generators, so the evaluator keeps no long-lived
//! secrets beyond the generator cursors. An opening at time `(i, j)`
//! reveals the ladder at depth `j`, a fresh signature under the leaf's
//! one-time key and the sibling digests up to the root.

pub mod drbg;
pub mod merkle;
mod state;

pub use state::{
    derive_leaf_keypair, verify, Evaluation, Evaluator, IvrfParams, LAMBDA, MU_LEN, SEED_LEN,
};
