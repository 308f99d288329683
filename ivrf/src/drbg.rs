//! AES-256 CTR deterministic random bit generator (SP 800-90A profile)
//! and the AES-based seed expander.
//!
//! The generator state is the usual `(Key, V)` pair with a counter-mode
//! update after every read. Cloning the state gives the copy-then-advance
//! discipline used by evaluation: the caller's cursor stays put while a
//! local copy is consumed.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use thiserror::Error;

/// Seed material length for the generator.
pub const SEED_MATERIAL_LEN: usize = 48;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DrbgError {
    #[error("requested stream length must be below 2^32 bytes")]
    BadMaxLen,
    #[error("read would exceed the remaining stream reservation")]
    BadRequestLen,
}

fn aes256_ecb(key: &[u8; 32], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes256::new(GenericArray::from_slice(key));
    let mut b = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut b);
    let mut out = [0u8; 16];
    out.copy_from_slice(&b);
    out
}

fn increment_be(v: &mut [u8]) {
    for byte in v.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}

/// AES-256 CTR DRBG state.
#[derive(Clone)]
pub struct CtrDrbg {
    key: [u8; 32],
    v: [u8; 16],
    reseed_counter: u64,
}

impl CtrDrbg {
    /// Instantiate from 48 bytes of entropy, optionally XOR-masked with a
    /// personalization string.
    pub fn new(entropy: &[u8; SEED_MATERIAL_LEN], personalization: Option<&[u8; SEED_MATERIAL_LEN]>) -> Self {
        let mut seed_material = *entropy;
        if let Some(ps) = personalization {
            for (s, p) in seed_material.iter_mut().zip(ps) {
                *s ^= p;
            }
        }
        let mut drbg = CtrDrbg {
            key: [0u8; 32],
            v: [0u8; 16],
            reseed_counter: 1,
        };
        drbg.update(Some(&seed_material));
        drbg
    }

    fn update(&mut self, provided_data: Option<&[u8; SEED_MATERIAL_LEN]>) {
        let mut temp = [0u8; 48];
        for chunk in temp.chunks_exact_mut(16) {
            increment_be(&mut self.v);
            chunk.copy_from_slice(&aes256_ecb(&self.key, &self.v));
        }
        if let Some(data) = provided_data {
            for (t, d) in temp.iter_mut().zip(data) {
                *t ^= d;
            }
        }
        self.key.copy_from_slice(&temp[..32]);
        self.v.copy_from_slice(&temp[32..]);
    }

    /// Fill `out` with generator output and advance the state.
    pub fn fill_bytes(&mut self, out: &mut [u8]) {
        for chunk in out.chunks_mut(16) {
            increment_be(&mut self.v);
            let block = aes256_ecb(&self.key, &self.v);
            chunk.copy_from_slice(&block[..chunk.len()]);
        }
        self.update(None);
        self.reseed_counter += 1;
    }

    pub fn reseed_counter(&self) -> u64 {
        self.reseed_counter
    }
}

impl Drop for CtrDrbg {
    fn drop(&mut self) {
        self.key.fill(0);
        self.v.fill(0);
    }
}

/// AES-CTR expander for a bounded stream under a seed and diversifier.
#[derive(Debug)]
pub struct SeedExpander {
    key: [u8; 32],
    ctr: [u8; 16],
    buffer: [u8; 16],
    buffer_pos: usize,
    remaining: u64,
}

impl SeedExpander {
    pub fn new(seed: &[u8; 32], diversifier: &[u8; 8], max_len: u64) -> Result<Self, DrbgError> {
        if max_len >= 1 << 32 {
            return Err(DrbgError::BadMaxLen);
        }
        let mut ctr = [0u8; 16];
        ctr[..8].copy_from_slice(diversifier);
        let mut m = max_len;
        ctr[11] = (m % 256) as u8;
        m >>= 8;
        ctr[10] = (m % 256) as u8;
        m >>= 8;
        ctr[9] = (m % 256) as u8;
        m >>= 8;
        ctr[8] = (m % 256) as u8;
        Ok(SeedExpander {
            key: *seed,
            ctr,
            buffer: [0u8; 16],
            buffer_pos: 16,
            remaining: max_len,
        })
    }

    /// Produce the next `out.len()` bytes of the stream. The whole
    /// request must fit in the remaining reservation.
    pub fn expand(&mut self, out: &mut [u8]) -> Result<(), DrbgError> {
        if out.len() as u64 >= self.remaining {
            return Err(DrbgError::BadRequestLen);
        }
        self.remaining -= out.len() as u64;

        let mut offset = 0;
        while offset < out.len() {
            let available = 16 - self.buffer_pos;
            let need = out.len() - offset;
            if need <= available {
                out[offset..].copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + need]);
                self.buffer_pos += need;
                return Ok(());
            }
            out[offset..offset + available].copy_from_slice(&self.buffer[self.buffer_pos..]);
            offset += available;

            self.buffer = aes256_ecb(&self.key, &self.ctr);
            self.buffer_pos = 0;
            increment_be(&mut self.ctr[12..]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_known_answer() {
        let mut drbg = CtrDrbg::new(&[0u8; 48], None);
        let mut first = [0u8; 32];
        drbg.fill_bytes(&mut first);
        assert_eq!(
            hex::encode(first),
            "91618fe99a8f9420497b246f735b27a019078a9d3ca6b2a001aec0b9e07e680b"
        );
        let mut second = [0u8; 48];
        drbg.fill_bytes(&mut second);
        assert_eq!(
            hex::encode(second),
            "796732acba3efdf731bf7c242aeeddf5eba5b131da90e36af23a3bce9c7aa93a\
             4188096b95ff7a09e286fd3b6c8b0b6e"
        );
        assert_eq!(drbg.reseed_counter(), 3);
    }

    #[test]
    fn personalization_string_changes_the_stream() {
        let mut entropy = [0u8; 48];
        for (i, b) in entropy.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut drbg = CtrDrbg::new(&entropy, Some(&[0xAA; 48]));
        let mut out = [0u8; 20];
        drbg.fill_bytes(&mut out);
        assert_eq!(hex::encode(out), "6ea3686776336c1c1bb0fc1dcb0261187a0fb92d");

        let mut plain = CtrDrbg::new(&entropy, None);
        let mut out2 = [0u8; 20];
        plain.fill_bytes(&mut out2);
        assert_ne!(out, out2);
    }

    #[test]
    fn cloned_state_replays_the_stream() {
        let mut a = CtrDrbg::new(&[7u8; 48], None);
        let mut warmup = [0u8; 32];
        a.fill_bytes(&mut warmup);

        let mut b = a.clone();
        let mut out_a = [0u8; 64];
        let mut out_b = [0u8; 64];
        a.fill_bytes(&mut out_a);
        b.fill_bytes(&mut out_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn seed_expander_known_answer() {
        let mut seed = [0u8; 32];
        for (i, b) in seed.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut diversifier = [0u8; 8];
        for (i, b) in diversifier.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut se = SeedExpander::new(&seed, &diversifier, 1024).unwrap();
        let mut out = [0u8; 40];
        se.expand(&mut out).unwrap();
        assert_eq!(
            hex::encode(out),
            "18140818d4a0675a35a4cb4c5192566662908ff50441945e9c0ee745b2eb9ad81fac84b16e287a7e"
        );
        let mut more = [0u8; 5];
        se.expand(&mut more).unwrap();
        assert_eq!(hex::encode(more), "7b8aeee529");
    }

    #[test]
    fn seed_expander_reservation_is_enforced() {
        assert_eq!(
            SeedExpander::new(&[0; 32], &[0; 8], 1 << 32).unwrap_err(),
            DrbgError::BadMaxLen
        );
        let mut se = SeedExpander::new(&[0; 32], &[0; 8], 16).unwrap();
        let mut big = [0u8; 16];
        assert_eq!(se.expand(&mut big), Err(DrbgError::BadRequestLen));
        let mut ok = [0u8; 10];
        se.expand(&mut ok).unwrap();
        let mut too_much = [0u8; 6];
        assert_eq!(se.expand(&mut too_much), Err(DrbgError::BadRequestLen));
    }
}
