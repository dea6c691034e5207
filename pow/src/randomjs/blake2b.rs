//! Blake2b Primitives for RandomJS
//!
//! Provides the hash collaborator used by the PoW engine (unkeyed and keyed
//! BLAKE2b-256) and a stateful generator that produces deterministic random
//! values from a key. The generator drives program synthesis, so its output
//! sequence is part of the protocol.

use core::fmt;

use blake2::digest::consts::U32;
use blake2::digest::{Digest as _, Mac};
use blake2::{Blake2b512, Blake2bMac};

use crate::randomjs::error::{PowError, PowResult};

type Blake2b256 = blake2::Blake2b<U32>;

/// Size of keys and digests in bytes
pub const HASH_SIZE: usize = 32;

/// 256-bit hash output
pub type Digest = [u8; HASH_SIZE];

/// 256-bit key derived from a block template
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub [u8; HASH_SIZE]);

impl Key {
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Derive a key from an integer seed (used by the statistics mode)
    pub fn from_seed(seed: u64) -> Self {
        Key(blake2b_256(&seed.to_le_bytes()))
    }
}

impl From<Digest> for Key {
    fn from(bytes: Digest) -> Self {
        Key(bytes)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self)
    }
}

/// Hash collaborator consumed by the PoW engine
pub trait HashFunction {
    /// Hash instance bound to one key
    type Keyed: KeyedHash;

    /// Unkeyed 256-bit hash
    fn hash(&self, data: &[u8]) -> Digest;

    /// Initialise keyed mode for `key`
    fn keyed(&self, key: &Key) -> PowResult<Self::Keyed>;
}

/// Keyed hash bound to a single key
pub trait KeyedHash {
    fn digest(&self, data: &[u8]) -> Digest;
}

/// BLAKE2b-256, keyed mode via the BLAKE2 MAC construction
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake2bHash;

/// BLAKE2b-256 MAC state initialised with a key
#[derive(Clone)]
pub struct KeyedBlake2b {
    mac: Blake2bMac<U32>,
}

impl HashFunction for Blake2bHash {
    type Keyed = KeyedBlake2b;

    fn hash(&self, data: &[u8]) -> Digest {
        blake2b_256(data)
    }

    fn keyed(&self, key: &Key) -> PowResult<KeyedBlake2b> {
        let mac = Blake2bMac::<U32>::new_with_salt_and_personal(key.as_bytes(), &[], &[])
            .map_err(|_| PowError::KeyLength)?;
        Ok(KeyedBlake2b { mac })
    }
}

impl KeyedHash for KeyedBlake2b {
    fn digest(&self, data: &[u8]) -> Digest {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}

/// Hash with 256-bit output
pub fn blake2b_256(data: &[u8]) -> Digest {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Uniform random source consumed by the generator
pub trait RandomSource {
    /// Next 32 uniformly distributed bits
    fn next_u32(&mut self) -> u32;

    /// Next 64 uniformly distributed bits
    fn next_u64(&mut self) -> u64 {
        let lo = self.next_u32() as u64;
        let hi = self.next_u32() as u64;
        lo | (hi << 32)
    }

    /// Uniform double in `[0, 1)` built from 53 random bits
    fn gen_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform integer in `[0, n)`; returns 0 when `n == 0`
    fn gen_below(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.next_u32() % n
    }

    /// Uniform integer in `[lo, hi]`
    fn gen_range(&mut self, lo: i32, hi: i32) -> i32 {
        let span = (hi as i64 - lo as i64 + 1) as u64;
        (lo as i64 + (self.next_u64() % span) as i64) as i32
    }

    /// `true` with probability `p`
    fn gen_bool(&mut self, p: f64) -> bool {
        self.gen_f64() < p
    }
}

/// Key-seeded byte stream; the state is re-hashed once all 64 bytes are used
pub struct Blake2Generator {
    state: [u8; 64],
    position: usize,
}

impl Blake2Generator {
    pub fn new(seed: &[u8]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(seed);
        let state: [u8; 64] = hasher.finalize().into();
        Self { state, position: 0 }
    }

    /// Create a generator seeded from a PoW key
    pub fn from_key(key: &Key) -> Self {
        Self::new(key.as_bytes())
    }

    pub fn next_byte(&mut self) -> u8 {
        if self.position >= self.state.len() {
            self.rehash();
        }
        let byte = self.state[self.position];
        self.position += 1;
        byte
    }

    fn rehash(&mut self) {
        let mut hasher = Blake2b512::new();
        hasher.update(self.state);
        self.state = hasher.finalize().into();
        self.position = 0;
    }
}

impl RandomSource for Blake2Generator {
    fn next_u32(&mut self) -> u32 {
        let b0 = self.next_byte() as u32;
        let b1 = self.next_byte() as u32;
        let b2 = self.next_byte() as u32;
        let b3 = self.next_byte() as u32;
        b0 | (b1 << 8) | (b2 << 16) | (b3 << 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_deterministic() {
        let mut a = Blake2Generator::new(b"seed");
        let mut b = Blake2Generator::new(b"seed");
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
        let mut c = Blake2Generator::new(b"other seed");
        let first: Vec<u32> = (0..4).map(|_| a.next_u32()).collect();
        let other: Vec<u32> = (0..4).map(|_| c.next_u32()).collect();
        assert_ne!(first, other);
    }

    #[test]
    fn test_generator_ranges() {
        let mut gen = Blake2Generator::new(b"ranges");
        for _ in 0..1000 {
            let f = gen.gen_f64();
            assert!((0.0..1.0).contains(&f));
            assert!(gen.gen_below(7) < 7);
            let r = gen.gen_range(-3, 3);
            assert!((-3..=3).contains(&r));
        }
        assert_eq!(gen.gen_below(0), 0);
    }

    #[test]
    fn test_keyed_differs_from_unkeyed() {
        let hasher = Blake2bHash;
        let key = Key::from_seed(1);
        let keyed = hasher.keyed(&key).unwrap();
        let data = b"program output";
        assert_ne!(hasher.hash(data), keyed.digest(data));
        // Keyed state is reusable
        assert_eq!(keyed.digest(data), keyed.digest(data));
        let other = hasher.keyed(&Key::from_seed(2)).unwrap();
        assert_ne!(keyed.digest(data), other.digest(data));
    }

    #[test]
    fn test_key_display() {
        let key = Key([0xab; 32]);
        assert_eq!(key.to_string(), "ab".repeat(32));
    }
}
