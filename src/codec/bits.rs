//! Fixed-width bitsets.

use std::fmt;

use super::{Category, KeyCodec, LexicalOrder, Scratch, ValueCodec};
use crate::error::CodecError;

/// `N` flags packed into `ceil(N / 8)` bytes.
///
/// Bit `i` lives in byte `i / 8` at position `i % 8`, so the in-memory form
/// is already the encoded form.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bitset<const N: usize> {
    bytes: Vec<u8>,
}

impl<const N: usize> Bitset<N> {
    /// Number of encoded bytes.
    pub const BYTES: usize = N.div_ceil(8);

    pub fn new() -> Self {
        Self {
            bytes: vec![0; Self::BYTES],
        }
    }

    /// Panics if `index >= N`.
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < N, "bit {index} out of range for Bitset<{N}>");
        let mask = 1 << (index % 8);
        if value {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
    }

    pub fn get(&self, index: usize) -> bool {
        index < N && self.bytes[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Rebuilds a bitset from its encoded bytes, ignoring padding bits.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != Self::BYTES {
            return Err(CodecError::SizeMismatch {
                expected: Self::BYTES,
                actual: bytes.len(),
            });
        }
        let mut bytes = bytes.to_vec();
        let padding = Self::BYTES * 8 - N;
        if let Some(last) = bytes.last_mut() {
            *last &= 0xff >> padding;
        }
        Ok(Self { bytes })
    }
}

impl<const N: usize> Default for Bitset<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for Bitset<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = (0..N).map(|i| if self.get(i) { '1' } else { '0' }).collect();
        write!(f, "Bitset<{N}>({bits})")
    }
}

impl<const N: usize> FromIterator<usize> for Bitset<N> {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bits = Self::new();
        for index in iter {
            bits.set(index, true);
        }
        bits
    }
}

impl<const N: usize> ValueCodec for Bitset<N> {
    const CATEGORY: Category = Category::Bitset;

    fn encode_value<'a>(&'a self, scratch: &'a mut Scratch) -> Result<&'a [u8], CodecError> {
        Ok(scratch.view(&self.bytes))
    }

    fn decode_value(bytes: &[u8]) -> Result<Self, CodecError> {
        Self::from_bytes(bytes)
    }
}

impl<const N: usize> KeyCodec for Bitset<N> {
    const CATEGORY: Category = Category::Bitset;
    type Order = LexicalOrder;

    fn encode_key<'a>(&'a self, scratch: &'a mut Scratch) -> &'a [u8] {
        scratch.view(&self.bytes)
    }

    fn decode_key(bytes: &[u8]) -> Result<Self, CodecError> {
        Self::from_bytes(bytes)
    }
}
