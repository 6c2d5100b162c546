//! # GCS Filters (Golomb-Coded Sets)
//!
//! Deterministic, server-side block filters using Golomb-Rice coding.
//!
//! ## Algorithm
//!
//! 1. Hash every element with SipHash-2-4, keyed by the block hash
//! 2. Map each hash into `[0, N << P)` with a multiply-shift reduction
//! 3. Sort and compute consecutive differences
//! 4. Encode differences with Golomb-Rice (unary quotient + P-bit remainder)
//!
//! ## Encoding
//!
//! `CompactSize(N) || golomb_rice_bits` with bits packed MSB-first and the
//! final byte zero-padded. An empty set encodes as the single byte `0x00`.

use bitvec::prelude::*;
use shared_types::Hash;
use siphasher::sip::SipHasher24;
use std::collections::BTreeSet;
use std::hash::Hasher;

use crate::error::CodecError;

/// A filter element (arbitrary bytes).
pub type Element = Vec<u8>;

/// Deduplicated, ordered set of filter elements.
pub type ElementSet = BTreeSet<Element>;

/// Element count limit (N must be < 2^32).
pub const MAX_ELEMENTS: u64 = 1 << 32;

/// Golomb-Coded Set filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcsFilter {
    /// SipHash key, low half
    k0: u64,
    /// SipHash key, high half
    k1: u64,
    /// Golomb-Rice parameter
    p: u8,
    /// Number of elements
    n: u64,
    /// Hash range, N << P
    f: u64,
    /// CompactSize(N) followed by the Golomb-Rice bit stream
    encoded: Vec<u8>,
}

impl GcsFilter {
    /// Build a filter over `elements`, keyed by `key`.
    pub fn build(key: &Hash, p: u8, elements: &ElementSet) -> Result<Self, CodecError> {
        let n = elements.len() as u64;
        if n >= MAX_ELEMENTS {
            return Err(CodecError::TooManyElements { count: n });
        }

        let (k0, k1) = derive_keys(key);
        let f = n << p;

        let mut encoded = Vec::new();
        write_compact_size(&mut encoded, n);

        if n > 0 {
            let mut bits = BitVec::<u8, Msb0>::new();
            let mut last = 0u64;
            for value in hashed_set(k0, k1, f, elements) {
                golomb_rice_encode(&mut bits, p, value - last);
                last = value;
            }
            while bits.len() % 8 != 0 {
                bits.push(false);
            }
            encoded.extend_from_slice(bits.as_raw_slice());
        }

        Ok(Self {
            k0,
            k1,
            p,
            n,
            f,
            encoded,
        })
    }

    /// Rebuild a filter from its encoding.
    ///
    /// Decodes every value once so that a corrupt encoding is reported here
    /// rather than on first match.
    pub fn from_encoded(key: &Hash, p: u8, encoded: Vec<u8>) -> Result<Self, CodecError> {
        let (n, offset) = read_compact_size(&encoded)?;
        if n >= MAX_ELEMENTS {
            return Err(CodecError::TooManyElements { count: n });
        }

        let mut reader = BitReader::new(&encoded[offset..]);
        for i in 0..n {
            if reader.golomb_rice_decode(p).is_none() {
                return Err(CodecError::InvalidEncoding(format!(
                    "bit stream ends after {} of {} values",
                    i, n
                )));
            }
        }

        let (k0, k1) = derive_keys(key);
        Ok(Self {
            k0,
            k1,
            p,
            n,
            f: n << p,
            encoded,
        })
    }

    pub fn n(&self) -> u64 {
        self.n
    }

    pub fn p(&self) -> u8 {
        self.p
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn into_encoded(self) -> Vec<u8> {
        self.encoded
    }

    /// Check if an element might be in the set.
    pub fn matches(&self, element: &[u8]) -> bool {
        if self.n == 0 {
            return false;
        }
        let query = hash_to_range(self.k0, self.k1, self.f, element);
        self.values().take_while(|v| *v <= query).any(|v| v == query)
    }

    /// Check if any of the given elements might be in the set.
    ///
    /// Walks the sorted filter values and sorted queries in one pass.
    pub fn match_any(&self, elements: &ElementSet) -> bool {
        if self.n == 0 || elements.is_empty() {
            return false;
        }

        let queries = hashed_set(self.k0, self.k1, self.f, elements);
        let mut query_it = queries.iter().peekable();

        for value in self.values() {
            while let Some(&&query) = query_it.peek() {
                if query == value {
                    return true;
                }
                if query > value {
                    break;
                }
                query_it.next();
            }
            if query_it.peek().is_none() {
                return false;
            }
        }

        false
    }

    /// Iterate the absolute (un-delta'd) values stored in the filter.
    fn values(&self) -> impl Iterator<Item = u64> + '_ {
        let offset = compact_size_len(self.n);
        let mut reader = BitReader::new(&self.encoded[offset..]);
        let p = self.p;
        let mut value = 0u64;
        (0..self.n).map_while(move |_| {
            let delta = reader.golomb_rice_decode(p)?;
            value += delta;
            Some(value)
        })
    }
}

/// SipHash keys are the first two little-endian u64 words of the block hash.
fn derive_keys(key: &Hash) -> (u64, u64) {
    let mut k0 = [0u8; 8];
    let mut k1 = [0u8; 8];
    k0.copy_from_slice(&key[0..8]);
    k1.copy_from_slice(&key[8..16]);
    (u64::from_le_bytes(k0), u64::from_le_bytes(k1))
}

/// Map `x`, uniform in `[0, 2^64)`, to a value uniform in `[0, n)`.
fn map_into_range(x: u64, n: u64) -> u64 {
    ((u128::from(x) * u128::from(n)) >> 64) as u64
}

fn hash_to_range(k0: u64, k1: u64, f: u64, element: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new_with_keys(k0, k1);
    hasher.write(element);
    map_into_range(hasher.finish(), f)
}

fn hashed_set(k0: u64, k1: u64, f: u64, elements: &ElementSet) -> Vec<u64> {
    let mut hashed: Vec<u64> = elements
        .iter()
        .map(|e| hash_to_range(k0, k1, f, e))
        .collect();
    hashed.sort_unstable();
    hashed
}

fn golomb_rice_encode(bits: &mut BitVec<u8, Msb0>, p: u8, value: u64) {
    // Quotient in unary: q ones followed by a zero
    let q = value >> p;
    bits.extend(std::iter::repeat_n(true, q as usize));
    bits.push(false);

    // Remainder in P bits
    for i in (0..p).rev() {
        bits.push((value >> i) & 1 == 1);
    }
}

/// MSB-first reader over a byte slice.
struct BitReader<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bits: bytes.view_bits::<Msb0>(),
            pos: 0,
        }
    }

    fn read_bit(&mut self) -> Option<bool> {
        let bit = *self.bits.get(self.pos)?;
        self.pos += 1;
        Some(bit)
    }

    fn read_bits(&mut self, count: u8) -> Option<u64> {
        let mut value = 0u64;
        for _ in 0..count {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Some(value)
    }

    fn golomb_rice_decode(&mut self, p: u8) -> Option<u64> {
        let mut q = 0u64;
        while self.read_bit()? {
            q += 1;
        }
        let r = self.read_bits(p)?;
        Some((q << p) + r)
    }
}

fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xFC => out.push(n as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Returns the decoded value and the number of bytes consumed.
fn read_compact_size(data: &[u8]) -> Result<(u64, usize), CodecError> {
    let truncated = || CodecError::InvalidEncoding("truncated element count".to_string());

    let (&tag, rest) = data.split_first().ok_or_else(truncated)?;
    let width = match tag {
        0xFD => 2,
        0xFE => 4,
        0xFF => 8,
        small => return Ok((u64::from(small), 1)),
    };
    let bytes = rest.get(..width).ok_or_else(truncated)?;

    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(bytes);
    let n = u64::from_le_bytes(buf);
    if compact_size_len(n) != width + 1 {
        return Err(CodecError::InvalidEncoding(
            "non-canonical element count".to_string(),
        ));
    }
    Ok((n, width + 1))
}
