//! 256-bit hashes and the double SHA-256 hash writer.
//!
//! Hashes are stored in internal byte order (little-endian when read as a
//! number), and displayed reversed, the way block explorers print them.

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Size of a SHA-256 digest.
pub const HASH_SIZE: usize = 32;

/// A 256-bit hash in internal byte order.
///
/// `Ord` compares raw bytes, which is the tie-break order used when sorting
/// modifier candidates with equal timestamps.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; HASH_SIZE]);

impl Hash256 {
    /// All-zero hash.
    pub const ZERO: Hash256 = Hash256([0u8; HASH_SIZE]);

    /// Wrap raw internal-order bytes.
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw internal-order bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Interpret the hash as an unsigned 256-bit little-endian integer.
    pub fn to_uint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }

    /// Lowest 64 bits of the hash read as a little-endian integer.
    pub fn low_u64(&self) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(word)
    }

    /// Parse a display-order (reversed) hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let trimmed = s.trim();
        let trimmed = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let mut bytes = [0u8; HASH_SIZE];
        hex::decode_to_slice(trimmed, &mut bytes)?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    /// Display-order (reversed) hex string.
    pub fn to_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Double SHA-256 of `data`.
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    Hash256(Sha256::digest(first).into())
}

/// Accumulates little-endian serialized fields and hashes them with double SHA-256.
///
/// Field widths are part of consensus: a `u32` timestamp and a `u64`
/// modifier produce different digests than any other widths would.
#[derive(Default, Clone)]
pub struct HashWriter {
    hasher: Sha256,
}

impl HashWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn write_hash(&mut self, hash: &Hash256) -> &mut Self {
        self.hasher.update(hash.0);
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.update(bytes);
        self
    }

    /// Finish with the second SHA-256 round.
    pub fn finalize(&self) -> Hash256 {
        let first = self.hasher.clone().finalize();
        Hash256(Sha256::digest(first).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256d_empty() {
        // Well-known double SHA-256 of the empty string.
        assert_eq!(
            hex::encode(sha256d(b"").0),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_writer_matches_concatenation() {
        let mut writer = HashWriter::new();
        writer.write_u32(7).write_u64(0x0102030405060708);

        let mut buf = Vec::new();
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&0x0102030405060708u64.to_le_bytes());

        assert_eq!(writer.finalize(), sha256d(&buf));
    }

    #[test]
    fn test_hex_display_is_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        let hash = Hash256(bytes);
        let shown = hash.to_hex();
        assert!(shown.ends_with("ab"));
        assert_eq!(Hash256::from_hex(&shown).unwrap(), hash);
    }

    #[test]
    fn test_low_u64_and_uint_agree() {
        let hash = sha256d(b"ppc");
        let low = hash.low_u64();
        let from_big = (hash.to_uint() & BigUint::from(u64::MAX)).to_u64_digits();
        assert_eq!(from_big.first().copied().unwrap_or(0), low);
    }

    #[test]
    fn test_serde_hex_string() {
        let hash = sha256d(b"serde");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
