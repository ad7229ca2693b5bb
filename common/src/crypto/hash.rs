use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Error, Formatter};
use std::str::FromStr;

pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 digest, always rendered as lowercase hex on the wire.
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    pub const fn zero() -> Self {
        Hash::new([0; HASH_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Hash {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_SIZE * 2 {
            return Err("invalid hash length");
        }
        let bytes = hex::decode(s).map_err(|_| "invalid hex string")?;
        let bytes: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| "invalid hash")?;
        Ok(Hash::new(bytes))
    }
}

// Hash an arbitrary byte slice with SHA-256.
#[inline(always)]
pub fn sha256(value: &[u8]) -> Hash {
    let digest = Sha256::digest(value);
    let mut bytes = [0u8; HASH_SIZE];
    bytes.copy_from_slice(&digest);
    Hash(bytes)
}

pub fn sha256_hex(value: &[u8]) -> String {
    sha256(value).to_hex()
}

/// Count of leading hex-zero nibbles in a hash, used against `difficulty`.
pub fn leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut count = 0;
    for byte in hash.as_bytes() {
        if *byte == 0 {
            count += 2;
            continue;
        }
        if byte >> 4 == 0 {
            count += 1;
        }
        break;
    }
    count
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'a> Deserialize<'a> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        let hex = String::deserialize(deserializer)?;
        Hash::from_str(&hex).map_err(serde::de::Error::custom)
    }
}

pub trait Hashable {
    fn hash(&self) -> Hash;
}
