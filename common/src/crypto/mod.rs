mod hash;
mod keys;

pub use hash::{leading_zero_nibbles, sha256, sha256_hex, Hash, Hashable, HASH_SIZE};
pub use keys::{CryptoError, KeyPair, PublicKey, Signature, MINT_PRIVATE_KEY_HEX};
