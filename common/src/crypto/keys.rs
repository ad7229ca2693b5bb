use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hash::{sha256, Hash};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("signature does not recover a valid public key")]
    RecoveryFailed,
    #[error("signature verification failed")]
    VerificationFailed,
}

/// The well-known MINT key (`0x0...01`), the only key permitted to sign a
/// coinbase transaction. Never used to protect real funds.
pub const MINT_PRIVATE_KEY_HEX: &str =
    "0000000000000000000000000000000000000000000000000000000000000001";

pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn from_private_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|_| CryptoError::InvalidPrivateKey)?;
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(KeyPair { signing_key })
    }

    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        KeyPair { signing_key }
    }

    pub fn mint() -> Self {
        Self::from_private_hex(MINT_PRIVATE_KEY_HEX).expect("MINT key is a valid scalar")
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.signing_key.verifying_key())
    }

    /// Address = SHA-256(uncompressed public key bytes).
    pub fn address(&self) -> Hash {
        self.public_key().address()
    }

    /// Sign a pre-image hash, returning a recoverable (r, s, v) signature.
    pub fn sign(&self, message_hash: &Hash) -> Signature {
        let (sig, recid): (EcdsaSignature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(message_hash.as_bytes())
            .expect("signing a 32-byte prehash cannot fail");
        Signature::from_parts(&sig, recid)
    }
}

#[derive(Clone, Copy)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn address(&self) -> Hash {
        let encoded = self.0.to_encoded_point(false);
        sha256(encoded.as_bytes())
    }

    pub fn verify(&self, message_hash: &Hash, signature: &Signature) -> Result<(), CryptoError> {
        let sig = signature.to_ecdsa().map_err(|_| CryptoError::VerificationFailed)?;
        self.0
            .verify_prehash(message_hash.as_bytes(), &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

/// A recoverable secp256k1 ECDSA signature: `(r, s)` plus a one-byte
/// recovery id, serialized on the wire as `{r, s, v}` hex strings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub r: String,
    pub s: String,
    pub v: u8,
}

impl Signature {
    fn from_parts(sig: &EcdsaSignature, recid: RecoveryId) -> Self {
        let bytes = sig.to_bytes();
        Signature {
            r: hex::encode(&bytes[..32]),
            s: hex::encode(&bytes[32..]),
            v: recid.to_byte(),
        }
    }

    fn to_ecdsa(&self) -> Result<EcdsaSignature, CryptoError> {
        let r = hex::decode(&self.r).map_err(|_| CryptoError::VerificationFailed)?;
        let s = hex::decode(&self.s).map_err(|_| CryptoError::VerificationFailed)?;
        let mut bytes = [0u8; 64];
        if r.len() != 32 || s.len() != 32 {
            return Err(CryptoError::VerificationFailed);
        }
        bytes[..32].copy_from_slice(&r);
        bytes[32..].copy_from_slice(&s);
        EcdsaSignature::from_slice(&bytes).map_err(|_| CryptoError::VerificationFailed)
    }

    /// Recover the signing public key from the message hash and this
    /// signature, without requiring the public key to be carried on the
    /// transaction.
    pub fn recover_public_key(&self, message_hash: &Hash) -> Result<PublicKey, CryptoError> {
        let sig = self.to_ecdsa()?;
        let recid = RecoveryId::from_byte(self.v).ok_or(CryptoError::RecoveryFailed)?;
        let verifying_key =
            VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &sig, recid)
                .map_err(|_| CryptoError::RecoveryFailed)?;
        Ok(PublicKey(verifying_key))
    }
}
