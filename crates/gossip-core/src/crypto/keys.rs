//! RSA key pair held by a node.
//!
//! All nodes of a cluster share one key pair: it signs and decrypts for
//! the local node and verifies and encrypts for every peer.

use crate::error::CryptoError;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;

/// Smallest modulus we accept, in bits.
pub const MIN_KEY_BITS: usize = 2048;

#[derive(Clone)]
pub struct NodeKeys {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl NodeKeys {
    /// Generate a fresh key pair of `bits` bits.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::KeyGenFailed(format!(
                "{bits}-bit keys are below the {MIN_KEY_BITS}-bit minimum"
            )));
        }
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyGenFailed(e.to_string()))?;
        Self::from_private(private)
    }

    /// Wrap a caller-supplied private key.
    pub fn from_private(private: RsaPrivateKey) -> Result<Self, CryptoError> {
        let bits = private.size() * 8;
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::KeyGenFailed(format!(
                "{bits}-bit keys are below the {MIN_KEY_BITS}-bit minimum"
            )));
        }
        let public = private.to_public_key();
        Ok(Self { private, public })
    }

    /// Load a PKCS#8 PEM private key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::KeyGenFailed(format!("invalid PEM key: {e}")))?;
        Self::from_private(private)
    }

    /// Export the private key as PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<String, CryptoError> {
        let pem = self
            .private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGenFailed(format!("PEM export failed: {e}")))?;
        Ok(pem.as_str().to_string())
    }

    pub fn private(&self) -> &RsaPrivateKey {
        &self.private
    }

    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }
}

impl fmt::Debug for NodeKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeKeys")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}
