//! Hybrid encryption: AES-256-GCM for the message, RSA-OAEP (SHA-256) for
//! the per-message key and nonce.

use crate::error::{CryptoError, GossipError};
use crate::protocol::{EncryptedEnvelope, Message, codec};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rsa::rand_core::CryptoRngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Encrypt a signed message for `recipient` with a fresh key and nonce.
pub fn encrypt<R: CryptoRngCore>(
    message: &Message,
    recipient: &RsaPublicKey,
    rng: &mut R,
) -> Result<EncryptedEnvelope, GossipError> {
    let plaintext = codec::encode(message)?;

    let mut key = [0u8; KEY_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut key);
    rng.fill_bytes(&mut nonce);

    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;

    let wrapped_key = recipient
        .encrypt(rng, Oaep::new::<Sha256>(), &key)
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;
    let wrapped_nonce = recipient
        .encrypt(rng, Oaep::new::<Sha256>(), &nonce)
        .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;

    Ok(EncryptedEnvelope {
        ciphertext,
        wrapped_key,
        wrapped_nonce,
    })
}

/// Recover a message from an envelope addressed to `key`.
///
/// Every failure on the cryptographic path is reported as `DecryptFailed`.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &RsaPrivateKey) -> Result<Message, GossipError> {
    let symmetric = key
        .decrypt(Oaep::new::<Sha256>(), &envelope.wrapped_key)
        .map_err(|_| CryptoError::DecryptFailed)?;
    let nonce = key
        .decrypt(Oaep::new::<Sha256>(), &envelope.wrapped_nonce)
        .map_err(|_| CryptoError::DecryptFailed)?;
    if symmetric.len() != KEY_LEN || nonce.len() != NONCE_LEN {
        return Err(CryptoError::DecryptFailed.into());
    }

    let cipher = Aes256Gcm::new_from_slice(&symmetric).map_err(|_| CryptoError::DecryptFailed)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), envelope.ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptFailed)?;

    Ok(codec::decode(&plaintext)?)
}
