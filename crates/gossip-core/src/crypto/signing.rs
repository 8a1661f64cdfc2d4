//! Detached PKCS#1 v1.5 signatures over SHA-256.
//!
//! Header and body are signed separately so verification can report which
//! part was tampered with.

use crate::error::{CryptoError, GossipError, SignedPart};
use crate::protocol::{Message, codec};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

fn scheme() -> Pkcs1v15Sign {
    Pkcs1v15Sign::new::<Sha256>()
}

/// Sign header and body in place, replacing any existing signatures.
pub fn sign(message: &mut Message, key: &RsaPrivateKey) -> Result<(), GossipError> {
    let header_digest = Sha256::digest(codec::encode(&message.header)?);
    let body_digest = Sha256::digest(&message.body);

    message.header_signature = key
        .sign(scheme(), &header_digest)
        .map_err(|e| CryptoError::SignFailed(e.to_string()))?;
    message.body_signature = key
        .sign(scheme(), &body_digest)
        .map_err(|e| CryptoError::SignFailed(e.to_string()))?;
    Ok(())
}

/// Verify both signatures. The header is checked first.
pub fn verify(message: &Message, key: &RsaPublicKey) -> Result<(), GossipError> {
    let header_digest = Sha256::digest(codec::encode(&message.header)?);
    key.verify(scheme(), &header_digest, &message.header_signature)
        .map_err(|_| CryptoError::VerifyFailed {
            part: SignedPart::Header,
        })?;

    let body_digest = Sha256::digest(&message.body);
    key.verify(scheme(), &body_digest, &message.body_signature)
        .map_err(|_| CryptoError::VerifyFailed {
            part: SignedPart::Body,
        })?;
    Ok(())
}
