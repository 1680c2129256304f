//! Signature verification and address derivation.
//!
//! Credentials carry the signer's public key next to each signature, so
//! recovering the signer reduces to checking the signature and hashing the key.

use crate::ids::{blake2b_256, ShortId};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Ed25519 public key length.
pub const PUBLIC_KEY_LENGTH: usize = 32;
/// Ed25519 signature length.
pub const SIGNATURE_LENGTH: usize = 64;

/// Address of a public key: the first 20 bytes of its BLAKE2b-256 digest.
pub fn address_from_public_key(public_key: &[u8]) -> ShortId {
    let digest = blake2b_256(public_key);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest[..20]);
    ShortId(addr)
}

/// Verifies signatures over transaction IDs.
pub trait SignatureVerifier: Send + Sync {
    /// True if `signature` is a valid signature of `message` under `public_key`.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;

    /// Address that signed `message`, if the signature is valid.
    fn recover(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Option<ShortId> {
        if self.verify(public_key, message, signature) {
            Some(address_from_public_key(public_key))
        } else {
            None
        }
    }
}

/// Ed25519 verifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        let Ok(pk) = <[u8; PUBLIC_KEY_LENGTH]>::try_from(public_key) else {
            return false;
        };
        let Ok(sig) = <[u8; SIGNATURE_LENGTH]>::try_from(signature) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&pk) else {
            return false;
        };
        key.verify(message, &Signature::from_bytes(&sig)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    #[test]
    fn test_verify_and_recover() {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        let pk = key.verifying_key().to_bytes();
        let sig = key.sign(b"message").to_bytes();

        let verifier = Ed25519Verifier;
        assert!(verifier.verify(&pk, b"message", &sig));
        assert!(!verifier.verify(&pk, b"other", &sig));
        assert_eq!(
            verifier.recover(&pk, b"message", &sig),
            Some(address_from_public_key(&pk))
        );
    }

    #[test]
    fn test_malformed_inputs_fail() {
        let verifier = Ed25519Verifier;
        assert!(!verifier.verify(&[1u8; 31], b"m", &[0u8; 64]));
        assert!(!verifier.verify(&[1u8; 32], b"m", &[0u8; 63]));
    }
}
