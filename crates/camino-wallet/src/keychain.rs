//! Signing keys held by the wallet.
//!
//! Keys are ed25519 and addressed by the first 20 bytes of the BLAKE2b-256
//! digest of their public key, the same derivation the chain uses when it
//! checks credentials.

use crate::{WalletError, WalletResult};
use camino_types::{address_from_public_key, Credential, OutputOwners, ShortId, SignatureEntry};
use ed25519_dalek::{Signer, SigningKey, SECRET_KEY_LENGTH};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use tracing::debug;

/// In-memory set of signing keys.
#[derive(Default)]
pub struct Keychain {
    keys: RwLock<BTreeMap<ShortId, SigningKey>>,
}

impl Keychain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keychain holding one key per seed.
    pub fn from_seeds(seeds: &[[u8; SECRET_KEY_LENGTH]]) -> Self {
        let keychain = Self::new();
        for seed in seeds {
            keychain.add_seed(*seed);
        }
        keychain
    }

    /// Add the key with this secret seed and return its address.
    pub fn add_seed(&self, seed: [u8; SECRET_KEY_LENGTH]) -> ShortId {
        self.insert(SigningKey::from_bytes(&seed))
    }

    /// Add a hex encoded secret seed.
    pub fn import_hex(&self, secret: &str) -> WalletResult<ShortId> {
        let bytes = hex::decode(secret.trim()).map_err(|e| WalletError::InvalidKey(e.to_string()))?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            WalletError::InvalidKey(format!(
                "expected {} bytes, got {}",
                SECRET_KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(self.add_seed(seed))
    }

    /// Add a freshly generated key.
    pub fn generate(&self) -> ShortId {
        self.insert(SigningKey::generate(&mut OsRng))
    }

    fn insert(&self, key: SigningKey) -> ShortId {
        let address = address_from_public_key(&key.verifying_key().to_bytes());
        self.keys.write().insert(address, key);
        debug!(address = %address, "Added key");
        address
    }

    /// Addresses in ascending order.
    pub fn addresses(&self) -> Vec<ShortId> {
        self.keys.read().keys().copied().collect()
    }

    pub fn contains(&self, address: &ShortId) -> bool {
        self.keys.read().contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Sign `message` with the key of `address`.
    pub fn sign(&self, address: &ShortId, message: &[u8]) -> WalletResult<SignatureEntry> {
        let keys = self.keys.read();
        let key = keys.get(address).ok_or(WalletError::KeyNotFound(*address))?;
        Ok(SignatureEntry {
            public_key: key.verifying_key().to_bytes().to_vec(),
            signature: key.sign(message).to_bytes().to_vec(),
        })
    }

    /// Signature indices into `owners.addrs` this keychain can satisfy at
    /// time `now`: the first `threshold` addresses it holds.
    pub fn match_owners(&self, owners: &OutputOwners, now: u64) -> Option<Vec<u32>> {
        if owners.locktime > now {
            return None;
        }
        let keys = self.keys.read();
        let threshold = owners.threshold as usize;
        let indices: Vec<u32> = owners
            .addrs
            .iter()
            .enumerate()
            .filter(|(_, addr)| keys.contains_key(addr))
            .map(|(i, _)| i as u32)
            .take(threshold)
            .collect();
        (indices.len() == threshold).then_some(indices)
    }

    /// Credential over `message` by the addresses in `signers`, in order.
    pub fn credential(&self, signers: &[ShortId], message: &[u8]) -> WalletResult<Credential> {
        let sigs = signers
            .iter()
            .map(|address| self.sign(address, message))
            .collect::<WalletResult<Vec<_>>>()?;
        Ok(Credential { sigs })
    }
}
