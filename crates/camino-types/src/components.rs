//! UTXO components: owners, outputs, inputs, UTXOs and credentials.

use crate::codec;
use crate::ids::{Id, ShortId};
use crate::lock::{LockIds, LockState, LockedInput, LockedOutput};
use crate::{TypesError, TypesResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum memo length in bytes.
pub const MAX_MEMO_SIZE: usize = 256;

/// Byte length of an encoded [`UtxoId`] key.
pub const UTXO_ID_KEY_LENGTH: usize = 36;

/// Threshold multisig owner set of an output.
#[derive(Clone, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
pub struct OutputOwners {
    /// Unix time before which the output cannot be spent.
    pub locktime: u64,
    /// Signatures required.
    pub threshold: u32,
    /// Sorted, unique owner addresses.
    pub addrs: Vec<ShortId>,
}

impl OutputOwners {
    /// One owner, threshold one.
    pub fn single(addr: ShortId) -> Self {
        Self {
            locktime: 0,
            threshold: 1,
            addrs: vec![addr],
        }
    }

    /// Several owners; addresses are sorted and deduplicated.
    pub fn new(threshold: u32, mut addrs: Vec<ShortId>) -> Self {
        addrs.sort();
        addrs.dedup();
        Self {
            locktime: 0,
            threshold,
            addrs,
        }
    }

    /// Structural checks.
    pub fn verify(&self) -> TypesResult<()> {
        if self.threshold as usize > self.addrs.len() {
            return Err(TypesError::InvalidOwners(format!(
                "threshold {} exceeds {} addresses",
                self.threshold,
                self.addrs.len()
            )));
        }
        if self.threshold == 0 && !self.addrs.is_empty() {
            return Err(TypesError::InvalidOwners(
                "zero threshold with addresses".to_string(),
            ));
        }
        if !self.addrs.windows(2).all(|w| w[0] < w[1]) {
            return Err(TypesError::InvalidOwners(
                "addresses not sorted and unique".to_string(),
            ));
        }
        Ok(())
    }

    /// Stable identifier of this owner set, used to key claimable rewards.
    pub fn owner_id(&self) -> TypesResult<Id> {
        Ok(Id::hash_of(&codec::encode(self)?))
    }

    /// True if `addr` is one of the owners.
    pub fn contains(&self, addr: &ShortId) -> bool {
        self.addrs.binary_search(addr).is_ok()
    }
}

/// Plain transferable output.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TransferOutput {
    /// Value.
    pub amount: u64,
    /// Who may spend it.
    pub owners: OutputOwners,
}

/// Plain transferable input.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TransferInput {
    /// Value consumed; must equal the UTXO amount.
    pub amount: u64,
    /// Indices into the UTXO owners that sign.
    pub sig_indices: Vec<u32>,
}

/// Output payload: plain, or wrapped by a lock.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Output {
    /// Unlocked transferable output.
    Transfer(TransferOutput),
    /// Deposited and/or bonded output.
    Locked(LockedOutput),
}

impl Output {
    /// Unlocked output owned by `owners`.
    pub fn transfer(amount: u64, owners: OutputOwners) -> Self {
        Output::Transfer(TransferOutput { amount, owners })
    }

    /// Value carried, looking through lock wrappers.
    pub fn amount(&self) -> u64 {
        match self {
            Output::Transfer(out) => out.amount,
            Output::Locked(locked) => locked.out.amount(),
        }
    }

    /// Lock IDs; empty for plain outputs.
    pub fn lock_ids(&self) -> LockIds {
        match self {
            Output::Transfer(_) => LockIds::default(),
            Output::Locked(locked) => locked.ids,
        }
    }

    /// Derived lock state.
    pub fn lock_state(&self) -> LockState {
        self.lock_ids().state()
    }

    /// The plain output under at most one lock wrapper, `None` for nested locks.
    pub fn transfer_output(&self) -> Option<&TransferOutput> {
        match self {
            Output::Transfer(out) => Some(out),
            Output::Locked(locked) => match locked.out.as_ref() {
                Output::Transfer(out) => Some(out),
                Output::Locked(_) => None,
            },
        }
    }

    /// Owners of the underlying plain output.
    pub fn owners(&self) -> Option<&OutputOwners> {
        self.transfer_output().map(|out| &out.owners)
    }

    /// Structural checks.
    pub fn verify(&self) -> TypesResult<()> {
        match self {
            Output::Transfer(out) => {
                if out.amount == 0 {
                    return Err(TypesError::ZeroAmount("output"));
                }
                out.owners.verify()
            }
            Output::Locked(locked) => locked.verify(),
        }
    }

    /// Add the flags of `state`, locked by the enclosing transaction.
    pub fn lock(self, state: LockState) -> Output {
        if !state.is_locked() {
            return self;
        }
        match self {
            Output::Locked(locked) => Output::Locked(LockedOutput {
                ids: locked.ids.lock(state),
                out: locked.out,
            }),
            plain => Output::Locked(LockedOutput::new(LockIds::default().lock(state), plain)),
        }
    }

    /// Clear the flags of `state`; drops the wrapper once nothing is locked.
    pub fn unlock(self, state: LockState) -> Output {
        match self {
            Output::Locked(locked) => {
                let ids = locked.ids.unlock(state);
                if ids.is_locked() {
                    Output::Locked(LockedOutput { ids, out: locked.out })
                } else {
                    *locked.out
                }
            }
            plain => plain,
        }
    }

    /// Resolve [`Id::THIS_TX`] placeholders to `tx_id`.
    pub fn fix_lock_ids(self, tx_id: Id) -> Output {
        match self {
            Output::Locked(locked) => Output::Locked(LockedOutput {
                ids: locked.ids.fix(tx_id),
                out: locked.out,
            }),
            plain => plain,
        }
    }
}

/// Input payload: plain, or spending a locked UTXO.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Input {
    /// Spends an unlocked UTXO.
    Transfer(TransferInput),
    /// Spends a locked UTXO.
    Locked(LockedInput),
}

impl Input {
    /// Value consumed.
    pub fn amount(&self) -> u64 {
        match self {
            Input::Transfer(input) => input.amount,
            Input::Locked(locked) => locked.input.amount(),
        }
    }

    /// Lock IDs of the consumed UTXO.
    pub fn lock_ids(&self) -> LockIds {
        match self {
            Input::Transfer(_) => LockIds::default(),
            Input::Locked(locked) => locked.ids,
        }
    }

    /// Signature indices of the underlying plain input.
    pub fn sig_indices(&self) -> &[u32] {
        match self {
            Input::Transfer(input) => &input.sig_indices,
            Input::Locked(locked) => locked.input.sig_indices(),
        }
    }

    /// Structural checks.
    pub fn verify(&self) -> TypesResult<()> {
        match self {
            Input::Transfer(input) => {
                if input.amount == 0 {
                    return Err(TypesError::ZeroAmount("input"));
                }
                if !input.sig_indices.windows(2).all(|w| w[0] < w[1]) {
                    return Err(TypesError::InvalidTx(
                        "signature indices not sorted and unique".to_string(),
                    ));
                }
                Ok(())
            }
            Input::Locked(locked) => locked.verify(),
        }
    }
}

/// Unique UTXO identifier: producing transaction and output index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Debug, Serialize, Deserialize)]
pub struct UtxoId {
    /// Producing transaction.
    pub tx_id: Id,
    /// Position among the transaction's produced outputs.
    pub output_index: u32,
}

impl UtxoId {
    /// Build a UTXO ID.
    pub fn new(tx_id: Id, output_index: u32) -> Self {
        Self {
            tx_id,
            output_index,
        }
    }

    /// Storage key: tx ID followed by the big-endian index.
    pub fn key(&self) -> [u8; UTXO_ID_KEY_LENGTH] {
        let mut key = [0u8; UTXO_ID_KEY_LENGTH];
        key[..32].copy_from_slice(self.tx_id.as_bytes());
        key[32..].copy_from_slice(&self.output_index.to_be_bytes());
        key
    }

    /// Parse a storage key.
    pub fn from_key(key: &[u8]) -> TypesResult<Self> {
        if key.len() != UTXO_ID_KEY_LENGTH {
            return Err(TypesError::InvalidId(format!(
                "UTXO key must be {} bytes, got {}",
                UTXO_ID_KEY_LENGTH,
                key.len()
            )));
        }
        let mut index = [0u8; 4];
        index.copy_from_slice(&key[32..]);
        Ok(Self {
            tx_id: Id::from_slice(&key[..32])?,
            output_index: u32::from_be_bytes(index),
        })
    }
}

impl fmt::Display for UtxoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

/// An unspent output in the ledger.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Utxo {
    /// Identifier.
    pub utxo_id: UtxoId,
    /// Asset held.
    pub asset_id: Id,
    /// Payload.
    pub out: Output,
}

/// An output of a transaction, tagged with its asset.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TransferableOutput {
    /// Asset carried.
    pub asset_id: Id,
    /// Payload.
    pub out: Output,
}

impl TransferableOutput {
    /// Build an output.
    pub fn new(asset_id: Id, out: Output) -> Self {
        Self { asset_id, out }
    }
}

/// An input of a transaction, referencing the UTXO it consumes.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct TransferableInput {
    /// Consumed UTXO.
    pub utxo_id: UtxoId,
    /// Asset consumed.
    pub asset_id: Id,
    /// Payload.
    pub input: Input,
}

/// True if inputs are sorted by UTXO ID with no duplicates.
pub fn inputs_sorted_and_unique(ins: &[TransferableInput]) -> bool {
    ins.windows(2).all(|w| w[0].utxo_id < w[1].utxo_id)
}

/// True if outputs are sorted by their encoding.
pub fn outputs_sorted(outs: &[TransferableOutput]) -> TypesResult<bool> {
    let encoded = outs
        .iter()
        .map(codec::encode)
        .collect::<TypesResult<Vec<_>>>()?;
    Ok(encoded.windows(2).all(|w| w[0] <= w[1]))
}

/// Sort inputs by UTXO ID.
pub fn sort_inputs(ins: &mut [TransferableInput]) {
    ins.sort_by_key(|input| input.utxo_id);
}

/// Sort outputs by their encoding.
pub fn sort_outputs(outs: &mut Vec<TransferableOutput>) -> TypesResult<()> {
    let mut keyed = outs
        .drain(..)
        .map(|out| codec::encode(&out).map(|bytes| (bytes, out)))
        .collect::<TypesResult<Vec<_>>>()?;
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    outs.extend(keyed.into_iter().map(|(_, out)| out));
    Ok(())
}

/// One signature with the public key that produced it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Signer public key.
    pub public_key: Vec<u8>,
    /// Signature over the transaction ID.
    pub signature: Vec<u8>,
}

/// Signatures authorising one input or one auth requirement.
#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
pub struct Credential {
    /// Signatures in signature-index order.
    pub sigs: Vec<SignatureEntry>,
}
