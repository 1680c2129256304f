//! RocksDB database implementation.

use crate::batch::BatchOp;
use crate::{Storage, StorageError, StorageResult, WriteBatch};
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded, Options};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Column families holding the platform chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnFamily {
    /// UTXOs indexed by UTXO ID (tx ID + output index).
    Utxo,
    /// Owner address + UTXO ID -> empty, for paginated lookups by address.
    AddressUtxos,
    /// Current stakers indexed by staking tx ID.
    CurrentStakers,
    /// Pending stakers indexed by staking tx ID.
    PendingStakers,
    /// Deferred (suspended) stakers indexed by staking tx ID.
    DeferredStakers,
    /// Subnet owners indexed by subnet ID.
    Subnets,
    /// Chain ID -> validating subnet ID.
    Chains,
    /// Deposit offers indexed by offer ID.
    DepositOffers,
    /// Active deposits indexed by deposit tx ID.
    Deposits,
    /// Unlock time + deposit tx ID -> empty.
    DepositUnlockIndex,
    /// Proposal states indexed by proposal ID.
    Proposals,
    /// Expiration time + proposal ID -> empty.
    ProposalExpiryIndex,
    /// Proposal IDs that finished early and await a finish-proposals tx.
    ProposalsToFinish,
    /// Lock tx ID + UTXO ID -> empty, for unlocking everything held by a deposit or bond.
    LockedUtxos,
    /// Address -> address state flags.
    AddressStates,
    /// Node ID -> consortium member address.
    NodeOwners,
    /// Consortium member address -> node ID.
    MemberNodes,
    /// Owner ID -> claimable rewards.
    Claimables,
    /// Height + subnet ID + node ID -> validator weight change.
    WeightDiffs,
    /// Accepted transactions indexed by tx ID.
    Txs,
    /// Chain metadata (timestamp, supply, base fee, last accepted height).
    Metadata,
    /// Default column family (required by RocksDB).
    Default,
}

impl ColumnFamily {
    /// Get the string name of the column family.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnFamily::Utxo => "utxo",
            ColumnFamily::AddressUtxos => "address_utxos",
            ColumnFamily::CurrentStakers => "current_stakers",
            ColumnFamily::PendingStakers => "pending_stakers",
            ColumnFamily::DeferredStakers => "deferred_stakers",
            ColumnFamily::Subnets => "subnets",
            ColumnFamily::Chains => "chains",
            ColumnFamily::DepositOffers => "deposit_offers",
            ColumnFamily::Deposits => "deposits",
            ColumnFamily::DepositUnlockIndex => "deposit_unlock_index",
            ColumnFamily::Proposals => "proposals",
            ColumnFamily::ProposalExpiryIndex => "proposal_expiry_index",
            ColumnFamily::ProposalsToFinish => "proposals_to_finish",
            ColumnFamily::LockedUtxos => "locked_utxos",
            ColumnFamily::AddressStates => "address_states",
            ColumnFamily::NodeOwners => "node_owners",
            ColumnFamily::MemberNodes => "member_nodes",
            ColumnFamily::Claimables => "claimables",
            ColumnFamily::WeightDiffs => "weight_diffs",
            ColumnFamily::Txs => "txs",
            ColumnFamily::Metadata => "metadata",
            ColumnFamily::Default => "default",
        }
    }

    /// Get all column families.
    pub fn all() -> &'static [ColumnFamily] {
        &[
            ColumnFamily::Utxo,
            ColumnFamily::AddressUtxos,
            ColumnFamily::CurrentStakers,
            ColumnFamily::PendingStakers,
            ColumnFamily::DeferredStakers,
            ColumnFamily::Subnets,
            ColumnFamily::Chains,
            ColumnFamily::DepositOffers,
            ColumnFamily::Deposits,
            ColumnFamily::DepositUnlockIndex,
            ColumnFamily::Proposals,
            ColumnFamily::ProposalExpiryIndex,
            ColumnFamily::ProposalsToFinish,
            ColumnFamily::LockedUtxos,
            ColumnFamily::AddressStates,
            ColumnFamily::NodeOwners,
            ColumnFamily::MemberNodes,
            ColumnFamily::Claimables,
            ColumnFamily::WeightDiffs,
            ColumnFamily::Txs,
            ColumnFamily::Metadata,
            ColumnFamily::Default,
        ]
    }
}

/// RocksDB database wrapper.
pub struct Database {
    db: Arc<RwLock<DBWithThreadMode<MultiThreaded>>>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(256);
        opts.set_keep_log_file_num(1);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ColumnFamily::all()
            .iter()
            .map(|cf| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                ColumnFamilyDescriptor::new(cf.name(), cf_opts)
            })
            .collect();

        let db =
            DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, cf_descriptors)?;

        debug!("Database opened successfully");

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> StorageResult<()> {
        let db = self.db.read();
        for cf in ColumnFamily::all() {
            if let Some(handle) = db.cf_handle(cf.name()) {
                db.flush_cf(&handle)?;
            }
        }
        Ok(())
    }
}

impl Storage for Database {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let db = self.db.read();
        let handle = db
            .cf_handle(cf.name())
            .ok_or(StorageError::ColumnFamilyNotFound(cf.name()))?;

        Ok(db.get_cf(&handle, key)?)
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let db = self.db.read();
        let handle = db
            .cf_handle(cf.name())
            .ok_or(StorageError::ColumnFamilyNotFound(cf.name()))?;

        db.put_cf(&handle, key, value)?;
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        let db = self.db.read();
        let handle = db
            .cf_handle(cf.name())
            .ok_or(StorageError::ColumnFamilyNotFound(cf.name()))?;

        db.delete_cf(&handle, key)?;
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let db = self.db.read();
        let mut rocks_batch = rocksdb::WriteBatch::default();

        for (cf, key, op) in batch.into_ops() {
            let handle = db
                .cf_handle(cf.name())
                .ok_or(StorageError::ColumnFamilyNotFound(cf.name()))?;

            match op {
                BatchOp::Put(value) => rocks_batch.put_cf(&handle, &key, &value),
                BatchOp::Delete => rocks_batch.delete_cf(&handle, &key),
            }
        }

        db.write(rocks_batch)?;
        Ok(())
    }

    fn prefix_iter(&self, cf: ColumnFamily, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let db = self.db.read();
        let handle = db
            .cf_handle(cf.name())
            .ok_or(StorageError::ColumnFamilyNotFound(cf.name()))?;

        let mode = IteratorMode::From(prefix, rocksdb::Direction::Forward);
        let mut entries = Vec::new();
        for item in db.iterator_cf(&handle, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}
