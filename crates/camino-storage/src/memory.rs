//! In-memory [`Storage`] used by tests and ephemeral nodes.

use crate::batch::BatchOp;
use crate::{ColumnFamily, Storage, StorageResult, WriteBatch};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Ordered in-memory key-value store with the same semantics as [`crate::Database`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    families: RwLock<HashMap<ColumnFamily, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys stored in a column family.
    pub fn len(&self, cf: ColumnFamily) -> usize {
        self.families.read().get(&cf).map_or(0, BTreeMap::len)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .families
            .read()
            .get(&cf)
            .and_then(|family| family.get(key).cloned()))
    }

    fn put(&self, cf: ColumnFamily, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.families
            .write()
            .entry(cf)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<()> {
        if let Some(family) = self.families.write().get_mut(&cf) {
            family.remove(key);
        }
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        // Single write lock for the whole batch keeps it atomic for readers.
        let mut families = self.families.write();
        for (cf, key, op) in batch.into_ops() {
            let family = families.entry(cf).or_default();
            match op {
                BatchOp::Put(value) => {
                    family.insert(key, value);
                }
                BatchOp::Delete => {
                    family.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn prefix_iter(&self, cf: ColumnFamily, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let families = self.families.read();
        let Some(family) = families.get(&cf) else {
            return Ok(Vec::new());
        };
        Ok(family
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
