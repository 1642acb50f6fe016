//! Typed access to the DP3T secure records on top of any `SecureByteStore`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dp3t_core::{
    keys::{EphIdsForDay, SecretKey},
    records::{Record, SecretRecords, StoreError},
    storage::SecureByteStore,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument, warn};

/// Record store backed by a `SecureByteStore` (encrypted at rest).
///
/// Construct one per application and share it behind an `Arc`; every logical
/// operation runs under an internal lock, so a read never observes the gap
/// inside a concurrent delete-then-insert.
pub struct SecureRecordStore<S: SecureByteStore> {
    store: Arc<S>,
    op_lock: Mutex<()>,
}

impl<S: SecureByteStore> SecureRecordStore<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Build on a byte store that other components also hold.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            op_lock: Mutex::new(()),
        }
    }

    // The guard protects no data, so a poisoned lock is still usable.
    fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip_all, fields(record = %record))]
    fn load<T: DeserializeOwned>(&self, record: Record) -> Result<T, StoreError> {
        let bytes = {
            let _guard = self.exclusive();
            self.store
                .get(record.key())
                .map_err(|err| StoreError::from_access(record, err))?
        };

        serde_json::from_slice(&bytes).map_err(|err| {
            warn!(error = %err, "stored record does not decode");
            StoreError::Corrupt {
                record,
                reason: err.to_string(),
            }
        })
    }

    #[instrument(skip_all, fields(record = %record))]
    fn save<T: Serialize + ?Sized>(&self, record: Record, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|err| StoreError::Corrupt {
            record,
            reason: format!("encode failed: {err}"),
        })?;

        let _guard = self.exclusive();
        // A missing prior value is fine; the delete only clears the slot for the insert.
        self.store.delete(record.key());
        self.store
            .put(record.key(), &bytes)
            .map_err(|err| StoreError::from_access(record, err))?;
        debug!(len = bytes.len(), "record stored");
        Ok(())
    }
}

impl<S: SecureByteStore> SecretRecords for SecureRecordStore<S> {
    fn secret_keys(&self) -> Result<Vec<SecretKey>, StoreError> {
        self.load(Record::SecretKeys)
    }

    fn set_secret_keys(&self, keys: &[SecretKey]) -> Result<(), StoreError> {
        self.save(Record::SecretKeys, keys)
    }

    fn eph_ids_today(&self) -> Result<EphIdsForDay, StoreError> {
        self.load(Record::EphIdsToday)
    }

    fn set_eph_ids_today(&self, eph_ids: &EphIdsForDay) -> Result<(), StoreError> {
        self.save(Record::EphIdsToday, eph_ids)
    }

    #[instrument(skip(self))]
    fn clear_all(&self) {
        let _guard = self.exclusive();
        for record in Record::ALL {
            self.store.delete(record.key());
        }
        debug!("all records cleared");
    }
}
