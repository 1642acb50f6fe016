use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use thiserror::Error;

/// Errors produced by secure byte store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// Requested key does not exist.
    #[error("entry not found for key: {key}")]
    NotFound { key: String },
    /// Entry may exist but the facility refused access (device locked, permission revoked, I/O failure).
    #[error("entry for key {key} is inaccessible: {reason}")]
    Inaccessible { key: String, reason: String },
}

/// When stored entries become readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessibility {
    /// Readable once the holder has unlocked the device after boot; stays readable across re-locks.
    AfterFirstUnlock,
}

/// Contract for the platform's encrypted-at-rest key/bytes facility.
///
/// Implementations must give `put` replace semantics by deleting any existing
/// entry before inserting, and must treat `delete` of a missing key as success.
pub trait SecureByteStore: Send + Sync {
    /// Persist bytes under a key, replacing any existing entry.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), AccessError>;

    /// Retrieve the bytes stored under a key.
    fn get(&self, key: &str) -> Result<Vec<u8>, AccessError>;

    /// Remove a key and its value. Best-effort: failures are not surfaced.
    fn delete(&self, key: &str);

    /// Accessibility class this store's entries are expected to have.
    ///
    /// This is a declaration, not an enforcement point: backends rely on the
    /// platform facility's own defaults to provide it.
    fn accessibility(&self) -> Accessibility {
        Accessibility::AfterFirstUnlock
    }
}

impl<T: SecureByteStore + ?Sized> SecureByteStore for Box<T> {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), AccessError> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, AccessError> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) {
        (**self).delete(key)
    }

    fn accessibility(&self) -> Accessibility {
        (**self).accessibility()
    }
}

impl<T: SecureByteStore + ?Sized> SecureByteStore for Arc<T> {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), AccessError> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, AccessError> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) {
        (**self).delete(key)
    }

    fn accessibility(&self) -> Accessibility {
        (**self).accessibility()
    }
}

/// In-memory secure store that simulates a keychain for tests and smoke runs.
/// This is not cryptographically secure; values are only masked so plaintext
/// never sits in the map.
///
/// Like a keychain, the underlying insert rejects duplicate keys, so `put`
/// has to delete before inserting.
#[derive(Debug, Default, Clone)]
pub struct InMemorySecureStore {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    locked: Arc<AtomicBool>,
}

impl InMemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a locked device: every read and write fails with `Inaccessible`.
    /// Deletes still go through, as with keychain items.
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    /// Overwrite an entry directly, ignoring the lock state. Used to tamper with stored bytes.
    pub fn insert_raw(&self, key: &str, bytes: &[u8]) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(key.to_string(), mask(bytes));
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }

    fn check_unlocked(&self, key: &str) -> Result<(), AccessError> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(AccessError::Inaccessible {
                key: key.to_string(),
                reason: "device locked".to_string(),
            });
        }
        Ok(())
    }

    fn add(
        map: &mut HashMap<String, Vec<u8>>,
        key: &str,
        value: &[u8],
    ) -> Result<(), AccessError> {
        if map.contains_key(key) {
            return Err(AccessError::Inaccessible {
                key: key.to_string(),
                reason: "duplicate item".to_string(),
            });
        }
        // XOR is a placeholder to avoid storing plaintext in tests.
        map.insert(key.to_string(), mask(value));
        Ok(())
    }
}

impl SecureByteStore for InMemorySecureStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), AccessError> {
        self.check_unlocked(key)?;
        let mut map = self.inner.lock().map_err(|err| AccessError::Inaccessible {
            key: key.to_string(),
            reason: format!("lock poisoned: {err}"),
        })?;

        map.remove(key);
        Self::add(&mut map, key, value)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, AccessError> {
        self.check_unlocked(key)?;
        let map = self.inner.lock().map_err(|err| AccessError::Inaccessible {
            key: key.to_string(),
            reason: format!("lock poisoned: {err}"),
        })?;

        let masked = map.get(key).ok_or_else(|| AccessError::NotFound {
            key: key.to_string(),
        })?;
        Ok(unmask(masked))
    }

    fn delete(&self, key: &str) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(key);
        }
    }
}

const MASK_BYTE: u8 = 0xA5;

fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}

fn unmask(input: &[u8]) -> Vec<u8> {
    mask(input) // XOR twice restores original.
}
