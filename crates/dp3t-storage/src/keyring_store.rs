use dp3t_core::storage::{AccessError, SecureByteStore};
use tracing::{debug, instrument, warn};

/// Stores each record as its own OS keyring item: service = `service`,
/// account = record key.
///
/// The `keyring` crate exposes no accessibility attribute. Items get the
/// platform default (login keychain, Credential Manager, Secret Service),
/// which become readable once the user has unlocked their session; that OS
/// default is what provides the after-first-unlock class, not this type.
pub struct KeyringByteStore {
    service: String,
}

impl KeyringByteStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, AccessError> {
        keyring::Entry::new(&self.service, key).map_err(|err| map_keyring_err(key, err))
    }
}

impl SecureByteStore for KeyringByteStore {
    #[instrument(skip_all, fields(service = %self.service, key = %key))]
    fn put(&self, key: &str, value: &[u8]) -> Result<(), AccessError> {
        let entry = self.entry(key)?;
        // Some platforms refuse to add an item that already exists.
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(err) => debug!(error = %err, "pre-insert delete failed"),
        }
        entry
            .set_secret(value)
            .map_err(|err| map_keyring_err(key, err))
    }

    #[instrument(skip_all, fields(service = %self.service, key = %key))]
    fn get(&self, key: &str) -> Result<Vec<u8>, AccessError> {
        self.entry(key)?
            .get_secret()
            .map_err(|err| map_keyring_err(key, err))
    }

    #[instrument(skip_all, fields(service = %self.service, key = %key))]
    fn delete(&self, key: &str) {
        let entry = match self.entry(key) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "cannot open keyring entry for delete");
                return;
            }
        };
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(err) => warn!(error = %err, "failed to delete keyring entry"),
        }
    }
}

fn map_keyring_err(key: &str, err: keyring::Error) -> AccessError {
    match err {
        keyring::Error::NoEntry => AccessError::NotFound {
            key: key.to_string(),
        },
        other => AccessError::Inaccessible {
            key: key.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_maps_to_not_found() {
        let err = map_keyring_err("org.dpppt.keylist", keyring::Error::NoEntry);
        assert_eq!(
            err,
            AccessError::NotFound {
                key: "org.dpppt.keylist".into()
            }
        );
    }

    #[test]
    fn platform_failures_map_to_inaccessible() {
        let err = map_keyring_err(
            "org.dpppt.ephsIds",
            keyring::Error::NoStorageAccess("keychain locked".into()),
        );
        assert!(matches!(err, AccessError::Inaccessible { ref key, .. } if key == "org.dpppt.ephsIds"));
    }

    // Needs a reachable OS keyring (Keychain, Credential Manager or Secret Service).
    #[test]
    #[ignore]
    fn second_instance_reads_what_first_wrote() {
        let service = "org.dpppt.test.keyring-store";
        let key = "org.dpppt.keylist";
        let writer = KeyringByteStore::new(service);
        writer.put(key, b"persisted").expect("put");

        let reader = KeyringByteStore::new(service);
        let read = reader.get(key);
        reader.delete(key);
        assert_eq!(read.expect("get from second instance"), b"persisted");
        assert!(matches!(reader.get(key), Err(AccessError::NotFound { .. })));
    }
}
