use std::path::PathBuf;

use crate::config::{Backend, Config};
use color_eyre::Result;
use dirs::data_dir;
use dp3t_core::storage::SecureByteStore;
use dp3t_records::SecureRecordStore;
#[cfg(test)]
use dp3t_storage::key_provider::InMemoryKeyProvider;
use dp3t_storage::{
    key_provider::KeyringProvider, keyring_store::KeyringByteStore,
    secure_file_store::EncryptedFileStore,
};
use tracing::debug;

/// Keyring service used when the config does not name one.
pub const DEFAULT_SERVICE: &str = "org.dpppt";
/// Keyring account holding the file backend's data key.
const DATA_KEY_ACCOUNT: &str = "org.dpppt.datakey";

pub type RecordStore = SecureRecordStore<Box<dyn SecureByteStore>>;

/// Resolve the default data directory for the encrypted file backend.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("dp3t"))
}

/// Build the byte store selected by the config.
pub fn byte_store_from_config(config: &Config) -> Result<Box<dyn SecureByteStore>> {
    let service = config
        .service
        .clone()
        .unwrap_or_else(|| DEFAULT_SERVICE.to_string());

    match config.backend {
        Backend::Keyring => {
            debug!(%service, "initializing keyring store");
            Ok(Box::new(KeyringByteStore::new(service)))
        }
        Backend::File => {
            let root = match &config.data_dir {
                Some(root) => root.clone(),
                None => default_data_dir()?,
            };
            debug!(?root, "initializing encrypted file store");
            Ok(Box::new(EncryptedFileStore::new(
                root,
                KeyringProvider::new(service, DATA_KEY_ACCOUNT),
            )))
        }
    }
}

/// Build the record store over the configured backend.
pub fn records_from_config(config: &Config) -> Result<RecordStore> {
    Ok(SecureRecordStore::new(byte_store_from_config(config)?))
}

/// Helper for tests to construct a store rooted at a temp dir with an in-memory key.
#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>) -> EncryptedFileStore<InMemoryKeyProvider> {
    EncryptedFileStore::new(root, InMemoryKeyProvider::default())
}
