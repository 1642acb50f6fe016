//! Platform `SecureByteStore` backends.
//! Records go straight into the OS keyring, or into AES-GCM encrypted files
//! whose data key is held by the OS keyring (or test doubles).

pub mod key_provider;
pub mod keyring_store;
pub mod secure_file_store;
