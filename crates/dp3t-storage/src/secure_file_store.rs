use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dp3t_core::storage::{AccessError, SecureByteStore};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{instrument, warn};

use crate::key_provider::{KeyMaterial, KeyProvider};

/// AES-GCM encrypted file-backed store implementing `SecureByteStore`.
/// The data key is held by a `KeyProvider` (OS keyring in production), so
/// entries are readable exactly when the keyring is.
pub struct EncryptedFileStore<P: KeyProvider> {
    root: PathBuf,
    key_provider: P,
}

impl<P: KeyProvider> EncryptedFileStore<P> {
    pub fn new(root: impl Into<PathBuf>, key_provider: P) -> Self {
        Self {
            root: root.into(),
            key_provider,
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }

    fn cipher(&self, key: &str) -> Result<Aes256Gcm, AccessError> {
        let material = self
            .key_provider
            .get_or_create()
            .map_err(|e| inaccessible(key, format!("key provider: {e}")))?;
        build_cipher(key, &material)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredBlob {
    nonce: String,
    ciphertext: String,
}

impl<P: KeyProvider> SecureByteStore for EncryptedFileStore<P> {
    #[instrument(skip_all, fields(key = %key))]
    fn put(&self, key: &str, value: &[u8]) -> Result<(), AccessError> {
        fs::create_dir_all(&self.root).map_err(|e| inaccessible(key, e))?;

        let cipher = self.cipher(key)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, value)
            .map_err(|e| inaccessible(key, format!("encrypt failed: {e}")))?;

        let blob = StoredBlob {
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        };

        // Rename over the old file is this backend's delete-then-insert.
        write_blob(key, &self.path_for(key), &blob)
    }

    #[instrument(skip_all, fields(key = %key))]
    fn get(&self, key: &str) -> Result<Vec<u8>, AccessError> {
        let blob = read_blob(key, &self.path_for(key))?;
        let cipher = self.cipher(key)?;

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(blob.nonce)
            .map_err(|e| inaccessible(key, format!("nonce decode failed: {e}")))?;
        if nonce_bytes.len() != 12 {
            return Err(inaccessible(
                key,
                format!("nonce must be 12 bytes, got {}", nonce_bytes.len()),
            ));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = URL_SAFE_NO_PAD
            .decode(blob.ciphertext)
            .map_err(|e| inaccessible(key, format!("ciphertext decode failed: {e}")))?;

        cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|e| inaccessible(key, format!("decrypt failed: {e}")))
    }

    #[instrument(skip_all, fields(key = %key))]
    fn delete(&self, key: &str) {
        match fs::remove_file(self.path_for(key)) {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(error = %err, "failed to remove record file"),
        }
    }
}

fn write_blob(key: &str, path: &Path, blob: &StoredBlob) -> Result<(), AccessError> {
    let parent = path
        .parent()
        .ok_or_else(|| inaccessible(key, "invalid storage path"))?;
    fs::create_dir_all(parent).map_err(|e| inaccessible(key, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| inaccessible(key, e))?;
    let json = serde_json::to_vec(blob).map_err(|e| inaccessible(key, e))?;
    tmp.write_all(&json).map_err(|e| inaccessible(key, e))?;
    tmp.flush().map_err(|e| inaccessible(key, e))?;
    tmp.persist(path).map_err(|e| inaccessible(key, e.error))?;
    Ok(())
}

fn read_blob(key: &str, path: &Path) -> Result<StoredBlob, AccessError> {
    let mut file = File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            AccessError::NotFound {
                key: key.to_string(),
            }
        } else {
            inaccessible(key, err)
        }
    })?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|e| inaccessible(key, e))?;
    serde_json::from_slice(&buf).map_err(|e| inaccessible(key, e))
}

fn build_cipher(key: &str, material: &KeyMaterial) -> Result<Aes256Gcm, AccessError> {
    Aes256Gcm::new_from_slice(&material.bytes)
        .map_err(|e| inaccessible(key, format!("cipher init failed: {e}")))
}

fn sanitize_key(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(key)
}

fn inaccessible<E: ToString>(key: &str, err: E) -> AccessError {
    AccessError::Inaccessible {
        key: key.to_string(),
        reason: err.to_string(),
    }
}
