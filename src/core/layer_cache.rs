//! Cache keys for the dependency layer.
//!
//! The layer is reused across builds as long as the manifest bytes, the
//! installer and the base runtime are unchanged. Application code is not
//! part of the key, so code-only rebuilds skip installation.

use crate::domain::ports::Storage;
use crate::utils::error::Result;
use sha2::{Digest, Sha256};

pub const DEPS_LAYER: &str = "layers/deps";
pub const DEPS_DIGEST: &str = "layers/deps.digest";

pub fn manifest_digest(manifest: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(manifest)))
}

pub fn layer_key(manifest: &[u8], installer: &str, runtime: &str, version: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [manifest, installer.as_bytes(), runtime.as_bytes(), version.as_bytes()] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// True when the stored key matches and the layer directory is still there.
pub async fn is_fresh<S: Storage>(storage: &S, key: &str) -> bool {
    if !storage.exists(DEPS_LAYER) {
        return false;
    }
    match storage.read_file(DEPS_DIGEST).await {
        Ok(stored) => String::from_utf8_lossy(&stored).trim() == key,
        Err(_) => false,
    }
}

pub async fn invalidate<S: Storage>(storage: &S) -> Result<()> {
    storage.remove_file(DEPS_DIGEST).await
}

pub async fn record<S: Storage>(storage: &S, key: &str) -> Result<()> {
    storage.write_file(DEPS_DIGEST, key.as_bytes()).await
}
