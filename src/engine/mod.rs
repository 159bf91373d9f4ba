//! Upload/Download engine (component C7) — buffered and streaming paths
//! over the block pipeline, progress reporting, cancellation, and the
//! smart-upload encryption policy (spec §4.7).

pub mod download;
pub mod upload;

use std::sync::Arc;

use crate::cache::Cache;
use crate::descriptor::store::{EncryptedDescriptorStore, PlaintextDescriptorStore};
use crate::metrics::Metrics;
use crate::randomizer::RandomizerSelector;
use crate::storage::StorageBackend;

/// Well-defined progress stages an engine reports through (spec §4.7).
/// Callbacks must be non-blocking; the engine does not wait on them.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Reading,
    Splitting,
    Processing { current: usize, total: usize },
    SavingDescriptor,
    DownloadingBlocks { current: usize, total: usize },
    Assembling,
    Complete,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

pub(crate) fn report(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}

/// `{enable_default_encryption, require_encryption, allow_unencrypted,
/// password_provider}` (spec §4.7).
pub struct EncryptionPolicy {
    pub enable_default_encryption: bool,
    pub require_encryption: bool,
    pub allow_unencrypted: bool,
    pub password_provider: Option<Arc<dyn crate::password::PasswordProvider>>,
}

impl Default for EncryptionPolicy {
    fn default() -> Self {
        Self { enable_default_encryption: false, require_encryption: false, allow_unencrypted: true, password_provider: None }
    }
}

pub(crate) enum UploadMode {
    Plain,
    Encrypted(String),
}

/// The smart-upload decision tree (spec §4.7's truth table). Encodes:
/// a non-empty password from the provider always wins; absent that,
/// `require_encryption` forces an error and `allow_unencrypted` is the
/// only other way out.
pub(crate) fn decide_upload_mode(policy: &EncryptionPolicy) -> Result<UploadMode, crate::error::NoiseFsError> {
    if !policy.enable_default_encryption {
        return Ok(UploadMode::Plain);
    }

    let effective_password = policy.password_provider.as_ref().and_then(|provider| match provider.provide() {
        Ok(password) if !password.is_empty() => Some(password),
        _ => None,
    });

    if let Some(password) = effective_password {
        return Ok(UploadMode::Encrypted(password));
    }

    if policy.require_encryption {
        return Err(crate::error::NoiseFsError::InvalidInput(
            "encryption is required but no usable password was provided".into(),
        ));
    }

    if policy.allow_unencrypted {
        Ok(UploadMode::Plain)
    } else {
        Err(crate::error::NoiseFsError::InvalidInput(
            "no usable password was provided and unencrypted upload is not allowed".into(),
        ))
    }
}

/// Shared collaborators every upload/download call needs (spec data flow:
/// C7 drives C1/C2/C4/C5/C6, observed by C8).
pub struct Engine {
    pub(crate) storage: Arc<dyn StorageBackend>,
    pub(crate) cache: Arc<dyn Cache>,
    pub(crate) randomizer: Arc<RandomizerSelector>,
    pub(crate) plaintext_store: PlaintextDescriptorStore,
    pub(crate) encrypted_store: EncryptedDescriptorStore,
    pub(crate) metrics: Arc<Metrics>,
}

impl Engine {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        cache: Arc<dyn Cache>,
        randomizer: Arc<RandomizerSelector>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            plaintext_store: PlaintextDescriptorStore::new(storage.clone()),
            encrypted_store: EncryptedDescriptorStore::new(storage.clone(), crate::descriptor::store::KdfParams::default()),
            storage,
            cache,
            randomizer,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn plaintext_descriptor_store(&self) -> &PlaintextDescriptorStore {
        &self.plaintext_store
    }

    pub fn encrypted_descriptor_store(&self) -> &EncryptedDescriptorStore {
        &self.encrypted_store
    }

    /// Fetch a block, preferring the cache over a storage round-trip and
    /// backfilling the cache on miss (spec §4.8: every lookup is either a
    /// cache hit or miss, always recorded).
    pub(crate) fn fetch_block(
        &self,
        ctx: &crate::context::CancellationToken,
        cid: crate::block::Cid,
    ) -> Result<crate::block::Block, crate::error::NoiseFsError> {
        if let Some(block) = self.cache.get(&cid) {
            self.metrics.record_cache_hit();
            return Ok(block);
        }
        self.metrics.record_cache_miss();
        let addr = crate::storage::BlockAddress::new(cid);
        let block = self.storage.get(ctx, &addr)?;
        self.cache.store(block.clone());
        Ok(block)
    }
}
