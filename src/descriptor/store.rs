//! Plaintext and encrypted descriptor stores (spec §4.6).
//!
//! The encrypted store's KDF and AEAD choices mirror the teacher's
//! `crypto::{derive_key, encrypt, decrypt}` (Argon2id + AES-256-GCM), but the
//! wrapper format and the salt/nonce are per-descriptor rather than
//! per-archive, and authenticated associated data binds the ciphertext to
//! the descriptor format version (spec §4.6).

use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::context::CancellationToken;
use crate::storage::{BlockAddress, StorageBackend};

use super::{Descriptor, DescriptorError, FORMAT_VERSION};

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy)]
pub struct KdfParams {
    pub time_cost: u32,
    pub memory_cost_kib: u32,
    pub parallelism: u8,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { time_cost: 3, memory_cost_kib: 64 * 1024, parallelism: 1 }
    }
}

/// Writes the serialized descriptor as a single block via the storage
/// facade and returns its address (spec §4.6).
pub struct PlaintextDescriptorStore {
    storage: Arc<dyn StorageBackend>,
}

impl PlaintextDescriptorStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub fn save(&self, ctx: &CancellationToken, descriptor: &Descriptor) -> Result<BlockAddress, DescriptorError> {
        let bytes = descriptor.encode();
        let block = crate::block::Block::new_unchecked(bytes);
        Ok(self.storage.put(ctx, &block)?.address)
    }

    pub fn load(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<Descriptor, DescriptorError> {
        let block = self.storage.get(ctx, addr)?;
        Descriptor::decode(block.as_bytes())
    }
}

impl From<crate::storage::StorageError> for DescriptorError {
    fn from(e: crate::storage::StorageError) -> Self {
        DescriptorError::InvalidInput(e.to_string())
    }
}

/// Derives a key from a password with Argon2id, encrypts the serialized
/// descriptor with AES-256-GCM, and prepends `{salt, nonce, kdf_params}`
/// before storing the wrapper as a single block (spec §4.6, §6).
pub struct EncryptedDescriptorStore {
    storage: Arc<dyn StorageBackend>,
    kdf_params: KdfParams,
}

impl EncryptedDescriptorStore {
    pub fn new(storage: Arc<dyn StorageBackend>, kdf_params: KdfParams) -> Self {
        Self { storage, kdf_params }
    }

    pub fn save(&self, ctx: &CancellationToken, descriptor: &Descriptor, password: &str) -> Result<BlockAddress, DescriptorError> {
        let plaintext = descriptor.encode();

        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let key = derive_key(password, &salt, &self.kdf_params)?;

        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| DescriptorError::InvalidInput("invalid key length".into()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut AeadOsRng);
        let aad = FORMAT_VERSION.to_le_bytes();
        let ciphertext = cipher
            .encrypt(&nonce, Payload { msg: &plaintext, aad: &aad })
            .map_err(|_| DescriptorError::InvalidInput("encryption failed".into()))?;

        let mut wrapper = Vec::with_capacity(SALT_LEN + NONCE_LEN + 12 + ciphertext.len());
        wrapper.extend_from_slice(&salt);
        wrapper.extend_from_slice(nonce.as_slice());
        wrapper.extend_from_slice(&self.kdf_params.time_cost.to_le_bytes());
        wrapper.extend_from_slice(&self.kdf_params.memory_cost_kib.to_le_bytes());
        wrapper.push(self.kdf_params.parallelism);
        wrapper.extend_from_slice(&(ciphertext.len() as u64).to_le_bytes());
        wrapper.extend_from_slice(&ciphertext);

        let block = crate::block::Block::new_unchecked(wrapper);
        Ok(self.storage.put(ctx, &block)?.address)
    }

    pub fn load(&self, ctx: &CancellationToken, addr: &BlockAddress, password: &str) -> Result<Descriptor, DescriptorError> {
        let block = self.storage.get(ctx, addr)?;
        let bytes = block.as_bytes();

        let header_len = SALT_LEN + NONCE_LEN + 4 + 4 + 1 + 8;
        if bytes.len() < header_len {
            return Err(DescriptorError::Corrupt("encrypted descriptor wrapper truncated".into()));
        }

        let salt = &bytes[0..SALT_LEN];
        let nonce_bytes = &bytes[SALT_LEN..SALT_LEN + NONCE_LEN];
        let mut pos = SALT_LEN + NONCE_LEN;
        let time_cost = read_u32(bytes, &mut pos);
        let memory_cost_kib = read_u32(bytes, &mut pos);
        let parallelism = bytes[pos];
        pos += 1;
        let ciphertext_len = read_u64(bytes, &mut pos) as usize;

        if bytes.len() < pos + ciphertext_len {
            return Err(DescriptorError::Corrupt("encrypted descriptor ciphertext truncated".into()));
        }
        let ciphertext = &bytes[pos..pos + ciphertext_len];

        let kdf_params = KdfParams { time_cost, memory_cost_kib, parallelism };
        let key = derive_key(password, salt, &kdf_params)?;
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| DescriptorError::InvalidInput("invalid key length".into()))?;
        let nonce = Nonce::from_slice(nonce_bytes);
        let aad = FORMAT_VERSION.to_le_bytes();

        // AEAD failure is authentication failure, never descriptor
        // corruption (spec §4.6, §7: kept distinct).
        let plaintext = cipher
            .decrypt(nonce, Payload { msg: ciphertext, aad: &aad })
            .map_err(|_| DescriptorError::AuthFailed)?;

        Descriptor::decode(&plaintext)
    }
}

fn derive_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<[u8; 32], DescriptorError> {
    let argon2_params = Params::new(params.memory_cost_kib, params.time_cost, params.parallelism as u32, Some(32))
        .map_err(|e| DescriptorError::InvalidInput(format!("invalid KDF parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| DescriptorError::InvalidInput(format!("key derivation failed: {e}")))?;
    Ok(key)
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> u32 {
    let v = u32::from_le_bytes(bytes[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    v
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> u64 {
    let v = u64::from_le_bytes(bytes[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::BlockTriple;
    use crate::storage::memory::MemoryBackend;

    fn sample_descriptor() -> Descriptor {
        let mut d = Descriptor::new("secret.txt", 64).unwrap();
        d.append_triple(BlockTriple::new(crate::block::Cid([1; 32]), crate::block::Cid([2; 32]), crate::block::Cid([3; 32])).unwrap());
        d.seal(64).unwrap();
        d
    }

    #[test]
    fn plaintext_store_round_trips() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let store = PlaintextDescriptorStore::new(storage);
        let ctx = CancellationToken::none();

        let descriptor = sample_descriptor();
        let addr = store.save(&ctx, &descriptor).unwrap();
        let loaded = store.load(&ctx, &addr).unwrap();

        assert_eq!(loaded.filename, "secret.txt");
        assert_eq!(loaded.triples().len(), 1);
    }

    #[test]
    fn encrypted_store_round_trips_with_correct_password() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        // Minimal-cost KDF params so the test runs fast.
        let store = EncryptedDescriptorStore::new(storage, KdfParams { time_cost: 1, memory_cost_kib: 8, parallelism: 1 });
        let ctx = CancellationToken::none();

        let descriptor = sample_descriptor();
        let addr = store.save(&ctx, &descriptor, "correct horse").unwrap();
        let loaded = store.load(&ctx, &addr, "correct horse").unwrap();

        assert_eq!(loaded.filename, "secret.txt");
    }

    #[test]
    fn encrypted_store_rejects_wrong_password_as_auth_failure() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let store = EncryptedDescriptorStore::new(storage, KdfParams { time_cost: 1, memory_cost_kib: 8, parallelism: 1 });
        let ctx = CancellationToken::none();

        let descriptor = sample_descriptor();
        let addr = store.save(&ctx, &descriptor, "correct horse").unwrap();

        let err = store.load(&ctx, &addr, "wrong").unwrap_err();
        assert!(matches!(err, DescriptorError::AuthFailed));

        let err_empty = store.load(&ctx, &addr, "").unwrap_err();
        assert!(matches!(err_empty, DescriptorError::AuthFailed));
    }
}
