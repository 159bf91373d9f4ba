//! Upload paths (spec §4.7): buffered (whole file held in memory),
//! streaming (O(block_size) memory via [`crate::splitter::split_streaming`]),
//! and smart (the encryption policy decides plain vs. encrypted).

use std::io::{Cursor, Read};

use crate::block::{self, Block};
use crate::context::CancellationToken;
use crate::descriptor::{BlockTriple, Descriptor};
use crate::error::NoiseFsError;
use crate::splitter::{self, SplitterError};
use crate::storage::BlockAddress;

use super::{decide_upload_mode, report, Engine, EncryptionPolicy, ProgressCallback, ProgressEvent, UploadMode};

/// Bounded in-flight window for parallel block processing (spec §5: "≥ 1,
/// ≤ 16 suggested").
#[cfg(feature = "parallel")]
const PARALLEL_WINDOW: usize = 16;

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub descriptor_address: BlockAddress,
    pub file_size: u64,
    pub block_count: usize,
    pub bytes_stored: u64,
}

impl Engine {
    /// Reads the whole input into memory before splitting. Simplest path;
    /// costs O(file_size) memory.
    pub fn upload_buffered(
        &self,
        ctx: &CancellationToken,
        mut reader: impl Read,
        filename: &str,
        block_size: u32,
        password: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadResult, NoiseFsError> {
        report(&progress, ProgressEvent::Reading);
        let mut data = Vec::new();
        reader.read_to_end(&mut data).map_err(|e| NoiseFsError::InvalidInput(e.to_string()))?;

        report(&progress, ProgressEvent::Splitting);
        let (blocks, file_size) =
            splitter::split(Cursor::new(data), block_size as usize).map_err(|e| NoiseFsError::InvalidInput(e.to_string()))?;
        tracing::debug!(block_count = blocks.len(), file_size, "split input into blocks");

        let mut descriptor = Descriptor::new(filename, block_size)?;
        let bytes_stored = self.process_blocks(ctx, block_size as usize, &blocks, &mut descriptor, &progress)?;

        self.finish_upload(ctx, descriptor, file_size, bytes_stored, password, &progress)
    }

    /// Processes a whole slice of already-split blocks, appending their
    /// triples to `descriptor` in input order. With the `parallel` feature
    /// enabled, blocks are anonymized and stored in bounded-size windows
    /// (spec §5: "may parallelize independent blocks up to a bounded
    /// in-flight window"); the descriptor itself is still only ever
    /// appended to from this one thread, preserving the ordering invariant
    /// (triple order equals input block order) without needing it to be
    /// concurrent-safe.
    fn process_blocks(
        &self,
        ctx: &CancellationToken,
        block_size: usize,
        blocks: &[Block],
        descriptor: &mut Descriptor,
        progress: &Option<ProgressCallback>,
    ) -> Result<u64, NoiseFsError> {
        let total = blocks.len();
        let mut bytes_stored = 0u64;

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            let mut processed = 0usize;
            for window in blocks.chunks(PARALLEL_WINDOW) {
                ctx.check()?;
                let results: Vec<Result<(BlockTriple, u64), NoiseFsError>> =
                    window.par_iter().map(|block| self.anonymize_block(ctx, block_size, block)).collect();

                for result in results {
                    let (triple, generated, stored) = match result {
                        Ok((triple, stored)) => (triple, self.count_generated(block_size, stored), stored),
                        Err(e) => return Err(e),
                    };
                    descriptor.append_triple(triple);
                    self.record_reuse_metrics(generated);
                    bytes_stored += stored;
                    processed += 1;
                    report(progress, ProgressEvent::Processing { current: processed, total });
                }
            }
            return Ok(bytes_stored);
        }

        #[cfg(not(feature = "parallel"))]
        {
            for (i, block) in blocks.iter().enumerate() {
                ctx.check()?;
                bytes_stored += self.process_block(ctx, block_size, block, descriptor)?;
                report(progress, ProgressEvent::Processing { current: i + 1, total });
            }
            Ok(bytes_stored)
        }
    }

    /// Splits and processes the input one block at a time, never holding
    /// more than a handful of blocks in memory regardless of file size
    /// (spec P8).
    pub fn upload_streaming(
        &self,
        ctx: &CancellationToken,
        reader: impl Read,
        filename: &str,
        block_size: u32,
        password: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadResult, NoiseFsError> {
        report(&progress, ProgressEvent::Reading);
        report(&progress, ProgressEvent::Splitting);

        let mut descriptor = Descriptor::new(filename, block_size)?;
        let mut processed = 0usize;
        let mut bytes_stored = 0u64;
        // `split_streaming`'s callback is typed `SplitterError`, which can't
        // carry a `NoiseFsError`'s cause. Stash the real error here and
        // return an opaque abort sentinel from the callback; the sentinel
        // is only ever inspected if this slot is empty (spec §7: the
        // typed error taxonomy — Storage/Randomizer/Block/Cancelled — must
        // reach the caller, not collapse into `InvalidInput`).
        let mut callback_err: Option<NoiseFsError> = None;

        let file_size = splitter::split_streaming(reader, block_size as usize, |index, block| {
            if ctx.check().is_err() {
                callback_err = Some(NoiseFsError::Cancelled(crate::error::Cancelled));
                return Err(callback_abort());
            }
            match self.process_block(ctx, block_size as usize, &block, &mut descriptor) {
                Ok(stored) => {
                    bytes_stored += stored;
                    processed = index + 1;
                    report(&progress, ProgressEvent::Processing { current: processed, total: processed });
                    Ok(())
                }
                Err(e) => {
                    callback_err = Some(e);
                    Err(callback_abort())
                }
            }
        })
        .map_err(|e| match callback_err {
            Some(err) => err,
            None => NoiseFsError::InvalidInput(e.to_string()),
        })?;

        self.finish_upload(ctx, descriptor, file_size, bytes_stored, password, &progress)
    }

    /// Dispatches to encrypted or plain storage per the configured
    /// encryption policy (spec §4.7's smart-upload decision table), then
    /// always runs the streaming path.
    pub fn smart_upload(
        &self,
        ctx: &CancellationToken,
        reader: impl Read,
        filename: &str,
        block_size: u32,
        policy: &EncryptionPolicy,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadResult, NoiseFsError> {
        match decide_upload_mode(policy)? {
            UploadMode::Plain => self.upload_streaming(ctx, reader, filename, block_size, None, progress),
            UploadMode::Encrypted(password) => self.upload_streaming(ctx, reader, filename, block_size, Some(&password), progress),
        }
    }

    /// Selects randomizers, anonymizes `block`, persists the anonymized
    /// block, and appends the resulting triple. Returns the number of new
    /// bytes this call caused to be written to the backend (anonymized
    /// block plus any freshly generated randomizers), for storage-efficiency
    /// metrics (spec §4.5, §4.8). Used by the sequential (non-`parallel`)
    /// path, where descriptor mutation can happen inline.
    fn process_block(
        &self,
        ctx: &CancellationToken,
        block_size: usize,
        block: &Block,
        descriptor: &mut Descriptor,
    ) -> Result<u64, NoiseFsError> {
        let (triple, bytes_stored) = self.anonymize_block(ctx, block_size, block)?;
        let generated = self.count_generated(block_size, bytes_stored);
        descriptor.append_triple(triple);
        self.record_reuse_metrics(generated);
        Ok(bytes_stored)
    }

    /// Selects randomizers, anonymizes `block`, and persists the anonymized
    /// block, returning the triple and the number of new bytes stored
    /// without touching `descriptor` — the piece of `process_block` that is
    /// safe to run concurrently across blocks (spec §5: caches and storage
    /// are concurrency-safe, the descriptor under construction is not).
    fn anonymize_block(&self, ctx: &CancellationToken, block_size: usize, block: &Block) -> Result<(BlockTriple, u64), NoiseFsError> {
        ctx.check()?;
        let selection = self.randomizer.select_randomizers(ctx, block_size)?;
        tracing::trace!(cid1 = %selection.cid1, cid2 = %selection.cid2, "selected randomizers");
        let anon = block::xor(&[block, &selection.r1, &selection.r2])?;

        ctx.check()?;
        let outcome = self.storage.put(ctx, &anon)?;
        let triple = BlockTriple::new(anon.id(), selection.cid1, selection.cid2)?;
        tracing::trace!(data_cid = %triple.data_cid, "stored anonymized block, appended triple");

        Ok((triple, outcome.new_bytes + selection.new_bytes_stored))
    }

    fn count_generated(&self, block_size: usize, bytes_stored: u64) -> u64 {
        let per_block = block_size as u64;
        if per_block == 0 {
            return 0;
        }
        // bytes_stored includes the anonymized block itself plus whichever
        // of the two randomizers were freshly generated rather than reused.
        (bytes_stored / per_block).saturating_sub(1).min(2)
    }

    fn record_reuse_metrics(&self, generated: u64) {
        for _ in 0..generated {
            self.metrics.record_block_generated();
        }
        for _ in 0..(2 - generated) {
            self.metrics.record_block_reused();
        }
    }

    fn finish_upload(
        &self,
        ctx: &CancellationToken,
        mut descriptor: Descriptor,
        file_size: u64,
        bytes_stored: u64,
        password: Option<&str>,
        progress: &Option<ProgressCallback>,
    ) -> Result<UploadResult, NoiseFsError> {
        descriptor.seal(file_size)?;
        report(progress, ProgressEvent::SavingDescriptor);

        let block_count = descriptor.triples().len();
        let descriptor_address = match password {
            Some(pw) => self.encrypted_store.save(ctx, &descriptor, pw)?,
            None => self.plaintext_store.save(ctx, &descriptor)?,
        };

        self.metrics.record_upload(descriptor.padded_file_size, bytes_stored);
        tracing::debug!(block_count, bytes_stored, cid = %descriptor_address.cid, "upload complete");
        report(progress, ProgressEvent::Complete);

        Ok(UploadResult { descriptor_address, file_size, block_count, bytes_stored })
    }
}

/// An opaque abort signal the callback in [`Engine::upload_streaming`]
/// returns to stop `split_streaming` early. The real, typed error is
/// recovered from the `callback_err` slot the callback populates before
/// returning this; it is never inspected for its own content.
fn callback_abort() -> SplitterError {
    SplitterError::Io(std::io::Error::other("aborted by block-processing callback"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::standard::{StandardCache, StandardCacheConfig};
    use crate::cache::Cache;
    use crate::metrics::Metrics;
    use crate::randomizer::RandomizerSelector;
    use crate::storage::memory::MemoryBackend;
    use crate::storage::StorageBackend;

    fn engine() -> Engine {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let cache: Arc<dyn Cache> = Arc::new(StandardCache::new(StandardCacheConfig::default()));
        let randomizer = Arc::new(RandomizerSelector::new(cache.clone(), storage.clone()));
        Engine::new(storage, cache, randomizer, Arc::new(Metrics::new()))
    }

    #[test]
    fn buffered_upload_produces_one_triple_per_block() {
        let engine = engine();
        let ctx = CancellationToken::none();
        let data = vec![b'A'; 130];

        let result = engine.upload_buffered(&ctx, Cursor::new(data), "a.txt", 64, None, None).unwrap();

        assert_eq!(result.file_size, 130);
        assert_eq!(result.block_count, 3);
    }

    #[test]
    fn streaming_upload_matches_buffered_block_count() {
        let engine = engine();
        let ctx = CancellationToken::none();
        let data = vec![b'B'; 257];

        let result = engine.upload_streaming(&ctx, Cursor::new(data), "b.txt", 64, None, None).unwrap();

        assert_eq!(result.file_size, 257);
        assert_eq!(result.block_count, 5);
    }

    #[test]
    fn cancelled_token_aborts_streaming_upload() {
        let engine = engine();
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = engine.upload_streaming(&ctx, Cursor::new(vec![1u8; 64]), "c.txt", 64, None, None).unwrap_err();
        assert!(matches!(err, NoiseFsError::Cancelled(_)));
    }

    #[test]
    fn smart_upload_with_no_policy_encryption_is_plain() {
        let engine = engine();
        let ctx = CancellationToken::none();
        let policy = EncryptionPolicy::default();

        let result = engine.smart_upload(&ctx, Cursor::new(vec![9u8; 64]), "d.txt", 64, &policy, None).unwrap();
        assert_eq!(result.block_count, 1);
        // A plain descriptor decodes directly without a password.
        engine.plaintext_store.load(&ctx, &result.descriptor_address).unwrap();
    }
}
