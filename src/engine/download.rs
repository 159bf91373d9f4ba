//! Download paths (spec §4.7): buffered (accumulate then truncate) and
//! streaming (write each reconstructed block through a length-limited sink
//! as soon as it's available, never holding the whole file in memory).

use std::io::Write;

use crate::block;
use crate::context::CancellationToken;
use crate::descriptor::Descriptor;
use crate::error::NoiseFsError;
use crate::splitter::{assemble, LengthLimitedSink};
use crate::storage::BlockAddress;

use super::{report, Engine, ProgressCallback, ProgressEvent};

impl Engine {
    /// Loads the descriptor, reconstructs every block, and returns the
    /// assembled file trimmed to `file_size`.
    pub fn download_buffered(
        &self,
        ctx: &CancellationToken,
        descriptor_addr: &BlockAddress,
        password: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> Result<Vec<u8>, NoiseFsError> {
        let descriptor = self.load_descriptor(ctx, descriptor_addr, password)?;
        let total = descriptor.triples().len();
        tracing::debug!(block_count = total, "loaded descriptor, reconstructing blocks");

        let mut blocks = Vec::with_capacity(total);
        for (i, triple) in descriptor.triples().iter().enumerate() {
            ctx.check()?;
            report(&progress, ProgressEvent::DownloadingBlocks { current: i, total });
            let data = self.fetch_block(ctx, triple.data_cid)?;
            let r1 = self.fetch_block(ctx, triple.rand1_cid)?;
            let r2 = self.fetch_block(ctx, triple.rand2_cid)?;
            blocks.push(block::xor(&[&data, &r1, &r2])?);
        }

        report(&progress, ProgressEvent::Assembling);
        let out = assemble(&blocks, descriptor.file_size);

        self.metrics.record_download();
        tracing::debug!(file_size = out.len(), "download complete");
        report(&progress, ProgressEvent::Complete);
        Ok(out)
    }

    /// Reconstructs and writes each block to `sink` as soon as its triple is
    /// resolved, bounding memory to one block at a time (spec P8).
    pub fn download_streaming<W: Write>(
        &self,
        ctx: &CancellationToken,
        descriptor_addr: &BlockAddress,
        password: Option<&str>,
        sink: W,
        progress: Option<ProgressCallback>,
    ) -> Result<W, NoiseFsError> {
        let descriptor = self.load_descriptor(ctx, descriptor_addr, password)?;
        let total = descriptor.triples().len();
        let mut limited = LengthLimitedSink::new(sink, descriptor.file_size);

        for (i, triple) in descriptor.triples().iter().enumerate() {
            ctx.check()?;
            report(&progress, ProgressEvent::DownloadingBlocks { current: i, total });
            let data = self.fetch_block(ctx, triple.data_cid)?;
            let r1 = self.fetch_block(ctx, triple.rand1_cid)?;
            let r2 = self.fetch_block(ctx, triple.rand2_cid)?;
            let plain = block::xor(&[&data, &r1, &r2])?;

            report(&progress, ProgressEvent::Assembling);
            limited.write_all(plain.as_bytes()).map_err(|e| NoiseFsError::InvalidInput(e.to_string()))?;
        }

        self.metrics.record_download();
        report(&progress, ProgressEvent::Complete);
        Ok(limited.into_inner())
    }

    fn load_descriptor(
        &self,
        ctx: &CancellationToken,
        addr: &BlockAddress,
        password: Option<&str>,
    ) -> Result<Descriptor, NoiseFsError> {
        Ok(match password {
            Some(pw) => self.encrypted_store.load(ctx, addr, pw)?,
            None => self.plaintext_store.load(ctx, addr)?,
        })
    }
}
