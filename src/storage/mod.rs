//! Storage facade (component C5) — a uniform Put/Get/Has/Delete surface over
//! a pluggable, externally-provided backend (spec §1 lists the backend
//! itself as an external collaborator; only this facade is core).
//!
//! Modeled the way the teacher resolves compression codecs in
//! `codec/mod.rs`: a small trait (`Codec` there, [`StorageBackend`] here)
//! plus a UUID/tag-keyed identity, except here the core never names a
//! concrete backend — it only consumes the trait.

use thiserror::Error;

use crate::block::{Block, Cid};
use crate::context::CancellationToken;

pub mod filesystem;
pub mod memory;

/// An opaque content identifier plus optional backend routing hints.
///
/// Two addresses with the same `cid` refer to the same logical block
/// regardless of which backend produced them (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAddress {
    pub cid: Cid,
    pub backend_tag: Option<String>,
    pub size_hint: Option<usize>,
}

impl BlockAddress {
    pub fn new(cid: Cid) -> Self {
        Self { cid, backend_tag: None, size_hint: None }
    }

    pub fn with_backend(cid: Cid, backend_tag: impl Into<String>) -> Self {
        Self { cid, backend_tag: Some(backend_tag.into()), size_hint: None }
    }
}

/// The outcome of a `put`: the resulting address plus how many bytes the
/// backend newly wrote (0 if the block was already present). Returned
/// directly rather than through a side channel so concurrent `put` calls
/// (spec §5, the `parallel` feature) can't race on a shared last-write cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub address: BlockAddress,
    pub new_bytes: u64,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("operation cancelled")]
    Cancelled,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("block not found for address {0}")]
    NotFound(Cid),
    #[error("backend I/O error: {0}")]
    Io(String),
}

impl From<crate::error::Cancelled> for StorageError {
    fn from(_: crate::error::Cancelled) -> Self {
        StorageError::Cancelled
    }
}

/// The pluggable content-addressed storage backend the core consumes.
///
/// Backends are identified by a string type tag (spec §6); the core never
/// names one, it only calls through this trait. Implementations must be
/// `Send + Sync` since the engine may call them from multiple worker
/// threads concurrently (spec §5).
pub trait StorageBackend: Send + Sync {
    fn put(&self, ctx: &CancellationToken, block: &Block) -> Result<PutOutcome, StorageError>;
    fn get(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<Block, StorageError>;
    fn has(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<bool, StorageError>;
    fn delete(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<(), StorageError>;

    /// Batched put; the default implementation calls `put` sequentially.
    /// Backends with native batch APIs should override this.
    fn put_many(
        &self,
        ctx: &CancellationToken,
        blocks: &[&Block],
    ) -> Result<Vec<PutOutcome>, StorageError> {
        let mut out = Vec::with_capacity(blocks.len());
        for b in blocks {
            ctx.check()?;
            out.push(self.put(ctx, b)?);
        }
        Ok(out)
    }

    fn get_many(
        &self,
        ctx: &CancellationToken,
        addrs: &[BlockAddress],
    ) -> Result<Vec<Block>, StorageError> {
        let mut out = Vec::with_capacity(addrs.len());
        for a in addrs {
            ctx.check()?;
            out.push(self.get(ctx, a)?);
        }
        Ok(out)
    }

    fn pin(&self, _ctx: &CancellationToken, _addr: &BlockAddress) -> Result<(), StorageError> {
        Ok(())
    }

    fn unpin(&self, _ctx: &CancellationToken, _addr: &BlockAddress) -> Result<(), StorageError> {
        Ok(())
    }

    fn health_check(&self, _ctx: &CancellationToken) -> Result<(), StorageError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn connect(&self, _ctx: &CancellationToken) -> Result<(), StorageError> {
        Ok(())
    }

    fn disconnect(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
