//! Crate-level error taxonomy.
//!
//! Each module defines its own narrow error enum (`BlockError`,
//! `StorageError`, `DescriptorError`, ...) the way the teacher crate scopes
//! `CodecError` to `codec/mod.rs` and `CryptoError` to `crypto/mod.rs`.
//! `NoiseFsError` unifies them at the Upload/Download boundary (spec §7);
//! internal-only kinds (cache miss, availability degraded, health degraded)
//! never reach this type — they're resolved inside the owning module.

use thiserror::Error;

use crate::block::BlockError;
use crate::descriptor::DescriptorError;
use crate::randomizer::RandomizerError;
use crate::storage::StorageError;

/// Raised when a cancellation token fires mid-operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Errors surfaced at the boundary of Upload/Download calls (spec §7).
///
/// Every variant here is an "external" kind per the spec's error taxonomy:
/// it is meant to propagate to the caller, wrapped with enough context
/// (stage, block index where applicable) to diagnose without reading logs.
#[derive(Error, Debug)]
pub enum NoiseFsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("block error: {0}")]
    Block(#[from] BlockError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("randomizer selection failed: {0}")]
    Randomizer(#[from] RandomizerError),

    #[error("{0}")]
    Cancelled(#[from] Cancelled),

    #[error("during {stage}{}: {source}", block_index.map(|i| format!(" (block {i})")).unwrap_or_default())]
    Stage {
        stage: &'static str,
        block_index: Option<usize>,
        #[source]
        source: Box<NoiseFsError>,
    },
}

impl NoiseFsError {
    /// Wrap an error with the pipeline stage it failed in, per spec §7's
    /// propagation rule ("wrapped with context: stage, block index").
    pub fn at_stage(self, stage: &'static str, block_index: Option<usize>) -> Self {
        NoiseFsError::Stage { stage, block_index, source: Box::new(self) }
    }
}
