//! # noisefs — OFFSystem-style anonymized block storage engine
//!
//! Core invariants (frozen, spec §3):
//! - A block's identity is its BLAKE3 content hash; there is no separate tag
//! - `data ⊕ r1 ⊕ r2` and its inverse are the same XOR call (P2)
//! - Every persisted block is exactly `block_size` bytes; the final chunk of
//!   a file is zero-padded, never stored short
//! - A descriptor's three CIDs per triple are always pairwise distinct
//! - The storage backend and peer manager are external collaborators; this
//!   crate only ever consumes them through a trait object
//!
//! Module map:
//! - [`block`] — content addressing and the XOR transform (C1)
//! - [`splitter`] — fixed-size chunking and reassembly (C2)
//! - [`storage`] — the pluggable storage backend facade (C5)
//! - [`cache`] — standard/adaptive/altruistic cache tiers (C3)
//! - [`randomizer`] — randomizer selection, diversity, availability (C4, C10)
//! - [`descriptor`] — the file manifest format and its stores (C6)
//! - [`engine`] — upload/download orchestration (C7)
//! - [`metrics`] — counters, derived rates, health (C8)
//! - [`secure`] — zeroizing buffers (C9)
//! - [`peer`] — the peer manager contract (consumed, optional)
//! - [`password`] — password provider implementations (consumed, optional)
//! - [`context`] — cooperative cancellation
//! - [`error`] — the unified error type at the Upload/Download boundary

pub mod block;
pub mod cache;
pub mod context;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod password;
pub mod peer;
pub mod randomizer;
pub mod secure;
pub mod splitter;
pub mod storage;

pub use block::{xor, Block, BlockError, Cid};
pub use context::CancellationToken;
pub use descriptor::{BlockTriple, Descriptor, DescriptorError};
pub use engine::{Engine, EncryptionPolicy, ProgressCallback, ProgressEvent};
pub use error::{Cancelled, NoiseFsError};
pub use metrics::{Metrics, MetricsSnapshot};
pub use randomizer::{RandomizerError, RandomizerSelector};
pub use storage::{BlockAddress, PutOutcome, StorageBackend, StorageError};
