//! Block primitives (component C1) — fixed-size, content-addressed blocks
//! and the N-ary XOR transform that anonymizes them.
//!
//! # Identity
//! A [`Cid`] is the BLAKE3 digest of a block's bytes. Two blocks with
//! identical content always carry identical CIDs (spec P5); this is the
//! only identity notion blocks have — there is no separate "tag" stored on
//! disk distinguishing data/randomizer/padding blocks, because that
//! distinction is purely contextual (spec §3).
//!
//! # XOR is the only reversible transform
//! `anon = data ⊕ r1 ⊕ r2` and `data = anon ⊕ r1 ⊕ r2` use the same
//! operation ([`xor`]) in both directions. This identity is the foundation
//! the whole crate is built on (spec P2).

use thiserror::Error;

/// Content identifier: the BLAKE3 digest of a block's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(pub [u8; 32]);

impl Cid {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("block size must be positive, got {0}")]
    InvalidBlockSize(i64),
    #[error("XOR operands have mismatched sizes: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("block must be exactly {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("XOR requires at least two operands")]
    TooFewOperands,
    #[error("failed to generate {0} distinct randomizer CIDs after 10 attempts")]
    RandomizerGeneration(usize),
}

/// An immutable, fixed-size, content-addressed byte block.
///
/// Equality and reuse are by [`Cid`], not by value — two `Block`s built from
/// the same bytes compare unequal as values (there's no `PartialEq` impl)
/// but always report the same `id()`.
#[derive(Debug, Clone)]
pub struct Block {
    bytes: Vec<u8>,
    id: Cid,
}

impl Block {
    /// Construct a block from bytes, requiring the length to match
    /// `expected_size`. The splitter is the one caller allowed to bypass
    /// this (it pads the final chunk itself before calling in).
    pub fn new(bytes: Vec<u8>, expected_size: usize) -> Result<Self, BlockError> {
        if bytes.len() != expected_size {
            return Err(BlockError::WrongLength { expected: expected_size, actual: bytes.len() });
        }
        Ok(Self::new_unchecked(bytes))
    }

    /// Construct a block without a size check, trusted only for internal
    /// callers (the splitter's own padding path, XOR output construction).
    pub(crate) fn new_unchecked(bytes: Vec<u8>) -> Self {
        let id = Cid(blake3::hash(&bytes).into());
        Self { bytes, id }
    }

    /// Fill `size` bytes from a CSPRNG and wrap them as a block.
    pub fn new_random(size: usize) -> Result<Self, BlockError> {
        if size == 0 {
            return Err(BlockError::InvalidBlockSize(0));
        }
        use rand::RngCore;
        let mut bytes = vec![0u8; size];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Ok(Self::new_unchecked(bytes))
    }

    #[inline]
    pub fn id(&self) -> Cid {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// N-ary XOR across same-sized blocks.
///
/// `data ⊕ r1 ⊕ r2` (anonymization) and `anon ⊕ r1 ⊕ r2` (reconstruction)
/// are both this same call — the transform is its own inverse.
pub fn xor(blocks: &[&Block]) -> Result<Block, BlockError> {
    let (first, rest) = blocks.split_first().ok_or(BlockError::TooFewOperands)?;
    if rest.is_empty() {
        return Err(BlockError::TooFewOperands);
    }

    let expected = first.len();
    let mut out = first.as_bytes().to_vec();
    for b in rest {
        if b.len() != expected {
            return Err(BlockError::SizeMismatch { expected, actual: b.len() });
        }
        for (o, &byte) in out.iter_mut().zip(b.as_bytes()) {
            *o ^= byte;
        }
    }
    Ok(Block::new_unchecked(out))
}

/// Generate `count` random blocks of `size` bytes whose CIDs are pairwise
/// distinct, retrying collisions up to 10 times per spec §4.4 step 4.
pub fn new_distinct_random_blocks(count: usize, size: usize) -> Result<Vec<Block>, BlockError> {
    let mut out: Vec<Block> = Vec::with_capacity(count);
    for _ in 0..count {
        let mut attempt = 0;
        loop {
            let candidate = Block::new_random(size)?;
            if !out.iter().any(|b| b.id() == candidate.id()) {
                out.push(candidate);
                break;
            }
            attempt += 1;
            if attempt >= 10 {
                return Err(BlockError::RandomizerGeneration(count));
            }
        }
    }
    Ok(out)
}
