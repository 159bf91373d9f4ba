//! An in-memory [`StorageBackend`] used by the crate's own tests, benches,
//! and doctests. Not meant for production use — spec §1 treats the real
//! backend as an external collaborator the core only consumes through the
//! trait.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::block::{Block, Cid};
use crate::context::CancellationToken;

use super::{BlockAddress, PutOutcome, StorageBackend, StorageError};

#[derive(Default)]
pub struct MemoryBackend {
    blocks: Mutex<HashMap<Cid, Block>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryBackend {
    fn put(&self, ctx: &CancellationToken, block: &Block) -> Result<PutOutcome, StorageError> {
        ctx.check()?;
        let address = BlockAddress::new(block.id());
        let mut blocks = self.blocks.lock().unwrap();
        let new_bytes = if blocks.contains_key(&block.id()) { 0 } else { block.len() as u64 };
        blocks.insert(block.id(), block.clone());
        Ok(PutOutcome { address, new_bytes })
    }

    fn get(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<Block, StorageError> {
        ctx.check()?;
        self.blocks
            .lock()
            .unwrap()
            .get(&addr.cid)
            .cloned()
            .ok_or(StorageError::NotFound(addr.cid))
    }

    fn has(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<bool, StorageError> {
        ctx.check()?;
        Ok(self.blocks.lock().unwrap().contains_key(&addr.cid))
    }

    fn delete(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<(), StorageError> {
        ctx.check()?;
        self.blocks.lock().unwrap().remove(&addr.cid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let backend = MemoryBackend::new();
        let ctx = CancellationToken::none();
        let block = Block::new(vec![1, 2, 3, 4], 4).unwrap();

        let outcome = backend.put(&ctx, &block).unwrap();
        assert!(backend.has(&ctx, &outcome.address).unwrap());
        assert_eq!(outcome.new_bytes, 4);

        let fetched = backend.get(&ctx, &outcome.address).unwrap();
        assert_eq!(fetched.as_bytes(), block.as_bytes());
    }

    #[test]
    fn get_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let ctx = CancellationToken::none();
        let block = Block::new(vec![9, 9, 9, 9], 4).unwrap();
        let addr = BlockAddress::new(block.id());
        assert!(matches!(backend.get(&ctx, &addr), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn delete_removes_block() {
        let backend = MemoryBackend::new();
        let ctx = CancellationToken::none();
        let block = Block::new(vec![1, 1, 1, 1], 4).unwrap();
        let outcome = backend.put(&ctx, &block).unwrap();
        backend.delete(&ctx, &outcome.address).unwrap();
        assert!(!backend.has(&ctx, &outcome.address).unwrap());
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let backend = MemoryBackend::new();
        let ctx = CancellationToken::new();
        ctx.cancel();
        let block = Block::new(vec![1, 2, 3, 4], 4).unwrap();
        assert!(matches!(backend.put(&ctx, &block), Err(StorageError::Cancelled)));
    }
}
