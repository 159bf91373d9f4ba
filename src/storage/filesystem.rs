//! A directory-backed [`StorageBackend`] the `noisefs` CLI uses as its
//! default, the way the teacher's `Archive` writes directly to a
//! `std::fs::File`. Production deployments are expected to plug in their own
//! backend (spec §1); this one exists so the CLI has something real to talk
//! to without inventing a network protocol.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::block::{Block, Cid};
use crate::context::CancellationToken;

use super::{BlockAddress, PutOutcome, StorageBackend, StorageError};

pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, cid: &Cid) -> PathBuf {
        self.root.join(cid.to_hex())
    }
}

impl StorageBackend for FilesystemBackend {
    fn put(&self, ctx: &CancellationToken, block: &Block) -> Result<PutOutcome, StorageError> {
        ctx.check()?;
        let path = self.path_for(&block.id());
        let mut new_bytes = 0u64;
        if !path.exists() {
            fs::write(&path, block.as_bytes()).map_err(|e| StorageError::Io(e.to_string()))?;
            new_bytes = block.len() as u64;
        }
        Ok(PutOutcome { address: BlockAddress::new(block.id()), new_bytes })
    }

    fn get(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<Block, StorageError> {
        ctx.check()?;
        let path = self.path_for(&addr.cid);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(addr.cid),
            _ => StorageError::Io(e.to_string()),
        })?;
        Ok(Block::new_unchecked(bytes))
    }

    fn has(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<bool, StorageError> {
        ctx.check()?;
        Ok(self.path_for(&addr.cid).exists())
    }

    fn delete(&self, ctx: &CancellationToken, addr: &BlockAddress) -> Result<(), StorageError> {
        ctx.check()?;
        let path = self.path_for(&addr.cid);
        match fs::remove_file(path) {
            Ok(()) | Err(_) => Ok(()),
        }
    }
}

/// Writes a descriptor's root [`Cid`] as a hex string, the handle a caller
/// passes between `upload` and `download`/`info` invocations.
pub fn write_descriptor_handle(path: &Path, cid: &Cid) -> io::Result<()> {
    fs::write(path, cid.to_hex())
}

pub fn read_descriptor_handle(path: &Path) -> io::Result<Cid> {
    let hex_str = fs::read_to_string(path)?.trim().to_string();
    let bytes = hex::decode(&hex_str).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let arr: [u8; 32] = bytes.try_into().map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "descriptor handle must be 32 bytes"))?;
    Ok(Cid(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).unwrap();
        let ctx = CancellationToken::none();
        let block = Block::new(vec![1, 2, 3, 4], 4).unwrap();

        let outcome = backend.put(&ctx, &block).unwrap();
        assert!(backend.has(&ctx, &outcome.address).unwrap());
        assert_eq!(outcome.new_bytes, 4);

        let fetched = backend.get(&ctx, &outcome.address).unwrap();
        assert_eq!(fetched.as_bytes(), block.as_bytes());
    }

    #[test]
    fn putting_an_existing_block_reports_zero_new_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).unwrap();
        let ctx = CancellationToken::none();
        let block = Block::new(vec![9u8; 8], 8).unwrap();

        backend.put(&ctx, &block).unwrap();
        let second = backend.put(&ctx, &block).unwrap();
        assert_eq!(second.new_bytes, 0);
    }

    #[test]
    fn descriptor_handle_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let handle_path = dir.path().join("handle.txt");
        let cid = Cid([7u8; 32]);

        write_descriptor_handle(&handle_path, &cid).unwrap();
        let read_back = read_descriptor_handle(&handle_path).unwrap();
        assert_eq!(read_back, cid);
    }
}
