//! Descriptor and its stores (component C6) — a versioned, self-describing
//! file manifest and the plaintext/encrypted stores that persist it (spec
//! §4.6, §6).
//!
//! The on-disk layout follows the same "build a buffer, checksum it, append
//! the checksum" discipline as the teacher's `superblock::Superblock::write`,
//! substituting a 32-byte BLAKE3 digest for the teacher's CRC32 (spec §6
//! names a 32-byte checksum field).

pub mod store;

use std::io::{self, Read};

use thiserror::Error;

use crate::block::Cid;

pub const MAGIC: &[u8; 8] = b"NOISEFS1";
pub const FORMAT_VERSION: u32 = 1;
const CHECKSUM_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("descriptor is corrupt: {0}")]
    Corrupt(String),
    #[error("descriptor authentication failed")]
    AuthFailed,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One anonymized block plus the two randomizers it was XORed against.
/// Invariant: the three CIDs are pairwise distinct (spec §3, P3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTriple {
    pub data_cid: Cid,
    pub rand1_cid: Cid,
    pub rand2_cid: Cid,
}

impl BlockTriple {
    pub fn new(data_cid: Cid, rand1_cid: Cid, rand2_cid: Cid) -> Result<Self, DescriptorError> {
        if data_cid == rand1_cid || data_cid == rand2_cid || rand1_cid == rand2_cid {
            return Err(DescriptorError::InvalidInput("block triple CIDs must be pairwise distinct".into()));
        }
        Ok(Self { data_cid, rand1_cid, rand2_cid })
    }
}

/// The file manifest: everything needed to reconstruct a file from its
/// anonymized blocks (spec §3).
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub filename: String,
    pub file_size: u64,
    pub padded_file_size: u64,
    pub block_size: u32,
    triples: Vec<BlockTriple>,
}

impl Descriptor {
    /// Start a new descriptor under exclusive ownership of the upload task
    /// (spec §5: "owned exclusively by the upload task"). Triples are
    /// appended one at a time as blocks are processed.
    pub fn new(filename: impl Into<String>, block_size: u32) -> Result<Self, DescriptorError> {
        if block_size == 0 {
            return Err(DescriptorError::InvalidInput("block_size must be positive".into()));
        }
        Ok(Self { filename: filename.into(), file_size: 0, padded_file_size: 0, block_size, triples: Vec::new() })
    }

    /// Not concurrent-safe (spec §5) — the caller must serialize calls, which
    /// holds naturally since only the owning upload task calls this.
    pub fn append_triple(&mut self, triple: BlockTriple) {
        self.triples.push(triple);
        self.padded_file_size = self.triples.len() as u64 * self.block_size as u64;
    }

    pub fn triples(&self) -> &[BlockTriple] {
        &self.triples
    }

    pub fn seal(&mut self, file_size: u64) -> Result<(), DescriptorError> {
        self.file_size = file_size;
        self.check_invariants()
    }

    fn check_invariants(&self) -> Result<(), DescriptorError> {
        let expected_padded = self.triples.len() as u64 * self.block_size as u64;
        if self.padded_file_size != expected_padded {
            return Err(DescriptorError::Corrupt(format!(
                "padded_file_size {} != triple_count * block_size {}",
                self.padded_file_size, expected_padded
            )));
        }
        if self.file_size > self.padded_file_size {
            return Err(DescriptorError::Corrupt(format!(
                "file_size {} exceeds padded_file_size {}",
                self.file_size, self.padded_file_size
            )));
        }
        // A descriptor naming no file but pointing at real triples indicates
        // the filename and a CID got swapped somewhere upstream; reject it
        // rather than returning a nameless file.
        if self.filename.is_empty() && !self.triples.is_empty() {
            return Err(DescriptorError::Corrupt("filename is empty but triples are present".into()));
        }
        Ok(())
    }

    /// Serialize per spec §6's on-disk format:
    /// `{magic, version, file_size, padded_file_size, block_size,
    /// filename_len, filename, triple_count, triples, checksum}`.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(MAGIC);
        body.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        body.extend_from_slice(&self.file_size.to_le_bytes());
        body.extend_from_slice(&self.padded_file_size.to_le_bytes());
        body.extend_from_slice(&self.block_size.to_le_bytes());

        let filename_bytes = self.filename.as_bytes();
        body.extend_from_slice(&(filename_bytes.len() as u16).to_le_bytes());
        body.extend_from_slice(filename_bytes);

        body.extend_from_slice(&(self.triples.len() as u32).to_le_bytes());
        for t in &self.triples {
            body.extend_from_slice(t.data_cid.as_bytes());
            body.extend_from_slice(t.rand1_cid.as_bytes());
            body.extend_from_slice(t.rand2_cid.as_bytes());
        }

        let checksum = blake3::hash(&body);
        body.extend_from_slice(checksum.as_bytes());
        body
    }

    /// Deserialize and check every invariant from §3; any violation maps to
    /// `DescriptorCorrupt` (never panics on malformed input).
    pub fn decode(bytes: &[u8]) -> Result<Self, DescriptorError> {
        let mut cursor = io::Cursor::new(bytes);

        let mut magic = [0u8; 8];
        cursor.read_exact(&mut magic).map_err(|_| DescriptorError::Corrupt("truncated header".into()))?;
        if &magic != MAGIC {
            return Err(DescriptorError::Corrupt("bad magic".into()));
        }

        let version = read_u32(&mut cursor)?;
        if version != FORMAT_VERSION {
            return Err(DescriptorError::Corrupt(format!("unsupported descriptor version {version}")));
        }

        let file_size = read_u64(&mut cursor)?;
        let padded_file_size = read_u64(&mut cursor)?;
        let block_size = read_u32(&mut cursor)?;

        let filename_len = read_u16(&mut cursor)? as usize;
        let mut filename_buf = vec![0u8; filename_len];
        cursor.read_exact(&mut filename_buf).map_err(|_| DescriptorError::Corrupt("truncated filename".into()))?;
        let filename = String::from_utf8(filename_buf).map_err(|_| DescriptorError::Corrupt("filename is not valid UTF-8".into()))?;

        let triple_count = read_u32(&mut cursor)? as usize;
        let mut triples = Vec::with_capacity(triple_count);
        for _ in 0..triple_count {
            let data_cid = read_cid(&mut cursor)?;
            let rand1_cid = read_cid(&mut cursor)?;
            let rand2_cid = read_cid(&mut cursor)?;
            triples.push(BlockTriple::new(data_cid, rand1_cid, rand2_cid)?);
        }

        let body_len = cursor.position() as usize;
        let body = &bytes[..body_len];
        let mut stored_checksum = [0u8; CHECKSUM_LEN];
        cursor.read_exact(&mut stored_checksum).map_err(|_| DescriptorError::Corrupt("truncated checksum".into()))?;

        let expected_checksum = blake3::hash(body);
        if expected_checksum.as_bytes() != &stored_checksum {
            return Err(DescriptorError::Corrupt("checksum mismatch".into()));
        }

        let descriptor = Self { filename, file_size, padded_file_size, block_size, triples };
        descriptor.check_invariants()?;
        Ok(descriptor)
    }
}

fn read_u16<R: Read>(r: &mut R) -> Result<u16, DescriptorError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf).map_err(|_| DescriptorError::Corrupt("truncated u16 field".into()))?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, DescriptorError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| DescriptorError::Corrupt("truncated u32 field".into()))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64, DescriptorError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|_| DescriptorError::Corrupt("truncated u64 field".into()))?;
    Ok(u64::from_le_bytes(buf))
}

fn read_cid<R: Read>(r: &mut R) -> Result<Cid, DescriptorError> {
    let mut buf = [0u8; 32];
    r.read_exact(&mut buf).map_err(|_| DescriptorError::Corrupt("truncated CID field".into()))?;
    Ok(Cid(buf))
}
