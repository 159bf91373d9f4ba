//! Splitter / Assembler (component C2).
//!
//! Mirrors the teacher's chunking loop in `io_stream::SixCyWriter::add_file`
//! (`data.chunks(self.chunk_size)`) but operates over a `Read` stream rather
//! than an in-memory slice, and zero-pads the final block instead of
//! emitting a short one — every persisted block must be exactly
//! `block_size` bytes (spec §3 invariant).

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::block::Block;

#[derive(Error, Debug)]
pub enum SplitterError {
    #[error("block_size must be positive, got {0}")]
    InvalidBlockSize(i64),
    #[error("I/O error while splitting: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("missing block for index {0}")]
    MissingBlock(usize),
    #[error("I/O error while assembling: {0}")]
    Io(#[from] io::Error),
}

/// Read all of `reader` and split it into `block_size`-byte padded blocks.
///
/// The final block is zero-padded if the stream length isn't a multiple of
/// `block_size`. Returns `(blocks, original_byte_count)`.
pub fn split<R: Read>(mut reader: R, block_size: usize) -> Result<(Vec<Block>, u64), SplitterError> {
    if block_size == 0 {
        return Err(SplitterError::InvalidBlockSize(0));
    }

    let mut blocks = Vec::new();
    let mut total_read: u64 = 0;
    let mut buf = vec![0u8; block_size];

    loop {
        let n = read_fill(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        total_read += n as u64;

        if n < block_size {
            for b in &mut buf[n..] {
                *b = 0;
            }
        }
        blocks.push(Block::new_unchecked(buf.clone()));

        if n < block_size {
            break;
        }
    }

    Ok((blocks, total_read))
}

/// Streaming variant: invokes `on_block(index, block)` for each block as it
/// is produced, so the caller never holds more than one block (plus this
/// function's internal read buffer) in memory at a time (spec P8).
pub fn split_streaming<R, F>(
    mut reader: R,
    block_size: usize,
    mut on_block: F,
) -> Result<u64, SplitterError>
where
    R: Read,
    F: FnMut(usize, Block) -> Result<(), SplitterError>,
{
    if block_size == 0 {
        return Err(SplitterError::InvalidBlockSize(0));
    }

    let mut total_read: u64 = 0;
    let mut buf = vec![0u8; block_size];
    let mut index = 0usize;

    loop {
        let n = read_fill(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        total_read += n as u64;

        let mut chunk = buf.clone();
        if n < block_size {
            for b in &mut chunk[n..] {
                *b = 0;
            }
        }
        on_block(index, Block::new_unchecked(chunk))?;
        index += 1;

        if n < block_size {
            break;
        }
    }

    Ok(total_read)
}

/// Fill `buf` from `reader`, stopping at EOF. Returns the number of bytes
/// actually read, which may be less than `buf.len()` only on the final read.
fn read_fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Concatenate `blocks` in order and truncate to `original_size` bytes,
/// removing the splitter's zero-padding.
pub fn assemble(blocks: &[Block], original_size: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(original_size as usize);
    for b in blocks {
        out.extend_from_slice(b.as_bytes());
        if out.len() as u64 >= original_size {
            break;
        }
    }
    out.truncate(original_size as usize);
    out
}

/// A sink that silently discards writes past `limit` total bytes, so that
/// writing padded blocks in sequence reaches the sink with exactly
/// `original_size` bytes total, wherever the boundary falls inside a block.
pub struct LengthLimitedSink<W: Write> {
    inner: W,
    limit: u64,
    written: u64,
}

impl<W: Write> LengthLimitedSink<W> {
    pub fn new(inner: W, limit: u64) -> Self {
        Self { inner, limit, written: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for LengthLimitedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = self.limit.saturating_sub(self.written);
        let to_write = (buf.len() as u64).min(remaining) as usize;
        if to_write > 0 {
            self.inner.write_all(&buf[..to_write])?;
            self.written += to_write as u64;
        }
        // Pretend to consume the whole buffer — writes past the limit are
        // silently discarded, not an error (spec §4.2).
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Assemble by index, writing each block through a [`LengthLimitedSink`] as
/// it becomes available, for constant-memory download (spec §4.7). Fails if
/// a block is missing for its declared index.
pub fn assemble_streaming<W: Write>(
    sink: &mut LengthLimitedSink<W>,
    blocks: &[Option<Block>],
) -> Result<(), AssemblyError> {
    for (i, slot) in blocks.iter().enumerate() {
        let block = slot.as_ref().ok_or(AssemblyError::MissingBlock(i))?;
        sink.write_all(block.as_bytes())?;
    }
    Ok(())
}
