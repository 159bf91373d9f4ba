//! Secure buffers and wiping (component C9) — scoped zeroization of
//! sensitive byte ranges (spec §4.9).
//!
//! `zeroize` is the ecosystem's answer to "the compiler may elide a naive
//! zero loop" (spec §9): it writes through `core::ptr::write_volatile` and
//! inserts a compiler fence, which a hand-rolled loop would not reliably
//! survive under optimization.

use zeroize::Zeroize;

/// Owns `size` bytes, guaranteeing zeroization on explicit [`clear`](Self::clear).
/// `clear` is idempotent; after it, every read returns zero (spec P11).
pub struct SecureBuffer {
    bytes: Vec<u8>,
    cleared: bool,
}

impl SecureBuffer {
    pub fn new(size: usize) -> Self {
        Self { bytes: vec![0u8; size], cleared: false }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { bytes, cleared: false }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow the bytes. Callers must not retain this reference past
    /// [`clear`](Self::clear) (spec §4.9).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Zeroize the buffer in place. Idempotent: calling this on an
    /// already-cleared buffer is a no-op that still reads as all zeros.
    pub fn clear(&mut self) {
        if self.cleared {
            return;
        }
        self.bytes.zeroize();
        self.cleared = true;
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Zeroize an arbitrary byte range in place, defeating dead-store
/// elimination the way [`SecureBuffer::clear`] does (spec §4.9).
pub fn wipe(bytes: &mut [u8]) {
    bytes.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_zeroizes_every_byte() {
        let mut buf = SecureBuffer::from_vec(vec![0xAA; 32]);
        buf.clear();
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut buf = SecureBuffer::from_vec(vec![0xFF; 16]);
        buf.clear();
        buf.clear();
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
        assert!(buf.is_cleared());
    }

    #[test]
    fn wipe_zeroizes_an_arbitrary_slice() {
        let mut data = [7u8; 64];
        wipe(&mut data);
        assert!(data.iter().all(|&b| b == 0));
    }
}
