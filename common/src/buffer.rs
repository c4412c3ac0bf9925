//! Bounds-checked access to message bytes
//!
//! Every parser in this crate reads the message through [`MessageBytes`],
//! so each variable-offset access carries its own range check. A failed
//! check yields `None` and the caller gives up and forwards the message
//! unchanged.

/// Read-only view of the bytes of one socket message.
pub trait MessageBytes {
    /// Number of contiguous bytes currently addressable.
    fn len(&self) -> usize;

    /// Byte at `offset`.
    fn load_u8(&self, offset: usize) -> Option<u8>;

    /// `N` bytes starting at `offset`.
    fn load_array<const N: usize>(&self, offset: usize) -> Option<[u8; N]>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Big-endian u32 at `offset`.
    #[inline(always)]
    fn load_be_u32(&self, offset: usize) -> Option<u32> {
        self.load_array::<4>(offset).map(u32::from_be_bytes)
    }

    /// Big-endian u64 at `offset`.
    #[inline(always)]
    fn load_be_u64(&self, offset: usize) -> Option<u64> {
        self.load_array::<8>(offset).map(u64::from_be_bytes)
    }
}

/// Message bytes that can be rewritten and grown at the front.
pub trait MessageBytesMut: MessageBytes {
    /// Overwrite `bytes.len()` bytes starting at `offset`.
    fn store(&mut self, offset: usize, bytes: &[u8]) -> Option<()>;

    /// Insert `len` bytes at offset 0. Offsets computed before the call
    /// no longer refer to the same bytes.
    fn grow_front(&mut self, len: u32) -> Option<()>;

    /// Remove `len` bytes at offset 0, undoing a previous `grow_front`.
    fn shrink_front(&mut self, len: u32) -> Option<()>;
}

impl MessageBytes for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn load_u8(&self, offset: usize) -> Option<u8> {
        self.get(offset).copied()
    }

    fn load_array<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        let end = offset.checked_add(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(self.get(offset..end)?);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_past_end_fail() {
        let bytes: &[u8] = &[0x00, 0x00, 0x6d, 0x01, 0xff];

        assert_eq!(bytes.load_u8(4), Some(0xff));
        assert_eq!(bytes.load_u8(5), None);
        assert_eq!(bytes.load_be_u32(0), Some(0x6d01));
        assert_eq!(bytes.load_be_u32(2), None);
        assert_eq!(bytes.load_array::<2>(usize::MAX), None);
    }
}
