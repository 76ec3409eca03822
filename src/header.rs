//! Wire framing for FEC datagrams.
//!
//! The header is 6 bytes, little-endian, packed across two words:
//!
//! ```text
//!  word 0 (u32, LE):
//!    bits  0-23 : block_index     (wraps modulo 2^24 on the wire)
//!    bits 24-31 : datagram_index  (0..n-1; k..n-1 are parity)
//!  word 1 (u16, LE):
//!    bit      0 : is_fec
//!    bits   1-15: size            (header + payload, in bytes)
//! ```

use crate::error::Error;

/// Size of the wire header, in bytes.
pub const HEADER_SIZE: usize = 6;

/// A parsed datagram header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHeader {
    /// Block index (24 bits on the wire).
    pub block_index: u32,
    /// Datagram index within the block.
    pub datagram_index: u8,
    /// Parity flag.
    pub is_fec: bool,
    /// Encoded size field (header + payload).
    pub size: usize,
}

/// Write a sealed header at `buf[0..HEADER_SIZE]`. `buf.len()` becomes
/// the encoded `size` field, so `buf` must already be its final
/// length (header + payload) before sealing.
pub fn seal(buf: &mut [u8], block_index: u32, datagram_index: u8, is_fec: bool) {
    debug_assert!(buf.len() >= HEADER_SIZE);
    let word0: u32 = (block_index & 0x00FF_FFFF) | ((datagram_index as u32) << 24);
    let size = buf.len() as u16;
    debug_assert!(size & 0x8000 == 0, "datagram too large to encode in 15 bits");
    let word1: u16 = (is_fec as u16) | (size << 1);
    buf[0..4].copy_from_slice(&word0.to_le_bytes());
    buf[4..6].copy_from_slice(&word1.to_le_bytes());
}

/// Parse the header out of `buf`. Fails if `buf` is shorter than
/// [`HEADER_SIZE`] or if the encoded size field disagrees with
/// `buf.len()`.
pub fn parse(buf: &[u8]) -> Result<ParsedHeader, Error> {
    if buf.len() < HEADER_SIZE {
        return Err(Error::ShortDatagram {
            len: buf.len(),
            header_size: HEADER_SIZE,
        });
    }
    let word0 = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    let word1 = u16::from_le_bytes(buf[4..6].try_into().unwrap());
    let block_index = word0 & 0x00FF_FFFF;
    let datagram_index = (word0 >> 24) as u8;
    let is_fec = (word1 & 1) != 0;
    let size = (word1 >> 1) as usize;
    if size != buf.len() {
        return Err(Error::SizeMismatch {
            header_says: size,
            got: buf.len(),
        });
    }
    Ok(ParsedHeader {
        block_index,
        datagram_index,
        is_fec,
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut buf = vec![0u8; HEADER_SIZE + 4];
        buf[HEADER_SIZE..].copy_from_slice(b"abcd");
        seal(&mut buf, 0x00AB_CDEF, 7, true);
        let h = parse(&buf).unwrap();
        assert_eq!(h.block_index, 0x00AB_CDEF);
        assert_eq!(h.datagram_index, 7);
        assert!(h.is_fec);
        assert_eq!(h.size, HEADER_SIZE + 4);
    }

    #[test]
    fn block_index_masked_to_24_bits() {
        let mut buf = vec![0u8; HEADER_SIZE];
        seal(&mut buf, 0xFFFF_FFFF, 0, false);
        let h = parse(&buf).unwrap();
        assert_eq!(h.block_index, 0x00FF_FFFF);
    }

    #[test]
    fn short_datagram_rejected() {
        let buf = vec![0u8; HEADER_SIZE - 1];
        assert!(matches!(parse(&buf), Err(Error::ShortDatagram { .. })));
    }

    #[test]
    fn size_mismatch_rejected() {
        let mut buf = vec![0u8; HEADER_SIZE + 4];
        seal(&mut buf, 1, 0, false);
        let truncated = &buf[..HEADER_SIZE + 2];
        assert!(matches!(
            parse(truncated),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
