//! Bit-level reading over seekable byte sources.
//!
//! [`BitCursor`] returns arbitrary 1-64 bit fields MSB-first, reassembling
//! fields that straddle byte boundaries, and exposes the byte-oriented
//! operations frame synchronization needs: alignment, relative skips
//! (including one-byte rewinds) and absolute repositioning.

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader};

/// Widest field a single [`BitCursor::read_bits`] call can return.
pub const MAX_READ_BITS: u32 = u64::BITS;

#[derive(Debug)]
pub struct BitCursor<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
}

pub type SliceCursor<'a> = BitCursor<io::Cursor<&'a [u8]>>;

impl<R> BitCursor<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R) -> Self {
        Self {
            bs: BitReader::new(read),
        }
    }

    /// Reads the next `n` bits as an unsigned big-endian value.
    ///
    /// `n == 0` returns 0 without consuming input. Running out of source
    /// bytes yields [`io::ErrorKind::UnexpectedEof`], never a zero value.
    #[inline(always)]
    pub fn read_bits(&mut self, n: u32) -> io::Result<u64> {
        if n == 0 {
            return Ok(0);
        }

        if n > MAX_READ_BITS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("read_bits({n}): at most {MAX_READ_BITS} bits per read"),
            ));
        }

        match self.bs.read_unsigned_var::<u64>(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read_bits({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.read_bits(8).map(|v| v as u8)
    }

    /// Fills `buf` from the current position. The cursor must be byte aligned.
    #[inline(always)]
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.bs.read_bytes(buf)
    }

    /// Drops the bits left in a partially consumed byte.
    ///
    /// Returns `true` when the cursor already sat on a byte boundary, in which
    /// case nothing is consumed.
    #[inline(always)]
    pub fn align_to_byte(&mut self) -> bool {
        let aligned = self.bs.byte_aligned();
        self.bs.byte_align();
        aligned
    }

    /// Moves the source `count` bytes forward (or backward when negative),
    /// discarding any partially consumed byte first.
    pub fn skip_bytes(&mut self, count: i64) -> io::Result<u64> {
        self.bs.byte_align();

        let position = self.bs.position_in_bits()?;
        let offset = count.saturating_mul(8);
        if offset < 0 && offset.unsigned_abs() > position {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "skip_bytes({count}): would move before the start of the source (at byte {})",
                    position >> 3
                ),
            ));
        }

        self.bs.seek_bits(SeekFrom::Current(offset)).map(|bits| bits >> 3)
    }

    /// Repositions the cursor at an absolute byte offset of the source.
    pub fn seek_to(&mut self, byte_position: u64) -> io::Result<u64> {
        self.bs
            .seek_bits(SeekFrom::Start(byte_position << 3))
            .map(|bits| bits >> 3)
    }

    /// Whole bytes consumed from the source so far.
    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|bits| bits >> 3)
    }

    #[inline(always)]
    pub fn position_in_bits(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    pub fn into_inner(self) -> R {
        self.bs.into_reader()
    }
}

impl<'a> SliceCursor<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        Self::new(io::Cursor::new(buf))
    }
}

impl Default for SliceCursor<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_bits_is_big_endian_for_every_width() -> io::Result<()> {
        let pattern: u64 = 0xA5C3_0F96_E17B_2D48;

        for n in 1..=64u32 {
            let value = pattern >> (64 - n);
            // n significant bits followed by zero padding up to the next byte
            let padded = (value as u128) << (128 - n);
            let bytes = padded.to_be_bytes();
            let len = n.div_ceil(8) as usize;

            let mut cursor = BitCursor::from_slice(&bytes[..len]);
            assert_eq!(cursor.read_bits(n)?, value, "width {n}");
        }

        Ok(())
    }

    #[test]
    fn fields_straddle_byte_boundaries() -> io::Result<()> {
        let mut cursor = BitCursor::from_slice(&[0b1011_0011, 0b0101_1100]);

        assert_eq!(cursor.read_bits(3)?, 0b101);
        assert_eq!(cursor.read_bits(7)?, 0b1_0011_01);
        assert_eq!(cursor.read_bits(6)?, 0b01_1100);
        Ok(())
    }

    #[test]
    fn zero_width_read_consumes_nothing() -> io::Result<()> {
        let mut cursor = BitCursor::from_slice(&[0xFF]);

        assert_eq!(cursor.read_bits(0)?, 0);
        assert_eq!(cursor.position_in_bits()?, 0);
        assert_eq!(cursor.read_u8()?, 0xFF);
        Ok(())
    }

    #[test]
    fn oversized_read_is_rejected() {
        let mut cursor = BitCursor::from_slice(&[0; 16]);

        let err = cursor.read_bits(65).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn exhausted_source_is_end_of_stream() -> io::Result<()> {
        let mut cursor = BitCursor::from_slice(&[0x12]);

        assert_eq!(cursor.read_bits(4)?, 0x1);
        let err = cursor.read_bits(8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        Ok(())
    }

    #[test]
    fn align_discards_partial_byte_once() -> io::Result<()> {
        let mut cursor = BitCursor::from_slice(&[0b1110_0000, 0x5A]);

        cursor.read_bits(3)?;
        assert!(!cursor.align_to_byte());
        assert_eq!(cursor.position_in_bits()?, 8);

        assert!(cursor.align_to_byte());
        assert_eq!(cursor.position_in_bits()?, 8);
        assert_eq!(cursor.read_u8()?, 0x5A);
        Ok(())
    }

    #[test]
    fn skip_bytes_moves_both_ways() -> io::Result<()> {
        let mut cursor = BitCursor::from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44]);

        assert_eq!(cursor.skip_bytes(3)?, 3);
        assert_eq!(cursor.read_u8()?, 0x33);
        assert_eq!(cursor.skip_bytes(-1)?, 3);
        assert_eq!(cursor.read_u8()?, 0x33);

        // Partial byte state is dropped before moving
        cursor.read_bits(2)?;
        assert_eq!(cursor.skip_bytes(-2)?, 3);
        assert_eq!(cursor.read_u8()?, 0x33);

        let err = cursor.skip_bytes(-10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        Ok(())
    }

    #[test]
    fn seek_to_absolute_offset() -> io::Result<()> {
        let mut cursor = BitCursor::from_slice(&[0x00, 0x11, 0x22]);

        cursor.read_bits(13)?;
        assert_eq!(cursor.seek_to(1)?, 1);
        assert_eq!(cursor.position()?, 1);
        assert_eq!(cursor.read_u8()?, 0x11);
        Ok(())
    }
}
