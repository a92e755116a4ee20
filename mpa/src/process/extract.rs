use std::io;

use log::trace;

use crate::structs::header::{
    LAYER_MASK, RESERVED_LAYER_INDEX, RESERVED_VERSION_INDEX, VERSION_MASK,
};
use crate::utils::bitstream_io::BitCursor;

/// First byte of every frame.
pub const SYNC_BYTE: u8 = 0xFF;

/// Remaining three sync bits at the top of the second byte.
pub const SYNC_MASK: u8 = 0b1110_0000;

/// Location of a frame candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPoint {
    /// Byte offset of the `0xFF` sync byte.
    pub offset: u64,
    /// Bytes passed over before the sync byte.
    pub skipped: u64,
}

/// Checks the 11-bit sync word together with the version and layer fields
/// carried in the second byte.
#[inline(always)]
pub const fn is_sync(first: u8, second: u8) -> bool {
    first == SYNC_BYTE
        && (second & SYNC_MASK) == SYNC_MASK
        && (second & VERSION_MASK) >> 3 != RESERVED_VERSION_INDEX
        && (second & LAYER_MASK) >> 1 != RESERVED_LAYER_INDEX
}

/// Scans forward for the next frame sync.
///
/// The cursor is aligned to a byte boundary first, then moved one byte at a
/// time over the stream. On a match it is left on the second sync byte, which
/// is also the first header byte. Reaching the end of the stream is not an
/// error: it returns `None`.
pub fn find_sync<R>(reader: &mut BitCursor<R>) -> io::Result<Option<SyncPoint>>
where
    R: io::Read + io::Seek,
{
    reader.align_to_byte();
    let start = reader.position()?;

    let Some(mut first) = next_byte(reader)? else {
        return Ok(None);
    };

    let mut skipped = 0;
    loop {
        let Some(second) = next_byte(reader)? else {
            trace!("No sync found after {} bytes from byte {start}", skipped + 1);
            return Ok(None);
        };

        if is_sync(first, second) {
            reader.skip_bytes(-1)?;
            return Ok(Some(SyncPoint {
                offset: start + skipped,
                skipped,
            }));
        }

        first = second;
        skipped += 1;
    }
}

#[inline(always)]
fn next_byte<R>(reader: &mut BitCursor<R>) -> io::Result<Option<u8>>
where
    R: io::Read + io::Seek,
{
    match reader.read_u8() {
        Ok(byte) => Ok(Some(byte)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

#[test]
fn sync_pattern() {
    assert!(is_sync(0xFF, 0xFB));
    assert!(is_sync(0xFF, 0xE2));
    assert!(!is_sync(0xFE, 0xFB));
    // Only 10 sync bits
    assert!(!is_sync(0xFF, 0xDB));
    // Reserved version
    assert!(!is_sync(0xFF, 0xEB));
    // Reserved layer
    assert!(!is_sync(0xFF, 0xF9));
}

#[test]
fn sync_after_garbage() -> io::Result<()> {
    let mut data: Vec<u8> = (0..50).map(|i| ((i * 37 + 11) % 255) as u8).collect();
    data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);

    let mut reader = BitCursor::from_slice(&data);
    let sync = find_sync(&mut reader)?;

    assert_eq!(
        sync,
        Some(SyncPoint {
            offset: 50,
            skipped: 50
        })
    );
    assert_eq!(reader.position()?, 51);
    assert_eq!(reader.read_u8()?, 0xFB);
    Ok(())
}

#[test]
fn sync_aligns_first() -> io::Result<()> {
    let data = [0x7F, 0xFD, 0x00, 0xFF, 0xFB];
    let mut reader = BitCursor::from_slice(&data);

    // Shifted by one bit, 0x7FFD reads as 0xFFFA, a Layer III sync
    reader.read_bits(1)?;
    let sync = find_sync(&mut reader)?;

    assert_eq!(
        sync,
        Some(SyncPoint {
            offset: 3,
            skipped: 2
        })
    );
    Ok(())
}

#[test]
fn no_sync_until_end() -> io::Result<()> {
    let data = [0x00, 0xFF, 0xEB, 0x12, 0xFF];
    let mut reader = BitCursor::from_slice(&data);
    assert_eq!(find_sync(&mut reader)?, None);

    let mut empty = BitCursor::default();
    assert_eq!(find_sync(&mut empty)?, None);
    Ok(())
}
