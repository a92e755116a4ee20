//! ID3v2 tag detection and skipping.
//!
//! An ID3v2 tag may precede the first audio frame:
//!
//! ```text
//! "ID3" | major revision | flags | size (4 bytes, synchsafe)
//! ```
//!
//! The size excludes the 10-byte header itself and, when the footer flag is
//! set, the 10-byte footer. Tag contents are not interpreted.

use std::io;

use log::{debug, warn};

use crate::utils::bitstream_io::BitCursor;
use crate::utils::errors::{DecodeError, Id3Error};

pub const ID3_IDENTIFIER: &[u8; 3] = b"ID3";

pub const ID3_HEADER_SIZE: usize = 10;
pub const ID3_FOOTER_SIZE: u32 = 10;

pub const FOOTER_PRESENT_FLAG: u8 = 0b0001_0000;

/// Decodes a synchsafe integer: 7 payload bits per byte, most significant
/// byte first, the high bit of every byte ignored.
pub const fn decode_synchsafe(bytes: [u8; 4]) -> u32 {
    ((bytes[0] & 0x7F) as u32) << 21
        | ((bytes[1] & 0x7F) as u32) << 14
        | ((bytes[2] & 0x7F) as u32) << 7
        | (bytes[3] & 0x7F) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id3Tag {
    pub major_version: u8,
    pub revision: u8,
    pub flags: u8,
    /// Tag body size from the header, without header or footer.
    pub size: u32,
}

impl Id3Tag {
    pub fn from_bytes(header: &[u8; ID3_HEADER_SIZE]) -> Result<Self, Id3Error> {
        let identifier = [header[0], header[1], header[2]];
        if &identifier != ID3_IDENTIFIER {
            return Err(Id3Error::MissingIdentifier(identifier));
        }

        Self::from_fields(&[
            header[3], header[4], header[5], header[6], header[7], header[8], header[9],
        ])
    }

    fn from_fields(fields: &[u8; 7]) -> Result<Self, Id3Error> {
        let [major_version, revision, flags, s0, s1, s2, s3] = *fields;

        if major_version == 0xFF || revision == 0xFF {
            return Err(Id3Error::InvalidVersion {
                major: major_version,
                revision,
            });
        }

        let size_bytes = [s0, s1, s2, s3];
        if size_bytes.iter().any(|b| b & 0x80 != 0) {
            warn!("ID3v2 size bytes {size_bytes:02X?} are not synchsafe, ignoring high bits");
        }

        Ok(Self {
            major_version,
            revision,
            flags,
            size: decode_synchsafe(size_bytes),
        })
    }

    pub fn has_footer(&self) -> bool {
        self.flags & FOOTER_PRESENT_FLAG != 0
    }

    /// Bytes following the 10-byte header that belong to the tag.
    pub fn skip_length(&self) -> u32 {
        self.size + if self.has_footer() { ID3_FOOTER_SIZE } else { 0 }
    }
}

/// Checks for the `"ID3"` identifier at the cursor.
///
/// On a match the cursor is left after the identifier. Otherwise it is moved
/// back to where it was, including when the source is shorter than three
/// bytes.
pub fn has_id3_tag<R>(reader: &mut BitCursor<R>) -> io::Result<bool>
where
    R: io::Read + io::Seek,
{
    reader.align_to_byte();
    let start = reader.position()?;

    let mut identifier = [0u8; 3];
    match reader.read_bytes(&mut identifier) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            reader.seek_to(start)?;
            return Ok(false);
        }
        Err(e) => return Err(e),
    }

    if &identifier == ID3_IDENTIFIER {
        return Ok(true);
    }

    reader.skip_bytes(-3)?;
    Ok(false)
}

/// Skips the tag whose identifier [`has_id3_tag`] just consumed.
pub fn skip_id3_tag<R>(reader: &mut BitCursor<R>) -> Result<Id3Tag, DecodeError>
where
    R: io::Read + io::Seek,
{
    let mut fields = [0u8; 7];
    reader.read_bytes(&mut fields)?;

    let tag = Id3Tag::from_fields(&fields)?;
    let end = reader.skip_bytes(tag.skip_length() as i64)?;

    debug!(
        "Skipped ID3v2.{}.{} tag: {} bytes{}, audio starts at byte {end}",
        tag.major_version,
        tag.revision,
        tag.size,
        if tag.has_footer() { " + footer" } else { "" },
    );

    Ok(tag)
}
