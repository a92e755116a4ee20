//! Processing pipeline for MPEG audio elementary streams.
//!
//! - [`extract`] locates frame sync words in arbitrary byte streams.
//! - [`decode`] drives the pipeline: ID3v2 skipping, header parsing, CRC
//!   verification and Layer I requantization, with resynchronization after
//!   damaged frames.

pub mod decode;
pub mod extract;

/// A single-channel MPEG-1 Layer I frame at 128 kbit/s, 44.1 kHz.
///
/// Only subband 0 is allocated (4-bit codes, scale factor 1) and every one of
/// its twelve samples requantizes to 8.
pub const EXAMPLE_FRAME: &[u8] = &[
    0xFF, 0xFF, 0x40, 0xC4, // sync + header
    0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // allocation
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
    0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFC, // scale factor + samples
];

/// An ID3v2.4 tag with a 4-byte body followed by two copies of
/// [`EXAMPLE_FRAME`].
pub const EXAMPLE_DATA: &[u8] = &[
    0x49, 0x44, 0x33, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, // "ID3" header
    0x00, 0x00, 0x00, 0x00, // tag body
    0xFF, 0xFF, 0x40, 0xC4, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFC, // frame 1
    0xFF, 0xFF, 0x40, 0xC4, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFC, // frame 2
];

#[test]
fn example_data_layout() {
    assert_eq!(EXAMPLE_FRAME.len(), 27);
    assert_eq!(EXAMPLE_DATA.len(), 14 + 2 * EXAMPLE_FRAME.len());
    assert_eq!(&EXAMPLE_DATA[14..41], EXAMPLE_FRAME);
    assert_eq!(&EXAMPLE_DATA[41..], EXAMPLE_FRAME);
}
