#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! An MPEG audio elementary stream is a sequence of self-contained frames,
//! optionally preceded by an ID3v2 tag. Every frame starts with an 11-bit
//! sync word followed by a 21-bit header; a 16-bit CRC follows when the
//! protection bit is cleared.
//!
//! Frames are located by synchronization only. The frame length implied by
//! the header is computed but never used to jump ahead, so a damaged frame
//! costs at most the bytes up to the next valid sync word.
//!
//! ### Layer I Audio Data
//!
//! 32 subbands of 12 samples each, per channel. Joint stereo shares the
//! allocation and sample codes of the subbands above the bound between both
//! channels.
//!
//! ## Quick Start
//!
//! ```rust
//! use mpa::process::{EXAMPLE_DATA, decode::Decoder};
//!
//! let decoder = Decoder::default();
//!
//! for frame in decoder.frames(std::io::Cursor::new(EXAMPLE_DATA)) {
//!     let frame = frame?;
//!     println!("{} at byte {}", frame.header.layer, frame.offset);
//!
//!     if let Some(samples) = &frame.samples {
//!         // [channel][subband][sample]
//!         assert_eq!(samples[0][0][0], 8);
//!     }
//! }
//! # Ok::<(), mpa::utils::errors::DecodeError>(())
//! ```

/// Processing pipeline.
///
/// 1. **Synchronization** ([`process::extract`]): Locates frame sync words.
/// 2. **Decoding** ([`process::decode`]): Headers, CRC and Layer I audio data.
pub mod process;

/// Data structures representing MPEG audio stream components.
///
/// - **ID3v2** ([`structs::id3`]): Tag detection and skipping
/// - **Headers** ([`structs::header`]): Frame headers and lookup tables
/// - **Layer I** ([`structs::layer1`]): Allocations, scale factors, requantization
/// - **Frames** ([`structs::frame`]): Decoded frames and tracks
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **CRC Validation** ([`utils::crc`]): Error detection
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;
