//! Decoded frames and tracks.

use std::time::Duration;

use crate::structs::header::Header;
use crate::structs::id3::Id3Tag;
use crate::structs::layer1::ChannelSamples;
use crate::utils::errors::DecodeError;

/// One synchronized frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Byte offset of the `0xFF` sync byte in the source.
    pub offset: u64,
    pub header: Header,
    /// Present iff `header.error_protection`.
    pub crc: Option<u16>,
    /// Outcome of CRC verification, when a CRC was present and checked.
    pub crc_valid: Option<bool>,
    /// Requantized subband samples `[channel][subband][sample]`, Layer I only.
    pub samples: Option<Vec<ChannelSamples>>,
    /// Never populated.
    pub ancillary_data: Option<Vec<u8>>,
}

impl Frame {
    pub fn has_samples(&self) -> bool {
        self.samples.is_some()
    }
}

/// How a decode pass stopped.
#[derive(Debug)]
pub enum StreamEnd {
    /// No further sync word before the end of the source.
    EndOfStream,
    /// The source ran out inside a header, CRC or audio data.
    Truncated,
    /// A fatal error for this source. Frames decoded before it are kept.
    Failed(DecodeError),
}

impl StreamEnd {
    pub fn is_failure(&self) -> bool {
        matches!(self, StreamEnd::Failed(_))
    }
}

/// Frames of one source in stream order.
#[derive(Debug)]
pub struct Track {
    pub source: String,
    pub id3: Option<Id3Tag>,
    pub frames: Vec<Frame>,
    /// Sync candidates whose frame was rejected.
    pub rejected: usize,
    pub end: StreamEnd,
}

impl Track {
    pub fn duration(&self) -> Duration {
        self.frames.iter().map(|frame| frame.header.duration()).sum()
    }

    pub fn crc_failures(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.crc_valid == Some(false))
            .count()
    }
}
