//! MPEG audio frame header.
//!
//! A frame starts with an 11-bit sync word followed by 21 bits of header:
//!
//! ```text
//! 11111111 111VVLLP BBBBFFDX MMEECOGG
//! ```
//!
//! | Field | Bits | Meaning                                              |
//! |-------|------|------------------------------------------------------|
//! | V     | 2    | version: 00 = 2.5, 01 = reserved, 10 = 2, 11 = 1     |
//! | L     | 2    | layer: 00 = reserved, 01 = III, 10 = II, 11 = I      |
//! | P     | 1    | protection, 0 means a CRC follows the header         |
//! | B     | 4    | bitrate index, 15 is reserved                        |
//! | F     | 2    | sampling frequency index, 3 is reserved              |
//! | D     | 1    | padding                                              |
//! | X     | 1    | private                                              |
//! | M     | 2    | channel mode                                         |
//! | E     | 2    | mode extension (joint stereo only)                   |
//! | C     | 1    | copyright                                            |
//! | O     | 1    | original                                             |
//! | G     | 2    | emphasis, 2 is reserved                              |
//!
//! The header decoder works on the three bytes after the `0xFF` sync byte.
//! Every field is masked in place and then shifted down.

use std::fmt::{Display, Formatter};
use std::io;
use std::time::Duration;

use log::trace;

use crate::utils::bitstream_io::BitCursor;
use crate::utils::errors::{DecodeError, HeaderError};

pub const VERSION_MASK: u8 = 0b0001_1000;
pub const LAYER_MASK: u8 = 0b0000_0110;
pub const PROTECTION_MASK: u8 = 0b0000_0001;

pub const BITRATE_MASK: u8 = 0b1111_0000;
pub const FREQUENCY_MASK: u8 = 0b0000_1100;
pub const PADDING_MASK: u8 = 0b0000_0010;
pub const PRIVATE_MASK: u8 = 0b0000_0001;

pub const MODE_MASK: u8 = 0b1100_0000;
pub const MODE_EXTENSION_MASK: u8 = 0b0011_0000;
pub const COPYRIGHT_MASK: u8 = 0b0000_1000;
pub const ORIGINAL_MASK: u8 = 0b0000_0100;
pub const EMPHASIS_MASK: u8 = 0b0000_0011;

/// Version index 01 is reserved.
pub const RESERVED_VERSION_INDEX: u8 = 0b01;
/// Layer index 00 is reserved.
pub const RESERVED_LAYER_INDEX: u8 = 0b00;
pub const RESERVED_BITRATE_INDEX: u8 = 15;
pub const RESERVED_FREQUENCY_INDEX: u8 = 3;
pub const RESERVED_EMPHASIS_INDEX: u8 = 0b10;

/// Bitrates in kbit/s, indexed `[version class][layer][bitrate index]`.
///
/// MPEG-2 and MPEG-2.5 share the second version class, and Layers II and III
/// share a row there. Index 0 is free format.
pub const BITRATE_KBPS: [[[u32; 15]; 3]; 2] = [
    [
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
    ],
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    ],
];

/// Sampling frequencies in Hz, indexed `[version][frequency index]`.
pub const SAMPLING_FREQUENCY_HZ: [[u32; 3]; 3] = [
    [44_100, 48_000, 32_000],
    [22_050, 24_000, 16_000],
    [11_025, 12_000, 8_000],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl MpegVersion {
    pub fn from_index(index: u8) -> Result<Self, HeaderError> {
        match index {
            0b00 => Ok(MpegVersion::Mpeg25),
            0b10 => Ok(MpegVersion::Mpeg2),
            0b11 => Ok(MpegVersion::Mpeg1),
            _ => Err(HeaderError::ReservedVersion(index)),
        }
    }

    /// Row of [`BITRATE_KBPS`].
    const fn bitrate_class(self) -> usize {
        match self {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 1,
        }
    }

    /// Row of [`SAMPLING_FREQUENCY_HZ`].
    const fn frequency_row(self) -> usize {
        match self {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 => 1,
            MpegVersion::Mpeg25 => 2,
        }
    }
}

impl Display for MpegVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MpegVersion::Mpeg1 => "MPEG-1",
            MpegVersion::Mpeg2 => "MPEG-2",
            MpegVersion::Mpeg25 => "MPEG-2.5",
        };

        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Layer1,
    Layer2,
    Layer3,
}

impl Layer {
    pub fn from_index(index: u8) -> Result<Self, HeaderError> {
        match index {
            0b01 => Ok(Layer::Layer3),
            0b10 => Ok(Layer::Layer2),
            0b11 => Ok(Layer::Layer1),
            _ => Err(HeaderError::ReservedLayer(index)),
        }
    }

    const fn table_index(self) -> usize {
        match self {
            Layer::Layer1 => 0,
            Layer::Layer2 => 1,
            Layer::Layer3 => 2,
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Layer::Layer1 => "Layer I",
            Layer::Layer2 => "Layer II",
            Layer::Layer3 => "Layer III",
        };

        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    SingleChannel,
}

impl From<u8> for ChannelMode {
    fn from(index: u8) -> Self {
        match index & 0b11 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::SingleChannel,
        }
    }
}

impl Display for ChannelMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChannelMode::Stereo => "Stereo",
            ChannelMode::JointStereo => "Joint stereo",
            ChannelMode::DualChannel => "Dual channel",
            ChannelMode::SingleChannel => "Single channel",
        };

        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    None,
    Microseconds50_15,
    CcittJ17,
}

impl Emphasis {
    pub fn from_index(index: u8) -> Result<Self, HeaderError> {
        match index {
            0b00 => Ok(Emphasis::None),
            0b01 => Ok(Emphasis::Microseconds50_15),
            0b11 => Ok(Emphasis::CcittJ17),
            _ => Err(HeaderError::ReservedEmphasis(index)),
        }
    }
}

impl Display for Emphasis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Emphasis::None => "None",
            Emphasis::Microseconds50_15 => "50/15 µs",
            Emphasis::CcittJ17 => "CCITT J.17",
        };

        f.write_str(s)
    }
}

/// Decoded frame header.
///
/// Only constructed from valid field values: reserved version, layer,
/// bitrate, sampling frequency and emphasis indices are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: MpegVersion,
    pub layer: Layer,
    pub error_protection: bool,
    /// kbit/s, 0 for free format.
    pub bitrate: u32,
    /// Hz.
    pub sampling_frequency: u32,
    pub padded: bool,
    pub private: bool,
    pub mode: ChannelMode,
    pub mode_extension: u8,
    pub intensity_stereo: bool,
    pub ms_stereo: bool,
    pub copyrighted: bool,
    pub original: bool,
    pub emphasis: Emphasis,
}

impl Header {
    /// Bytes occupied by the header after the `0xFF` sync byte.
    pub const SIZE: usize = 3;

    /// Consumes the three header bytes at the cursor and decodes them.
    ///
    /// The raw bytes are returned alongside the header since the frame CRC
    /// covers the last two of them.
    pub fn read<R>(reader: &mut BitCursor<R>) -> Result<(Self, [u8; Self::SIZE]), DecodeError>
    where
        R: io::Read + io::Seek,
    {
        let mut bytes = [0u8; Self::SIZE];
        reader.read_bytes(&mut bytes)?;

        Ok((Self::from_bytes(bytes)?, bytes))
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Result<Self, HeaderError> {
        let [b1, b2, b3] = bytes;

        let version = MpegVersion::from_index((b1 & VERSION_MASK) >> 3)?;
        let layer = Layer::from_index((b1 & LAYER_MASK) >> 1)?;
        let error_protection = (b1 & PROTECTION_MASK) == 0;

        let bitrate_index = (b2 & BITRATE_MASK) >> 4;
        if bitrate_index == RESERVED_BITRATE_INDEX {
            return Err(HeaderError::ReservedBitrate(bitrate_index));
        }
        let bitrate =
            BITRATE_KBPS[version.bitrate_class()][layer.table_index()][bitrate_index as usize];

        let frequency_index = (b2 & FREQUENCY_MASK) >> 2;
        if frequency_index == RESERVED_FREQUENCY_INDEX {
            return Err(HeaderError::ReservedSamplingFrequency(frequency_index));
        }
        let sampling_frequency =
            SAMPLING_FREQUENCY_HZ[version.frequency_row()][frequency_index as usize];

        let padded = (b2 & PADDING_MASK) != 0;
        let private = (b2 & PRIVATE_MASK) != 0;

        let mode = ChannelMode::from((b3 & MODE_MASK) >> 6);
        let mode_extension = (b3 & MODE_EXTENSION_MASK) >> 4;
        let (intensity_stereo, ms_stereo) = match (mode, layer) {
            (ChannelMode::JointStereo, Layer::Layer3) => {
                ((mode_extension & 0b01) != 0, (mode_extension & 0b10) != 0)
            }
            (ChannelMode::JointStereo, _) => (true, false),
            _ => (false, false),
        };
        let copyrighted = (b3 & COPYRIGHT_MASK) != 0;
        let original = (b3 & ORIGINAL_MASK) != 0;
        let emphasis = Emphasis::from_index(b3 & EMPHASIS_MASK)?;

        let header = Header {
            version,
            layer,
            error_protection,
            bitrate,
            sampling_frequency,
            padded,
            private,
            mode,
            mode_extension,
            intensity_stereo,
            ms_stereo,
            copyrighted,
            original,
            emphasis,
        };

        trace!(
            "Header: {} {}, {} kbit/s, {} Hz, {}{}{}",
            header.version,
            header.layer,
            header.bitrate,
            header.sampling_frequency,
            header.mode,
            if header.error_protection { ", CRC" } else { "" },
            if header.padded { ", padded" } else { "" },
        );

        Ok(header)
    }

    pub fn sampling_frequency_khz(&self) -> f64 {
        self.sampling_frequency as f64 / 1000.0
    }

    pub fn is_free_format(&self) -> bool {
        self.bitrate == 0
    }

    pub fn channels(&self) -> usize {
        match self.mode {
            ChannelMode::SingleChannel => 1,
            _ => 2,
        }
    }

    /// First subband whose allocation and samples are shared by both
    /// channels (Layers I and II). 32 outside joint stereo.
    pub fn bound(&self) -> usize {
        match self.mode {
            ChannelMode::JointStereo => (self.mode_extension as usize + 1) * 4,
            _ => 32,
        }
    }

    pub fn samples_per_frame(&self) -> usize {
        match (self.layer, self.version) {
            (Layer::Layer1, _) => 384,
            (Layer::Layer2, _) | (Layer::Layer3, MpegVersion::Mpeg1) => 1152,
            (Layer::Layer3, _) => 576,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(
            self.samples_per_frame() as u64 * 1_000_000_000 / self.sampling_frequency as u64,
        )
    }

    /// Frame length derived from bitrate, sampling frequency and padding.
    ///
    /// `12 * bitrate / fs` for Layer I (+4 when padded), `144 * bitrate / fs`
    /// otherwise (+1 when padded). Free-format frames report 0. Only a hint:
    /// frame navigation always goes through synchronization.
    pub fn frame_length_bytes(&self) -> usize {
        if self.is_free_format() {
            return 0;
        }

        let (coefficient, slot) = match self.layer {
            Layer::Layer1 => (12u64, 4),
            Layer::Layer2 | Layer::Layer3 => (144u64, 1),
        };

        let length = coefficient * self.bitrate as u64 * 1000 / self.sampling_frequency as u64;

        length as usize + if self.padded { slot } else { 0 }
    }
}
