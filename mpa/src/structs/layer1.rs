//! Layer I audio data.
//!
//! ## Structure
//!
//! ```text
//! allocation[ch][sb]   4 bits, one per channel below the bound, shared above
//! scalefactor[ch][sb]  6 bits, for every non-zero allocation
//! sample[ch][sb][s]    allocation + 1 bits, 12 slots per subband
//! ```
//!
//! In joint stereo the bound is `(mode_extension + 1) * 4`; subbands from the
//! bound upwards carry a single allocation and a single sample code that both
//! channels use, each with its own scale factor.
//!
//! No synthesis filterbank is applied: the output stays in the subband domain.

use std::io;

use log::trace;

use crate::log_or_err;
use crate::process::decode::DecoderState;
use crate::structs::header::Header;
use crate::utils::bitstream_io::BitCursor;
use crate::utils::crc::Crc16;
use crate::utils::errors::{DecodeError, FrameError};

pub const SUBBANDS: usize = 32;
pub const SAMPLES_PER_SUBBAND: usize = 12;

pub const ALLOCATION_BITS: u32 = 4;
pub const SCALE_FACTOR_BITS: u32 = 6;

/// ISO/IEC 11172-3 forbids this allocation code.
pub const FORBIDDEN_ALLOCATION: u8 = 15;

/// Requantized samples of one channel, `[subband][sample]`.
pub type ChannelSamples = [[i32; SAMPLES_PER_SUBBAND]; SUBBANDS];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer1Audio {
    pub bound: usize,
    /// `[channel][subband]`
    pub allocation: Vec<[u8; SUBBANDS]>,
    /// `[channel][subband]`, 0 where nothing was allocated.
    pub scale_factors: Vec<[u8; SUBBANDS]>,
    /// `[channel][subband][sample]`
    pub samples: Vec<ChannelSamples>,
}

impl Layer1Audio {
    pub fn read<R>(
        state: &DecoderState,
        reader: &mut BitCursor<R>,
        header: &Header,
    ) -> Result<Self, DecodeError>
    where
        R: io::Read + io::Seek,
    {
        let channels = header.channels();
        let bound = header.bound().min(SUBBANDS);

        let mut allocation = vec![[0u8; SUBBANDS]; channels];
        let mut scale_factors = vec![[0u8; SUBBANDS]; channels];
        let mut samples = vec![[[0i32; SAMPLES_PER_SUBBAND]; SUBBANDS]; channels];

        for sb in 0..bound {
            for ch in 0..channels {
                allocation[ch][sb] = reader.read_bits(ALLOCATION_BITS)? as u8;
            }
        }

        for sb in bound..SUBBANDS {
            let shared = reader.read_bits(ALLOCATION_BITS)? as u8;
            for channel in allocation.iter_mut() {
                channel[sb] = shared;
            }
        }

        for (ch, channel) in allocation.iter().enumerate() {
            for (sb, &alloc) in channel.iter().enumerate() {
                if alloc == FORBIDDEN_ALLOCATION && (sb < bound || ch == 0) {
                    log_or_err!(
                        state,
                        log::Level::Warn,
                        FrameError::ForbiddenBitAllocation {
                            channel: ch,
                            subband: sb,
                        }
                    );
                }
            }
        }

        for sb in 0..SUBBANDS {
            for ch in 0..channels {
                if allocation[ch][sb] != 0 {
                    scale_factors[ch][sb] = reader.read_bits(SCALE_FACTOR_BITS)? as u8;
                }
            }
        }

        for s in 0..SAMPLES_PER_SUBBAND {
            for sb in 0..bound {
                for ch in 0..channels {
                    let alloc = allocation[ch][sb];
                    if alloc != 0 {
                        let code = reader.read_bits(alloc as u32 + 1)? as u32;
                        samples[ch][sb][s] = requantize(code, alloc, scale_factors[ch][sb]);
                    }
                }
            }

            for sb in bound..SUBBANDS {
                let alloc = allocation[0][sb];
                if alloc != 0 {
                    let code = reader.read_bits(alloc as u32 + 1)? as u32;
                    for ch in 0..channels {
                        samples[ch][sb][s] = requantize(code, alloc, scale_factors[ch][sb]);
                    }
                }
            }
        }

        trace!(
            "Layer I audio: {} channel(s), bound {}, {} allocated subband(s)",
            channels,
            bound,
            allocation[0].iter().filter(|&&a| a != 0).count()
        );

        Ok(Self {
            bound,
            allocation,
            scale_factors,
            samples,
        })
    }

    /// Advances `crc` over the allocation field in bitstream order.
    pub fn update_crc(&self, crc: &Crc16, mut value: u16) -> u16 {
        for sb in 0..self.bound {
            for channel in &self.allocation {
                value = crc.update_bits(value, channel[sb] as u32, ALLOCATION_BITS);
            }
        }

        for sb in self.bound..SUBBANDS {
            value = crc.update_bits(value, self.allocation[0][sb] as u32, ALLOCATION_BITS);
        }

        value
    }

    pub fn into_samples(self) -> Vec<ChannelSamples> {
        self.samples
    }
}

/// Requantizes one Layer I sample code.
///
/// With `b = allocation + 1` and `n` the bit length of `code` (a zero code
/// counts as one bit), the most significant bit of the code is inverted to get
/// the fraction `f`, then
///
/// ```text
/// round(2^b / (2^b - 1) * (f + 2^(1 - b))) * scale_factor
/// ```
///
/// The expression is evaluated as an exact integer ratio, rounding halves
/// up, so results never depend on floating point behaviour.
pub fn requantize(code: u32, allocation: u8, scale_factor: u8) -> i32 {
    let b = allocation as u32 + 1;
    let nbits = (u32::BITS - code.leading_zeros()).max(1);
    let fraction = (code ^ (1 << (nbits - 1))) as u64;

    // 2^b * (f * 2^(b-1) + 1) / ((2^b - 1) * 2^(b-1))
    let numerator = (1u64 << b) * ((fraction << (b - 1)) + 1);
    let denominator = ((1u64 << b) - 1) << (b - 1);
    let rounded = (2 * numerator + denominator) / (2 * denominator);

    rounded as i32 * scale_factor as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::header::ChannelMode;
    use crate::utils::bitstream_io::BitCursor;

    /// MSB-first bit packer for building audio data by hand.
    #[derive(Default)]
    struct Bits(Vec<bool>);

    impl Bits {
        fn put(&mut self, value: u32, len: u32) -> &mut Self {
            for i in (0..len).rev() {
                self.0.push((value >> i) & 1 != 0);
            }
            self
        }

        fn bytes(&self) -> Vec<u8> {
            self.0
                .chunks(8)
                .map(|chunk| {
                    chunk
                        .iter()
                        .enumerate()
                        .fold(0u8, |acc, (i, &bit)| acc | ((bit as u8) << (7 - i)))
                })
                .collect()
        }
    }

    fn header(bytes: [u8; 3]) -> Header {
        Header::from_bytes(bytes).unwrap()
    }

    #[test]
    fn requantize_all_ones_code() {
        // b = 4, f = 0b1111 ^ 0b1000 = 7, 16/15 * (7 + 1/8) = 7.6
        assert_eq!(requantize(0b1111, 3, 1), 8);
        assert_eq!(requantize(0b1111, 3, 1), requantize(0b1111, 3, 1));
        assert_eq!(requantize(0b1111, 3, 5), 40);
    }

    #[test]
    fn requantize_edge_codes() {
        // Zero code counts as one bit: f = 1, 4/3 * (1 + 1/2) = 2
        assert_eq!(requantize(0, 1, 1), 2);
        // b = 2, code 0b10 -> f = 0, 4/3 * 1/2 = 0.67
        assert_eq!(requantize(0b10, 1, 1), 1);
        // b = 15, largest code
        assert_eq!(requantize(0x7FFF, 14, 63), 16_384 * 63);
        // Scale factor 0 silences the sample
        assert_eq!(requantize(0b1111, 3, 0), 0);
    }

    #[test]
    fn mono_frame() -> anyhow::Result<()> {
        let header = header([0xFF, 0x40, 0xC4]);
        assert_eq!(header.mode, ChannelMode::SingleChannel);

        let mut bits = Bits::default();
        bits.put(3, 4);
        for _ in 1..SUBBANDS {
            bits.put(0, 4);
        }
        bits.put(1, 6);
        for _ in 0..SAMPLES_PER_SUBBAND {
            bits.put(0b1111, 4);
        }
        let data = bits.bytes();

        let mut cursor = BitCursor::from_slice(&data);
        let audio = Layer1Audio::read(&DecoderState::default(), &mut cursor, &header)?;

        assert_eq!(audio.bound, 32);
        assert_eq!(audio.allocation.len(), 1);
        assert_eq!(audio.scale_factors[0][0], 1);
        assert_eq!(audio.samples[0][0], [8; SAMPLES_PER_SUBBAND]);
        assert!(audio.samples[0][1..].iter().all(|sb| sb == &[0; 12]));
        assert_eq!(cursor.position_in_bits()?, 32 * 4 + 6 + 12 * 4);
        Ok(())
    }

    #[test]
    fn joint_stereo_shares_upper_subbands() -> anyhow::Result<()> {
        // Joint stereo, mode extension 0 -> bound 4
        let header = header([0xFF, 0x40, 0x44]);
        assert_eq!(header.bound(), 4);

        let mut bits = Bits::default();
        // Below the bound: ch0 sb0 = 1, ch1 sb0 = 2, everything else 0
        bits.put(1, 4).put(2, 4);
        for _ in 1..4 {
            bits.put(0, 4).put(0, 4);
        }
        // Shared allocation for sb4, then nothing
        bits.put(3, 4);
        for _ in 5..SUBBANDS {
            bits.put(0, 4);
        }
        // Scale factors: sb0 ch0, sb0 ch1, sb4 ch0, sb4 ch1
        bits.put(2, 6).put(3, 6).put(1, 6).put(4, 6);
        for _ in 0..SAMPLES_PER_SUBBAND {
            bits.put(0b11, 2).put(0b111, 3).put(0b1111, 4);
        }
        let data = bits.bytes();

        let mut cursor = BitCursor::from_slice(&data);
        let audio = Layer1Audio::read(&DecoderState::default(), &mut cursor, &header)?;

        assert_eq!(audio.allocation[0][4], 3);
        assert_eq!(audio.allocation[1][4], 3);
        assert_eq!(audio.samples[0][0][0], requantize(0b11, 1, 2));
        assert_eq!(audio.samples[1][0][11], requantize(0b111, 2, 3));
        assert_eq!(audio.samples[0][4][5], 8);
        assert_eq!(audio.samples[1][4][5], 32);
        assert_eq!(
            cursor.position_in_bits()?,
            (8 * 4 + 28 * 4 + 4 * 6 + 12 * 9) as u64
        );
        Ok(())
    }

    #[test]
    fn forbidden_allocation_depends_on_fail_level() -> anyhow::Result<()> {
        let header = header([0xFF, 0x40, 0xC4]);

        let mut bits = Bits::default();
        bits.put(FORBIDDEN_ALLOCATION as u32, 4);
        for _ in 1..SUBBANDS {
            bits.put(0, 4);
        }
        bits.put(0, 6);
        for _ in 0..SAMPLES_PER_SUBBAND {
            bits.put(0, 16);
        }
        let data = bits.bytes();

        let mut cursor = BitCursor::from_slice(&data);
        let audio = Layer1Audio::read(&DecoderState::default(), &mut cursor, &header)?;
        assert_eq!(audio.samples[0][0], [0; SAMPLES_PER_SUBBAND]);

        let strict = DecoderState {
            fail_level: log::Level::Warn,
            ..Default::default()
        };
        let mut cursor = BitCursor::from_slice(&data);
        let err = Layer1Audio::read(&strict, &mut cursor, &header).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Frame(FrameError::ForbiddenBitAllocation {
                channel: 0,
                subband: 0
            })
        ));
        Ok(())
    }

    #[test]
    fn truncated_audio_data() {
        let header = header([0xFF, 0x40, 0x04]);
        let mut cursor = BitCursor::from_slice(&[0x11; 10]);

        let err = Layer1Audio::read(&DecoderState::default(), &mut cursor, &header).unwrap_err();
        assert!(matches!(err, DecodeError::PrematureEndOfStream));
    }
}
