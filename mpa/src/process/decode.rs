use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, trace};

use crate::log_or_err;
use crate::process::extract::find_sync;
use crate::structs::frame::{Frame, StreamEnd, Track};
use crate::structs::header::{Header, Layer};
use crate::structs::id3::{Id3Tag, has_id3_tag, skip_id3_tag};
use crate::structs::layer1::Layer1Audio;
use crate::utils::bitstream_io::BitCursor;
use crate::utils::crc::Crc16;
use crate::utils::errors::{DecodeError, FrameError};

/// Options shared by every stage of a decode pass.
#[derive(Debug, Clone)]
pub struct DecoderState {
    /// Validation problems at or above this level abort the current frame
    /// instead of being logged.
    pub fail_level: log::Level,
    /// Read and requantize Layer I audio data.
    pub decode_audio: bool,
    /// Check the CRC-16 of protected frames whose audio data was read.
    pub verify_crc: bool,
}

impl Default for DecoderState {
    fn default() -> Self {
        Self {
            fail_level: log::Level::Error,
            decode_audio: true,
            verify_crc: true,
        }
    }
}

/// Decodes MPEG audio elementary streams into frames.
///
/// ```
/// use mpa::process::{EXAMPLE_DATA, decode::Decoder};
///
/// let track = Decoder::default().decode("example", std::io::Cursor::new(EXAMPLE_DATA));
///
/// assert_eq!(track.frames.len(), 2);
/// assert_eq!(track.frames[0].offset, 14);
/// ```
#[derive(Debug, Default)]
pub struct Decoder {
    state: DecoderState,
}

impl Decoder {
    /// Sets the failure level for validation errors.
    ///
    /// - `log::Level::Error`: Only fail on Error level messages (default)
    /// - `log::Level::Warn`: Fail on Warning level and above (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.state.fail_level = level;
    }

    /// Disabling audio decoding leaves every frame without samples and skips
    /// CRC verification.
    pub fn set_decode_audio(&mut self, enabled: bool) {
        self.state.decode_audio = enabled;
    }

    pub fn set_verify_crc(&mut self, enabled: bool) {
        self.state.verify_crc = enabled;
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Iterates over the frames of `reader` as they are decoded.
    pub fn frames<R>(&self, reader: R) -> Frames<R>
    where
        R: io::Read + io::Seek,
    {
        Frames::new(self.state.clone(), reader)
    }

    /// Decodes a whole source.
    ///
    /// Never fails as such: a fatal error ends the pass and is reported in
    /// [`Track::end`] next to the frames decoded before it.
    pub fn decode<R>(&self, source: impl Into<String>, reader: R) -> Track
    where
        R: io::Read + io::Seek,
    {
        let source = source.into();
        let mut frames = self.frames(reader);

        let mut decoded = Vec::new();
        let mut failure = None;
        for result in frames.by_ref() {
            match result {
                Ok(frame) => decoded.push(frame),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let end = match failure {
            Some(e) => StreamEnd::Failed(e),
            None if frames.is_truncated() => StreamEnd::Truncated,
            None => StreamEnd::EndOfStream,
        };

        debug!(
            "{source}: {} frame(s), {} rejected, {end:?}",
            decoded.len(),
            frames.rejected()
        );

        Track {
            source,
            id3: frames.id3_tag(),
            frames: decoded,
            rejected: frames.rejected(),
            end,
        }
    }

    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> Result<Track> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

        Ok(self.decode(path.display().to_string(), BufReader::new(file)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    Syncing,
    Done,
}

/// Frame iterator returned by [`Decoder::frames`].
///
/// Frame-local errors (reserved header fields, CRC mismatches and forbidden
/// allocations at or above the fail level) are logged and skipped by
/// resynchronizing one byte after the rejected sync word. Running out of
/// data inside a frame ends the iteration quietly, see
/// [`Frames::is_truncated`]. Any other error is yielded once and ends it.
#[derive(Debug)]
pub struct Frames<R: io::Read + io::Seek> {
    state: DecoderState,
    reader: BitCursor<R>,
    crc: Crc16,
    stage: Stage,
    id3: Option<Id3Tag>,
    rejected: usize,
    truncated: bool,
}

impl<R: io::Read + io::Seek> Frames<R> {
    pub fn new(state: DecoderState, reader: R) -> Self {
        Self {
            state,
            reader: BitCursor::new(reader),
            crc: Crc16::default(),
            stage: Stage::Start,
            id3: None,
            rejected: 0,
            truncated: false,
        }
    }

    /// The ID3v2 tag skipped at the start of the stream.
    pub fn id3_tag(&self) -> Option<Id3Tag> {
        self.id3
    }

    /// Number of sync candidates whose frame was rejected so far.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Whether the stream ended inside a frame.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn skip_metadata(&mut self) -> Result<(), DecodeError> {
        if has_id3_tag(&mut self.reader)? {
            self.id3 = Some(skip_id3_tag(&mut self.reader)?);
        }

        Ok(())
    }

    fn read_frame(&mut self, offset: u64) -> Result<Frame, DecodeError> {
        let state = &self.state;
        let reader = &mut self.reader;

        let (header, raw) = Header::read(reader)?;

        let crc = if header.error_protection {
            Some(reader.read_bits(16)? as u16)
        } else {
            None
        };

        let audio = match header.layer {
            Layer::Layer1 if state.decode_audio => Some(Layer1Audio::read(state, reader, &header)?),
            _ => {
                trace!("{} audio data at byte {offset} is not decoded", header.layer);
                None
            }
        };

        let crc_valid = match (crc, &audio) {
            (Some(read), Some(audio)) if state.verify_crc => {
                let header_crc = self.crc.update(self.crc.init, &raw[1..]);
                let calculated = audio.update_crc(&self.crc, header_crc);

                if calculated != read {
                    log_or_err!(
                        state,
                        log::Level::Warn,
                        FrameError::CrcMismatch {
                            offset,
                            calculated,
                            read,
                        }
                    );
                }

                Some(calculated == read)
            }
            _ => None,
        };

        if audio.is_some() {
            let consumed = reader.position_in_bits()?.div_ceil(8) - offset;
            let expected = header.frame_length_bytes();
            if expected != 0 && consumed as usize > expected {
                debug!(
                    "Frame at byte {offset} read {consumed} bytes, header implies {expected}"
                );
            }
        }

        Ok(Frame {
            offset,
            header,
            crc,
            crc_valid,
            samples: audio.map(Layer1Audio::into_samples),
            ancillary_data: None,
        })
    }

    fn stop(&mut self, error: DecodeError) -> Option<Result<Frame, DecodeError>> {
        self.stage = Stage::Done;

        match error {
            DecodeError::PrematureEndOfStream => {
                debug!("Stream ends inside a frame");
                self.truncated = true;
                None
            }
            error => {
                debug!("Decoding stopped: {error}");
                Some(Err(error))
            }
        }
    }
}

impl<R: io::Read + io::Seek> Iterator for Frames<R> {
    type Item = Result<Frame, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stage {
                Stage::Start => {
                    self.stage = Stage::Syncing;
                    if let Err(e) = self.skip_metadata() {
                        return self.stop(e);
                    }
                }
                Stage::Syncing => {
                    let sync = match find_sync(&mut self.reader) {
                        Ok(Some(sync)) => sync,
                        Ok(None) => {
                            self.stage = Stage::Done;
                            return None;
                        }
                        Err(e) => return self.stop(e.into()),
                    };

                    if sync.skipped > 0 {
                        debug!(
                            "Skipped {} byte(s) before sync at byte {}",
                            sync.skipped, sync.offset
                        );
                    }

                    match self.read_frame(sync.offset) {
                        Ok(frame) => return Some(Ok(frame)),
                        Err(e) if e.is_frame_local() => {
                            debug!("Rejected frame at byte {}: {e}", sync.offset);
                            self.rejected += 1;

                            if let Err(e) = self.reader.seek_to(sync.offset + 1) {
                                return self.stop(e.into());
                            }
                        }
                        Err(e) => return self.stop(e),
                    }
                }
                Stage::Done => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read, Seek};

    use super::*;
    use crate::process::{EXAMPLE_DATA, EXAMPLE_FRAME};
    use crate::structs::header::ChannelMode;

    fn decode(decoder: &Decoder, data: &[u8]) -> Track {
        decoder.decode("test", Cursor::new(data.to_vec()))
    }

    /// `EXAMPLE_FRAME` with error protection and the given CRC word.
    fn protected_frame(crc: Option<u16>) -> Vec<u8> {
        let mut frame = vec![0xFF, 0xFE, 0x40, 0xC4];

        let crc = crc.unwrap_or_else(|| {
            let crc16 = Crc16::default();
            let value = crc16.update(crc16.init, &[0x40, 0xC4]);
            crc16.update(value, &EXAMPLE_FRAME[4..20])
        });

        frame.extend_from_slice(&crc.to_be_bytes());
        frame.extend_from_slice(&EXAMPLE_FRAME[4..]);
        frame
    }

    /// Returns an I/O error once `limit` bytes have been read.
    struct FailingReader {
        inner: Cursor<Vec<u8>>,
        limit: u64,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let remaining = self.limit.saturating_sub(self.inner.position());
            if remaining == 0 {
                return Err(io::Error::other("device unplugged"));
            }

            let len = buf.len().min(remaining as usize);
            self.inner.read(&mut buf[..len])
        }
    }

    impl Seek for FailingReader {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn decode_example_data() {
        let track = decode(&Decoder::default(), EXAMPLE_DATA);

        assert!(matches!(track.end, StreamEnd::EndOfStream));
        assert_eq!(track.id3.map(|tag| tag.size), Some(4));
        assert_eq!(track.rejected, 0);
        assert_eq!(track.frames.len(), 2);
        assert_eq!(track.frames[0].offset, 14);
        assert_eq!(track.frames[1].offset, 41);

        let frame = &track.frames[0];
        assert_eq!(frame.header.mode, ChannelMode::SingleChannel);
        assert_eq!(frame.header.bitrate, 128);
        assert_eq!(frame.crc, None);
        assert_eq!(frame.crc_valid, None);

        let samples = frame.samples.as_ref().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0][0], [8; 12]);
        assert!(samples[0][1..].iter().all(|sb| sb == &[0; 12]));
        assert_eq!(track.duration().as_micros(), 2 * 8707);
    }

    #[test]
    fn resync_after_garbage() {
        let mut data: Vec<u8> = (0..50).map(|i| ((i * 37 + 11) % 255) as u8).collect();
        data.extend_from_slice(EXAMPLE_FRAME);

        let track = decode(&Decoder::default(), &data);

        assert!(matches!(track.end, StreamEnd::EndOfStream));
        assert_eq!(track.frames.len(), 1);
        assert_eq!(track.frames[0].offset, 50);
    }

    #[test]
    fn reserved_bitrate_is_skipped() {
        let mut data = vec![0xFF, 0xFF, 0xF0, 0xC4];
        data.extend_from_slice(EXAMPLE_FRAME);

        let track = decode(&Decoder::default(), &data);

        assert_eq!(track.rejected, 1);
        assert_eq!(track.frames.len(), 1);
        assert_eq!(track.frames[0].offset, 4);
    }

    #[test]
    fn truncated_frame_keeps_earlier_frames() {
        let track = decode(&Decoder::default(), &EXAMPLE_FRAME[..20]);
        assert!(matches!(track.end, StreamEnd::Truncated));
        assert!(track.frames.is_empty());

        let mut data = EXAMPLE_FRAME.to_vec();
        data.extend_from_slice(&EXAMPLE_FRAME[..10]);

        let track = decode(&Decoder::default(), &data);
        assert!(matches!(track.end, StreamEnd::Truncated));
        assert_eq!(track.frames.len(), 1);
    }

    #[test]
    fn truncated_header_keeps_earlier_frames() {
        let mut data = EXAMPLE_FRAME.to_vec();
        data.extend_from_slice(&[0xFF, 0xFB]);

        let track = decode(&Decoder::default(), &data);

        assert!(matches!(track.end, StreamEnd::Truncated));
        assert_eq!(track.frames.len(), 1);
        assert_eq!(track.frames[0].offset, 0);
    }

    #[test]
    fn truncated_crc_keeps_earlier_frames() {
        let mut data = EXAMPLE_FRAME.to_vec();
        // Header plus the first CRC byte
        data.extend_from_slice(&protected_frame(None)[..5]);

        let track = decode(&Decoder::default(), &data);

        assert!(matches!(track.end, StreamEnd::Truncated));
        assert_eq!(track.frames.len(), 1);
        assert_eq!(track.rejected, 0);
    }

    #[test]
    fn io_failure_ends_decoding() {
        let mut data = EXAMPLE_FRAME.to_vec();
        data.extend_from_slice(EXAMPLE_FRAME);
        let reader = FailingReader {
            inner: Cursor::new(data),
            limit: 30,
        };

        let track = Decoder::default().decode("failing", reader);

        assert_eq!(track.frames.len(), 1);
        assert!(matches!(track.end, StreamEnd::Failed(DecodeError::Io(_))));
    }

    #[test]
    fn invalid_id3_tag_is_fatal() {
        let mut data = b"ID3\xFF\x00\x00\x00\x00\x00\x00".to_vec();
        data.extend_from_slice(EXAMPLE_FRAME);

        let track = decode(&Decoder::default(), &data);

        assert!(track.frames.is_empty());
        assert!(matches!(
            track.end,
            StreamEnd::Failed(DecodeError::InvalidId3Tag(_))
        ));
    }

    #[test]
    fn valid_crc() {
        let track = decode(&Decoder::default(), &protected_frame(None));

        assert_eq!(track.frames.len(), 1);
        let frame = &track.frames[0];
        assert!(frame.header.error_protection);
        assert!(frame.crc.is_some());
        assert_eq!(frame.crc_valid, Some(true));
        assert_eq!(frame.samples.as_ref().unwrap()[0][0], [8; 12]);
        assert_eq!(track.crc_failures(), 0);
    }

    #[test]
    fn crc_mismatch_depends_on_fail_level() {
        let data = protected_frame(Some(0x1234));

        let track = decode(&Decoder::default(), &data);
        assert_eq!(track.frames.len(), 1);
        assert_eq!(track.frames[0].crc, Some(0x1234));
        assert_eq!(track.frames[0].crc_valid, Some(false));
        assert_eq!(track.crc_failures(), 1);

        let mut strict = Decoder::default();
        strict.set_fail_level(log::Level::Warn);
        let track = decode(&strict, &data);
        assert!(track.frames.is_empty());
        assert!(track.rejected >= 1);
        assert!(!track.end.is_failure());

        let mut unchecked = Decoder::default();
        unchecked.set_verify_crc(false);
        let track = decode(&unchecked, &data);
        assert_eq!(track.frames[0].crc_valid, None);
    }

    #[test]
    fn layer3_frames_have_no_samples() {
        let mut data = vec![0xFF, 0xFB, 0x90, 0x64];
        data.extend_from_slice(&[0x00; 200]);

        let track = decode(&Decoder::default(), &data);

        assert!(matches!(track.end, StreamEnd::EndOfStream));
        assert_eq!(track.frames.len(), 1);
        assert_eq!(track.frames[0].header.layer, Layer::Layer3);
        assert!(!track.frames[0].has_samples());
    }

    #[test]
    fn headers_only() {
        let mut decoder = Decoder::default();
        decoder.set_decode_audio(false);

        let track = decode(&decoder, EXAMPLE_DATA);

        // Sync candidates inside the undecoded audio data are rejected
        assert!(track.rejected > 0);
        assert_eq!(
            track.frames.iter().map(|f| f.offset).collect::<Vec<_>>(),
            vec![14, 41]
        );
        assert!(track.frames.iter().all(|f| !f.has_samples()));
    }

    #[test]
    fn frames_iterator() -> anyhow::Result<()> {
        let decoder = Decoder::default();
        let mut frames = decoder.frames(Cursor::new(EXAMPLE_DATA));

        let first = frames.next().transpose()?;
        assert_eq!(first.map(|f| f.offset), Some(14));
        assert!(frames.id3_tag().is_some());

        assert_eq!(frames.by_ref().count(), 1);
        assert!(frames.next().is_none());
        assert!(!frames.is_truncated());
        Ok(())
    }
}
