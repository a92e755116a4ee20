use std::io;

#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err.into());
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Reserved MPEG version index {0:#04b}")]
    ReservedVersion(u8),

    #[error("Reserved layer index {0:#04b}")]
    ReservedLayer(u8),

    #[error("Reserved bitrate index {0}")]
    ReservedBitrate(u8),

    #[error("Reserved sampling frequency index {0}")]
    ReservedSamplingFrequency(u8),

    #[error("Reserved emphasis index {0:#04b}")]
    ReservedEmphasis(u8),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Id3Error {
    #[error("Missing ID3 identifier, read {0:02X?}")]
    MissingIdentifier([u8; 3]),

    #[error("Invalid ID3v2 version bytes {major:#04X} {revision:#04X}")]
    InvalidVersion { major: u8, revision: u8 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("CRC mismatch in frame at byte {offset}. Calculated {calculated:#06X}, Read {read:#06X}")]
    CrcMismatch {
        offset: u64,
        calculated: u16,
        read: u16,
    },

    #[error("Forbidden bit allocation 15 for channel {channel}, subband {subband}")]
    ForbiddenBitAllocation { channel: usize, subband: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Invalid ID3v2 tag: {0}")]
    InvalidId3Tag(#[from] Id3Error),

    #[error("Invalid frame header: {0}")]
    InvalidHeader(#[from] HeaderError),

    #[error("Invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("Stream ended in the middle of a frame")]
    PrematureEndOfStream,

    #[error("I/O failure: {0}")]
    Io(io::Error),
}

impl DecodeError {
    /// Errors that only invalidate the frame being read. Synchronization
    /// resumes after them.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, DecodeError::InvalidHeader(_) | DecodeError::Frame(_))
    }
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => DecodeError::PrematureEndOfStream,
            _ => DecodeError::Io(e),
        }
    }
}

#[test]
fn eof_maps_to_premature_end() {
    let err: DecodeError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
    assert!(matches!(err, DecodeError::PrematureEndOfStream));

    let err: DecodeError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
    assert!(matches!(err, DecodeError::Io(_)));
    assert!(!err.is_frame_local());

    let err: DecodeError = HeaderError::ReservedBitrate(15).into();
    assert!(err.is_frame_local());
}
