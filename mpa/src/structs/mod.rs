//! Data structures representing MPEG audio stream components.
//!
//! Contains the ID3v2 tag preamble, frame headers with their lookup tables,
//! Layer I audio data and the decoded frame/track containers.

pub mod frame;
pub mod header;
pub mod id3;
pub mod layer1;
