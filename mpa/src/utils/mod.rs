//! Utility functions and supporting infrastructure.
//!
//! Provides bit-level stream reading, CRC validation and the error types
//! shared by the decoding stages.

pub mod bitstream_io;
pub mod crc;
pub mod errors;
