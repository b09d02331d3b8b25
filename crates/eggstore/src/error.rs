//! Error and Result types for egg container operations.

use crate::store::StoreError;
use std::io;
use thiserror::Error;

/// A convenience `Result` type for egg operations.
pub type Result<T> = std::result::Result<T, EggError>;

/// The error type for egg operations.
#[derive(Debug, Error)]
pub enum EggError {
    /// Stream parameters describe a geometry or sample type that cannot be stored.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A channel index beyond the stream's channel count was requested.
    #[error("Channel {channel} requested; only {n_channels} in this stream")]
    ChannelRange {
        /// Requested channel index.
        channel: usize,
        /// Number of channels in the stream.
        n_channels: usize,
    },

    /// Failure reported by the backing container store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Operation is not available in the stream's access mode.
    #[error("Operation requires a stream opened for {expected}")]
    WrongMode {
        /// The mode the operation needs ("reading" or "writing").
        expected: &'static str,
    },

    /// The stream was already closed.
    #[error("Stream is closed")]
    StreamClosed,

    /// A record was appended to an acquisition that was never started.
    #[error("No acquisition is open; the first record must start a new acquisition")]
    NoOpenAcquisition,

    /// File or stream header is missing or inconsistent.
    #[error("Header error: {0}")]
    Header(String),

    /// Invalid magic bytes in the container file.
    #[error("Invalid magic bytes: got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported container file format version.
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),

    /// Container checksum does not match the expected value.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Expected CRC32 checksum.
        expected: u32,
        /// Actual computed CRC32 checksum.
        actual: u32,
    },

    /// Container file content is structurally invalid.
    #[error("Corrupt container: {0}")]
    Corrupt(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
