//! Record buffers shared between the caller and the transfer engine.
//!
//! A stream owns one buffer for the whole record and one per channel. In
//! direct mode the channel buffers are views into the stream buffer; in
//! aliased mode each channel owns its storage and the stream buffer is
//! unbound.

use std::ops::Range;

/// A fixed-length byte buffer tagged with who owns its storage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ByteRecord {
    /// No storage bound; reads as an empty slice.
    #[default]
    Unbound,
    /// The record owns its bytes.
    Owned(Vec<u8>),
    /// The record borrows `len` bytes at `offset` of its stream buffer.
    View {
        /// Byte offset into the stream buffer.
        offset: usize,
        /// Length in bytes.
        len: usize,
    },
}

impl ByteRecord {
    /// A zeroed owned record of `len` bytes.
    pub fn owned(len: usize) -> Self {
        Self::Owned(vec![0u8; len])
    }

    /// Length in bytes this record advertises.
    pub fn len(&self) -> usize {
        match self {
            Self::Unbound => 0,
            Self::Owned(bytes) => bytes.len(),
            Self::View { len, .. } => *len,
        }
    }

    /// Returns true if the record has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the record owns its storage.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    fn view_range(offset: usize, len: usize) -> Range<usize> {
        offset..offset + len
    }

    /// Resolves the record's bytes; views resolve against `arena`.
    pub fn bytes<'a>(&'a self, arena: &'a [u8]) -> &'a [u8] {
        match self {
            Self::Unbound => &[],
            Self::Owned(bytes) => bytes,
            Self::View { offset, len } => arena
                .get(Self::view_range(*offset, *len))
                .unwrap_or_default(),
        }
    }

    /// Resolves the record's bytes mutably; views resolve against `arena`.
    pub fn bytes_mut<'a>(&'a mut self, arena: &'a mut [u8]) -> &'a mut [u8] {
        match self {
            Self::Unbound => &mut [],
            Self::Owned(bytes) => bytes,
            Self::View { offset, len } => arena
                .get_mut(Self::view_range(*offset, *len))
                .unwrap_or_default(),
        }
    }
}

/// The stream record and its per-channel records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBuffers {
    stream: ByteRecord,
    channels: Vec<ByteRecord>,
}

impl RecordBuffers {
    /// Unbound buffers for `n_channels` channels.
    pub fn new(n_channels: usize) -> Self {
        Self {
            stream: ByteRecord::Unbound,
            channels: vec![ByteRecord::Unbound; n_channels],
        }
    }

    /// Direct mode: the stream owns `n_channels * channel_bytes` bytes and
    /// channel `i` views bytes `i * channel_bytes ..`.
    pub fn bind_direct(&mut self, channel_bytes: usize) {
        let n_channels = self.channels.len();
        self.stream = ByteRecord::owned(n_channels * channel_bytes);
        for (i, channel) in self.channels.iter_mut().enumerate() {
            *channel = ByteRecord::View {
                offset: i * channel_bytes,
                len: channel_bytes,
            };
        }
    }

    /// Aliased mode: each channel owns `channel_bytes` bytes and the stream
    /// record is unbound.
    pub fn bind_aliased(&mut self, channel_bytes: usize) {
        self.stream = ByteRecord::Unbound;
        for channel in self.channels.iter_mut() {
            *channel = ByteRecord::owned(channel_bytes);
        }
    }

    /// Number of channel records.
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    /// The stream record; empty when unbound.
    pub fn stream(&self) -> &[u8] {
        self.stream.bytes(&[])
    }

    /// The stream record, mutably; empty when unbound.
    pub fn stream_mut(&mut self) -> &mut [u8] {
        self.stream.bytes_mut(&mut [])
    }

    /// Returns true if the stream record has storage of its own.
    pub fn stream_is_bound(&self) -> bool {
        self.stream.is_owned()
    }

    /// The record of `channel`, or `None` past the channel count.
    pub fn channel(&self, channel: usize) -> Option<&[u8]> {
        let arena = self.stream.bytes(&[]);
        self.channels.get(channel).map(|record| record.bytes(arena))
    }

    /// The record of `channel`, mutably, or `None` past the channel count.
    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut [u8]> {
        let arena = self.stream.bytes_mut(&mut []);
        self.channels
            .get_mut(channel)
            .map(|record| record.bytes_mut(arena))
    }
}
