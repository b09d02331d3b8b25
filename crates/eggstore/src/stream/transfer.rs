//! Moves one record between the record buffers and an acquisition dataset.

use crate::error::Result;
use crate::store::{DatasetHandle, ElementType, Hyperslab, Store};
use crate::stream::format::{ChannelFormat, FormatDescriptor};
use crate::stream::record::RecordBuffers;

/// How records are transferred, fixed when a stream is (re)initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStrategy {
    /// The whole record moves as one contiguous row; channel records are
    /// views into the stream record.
    Direct {
        /// Samples in one stream record.
        samples: u64,
    },
    /// Physically interleaved data accessed per channel: channel `c` moves
    /// with a strided selection (column `c`, stride `n_channels`).
    StridedChannel {
        /// Channels in the stream.
        n_channels: u64,
        /// Samples per channel in one record.
        samples: u64,
    },
}

impl TransferStrategy {
    /// Chooses the strategy for a stream accessed in `access` format.
    ///
    /// Only separate access to interleaved multi-channel data needs strided
    /// transfers; every other combination reads the row as stored.
    pub fn select(format: &FormatDescriptor, access: ChannelFormat) -> Self {
        if access == ChannelFormat::Separate && format.is_interleaved() && format.n_channels() != 1
        {
            Self::StridedChannel {
                n_channels: format.n_channels() as u64,
                samples: format.channel_record_size() as u64,
            }
        } else {
            Self::Direct {
                samples: format.stream_record_size() as u64,
            }
        }
    }

    /// Returns true for the per-channel strided strategy.
    pub fn is_strided(&self) -> bool {
        matches!(self, Self::StridedChannel { .. })
    }

    /// Binds the record buffers for this strategy.
    pub fn bind(&self, format: &FormatDescriptor, buffers: &mut RecordBuffers) {
        match self {
            Self::Direct { .. } => buffers.bind_direct(format.channel_record_bytes()),
            Self::StridedChannel { .. } => buffers.bind_aliased(format.channel_record_bytes()),
        }
    }

    /// Reads record `row` of `dataset` into the buffers.
    pub fn read<S: Store>(
        &self,
        store: &S,
        dataset: &DatasetHandle,
        element: ElementType,
        row: u64,
        buffers: &mut RecordBuffers,
    ) -> Result<()> {
        match *self {
            Self::Direct { samples } => {
                let selection = Hyperslab::contiguous(row, samples);
                store.read_hyperslab(dataset, element, &selection, buffers.stream_mut())?;
            }
            Self::StridedChannel {
                n_channels,
                samples,
            } => {
                for channel in 0..buffers.n_channels() {
                    let selection = Hyperslab::strided(row, channel as u64, n_channels, samples);
                    if let Some(out) = buffers.channel_mut(channel) {
                        store.read_hyperslab(dataset, element, &selection, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Writes the buffers as record `row` of `dataset`.
    pub fn write<S: Store>(
        &self,
        store: &mut S,
        dataset: &DatasetHandle,
        element: ElementType,
        row: u64,
        buffers: &RecordBuffers,
    ) -> Result<()> {
        match *self {
            Self::Direct { samples } => {
                let selection = Hyperslab::contiguous(row, samples);
                store.write_hyperslab(dataset, element, &selection, buffers.stream())?;
            }
            Self::StridedChannel {
                n_channels,
                samples,
            } => {
                for channel in 0..buffers.n_channels() {
                    let selection = Hyperslab::strided(row, channel as u64, n_channels, samples);
                    if let Some(data) = buffers.channel(channel) {
                        store.write_hyperslab(dataset, element, &selection, data)?;
                    }
                }
            }
        }
        Ok(())
    }
}
