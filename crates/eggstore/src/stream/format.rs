//! Per-stream sample format and record geometry.

use crate::error::{EggError, Result};
use crate::store::{DatasetLayout, ElementType};

/// Numeric domain of the samples in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum DataFormat {
    /// Unsigned integers straight from a digitizer (1, 2, 4 or 8 bytes).
    #[default]
    Digitized = 0,
    /// Floating-point values (4 or 8 bytes).
    Analog = 1,
}

impl DataFormat {
    /// Creates a DataFormat from its stored code.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Digitized),
            1 => Some(Self::Analog),
            _ => None,
        }
    }
}

/// How the channels of a multi-channel record are arranged.
///
/// Used both for the physical layout on disk and for the layout a caller
/// wants to access records in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ChannelFormat {
    /// Samples of all channels alternate: `c0[0] c1[0] c0[1] c1[1] ...`.
    Interleaved = 0,
    /// Each channel's samples form one contiguous block.
    #[default]
    Separate = 1,
}

impl ChannelFormat {
    /// Creates a ChannelFormat from its stored code.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Interleaved),
            1 => Some(Self::Separate),
            _ => None,
        }
    }
}

/// One decoded sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// A digitized (unsigned integer) sample.
    Digitized(u64),
    /// An analog (floating-point) sample.
    Analog(f64),
}

/// Immutable format facts of one stream and the record geometry derived
/// from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    n_channels: usize,
    record_size: usize,
    data_type_size: usize,
    data_format: DataFormat,
    channel_format: ChannelFormat,
    element: ElementType,
}

impl FormatDescriptor {
    /// Creates a descriptor.
    ///
    /// # Arguments
    ///
    /// * `n_channels` - Number of channels in the stream (at least 1)
    /// * `record_size` - Samples per channel in one record (at least 1)
    /// * `data_type_size` - Bytes per sample
    /// * `data_format` - Numeric domain of the samples
    /// * `channel_format` - Physical channel layout on disk
    ///
    /// # Errors
    ///
    /// Returns `EggError::Configuration` if the sample width is not one of
    /// 1, 2, 4, 8 (digitized) or 4, 8 (analog), or if a count is zero.
    pub fn new(
        n_channels: usize,
        record_size: usize,
        data_type_size: usize,
        data_format: DataFormat,
        channel_format: ChannelFormat,
    ) -> Result<Self> {
        if n_channels == 0 {
            return Err(EggError::Configuration(
                "a stream needs at least one channel".to_string(),
            ));
        }
        if record_size == 0 {
            return Err(EggError::Configuration(
                "record size must be at least one sample".to_string(),
            ));
        }

        let element = match (data_format, data_type_size) {
            (DataFormat::Digitized, 1) => ElementType::U8,
            (DataFormat::Digitized, 2) => ElementType::U16,
            (DataFormat::Digitized, 4) => ElementType::U32,
            (DataFormat::Digitized, 8) => ElementType::U64,
            (DataFormat::Analog, 4) => ElementType::F32,
            (DataFormat::Analog, 8) => ElementType::F64,
            (DataFormat::Digitized, size) => {
                return Err(EggError::Configuration(format!(
                    "Unknown integer data type size: {}",
                    size
                )))
            }
            (DataFormat::Analog, size) => {
                return Err(EggError::Configuration(format!(
                    "Unknown floating-point data type size: {}",
                    size
                )))
            }
        };

        Ok(Self {
            n_channels,
            record_size,
            data_type_size,
            data_format,
            channel_format,
            element,
        })
    }

    /// Number of channels.
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Bytes per sample.
    pub fn data_type_size(&self) -> usize {
        self.data_type_size
    }

    /// Numeric domain.
    pub fn data_format(&self) -> DataFormat {
        self.data_format
    }

    /// Physical channel layout on disk.
    pub fn channel_format(&self) -> ChannelFormat {
        self.channel_format
    }

    /// Element type used both on disk and in memory.
    pub fn element(&self) -> ElementType {
        self.element
    }

    /// Returns true if the physical layout interleaves the channels.
    pub fn is_interleaved(&self) -> bool {
        self.channel_format == ChannelFormat::Interleaved
    }

    /// Samples per channel in one record.
    pub fn channel_record_size(&self) -> usize {
        self.record_size
    }

    /// Samples across all channels in one record.
    pub fn stream_record_size(&self) -> usize {
        self.n_channels * self.record_size
    }

    /// Bytes per channel in one record.
    pub fn channel_record_bytes(&self) -> usize {
        self.record_size * self.data_type_size
    }

    /// Bytes across all channels in one record.
    pub fn stream_record_bytes(&self) -> usize {
        self.n_channels * self.record_size * self.data_type_size
    }

    /// Layout of a new acquisition dataset: one record per row, growing
    /// one record at a time.
    pub fn acquisition_layout(&self) -> DatasetLayout {
        DatasetLayout::extensible_rows(self.element, self.stream_record_size() as u64)
    }

    /// Decodes the little-endian sample at `index` in `bytes`.
    ///
    /// Returns `None` if `bytes` is too short.
    pub fn sample(&self, bytes: &[u8], index: usize) -> Option<Sample> {
        let size = self.data_type_size;
        let raw = bytes.get(index * size..(index + 1) * size)?;
        let mut buf = [0u8; 8];
        buf[..size].copy_from_slice(raw);
        let sample = match self.element {
            ElementType::F32 => Sample::Analog(f64::from(f32::from_le_bytes([
                buf[0], buf[1], buf[2], buf[3],
            ]))),
            ElementType::F64 => Sample::Analog(f64::from_le_bytes(buf)),
            _ => Sample::Digitized(u64::from_le_bytes(buf)),
        };
        Some(sample)
    }

    /// Encodes `sample` as the little-endian sample at `index` in `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `EggError::Configuration` if the sample's domain does not
    /// match the stream, a digitized value does not fit the sample width,
    /// or `index` is past the end of `bytes`.
    pub fn encode_sample(&self, sample: Sample, bytes: &mut [u8], index: usize) -> Result<()> {
        let size = self.data_type_size;
        let encoded: [u8; 8] = match (self.element, sample) {
            (ElementType::F32, Sample::Analog(v)) => {
                let mut buf = [0u8; 8];
                buf[..4].copy_from_slice(&(v as f32).to_le_bytes());
                buf
            }
            (ElementType::F64, Sample::Analog(v)) => v.to_le_bytes(),
            (element, Sample::Digitized(v)) if !element.is_float() => {
                if size < 8 && v >> (size * 8) != 0 {
                    return Err(EggError::Configuration(format!(
                        "value {} does not fit in {} bytes",
                        v, size
                    )));
                }
                v.to_le_bytes()
            }
            (element, sample) => {
                return Err(EggError::Configuration(format!(
                    "{:?} sample cannot be stored as {:?}",
                    sample, element
                )))
            }
        };
        let slot = bytes
            .get_mut(index * size..(index + 1) * size)
            .ok_or_else(|| {
                EggError::Configuration(format!("sample index {} past end of record", index))
            })?;
        slot.copy_from_slice(&encoded[..size]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry() {
        let format =
            FormatDescriptor::new(3, 10, 2, DataFormat::Digitized, ChannelFormat::Interleaved)
                .unwrap();
        assert_eq!(format.channel_record_size(), 10);
        assert_eq!(format.stream_record_size(), 30);
        assert_eq!(format.channel_record_bytes(), 20);
        assert_eq!(format.stream_record_bytes(), 60);
        assert_eq!(format.element(), ElementType::U16);
        assert!(format.is_interleaved());

        let layout = format.acquisition_layout();
        assert_eq!(layout.rows, 1);
        assert_eq!(layout.columns, 30);
        assert_eq!(layout.max_rows, None);
        assert_eq!(layout.chunk, [1, 30]);
    }

    #[test]
    fn test_supported_widths() {
        for size in [1, 2, 4, 8] {
            assert!(
                FormatDescriptor::new(1, 4, size, DataFormat::Digitized, ChannelFormat::Separate)
                    .is_ok()
            );
        }
        for size in [4, 8] {
            assert!(
                FormatDescriptor::new(1, 4, size, DataFormat::Analog, ChannelFormat::Separate)
                    .is_ok()
            );
        }
    }

    #[test]
    fn test_unsupported_widths() {
        for size in [0, 3, 16] {
            assert!(matches!(
                FormatDescriptor::new(1, 4, size, DataFormat::Digitized, ChannelFormat::Separate),
                Err(EggError::Configuration(_))
            ));
        }
        for size in [1, 2] {
            assert!(matches!(
                FormatDescriptor::new(1, 4, size, DataFormat::Analog, ChannelFormat::Separate),
                Err(EggError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_zero_counts_rejected() {
        assert!(
            FormatDescriptor::new(0, 4, 1, DataFormat::Digitized, ChannelFormat::Separate).is_err()
        );
        assert!(
            FormatDescriptor::new(1, 0, 1, DataFormat::Digitized, ChannelFormat::Separate).is_err()
        );
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(DataFormat::from_u32(1), Some(DataFormat::Analog));
        assert_eq!(DataFormat::from_u32(2), None);
        assert_eq!(ChannelFormat::from_u32(0), Some(ChannelFormat::Interleaved));
        assert_eq!(ChannelFormat::from_u32(9), None);
    }

    #[test]
    fn test_digitized_samples() {
        let format =
            FormatDescriptor::new(1, 3, 2, DataFormat::Digitized, ChannelFormat::Separate).unwrap();
        let mut bytes = vec![0u8; format.channel_record_bytes()];
        format.encode_sample(Sample::Digitized(513), &mut bytes, 1).unwrap();
        assert_eq!(bytes, vec![0, 0, 1, 2, 0, 0]);
        assert_eq!(format.sample(&bytes, 1), Some(Sample::Digitized(513)));
        assert_eq!(format.sample(&bytes, 3), None);

        assert!(format.encode_sample(Sample::Digitized(70_000), &mut bytes, 0).is_err());
        assert!(format.encode_sample(Sample::Analog(1.0), &mut bytes, 0).is_err());
        assert!(format.encode_sample(Sample::Digitized(1), &mut bytes, 3).is_err());
    }

    #[test]
    fn test_analog_samples() {
        let format =
            FormatDescriptor::new(1, 2, 4, DataFormat::Analog, ChannelFormat::Separate).unwrap();
        let mut bytes = vec![0u8; format.channel_record_bytes()];
        format.encode_sample(Sample::Analog(-1.5), &mut bytes, 0).unwrap();
        assert_eq!(format.sample(&bytes, 0), Some(Sample::Analog(-1.5)));
        assert!(format.encode_sample(Sample::Digitized(1), &mut bytes, 1).is_err());

        let wide =
            FormatDescriptor::new(1, 1, 8, DataFormat::Analog, ChannelFormat::Separate).unwrap();
        let mut bytes = vec![0u8; 8];
        wide.encode_sample(Sample::Analog(0.1), &mut bytes, 0).unwrap();
        assert_eq!(wide.sample(&bytes, 0), Some(Sample::Analog(0.1)));
    }
}
