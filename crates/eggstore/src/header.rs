//! File and stream headers.
//!
//! Headers are stored as attributes: the file header on the root group and
//! each stream header on its group `/streams/stream<N>`.

use crate::error::{EggError, Result};
use crate::store::{join_path, AttrValue, Store, StoreError};
use crate::stream::{ChannelFormat, DataFormat, FormatDescriptor};

/// Group holding every stream group.
pub const STREAMS_GROUP: &str = "/streams";

const ROOT: &str = "/";

/// Header of one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamHeader {
    /// Stream number, also its position in the file header.
    pub number: u32,
    /// Free-form description of the data source.
    pub source: String,
    /// Acquisition rate in MHz.
    pub acquisition_rate_mhz: f64,
    /// Samples per channel in one record.
    pub record_size: u32,
    /// Number of channels.
    pub n_channels: u32,
    /// Bytes per sample.
    pub data_type_size: u32,
    /// Significant bits per sample.
    pub bit_depth: u32,
    /// Numeric domain of the samples.
    pub data_format: DataFormat,
    /// Physical channel layout.
    pub channel_format: ChannelFormat,
}

impl StreamHeader {
    /// Creates a stream header with an empty source, zero rate and a bit
    /// depth covering the whole sample.
    pub fn new(
        number: u32,
        n_channels: u32,
        record_size: u32,
        data_type_size: u32,
        data_format: DataFormat,
        channel_format: ChannelFormat,
    ) -> Self {
        Self {
            number,
            source: String::new(),
            acquisition_rate_mhz: 0.0,
            record_size,
            n_channels,
            data_type_size,
            bit_depth: data_type_size * 8,
            data_format,
            channel_format,
        }
    }

    /// Sets the source description.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the acquisition rate in MHz.
    pub fn with_acquisition_rate(mut self, rate_mhz: f64) -> Self {
        self.acquisition_rate_mhz = rate_mhz;
        self
    }

    /// Sets the bit depth.
    pub fn with_bit_depth(mut self, bit_depth: u32) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    /// Label of the stream, which is also its group name.
    pub fn label(&self) -> String {
        format!("stream{}", self.number)
    }

    /// Absolute path of the stream group.
    pub fn group_path(&self) -> String {
        join_path(STREAMS_GROUP, &self.label())
    }

    /// Format descriptor of the stream.
    pub fn format(&self) -> Result<FormatDescriptor> {
        FormatDescriptor::new(
            self.n_channels as usize,
            self.record_size as usize,
            self.data_type_size as usize,
            self.data_format,
            self.channel_format,
        )
    }

    fn write_to<S: Store>(&self, store: &mut S) -> Result<()> {
        let path = self.group_path();
        store.create_group(&path)?;
        let attributes = [
            ("number", AttrValue::U32(self.number)),
            ("label", AttrValue::Str(self.label())),
            ("source", AttrValue::Str(self.source.clone())),
            ("acquisition_rate", AttrValue::F64(self.acquisition_rate_mhz)),
            ("record_size", AttrValue::U32(self.record_size)),
            ("n_channels", AttrValue::U32(self.n_channels)),
            ("data_type_size", AttrValue::U32(self.data_type_size)),
            ("bit_depth", AttrValue::U32(self.bit_depth)),
            ("data_format", AttrValue::U32(self.data_format as u32)),
            ("channel_format", AttrValue::U32(self.channel_format as u32)),
        ];
        for (name, value) in attributes {
            store.write_attribute(&path, name, value)?;
        }
        Ok(())
    }

    fn read_from<S: Store>(store: &S, number: u32) -> Result<Self> {
        let path = join_path(STREAMS_GROUP, &format!("stream{}", number));
        let u32_attr = |name: &str| -> Result<u32> {
            Ok(store.read_attribute(&path, name)?.as_u32(&path)?)
        };

        let stored_number = u32_attr("number")?;
        if stored_number != number {
            return Err(EggError::Header(format!(
                "{} holds stream number {}",
                path, stored_number
            )));
        }
        let data_format = DataFormat::from_u32(u32_attr("data_format")?).ok_or_else(|| {
            EggError::Header(format!("{} has an unknown data format", path))
        })?;
        let channel_format =
            ChannelFormat::from_u32(u32_attr("channel_format")?).ok_or_else(|| {
                EggError::Header(format!("{} has an unknown channel format", path))
            })?;

        Ok(Self {
            number,
            source: store
                .read_attribute(&path, "source")?
                .as_str(&path)?
                .to_string(),
            acquisition_rate_mhz: store
                .read_attribute(&path, "acquisition_rate")?
                .as_f64(&path)?,
            record_size: u32_attr("record_size")?,
            n_channels: u32_attr("n_channels")?,
            data_type_size: u32_attr("data_type_size")?,
            bit_depth: u32_attr("bit_depth")?,
            data_format,
            channel_format,
        })
    }
}

/// Header of a whole egg file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileHeader {
    /// Name the file was created under.
    pub filename: String,
    /// Run start time, free-form.
    pub timestamp: String,
    /// Free-form run description.
    pub description: String,
    /// Run duration in milliseconds.
    pub run_duration_ms: u64,
    /// Stream headers, indexed by stream number.
    pub streams: Vec<StreamHeader>,
}

impl FileHeader {
    /// Creates an empty header.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// Appends a stream and returns its number.
    pub fn add_stream(
        &mut self,
        n_channels: u32,
        record_size: u32,
        data_type_size: u32,
        data_format: DataFormat,
        channel_format: ChannelFormat,
    ) -> u32 {
        let number = self.streams.len() as u32;
        self.streams.push(StreamHeader::new(
            number,
            n_channels,
            record_size,
            data_type_size,
            data_format,
            channel_format,
        ));
        number
    }

    /// Checks that the header describes at least one storable stream and
    /// that streams are numbered by position.
    pub fn validate(&self) -> Result<()> {
        if self.streams.is_empty() {
            return Err(EggError::Header("file has no streams".to_string()));
        }
        for (i, stream) in self.streams.iter().enumerate() {
            if stream.number as usize != i {
                return Err(EggError::Header(format!(
                    "stream at position {} is numbered {}",
                    i, stream.number
                )));
            }
            stream.format()?;
        }
        Ok(())
    }

    /// Writes the header and creates the stream groups.
    pub fn write_to<S: Store>(&self, store: &mut S) -> Result<()> {
        self.validate()?;
        let attributes = [
            ("filename", AttrValue::Str(self.filename.clone())),
            ("timestamp", AttrValue::Str(self.timestamp.clone())),
            ("description", AttrValue::Str(self.description.clone())),
            ("run_duration", AttrValue::U64(self.run_duration_ms)),
            ("n_streams", AttrValue::U32(self.streams.len() as u32)),
        ];
        for (name, value) in attributes {
            store.write_attribute(ROOT, name, value)?;
        }
        match store.create_group(STREAMS_GROUP) {
            Ok(_) | Err(StoreError::AlreadyExists(_)) => {}
            Err(e) => return Err(e.into()),
        }
        for stream in &self.streams {
            stream.write_to(store)?;
        }
        Ok(())
    }

    /// Reads the header written by [`write_to`](Self::write_to).
    pub fn read_from<S: Store>(store: &S) -> Result<Self> {
        let str_attr = |name: &str| -> Result<String> {
            Ok(store.read_attribute(ROOT, name)?.as_str(ROOT)?.to_string())
        };
        let n_streams = store.read_attribute(ROOT, "n_streams")?.as_u32(ROOT)?;
        let streams = (0..n_streams)
            .map(|number| StreamHeader::read_from(store, number))
            .collect::<Result<Vec<_>>>()?;

        let header = Self {
            filename: str_attr("filename")?,
            timestamp: str_attr("timestamp")?,
            description: str_attr("description")?,
            run_duration_ms: store.read_attribute(ROOT, "run_duration")?.as_u64(ROOT)?,
            streams,
        };
        header.validate()?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Container;

    fn sample_header() -> FileHeader {
        let mut header = FileHeader::new("run.egg");
        header.timestamp = "2024-01-01T00:00:00Z".to_string();
        header.description = "bench test".to_string();
        header.run_duration_ms = 1500;
        header.add_stream(1, 8, 1, DataFormat::Digitized, ChannelFormat::Separate);
        let n = header.add_stream(2, 4, 4, DataFormat::Analog, ChannelFormat::Interleaved);
        header.streams[n as usize] = header.streams[n as usize]
            .clone()
            .with_source("adc1")
            .with_acquisition_rate(250.0)
            .with_bit_depth(14);
        header
    }

    #[test]
    fn test_round_trip() {
        let header = sample_header();
        let mut store = Container::new();
        header.write_to(&mut store).unwrap();

        let restored = FileHeader::read_from(&store).unwrap();
        assert_eq!(restored, header);
        assert_eq!(restored.streams[1].group_path(), "/streams/stream1");
        assert_eq!(
            store.read_attribute("/streams/stream1", "label").unwrap(),
            AttrValue::Str("stream1".to_string())
        );
    }

    #[test]
    fn test_default_bit_depth() {
        let stream = StreamHeader::new(0, 1, 4, 2, DataFormat::Digitized, ChannelFormat::Separate);
        assert_eq!(stream.bit_depth, 16);
        assert_eq!(stream.format().unwrap().stream_record_bytes(), 8);
    }

    #[test]
    fn test_validate() {
        assert!(matches!(
            FileHeader::new("x").validate(),
            Err(EggError::Header(_))
        ));

        let mut header = FileHeader::new("x");
        header.add_stream(0, 4, 1, DataFormat::Digitized, ChannelFormat::Separate);
        assert!(matches!(header.validate(), Err(EggError::Configuration(_))));

        let mut header = FileHeader::new("x");
        header.add_stream(1, 4, 3, DataFormat::Digitized, ChannelFormat::Separate);
        assert!(matches!(header.validate(), Err(EggError::Configuration(_))));

        let mut header = sample_header();
        header.streams[1].number = 7;
        assert!(matches!(header.validate(), Err(EggError::Header(_))));
    }

    #[test]
    fn test_missing_header() {
        let store = Container::new();
        assert!(matches!(
            FileHeader::read_from(&store),
            Err(EggError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn test_unknown_format_code() {
        let header = sample_header();
        let mut store = Container::new();
        header.write_to(&mut store).unwrap();
        store
            .write_attribute("/streams/stream0", "data_format", AttrValue::U32(9))
            .unwrap();
        assert!(matches!(
            FileHeader::read_from(&store),
            Err(EggError::Header(_))
        ));
    }
}
