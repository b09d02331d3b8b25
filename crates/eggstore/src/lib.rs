//! Eggstore - record-oriented container for digitizer acquisitions
//!
//! This crate stores time-series acquisition data as fixed-size records,
//! grouped into acquisitions, inside one or more streams of an egg file.
//!
//! # Components
//!
//! - [`StreamEngine`]: Read records by relative offset or append them
//! - [`FormatDescriptor`]: Sample type and record geometry of a stream
//! - [`RecordIndex`]: Global record position to acquisition coordinates
//! - [`EggFile`]: File header plus one stream engine per stream
//! - [`Container`] / [`store::file`]: Hierarchical store and its file format
//!
//! # Example
//!
//! ```rust,no_run
//! use eggstore::{ChannelFormat, DataFormat, EggConfig, EggFile, FileHeader};
//!
//! let mut header = FileHeader::new("run.egg");
//! header.add_stream(1, 4096, 2, DataFormat::Digitized, ChannelFormat::Separate);
//!
//! // Write two acquisitions
//! let mut file = EggFile::create("run.egg", header, EggConfig::default())?;
//! let stream = file.stream_mut(0).unwrap();
//! for (i, is_new) in [true, false, true].into_iter().enumerate() {
//!     stream.stream_record_mut().fill(i as u8);
//!     stream.try_write_record(is_new)?;
//! }
//! file.finish()?;
//!
//! // Walk the records in order
//! let mut file = EggFile::open("run.egg", EggConfig::default())?;
//! let stream = file.stream_mut(0).unwrap();
//! while let Some(location) = stream.read_record(0)? {
//!     println!("acq {} record {}", location.acquisition, location.position);
//! }
//! # Ok::<(), eggstore::EggError>(())
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod file;
pub mod header;
pub mod store;
pub mod stream;

pub use config::{EggConfig, SyncMode};
pub use error::{EggError, Result};
pub use file::EggFile;
pub use header::{FileHeader, StreamHeader};
pub use store::{Container, Store, StoreError};
pub use stream::{
    AcquisitionState, ChannelFormat, DataFormat, FormatDescriptor, RecordIndex, RecordLocation,
    Sample, StreamEngine, StreamMode,
};
