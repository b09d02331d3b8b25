//! Record-oriented access to one stream of an egg file.
//!
//! A stream is a sequence of fixed-size records grouped into acquisitions.
//! [`StreamEngine`] opens a stream either for reading, where records are
//! addressed by offsets relative to the last one read, or for writing, where
//! records are appended and acquisitions are opened and finalized as they
//! go.
//!
//! # Record access
//!
//! The caller fills or inspects the record buffers exposed by
//! [`StreamEngine::stream_record`] and [`StreamEngine::channel_record`].
//! How those buffers relate depends on the access format:
//!
//! - Separate access to physically interleaved multi-channel data gives each
//!   channel its own buffer and leaves the stream record empty.
//! - Every other combination keeps one stream buffer and channel `i` sees
//!   bytes `i * channel_record_bytes ..` of it.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use eggstore::{ChannelFormat, Container, DataFormat, FormatDescriptor, Store, StreamEngine};
//!
//! let store = Rc::new(RefCell::new(Container::new()));
//! store.borrow_mut().create_group("/stream0").unwrap();
//! let format =
//!     FormatDescriptor::new(1, 4, 1, DataFormat::Digitized, ChannelFormat::Separate).unwrap();
//!
//! let mut writer =
//!     StreamEngine::create(store.clone(), "/stream0", format.clone(), ChannelFormat::Separate)
//!         .unwrap();
//! writer.stream_record_mut().copy_from_slice(&[1, 2, 3, 4]);
//! assert!(writer.write_record(true));
//! writer.close().unwrap();
//!
//! let mut reader =
//!     StreamEngine::open_existing(store, "/stream0", format, ChannelFormat::Separate).unwrap();
//! let location = reader.read_record(0).unwrap().unwrap();
//! assert_eq!(location.record, 0);
//! assert_eq!(reader.stream_record(), &[1, 2, 3, 4]);
//! ```

pub mod acquisition;
pub mod format;
pub mod index;
pub mod record;
pub mod transfer;

pub use acquisition::{AcquisitionCursor, AcquisitionState};
pub use format::{ChannelFormat, DataFormat, FormatDescriptor, Sample};
pub use index::{RecordEntry, RecordIndex, RecordLocation};
pub use record::{ByteRecord, RecordBuffers};
pub use transfer::TransferStrategy;

use crate::error::{EggError, Result};
use crate::store::{Container, GroupHandle, Store, StoreError};
use acquisition::{ACQUISITIONS_GROUP, N_ACQUISITIONS_ATTR, N_RECORDS_ATTR};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error, warn};

/// Whether a stream was opened for reading or writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Existing records are read by offset.
    Read,
    /// Records are appended.
    Write,
}

impl StreamMode {
    fn describe(self) -> &'static str {
        match self {
            Self::Read => "reading",
            Self::Write => "writing",
        }
    }
}

/// Reader and writer of the records of one stream.
///
/// The engine shares its store with the other streams of the same file
/// through `Rc<RefCell<_>>`; it is not `Send`. Reads take `&mut self`
/// because they move the read cursor and refill the record buffers.
#[derive(Debug)]
pub struct StreamEngine<S: Store = Container> {
    store: Rc<RefCell<S>>,
    mode: StreamMode,
    closed: bool,
    format: FormatDescriptor,
    group: GroupHandle,
    acquisitions: GroupHandle,
    access_format: ChannelFormat,
    transfer: Option<TransferStrategy>,
    buffers: RecordBuffers,
    cursor: AcquisitionCursor,
    index: RecordIndex,
    last_record: Option<u64>,
    n_acquisitions: u32,
    n_records_in_file: u64,
    record_count_in_file: u64,
}

impl<S: Store> StreamEngine<S> {
    /// Opens the stream at `group_path`, choosing the mode from what exists.
    ///
    /// If the stream already has an `acquisitions` group it is opened for
    /// reading; otherwise the group is created and the stream is opened for
    /// writing.
    pub fn open(
        store: Rc<RefCell<S>>,
        group_path: &str,
        format: FormatDescriptor,
        access_format: ChannelFormat,
    ) -> Result<Self> {
        let has_acquisitions = {
            let store = store.borrow();
            let group = store.open_group(group_path)?;
            match store.open_group(&group.child(ACQUISITIONS_GROUP)) {
                Ok(_) => true,
                Err(StoreError::NotFound(_)) => false,
                Err(e) => return Err(e.into()),
            }
        };
        if has_acquisitions {
            Self::open_existing(store, group_path, format, access_format)
        } else {
            Self::create(store, group_path, format, access_format)
        }
    }

    /// Opens an existing, finalized stream for reading.
    ///
    /// Loads the stream and acquisition counts and builds the record index.
    pub fn open_existing(
        store: Rc<RefCell<S>>,
        group_path: &str,
        format: FormatDescriptor,
        access_format: ChannelFormat,
    ) -> Result<Self> {
        let (group, acquisitions, n_acquisitions, n_records_in_file, index) = {
            let store = store.borrow();
            let group = store.open_group(group_path)?;
            let acquisitions = store.open_group(&group.child(ACQUISITIONS_GROUP))?;
            let n_acquisitions = store
                .read_attribute(group.path(), N_ACQUISITIONS_ATTR)?
                .as_u32(group.path())?;
            let n_records_in_file = store
                .read_attribute(group.path(), N_RECORDS_ATTR)?
                .as_u64(group.path())?;

            let mut counts = Vec::new();
            for id in 0..n_acquisitions {
                let dataset = store.open_dataset(&acquisitions, &id.to_string())?;
                let count = store
                    .read_attribute(dataset.path(), N_RECORDS_ATTR)?
                    .as_u32(dataset.path())?;
                let [rows, _] = store.dataset_shape(&dataset)?;
                if u64::from(count) > rows {
                    return Err(EggError::Corrupt(format!(
                        "{} declares {} records but holds {} rows",
                        dataset.path(),
                        count,
                        rows
                    )));
                }
                counts.push(count);
            }
            let index = RecordIndex::build(&counts);
            if index.len() as u64 != n_records_in_file {
                return Err(EggError::Corrupt(format!(
                    "{} declares {} records but its acquisitions hold {}",
                    group.path(),
                    n_records_in_file,
                    index.len()
                )));
            }
            (group, acquisitions, n_acquisitions, n_records_in_file, index)
        };
        debug!(
            "Opened {} for reading: {} acquisitions, {} records",
            group.path(),
            n_acquisitions,
            n_records_in_file
        );

        let mut engine = Self::with_parts(
            store,
            StreamMode::Read,
            format,
            group,
            acquisitions,
            access_format,
        );
        engine.n_acquisitions = n_acquisitions;
        engine.n_records_in_file = n_records_in_file;
        engine.index = index;
        Ok(engine)
    }

    /// Creates the `acquisitions` group of the stream at `group_path` and
    /// opens it for writing.
    pub fn create(
        store: Rc<RefCell<S>>,
        group_path: &str,
        format: FormatDescriptor,
        access_format: ChannelFormat,
    ) -> Result<Self> {
        let (group, acquisitions) = {
            let mut store = store.borrow_mut();
            let group = store.open_group(group_path)?;
            let acquisitions = store.create_group(&group.child(ACQUISITIONS_GROUP))?;
            (group, acquisitions)
        };
        debug!("Opened {} for writing", group.path());
        Ok(Self::with_parts(
            store,
            StreamMode::Write,
            format,
            group,
            acquisitions,
            access_format,
        ))
    }

    fn with_parts(
        store: Rc<RefCell<S>>,
        mode: StreamMode,
        format: FormatDescriptor,
        group: GroupHandle,
        acquisitions: GroupHandle,
        access_format: ChannelFormat,
    ) -> Self {
        let buffers = RecordBuffers::new(format.n_channels());
        let mut engine = Self {
            store,
            mode,
            closed: false,
            format,
            group,
            acquisitions,
            access_format,
            transfer: None,
            buffers,
            cursor: AcquisitionCursor::new(),
            index: RecordIndex::default(),
            last_record: None,
            n_acquisitions: 0,
            n_records_in_file: 0,
            record_count_in_file: 0,
        };
        engine.ensure_initialized();
        engine
    }

    /// Selects the transfer strategy and binds the record buffers for the
    /// current access format, if that has not happened since the last
    /// format change.
    pub fn ensure_initialized(&mut self) -> TransferStrategy {
        if let Some(strategy) = self.transfer {
            return strategy;
        }
        let strategy = TransferStrategy::select(&self.format, self.access_format);
        strategy.bind(&self.format, &mut self.buffers);
        debug!(
            "Initialized {} for {:?} access ({:?})",
            self.group.path(),
            self.access_format,
            strategy
        );
        self.transfer = Some(strategy);
        strategy
    }

    /// Changes the access format; the buffers are rebound before the next
    /// read, write or mutable buffer access.
    ///
    /// Data already read is not reinterpreted.
    pub fn set_access_format(&mut self, access_format: ChannelFormat) {
        if access_format != self.access_format {
            self.access_format = access_format;
            self.transfer = None;
        }
    }

    fn require(&self, mode: StreamMode) -> Result<()> {
        if self.closed {
            return Err(EggError::StreamClosed);
        }
        if self.mode != mode {
            return Err(EggError::WrongMode {
                expected: mode.describe(),
            });
        }
        Ok(())
    }

    /// Reads the record `offset` positions after the one following the last
    /// record read.
    ///
    /// On the first call the target is `offset` itself, so repeated
    /// `read_record(0)` calls walk the stream in order, `-1` re-reads the
    /// last record and `-2` steps back one.
    ///
    /// Returns `Ok(None)` when the target falls outside the stream; nothing
    /// changes in that case. Errors mean the store failed, and leave the
    /// last-read position unchanged.
    pub fn read_record(&mut self, offset: i64) -> Result<Option<RecordLocation>> {
        self.require(StreamMode::Read)?;
        let strategy = self.ensure_initialized();

        let base = match self.last_record {
            Some(last) => i64::try_from(last).map_err(|_| {
                EggError::Corrupt(format!("record position {} out of range", last))
            })? + 1,
            None => 0,
        };
        let target = match base.checked_add(offset) {
            Some(t) if t >= 0 && (t as u64) < self.n_records_in_file => t as u64,
            _ => {
                debug!(
                    "Offset {} from {:?} is outside {} records",
                    offset, self.last_record, self.n_records_in_file
                );
                return Ok(None);
            }
        };

        let entry = self.index.get(target).ok_or_else(|| {
            EggError::Corrupt(format!("record {} missing from the index", target))
        })?;

        let store = self.store.borrow();
        if !self.cursor.is_open() || self.cursor.acquisition_id() != entry.acquisition {
            self.cursor
                .open_existing(&*store, &self.acquisitions, entry.acquisition)?;
        }
        if entry.position >= self.cursor.n_records_in_acquisition() {
            return Err(EggError::Corrupt(format!(
                "acquisition {} has {} records; record {} maps to position {}",
                entry.acquisition,
                self.cursor.n_records_in_acquisition(),
                target,
                entry.position
            )));
        }
        let dataset = self.cursor.dataset().ok_or(EggError::NoOpenAcquisition)?;
        strategy.read(
            &*store,
            dataset,
            self.format.element(),
            u64::from(entry.position),
            &mut self.buffers,
        )?;

        self.cursor.set_position(entry.position);
        self.last_record = Some(target);
        Ok(Some(RecordLocation {
            record: target,
            acquisition: entry.acquisition,
            position: entry.position,
        }))
    }

    /// Appends the current record buffers as the next record.
    ///
    /// With `is_new_acquisition` the open acquisition is finalized first and
    /// the record starts the next one. Returns false on failure; the error is
    /// logged and the record counters are unchanged. See
    /// [`try_write_record`](Self::try_write_record) for the error itself.
    pub fn write_record(&mut self, is_new_acquisition: bool) -> bool {
        match self.try_write_record(is_new_acquisition) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to write record {} of {}: {}",
                    self.record_count_in_file,
                    self.group.path(),
                    e
                );
                false
            }
        }
    }

    /// Appends the current record buffers as the next record.
    ///
    /// If the transfer fails after the dataset has grown, the dataset is
    /// shrunk back so it only holds records that were written.
    pub fn try_write_record(&mut self, is_new_acquisition: bool) -> Result<()> {
        self.require(StreamMode::Write)?;
        let strategy = self.ensure_initialized();

        let mut store = self.store.borrow_mut();
        if is_new_acquisition {
            self.cursor.begin_new(
                &mut *store,
                &self.acquisitions,
                &self.format.acquisition_layout(),
            )?;
        } else {
            self.cursor.extend(&mut *store)?;
        }

        let row = u64::from(self.cursor.record_in_acquisition());
        let dataset = self
            .cursor
            .dataset()
            .cloned()
            .ok_or(EggError::NoOpenAcquisition)?;
        debug!(
            "Writing acquisition {}, record {}",
            self.cursor.acquisition_id(),
            row
        );
        if let Err(e) = strategy.write(
            &mut *store,
            &dataset,
            self.format.element(),
            row,
            &self.buffers,
        ) {
            if let Err(rollback) = self.cursor.rollback(&mut *store) {
                warn!("Could not roll back {}: {}", dataset.path(), rollback);
            }
            return Err(e);
        }

        self.cursor.advance();
        self.record_count_in_file += 1;
        Ok(())
    }

    /// Closes the stream.
    ///
    /// In write mode this finalizes the open acquisition and writes the
    /// stream-level counts, even if earlier writes failed. If that
    /// finalization fails the stream stays open and `close` can be called
    /// again. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        match self.mode {
            StreamMode::Write => {
                let mut store = self.store.borrow_mut();
                let n_acquisitions = self.cursor.finalize_stream(
                    &mut *store,
                    &self.group,
                    self.record_count_in_file,
                )?;
                self.n_acquisitions = n_acquisitions;
                self.n_records_in_file = self.record_count_in_file;
            }
            StreamMode::Read => self.cursor.close(),
        }
        self.closed = true;
        debug!("Closed {}", self.group.path());
        Ok(())
    }

    /// The stream record. Empty when each channel has its own buffer.
    pub fn stream_record(&self) -> &[u8] {
        self.buffers.stream()
    }

    /// The stream record, mutably, after rebinding for the access format.
    pub fn stream_record_mut(&mut self) -> &mut [u8] {
        self.ensure_initialized();
        self.buffers.stream_mut()
    }

    /// The record of `channel`.
    pub fn channel_record(&self, channel: usize) -> Result<&[u8]> {
        self.buffers
            .channel(channel)
            .ok_or(EggError::ChannelRange {
                channel,
                n_channels: self.format.n_channels(),
            })
    }

    /// The record of `channel`, mutably, after rebinding for the access
    /// format.
    pub fn channel_record_mut(&mut self, channel: usize) -> Result<&mut [u8]> {
        self.ensure_initialized();
        let n_channels = self.format.n_channels();
        self.buffers
            .channel_mut(channel)
            .ok_or(EggError::ChannelRange {
                channel,
                n_channels,
            })
    }

    /// Mode the stream was opened in.
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Returns true once [`close`](Self::close) has succeeded.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Path of the stream group.
    pub fn group_path(&self) -> &str {
        self.group.path()
    }

    /// Format of the stream.
    pub fn format(&self) -> &FormatDescriptor {
        &self.format
    }

    /// Current access format.
    pub fn access_format(&self) -> ChannelFormat {
        self.access_format
    }

    /// Transfer strategy in effect, if initialized.
    pub fn transfer_strategy(&self) -> Option<TransferStrategy> {
        self.transfer
    }

    /// Acquisition lifecycle state.
    pub fn acquisition_state(&self) -> AcquisitionState {
        self.cursor.state()
    }

    /// Id of the current acquisition.
    pub fn acquisition_id(&self) -> u32 {
        self.cursor.acquisition_id()
    }

    /// Write: records in the open acquisition. Read: position of the last
    /// record read within its acquisition.
    pub fn record_in_acquisition(&self) -> u32 {
        self.cursor.record_in_acquisition()
    }

    /// Write: size of the last finalized acquisition. Read: size of the
    /// acquisition holding the last record read.
    pub fn n_records_in_acquisition(&self) -> u32 {
        self.cursor.n_records_in_acquisition()
    }

    /// Global position of the last record read.
    pub fn last_record(&self) -> Option<u64> {
        self.last_record
    }

    /// Records written so far in write mode.
    pub fn record_count_in_file(&self) -> u64 {
        self.record_count_in_file
    }

    /// Records in the stream; in write mode, valid after close.
    pub fn n_records_in_file(&self) -> u64 {
        self.n_records_in_file
    }

    /// Acquisitions in the stream; in write mode, valid after close.
    pub fn n_acquisitions(&self) -> u32 {
        self.n_acquisitions
    }

    /// Record index of a stream opened for reading.
    pub fn index(&self) -> &RecordIndex {
        &self.index
    }
}
