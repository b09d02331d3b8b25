//! Acquisition lifecycle of one stream.
//!
//! Each acquisition is a dataset named by its decimal id inside the
//! stream's `acquisitions` group, one record per row. On the write side the
//! cursor creates, extends and finalizes those datasets; on the read side it
//! tracks which acquisition is open.
//!
//! Write-side states:
//!
//! ```text
//! NoAcquisitionStarted --begin_new--> AcquisitionOpen
//! AcquisitionOpen --extend--> AcquisitionOpen
//! AcquisitionOpen --begin_new--> (finalize) --> AcquisitionOpen (id + 1)
//! AcquisitionOpen (0 records) --begin_new--> AcquisitionOpen (same id)
//! AcquisitionOpen --finalize_current--> AcquisitionClosed
//! any --finalize_stream--> StreamFinalized
//! ```

use crate::error::{EggError, Result};
use crate::store::{AttrValue, DatasetHandle, DatasetLayout, GroupHandle, Store};
use tracing::debug;

/// Attribute holding a record count, on acquisition datasets and stream groups.
pub const N_RECORDS_ATTR: &str = "n_records";

/// Attribute holding the acquisition count, on stream groups.
pub const N_ACQUISITIONS_ATTR: &str = "n_acquisitions";

/// Name of the group holding a stream's acquisition datasets.
pub const ACQUISITIONS_GROUP: &str = "acquisitions";

/// Observable state of an [`AcquisitionCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// Nothing has been written or read yet.
    NoAcquisitionStarted,
    /// An acquisition dataset is open.
    AcquisitionOpen,
    /// An acquisition was started and has since been closed.
    AcquisitionClosed,
    /// The stream-level counts have been written.
    StreamFinalized,
}

/// Tracks the current acquisition of a stream.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionCursor {
    acquisition_id: u32,
    started: bool,
    stream_finalized: bool,
    // Write: records written to the open acquisition. Read: row of the last
    // record read.
    record_in_acquisition: u32,
    // Write: size of the last finalized acquisition. Read: declared size of
    // the open acquisition.
    n_records_in_acquisition: u32,
    dataset: Option<DatasetHandle>,
}

impl AcquisitionCursor {
    /// A cursor with no acquisition started.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the current (or last) acquisition.
    pub fn acquisition_id(&self) -> u32 {
        self.acquisition_id
    }

    /// Returns true once any acquisition has been started or opened.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Returns true while an acquisition dataset is open.
    pub fn is_open(&self) -> bool {
        self.dataset.is_some()
    }

    /// The open acquisition dataset.
    pub fn dataset(&self) -> Option<&DatasetHandle> {
        self.dataset.as_ref()
    }

    /// Records written to the open acquisition, or the row of the last record
    /// read.
    pub fn record_in_acquisition(&self) -> u32 {
        self.record_in_acquisition
    }

    /// Size of the last finalized acquisition (write) or the open one (read).
    pub fn n_records_in_acquisition(&self) -> u32 {
        self.n_records_in_acquisition
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AcquisitionState {
        if self.stream_finalized {
            AcquisitionState::StreamFinalized
        } else if self.dataset.is_some() {
            AcquisitionState::AcquisitionOpen
        } else if self.started {
            AcquisitionState::AcquisitionClosed
        } else {
            AcquisitionState::NoAcquisitionStarted
        }
    }

    /// Finalizes any open acquisition and creates the next one with a single
    /// row.
    ///
    /// The id is bumped only if an acquisition was started before; on
    /// failure the id and started flag are left as they were. An open
    /// acquisition with no records written (its first record failed) is
    /// reused under the same id instead of being finalized empty.
    pub fn begin_new<S: Store>(
        &mut self,
        store: &mut S,
        acquisitions: &GroupHandle,
        layout: &DatasetLayout,
    ) -> Result<()> {
        if let Some(dataset) = &self.dataset {
            if self.record_in_acquisition == 0 {
                store.extend_dataset(dataset, 1)?;
                debug!(
                    "Reusing empty acquisition {} at {}",
                    self.acquisition_id,
                    dataset.path()
                );
                return Ok(());
            }
        }
        self.finalize_current(store)?;

        let next_id = if self.started {
            self.acquisition_id + 1
        } else {
            0
        };
        let dataset = store.create_dataset(acquisitions, &next_id.to_string(), layout)?;
        debug!("Started acquisition {} at {}", next_id, dataset.path());

        self.acquisition_id = next_id;
        self.started = true;
        self.record_in_acquisition = 0;
        self.dataset = Some(dataset);
        Ok(())
    }

    /// Grows the open acquisition to hold one more record than has been
    /// written.
    pub fn extend<S: Store>(&mut self, store: &mut S) -> Result<()> {
        let dataset = self.dataset.as_ref().ok_or(EggError::NoOpenAcquisition)?;
        store.extend_dataset(dataset, u64::from(self.record_in_acquisition) + 1)?;
        Ok(())
    }

    /// Counts a record written to the open acquisition.
    pub fn advance(&mut self) {
        self.record_in_acquisition += 1;
    }

    /// Shrinks the open acquisition back to the records actually written.
    ///
    /// Called after a failed transfer so the dataset never keeps a row that
    /// was not filled.
    pub fn rollback<S: Store>(&mut self, store: &mut S) -> Result<()> {
        if let Some(dataset) = &self.dataset {
            store.extend_dataset(dataset, u64::from(self.record_in_acquisition))?;
            debug!(
                "Rolled back {} to {} records",
                dataset.path(),
                self.record_in_acquisition
            );
        }
        Ok(())
    }

    /// Writes the open acquisition's record count and closes it.
    ///
    /// A no-op when nothing is open, so it is safe to call repeatedly.
    pub fn finalize_current<S: Store>(&mut self, store: &mut S) -> Result<()> {
        let Some(dataset) = &self.dataset else {
            return Ok(());
        };
        store.write_attribute(
            dataset.path(),
            N_RECORDS_ATTR,
            AttrValue::U32(self.record_in_acquisition),
        )?;
        debug!(
            "Finalized acquisition {} with {} records",
            self.acquisition_id, self.record_in_acquisition
        );

        self.n_records_in_acquisition = self.record_in_acquisition;
        self.record_in_acquisition = 0;
        self.dataset = None;
        Ok(())
    }

    /// Finalizes the open acquisition and writes the stream-level counts.
    ///
    /// Returns the number of acquisitions recorded: `id + 1` if any
    /// acquisition was started, otherwise 0. If the open acquisition cannot
    /// be finalized nothing is written to the stream group and the call can
    /// be repeated.
    pub fn finalize_stream<S: Store>(
        &mut self,
        store: &mut S,
        stream: &GroupHandle,
        n_records_in_file: u64,
    ) -> Result<u32> {
        self.finalize_current(store)?;

        let n_acquisitions = if self.started {
            self.acquisition_id + 1
        } else {
            0
        };
        store.write_attribute(
            stream.path(),
            N_ACQUISITIONS_ATTR,
            AttrValue::U32(n_acquisitions),
        )?;
        store.write_attribute(
            stream.path(),
            N_RECORDS_ATTR,
            AttrValue::U64(n_records_in_file),
        )?;
        debug!(
            "Finalized {}: {} acquisitions, {} records",
            stream.path(),
            n_acquisitions,
            n_records_in_file
        );

        self.stream_finalized = true;
        Ok(n_acquisitions)
    }

    /// Closes any open acquisition and opens acquisition `id` for reading.
    pub fn open_existing<S: Store>(
        &mut self,
        store: &S,
        acquisitions: &GroupHandle,
        id: u32,
    ) -> Result<()> {
        self.dataset = None;
        let dataset = store.open_dataset(acquisitions, &id.to_string())?;
        let n_records = store
            .read_attribute(dataset.path(), N_RECORDS_ATTR)?
            .as_u32(dataset.path())?;
        debug!("Opened acquisition {} ({} records)", id, n_records);

        self.acquisition_id = id;
        self.started = true;
        self.n_records_in_acquisition = n_records;
        self.record_in_acquisition = 0;
        self.dataset = Some(dataset);
        Ok(())
    }

    /// Records the row of the record just read.
    pub fn set_position(&mut self, position: u32) {
        self.record_in_acquisition = position;
    }

    /// Releases the open dataset without writing anything.
    pub fn close(&mut self) {
        self.dataset = None;
    }
}
