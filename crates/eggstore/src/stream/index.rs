//! Global record index of a stream opened for reading.
//!
//! Records are numbered across the whole stream. Entry `p` says which
//! acquisition holds global record `p` and at which row of that
//! acquisition's dataset.

/// Where a record lives inside the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordEntry {
    /// Acquisition that holds the record.
    pub acquisition: u32,
    /// Position of the record inside its acquisition.
    pub position: u32,
}

/// The result of a successful read: the record's global position and its
/// acquisition coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    /// Global position in the stream.
    pub record: u64,
    /// Acquisition that holds the record.
    pub acquisition: u32,
    /// Position of the record inside its acquisition.
    pub position: u32,
}

/// Maps global record positions to acquisition coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordIndex {
    entries: Vec<RecordEntry>,
}

impl RecordIndex {
    /// Builds the index from the record count of every acquisition, in
    /// acquisition order.
    ///
    /// Acquisitions with zero records contribute no entries.
    pub fn build(records_per_acquisition: &[u32]) -> Self {
        let total: usize = records_per_acquisition.iter().map(|&n| n as usize).sum();
        let mut entries = Vec::with_capacity(total);
        for (acquisition, &count) in records_per_acquisition.iter().enumerate() {
            entries.extend((0..count).map(|position| RecordEntry {
                acquisition: acquisition as u32,
                position,
            }));
        }
        Self { entries }
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the stream has no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for global record `record`, or `None` past the end.
    pub fn get(&self, record: u64) -> Option<RecordEntry> {
        usize::try_from(record)
            .ok()
            .and_then(|i| self.entries.get(i))
            .copied()
    }

    /// Iterates over all entries in global order.
    pub fn iter(&self) -> impl Iterator<Item = &RecordEntry> {
        self.entries.iter()
    }
}
