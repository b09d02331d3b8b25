//! Integration tests for the stream record engine.
//!
//! These tests drive [`StreamEngine`] through complete write and read
//! cycles against the in-memory container:
//! - Round trip across acquisitions
//! - Relative read offsets and range boundaries
//! - Interleaved storage accessed per channel
//! - Store failures: rollback on write, retryable close, stable reads

use eggstore::store::{
    AttrValue, DatasetHandle, DatasetLayout, ElementType, GroupHandle, Hyperslab, StoreResult,
};
use eggstore::{
    AcquisitionState, ChannelFormat, Container, DataFormat, EggError, FormatDescriptor, Store,
    StoreError, StreamEngine,
};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

const GROUP: &str = "/stream0";

fn shared_container() -> Rc<RefCell<Container>> {
    let store = Rc::new(RefCell::new(Container::new()));
    store.borrow_mut().create_group(GROUP).unwrap();
    store
}

fn digitized(n_channels: usize, samples: usize, channel_format: ChannelFormat) -> FormatDescriptor {
    FormatDescriptor::new(n_channels, samples, 1, DataFormat::Digitized, channel_format).unwrap()
}

/// Writes one record per entry of `plan`; `true` starts a new acquisition.
fn write_records<S: Store>(
    engine: &mut StreamEngine<S>,
    plan: &[bool],
    content: impl Fn(usize, usize) -> u8,
) {
    for (record, &is_new) in plan.iter().enumerate() {
        for (i, byte) in engine.stream_record_mut().iter_mut().enumerate() {
            *byte = content(record, i);
        }
        assert!(engine.write_record(is_new), "record {} failed", record);
    }
}

// ============================================================================
// Concrete scenarios
// ============================================================================

/// One acquisition of two single-sample records holding 1 and 10.
#[test]
fn test_single_channel_two_records() {
    let store = shared_container();
    let format = digitized(1, 1, ChannelFormat::Separate);

    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    writer.stream_record_mut()[0] = 1;
    assert!(writer.write_record(true));
    writer.stream_record_mut()[0] = 10;
    assert!(writer.write_record(false));
    writer.close().unwrap();

    let mut reader =
        StreamEngine::open_existing(store, GROUP, format, ChannelFormat::Separate).unwrap();
    assert_eq!(reader.n_acquisitions(), 1);
    assert_eq!(reader.n_records_in_file(), 2);

    reader.read_record(0).unwrap().unwrap();
    assert_eq!(reader.stream_record(), &[1]);
    reader.read_record(0).unwrap().unwrap();
    assert_eq!(reader.stream_record(), &[10]);
    assert!(reader.read_record(0).unwrap().is_none());
}

fn two_acquisition_reader() -> StreamEngine<Container> {
    let store = shared_container();
    let format = digitized(2, 2, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    write_records(&mut writer, &[true, false, true], |record, _| record as u8);
    writer.close().unwrap();
    StreamEngine::open_existing(store, GROUP, format, ChannelFormat::Separate).unwrap()
}

/// Sequential reads then a jump back to the start resolve through the index.
#[test]
fn test_two_acquisitions_sequential_then_back() {
    let mut reader = two_acquisition_reader();
    assert_eq!(reader.n_acquisitions(), 2);
    assert_eq!(reader.n_records_in_file(), 3);

    let mut acquisitions = Vec::new();
    let mut positions = Vec::new();
    for offset in [0, 0, 0, -3] {
        let location = reader.read_record(offset).unwrap().unwrap();
        let entry = reader.index().get(location.record).unwrap();
        assert_eq!(entry.acquisition, location.acquisition);
        assert_eq!(entry.position, location.position);
        assert_eq!(reader.stream_record()[0], location.record as u8);
        acquisitions.push(location.acquisition);
        positions.push(location.position);
    }
    assert_eq!(acquisitions, vec![0, 0, 1, 0]);
    assert_eq!(positions, vec![0, 1, 0, 0]);
}

/// Offsets count from the record after the last one read.
#[test]
fn test_relative_offsets() {
    let mut reader = two_acquisition_reader();
    let records: Vec<u64> = [0, 1, -1, -2, -2, -1]
        .into_iter()
        .map(|offset| reader.read_record(offset).unwrap().unwrap().record)
        .collect();
    assert_eq!(records, vec![0, 2, 2, 1, 0, 0]);
    assert_eq!(reader.last_record(), Some(0));
    assert_eq!(reader.acquisition_id(), 0);
    assert_eq!(reader.record_in_acquisition(), 0);
    assert_eq!(reader.n_records_in_acquisition(), 2);

    assert!(reader.read_record(5).unwrap().is_none());
}

// ============================================================================
// Boundaries
// ============================================================================

/// Out-of-range offsets report no record and leave the cursor in place.
#[test]
fn test_out_of_range_keeps_cursor() {
    let mut reader = two_acquisition_reader();
    assert!(reader.read_record(-1).unwrap().is_none());
    assert!(reader.read_record(3).unwrap().is_none());
    assert_eq!(reader.last_record(), None);

    let location = reader.read_record(1).unwrap().unwrap();
    assert_eq!(location.record, 1);

    assert!(reader.read_record(-3).unwrap().is_none());
    assert!(reader.read_record(1).unwrap().is_none());
    assert!(reader.read_record(i64::MAX).unwrap().is_none());
    assert!(reader.read_record(i64::MIN).unwrap().is_none());
    assert_eq!(reader.last_record(), Some(1));
    assert_eq!(reader.stream_record()[0], 1);

    let location = reader.read_record(-2).unwrap().unwrap();
    assert_eq!(location.record, 0);
}

/// A finalized stream with no records opens and reads nothing.
#[test]
fn test_empty_stream() {
    let store = shared_container();
    let format = digitized(1, 4, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    writer.close().unwrap();
    assert_eq!(writer.n_acquisitions(), 0);
    assert_eq!(writer.n_records_in_file(), 0);
    assert_eq!(writer.acquisition_state(), AcquisitionState::StreamFinalized);

    let mut reader =
        StreamEngine::open_existing(store, GROUP, format, ChannelFormat::Separate).unwrap();
    assert!(reader.index().is_empty());
    assert!(reader.read_record(0).unwrap().is_none());
}

/// Metadata written at close matches what was appended.
#[test]
fn test_finalized_metadata() {
    let store = shared_container();
    let format = digitized(1, 2, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format, ChannelFormat::Separate).unwrap();
    write_records(&mut writer, &[true, false, false, true, true, false], |r, _| r as u8);
    assert_eq!(writer.record_count_in_file(), 6);
    writer.close().unwrap();

    let store = store.borrow();
    assert_eq!(
        store.read_attribute(GROUP, "n_acquisitions").unwrap(),
        AttrValue::U32(3)
    );
    assert_eq!(
        store.read_attribute(GROUP, "n_records").unwrap(),
        AttrValue::U64(6)
    );
    let acquisitions = store.open_group("/stream0/acquisitions").unwrap();
    for (id, expected) in [(0, 3u32), (1, 1), (2, 2)] {
        let dataset = store.open_dataset(&acquisitions, &id.to_string()).unwrap();
        assert_eq!(
            store.read_attribute(dataset.path(), "n_records").unwrap(),
            AttrValue::U32(expected)
        );
        assert_eq!(
            store.dataset_shape(&dataset).unwrap(),
            [u64::from(expected), 2]
        );
    }
}

// ============================================================================
// Channel layouts
// ============================================================================

/// Separate-layout channels are contiguous blocks of the stored row.
#[test]
fn test_separate_layout_channel_views() {
    let store = shared_container();
    let format = digitized(3, 2, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    for channel in 0..3 {
        writer
            .channel_record_mut(channel)
            .unwrap()
            .fill(channel as u8 + 1);
    }
    assert_eq!(writer.stream_record(), &[1, 1, 2, 2, 3, 3]);
    assert!(writer.write_record(true));
    writer.close().unwrap();

    let mut reader =
        StreamEngine::open_existing(store, GROUP, format, ChannelFormat::Interleaved).unwrap();
    reader.read_record(0).unwrap().unwrap();
    assert_eq!(reader.channel_record(2).unwrap(), &[3, 3]);
}

/// Wide samples survive the strided transfer intact.
#[test]
fn test_interleaved_u16_samples() {
    let store = shared_container();
    let format =
        FormatDescriptor::new(2, 2, 2, DataFormat::Digitized, ChannelFormat::Interleaved).unwrap();
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    writer
        .channel_record_mut(0)
        .unwrap()
        .copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
    writer
        .channel_record_mut(1)
        .unwrap()
        .copy_from_slice(&[0x11, 0x12, 0x13, 0x14]);
    assert!(writer.write_record(true));
    writer.close().unwrap();

    let mut reader =
        StreamEngine::open_existing(store, GROUP, format, ChannelFormat::Interleaved).unwrap();
    reader.read_record(0).unwrap().unwrap();
    assert_eq!(
        reader.stream_record(),
        &[0x01, 0x02, 0x11, 0x12, 0x03, 0x04, 0x13, 0x14]
    );

    reader.set_access_format(ChannelFormat::Separate);
    reader.read_record(-1).unwrap().unwrap();
    assert!(reader.stream_record().is_empty());
    assert_eq!(reader.channel_record(1).unwrap(), &[0x11, 0x12, 0x13, 0x14]);
}

// ============================================================================
// Write failures
// ============================================================================

/// A container whose operations can be made to fail on demand.
#[derive(Debug, Default)]
struct FailingStore {
    inner: Container,
    fail_transfers: bool,
    fail_creates: bool,
    fail_attribute_writes: bool,
    fail_opens: bool,
    fail_reads: bool,
}

impl FailingStore {
    fn refuse(&self, what: &str) -> StoreError {
        StoreError::Unavailable(format!("injected {} failure", what))
    }
}

impl Store for FailingStore {
    fn open_group(&self, path: &str) -> StoreResult<GroupHandle> {
        self.inner.open_group(path)
    }

    fn create_group(&mut self, path: &str) -> StoreResult<GroupHandle> {
        self.inner.create_group(path)
    }

    fn read_attribute(&self, object: &str, name: &str) -> StoreResult<AttrValue> {
        self.inner.read_attribute(object, name)
    }

    fn write_attribute(&mut self, object: &str, name: &str, value: AttrValue) -> StoreResult<()> {
        if self.fail_attribute_writes {
            return Err(self.refuse("attribute"));
        }
        self.inner.write_attribute(object, name, value)
    }

    fn create_dataset(
        &mut self,
        group: &GroupHandle,
        name: &str,
        layout: &DatasetLayout,
    ) -> StoreResult<DatasetHandle> {
        if self.fail_creates {
            return Err(self.refuse("create"));
        }
        self.inner.create_dataset(group, name, layout)
    }

    fn open_dataset(&self, group: &GroupHandle, name: &str) -> StoreResult<DatasetHandle> {
        if self.fail_opens {
            return Err(self.refuse("open"));
        }
        self.inner.open_dataset(group, name)
    }

    fn dataset_shape(&self, dataset: &DatasetHandle) -> StoreResult<[u64; 2]> {
        self.inner.dataset_shape(dataset)
    }

    fn extend_dataset(&mut self, dataset: &DatasetHandle, rows: u64) -> StoreResult<()> {
        self.inner.extend_dataset(dataset, rows)
    }

    fn read_hyperslab(
        &self,
        dataset: &DatasetHandle,
        element: ElementType,
        selection: &Hyperslab,
        out: &mut [u8],
    ) -> StoreResult<()> {
        if self.fail_reads {
            return Err(self.refuse("read"));
        }
        self.inner.read_hyperslab(dataset, element, selection, out)
    }

    fn write_hyperslab(
        &mut self,
        dataset: &DatasetHandle,
        element: ElementType,
        selection: &Hyperslab,
        data: &[u8],
    ) -> StoreResult<()> {
        if self.fail_transfers {
            return Err(self.refuse("transfer"));
        }
        self.inner.write_hyperslab(dataset, element, selection, data)
    }
}

fn failing_store() -> Rc<RefCell<FailingStore>> {
    let store = Rc::new(RefCell::new(FailingStore::default()));
    store.borrow_mut().create_group(GROUP).unwrap();
    store
}

fn shape(store: &Rc<RefCell<FailingStore>>, id: u32) -> [u64; 2] {
    let store = store.borrow();
    let acquisitions = store.open_group("/stream0/acquisitions").unwrap();
    let dataset = store.open_dataset(&acquisitions, &id.to_string()).unwrap();
    store.dataset_shape(&dataset).unwrap()
}

/// A failed append leaves the counters alone and no unwritten row behind.
#[test]
fn test_failed_append_rolls_back() {
    let store = failing_store();
    let format = digitized(1, 2, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    write_records(&mut writer, &[true, false], |r, _| r as u8);
    assert_eq!(shape(&store, 0), [2, 2]);

    store.borrow_mut().fail_transfers = true;
    writer.stream_record_mut().fill(0xEE);
    assert!(matches!(
        writer.try_write_record(false),
        Err(EggError::Store(StoreError::Unavailable(_)))
    ));
    assert!(!writer.write_record(false));
    assert_eq!(writer.record_count_in_file(), 2);
    assert_eq!(writer.record_in_acquisition(), 2);
    assert_eq!(shape(&store, 0), [2, 2]);

    store.borrow_mut().fail_transfers = false;
    write_records(&mut writer, &[false], |_, _| 2);
    writer.close().unwrap();
    assert_eq!(writer.n_records_in_file(), 3);

    let mut reader =
        StreamEngine::open_existing(store, GROUP, format, ChannelFormat::Separate).unwrap();
    for expected in 0..3u8 {
        reader.read_record(0).unwrap().unwrap();
        assert_eq!(reader.stream_record(), &[expected, expected]);
    }
}

/// A failed first record of a new acquisition leaves it open and empty.
#[test]
fn test_failed_new_acquisition_stays_empty() {
    let store = failing_store();
    let format = digitized(1, 1, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    write_records(&mut writer, &[true], |_, _| 7);

    store.borrow_mut().fail_transfers = true;
    assert!(!writer.write_record(true));
    assert_eq!(writer.acquisition_id(), 1);
    assert_eq!(writer.record_count_in_file(), 1);
    assert_eq!(shape(&store, 1), [0, 1]);

    // The empty acquisition can still take records once the store recovers.
    store.borrow_mut().fail_transfers = false;
    write_records(&mut writer, &[false], |_, _| 8);
    writer.close().unwrap();

    let mut reader =
        StreamEngine::open_existing(store, GROUP, format, ChannelFormat::Separate).unwrap();
    assert_eq!(reader.n_acquisitions(), 2);
    reader.read_record(1).unwrap().unwrap();
    assert_eq!(reader.stream_record(), &[8]);
    assert_eq!(reader.acquisition_id(), 1);
}

/// Retrying a failed first record with `is_new = true` reuses the empty
/// acquisition instead of starting another.
#[test]
fn test_retried_new_acquisition_keeps_numbering() {
    let store = failing_store();
    let format = digitized(1, 1, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    write_records(&mut writer, &[true], |_, _| 7);

    store.borrow_mut().fail_transfers = true;
    writer.stream_record_mut()[0] = 8;
    assert!(!writer.write_record(true));

    store.borrow_mut().fail_transfers = false;
    assert!(writer.write_record(true));
    assert_eq!(writer.acquisition_id(), 1);
    assert_eq!(writer.record_in_acquisition(), 1);
    assert_eq!(shape(&store, 1), [1, 1]);
    writer.close().unwrap();
    assert_eq!(writer.n_acquisitions(), 2);

    let mut reader =
        StreamEngine::open_existing(store, GROUP, format, ChannelFormat::Separate).unwrap();
    assert_eq!(reader.n_acquisitions(), 2);
    assert_eq!(reader.n_records_in_file(), 2);
    let location = reader.read_record(1).unwrap().unwrap();
    assert_eq!(location.record, 1);
    assert_eq!(location.acquisition, 1);
    assert_eq!(location.position, 0);
    assert_eq!(reader.stream_record(), &[8]);
}

/// When the next acquisition cannot be created its id is not consumed.
#[test]
fn test_failed_create_keeps_id() {
    let store = failing_store();
    let format = digitized(1, 1, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format, ChannelFormat::Separate).unwrap();
    write_records(&mut writer, &[true], |_, _| 1);

    store.borrow_mut().fail_creates = true;
    assert!(!writer.write_record(true));
    assert_eq!(writer.acquisition_id(), 0);
    assert_eq!(writer.acquisition_state(), AcquisitionState::AcquisitionClosed);
    assert!(matches!(
        writer.try_write_record(false),
        Err(EggError::NoOpenAcquisition)
    ));

    store.borrow_mut().fail_creates = false;
    write_records(&mut writer, &[true], |_, _| 2);
    assert_eq!(writer.acquisition_id(), 1);
    writer.close().unwrap();
    assert_eq!(writer.n_acquisitions(), 2);
    assert_eq!(writer.n_records_in_file(), 2);
}

/// A close that cannot finalize the open acquisition writes nothing to the
/// stream group and can be repeated.
#[test]
fn test_failed_close_can_be_retried() {
    let store = failing_store();
    let format = digitized(1, 1, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    write_records(&mut writer, &[true, true, false], |r, _| r as u8);

    store.borrow_mut().fail_attribute_writes = true;
    assert!(matches!(
        writer.close(),
        Err(EggError::Store(StoreError::Unavailable(_)))
    ));
    assert!(!writer.is_closed());
    assert_eq!(writer.acquisition_state(), AcquisitionState::AcquisitionOpen);
    assert!(store.borrow().read_attribute(GROUP, "n_acquisitions").is_err());

    store.borrow_mut().fail_attribute_writes = false;
    writer.close().unwrap();
    assert!(writer.is_closed());
    assert_eq!(writer.n_acquisitions(), 2);

    let mut reader =
        StreamEngine::open_existing(store, GROUP, format, ChannelFormat::Separate).unwrap();
    assert_eq!(reader.n_records_in_file(), 3);
    let location = reader.read_record(2).unwrap().unwrap();
    assert_eq!(location.acquisition, 1);
    assert_eq!(location.position, 1);
    assert_eq!(reader.stream_record(), &[2]);
}

// ============================================================================
// Read failures
// ============================================================================

/// Writes records 0, 1 | 2 (one sample each, holding the record number) and
/// opens the stream for reading.
fn failing_reader() -> (Rc<RefCell<FailingStore>>, StreamEngine<FailingStore>) {
    let store = failing_store();
    let format = digitized(1, 1, ChannelFormat::Separate);
    let mut writer =
        StreamEngine::create(store.clone(), GROUP, format.clone(), ChannelFormat::Separate)
            .unwrap();
    write_records(&mut writer, &[true, false, true], |r, _| r as u8);
    writer.close().unwrap();
    let reader =
        StreamEngine::open_existing(store.clone(), GROUP, format, ChannelFormat::Separate)
            .unwrap();
    (store, reader)
}

/// A failed transfer leaves the last-read position where it was.
#[test]
fn test_failed_read_keeps_position() {
    let (store, mut reader) = failing_reader();
    reader.read_record(0).unwrap().unwrap();

    store.borrow_mut().fail_reads = true;
    assert!(matches!(
        reader.read_record(0),
        Err(EggError::Store(StoreError::Unavailable(_)))
    ));
    assert_eq!(reader.last_record(), Some(0));

    store.borrow_mut().fail_reads = false;
    let location = reader.read_record(0).unwrap().unwrap();
    assert_eq!(location.record, 1);
    assert_eq!(reader.last_record(), Some(1));
    assert_eq!(reader.stream_record(), &[1]);
}

/// Failing to open the next acquisition leaves the position alone, and the
/// same read succeeds once the store recovers.
#[test]
fn test_failed_acquisition_open_keeps_position() {
    let (store, mut reader) = failing_reader();
    reader.read_record(1).unwrap().unwrap();

    store.borrow_mut().fail_opens = true;
    assert!(matches!(
        reader.read_record(0),
        Err(EggError::Store(StoreError::Unavailable(_)))
    ));
    assert_eq!(reader.last_record(), Some(1));

    store.borrow_mut().fail_opens = false;
    let location = reader.read_record(0).unwrap().unwrap();
    assert_eq!((location.record, location.acquisition), (2, 1));
    assert_eq!(reader.stream_record(), &[2]);

    let location = reader.read_record(-3).unwrap().unwrap();
    assert_eq!((location.record, location.acquisition), (0, 0));
    assert_eq!(reader.stream_record(), &[0]);
}

// ============================================================================
// Properties
// ============================================================================

fn plan_from_counts(counts: &[u32]) -> Vec<bool> {
    counts
        .iter()
        .flat_map(|&n| (0..n).map(|i| i == 0))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every record written comes back in order with identical bytes.
    #[test]
    fn prop_round_trip(
        counts in proptest::collection::vec(1u32..5, 1..5),
        n_channels in 1usize..4,
        samples in 1usize..5,
        interleaved in any::<bool>(),
        seed in any::<u8>(),
    ) {
        let physical = if interleaved {
            ChannelFormat::Interleaved
        } else {
            ChannelFormat::Separate
        };
        let format = digitized(n_channels, samples, physical);
        let content = |record: usize, i: usize| (record * 31 + i * 7) as u8 ^ seed;

        let store = shared_container();
        let mut writer = StreamEngine::create(
            store.clone(), GROUP, format.clone(), ChannelFormat::Interleaved,
        ).unwrap();
        let plan = plan_from_counts(&counts);
        write_records(&mut writer, &plan, content);
        writer.close().unwrap();

        let mut reader = StreamEngine::open_existing(
            store, GROUP, format, ChannelFormat::Interleaved,
        ).unwrap();
        prop_assert_eq!(reader.n_acquisitions() as usize, counts.len());
        prop_assert_eq!(reader.n_records_in_file() as usize, plan.len());
        for record in 0..plan.len() {
            let location = reader.read_record(0).unwrap().unwrap();
            prop_assert_eq!(location.record as usize, record);
            let expected: Vec<u8> = (0..n_channels * samples).map(|i| content(record, i)).collect();
            prop_assert_eq!(reader.stream_record(), expected.as_slice());
        }
        prop_assert!(reader.read_record(0).unwrap().is_none());
    }

    /// Global positions are the running sum of acquisition sizes.
    #[test]
    fn prop_index_positions(counts in proptest::collection::vec(1u32..6, 1..6)) {
        let store = shared_container();
        let format = digitized(1, 1, ChannelFormat::Separate);
        let mut writer = StreamEngine::create(
            store.clone(), GROUP, format.clone(), ChannelFormat::Separate,
        ).unwrap();
        write_records(&mut writer, &plan_from_counts(&counts), |r, _| r as u8);
        writer.close().unwrap();

        let reader = StreamEngine::open_existing(
            store, GROUP, format, ChannelFormat::Separate,
        ).unwrap();
        for (p, entry) in reader.index().iter().enumerate() {
            let before: u32 = counts[..entry.acquisition as usize].iter().sum();
            prop_assert_eq!(p as u32, before + entry.position);
            prop_assert!(entry.position < counts[entry.acquisition as usize]);
        }
    }

    /// Channel `c` sample `i` lands at interleaved position `i * N + c`, and
    /// reading per channel recovers the original blocks.
    #[test]
    fn prop_interleave(
        n_channels in 2usize..5,
        samples in 1usize..6,
        width in prop_oneof![Just(1usize), Just(2), Just(4), Just(8)],
    ) {
        let format = FormatDescriptor::new(
            n_channels, samples, width, DataFormat::Digitized, ChannelFormat::Interleaved,
        ).unwrap();
        let channel_bytes = format.channel_record_bytes();
        let block = |c: usize| -> Vec<u8> {
            (0..channel_bytes).map(|b| (c * 64 + b) as u8).collect()
        };

        let store = shared_container();
        let mut writer = StreamEngine::create(
            store.clone(), GROUP, format.clone(), ChannelFormat::Separate,
        ).unwrap();
        for c in 0..n_channels {
            writer.channel_record_mut(c).unwrap().copy_from_slice(&block(c));
        }
        prop_assert!(writer.write_record(true));
        writer.close().unwrap();

        let mut reader = StreamEngine::open_existing(
            store, GROUP, format, ChannelFormat::Interleaved,
        ).unwrap();
        reader.read_record(0).unwrap().unwrap();
        let interleaved = reader.stream_record().to_vec();
        for c in 0..n_channels {
            let original = block(c);
            for i in 0..samples {
                let at = (i * n_channels + c) * width;
                prop_assert_eq!(
                    &interleaved[at..at + width],
                    &original[i * width..(i + 1) * width]
                );
            }
        }

        reader.set_access_format(ChannelFormat::Separate);
        reader.read_record(-1).unwrap().unwrap();
        for c in 0..n_channels {
            let expected = block(c);
            prop_assert_eq!(reader.channel_record(c).unwrap(), expected.as_slice());
        }
    }
}
