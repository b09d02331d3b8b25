//! Egg files: a header plus one record stream per stream header.

use crate::config::EggConfig;
use crate::error::{EggError, Result};
use crate::header::FileHeader;
use crate::store::file::{read_container, write_container};
use crate::store::Container;
use crate::stream::{StreamEngine, StreamMode};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// An egg file opened for reading or writing.
///
/// In write mode the whole container lives in memory until
/// [`finish`](Self::finish) (or [`flush`](Self::flush)) saves it. Every
/// save encodes and writes the complete container, so memory use and save
/// time both grow with the amount of data recorded. There is no
/// incremental log; data not yet saved is lost if the process dies.
///
/// # Example
///
/// ```rust,no_run
/// use eggstore::{ChannelFormat, DataFormat, EggConfig, EggFile, FileHeader};
///
/// let mut header = FileHeader::new("run.egg");
/// header.add_stream(2, 1024, 1, DataFormat::Digitized, ChannelFormat::Interleaved);
///
/// let mut file = EggFile::create("run.egg", header, EggConfig::default())?;
/// let stream = file.stream_mut(0).unwrap();
/// stream.channel_record_mut(0)?.fill(1);
/// stream.channel_record_mut(1)?.fill(2);
/// stream.try_write_record(true)?;
/// file.finish()?;
/// # Ok::<(), eggstore::EggError>(())
/// ```
#[derive(Debug)]
pub struct EggFile {
    path: PathBuf,
    config: EggConfig,
    mode: StreamMode,
    store: Rc<RefCell<Container>>,
    header: FileHeader,
    streams: Vec<StreamEngine<Container>>,
    finished: bool,
}

impl EggFile {
    /// Creates a new egg file for writing.
    ///
    /// Nothing touches the disk until [`flush`](Self::flush) or
    /// [`finish`](Self::finish).
    pub fn create(
        path: impl AsRef<Path>,
        mut header: FileHeader,
        config: EggConfig,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if header.filename.is_empty() {
            header.filename = path.to_string_lossy().into_owned();
        }

        let mut container = Container::new();
        header.write_to(&mut container)?;
        let store = Rc::new(RefCell::new(container));

        let streams = header
            .streams
            .iter()
            .map(|stream| {
                StreamEngine::create(
                    store.clone(),
                    &stream.group_path(),
                    stream.format()?,
                    config.access_format,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Created {:?} with {} streams", path, streams.len());

        Ok(Self {
            path,
            config,
            mode: StreamMode::Write,
            store,
            header,
            streams,
            finished: false,
        })
    }

    /// Opens an existing egg file for reading.
    pub fn open(path: impl AsRef<Path>, config: EggConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let container = read_container(&path, config.verify_checksum)?;
        let header = FileHeader::read_from(&container)?;
        let store = Rc::new(RefCell::new(container));

        let streams = header
            .streams
            .iter()
            .map(|stream| {
                StreamEngine::open_existing(
                    store.clone(),
                    &stream.group_path(),
                    stream.format()?,
                    config.access_format,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Opened {:?} with {} streams", path, streams.len());

        Ok(Self {
            path,
            config,
            mode: StreamMode::Read,
            store,
            header,
            streams,
            finished: false,
        })
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the file was opened in.
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// The file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Number of streams.
    pub fn n_streams(&self) -> usize {
        self.streams.len()
    }

    /// Stream `number`, if it exists.
    pub fn stream(&self, number: usize) -> Option<&StreamEngine<Container>> {
        self.streams.get(number)
    }

    /// Stream `number`, mutably, if it exists.
    pub fn stream_mut(&mut self, number: usize) -> Option<&mut StreamEngine<Container>> {
        self.streams.get_mut(number)
    }

    /// Saves a snapshot of the container while writing.
    ///
    /// Streams are not finalized, so the snapshot cannot be opened for
    /// reading until [`finish`](Self::finish) has rewritten it.
    ///
    /// Each call re-encodes the whole in-memory container and rewrites the
    /// file (plus an fsync under [`SyncMode::Fsync`](crate::SyncMode)), so
    /// its cost is proportional to everything written so far, not to the
    /// records added since the last flush. Flushing after every record of
    /// a large stream is quadratic in total.
    pub fn flush(&self) -> Result<()> {
        if self.mode != StreamMode::Write {
            return Err(EggError::WrongMode {
                expected: "writing",
            });
        }
        write_container(&self.store.borrow(), &self.path, self.config.sync_mode)
    }

    /// Closes every stream and, in write mode, saves the file.
    ///
    /// Every stream is closed even if an earlier one fails; the first error
    /// is returned and the file is not saved in that case.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        let mut first_error = None;
        for stream in &mut self.streams {
            if let Err(e) = stream.close() {
                warn!("Could not close {}: {}", stream.group_path(), e);
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        if self.mode == StreamMode::Write {
            write_container(&self.store.borrow(), &self.path, self.config.sync_mode)?;
            debug!("Finished {:?}", self.path);
        }
        Ok(())
    }
}

impl Drop for EggFile {
    fn drop(&mut self) {
        if self.mode == StreamMode::Write && !self.finished {
            warn!(
                "{:?} dropped without finish(); unsaved records are lost",
                self.path
            );
        }
    }
}
