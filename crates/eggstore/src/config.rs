//! Options for opening and saving egg files.

use crate::stream::ChannelFormat;

/// Sync mode for container file durability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Fsync the container file after every save (default).
    #[default]
    Fsync,
    /// No sync (fastest, lowest durability - for testing only).
    None,
}

/// Configuration for [`EggFile`](crate::EggFile).
#[derive(Debug, Clone)]
pub struct EggConfig {
    /// Verify the whole-file CRC32 when opening for reading.
    pub verify_checksum: bool,
    /// Sync mode used whenever the container is saved.
    pub sync_mode: SyncMode,
    /// Initial access format of every stream.
    pub access_format: ChannelFormat,
}

impl Default for EggConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            sync_mode: SyncMode::default(),
            access_format: ChannelFormat::Separate,
        }
    }
}

impl EggConfig {
    /// Creates a configuration with custom settings.
    pub fn new(verify_checksum: bool, sync_mode: SyncMode, access_format: ChannelFormat) -> Self {
        Self {
            verify_checksum,
            sync_mode,
            access_format,
        }
    }

    /// Sets whether the file checksum is verified on open.
    pub fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Sets the sync mode.
    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    /// Sets the initial stream access format.
    pub fn with_access_format(mut self, access_format: ChannelFormat) -> Self {
        self.access_format = access_format;
        self
    }
}
