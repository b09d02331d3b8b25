//! Hierarchical container store.
//!
//! The record engine only talks to storage through the [`Store`] trait: named
//! groups, scalar attributes on groups and datasets, and two-dimensional
//! extensible datasets of fixed-width samples addressed by hyperslab
//! selections. [`Container`] is the in-memory implementation and
//! [`file`] persists one to a `.egg` file.
//!
//! Paths are absolute and `/`-separated; the root group is `/`.

pub mod file;
pub mod memory;

pub use memory::Container;

use thiserror::Error;

/// A convenience `Result` type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a [`Store`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No object exists at the given path, or it has the wrong kind.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// An object already exists at the given path.
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// Attribute or element type does not match the request.
    #[error("Type mismatch on {path}: {detail}")]
    TypeMismatch {
        /// Path of the object involved.
        path: String,
        /// What was expected versus found.
        detail: String,
    },

    /// A resize or selection falls outside the dataset's extent.
    #[error("Out of bounds on {path}: {detail}")]
    OutOfBounds {
        /// Path of the dataset involved.
        path: String,
        /// Description of the violated bound.
        detail: String,
    },

    /// The selection is malformed or does not match the buffer size.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// The store refused the operation (closed, read-only or failing).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Element type of a dataset, stored little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementType {
    /// Unsigned 8-bit integer.
    U8 = 1,
    /// Unsigned 16-bit integer.
    U16 = 2,
    /// Unsigned 32-bit integer.
    U32 = 3,
    /// Unsigned 64-bit integer.
    U64 = 4,
    /// IEEE-754 single precision.
    F32 = 5,
    /// IEEE-754 double precision.
    F64 = 6,
}

impl ElementType {
    /// Creates an ElementType from its on-disk code.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::U8),
            2 => Some(Self::U16),
            3 => Some(Self::U32),
            4 => Some(Self::U64),
            5 => Some(Self::F32),
            6 => Some(Self::F64),
            _ => None,
        }
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
            Self::U64 | Self::F64 => 8,
        }
    }

    /// Returns true for the floating-point element types.
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Unsigned 32-bit value.
    U32(u32),
    /// Unsigned 64-bit value.
    U64(u64),
    /// Double precision value.
    F64(f64),
    /// UTF-8 string.
    Str(String),
}

impl AttrValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F64(_) => "f64",
            Self::Str(_) => "string",
        }
    }

    fn mismatch(&self, path: &str, expected: &str) -> StoreError {
        StoreError::TypeMismatch {
            path: path.to_string(),
            detail: format!("expected {}, found {}", expected, self.kind()),
        }
    }

    /// Reads the value as a u32, widening nothing.
    pub fn as_u32(&self, path: &str) -> StoreResult<u32> {
        match self {
            Self::U32(v) => Ok(*v),
            other => Err(other.mismatch(path, "u32")),
        }
    }

    /// Reads the value as a u64; u32 values are widened.
    pub fn as_u64(&self, path: &str) -> StoreResult<u64> {
        match self {
            Self::U32(v) => Ok(u64::from(*v)),
            Self::U64(v) => Ok(*v),
            other => Err(other.mismatch(path, "u64")),
        }
    }

    /// Reads the value as an f64.
    pub fn as_f64(&self, path: &str) -> StoreResult<f64> {
        match self {
            Self::F64(v) => Ok(*v),
            other => Err(other.mismatch(path, "f64")),
        }
    }

    /// Reads the value as a string slice.
    pub fn as_str(&self, path: &str) -> StoreResult<&str> {
        match self {
            Self::Str(v) => Ok(v),
            other => Err(other.mismatch(path, "string")),
        }
    }
}

/// Handle to an opened group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHandle {
    path: String,
}

impl GroupHandle {
    /// Creates a handle for the group at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Absolute path of the group.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Absolute path of a child object of this group.
    pub fn child(&self, name: &str) -> String {
        join_path(&self.path, name)
    }
}

/// Handle to an opened dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle {
    path: String,
}

impl DatasetHandle {
    /// Creates a handle for the dataset at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Absolute path of the dataset.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Joins a parent path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Geometry of a new two-dimensional dataset (`[rows, columns]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    /// Element type stored in the dataset.
    pub element: ElementType,
    /// Initial row count.
    pub rows: u64,
    /// Fixed column count.
    pub columns: u64,
    /// Maximum row count; `None` means the row dimension is unlimited.
    pub max_rows: Option<u64>,
    /// Chunk shape hint `[rows, columns]`.
    pub chunk: [u64; 2],
}

impl DatasetLayout {
    /// A dataset that starts with one row and may grow without bound,
    /// chunked one row at a time.
    pub fn extensible_rows(element: ElementType, columns: u64) -> Self {
        Self {
            element,
            rows: 1,
            columns,
            max_rows: None,
            chunk: [1, columns],
        }
    }
}

/// A selection of `count` elements in one dataset row, starting at
/// `column` and advancing by `stride` columns.
///
/// The user-side buffer is always contiguous: element `i` of the
/// selection maps to bytes `i * size .. (i + 1) * size` of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hyperslab {
    /// Row offset in the file dataspace.
    pub row: u64,
    /// Column offset in the file dataspace.
    pub column: u64,
    /// Column step between selected elements (at least 1).
    pub stride: u64,
    /// Number of selected elements.
    pub count: u64,
}

impl Hyperslab {
    /// Selects `count` consecutive elements of `row` starting at column 0.
    pub fn contiguous(row: u64, count: u64) -> Self {
        Self {
            row,
            column: 0,
            stride: 1,
            count,
        }
    }

    /// Selects every `stride`-th element of `row`, starting at `column`.
    pub fn strided(row: u64, column: u64, stride: u64, count: u64) -> Self {
        Self {
            row,
            column,
            stride,
            count,
        }
    }

    /// Column of the last selected element.
    pub fn last_column(&self) -> u64 {
        self.column + self.count.saturating_sub(1) * self.stride
    }
}

/// The hierarchical store the record engine runs against.
///
/// Implementations report every failure as a [`StoreError`]; callers never
/// see an implementation-specific error type.
pub trait Store {
    /// Opens an existing group.
    fn open_group(&self, path: &str) -> StoreResult<GroupHandle>;

    /// Creates a new group; its parent must already exist.
    fn create_group(&mut self, path: &str) -> StoreResult<GroupHandle>;

    /// Reads a scalar attribute of the group or dataset at `object`.
    fn read_attribute(&self, object: &str, name: &str) -> StoreResult<AttrValue>;

    /// Creates or overwrites a scalar attribute of the group or dataset at `object`.
    fn write_attribute(&mut self, object: &str, name: &str, value: AttrValue) -> StoreResult<()>;

    /// Creates a dataset named `name` inside `group`.
    fn create_dataset(
        &mut self,
        group: &GroupHandle,
        name: &str,
        layout: &DatasetLayout,
    ) -> StoreResult<DatasetHandle>;

    /// Opens an existing dataset named `name` inside `group`.
    fn open_dataset(&self, group: &GroupHandle, name: &str) -> StoreResult<DatasetHandle>;

    /// Current `[rows, columns]` of a dataset.
    fn dataset_shape(&self, dataset: &DatasetHandle) -> StoreResult<[u64; 2]>;

    /// Sets the row count of a dataset, growing (zero-filled) or shrinking it.
    fn extend_dataset(&mut self, dataset: &DatasetHandle, rows: u64) -> StoreResult<()>;

    /// Reads the selected elements into `out`.
    fn read_hyperslab(
        &self,
        dataset: &DatasetHandle,
        element: ElementType,
        selection: &Hyperslab,
        out: &mut [u8],
    ) -> StoreResult<()>;

    /// Writes `data` to the selected elements.
    fn write_hyperslab(
        &mut self,
        dataset: &DatasetHandle,
        element: ElementType,
        selection: &Hyperslab,
        data: &[u8],
    ) -> StoreResult<()>;
}
