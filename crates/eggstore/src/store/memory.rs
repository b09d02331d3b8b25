//! In-memory implementation of [`Store`].
//!
//! A [`Container`] is a flat map from absolute path to node. Groups carry
//! only attributes; datasets additionally own their row-major sample bytes.

use super::{
    join_path, AttrValue, DatasetHandle, DatasetLayout, ElementType, GroupHandle, Hyperslab, Store,
    StoreError, StoreResult,
};
use std::collections::BTreeMap;

/// Path of the root group.
pub const ROOT: &str = "/";

/// Row-major storage of one two-dimensional dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetData {
    /// Element type.
    pub element: ElementType,
    /// Current row count.
    pub rows: u64,
    /// Fixed column count.
    pub columns: u64,
    /// Maximum row count (`None` = unlimited).
    pub max_rows: Option<u64>,
    /// Chunk shape hint.
    pub chunk: [u64; 2],
    /// `rows * columns * element.size()` bytes.
    pub data: Vec<u8>,
}

impl DatasetData {
    /// Bytes needed for `rows * columns` elements, or `None` on overflow.
    fn byte_len(element: ElementType, rows: u64, columns: u64) -> Option<usize> {
        rows.checked_mul(columns)
            .and_then(|n| n.checked_mul(element.size() as u64))
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Checks a selection against the extent and returns the element size.
    fn check_selection(
        &self,
        path: &str,
        element: ElementType,
        selection: &Hyperslab,
        buffer_len: usize,
    ) -> StoreResult<usize> {
        if element != self.element {
            return Err(StoreError::TypeMismatch {
                path: path.to_string(),
                detail: format!("dataset holds {:?}, buffer is {:?}", self.element, element),
            });
        }
        if selection.stride == 0 || selection.count == 0 {
            return Err(StoreError::InvalidSelection(format!(
                "stride {} count {} on {}",
                selection.stride, selection.count, path
            )));
        }
        if selection.row >= self.rows || selection.last_column() >= self.columns {
            return Err(StoreError::OutOfBounds {
                path: path.to_string(),
                detail: format!(
                    "selection row {} column {} outside [{}, {}]",
                    selection.row,
                    selection.last_column(),
                    self.rows,
                    self.columns
                ),
            });
        }
        let size = self.element.size();
        if buffer_len != selection.count as usize * size {
            return Err(StoreError::InvalidSelection(format!(
                "buffer of {} bytes for {} elements of {} bytes",
                buffer_len, selection.count, size
            )));
        }
        Ok(size)
    }

    fn element_offset(&self, selection: &Hyperslab, i: u64) -> usize {
        let column = selection.column + i * selection.stride;
        (selection.row * self.columns + column) as usize * self.element.size()
    }
}

/// Kind-specific content of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A group.
    Group,
    /// A dataset and its data.
    Dataset(DatasetData),
}

/// A group or dataset with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Group or dataset content.
    pub kind: NodeKind,
    /// Scalar attributes by name.
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Node {
    fn group() -> Self {
        Self {
            kind: NodeKind::Group,
            attributes: BTreeMap::new(),
        }
    }

    /// Returns true if the node is a group.
    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group)
    }
}

/// In-memory hierarchical container.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    nodes: BTreeMap<String, Node>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates a container holding only the root group.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(ROOT.to_string(), Node::group());
        Self { nodes }
    }

    /// Rebuilds a container from decoded nodes.
    ///
    /// Fails if the root group is missing or a node's parent is not a group.
    pub(crate) fn from_nodes(nodes: BTreeMap<String, Node>) -> StoreResult<Self> {
        match nodes.get(ROOT) {
            Some(root) if root.is_group() => {}
            _ => return Err(StoreError::NotFound(ROOT.to_string())),
        }
        for path in nodes.keys().filter(|p| p.as_str() != ROOT) {
            let parent = parent_path(path);
            if !nodes.get(&parent).is_some_and(Node::is_group) {
                return Err(StoreError::NotFound(parent));
            }
        }
        for (path, node) in &nodes {
            if let NodeKind::Dataset(data) = &node.kind {
                let expected = DatasetData::byte_len(data.element, data.rows, data.columns);
                if expected != Some(data.data.len()) {
                    return Err(StoreError::OutOfBounds {
                        path: path.clone(),
                        detail: format!(
                            "{} bytes for shape [{}, {}]",
                            data.data.len(),
                            data.rows,
                            data.columns
                        ),
                    });
                }
            }
        }
        Ok(Self { nodes })
    }

    /// Iterates over all nodes in path order.
    pub fn nodes(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if only the root group exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    fn node(&self, path: &str) -> StoreResult<&Node> {
        self.nodes
            .get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn node_mut(&mut self, path: &str) -> StoreResult<&mut Node> {
        self.nodes
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn dataset(&self, path: &str) -> StoreResult<&DatasetData> {
        match &self.node(path)?.kind {
            NodeKind::Dataset(data) => Ok(data),
            NodeKind::Group => Err(StoreError::NotFound(path.to_string())),
        }
    }

    fn dataset_mut(&mut self, path: &str) -> StoreResult<&mut DatasetData> {
        match &mut self.node_mut(path)?.kind {
            NodeKind::Dataset(data) => Ok(data),
            NodeKind::Group => Err(StoreError::NotFound(path.to_string())),
        }
    }

    fn insert_new(&mut self, path: String, node: Node) -> StoreResult<()> {
        if self.nodes.contains_key(&path) {
            return Err(StoreError::AlreadyExists(path));
        }
        let parent = parent_path(&path);
        if !self.node(&parent)?.is_group() {
            return Err(StoreError::NotFound(parent));
        }
        self.nodes.insert(path, node);
        Ok(())
    }
}

/// Parent of an absolute path; the root is its own parent.
fn parent_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => ROOT.to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

impl Store for Container {
    fn open_group(&self, path: &str) -> StoreResult<GroupHandle> {
        if self.node(path)?.is_group() {
            Ok(GroupHandle::new(path))
        } else {
            Err(StoreError::NotFound(path.to_string()))
        }
    }

    fn create_group(&mut self, path: &str) -> StoreResult<GroupHandle> {
        self.insert_new(path.to_string(), Node::group())?;
        Ok(GroupHandle::new(path))
    }

    fn read_attribute(&self, object: &str, name: &str) -> StoreResult<AttrValue> {
        self.node(object)?
            .attributes
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{}@{}", object, name)))
    }

    fn write_attribute(&mut self, object: &str, name: &str, value: AttrValue) -> StoreResult<()> {
        self.node_mut(object)?
            .attributes
            .insert(name.to_string(), value);
        Ok(())
    }

    fn create_dataset(
        &mut self,
        group: &GroupHandle,
        name: &str,
        layout: &DatasetLayout,
    ) -> StoreResult<DatasetHandle> {
        let path = join_path(group.path(), name);
        if layout.columns == 0 {
            return Err(StoreError::OutOfBounds {
                path,
                detail: "zero columns".to_string(),
            });
        }
        if layout.max_rows.is_some_and(|max| layout.rows > max) {
            return Err(StoreError::OutOfBounds {
                path,
                detail: format!("initial rows {} exceed maximum", layout.rows),
            });
        }
        let len = DatasetData::byte_len(layout.element, layout.rows, layout.columns)
            .ok_or_else(|| StoreError::OutOfBounds {
                path: path.clone(),
                detail: format!("shape [{}, {}] too large", layout.rows, layout.columns),
            })?;
        let data = DatasetData {
            element: layout.element,
            rows: layout.rows,
            columns: layout.columns,
            max_rows: layout.max_rows,
            chunk: layout.chunk,
            data: vec![0u8; len],
        };
        self.insert_new(
            path.clone(),
            Node {
                kind: NodeKind::Dataset(data),
                attributes: BTreeMap::new(),
            },
        )?;
        Ok(DatasetHandle::new(path))
    }

    fn open_dataset(&self, group: &GroupHandle, name: &str) -> StoreResult<DatasetHandle> {
        let path = join_path(group.path(), name);
        self.dataset(&path)?;
        Ok(DatasetHandle::new(path))
    }

    fn dataset_shape(&self, dataset: &DatasetHandle) -> StoreResult<[u64; 2]> {
        let data = self.dataset(dataset.path())?;
        Ok([data.rows, data.columns])
    }

    fn extend_dataset(&mut self, dataset: &DatasetHandle, rows: u64) -> StoreResult<()> {
        let data = self.dataset_mut(dataset.path())?;
        if data.max_rows.is_some_and(|max| rows > max) {
            return Err(StoreError::OutOfBounds {
                path: dataset.path().to_string(),
                detail: format!("rows {} exceed maximum {:?}", rows, data.max_rows),
            });
        }
        let len = DatasetData::byte_len(data.element, rows, data.columns).ok_or_else(|| {
            StoreError::OutOfBounds {
                path: dataset.path().to_string(),
                detail: format!("{} rows too large", rows),
            }
        })?;
        data.data.resize(len, 0);
        data.rows = rows;
        Ok(())
    }

    fn read_hyperslab(
        &self,
        dataset: &DatasetHandle,
        element: ElementType,
        selection: &Hyperslab,
        out: &mut [u8],
    ) -> StoreResult<()> {
        let data = self.dataset(dataset.path())?;
        let size = data.check_selection(dataset.path(), element, selection, out.len())?;
        if selection.stride == 1 {
            let start = data.element_offset(selection, 0);
            out.copy_from_slice(&data.data[start..start + out.len()]);
            return Ok(());
        }
        for (i, dst) in out.chunks_exact_mut(size).enumerate() {
            let start = data.element_offset(selection, i as u64);
            dst.copy_from_slice(&data.data[start..start + size]);
        }
        Ok(())
    }

    fn write_hyperslab(
        &mut self,
        dataset: &DatasetHandle,
        element: ElementType,
        selection: &Hyperslab,
        bytes: &[u8],
    ) -> StoreResult<()> {
        let data = self.dataset_mut(dataset.path())?;
        let size = data.check_selection(dataset.path(), element, selection, bytes.len())?;
        if selection.stride == 1 {
            let start = data.element_offset(selection, 0);
            data.data[start..start + bytes.len()].copy_from_slice(bytes);
            return Ok(());
        }
        for (i, src) in bytes.chunks_exact(size).enumerate() {
            let start = data.element_offset(selection, i as u64);
            data.data[start..start + size].copy_from_slice(src);
        }
        Ok(())
    }
}
