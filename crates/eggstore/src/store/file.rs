//! Egg container file format.
//!
//! A [`Container`] is persisted as one file holding every node of the tree:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  File Header (16 bytes)                                      │
//! │  - Magic: "EGG3" (4 bytes)                                   │
//! │  - Version: u16 (2 bytes) = 1                                │
//! │  - Flags: u16 (2 bytes)                                      │
//! │  - Node Count: u32 (4 bytes)                                 │
//! │  - Reserved: 4 bytes                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Node Records (repeated, in path order)                      │
//! │  - Body length, body, body CRC32                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Footer (24 bytes)                                           │
//! │  - Node table offset, node count, file CRC, reverse magic    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Saving writes to a sibling `.tmp` file and renames it into place, so a
//! crash mid-save leaves the previous snapshot intact.

use crate::config::SyncMode;
use crate::error::{EggError, Result};
use crate::store::memory::{Container, DatasetData, Node, NodeKind};
use crate::store::{AttrValue, ElementType};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes for the file header: "EGG3"
pub const EGG_MAGIC: [u8; 4] = *b"EGG3";

/// Reverse magic bytes for the file footer: "3GGE"
pub const EGG_MAGIC_REVERSE: [u8; 4] = *b"3GGE";

/// Current container file format version.
pub const EGG_VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// Footer size in bytes.
pub const FOOTER_SIZE: usize = 24;

/// Sentinel for an unlimited row dimension.
const UNLIMITED_ROWS: u64 = u64::MAX;

const NODE_GROUP: u8 = 0;
const NODE_DATASET: u8 = 1;

const ATTR_U32: u8 = 1;
const ATTR_U64: u8 = 2;
const ATTR_F64: u8 = 3;
const ATTR_STR: u8 = 4;

/// Container file header (16 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Magic bytes: "EGG3"
    pub magic: [u8; 4],
    /// File format version.
    pub version: u16,
    /// Reserved flag bits.
    pub flags: u16,
    /// Number of node records that follow.
    pub node_count: u32,
}

impl ContainerHeader {
    /// Creates a header for `node_count` nodes.
    pub fn new(node_count: u32) -> Self {
        Self {
            magic: EGG_MAGIC,
            version: EGG_VERSION,
            flags: 0,
            node_count,
        }
    }

    /// Writes the header using little-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.node_count.to_le_bytes())?;
        // Reserved (4 bytes)
        writer.write_all(&[0u8; 4])?;
        Ok(())
    }

    /// Reads a header using little-endian byte order.
    ///
    /// # Errors
    ///
    /// Returns `EggError::InvalidMagic` if the magic bytes don't match.
    /// Returns `EggError::UnsupportedVersion` if the version is newer than this build.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf)?;

        let magic = [buf[0], buf[1], buf[2], buf[3]];
        if magic != EGG_MAGIC {
            return Err(EggError::InvalidMagic(magic));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > EGG_VERSION {
            return Err(EggError::UnsupportedVersion(version));
        }

        let flags = u16::from_le_bytes([buf[6], buf[7]]);
        let node_count = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);

        Ok(Self {
            magic,
            version,
            flags,
            node_count,
        })
    }
}

/// Container file footer (24 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFooter {
    /// Offset of the first node record from file start.
    pub node_table_offset: u64,
    /// Number of node records.
    pub node_count: u32,
    /// CRC32 of everything before the footer.
    pub file_crc32: u32,
    /// Reverse magic bytes: "3GGE"
    pub magic_reverse: [u8; 4],
}

impl ContainerFooter {
    /// Creates a footer.
    pub fn new(node_table_offset: u64, node_count: u32, file_crc32: u32) -> Self {
        Self {
            node_table_offset,
            node_count,
            file_crc32,
            magic_reverse: EGG_MAGIC_REVERSE,
        }
    }

    /// Writes the footer using little-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.node_table_offset.to_le_bytes())?;
        writer.write_all(&self.node_count.to_le_bytes())?;
        writer.write_all(&self.file_crc32.to_le_bytes())?;
        writer.write_all(&self.magic_reverse)?;
        // Reserved (4 bytes)
        writer.write_all(&[0u8; 4])?;
        Ok(())
    }

    /// Reads a footer using little-endian byte order.
    ///
    /// # Errors
    ///
    /// Returns `EggError::InvalidMagic` if the reverse magic bytes don't match.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; FOOTER_SIZE];
        reader.read_exact(&mut buf)?;

        let mut buf8 = [0u8; 8];
        buf8.copy_from_slice(&buf[0..8]);
        let node_table_offset = u64::from_le_bytes(buf8);
        let node_count = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let file_crc32 = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);

        let magic_reverse = [buf[16], buf[17], buf[18], buf[19]];
        if magic_reverse != EGG_MAGIC_REVERSE {
            return Err(EggError::InvalidMagic(magic_reverse));
        }

        Ok(Self {
            node_table_offset,
            node_count,
            file_crc32,
            magic_reverse,
        })
    }
}

/// One serialized node: `body_len: u32`, body, `body_crc32: u32`.
///
/// ## Body Layout
///
/// ```text
/// path_len: u16, path: UTF-8
/// kind: u8 (0 = group, 1 = dataset)
/// attr_count: u16, attrs: [(name_len: u16, name, tag: u8, value), ...]
/// dataset only:
///   element: u8, rows: u64, columns: u64, max_rows: u64 (MAX = unlimited),
///   chunk_rows: u64, chunk_columns: u64, data_len: u64, data
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Absolute path of the node.
    pub path: String,
    /// The node itself.
    pub node: Node,
}

impl NodeRecord {
    fn encode_body(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        write_str16(&mut body, &self.path)?;

        let kind = match self.node.kind {
            NodeKind::Group => NODE_GROUP,
            NodeKind::Dataset(_) => NODE_DATASET,
        };
        body.push(kind);

        let attr_count = u16::try_from(self.node.attributes.len()).map_err(|_| {
            EggError::Corrupt(format!("too many attributes on {}", self.path))
        })?;
        body.extend_from_slice(&attr_count.to_le_bytes());
        for (name, value) in &self.node.attributes {
            write_str16(&mut body, name)?;
            match value {
                AttrValue::U32(v) => {
                    body.push(ATTR_U32);
                    body.extend_from_slice(&v.to_le_bytes());
                }
                AttrValue::U64(v) => {
                    body.push(ATTR_U64);
                    body.extend_from_slice(&v.to_le_bytes());
                }
                AttrValue::F64(v) => {
                    body.push(ATTR_F64);
                    body.extend_from_slice(&v.to_le_bytes());
                }
                AttrValue::Str(v) => {
                    body.push(ATTR_STR);
                    body.extend_from_slice(&(v.len() as u32).to_le_bytes());
                    body.extend_from_slice(v.as_bytes());
                }
            }
        }

        if let NodeKind::Dataset(data) = &self.node.kind {
            body.push(data.element as u8);
            body.extend_from_slice(&data.rows.to_le_bytes());
            body.extend_from_slice(&data.columns.to_le_bytes());
            body.extend_from_slice(&data.max_rows.unwrap_or(UNLIMITED_ROWS).to_le_bytes());
            body.extend_from_slice(&data.chunk[0].to_le_bytes());
            body.extend_from_slice(&data.chunk[1].to_le_bytes());
            body.extend_from_slice(&(data.data.len() as u64).to_le_bytes());
            body.extend_from_slice(&data.data);
        }

        Ok(body)
    }

    /// Writes the record and returns the number of bytes written.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let body = self.encode_body()?;
        let crc = crc32fast::hash(&body);
        writer.write_all(&(body.len() as u32).to_le_bytes())?;
        writer.write_all(&body)?;
        writer.write_all(&crc.to_le_bytes())?;
        Ok(4 + body.len() + 4)
    }

    /// Reads a record and verifies its CRC.
    ///
    /// # Errors
    ///
    /// Returns `EggError::ChecksumMismatch` if CRC verification fails.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let len = read_u32(reader)? as usize;
        let body = read_bytes(reader, len)?;
        let expected = read_u32(reader)?;

        let actual = crc32fast::hash(&body);
        if actual != expected {
            return Err(EggError::ChecksumMismatch { expected, actual });
        }

        let mut cursor = Cursor::new(body.as_slice());
        let path = read_str16(&mut cursor)?;
        let kind = read_u8(&mut cursor)?;

        let attr_count = read_u16(&mut cursor)? as usize;
        let mut attributes = BTreeMap::new();
        for _ in 0..attr_count {
            let name = read_str16(&mut cursor)?;
            let value = match read_u8(&mut cursor)? {
                ATTR_U32 => AttrValue::U32(read_u32(&mut cursor)?),
                ATTR_U64 => AttrValue::U64(read_u64(&mut cursor)?),
                ATTR_F64 => AttrValue::F64(f64::from_bits(read_u64(&mut cursor)?)),
                ATTR_STR => {
                    let len = read_u32(&mut cursor)? as usize;
                    AttrValue::Str(read_utf8(&mut cursor, len)?)
                }
                tag => {
                    return Err(EggError::Corrupt(format!(
                        "unknown attribute tag {} on {}@{}",
                        tag, path, name
                    )))
                }
            };
            attributes.insert(name, value);
        }

        let kind = match kind {
            NODE_GROUP => NodeKind::Group,
            NODE_DATASET => {
                let code = read_u8(&mut cursor)?;
                let element = ElementType::from_u8(code).ok_or_else(|| {
                    EggError::Corrupt(format!("unknown element type {} on {}", code, path))
                })?;
                let rows = read_u64(&mut cursor)?;
                let columns = read_u64(&mut cursor)?;
                let max_rows = match read_u64(&mut cursor)? {
                    UNLIMITED_ROWS => None,
                    max => Some(max),
                };
                let chunk = [read_u64(&mut cursor)?, read_u64(&mut cursor)?];
                let data_len = read_u64(&mut cursor)?;
                let shape_len = rows
                    .checked_mul(columns)
                    .and_then(|n| n.checked_mul(element.size() as u64));
                if shape_len != Some(data_len) {
                    return Err(EggError::Corrupt(format!(
                        "dataset {} holds {} bytes for shape [{}, {}]",
                        path, data_len, rows, columns
                    )));
                }
                let remaining = body.len() as u64 - cursor.position();
                if data_len > remaining {
                    return Err(EggError::Corrupt(format!(
                        "dataset {} declares {} bytes but {} remain",
                        path, data_len, remaining
                    )));
                }
                let data = read_bytes(&mut cursor, data_len as usize)?;
                NodeKind::Dataset(DatasetData {
                    element,
                    rows,
                    columns,
                    max_rows,
                    chunk,
                    data,
                })
            }
            other => {
                return Err(EggError::Corrupt(format!(
                    "unknown node kind {} at {}",
                    other, path
                )))
            }
        };

        Ok(Self {
            path,
            node: Node { kind, attributes },
        })
    }
}

fn write_str16(buf: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| EggError::Corrupt(format!("name too long: {} bytes", value.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads exactly `len` bytes, growing the buffer only as bytes arrive.
fn read_bytes<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(EggError::Corrupt(format!(
            "expected {} bytes, found {}",
            len,
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn read_utf8<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    let bytes = read_bytes(reader, len)?;
    String::from_utf8(bytes).map_err(|e| EggError::Corrupt(format!("invalid UTF-8: {}", e)))
}

fn read_str16<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_u16(reader)? as usize;
    read_utf8(reader, len)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Encodes a whole container into its file image.
pub fn encode_container(container: &Container) -> Result<Vec<u8>> {
    let node_count = container.len() as u32;
    let mut buf = Vec::new();
    ContainerHeader::new(node_count).write_to(&mut buf)?;

    for (path, node) in container.nodes() {
        NodeRecord {
            path: path.clone(),
            node: node.clone(),
        }
        .write_to(&mut buf)?;
    }

    let file_crc32 = crc32fast::hash(&buf);
    ContainerFooter::new(HEADER_SIZE as u64, node_count, file_crc32).write_to(&mut buf)?;
    Ok(buf)
}

/// Decodes a container from its file image.
///
/// # Errors
///
/// Fails on bad magic, an unsupported version, a node or file checksum
/// mismatch (the latter only when `verify_checksum` is set), or a node tree
/// whose parents are missing.
pub fn decode_container(bytes: &[u8], verify_checksum: bool) -> Result<Container> {
    if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(EggError::Corrupt(format!(
            "file of {} bytes is too short",
            bytes.len()
        )));
    }

    let header = ContainerHeader::read_from(&mut &bytes[..HEADER_SIZE])?;
    let body_end = bytes.len() - FOOTER_SIZE;
    let footer = ContainerFooter::read_from(&mut &bytes[body_end..])?;

    if verify_checksum {
        let actual = crc32fast::hash(&bytes[..body_end]);
        if actual != footer.file_crc32 {
            return Err(EggError::ChecksumMismatch {
                expected: footer.file_crc32,
                actual,
            });
        }
    }

    if header.node_count != footer.node_count {
        return Err(EggError::Corrupt(format!(
            "header lists {} nodes, footer {}",
            header.node_count, footer.node_count
        )));
    }
    let offset = footer.node_table_offset as usize;
    if offset < HEADER_SIZE || offset > body_end {
        return Err(EggError::Corrupt(format!(
            "node table offset {} out of range",
            offset
        )));
    }

    let mut cursor = Cursor::new(&bytes[offset..body_end]);
    let mut nodes = BTreeMap::new();
    for _ in 0..header.node_count {
        let record = NodeRecord::read_from(&mut cursor)?;
        nodes.insert(record.path, record.node);
    }

    Ok(Container::from_nodes(nodes)?)
}

/// Saves a container to `path`, replacing any existing file.
pub fn write_container(container: &Container, path: &Path, sync_mode: SyncMode) -> Result<()> {
    let image = encode_container(container)?;
    let tmp = temp_path(path);

    let file = File::create(&tmp)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&image)?;
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    if sync_mode == SyncMode::Fsync {
        file.sync_all()?;
    }
    drop(file);

    fs::rename(&tmp, path)?;
    debug!(
        "Saved container with {} nodes ({} bytes) to {}",
        container.len(),
        image.len(),
        path.display()
    );
    Ok(())
}

/// Loads a container from `path`.
pub fn read_container(path: &Path, verify_checksum: bool) -> Result<Container> {
    let bytes = fs::read(path)?;
    let container = decode_container(&bytes, verify_checksum)?;
    debug!(
        "Loaded container with {} nodes from {}",
        container.len(),
        path.display()
    );
    Ok(container)
}
