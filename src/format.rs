//! Binary tree file format
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header   magic "TREE" | u32 version | i64 root offset (-1 = empty tree)
//! leaf     u8 tag=1 | i32 byte length | payload
//! internal u8 tag=0 | i64 left offset | i64 right offset | i32 newline count
//! ```
//!
//! Records are written in post-order, so every child lives at a smaller offset
//! than its parent. The reader relies on that to reject cycles, and refuses a
//! record referenced twice, so a loaded tree is always a proper tree.

use crate::error::{Result, RopeError};
use crate::tree::{dismantle, Node};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom, Write};

pub const MAGIC: [u8; 4] = *b"TREE";
pub const VERSION: u32 = 1;
/// Offset sentinel for an absent child or an empty tree
pub const OFFSET_NONE: i64 = -1;
pub const HEADER_LEN: u64 = 16;

pub const TAG_INTERNAL: u8 = 0;
pub const TAG_LEAF: u8 = 1;

const LEAF_HEADER_LEN: u64 = 1 + 4;
const INTERNAL_RECORD_LEN: u64 = 1 + 8 + 8 + 4;

/// Byte position of the root offset inside the header
const ROOT_OFFSET_POS: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub root_offset: i64,
}

impl FileHeader {
    pub fn new(root_offset: i64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            root_offset,
        }
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_i64::<LittleEndian>(self.root_offset)?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        let version = reader.read_u32::<LittleEndian>()?;
        let root_offset = reader.read_i64::<LittleEndian>()?;
        Ok(Self {
            magic,
            version,
            root_offset,
        })
    }

    /// Check magic, version and root offset against a file of `file_len` bytes
    pub fn validate(&self, file_len: u64) -> Result<()> {
        if self.magic != MAGIC {
            return Err(RopeError::corrupt(format!(
                "bad magic {:?}",
                String::from_utf8_lossy(&self.magic)
            )));
        }
        if self.version != VERSION {
            return Err(RopeError::corrupt(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.root_offset != OFFSET_NONE
            && (self.root_offset < HEADER_LEN as i64 || self.root_offset as u64 >= file_len)
        {
            return Err(RopeError::corrupt(format!(
                "root offset {} outside file of {} bytes",
                self.root_offset, file_len
            )));
        }
        Ok(())
    }
}

// === Writing ===

enum WriteStep<'a> {
    Enter(&'a Node),
    Exit { lines: i32 },
}

/// Serialize `root` from the writer's start, returning the bytes written
///
/// The header is written first with a placeholder root offset that is patched
/// once the root record's position is known.
pub fn write_tree<W: Write + Seek>(writer: &mut W, root: Option<&Node>) -> Result<u64> {
    writer.seek(SeekFrom::Start(0))?;
    FileHeader::new(OFFSET_NONE).write_to(writer)?;

    let mut pos = HEADER_LEN;
    let mut offsets: Vec<i64> = Vec::new();
    let mut steps: Vec<WriteStep> = root.into_iter().map(WriteStep::Enter).collect();

    while let Some(step) = steps.pop() {
        match step {
            WriteStep::Enter(Node::Leaf { bytes, .. }) => {
                let len = i32::try_from(bytes.len()).map_err(|_| RopeError::Overflow("leaf length"))?;
                writer.write_u8(TAG_LEAF)?;
                writer.write_i32::<LittleEndian>(len)?;
                writer.write_all(bytes)?;
                offsets.push(pos as i64);
                pos += LEAF_HEADER_LEN + bytes.len() as u64;
            }
            WriteStep::Enter(Node::Internal { left, right, sums }) => {
                let lines = i32::try_from(sums.lines)
                    .map_err(|_| RopeError::Overflow("subtree newline count"))?;
                steps.push(WriteStep::Exit { lines });
                steps.push(WriteStep::Enter(&**right));
                steps.push(WriteStep::Enter(&**left));
            }
            WriteStep::Exit { lines } => {
                let right = offsets.pop().unwrap_or(OFFSET_NONE);
                let left = offsets.pop().unwrap_or(OFFSET_NONE);
                writer.write_u8(TAG_INTERNAL)?;
                writer.write_i64::<LittleEndian>(left)?;
                writer.write_i64::<LittleEndian>(right)?;
                writer.write_i32::<LittleEndian>(lines)?;
                offsets.push(pos as i64);
                pos += INTERNAL_RECORD_LEN;
            }
        }
    }

    // The root is the last record written
    if let Some(root_offset) = offsets.pop() {
        writer.seek(SeekFrom::Start(ROOT_OFFSET_POS))?;
        writer.write_i64::<LittleEndian>(root_offset)?;
        writer.seek(SeekFrom::Start(pos))?;
    }
    writer.flush()?;
    Ok(pos)
}

// === Reading ===

enum ReadStep {
    /// Read the record at `offset`, which must lie in `[HEADER_LEN, limit)`
    Visit { offset: i64, limit: i64 },
    /// Pair the two most recently built subtrees under an internal record
    Assemble { offset: i64, lines: i32 },
}

/// Deserialize a tree from a file of `file_len` bytes
///
/// Every offset and length is checked before it is followed or allocated.
/// On error nothing is returned; partially built subtrees are dropped.
pub fn read_tree<R: Read + Seek>(reader: &mut R, file_len: u64) -> Result<Option<Node>> {
    if file_len < HEADER_LEN {
        return Err(RopeError::corrupt(format!(
            "file of {} bytes is shorter than the header",
            file_len
        )));
    }
    reader.seek(SeekFrom::Start(0))?;
    let header = FileHeader::read_from(reader)?;
    header.validate(file_len)?;
    if header.root_offset == OFFSET_NONE {
        return Ok(None);
    }

    let mut built: Vec<Option<Node>> = Vec::new();
    let result = read_records(reader, file_len, header.root_offset, &mut built);
    if result.is_err() {
        for node in built.drain(..).flatten() {
            dismantle(node);
        }
    }
    result
}

fn read_records<R: Read + Seek>(
    reader: &mut R,
    file_len: u64,
    root_offset: i64,
    built: &mut Vec<Option<Node>>,
) -> Result<Option<Node>> {
    let mut steps = vec![ReadStep::Visit {
        offset: root_offset,
        limit: file_len as i64,
    }];
    let mut seen = HashSet::new();

    while let Some(step) = steps.pop() {
        match step {
            ReadStep::Visit { offset, limit } => {
                if offset == OFFSET_NONE {
                    built.push(None);
                    continue;
                }
                if offset < HEADER_LEN as i64 || offset >= limit {
                    return Err(RopeError::corrupt(format!(
                        "record offset {} outside [{}, {})",
                        offset, HEADER_LEN, limit
                    )));
                }
                if !seen.insert(offset) {
                    return Err(RopeError::corrupt(format!(
                        "record at {} is referenced more than once",
                        offset
                    )));
                }

                let start = offset as u64;
                reader.seek(SeekFrom::Start(start))?;
                match reader.read_u8()? {
                    TAG_LEAF => {
                        if start + LEAF_HEADER_LEN > file_len {
                            return Err(RopeError::corrupt(format!(
                                "leaf header at {} is truncated",
                                offset
                            )));
                        }
                        let len = reader.read_i32::<LittleEndian>()?;
                        if len < 0 || start + LEAF_HEADER_LEN + len as u64 > file_len {
                            return Err(RopeError::corrupt(format!(
                                "leaf at {} claims {} bytes in a file of {}",
                                offset, len, file_len
                            )));
                        }
                        let mut bytes = vec![0u8; len as usize];
                        reader.read_exact(&mut bytes)?;
                        // Zero-length leaves are dropped and their parent collapses
                        built.push((!bytes.is_empty()).then(|| Node::leaf(bytes)));
                    }
                    TAG_INTERNAL => {
                        if start + INTERNAL_RECORD_LEN > file_len {
                            return Err(RopeError::corrupt(format!(
                                "internal record at {} is truncated",
                                offset
                            )));
                        }
                        let left = reader.read_i64::<LittleEndian>()?;
                        let right = reader.read_i64::<LittleEndian>()?;
                        let lines = reader.read_i32::<LittleEndian>()?;
                        steps.push(ReadStep::Assemble { offset, lines });
                        steps.push(ReadStep::Visit {
                            offset: right,
                            limit: offset,
                        });
                        steps.push(ReadStep::Visit {
                            offset: left,
                            limit: offset,
                        });
                    }
                    tag => {
                        return Err(RopeError::corrupt(format!(
                            "unknown record tag {} at {}",
                            tag, offset
                        )));
                    }
                }
            }
            ReadStep::Assemble { offset, lines } => {
                let right = built.pop().flatten();
                let left = built.pop().flatten();
                let node = Node::join(left, right);
                let actual = node.as_ref().map_or(0, Node::line_count);
                if lines < 0 || actual != lines as usize {
                    if let Some(node) = node {
                        dismantle(node);
                    }
                    return Err(RopeError::corrupt(format!(
                        "internal record at {} caches {} newlines, subtree has {}",
                        offset, lines, actual
                    )));
                }
                built.push(node);
            }
        }
    }

    tracing::trace!(records = seen.len(), "read tree records");
    Ok(built.pop().flatten())
}
