//! Navigation methods for the rope - O(log n) operations
//!
//! Line and byte queries descend by the cached sums and only scan the one leaf
//! they land on. Queries never fail: anything out of range is `None`.

use crate::tree::{Node, Tree};
use memchr::memchr_iter;

impl Tree {
    /// Find byte position at start of line - O(log n)
    ///
    /// Line 0 starts at offset 0, even in an empty tree.
    pub fn get_offset_for_line(&self, line: usize) -> Option<usize> {
        if line == 0 {
            return Some(0);
        }
        if line > self.line_count() {
            return None;
        }

        // Line n starts one byte past the nth newline
        let mut node = self.root()?;
        let mut remaining = line;
        let mut base = 0;
        loop {
            match node {
                Node::Internal { left, right, .. } => {
                    if remaining <= left.line_count() {
                        node = &**left;
                    } else {
                        remaining -= left.line_count();
                        base += left.byte_count();
                        node = &**right;
                    }
                }
                Node::Leaf { bytes, .. } => {
                    return memchr_iter(b'\n', bytes)
                        .nth(remaining - 1)
                        .map(|i| base + i + 1);
                }
            }
        }
    }

    /// Get the bytes of one line without its terminating newline
    ///
    /// Lines may span any number of leaves.
    pub fn get_line(&self, line: usize) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }
        let start = self.get_offset_for_line(line)?;
        let end = if line < self.line_count() {
            self.get_offset_for_line(line + 1)? - 1
        } else {
            self.len()
        };
        Some(self.copy_range(start, end - start))
    }

    /// Copy `len` bytes starting at `offset`
    ///
    /// `None` for an empty request or one that runs past the end.
    pub fn get_text_range(&self, offset: usize, len: usize) -> Option<Vec<u8>> {
        if len == 0 {
            return None;
        }
        let end = offset.checked_add(len)?;
        if end > self.len() {
            return None;
        }
        Some(self.copy_range(offset, len))
    }

    /// Line number containing byte `offset` - O(log n)
    ///
    /// `offset == len()` is accepted and maps to the last line.
    pub fn line_at_offset(&self, offset: usize) -> Option<usize> {
        if offset > self.len() {
            return None;
        }
        let Some(mut node) = self.root() else {
            return Some(0);
        };

        let mut local = offset;
        let mut lines = 0;
        loop {
            match node {
                Node::Internal { left, right, .. } => {
                    if local < left.byte_count() {
                        node = &**left;
                    } else {
                        local -= left.byte_count();
                        lines += left.line_count();
                        node = &**right;
                    }
                }
                Node::Leaf { bytes, .. } => {
                    return Some(lines + bytecount::count(&bytes[..local], b'\n'));
                }
            }
        }
    }

    /// Caller guarantees `offset + len <= self.len()`
    pub(crate) fn copy_range(&self, offset: usize, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        if len == 0 {
            return out;
        }
        for chunk in self.chunks_from(offset) {
            let take = (len - out.len()).min(chunk.len());
            out.extend_from_slice(&chunk[..take]);
            if out.len() == len {
                break;
            }
        }
        out
    }
}
