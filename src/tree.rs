//! Binary rope of byte chunks with cached sums for O(log n) queries
//!
//! Every internal node caches the byte and newline totals of its subtree, so
//! navigation never rescans text outside the one leaf it lands on. Every
//! traversal (build, edit, drop, export) runs on an explicit stack, so trees
//! loaded from disk may be arbitrarily deep.

use crate::config::TreeConfig;
use crate::error::{Result, RopeError};
use memchr::{memchr, memrchr};
use std::fmt;
use std::ops::{Add, Range};

// === Core Types ===

/// Aggregated metadata for O(log n) queries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sums {
    /// Total byte count
    pub bytes: usize,
    /// Total newline count
    pub lines: usize,
}

impl Sums {
    fn of(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.len(),
            lines: bytecount::count(bytes, b'\n'),
        }
    }
}

impl Add for Sums {
    type Output = Sums;

    fn add(self, rhs: Self) -> Self {
        Sums {
            bytes: self.bytes + rhs.bytes,
            lines: self.lines + rhs.lines,
        }
    }
}

/// Tree node - either a leaf owning bytes or an internal node owning two children
#[derive(Debug)]
pub enum Node {
    Leaf { bytes: Vec<u8>, sums: Sums },
    Internal {
        left: Box<Node>,
        right: Box<Node>,
        sums: Sums,
    },
}

impl Node {
    /// Create a leaf, counting its newlines once
    pub fn leaf(bytes: Vec<u8>) -> Self {
        Node::Leaf {
            sums: Sums::of(&bytes),
            bytes,
        }
    }

    /// Create an internal node; sums come from the children's caches in O(1)
    pub fn internal(left: Node, right: Node) -> Self {
        Node::Internal {
            sums: left.sums() + right.sums(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Pair up two optional subtrees, collapsing when one side is gone
    pub(crate) fn join(left: Option<Node>, right: Option<Node>) -> Option<Node> {
        match (left, right) {
            (Some(left), Some(right)) => Some(Node::internal(left, right)),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }

    #[inline]
    pub fn sums(&self) -> Sums {
        match self {
            Node::Leaf { sums, .. } | Node::Internal { sums, .. } => *sums,
        }
    }

    /// Get byte count from sums
    #[inline]
    pub fn byte_count(&self) -> usize {
        self.sums().bytes
    }

    /// Get newline count from sums
    #[inline]
    pub fn line_count(&self) -> usize {
        self.sums().lines
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// A text buffer stored as a binary tree of byte chunks
pub struct Tree {
    root: Option<Node>,
    config: TreeConfig,
}

// === Implementation ===

impl Tree {
    /// Create empty tree
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create empty tree with custom leaf sizing
    pub fn with_config(config: TreeConfig) -> Self {
        Self { root: None, config }
    }

    /// Create tree from text
    pub fn from_text(text: &[u8]) -> Self {
        Self::from_text_with_config(text, TreeConfig::default())
    }

    pub fn from_text_with_config(text: &[u8], config: TreeConfig) -> Self {
        let mut tree = Self::with_config(config);
        tree.set_text(text);
        tree
    }

    /// Replace the whole content with `text`
    pub fn set_text(&mut self, text: &[u8]) {
        self.clear();
        self.root = build_node(text, &self.config);
        tracing::debug!(
            bytes = text.len(),
            leaves = self.leaf_count(),
            depth = self.depth(),
            "built tree"
        );
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Drop every node
    pub fn clear(&mut self) {
        if let Some(root) = self.root.take() {
            dismantle(root);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Get total byte count - O(1)
    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, Node::byte_count)
    }

    /// Get total newline count - O(1)
    ///
    /// A tree with `n` newlines has `n + 1` addressable lines.
    pub fn line_count(&self) -> usize {
        self.root.as_ref().map_or(0, Node::line_count)
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Replace the root, dropping the previous subtree
    ///
    /// An empty leaf is stored as an empty tree.
    pub fn set_root(&mut self, root: Option<Node>) {
        self.clear();
        self.root = root.filter(|node| node.byte_count() > 0);
    }

    /// Detach the root, leaving the tree empty
    pub fn take_root(&mut self) -> Option<Node> {
        self.root.take()
    }

    /// Copy the whole content into one buffer
    pub fn to_text(&self) -> Vec<u8> {
        // Pre-allocate with total byte count to avoid reallocations
        let mut out = Vec::with_capacity(self.len());
        for chunk in self.chunks() {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Leaf byte slices in document order
    pub fn chunks(&self) -> Chunks<'_> {
        Chunks::new(self.root.as_ref())
    }

    /// Leaf byte slices starting at byte `offset`; the first slice may be partial
    pub fn chunks_from(&self, offset: usize) -> Chunks<'_> {
        Chunks::starting_at(self.root.as_ref(), offset)
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&Node> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf { .. } => count += 1,
                Node::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        count
    }

    /// Number of nodes on the longest root-to-leaf path (0 when empty)
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(&Node, usize)> = self.root.iter().map(|node| (node, 1)).collect();
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Node::Internal { left, right, .. } = node {
                stack.push((&**left, depth + 1));
                stack.push((&**right, depth + 1));
            }
        }
        deepest
    }

    /// Insert `data` at byte `pos`
    ///
    /// Fails if `pos` is past the end; positions are never clamped.
    pub fn insert(&mut self, pos: usize, data: &[u8]) -> Result<()> {
        let total = self.len();
        if pos > total {
            return Err(RopeError::OutOfBounds {
                pos,
                len: data.len(),
                total,
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        self.root = match self.root.take() {
            None => build_node(data, &self.config),
            Some(root) => Some(insert_at(root, pos, data, &self.config)),
        };
        debug_assert!(
            validate_tree_structure(self.root.as_ref()),
            "Tree structure invalid after insert at {}",
            pos
        );
        tracing::trace!(pos, len = data.len(), "insert");
        Ok(())
    }

    /// Remove `len` bytes starting at `pos`
    ///
    /// Fails if the range runs past the end; it is never clamped.
    pub fn erase(&mut self, pos: usize, len: usize) -> Result<()> {
        let total = self.len();
        let end = pos
            .checked_add(len)
            .filter(|&end| end <= total)
            .ok_or(RopeError::OutOfBounds { pos, len, total })?;
        if len == 0 {
            return Ok(());
        }

        self.root = self.root.take().and_then(|root| delete_range(root, pos..end));
        debug_assert!(
            validate_tree_structure(self.root.as_ref()),
            "Tree structure invalid after erase of {}..{}",
            pos,
            end
        );
        tracing::trace!(pos, len, "erase");
        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("bytes", &self.len())
            .field("lines", &self.line_count())
            .field("leaves", &self.leaf_count())
            .field("config", &self.config)
            .finish()
    }
}

// === Leaf Iteration ===

/// In-order iterator over leaf bytes
pub struct Chunks<'a> {
    stack: Vec<&'a Node>,
    head: Option<&'a [u8]>,
}

impl<'a> Chunks<'a> {
    fn new(root: Option<&'a Node>) -> Self {
        Self {
            stack: root.into_iter().collect(),
            head: None,
        }
    }

    fn starting_at(root: Option<&'a Node>, offset: usize) -> Self {
        let mut stack = Vec::new();
        let mut head = None;
        let Some(mut node) = root else {
            return Self { stack, head };
        };

        let mut local = offset;
        loop {
            match node {
                Node::Internal { left, right, .. } => {
                    if local < left.byte_count() {
                        stack.push(&**right);
                        node = &**left;
                    } else {
                        local -= left.byte_count();
                        node = &**right;
                    }
                }
                Node::Leaf { bytes, .. } => {
                    if local < bytes.len() {
                        head = Some(&bytes[local..]);
                    }
                    break;
                }
            }
        }
        Self { stack, head }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(head) = self.head.take() {
            return Some(head);
        }
        while let Some(node) = self.stack.pop() {
            match node {
                Node::Leaf { bytes, .. } => return Some(bytes.as_slice()),
                Node::Internal { left, right, .. } => {
                    self.stack.push(right);
                    self.stack.push(left);
                }
            }
        }
        None
    }
}

// === Construction and Editing ===

enum BuildTask {
    Split(Range<usize>),
    Join,
}

/// Build a balanced subtree over `text` without recursion
pub(crate) fn build_node(text: &[u8], config: &TreeConfig) -> Option<Node> {
    if text.is_empty() {
        return None;
    }

    let max_leaf_size = config.max_leaf_size.max(1);
    let mut tasks = vec![BuildTask::Split(0..text.len())];
    let mut built: Vec<Node> = Vec::new();

    while let Some(task) = tasks.pop() {
        match task {
            BuildTask::Split(range) => {
                if range.len() <= max_leaf_size {
                    built.push(Node::leaf(text[range].to_vec()));
                    continue;
                }
                let mid = range.start + split_point(&text[range.clone()], config);
                // Left half runs first, so the join pops right then left
                tasks.push(BuildTask::Join);
                tasks.push(BuildTask::Split(mid..range.end));
                tasks.push(BuildTask::Split(range.start..mid));
            }
            BuildTask::Join => {
                let right = built.pop();
                let left = built.pop();
                if let Some(node) = Node::join(left, right) {
                    built.push(node);
                }
            }
        }
    }

    built.pop()
}

/// Pick a split index in `1..chunk.len()`, preferring just after a newline
/// near the midpoint. Forward from the midpoint first, then backward.
fn split_point(chunk: &[u8], config: &TreeConfig) -> usize {
    let len = chunk.len();
    let half = len / 2;
    let window = (len / 4).min(config.split_window);
    if window == 0 {
        return half;
    }

    if let Some(i) = memchr(b'\n', &chunk[half..half + window]) {
        return half + i + 1;
    }

    let lo = (half + 1).saturating_sub(window).max(1);
    if let Some(i) = memrchr(b'\n', &chunk[lo..=half]) {
        return lo + i + 1;
    }

    half
}

/// Splice `data` into the leaf covering `pos`, rebuilding sums on the way up
fn insert_at(root: Node, pos: usize, data: &[u8], config: &TreeConfig) -> Node {
    // Siblings passed on the way down, and whether we went left of them
    let mut path: Vec<(Node, bool)> = Vec::new();
    let mut node = root;
    let mut local = pos;
    let bytes = loop {
        match node {
            Node::Leaf { bytes, .. } => break bytes,
            Node::Internal { left, right, .. } => {
                let split = left.byte_count();
                if local < split {
                    path.push((*right, true));
                    node = *left;
                } else {
                    local -= split;
                    path.push((*left, false));
                    node = *right;
                }
            }
        }
    };

    let mut spliced = Vec::with_capacity(bytes.len() + data.len());
    spliced.extend_from_slice(&bytes[..local]);
    spliced.extend_from_slice(data);
    spliced.extend_from_slice(&bytes[local..]);

    let mut rebuilt = if spliced.len() <= config.max_leaf_size.max(1) {
        Node::leaf(spliced)
    } else {
        match build_node(&spliced, config) {
            Some(node) => node,
            None => Node::leaf(spliced),
        }
    };

    while let Some((sibling, went_left)) = path.pop() {
        rebuilt = if went_left {
            Node::internal(rebuilt, sibling)
        } else {
            Node::internal(sibling, rebuilt)
        };
    }
    rebuilt
}

enum EraseStep {
    /// Delete a node-local range; an empty range keeps the node as is
    Visit(Node, Range<usize>),
    /// Pair the two most recent results, collapsing absent sides
    Join,
}

/// Delete a node-local range; `None` when nothing survives
fn delete_range(root: Node, range: Range<usize>) -> Option<Node> {
    let mut steps = vec![EraseStep::Visit(root, range)];
    let mut results: Vec<Option<Node>> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            EraseStep::Visit(node, range) => {
                if range.is_empty() {
                    results.push(Some(node));
                    continue;
                }
                if range.start == 0 && range.end >= node.byte_count() {
                    dismantle(node);
                    results.push(None);
                    continue;
                }
                match node {
                    Node::Leaf { mut bytes, .. } => {
                        bytes.drain(range);
                        results.push(Some(Node::leaf(bytes)));
                    }
                    Node::Internal { left, right, .. } => {
                        let split = left.byte_count();
                        let left_range = if range.start < split {
                            range.start..range.end.min(split)
                        } else {
                            0..0
                        };
                        let right_range = if range.end > split {
                            range.start.saturating_sub(split)..range.end - split
                        } else {
                            0..0
                        };
                        // Left runs first, so the join pops right then left
                        steps.push(EraseStep::Join);
                        steps.push(EraseStep::Visit(*right, right_range));
                        steps.push(EraseStep::Visit(*left, left_range));
                    }
                }
            }
            EraseStep::Join => {
                let right = results.pop().flatten();
                let left = results.pop().flatten();
                results.push(Node::join(left, right));
            }
        }
    }

    results.pop().flatten()
}

/// Drop a subtree of any depth without recursing
pub(crate) fn dismantle(node: Node) {
    let mut stack = vec![node];
    while let Some(node) = stack.pop() {
        if let Node::Internal { left, right, .. } = node {
            stack.push(*left);
            stack.push(*right);
        }
    }
}

/// Validate cached sums against content (debug builds only)
#[cfg(debug_assertions)]
fn validate_tree_structure(root: Option<&Node>) -> bool {
    let mut stack: Vec<&Node> = root.into_iter().collect();
    while let Some(node) = stack.pop() {
        match node {
            Node::Leaf { bytes, sums } => {
                let computed = Sums::of(bytes);
                if *sums != computed {
                    tracing::error!(?sums, ?computed, "leaf sums mismatch");
                    return false;
                }
            }
            Node::Internal { left, right, sums } => {
                let computed = left.sums() + right.sums();
                if *sums != computed {
                    tracing::error!(?sums, ?computed, "internal node sums mismatch");
                    return false;
                }
                stack.push(left);
                stack.push(right);
            }
        }
    }
    true
}

#[cfg(not(debug_assertions))]
fn validate_tree_structure(_root: Option<&Node>) -> bool {
    true // No-op in release builds
}
