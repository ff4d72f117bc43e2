//! File I/O operations
//!
//! Binary tree files plus plain-text import and export

use crate::config::TreeConfig;
use crate::error::Result;
use crate::format;
use crate::tree::Tree;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// A read-write handle on a binary tree file
///
/// Opening creates the file if it is missing. A zero-byte file holds the
/// empty tree.
#[derive(Debug)]
pub struct BinaryTreeFile {
    file: File,
    path: PathBuf,
}

impl BinaryTreeFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        debug!(path = %path.display(), "opened tree file");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the file on disk
    pub fn file_len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Replace the file contents with `tree`
    pub fn save_tree(&mut self, tree: &Tree) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;

        let mut writer = BufWriter::new(&mut self.file);
        let written = format::write_tree(&mut writer, tree.root())?;
        writer.flush()?;
        drop(writer);

        info!(
            path = %self.path.display(),
            bytes = written,
            leaves = tree.leaf_count(),
            "saved tree"
        );
        Ok(())
    }

    /// Load the file into `tree`, replacing its content
    ///
    /// On error `tree` is left empty.
    pub fn load_tree(&mut self, tree: &mut Tree) -> Result<()> {
        tree.clear();

        let file_len = self.file_len()?;
        if file_len == 0 {
            debug!(path = %self.path.display(), "empty file, empty tree");
            return Ok(());
        }

        let mut reader = BufReader::new(&mut self.file);
        let root = format::read_tree(&mut reader, file_len)?;
        tree.set_root(root);

        info!(
            path = %self.path.display(),
            bytes = tree.len(),
            lines = tree.line_count(),
            "loaded tree"
        );
        Ok(())
    }
}

/// Load an existing binary tree file into a new tree
///
/// Opens read-only: a missing file is an `Io` error and is not created.
pub fn load(path: &Path, config: TreeConfig) -> Result<Tree> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let mut tree = Tree::with_config(config);
    if file_len > 0 {
        let root = format::read_tree(&mut BufReader::new(file), file_len)?;
        tree.set_root(root);
    }
    debug!(path = %path.display(), bytes = tree.len(), "loaded tree read-only");
    Ok(tree)
}

/// Build a tree from a plain text file
pub fn load_text(path: &Path, config: TreeConfig) -> Result<Tree> {
    let content = fs::read(path)?;
    Ok(Tree::from_text_with_config(&content, config))
}

/// Write the tree's content as plain text
pub fn save_text(tree: &Tree, path: &Path) -> Result<()> {
    fs::write(path, tree.to_text())?;
    Ok(())
}

/// Save to a uniquely named temporary file beside `path`, then rename it over
/// `path`. The temporary file is removed if anything fails before the rename.
pub fn save_atomic(tree: &Tree, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;

    let mut writer = BufWriter::new(tmp.as_file_mut());
    let written = format::write_tree(&mut writer, tree.root())?;
    writer.flush()?;
    drop(writer);

    tmp.persist(path).map_err(|e| e.error)?;
    info!(path = %path.display(), bytes = written, "saved tree atomically");
    Ok(())
}
