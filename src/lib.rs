pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod search;
pub mod tree;
mod tree_nav; // Line and byte navigation on Tree

// Re-export core types
pub use config::{Config, TreeConfig};
pub use error::{Result, RopeError};
pub use io::BinaryTreeFile;
pub use tree::{Chunks, Node, Sums, Tree};
