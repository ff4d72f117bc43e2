//! tiny-rope - inspect and edit binary tree files from the shell
//!
//! # Usage
//!
//! ```bash
//! tiny-rope pack notes.txt notes.tree
//! tiny-rope line notes.tree 12
//! tiny-rope insert notes.tree 0 "hello\n"
//! tiny-rope -vv stats notes.tree
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tiny_rope::{io, Config, Tree, TreeConfig};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Inspect and edit text stored as a binary rope
#[derive(Parser, Debug)]
#[command(name = "tiny-rope", version, about, long_about = None)]
struct Cli {
    /// TOML file with a [tree] table
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a tree from a text file and save it in binary form
    Pack { text: PathBuf, bin: PathBuf },
    /// Write the text held in a binary file
    Unpack { bin: PathBuf, text: PathBuf },
    /// Print one line (0-based)
    Line { bin: PathBuf, line: usize },
    /// Print LEN bytes starting at OFFSET
    Range {
        bin: PathBuf,
        offset: usize,
        len: usize,
    },
    /// Print the offset and line of the first match
    Find { bin: PathBuf, pattern: String },
    /// Print size, line, word and character counts
    Stats { bin: PathBuf },
    /// Insert TEXT at byte POS and save
    Insert {
        bin: PathBuf,
        pos: usize,
        text: String,
    },
    /// Remove LEN bytes at byte POS and save
    Erase { bin: PathBuf, pos: usize, len: usize },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tiny_rope={}", level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<()> {
    let tree_config = match &cli.config {
        Some(path) => {
            Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
                .tree
        }
        None => TreeConfig::default(),
    };

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::Pack { text, bin } => {
            let tree = io::load_text(&text, tree_config)
                .with_context(|| format!("Failed to read {}", text.display()))?;
            io::save_atomic(&tree, &bin)
                .with_context(|| format!("Failed to save {}", bin.display()))?;
        }
        Command::Unpack { bin, text } => {
            let tree = load(&bin, tree_config)?;
            io::save_text(&tree, &text)
                .with_context(|| format!("Failed to write {}", text.display()))?;
        }
        Command::Line { bin, line } => {
            let tree = load(&bin, tree_config)?;
            let bytes = tree
                .get_line(line)
                .with_context(|| format!("Line {} out of range ({} lines)", line, tree.line_count() + 1))?;
            stdout.write_all(&bytes)?;
            stdout.write_all(b"\n")?;
        }
        Command::Range { bin, offset, len } => {
            let tree = load(&bin, tree_config)?;
            let bytes = tree.get_text_range(offset, len).with_context(|| {
                format!("Range {}+{} out of bounds ({} bytes)", offset, len, tree.len())
            })?;
            stdout.write_all(&bytes)?;
        }
        Command::Find { bin, pattern } => {
            let tree = load(&bin, tree_config)?;
            match tree.find_substring(pattern.as_bytes()) {
                Some(offset) => {
                    let line = tree.line_at_offset(offset).unwrap_or(0);
                    writeln!(stdout, "offset {} line {}", offset, line)?;
                }
                None => writeln!(stdout, "not found")?,
            }
        }
        Command::Stats { bin } => {
            let tree = load(&bin, tree_config)?;
            print_stats(&mut stdout, &tree)?;
        }
        Command::Insert { bin, pos, text } => {
            let mut tree = load(&bin, tree_config)?;
            tree.insert(pos, text.as_bytes())
                .with_context(|| format!("Failed to insert at {}", pos))?;
            io::save_atomic(&tree, &bin)
                .with_context(|| format!("Failed to save {}", bin.display()))?;
        }
        Command::Erase { bin, pos, len } => {
            let mut tree = load(&bin, tree_config)?;
            tree.erase(pos, len)
                .with_context(|| format!("Failed to erase {}+{}", pos, len))?;
            io::save_atomic(&tree, &bin)
                .with_context(|| format!("Failed to save {}", bin.display()))?;
        }
    }
    Ok(())
}

fn load(path: &Path, config: TreeConfig) -> Result<Tree> {
    io::load(path, config).with_context(|| format!("Failed to load {}", path.display()))
}

fn print_stats(out: &mut impl Write, tree: &Tree) -> Result<()> {
    let text = tree.to_text();
    let words = text.split(u8::is_ascii_whitespace).filter(|w| !w.is_empty()).count();

    writeln!(out, "bytes  {}", tree.len())?;
    writeln!(out, "lines  {}", tree.line_count() + 1)?;
    writeln!(out, "words  {}", words)?;
    match simdutf8::basic::from_utf8(&text) {
        Ok(s) => writeln!(out, "chars  {}", s.chars().count())?,
        Err(_) => writeln!(out, "chars  (not UTF-8)")?,
    }
    writeln!(out, "leaves {}", tree.leaf_count())?;
    writeln!(out, "depth  {}", tree.depth())?;
    Ok(())
}
