//! layerfs command-line front end.
//!
//! Stacks directories as layers (highest priority first) and inspects the
//! merged tree:
//!
//! - `cat PATH`: file contents from the first layer that has it
//! - `ls [PATH]`: merged directory listing with the layer of each entry
//! - `stat PATH`: metadata and the layer that answered
//! - `which PATH`: just the layer that answers for a path
//! - `layers`: the configured stack

pub mod config;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use layerfs::{EntryKind, Layer, LayeredFs, LocalLayer, OpenFile, Origin};
use tracing_subscriber::EnvFilter;

pub use config::{LayerConfig, LayerfsConfig};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "layerfs", version)]
#[command(about = "Inspect a stack of read-only directory layers as one merged tree")]
pub struct Cli {
    /// Layer directory; repeat for more layers, highest priority first.
    /// These sit above any layers from the config file.
    #[arg(short, long = "layer", value_name = "DIR")]
    pub layers: Vec<PathBuf>,

    /// Config file (defaults to ~/.config/layerfs/layers.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print a file
    Cat { path: PathBuf },

    /// List a directory across all layers
    Ls {
        #[arg(default_value = "/")]
        path: PathBuf,
    },

    /// Show metadata for a path
    Stat { path: PathBuf },

    /// Show which layer answers for a path
    Which { path: PathBuf },

    /// List the layer stack
    Layers,
}

/// The composed filesystem plus the labels of its layers.
pub struct LayerStack {
    layers: Vec<LayerConfig>,
    fs: LayeredFs,
}

impl LayerStack {
    /// Build a stack of local directory layers, in the given order.
    pub fn new(layers: Vec<LayerConfig>) -> Self {
        let fs = LayeredFs::new(
            layers
                .iter()
                .map(|layer| Arc::new(LocalLayer::new(&layer.path)) as Arc<dyn Layer>),
        );
        Self { layers, fs }
    }

    /// Command-line layers first, then the config file's.
    pub fn from_sources(cli_layers: &[PathBuf], config: &LayerfsConfig) -> Self {
        let layers = cli_layers
            .iter()
            .map(LayerConfig::new)
            .chain(config.layers.iter().cloned())
            .collect();
        Self::new(layers)
    }

    pub fn fs(&self) -> &LayeredFs {
        &self.fs
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Label of the layer an answer came from.
    pub fn name_of(&self, origin: Origin<'_>) -> String {
        self.layers
            .get(origin.index())
            .map(LayerConfig::display_name)
            .unwrap_or_else(|| format!("layer {}", origin.index()))
    }
}

/// Log filter for the binary.
///
/// A non-empty, parseable `RUST_LOG` value is used as is. Otherwise layerfs
/// logs at `info`, or `debug` with `--verbose`.
pub fn log_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|s| !s.trim().is_empty()) {
        match EnvFilter::try_new(directives) {
            Ok(filter) => return filter,
            Err(e) => eprintln!("ignoring invalid RUST_LOG {directives:?}: {e}"),
        }
    }
    EnvFilter::new(if verbose { "layerfs=debug" } else { "layerfs=info" })
}

/// Load configuration, build the stack and run one command against stdout.
pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => LayerfsConfig::load_from(path)?,
        None => LayerfsConfig::load()?,
    };

    let stack = LayerStack::from_sources(&cli.layers, &config);
    if stack.is_empty() {
        bail!("no layers configured: pass --layer DIR or list layers in the config file");
    }
    tracing::debug!("layer stack has {} layers", stack.layers.len());

    let mut out = Vec::new();
    execute(&stack, &cli.command, &mut out).await?;
    std::io::stdout().write_all(&out)?;
    Ok(())
}

/// Run a single command, writing its output to `out`.
pub async fn execute(stack: &LayerStack, command: &Command, out: &mut Vec<u8>) -> Result<()> {
    let fs = stack.fs();
    match command {
        Command::Cat { path } => {
            let data = fs.read_file(path).await?;
            out.write_all(&data)?;
        }
        Command::Ls { path } => match fs.open(path).await? {
            OpenFile::Dir(dir) => {
                for entry in dir.read_dir().await? {
                    let marker = kind_marker(entry.kind);
                    let layer = stack.name_of(entry.origin());
                    writeln!(out, "{} {} ({})", marker, entry.name, layer)?;
                }
            }
            file @ OpenFile::File(_) => {
                let info = file.stat().await?;
                let layer = stack.name_of(info.origin());
                writeln!(out, "{} {} ({})", kind_marker(info.kind), info.name, layer)?;
            }
        },
        Command::Stat { path } => {
            let info = fs.stat(path).await?;
            writeln!(out, "name: {}", info.name)?;
            writeln!(out, "kind: {}", kind_name(info.kind))?;
            writeln!(out, "size: {}", info.size)?;
            match info.permissions {
                Some(mode) => writeln!(out, "permissions: {:o}", mode & 0o7777)?,
                None => writeln!(out, "permissions: -")?,
            }
            match info.modified {
                Some(modified) => {
                    let modified: chrono::DateTime<chrono::Utc> = modified.into();
                    writeln!(out, "modified: {}", modified.to_rfc3339())?
                }
                None => writeln!(out, "modified: -")?,
            }
            writeln!(out, "layer: {}", stack.name_of(info.origin()))?;
        }
        Command::Which { path } => {
            let file = fs.open(path).await?;
            writeln!(out, "{}", stack.name_of(file.origin()))?;
        }
        Command::Layers => {
            for (index, layer) in stack.layers.iter().enumerate() {
                writeln!(out, "{} {} {}", index, layer.display_name(), layer.path.display())?;
            }
        }
    }
    Ok(())
}

fn kind_marker(kind: EntryKind) -> char {
    match kind {
        EntryKind::Directory => 'd',
        EntryKind::Symlink => 'l',
        EntryKind::File => '-',
    }
}

fn kind_name(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Directory => "directory",
        EntryKind::Symlink => "symlink",
        EntryKind::File => "file",
    }
}

