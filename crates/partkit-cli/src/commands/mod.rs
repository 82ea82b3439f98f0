//! Subcommand implementations.

pub mod completion;
pub mod process;
pub mod rewrap;
pub mod session;
pub mod unwrap;
pub mod validate;

use crate::cli::Cli;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use partkit_core::Engine;
use partkit_core::EngineConfig;
use partkit_core::session::FsObjectStore;
use std::fs;
use std::path::Path;

/// Builds the engine configuration from global flags.
pub fn engine_config(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Some(level) = cli.compression_level {
        config = config.with_compression_level(level);
    }
    if let Some(secret) = &cli.session_secret {
        config = config.with_session_secret(secret.as_bytes().to_vec());
    }
    config
}

/// Opens the filesystem-backed engine used by every session-aware command.
pub fn open_engine(cli: &Cli, config: EngineConfig) -> Result<Engine<FsObjectStore>> {
    let Some(root) = &cli.store_dir else {
        bail!(
            "No object store configured\n\
             HINT: Pass --store-dir DIR or set PARTKIT_STORE_DIR to use session references."
        );
    };
    if !root.is_dir() {
        bail!(
            "Object store directory not found: {}\n\
             HINT: Create the directory first, e.g. `mkdir -p {}`.",
            root.display(),
            root.display()
        );
    }
    crate::error::add_input_context(Engine::new(FsObjectStore::new(root), config), root)
}

/// Reads a whole input file.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

/// Reads a UTF-8 input file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

/// Writes `bytes` to `path`, refusing to clobber unless `force` is set.
pub fn write_output(path: &Path, bytes: &[u8], force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Output file already exists: {}\n\
             HINT: Use --force to overwrite.",
            path.display()
        );
    }
    fs::write(path, bytes).with_context(|| format!("Failed to write '{}'", path.display()))
}
