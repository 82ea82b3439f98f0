//! CLI argument parsing using clap.

use clap::ArgGroup;
use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use partkit_core::ObjectRef;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "partkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Directory holding session objects
    #[arg(long, global = true, value_name = "DIR", env = "PARTKIT_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Deflate level for written archives (0 stores parts uncompressed)
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub compression_level: Option<u8>,

    /// Secret used to sign session handles
    #[arg(
        long,
        global = true,
        env = "PARTKIT_SESSION_SECRET",
        hide_env_values = true,
        value_name = "SECRET"
    )]
    pub session_secret: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert an archive into a JSON manifest
    Unwrap(UnwrapArgs),
    /// Build an archive from a JSON manifest
    Rewrap(RewrapArgs),
    /// Apply a batch of part operations to an archive
    Process(ProcessArgs),
    /// Check a manifest against a rule set
    Validate(ValidateArgs),
    /// Manage upload/download sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Generate shell completions
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
#[command(group(ArgGroup::new("input").required(true).args(["archive", "input_ref"])))]
pub struct UnwrapArgs {
    /// Path to the archive (.pptx, .docx, .xlsx, .thmx)
    #[arg(value_name = "ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Read the archive from a session object
    #[arg(long, value_name = "REF")]
    pub input_ref: Option<ObjectRef>,

    /// Embed binary parts as base64
    #[arg(long)]
    pub include_binary: bool,

    /// Write the manifest to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args)]
#[command(group(ArgGroup::new("destination").required(true).args(["output", "output_ref"])))]
pub struct RewrapArgs {
    /// Path to the manifest JSON
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Archive supplying parts the manifest omits
    #[arg(long, value_name = "ARCHIVE")]
    pub base: Option<PathBuf>,

    /// Output archive path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the archive to a session object
    #[arg(long, value_name = "REF")]
    pub output_ref: Option<ObjectRef>,

    /// Overwrite the output file if it exists
    #[arg(short = 'f', long)]
    pub force: bool,
}

#[derive(clap::Args)]
#[command(group(ArgGroup::new("input").required(true).args(["archive", "input_ref"])))]
#[command(group(ArgGroup::new("destination").required(true).args(["output", "output_ref"])))]
pub struct ProcessArgs {
    /// Path to the input archive
    #[arg(value_name = "ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Read the archive from a session object
    #[arg(long, value_name = "REF")]
    pub input_ref: Option<ObjectRef>,

    /// JSON file with the operation list
    #[arg(long, value_name = "FILE")]
    pub ops: PathBuf,

    /// Output archive path
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the archive to a session object
    #[arg(long, value_name = "REF")]
    pub output_ref: Option<ObjectRef>,

    /// Overwrite the output file if it exists
    #[arg(short = 'f', long)]
    pub force: bool,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Path to the manifest JSON
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// JSON file with the rule set
    #[arg(long, value_name = "FILE")]
    pub rules: PathBuf,

    /// Apply fixes for rules that allow it
    #[arg(long)]
    pub autofix: bool,

    /// Stop after the first violated rule
    #[arg(long)]
    pub fail_fast: bool,

    /// Stop after collecting this many violations
    #[arg(long, value_name = "N")]
    pub max_violations: Option<usize>,

    /// Fail when the score is below this value
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_score: Option<u8>,

    /// Write the (fixed) manifest to a file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Allocate a session with upload and download handles
    New,
    /// Upload a file through an upload handle
    Upload {
        /// Upload handle issued by `session new`
        #[arg(value_name = "HANDLE")]
        handle: String,
        /// File to upload
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Download an object through a download handle
    Download {
        /// Download handle issued by `session new`
        #[arg(value_name = "HANDLE")]
        handle: String,
        /// Destination file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Overwrite the destination if it exists
        #[arg(short = 'f', long)]
        force: bool,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_process_requires_input_and_destination() {
        assert!(Cli::try_parse_from(["partkit", "process", "--ops", "ops.json"]).is_err());
        assert!(
            Cli::try_parse_from(["partkit", "process", "deck.pptx", "--ops", "ops.json"]).is_err()
        );
        assert!(
            Cli::try_parse_from([
                "partkit",
                "process",
                "deck.pptx",
                "--ops",
                "ops.json",
                "-o",
                "out.pptx"
            ])
            .is_ok()
        );
    }

    #[test]
    fn test_object_ref_arguments_are_validated() {
        let bad = Cli::try_parse_from(["partkit", "unwrap", "--input-ref", "sessions/x/input"]);
        assert!(bad.is_err());

        let good = Cli::try_parse_from([
            "partkit",
            "unwrap",
            "--input-ref",
            "sessions/0b6f1d2e-8f4a-4c1e-9a57-3c5d2b1e7f90/input",
        ])
        .unwrap();
        let Commands::Unwrap(args) = good.command else {
            panic!("expected unwrap");
        };
        assert!(args.input_ref.is_some());
    }

    #[test]
    fn test_compression_level_range() {
        assert!(
            Cli::try_parse_from(["partkit", "--compression-level", "10", "session", "new"])
                .is_err()
        );
        assert!(
            Cli::try_parse_from(["partkit", "--compression-level", "0", "session", "new"]).is_ok()
        );
    }
}
