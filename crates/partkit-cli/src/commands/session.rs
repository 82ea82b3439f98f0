//! Session command implementation

use crate::cli::Cli;
use crate::cli::SessionCommands;
use crate::commands;
use crate::error::add_input_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use anyhow::bail;
use std::path::Path;

pub fn execute(cli: &Cli, command: &SessionCommands, formatter: &dyn OutputFormatter) -> Result<()> {
    let engine = commands::open_engine(cli, commands::engine_config(cli))?;

    match command {
        SessionCommands::New => {
            if cli.session_secret.is_none() {
                formatter.format_warning(
                    "No --session-secret set; these handles only work within this process",
                );
            }
            let session = add_input_context(engine.new_session(), Path::new("session"))?;
            formatter.format_session(&session)
        }
        SessionCommands::Upload { handle, file } => {
            require_secret(cli)?;
            let bytes = commands::read_input(file)?;
            let size = bytes.len();
            add_input_context(engine.sessions().upload(handle, bytes), file)?;
            formatter.format_success(&format!("Uploaded {size} bytes from {}", file.display()));
            Ok(())
        }
        SessionCommands::Download {
            handle,
            output,
            force,
        } => {
            require_secret(cli)?;
            let bytes = add_input_context(engine.sessions().download(handle), Path::new(handle))?;
            commands::write_output(output, &bytes, *force)?;
            formatter.format_success(&format!(
                "Downloaded {} bytes to {}",
                bytes.len(),
                output.display()
            ));
            Ok(())
        }
    }
}

/// Handles are signed, so verifying one in a later process needs the same secret.
fn require_secret(cli: &Cli) -> Result<()> {
    if cli.session_secret.is_none() {
        bail!(
            "No session secret configured\n\
             HINT: Pass --session-secret or set PARTKIT_SESSION_SECRET to the value used by `session new`."
        );
    }
    Ok(())
}
