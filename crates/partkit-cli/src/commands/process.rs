//! Process command implementation

use crate::cli::Cli;
use crate::cli::ProcessArgs;
use crate::commands;
use crate::error::add_input_context;
use crate::output::Destination;
use crate::output::OutputFormatter;
use anyhow::Result;
use anyhow::bail;
use partkit_core::Engine;
use partkit_core::Payload;
use partkit_core::ProcessOperation;
use partkit_core::ProcessReport;
use partkit_core::process_archive;
use serde::Deserialize;
use std::path::Path;

/// Accepted layouts of an operations file.
#[derive(Deserialize)]
#[serde(untagged)]
enum OpsFile {
    List(Vec<ProcessOperation>),
    Wrapped { ops: Vec<ProcessOperation> },
}

impl OpsFile {
    fn into_ops(self) -> Vec<ProcessOperation> {
        match self {
            Self::List(ops) | Self::Wrapped { ops } => ops,
        }
    }
}

fn parse_ops(text: &str, path: &Path) -> Result<Vec<ProcessOperation>> {
    let parsed = serde_json::from_str::<OpsFile>(text).map_err(partkit_core::PartkitError::from);
    Ok(add_input_context(parsed, path)?.into_ops())
}

pub fn execute(cli: &Cli, args: &ProcessArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let config = commands::engine_config(cli);
    let ops = parse_ops(&commands::read_text(&args.ops)?, &args.ops)?;

    let needs_store = args.input_ref.is_some() || args.output_ref.is_some();
    let (destination, report) = if needs_store {
        let engine = commands::open_engine(cli, config)?;
        run_with_store(&engine, args, &ops)?
    } else {
        let (Some(input), Some(output)) = (&args.archive, &args.output) else {
            bail!("Missing input or output\nHINT: Pass ARCHIVE and -o FILE.");
        };
        let bytes = commands::read_input(input)?;
        let (archive, report) = add_input_context(process_archive(&bytes, &ops, &config), input)?;
        commands::write_output(output, &archive, args.force)?;
        (Destination::File(output.clone()), report)
    };

    formatter.format_process_result(&destination, &report)
}

fn run_with_store<S: partkit_core::session::ObjectStore>(
    engine: &Engine<S>,
    args: &ProcessArgs,
    ops: &[ProcessOperation],
) -> Result<(Destination, ProcessReport)> {
    let (payload, label) = match (&args.archive, args.input_ref) {
        (Some(path), _) => (
            Payload::Inline(commands::read_input(path)?),
            path.display().to_string(),
        ),
        (None, Some(reference)) => (Payload::Object(reference), reference.to_string()),
        (None, None) => bail!("No input archive given\nHINT: Pass ARCHIVE or --input-ref REF."),
    };

    let (output, report) = add_input_context(
        engine.process(payload, ops, args.output_ref.as_ref()),
        Path::new(&label),
    )?;

    let destination = match (output.as_inline(), &args.output, args.output_ref) {
        (_, _, Some(reference)) => Destination::Object(reference),
        (Some(bytes), Some(path), None) => {
            commands::write_output(path, bytes, args.force)?;
            Destination::File(path.clone())
        }
        _ => bail!("No destination given\nHINT: Pass -o FILE or --output-ref REF."),
    };
    Ok((destination, report))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ops_accepts_list_and_wrapper() {
        let list = r#"[{"type": "removePart", "path": "a.xml"}]"#;
        let wrapped = r#"{"ops": [{"type": "removePart", "path": "a.xml"}]}"#;

        let from_list = parse_ops(list, Path::new("ops.json")).unwrap();
        let from_wrapper = parse_ops(wrapped, Path::new("ops.json")).unwrap();
        assert_eq!(from_list, from_wrapper);
        assert_eq!(from_list[0].name(), "removePart");
    }

    #[test]
    fn test_parse_ops_rejects_unknown_type() {
        let err = parse_ops(r#"[{"type": "explode"}]"#, Path::new("ops.json")).unwrap_err();
        assert!(format!("{err:?}").contains("ops.json"));
    }
}
