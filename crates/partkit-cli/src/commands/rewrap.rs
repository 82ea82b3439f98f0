//! Rewrap command implementation

use crate::cli::Cli;
use crate::cli::RewrapArgs;
use crate::commands;
use crate::error::add_input_context;
use crate::output::Destination;
use crate::output::OutputFormatter;
use anyhow::Result;
use anyhow::bail;
use partkit_core::Manifest;
use partkit_core::Payload;
use partkit_core::rewrap_manifest;

pub fn execute(cli: &Cli, args: &RewrapArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let config = commands::engine_config(cli);
    let text = commands::read_text(&args.manifest)?;
    let manifest = add_input_context(Manifest::from_json(&text), &args.manifest)?;
    let base = args
        .base
        .as_deref()
        .map(commands::read_input)
        .transpose()?;

    let destination = if let Some(path) = &args.output {
        let bytes = add_input_context(
            rewrap_manifest(&manifest, base.as_deref(), &config),
            &args.manifest,
        )?;
        commands::write_output(path, &bytes, args.force)?;
        Destination::File(path.clone())
    } else if let Some(reference) = args.output_ref {
        let engine = commands::open_engine(cli, config)?;
        add_input_context(
            engine.rewrap(&manifest, base.map(Payload::Inline), Some(&reference)),
            &args.manifest,
        )?;
        Destination::Object(reference)
    } else {
        bail!("No destination given\nHINT: Pass -o FILE or --output-ref REF.");
    };

    formatter.format_rewrap_result(&destination, manifest.entries.len())
}
