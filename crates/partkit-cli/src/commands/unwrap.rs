//! Unwrap command implementation

use crate::cli::Cli;
use crate::cli::UnwrapArgs;
use crate::commands;
use crate::error::add_input_context;
use crate::output::OutputFormatter;
use crate::output::UnwrapSummary;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use partkit_core::Manifest;
use partkit_core::Payload;
use partkit_core::unwrap_archive;
use std::fs;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub fn execute(cli: &Cli, args: &UnwrapArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let config = commands::engine_config(cli).with_include_binary(args.include_binary);

    let manifest = if let Some(path) = &args.archive {
        let bytes = commands::read_input(path)?;
        add_input_context(unwrap_archive(&bytes, &config), path)?
    } else if let Some(reference) = args.input_ref {
        let engine = commands::open_engine(cli, config)?;
        let label = reference.to_string();
        add_input_context(engine.unwrap(Payload::Object(reference)), Path::new(&label))?
    } else {
        bail!("No input archive given\nHINT: Pass ARCHIVE or --input-ref REF.");
    };

    let json = add_input_context(manifest.to_json_pretty(), Path::new("manifest"))?;

    let Some(output) = &args.output else {
        // The manifest itself is the result; formatters only describe files.
        writeln!(io::stdout(), "{json}")?;
        return Ok(());
    };

    fs::write(output, json).with_context(|| format!("Failed to write '{}'", output.display()))?;
    formatter.format_unwrap_result(&summarize(&manifest, output))
}

fn summarize(manifest: &Manifest, output: &Path) -> UnwrapSummary {
    let xml_parts = manifest.entries.iter().filter(|e| e.is_xml()).count();
    UnwrapSummary {
        output: output.display().to_string(),
        kind: manifest.kind,
        xml_parts,
        binary_parts: manifest.entries.len() - xml_parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partkit_core::DocumentKind;
    use partkit_core::PartEntry;

    #[test]
    fn test_summarize_counts_part_kinds() {
        let mut manifest = Manifest::new(DocumentKind::Pptx);
        manifest.entries.push(PartEntry::xml("ppt/presentation.xml", "<p/>"));
        manifest.entries.push(PartEntry::bin("ppt/media/image1.png"));

        let summary = summarize(&manifest, Path::new("deck.json"));
        assert_eq!(summary.xml_parts, 1);
        assert_eq!(summary.binary_parts, 1);
        assert_eq!(summary.output, "deck.json");
    }
}
