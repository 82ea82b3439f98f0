//! Validate command implementation

use crate::cli::ValidateArgs;
use crate::commands;
use crate::error::add_input_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use anyhow::bail;
use partkit_core::Manifest;
use partkit_core::RulesConfig;
use partkit_core::ValidateOptions;
use partkit_core::validate_manifest;
use std::path::Path;

/// Maps command-line flags onto validation options.
///
/// Fixers only run when `--autofix` is given, so a plain validate never
/// rewrites anything.
fn options(args: &ValidateArgs) -> ValidateOptions {
    let options = ValidateOptions::default()
        .with_auto_fix(args.autofix)
        .with_fail_fast(args.fail_fast);
    match args.max_violations {
        Some(max) => options.with_max_violations(max),
        None => options,
    }
}

pub fn execute(args: &ValidateArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let manifest_text = commands::read_text(&args.manifest)?;
    let mut manifest = add_input_context(Manifest::from_json(&manifest_text), &args.manifest)?;
    let rules_text = commands::read_text(&args.rules)?;
    let rules = add_input_context(RulesConfig::from_json(&rules_text), &args.rules)?;

    let result = add_input_context(
        validate_manifest(&mut manifest, &rules, &options(args)),
        &args.rules,
    )?;

    if let Some(output) = &args.output {
        let json = add_input_context(manifest.to_json_pretty(), Path::new("manifest"))?;
        commands::write_output(output, json.as_bytes(), true)?;
        if result.auto_fixed > 0 {
            formatter.format_success(&format!(
                "Wrote {} fix(es) to {}",
                result.auto_fixed,
                output.display()
            ));
        }
    } else if result.auto_fixed > 0 {
        formatter.format_warning("Fixes were applied but not saved; pass -o FILE to keep them");
    }

    formatter.format_validation_result(&result)?;

    if let Some(min) = args.min_score
        && result.score < min
    {
        bail!(
            "Score {} is below the required minimum of {min}\n\
             HINT: Run with --verbose to see expected and actual values.",
            result.score
        );
    }

    Ok(())
}
