//! Error conversion utilities for CLI.
//!
//! Converts partkit-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use partkit_core::PartkitError;
use std::path::Path;

/// Converts `PartkitError` to a user-friendly anyhow error with context.
pub fn convert_error(err: PartkitError, input: &Path) -> anyhow::Error {
    let input = input.display();
    match err {
        PartkitError::BadArchive(reason) => anyhow!(
            "Cannot read '{input}' as a package: {reason}\n\
             HINT: Expected a zip-based Office file (.pptx, .docx, .xlsx, .thmx)."
        ),
        PartkitError::InvalidManifest(reason) => anyhow!(
            "Invalid manifest '{input}': {reason}\n\
             HINT: Produce manifests with `partkit unwrap` and keep the `entries` array intact."
        ),
        PartkitError::MissingPart { path } => anyhow!(
            "Part '{path}' has no data in '{input}'\n\
             HINT: Pass --base with the original archive, or unwrap with --include-binary."
        ),
        PartkitError::RuleParse { .. } => anyhow!(
            "{err}\n\
             HINT: Each rule needs a unique id, `where`, `xpath` and exactly one expectation."
        ),
        PartkitError::SessionExpired { reason } => anyhow!(
            "Session handle cannot be used: {reason}\n\
             HINT: Run `partkit session new` for fresh handles."
        ),
        PartkitError::SessionNotFound { reference } => anyhow!(
            "Unknown session handle or reference '{reference}'\n\
             HINT: Handles are only valid with the --session-secret that issued them."
        ),
        PartkitError::NotFound { key } => anyhow!(
            "Nothing stored at '{key}'\n\
             HINT: Upload the input with `partkit session upload` first."
        ),
        PartkitError::InvalidConfig(reason) => anyhow!(
            "Invalid configuration: {reason}\n\
             HINT: --compression-level accepts 0 (stored) through 9."
        ),
        PartkitError::Io(io_err) => anyhow!("I/O error while processing '{input}': {io_err}"),
        PartkitError::Json(json_err) => anyhow!(
            "Malformed JSON in '{input}': {json_err}\n\
             HINT: Check the file against the documented schema."
        ),
        _ => anyhow::Error::from(err).context(format!("Error processing '{input}'")),
    }
}

/// Adds context to a core result about the file being processed.
pub fn add_input_context<T>(
    result: partkit_core::Result<T>,
    input: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_error(e, input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_bad_archive_error() {
        let err = PartkitError::BadArchive("invalid Zip archive".to_string());
        let converted = convert_error(err, Path::new("deck.pptx"));
        let msg = format!("{converted:?}");
        assert!(msg.contains("deck.pptx"));
        assert!(msg.contains("HINT"));
    }

    #[test]
    fn test_convert_missing_part_error() {
        let err = PartkitError::MissingPart {
            path: "ppt/media/image1.png".to_string(),
        };
        let converted = convert_error(err, Path::new("manifest.json"));
        let msg = format!("{converted:?}");
        assert!(msg.contains("ppt/media/image1.png"));
        assert!(msg.contains("--base"));
    }

    #[test]
    fn test_convert_rule_error_keeps_rule_id() {
        let err = PartkitError::RuleParse {
            rule_id: Some("accent1".to_string()),
            reason: "invalid hex color 'blue'".to_string(),
        };
        let msg = format!("{:?}", convert_error(err, Path::new("rules.json")));
        assert!(msg.contains("accent1"));
        assert!(msg.contains("HINT"));
    }

    #[test]
    fn test_other_errors_get_context() {
        let err = PartkitError::OperationFailed {
            reason: "text is required".to_string(),
        };
        let msg = format!("{:?}", convert_error(err, Path::new("ops.json")));
        assert!(msg.contains("ops.json"));
        assert!(msg.contains("text is required"));
    }
}
