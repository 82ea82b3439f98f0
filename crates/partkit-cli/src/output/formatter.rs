//! Output formatter trait for CLI results.

use anyhow::Result;
use partkit_core::DocumentKind;
use partkit_core::ObjectRef;
use partkit_core::ProcessReport;
use partkit_core::Session;
use partkit_core::ValidationResult;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where a command put the archive it produced.
#[derive(Debug, Clone)]
pub enum Destination {
    File(PathBuf),
    Object(ObjectRef),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Object(reference) => write!(f, "{reference}"),
        }
    }
}

/// Summary of an unwrap written to a file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnwrapSummary {
    pub output: String,
    pub kind: DocumentKind,
    pub xml_parts: usize,
    pub binary_parts: usize,
}

/// Common output formatter trait
pub trait OutputFormatter {
    /// Format unwrap summary
    fn format_unwrap_result(&self, summary: &UnwrapSummary) -> Result<()>;

    /// Format rewrap result
    fn format_rewrap_result(&self, destination: &Destination, parts: usize) -> Result<()>;

    /// Format batch processing result
    fn format_process_result(&self, destination: &Destination, report: &ProcessReport)
    -> Result<()>;

    /// Format validation result
    fn format_validation_result(&self, result: &ValidationResult) -> Result<()>;

    /// Format newly allocated session
    fn format_session(&self, session: &Session) -> Result<()>;

    /// Format success message
    fn format_success(&self, message: &str);

    /// Format warning message
    fn format_warning(&self, message: &str);
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Success,
            data: Some(data),
            error: None,
        }
    }
}
