//! JSON output formatter for machine-readable results.

use super::formatter::Destination;
use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use super::formatter::UnwrapSummary;
use anyhow::Result;
use partkit_core::ProcessReport;
use partkit_core::Session;
use partkit_core::ValidationResult;
use serde::Serialize;
use std::io::Write;
use std::io::{self};

pub struct JsonFormatter;

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Written<'a, T> {
    destination: String,
    #[serde(flatten)]
    data: &'a T,
}

#[derive(Serialize)]
struct MessageData {
    message: String,
}

impl OutputFormatter for JsonFormatter {
    fn format_unwrap_result(&self, summary: &UnwrapSummary) -> Result<()> {
        Self::output(&JsonOutput::success("unwrap", summary))
    }

    fn format_rewrap_result(&self, destination: &Destination, parts: usize) -> Result<()> {
        #[derive(Serialize)]
        struct RewrapOutput {
            destination: String,
            parts: usize,
        }

        let data = RewrapOutput {
            destination: destination.to_string(),
            parts,
        };
        Self::output(&JsonOutput::success("rewrap", data))
    }

    fn format_process_result(
        &self,
        destination: &Destination,
        report: &ProcessReport,
    ) -> Result<()> {
        let data = Written {
            destination: destination.to_string(),
            data: report,
        };
        Self::output(&JsonOutput::success("process", data))
    }

    fn format_validation_result(&self, result: &ValidationResult) -> Result<()> {
        Self::output(&JsonOutput::success("validate", result))
    }

    fn format_session(&self, session: &Session) -> Result<()> {
        Self::output(&JsonOutput::success("session", session))
    }

    fn format_success(&self, message: &str) {
        let output = JsonOutput::success(
            "message",
            MessageData {
                message: message.to_string(),
            },
        );
        let _ = Self::output(&output);
    }

    fn format_warning(&self, message: &str) {
        let output = JsonOutput::success(
            "warning",
            MessageData {
                message: message.to_string(),
            },
        );
        let _ = Self::output(&output);
    }
}
