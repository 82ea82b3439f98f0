//! Human-readable output formatter with colors and styling.

use super::formatter::Destination;
use super::formatter::OutputFormatter;
use super::formatter::UnwrapSummary;
use anyhow::Result;
use console::Term;
use console::style;
use partkit_core::ProcessReport;
use partkit_core::Session;
use partkit_core::ValidationResult;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
        }
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn headline(&self, text: &str) {
        if self.use_colors {
            self.line(&format!("{} {text}", style("✓").green().bold()));
        } else {
            self.line(text);
        }
    }

    fn format_number(n: usize) -> String {
        let s = n.to_string();
        let mut result = String::new();
        let mut count = 0;

        for c in s.chars().rev() {
            if count == 3 {
                result.push(',');
                count = 0;
            }
            result.push(c);
            count += 1;
        }

        result.chars().rev().collect()
    }

    fn score_label(&self, score: u8) -> String {
        let text = format!("{score}/100");
        if !self.use_colors {
            return text;
        }
        match score {
            100 => style(text).green().bold().to_string(),
            50..=99 => style(text).yellow().bold().to_string(),
            _ => style(text).red().bold().to_string(),
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_unwrap_result(&self, summary: &UnwrapSummary) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        self.headline(&format!("Manifest written: {}", summary.output));
        self.line(&format!("  Document kind: {}", summary.kind));
        self.line(&format!(
            "  XML parts:     {}",
            Self::format_number(summary.xml_parts)
        ));
        self.line(&format!(
            "  Binary parts:  {}",
            Self::format_number(summary.binary_parts)
        ));

        Ok(())
    }

    fn format_rewrap_result(&self, destination: &Destination, parts: usize) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        self.headline(&format!("Archive written: {destination}"));
        self.line(&format!("  Parts: {}", Self::format_number(parts)));

        Ok(())
    }

    fn format_process_result(
        &self,
        destination: &Destination,
        report: &ProcessReport,
    ) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        self.headline(&format!("Archive written: {destination}"));
        self.line(&format!(
            "  Replacements: {}",
            Self::format_number(report.replaced)
        ));
        self.line(&format!("  Upserted:     {}", report.upserted));
        self.line(&format!("  Removed:      {}", report.removed));
        self.line(&format!("  Renamed:      {}", report.renamed));

        if self.verbose {
            self.line(&format!("  Duration: {:?}", report.duration));
        }

        if report.has_errors() {
            self.line("");
            if self.use_colors {
                self.line(&format!("{}", style("Failed operations:").yellow().bold()));
            } else {
                self.line("Failed operations:");
            }
            for error in &report.errors {
                self.line(&format!("  - #{} {}: {}", error.index, error.op, error.message));
            }
        }

        Ok(())
    }

    fn format_validation_result(&self, result: &ValidationResult) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        self.line(&format!(
            "Profile '{}': score {}",
            result.profile,
            self.score_label(result.score)
        ));
        self.line(&format!("  Rules checked: {}", result.total_rules));
        self.line(&format!("  Violations:    {}", result.violations.len()));
        if result.auto_fixed > 0 {
            self.line(&format!("  Auto-fixed:    {}", result.auto_fixed));
        }
        if self.verbose {
            self.line(&format!("  Duration: {:?}", result.duration));
        }

        if result.violations.is_empty() {
            return Ok(());
        }

        self.line("");
        for violation in &result.violations {
            let marker = if violation.auto_fixed {
                if self.use_colors {
                    style("FIXED").green().to_string()
                } else {
                    "[FIXED]".to_string()
                }
            } else if self.use_colors {
                style("FAIL").red().bold().to_string()
            } else {
                "[FAIL]".to_string()
            };

            self.line(&format!(
                "  {marker} {} ({}): {}",
                violation.rule_id, violation.target, violation.message
            ));

            if self.verbose {
                self.line(&format!("      xpath:    {}", violation.xpath));
                self.line(&format!("      expected: {}", violation.expected));
                if let Some(actual) = &violation.actual {
                    self.line(&format!("      actual:   {actual}"));
                }
                if let Some(after) = &violation.after {
                    self.line(&format!("      after:    {after}"));
                }
            }
        }

        Ok(())
    }

    fn format_session(&self, session: &Session) -> Result<()> {
        // Handles are the whole point of the command, so quiet still prints them.
        self.line(&format!("Session:         {}", session.session_id));
        self.line(&format!("Input ref:       {}", session.input_ref));
        self.line(&format!("Output ref:      {}", session.output_ref));
        self.line(&format!("Upload handle:   {}", session.upload_handle));
        self.line(&format!("Download handle: {}", session.download_handle));

        Ok(())
    }

    fn format_success(&self, message: &str) {
        if self.quiet {
            return;
        }

        self.headline(message);
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            self.line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            self.line(&format!("WARNING: {message}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_small() {
        assert_eq!(HumanFormatter::format_number(0), "0");
        assert_eq!(HumanFormatter::format_number(42), "42");
        assert_eq!(HumanFormatter::format_number(999), "999");
    }

    #[test]
    fn test_format_number_thousands() {
        assert_eq!(HumanFormatter::format_number(1000), "1,000");
        assert_eq!(HumanFormatter::format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_score_label_without_colors() {
        let formatter = HumanFormatter {
            verbose: false,
            quiet: false,
            use_colors: false,
            term: Term::stdout(),
        };
        assert_eq!(formatter.score_label(100), "100/100");
        assert_eq!(formatter.score_label(0), "0/100");
    }
}
