//! Error types for package, batch, session, and validation operations.

use thiserror::Error;

/// Result type alias using `PartkitError`.
pub type Result<T> = std::result::Result<T, PartkitError>;

/// Errors that can occur while processing OOXML packages.
#[derive(Error, Debug)]
pub enum PartkitError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input bytes are not a readable zip stream.
    #[error("bad archive: {0}")]
    BadArchive(String),

    /// Manifest is missing entries or an entry is malformed.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// A part required by the call is absent.
    #[error("missing part: {path}")]
    MissingPart {
        /// Package path of the absent part.
        path: String,
    },

    /// A single batch operation could not be applied.
    #[error("operation failed: {reason}")]
    OperationFailed {
        /// Why the operation was rejected.
        reason: String,
    },

    /// A session handle is past its expiry or has already been consumed.
    #[error("session expired: {reason}")]
    SessionExpired {
        /// What made the handle unusable.
        reason: String,
    },

    /// A session handle or object reference does not belong to any session.
    #[error("session not found: {reference}")]
    SessionNotFound {
        /// The offending handle or reference.
        reference: String,
    },

    /// No object is stored under the given key.
    #[error("object not found: {key}")]
    NotFound {
        /// Object-store key that was looked up.
        key: String,
    },

    /// A selector uses syntax outside the supported subset.
    #[error("cannot evaluate '{selector}' against {path}: {reason}")]
    XPathEval {
        /// The selector as written in the rule.
        selector: String,
        /// Part path the selector was evaluated against.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// A rule definition is malformed.
    #[error("invalid rule{}: {reason}", rule_label(.rule_id.as_deref()))]
    RuleParse {
        /// Identifier of the rule, when it could be read.
        rule_id: Option<String>,
        /// What is wrong with the definition.
        reason: String,
    },

    /// No auto-fix transform exists for an expectation shape.
    #[error("auto-fix not supported for '{expectation}' expectations")]
    AutoFixUnsupported {
        /// The expectation key, e.g. `regex`.
        expectation: String,
    },

    /// Engine configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn rule_label(rule_id: Option<&str>) -> String {
    rule_id.map(|id| format!(" '{id}'")).unwrap_or_default()
}

impl PartkitError {
    /// Returns `true` if this error aborts the whole call.
    ///
    /// Structural failures leave no meaningful partial result: a bad archive,
    /// a malformed manifest, or a malformed rule set.
    ///
    /// # Examples
    ///
    /// ```
    /// use partkit_core::PartkitError;
    ///
    /// let err = PartkitError::BadArchive("truncated".to_string());
    /// assert!(err.is_structural());
    ///
    /// let err = PartkitError::OperationFailed {
    ///     reason: "text is required".to_string(),
    /// };
    /// assert!(!err.is_structural());
    /// ```
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::BadArchive(_) | Self::InvalidManifest(_) | Self::RuleParse { .. }
        )
    }

    /// Returns `true` if the failure is confined to one item of a batch.
    ///
    /// Recoverable errors are itemized into a report (operation errors,
    /// execution-failure violations, auto-fix diagnostics) while the rest of
    /// the batch continues.
    ///
    /// # Examples
    ///
    /// ```
    /// use partkit_core::PartkitError;
    ///
    /// let err = PartkitError::XPathEval {
    ///     selector: "//a[1]".to_string(),
    ///     path: "ppt/slides/slide1.xml".to_string(),
    ///     reason: "predicates are not supported".to_string(),
    /// };
    /// assert!(err.is_recoverable());
    ///
    /// let err = PartkitError::InvalidManifest("entries missing".to_string());
    /// assert!(!err.is_recoverable());
    /// ```
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::OperationFailed { .. }
                | Self::MissingPart { .. }
                | Self::XPathEval { .. }
                | Self::AutoFixUnsupported { .. }
        )
    }

    /// Returns a context string for this error, if available.
    ///
    /// # Examples
    ///
    /// ```
    /// use partkit_core::PartkitError;
    ///
    /// let err = PartkitError::BadArchive("bad header".to_string());
    /// assert_eq!(err.context(), Some("bad header"));
    ///
    /// let err = PartkitError::MissingPart {
    ///     path: "ppt/presentation.xml".to_string(),
    /// };
    /// assert_eq!(err.context(), None);
    /// ```
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::BadArchive(msg) | Self::InvalidManifest(msg) | Self::InvalidConfig(msg) => {
                Some(msg)
            }
            Self::OperationFailed { reason }
            | Self::SessionExpired { reason }
            | Self::RuleParse { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub(crate) fn op_failed(reason: impl Into<String>) -> Self {
        Self::OperationFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn rule_parse(rule_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::RuleParse {
            rule_id: rule_id.map(str::to_string),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PartkitError::BadArchive("not a zip".into());
        assert_eq!(err.to_string(), "bad archive: not a zip");
    }

    #[test]
    fn test_missing_part_error() {
        let err = PartkitError::MissingPart {
            path: "ppt/media/image1.png".into(),
        };
        assert!(err.to_string().contains("missing part"));
        assert!(err.to_string().contains("ppt/media/image1.png"));
    }

    #[test]
    fn test_rule_parse_display_with_and_without_id() {
        let err = PartkitError::rule_parse(Some("brand-accent"), "invalid hex 'zz'");
        assert_eq!(
            err.to_string(),
            "invalid rule 'brand-accent': invalid hex 'zz'"
        );

        let err = PartkitError::rule_parse(None, "rules must be an array");
        assert_eq!(err.to_string(), "invalid rule: rules must be an array");
    }

    #[test]
    fn test_xpath_error_carries_selector_and_path() {
        let err = PartkitError::XPathEval {
            selector: "//a:t[1]".into(),
            path: "ppt/slides/slide1.xml".into(),
            reason: "predicates are not supported".into(),
        };
        let display = err.to_string();
        assert!(display.contains("//a:t[1]"));
        assert!(display.contains("ppt/slides/slide1.xml"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PartkitError = io_err.into();
        assert!(matches!(err, PartkitError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: PartkitError = json_err.into();
        assert!(matches!(err, PartkitError::Json(_)));
    }

    #[test]
    fn test_is_structural() {
        assert!(PartkitError::BadArchive("x".into()).is_structural());
        assert!(PartkitError::InvalidManifest("x".into()).is_structural());
        assert!(PartkitError::rule_parse(None, "x").is_structural());

        assert!(!PartkitError::op_failed("x").is_structural());
        assert!(
            !PartkitError::NotFound {
                key: "sessions/x/input".into()
            }
            .is_structural()
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(PartkitError::op_failed("x").is_recoverable());
        assert!(
            PartkitError::AutoFixUnsupported {
                expectation: "regex".into()
            }
            .is_recoverable()
        );

        assert!(!PartkitError::BadArchive("x".into()).is_recoverable());
        assert!(
            !PartkitError::SessionExpired {
                reason: "expired".into()
            }
            .is_recoverable()
        );
    }

    #[test]
    fn test_context() {
        let err = PartkitError::InvalidManifest("entries must be an array".into());
        assert_eq!(err.context(), Some("entries must be an array"));

        let err = PartkitError::op_failed("text is required");
        assert_eq!(err.context(), Some("text is required"));

        let err = PartkitError::NotFound { key: "k".into() };
        assert_eq!(err.context(), None);
    }
}
