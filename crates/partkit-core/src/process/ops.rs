//! Batch edit operations.

use serde::Deserialize;
use serde::Serialize;

/// One part-level edit in a batch.
///
/// # Examples
///
/// ```
/// use partkit_core::ProcessOperation;
///
/// let ops: Vec<ProcessOperation> = serde_json::from_str(
///     r#"[
///         {"type": "replaceText", "scope": "ppt/slides/", "find": "Hello", "replace": "Hi"},
///         {"type": "renamePart", "from": "a.xml", "to": "b.xml", "contentType": "application/xml"}
///     ]"#,
/// )
/// .unwrap();
/// assert_eq!(ops[0].name(), "replaceText");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ProcessOperation {
    /// Replaces every occurrence of `find` in XML parts.
    ReplaceText {
        /// Path prefix restricting which parts are searched.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
        /// Literal text, or a pattern when `regex` is set.
        find: String,
        /// Replacement; `$1` and `${name}` expand only in regex mode.
        replace: String,
        /// Treat `find` as a regular expression.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        regex: bool,
        /// Regex flags (`i`, `m`, `s`, `x`; `g` and `u` are ignored).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flags: Option<String>,
    },

    /// Creates or overwrites a part.
    UpsertPart {
        /// Target part path.
        path: String,
        /// Text payload, required for `.xml` paths.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Base64 payload, required for other paths.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        /// Content type to declare as an override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },

    /// Deletes a part and its override.
    RemovePart {
        /// Part to delete.
        path: String,
    },

    /// Moves a part to a new path.
    RenamePart {
        /// Current path.
        from: String,
        /// New path; an existing part there is overwritten.
        to: String,
        /// Content type to declare for `to`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_type: Option<String>,
    },
}

impl ProcessOperation {
    /// Returns the wire name of the operation type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReplaceText { .. } => "replaceText",
            Self::UpsertPart { .. } => "upsertPart",
            Self::RemovePart { .. } => "removePart",
            Self::RenamePart { .. } => "renamePart",
        }
    }

    /// Creates a literal `replaceText` over all XML parts.
    pub fn replace_text(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self::ReplaceText {
            scope: None,
            find: find.into(),
            replace: replace.into(),
            regex: false,
            flags: None,
        }
    }

    /// Creates an `upsertPart` carrying XML text.
    pub fn upsert_xml(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self::UpsertPart {
            path: path.into(),
            text: Some(text.into()),
            data: None,
            content_type: None,
        }
    }

    /// Creates a `removePart`.
    pub fn remove(path: impl Into<String>) -> Self {
        Self::RemovePart { path: path.into() }
    }

    /// Creates a `renamePart` without content-type changes.
    pub fn rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::RenamePart {
            from: from.into(),
            to: to.into(),
            content_type: None,
        }
    }
}
