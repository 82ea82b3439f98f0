//! Manifest wire types.

use crate::PartkitError;
use crate::Result;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;

/// Version tag written into every manifest.
pub const MANIFEST_VERSION: &str = "1";

/// Kind of office document a package holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// PowerPoint presentation.
    Pptx,
    /// Word document.
    Docx,
    /// Excel workbook.
    Xlsx,
    /// Office theme.
    Thmx,
    /// No recognised main-document content type.
    #[default]
    #[serde(other)]
    Unknown,
}

impl DocumentKind {
    /// Returns the lowercase wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pptx => "pptx",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Thmx => "thmx",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a package.
///
/// XML parts travel inline as text. Binary parts carry their payload as
/// base64 only when it was requested; otherwise rewrap takes the bytes from
/// the base archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PartEntry {
    /// A UTF-8 XML part.
    Xml {
        /// Package path without a leading `/`.
        path: String,
        /// Full document text.
        text: String,
    },
    /// Any other part.
    Bin {
        /// Package path without a leading `/`.
        path: String,
        /// Base64 payload, omitted to keep manifests lean.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
}

impl PartEntry {
    /// Creates an XML entry.
    pub fn xml(path: impl AsRef<str>, text: impl Into<String>) -> Self {
        Self::Xml {
            path: normalize_part_path(path.as_ref()),
            text: text.into(),
        }
    }

    /// Creates a binary entry without payload.
    pub fn bin(path: impl AsRef<str>) -> Self {
        Self::Bin {
            path: normalize_part_path(path.as_ref()),
            data: None,
        }
    }

    /// Creates a binary entry carrying a base64 payload.
    pub fn bin_with_data(path: impl AsRef<str>, data: impl Into<String>) -> Self {
        Self::Bin {
            path: normalize_part_path(path.as_ref()),
            data: Some(data.into()),
        }
    }

    /// Returns the package path of this entry.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Xml { path, .. } | Self::Bin { path, .. } => path,
        }
    }

    /// Returns the XML text, if this is an XML entry.
    #[must_use]
    pub fn xml_text(&self) -> Option<&str> {
        match self {
            Self::Xml { text, .. } => Some(text),
            Self::Bin { .. } => None,
        }
    }

    /// Returns `true` for XML entries.
    #[must_use]
    pub const fn is_xml(&self) -> bool {
        matches!(self, Self::Xml { .. })
    }

    fn path_mut(&mut self) -> &mut String {
        match self {
            Self::Xml { path, .. } | Self::Bin { path, .. } => path,
        }
    }
}

/// JSON representation of a package's parts.
///
/// # Examples
///
/// ```
/// use partkit_core::DocumentKind;
/// use partkit_core::Manifest;
/// use partkit_core::PartEntry;
///
/// let mut manifest = Manifest::new(DocumentKind::Pptx);
/// manifest.entries.push(PartEntry::xml("/ppt/presentation.xml", "<p:presentation/>"));
///
/// let json = manifest.to_json().unwrap();
/// let parsed = Manifest::from_json(&json).unwrap();
/// assert_eq!(parsed.xml_text("ppt/presentation.xml"), Some("<p:presentation/>"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest format tag.
    #[serde(default = "default_version")]
    pub version: String,

    /// Detected document kind.
    #[serde(default)]
    pub kind: DocumentKind,

    /// Package parts.
    pub entries: Vec<PartEntry>,
}

fn default_version() -> String {
    MANIFEST_VERSION.to_string()
}

impl Manifest {
    /// Creates an empty manifest of the given kind.
    #[must_use]
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            version: default_version(),
            kind,
            entries: Vec::new(),
        }
    }

    /// Parses a manifest from its JSON wire form.
    ///
    /// Leading `/` characters are stripped from entry paths.
    ///
    /// # Errors
    ///
    /// Returns `InvalidManifest` if the JSON is malformed, `entries` is
    /// missing or not an array, an XML entry lacks `text`, or paths are empty
    /// or duplicated.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(|e| PartkitError::InvalidManifest(e.to_string()))?;
        manifest.normalized()
    }

    /// Parses a manifest from an already decoded JSON value.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Manifest::from_json`].
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let manifest: Self = serde_json::from_value(value)
            .map_err(|e| PartkitError::InvalidManifest(e.to_string()))?;
        manifest.normalized()
    }

    /// Serializes the manifest to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the manifest to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn normalized(mut self) -> Result<Self> {
        for entry in &mut self.entries {
            let path = entry.path_mut();
            *path = normalize_part_path(path);
        }
        self.check()?;
        Ok(self)
    }

    /// Checks the manifest invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidManifest` if a path is empty, starts with `/`, or
    /// appears more than once.
    pub fn check(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        for entry in &self.entries {
            let path = entry.path();
            if path.is_empty() {
                return Err(PartkitError::InvalidManifest(
                    "entry path must not be empty".to_string(),
                ));
            }
            if path.starts_with('/') {
                return Err(PartkitError::InvalidManifest(format!(
                    "entry path must not start with '/': {path}"
                )));
            }
            if !seen.insert(path) {
                return Err(PartkitError::InvalidManifest(format!(
                    "duplicate entry path: {path}"
                )));
            }
        }
        Ok(())
    }

    /// Looks up an entry by path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&PartEntry> {
        let path = path.trim_start_matches('/');
        self.entries.iter().find(|e| e.path() == path)
    }

    /// Returns the text of an XML entry.
    #[must_use]
    pub fn xml_text(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(PartEntry::xml_text)
    }

    /// Replaces the text of an existing XML entry.
    ///
    /// Returns `false` if no XML entry exists at `path`.
    pub fn set_xml_text(&mut self, path: &str, new_text: String) -> bool {
        let path = path.trim_start_matches('/');
        for entry in &mut self.entries {
            if let PartEntry::Xml { path: p, text } = entry
                && p == path
            {
                *text = new_text;
                return true;
            }
        }
        false
    }

    /// Iterates over `(path, text)` of XML entries in manifest order.
    pub fn xml_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|e| match e {
            PartEntry::Xml { path, text } => Some((path.as_str(), text.as_str())),
            PartEntry::Bin { .. } => None,
        })
    }

    /// Sorts entries by path.
    pub fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| a.path().cmp(b.path()));
    }
}

/// Strips leading `/` characters from a part path.
///
/// # Examples
///
/// ```
/// use partkit_core::manifest::normalize_part_path;
///
/// assert_eq!(normalize_part_path("/ppt/slides/slide1.xml"), "ppt/slides/slide1.xml");
/// assert_eq!(normalize_part_path("word/document.xml"), "word/document.xml");
/// ```
#[must_use]
pub fn normalize_part_path(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

/// Returns `true` if a part path carries an XML extension.
#[must_use]
pub fn is_xml_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(b".xml")
}
