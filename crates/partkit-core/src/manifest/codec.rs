//! Archive bytes to manifest and back.
//!
//! Reading collects every file entry into a path-sorted [`PartMap`]. Writing
//! is deterministic: entries in path order, fixed DOS epoch timestamps, fixed
//! permissions, and one compression setting for the whole archive.

use crate::EngineConfig;
use crate::PartkitError;
use crate::Result;
use crate::manifest::content_types::CONTENT_TYPES_PATH;
use crate::manifest::types::DocumentKind;
use crate::manifest::types::Manifest;
use crate::manifest::types::PartEntry;
use crate::manifest::types::is_xml_path;
use crate::manifest::types::normalize_part_path;
use base64::prelude::*;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use tracing::debug;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Package parts keyed by normalized path.
pub type PartMap = BTreeMap<String, Vec<u8>>;

/// Entries at or above this size are written with zip64 extensions.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Main-document content types, checked in this order.
const KIND_MARKERS: &[(DocumentKind, &[&str])] = &[
    (
        DocumentKind::Pptx,
        &[
            "presentationml.presentation.main+xml",
            "presentationml.slideshow.main+xml",
            "presentationml.template.main+xml",
            "ms-powerpoint.presentation.macroenabled.main+xml",
            "ms-powerpoint.slideshow.macroenabled.main+xml",
            "ms-powerpoint.template.macroenabled.main+xml",
        ],
    ),
    (
        DocumentKind::Docx,
        &[
            "wordprocessingml.document.main+xml",
            "wordprocessingml.template.main+xml",
            "ms-word.document.macroenabled.main+xml",
            "ms-word.template.macroenabledtemplate.main+xml",
        ],
    ),
    (
        DocumentKind::Xlsx,
        &[
            "spreadsheetml.sheet.main+xml",
            "spreadsheetml.template.main+xml",
            "ms-excel.sheet.macroenabled.main+xml",
            "ms-excel.template.macroenabled.main+xml",
        ],
    ),
    (
        DocumentKind::Thmx,
        &["application/vnd.openxmlformats-officedocument.theme+xml"],
    ),
];

/// Reads every file entry of a zip archive.
///
/// Directory entries are skipped and leading `/` is stripped from names.
///
/// # Errors
///
/// Returns `BadArchive` if the bytes are not a readable zip stream or an
/// entry cannot be decompressed.
pub fn read_parts(bytes: &[u8]) -> Result<PartMap> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PartkitError::BadArchive(e.to_string()))?;

    let mut parts = PartMap::new();
    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| PartkitError::BadArchive(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let path = normalize_part_path(file.name());
        if path.is_empty() {
            continue;
        }
        let capacity = usize::try_from(file.size()).unwrap_or(0);
        let mut data = Vec::with_capacity(capacity);
        file.read_to_end(&mut data)
            .map_err(|e| PartkitError::BadArchive(format!("{path}: {e}")))?;
        parts.insert(path, data);
    }

    debug!(parts = parts.len(), "read archive");
    Ok(parts)
}

/// Serializes parts into a deterministic zip archive.
///
/// Identical maps with identical configuration produce identical bytes.
///
/// # Errors
///
/// Returns `InvalidConfig` for a compression level above 9, or `Io` if the
/// zip writer fails.
pub fn write_parts(parts: &PartMap, config: &EngineConfig) -> Result<Vec<u8>> {
    if config.compression_level > 9 {
        return Err(PartkitError::InvalidConfig(format!(
            "compression level must be 0-9, got {}",
            config.compression_level
        )));
    }

    let base = if config.compression_level == 0 {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    } else {
        SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(i64::from(config.compression_level)))
    };
    let base = base
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (path, data) in parts {
        let size = u64::try_from(data.len()).unwrap_or(u64::MAX);
        let options = base.large_file(size >= ZIP64_THRESHOLD);
        zip.start_file(path.as_str(), options)
            .map_err(|e| std::io::Error::other(format!("failed to start entry {path}: {e}")))?;
        zip.write_all(data)?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| std::io::Error::other(format!("failed to finish archive: {e}")))?;
    Ok(cursor.into_inner())
}

/// Detects the document kind from the text of `[Content_Types].xml`.
///
/// # Examples
///
/// ```
/// use partkit_core::DocumentKind;
/// use partkit_core::manifest::detect_kind;
///
/// let types = r#"<Types><Override PartName="/word/document.xml"
///     ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;
/// assert_eq!(detect_kind(types), DocumentKind::Docx);
/// assert_eq!(detect_kind("<Types/>"), DocumentKind::Unknown);
/// ```
#[must_use]
pub fn detect_kind(content_types: &str) -> DocumentKind {
    let lowered = content_types.to_ascii_lowercase();
    KIND_MARKERS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| lowered.contains(m)))
        .map_or(DocumentKind::Unknown, |(kind, _)| *kind)
}

/// Detects the document kind of a parts map.
#[must_use]
pub fn detect_parts_kind(parts: &PartMap) -> DocumentKind {
    parts
        .get(CONTENT_TYPES_PATH)
        .map(|bytes| detect_kind(&String::from_utf8_lossy(bytes)))
        .unwrap_or_default()
}

/// Builds a path-sorted manifest from a parts map.
///
/// `.xml` parts that decode as UTF-8 become XML entries. Everything else is
/// a binary entry, with a base64 payload only when `include_binary` is set.
#[must_use]
pub fn manifest_from_parts(parts: &PartMap, include_binary: bool) -> Manifest {
    let mut manifest = Manifest::new(detect_parts_kind(parts));
    manifest.entries.reserve(parts.len());

    for (path, data) in parts {
        let entry = if is_xml_path(path) {
            match std::str::from_utf8(data) {
                Ok(text) => PartEntry::xml(path, text),
                Err(_) => {
                    debug!(path, "xml part is not valid UTF-8, emitting as binary");
                    bin_entry(path, data, include_binary)
                }
            }
        } else {
            bin_entry(path, data, include_binary)
        };
        manifest.entries.push(entry);
    }
    manifest
}

fn bin_entry(path: &str, data: &[u8], include_binary: bool) -> PartEntry {
    if include_binary {
        PartEntry::bin_with_data(path, BASE64_STANDARD.encode(data))
    } else {
        PartEntry::bin(path)
    }
}

/// Converts archive bytes into a manifest.
///
/// # Errors
///
/// Returns `BadArchive` if the bytes are not a valid zip stream.
///
/// # Examples
///
/// ```
/// use partkit_core::EngineConfig;
/// use partkit_core::manifest::unwrap_archive;
/// use partkit_core::test_utils::minimal_pptx;
///
/// let manifest = unwrap_archive(&minimal_pptx(), &EngineConfig::default()).unwrap();
/// assert_eq!(manifest.kind.as_str(), "pptx");
/// assert!(manifest.xml_text("ppt/presentation.xml").is_some());
/// ```
pub fn unwrap_archive(bytes: &[u8], config: &EngineConfig) -> Result<Manifest> {
    let parts = read_parts(bytes)?;
    let manifest = manifest_from_parts(&parts, config.include_binary);
    debug!(
        kind = %manifest.kind,
        entries = manifest.entries.len(),
        "unwrapped archive"
    );
    Ok(manifest)
}

/// Overlays manifest entries onto a parts map.
///
/// # Errors
///
/// Returns `InvalidManifest` for duplicate or empty paths and malformed
/// base64, and `MissingPart` for a binary entry without payload whose path
/// is not already in `parts`.
pub fn overlay_manifest(parts: &mut PartMap, manifest: &Manifest) -> Result<()> {
    manifest.check()?;
    for entry in &manifest.entries {
        match entry {
            PartEntry::Xml { path, text } => {
                parts.insert(path.clone(), text.as_bytes().to_vec());
            }
            PartEntry::Bin {
                path,
                data: Some(data),
            } => {
                let bytes = BASE64_STANDARD.decode(data).map_err(|e| {
                    PartkitError::InvalidManifest(format!("invalid base64 data for {path}: {e}"))
                })?;
                parts.insert(path.clone(), bytes);
            }
            PartEntry::Bin { path, data: None } => {
                if !parts.contains_key(path) {
                    return Err(PartkitError::MissingPart { path: path.clone() });
                }
            }
        }
    }
    Ok(())
}

/// Reconstitutes archive bytes from a manifest.
///
/// Parts of `base` that the manifest does not mention are carried over with
/// their content unchanged.
///
/// # Errors
///
/// Returns `BadArchive` for an unreadable base, `InvalidManifest` or
/// `MissingPart` from [`overlay_manifest`], and writer errors from
/// [`write_parts`].
pub fn rewrap_manifest(
    manifest: &Manifest,
    base: Option<&[u8]>,
    config: &EngineConfig,
) -> Result<Vec<u8>> {
    let mut parts = match base {
        Some(bytes) => read_parts(bytes)?,
        None => PartMap::new(),
    };
    overlay_manifest(&mut parts, manifest)?;
    let bytes = write_parts(&parts, config)?;
    debug!(parts = parts.len(), bytes = bytes.len(), "rewrapped manifest");
    Ok(bytes)
}
