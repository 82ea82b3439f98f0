//! Sequential application of a batch of part edits.

use crate::EngineConfig;
use crate::PartkitError;
use crate::Result;
use crate::manifest::CONTENT_TYPES_PATH;
use crate::manifest::ContentTypeIndex;
use crate::manifest::Manifest;
use crate::manifest::PartMap;
use crate::manifest::is_xml_path;
use crate::manifest::manifest_from_parts;
use crate::manifest::normalize_part_path;
use crate::manifest::overlay_manifest;
use crate::manifest::read_parts;
use crate::manifest::write_parts;
use crate::pattern::compile_regex;
use crate::process::ops::ProcessOperation;
use crate::process::report::ProcessReport;
use base64::prelude::*;
use regex::NoExpand;
use regex::Regex;
use std::borrow::Cow;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Applies operations to an in-memory parts map.
///
/// Each operation either takes effect completely or is recorded as an error
/// in the report; a failed operation never stops the batch and earlier
/// operations are not rolled back. Content-type edits are written into
/// `[Content_Types].xml` as they happen, so later operations observe them.
///
/// # Examples
///
/// ```
/// use partkit_core::EngineConfig;
/// use partkit_core::ProcessOperation;
/// use partkit_core::process::OperationExecutor;
/// use partkit_core::test_utils::minimal_pptx;
///
/// let mut executor = OperationExecutor::from_archive(&minimal_pptx()).unwrap();
/// executor.apply_all(&[
///     ProcessOperation::replace_text("Hello", "Goodbye"),
///     ProcessOperation::remove("ppt/slides/slide9.xml"),
/// ]);
///
/// let (archive, report) = executor.finish(&EngineConfig::default()).unwrap();
/// assert_eq!(report.replaced, 2);
/// assert_eq!(report.removed, 0);
/// assert!(!archive.is_empty());
/// ```
#[derive(Debug)]
pub struct OperationExecutor {
    parts: PartMap,
    report: ProcessReport,
    started: Instant,
    applied: usize,
}

impl OperationExecutor {
    /// Loads the executor from a parts map.
    #[must_use]
    pub fn from_parts(parts: PartMap) -> Self {
        Self {
            parts,
            report: ProcessReport::new(),
            started: Instant::now(),
            applied: 0,
        }
    }

    /// Loads the executor from archive bytes.
    ///
    /// # Errors
    ///
    /// Returns `BadArchive` if the bytes are not a valid zip stream.
    pub fn from_archive(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_parts(read_parts(bytes)?))
    }

    /// Loads the executor from a manifest overlaid on an optional base.
    ///
    /// # Errors
    ///
    /// Same conditions as [`overlay_manifest`], plus `BadArchive` for an
    /// unreadable base.
    pub fn from_manifest(manifest: &Manifest, base: Option<&[u8]>) -> Result<Self> {
        let mut parts = match base {
            Some(bytes) => read_parts(bytes)?,
            None => PartMap::new(),
        };
        overlay_manifest(&mut parts, manifest)?;
        Ok(Self::from_parts(parts))
    }

    /// Returns the current parts.
    #[must_use]
    pub const fn parts(&self) -> &PartMap {
        &self.parts
    }

    /// Returns the report accumulated so far.
    #[must_use]
    pub const fn report(&self) -> &ProcessReport {
        &self.report
    }

    /// Applies one operation, recording a failure in the report.
    ///
    /// Returns whether the operation succeeded.
    pub fn apply(&mut self, op: &ProcessOperation) -> bool {
        let index = self.applied;
        self.applied += 1;

        match self.try_apply(op) {
            Ok(()) => {
                debug!(index, op = op.name(), "applied operation");
                true
            }
            Err(e) => {
                warn!(index, op = op.name(), error = %e, "operation failed");
                self.report.add_error(op.name(), index, e.to_string());
                false
            }
        }
    }

    /// Applies operations in order.
    pub fn apply_all(&mut self, ops: &[ProcessOperation]) {
        for op in ops {
            self.apply(op);
        }
    }

    /// Serializes the parts into a deterministic archive.
    ///
    /// # Errors
    ///
    /// Returns writer errors from [`write_parts`].
    pub fn finish(self, config: &EngineConfig) -> Result<(Vec<u8>, ProcessReport)> {
        let (parts, report) = self.finalize();
        let bytes = write_parts(&parts, config)?;
        Ok((bytes, report))
    }

    /// Converts the parts into a manifest instead of an archive.
    #[must_use]
    pub fn into_manifest(self, include_binary: bool) -> (Manifest, ProcessReport) {
        let (parts, report) = self.finalize();
        (manifest_from_parts(&parts, include_binary), report)
    }

    fn finalize(mut self) -> (PartMap, ProcessReport) {
        self.report.duration = self.started.elapsed();
        info!(
            operations = self.applied,
            replaced = self.report.replaced,
            upserted = self.report.upserted,
            removed = self.report.removed,
            renamed = self.report.renamed,
            errors = self.report.errors.len(),
            "batch finished"
        );
        (self.parts, self.report)
    }

    fn try_apply(&mut self, op: &ProcessOperation) -> Result<()> {
        match op {
            ProcessOperation::ReplaceText {
                scope,
                find,
                replace,
                regex,
                flags,
            } => self.replace_text(
                scope.as_deref(),
                find,
                replace,
                *regex,
                flags.as_deref().unwrap_or(""),
            ),
            ProcessOperation::UpsertPart {
                path,
                text,
                data,
                content_type,
            } => self.upsert_part(
                path,
                text.as_deref(),
                data.as_deref(),
                content_type.as_deref(),
            ),
            ProcessOperation::RemovePart { path } => self.remove_part(path),
            ProcessOperation::RenamePart {
                from,
                to,
                content_type,
            } => self.rename_part(from, to, content_type.as_deref()),
        }
    }

    fn replace_text(
        &mut self,
        scope: Option<&str>,
        find: &str,
        replace: &str,
        is_regex: bool,
        flags: &str,
    ) -> Result<()> {
        if find.is_empty() {
            return Err(PartkitError::op_failed("find must not be empty"));
        }
        let pattern: Regex = if is_regex {
            compile_regex(find, flags).map_err(PartkitError::op_failed)?
        } else {
            compile_regex(&regex::escape(find), "").map_err(PartkitError::op_failed)?
        };
        let scope = scope.map(normalize_part_path).unwrap_or_default();

        let mut replaced = 0;
        for (path, data) in &mut self.parts {
            if !is_xml_path(path) || !path.starts_with(&scope) {
                continue;
            }
            let Ok(text) = std::str::from_utf8(data.as_slice()) else {
                continue;
            };
            let count = pattern.find_iter(text).count();
            if count == 0 {
                continue;
            }
            let rewritten = if is_regex {
                pattern.replace_all(text, replace)
            } else {
                pattern.replace_all(text, NoExpand(replace))
            };
            let changed = match rewritten {
                Cow::Owned(new_text) if new_text != text => Some(new_text),
                _ => None,
            };
            if let Some(new_text) = changed {
                *data = new_text.into_bytes();
            }
            debug!(path = path.as_str(), count, "replaced text");
            replaced += count;
        }

        self.report.replaced += replaced;
        Ok(())
    }

    fn upsert_part(
        &mut self,
        path: &str,
        text: Option<&str>,
        data: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<()> {
        let path = normalize_part_path(path);
        if path.is_empty() {
            return Err(PartkitError::op_failed("path must not be empty"));
        }

        let bytes = if is_xml_path(&path) {
            text.ok_or_else(|| PartkitError::op_failed(format!("text is required for {path}")))?
                .as_bytes()
                .to_vec()
        } else {
            let data = data
                .ok_or_else(|| PartkitError::op_failed(format!("data is required for {path}")))?;
            BASE64_STANDARD.decode(data).map_err(|e| {
                PartkitError::op_failed(format!("invalid base64 data for {path}: {e}"))
            })?
        };

        if let Some(content_type) = content_type {
            self.edit_content_types(|index| index.ensure_override(&path, content_type))?;
        }
        self.parts.insert(path, bytes);
        self.report.upserted += 1;
        Ok(())
    }

    fn remove_part(&mut self, path: &str) -> Result<()> {
        let path = normalize_part_path(path);
        if !self.parts.contains_key(&path) {
            return Ok(());
        }
        if path != CONTENT_TYPES_PATH {
            self.edit_content_types(|index| index.remove_override(&path))?;
        }
        self.parts.remove(&path);
        self.report.removed += 1;
        Ok(())
    }

    fn rename_part(&mut self, from: &str, to: &str, content_type: Option<&str>) -> Result<()> {
        let from = normalize_part_path(from);
        let to = normalize_part_path(to);
        if to.is_empty() {
            return Err(PartkitError::op_failed("rename target must not be empty"));
        }
        if !self.parts.contains_key(&from) {
            return Ok(());
        }

        if let Some(content_type) = content_type {
            self.edit_content_types(|index| {
                let removed = index.remove_override(&from)?;
                let added = index.ensure_override(&to, content_type)?;
                Ok(removed || added)
            })?;
        }
        if let Some(bytes) = self.parts.remove(&from) {
            self.parts.insert(to, bytes);
            self.report.renamed += 1;
        }
        Ok(())
    }

    /// Runs an edit against `[Content_Types].xml`, creating a minimal one if
    /// the package has none, and writes the text back when it changed.
    fn edit_content_types<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut ContentTypeIndex) -> Result<bool>,
    {
        let mut index = match self.parts.get(CONTENT_TYPES_PATH) {
            Some(bytes) => ContentTypeIndex::from_bytes(bytes)?,
            None => ContentTypeIndex::new_empty(),
        };
        if edit(&mut index)? {
            self.parts.insert(
                CONTENT_TYPES_PATH.to_string(),
                index.into_string().into_bytes(),
            );
        }
        Ok(())
    }
}
