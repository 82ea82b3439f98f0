//! High-level entry points.
//!
//! The free functions work on inline bytes. [`Engine`] adds sessions, so
//! payloads can also be passed by [`ObjectRef`] and results written back to
//! the object store.

use crate::EngineConfig;
use crate::Result;
use crate::ValidateOptions;
use crate::manifest::Manifest;
use crate::manifest::rewrap_manifest;
use crate::manifest::unwrap_archive;
use crate::process::OperationExecutor;
use crate::process::ProcessOperation;
use crate::process::ProcessReport;
use crate::rules::RulesConfig;
use crate::rules::ValidationResult;
use crate::rules::validate_manifest;
use crate::session::MemoryObjectStore;
use crate::session::ObjectRef;
use crate::session::ObjectStore;
use crate::session::Session;
use crate::session::SessionStore;
use tracing::debug;
use tracing::warn;

/// Applies `ops` to the archive in `bytes` and rewrites it.
///
/// Failed operations are itemized in the report; the archive reflects every
/// operation that succeeded.
///
/// # Errors
///
/// Returns `BadArchive` if `bytes` is not a zip stream.
///
/// # Examples
///
/// ```
/// use partkit_core::EngineConfig;
/// use partkit_core::process::ProcessOperation;
/// use partkit_core::process_archive;
/// use partkit_core::test_utils::minimal_pptx;
///
/// let ops = vec![ProcessOperation::replace_text("Hello", "Goodbye")];
/// let (archive, report) = process_archive(&minimal_pptx(), &ops, &EngineConfig::default()).unwrap();
/// assert_eq!(report.replaced, 2);
/// assert!(!archive.is_empty());
/// ```
pub fn process_archive(
    bytes: &[u8],
    ops: &[ProcessOperation],
    config: &EngineConfig,
) -> Result<(Vec<u8>, ProcessReport)> {
    let mut executor = OperationExecutor::from_archive(bytes)?;
    executor.apply_all(ops);
    executor.finish(config)
}

/// Input bytes, either inline or by session reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Bytes carried with the call.
    Inline(Vec<u8>),
    /// Bytes previously uploaded to a session.
    Object(ObjectRef),
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Inline(bytes)
    }
}

impl From<ObjectRef> for Payload {
    fn from(reference: ObjectRef) -> Self {
        Self::Object(reference)
    }
}

/// Where an archive result went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutput {
    /// Returned to the caller.
    Inline(Vec<u8>),
    /// Written to the object store.
    Stored(ObjectRef),
}

impl ArchiveOutput {
    /// Returns the inline bytes, if any.
    #[must_use]
    pub fn as_inline(&self) -> Option<&[u8]> {
        match self {
            Self::Inline(bytes) => Some(bytes),
            Self::Stored(_) => None,
        }
    }
}

/// Package engine with session support.
///
/// # Examples
///
/// ```
/// use partkit_core::Engine;
/// use partkit_core::EngineConfig;
/// use partkit_core::Payload;
/// use partkit_core::test_utils::minimal_pptx;
///
/// let engine = Engine::in_memory(EngineConfig::default()).unwrap();
/// let session = engine.new_session().unwrap();
/// engine.sessions().upload(&session.upload_handle, minimal_pptx()).unwrap();
///
/// let manifest = engine.unwrap(Payload::Object(session.input_ref)).unwrap();
/// assert!(manifest.get("ppt/presentation.xml").is_some());
/// ```
#[derive(Debug)]
pub struct Engine<S> {
    config: EngineConfig,
    sessions: SessionStore<S>,
}

impl Engine<MemoryObjectStore> {
    /// Creates an engine over an in-memory object store.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` does not validate.
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Self::new(MemoryObjectStore::new(), config)
    }
}

impl<S: ObjectStore> Engine<S> {
    /// Creates an engine over `store`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` does not validate.
    pub fn new(store: S, config: EngineConfig) -> Result<Self> {
        let sessions = SessionStore::new(store, &config)?;
        Ok(Self { config, sessions })
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the session store.
    pub const fn sessions(&self) -> &SessionStore<S> {
        &self.sessions
    }

    /// Allocates a session for an upload and a download.
    pub fn new_session(&self) -> Result<Session> {
        self.sessions.new_session()
    }

    /// Converts an archive into a manifest.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an empty session object and `BadArchive` for
    /// bytes that are not a zip stream.
    pub fn unwrap(&self, input: Payload) -> Result<Manifest> {
        let bytes = self.load(input)?;
        unwrap_archive(&bytes, &self.config)
    }

    /// Builds an archive from `manifest`, optionally over a base archive.
    ///
    /// # Errors
    ///
    /// Returns `InvalidManifest` or `MissingPart` for an unusable manifest,
    /// and the errors of [`Engine::unwrap`] for the base.
    pub fn rewrap(
        &self,
        manifest: &Manifest,
        base: Option<Payload>,
        output: Option<&ObjectRef>,
    ) -> Result<ArchiveOutput> {
        let base = base.map(|b| self.load(b)).transpose()?;
        let bytes = rewrap_manifest(manifest, base.as_deref(), &self.config)?;
        self.store(bytes, output)
    }

    /// Applies a batch of operations to an archive.
    ///
    /// # Errors
    ///
    /// Same as [`process_archive`], plus session errors for the input and
    /// output references.
    pub fn process(
        &self,
        input: Payload,
        ops: &[ProcessOperation],
        output: Option<&ObjectRef>,
    ) -> Result<(ArchiveOutput, ProcessReport)> {
        let bytes = self.load(input)?;
        let (archive, report) = process_archive(&bytes, ops, &self.config)?;
        Ok((self.store(archive, output)?, report))
    }

    /// Validates a manifest, applying fixes in place.
    ///
    /// # Errors
    ///
    /// Returns `RuleParse` for a malformed rule set.
    pub fn validate(
        &self,
        manifest: &mut Manifest,
        rules: &RulesConfig,
        options: &ValidateOptions,
    ) -> Result<ValidationResult> {
        validate_manifest(manifest, rules, options)
    }

    fn load(&self, input: Payload) -> Result<Vec<u8>> {
        match input {
            Payload::Inline(bytes) => {
                let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
                if self.config.needs_session(len) {
                    warn!(bytes = len, "inline payload exceeds the inline limit");
                }
                Ok(bytes)
            }
            Payload::Object(reference) => self.sessions.read(&reference),
        }
    }

    fn store(&self, bytes: Vec<u8>, output: Option<&ObjectRef>) -> Result<ArchiveOutput> {
        match output {
            Some(reference) => {
                debug!(%reference, bytes = bytes.len(), "storing result");
                self.sessions.write(reference, bytes)?;
                Ok(ArchiveOutput::Stored(*reference))
            }
            None => Ok(ArchiveOutput::Inline(bytes)),
        }
    }
}
