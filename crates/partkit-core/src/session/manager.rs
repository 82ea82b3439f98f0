//! Sessions for payloads too large to send inline.

use crate::EngineConfig;
use crate::PartkitError;
use crate::Result;
use crate::session::handle::HandleMethod;
use crate::session::handle::HandleSigner;
use crate::session::store::ObjectStore;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use tracing::info;
use uuid::Uuid;

/// Which of a session's two objects a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectSlot {
    /// Uploaded by the caller, read by the engine.
    Input,
    /// Written by the engine, downloaded by the caller.
    Output,
}

impl ObjectSlot {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// Engine-side reference to a session object: `sessions/{id}/{input|output}`.
///
/// # Examples
///
/// ```
/// use partkit_core::session::ObjectRef;
///
/// let reference: ObjectRef = "sessions/0b6f1d2e-8f4a-4c1e-9a57-3c5d2b1e7f90/input".parse().unwrap();
/// assert_eq!(reference.to_string(), reference.key());
/// assert!("sessions/not-a-uuid/input".parse::<ObjectRef>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ObjectRef {
    session_id: Uuid,
    slot: ObjectSlot,
}

impl ObjectRef {
    /// Creates a reference to the input object of a session.
    #[must_use]
    pub const fn input(session_id: Uuid) -> Self {
        Self {
            session_id,
            slot: ObjectSlot::Input,
        }
    }

    /// Creates a reference to the output object of a session.
    #[must_use]
    pub const fn output(session_id: Uuid) -> Self {
        Self {
            session_id,
            slot: ObjectSlot::Output,
        }
    }

    /// Returns the owning session id.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Returns the referenced slot.
    #[must_use]
    pub const fn slot(&self) -> ObjectSlot {
        self.slot
    }

    /// Returns the object-store key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("sessions/{}/{}", self.session_id, self.slot.as_str())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for ObjectRef {
    type Err = PartkitError;

    fn from_str(s: &str) -> Result<Self> {
        let not_found = || PartkitError::SessionNotFound {
            reference: s.to_string(),
        };
        let mut segments = s.split('/');
        let (Some("sessions"), Some(id), Some(slot), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(not_found());
        };
        let session_id = Uuid::parse_str(id).map_err(|_| not_found())?;
        let slot = match slot {
            "input" => ObjectSlot::Input,
            "output" => ObjectSlot::Output,
            _ => return Err(not_found()),
        };
        Ok(Self { session_id, slot })
    }
}

impl From<ObjectRef> for String {
    fn from(reference: ObjectRef) -> Self {
        reference.key()
    }
}

impl TryFrom<String> for ObjectRef {
    type Error = PartkitError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A large-payload handoff.
///
/// The caller uploads to `upload_handle` (once, before it expires), passes
/// `input_ref` and `output_ref` to the engine, then downloads the result
/// from `download_handle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Random session identifier.
    pub session_id: Uuid,
    /// Where the engine reads the input.
    pub input_ref: ObjectRef,
    /// Where the engine writes the output.
    pub output_ref: ObjectRef,
    /// Single-use write handle for the input object.
    pub upload_handle: String,
    /// Read handle for the output object.
    pub download_handle: String,
}

/// Issues sessions and mediates access to their objects.
///
/// # Examples
///
/// ```
/// use partkit_core::EngineConfig;
/// use partkit_core::session::MemoryObjectStore;
/// use partkit_core::session::SessionStore;
///
/// let sessions = SessionStore::new(MemoryObjectStore::new(), &EngineConfig::default()).unwrap();
/// let session = sessions.new_session().unwrap();
///
/// // Uploader side
/// sessions.upload(&session.upload_handle, b"PK...".to_vec()).unwrap();
///
/// // Engine side
/// assert_eq!(sessions.read(&session.input_ref).unwrap(), b"PK...");
/// sessions.write(&session.output_ref, b"result".to_vec()).unwrap();
///
/// // Downloader side
/// assert_eq!(sessions.download(&session.download_handle).unwrap(), b"result");
/// ```
#[derive(Debug)]
pub struct SessionStore<S> {
    store: S,
    signer: HandleSigner,
    upload_ttl: Duration,
    download_ttl: Duration,
}

impl<S: ObjectStore> SessionStore<S> {
    /// Creates a session store over `store`.
    ///
    /// Without a configured secret a random one is drawn, so handles are only
    /// valid for this instance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn new(store: S, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let signer = match &config.session_secret {
            Some(secret) => HandleSigner::new(secret.clone(), config.service_url.clone())?,
            None => HandleSigner::random(config.service_url.clone()),
        };
        Ok(Self {
            store,
            signer,
            upload_ttl: config.upload_ttl,
            download_ttl: config.download_ttl,
        })
    }

    /// Returns the underlying object store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the handle signer.
    pub const fn signer(&self) -> &HandleSigner {
        &self.signer
    }

    /// Allocates a new session.
    pub fn new_session(&self) -> Result<Session> {
        let session_id = Uuid::new_v4();
        let input_ref = ObjectRef::input(session_id);
        let output_ref = ObjectRef::output(session_id);

        let upload_handle = self
            .signer
            .issue(HandleMethod::Put, &input_ref.key(), self.upload_ttl)?;
        let download_handle =
            self.signer
                .issue(HandleMethod::Get, &output_ref.key(), self.download_ttl)?;

        info!(%session_id, "created session");
        Ok(Session {
            session_id,
            input_ref,
            output_ref,
            upload_handle,
            download_handle,
        })
    }

    /// Uploads through a write handle.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` for a handle this store did not sign, and
    /// `SessionExpired` if it has expired or was already used.
    pub fn upload(&self, handle: &str, bytes: Vec<u8>) -> Result<()> {
        let handle = self.signer.verify(handle, HandleMethod::Put)?;
        let size = bytes.len();
        if !self.store.put_if_absent(&handle.key, bytes)? {
            return Err(PartkitError::SessionExpired {
                reason: format!("upload handle for {} was already used", handle.key),
            });
        }
        debug!(key = %handle.key, bytes = size, "upload");
        Ok(())
    }

    /// Downloads through a read handle.
    ///
    /// # Errors
    ///
    /// Same handle checks as [`SessionStore::upload`], plus `NotFound` if the
    /// object has not been written yet.
    pub fn download(&self, handle: &str) -> Result<Vec<u8>> {
        let handle = self.signer.verify(handle, HandleMethod::Get)?;
        self.store.get(&handle.key)
    }

    /// Reads a session object on behalf of the engine.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing was uploaded.
    pub fn read(&self, reference: &ObjectRef) -> Result<Vec<u8>> {
        let bytes = self.store.get(&reference.key())?;
        debug!(%reference, bytes = bytes.len(), "read session object");
        Ok(bytes)
    }

    /// Writes a session object on behalf of the engine.
    pub fn write(&self, reference: &ObjectRef, bytes: Vec<u8>) -> Result<()> {
        debug!(%reference, bytes = bytes.len(), "write session object");
        self.store.put(&reference.key(), bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::store::MemoryObjectStore;

    fn sessions() -> SessionStore<MemoryObjectStore> {
        SessionStore::new(MemoryObjectStore::new(), &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_new_session_shape() {
        let store = sessions();
        let session = store.new_session().unwrap();
        assert_eq!(session.session_id.get_version_num(), 4);
        assert_eq!(
            session.input_ref.key(),
            format!("sessions/{}/input", session.session_id)
        );
        assert!(session.upload_handle.contains("method=PUT"));
        assert!(session.download_handle.contains("method=GET"));

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["inputRef"], session.input_ref.key());
        assert!(json["uploadHandle"].is_string());
    }

    #[test]
    fn test_sessions_are_unique() {
        let store = sessions();
        let a = store.new_session().unwrap();
        let b = store.new_session().unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_upload_is_single_use() {
        let store = sessions();
        let session = store.new_session().unwrap();
        store.upload(&session.upload_handle, vec![1]).unwrap();
        let err = store.upload(&session.upload_handle, vec![2]).unwrap_err();
        assert!(matches!(err, PartkitError::SessionExpired { .. }));
        assert_eq!(store.read(&session.input_ref).unwrap(), [1]);
    }

    #[test]
    fn test_concurrent_uploads_accept_one() {
        let store = sessions();
        let session = store.new_session().unwrap();
        let results: Vec<Result<()>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8u8)
                .map(|i| {
                    let (store, handle) = (&store, &session.upload_handle);
                    scope.spawn(move || store.upload(handle, vec![i]))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, PartkitError::SessionExpired { .. }))
        );
        assert_eq!(store.read(&session.input_ref).unwrap().len(), 1);
    }

    #[test]
    fn test_handles_are_not_interchangeable() {
        let store = sessions();
        let session = store.new_session().unwrap();
        assert!(matches!(
            store.upload(&session.download_handle, vec![]).unwrap_err(),
            PartkitError::SessionNotFound { .. }
        ));
        assert!(store.download(&session.upload_handle).is_err());
    }

    #[test]
    fn test_handles_do_not_cross_stores() {
        let a = sessions();
        let b = sessions();
        let session = a.new_session().unwrap();
        assert!(matches!(
            b.upload(&session.upload_handle, vec![]).unwrap_err(),
            PartkitError::SessionNotFound { .. }
        ));
    }

    #[test]
    fn test_shared_secret_handles_cross_stores() {
        let config = EngineConfig::default().with_session_secret(b"shared".to_vec());
        let a = SessionStore::new(MemoryObjectStore::new(), &config).unwrap();
        let b = SessionStore::new(MemoryObjectStore::new(), &config).unwrap();
        let session = a.new_session().unwrap();
        b.upload(&session.upload_handle, vec![7]).unwrap();
        assert_eq!(b.read(&session.input_ref).unwrap(), [7]);
    }

    #[test]
    fn test_read_before_upload_is_not_found() {
        let store = sessions();
        let session = store.new_session().unwrap();
        assert!(matches!(
            store.read(&session.input_ref).unwrap_err(),
            PartkitError::NotFound { .. }
        ));
        assert!(matches!(
            store.download(&session.download_handle).unwrap_err(),
            PartkitError::NotFound { .. }
        ));
    }

    #[test]
    fn test_object_ref_parse_errors() {
        for bad in [
            "",
            "sessions",
            "sessions/x/input",
            "other/0b6f1d2e-8f4a-4c1e-9a57-3c5d2b1e7f90/input",
            "sessions/0b6f1d2e-8f4a-4c1e-9a57-3c5d2b1e7f90/scratch",
            "sessions/0b6f1d2e-8f4a-4c1e-9a57-3c5d2b1e7f90/input/extra",
        ] {
            let err = bad.parse::<ObjectRef>().unwrap_err();
            assert!(matches!(err, PartkitError::SessionNotFound { .. }), "{bad}");
        }
    }

    #[test]
    fn test_object_ref_serde() {
        let reference = ObjectRef::output(Uuid::new_v4());
        let json = serde_json::to_string(&reference).unwrap();
        let parsed: ObjectRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reference);
        assert_eq!(parsed.slot(), ObjectSlot::Output);
    }
}
