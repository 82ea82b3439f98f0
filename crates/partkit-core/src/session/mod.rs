//! Object-storage sessions for large payloads.
//!
//! A [`Session`] pairs an input and an output object with signed handles:
//! the caller uploads through the short-lived write handle, the engine reads
//! and writes by [`ObjectRef`], and the caller downloads through the read
//! handle. Whether a payload needs a session is the caller's call; see
//! [`EngineConfig::needs_session`](crate::EngineConfig::needs_session).

pub mod handle;
pub mod manager;
pub mod store;

pub use handle::HandleMethod;
pub use handle::HandleSigner;
pub use handle::SignedHandle;
pub use manager::ObjectRef;
pub use manager::ObjectSlot;
pub use manager::Session;
pub use manager::SessionStore;
pub use store::FsObjectStore;
pub use store::MemoryObjectStore;
pub use store::ObjectStore;
