//! OOXML package manifests, batched part edits, and XML rule validation.
//!
//! `partkit-core` turns `.pptx`, `.docx`, `.xlsx` and `.thmx` packages into
//! a JSON-friendly [`Manifest`] of parts and back, applies batches of
//! [`ProcessOperation`]s directly to archives, and validates parts against
//! declarative [`Rule`]s with weighted scoring and optional auto-fix.
//!
//! # Examples
//!
//! ```
//! use partkit_core::EngineConfig;
//! use partkit_core::rewrap_manifest;
//! use partkit_core::test_utils::minimal_pptx;
//! use partkit_core::unwrap_archive;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default();
//! let mut manifest = unwrap_archive(&minimal_pptx(), &config)?;
//! manifest.set_xml_text("ppt/slides/slide1.xml", "<p:sld/>".to_string());
//!
//! let archive = rewrap_manifest(&manifest, Some(&minimal_pptx()), &config)?;
//! let again = unwrap_archive(&archive, &config)?;
//! assert_eq!(again.xml_text("ppt/slides/slide1.xml"), Some("<p:sld/>"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod manifest;
pub mod pattern;
pub mod process;
pub mod rules;
pub mod session;

#[doc(hidden)]
pub mod test_utils;

// Re-export main API types
pub use api::ArchiveOutput;
pub use api::Engine;
pub use api::Payload;
pub use api::process_archive;
pub use config::EngineConfig;
pub use config::ValidateOptions;
pub use error::PartkitError;
pub use error::Result;
pub use manifest::DocumentKind;
pub use manifest::Manifest;
pub use manifest::PartEntry;
pub use manifest::rewrap_manifest;
pub use manifest::unwrap_archive;
pub use process::ProcessOperation;
pub use process::ProcessReport;
pub use rules::Rule;
pub use rules::RulesConfig;
pub use rules::ValidationResult;
pub use rules::Violation;
pub use rules::validate_manifest;
pub use session::ObjectRef;
pub use session::Session;
