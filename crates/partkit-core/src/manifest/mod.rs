//! Package manifests: the JSON view of an OOXML package.
//!
//! - [`types`]: wire types ([`Manifest`], [`PartEntry`], [`DocumentKind`])
//! - [`codec`]: archive bytes to manifest and back
//! - [`content_types`]: `[Content_Types].xml` maintenance

pub mod codec;
pub mod content_types;
pub mod types;

pub use codec::PartMap;
pub use codec::detect_kind;
pub use codec::detect_parts_kind;
pub use codec::manifest_from_parts;
pub use codec::overlay_manifest;
pub use codec::read_parts;
pub use codec::rewrap_manifest;
pub use codec::unwrap_archive;
pub use codec::write_parts;
pub use content_types::CONTENT_TYPES_PATH;
pub use content_types::ContentTypeEntry;
pub use content_types::ContentTypeIndex;
pub use types::DocumentKind;
pub use types::MANIFEST_VERSION;
pub use types::Manifest;
pub use types::PartEntry;
pub use types::is_xml_path;
pub use types::normalize_part_path;
