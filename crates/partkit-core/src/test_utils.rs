//! Test utilities for building in-memory OOXML packages.
//!
//! These helpers create small but structurally valid packages so unit tests,
//! integration tests, doc tests, and benchmarks share the same fixtures.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Cursor;
use std::io::Write;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// `[Content_Types].xml` of [`minimal_pptx`].
pub const PPTX_CONTENT_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"png\" ContentType=\"image/png\"/>\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
<Override PartName=\"/ppt/slides/slide1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>\
<Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>\
</Types>";

/// Theme part with `accent1` set to `2277CC` and a Calibri major font.
pub const THEME_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<a:theme xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" name=\"Office Theme\">\
<a:themeElements>\
<a:clrScheme name=\"Office\">\
<a:dk1><a:sysClr val=\"windowText\" lastClr=\"000000\"/></a:dk1>\
<a:accent1><a:srgbClr val=\"2277CC\"/></a:accent1>\
<a:accent2><a:srgbClr val=\"ED7D31\"/></a:accent2>\
</a:clrScheme>\
<a:fontScheme name=\"Office\">\
<a:majorFont><a:latin typeface=\"Calibri Light\"/></a:majorFont>\
<a:minorFont><a:latin typeface=\"Calibri\"/></a:minorFont>\
</a:fontScheme>\
</a:themeElements>\
</a:theme>";

/// Slide part containing the text `Hello World` twice.
pub const SLIDE_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
<p:cSld><p:spTree>\
<p:sp><p:txBody><a:p><a:r><a:t>Hello World</a:t></a:r></a:p></p:txBody></p:sp>\
<p:sp><p:txBody><a:p><a:r><a:t>Hello World again</a:t></a:r></a:p></p:txBody></p:sp>\
</p:spTree></p:cSld>\
</p:sld>";

/// Presentation part.
pub const PRESENTATION_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<p:presentation xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
<p:sldIdLst><p:sldId id=\"256\"/></p:sldIdLst>\
<p:sldSz cx=\"12192000\" cy=\"6858000\"/>\
</p:presentation>";

const ROOT_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"ppt/presentation.xml\"/>\
</Relationships>";

/// Bytes of the image part in [`minimal_pptx`].
pub const IMAGE_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];

/// Creates an in-memory ZIP archive from a list of entries.
///
/// Each entry is a tuple of (path, content). Files are stored uncompressed
/// with mode 0o644.
///
/// # Examples
///
/// ```
/// use partkit_core::test_utils::create_test_zip;
///
/// let zip_data = create_test_zip(vec![("a.xml", b"<a/>"), ("media/b.bin", b"\x00")]);
/// assert!(!zip_data.is_empty());
/// ```
#[must_use]
pub fn create_test_zip(entries: Vec<(&str, &[u8])>) -> Vec<u8> {
    entries
        .into_iter()
        .fold(PackageBuilder::new(), |builder, (path, data)| {
            builder.bin(path, data)
        })
        .build()
}

/// Creates a small presentation package.
///
/// Contains content types, root relationships, a presentation part, one
/// slide, one theme, and one image.
#[must_use]
pub fn minimal_pptx() -> Vec<u8> {
    PackageBuilder::new()
        .xml("[Content_Types].xml", PPTX_CONTENT_TYPES)
        .xml("_rels/.rels", ROOT_RELS)
        .xml("ppt/presentation.xml", PRESENTATION_XML)
        .xml("ppt/slides/slide1.xml", SLIDE_XML)
        .xml("ppt/theme/theme1.xml", THEME_XML)
        .bin("ppt/media/image1.png", IMAGE_BYTES)
        .build()
}

/// Builder for ZIP test packages.
///
/// Entries are written in insertion order with a fixed timestamp, so the
/// builder does not sort or normalize anything. That makes it usable for
/// unsorted or oddly formed inputs.
///
/// # Examples
///
/// ```
/// use partkit_core::test_utils::PackageBuilder;
///
/// let zip_data = PackageBuilder::new()
///     .xml("word/document.xml", "<w:document/>")
///     .dir("word/media/")
///     .bin("word/media/image1.png", b"\x89PNG")
///     .build();
/// ```
pub struct PackageBuilder {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl PackageBuilder {
    /// Creates a new package builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(zip::DateTime::default())
                .unix_permissions(0o644),
        }
    }

    /// Adds an XML part.
    #[must_use]
    pub fn xml(self, path: &str, text: &str) -> Self {
        self.bin(path, text.as_bytes())
    }

    /// Adds a part with arbitrary bytes.
    #[must_use]
    pub fn bin(mut self, path: &str, data: &[u8]) -> Self {
        self.zip.start_file(path, self.options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a directory entry.
    #[must_use]
    pub fn dir(mut self, path: &str) -> Self {
        self.zip.add_directory(path, self.options).unwrap();
        self
    }

    /// Builds and returns the archive bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.zip.finish().unwrap().into_inner()
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
