//! `[Content_Types].xml` maintenance.
//!
//! The document is parsed with quick-xml to locate `Default` and `Override`
//! elements by byte offset. Edits splice text at those offsets, so everything
//! the edit does not touch keeps its original bytes. Inserting an override and
//! removing it again restores the file exactly.

use crate::PartkitError;
use crate::Result;
use crate::manifest::types::normalize_part_path;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::escape::unescape;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use std::ops::Range;

/// Package path of the content-types part.
pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";

/// Namespace of the `Types` root element.
pub const CONTENT_TYPES_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";

const RELATIONSHIPS_CONTENT_TYPE: &str = "application/vnd.openxmlformats-package.relationships+xml";

/// A `Default` (by extension) or `Override` (by part name) declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeEntry {
    /// Extension for defaults, part path without leading `/` for overrides.
    pub key: String,
    /// Declared MIME type.
    pub content_type: String,
}

#[derive(Debug)]
struct Located {
    entry: ContentTypeEntry,
    span: Range<usize>,
}

#[derive(Debug, Default)]
struct Scan {
    defaults: Vec<Located>,
    overrides: Vec<Located>,
    /// Offset of `</Types>`.
    root_close: Option<usize>,
    /// Span of a self-closing `<Types .../>`.
    root_empty: Option<Range<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Default,
    Override,
}

/// Editable view over the text of `[Content_Types].xml`.
///
/// # Examples
///
/// ```
/// use partkit_core::manifest::ContentTypeIndex;
///
/// let mut index = ContentTypeIndex::new_empty();
/// assert!(index.ensure_override("/ppt/slides/slide2.xml", "application/x-slide").unwrap());
/// // Second call is a no-op
/// assert!(!index.ensure_override("ppt/slides/slide2.xml", "application/x-slide").unwrap());
///
/// assert_eq!(
///     index.content_type_of("ppt/slides/slide2.xml").unwrap().as_deref(),
///     Some("application/x-slide")
/// );
/// assert!(index.remove_override("ppt/slides/slide2.xml").unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeIndex {
    xml: String,
    dirty: bool,
}

impl ContentTypeIndex {
    /// Parses the text of an existing `[Content_Types].xml`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidManifest` if the text is not well-formed or its root
    /// element is not `Types`.
    pub fn parse(xml: impl Into<String>) -> Result<Self> {
        let index = Self {
            xml: xml.into(),
            dirty: false,
        };
        index.scan()?;
        Ok(index)
    }

    /// Parses raw part bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidManifest` if the bytes are not UTF-8 or not a valid
    /// content-types document.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            PartkitError::InvalidManifest(format!("{CONTENT_TYPES_PATH} is not UTF-8: {e}"))
        })?;
        Self::parse(text)
    }

    /// Creates a minimal document declaring only the `rels` and `xml`
    /// defaults.
    #[must_use]
    pub fn new_empty() -> Self {
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
             <Types xmlns=\"{CONTENT_TYPES_NAMESPACE}\">\
             <Default Extension=\"rels\" ContentType=\"{RELATIONSHIPS_CONTENT_TYPE}\"/>\
             <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
             </Types>"
        );
        Self { xml, dirty: true }
    }

    /// Returns the current document text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Consumes the index and returns the document text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.xml
    }

    /// Returns `true` if the text differs from what was parsed.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Lists `Override` declarations in document order.
    pub fn overrides(&self) -> Result<Vec<ContentTypeEntry>> {
        Ok(self.scan()?.overrides.into_iter().map(|l| l.entry).collect())
    }

    /// Lists `Default` declarations in document order.
    pub fn defaults(&self) -> Result<Vec<ContentTypeEntry>> {
        Ok(self.scan()?.defaults.into_iter().map(|l| l.entry).collect())
    }

    /// Resolves the content type of a part: its override if present,
    /// otherwise the default for its extension.
    pub fn content_type_of(&self, path: &str) -> Result<Option<String>> {
        let path = normalize_part_path(path);
        let scan = self.scan()?;
        if let Some(found) = scan.overrides.iter().find(|l| l.entry.key == path) {
            return Ok(Some(found.entry.content_type.clone()));
        }
        let Some((_, ext)) = path.rsplit_once('.') else {
            return Ok(None);
        };
        Ok(scan
            .defaults
            .into_iter()
            .find(|l| l.entry.key.eq_ignore_ascii_case(ext))
            .map(|l| l.entry.content_type))
    }

    /// Declares `content_type` for `path` unless an override already exists.
    ///
    /// The new element goes immediately before `</Types>`. Returns whether
    /// the document changed.
    pub fn ensure_override(&mut self, path: &str, content_type: &str) -> Result<bool> {
        let path = normalize_part_path(path);
        let scan = self.scan()?;
        if scan.overrides.iter().any(|l| l.entry.key == path) {
            return Ok(false);
        }

        let element = format!(
            "<Override PartName=\"/{}\" ContentType=\"{}\"/>",
            escape(path.as_str()),
            escape(content_type)
        );

        if let Some(at) = scan.root_close {
            self.xml.insert_str(at, &element);
        } else if let Some(span) = scan.root_empty {
            let open = self.xml[span.start..span.end]
                .trim_end_matches('>')
                .trim_end_matches('/')
                .trim_end()
                .to_string();
            self.xml
                .replace_range(span, &format!("{open}>{element}</Types>"));
        } else {
            return Err(PartkitError::InvalidManifest(format!(
                "{CONTENT_TYPES_PATH} has no Types root element"
            )));
        }
        self.dirty = true;
        Ok(true)
    }

    /// Removes every override declared for `path`.
    ///
    /// Returns whether anything was removed.
    pub fn remove_override(&mut self, path: &str) -> Result<bool> {
        let path = normalize_part_path(path);
        let scan = self.scan()?;
        let spans: Vec<Range<usize>> = scan
            .overrides
            .into_iter()
            .filter(|l| l.entry.key == path)
            .map(|l| l.span)
            .collect();
        if spans.is_empty() {
            return Ok(false);
        }
        // Back to front so earlier offsets stay valid
        for span in spans.into_iter().rev() {
            self.xml.replace_range(span, "");
        }
        self.dirty = true;
        Ok(true)
    }

    fn scan(&self) -> Result<Scan> {
        let (body, base) = strip_bom(&self.xml);
        let mut reader = Reader::from_str(body);
        let mut scan = Scan::default();
        let mut depth = 0usize;
        let mut pending: Option<(ItemKind, ContentTypeEntry, usize)> = None;

        loop {
            let start = base + offset(reader.buffer_position());
            let event = reader.read_event().map_err(|e| {
                PartkitError::InvalidManifest(format!("{CONTENT_TYPES_PATH}: {e}"))
            })?;
            let end = base + offset(reader.buffer_position());

            match event {
                Event::Start(e) => {
                    if depth == 0 {
                        check_root(&e)?;
                    } else if depth == 1
                        && let Some((kind, entry)) = read_item(&e)?
                    {
                        pending = Some((kind, entry, start));
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 0 {
                        check_root(&e)?;
                        scan.root_empty = Some(start..end);
                    } else if depth == 1
                        && let Some((kind, entry)) = read_item(&e)?
                    {
                        scan.push(kind, entry, start..end);
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 1 {
                        if let Some((kind, entry, item_start)) = pending.take() {
                            scan.push(kind, entry, item_start..end);
                        }
                    } else if depth == 0 {
                        scan.root_close = Some(start);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if scan.root_close.is_none() && scan.root_empty.is_none() {
            return Err(PartkitError::InvalidManifest(format!(
                "{CONTENT_TYPES_PATH} has no Types root element"
            )));
        }
        Ok(scan)
    }
}

impl Scan {
    fn push(&mut self, kind: ItemKind, entry: ContentTypeEntry, span: Range<usize>) {
        let located = Located { entry, span };
        match kind {
            ItemKind::Default => self.defaults.push(located),
            ItemKind::Override => self.overrides.push(located),
        }
    }
}

/// Splits a leading UTF-8 byte-order mark off `text`.
///
/// Returns the remaining text and the byte length of the mark, which callers
/// add to reader positions so spans still index the full text.
pub(crate) fn strip_bom(text: &str) -> (&str, usize) {
    text.strip_prefix('\u{FEFF}')
        .map_or((text, 0), |rest| (rest, '\u{FEFF}'.len_utf8()))
}

pub(crate) fn offset<T: TryInto<usize>>(position: T) -> usize {
    position.try_into().unwrap_or(usize::MAX)
}

fn check_root(e: &BytesStart<'_>) -> Result<()> {
    if e.local_name().as_ref() == b"Types" {
        Ok(())
    } else {
        Err(PartkitError::InvalidManifest(format!(
            "{CONTENT_TYPES_PATH} root element must be Types, found {}",
            String::from_utf8_lossy(e.name().as_ref())
        )))
    }
}

fn read_item(e: &BytesStart<'_>) -> Result<Option<(ItemKind, ContentTypeEntry)>> {
    let (kind, key_attr): (ItemKind, &[u8]) = match e.local_name().as_ref() {
        b"Default" => (ItemKind::Default, b"Extension"),
        b"Override" => (ItemKind::Override, b"PartName"),
        _ => return Ok(None),
    };

    let mut key = None;
    let mut content_type = None;
    for attr in e.attributes() {
        let attr = attr
            .map_err(|err| PartkitError::InvalidManifest(format!("{CONTENT_TYPES_PATH}: {err}")))?;
        let raw = std::str::from_utf8(&attr.value)
            .map_err(|err| PartkitError::InvalidManifest(format!("{CONTENT_TYPES_PATH}: {err}")))?;
        let value = unescape(raw)
            .map_err(|err| PartkitError::InvalidManifest(format!("{CONTENT_TYPES_PATH}: {err}")))?;
        let name = attr.key.local_name();
        if name.as_ref() == key_attr {
            key = Some(value.into_owned());
        } else if name.as_ref() == b"ContentType" {
            content_type = Some(value.into_owned());
        }
    }

    Ok(match (key, content_type) {
        (Some(key), Some(content_type)) => {
            let key = match kind {
                ItemKind::Override => normalize_part_path(&key),
                ItemKind::Default => key,
            };
            Some((kind, ContentTypeEntry { key, content_type }))
        }
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PPTX_TYPES: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n\
        <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
        <Default Extension=\"png\" ContentType=\"image/png\"/>\
        <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
        <Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
        <Override PartName=\"/ppt/slides/slide1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>\
        </Types>";

    #[test]
    fn test_parse_lists_entries() {
        let index = ContentTypeIndex::parse(PPTX_TYPES).unwrap();
        let overrides = index.overrides().unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0].key, "ppt/presentation.xml");
        assert_eq!(index.defaults().unwrap().len(), 2);
        assert!(!index.is_dirty());
    }

    #[test]
    fn test_parse_rejects_wrong_root() {
        let err = ContentTypeIndex::parse("<Relationships/>").unwrap_err();
        assert!(err.to_string().contains("Types"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ContentTypeIndex::parse("<Types><Override></Types>").is_err());
    }

    #[test]
    fn test_parse_skips_byte_order_mark() {
        let with_bom = format!("\u{FEFF}{PPTX_TYPES}");
        let mut index = ContentTypeIndex::from_bytes(with_bom.as_bytes()).unwrap();
        assert_eq!(index.overrides().unwrap().len(), 2);
        assert_eq!(
            index.content_type_of("ppt/slides/slide1.xml").unwrap().as_deref(),
            Some("application/vnd.openxmlformats-officedocument.presentationml.slide+xml")
        );

        index.ensure_override("ppt/slides/slide2.xml", "application/x-slide").unwrap();
        assert!(index.as_str().starts_with('\u{FEFF}'));
        assert!(index.as_str().ends_with(
            "<Override PartName=\"/ppt/slides/slide2.xml\" ContentType=\"application/x-slide\"/></Types>"
        ));
        assert!(index.remove_override("ppt/slides/slide1.xml").unwrap());
        assert!(!index.as_str().contains("slide1.xml"));
        assert_eq!(index.overrides().unwrap().len(), 2);
    }

    #[test]
    fn test_ensure_override_inserts_before_closing_tag() {
        let mut index = ContentTypeIndex::parse(PPTX_TYPES).unwrap();
        assert!(
            index
                .ensure_override("ppt/slides/slide2.xml", "application/x-slide")
                .unwrap()
        );
        assert!(index.as_str().ends_with(
            "<Override PartName=\"/ppt/slides/slide2.xml\" ContentType=\"application/x-slide\"/></Types>"
        ));
        assert!(index.is_dirty());
    }

    #[test]
    fn test_ensure_override_is_idempotent() {
        let mut index = ContentTypeIndex::parse(PPTX_TYPES).unwrap();
        assert!(
            !index
                .ensure_override("/ppt/slides/slide1.xml", "something/else")
                .unwrap()
        );
        assert_eq!(index.as_str(), PPTX_TYPES);
        assert!(!index.is_dirty());
    }

    #[test]
    fn test_ensure_then_remove_restores_bytes() {
        let mut index = ContentTypeIndex::parse(PPTX_TYPES).unwrap();
        index
            .ensure_override("ppt/media/chart.xml", "application/x-chart")
            .unwrap();
        assert!(index.remove_override("/ppt/media/chart.xml").unwrap());
        assert_eq!(index.as_str(), PPTX_TYPES);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut index = ContentTypeIndex::parse(PPTX_TYPES).unwrap();
        assert!(!index.remove_override("ppt/slides/slide9.xml").unwrap());
        assert_eq!(index.as_str(), PPTX_TYPES);
    }

    #[test]
    fn test_remove_handles_open_close_form() {
        let xml = "<Types xmlns=\"x\"><Override PartName=\"/a.xml\" ContentType=\"t\"></Override><Default Extension=\"xml\" ContentType=\"application/xml\"/></Types>";
        let mut index = ContentTypeIndex::parse(xml).unwrap();
        assert!(index.remove_override("a.xml").unwrap());
        assert_eq!(
            index.as_str(),
            "<Types xmlns=\"x\"><Default Extension=\"xml\" ContentType=\"application/xml\"/></Types>"
        );
    }

    #[test]
    fn test_ensure_on_self_closing_root() {
        let mut index = ContentTypeIndex::parse("<Types xmlns=\"x\"/>").unwrap();
        index.ensure_override("a.xml", "t").unwrap();
        assert_eq!(
            index.as_str(),
            "<Types xmlns=\"x\"><Override PartName=\"/a.xml\" ContentType=\"t\"/></Types>"
        );
        assert_eq!(index.overrides().unwrap().len(), 1);
    }

    #[test]
    fn test_content_type_of_prefers_override() {
        let index = ContentTypeIndex::parse(PPTX_TYPES).unwrap();
        assert_eq!(
            index.content_type_of("ppt/slides/slide1.xml").unwrap().as_deref(),
            Some("application/vnd.openxmlformats-officedocument.presentationml.slide+xml")
        );
        assert_eq!(
            index.content_type_of("ppt/media/image1.PNG").unwrap().as_deref(),
            Some("image/png")
        );
        assert_eq!(index.content_type_of("ppt/media/movie.mp4").unwrap(), None);
    }

    #[test]
    fn test_escapes_attribute_values() {
        let mut index = ContentTypeIndex::new_empty();
        index.ensure_override("a&b.xml", "x\"y").unwrap();
        assert!(index.as_str().contains("PartName=\"/a&amp;b.xml\""));
        let overrides = index.overrides().unwrap();
        assert_eq!(overrides[0].key, "a&b.xml");
        assert_eq!(overrides[0].content_type, "x\"y");
    }

    #[test]
    fn test_new_empty_is_valid() {
        let index = ContentTypeIndex::new_empty();
        assert!(index.overrides().unwrap().is_empty());
        assert_eq!(index.defaults().unwrap().len(), 2);
    }
}
