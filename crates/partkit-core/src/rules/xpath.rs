//! A small XPath subset over an arena DOM.
//!
//! Supported selectors are location paths of name tests:
//!
//! ```text
//! /p:sld/p:cSld//a:t/text()
//! //a:accent1/a:srgbClr/@val
//! a:theme/*/a:fontScheme
//! ```
//!
//! Steps match elements by local name, so `a:srgbClr`, `x:srgbClr` and
//! `srgbClr` are the same test. A selector may end in `@attr` or `text()`.
//! Predicates, functions, axes, `.`/`..` and unions are rejected.
//!
//! The parsed document keeps byte offsets into the source text for every
//! start tag, attribute value and element body, which is what lets the fixer
//! rewrite a single value without reserializing the part.

use crate::PartkitError;
use crate::Result;
use crate::manifest::content_types::offset;
use crate::manifest::content_types::strip_bom;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use std::collections::BTreeSet;
use std::ops::Range;

const DOCUMENT: usize = 0;

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// Index of a child element.
    Element(usize),
    /// Decoded character data; adjacent text, entities and CDATA are merged.
    Text(String),
}

/// An attribute with the location of its raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeNode {
    /// Local name, without prefix.
    pub local_name: String,
    /// Decoded value.
    pub value: String,
    /// Byte range of the raw value, between the quotes.
    pub value_span: Range<usize>,
}

/// An element in the arena.
#[derive(Debug, Clone)]
pub struct ElementNode {
    /// Qualified name as written.
    pub qname: String,
    /// Local name, without prefix.
    pub local_name: String,
    /// Parent element, `None` for the document node.
    pub parent: Option<usize>,
    /// Children in document order.
    pub children: Vec<Child>,
    /// Attributes in document order, namespace declarations excluded.
    pub attributes: Vec<AttributeNode>,
    /// Byte range of the start tag, or of the whole self-closing tag.
    pub start_tag: Range<usize>,
    /// Byte range between the start and end tags; `None` when self-closing.
    pub content: Option<Range<usize>>,
}

impl ElementNode {
    fn document(len: usize) -> Self {
        Self {
            qname: String::new(),
            local_name: String::new(),
            parent: None,
            children: Vec::new(),
            attributes: Vec::new(),
            start_tag: 0..0,
            content: Some(0..len),
        }
    }

    /// Returns the attribute index with the given local name.
    #[must_use]
    pub fn attribute(&self, local_name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|a| a.local_name == local_name)
    }

    /// Returns `true` if any child is an element.
    #[must_use]
    pub fn has_child_elements(&self) -> bool {
        self.children
            .iter()
            .any(|c| matches!(c, Child::Element(_)))
    }

    fn first_text(&self) -> Option<&str> {
        self.children.iter().find_map(|c| match c {
            Child::Text(t) => Some(t.as_str()),
            Child::Element(_) => None,
        })
    }
}

/// A parsed XML part.
///
/// Node `0` is the document node; elements follow in document order, so
/// comparing indices compares document position.
#[derive(Debug, Clone)]
pub struct XmlDocument<'a> {
    text: &'a str,
    nodes: Vec<ElementNode>,
}

impl<'a> XmlDocument<'a> {
    /// Parses `text`. A leading byte-order mark is skipped; spans still
    /// index `text` itself.
    ///
    /// # Errors
    ///
    /// Returns a description of the first well-formedness problem.
    pub fn parse(text: &'a str) -> std::result::Result<Self, String> {
        let (body, base) = strip_bom(text);
        let mut reader = Reader::from_str(body);
        let mut nodes = vec![ElementNode::document(text.len())];
        let mut stack = vec![DOCUMENT];

        loop {
            let start = base + offset(reader.buffer_position());
            let event = reader
                .read_event()
                .map_err(|e| format!("at byte {start}: {e}"))?;
            let end = base + offset(reader.buffer_position());
            let parent = stack.last().copied().unwrap_or(DOCUMENT);

            match event {
                Event::Start(e) => {
                    let id = push_element(&mut nodes, parent, text, &e, start..end)?;
                    nodes[id].content = Some(end..end);
                    stack.push(id);
                }
                Event::Empty(e) => {
                    push_element(&mut nodes, parent, text, &e, start..end)?;
                }
                Event::End(_) => {
                    if parent == DOCUMENT {
                        return Err(format!("unexpected closing tag at byte {start}"));
                    }
                    stack.pop();
                    if let Some(content) = nodes[parent].content.as_mut() {
                        content.end = start;
                    }
                }
                Event::Text(_) => {
                    let raw = &text[start..end];
                    let decoded = unescape(raw).map_err(|e| format!("at byte {start}: {e}"))?;
                    push_text(&mut nodes, parent, &decoded);
                }
                Event::CData(_) => {
                    let raw = &text[start..end];
                    let inner = raw
                        .strip_prefix("<![CDATA[")
                        .and_then(|r| r.strip_suffix("]]>"))
                        .unwrap_or(raw);
                    push_text(&mut nodes, parent, inner);
                }
                Event::Eof => break,
                _ => {
                    // Entity references arrive as their own event.
                    let raw = &text[start..end];
                    if raw.starts_with('&') && raw.ends_with(';') {
                        let decoded = unescape(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
                        push_text(&mut nodes, parent, &decoded);
                    }
                }
            }
        }

        if let Some(&open) = stack.last()
            && open != DOCUMENT
        {
            return Err(format!("element <{}> is not closed", nodes[open].qname));
        }
        if !nodes[DOCUMENT].has_child_elements() {
            return Err("no root element".to_string());
        }
        Ok(Self { text, nodes })
    }

    /// Returns the source text.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Returns an element by index.
    #[must_use]
    pub fn element(&self, id: usize) -> Option<&ElementNode> {
        self.nodes.get(id)
    }

    /// Returns the root element index.
    #[must_use]
    pub fn root(&self) -> Option<usize> {
        self.child_elements(DOCUMENT).next()
    }

    /// Concatenates all descendant text of an element.
    #[must_use]
    pub fn string_value(&self, id: usize) -> String {
        let mut out = String::new();
        let Some(node) = self.nodes.get(id) else {
            return out;
        };
        let mut pending: Vec<&Child> = node.children.iter().rev().collect();
        while let Some(child) = pending.pop() {
            match child {
                Child::Text(t) => out.push_str(t),
                Child::Element(c) => pending.extend(self.nodes[*c].children.iter().rev()),
            }
        }
        out
    }

    fn child_elements(&self, id: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[id].children.iter().filter_map(|c| match c {
            Child::Element(e) => Some(*e),
            Child::Text(_) => None,
        })
    }

    fn descendants(&self, id: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut pending: Vec<usize> = self.child_elements(id).collect();
        pending.reverse();
        while let Some(next) = pending.pop() {
            out.push(next);
            let before = pending.len();
            pending.extend(self.child_elements(next));
            pending[before..].reverse();
        }
        out
    }
}

fn push_element(
    nodes: &mut Vec<ElementNode>,
    parent: usize,
    text: &str,
    e: &BytesStart<'_>,
    tag: Range<usize>,
) -> std::result::Result<usize, String> {
    let id = nodes.len();
    let attributes = scan_attributes(text, tag.clone())?;
    nodes.push(ElementNode {
        qname: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        local_name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        parent: Some(parent),
        children: Vec::new(),
        attributes,
        start_tag: tag,
        content: None,
    });
    nodes[parent].children.push(Child::Element(id));
    Ok(id)
}

fn push_text(nodes: &mut [ElementNode], parent: usize, text: &str) {
    if parent == DOCUMENT || text.is_empty() {
        return;
    }
    let children = &mut nodes[parent].children;
    if let Some(Child::Text(last)) = children.last_mut() {
        last.push_str(text);
    } else {
        children.push(Child::Text(text.to_string()));
    }
}

/// Reads attributes out of a raw start tag, keeping value offsets.
fn scan_attributes(
    text: &str,
    tag: Range<usize>,
) -> std::result::Result<Vec<AttributeNode>, String> {
    let raw = &text[tag.clone()];
    let bytes = raw.as_bytes();
    let stops = |b: u8| b.is_ascii_whitespace() || b == b'/' || b == b'>';

    let mut i = 1;
    while i < bytes.len() && !stops(bytes[i]) {
        i += 1;
    }

    let mut attributes = Vec::new();
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'/' || bytes[i] == b'>' {
            break;
        }

        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !stops(bytes[i]) {
            i += 1;
        }
        let qname = &raw[name_start..i];
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            return Err(format!("attribute '{qname}' has no value"));
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let quote = match bytes.get(i) {
            Some(&q @ (b'"' | b'\'')) => q,
            _ => return Err(format!("attribute '{qname}' value is not quoted")),
        };
        i += 1;
        let value_start = i;
        let len = raw[i..]
            .find(char::from(quote))
            .ok_or_else(|| format!("attribute '{qname}' value is not terminated"))?;
        let value_end = i + len;
        i = value_end + 1;

        if qname == "xmlns" || qname.starts_with("xmlns:") {
            continue;
        }
        let value = unescape(&raw[value_start..value_end])
            .map_err(|e| format!("attribute '{qname}': {e}"))?
            .into_owned();
        attributes.push(AttributeNode {
            local_name: local_part(qname).to_string(),
            value,
            value_span: tag.start + value_start..tag.start + value_end,
        });
    }
    Ok(attributes)
}

fn local_part(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, local)| local)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Local(String),
}

impl NameTest {
    fn matches(&self, local_name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Local(name) => name == local_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Element,
    Attribute(NameTest),
    Text,
}

/// Where a match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLocation {
    /// An attribute value.
    Attribute {
        /// Owning element.
        element: usize,
        /// Index into the element's attributes.
        attribute: usize,
    },
    /// The string-value of an element.
    Element {
        /// The selected element.
        element: usize,
    },
    /// The first text child of an element.
    Text {
        /// The element owning the text.
        element: usize,
    },
}

impl MatchLocation {
    /// Returns the element the match belongs to.
    #[must_use]
    pub const fn element(&self) -> usize {
        match *self {
            Self::Attribute { element, .. } | Self::Element { element } | Self::Text { element } => {
                element
            }
        }
    }
}

/// The first node a selector selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathMatch {
    /// Selected value.
    pub value: String,
    /// Where the value lives.
    pub location: MatchLocation,
}

/// A compiled selector.
///
/// # Examples
///
/// ```
/// use partkit_core::rules::Selector;
/// use partkit_core::rules::XmlDocument;
///
/// let doc = XmlDocument::parse(r#"<a:clr xmlns:a="urn:a"><a:srgbClr val="2277CC"/></a:clr>"#).unwrap();
/// let selector = Selector::parse("//a:srgbClr/@val").unwrap();
/// assert_eq!(selector.evaluate(&doc).unwrap().value, "2277CC");
///
/// assert!(Selector::parse("//a:srgbClr[1]").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    steps: Vec<Step>,
    target: Target,
}

impl Selector {
    /// Parses a selector.
    ///
    /// # Errors
    ///
    /// Returns a description of the unsupported construct.
    pub fn parse(selector: &str) -> std::result::Result<Self, String> {
        let source = selector.trim();
        if source.is_empty() {
            return Err("selector is empty".to_string());
        }
        if source.contains('|') {
            return Err("unions are not supported".to_string());
        }

        let (mut axis, mut rest) = if let Some(r) = source.strip_prefix("//") {
            (Axis::Descendant, r)
        } else if let Some(r) = source.strip_prefix('/') {
            (Axis::Child, r)
        } else {
            (Axis::Child, source)
        };

        let mut steps = Vec::new();
        let mut target = Target::Element;
        loop {
            let (segment, remainder) = match rest.find('/') {
                Some(at) => (&rest[..at], Some(&rest[at..])),
                None => (rest, None),
            };
            let segment = segment.trim();
            if segment.is_empty() {
                return Err("empty location step".to_string());
            }

            if let Some(attr) = segment.strip_prefix('@') {
                target = Target::Attribute(parse_name_test(attr)?);
            } else if segment == "text()" {
                target = Target::Text;
            } else {
                steps.push(Step {
                    axis,
                    test: parse_name_test(segment)?,
                });
            }

            let Some(remainder) = remainder else {
                break;
            };
            if target != Target::Element {
                return Err(format!("'{segment}' must be the last step"));
            }
            (axis, rest) = if let Some(r) = remainder.strip_prefix("//") {
                (Axis::Descendant, r)
            } else {
                (Axis::Child, &remainder[1..])
            };
        }

        if target != Target::Element && axis == Axis::Descendant {
            // `//@val` and `//text()` address any element.
            steps.push(Step {
                axis,
                test: NameTest::Any,
            });
        }
        if steps.is_empty() {
            return Err("selector has no element step".to_string());
        }
        Ok(Self { steps, target })
    }

    /// Returns the first match in document order.
    #[must_use]
    pub fn evaluate(&self, doc: &XmlDocument<'_>) -> Option<XPathMatch> {
        let mut context = vec![DOCUMENT];
        for step in &self.steps {
            let mut next = BTreeSet::new();
            for &node in &context {
                match step.axis {
                    Axis::Child => next.extend(
                        doc.child_elements(node)
                            .filter(|&c| step.test.matches(&doc.nodes[c].local_name)),
                    ),
                    Axis::Descendant => next.extend(
                        doc.descendants(node)
                            .into_iter()
                            .filter(|&c| step.test.matches(&doc.nodes[c].local_name)),
                    ),
                }
            }
            if next.is_empty() {
                return None;
            }
            context = next.into_iter().collect();
        }

        match &self.target {
            Target::Element => context.first().map(|&element| XPathMatch {
                value: doc.string_value(element),
                location: MatchLocation::Element { element },
            }),
            Target::Attribute(test) => context.iter().find_map(|&element| {
                doc.nodes[element]
                    .attributes
                    .iter()
                    .position(|a| test.matches(&a.local_name))
                    .map(|attribute| XPathMatch {
                        value: doc.nodes[element].attributes[attribute].value.clone(),
                        location: MatchLocation::Attribute { element, attribute },
                    })
            }),
            Target::Text => context.iter().find_map(|&element| {
                doc.nodes[element].first_text().map(|text| XPathMatch {
                    value: text.to_string(),
                    location: MatchLocation::Text { element },
                })
            }),
        }
    }
}

fn parse_name_test(segment: &str) -> std::result::Result<NameTest, String> {
    if segment.contains('[') || segment.contains(']') {
        return Err("predicates are not supported".to_string());
    }
    if segment.contains("::") {
        return Err("axes are not supported".to_string());
    }
    if segment == "." || segment == ".." {
        return Err(format!("'{segment}' steps are not supported"));
    }
    if segment.contains('(') || segment.contains(')') {
        return Err(format!("function '{segment}' is not supported"));
    }
    if segment == "*" {
        return Ok(NameTest::Any);
    }

    let (prefix, local) = match segment.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, segment),
    };
    if let Some(prefix) = prefix
        && !is_name(prefix)
    {
        return Err(format!("invalid name test '{segment}'"));
    }
    if local == "*" {
        return Ok(NameTest::Any);
    }
    if !is_name(local) {
        return Err(format!("invalid name test '{segment}'"));
    }
    Ok(NameTest::Local(local.to_string()))
}

fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Evaluates `selector` against the XML `text` of part `path`.
///
/// # Errors
///
/// Returns `XPathEval` for an unsupported selector or a part that is not
/// well-formed.
pub fn evaluate(text: &str, selector: &str, path: &str) -> Result<Option<XPathMatch>> {
    let fail = |reason: String| PartkitError::XPathEval {
        selector: selector.to_string(),
        path: path.to_string(),
        reason,
    };
    let compiled = Selector::parse(selector).map_err(fail)?;
    let doc = XmlDocument::parse(text).map_err(|e| fail(format!("not well-formed XML: {e}")))?;
    Ok(compiled.evaluate(&doc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::SLIDE_XML;
    use crate::test_utils::THEME_XML;

    fn select(xml: &str, selector: &str) -> Option<String> {
        evaluate(xml, selector, "part.xml").unwrap().map(|m| m.value)
    }

    #[test]
    fn test_attribute_by_local_name() {
        assert_eq!(
            select(THEME_XML, "//a:accent1/a:srgbClr/@val").as_deref(),
            Some("2277CC")
        );
        assert_eq!(
            select(THEME_XML, "//accent1/srgbClr/@val").as_deref(),
            Some("2277CC")
        );
        assert_eq!(
            select(THEME_XML, "//a:majorFont/a:latin/@typeface").as_deref(),
            Some("Calibri Light")
        );
    }

    #[test]
    fn test_byte_order_mark_is_skipped() {
        let with_bom = format!("\u{FEFF}{THEME_XML}");
        assert_eq!(
            select(&with_bom, "//a:accent1/a:srgbClr/@val").as_deref(),
            Some("2277CC")
        );

        let doc = XmlDocument::parse(&with_bom).unwrap();
        let found = Selector::parse("//a:accent1/a:srgbClr/@val")
            .unwrap()
            .evaluate(&doc)
            .unwrap();
        let MatchLocation::Attribute { element, attribute } = found.location else {
            panic!("expected an attribute match");
        };
        let span = doc.element(element).unwrap().attributes[attribute].value_span.clone();
        assert_eq!(&with_bom[span], "2277CC");
    }

    #[test]
    fn test_absolute_and_relative_paths() {
        let xml = r#"<r><a><b>1</b></a><b>2</b></r>"#;
        assert_eq!(select(xml, "/r/b").as_deref(), Some("2"));
        assert_eq!(select(xml, "r/a/b").as_deref(), Some("1"));
        assert_eq!(select(xml, "/r//b").as_deref(), Some("1"));
        assert_eq!(select(xml, "/b"), None);
    }

    #[test]
    fn test_first_match_in_document_order() {
        assert_eq!(select(SLIDE_XML, "//a:t/text()").as_deref(), Some("Hello World"));
        assert_eq!(select(SLIDE_XML, "//a:t").as_deref(), Some("Hello World"));
    }

    #[test]
    fn test_wildcards() {
        let xml = r#"<x:r xmlns:x="urn:x"><x:a k="1"/><x:b k="2"/></x:r>"#;
        assert_eq!(select(xml, "/x:r/*/@k").as_deref(), Some("1"));
        assert_eq!(select(xml, "/x:r/x:*/@k").as_deref(), Some("1"));
        assert_eq!(select(xml, "//@k").as_deref(), Some("1"));
        assert_eq!(select(xml, "/x:r/x:b/@*").as_deref(), Some("2"));
    }

    #[test]
    fn test_string_value_and_entities() {
        let xml = "<r><p>a &amp; <i>b</i><![CDATA[<c>]]></p></r>";
        assert_eq!(select(xml, "//p").as_deref(), Some("a & b<c>"));
        assert_eq!(select(xml, "//p/text()").as_deref(), Some("a & "));
        let attr = r#"<r v="&lt;1&gt;"/>"#;
        assert_eq!(select(attr, "/r/@v").as_deref(), Some("<1>"));
    }

    #[test]
    fn test_namespace_declarations_are_not_attributes() {
        let xml = r#"<r xmlns="urn:d" xmlns:a="urn:a"/>"#;
        assert_eq!(select(xml, "/r/@*"), None);
    }

    #[test]
    fn test_missing_is_none() {
        assert_eq!(select(THEME_XML, "//a:accent6/a:srgbClr/@val"), None);
        assert_eq!(select(THEME_XML, "//a:accent1/a:srgbClr/@lastClr"), None);
        assert_eq!(select("<r><e/></r>", "//e/text()"), None);
    }

    #[test]
    fn test_unsupported_selectors() {
        for selector in [
            "",
            "//a:t[1]",
            "//a:t[@x='1']",
            "count(//a:t)",
            "//a:t/..",
            "./a:t",
            "//child::a:t",
            "//a:t | //a:r",
            "/@val",
            "//a:t/@val/x",
            "//a:t/text()/x",
            "//a:t/",
            "/a//",
            "//1abc",
        ] {
            assert!(Selector::parse(selector).is_err(), "accepted {selector:?}");
        }
    }

    #[test]
    fn test_eval_error_carries_selector_and_path() {
        let err = evaluate("<r/>", "//r[1]", "ppt/slides/slide1.xml").unwrap_err();
        match err {
            PartkitError::XPathEval {
                selector, path, ..
            } => {
                assert_eq!(selector, "//r[1]");
                assert_eq!(path, "ppt/slides/slide1.xml");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_documents() {
        for xml in ["", "<r>", "<r></s>", "text only", "<r a=1/>"] {
            assert!(XmlDocument::parse(xml).is_err(), "accepted {xml:?}");
        }
    }

    #[test]
    fn test_spans_point_into_source() {
        let xml = r#"<r><c val="abc" /><t>hi</t></r>"#;
        let doc = XmlDocument::parse(xml).unwrap();
        let m = Selector::parse("/r/c/@val").unwrap().evaluate(&doc).unwrap();
        let MatchLocation::Attribute { element, attribute } = m.location else {
            panic!("expected attribute match");
        };
        let node = doc.element(element).unwrap();
        assert_eq!(&xml[node.attributes[attribute].value_span.clone()], "abc");
        assert_eq!(&xml[node.start_tag.clone()], r#"<c val="abc" />"#);
        assert!(node.content.is_none());

        let t = doc.element(Selector::parse("/r/t").unwrap().evaluate(&doc).unwrap().location.element()).unwrap();
        assert_eq!(&xml[t.content.clone().unwrap()], "hi");
        assert_eq!(doc.root(), Some(1));
    }
}
