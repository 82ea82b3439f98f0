//! Auto-fix rewrites.
//!
//! A fix splices one value into the part text at the offsets recorded by
//! [`XmlDocument`]; the rest of the part is left byte for byte.

use crate::PartkitError;
use crate::Result;
use crate::rules::config::Expectation;
use crate::rules::matcher::font_literal;
use crate::rules::matcher::normalize_hex;
use crate::rules::xpath::MatchLocation;
use crate::rules::xpath::XPathMatch;
use crate::rules::xpath::XmlDocument;
use quick_xml::escape::escape;
use std::ops::Range;

/// Rewrites the matched value so it satisfies `expect`.
///
/// Hex colors go to the selected attribute or the element's `val`; fonts
/// go to the selected attribute or the element's `typeface`; `equals`
/// values replace the selected attribute or the element's text.
///
/// Returns `Ok(None)` when the rewrite would not change the part, including
/// elements whose text cannot be replaced because they have child elements.
///
/// # Errors
///
/// Returns `AutoFixUnsupported` for `regex`, `range` and `oneOf`.
pub fn apply_fix(
    expect: &Expectation,
    doc: &XmlDocument<'_>,
    found: &XPathMatch,
) -> Result<Option<String>> {
    let element = found.location.element();
    let fixed = match expect {
        Expectation::Hex(hex) => {
            let Some(digits) = normalize_hex(hex) else {
                return Ok(None);
            };
            match found.location {
                MatchLocation::Attribute { attribute, .. } => {
                    let value = hex_like(&found.value, &digits);
                    set_attribute(doc, element, attribute, &value)
                }
                MatchLocation::Element { .. } | MatchLocation::Text { .. } => {
                    let current = doc
                        .element(element)
                        .and_then(|node| node.attribute("val").map(|i| &node.attributes[i]))
                        .map_or("", |a| a.value.as_str());
                    set_named_attribute(doc, element, "val", &hex_like(current, &digits))
                }
            }
        }
        Expectation::Equals(value) => match found.location {
            MatchLocation::Attribute { attribute, .. } => {
                set_attribute(doc, element, attribute, value)
            }
            MatchLocation::Element { .. } | MatchLocation::Text { .. } => {
                set_element_text(doc, element, value)
            }
        },
        Expectation::Font(font) => {
            let font = font_literal(font);
            match found.location {
                MatchLocation::Attribute { attribute, .. } => {
                    set_attribute(doc, element, attribute, font)
                }
                MatchLocation::Element { .. } | MatchLocation::Text { .. } => {
                    set_named_attribute(doc, element, "typeface", font)
                }
            }
        }
        Expectation::Regex { .. } | Expectation::Range { .. } | Expectation::OneOf(_) => {
            return Err(PartkitError::AutoFixUnsupported {
                expectation: expect.key().to_string(),
            });
        }
    };

    Ok(fixed.filter(|text| text != doc.text()))
}

/// Narrows an element match to the attribute its fix would write.
///
/// A `hex` check on `<a:srgbClr val="..."/>` compares `val`, and a `font`
/// check on `<a:latin typeface="..."/>` compares `typeface`. Other matches
/// are returned unchanged, as are elements without that attribute.
#[must_use]
pub fn resolve_target(
    expect: &Expectation,
    doc: &XmlDocument<'_>,
    found: XPathMatch,
) -> XPathMatch {
    let name = match expect {
        Expectation::Hex(_) => "val",
        Expectation::Font(_) => "typeface",
        _ => return found,
    };
    let MatchLocation::Element { element } = found.location else {
        return found;
    };
    let Some((attribute, value)) = doc.element(element).and_then(|node| {
        node.attribute(name)
            .map(|i| (i, node.attributes[i].value.clone()))
    }) else {
        return found;
    };
    XPathMatch {
        value,
        location: MatchLocation::Attribute { element, attribute },
    }
}

/// Formats `digits` with or without `#`, following `original`.
fn hex_like(original: &str, digits: &str) -> String {
    if original.trim_start().starts_with('#') {
        format!("#{digits}")
    } else {
        digits.to_string()
    }
}

fn splice(text: &str, span: Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..span.start]);
    out.push_str(replacement);
    out.push_str(&text[span.end..]);
    out
}

/// Replaces an existing attribute value.
pub(crate) fn set_attribute(
    doc: &XmlDocument<'_>,
    element: usize,
    attribute: usize,
    value: &str,
) -> Option<String> {
    let span = doc
        .element(element)?
        .attributes
        .get(attribute)?
        .value_span
        .clone();
    Some(splice(doc.text(), span, &escape(value)))
}

/// Sets an attribute by local name, appending it to the start tag if absent.
pub(crate) fn set_named_attribute(
    doc: &XmlDocument<'_>,
    element: usize,
    local_name: &str,
    value: &str,
) -> Option<String> {
    let node = doc.element(element)?;
    if let Some(attribute) = node.attribute(local_name) {
        return set_attribute(doc, element, attribute, value);
    }

    let tag = &doc.text()[node.start_tag.clone()];
    let body = tag.strip_suffix('>')?;
    let body = body.strip_suffix('/').unwrap_or(body).trim_end();
    let at = node.start_tag.start + body.len();
    let insert = format!(" {local_name}=\"{}\"", escape(value));
    Some(splice(doc.text(), at..at, &insert))
}

/// Replaces the text content of an element without child elements.
pub(crate) fn set_element_text(
    doc: &XmlDocument<'_>,
    element: usize,
    value: &str,
) -> Option<String> {
    let node = doc.element(element)?;
    if node.has_child_elements() {
        return None;
    }
    if let Some(content) = node.content.clone() {
        return Some(splice(doc.text(), content, &escape(value)));
    }

    let tag = &doc.text()[node.start_tag.clone()];
    let open = tag.strip_suffix("/>")?.trim_end();
    let expanded = format!("{open}>{}</{}>", escape(value), node.qname);
    Some(splice(doc.text(), node.start_tag.clone(), &expanded))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rules::xpath::Selector;

    fn fix(xml: &str, selector: &str, expect: &Expectation) -> Result<Option<String>> {
        let doc = XmlDocument::parse(xml).unwrap();
        let found = Selector::parse(selector).unwrap().evaluate(&doc).unwrap();
        apply_fix(expect, &doc, &found)
    }

    fn target(xml: &str, selector: &str, expect: &Expectation) -> XPathMatch {
        let doc = XmlDocument::parse(xml).unwrap();
        let found = Selector::parse(selector).unwrap().evaluate(&doc).unwrap();
        resolve_target(expect, &doc, found)
    }

    #[test]
    fn test_resolve_target_prefers_written_attribute() {
        let xml = r#"<t><clr val="2277CC">x</clr><latin typeface="Calibri"/></t>"#;

        let hex = target(xml, "/t/clr", &Expectation::Hex("005BBB".into()));
        assert_eq!(hex.value, "2277CC");
        assert!(matches!(hex.location, MatchLocation::Attribute { .. }));

        let font = target(xml, "/t/latin", &Expectation::Font("Segoe UI".into()));
        assert_eq!(font.value, "Calibri");

        let equals = target(xml, "/t/clr", &Expectation::Equals("x".into()));
        assert_eq!(equals.value, "x");
        assert!(matches!(equals.location, MatchLocation::Element { .. }));

        let bare = target("<t><clr/></t>", "/t/clr", &Expectation::Hex("005BBB".into()));
        assert!(matches!(bare.location, MatchLocation::Element { .. }));
    }

    #[test]
    fn test_hex_attribute_keeps_convention() {
        let xml = r#"<c><a:srgbClr xmlns:a="urn:a" val="2277CC"/></c>"#;
        let out = fix(xml, "//a:srgbClr/@val", &Expectation::Hex("#005bbb".into()))
            .unwrap()
            .unwrap();
        assert_eq!(out, r#"<c><a:srgbClr xmlns:a="urn:a" val="005BBB"/></c>"#);

        let css = r##"<c color="#fff"/>"##;
        let out = fix(css, "/c/@color", &Expectation::Hex("000".into()))
            .unwrap()
            .unwrap();
        assert_eq!(out, r##"<c color="#000000"/>"##);
    }

    #[test]
    fn test_hex_element_writes_val() {
        let xml = r#"<c><clr val="111111"/><other/></c>"#;
        let out = fix(xml, "/c/clr", &Expectation::Hex("222222".into()))
            .unwrap()
            .unwrap();
        assert_eq!(out, r#"<c><clr val="222222"/><other/></c>"#);

        let bare = "<c><clr/></c>";
        let out = fix(bare, "/c/clr", &Expectation::Hex("#abc".into()))
            .unwrap()
            .unwrap();
        assert_eq!(out, r#"<c><clr val="AABBCC"/></c>"#);
    }

    #[test]
    fn test_equals_replaces_text() {
        let xml = "<r><t>old</t><t>keep</t></r>";
        let out = fix(xml, "//t/text()", &Expectation::Equals("a < b".into()))
            .unwrap()
            .unwrap();
        assert_eq!(out, "<r><t>a &lt; b</t><t>keep</t></r>");

        let empty = r#"<r><t x="1"/></r>"#;
        let out = fix(empty, "/r/t", &Expectation::Equals("new".into()))
            .unwrap()
            .unwrap();
        assert_eq!(out, r#"<r><t x="1">new</t></r>"#);
    }

    #[test]
    fn test_equals_on_mixed_content_is_no_change() {
        let xml = "<r><p>a<b/>c</p></r>";
        assert!(
            fix(xml, "/r/p", &Expectation::Equals("x".into()))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_font_writes_typeface() {
        let xml = r#"<f><latin typeface="Calibri" panose="020F"/></f>"#;
        let out = fix(xml, "/f/latin", &Expectation::Font("'Segoe UI'".into()))
            .unwrap()
            .unwrap();
        assert_eq!(out, r#"<f><latin typeface="Segoe UI" panose="020F"/></f>"#);
    }

    #[test]
    fn test_unchanged_value_is_none() {
        let xml = r#"<c val="005BBB"/>"#;
        assert!(
            fix(xml, "/c/@val", &Expectation::Hex("#005bbb".into()))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_unsupported_shapes() {
        let xml = r#"<c val="1"/>"#;
        let err = fix(
            xml,
            "/c/@val",
            &Expectation::Range {
                min: Some(2.0),
                max: None,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PartkitError::AutoFixUnsupported { ref expectation } if expectation == "range"
        ));
    }
}
