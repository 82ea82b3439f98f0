//! Comparison of selected values against expectations.

use crate::pattern::compile_regex;
use crate::rules::config::Expectation;
use regex::Regex;

/// Normalizes a hex color to six uppercase digits without `#`.
///
/// Three-digit shorthand expands per channel. Returns `None` for anything
/// that is not a 3- or 6-digit hex color.
///
/// # Examples
///
/// ```
/// use partkit_core::rules::normalize_hex;
///
/// assert_eq!(normalize_hex("#abc").as_deref(), Some("AABBCC"));
/// assert_eq!(normalize_hex("005bbb").as_deref(), Some("005BBB"));
/// assert_eq!(normalize_hex("#12345"), None);
/// ```
#[must_use]
pub fn normalize_hex(value: &str) -> Option<String> {
    let digits = value.trim();
    let digits = digits.strip_prefix('#').unwrap_or(digits);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        6 => Some(digits.to_ascii_uppercase()),
        3 => Some(
            digits
                .chars()
                .flat_map(|c| [c, c])
                .collect::<String>()
                .to_ascii_uppercase(),
        ),
        _ => None,
    }
}

/// Normalizes a font family name for comparison.
///
/// Surrounding quotes are removed, runs of whitespace collapse to one space,
/// and the result is lowercased.
///
/// # Examples
///
/// ```
/// use partkit_core::rules::normalize_font;
///
/// assert_eq!(normalize_font("  'Calibri   Light' "), "calibri light");
/// assert_eq!(normalize_font("\"Arial\""), "arial");
/// ```
#[must_use]
pub fn normalize_font(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Strips surrounding whitespace and quotes from a font name as written.
pub(crate) fn font_literal(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

/// A compiled expectation.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Normalized six-digit color.
    Hex(String),
    /// Exact text.
    Equals(String),
    /// Compiled pattern.
    Regex(Regex),
    /// Inclusive bounds.
    Range {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
    /// Allowed values.
    OneOf(Vec<String>),
    /// Normalized family name.
    Font(String),
}

impl Matcher {
    /// Compiles an expectation.
    ///
    /// # Errors
    ///
    /// Returns a description of an invalid hex color, regex, range or empty
    /// set.
    pub fn new(expect: &Expectation) -> Result<Self, String> {
        match expect {
            Expectation::Hex(hex) => normalize_hex(hex)
                .map(Self::Hex)
                .ok_or_else(|| format!("invalid hex color '{hex}'")),
            Expectation::Equals(value) => Ok(Self::Equals(value.clone())),
            Expectation::Regex { pattern, flags } => {
                compile_regex(pattern, flags.as_deref().unwrap_or("")).map(Self::Regex)
            }
            Expectation::Range { min, max } => {
                if min.is_none() && max.is_none() {
                    return Err("range needs at least one of min, max".to_string());
                }
                if min.is_some_and(|v| !v.is_finite()) || max.is_some_and(|v| !v.is_finite()) {
                    return Err("range bounds must be finite".to_string());
                }
                if let (Some(lo), Some(hi)) = (min, max)
                    && lo > hi
                {
                    return Err(format!("range min {lo} is greater than max {hi}"));
                }
                Ok(Self::Range {
                    min: *min,
                    max: *max,
                })
            }
            Expectation::OneOf(values) => {
                if values.is_empty() {
                    Err("oneOf must list at least one value".to_string())
                } else {
                    Ok(Self::OneOf(values.clone()))
                }
            }
            Expectation::Font(font) => {
                let normalized = normalize_font(font);
                if normalized.is_empty() {
                    Err("font must not be empty".to_string())
                } else {
                    Ok(Self::Font(normalized))
                }
            }
        }
    }

    /// Returns `true` if `actual` satisfies the expectation.
    #[must_use]
    pub fn is_match(&self, actual: &str) -> bool {
        match self {
            Self::Hex(expected) => normalize_hex(actual).is_some_and(|a| a == *expected),
            Self::Equals(expected) => actual == expected,
            Self::Regex(re) => re.is_match(actual),
            Self::Range { min, max } => actual.trim().parse::<f64>().is_ok_and(|v| {
                v.is_finite() && min.is_none_or(|lo| v >= lo) && max.is_none_or(|hi| v <= hi)
            }),
            Self::OneOf(values) => values.iter().any(|v| v == actual),
            Self::Font(expected) => normalize_font(actual) == *expected,
        }
    }

    /// Renders the expected value for reports.
    #[must_use]
    pub fn describe(&self, expect: &Expectation) -> String {
        match (self, expect) {
            (Self::Hex(hex), _) => format!("#{hex}"),
            (_, Expectation::Regex { pattern, flags }) => match flags {
                Some(flags) if !flags.is_empty() => format!("/{pattern}/{flags}"),
                _ => pattern.clone(),
            },
            (Self::Range { min, max }, _) => match (min, max) {
                (Some(lo), Some(hi)) => format!("{lo} to {hi}"),
                (Some(lo), None) => format!(">= {lo}"),
                (None, Some(hi)) => format!("<= {hi}"),
                (None, None) => String::new(),
            },
            (Self::OneOf(values), _) => format!("one of [{}]", values.join(", ")),
            (_, Expectation::Font(font)) => font_literal(font).to_string(),
            (Self::Equals(value), _) => value.clone(),
            (Self::Regex(re), _) => re.as_str().to_string(),
            (Self::Font(font), _) => font.clone(),
        }
    }

    /// Renders an actual value for reports.
    ///
    /// Hex colors are shown as `#RRGGBB`; everything else verbatim.
    #[must_use]
    pub fn display_actual(&self, actual: &str) -> String {
        match self {
            Self::Hex(_) => normalize_hex(actual).map_or_else(|| actual.to_string(), |h| format!("#{h}")),
            _ => actual.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn matcher(expect: Expectation) -> Matcher {
        Matcher::new(&expect).unwrap()
    }

    #[test]
    fn test_hex_shorthand_equals_full() {
        let m = matcher(Expectation::Hex("#AABBCC".into()));
        assert!(m.is_match("#abc"));
        assert!(m.is_match("aabbcc"));
        assert!(!m.is_match("#abd"));
        assert!(!m.is_match("windowText"));
        assert_eq!(m.display_actual("2277cc"), "#2277CC");
        assert_eq!(m.display_actual("windowText"), "windowText");
    }

    #[test]
    fn test_invalid_hex() {
        assert!(Matcher::new(&Expectation::Hex("#12".into())).is_err());
        assert!(Matcher::new(&Expectation::Hex("#gggggg".into())).is_err());
    }

    #[test]
    fn test_equals_is_exact() {
        let m = matcher(Expectation::Equals("Office".into()));
        assert!(m.is_match("Office"));
        assert!(!m.is_match("office"));
        assert!(!m.is_match("Office "));
    }

    #[test]
    fn test_regex_with_flags() {
        let m = matcher(Expectation::Regex {
            pattern: "^calibri".into(),
            flags: Some("i".into()),
        });
        assert!(m.is_match("Calibri Light"));
        assert_eq!(
            m.describe(&Expectation::Regex {
                pattern: "^calibri".into(),
                flags: Some("i".into())
            }),
            "/^calibri/i"
        );
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let m = matcher(Expectation::Range {
            min: Some(10.0),
            max: Some(20.0),
        });
        assert!(m.is_match("10"));
        assert!(m.is_match(" 20 "));
        assert!(m.is_match("15.5"));
        assert!(!m.is_match("20.01"));
        assert!(!m.is_match("abc"));
        assert!(!m.is_match("NaN"));

        let open = matcher(Expectation::Range {
            min: None,
            max: Some(0.0),
        });
        assert!(open.is_match("-5"));
    }

    #[test]
    fn test_range_validation() {
        assert!(Matcher::new(&Expectation::Range { min: None, max: None }).is_err());
        assert!(
            Matcher::new(&Expectation::Range {
                min: Some(2.0),
                max: Some(1.0)
            })
            .is_err()
        );
    }

    #[test]
    fn test_one_of() {
        let m = matcher(Expectation::OneOf(vec!["left".into(), "ctr".into()]));
        assert!(m.is_match("ctr"));
        assert!(!m.is_match("right"));
        assert!(Matcher::new(&Expectation::OneOf(Vec::new())).is_err());
    }

    #[test]
    fn test_font_normalization() {
        let m = matcher(Expectation::Font("'Segoe  UI'".into()));
        assert!(m.is_match("segoe ui"));
        assert!(m.is_match("\"Segoe UI\""));
        assert!(!m.is_match("Segoe"));
        assert_eq!(m.describe(&Expectation::Font("'Segoe  UI'".into())), "Segoe  UI");
    }
}
