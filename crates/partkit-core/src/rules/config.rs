//! Rule definitions.

use crate::PartkitError;
use crate::Result;
use crate::rules::matcher::Matcher;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Expected value shape of a rule.
///
/// On the wire this is an object with exactly one of `hex`, `equals`,
/// `regex` (with optional `flags`), `range`, `oneOf` or `font`.
///
/// # Examples
///
/// ```
/// use partkit_core::rules::Expectation;
///
/// let expect: Expectation = serde_json::from_str(r##"{"hex": "#005BBB"}"##).unwrap();
/// assert_eq!(expect, Expectation::Hex("#005BBB".to_string()));
///
/// let expect: Expectation = serde_json::from_str(r#"{"range": {"min": 10}}"#).unwrap();
/// assert_eq!(expect.key(), "range");
///
/// assert!(serde_json::from_str::<Expectation>(r##"{"hex": "#fff", "font": "Arial"}"##).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawExpect", into = "RawExpect")]
pub enum Expectation {
    /// Color equality after hex normalization.
    Hex(String),
    /// Exact string equality.
    Equals(String),
    /// Regular expression match.
    Regex {
        /// Pattern source.
        pattern: String,
        /// Single-letter flags.
        flags: Option<String>,
    },
    /// Inclusive numeric range; either bound may be open.
    Range {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
    /// Membership in a set of strings.
    OneOf(Vec<String>),
    /// Font family equality ignoring case, quotes and extra whitespace.
    Font(String),
}

impl Expectation {
    /// Returns the wire key of this shape.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Hex(_) => "hex",
            Self::Equals(_) => "equals",
            Self::Regex { .. } => "regex",
            Self::Range { .. } => "range",
            Self::OneOf(_) => "oneOf",
            Self::Font(_) => "font",
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawExpect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<RawRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    one_of: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    font: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
}

/// Renders a JSON scalar the way it appears in XML text.
fn scalar_text(value: Value) -> std::result::Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a string or number, found {other}")),
    }
}

impl TryFrom<RawExpect> for Expectation {
    type Error = String;

    fn try_from(raw: RawExpect) -> std::result::Result<Self, Self::Error> {
        let RawExpect {
            hex,
            equals,
            regex,
            flags,
            range,
            one_of,
            font,
        } = raw;

        if flags.is_some() && regex.is_none() {
            return Err("'flags' is only valid with 'regex'".to_string());
        }

        let mut shapes = Vec::with_capacity(1);
        if let Some(hex) = hex {
            shapes.push(Self::Hex(hex));
        }
        if let Some(equals) = equals {
            shapes.push(Self::Equals(scalar_text(equals)?));
        }
        if let Some(pattern) = regex {
            shapes.push(Self::Regex { pattern, flags });
        }
        if let Some(RawRange { min, max }) = range {
            shapes.push(Self::Range { min, max });
        }
        if let Some(values) = one_of {
            let values = values
                .into_iter()
                .map(scalar_text)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            shapes.push(Self::OneOf(values));
        }
        if let Some(font) = font {
            shapes.push(Self::Font(font));
        }

        match shapes.len() {
            1 => Ok(shapes.remove(0)),
            0 => Err(
                "expect must contain one of hex, equals, regex, range, oneOf, font".to_string(),
            ),
            _ => Err(format!(
                "expect must contain exactly one key, found {}",
                shapes
                    .iter()
                    .map(Self::key)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

impl From<Expectation> for RawExpect {
    fn from(expect: Expectation) -> Self {
        match expect {
            Expectation::Hex(hex) => Self {
                hex: Some(hex),
                ..Self::default()
            },
            Expectation::Equals(value) => Self {
                equals: Some(Value::String(value)),
                ..Self::default()
            },
            Expectation::Regex { pattern, flags } => Self {
                regex: Some(pattern),
                flags,
                ..Self::default()
            },
            Expectation::Range { min, max } => Self {
                range: Some(RawRange { min, max }),
                ..Self::default()
            },
            Expectation::OneOf(values) => Self {
                one_of: Some(values.into_iter().map(Value::String).collect()),
                ..Self::default()
            },
            Expectation::Font(font) => Self {
                font: Some(font),
                ..Self::default()
            },
        }
    }
}

const fn default_weight() -> f64 {
    1.0
}

const fn default_enabled() -> bool {
    true
}

/// A declarative check against XML parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique identifier.
    pub id: String,

    /// Human-readable description, used in violation messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    /// Grouping label copied onto violations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Part path or glob the rule applies to.
    #[serde(rename = "where")]
    pub target: String,

    /// Selector locating the checked value.
    pub xpath: String,

    /// Expected value.
    pub expect: Expectation,

    /// Rewrite mismatches when auto-fix is enabled for the run.
    #[serde(default)]
    pub autofix: bool,

    /// Contribution to the score. Default: `1`.
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Disabled rules are skipped and do not count toward the score.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Report a violation when the selector matches nothing.
    #[serde(default)]
    pub required: bool,

    /// Free-form labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Rule {
    /// Creates an enabled rule with default weight.
    pub fn new(
        id: impl Into<String>,
        target: impl Into<String>,
        xpath: impl Into<String>,
        expect: Expectation,
    ) -> Self {
        Self {
            id: id.into(),
            desc: None,
            category: None,
            target: target.into(),
            xpath: xpath.into(),
            expect,
            autofix: false,
            weight: default_weight(),
            enabled: true,
            required: false,
            tags: Vec::new(),
        }
    }

    /// Sets whether the rule auto-fixes.
    #[must_use]
    pub const fn with_autofix(mut self, autofix: bool) -> Self {
        self.autofix = autofix;
        self
    }

    /// Sets the weight.
    #[must_use]
    pub const fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Sets whether the rule runs.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets whether zero matches is a violation.
    #[must_use]
    pub const fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Checks the definition and compiles its matcher.
    ///
    /// # Errors
    ///
    /// Returns `RuleParse` for an empty id, `where` or `xpath`, a negative
    /// or non-finite weight, or an expectation that does not compile.
    pub fn compile(&self) -> Result<Matcher> {
        let fail = |reason: String| PartkitError::rule_parse(Some(&self.id), reason);

        if self.id.trim().is_empty() {
            return Err(PartkitError::rule_parse(None, "id must not be empty"));
        }
        if self.target.trim().is_empty() {
            return Err(fail("'where' must not be empty".to_string()));
        }
        if self.xpath.trim().is_empty() {
            return Err(fail("'xpath' must not be empty".to_string()));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(fail(format!(
                "weight must be a finite number >= 0, got {}",
                self.weight
            )));
        }
        Matcher::new(&self.expect).map_err(fail)
    }
}

fn default_profile() -> String {
    "default".to_string()
}

/// A named list of rules.
///
/// # Examples
///
/// ```
/// use partkit_core::RulesConfig;
///
/// let config = RulesConfig::from_json(
///     r##"{
///         "profile": "brand",
///         "rules": [{
///             "id": "accent1",
///             "where": "ppt/theme/theme*.xml",
///             "xpath": "//a:accent1/a:srgbClr/@val",
///             "expect": {"hex": "#005BBB"},
///             "autofix": true,
///             "weight": 5
///         }]
///     }"##,
/// )
/// .unwrap();
/// assert_eq!(config.profile, "brand");
/// assert_eq!(config.rules[0].weight, 5.0);
/// assert!(config.rules[0].enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Profile name echoed into results.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Rules in evaluation order.
    pub rules: Vec<Rule>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            rules: Vec::new(),
        }
    }
}

impl RulesConfig {
    /// Creates a config from rules under the default profile.
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            profile: default_profile(),
            rules,
        }
    }

    /// Parses a rules document.
    ///
    /// Accepts either `{"profile": ..., "rules": [...]}` or a bare array of
    /// rules. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns `RuleParse` naming the offending rule where possible.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| PartkitError::rule_parse(None, format!("malformed JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parses an already decoded rules document.
    ///
    /// # Errors
    ///
    /// Same conditions as [`RulesConfig::from_json`].
    pub fn from_value(value: Value) -> Result<Self> {
        let (profile, rules) = match value {
            Value::Array(rules) => (default_profile(), rules),
            Value::Object(mut map) => {
                let profile = match map.remove("profile") {
                    None | Some(Value::Null) => default_profile(),
                    Some(Value::String(profile)) => profile,
                    Some(_) => {
                        return Err(PartkitError::rule_parse(None, "profile must be a string"));
                    }
                };
                match map.remove("rules") {
                    Some(Value::Array(rules)) => (profile, rules),
                    _ => {
                        return Err(PartkitError::rule_parse(None, "rules must be an array"));
                    }
                }
            }
            _ => {
                return Err(PartkitError::rule_parse(
                    None,
                    "rules document must be an object or an array",
                ));
            }
        };

        let rules = rules
            .into_iter()
            .map(|value| {
                let id = value.get("id").and_then(Value::as_str).map(str::to_string);
                serde_json::from_value::<Rule>(value)
                    .map_err(|e| PartkitError::rule_parse(id.as_deref(), e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let config = Self { profile, rules };
        config.validate()?;
        Ok(config)
    }

    /// Validates every rule, including disabled ones, and id uniqueness.
    ///
    /// # Errors
    ///
    /// Returns the first `RuleParse` problem found.
    pub fn validate(&self) -> Result<()> {
        self.compile().map(|_| ())
    }

    /// Compiles the enabled rules, in order, after validating all rules.
    pub(crate) fn compile(&self) -> Result<Vec<(&Rule, Matcher)>> {
        let mut seen = HashSet::with_capacity(self.rules.len());
        let mut compiled = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(PartkitError::rule_parse(Some(&rule.id), "duplicate rule id"));
            }
            let matcher = rule.compile()?;
            if rule.enabled {
                compiled.push((rule, matcher));
            }
        }
        Ok(compiled)
    }

    /// Iterates over enabled rules.
    pub fn enabled_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.enabled)
    }
}
