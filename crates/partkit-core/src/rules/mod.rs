//! Declarative XML rules with scoring and auto-fix.
//!
//! A [`RulesConfig`] lists rules; each selects a value from the XML parts
//! matching its `where` path or glob and compares it with an expectation.
//! Mismatches become [`Violation`]s and, when the rule allows it, are fixed
//! in the manifest.

pub mod config;
pub mod engine;
pub mod fixer;
pub mod matcher;
pub mod report;
pub mod xpath;

pub use config::Expectation;
pub use config::Rule;
pub use config::RulesConfig;
pub use engine::RuleEngine;
pub use engine::validate_manifest;
pub use fixer::apply_fix;
pub use matcher::Matcher;
pub use matcher::normalize_font;
pub use matcher::normalize_hex;
pub use report::ValidationResult;
pub use report::Violation;
pub use report::ViolationReporter;
pub use xpath::MatchLocation;
pub use xpath::Selector;
pub use xpath::XPathMatch;
pub use xpath::XmlDocument;
