//! Rule evaluation over a manifest.

use crate::PartkitError;
use crate::Result;
use crate::ValidateOptions;
use crate::manifest::Manifest;
use crate::pattern::glob_matches;
use crate::rules::config::Rule;
use crate::rules::config::RulesConfig;
use crate::rules::fixer::apply_fix;
use crate::rules::fixer::resolve_target;
use crate::rules::matcher::Matcher;
use crate::rules::report::ValidationResult;
use crate::rules::report::Violation;
use crate::rules::report::ViolationReporter;
use crate::rules::xpath::Selector;
use crate::rules::xpath::XmlDocument;
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Validates `manifest` against `rules`, applying fixes in place.
///
/// # Errors
///
/// Returns `RuleParse` if any rule is malformed; nothing is evaluated in
/// that case.
///
/// # Examples
///
/// ```
/// use partkit_core::EngineConfig;
/// use partkit_core::ValidateOptions;
/// use partkit_core::manifest::unwrap_archive;
/// use partkit_core::rules::Expectation;
/// use partkit_core::rules::Rule;
/// use partkit_core::rules::RulesConfig;
/// use partkit_core::rules::validate_manifest;
/// use partkit_core::test_utils::minimal_pptx;
///
/// let mut manifest = unwrap_archive(&minimal_pptx(), &EngineConfig::default()).unwrap();
/// let rules = RulesConfig::new(vec![
///     Rule::new(
///         "accent1",
///         "ppt/theme/theme1.xml",
///         "//a:accent1/a:srgbClr/@val",
///         Expectation::Hex("#005BBB".into()),
///     )
///     .with_autofix(true),
/// ]);
///
/// let first = validate_manifest(&mut manifest, &rules, &ValidateOptions::default()).unwrap();
/// assert_eq!(first.score, 0);
/// assert_eq!(first.auto_fixed, 1);
///
/// let second = validate_manifest(&mut manifest, &rules, &ValidateOptions::default()).unwrap();
/// assert_eq!(second.score, 100);
/// ```
pub fn validate_manifest(
    manifest: &mut Manifest,
    rules: &RulesConfig,
    options: &ValidateOptions,
) -> Result<ValidationResult> {
    RuleEngine::new(rules)?.run(manifest, options)
}

struct CompiledRule<'r> {
    rule: &'r Rule,
    matcher: Matcher,
    selector: std::result::Result<Selector, String>,
}

struct Outcome {
    violation: Violation,
    fixed: Option<String>,
}

/// A validated, compiled rule set.
pub struct RuleEngine<'r> {
    profile: &'r str,
    rules: Vec<CompiledRule<'r>>,
}

impl<'r> RuleEngine<'r> {
    /// Compiles the enabled rules of `config`.
    ///
    /// Selectors are parsed here too, but an unsupported selector only
    /// surfaces as an execution failure of its rule.
    pub fn new(config: &'r RulesConfig) -> Result<Self> {
        let rules = config
            .compile()?
            .into_iter()
            .map(|(rule, matcher)| CompiledRule {
                rule,
                matcher,
                selector: Selector::parse(&rule.xpath),
            })
            .collect();
        Ok(Self {
            profile: &config.profile,
            rules,
        })
    }

    /// Returns the number of enabled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if no rule is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluates every rule in order.
    ///
    /// Rules see the fixes of earlier rules on the same part; the manifest
    /// itself is only updated once all rules have run.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `options` do not validate.
    pub fn run(
        &self,
        manifest: &mut Manifest,
        options: &ValidateOptions,
    ) -> Result<ValidationResult> {
        options.validate()?;
        let started = Instant::now();
        let paths: Vec<String> = manifest
            .xml_entries()
            .map(|(path, _)| path.to_string())
            .collect();
        let mut overlay: BTreeMap<String, String> = BTreeMap::new();
        let mut reporter = ViolationReporter::new(options.max_violations);
        for compiled in &self.rules {
            reporter.register_rule(compiled.rule.weight);
        }

        'rules: for compiled in &self.rules {
            if reporter.is_full() {
                break;
            }
            let rule = compiled.rule;
            let before = reporter.len();
            let target = rule.target.trim().trim_start_matches('/');
            let mut matched_any = false;

            for path in paths.iter().filter(|p| glob_matches(target, p)) {
                if reporter.is_full() {
                    break 'rules;
                }
                matched_any = true;
                let text = overlay
                    .get(path)
                    .map(String::as_str)
                    .or_else(|| manifest.xml_text(path))
                    .unwrap_or_default();

                let outcome = match check(compiled, path, text, options) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(
                            rule = rule.id.as_str(),
                            path = path.as_str(),
                            error = %e,
                            "rule execution failed"
                        );
                        let message = format!("execution failure: {e}");
                        let expected = compiled.matcher.describe(&rule.expect);
                        Some(Outcome {
                            violation: new_violation(rule, path, message, expected, None),
                            fixed: None,
                        })
                    }
                };

                if let Some(Outcome { violation, fixed }) = outcome
                    && reporter.record(violation)
                    && let Some(fixed) = fixed
                {
                    overlay.insert(path.clone(), fixed);
                }
            }

            if !matched_any && rule.required {
                let message = format!("{}: no part matches '{}'", label(rule), rule.target);
                let expected = compiled.matcher.describe(&rule.expect);
                reporter.record(new_violation(rule, &rule.target, message, expected, None));
            }

            let produced = reporter.len() - before;
            debug!(rule = rule.id.as_str(), violations = produced, "evaluated rule");
            if options.fail_fast && produced > 0 {
                break;
            }
        }

        let fixed_parts = overlay.len();
        for (path, text) in overlay {
            manifest.set_xml_text(&path, text);
        }

        let result = reporter.finish(self.profile, started.elapsed());
        info!(
            profile = result.profile.as_str(),
            score = result.score,
            violations = result.violations.len(),
            auto_fixed = result.auto_fixed,
            fixed_parts,
            "validation complete"
        );
        Ok(result)
    }
}

fn check(
    compiled: &CompiledRule<'_>,
    path: &str,
    text: &str,
    options: &ValidateOptions,
) -> Result<Option<Outcome>> {
    let rule = compiled.rule;
    let matcher = &compiled.matcher;
    let eval_error = |reason: String| PartkitError::XPathEval {
        selector: rule.xpath.clone(),
        path: path.to_string(),
        reason,
    };

    let selector = compiled.selector.as_ref().map_err(|e| eval_error(e.clone()))?;
    let doc = XmlDocument::parse(text)
        .map_err(|e| eval_error(format!("not well-formed XML: {e}")))?;
    let expected = matcher.describe(&rule.expect);

    let Some(found) = selector
        .evaluate(&doc)
        .map(|m| resolve_target(&rule.expect, &doc, m))
    else {
        return Ok(rule.required.then(|| Outcome {
            violation: new_violation(
                rule,
                path,
                format!("{}: no match for {}", label(rule), rule.xpath),
                expected,
                None,
            ),
            fixed: None,
        }));
    };
    if matcher.is_match(&found.value) {
        return Ok(None);
    }

    let actual = matcher.display_actual(&found.value);
    let mut message = format!("{}: expected {expected}, found {actual}", label(rule));
    let mut violation = new_violation(rule, path, String::new(), expected, Some(actual));
    let mut fixed = None;

    if rule.autofix && options.enable_auto_fix {
        match apply_fix(&rule.expect, &doc, &found) {
            Ok(Some(new_text)) => {
                let after = XmlDocument::parse(&new_text).ok().and_then(|d| {
                    selector
                        .evaluate(&d)
                        .map(|m| resolve_target(&rule.expect, &d, m).value)
                });
                // Only keep a rewrite the next validation would accept.
                match after {
                    Some(value) if matcher.is_match(&value) => {
                        violation.after = Some(matcher.display_actual(&value));
                        violation.auto_fixed = true;
                        fixed = Some(new_text);
                    }
                    _ => {
                        debug!(rule = rule.id.as_str(), path, "fix does not satisfy rule");
                        message.push_str(" (auto-fix did not satisfy the expectation)");
                    }
                }
            }
            Ok(None) => message.push_str(" (auto-fix made no change)"),
            Err(e) => {
                debug!(rule = rule.id.as_str(), error = %e, "no fixer");
                message = format!("{message} ({e})");
            }
        }
    }

    violation.message = message;
    Ok(Some(Outcome { violation, fixed }))
}

fn label(rule: &Rule) -> String {
    rule.desc
        .clone()
        .unwrap_or_else(|| format!("rule '{}'", rule.id))
}

fn new_violation(
    rule: &Rule,
    path: &str,
    message: String,
    expected: String,
    actual: Option<String>,
) -> Violation {
    Violation {
        rule_id: rule.id.clone(),
        target: path.to_string(),
        message,
        xpath: rule.xpath.clone(),
        expected,
        before: actual.clone(),
        actual,
        after: None,
        auto_fixed: false,
        weight: rule.weight,
        category: rule.category.clone(),
        timestamp: Utc::now(),
    }
}
