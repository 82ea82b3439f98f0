//! Integration tests for partkit-core.
//!
//! These tests drive whole packages through unwrap, rewrap, process,
//! validate and sessions.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use partkit_core::DocumentKind;
use partkit_core::Engine;
use partkit_core::EngineConfig;
use partkit_core::Manifest;
use partkit_core::PartEntry;
use partkit_core::PartkitError;
use partkit_core::Payload;
use partkit_core::ProcessOperation;
use partkit_core::Rule;
use partkit_core::RulesConfig;
use partkit_core::ValidateOptions;
use partkit_core::manifest::CONTENT_TYPES_PATH;
use partkit_core::manifest::ContentTypeIndex;
use partkit_core::process_archive;
use partkit_core::rewrap_manifest;
use partkit_core::rules::Expectation;
use partkit_core::session::FsObjectStore;
use partkit_core::test_utils::PackageBuilder;
use partkit_core::test_utils::minimal_pptx;
use partkit_core::unwrap_archive;
use partkit_core::validate_manifest;
use tempfile::TempDir;

const THEME: &str = "ppt/theme/theme1.xml";

fn full_config() -> EngineConfig {
    EngineConfig::default().with_include_binary(true)
}

fn unwrap(bytes: &[u8]) -> Manifest {
    unwrap_archive(bytes, &full_config()).unwrap()
}

#[test]
fn test_round_trip_preserves_entries() {
    let config = full_config();
    let original = unwrap(&minimal_pptx());
    let archive = rewrap_manifest(&original, None, &config).unwrap();
    let again = unwrap(&archive);

    assert_eq!(again.entries, original.entries);
    assert_eq!(again.kind, DocumentKind::Pptx);
}

#[test]
fn test_round_trip_through_json() {
    let original = unwrap(&minimal_pptx());
    let json = original.to_json().unwrap();
    let parsed = Manifest::from_json(&json).unwrap();
    let archive = rewrap_manifest(&parsed, None, &full_config()).unwrap();
    assert_eq!(unwrap(&archive).entries, original.entries);
}

#[test]
fn test_rewrap_is_deterministic() {
    let manifest = unwrap(&minimal_pptx());
    let first = rewrap_manifest(&manifest, None, &full_config()).unwrap();
    let second = rewrap_manifest(&manifest, None, &full_config()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_rewrap_without_binary_needs_base() {
    let lean = unwrap_archive(&minimal_pptx(), &EngineConfig::default()).unwrap();
    let err = rewrap_manifest(&lean, None, &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, PartkitError::MissingPart { ref path } if path == "ppt/media/image1.png"));

    let base = minimal_pptx();
    let archive = rewrap_manifest(&lean, Some(base.as_slice()), &EngineConfig::default()).unwrap();
    assert!(unwrap(&archive).get("ppt/media/image1.png").is_some());
}

#[test]
fn test_stored_compression() {
    let manifest = unwrap(&minimal_pptx());
    let stored = rewrap_manifest(
        &manifest,
        None,
        &full_config().with_compression_level(0),
    )
    .unwrap();
    assert_eq!(unwrap(&stored).entries, manifest.entries);
}

#[test]
fn test_bad_archive() {
    let err = unwrap_archive(b"PK\x03\x04 truncated", &EngineConfig::default()).unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn test_replace_counts_are_exact() {
    let archive = PackageBuilder::new()
        .xml("word/document.xml", "<w:t>cat cat</w:t>")
        .xml("word/header1.xml", "<w:t>cat</w:t>")
        .xml("word/footer1.xml", "<w:t>dog</w:t>")
        .bin("word/media/cat.bin", b"cat")
        .build();
    let ops = vec![ProcessOperation::replace_text("cat", "lion")];

    let (out, report) = process_archive(&archive, &ops, &full_config()).unwrap();
    assert_eq!(report.replaced, 3);
    let manifest = unwrap(&out);
    assert_eq!(manifest.xml_text("word/document.xml"), Some("<w:t>lion lion</w:t>"));
    assert_eq!(manifest.xml_text("word/footer1.xml"), Some("<w:t>dog</w:t>"));

    let (_, rerun) = process_archive(&out, &ops, &full_config()).unwrap();
    assert_eq!(rerun.replaced, 0);
}

#[test]
fn test_upsert_then_remove_restores_package() {
    let base = minimal_pptx();
    let before = unwrap(&base);
    let ops = vec![
        ProcessOperation::UpsertPart {
            path: "ppt/slides/slide2.xml".to_string(),
            text: Some("<p:sld/>".to_string()),
            data: None,
            content_type: Some(
                "application/vnd.openxmlformats-officedocument.presentationml.slide+xml"
                    .to_string(),
            ),
        },
        ProcessOperation::remove("ppt/slides/slide2.xml"),
    ];

    let (out, report) = process_archive(&base, &ops, &full_config()).unwrap();
    assert_eq!(report.upserted, 1);
    assert_eq!(report.removed, 1);
    assert_eq!(unwrap(&out).entries, before.entries);
}

#[test]
fn test_upsert_declares_override() {
    let ops = vec![ProcessOperation::UpsertPart {
        path: "/customXml/item1.xml".to_string(),
        text: Some("<root/>".to_string()),
        data: None,
        content_type: Some("application/xml".to_string()),
    }];
    let (out, report) = process_archive(&minimal_pptx(), &ops, &full_config()).unwrap();
    assert!(!report.has_errors());

    let manifest = unwrap(&out);
    let index = ContentTypeIndex::parse(manifest.xml_text(CONTENT_TYPES_PATH).unwrap()).unwrap();
    assert_eq!(
        index.content_type_of("customXml/item1.xml").unwrap().as_deref(),
        Some("application/xml")
    );
}

#[test]
fn test_rename_missing_is_noop_and_errors_are_itemized() {
    let ops = vec![
        ProcessOperation::rename("ppt/slides/slide9.xml", "ppt/slides/slide10.xml"),
        ProcessOperation::UpsertPart {
            path: "ppt/slides/slide3.xml".to_string(),
            text: None,
            data: None,
            content_type: None,
        },
        ProcessOperation::rename("ppt/slides/slide1.xml", "ppt/slides/intro.xml"),
    ];
    let (out, report) = process_archive(&minimal_pptx(), &ops, &full_config()).unwrap();

    assert_eq!(report.renamed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].index, 1);
    assert_eq!(report.errors[0].op, "upsertPart");

    let manifest = unwrap(&out);
    assert!(manifest.get("ppt/slides/intro.xml").is_some());
    assert!(manifest.get("ppt/slides/slide1.xml").is_none());
}

#[test]
fn test_accent_scenario_end_to_end() {
    let mut manifest = unwrap(&minimal_pptx());
    let rules = RulesConfig::from_json(
        r##"{
            "profile": "brand",
            "rules": [{
                "id": "theme-accent1",
                "desc": "Accent 1 is brand blue",
                "where": "ppt/theme/theme1.xml",
                "xpath": "//a:accent1/a:srgbClr/@val",
                "expect": {"hex": "#005BBB"},
                "autofix": true
            }]
        }"##,
    )
    .unwrap();

    let first = validate_manifest(&mut manifest, &rules, &ValidateOptions::default()).unwrap();
    assert_eq!(first.profile, "brand");
    assert_eq!(first.score, 0);
    assert_eq!(first.auto_fixed, 1);
    let violation = &first.violations[0];
    assert_eq!(violation.before.as_deref(), Some("#2277CC"));
    assert_eq!(violation.after.as_deref(), Some("#005BBB"));
    assert!(violation.message.starts_with("Accent 1 is brand blue"));

    // The fix survives a rewrap.
    let archive = rewrap_manifest(&manifest, None, &full_config()).unwrap();
    let mut reopened = unwrap(&archive);
    assert!(reopened.xml_text(THEME).unwrap().contains("005BBB"));

    let second = validate_manifest(&mut reopened, &rules, &ValidateOptions::default()).unwrap();
    assert_eq!(second.score, 100);
    assert!(second.violations.is_empty());
}

#[test]
fn test_disabling_violated_rules_restores_full_score() {
    let mut manifest = unwrap(&minimal_pptx());
    let mut rules = vec![
        Rule::new(
            "accent1",
            THEME,
            "//a:accent1/a:srgbClr/@val",
            Expectation::Hex("#000000".into()),
        ),
        Rule::new(
            "minor-font",
            THEME,
            "//a:minorFont/a:latin/@typeface",
            Expectation::Font("calibri".into()),
        ),
    ];

    let options = ValidateOptions::default();
    let partial = validate_manifest(&mut manifest, &RulesConfig::new(rules.clone()), &options).unwrap();
    assert_eq!(partial.score, 50);

    rules[0].enabled = false;
    let full = validate_manifest(&mut manifest, &RulesConfig::new(rules), &options).unwrap();
    assert_eq!(full.score, 100);
    assert_eq!(full.total_rules, 1);
}

#[test]
fn test_rule_errors_abort_validation() {
    let mut manifest = unwrap(&minimal_pptx());
    let rules = RulesConfig::from_json(
        r#"[{"id": "x", "where": "a.xml", "xpath": "//a", "expect": {"regex": "("}}]"#,
    )
    .unwrap_err();
    assert!(matches!(rules, PartkitError::RuleParse { .. }));

    let duplicate = RulesConfig::new(vec![
        Rule::new("x", "a.xml", "//a", Expectation::Equals("1".into())),
        Rule::new("x", "b.xml", "//b", Expectation::Equals("1".into())),
    ]);
    let err = validate_manifest(&mut manifest, &duplicate, &ValidateOptions::default()).unwrap_err();
    assert!(matches!(err, PartkitError::RuleParse { .. }));
}

#[test]
fn test_filesystem_sessions() {
    let temp = TempDir::new().unwrap();
    let config = EngineConfig::default().with_session_secret(b"integration".to_vec());
    let engine = Engine::new(FsObjectStore::new(temp.path()), config).unwrap();

    let session = engine.new_session().unwrap();
    engine
        .sessions()
        .upload(&session.upload_handle, minimal_pptx())
        .unwrap();

    // A write handle is single-use.
    let again = engine
        .sessions()
        .upload(&session.upload_handle, minimal_pptx())
        .unwrap_err();
    assert!(matches!(again, PartkitError::SessionExpired { .. }));

    let mut manifest = engine.unwrap(Payload::Object(session.input_ref)).unwrap();
    manifest.entries.push(PartEntry::xml("docProps/custom.xml", "<Properties/>"));
    engine
        .rewrap(
            &manifest,
            Some(Payload::Object(session.input_ref)),
            Some(&session.output_ref),
        )
        .unwrap();

    let bytes = engine.sessions().download(&session.download_handle).unwrap();
    assert!(unwrap(&bytes).get("docProps/custom.xml").is_some());
}

#[test]
fn test_foreign_handles_are_rejected() {
    let engine = Engine::in_memory(EngineConfig::default()).unwrap();
    let other = Engine::in_memory(EngineConfig::default()).unwrap();
    let session = other.new_session().unwrap();

    let err = engine
        .sessions()
        .upload(&session.upload_handle, vec![1, 2, 3])
        .unwrap_err();
    assert!(matches!(err, PartkitError::SessionNotFound { .. }));
}
