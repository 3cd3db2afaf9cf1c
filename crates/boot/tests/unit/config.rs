//! # Configuration Store Tests
//!
//! Loading from disk, typed lookups, overrides, the error channel, locking and
//! the report dump.

use std::fs;

use esesc_boot::common::{BootError, ConfError};
use esesc_boot::report::ReportSink;
use esesc_boot::{ConfArgs, ConfStore, FileReport};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

fn store() -> ConfStore {
    ConfStore::from_value(json!({
        "reportFile": "run",
        "cpusimu": ["core"],
        "core": { "inorder": "true", "sp_per_sm": 8, "name": "big", "freq": 2.5 }
    }))
    .unwrap()
}

#[test]
fn test_load_applies_overrides_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("esesc.json");
    fs::write(&path, r#"{"reportFile":"run","core":{"inorder":false}}"#).unwrap();

    let args = ConfArgs::new(&path)
        .with_override("core:inorder=true")
        .with_override("reportFile=first")
        .with_override("reportFile=second");
    let conf = ConfStore::load(&args).unwrap();

    assert!(conf.get_bool("core", "inorder").unwrap());
    assert_eq!(conf.get_str("", "reportFile").unwrap(), "second");
    assert!(conf.check());
}

#[test]
fn test_malformed_override_is_recorded_for_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("esesc.json");
    fs::write(&path, r#"{"reportFile":"run"}"#).unwrap();

    let conf = ConfStore::load(&ConfArgs::new(&path).with_override("nonsense")).unwrap();

    assert!(!conf.check());
    assert_eq!(
        conf.errors(),
        &[ConfError::BadOverride("nonsense".to_owned())]
    );
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfStore::load(&ConfArgs::new(dir.path().join("absent.json"))).unwrap_err();
    assert!(matches!(err, BootError::ConfRead { .. }), "{err}");
}

#[test]
fn test_invalid_json_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    let err = ConfStore::load(&ConfArgs::new(&path)).unwrap_err();
    assert!(matches!(err, BootError::ConfParse { .. }), "{err}");
}

#[test]
fn test_non_object_document_is_rejected() {
    let err = ConfStore::from_value(json!(["core", "core"])).unwrap_err();
    assert!(matches!(err, BootError::ConfShape));
}

#[rstest]
#[case::absent_key("absent", ConfError::MissingField { section: "core".into(), key: "absent".into() })]
#[case::number("sp_per_sm", ConfError::WrongType { section: "core".into(), key: "sp_per_sm".into(), expected: "a string" })]
fn test_get_str_errors(#[case] key: &str, #[case] expected: ConfError) {
    assert_eq!(store().get_str("core", key).unwrap_err(), expected);
}

#[test]
fn test_boolean_accepts_strings_and_integers() {
    let conf = store();
    assert!(conf.get_bool("core", "inorder").unwrap());
    assert!(conf.get_bool("core", "sp_per_sm").unwrap());
    assert!(conf.get_bool("core", "name").is_err());
    assert!(conf.get_bool_or("core", "name", false).is_err());
    assert!(conf.get_bool_or("core", "missing", true).unwrap());
}

#[test]
fn test_numeric_lookups() {
    let conf = store();
    assert_eq!(conf.get_int("core", "sp_per_sm").unwrap(), 8);
    assert!(conf.get_int("core", "freq").is_err());
    assert!((conf.get_double("core", "freq").unwrap() - 2.5).abs() < f64::EPSILON);
    assert!((conf.get_double("core", "sp_per_sm").unwrap() - 8.0).abs() < f64::EPSILON);
}

#[test]
fn test_record_past_end_names_the_index() {
    let err = store().record("", "cpusimu", 3).unwrap_err();
    assert_eq!(
        err,
        ConfError::MissingRecord {
            section: String::new(),
            key: "cpusimu".into(),
            index: 3,
        }
    );
}

#[test]
fn test_locked_store_rejects_writes() {
    let mut conf = store();
    assert!(conf.lock());
    assert!(conf.is_locked());

    let err = conf.set("core", "inorder", json!(false)).unwrap_err();
    assert_eq!(
        err,
        ConfError::Locked {
            section: "core".into(),
            key: "inorder".into(),
        }
    );
    assert!(conf.apply_override("core:inorder=false").is_err());
    assert!(conf.get_bool("core", "inorder").unwrap());
}

#[test]
fn test_errors_accumulate_in_order() {
    let mut conf = store();
    conf.not_correct(ConfError::BadOverride("a".into()));
    conf.not_correct(ConfError::BadOverride("b".into()));
    assert_eq!(
        conf.errors(),
        &[
            ConfError::BadOverride("a".into()),
            ConfError::BadOverride("b".into())
        ]
    );
    assert!(!conf.lock());
}

#[test]
fn test_dump_writes_root_then_sections() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FileReport::new(dir.path());
    sink.open("conf.txt").unwrap();
    store().dump(&mut sink).unwrap();
    sink.close().unwrap();

    let text = fs::read_to_string(dir.path().join("conf.txt")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "#BEGIN_CONFIGURATION",
            "cpusimu=core",
            "reportFile=run",
            "[core]",
            "freq=2.5",
            "inorder=true",
            "name=big",
            "sp_per_sm=8",
            "#END_CONFIGURATION",
        ]
    );
}
