use keel_core::{ProcessTypes, ProcfileError};
use proptest::prelude::*;

#[test]
fn parses_single_entry() {
    let types = ProcessTypes::parse_procfile("web: run-server").unwrap();

    assert_eq!(types.len(), 1);
    assert_eq!(types.get("web"), Some("run-server"));
    assert_eq!(types.to_string(), "web: run-server\n");
}

#[test]
fn skips_blank_lines_and_comments() {
    let content = "\n# processes\nweb: bundle exec puma -p $PORT\n\nworker:   bundle exec sidekiq  \n";
    let types = ProcessTypes::parse_procfile(content).unwrap();

    assert_eq!(types.len(), 2);
    assert_eq!(types.get("web"), Some("bundle exec puma -p $PORT"));
    assert_eq!(types.get("worker"), Some("bundle exec sidekiq"));
}

#[test]
fn keeps_colons_inside_commands() {
    let types = ProcessTypes::parse_procfile("web: server --bind 0.0.0.0:5000").unwrap();

    assert_eq!(types.get("web"), Some("server --bind 0.0.0.0:5000"));
}

#[test]
fn empty_content_yields_empty_map() {
    let types = ProcessTypes::parse_procfile("").unwrap();

    assert!(types.is_empty());
}

#[test]
fn rejects_line_without_separator() {
    let result = ProcessTypes::parse_procfile("web: ok\njust a command\n");

    assert!(matches!(
        result,
        Err(ProcfileError::MissingSeparator { line: 2 })
    ));
}

#[test]
fn rejects_invalid_name() {
    let result = ProcessTypes::parse_procfile("my web: run");

    assert!(matches!(result, Err(ProcfileError::InvalidName { line: 1, .. })));
}

#[test]
fn rejects_missing_command() {
    let result = ProcessTypes::parse_procfile("web:");

    assert!(matches!(result, Err(ProcfileError::EmptyCommand { .. })));
}

#[test]
fn rejects_duplicate_names() {
    let result = ProcessTypes::parse_procfile("web: a\nweb: b\n");

    assert!(matches!(result, Err(ProcfileError::Duplicate { line: 2, .. })));
}

#[test]
fn serializes_as_json_object() {
    let types = ProcessTypes::parse_procfile("worker: run-worker\nweb: run-server").unwrap();
    let json = serde_json::to_value(&types).unwrap();

    assert_eq!(
        json,
        serde_json::json!({"web": "run-server", "worker": "run-worker"})
    );
}

// ── Release metadata ──

#[test]
fn parses_release_default_process_types() {
    let release = "---\naddons: []\ndefault_process_types:\n  web: bin/start-web\n  console: bin/console\n";
    let types = ProcessTypes::parse_release(release).unwrap();

    assert_eq!(types.len(), 2);
    assert_eq!(types.get("web"), Some("bin/start-web"));
    assert_eq!(types.get("console"), Some("bin/console"));
}

#[test]
fn release_without_process_types_is_empty() {
    let types = ProcessTypes::parse_release("---\naddons: []\n").unwrap();

    assert!(types.is_empty());
}

#[test]
fn release_with_invalid_yaml_is_an_error() {
    let result = ProcessTypes::parse_release("default_process_types: [unclosed");

    assert!(matches!(result, Err(ProcfileError::Release { .. })));
}

proptest! {
    #[test]
    fn procfile_text_survives_reparse(
        entries in proptest::collection::btree_map(
            "[a-z][a-z0-9_-]{0,11}",
            "[a-z./$][a-zA-Z0-9 ./$:=-]{0,30}[a-z0-9]",
            0..6,
        )
    ) {
        let original: ProcessTypes = entries.into_iter().collect();
        let reparsed = ProcessTypes::parse_procfile(&original.to_string()).unwrap();
        prop_assert_eq!(reparsed, original);
    }
}
