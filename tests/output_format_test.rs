//! Tests for the JSON and candidate list output formats.
//!
//! These tests pin the field names consumed by downstream purge scripts.

use std::path::PathBuf;

use nestsweep::merge::read_reports;
use nestsweep::report::{self, JsonPurgeReport};
use nestsweep::{FacetRegistry, Pipeline, PurgePolicy, Record};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

/// Run the pipeline over testdata and return JSON output as a parsed struct.
fn run_and_get_json() -> (String, JsonPurgeReport) {
    let testdata = testdata_path();
    let policy_path = testdata.join("policy.yaml");
    let policy = PurgePolicy::parse_file(&policy_path).expect("should parse policy");
    let registry = FacetRegistry::with_defaults();

    let reports = read_reports(&[testdata.join("reports")]).data;
    let outcome = Pipeline::new(&registry, &policy, 1).run(reports);

    let mut buf = Vec::new();
    report::write_json(&mut buf, &policy_path.to_string_lossy(), &outcome)
        .expect("should write JSON");
    let json = String::from_utf8(buf).expect("JSON should be UTF-8");
    let parsed: JsonPurgeReport = serde_json::from_str(&json).expect("should deserialize from JSON");
    (json, parsed)
}

#[test]
fn test_json_report_structure() {
    let (_, report) = run_and_get_json();

    assert!(!report.version.is_empty(), "version should not be empty");
    assert!(report.policy.ends_with("policy.yaml"));
    assert_eq!(report.status, "success");
    assert_eq!(report.files, 2);
    assert_eq!(report.records, 8);
    assert_eq!(report.decisions.len(), 2);
}

#[test]
fn test_json_candidates_format() {
    let (_, report) = run_and_get_json();

    for decision in &report.decisions {
        assert!(
            decision.facet == "SharedParameter" || decision.facet == "LinePattern",
            "unexpected facet {}",
            decision.facet
        );
        for c in &decision.candidates {
            assert!(!c.file.is_empty(), "file should not be empty");
            assert!(!c.identity.is_empty(), "identity should not be empty");
            assert!(!c.name.is_empty(), "name should not be empty");
            assert!(
                c.justification.contains("is not used by"),
                "unexpected justification: {}",
                c.justification
            );
        }
    }

    let lines = &report.decisions[1];
    assert_eq!(lines.retained.len(), 1);
    assert_eq!(lines.retained[0].family, "Window patterns");
}

#[test]
fn test_json_messages_format() {
    let (_, report) = run_and_get_json();

    assert!(!report.messages.is_empty(), "should carry the message log");
    for m in &report.messages {
        assert!(
            m.severity == "error" || m.severity == "warning" || m.severity == "info",
            "severity should be error/warning/info, got {}",
            m.severity
        );
    }
    assert!(report
        .messages
        .iter()
        .any(|m| m.severity == "warning" && m.text.contains("Window_Fixed.csv")));
}

#[test]
fn test_json_field_names() {
    let (json, _) = run_and_get_json();

    assert!(json.contains("\"version\""), "should have 'version' field");
    assert!(json.contains("\"policy\""), "should have 'policy' field");
    assert!(json.contains("\"status\""), "should have 'status' field");
    assert!(json.contains("\"decisions\""), "should have 'decisions' field");
    assert!(json.contains("\"issue_count\""), "should have 'issue_count' field");
    assert!(json.contains("\"messages\""), "should have 'messages' field");

    // Candidate fields
    assert!(json.contains("\"facet\""), "decisions should have 'facet' field");
    assert!(json.contains("\"identity\""), "candidates should have 'identity' field");
    assert!(json.contains("\"justification\""), "candidates should have 'justification' field");
    assert!(json.contains("\"retained\""), "decisions should have 'retained' field");
}

#[test]
fn test_merged_json_round_trips_paths() {
    let reports = read_reports(&[testdata_path().join("reports")]).data;
    let merged = nestsweep::merge(reports).data;

    let mut buf = Vec::new();
    report::write_merged_json(&mut buf, &merged).expect("should write JSON");
    let parsed: Vec<Record> = serde_json::from_slice(&buf).expect("should parse JSON");

    assert_eq!(parsed, merged);
    assert!(String::from_utf8(buf)
        .unwrap()
        .contains("\"Door_Single|Door_Single::Handle\""));
}

#[test]
fn test_candidate_list_lines() {
    let testdata = testdata_path();
    let policy = PurgePolicy::parse_file(testdata.join("policy.yaml")).unwrap();
    let registry = FacetRegistry::with_defaults();
    let reports = read_reports(&[testdata.join("reports")]).data;
    let outcome = Pipeline::new(&registry, &policy, 1).run(reports);

    let mut buf = Vec::new();
    report::write_candidate_list(&mut buf, &outcome.data.decisions).unwrap();
    let text = String::from_utf8(buf).unwrap();

    assert_eq!(text.lines().count(), 3);
    for line in text.lines() {
        assert_eq!(line.split('\t').count(), 4, "bad line: {}", line);
    }
    assert!(text.contains("Door_Single\tLinePattern\tHidden\t"));
}
