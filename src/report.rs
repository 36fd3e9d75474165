//! Output formatting for pipeline results.
//!
//! Supports:
//! - Merged table as CSV (the row format read back by `merge`) or JSON
//! - Purge report as JSON for programmatic consumption
//! - Pretty: colored terminal output for human review
//! - Candidate list: one tab-separated line per id with its justification

use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

use crate::outcome::{Message, Outcome, Severity, Status};
use crate::pipeline::PipelineOutput;
use crate::purge::PurgeDecision;
use crate::record::{write_records, Record};

// =============================================================================
// Merged table
// =============================================================================

/// Write the merged table as CSV with a header row.
pub fn write_merged_csv<W: Write>(writer: W, records: &[Record]) -> anyhow::Result<()> {
    write_records(writer, records)
}

/// Write the merged table as a JSON array.
pub fn write_merged_json<W: Write>(mut writer: W, records: &[Record]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    Ok(())
}

// =============================================================================
// JSON purge report
// =============================================================================

/// JSON purge report.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonPurgeReport {
    pub version: String,
    pub policy: String,
    pub status: String,
    pub records: usize,
    pub files: usize,
    pub decisions: Vec<JsonDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_families: Vec<JsonMissingFamily>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub circular: Vec<String>,
    pub issue_count: usize,
    pub messages: Vec<JsonMessage>,
}

/// Candidates and retained entries for one facet.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonDecision {
    pub facet: String,
    pub candidates: Vec<JsonCandidate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retained: Vec<JsonRetained>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonCandidate {
    pub file: String,
    pub identity: String,
    pub name: String,
    pub justification: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRetained {
    pub file: String,
    pub identity: String,
    pub family: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonMissingFamily {
    pub name: String,
    pub category: String,
    pub referenced_from: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonMessage {
    pub severity: String,
    pub text: String,
}

/// Build the JSON report for a pipeline outcome.
pub fn build_json_report(policy_name: &str, outcome: &Outcome<PipelineOutput>) -> JsonPurgeReport {
    let output = &outcome.data;
    JsonPurgeReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        policy: policy_name.to_string(),
        status: outcome.status.to_string(),
        records: output.records.len(),
        files: output.scan.files.len(),
        decisions: output.decisions.iter().map(decision_to_json).collect(),
        missing_families: output
            .missing
            .iter()
            .map(|m| JsonMissingFamily {
                name: m.name.clone(),
                category: m.category.clone(),
                referenced_from: m.referenced_from.clone(),
            })
            .collect(),
        circular: output.scan.circular.iter().map(|c| c.to_string()).collect(),
        issue_count: output.scan.issues.len(),
        messages: outcome.messages.iter().map(message_to_json).collect(),
    }
}

/// Write the purge report in JSON format.
pub fn write_json<W: Write>(
    mut writer: W,
    policy_name: &str,
    outcome: &Outcome<PipelineOutput>,
) -> anyhow::Result<()> {
    let report = build_json_report(policy_name, outcome);
    let json = serde_json::to_string_pretty(&report)?;
    writeln!(writer, "{}", json)?;
    Ok(())
}

fn decision_to_json(decision: &PurgeDecision) -> JsonDecision {
    JsonDecision {
        facet: decision.facet_type.to_string(),
        candidates: decision
            .candidates
            .iter()
            .map(|c| JsonCandidate {
                file: c.file_id.clone(),
                identity: c.identity_key.clone(),
                name: c.resource_name.clone(),
                justification: c.justification.clone(),
            })
            .collect(),
        retained: decision
            .retained
            .iter()
            .map(|r| JsonRetained {
                file: r.candidate.file_id.clone(),
                identity: r.candidate.identity_key.clone(),
                family: r.family.clone(),
                reason: r.reason.clone(),
            })
            .collect(),
    }
}

fn message_to_json(m: &Message) -> JsonMessage {
    JsonMessage {
        severity: m.severity.to_string(),
        text: m.text.clone(),
    }
}

// =============================================================================
// Candidate list
// =============================================================================

/// Write one line per candidate: `file<TAB>facet<TAB>identity<TAB>justification`.
pub fn write_candidate_list<W: Write>(mut writer: W, decisions: &[PurgeDecision]) -> anyhow::Result<()> {
    for decision in decisions {
        for c in &decision.candidates {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                c.file_id, c.facet_type, c.identity_key, c.justification
            )?;
        }
    }
    Ok(())
}

// =============================================================================
// Pretty format
// =============================================================================

/// Write the purge result in pretty (human-readable) format.
pub fn write_pretty(policy_name: &str, outcome: &Outcome<PipelineOutput>, show_info: bool) {
    let output = &outcome.data;

    println!();
    print!("  ");
    print!("{}", "nestsweep".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Policy:  ".dimmed());
    println!("{}", policy_name);
    print!("  {}", "Records: ".dimmed());
    println!("{} in {} files", output.records.len(), output.scan.files.len());
    println!();

    for decision in &output.decisions {
        write_decision(decision);
        println!();
    }

    if !output.missing.is_empty() {
        println!("  {} ({}):", "Never walked as top-level".bold(), output.missing.len());
        for m in &output.missing {
            println!("    {} {}", m.name.blue(), format!("({})", m.category).dimmed());
        }
        println!();
    }

    write_messages(&outcome.messages, show_info);
    write_final_status(outcome.status, output.candidate_count());
    println!();
}

fn write_decision(decision: &PurgeDecision) {
    println!(
        "  {} ({} candidates):",
        decision.facet_type.to_string().bold(),
        decision.candidates.len()
    );

    let mut by_file: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for c in &decision.candidates {
        by_file
            .entry(c.file_id.as_str())
            .or_default()
            .push(c.resource_name.as_str());
    }
    for (file, names) in by_file {
        println!("    {}", file.blue());
        for name in names {
            println!("        {} {}", "-".red(), name);
        }
    }

    for r in &decision.retained {
        println!(
            "    {} {} {}",
            "KEEP".green(),
            r.candidate.resource_name,
            format!("({})", r.reason).dimmed()
        );
    }
}

fn write_messages(messages: &[Message], show_info: bool) {
    let shown: Vec<&Message> = messages
        .iter()
        .filter(|m| show_info || m.severity != Severity::Info)
        .collect();
    if shown.is_empty() {
        return;
    }

    println!("  {} ({}):", "Messages".bold(), shown.len());
    for m in shown {
        write_severity_tag(m.severity);
        println!("{}", m.text);
    }
    println!();
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
        Severity::Info => print!("    {} ", "INFO ".blue()),
    }
}

fn write_final_status(status: Status, candidates: usize) {
    print!("  {}", format!("Candidates: {}", candidates).dimmed());
    print!("  ");
    match status {
        Status::Success => print!("{}", "SUCCESS".green()),
        Status::Failed => print!("{}", "FAILED".red()),
    }
    println!();
}
