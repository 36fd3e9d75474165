//! Command-line interface for nestsweep.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunk::{distribute_workload, worker_count_from_env};
use crate::facet::FacetRegistry;
use crate::merge::{combine_with_previous, merge, read_report, read_reports, FileReport};
use crate::outcome::{Message, Outcome, Severity};
use crate::pipeline::{walk_library, Pipeline};
use crate::policy::{self, PurgePolicy};
use crate::propagate::{PropagationScope, UsagePropagator};
use crate::record::write_records;
use crate::report;
use crate::walk::ComponentLibrary;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Nested component dependency aggregation.
///
/// Walks each top-level family's nested tree, merges the per-file reports,
/// propagates usage bottom-up and lists resources that are safe to purge.
#[derive(Parser)]
#[command(name = "nestsweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk every top-level component of a manifest and write one report per file
    Walk(WalkArgs),
    /// Merge per-file reports into one table
    Merge(MergeArgs),
    /// Decide which unused resources can be purged
    Purge(PurgeArgs),
    /// Split files into weighted task lists for parallel host sessions
    Distribute(DistributeArgs),
    /// Create a new purge policy from a template
    Init(InitArgs),
}

/// Arguments for the walk command.
#[derive(Args)]
pub struct WalkArgs {
    /// Component library manifest (YAML or JSON)
    pub manifest: PathBuf,

    /// Directory for the per-file CSV reports
    #[arg(short, long, default_value = "reports")]
    pub out: PathBuf,
}

/// Arguments for the merge command.
#[derive(Args)]
pub struct MergeArgs {
    /// Report files or directories containing *.csv reports
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Previously merged table to combine with
    #[arg(long)]
    pub previous: Option<PathBuf>,

    /// Propagate usage before writing
    #[arg(long)]
    pub propagate: bool,

    /// Propagation scope: per_file or global
    #[arg(long, default_value = "per_file")]
    pub scope: String,

    /// Output format: csv or json
    #[arg(short, long, default_value = "csv")]
    pub format: String,
}

/// Arguments for the purge command.
#[derive(Args)]
pub struct PurgeArgs {
    /// Report files or directories containing *.csv reports
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Path to policy YAML file (default: auto-discover)
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Write the candidate id list to this file
    #[arg(long)]
    pub candidates: Option<PathBuf>,

    /// Write the merged, propagated table to this file (CSV)
    #[arg(long)]
    pub merged: Option<PathBuf>,

    /// Worker count for the post-walk scan
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Show info messages in pretty output
    #[arg(long)]
    pub show_info: bool,
}

/// Arguments for the distribute command.
#[derive(Args)]
pub struct DistributeArgs {
    /// Directory to search for files
    pub dir: PathBuf,

    /// Number of task lists
    #[arg(short, long, default_value_t = 2)]
    pub buckets: usize,

    /// Directory for tasklist_<n>.txt files
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// File extension to include
    #[arg(short, long, default_value = "rfa")]
    pub extension: String,
}

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "nestsweep.yaml")]
    pub output: PathBuf,

    /// Template to use
    #[arg(short, long, default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// List available templates
    #[arg(short, long)]
    pub list: bool,
}

const DEFAULT_TEMPLATE: &str = "minimal";

/// Available policy templates.
#[derive(Debug)]
struct Template {
    name: &'static str,
    description: &'static str,
    content: &'static str,
}

/// All available templates.
static TEMPLATES: &[Template] = &[
    Template {
        name: "minimal",
        description: "Purge unused shared parameters and line patterns per file",
        content: include_str!("templates/minimal.yaml"),
    },
    Template {
        name: "shared-parameters",
        description: "Shared parameters only, with archived files excluded",
        content: include_str!("templates/shared-parameters.yaml"),
    },
    Template {
        name: "ceiling-guards",
        description: "Line patterns with retain-one guards for ceiling families",
        content: include_str!("templates/ceiling-guards.yaml"),
    },
];

/// Dispatch a parsed command line.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Walk(args) => run_walk(args, cli.quiet),
        Commands::Merge(args) => run_merge(args),
        Commands::Purge(args) => run_purge(args),
        Commands::Distribute(args) => run_distribute(args),
        Commands::Init(args) => run_init(args),
    }
}

/// Print warnings and errors from an outcome to stderr.
fn print_messages(messages: &[Message]) {
    for m in messages.iter().filter(|m| m.severity != Severity::Info) {
        eprintln!("{}: {}", capitalize(&m.severity.to_string()), m.text);
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn exit_code<T>(outcome: &Outcome<T>) -> i32 {
    if outcome.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILED
    }
}

/// Report file name for a file identifier: its stem, made unique.
fn report_file_name(file_id: &str, used: &mut HashSet<String>) -> String {
    let stem = Path::new(file_id)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "report".to_string());

    let mut name = stem.clone();
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{}_{}", stem, n);
        n += 1;
    }
    format!("{}.csv", name)
}

/// Run the walk command.
pub fn run_walk(args: &WalkArgs, quiet: bool) -> anyhow::Result<i32> {
    let library = match ComponentLibrary::parse_file(&args.manifest) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error parsing manifest: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let registry = FacetRegistry::with_defaults();
    let total = library.top_level().len() as u64;

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓▒░"),
    );

    let outcome = walk_library(&library, &registry, |walk| {
        pb.set_message(walk.file_id.clone());
        pb.inc(1);
    });
    pb.finish_and_clear();

    fs::create_dir_all(&args.out)?;
    let mut used = HashSet::new();
    for file_report in &outcome.data {
        let path = args.out.join(report_file_name(&file_report.file_id, &mut used));
        let writer = BufWriter::new(File::create(&path)?);
        write_records(writer, &file_report.records)?;
    }

    print_messages(&outcome.messages);
    println!(
        "Wrote {} reports ({} records) to {}",
        outcome.data.len(),
        outcome.data.iter().map(|r| r.records.len()).sum::<usize>(),
        args.out.display()
    );

    Ok(exit_code(&outcome))
}

fn parse_scope(s: &str) -> Option<PropagationScope> {
    match s {
        "per_file" | "per-file" => Some(PropagationScope::PerFile),
        "global" => Some(PropagationScope::Global),
        _ => None,
    }
}

/// Run the merge command.
pub fn run_merge(args: &MergeArgs) -> anyhow::Result<i32> {
    if args.format != "csv" && args.format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'csv' or 'json'", args.format);
        return Ok(EXIT_ERROR);
    }
    let scope = match parse_scope(&args.scope) {
        Some(s) => s,
        None => {
            eprintln!("Error: invalid scope {:?}, must be 'per_file' or 'global'", args.scope);
            return Ok(EXIT_ERROR);
        }
    };

    let mut outcome: Outcome<()> = Outcome::success(());
    let reports: Vec<FileReport> = outcome.absorb(read_reports(&args.inputs));
    let mut records = outcome.absorb(merge(reports));

    if let Some(previous) = &args.previous {
        let previous = read_report(previous)?;
        let previous = outcome.absorb(previous);
        let combined = combine_with_previous(previous.records, records);
        records = outcome.absorb(combined);
    }

    if args.propagate {
        let propagated = UsagePropagator::new(scope).propagate(records);
        records = outcome.absorb(propagated);
    }

    match &args.out {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            if args.format == "json" {
                report::write_merged_json(writer, &records)?;
            } else {
                report::write_merged_csv(writer, &records)?;
            }
        }
        None => {
            let stdout = io::stdout().lock();
            if args.format == "json" {
                report::write_merged_json(stdout, &records)?;
            } else {
                report::write_merged_csv(stdout, &records)?;
            }
        }
    }

    print_messages(&outcome.messages);
    Ok(exit_code(&outcome))
}

/// Load the policy named on the command line, or discover one, or use the
/// defaults.
fn load_policy(path: Option<&Path>) -> anyhow::Result<(String, PurgePolicy)> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => policy::discover(Path::new(".")),
    };
    match path {
        Some(p) => {
            let policy = PurgePolicy::parse_file(&p)
                .map_err(|e| anyhow::anyhow!("error parsing policy {}: {}", p.display(), e))?;
            Ok((p.display().to_string(), policy))
        }
        None => Ok(("(default)".to_string(), PurgePolicy::default())),
    }
}

/// Run the purge command.
pub fn run_purge(args: &PurgeArgs) -> anyhow::Result<i32> {
    let env_workers = worker_count_from_env();

    if args.format != "pretty" && args.format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", args.format);
        return Ok(EXIT_ERROR);
    }

    let (policy_name, mut policy) = match load_policy(args.policy.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    if let Some(workers) = args.workers {
        policy.workers = Some(workers);
    }

    let registry = FacetRegistry::with_defaults();
    if let Err(e) = policy::validate(&policy, &registry) {
        eprintln!("Error: invalid policy: {}", e);
        return Ok(EXIT_ERROR);
    }

    let mut reports = read_reports(&args.inputs);
    let files = std::mem::take(&mut reports.data);
    let pipeline = Pipeline::new(&registry, &policy, env_workers);
    tracing::debug!(workers = pipeline.chunker().workers(), "pipeline configured");
    let outcome = reports.combine(pipeline.run(files), |_, output| output);

    if let Some(path) = &args.merged {
        report::write_merged_csv(BufWriter::new(File::create(path)?), &outcome.data.records)?;
    }
    if let Some(path) = &args.candidates {
        report::write_candidate_list(BufWriter::new(File::create(path)?), &outcome.data.decisions)?;
    }

    match args.format.as_str() {
        "json" => report::write_json(io::stdout().lock(), &policy_name, &outcome)?,
        _ => report::write_pretty(&policy_name, &outcome, args.show_info),
    }

    Ok(exit_code(&outcome))
}

/// Run the distribute command.
pub fn run_distribute(args: &DistributeArgs) -> anyhow::Result<i32> {
    if args.buckets == 0 {
        eprintln!("Error: --buckets must be at least 1");
        return Ok(EXIT_ERROR);
    }
    if !args.dir.is_dir() {
        eprintln!("Error: not a directory: {}", args.dir.display());
        return Ok(EXIT_ERROR);
    }

    let extension = args.extension.trim_start_matches('.');
    let mut files = Vec::new();
    for entry in WalkDir::new(&args.dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches {
            let size = entry.metadata()?.len();
            files.push((entry.into_path(), size));
        }
    }
    files.sort();

    if files.is_empty() {
        eprintln!("Warning: no *.{} files found in {}", extension, args.dir.display());
        return Ok(EXIT_SUCCESS);
    }

    let buckets = distribute_workload(args.buckets, files, |(_, size)| *size);

    fs::create_dir_all(&args.out)?;
    for (i, bucket) in buckets.iter().enumerate() {
        let path = args.out.join(format!("tasklist_{}.txt", i + 1));
        let lines: Vec<String> = bucket
            .items
            .iter()
            .map(|(p, _)| p.display().to_string())
            .collect();
        fs::write(&path, lines.join("\n") + "\n")?;
        println!(
            "{}: {} files, {} bytes",
            path.display(),
            bucket.items.len(),
            bucket.weight
        );
    }

    Ok(EXIT_SUCCESS)
}

/// Run the init command: list templates or write one out as a policy file.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.list {
        list_templates();
        return Ok(EXIT_SUCCESS);
    }

    let written = find_template(&args.template)
        .and_then(|template| write_template(template, &args.output).map(|()| template));

    match written {
        Ok(template) => {
            println!("Wrote policy '{}' to {}", template.name, args.output.display());
            println!("Try it: nestsweep purge <reports> --policy {}", args.output.display());
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            Ok(EXIT_ERROR)
        }
    }
}

fn find_template(name: &str) -> anyhow::Result<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name).ok_or_else(|| {
        let known: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
        anyhow::anyhow!("unknown template {:?}, expected one of: {}", name, known.join(", "))
    })
}

/// Write a template to `output`, creating parent directories. Never
/// overwrites an existing file.
fn write_template(template: &Template, output: &Path) -> anyhow::Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists, choose another --output", output.display());
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::write(output, template.content)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

/// Facets a template decides on, resolved against the default registry.
fn template_facets(template: &Template) -> String {
    match serde_yaml::from_str::<PurgePolicy>(template.content) {
        Ok(policy) => policy
            .facets_or_default(&FacetRegistry::with_defaults())
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        Err(_) => "?".to_string(),
    }
}

fn list_templates() {
    for template in TEMPLATES {
        let marker = if template.name == DEFAULT_TEMPLATE { "*" } else { " " };
        println!("{} {:<18} [{}]", marker, template.name, template_facets(template));
        println!("    {}", template.description);
    }
    println!("(* default)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_report_file_names_unique() {
        let mut used = HashSet::new();
        assert_eq!(report_file_name("lib/Door.rfa", &mut used), "Door.csv");
        assert_eq!(report_file_name("other/Door.rfa", &mut used), "Door_2.csv");
        assert_eq!(report_file_name("Window", &mut used), "Window.csv");
    }

    #[test]
    fn test_parse_scope() {
        assert_eq!(parse_scope("global"), Some(PropagationScope::Global));
        assert_eq!(parse_scope("per-file"), Some(PropagationScope::PerFile));
        assert_eq!(parse_scope("everywhere"), None);
    }

    #[test]
    fn test_init_writes_template() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("policies").join("nestsweep.yaml");
        let args = InitArgs {
            output: output.clone(),
            template: "ceiling-guards".to_string(),
            list: false,
        };
        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);
        let policy = PurgePolicy::parse_file(&output).unwrap();
        assert_eq!(policy.guards.len(), 2);

        // Refuses to overwrite.
        assert_eq!(run_init(&args).unwrap(), EXIT_ERROR);
    }

    #[test]
    fn test_init_rejects_unknown_template() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("nestsweep.yaml");
        let args = InitArgs {
            output: output.clone(),
            template: "everything".to_string(),
            list: false,
        };
        assert_eq!(run_init(&args).unwrap(), EXIT_ERROR);
        assert!(!output.exists());

        let err = find_template("everything").unwrap_err().to_string();
        assert!(err.contains("minimal, shared-parameters, ceiling-guards"));
    }

    #[test]
    fn test_templates_parse_as_policies() {
        for template in TEMPLATES {
            assert_ne!(template_facets(template), "?", "{}", template.name);
        }
        assert!(find_template(DEFAULT_TEMPLATE).is_ok());
        assert_eq!(
            template_facets(find_template("shared-parameters").unwrap()),
            "SharedParameter"
        );
    }

    #[test]
    fn test_distribute_writes_task_lists() {
        let temp = TempDir::new().unwrap();
        let lib = temp.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("a.rfa"), vec![0u8; 300]).unwrap();
        fs::write(lib.join("b.rfa"), vec![0u8; 200]).unwrap();
        fs::write(lib.join("c.rfa"), vec![0u8; 150]).unwrap();
        fs::write(lib.join("notes.txt"), "skip").unwrap();

        let out = temp.path().join("tasks");
        let args = DistributeArgs {
            dir: lib,
            buckets: 2,
            out: out.clone(),
            extension: "rfa".to_string(),
        };
        assert_eq!(run_distribute(&args).unwrap(), EXIT_SUCCESS);

        let first = fs::read_to_string(out.join("tasklist_1.txt")).unwrap();
        let second = fs::read_to_string(out.join("tasklist_2.txt")).unwrap();
        assert_eq!(first.lines().count(), 1);
        assert!(first.contains("a.rfa"));
        assert_eq!(second.lines().count(), 2);
    }
}
