//! bmad-auto - menu detection and selection for BMAD workflow output.
//!
//! Reads agent output from a file or stdin and reports what the automation
//! layer would do with it.

#![allow(clippy::single_match_else)]

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bmad_automation::control::{Checkpoint, LoggedOperation};
use bmad_automation::core::{Config, SessionStore};
use bmad_automation::detection::{detect_checklist, detect_verdict, MenuDetector};
use bmad_automation::selection::{ThresholdEvaluator, ValidationMetrics};
use bmad_automation::workflow::{classify_tier, ProjectTier, WorkflowDefinition};
use bmad_automation::AutomationSession;

/// Menu detection and selection for BMAD workflow automation
#[derive(Parser)]
#[command(name = "bmad-auto")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect menus, run the guards and show confidence scores
    Detect {
        /// Output file to read (stdin when omitted)
        file: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Route the best menu through the selector
    Select {
        /// Output file to read (stdin when omitted)
        file: Option<PathBuf>,

        /// Validation metrics, e.g. "blocking_errors=0, major_issues=1, compliance_score=90"
        #[arg(short, long)]
        metrics: Option<String>,

        /// Project tier (0-4)
        #[arg(short, long, default_value_t = 2)]
        tier: u8,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Session id; selection history is restored from and saved to the cache
        #[arg(long)]
        session: Option<String>,
    },

    /// Check validation metrics against the escalation thresholds
    Evaluate {
        /// Metrics as key=value pairs
        metrics: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Render a checkpoint from an operation log (one `action: detail` per line)
    Checkpoint {
        /// Log file to read (stdin when omitted)
        file: Option<PathBuf>,

        /// Confidence that decides the format
        #[arg(short, long)]
        confidence: f64,

        /// Show the full log regardless of format
        #[arg(short, long)]
        expand: bool,
    },

    /// Validate a workflow definition's front matter and required inputs
    Validate {
        /// Workflow document
        workflow: PathBuf,

        /// Directory required inputs are resolved against (defaults to the workflow's directory)
        #[arg(short, long)]
        base_dir: Option<PathBuf>,
    },

    /// Show the validation verdict and checklist progress
    Verdict {
        /// Output file to read (stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Classify a project into a tier
    Tier {
        /// Project description
        description: String,

        /// Known story count
        #[arg(short, long)]
        stories: Option<u32>,
    },

    /// Show the effective configuration
    Config {
        /// Print the config directory instead
        #[arg(long)]
        path: bool,

        /// Write the effective configuration to the global config file
        #[arg(long, conflicts_with = "path")]
        init: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Detect { file, format } => cmd_detect(file.as_deref(), &format),
        Commands::Select { file, metrics, tier, format, session } => {
            cmd_select(file.as_deref(), metrics.as_deref(), tier, &format, session.as_deref())
        }
        Commands::Evaluate { metrics, format } => cmd_evaluate(&metrics, &format),
        Commands::Checkpoint { file, confidence, expand } => {
            cmd_checkpoint(file.as_deref(), confidence, expand)
        }
        Commands::Validate { workflow, base_dir } => cmd_validate(&workflow, base_dir.as_deref()),
        Commands::Verdict { file } => cmd_verdict(file.as_deref()),
        Commands::Tier { description, stories } => cmd_tier(&description, stories),
        Commands::Config { path, init } => cmd_config(path, init),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

/// Read a file, or stdin when no path is given.
fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn load_config() -> Result<Config> {
    let config = Config::load()?;
    if let Err(failure) = config.validate() {
        tracing::warn!(%failure, "Configuration has problems");
    }
    Ok(config)
}

/// Detect menus in agent output.
fn cmd_detect(file: Option<&Path>, format: &str) -> Result<()> {
    let config = load_config()?;
    let text = read_input(file)?;
    let report = MenuDetector::from_config(&config.guards).analyze(&text);

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{json}");
        }
        _ => {
            for accepted in &report.accepted {
                let options: Vec<String> =
                    accepted.candidate.options().iter().map(ToString::to_string).collect();
                println!(
                    "[ACCEPT] {} {}: {}",
                    accepted.candidate.menu_type(),
                    accepted.score,
                    options.join(", ")
                );
            }
            for rejected in &report.rejected {
                println!(
                    "[VETO]   {} {}: {}",
                    rejected.candidate.menu_type(),
                    rejected.verdict.guard,
                    rejected.verdict.reason
                );
            }
            println!(
                "\nTotal: {} accepted, {} rejected",
                report.accepted.len(),
                report.rejected.len()
            );
        }
    }

    Ok(())
}

/// Run output through the full selection pipeline.
fn cmd_select(
    file: Option<&Path>,
    metrics: Option<&str>,
    tier: u8,
    format: &str,
    session_id: Option<&str>,
) -> Result<()> {
    let config = load_config()?;
    let tier = ProjectTier::from_u8(tier)
        .ok_or_else(|| anyhow::anyhow!("Tier must be between 0 and 4, got {tier}"))?;
    let metrics = metrics.map(ValidationMetrics::parse).transpose()?;
    let text = read_input(file)?;

    let store = match session_id {
        Some(_) => Some(
            SessionStore::from_config(&config.cache)
                .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?,
        ),
        None => None,
    };

    let mut session = AutomationSession::new(config, tier);
    if let (Some(id), Some(store)) = (session_id, &store) {
        session = session.with_id(id);
        session.restore_history(store).context("Failed to restore selection history")?;
    }

    let outcome = session.process_output_with_metrics(&text, metrics.as_ref())?;

    if let Some(store) = &store {
        session.persist_history(store).context("Failed to save selection history")?;
        tracing::debug!(session = session.id(), records = session.history().len(), "Saved history");
    }

    if format == "json" {
        let json = serde_json::to_string_pretty(&outcome)?;
        println!("{json}");
        return Ok(());
    }

    let Some(selection) = &outcome.selection else {
        println!("No menu detected");
        return Ok(());
    };

    println!("Menu:       {}", selection.candidate().menu_type());
    println!("Confidence: {:.0}", selection.confidence());
    println!("Route:      {}", selection.route());
    if session_id.is_some() {
        println!("History:    {} selection(s)", session.history().len());
    }

    if let Some(escalation) = selection.escalation() {
        println!("Escalation: {}", escalation.action);
        for reason in &escalation.reasons {
            println!("  - {reason}");
        }
    }
    if let Some(chosen) = selection.chosen() {
        println!("Selected:   {chosen}");
    } else if let Some(proposed) = selection.proposed() {
        println!("Recommend:  {proposed}");
    }
    if selection.chosen().is_none() {
        println!("Options:");
        for option in selection.candidate().options() {
            println!("  {option}");
        }
    }
    if let Some(context) = &outcome.entered {
        println!("Entered:    {} (depth {})", context.kind, context.depth);
    }
    if let Some(checkpoint) = &outcome.checkpoint {
        println!("\n{checkpoint}");
    }

    Ok(())
}

/// Evaluate metrics against the escalation thresholds.
fn cmd_evaluate(metrics: &str, format: &str) -> Result<()> {
    let config = load_config()?;
    let metrics = ValidationMetrics::parse(metrics)?;
    let outcome = ThresholdEvaluator::new(config.escalation).evaluate(&metrics);

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&outcome)?;
            println!("{json}");
        }
        _ => {
            println!("Action: {}", outcome.action);
            for reason in &outcome.reasons {
                println!("  - {reason}");
            }
        }
    }

    Ok(())
}

/// Render a checkpoint from a log.
fn cmd_checkpoint(file: Option<&Path>, confidence: f64, expand: bool) -> Result<()> {
    let text = read_input(file)?;
    let operations: Vec<LoggedOperation> =
        text.lines().filter_map(LoggedOperation::parse_line).collect();

    let mut checkpoint = Checkpoint::new(confidence, operations);
    if expand {
        checkpoint.toggle_expanded();
    }

    println!("Format: {}", checkpoint.format());
    println!("{checkpoint}");
    Ok(())
}

/// Validate a workflow definition.
fn cmd_validate(workflow: &Path, base_dir: Option<&Path>) -> Result<()> {
    let document = read_input(Some(workflow))?;
    let base_dir = base_dir
        .map(Path::to_path_buf)
        .or_else(|| workflow.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let definition = WorkflowDefinition::validate(&document, &base_dir)?;

    println!("Workflow '{}' is valid", definition.name);
    if let Some(description) = &definition.description {
        println!("  {description}");
    }
    println!("  Required config: {}", definition.required_config.len());
    println!("  Required inputs: {}", definition.required_inputs.len());
    Ok(())
}

/// Show verdict and checklist progress.
fn cmd_verdict(file: Option<&Path>) -> Result<()> {
    let text = read_input(file)?;

    match detect_verdict(&text) {
        Some(found) => {
            let source = if found.explicit { "explicit" } else { "inferred" };
            println!("Verdict: {} ({}, '{}')", found.verdict, source, found.keyword);
        }
        None => println!("Verdict: none"),
    }

    let checklist = detect_checklist(&text);
    if checklist.total() > 0 {
        println!("Checklist: {}/{} complete", checklist.done(), checklist.total());
        for item in checklist.pending() {
            println!("  [ ] {item}");
        }
    }

    Ok(())
}

/// Classify a project tier.
fn cmd_tier(description: &str, stories: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let classification = classify_tier(description, stories);

    println!("Tier: {}", classification.tier);
    println!("Basis: {:?}", classification.basis);
    println!("Confidence: {:.0}", classification.confidence);
    if !classification.signals.is_empty() {
        println!("Signals: {}", classification.signals.join(", "));
    }
    println!("Batch size: {}", classification.tier.batch_size(&config.batch));
    Ok(())
}

/// Show configuration.
fn cmd_config(show_path: bool, init: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load()?;
    if init {
        let path = config.save()?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let toml = config.to_toml()?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "bmad-auto", &mut io::stdout());
}
