//! CLI command definitions for script-forge.
//!
//! Every command works on the dataset files named by the pipeline
//! configuration: defaults, then the `--config` YAML file, then
//! `SCRIPT_FORGE_*` environment variables, then command flags.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::diversity::Deduplicator;
use crate::generator::LlmGenerator;
use crate::llm::ChatClient;
use crate::metrics::{export_metrics, init_metrics};
use crate::pipeline::{FeedbackLoop, PipelineConfig, RetryController, RunReport};
use crate::quality::{QualityScorer, ScoreLogEntry, ScoreSummary};
use crate::runner::Sandbox;
use crate::storage::{append_record, ensure_parent, rewrite_records, Partition};
use crate::validation::{RuleProfile, SemanticValidator};

/// Curates generated scripts into a partitioned JSONL dataset.
#[derive(Parser)]
#[command(name = "script-forge")]
#[command(about = "Generate, execute, score and curate code samples")]
#[command(version)]
#[command(
    long_about = "script-forge turns task descriptions into executed, scored and validated \
    code samples.\n\nEach pending task is generated, run in a sandbox, scored, checked \
    against its description and deduplicated. Failures are retried up to a ceiling and \
    every final disposition lands in its own JSONL partition.\n\nExample usage:\n  \
    script-forge run --data-dir ./data\n  script-forge feedback\n  script-forge dedupe"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML configuration file.
    #[arg(short, long, global = true, env = "SCRIPT_FORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the pending pool, partitions and score files.
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,
}

impl Cli {
    /// Resolves the pipeline configuration shared by every command.
    pub fn load_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_yaml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::new(),
        };
        config.apply_env()?;
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Process the pending pool through generation, execution and the gates.
    Run(RunArgs),

    /// Remove exact duplicates from a partition file.
    Dedupe(DedupeArgs),

    /// Requeue failed tasks into the pending pool.
    Feedback(FeedbackArgs),

    /// Score the outputs of a partition and write a summary.
    Score(ScoreArgs),

    /// Re-run the semantic rules over a partition file.
    Validate(ValidateArgs),
}

/// Arguments for `script-forge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Maximum generation attempts per sample.
    #[arg(short = 'r', long)]
    pub retry_ceiling: Option<u32>,

    /// Execution timeout in seconds.
    #[arg(short = 't', long)]
    pub timeout_secs: Option<u64>,

    /// Pause between samples in milliseconds.
    #[arg(long)]
    pub batch_delay_ms: Option<u64>,

    /// Interpreter used to run candidates.
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Semantic rule profile (strict, automation).
    #[arg(long)]
    pub rule_profile: Option<RuleProfile>,

    /// Pass generator output to the gates unchanged.
    #[arg(long)]
    pub no_sanitize: bool,

    /// Model name sent to the LLM endpoint.
    #[arg(short = 'm', long, env = "SCRIPT_FORGE_LLM_MODEL")]
    pub model: Option<String>,

    /// Write Prometheus metrics to this file when the run ends.
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Output JSON report.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl RunArgs {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(ceiling) = self.retry_ceiling {
            config = config.with_retry_ceiling(ceiling);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout_secs(secs);
        }
        if let Some(millis) = self.batch_delay_ms {
            config = config.with_batch_delay_ms(millis);
        }
        if let Some(interpreter) = &self.interpreter {
            config = config.with_interpreter(interpreter.clone());
        }
        if let Some(profile) = self.rule_profile {
            config = config.with_rule_profile(profile);
        }
        if self.no_sanitize {
            config = config.with_sanitize(false);
        }
        config
    }
}

/// Arguments for `script-forge dedupe`.
#[derive(Parser, Debug)]
pub struct DedupeArgs {
    /// Partition to deduplicate.
    #[arg(short, long, default_value = "accepted")]
    pub partition: Partition,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `script-forge feedback`.
#[derive(Parser, Debug)]
pub struct FeedbackArgs {
    /// Partitions to scan instead of the configured sources.
    #[arg(short, long, value_delimiter = ',')]
    pub sources: Vec<Partition>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `script-forge score`.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// Partition whose outputs are scored.
    #[arg(short, long, default_value = "accepted")]
    pub partition: Partition,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `script-forge validate`.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Partition to check.
    #[arg(short, long, default_value = "accepted")]
    pub partition: Partition,

    /// File receiving the passing records (default: the partition itself).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Rule profile to apply instead of the configured one.
    #[arg(long)]
    pub profile: Option<RuleProfile>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;
    run_with_config(cli, config).await
}

/// Run the CLI with an already resolved configuration.
pub async fn run_with_config(cli: Cli, config: PipelineConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline_command(args, config).await,
        Commands::Dedupe(args) => run_dedupe_command(args, config).await,
        Commands::Feedback(args) => run_feedback_command(args, config).await,
        Commands::Score(args) => run_score_command(args, config).await,
        Commands::Validate(args) => run_validate_command(args, config).await,
    }
}

// ============================================================================
// run
// ============================================================================

async fn run_pipeline_command(args: RunArgs, config: PipelineConfig) -> anyhow::Result<()> {
    let config = args.apply(config);
    config.validate()?;
    init_metrics()?;

    let client = ChatClient::from_env().map_err(|e| {
        anyhow::anyhow!(
            "Failed to initialize LLM client: {}. Set SCRIPT_FORGE_LLM_API_BASE \
             (and SCRIPT_FORGE_LLM_API_KEY if the endpoint needs one).",
            e
        )
    })?;
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| client.default_model().to_string());
    info!(api_base = %client.api_base(), model = %model, "Using LLM endpoint");

    let generator = Arc::new(LlmGenerator::new(Arc::new(client), model));
    let executor = Arc::new(Sandbox::new(config.sandbox_config()));
    let mut controller = RetryController::new(config, generator, executor)?;
    let report = controller.run_batch().await?;

    if let Some(path) = &args.metrics_file {
        ensure_parent(path).await?;
        tokio::fs::write(path, export_metrics())
            .await
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!(path = %path.display(), "Wrote metrics");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_run_report(&report);
    }
    Ok(())
}

fn print_run_report(report: &RunReport) {
    if !report.pending_found {
        println!("No pending file found; nothing to do.");
        return;
    }
    let stats = &report.stats;
    let elapsed = report.finished_at - report.started_at;

    println!("Run complete in {}s", elapsed.num_seconds());
    println!("  pending:            {}", stats.pending);
    println!("  skipped:            {}", stats.skipped);
    println!("  processed:          {}", stats.processed);
    println!("  attempts:           {}", stats.generated);
    println!("  accepted:           {}", stats.accepted);
    println!("  permanently failed: {}", stats.permanently_failed);
    println!("  non-program output: {}", stats.non_program_output);
    println!("  too short:          {}", stats.too_short);
    if !stats.rejected_by_kind.is_empty() {
        println!("  last rejection by kind:");
        for (kind, count) in &stats.rejected_by_kind {
            println!("    {:<12} {}", kind, count);
        }
    }
    println!("  acceptance rate:    {:.1}%", stats.acceptance_rate() * 100.0);
}

// ============================================================================
// dedupe
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct DedupeOutput {
    partition: String,
    total: usize,
    unique: usize,
    duplicates: usize,
}

async fn run_dedupe_command(args: DedupeArgs, config: PipelineConfig) -> anyhow::Result<()> {
    let store = config.store();
    let records = store.read(args.partition).await?;
    let result = Deduplicator::new().dedupe(records);

    if result.duplicate_count > 0 {
        store.rewrite(args.partition, &result.unique).await?;
    }
    info!(
        partition = %args.partition,
        total = result.total_before,
        duplicates = result.duplicate_count,
        "Deduplicated partition"
    );

    let output = DedupeOutput {
        partition: args.partition.to_string(),
        total: result.total_before,
        unique: result.unique.len(),
        duplicates: result.duplicate_count,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "{}: {} records, {} unique, {} duplicates removed",
            output.partition, output.total, output.unique, output.duplicates
        );
    }
    Ok(())
}

// ============================================================================
// feedback
// ============================================================================

async fn run_feedback_command(args: FeedbackArgs, config: PipelineConfig) -> anyhow::Result<()> {
    let config = if args.sources.is_empty() {
        config
    } else {
        config.with_feedback_sources(args.sources)
    };
    config.validate()?;
    init_metrics()?;

    let report = FeedbackLoop::from_config(&config).run().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Scanned {} records: {} requeued, {} incomplete, {} already pending, {} already accepted, {} requeued before",
            report.scanned,
            report.requeued,
            report.skipped_incomplete,
            report.skipped_outstanding,
            report.skipped_accepted,
            report.skipped_requeued
        );
    }
    Ok(())
}

// ============================================================================
// score
// ============================================================================

async fn run_score_command(args: ScoreArgs, config: PipelineConfig) -> anyhow::Result<()> {
    let store = config.store();
    let scorer = QualityScorer::new()?;
    let records = store.read(args.partition).await?;

    let mut scores = Vec::new();
    for sample in records
        .iter()
        .filter(|s| !s.candidate_output.trim().is_empty())
    {
        let score = scorer.score(&sample.candidate_output);
        let entry = ScoreLogEntry {
            id: sample.id.clone(),
            task_description: sample.task_description.clone(),
            score: score.clone(),
        };
        append_record(&config.score_log_path, &entry).await?;
        scores.push(score);
    }

    let Some(summary) = ScoreSummary::from_scores(&scores) else {
        warn!(partition = %args.partition, "No outputs to score");
        println!("No outputs to score in {}", args.partition);
        return Ok(());
    };

    ensure_parent(&config.score_summary_path).await?;
    tokio::fs::write(
        &config.score_summary_path,
        serde_json::to_string_pretty(&summary)?,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to write score summary to {}",
            config.score_summary_path.display()
        )
    })?;
    info!(
        partition = %args.partition,
        scored = summary.total,
        path = %config.score_summary_path.display(),
        "Wrote score summary"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Scored {} outputs from {}", summary.total, args.partition);
        println!("  avg lines:      {}", summary.avg_line_count);
        println!("  avg functions:  {}", summary.avg_function_count);
        println!("  avg comments:   {}", summary.avg_comment_count);
        println!("  avg variables:  {}", summary.avg_variable_count);
        println!("  syntax valid:   {}%", summary.syntax_valid_percent);
    }
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct ValidateOutput {
    partition: String,
    profile: String,
    total: usize,
    passed: usize,
    rejected: usize,
}

async fn run_validate_command(args: ValidateArgs, config: PipelineConfig) -> anyhow::Result<()> {
    if args.partition == Partition::Rejected && args.output.is_none() {
        anyhow::bail!("Refusing to filter the rejected partition in place; pass --output");
    }

    let store = config.store();
    let validator = SemanticValidator::new(args.profile.unwrap_or(config.rule_profile))?;
    let records = store.read(args.partition).await?;
    let total = records.len();

    let mut passed = Vec::new();
    let mut failed = Vec::new();
    for sample in records {
        match validator.validate(&sample.task_description, &sample.context, &sample.candidate_output)
        {
            Ok(()) => passed.push(sample),
            Err(rejection) => {
                info!(
                    sample_id = %sample.short_id(),
                    rule = rejection.rule,
                    reason = %rejection.reason,
                    "Semantic check failed"
                );
                failed.push(sample.with_rejected_reason(rejection.reason));
            }
        }
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| store.partition_path(args.partition).to_path_buf());
    rewrite_records(&output_path, &passed).await?;
    for sample in &failed {
        store.append(Partition::Rejected, sample).await?;
    }

    let output = ValidateOutput {
        partition: args.partition.to_string(),
        profile: validator.profile().to_string(),
        total,
        passed: passed.len(),
        rejected: failed.len(),
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "{} ({} rules): {} checked, {} passed, {} rejected -> {}",
            output.partition,
            output.profile,
            output.total,
            output.passed,
            output.rejected,
            output_path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Sample;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("should parse")
    }

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_command_defaults() {
        let cli = parse(&["script-forge", "run"]);
        assert_eq!(cli.log_level, "info");
        match cli.command {
            Commands::Run(args) => {
                assert!(args.retry_ceiling.is_none());
                assert!(args.rule_profile.is_none());
                assert!(!args.no_sanitize);
                assert!(!args.json);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_run_flags_override_config() {
        let cli = parse(&[
            "script-forge",
            "run",
            "-r",
            "5",
            "--timeout-secs",
            "2",
            "--batch-delay-ms",
            "0",
            "--rule-profile",
            "automation",
            "--no-sanitize",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("Expected Run command");
        };
        let config = args.apply(PipelineConfig::new());
        assert_eq!(config.retry_ceiling, 5);
        assert_eq!(config.timeout_secs, 2);
        assert_eq!(config.batch_delay_ms, 0);
        assert_eq!(config.rule_profile, RuleProfile::Automation);
        assert!(!config.sanitize);
    }

    #[test]
    fn test_partition_arguments() {
        let cli = parse(&["script-forge", "dedupe", "-p", "execution_error"]);
        match cli.command {
            Commands::Dedupe(args) => assert_eq!(args.partition, Partition::ExecutionError),
            _ => panic!("Expected Dedupe command"),
        }

        let cli = parse(&["script-forge", "feedback", "-s", "rejected,permanently-failed"]);
        match cli.command {
            Commands::Feedback(args) => assert_eq!(
                args.sources,
                vec![Partition::Rejected, Partition::PermanentlyFailed]
            ),
            _ => panic!("Expected Feedback command"),
        }

        assert!(Cli::try_parse_from(["script-forge", "score", "-p", "nowhere"]).is_err());
    }

    #[test]
    fn test_data_dir_is_global() {
        let cli = parse(&["script-forge", "score", "--data-dir", "/tmp/forge"]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/forge")));
    }

    fn with_output(task: &str, context: &str, output: &str) -> Sample {
        let mut sample = Sample::new(task, context);
        sample.candidate_output = output.to_string();
        sample
    }

    #[tokio::test]
    async fn test_validate_command_splits_partition() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::new().with_data_dir(dir.path());
        let store = config.store();

        let good = "import requests\n\ndef main():\n    requests.get('http://x.io/a')\n\nmain()";
        store
            .append(Partition::Accepted, &with_output("fetch", "GET http://x.io/a", good))
            .await
            .unwrap();
        store
            .append(Partition::Accepted, &with_output("fetch", "GET http://x.io/a", "print(1)\nprint(2)"))
            .await
            .unwrap();

        let args = ValidateArgs {
            partition: Partition::Accepted,
            output: None,
            profile: None,
            json: true,
        };
        run_validate_command(args, config).await.unwrap();

        assert_eq!(store.read(Partition::Accepted).await.unwrap().len(), 1);
        let rejected = store.read(Partition::Rejected).await.unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].rejected_reason.as_deref(), Some("no imports"));
    }

    #[tokio::test]
    async fn test_score_command_writes_summary() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::new().with_data_dir(dir.path());
        let store = config.store();
        store
            .append(Partition::Accepted, &with_output("t", "c", "def f():\n    return 1\n\nf()"))
            .await
            .unwrap();
        store
            .append(Partition::Accepted, &with_output("t", "c", ""))
            .await
            .unwrap();

        let args = ScoreArgs {
            partition: Partition::Accepted,
            json: true,
        };
        run_score_command(args, config.clone()).await.unwrap();

        let text = std::fs::read_to_string(&config.score_summary_path).unwrap();
        let summary: ScoreSummary = serde_json::from_str(&text).unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.avg_function_count, 1.0);

        let log = std::fs::read_to_string(&config.score_log_path).unwrap();
        assert_eq!(log.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_score_command_without_outputs_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::new().with_data_dir(dir.path());
        let args = ScoreArgs {
            partition: Partition::Accepted,
            json: false,
        };
        run_score_command(args, config.clone()).await.unwrap();
        assert!(!config.score_summary_path.exists());
    }
}
