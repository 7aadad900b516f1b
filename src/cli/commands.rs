//! CLI command definitions for chat-forge.
//!
//! `generate` runs a full conversation generation; the other commands work
//! on the files a run leaves behind.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::config::GeneratorConfig;
use crate::generator::SyntheticChatGenerator;
use crate::llm::create_provider;
use crate::postprocess::{
    create_validation_set, format_conversations, load_manifest_mapping, merge_manifest_into_synthetic,
};
use crate::strategies::StrategyRegistry;
use crate::taxonomy::detect_taxonomy_format;

/// Default directory for merged run output.
const DEFAULT_PROCESSED_DIR: &str = "processed_synthetic_data";

/// Synthetic advisor/client conversation generator.
#[derive(Parser)]
#[command(name = "chat-forge")]
#[command(about = "Generate synthetic advisor/client chat conversations with an LLM")]
#[command(version)]
#[command(
    long_about = "chat-forge drives an LLM through taxonomy, generation and few-shot strategies to produce synthetic chat conversations, then merges run manifests and formats the output.\n\nExample usage:\n  chat-forge generate --config configs/financial_advisory_mock.yaml --num-conversations 10"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Also write logs to this file. Overrides `log_file` from the config.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Log file from `--log-file`, or from the `generate` config file.
    pub fn configured_log_file(&self) -> Option<PathBuf> {
        if self.log_file.is_some() {
            return self.log_file.clone();
        }
        match &self.command {
            Commands::Generate(GenerateArgs {
                config: Some(path), ..
            }) => GeneratorConfig::from_file(path).ok().and_then(|c| c.log_file),
            _ => None,
        }
    }
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a run of synthetic conversations.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Attach manifest key companies to the conversations of a run.
    MergeManifest(MergeManifestArgs),

    /// Split run files into one file per conversation.
    Format(FormatArgs),

    /// Flatten run files into a labelled CSV for evaluating classifiers.
    ValidationSet(ValidationSetArgs),

    /// Inspect a taxonomy file.
    Taxonomy(TaxonomyArgs),
}

/// Arguments for `chat-forge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// YAML or JSON configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run identifier. Generated from the current time when omitted.
    #[arg(long)]
    pub run_id: Option<String>,

    /// Number of conversations to generate.
    #[arg(short = 'n', long)]
    pub num_conversations: Option<usize>,

    /// LLM provider: mock, gemini, openai or litellm.
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model identifier passed to the provider.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Seed for reproducible sampling.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Base output directory. The run writes into a `run_id` subdirectory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of LLM calls in flight at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Skip writing the run summary and interaction report.
    #[arg(long)]
    pub no_report: bool,
}

/// Arguments for `chat-forge merge-manifest`.
#[derive(Parser, Debug)]
pub struct MergeManifestArgs {
    /// Run ID to process.
    #[arg(long)]
    pub run_id: String,

    /// Directory holding manifest logs.
    #[arg(long, default_value = "conversation_scripts")]
    pub manifest_dir: PathBuf,

    /// Base directory of generator output.
    #[arg(long, default_value = "synthetic_data")]
    pub synthetic_dir: PathBuf,

    /// Base directory for merged output.
    #[arg(long, default_value = DEFAULT_PROCESSED_DIR)]
    pub output_dir: PathBuf,
}

/// Arguments for `chat-forge format`.
#[derive(Parser, Debug)]
pub struct FormatArgs {
    /// Run output directory holding multi-conversation files.
    #[arg(long)]
    pub source: PathBuf,

    /// Directory for per-conversation files.
    #[arg(long)]
    pub target: PathBuf,
}

/// Arguments for `chat-forge validation-set`.
#[derive(Parser, Debug)]
pub struct ValidationSetArgs {
    /// Run output directory holding multi-conversation files.
    #[arg(long)]
    pub source: PathBuf,

    /// CSV file to write.
    #[arg(long)]
    pub output: PathBuf,
}

/// Arguments for `chat-forge taxonomy`.
#[derive(Parser, Debug)]
pub struct TaxonomyArgs {
    /// Taxonomy JSON file.
    #[arg(short, long)]
    pub file: PathBuf,

    /// Taxonomy strategy. Detected from the file when omitted.
    #[arg(short, long)]
    pub strategy: Option<String>,
}

/// Parse CLI arguments without running.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::MergeManifest(args) => run_merge_manifest_command(args),
        Commands::Format(args) => run_format_command(args),
        Commands::ValidationSet(args) => run_validation_set_command(args),
        Commands::Taxonomy(args) => run_taxonomy_command(args),
    }
}

/// Loads, overrides and validates the run configuration.
pub fn resolve_config(args: &GenerateArgs) -> anyhow::Result<GeneratorConfig> {
    let mut config = match &args.config {
        Some(path) => GeneratorConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid CHAT_FORGE_* environment override")?;

    if let Some(run_id) = &args.run_id {
        config.run_id = Some(run_id.clone());
    }
    if let Some(n) = args.num_conversations {
        config.num_conversations = n;
    }
    if let Some(provider) = &args.provider {
        config.llm_provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.model_name = model.clone();
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    info!(
        provider = %config.llm_provider,
        model = %config.model_name,
        conversations = config.num_conversations,
        "Starting generation"
    );

    let provider = create_provider(&config).context("Failed to initialize LLM provider")?;
    let report_dir = config.output_dir.clone();
    let mut generator =
        SyntheticChatGenerator::new(config, provider).context("Failed to initialize generator")?;
    let summary = generator
        .generate_conversations()
        .await
        .context("Generation run failed")?;

    if !args.no_report {
        summary
            .write_report(&report_dir)
            .context("Failed to write run report")?;
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_merge_manifest_command(args: MergeManifestArgs) -> anyhow::Result<()> {
    info!(run_id = %args.run_id, manifest_dir = %args.manifest_dir.display(), "Merging manifest");
    let mapping = load_manifest_mapping(&args.manifest_dir, &args.run_id)
        .context("Failed to load manifest mapping")?;

    let synthetic_dir = args.synthetic_dir.join(&args.run_id);
    let output_dir = args.output_dir.join(&args.run_id);
    let stats = merge_manifest_into_synthetic(&synthetic_dir, &output_dir, &mapping)
        .with_context(|| format!("Failed to merge manifest into {}", synthetic_dir.display()))?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn run_format_command(args: FormatArgs) -> anyhow::Result<()> {
    let stats = format_conversations(&args.source, &args.target)
        .with_context(|| format!("Failed to format {}", args.source.display()))?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn run_validation_set_command(args: ValidationSetArgs) -> anyhow::Result<()> {
    let stats = create_validation_set(&args.source, &args.output)
        .with_context(|| format!("Failed to build validation set from {}", args.source.display()))?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[derive(Serialize)]
struct TaxonomyReport {
    name: String,
    format: &'static str,
    strategy: String,
    topic_count: usize,
    conversation_types: Vec<String>,
    topics: Vec<String>,
}

fn run_taxonomy_command(args: TaxonomyArgs) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read taxonomy {}", args.file.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Taxonomy {} is not valid JSON", args.file.display()))?;
    let format = detect_taxonomy_format(&raw);

    let strategy_name = args
        .strategy
        .clone()
        .unwrap_or_else(|| format.as_str().to_string());
    let config = GeneratorConfig::default();
    let strategy = StrategyRegistry::with_builtins().create_taxonomy(&strategy_name, &config)?;
    let taxonomy = strategy
        .load_taxonomy(&args.file)
        .with_context(|| format!("Failed to load taxonomy {}", args.file.display()))?;

    let report = TaxonomyReport {
        name: taxonomy.name.clone(),
        format: format.as_str(),
        strategy: strategy_name,
        topic_count: taxonomy.topics.len(),
        conversation_types: taxonomy.conversation_types.keys().cloned().collect(),
        topics: taxonomy.topics.iter().map(|t| t.weight_key()).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
