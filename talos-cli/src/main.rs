use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use talos_core::application::agent::{AgentLoop, AgentOptions, DoneOptions};
use talos_core::application::eval::{
    EVAL_REPORT_KIND, JUDGE_REPORT_KIND, evaluate_run, judge_run,
};
use talos_core::application::memory::MemoryRetriever;
use talos_core::application::tooling::{FsCache, SummarizeText, ToolRouter};
use talos_core::config::{AppConfig, load_config};
use talos_core::infrastructure::model::{
    OpenAiClient, OpenAiConfig, StructuredClient, StructuredOptions,
};
use talos_core::infrastructure::store::{FsRunStore, RunStore};
use talos_core::prompts::PromptLibrary;

mod error;

use error::CliError;

#[derive(Parser)]
#[command(name = "talos", about = "LLM-driven agent orchestrator", version)]
struct Cli {
    /// Path to the configuration file (default: talos.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the agent loop for an objective.
    Run {
        objective: String,
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Validate the plan without executing tools or persisting.
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        planner_version: Option<String>,
    },
    /// Inspect persisted runs.
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },
    /// Score a run with the deterministic evaluator.
    Eval {
        run_id: String,
        #[arg(long, default_value_t = 0.05)]
        budget: f64,
    },
    /// Score a run with the LLM judge.
    Judge {
        run_id: String,
        #[arg(long)]
        model: Option<String>,
    },
    /// Search prior runs by objective similarity.
    Memory {
        #[command(subcommand)]
        command: MemoryCommand,
    },
}

#[derive(Subcommand)]
enum RunsCommand {
    /// List recent runs, most recent first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print a run record as JSON.
    Show { run_id: String },
    /// Export a run plus attached reports as one JSON bundle.
    Export {
        run_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MemoryCommand {
    Search {
        #[arg(long)]
        objective: String,
        #[arg(long, default_value_t = 3)]
        k: usize,
        #[arg(long, default_value_t = 50)]
        scan_limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            let mut source = std::error::Error::source(&error);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_config(cli.config.as_deref())?;
    let store: Arc<dyn RunStore> = Arc::new(FsRunStore::new(&config.data_dir));

    match cli.command {
        Command::Run {
            objective,
            max_iterations,
            dry_run,
            planner_version,
        } => {
            let agent = build_agent(&config, store, max_iterations, dry_run, planner_version)?;
            let result = agent.run(&objective).await?;

            println!("{}", serde_json::to_string_pretty(&result)?);
            println!();
            println!("RUN_ID: {}", result.run_id);
            Ok(if result.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Runs { command } => runs_command(&config, store.as_ref(), command).await,
        Command::Eval { run_id, budget } => {
            let Some(record) = store.load_run(&run_id).await? else {
                eprintln!("run not found: {run_id}");
                return Ok(ExitCode::from(2));
            };
            let report = evaluate_run(&record, budget);
            store
                .save_report(&run_id, EVAL_REPORT_KIND, &serde_json::to_value(&report)?)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Judge { run_id, model } => {
            let Some(record) = store.load_run(&run_id).await? else {
                eprintln!("run not found: {run_id}");
                return Ok(ExitCode::from(2));
            };

            let judge_model = model.unwrap_or_else(|| config.provider.judge_model.clone());
            let provider = OpenAiClient::new(provider_config(&config, &judge_model))?;
            let client = StructuredClient::new(provider, StructuredOptions::default());
            let prompts = PromptLibrary::new(&config.prompts_dir);

            let report = judge_run(&client, &prompts, &record, &judge_model).await?;
            store
                .save_report(
                    &run_id,
                    JUDGE_REPORT_KIND,
                    &serde_json::to_value(&report.value)?,
                )
                .await?;
            info!(tokens = report.usage.tokens, cost = report.usage.cost, "judge usage");
            println!("{}", serde_json::to_string_pretty(&report.value)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Memory { command } => {
            let MemoryCommand::Search {
                objective,
                k,
                scan_limit,
            } = command;
            let retriever = MemoryRetriever::new(store);
            let memories = retriever.find_relevant(&objective, k, scan_limit).await?;
            println!("{}", serde_json::to_string_pretty(&memories)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_agent(
    config: &AppConfig,
    store: Arc<dyn RunStore>,
    max_iterations: Option<u32>,
    dry_run: bool,
    planner_version: Option<String>,
) -> Result<AgentLoop<OpenAiClient>, CliError> {
    let provider = OpenAiClient::new(provider_config(config, &config.provider.model))?;
    let client = StructuredClient::new(provider, StructuredOptions::default());

    let mut router = ToolRouter::new(Arc::new(FsCache::new(config.data_dir.join("cache"))));
    router.register(Arc::new(SummarizeText))?;

    let options = AgentOptions {
        max_iterations: max_iterations.unwrap_or(config.agent.max_iterations),
        planner_version: planner_version.unwrap_or_else(|| config.agent.planner_version.clone()),
        dry_run,
        memory_k: config.agent.memory_k,
        memory_scan_limit: config.agent.memory_scan_limit,
        summarize_max_sentences: config.agent.summarize_max_sentences,
        done: DoneOptions {
            sentence_tolerance: config.agent.sentence_tolerance,
        },
        ..AgentOptions::default()
    };

    Ok(AgentLoop::new(
        client,
        Arc::new(router),
        store,
        PromptLibrary::new(&config.prompts_dir),
        options,
    ))
}

fn provider_config(config: &AppConfig, model: &str) -> OpenAiConfig {
    OpenAiConfig {
        endpoint: config.provider.endpoint.clone(),
        model: model.to_string(),
        api_key_env: config.provider.api_key_env.clone(),
        temperature: config.provider.temperature,
        cost_per_1k_tokens: config.provider.cost_per_1k_tokens,
    }
}

async fn runs_command(
    config: &AppConfig,
    store: &dyn RunStore,
    command: RunsCommand,
) -> Result<ExitCode, CliError> {
    match command {
        RunsCommand::List { limit } => {
            for listing in store.list_runs(limit).await? {
                let status = if listing.ok { "OK" } else { "FAIL" };
                println!(
                    "{} | {} | iter={} | tok={} | ${:.4}",
                    listing.created_at.format("%Y-%m-%d %H:%M:%S"),
                    status,
                    listing.iterations,
                    listing.total_tokens,
                    listing.total_cost,
                );
                println!("  {}", listing.run_id);
                let objective: String = listing.objective.chars().take(120).collect();
                println!("  {objective}");
                println!();
            }
            Ok(ExitCode::SUCCESS)
        }
        RunsCommand::Show { run_id } => {
            let Some(record) = store.load_run(&run_id).await? else {
                eprintln!("run not found: {run_id}");
                return Ok(ExitCode::from(2));
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(ExitCode::SUCCESS)
        }
        RunsCommand::Export { run_id, out } => {
            let Some(record) = store.load_run(&run_id).await? else {
                eprintln!("run not found: {run_id}");
                return Ok(ExitCode::from(2));
            };
            let eval = store.load_report(&run_id, EVAL_REPORT_KIND).await?;
            let judge = store.load_report(&run_id, JUDGE_REPORT_KIND).await?;

            let bundle = serde_json::json!({
                "export_meta": {
                    "exported_at": chrono::Utc::now(),
                    "run_id": run_id,
                    "tool": "talos runs export",
                },
                "run": record,
                "eval": eval,
                "judge": judge,
            });

            let out_path = out.unwrap_or_else(|| {
                config.data_dir.join("exports").join(format!("{run_id}.json"))
            });
            write_bundle(&out_path, &bundle)?;
            println!("{}", out_path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn write_bundle(path: &Path, bundle: &serde_json::Value) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CliError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(bundle)?).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}
