//! `ece`: command line front end for the coordination engine.

mod config;

use clap::{Parser, Subcommand, ValueEnum};
use config::EceConfig;
use ece_agent::{AgentWorker, LlmClient, ScoutAgent, WebSearchAgent};
use ece_blackboard::Blackboard;
use ece_core::TaskPayload;
use ece_memory::{read_file_content, Archivist};
use ece_orchestrator::{Distiller, InstanceLock, Orchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ece", about = "ECE: blackboard-coordinated agent engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ece.toml")]
    config: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator loop and the worker agents until Ctrl-C
    Run {
        /// Do not start the scout and search workers
        #[arg(long)]
        no_agents: bool,
    },
    /// Run the distillation crew once over a document and print the result
    Crew {
        /// Input document (defaults to the configured working memory)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Also post the result to the blackboard
        #[arg(long)]
        post: bool,
    },
    /// Print the most recent blackboard messages
    Messages {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Enqueue a task, e.g. `post-task scout_tasks web_scrape url=http://example.com`
    PostTask {
        queue: String,
        task_type: String,
        /// `key=value` fields; values that parse as JSON are kept typed
        #[arg(value_parser = parse_field)]
        fields: Vec<(String, serde_json::Value)>,
    },
}

fn parse_field(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::from(value));
    Ok((key.to_string(), value))
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn distiller(config: &EceConfig, blackboard: Blackboard) -> anyhow::Result<Distiller> {
    let analyst = Arc::new(LlmClient::new(config.models.analyst.clone())?);
    let integrator = Arc::new(LlmClient::new(config.models.integrator.clone())?);
    Ok(Distiller::with_default_crew(
        analyst,
        integrator,
        blackboard,
        config.crew.failure_policy,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = EceConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Run { no_agents } => run(config, no_agents).await?,
        Commands::Crew { input, post } => {
            let path = input.unwrap_or_else(|| config.orchestrator.working_memory_path.clone());
            let document = read_file_content(&path).await;
            if document.is_empty() {
                anyhow::bail!("'{}' is empty or unreadable", path.display());
            }
            let blackboard = Blackboard::open(&config.blackboard).await?;
            let distiller = distiller(&config, blackboard)?;
            let output = if post {
                distiller.distill(&document).await?
            } else {
                distiller.crew().kickoff(&document).await?
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Messages { count } => {
            let blackboard = Blackboard::open(&config.blackboard).await?;
            for message in blackboard.read_latest_messages(count).await? {
                println!("{}", serde_json::to_string(&message)?);
            }
        }
        Commands::PostTask {
            queue,
            task_type,
            fields,
        } => {
            let blackboard = Blackboard::open(&config.blackboard).await?;
            let task = fields
                .into_iter()
                .fold(TaskPayload::new(task_type), |task, (k, v)| task.with_field(k, v));
            blackboard.post_task(&queue, &task).await?;
            info!(queue = %queue, "Task posted");
        }
    }

    Ok(())
}

async fn run(config: EceConfig, no_agents: bool) -> anyhow::Result<()> {
    let _lock = InstanceLock::acquire(&config.data_dir)?;

    let blackboard = Blackboard::open(&config.blackboard).await?;
    let graph = config.graph.open_store().await?;

    let mut archivist = Archivist::new(graph);
    if let Some(model) = &config.models.summarizer {
        archivist = archivist.with_summarizer(LlmClient::new(model.clone())?);
    }
    let orchestrator = Orchestrator::new(
        config.orchestrator.clone(),
        Arc::new(distiller(&config, blackboard.clone())?),
        Arc::new(archivist),
    );

    let shutdown = CancellationToken::new();
    let mut workers = Vec::new();
    if !no_agents {
        let scout = ScoutAgent::new(config.scout.clone())?;
        workers.push(
            AgentWorker::with_shutdown(blackboard.clone(), Arc::new(scout), shutdown.clone()).spawn(),
        );

        if config.search.api_key.is_empty() {
            warn!("No search API key configured (search.api_key or TAVILY_API_KEY); WebSearchAgent disabled");
        } else {
            let llm = LlmClient::new(config.models.search.clone())?;
            let search = WebSearchAgent::new(config.search.clone(), llm)?;
            workers.push(
                AgentWorker::with_shutdown(blackboard.clone(), Arc::new(search), shutdown.clone())
                    .spawn(),
            );
        }
    }

    orchestrator.start();
    info!(workers = workers.len(), "ECE running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    orchestrator.stop();
    shutdown.cancel();
    if let Err(e) = orchestrator.join().await {
        error!(error = %e, "Orchestrator did not shut down cleanly");
    }
    for worker in workers {
        match worker.await {
            Ok(Ok(processed)) => info!(processed, "Worker finished"),
            Ok(Err(e)) => error!(error = %e, "Worker ended with a store error"),
            Err(e) => error!(error = %e, "Worker task failed"),
        }
    }

    info!("ECE stopped");
    Ok(())
}
