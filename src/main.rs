//! homebase - command line entry point
//!
//! Runs one request through the agent graph and prints the conversation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use homebase::agents::RunError;
use homebase::llm::OpenAiCompatClient;
use homebase::tools::ToolRegistry;
use homebase::{AgentCatalog, Config, GraphBuilder, Message, RunEvent};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "homebase")]
#[command(about = "Route a request through a supervisor and its tool-bound agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Agent catalog YAML (overrides HOMEBASE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the graph as a Mermaid diagram before running
    #[arg(long)]
    mermaid: bool,

    /// Do not stream steps while the run is in progress
    #[arg(short, long)]
    quiet: bool,

    /// The request, e.g. "schedule lunch with Ada on Friday"
    #[arg(required = true)]
    request: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    // Nodes run strictly one at a time.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homebase=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env()?;
    if let Some(path) = cli.config {
        config.catalog_path = path;
    }
    info!(
        "Loaded configuration: catalog={}, oracle={}",
        config.catalog_path.display(),
        config.llm_base_url
    );

    let catalog = AgentCatalog::load(&config.catalog_path)?;
    let tools = ToolRegistry::builder()
        .with_builtins(config.timezone_offset_hours)
        .with_remote_tools(catalog.remote_tools())?
        .build();
    let llm = Arc::new(OpenAiCompatClient::new(
        &config.llm_base_url,
        config.llm_api_key.clone(),
    ));

    let (events_tx, events_rx) = broadcast::channel(64);
    let graph = GraphBuilder::new(&catalog, &tools, llm)
        .max_iterations(config.max_iterations)
        .max_delegations(config.max_delegations)
        .with_events(events_tx)
        .build()?;

    if cli.mermaid {
        println!("{}\n", graph.to_mermaid());
    }

    let printer = (!cli.quiet).then(|| tokio::spawn(print_events(events_rx)));

    let request = cli.request.join(" ");
    let result = graph.run(request).await;
    // The graph holds the only sender; dropping it closes the stream.
    drop(graph);
    if let Some(printer) = printer {
        printer.await?;
    }

    match result {
        Ok(outcome) => {
            println!("\n=== Conversation ({} steps) ===", outcome.steps);
            print_transcript(&outcome.messages);
            Ok(())
        }
        Err(failure) => {
            println!("\n=== Partial conversation (stopped at {}) ===", failure.next);
            print_transcript(&failure.messages);
            if let RunError::OracleContractViolation { raw, .. } = &failure.error {
                eprintln!("\nOffending oracle output:\n{}", raw);
            }
            Err(failure.into())
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<RunEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                println!("--- step {}: {} -> {}", event.step, event.node, event.goto);
                for message in &event.messages {
                    println!("[{}] {}", message.author, message.content);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                eprintln!("(skipped {} steps)", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_transcript(messages: &[Message]) {
    for message in messages {
        println!("[{}] {}", message.author, message.content);
    }
}
