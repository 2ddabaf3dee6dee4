//! AetherFlow CLI — manage agents, tasks and flows from the terminal.
//!
//! Reuses the same core domain logic (aether-core) and server bootstrap
//! (aether-server) that power the dashboard backend.

use std::time::Duration;

use clap::{Parser, Subcommand};

use aether_cli::commands;
use aether_core::{CoreConfig, ExecutorConfig, ProberConfig};
use aether_server::ServerConfig;

/// AetherFlow CLI — Agent flow orchestration
#[derive(Parser)]
#[command(name = "aether", version, about = "AetherFlow CLI — Agent flow orchestration")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "AETHER_DB_PATH", default_value = "aether.db")]
    db: String,

    /// Upper bound for a single flow step call, in seconds
    #[arg(
        long,
        env = "AETHER_STEP_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    step_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the AetherFlow HTTP server
    Server {
        /// Host to bind to
        #[arg(long, env = "AETHER_HOST", default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, env = "AETHER_PORT", default_value_t = 8080)]
        port: u16,
        /// Seconds between liveness probe cycles
        #[arg(
            long,
            env = "AETHER_PROBE_INTERVAL_SECS",
            default_value_t = 5,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        probe_interval_secs: u64,
        /// Timeout for a single liveness check, in milliseconds
        #[arg(
            long,
            env = "AETHER_PROBE_TIMEOUT_MS",
            default_value_t = 2000,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        probe_timeout_ms: u64,
        /// Maximum number of liveness checks in flight at once
        #[arg(long, env = "AETHER_PROBE_CONCURRENCY", default_value_t = 16)]
        probe_concurrency: usize,
        /// Do not run the background liveness prober
        #[arg(long)]
        no_probe: bool,
    },

    /// Manage agents
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Manage and run flows
    Flow {
        #[command(subcommand)]
        action: FlowAction,
    },
}

#[derive(Subcommand)]
enum AgentAction {
    /// List registered agents
    List,
    /// Register a new agent
    Register {
        /// Unique slug (lowercase letters, digits, dashes)
        #[arg(long)]
        slug: String,
        /// Base URL of the agent service
        #[arg(long)]
        endpoint: String,
        /// Where the agent's code lives (informational)
        #[arg(long)]
        source: Option<String>,
    },
    /// Show an agent and its tasks
    Get {
        /// Agent ID or slug
        id: String,
    },
    /// Remove an agent and its tasks
    Remove {
        /// Agent ID or slug
        id: String,
    },
    /// Check every agent's liveness once
    Probe,
}

#[derive(Subcommand)]
enum TaskAction {
    /// List tasks, optionally for one agent
    List {
        /// Agent ID or slug
        #[arg(long)]
        agent: Option<String>,
    },
    /// Create a task under an agent
    Create {
        /// Agent ID or slug
        #[arg(long)]
        agent: String,
        /// Task name
        #[arg(long)]
        name: String,
        /// Task type: endpoint, function or script
        #[arg(long = "type", default_value = "endpoint")]
        kind: String,
        #[arg(long)]
        description: Option<String>,
        /// HTTP method for endpoint tasks (default POST)
        #[arg(long)]
        method: Option<String>,
        /// Path relative to the agent endpoint, for endpoint tasks
        #[arg(long)]
        path: Option<String>,
        /// Invocation descriptor as JSON, for function/script tasks
        #[arg(long)]
        descriptor: Option<String>,
    },
    /// Show a task
    Get { id: String },
    /// Delete a task
    Delete { id: String },
}

#[derive(Subcommand)]
enum FlowAction {
    /// List flows
    List,
    /// Create an empty flow
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show a flow with its ordered steps and agent chain
    Show { id: String },
    /// Delete a flow and its steps
    Delete { id: String },
    /// Append a step to a flow
    AddStep {
        /// Flow ID
        #[arg(long)]
        flow: String,
        /// Task ID
        #[arg(long)]
        task: String,
        /// Position in the flow (1-based, unique within the flow)
        #[arg(long)]
        order: i64,
        /// Static JSON object merged over the incoming payload
        #[arg(long)]
        config: Option<String>,
    },
    /// Remove a step from a flow
    RemoveStep {
        #[arg(long)]
        flow: String,
        #[arg(long)]
        step: String,
    },
    /// Execute a flow now and print the result
    Run {
        id: String,
        /// Initial payload as a JSON object
        #[arg(long, default_value = "{}")]
        payload: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let executor = ExecutorConfig {
        step_timeout: Duration::from_secs(cli.step_timeout_secs),
    };

    let result = match cli.command {
        Commands::Server {
            host,
            port,
            probe_interval_secs,
            probe_timeout_ms,
            probe_concurrency,
            no_probe,
        } => {
            // start_server installs its own subscriber
            let config = ServerConfig {
                host,
                port,
                db_path: cli.db,
                prober: ProberConfig {
                    interval: Duration::from_secs(probe_interval_secs),
                    timeout: Duration::from_millis(probe_timeout_ms),
                    max_in_flight: probe_concurrency,
                },
                executor,
                probe_enabled: !no_probe,
            };
            commands::server::run(config).await
        }
        command => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "aether_core=warn,aether_cli=info".into()),
                )
                .with_writer(std::io::stderr)
                .init();

            let config = CoreConfig {
                executor,
                ..CoreConfig::default()
            };
            match commands::init_state(&cli.db, config) {
                Ok(state) => run_command(&state, command).await.map(|value| {
                    commands::print_json(&value);
                }),
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_command(
    state: &aether_core::AppState,
    command: Commands,
) -> Result<serde_json::Value, String> {
    match command {
        Commands::Agent { action } => match action {
            AgentAction::List => commands::agent::list(state).await,
            AgentAction::Register {
                slug,
                endpoint,
                source,
            } => commands::agent::register(state, &slug, &endpoint, source.as_deref()).await,
            AgentAction::Get { id } => commands::agent::get(state, &id).await,
            AgentAction::Remove { id } => commands::agent::remove(state, &id).await,
            AgentAction::Probe => commands::agent::probe(state).await,
        },

        Commands::Task { action } => match action {
            TaskAction::List { agent } => commands::task::list(state, agent.as_deref()).await,
            TaskAction::Create {
                agent,
                name,
                kind,
                description,
                method,
                path,
                descriptor,
            } => {
                commands::task::create(
                    state,
                    commands::task::CreateArgs {
                        agent: &agent,
                        name: &name,
                        kind: &kind,
                        description: description.as_deref(),
                        method: method.as_deref(),
                        path: path.as_deref(),
                        descriptor: descriptor.as_deref(),
                    },
                )
                .await
            }
            TaskAction::Get { id } => commands::task::get(state, &id).await,
            TaskAction::Delete { id } => commands::task::delete(state, &id).await,
        },

        Commands::Flow { action } => match action {
            FlowAction::List => commands::flow::list(state).await,
            FlowAction::Create { name, description } => {
                commands::flow::create(state, &name, description.as_deref()).await
            }
            FlowAction::Show { id } => commands::flow::show(state, &id).await,
            FlowAction::Delete { id } => commands::flow::delete(state, &id).await,
            FlowAction::AddStep {
                flow,
                task,
                order,
                config,
            } => commands::flow::add_step(state, &flow, &task, order, config.as_deref()).await,
            FlowAction::RemoveStep { flow, step } => {
                commands::flow::remove_step(state, &flow, &step).await
            }
            FlowAction::Run { id, payload } => commands::flow::run(state, &id, &payload).await,
        },

        Commands::Server { .. } => Err("server is handled before state init".to_string()),
    }
}
