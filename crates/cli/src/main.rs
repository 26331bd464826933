mod job_commands;
mod runner;
mod serve;

use std::{path::PathBuf, process::ExitCode};

use {
    cadence_gateway::HttpClient,
    clap::{Parser, Subcommand},
    job_commands::{PageArgs, ScheduleArgs},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "cadence", about = "Cadence: periodic job scheduler", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on, or to connect to (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Custom config directory (overrides default ~/.config/cadence/).
    #[arg(long, global = true, env = "CADENCE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Custom data directory (overrides default data dir).
    #[arg(long, global = true, env = "CADENCE_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Scheduler to talk to, `host:port` or a URL. Defaults to the serve address.
    #[arg(long, global = true, env = "CADENCE_ADDRESS")]
    address: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and its HTTP server (default when no subcommand is provided).
    Serve,
    /// Check whether a scheduler is running.
    Ping,
    /// List scheduled jobs.
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one scheduled job.
    Get { name: String },
    /// Add or replace a scheduled job.
    Schedule(ScheduleArgs),
    /// Remove a scheduled job.
    Unschedule { name: String },
    /// List past runs, newest first.
    Logs {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one past run.
    Log { log_name: String },
    /// Print the captured output of a past run.
    Output { log_name: String },
    /// Run a scheduled job now.
    Run { name: String },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    // Apply directory overrides before loading config
    if let Some(ref dir) = cli.config_dir {
        cadence_config::set_config_dir(dir.clone());
    }
    if let Some(ref dir) = cli.data_dir {
        cadence_config::set_data_dir(dir.clone());
    }
    let mut config = cadence_config::discover_and_load();
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let address = cli.address.unwrap_or_else(|| config.server.address());
    let client = || HttpClient::new(&address);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            debug!(version = env!("CARGO_PKG_VERSION"), "cadence starting");
            serve::run(config).await?;
        },
        Commands::Ping => return job_commands::ping(&client()?).await,
        Commands::List { page } => job_commands::list(&client()?, page).await?,
        Commands::Get { name } => job_commands::get(&client()?, &name).await?,
        Commands::Schedule(args) => job_commands::schedule(&client()?, args).await?,
        Commands::Unschedule { name } => job_commands::unschedule(&client()?, &name).await?,
        Commands::Logs { page } => job_commands::logs(&client()?, page).await?,
        Commands::Log { log_name } => job_commands::log(&client()?, &log_name).await?,
        Commands::Output { log_name } => job_commands::output(&client()?, &log_name).await?,
        Commands::Run { name } => job_commands::run(&client()?, &name).await?,
    }
    Ok(ExitCode::SUCCESS)
}
