use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use jobtrack::client::{ClientError, JobTrackClient};
use jobtrack::config::{ServerConfig, StoreConfig};
use jobtrack::lifecycle::JobRecord;
use jobtrack::server::Server;
use jobtrack::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "jobtrack")]
#[command(version)]
#[command(about = "Track start/stop of factory machine jobs")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the jobtrack API server
    Server(ServerArgs),

    /// Job commands against a running server
    Job {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: JobCommands,
    },
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Address to bind
    #[arg(long, env = "JOBTRACK_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "5001")]
    port: u16,

    /// SQLite database URL (e.g., "sqlite://jobtrack.db").
    /// Records are kept in memory when omitted.
    #[arg(long, env = "JOBTRACK_DATABASE_URL")]
    database_url: Option<String>,

    /// Path to the job catalog JSON file
    #[arg(long, env = "JOBTRACK_CATALOG")]
    catalog: Option<PathBuf>,
}

// =============================================================================
// Client Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Server address
    #[arg(
        long,
        short = 'a',
        env = "JOBTRACK_ADDR",
        default_value = "http://127.0.0.1:5001"
    )]
    addr: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// List the job catalog
    List,
    /// Start a job
    Start {
        /// Catalog job ID
        job_id: String,
        /// Part being produced
        #[arg(long)]
        part: String,
        /// Machine running the job
        #[arg(long)]
        machine: String,
    },
    /// Stop the active run of a job
    Stop {
        /// Catalog job ID
        job_id: String,
    },
    /// Show the active job, if any
    Active,
    /// List completed jobs
    Completed,
    /// Show aggregate job statistics
    Stats,
}

// =============================================================================
// Server Implementation
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let store = match args.database_url {
        Some(url) => StoreConfig::Sqlite { url },
        None => StoreConfig::Memory,
    };

    let mut config = ServerConfig::new(SocketAddr::new(args.host, args.port)).with_store(store);
    if let Some(path) = args.catalog {
        config = config.with_catalog(path);
    }

    tracing::info!(
        listen_addr = %config.listen_addr,
        sqlite = matches!(config.store, StoreConfig::Sqlite { .. }),
        catalog = ?config.catalog_path,
        "Starting jobtrack server"
    );

    let shutdown = install_shutdown_handler();
    let server = Server::new(config).await?;
    server.run(shutdown).await?;

    Ok(())
}

// =============================================================================
// Client Command Handlers
// =============================================================================

fn print_record_table(records: &[JobRecord]) {
    println!(
        "{:<12} {:<20} {:<12} {:<22} {:<10}",
        "JOB ID", "PART", "MACHINE", "STARTED", "DURATION"
    );
    println!("{}", "-".repeat(80));
    for rec in records {
        println!(
            "{:<12} {:<20} {:<12} {:<22} {:<10}",
            rec.job_id,
            rec.part_name,
            rec.machine_name,
            rec.start_time.format("%Y-%m-%d %H:%M:%S"),
            rec.duration.as_deref().unwrap_or("-")
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_with(err: ClientError) -> ! {
    eprintln!("Error: {}", err);
    std::process::exit(1);
}

async fn handle_job_command(
    client: &JobTrackClient,
    command: JobCommands,
    output: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        JobCommands::List => {
            let cards = client.job_cards().await.unwrap_or_else(|e| exit_with(e));
            if cards.catalog_unavailable {
                eprintln!("Warning: job catalog is unavailable on the server");
            }
            match output {
                OutputFormat::Json => print_json(&cards.templates)?,
                OutputFormat::Table => {
                    if cards.templates.is_empty() {
                        println!("No jobs in catalog.");
                    } else {
                        println!("{:<12} {:<20} MACHINE", "JOB ID", "PART");
                        println!("{}", "-".repeat(50));
                        for t in &cards.templates {
                            println!("{:<12} {:<20} {}", t.job_id, t.part_name, t.machine_name);
                        }
                    }
                }
            }
        }
        JobCommands::Start {
            job_id,
            part,
            machine,
        } => {
            let resp = client
                .start_job(&job_id, &part, &machine)
                .await
                .unwrap_or_else(|e| exit_with(e));
            match output {
                OutputFormat::Json => print_json(&resp.job)?,
                OutputFormat::Table => {
                    println!("{}: {}", resp.message, resp.job.job_id);
                    println!("Started: {}", resp.job.start_time.to_rfc3339());
                }
            }
        }
        JobCommands::Stop { job_id } => {
            let resp = client
                .stop_job(&job_id)
                .await
                .unwrap_or_else(|e| exit_with(e));
            match output {
                OutputFormat::Json => print_json(&resp.job)?,
                OutputFormat::Table => {
                    println!("{}: {}", resp.message, resp.job.job_id);
                    println!("Duration: {}", resp.job.duration.as_deref().unwrap_or("-"));
                }
            }
        }
        JobCommands::Active => {
            let active = client.active_job().await.unwrap_or_else(|e| exit_with(e));
            match output {
                OutputFormat::Json => print_json(&active)?,
                OutputFormat::Table => match active {
                    Some(rec) => print_record_table(std::slice::from_ref(&rec)),
                    None => println!("No active job."),
                },
            }
        }
        JobCommands::Completed => {
            let completed = client
                .completed_jobs()
                .await
                .unwrap_or_else(|e| exit_with(e));
            match output {
                OutputFormat::Json => print_json(&completed)?,
                OutputFormat::Table => {
                    if completed.is_empty() {
                        println!("No completed jobs.");
                    } else {
                        print_record_table(&completed);
                        println!();
                        println!("{} completed jobs", completed.len());
                    }
                }
            }
        }
        JobCommands::Stats => {
            let stats = client.stats().await.unwrap_or_else(|e| exit_with(e));
            match output {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Table => {
                    println!("Job Statistics");
                    println!("{}", "=".repeat(40));
                    println!("Total jobs:       {}", stats.total_jobs);
                    println!("Open workloads:   {}", stats.open_workloads);
                    println!("Archived jobs:    {}", stats.archived_jobs);
                    println!("Efficiency:       {}%", stats.efficiency);
                    println!("Total duration:   {}s", stats.total_duration_seconds);
                    println!("Average duration: {}s", stats.average_duration_seconds);
                    println!(
                        "Active job:       {}",
                        stats.active_job_id.as_deref().unwrap_or("-")
                    );
                    if stats.catalog_unavailable {
                        println!("(catalog unavailable on server)");
                    }
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => {
            run_server(server_args).await?;
        }
        Commands::Job { client, command } => {
            let api = JobTrackClient::new(client.addr.clone());
            handle_job_command(&api, command, &client.output).await?;
        }
    }

    Ok(())
}
