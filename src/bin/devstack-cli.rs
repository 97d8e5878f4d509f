use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use devstack_sdk::{ApiClient, HealthReport};

#[derive(Parser)]
#[command(name = "devstack-cli")]
#[command(about = "Command-line client for the devstack backend", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:4000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the service description
    Info,
    /// Show the versioned API info
    Api {
        #[arg(long, default_value = "v1")]
        version: String,
    },
    /// Show dependency health
    Health {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,

        /// Seconds between polls
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.url);

    match cli.command {
        Commands::Info => {
            let info = client.info().await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Api { version } => {
            let info = client.api_info(&version).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Health { watch: false, .. } => {
            let report = client.health().await?;
            print_health(&report);
            if !report.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Health { watch: true, interval } => {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => match client.health().await {
                        Ok(report) => print_health(&report),
                        Err(e) => eprintln!("health check failed: {}", e),
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_health(report: &HealthReport) {
    println!(
        "[{}] status={} database={} redis={}",
        report.timestamp, report.status, report.services.database, report.services.redis
    );
    if let Some(error) = &report.error {
        println!("  error: {}", error);
    }
}
