//! Devstack backend server.
//!
//! ```text
//!     Client ──▶ correlation ─▶ access log ─▶ headers/CORS ─▶ limits
//!                                                                │
//!                                    error envelope ◀────────────┘
//!                                          │
//!                                          ▼
//!                            [response cache] ─▶ handler
//!                                                  │
//!                                   ┌──────────────┴──────────────┐
//!                                   ▼                             ▼
//!                             PostgreSQL pool                Redis cache
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use devstack_backend::config;
use devstack_backend::lifecycle::startup;
use devstack_backend::observability::init_logging;

#[derive(Parser)]
#[command(name = "devstack-backend", version)]
#[command(about = "Devstack backend API server", long_about = None)]
struct Args {
    /// Env file loaded before reading configuration (default: ./.env if present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Validate configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = config::load_env_file(args.env_file.as_deref()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    let config = startup::load_config_or_exit();

    if args.check_config {
        println!("Configuration OK");
        println!("{:#?}", config);
        return ExitCode::SUCCESS;
    }

    let _guard = match init_logging(&config.logging, config.server.environment) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        environment = %config.server.environment,
        port = config.server.port,
        "devstack-backend v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
