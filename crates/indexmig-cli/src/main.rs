//! indexmig - runs content-index settings migrations for a tenant.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod config;
mod error;

use clap::Parser;
use config::Args;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indexmig=info,indexmig_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), error::CliError> {
    let (config, command) = args.into_config()?;
    tracing::debug!(
        data_path = %config.data_path.display(),
        rules = config.migration.rules.len(),
        isolation = %config.migration.documents.isolation_level,
        "configuration loaded"
    );

    let output = commands::execute(&config, command)?;
    println!("{}", output);
    Ok(())
}
