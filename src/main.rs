mod predict;
mod tle;
mod web;

use clap::{Parser, Subcommand};
use std::fs;
use std::process::ExitCode;

use crate::web::Config;

#[derive(Parser)]
#[command(name = "satpass")]
#[command(about = "Satellite pass predictions from cached Space-Track element sets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API with periodic TLE refresh
    Serve {
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Fetch TLEs once and update the cache file
    Refresh {
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
        /// Catalog numbers to fetch in addition to the configured list
        #[arg(long, value_delimiter = ',')]
        extra_ids: Vec<u32>,
    },
    /// Parse a TLE file and report the element sets it contains
    Validate { file: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(&config).await,
        Commands::Refresh { config, extra_ids } => refresh(&config, &extra_ids).await,
        Commands::Validate { file } => validate(&file),
    }
}

fn load_config(path: &str) -> Option<Config> {
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error loading config {}: {}", path, e);
            None
        }
    }
}

async fn serve(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    match web::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn refresh(path: &str, extra_ids: &[u32]) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };
    let service = match web::build_refresh_service(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match service.refresh(extra_ids).await {
        Ok(report) => {
            println!(
                "Cache {} updated ({} satellites)",
                config.tle.cache_file.display(),
                report.fetched_ids.len()
            );
            for id in &report.fetched_ids {
                let name = service.store().get(*id).map(|r| r.name).unwrap_or_default();
                println!("  {:>6}  {}", id, name);
            }
            if !report.added_ids.is_empty() {
                println!("Extra IDs: {:?}", report.added_ids);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Refresh failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn validate(path: &str) -> ExitCode {
    let raw = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pairs = tle::parse_pairs(&raw);
    if pairs.is_empty() {
        eprintln!("No valid element sets in {}", path);
        return ExitCode::FAILURE;
    }

    println!("{} valid element sets", pairs.len());
    for (catalog_id, line1, _) in &pairs {
        println!("  {:>6}  epoch {}", catalog_id, line1.get(18..32).unwrap_or("?").trim());
    }
    ExitCode::SUCCESS
}
