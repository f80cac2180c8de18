mod check;
mod seed;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use gantry_core::ResolutionPolicy;

/// Gantry contract-driven API runtime.
#[derive(Parser)]
#[command(name = "gantry", version, about = "Contract-driven API runtime")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load resource specifications and serve the generated API
    Serve {
        /// Directory of resource specification YAML files
        spec_dir: PathBuf,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// SQLite database file backing the record stores
        #[arg(long, default_value = "gantry.db")]
        db: PathBuf,
        /// Directory of per-resource seed files (<resource>.json arrays)
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Replace unresolvable schema references with null instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Validate a specification directory without serving
    Check {
        /// Directory of resource specification YAML files
        spec_dir: PathBuf,
        /// Replace unresolvable schema references with null instead of failing
        #[arg(long)]
        lenient: bool,
    },
}

fn policy(lenient: bool) -> ResolutionPolicy {
    if lenient {
        ResolutionPolicy::Lenient
    } else {
        ResolutionPolicy::Strict
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve {
            spec_dir,
            port,
            db,
            seed,
            lenient,
        } => serve::start_server(port, &spec_dir, &db, seed.as_deref(), policy(lenient)).await,
        Commands::Check { spec_dir, lenient } => check::run(&spec_dir, policy(lenient)),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
