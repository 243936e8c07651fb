use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "keyval",
    about = "keyval — typed key-value client walkthrough",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Store configuration (keyval.toml). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run put, get, update, match and remove against a database.
    Demo {
        /// Database file, or `:memory:` for an ephemeral store.
        #[arg(short, long, default_value = ":memory:")]
        db: String,
        /// Number of records to write.
        #[arg(short, long, default_value = "5")]
        n: u32,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keyval=info".parse()?)
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Demo { db, n } => commands::demo::run(&db, config, n),
        Commands::Config => commands::config::show(&config),
    }
}
