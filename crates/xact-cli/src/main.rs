mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{dispatch::DispatchArgs, fingerprint::FingerprintArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "xact",
    about = "Inspect action objects and run authorized, validated dispatches",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest xact.yaml walking up from the cwd)
    #[arg(long, global = true, env = "XACT_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config for common mistakes
    Validate,

    /// List configured objects and the actions they declare
    Objects,

    /// Print the selector derived from an action name
    Selector { name: String },

    /// Run dispatches against a fresh host built from the config
    Dispatch(DispatchArgs),

    /// Compute the fingerprint an arbiter would check
    Fingerprint(FingerprintArgs),
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = root::resolve_config(cli.config.as_deref());

    let result = match cli.command {
        Commands::Validate => cmd::validate::run(&config_path, cli.json),
        Commands::Objects => cmd::objects::run(&config_path, cli.json),
        Commands::Selector { name } => cmd::selector::run(&name, cli.json),
        Commands::Dispatch(args) => cmd::dispatch::run(&config_path, args, cli.json),
        Commands::Fingerprint(args) => cmd::fingerprint::run(&config_path, args, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
