//! swcache - offline caching controller for a progressive web app origin

use clap::Parser;

mod cache;
mod cli;
mod config;
mod error;
mod net;
mod output;
mod worker;

use cli::{CacheCommands, Cli, Commands, GlobalOptions};
use error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `warn` by default, `debug` with --debug; RUST_LOG overrides both
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Register { skip_waiting } => cli::register::run(&opts, skip_waiting).await,
        Commands::Fetch {
            target,
            accept,
            method,
        } => cli::fetch::run(&opts, &target, accept.as_deref(), &method).await,
        Commands::Sweep => cli::sweep::run(&opts).await,
        Commands::Watch => cli::sweep::watch(&opts).await,
        Commands::Push { body, click } => {
            cli::push::run(&opts, body.as_deref(), click.as_deref()).await
        }
        Commands::Version => cli::version::run(&opts).await,
        Commands::Cache(cmd) => match cmd {
            CacheCommands::Status => cli::cache::status(&opts).await,
            CacheCommands::Clear => cli::cache::clear(&opts),
            CacheCommands::Path => cli::cache::path(&opts),
        },
    }
}
