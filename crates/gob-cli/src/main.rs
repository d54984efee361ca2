use anyhow::Result;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use gob_cli::cli::{Cli, Commands};
use gob_cli::{commands, context};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = context::load_config(&cli)?;

    // stdout carries query output, logs go to stderr
    let level: LevelFilter = match (cli.log_level, cli.verbose) {
        (Some(level), _) => level.into(),
        (None, true) => LevelFilter::DEBUG,
        (None, false) => config.logging.level.parse().unwrap_or(LevelFilter::INFO),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { host, port } => commands::serve::execute(config, host, port).await?,

        Commands::Compile {
            query,
            plan,
            caller,
        } => {
            let query = context::read_query(query)?;
            commands::compile::execute(&config, &query, plan, &caller)?
        }

        Commands::Query { query, caller } => {
            let query = context::read_query(query)?;
            tokio::task::spawn_blocking(move || {
                commands::query::execute(&config, &query, &caller, std::io::stdout().lock())
            })
            .await??;
        }

        Commands::InitDb => commands::init_db::execute(&config)?,

        Commands::Load { path } => commands::load::execute(&config, path.as_deref())?,
    }

    Ok(())
}
