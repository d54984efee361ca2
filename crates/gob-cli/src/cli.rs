use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    Off,
    /// Error messages only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    Info,
    /// Debug messages, including compiled SQL
    Debug,
    /// Trace-level messages
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Parser)]
#[command(name = "gob")]
#[command(about = "gob - stream versioned catalog collections as NDJSON")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (off, error, warn, info, debug, trace)
    /// If not specified, uses config file value
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose logging (shortcut for --log-level=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (toml, yaml or json)
    #[arg(short = 'C', long, global = true, env = "GOB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file (overrides config file)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Model definition (overrides config file)
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Authorization scheme (overrides config file)
    #[arg(long, global = true)]
    pub auth_scheme: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the streaming endpoint over HTTP
    Serve {
        /// Bind host (overrides config file)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Compile a query and print the SQL
    Compile {
        /// Query text; read from stdin when omitted
        query: Option<String>,

        /// Print SQL and result plan as JSON
        #[arg(long)]
        plan: bool,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Run a query and write entities to stdout, one JSON document per line
    Query {
        /// Query text; read from stdin when omitted
        query: Option<String>,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Create the database tables for the model
    InitDb,

    /// Load NDJSON entity and relation records into the database
    Load {
        /// Records file; stdin when omitted
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,
    },
}

/// Identity to query as
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CallerArgs {
    /// Comma separated roles
    #[arg(short, long, default_value = "")]
    pub roles: String,

    /// User id
    #[arg(short, long)]
    pub user: Option<String>,
}
