//! Configuration for the GOB streaming query service
//!
//! ## Features
//!
//! - TOML, YAML and JSON files, chosen by extension
//! - Defaults for every section
//! - `GOB_*` environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gob_config::ConfigLoader;
//!
//! let config = ConfigLoader::load(Some("gob.toml".as_ref()))?;
//! println!("listening on {}", config.server.bind_address());
//! # Ok::<(), gob_config::ConfigError>(())
//! ```

mod config;
mod error;
mod loader;

pub use config::*;
pub use error::*;
pub use loader::*;
