use crate::context::{registry, sqlite_config};
use anyhow::Result;
use colored::Colorize;
use gob_config::GobConfig;
use gob_sqlite::SqliteStore;

pub fn execute(config: &GobConfig) -> Result<()> {
    let registry = registry(config)?;
    SqliteStore::create(sqlite_config(config), &registry)?;

    println!(
        "{} Database initialized at: {}",
        "Success:".green().bold(),
        config.database.path.display()
    );
    println!("  Collections: {}", registry.collections().count());
    Ok(())
}
