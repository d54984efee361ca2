use crate::context::{registry, sqlite_config};
use anyhow::{Context, Result};
use colored::Colorize;
use gob_config::GobConfig;
use gob_sqlite::{load_records, SqliteStore};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

pub fn execute(config: &GobConfig, path: Option<&Path>) -> Result<()> {
    let registry = registry(config)?;
    let store = SqliteStore::new(sqlite_config(config))
        .context("Database missing, run `gob init-db` first")?;
    let mut conn = store.connect_rw()?;

    let input: Box<dyn BufRead> = match path {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let stats = load_records(&mut conn, &registry, input)?;

    println!(
        "{} Loaded {} entities and {} relations",
        "Success:".green().bold(),
        stats.entities,
        stats.relations
    );
    Ok(())
}
