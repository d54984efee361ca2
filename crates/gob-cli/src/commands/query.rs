use crate::cli::CallerArgs;
use crate::context::{auth_context, store};
use anyhow::Result;
use gob_config::GobConfig;
use gob_query::{compile_query, EntityStream};
use std::io::{BufWriter, Write};
use tracing::{debug, info};

/// Stream matching entities to `out`; returns how many were written
pub fn execute(
    config: &GobConfig,
    query: &str,
    caller: &CallerArgs,
    out: impl Write,
) -> Result<u64> {
    let auth = auth_context(config, caller)?;
    let compiled = compile_query(query, &auth)?;
    debug!(sql = %compiled.sql, "Compiled SQL");

    let mut out = BufWriter::new(out);
    let count = store(config)?.with_cursor(&compiled.sql, |cursor| {
        let mut count = 0u64;
        for entity in EntityStream::new(cursor, &compiled.plan, &auth)? {
            serde_json::to_writer(&mut out, &entity?)?;
            out.write_all(b"\n")?;
            count += 1;
        }
        Ok::<_, anyhow::Error>(count)
    })??;
    out.flush()?;

    info!(count, "Query complete");
    Ok(count)
}

