use crate::cli::CallerArgs;
use crate::context::auth_context;
use anyhow::Result;
use gob_config::GobConfig;
use gob_query::compile_query;

pub fn execute(config: &GobConfig, query: &str, plan: bool, caller: &CallerArgs) -> Result<()> {
    let auth = auth_context(config, caller)?;
    let compiled = compile_query(query, &auth)?;

    if plan {
        println!("{}", serde_json::to_string_pretty(&compiled)?);
    } else {
        println!("{}", compiled.sql);
    }
    Ok(())
}
