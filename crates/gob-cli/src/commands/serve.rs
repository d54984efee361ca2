use anyhow::Result;
use gob_config::GobConfig;
use gob_web::{start_server, AppState};

pub async fn execute(mut config: GobConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let state = AppState::from_config(&config)?;
    start_server(state, &config.server).await?;
    Ok(())
}
