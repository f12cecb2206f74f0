use anyhow::Result;
use cc_bridge::{AdapterConfig, ClaudeCodeCli, CodeAgentModel, logging, models::ModelRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

/// Reads one JSON request from stdin and writes the JSON response to stdout.
#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let request: ModelRequest = serde_json::from_str(&input)?;

    let backend = ClaudeCodeCli::from_env();
    let model = CodeAgentModel::new(backend, AdapterConfig::from_env())?;
    info!("Running request against {}", model.model_name());

    let response = model.request(&request).await?;
    let mut output = serde_json::to_vec_pretty(&response)?;
    output.push(b'\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&output).await?;
    stdout.flush().await?;

    Ok(())
}
