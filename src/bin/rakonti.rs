use anyhow::Result;
use rakonti::cli;

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;

    let result = action.execute().await;

    // Flush any buffered spans before the process exits.
    cli::telemetry::shutdown_tracer();

    result
}
