use anyhow::Result;
use tracing_subscriber::EnvFilter;
use uci_engine::{serve, EngineBehavior};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut behavior = EngineBehavior::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--name" => {
                if let Some(name) = args.next() {
                    behavior.name = name;
                }
            }
            "--depth" => {
                behavior.depth = args.next().and_then(|d| d.parse().ok()).unwrap_or(behavior.depth)
            }
            other => tracing::warn!(arg = other, "unknown argument"),
        }
    }

    serve(tokio::io::stdin(), tokio::io::stdout(), behavior).await?;
    Ok(())
}
