//! bagnode entry point.

use bagnode::{BagRecorderNode, Config};
use eyre::{Result, WrapErr, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(config_file) = std::env::args().nth(1) else {
        bail!(
            "A configuration file is required.\n\
             Usage: bagnode /path/to/config.yaml"
        );
    };

    info!(config_file = %config_file, "Loading configuration");
    let config = Config::load(&config_file)?;

    info!(
        node = %config.node.name,
        namespace = %config.node.namespace,
        num_publishers = config.publishers.len(),
        num_subscriptions = config.subscriptions.len(),
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("Failed to create tokio runtime")?;

    let report = runtime.block_on(async move {
        let node = BagRecorderNode::new(config)?;
        node.run().await
    })?;

    for (topic, count) in &report.published {
        info!(topic = %topic, count, "Published");
    }
    for (topic, summary) in &report.recorded {
        info!(
            topic = %topic,
            messages = summary.messages,
            bytes = summary.bytes,
            "Recorded"
        );
    }

    Ok(())
}
