

use ontomatch::{OntomatchClient, OntomatchConfig};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("ontomatch=info".parse()?)
        )
        .init();

    let config = OntomatchConfig::from_env();
    let client = OntomatchClient::new(config)?;
    let stats = client.initialize().await?;
    info!("🧠 Concept index ready: {} concepts", stats.total_concepts);

    match client.sync_lecturer_knowledge(None).await {
        Ok(report) => info!("📚 Indexed {} chunks for {} lecturers", report.chunks, report.lecturers),
        Err(e) => warn!("Lecturer knowledge sync failed: {}", e),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = client.spawn_detection_schedule(shutdown_rx);
    info!(
        "⏱️ Candidate detection every {:?}",
        client.config().evolution.job_interval()
    );

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutting down");
    let _ = shutdown_tx.send(true);
    handle.await?;

    Ok(())
}
