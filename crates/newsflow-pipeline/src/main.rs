use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use newsflow_pipeline::{build_coordinator, build_source, load_config, open_journal, Daemon};

#[derive(Parser, Debug)]
#[command(
    name = "newsflow-daemon",
    about = "Newsflow daemon - polls news, classifies headlines, and prints per-ticker signal changes as JSON lines"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/newsflow.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config))?;

    let source = build_source(&config.source).context("Failed to build news source")?;
    let journal = open_journal(&config.journal)
        .with_context(|| format!("Failed to open journal: {}", config.journal.sqlite_path))?;
    let coordinator = build_coordinator(config).context("Failed to build coordinator")?;

    let mut daemon = Daemon::new(coordinator.clone());
    if let Some(source) = source {
        daemon = daemon.with_source(source);
    }
    if let Some(journal) = journal {
        daemon = daemon.with_journal(journal);
    }
    let cancel = daemon.cancel_token();

    // Handle shutdown signals
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal");
            cancel.cancel();
        });
    }

    // Signal changes go to stdout, one JSON object per line
    let mut events = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if !matches!(event.as_ref(), newsflow_models::PipelineEvent::SignalChanged(_)) {
                        continue;
                    }
                    match serde_json::to_string(event.as_ref()) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::error!(error = %e, "Failed to serialize event"),
                    }
                }
            }
        }
    });

    daemon
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Daemon error: {e}"))?;
    let _ = printer.await;

    Ok(())
}
