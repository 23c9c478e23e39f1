use std::io::BufRead;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use newsflow_models::NewsflowConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "newsflow",
    about = "Newsflow - classify financial headlines and derive per-ticker signals"
)]
struct Cli {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process headlines in order and print each outcome and the final signals
    Submit {
        /// Headlines to submit; read one per line from stdin when omitted
        headlines: Vec<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => newsflow::pipeline::load_config(path)
            .with_context(|| format!("Failed to load config: {path}"))?,
        None => NewsflowConfig::default(),
    };

    match cli.command {
        Command::Config => {
            print!("{}", toml::to_string(&config).context("Failed to render config")?);
        }
        Command::Submit { headlines } => {
            let headlines = if headlines.is_empty() {
                std::io::stdin()
                    .lock()
                    .lines()
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read headlines from stdin")?
                    .into_iter()
                    .filter(|line| !line.trim().is_empty())
                    .collect()
            } else {
                headlines
            };

            let coordinator =
                newsflow::build_coordinator(config).context("Failed to build coordinator")?;
            let submissions = newsflow::submit_headlines(&coordinator, &headlines)
                .await
                .context("Submission failed")?;
            tracing::info!(headlines = submissions.len(), "Headlines submitted");

            for submission in &submissions {
                println!("{}", render(submission, cli.pretty)?);
            }
            let signals = coordinator
                .current_signals()
                .context("Failed to read signals")?;
            println!(
                "{}",
                render(&serde_json::json!({ "signals": signals }), cli.pretty)?
            );
        }
    }

    Ok(())
}

fn render<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}
