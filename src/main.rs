//! Shopfloor Agent - Main Entry Point
//!
//! Runs the first configured producer against protocol lines read from
//! stdin, one line per message, until stdin closes.

use anyhow::{Context, Result};
use shopfloor_agent::{logging, Agent, AgentConfig};
use std::io::BufRead;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "agent.toml";

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = AgentConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    let _log_guard = logging::init(&config.logging);

    tracing::info!("Starting shopfloor agent with {:?}", path);

    let agent = Agent::new(&config)?;
    let producer_config = config
        .producers
        .first()
        .context("No producers configured")?;
    let mut producer = agent.add_producer(producer_config)?;

    // Reader thread: stdin lines → channel
    let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
    let reader = std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    producer.connecting()?;
    producer.connected()?;

    let mut lines = 0u64;
    for line in line_rx.iter() {
        producer.dispatch_line(&line)?;
        lines += 1;
    }

    producer.disconnected()?;
    if reader.join().is_err() {
        tracing::warn!("Stdin reader thread panicked");
    }

    let stats = producer.stats();
    tracing::info!(
        "Processed {} lines ({} recoverable errors); next sequence {}, {} active assets",
        lines,
        stats.recoverable_errors,
        agent.sequence(),
        agent.assets().active_count()
    );
    Ok(())
}
