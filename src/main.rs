//! # DelaySend — delayed message dispatch host
//!
//! Reads commands from stdin and drives the delayed-dispatch controller.
//!
//! Usage:
//!   delaysend                                # default config + snapshot
//!   delaysend --snapshot ./snapshot.json     # custom snapshot
//!   delaysend --config ./delaysend.toml -v   # custom config, debug logs
//!
//! Commands (one per line):
//!   start <message_id>    schedule the message's delayed send
//!   stop <message_id>     cancel it while it is still waiting
//!   list                  show waiting/sending tasks
//!   quit                  cancel waiting tasks and exit

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use delaysend_core::DelaySendConfig;
use delaysend_core::types::Command;
use delaysend_scheduler::dispatch::transport_from_config;
use delaysend_scheduler::{DelayedDispatcher, LogPublisher, RetryPolicy, RetrySender, SnapshotStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "delaysend",
    version,
    about = "⏰ DelaySend — send messages later, with progress and cancel"
)]
struct Cli {
    /// Config file (defaults to ~/.delaysend/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Message/conversation snapshot (overrides the config value)
    #[arg(short, long)]
    snapshot: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "delaysend=debug,delaysend_scheduler=debug"
    } else {
        "delaysend=info,delaysend_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => DelaySendConfig::load_from(Path::new(&expand_path(path)))?,
        None => DelaySendConfig::load()?,
    };
    config.validate()?;

    let snapshot_path = expand_path(cli.snapshot.as_deref().unwrap_or(&config.snapshot_path));
    let store = Arc::new(SnapshotStore::load(Path::new(&snapshot_path))?);

    let sender = Arc::new(RetrySender::new(
        transport_from_config(&config.transport),
        RetryPolicy::from_config(&config.retry),
    ));
    let publisher = Arc::new(LogPublisher::new());
    let dispatcher = DelayedDispatcher::new(store.clone(), store.clone(), sender, publisher)
        .with_config(&config.scheduler);

    println!("⏰ DelaySend v{}", env!("CARGO_PKG_VERSION"));
    println!("   📂 Snapshot:   {snapshot_path} ({} messages)", store.message_count());
    println!("   🚚 Transport:  {:?}", config.transport.kind);
    println!("   ⏱️  Tick:       {} ms", config.scheduler.tick_interval_ms);
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C");
                None
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();

        match line.to_ascii_lowercase().as_str() {
            "" => continue,
            "quit" | "exit" => break,
            "list" => {
                let tasks = dispatcher.active_tasks();
                if tasks.is_empty() {
                    println!("(no delayed sends)");
                }
                for task in tasks {
                    println!(
                        "{:>8}  {:<9}  due {}",
                        task.message_id,
                        task.state,
                        task.scheduled_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                continue;
            }
            _ => {}
        }

        let command: Command = match line.parse() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("⚠️ {e}");
                continue;
            }
        };
        if let Some(join) = dispatcher.dispatch(command) {
            let message_id = command.message_id;
            tokio::spawn(async move {
                match join.await {
                    Ok(outcome) => tracing::info!("📋 Message {}: {:?}", message_id, outcome),
                    Err(e) => tracing::warn!("⚠️ Task for message {} failed: {}", message_id, e),
                }
            });
        }
    }

    eprintln!("⏹️ Waiting for delayed sends to wind down (Ctrl-C again to force quit)");
    wind_down(&dispatcher, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;
    Ok(())
}

/// Shut the dispatcher down unless `interrupt` resolves first. Returns false
/// when the wait was abandoned.
async fn wind_down(dispatcher: &DelayedDispatcher, interrupt: impl Future<Output = ()>) -> bool {
    tokio::select! {
        _ = dispatcher.shutdown() => true,
        _ = interrupt => {
            tracing::warn!(
                "⚠️ Forced exit with {} delayed send(s) still active",
                dispatcher.stats().active
            );
            false
        }
    }
}
