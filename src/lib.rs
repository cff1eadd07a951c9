// src/lib.rs

pub mod auth;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod protocol;
pub mod resolve;
pub mod transport;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::engine::{CoreRuntime, Intake, Runtime, RuntimeEvent};
use crate::exec::RealExecutorBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::resolve::ExecutableResolver;
use crate::transport::{spawn_line_reader, LineTransport};

/// Capacity of the runtime event channel. Output pumps block on a full
/// channel, which throttles chatty children instead of buffering without
/// bound in the channel itself.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - request intake (shadow file + search path)
/// - core runtime / scheduler
/// - executor
/// - stdio transport
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref().map(Path::new))?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    if args.check {
        print_settings(&cfg, &fs);
        return Ok(());
    }

    info!(
        max_concurrent = cfg.exec.max_concurrent,
        timeout = ?cfg.exec.timeout,
        backlog_limit = ?cfg.exec.backlog_limit,
        shadow = %cfg.auth.shadow_path.display(),
        "starting rcmd"
    );

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);

    // Process executor backend (real implementation in production).
    let executor = RealExecutorBackend::new(rt_tx.clone());

    // Requests arrive on stdin, replies leave on stdout.
    let _reader = spawn_line_reader(BufReader::new(tokio::io::stdin()), rt_tx.clone());
    let transport = LineTransport::new(tokio::io::stdout());

    // Ctrl-C → immediate shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    let core = CoreRuntime::from_config(&cfg);
    let intake = Intake::from_config(&cfg, fs);

    // Construct the async IO shell around the core.
    let runtime = Runtime::new(core, intake, rt_rx, executor, transport);
    let core = runtime.run().await?;

    debug!(
        running = core.running_count(),
        queued = core.backlog_len(),
        "runtime stopped"
    );
    Ok(())
}

/// `--check` output: the effective settings after defaults and validation.
fn print_settings(cfg: &ConfigFile, fs: &Arc<dyn FileSystem>) {
    let resolver = ExecutableResolver::from_settings(&cfg.exec, Arc::clone(fs));

    println!("rcmd effective settings");
    println!("  exec.max_concurrent = {}", cfg.exec.max_concurrent);
    println!("  exec.timeout = {:?}", cfg.exec.timeout);
    match cfg.exec.backlog_limit {
        Some(limit) => println!("  exec.backlog_limit = {limit}"),
        None => println!("  exec.backlog_limit = unbounded"),
    }
    println!("  exec.search_path = {}", resolver.search_path());
    println!("  exec.max_reply_bytes = {}", cfg.exec.max_reply_bytes);
    println!("  exec.reply_on_timeout = {}", cfg.exec.reply_on_timeout);
    if !cfg.exec.env_deny.is_empty() {
        println!("  exec.env_deny = {:?}", cfg.exec.env_deny);
    }
    println!("  auth.shadow_path = {}", cfg.auth.shadow_path.display());
    if !fs.is_file(&cfg.auth.shadow_path) {
        println!("    (warning: not a regular file)");
    }

    debug!("config check complete (no execution)");
}
