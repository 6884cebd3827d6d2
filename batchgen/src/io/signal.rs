//! Interrupt watcher: sets a shared flag on Ctrl-C or SIGTERM.
//!
//! The flag is only read at loop boundaries; an in-flight call runs to
//! completion or timeout first.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Spawn the watcher thread and return the flag it sets.
pub fn install_interrupt_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("build signal runtime")?;
    let watcher = Arc::clone(&flag);
    thread::Builder::new()
        .name("interrupt-watcher".to_string())
        .spawn(move || runtime.block_on(watch(watcher)))
        .context("spawn interrupt watcher")?;
    Ok(flag)
}

async fn watch(flag: Arc<AtomicBool>) {
    wait_for_signal().await;
    flag.store(true, Ordering::SeqCst);
    // Show cursor, reset attributes.
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(b"\x1b[?25h\x1b[0m");
    let _ = stdout.flush();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(error = %err, "failed to install SIGTERM handler");
            None
        }
    };
    let term = async {
        match terminate.as_mut() {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received SIGINT"),
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGINT");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = interrupt => {}
        () = term => info!("received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C"),
        Err(err) => {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
