use std::sync::atomic::{AtomicBool, Ordering};

use console::Term;

/// Set by the first Ctrl+C; download loops stop before the next item.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

#[inline]
pub(crate) fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Acquire)
}

#[inline]
fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::Release);
}

/// Set up the Ctrl+C handler.
///
/// The first Ctrl+C lets the current traversal finish (and commit or roll
/// back); the second exits immediately, which leaves the open transaction to
/// the database to discard.
pub(crate) fn setup_shutdown_handler() {
    tokio::spawn(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing current download...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing current download");
        }

        request_shutdown();

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });
}
