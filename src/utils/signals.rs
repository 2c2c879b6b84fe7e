//! Signal handling for shutdown and activation

use futures::stream::StreamExt;
use signal_hook::consts::{SIGCONT, SIGINT, SIGTERM, SIGUSR1};
use signal_hook_tokio::Signals;
use tracing::{info, warn};

/// Wait for shutdown signals (SIGTERM, SIGINT)
pub async fn shutdown_signal() {
    let mut signals = match Signals::new([SIGTERM, SIGINT]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Failed to create signal handler: {}, falling back to Ctrl-C", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    if let Some(signal) = signals.next().await {
        info!("Received signal: {}", signal);
    }
}

/// Signals that mean "this context just became active": SIGCONT when the
/// shell brings the job back to the foreground, SIGUSR1 on request.
pub fn activation_signals() -> Option<Signals> {
    match Signals::new([SIGCONT, SIGUSR1]) {
        Ok(signals) => Some(signals),
        Err(e) => {
            warn!("Failed to register activation signals: {}", e);
            None
        }
    }
}

/// Next activation signal, or never when none could be registered
pub async fn next_activation(signals: &mut Option<Signals>) -> i32 {
    match signals {
        Some(signals) => match signals.next().await {
            Some(signal) => signal,
            None => std::future::pending().await,
        },
        None => std::future::pending().await,
    }
}
