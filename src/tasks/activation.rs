//! Activation task: re-derive local state whenever this context hears that
//! the record may have changed

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::broadcast::error::RecvError,
    time::{interval, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{services::TimerEvent, state::TimerContext};

/// Reconcile and log failures. Reconciliation errors never take a context
/// down; the next activation gets another chance.
pub fn reconcile_logged(ctx: &Arc<TimerContext>, reason: &str) {
    match ctx.reconcile() {
        Ok(outcome) => debug!("Reconciled on {}: {:?}", reason, outcome),
        Err(e) => warn!("Reconciliation on {} failed: {}", reason, e),
    }
}

pub(crate) fn resync_interval(every: Option<Duration>) -> Option<Interval> {
    every.filter(|d| !d.is_zero()).map(|every| {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    })
}

pub(crate) async fn next_resync(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Background task for the status-card context: reconciles on every
/// same-process broadcast and, optionally, on a fixed resync interval so
/// changes made by other processes are picked up without a broadcast.
pub async fn activation_task(ctx: Arc<TimerContext>, resync_every: Option<Duration>) {
    info!("Starting activation task");

    let mut events = ctx.services().subscribe();
    let mut resync = resync_interval(resync_every);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(TimerEvent::StateChanged) => reconcile_logged(&ctx, "state change"),
                Ok(TimerEvent::Finished) => debug!("Finish broadcast received"),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Missed {} timer events, reconciling", missed);
                    reconcile_logged(&ctx, "lagged events");
                }
                Err(RecvError::Closed) => {
                    info!("Event channel closed, stopping activation task");
                    return;
                }
            },
            _ = next_resync(&mut resync) => reconcile_logged(&ctx, "resync"),
        }
    }
}
