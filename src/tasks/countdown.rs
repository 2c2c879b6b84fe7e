//! Clock-derived countdown task

use std::{sync::Weak, time::Duration};

use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::{record::remaining_until, FinishTrigger, TimerContext};

/// Ticks until the in-memory record's `end_at` is reached, then expires the
/// timer once after the grace interval.
///
/// Remaining time is recomputed from `end_at` and the clock on every tick,
/// so a suspended process picks up exactly where the clock says it should.
/// The task holds only a weak reference and gives up as soon as its epoch
/// is no longer the context's current one.
pub async fn countdown_task(weak: Weak<TimerContext>, epoch: u64) {
    let (tick, grace) = match weak.upgrade() {
        Some(ctx) => (ctx.settings().tick, ctx.settings().grace),
        None => return,
    };

    let mut ticker = interval(tick);
    // After a long suspension fire once, not a burst of catch-up ticks
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        {
            let Some(ctx) = weak.upgrade() else { return };
            if !ctx.is_current_countdown(epoch) {
                return;
            }

            // Reads the in-memory record each time, so a reconciliation that
            // moved `end_at` is picked up by the running countdown
            let Some(end_at) = ctx.record().end_at() else {
                debug!("Countdown {} found the timer paused, stopping", epoch);
                ctx.release_countdown(epoch);
                return;
            };

            let remaining = remaining_until(end_at, ctx.now());
            if remaining > Duration::ZERO {
                ctx.publish_remaining(remaining);
                continue;
            }
            ctx.publish_remaining(Duration::ZERO);
            info!("Countdown reached zero");
        }

        sleep(grace).await;

        let Some(ctx) = weak.upgrade() else { return };
        if !ctx.is_current_countdown(epoch) {
            debug!("Countdown {} was cancelled during the grace period", epoch);
            return;
        }
        match ctx.record().end_at() {
            None => {
                ctx.release_countdown(epoch);
                return;
            }
            Some(end_at) if remaining_until(end_at, ctx.now()) > Duration::ZERO => {
                debug!("End moved during the grace period, counting down again");
                continue;
            }
            Some(_) => {}
        }

        ctx.finish(FinishTrigger::Countdown);
        return;
    }
}
