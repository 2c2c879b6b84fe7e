//! Finish sequence shared by the countdown and reconciliation

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::{machine, TimerContext};
use crate::{error::TransitionError, services::TimerEvent};

/// What detected the expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishTrigger {
    Countdown,
    Reconciliation,
}

impl TimerContext {
    /// Finish sequence: stop the countdown, play the sound unless
    /// suppressed, persist the re-armed record, show the completed card and
    /// tear it down after a delay.
    ///
    /// Runs at most once per completion. A second trigger for the same
    /// expiry re-reads the record, finds it already re-armed and does
    /// nothing visible.
    pub fn finish(self: &Arc<Self>, trigger: FinishTrigger) {
        let _guard = match self.finishing.lock() {
            Ok(guard) => guard,
            Err(e) => e.into_inner(),
        };
        let suppress = self.suppress_sound.swap(false, Ordering::SeqCst);
        let services = self.services();
        let now = self.now();

        let mut record = match services.store.load_or_create(self.timer_id(), now) {
            Ok(record) => record,
            Err(e) => {
                error!("Finish ({:?}) could not read the timer: {}", trigger, e);
                return;
            }
        };

        if let Err(TransitionError::NotExpired) = machine::expire(&mut record, now) {
            debug!(
                "Finish ({:?}) skipped, record no longer expired ({:?})",
                trigger,
                record.status(now)
            );
            let running = !record.is_paused();
            self.adopt(record);
            if !running {
                self.stop_countdown();
            } else if trigger == FinishTrigger::Countdown || !self.has_countdown() {
                // The calling countdown is about to return
                self.start_countdown();
            }
            return;
        }

        self.stop_countdown();

        if !suppress && self.settings().play_sound {
            services.sounds.play(record.sound_or_default());
        }

        if let Err(e) = services.store.upsert(&record, now) {
            warn!("Failed to persist finished timer: {}", e);
        }
        info!(
            "Timer finished ({:?}), reset to {}s{}",
            trigger,
            record.total.as_secs(),
            if suppress { ", sound suppressed" } else { "" }
        );

        services.cards.complete(self.timer_id(), record.total);
        self.adopt(record);
        self.schedule_teardown();
        services.broadcast(TimerEvent::Finished);
    }

    /// End the completed card after the teardown delay, unless the timer
    /// has been started again in the meantime. The task does not need the
    /// context to still be around.
    fn schedule_teardown(&self) {
        let services = Arc::clone(self.services());
        let timer_id = self.timer_id().to_string();
        let delay: Duration = self.settings().teardown_delay;

        tokio::spawn(async move {
            sleep(delay).await;

            match services.store.fetch(&timer_id) {
                Ok(Some(record)) if !record.is_paused() => {
                    debug!("Timer restarted before teardown, keeping card");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Teardown could not read the timer: {}", e);
                    return;
                }
            }

            if !services.cards.end_completed(&timer_id, Duration::ZERO) {
                debug!("Card no longer shows completion, skipping teardown");
            }
        });
    }
}
