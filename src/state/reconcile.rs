//! Reconciliation of a context's local state against the persisted record
//!
//! Run whenever a context becomes active or hears that the record changed.
//! Other processes may have rewritten the record at any time, so nothing
//! local is trusted: the record is read fresh and the countdown, the status
//! card and the completion handling are driven from it. Running it again on
//! an unchanged record has no further external effect.

use std::sync::{atomic::Ordering, Arc};

use chrono::Duration as ChronoDuration;
use tracing::debug;

use super::{FinishTrigger, TimerContext, TimerPhase};
use crate::error::Result;

/// What a reconciliation found and did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Running, and the local countdown was already going
    AlreadyCounting,
    /// Running; the local countdown was (re)started
    CountdownStarted,
    /// The timer ran out while this context was not looking; finished
    /// without sound
    ExpiredWhileAway,
    /// Paused part-way
    Paused,
    /// Idle
    Idle,
}

impl TimerContext {
    pub fn reconcile(self: &Arc<Self>) -> Result<Reconciliation> {
        let services = self.services();
        let now = self.now();
        let record = services.store.load_or_create(self.timer_id(), now)?;
        let timer_id = self.timer_id();
        self.adopt(record.clone());

        let outcome = match record.phase {
            TimerPhase::Running { end_at } => {
                if self.has_countdown() {
                    Reconciliation::AlreadyCounting
                } else if end_at - now > ChronoDuration::zero() {
                    self.start_countdown();
                    services.cards.ensure_running(timer_id, end_at, record.total);
                    Reconciliation::CountdownStarted
                } else {
                    // Expired while inactive; a late alert would only surprise
                    self.suppress_sound.store(true, Ordering::SeqCst);
                    self.finish(FinishTrigger::Reconciliation);
                    Reconciliation::ExpiredWhileAway
                }
            }
            TimerPhase::Paused { remaining } => {
                if self.stop_countdown() {
                    debug!("Stopped local countdown, the timer is paused");
                }

                if remaining.is_zero() {
                    self.suppress_sound.store(true, Ordering::SeqCst);
                    self.finish(FinishTrigger::Reconciliation);
                    Reconciliation::ExpiredWhileAway
                } else if remaining != record.total {
                    services.cards.ensure_paused(timer_id, remaining, record.total);
                    Reconciliation::Paused
                } else {
                    // A context that exited before its teardown leaves the card behind
                    if services.cards.end_completed(timer_id, self.settings().teardown_delay) {
                        debug!("Ended a leftover completed card");
                    }
                    Reconciliation::Idle
                }
            }
        };

        debug!("Reconciled '{}': {:?}", timer_id, outcome);
        Ok(outcome)
    }
}
