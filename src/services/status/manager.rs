//! Keeps the status card in step with the timer record

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::surface::{CardContent, CardHandle, LiveCard, StatusSurface};
use crate::services::clock::Clock;

/// A running card goes stale this long after its end
pub const RUNNING_STALE_AFTER: Duration = Duration::from_secs(10);

/// A completed card goes stale this long after completion
pub const COMPLETED_STALE_AFTER: Duration = Duration::from_secs(8);

/// Owns this process's handle on the status card.
///
/// Every operation is fire-and-forget: surface failures are logged, never
/// returned. Creation always checks liveness first so at most one card per
/// timer id exists.
pub struct StatusCardManager {
    surface: Arc<dyn StatusSurface>,
    clock: Arc<dyn Clock>,
    card: Mutex<Option<CardHandle>>,
}

impl StatusCardManager {
    pub fn new(surface: Arc<dyn StatusSurface>, clock: Arc<dyn Clock>) -> Self {
        Self {
            surface,
            clock,
            card: Mutex::new(None),
        }
    }

    pub fn is_active(&self, timer_id: &str) -> bool {
        self.live_card(timer_id).is_some()
    }

    /// The live card for `timer_id` as currently shown
    pub fn live_card(&self, timer_id: &str) -> Option<LiveCard> {
        match self.surface.live_cards() {
            Ok(cards) => cards.into_iter().find(|c| c.handle.timer_id == timer_id),
            Err(e) => {
                warn!("Failed to list status cards: {}", e);
                None
            }
        }
    }

    /// Adopt a card created by another process
    pub fn restore(&self, timer_id: &str) {
        if let Some(card) = self.live_card(timer_id) {
            debug!("Restored status card {} for {}", card.handle.token, timer_id);
            self.set_local(Some(card.handle));
        }
    }

    /// Show a running card. No-op when one is already live.
    pub fn start(&self, timer_id: &str, end_at: DateTime<Utc>, total: Duration) {
        if self.is_active(timer_id) {
            debug!("Status card already active for {}, skipping start", timer_id);
            return;
        }
        let stale_at = end_at + to_chrono(RUNNING_STALE_AFTER);
        self.request(timer_id, CardContent::running(end_at, total), Some(stale_at));
    }

    /// Show a paused card. No-op when one is already live.
    pub fn start_paused(&self, timer_id: &str, remaining: Duration, total: Duration) {
        if self.is_active(timer_id) {
            debug!("Status card already active for {}, skipping paused start", timer_id);
            return;
        }
        self.request(timer_id, CardContent::paused(remaining, total), None);
    }

    /// Switch the live card to running, creating one if none is live
    pub fn show_running(&self, timer_id: &str, end_at: DateTime<Utc>, total: Duration) {
        if self.is_active(timer_id) {
            self.resume(timer_id, end_at, total);
        } else {
            self.start(timer_id, end_at, total);
        }
    }

    /// Make sure a card shows this run: create one if none is live, correct
    /// a live card that shows something else, otherwise leave it alone
    pub fn ensure_running(&self, timer_id: &str, end_at: DateTime<Utc>, total: Duration) {
        match self.live_card(timer_id) {
            None => self.start(timer_id, end_at, total),
            Some(card) if card.content == CardContent::running(end_at, total) => {}
            Some(_) => self.resume(timer_id, end_at, total),
        }
    }

    /// Paused counterpart of [`ensure_running`](Self::ensure_running)
    pub fn ensure_paused(&self, timer_id: &str, remaining: Duration, total: Duration) {
        match self.live_card(timer_id) {
            None => self.start_paused(timer_id, remaining, total),
            Some(card) if card.content == CardContent::paused(remaining, total) => {}
            Some(_) => self.pause(timer_id, remaining, total),
        }
    }

    pub fn pause(&self, timer_id: &str, remaining: Duration, total: Duration) {
        self.update(timer_id, CardContent::paused(remaining, total), None);
    }

    pub fn resume(&self, timer_id: &str, end_at: DateTime<Utc>, total: Duration) {
        let stale_at = end_at + to_chrono(RUNNING_STALE_AFTER);
        self.update(timer_id, CardContent::running(end_at, total), Some(stale_at));
    }

    /// Show the "done" state ahead of teardown
    pub fn complete(&self, timer_id: &str, total: Duration) {
        let stale_at = self.clock.now() + to_chrono(COMPLETED_STALE_AFTER);
        self.update(timer_id, CardContent::completed(total), Some(stale_at));
    }

    /// End a card that has shown completion for at least `min_age`.
    /// Returns whether a card was ended.
    pub fn end_completed(&self, timer_id: &str, min_age: Duration) -> bool {
        let Some(card) = self.live_card(timer_id) else {
            return false;
        };
        if !card.content.is_completed() {
            return false;
        }
        // Completion time is recovered from the stale date set by `complete`
        let completed_at = card.stale_at.map(|at| at - to_chrono(COMPLETED_STALE_AFTER));
        if completed_at.is_some_and(|at| self.clock.now() - at < to_chrono(min_age)) {
            return false;
        }
        self.end(timer_id);
        true
    }

    /// Tear the card down. The local handle is only released when it
    /// belongs to `timer_id`.
    pub fn end(&self, timer_id: &str) {
        let Some(handle) = self.handle_for(timer_id) else {
            debug!("No status card to end for {}", timer_id);
            return;
        };

        match self.surface.end(&handle) {
            Ok(()) => info!("Status card ended for {}", timer_id),
            Err(e) => warn!("Failed to end status card for {}: {}", timer_id, e),
        }

        if let Ok(mut local) = self.card.lock() {
            if local.as_ref().is_some_and(|h| h.timer_id == timer_id) {
                *local = None;
            }
        }
    }

    /// The locally held handle, if any
    pub fn local_handle(&self) -> Option<CardHandle> {
        self.card.lock().ok().and_then(|card| card.clone())
    }

    fn request(&self, timer_id: &str, content: CardContent, stale_at: Option<DateTime<Utc>>) {
        let paused = content.is_paused;
        match self.surface.request(timer_id, content, stale_at) {
            Ok(handle) => {
                info!(
                    "Status card started for {} ({})",
                    timer_id,
                    if paused { "paused" } else { "running" }
                );
                self.set_local(Some(handle));
            }
            Err(e) => warn!("Failed to start status card for {}: {}", timer_id, e),
        }
    }

    fn update(&self, timer_id: &str, content: CardContent, stale_at: Option<DateTime<Utc>>) {
        let Some(handle) = self.handle_for(timer_id) else {
            debug!("No live status card for {}, skipping update", timer_id);
            return;
        };
        if let Err(e) = self.surface.update(&handle, content, stale_at) {
            warn!("Failed to update status card for {}: {}", timer_id, e);
        }
    }

    /// Local handle when it is still live, otherwise whatever card the
    /// surface shows for `timer_id`
    fn handle_for(&self, timer_id: &str) -> Option<CardHandle> {
        let live = self.live_card(timer_id)?.handle;
        let local = self.local_handle();
        if local.as_ref() != Some(&live) && local.as_ref().map_or(true, |h| h.timer_id == timer_id) {
            self.set_local(Some(live.clone()));
        }
        Some(live)
    }

    fn set_local(&self, handle: Option<CardHandle>) {
        if let Ok(mut card) = self.card.lock() {
            *card = handle;
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{clock::ManualClock, status::MemorySurface};
    use chrono::TimeZone;

    fn manager() -> (Arc<MemorySurface>, StatusCardManager, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2025, 5, 20, 9, 0, 0).unwrap();
        let surface = Arc::new(MemorySurface::new());
        let manager = StatusCardManager::new(surface.clone(), Arc::new(ManualClock::new(now)));
        (surface, manager, now)
    }

    #[test]
    fn test_start_is_noop_when_card_active() {
        let (surface, manager, now) = manager();
        let end_at = now + chrono::Duration::seconds(60);

        manager.start("single-timer", end_at, Duration::from_secs(60));
        manager.start("single-timer", end_at, Duration::from_secs(60));
        manager.start_paused("single-timer", Duration::from_secs(5), Duration::from_secs(60));

        assert_eq!(surface.request_count(), 1);
        assert_eq!(surface.live_count("single-timer"), 1);
        let card = surface.card("single-timer").unwrap();
        assert_eq!(card.stale_at, Some(end_at + chrono::Duration::seconds(10)));
    }

    #[test]
    fn test_second_manager_adopts_existing_card() {
        let (surface, manager, now) = manager();
        manager.start("single-timer", now + chrono::Duration::seconds(60), Duration::from_secs(60));

        let other = StatusCardManager::new(surface.clone(), Arc::new(ManualClock::new(now)));
        assert!(other.local_handle().is_none());
        other.restore("single-timer");
        assert_eq!(other.local_handle(), manager.local_handle());

        other.pause("single-timer", Duration::from_secs(42), Duration::from_secs(60));
        let card = surface.card("single-timer").unwrap();
        assert!(card.content.is_paused);
        assert_eq!(card.content.adjusted_remaining, Some(Duration::from_secs(42)));
    }

    #[test]
    fn test_show_running_updates_live_card() {
        let (surface, manager, now) = manager();
        manager.start_paused("single-timer", Duration::from_secs(30), Duration::from_secs(60));
        manager.show_running("single-timer", now + chrono::Duration::seconds(30), Duration::from_secs(60));

        assert_eq!(surface.request_count(), 1);
        assert_eq!(surface.update_count(), 1);
        assert!(!surface.card("single-timer").unwrap().content.is_paused);
    }

    #[test]
    fn test_ensure_running_is_idempotent_and_corrects_stale_content() {
        let (surface, manager, now) = manager();
        let end_at = now + chrono::Duration::seconds(30);
        manager.complete("single-timer", Duration::from_secs(60));
        assert_eq!(surface.mutation_count(), 0);

        manager.ensure_running("single-timer", end_at, Duration::from_secs(60));
        manager.ensure_running("single-timer", end_at, Duration::from_secs(60));
        assert_eq!(surface.request_count(), 1);
        assert_eq!(surface.update_count(), 0);

        // Another process left the card showing a pause
        manager.pause("single-timer", Duration::from_secs(12), Duration::from_secs(60));
        manager.ensure_running("single-timer", end_at, Duration::from_secs(60));
        let card = surface.card("single-timer").unwrap();
        assert_eq!(card.content, CardContent::running(end_at, Duration::from_secs(60)));
        assert_eq!(surface.live_count("single-timer"), 1);
    }

    #[test]
    fn test_complete_sets_stale_date() {
        let (surface, manager, now) = manager();
        manager.start("single-timer", now, Duration::from_secs(60));
        manager.complete("single-timer", Duration::from_secs(60));

        let card = surface.card("single-timer").unwrap();
        assert!(card.content.is_completed());
        assert_eq!(card.stale_at, Some(now + chrono::Duration::seconds(8)));
    }

    #[test]
    fn test_end_completed_waits_for_min_age() {
        let now = Utc.with_ymd_and_hms(2025, 5, 20, 9, 0, 0).unwrap();
        let clock = ManualClock::new(now);
        let surface = Arc::new(MemorySurface::new());
        let manager = StatusCardManager::new(surface.clone(), Arc::new(clock.clone()));
        let total = Duration::from_secs(60);

        manager.start("single-timer", now, total);
        assert!(!manager.end_completed("single-timer", Duration::ZERO));

        manager.complete("single-timer", total);
        assert!(!manager.end_completed("single-timer", Duration::from_secs(1)));
        assert_eq!(surface.live_count("single-timer"), 1);

        clock.advance(Duration::from_secs(2));
        assert!(manager.end_completed("single-timer", Duration::from_secs(1)));
        assert_eq!(surface.live_count("single-timer"), 0);
    }

    #[test]
    fn test_end_keeps_handle_for_other_timer() {
        let (surface, manager, now) = manager();
        manager.start("other-timer", now, Duration::from_secs(60));
        let other_handle = manager.local_handle();

        // A card for single-timer created elsewhere
        surface
            .request("single-timer", CardContent::completed(Duration::from_secs(60)), None)
            .unwrap();

        manager.end("single-timer");
        assert_eq!(surface.live_count("single-timer"), 0);
        assert_eq!(surface.live_count("other-timer"), 1);
        assert_eq!(manager.local_handle(), other_handle);

        manager.end("other-timer");
        assert!(manager.local_handle().is_none());
    }

    #[test]
    fn test_update_without_card_is_noop() {
        let (surface, manager, now) = manager();
        manager.resume("single-timer", now, Duration::from_secs(60));
        manager.end("single-timer");
        assert_eq!(surface.mutation_count(), 0);
    }
}
