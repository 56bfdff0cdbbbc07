//! Presence bookkeeping: who is connected, when they were last active, and
//! which node they have selected or locked.
//!
//! Activity touches are throttled per user so that a burst of UI events
//! produces at most one applied update per throttle window. Messages heard
//! from peers refresh their records directly; peers that go quiet for the
//! stale timeout are evicted by the owner. Operations on an unknown user are
//! silently ignored.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::PRESENCE_THROTTLE_MS;
use crate::types::{NodeId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub last_active_at: Instant,
    pub selected_node_id: Option<NodeId>,
    pub locked_node_id: Option<NodeId>,
}

#[derive(Debug)]
pub struct PresenceTracker {
    records: HashMap<UserId, PresenceRecord>,
    throttle: Duration,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(PRESENCE_THROTTLE_MS))
    }
}

impl PresenceTracker {
    pub fn new(throttle: Duration) -> Self {
        Self {
            records: HashMap::new(),
            throttle,
        }
    }

    /// Register a user. Joining twice keeps the existing record.
    pub fn join(&mut self, user_id: UserId) {
        self.join_at(user_id, Instant::now());
    }

    pub fn join_at(&mut self, user_id: UserId, now: Instant) {
        self.records
            .entry(user_id.clone())
            .or_insert_with(|| PresenceRecord {
                user_id,
                last_active_at: now,
                selected_node_id: None,
                locked_node_id: None,
            });
    }

    pub fn leave(&mut self, user_id: &UserId) -> Option<PresenceRecord> {
        self.records.remove(user_id)
    }

    /// Record activity for `user_id`.
    ///
    /// Returns `true` when the update was applied, `false` when it was
    /// coalesced into the previous one or the user is unknown.
    pub fn touch(&mut self, user_id: &UserId) -> bool {
        self.touch_at(user_id, Instant::now())
    }

    pub fn touch_at(&mut self, user_id: &UserId, now: Instant) -> bool {
        let Some(record) = self.records.get_mut(user_id) else {
            return false;
        };
        if now.saturating_duration_since(record.last_active_at) < self.throttle {
            return false;
        }
        record.last_active_at = now;
        true
    }

    /// Record that a message from `user_id` just arrived, registering the
    /// user if needed. Not throttled.
    pub fn seen(&mut self, user_id: &UserId) {
        self.seen_at(user_id, Instant::now());
    }

    pub fn seen_at(&mut self, user_id: &UserId, now: Instant) {
        match self.records.get_mut(user_id) {
            Some(record) => record.last_active_at = record.last_active_at.max(now),
            None => self.join_at(user_id.clone(), now),
        }
    }

    /// Drop every record idle for at least `timeout`, except `keep`.
    /// Returns the evicted user ids.
    pub fn evict_stale_at(&mut self, now: Instant, timeout: Duration, keep: &UserId) -> Vec<UserId> {
        let stale: Vec<UserId> = self
            .records
            .values()
            .filter(|r| &r.user_id != keep)
            .filter(|r| now.saturating_duration_since(r.last_active_at) >= timeout)
            .map(|r| r.user_id.clone())
            .collect();
        for user_id in &stale {
            self.records.remove(user_id);
        }
        stale
    }

    /// Clear every `locked_node_id` for which `still_locked(user, node)` is false.
    pub fn retain_locked(&mut self, mut still_locked: impl FnMut(&UserId, &NodeId) -> bool) {
        for record in self.records.values_mut() {
            let keep = match &record.locked_node_id {
                Some(node_id) => still_locked(&record.user_id, node_id),
                None => true,
            };
            if !keep {
                record.locked_node_id = None;
            }
        }
    }

    pub fn set_selection(&mut self, user_id: &UserId, node_id: Option<NodeId>) {
        if let Some(record) = self.records.get_mut(user_id) {
            record.selected_node_id = node_id;
        }
    }

    pub fn set_locked(&mut self, user_id: &UserId, node_id: Option<NodeId>) {
        if let Some(record) = self.records.get_mut(user_id) {
            record.locked_node_id = node_id;
        }
    }

    /// Clear `locked_node_id` for `user_id` only if it still points at `node_id`.
    pub fn clear_locked_if(&mut self, user_id: &UserId, node_id: &NodeId) {
        if let Some(record) = self.records.get_mut(user_id) {
            if record.locked_node_id.as_ref() == Some(node_id) {
                record.locked_node_id = None;
            }
        }
    }

    pub fn get(&self, user_id: &UserId) -> Option<&PresenceRecord> {
        self.records.get(user_id)
    }

    /// All records, sorted by user id.
    pub fn records(&self) -> Vec<PresenceRecord> {
        let mut all: Vec<PresenceRecord> = self.records.values().cloned().collect();
        all.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        all
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::from("alice")
    }

    #[test]
    fn touch_is_throttled_to_one_per_window() {
        let mut tracker = PresenceTracker::default();
        let start = Instant::now();
        tracker.join_at(alice(), start);

        assert!(!tracker.touch_at(&alice(), start + Duration::from_millis(200)));
        assert!(!tracker.touch_at(&alice(), start + Duration::from_millis(999)));
        assert!(tracker.touch_at(&alice(), start + Duration::from_millis(1000)));
        assert_eq!(
            tracker.get(&alice()).unwrap().last_active_at,
            start + Duration::from_millis(1000)
        );
        assert!(!tracker.touch_at(&alice(), start + Duration::from_millis(1500)));
    }

    #[test]
    fn unknown_user_is_a_noop() {
        let mut tracker = PresenceTracker::default();
        let ghost = UserId::from("ghost");

        assert!(!tracker.touch(&ghost));
        tracker.set_selection(&ghost, Some(NodeId::from("hero")));
        tracker.set_locked(&ghost, Some(NodeId::from("hero")));
        assert!(tracker.is_empty());
    }

    #[test]
    fn join_twice_keeps_existing_record() {
        let mut tracker = PresenceTracker::default();
        tracker.join(alice());
        tracker.set_selection(&alice(), Some(NodeId::from("hero")));
        tracker.join(alice());

        assert_eq!(tracker.len(), 1);
        assert_eq!(
            tracker.get(&alice()).unwrap().selected_node_id,
            Some(NodeId::from("hero"))
        );
    }

    #[test]
    fn clear_locked_if_only_clears_matching_node() {
        let mut tracker = PresenceTracker::default();
        tracker.join(alice());
        tracker.set_locked(&alice(), Some(NodeId::from("footer")));

        tracker.clear_locked_if(&alice(), &NodeId::from("hero"));
        assert_eq!(
            tracker.get(&alice()).unwrap().locked_node_id,
            Some(NodeId::from("footer"))
        );

        tracker.clear_locked_if(&alice(), &NodeId::from("footer"));
        assert!(tracker.get(&alice()).unwrap().locked_node_id.is_none());
    }

    #[test]
    fn seen_registers_and_refreshes_without_throttle() {
        let mut tracker = PresenceTracker::default();
        let start = Instant::now();
        let bob = UserId::from("bob");

        tracker.seen_at(&bob, start);
        tracker.seen_at(&bob, start + Duration::from_millis(10));
        assert_eq!(
            tracker.get(&bob).unwrap().last_active_at,
            start + Duration::from_millis(10)
        );
    }

    #[test]
    fn stale_records_are_evicted_except_the_kept_user() {
        let mut tracker = PresenceTracker::default();
        let start = Instant::now();
        let timeout = Duration::from_secs(120);
        tracker.join_at(alice(), start);
        tracker.join_at(UserId::from("bob"), start);
        tracker.join_at(UserId::from("carol"), start + Duration::from_secs(60));

        let evicted = tracker.evict_stale_at(start + timeout, timeout, &alice());

        assert_eq!(evicted, vec![UserId::from("bob")]);
        assert!(tracker.get(&alice()).is_some());
        assert!(tracker.get(&UserId::from("carol")).is_some());
    }

    #[test]
    fn retain_locked_clears_only_dead_pointers() {
        let mut tracker = PresenceTracker::default();
        let bob = UserId::from("bob");
        tracker.join(alice());
        tracker.join(bob.clone());
        tracker.set_locked(&alice(), Some(NodeId::from("hero")));
        tracker.set_locked(&bob, Some(NodeId::from("footer")));

        tracker.retain_locked(|_, node_id| node_id == &NodeId::from("footer"));

        assert!(tracker.get(&alice()).unwrap().locked_node_id.is_none());
        assert_eq!(
            tracker.get(&bob).unwrap().locked_node_id,
            Some(NodeId::from("footer"))
        );
    }

    #[test]
    fn leave_removes_record() {
        let mut tracker = PresenceTracker::default();
        tracker.join(alice());
        assert!(tracker.leave(&alice()).is_some());
        assert!(tracker.get(&alice()).is_none());
    }
}
