//! Per-session map from node to lock record, with lazy expiry.
//!
//! The table performs no conflict checks and no internal synchronization:
//! it is owned by exactly one coordinator task, which decides when a write
//! is allowed. Expired entries are evicted the next time they are read.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::types::{NodeId, UserId};

/// Exclusive, time-bounded intent to edit one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    pub node_id: NodeId,
    pub owner_id: UserId,
    pub acquired_at: Instant,
    /// Always `acquired_at + ttl`.
    pub expires_at: Instant,
}

impl Lock {
    /// Whether the lock is still live at `now`.
    pub fn is_live_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, saturating at zero.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

#[derive(Debug, Default)]
pub struct LockTable {
    entries: HashMap<NodeId, Lock>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live lock on `node_id`, evicting it if it has expired.
    pub fn get(&mut self, node_id: &NodeId) -> Option<Lock> {
        self.get_at(node_id, Instant::now())
    }

    pub fn get_at(&mut self, node_id: &NodeId, now: Instant) -> Option<Lock> {
        let live = self.entries.get(node_id)?.is_live_at(now);
        if live {
            self.entries.get(node_id).cloned()
        } else {
            self.entries.remove(node_id);
            None
        }
    }

    /// Stored entry for `node_id`, expired or not. Does not evict.
    pub fn peek(&self, node_id: &NodeId) -> Option<&Lock> {
        self.entries.get(node_id)
    }

    /// Insert or overwrite the lock on `node_id`.
    pub fn put(&mut self, node_id: NodeId, owner_id: UserId, ttl: Duration) -> Lock {
        self.put_at(node_id, owner_id, ttl, Instant::now())
    }

    pub fn put_at(&mut self, node_id: NodeId, owner_id: UserId, ttl: Duration, now: Instant) -> Lock {
        let lock = Lock {
            node_id: node_id.clone(),
            owner_id,
            acquired_at: now,
            expires_at: now + ttl,
        };
        self.entries.insert(node_id, lock.clone());
        lock
    }

    pub fn remove(&mut self, node_id: &NodeId) -> Option<Lock> {
        self.entries.remove(node_id)
    }

    /// Live locks held by `owner_id`, sorted by node for stable output.
    pub fn all_owned_by(&mut self, owner_id: &UserId) -> Vec<Lock> {
        self.all_owned_by_at(owner_id, Instant::now())
    }

    pub fn all_owned_by_at(&mut self, owner_id: &UserId, now: Instant) -> Vec<Lock> {
        self.purge_expired(now);
        let mut owned: Vec<Lock> = self
            .entries
            .values()
            .filter(|lock| &lock.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        owned
    }

    /// Snapshot of every live lock, sorted by node.
    pub fn snapshot_at(&mut self, now: Instant) -> Vec<Lock> {
        self.purge_expired(now);
        let mut all: Vec<Lock> = self.entries.values().cloned().collect();
        all.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        all
    }

    /// Drop every expired entry. Returns how many were evicted.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, lock| lock.is_live_at(now));
        before - self.entries.len()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    fn node(id: &str) -> NodeId {
        NodeId::from(id)
    }

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    #[test]
    fn put_then_get_returns_lock() {
        let mut table = LockTable::new();
        let now = Instant::now();
        table.put_at(node("hero"), user("alice"), TTL, now);

        let lock = table.get_at(&node("hero"), now).expect("lock should be live");
        assert_eq!(lock.owner_id, user("alice"));
        assert_eq!(lock.expires_at, lock.acquired_at + TTL);
    }

    #[test]
    fn put_overwrites_by_key() {
        let mut table = LockTable::new();
        let now = Instant::now();
        table.put_at(node("hero"), user("alice"), TTL, now);
        table.put_at(node("hero"), user("bob"), TTL, now);

        assert_eq!(table.len(), 1);
        assert_eq!(table.get_at(&node("hero"), now).unwrap().owner_id, user("bob"));
    }

    #[test]
    fn expired_lock_is_invisible_and_evicted() {
        let mut table = LockTable::new();
        let now = Instant::now();
        table.put_at(node("hero"), user("alice"), TTL, now);

        assert!(table.get_at(&node("hero"), now + TTL).is_none());
        assert!(table.is_empty(), "expired entry should be evicted on read");
    }

    #[test]
    fn lock_is_live_until_just_before_expiry() {
        let mut table = LockTable::new();
        let now = Instant::now();
        table.put_at(node("hero"), user("alice"), TTL, now);

        let almost = now + TTL - Duration::from_millis(1);
        assert!(table.get_at(&node("hero"), almost).is_some());
    }

    #[test]
    fn peek_sees_expired_entry_without_evicting() {
        let mut table = LockTable::new();
        let now = Instant::now();
        table.put_at(node("hero"), user("alice"), TTL, now);

        let later = now + TTL * 2;
        assert!(!table.peek(&node("hero")).unwrap().is_live_at(later));
        assert_eq!(table.len(), 1);
        assert!(table.get_at(&node("hero"), later).is_none());
        assert!(table.peek(&node("hero")).is_none());
    }

    #[test]
    fn remove_is_unconditional() {
        let mut table = LockTable::new();
        table.put(node("hero"), user("alice"), TTL);

        assert!(table.remove(&node("hero")).is_some());
        assert!(table.remove(&node("hero")).is_none());
        assert!(table.get(&node("hero")).is_none());
    }

    #[test]
    fn all_owned_by_filters_owner_and_expiry() {
        let mut table = LockTable::new();
        let now = Instant::now();
        table.put_at(node("b"), user("alice"), TTL, now);
        table.put_at(node("a"), user("alice"), TTL, now);
        table.put_at(node("c"), user("bob"), TTL, now);
        table.put_at(node("old"), user("alice"), Duration::from_secs(1), now);

        let owned = table.all_owned_by_at(&user("alice"), now + Duration::from_secs(2));
        let ids: Vec<&str> = owned.iter().map(|l| l.node_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn purge_expired_counts_evictions() {
        let mut table = LockTable::new();
        let now = Instant::now();
        table.put_at(node("a"), user("alice"), Duration::from_secs(1), now);
        table.put_at(node("b"), user("alice"), TTL, now);

        assert_eq!(table.purge_expired(now + Duration::from_secs(5)), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let now = Instant::now();
        let lock = Lock {
            node_id: node("a"),
            owner_id: user("alice"),
            acquired_at: now,
            expires_at: now + TTL,
        };
        assert_eq!(lock.remaining_at(now), TTL);
        assert_eq!(lock.remaining_at(now + TTL * 2), Duration::ZERO);
    }
}
