use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::model::watch::{Watch, WatchKey};

/// Whether a watch that stays in range keeps firing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetriggerPolicy {
    /// Fire once per crossing; re-arm after the price returns across the
    /// threshold.
    #[default]
    Edge,
    /// Fire on every tick the watch is in range (legacy behavior).
    Level,
}

/// Result of passing one tick's in-range watches through a latch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Admission {
    pub fire: Vec<Watch>,
    pub suppressed: usize,
    /// In-range watches re-armed this tick; they fire on the next crossing.
    pub rearmed: usize,
}

/// Per-worker "already notified" state.
///
/// A notified watch remembers which side of its threshold the price landed
/// on when it fired. It stays latched until the current price is strictly on
/// the other side; that tick re-arms it without firing. Each poll worker owns
/// its latch, so suppression never crosses strategies.
#[derive(Debug)]
pub struct NotificationLatch {
    policy: RetriggerPolicy,
    notified: HashMap<WatchKey, Ordering>,
}

fn side_of(price: f64, threshold: f64) -> Ordering {
    price.partial_cmp(&threshold).unwrap_or(Ordering::Equal)
}

/// True once `now` sits strictly across the threshold from `landed`.
fn returned(landed: Ordering, now: Ordering) -> bool {
    match landed {
        Ordering::Greater => now == Ordering::Less,
        Ordering::Less => now == Ordering::Greater,
        Ordering::Equal => now != Ordering::Equal,
    }
}

impl NotificationLatch {
    pub fn new(policy: RetriggerPolicy) -> Self {
        Self {
            policy,
            notified: HashMap::new(),
        }
    }

    pub fn policy(&self) -> RetriggerPolicy {
        self.policy
    }

    /// Split this tick's in-range watches into those that fire, those
    /// suppressed and those re-armed, given the tick's `current` price.
    pub fn admit(&mut self, in_range: Vec<Watch>, current: f64) -> Admission {
        if self.policy == RetriggerPolicy::Level {
            return Admission {
                fire: in_range,
                ..Admission::default()
            };
        }

        let keys: HashSet<WatchKey> = in_range.iter().map(Watch::key).collect();
        self.notified.retain(|key, landed| {
            keys.contains(key) || !returned(*landed, side_of(current, key.threshold()))
        });

        let mut admission = Admission::default();
        let mut rearmed_now = HashSet::new();
        for watch in in_range {
            let key = watch.key();
            let now = side_of(current, watch.threshold);
            match self.notified.get(&key).copied() {
                None if rearmed_now.contains(&key) => admission.suppressed += 1,
                None => {
                    self.notified.insert(key, now);
                    admission.fire.push(watch);
                }
                Some(landed) if returned(landed, now) => {
                    self.notified.remove(&key);
                    rearmed_now.insert(key);
                    admission.rearmed += 1;
                }
                Some(_) => admission.suppressed += 1,
            }
        }
        admission
    }

    /// Forget a key whose alert could not be sent, so it fires again.
    pub fn release(&mut self, key: &WatchKey) {
        self.notified.remove(key);
    }

    pub fn is_notified(&self, key: &WatchKey) -> bool {
        self.notified.contains_key(key)
    }

    pub fn notified_len(&self) -> usize {
        self.notified.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch(threshold: f64) -> Watch {
        Watch {
            id: 0,
            asset_id: "bitcoin".to_string(),
            user_id: 1,
            threshold,
        }
    }

    #[test]
    fn edge_stays_latched_until_price_returns() {
        let mut latch = NotificationLatch::new(RetriggerPolicy::Edge);
        // 100 -> 120 lands above 110.
        assert_eq!(latch.admit(vec![watch(110.0)], 120.0).fire.len(), 1);

        // Still above, in range or not.
        let again = latch.admit(vec![watch(110.0)], 120.0);
        assert!(again.fire.is_empty());
        assert_eq!(again.suppressed, 1);
        assert_eq!(latch.admit(vec![], 150.0), Admission::default());
        assert!(latch.is_notified(&watch(110.0).key()));

        // 150 -> 100 returns below: re-armed, not fired.
        let back = latch.admit(vec![watch(110.0)], 100.0);
        assert!(back.fire.is_empty());
        assert_eq!(back.rearmed, 1);
        assert!(!latch.is_notified(&watch(110.0).key()));

        assert_eq!(latch.admit(vec![watch(110.0)], 120.0).fire.len(), 1);
    }

    #[test]
    fn out_of_range_return_rearms_silently() {
        let mut latch = NotificationLatch::new(RetriggerPolicy::Edge);
        latch.admit(vec![watch(110.0)], 120.0);
        assert_eq!(latch.admit(vec![], 95.0), Admission::default());
        assert_eq!(latch.notified_len(), 0);
    }

    #[test]
    fn touch_at_threshold_rearms_once_price_moves_off() {
        let mut latch = NotificationLatch::new(RetriggerPolicy::Edge);
        assert_eq!(latch.admit(vec![watch(115.0)], 115.0).fire.len(), 1);
        assert_eq!(latch.admit(vec![watch(115.0)], 115.0).suppressed, 1);
        assert_eq!(latch.admit(vec![], 116.0), Admission::default());
        assert_eq!(latch.admit(vec![watch(115.0)], 115.0).fire.len(), 1);
    }

    #[test]
    fn edge_fires_duplicate_rows_once() {
        let mut latch = NotificationLatch::new(RetriggerPolicy::Edge);
        let mut dup = watch(110.0);
        dup.id = 9;
        let admission = latch.admit(vec![watch(110.0), dup], 120.0);
        assert_eq!(admission.fire.len(), 1);
        assert_eq!(admission.suppressed, 1);
        assert_eq!(latch.notified_len(), 1);
    }

    #[test]
    fn duplicate_rows_do_not_fire_on_the_rearm_tick() {
        let mut latch = NotificationLatch::new(RetriggerPolicy::Edge);
        let mut dup = watch(110.0);
        dup.id = 9;
        latch.admit(vec![watch(110.0), dup.clone()], 120.0);

        let back = latch.admit(vec![watch(110.0), dup], 100.0);
        assert!(back.fire.is_empty());
        assert_eq!(back.rearmed, 1);
        assert_eq!(back.suppressed, 1);
    }

    #[test]
    fn level_fires_every_tick() {
        let mut latch = NotificationLatch::new(RetriggerPolicy::Level);
        for _ in 0..3 {
            assert_eq!(latch.admit(vec![watch(110.0)], 120.0).fire.len(), 1);
        }
        assert_eq!(latch.notified_len(), 0);
    }

    #[test]
    fn release_rearms_a_key() {
        let mut latch = NotificationLatch::new(RetriggerPolicy::Edge);
        latch.admit(vec![watch(110.0)], 120.0);
        latch.release(&watch(110.0).key());
        assert_eq!(latch.admit(vec![watch(110.0)], 120.0).fire.len(), 1);
    }

    #[test]
    fn policy_parses_from_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            retrigger: RetriggerPolicy,
        }
        let w: Wrapper = toml::from_str("retrigger = \"level\"").unwrap();
        assert_eq!(w.retrigger, RetriggerPolicy::Level);
        assert_eq!(RetriggerPolicy::default(), RetriggerPolicy::Edge);
    }
}
