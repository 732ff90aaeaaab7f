//! Sensor store.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use roomwatch_core::Reading;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::trace;

use crate::config::StoreConfig;

const CAPTURED_AT: &str = "captured_at";

/// Latest reading plus the time it was aggregated.
///
/// Serializes as the reading's own fields with `captured_at` added, so
/// clients can read sensor values directly off the object. A device field
/// named `captured_at` is shadowed by the gateway's timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub reading: Reading,
    pub captured_at: DateTime<Utc>,
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.reading.fields();
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in fields.iter().filter(|(key, _)| key.as_str() != CAPTURED_AT) {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(CAPTURED_AT, &self.captured_at)?;
        map.end()
    }
}

/// Derived counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Readings aggregated since start.
    #[serde(rename = "totalReadings")]
    pub total_readings: u64,
    /// Whole seconds since the store was created.
    #[serde(rename = "uptime")]
    pub uptime_secs: u64,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StoreState {
    current: Option<Arc<Snapshot>>,
    /// Oldest first.
    history: VecDeque<Arc<Snapshot>>,
    total_readings: u64,
}

/// Aggregates readings into current state, history and stats.
///
/// `update` takes the write lock for a push and a pointer swap only, so
/// readers are never blocked for long and always see a complete update.
#[derive(Debug)]
pub struct SensorStore {
    capacity: usize,
    state: RwLock<StoreState>,
    started_at: DateTime<Utc>,
    started_mono: Instant,
}

impl SensorStore {
    pub fn new(config: StoreConfig) -> Self {
        let capacity = config.history_capacity.max(1);
        Self {
            capacity,
            state: RwLock::new(StoreState {
                current: None,
                history: VecDeque::with_capacity(capacity),
                total_readings: 0,
            }),
            started_at: Utc::now(),
            started_mono: Instant::now(),
        }
    }

    /// Aggregate one reading. The only mutation entry point.
    ///
    /// Replaces the current snapshot, appends to history (evicting the
    /// oldest entry when full) and bumps `total_readings`.
    pub fn update(&self, reading: Reading) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot {
            reading,
            captured_at: Utc::now(),
        });

        let mut state = self.state.write();
        if state.history.len() == self.capacity {
            state.history.pop_front();
        }
        state.history.push_back(snapshot.clone());
        state.current = Some(snapshot.clone());
        state.total_readings += 1;
        trace!(total = state.total_readings, "Reading aggregated");

        snapshot
    }

    /// Latest snapshot, or `None` if nothing has been aggregated yet.
    pub fn get_current_state(&self) -> Option<Arc<Snapshot>> {
        self.state.read().current.clone()
    }

    /// Up to `count` most recent snapshots, oldest first.
    ///
    /// `None` or `Some(0)` returns everything held (at most the capacity).
    pub fn get_history(&self, count: Option<usize>) -> Vec<Arc<Snapshot>> {
        let state = self.state.read();
        let available = state.history.len();
        let take = match count {
            Some(n) if n > 0 => n.min(available),
            _ => available,
        };
        state
            .history
            .iter()
            .skip(available - take)
            .cloned()
            .collect()
    }

    /// Counters with uptime computed now.
    pub fn get_stats(&self) -> StoreStats {
        let total_readings = self.state.read().total_readings;
        StoreStats {
            total_readings,
            uptime_secs: self.uptime().as_secs(),
            started_at: self.started_at,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_mono.elapsed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn history_len(&self) -> usize {
        self.state.read().history.len()
    }
}

impl Default for SensorStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(seq: u64) -> Reading {
        Reading::from_value(json!({"seq": seq, "occupied": seq % 2})).unwrap()
    }

    fn seq_of(snapshot: &Snapshot) -> u64 {
        snapshot.reading.number("seq").unwrap() as u64
    }

    fn store_with_capacity(capacity: usize) -> SensorStore {
        SensorStore::new(StoreConfig {
            history_capacity: capacity,
        })
    }

    #[test]
    fn test_device_captured_at_is_shadowed() {
        let store = SensorStore::default();
        let snapshot = store.update(
            Reading::from_value(json!({"captured_at": "device-clock", "lights": 1})).unwrap(),
        );

        let text = serde_json::to_string(&*snapshot).unwrap();
        assert_eq!(text.matches("\"captured_at\"").count(), 1);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["lights"], 1);
        assert_ne!(value["captured_at"], "device-clock");
        assert_eq!(
            value["captured_at"],
            serde_json::to_value(snapshot.captured_at).unwrap()
        );
    }

    #[test]
    fn test_empty_store() {
        let store = SensorStore::default();
        assert!(store.get_current_state().is_none());
        assert!(store.get_history(None).is_empty());
        assert_eq!(store.get_stats().total_readings, 0);
        assert_eq!(store.capacity(), 100);
    }

    #[test]
    fn test_current_state_is_last_update() {
        let store = SensorStore::default();
        for i in 1..=5 {
            store.update(reading(i));
        }
        let current = store.get_current_state().unwrap();
        assert_eq!(seq_of(&current), 5);
        assert_eq!(store.get_stats().total_readings, 5);
    }

    #[test]
    fn test_history_evicts_oldest_when_full() {
        let store = store_with_capacity(3);
        for i in 1..=7 {
            store.update(reading(i));
        }
        let history: Vec<u64> = store.get_history(None).iter().map(|s| seq_of(s)).collect();
        assert_eq!(history, vec![5, 6, 7]);
        assert_eq!(store.history_len(), 3);
        assert_eq!(store.get_stats().total_readings, 7);
    }

    #[test]
    fn test_history_count_clamped() {
        let store = store_with_capacity(10);
        for i in 1..=4 {
            store.update(reading(i));
        }
        let last_two: Vec<u64> = store
            .get_history(Some(2))
            .iter()
            .map(|s| seq_of(s))
            .collect();
        assert_eq!(last_two, vec![3, 4]);

        assert_eq!(store.get_history(Some(50)).len(), 4);
        assert_eq!(store.get_history(Some(0)).len(), 4);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let store = store_with_capacity(0);
        store.update(reading(1));
        store.update(reading(2));
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let store = SensorStore::default();
        let snapshot = store.update(
            Reading::from_value(json!({"occupied":0,"motion":1,"distance":150,"lights":0}))
                .unwrap(),
        );
        let value = serde_json::to_value(&*snapshot).unwrap();
        assert_eq!(value["occupied"], 0);
        assert_eq!(value["distance"], 150);
        assert!(value["captured_at"].is_string());
    }

    #[test]
    fn test_stats_serialization() {
        let store = SensorStore::default();
        store.update(reading(1));
        let json = serde_json::to_string(&store.get_stats()).unwrap();
        assert!(json.contains("\"totalReadings\":1"));
        assert!(json.contains("\"uptime\":"));
    }
}
