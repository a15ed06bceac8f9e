use std::collections::VecDeque;

use crate::db::models::SensorReading;

/// Readings kept for the charts
pub const HISTORY_CAPACITY: usize = 30;

/// Newest-first window over the most recent readings.
///
/// A reading whose id is already in the window is ignored, so a replayed
/// insert event cannot show up twice on the chart.
#[derive(Debug, Clone)]
pub struct ReadingHistory {
    readings: VecDeque<SensorReading>,
    capacity: usize,
}

impl Default for ReadingHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl ReadingHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        ReadingHistory {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the window with a bulk fetch already ordered newest-first
    pub fn initialize(&mut self, readings: Vec<SensorReading>) {
        self.readings.clear();
        for reading in readings {
            if self.readings.len() == self.capacity {
                break;
            }
            if !self.contains(reading.id) {
                self.readings.push_back(reading);
            }
        }
    }

    /// Prepend, evicting the oldest past capacity. Returns false for a duplicate id.
    pub fn push(&mut self, reading: SensorReading) -> bool {
        if self.contains(reading.id) {
            tracing::debug!("Ignoring replayed reading {}", reading.id);
            return false;
        }
        self.readings.push_front(reading);
        self.readings.truncate(self.capacity);
        true
    }

    pub fn latest(&self) -> Option<&SensorReading> {
        self.readings.front()
    }

    pub fn previous(&self) -> Option<&SensorReading> {
        self.readings.get(1)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn to_vec(&self) -> Vec<SensorReading> {
        self.readings.iter().cloned().collect()
    }

    fn contains(&self, id: i64) -> bool {
        self.readings.iter().any(|r| r.id == id)
    }
}
