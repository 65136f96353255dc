//! Observations: one timestamped value for one data item.

use crate::device::{Category, DataItem};
use crate::entity::value::Value;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// One timestamped value for one data item.
///
/// Immutable once constructed; value transforms produce a new observation via
/// [`Observation::with_value`]. The sequence number is zero until the
/// observation buffer assigns one on append.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    data_item: Arc<DataItem>,
    timestamp: DateTime<Utc>,
    value: Value,
    duration: Option<f64>,
    sequence: u64,
}

impl Observation {
    pub fn new(data_item: Arc<DataItem>, timestamp: DateTime<Utc>, value: Value) -> Self {
        Self {
            data_item,
            timestamp,
            value,
            duration: None,
            sequence: 0,
        }
    }

    /// An `UNAVAILABLE` observation for a data item.
    pub fn unavailable(data_item: Arc<DataItem>, timestamp: DateTime<Utc>) -> Self {
        Self::new(data_item, timestamp, Value::unavailable())
    }

    pub fn with_duration(mut self, duration: Option<f64>) -> Self {
        self.duration = duration;
        self
    }

    /// Replace the value, keeping identity and timestamp.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    pub fn data_item(&self) -> &Arc<DataItem> {
        &self.data_item
    }

    /// Identity of the bound data item.
    pub fn data_item_id(&self) -> &str {
        &self.data_item.id
    }

    pub fn category(&self) -> Category {
        self.data_item.category
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn is_unavailable(&self) -> bool {
        self.value.is_unavailable()
    }

    /// Sequence assigned by the observation buffer, zero if never delivered.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}
