//! Per-producer pipeline options.
//!
//! Each flag toggles inclusion of one stage when the producer pipeline is
//! built. The serialized names are the option names used in agent
//! configuration files:
//!
//! | Option                | Effect                                            |
//! |-----------------------|---------------------------------------------------|
//! | `IgnoreTimestamps`    | stamp lines with processing time                  |
//! | `RelativeTime`        | timestamps are offsets from connection time       |
//! | `UpcaseDataItemValue` | upper-case string values                          |
//! | `FilterDuplicates`    | drop repeated values per data item                |
//! | `ConversionRequired`  | apply per data item unit conversion               |
//! | `MinimumPeriodMs`     | default rate-filter period for every data item    |
//! | `SharedFilterState`   | share filter state with producers using same name |

use crate::pipeline::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PipelineOptions {
    pub ignore_timestamps: bool,
    pub relative_time: bool,
    pub upcase_data_item_value: bool,
    pub filter_duplicates: bool,
    pub conversion_required: bool,
    pub minimum_period_ms: Option<u64>,
    pub shared_filter_state: Option<String>,
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_timestamps(mut self, on: bool) -> Self {
        self.ignore_timestamps = on;
        self
    }

    pub fn relative_time(mut self, on: bool) -> Self {
        self.relative_time = on;
        self
    }

    pub fn upcase_data_item_value(mut self, on: bool) -> Self {
        self.upcase_data_item_value = on;
        self
    }

    pub fn filter_duplicates(mut self, on: bool) -> Self {
        self.filter_duplicates = on;
        self
    }

    pub fn conversion_required(mut self, on: bool) -> Self {
        self.conversion_required = on;
        self
    }

    pub fn minimum_period(mut self, period: Duration) -> Self {
        self.minimum_period_ms = Some(period.as_millis() as u64);
        self
    }

    pub fn shared_filter_state(mut self, name: impl Into<String>) -> Self {
        self.shared_filter_state = Some(name.into());
        self
    }

    pub fn default_minimum_period(&self) -> Option<Duration> {
        self.minimum_period_ms.map(Duration::from_millis)
    }

    /// Reject contradictory option combinations before anything is built.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.ignore_timestamps && self.relative_time {
            return Err(PipelineError::InvalidConfiguration(
                "IgnoreTimestamps and RelativeTime are mutually exclusive".to_string(),
            ));
        }
        if let Some(name) = &self.shared_filter_state {
            if name.trim().is_empty() {
                return Err(PipelineError::InvalidConfiguration(
                    "SharedFilterState must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Registry key for a named filter state. Producers share state only when
    /// they name the same `SharedFilterState`.
    pub fn filter_state_name(&self, filter: &str, producer: &str) -> String {
        match &self.shared_filter_state {
            Some(shared) => format!("{}:shared:{}", filter, shared),
            None => format!("{}:producer:{}", filter, producer),
        }
    }
}
