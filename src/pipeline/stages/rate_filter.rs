//! RateFilter: forwards at most one observation per minimum period for each
//! data item.
//!
//! Periods come from the data item's `minimum_period_ms`, falling back to the
//! producer's `MinimumPeriodMs`. Data items with no period always pass. The
//! first observation for a data item always passes; after that, one is
//! forwarded only if its timestamp is at least the period past the last
//! forwarded one.

use crate::device::DataItem;
use crate::entity::{Entity, EntityKind};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{StageContext, StagePlugin};
use crate::pipeline::port::{KindSet, StagePorts};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const PORTS: StagePorts = StagePorts::pass_through(KindSet::single(EntityKind::Observation));

/// Last forwarded timestamp per data item id.
#[derive(Debug, Default)]
pub struct RateState {
    last: DashMap<String, DateTime<Utc>>,
}

impl RateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `timestamp` for `data_item` if at least `period` has passed
    /// since the last recorded one. An earlier timestamp never passes.
    pub fn check_and_record(
        &self,
        data_item: &str,
        timestamp: DateTime<Utc>,
        period: Duration,
    ) -> bool {
        match self.last.entry(data_item.to_string()) {
            Entry::Occupied(mut last) => match (timestamp - *last.get()).to_std() {
                Ok(elapsed) if elapsed >= period => {
                    last.insert(timestamp);
                    true
                }
                _ => false,
            },
            Entry::Vacant(slot) => {
                slot.insert(timestamp);
                true
            }
        }
    }

    /// Drop the record for `data_item`; its next observation passes.
    pub fn forget(&self, data_item: &str) {
        self.last.remove(data_item);
    }

    pub fn last_forwarded(&self, data_item: &str) -> Option<DateTime<Utc>> {
        self.last.get(data_item).map(|ts| *ts)
    }
}

pub struct RateFilter {
    state: Arc<RateState>,
    periods: HashMap<String, Duration>,
    dropped: u64,
}

impl RateFilter {
    /// Resolve periods for every tracked data item.
    pub fn new(
        state: Arc<RateState>,
        data_items: impl IntoIterator<Item = Arc<DataItem>>,
        default_period: Option<Duration>,
    ) -> Self {
        let periods: HashMap<String, Duration> = data_items
            .into_iter()
            .filter_map(|item| {
                item.minimum_period()
                    .or(default_period)
                    .map(|period| (item.id.clone(), period))
            })
            .collect();

        if !periods.is_empty() {
            tracing::debug!("Rate filter limits {} data items", periods.len());
        }

        Self {
            state,
            periods,
            dropped: 0,
        }
    }

    pub fn period(&self, data_item: &str) -> Option<Duration> {
        self.periods.get(data_item).copied()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl StagePlugin for RateFilter {
    fn name(&self) -> &str {
        "RateFilter"
    }

    fn ports(&self) -> StagePorts {
        PORTS
    }

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        if let Entity::Observation(obs) = &entity {
            if let Some(&period) = self.periods.get(obs.data_item_id()) {
                if !self
                    .state
                    .check_and_record(obs.data_item_id(), obs.timestamp(), period)
                {
                    self.dropped += 1;
                    tracing::trace!(
                        "{} at {} within {:?} of last, dropped",
                        obs.data_item_id(),
                        obs.timestamp(),
                        period
                    );
                    return Ok(());
                }
            }
        }
        ctx.emit(entity);
        Ok(())
    }
}
