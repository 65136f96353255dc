//! DuplicateFilter: drops observations whose value repeats the last one
//! forwarded for the same data item.

use crate::entity::{Entity, EntityKind, Value};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{StageContext, StagePlugin};
use crate::pipeline::port::{KindSet, StagePorts};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

const PORTS: StagePorts = StagePorts::pass_through(KindSet::single(EntityKind::Observation));

/// Last forwarded value per data item id.
///
/// May be shared by several producers; the compare-and-record step holds the
/// entry's shard lock, so it is atomic per data item.
#[derive(Debug, Default)]
pub struct DuplicateState {
    last: DashMap<String, Value>,
}

impl DuplicateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` for `data_item` unless it equals the last recorded value.
    /// Returns true if it was recorded (not a duplicate).
    pub fn check_and_record(&self, data_item: &str, value: &Value) -> bool {
        match self.last.entry(data_item.to_string()) {
            Entry::Occupied(mut last) => {
                if last.get() == value {
                    false
                } else {
                    last.insert(value.clone());
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                true
            }
        }
    }

    /// Replace a recorded value with UNAVAILABLE. Untracked items stay
    /// untracked.
    pub fn mark_unavailable(&self, data_item: &str) {
        if let Some(mut last) = self.last.get_mut(data_item) {
            *last = Value::unavailable();
        }
    }

    pub fn last_value(&self, data_item: &str) -> Option<Value> {
        self.last.get(data_item).map(|v| v.value().clone())
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

pub struct DuplicateFilter {
    state: Arc<DuplicateState>,
    dropped: u64,
}

impl DuplicateFilter {
    pub fn new(state: Arc<DuplicateState>) -> Self {
        Self { state, dropped: 0 }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl StagePlugin for DuplicateFilter {
    fn name(&self) -> &str {
        "DuplicateFilter"
    }

    fn ports(&self) -> StagePorts {
        PORTS
    }

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        if let Entity::Observation(obs) = &entity {
            if !self.state.check_and_record(obs.data_item_id(), obs.value()) {
                self.dropped += 1;
                tracing::trace!("Duplicate {} = {} dropped", obs.data_item_id(), obs.value());
                return Ok(());
            }
        }
        ctx.emit(entity);
        Ok(())
    }
}
