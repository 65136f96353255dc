//! Built-in pipeline stage implementations.

pub mod convert_sample;
pub mod deliver;
pub mod duplicate_filter;
pub mod rate_filter;
pub mod start;
pub mod timestamp;
pub mod token_mapper;
pub mod tokenizer;
pub mod upcase_value;

pub use convert_sample::ConvertSample;
pub use deliver::{DeliverAsset, DeliverCommand, DeliverConnectionStatus, DeliverObservation};
pub use duplicate_filter::{DuplicateFilter, DuplicateState};
pub use rate_filter::{RateFilter, RateState};
pub use start::Start;
pub use timestamp::{parse_timestamp, ExtractTimestamp, IgnoreTimestamp, RelativeTimeBase};
pub use token_mapper::TokenMapper;
pub use tokenizer::{tokenize, Tokenizer};
pub use upcase_value::UpcaseValue;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::device::{Category, DataItem};
    use crate::entity::{Entity, Observation, Value};
    use crate::pipeline::node::{StageContext, StagePlugin};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    pub fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    pub fn item(id: &str, category: Category) -> Arc<DataItem> {
        Arc::new(DataItem::new(id, category))
    }

    pub fn obs(item: &Arc<DataItem>, ts: &str, value: impl Into<Value>) -> Entity {
        Entity::Observation(Observation::new(item.clone(), at(ts), value.into()))
    }

    /// Process one entity and return what the stage emitted.
    pub fn run_stage(stage: &mut dyn StagePlugin, entity: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut diagnostics = Vec::new();
        let mut ctx = StageContext::new(&mut out, &mut diagnostics);
        stage.process(entity, &mut ctx).unwrap();
        assert!(diagnostics.is_empty(), "unexpected {:?}", diagnostics);
        out
    }

    pub fn value_of(entity: &Entity) -> &Value {
        match entity {
            Entity::Observation(obs) => obs.value(),
            other => panic!("expected observation, got {:?}", other),
        }
    }
}
