//! ConvertSample: applies each data item's unit conversion to numeric values.

use crate::entity::{Entity, EntityKind, Value};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{StageContext, StagePlugin};
use crate::pipeline::port::{KindSet, StagePorts};

const PORTS: StagePorts = StagePorts::pass_through(KindSet::single(EntityKind::Observation));

#[derive(Debug, Default)]
pub struct ConvertSample;

impl StagePlugin for ConvertSample {
    fn name(&self) -> &str {
        "ConvertSample"
    }

    fn ports(&self) -> StagePorts {
        PORTS
    }

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        match entity {
            Entity::Observation(obs) => {
                let converted = obs
                    .data_item()
                    .conversion
                    .zip(obs.value().as_f64())
                    .map(|(conversion, v)| Value::Double(conversion.convert(v)));
                let obs = match converted {
                    Some(value) => obs.with_value(value),
                    None => obs,
                };
                ctx.emit(Entity::Observation(obs));
            }
            other => ctx.emit(other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Category, DataItem, UnitConversion};
    use crate::pipeline::stages::test_support::{item, obs, run_stage, value_of};
    use std::sync::Arc;

    const TS: &str = "2021-01-22T12:33:45.123Z";

    #[test]
    fn test_scale_and_offset() {
        let temp = Arc::new(
            DataItem::new("t1", Category::Sample).with_conversion(UnitConversion::new(2.0, 1.0)),
        );
        let out = run_stage(&mut ConvertSample, obs(&temp, TS, 4.0));
        assert_eq!(value_of(&out[0]), &Value::Double(10.0));
    }

    #[test]
    fn test_without_conversion_passes() {
        let x = item("x1", Category::Sample);
        let out = run_stage(&mut ConvertSample, obs(&x, TS, 4.0));
        assert_eq!(value_of(&out[0]), &Value::Double(4.0));
    }

    #[test]
    fn test_unavailable_untouched() {
        let temp = Arc::new(
            DataItem::new("t1", Category::Sample).with_conversion(UnitConversion::new(2.0, 0.0)),
        );
        let out = run_stage(&mut ConvertSample, obs(&temp, TS, Value::unavailable()));
        assert!(value_of(&out[0]).is_unavailable());
    }
}
