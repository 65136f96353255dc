//! UpcaseValue: upper-cases string observation values, including the
//! `VALUE` of message records. Condition text is left as reported.

use crate::entity::{Entity, EntityKind, Record, Value};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{StageContext, StagePlugin};
use crate::pipeline::port::{KindSet, StagePorts};

const PORTS: StagePorts = StagePorts::pass_through(KindSet::single(EntityKind::Observation));

fn upcase(s: &str) -> Option<String> {
    s.chars().any(char::is_lowercase).then(|| s.to_uppercase())
}

fn upcased(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => upcase(s).map(Value::String),
        Value::Record(record) if record.name == "Message" => {
            let text = upcase(record.get("VALUE")?.as_str()?)?;
            let mut record: Record = (**record).clone();
            record.properties.insert("VALUE".to_string(), Value::String(text));
            Some(record.into())
        }
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct UpcaseValue;

impl StagePlugin for UpcaseValue {
    fn name(&self) -> &str {
        "UpcaseValue"
    }

    fn ports(&self) -> StagePorts {
        PORTS
    }

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        match entity {
            Entity::Observation(obs) => {
                let obs = match upcased(obs.value()) {
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
