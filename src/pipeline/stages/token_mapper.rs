//! TokenMapper: turns timestamped fields into observations and assets.
//!
//! Data lines are a sequence of `key|value...` groups. Each key resolves to a
//! data item whose category fixes how many value fields follow:
//!
//! | Category  | Fields | Value                                                    |
//! |-----------|--------|----------------------------------------------------------|
//! | SAMPLE    | 1      | number, or `UNAVAILABLE`                                 |
//! | EVENT     | 1      | string                                                   |
//! | MESSAGE   | 2      | `Message(nativeCode, VALUE)`                             |
//! | CONDITION | 5      | `Condition(level, nativeCode, nativeSeverity, qualifier, VALUE)` |
//!
//! A key may be written `device:key` to address another device. An unknown
//! key is reported and skipped with one value field; the rest of the line is
//! still mapped.
//!
//! Lines whose first field is an `@...@` directive are asset commands:
//!
//! ```text
//! @ASSET@|id|type|body
//! @UPDATE_ASSET@|id|key|value|key|value...
//! @REMOVE_ASSET@|id
//! @REMOVE_ALL_ASSETS@|type
//! ```

use crate::device::{Category, DataItem, DataItemLookup};
use crate::entity::{
    Asset, AssetCommand, Entity, EntityKind, Observation, Properties, Record, Timestamped, Value,
    UNAVAILABLE,
};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{StageContext, StagePlugin};
use crate::pipeline::port::{KindSet, StagePorts};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const PORTS: StagePorts = StagePorts::new(
    KindSet::single(EntityKind::Timestamped),
    KindSet::of(&[
        EntityKind::Observation,
        EntityKind::Asset,
        EntityKind::AssetCommand,
    ]),
);

const CONDITION_LEVELS: [&str; 3] = ["NORMAL", "WARNING", "FAULT"];

pub struct TokenMapper {
    device: String,
    device_uuid: String,
    lookup: Arc<dyn DataItemLookup>,
}

impl TokenMapper {
    /// Map keys against `device`. Assets are attributed to the device's UUID,
    /// or to its name when it has none.
    pub fn new(device: impl Into<String>, lookup: Arc<dyn DataItemLookup>) -> Self {
        let device = device.into();
        let device_uuid = lookup
            .device_uuid(&device)
            .filter(|uuid| !uuid.is_empty())
            .unwrap_or_else(|| device.clone());
        Self {
            device,
            device_uuid,
            lookup,
        }
    }

    fn resolve(&self, key: &str) -> PipelineResult<Arc<DataItem>> {
        if let Some(item) = self.lookup.find_data_item(&self.device, key) {
            return Ok(item);
        }
        if let Some((device, item_key)) = key.split_once(':') {
            if let Some(item) = self.lookup.find_data_item(device, item_key) {
                return Ok(item);
            }
        }
        Err(PipelineError::UnknownDataItem {
            device: self.device.clone(),
            key: key.to_string(),
        })
    }

    fn map_observations(&self, line: Timestamped, ctx: &mut StageContext) {
        let Timestamped {
            timestamp,
            duration,
            tokens,
        } = line;

        let mut i = 0;
        while i < tokens.len() {
            let key = &tokens[i];
            i += 1;

            let item = match self.resolve(key) {
                Ok(item) => item,
                Err(err) => {
                    ctx.report(err);
                    i += 1;
                    continue;
                }
            };

            let arity = item.category.arity();
            if i + arity > tokens.len() {
                ctx.report(PipelineError::MalformedValue {
                    key: key.clone(),
                    value: tokens[i..].join("|"),
                    reason: format!("{} expects {} value fields", item.category, arity),
                });
                break;
            }

            let fields = &tokens[i..i + arity];
            i += arity;

            match parse_value(&item, key, fields) {
                Ok(value) => ctx.emit(Entity::Observation(
                    Observation::new(item, timestamp, value).with_duration(duration),
                )),
                Err(err) => ctx.report(err),
            }
        }
    }

    fn map_asset_command(
        &self,
        command: &str,
        timestamp: DateTime<Utc>,
        args: &[String],
    ) -> PipelineResult<Entity> {
        let malformed = |reason: &str| PipelineError::MalformedAsset(format!("{}: {}", command, reason));

        match command {
            "@ASSET@" => {
                if args.len() < 3 {
                    return Err(malformed("expected id, type and body"));
                }
                let body = args[2..].join("|");
                let asset = Asset::new(&args[0], &args[1], &self.device_uuid, timestamp)
                    .map_err(|e| malformed(&e.to_string()))?
                    .with_property("body", body);
                Ok(Entity::Asset(asset))
            }
            "@UPDATE_ASSET@" => {
                let (asset_id, pairs) = match args.split_first() {
                    Some((id, pairs)) if !id.is_empty() => (id.clone(), pairs),
                    _ => return Err(malformed("missing asset id")),
                };
                if pairs.is_empty() || pairs.len() % 2 != 0 {
                    return Err(malformed("expected key/value pairs"));
                }
                let properties: Properties = pairs
                    .chunks_exact(2)
                    .map(|kv| (kv[0].clone(), Value::from(kv[1].as_str())))
                    .collect();
                Ok(Entity::AssetCommand(AssetCommand::Update {
                    asset_id,
                    properties,
                    timestamp,
                }))
            }
            "@REMOVE_ASSET@" => match args.first() {
                Some(id) if !id.is_empty() => Ok(Entity::AssetCommand(AssetCommand::Remove {
                    asset_id: id.clone(),
                    timestamp,
                })),
                _ => Err(malformed("missing asset id")),
            },
            "@REMOVE_ALL_ASSETS@" => Ok(Entity::AssetCommand(AssetCommand::RemoveAll {
                asset_type: args.first().filter(|t| !t.is_empty()).cloned(),
                device_uuid: self.device_uuid.clone(),
                timestamp,
            })),
            _ => Err(malformed("unknown command")),
        }
    }
}

fn is_asset_command(token: &str) -> bool {
    token.len() > 2 && token.starts_with('@') && token.ends_with('@')
}

/// Build the value for `item` from its value fields.
fn parse_value(item: &DataItem, key: &str, fields: &[String]) -> PipelineResult<Value> {
    let malformed = |reason: &str| PipelineError::MalformedValue {
        key: key.to_string(),
        value: fields.join("|"),
        reason: reason.to_string(),
    };

    match item.category {
        Category::Sample => {
            let field = fields[0].as_str();
            if field.eq_ignore_ascii_case(UNAVAILABLE) {
                return Ok(Value::unavailable());
            }
            field
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|_| malformed("not a number"))
        }
        Category::Event => {
            if fields[0].eq_ignore_ascii_case(UNAVAILABLE) {
                Ok(Value::unavailable())
            } else {
                Ok(Value::from(fields[0].as_str()))
            }
        }
        Category::Message => {
            if fields[1].eq_ignore_ascii_case(UNAVAILABLE) {
                return Ok(Value::unavailable());
            }
            Ok(Record::new("Message")
                .with("nativeCode", fields[0].as_str())
                .with("VALUE", fields[1].as_str())
                .into())
        }
        Category::Condition => {
            let level = fields[0].to_ascii_uppercase();
            if level == UNAVAILABLE {
                return Ok(Value::unavailable());
            }
            if !CONDITION_LEVELS.contains(&level.as_str()) {
                return Err(malformed("unknown condition level"));
            }
            Ok(Record::new("Condition")
                .with("level", level)
                .with("nativeCode", fields[1].as_str())
                .with("nativeSeverity", fields[2].as_str())
                .with("qualifier", fields[3].as_str())
                .with("VALUE", fields[4].as_str())
                .into())
        }
    }
}

impl StagePlugin for TokenMapper {
    fn name(&self) -> &str {
        "TokenMapper"
    }

    fn ports(&self) -> StagePorts {
        PORTS
    }

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        let Entity::Timestamped(line) = entity else {
            return Ok(());
        };

        match line.tokens.first() {
            Some(first) if is_asset_command(first) => {
                let entity = self.map_asset_command(first, line.timestamp, &line.tokens[1..])?;
                ctx.emit(entity);
            }
            Some(_) => self.map_observations(line, ctx),
            None => {}
        }
        Ok(())
    }
}
