//! Tokenizer: splits a protocol line into fields.
//!
//! Fields are separated by `|`. A backslash escapes the delimiter (`\|`) or
//! itself (`\\`); before any other character, or at the end of the line, it is
//! kept literally. Fields are trimmed. Grouping fields into multi-token values
//! is left to the token mapper, which knows each data item's arity.

use crate::entity::{Entity, EntityKind, Tokens};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::node::{StageContext, StagePlugin};
use crate::pipeline::port::{KindSet, StagePorts};

pub const DELIMITER: char = '|';
pub const ESCAPE: char = '\\';

const PORTS: StagePorts = StagePorts::new(
    KindSet::single(EntityKind::Data),
    KindSet::single(EntityKind::Tokens),
);

/// Split `line` into trimmed fields. Blank lines yield no fields.
pub fn tokenize(line: &str) -> Vec<String> {
    if line.trim().is_empty() {
        return Vec::new();
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.peek() {
                Some(&next) if next == DELIMITER || next == ESCAPE => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push(ESCAPE),
            },
            DELIMITER => {
                tokens.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    tokens.push(current.trim().to_string());

    tokens
}

#[derive(Debug, Default)]
pub struct Tokenizer;

impl StagePlugin for Tokenizer {
    fn name(&self) -> &str {
        "Tokenizer"
    }

    fn ports(&self) -> StagePorts {
        PORTS
    }

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        if let Entity::Data(line) = entity {
            let tokens = tokenize(&line);
            if !tokens.is_empty() {
                ctx.emit(Entity::Tokens(Tokens { tokens }));
            }
        }
        Ok(())
    }
}
