//! Timestamp normalization.
//!
//! The first field of every data line is its timestamp. Two stages handle it,
//! and exactly one of them is bound per pipeline:
//!
//! - [`IgnoreTimestamp`] drops the field and stamps the line with the
//!   processing time.
//! - [`ExtractTimestamp`] parses the field. In relative mode the field is read
//!   against the producer's connection time instead of the wall clock.
//!
//! A timestamp field may carry a duration suffix, `<time>@<seconds>`.

use crate::clock::Clock;
use crate::entity::{Entity, EntityKind, Timestamped};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::{StageContext, StagePlugin};
use crate::pipeline::port::{KindSet, StagePorts};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex, PoisonError};

const PORTS: StagePorts = StagePorts::new(
    KindSet::single(EntityKind::Tokens),
    KindSet::single(EntityKind::Timestamped),
);

/// Split off an optional `@duration` suffix.
fn split_duration(token: &str) -> PipelineResult<(&str, Option<f64>)> {
    match token.split_once('@') {
        Some((time, duration)) => {
            let duration = duration
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite() && *d >= 0.0)
                .ok_or_else(|| PipelineError::MalformedTimestamp(token.to_string()))?;
            Ok((time.trim(), Some(duration)))
        }
        None => Ok((token, None)),
    }
}

/// Parse an absolute time. Accepts RFC 3339, or an ISO 8601 date-time without
/// offset, which is read as UTC.
fn parse_time(token: &str) -> PipelineResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(token) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| PipelineError::MalformedTimestamp(token.to_string()))
}

/// Parse a timestamp field into a time and optional duration in seconds.
pub fn parse_timestamp(token: &str) -> PipelineResult<(DateTime<Utc>, Option<f64>)> {
    let (time, duration) = split_duration(token.trim())?;
    Ok((parse_time(time)?, duration))
}

#[derive(Debug, Default)]
struct Origin {
    connected_at: Option<DateTime<Utc>>,
    first_device_time: Option<DateTime<Utc>>,
}

/// Origin for relative timestamps, shared by a producer (which resets it on
/// connect) and its `ExtractTimestamp` stage.
#[derive(Debug, Default)]
pub struct RelativeTimeBase {
    origin: Mutex<Origin>,
}

impl RelativeTimeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new connection at `connected_at`.
    pub fn reset(&self, connected_at: DateTime<Utc>) {
        let mut origin = self.origin.lock().unwrap_or_else(PoisonError::into_inner);
        *origin = Origin {
            connected_at: Some(connected_at),
            first_device_time: None,
        };
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.origin
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected_at
    }

    /// Resolve a relative timestamp field.
    ///
    /// A number is an offset in milliseconds from connection time. An
    /// absolute time is rebased so the first one seen maps to connection time.
    /// Without a prior reset, the first resolved field fixes the origin at
    /// `now`.
    fn resolve(&self, time: &str, now: DateTime<Utc>) -> PipelineResult<DateTime<Utc>> {
        let mut origin = self.origin.lock().unwrap_or_else(PoisonError::into_inner);
        let connected_at = *origin.connected_at.get_or_insert(now);

        let malformed = || PipelineError::MalformedTimestamp(time.to_string());

        if let Ok(offset_ms) = time.parse::<f64>() {
            let micros = (offset_ms * 1000.0).round();
            if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
                return Err(malformed());
            }
            return connected_at
                .checked_add_signed(Duration::microseconds(micros as i64))
                .ok_or_else(malformed);
        }

        let device_time = parse_time(time)?;
        let first = *origin.first_device_time.get_or_insert(device_time);
        connected_at
            .checked_add_signed(device_time - first)
            .ok_or_else(malformed)
    }
}

/// Drops the timestamp field and stamps lines with processing time.
pub struct IgnoreTimestamp {
    clock: Arc<dyn Clock>,
}

impl IgnoreTimestamp {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl StagePlugin for IgnoreTimestamp {
    fn name(&self) -> &str {
        "IgnoreTimestamp"
    }

    fn ports(&self) -> StagePorts {
        PORTS
    }

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        if let Entity::Tokens(tokens) = entity {
            let mut tokens = tokens.tokens;
            if tokens.is_empty() {
                return Ok(());
            }
            tokens.remove(0);
            ctx.emit(Entity::Timestamped(Timestamped {
                timestamp: self.clock.now(),
                duration: None,
                tokens,
            }));
        }
        Ok(())
    }
}

/// Parses the leading timestamp field. An empty field means "now".
pub struct ExtractTimestamp {
    clock: Arc<dyn Clock>,
    relative: Option<Arc<RelativeTimeBase>>,
}

impl ExtractTimestamp {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            relative: None,
        }
    }

    pub fn relative(clock: Arc<dyn Clock>, base: Arc<RelativeTimeBase>) -> Self {
        Self {
            clock,
            relative: Some(base),
        }
    }

    pub fn is_relative(&self) -> bool {
        self.relative.is_some()
    }

    fn extract(&self, token: &str) -> PipelineResult<(DateTime<Utc>, Option<f64>)> {
        let token = token.trim();
        if token.is_empty() {
            return Ok((self.clock.now(), None));
        }
        match &self.relative {
            Some(base) => {
                let (time, duration) = split_duration(token)?;
                Ok((base.resolve(time, self.clock.now())?, duration))
            }
            None => parse_timestamp(token),
        }
    }
}

impl StagePlugin for ExtractTimestamp {
    fn name(&self) -> &str {
        "ExtractTimestamp"
    }

    fn ports(&self) -> StagePorts {
        PORTS
    }

    fn process(&mut self, entity: Entity, ctx: &mut StageContext) -> PipelineResult<()> {
        if let Entity::Tokens(tokens) = entity {
            let mut tokens = tokens.tokens;
            if tokens.is_empty() {
                return Ok(());
            }
            let (timestamp, duration) = self.extract(&tokens[0])?;
            tokens.remove(0);
            ctx.emit(Entity::Timestamped(Timestamped {
                timestamp,
                duration,
                tokens,
            }));
        }
        Ok(())
    }
}
