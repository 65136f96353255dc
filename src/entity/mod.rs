//! Entities flowing through the transform pipeline.
//!
//! Every object a stage receives or emits is an [`Entity`]: a closed set of
//! variants, each identified by an [`EntityKind`]. Stages declare which kinds
//! they accept, and the pipeline resolves routing per kind once at build time.
//!
//! ```text
//! ConnectionStatus ─────────────────────────────────────────► connection sink
//! ProtocolCommand  ─────────────────────────────────────────► command sink
//! Data ─► Tokens ─► Timestamped ─┬─► Observation ─► ... ─► observation sink
//!                                └─► Asset / AssetCommand ─► asset sink
//! ```

pub mod asset;
pub mod observation;
pub mod value;

pub use asset::Asset;
pub use observation::Observation;
pub use value::{Properties, Record, Value, UNAVAILABLE};

use chrono::{DateTime, Utc};
use std::fmt;

/// Discriminant of [`Entity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    ConnectionStatus,
    Data,
    ProtocolCommand,
    Tokens,
    Timestamped,
    Observation,
    Asset,
    AssetCommand,
}

impl EntityKind {
    pub const COUNT: usize = 8;

    pub const ALL: [EntityKind; Self::COUNT] = [
        EntityKind::ConnectionStatus,
        EntityKind::Data,
        EntityKind::ProtocolCommand,
        EntityKind::Tokens,
        EntityKind::Timestamped,
        EntityKind::Observation,
        EntityKind::Asset,
        EntityKind::AssetCommand,
    ];

    /// Dense index, used for dispatch tables.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::ConnectionStatus => "ConnectionStatus",
            EntityKind::Data => "Data",
            EntityKind::ProtocolCommand => "ProtocolCommand",
            EntityKind::Tokens => "Tokens",
            EntityKind::Timestamped => "Timestamped",
            EntityKind::Observation => "Observation",
            EntityKind::Asset => "Asset",
            EntityKind::AssetCommand => "AssetCommand",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Connection lifecycle state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnected => "DISCONNECTED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic entity for transport connect/disconnect events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Producer identity.
    pub source: String,
    /// Device the producer feeds.
    pub device: String,
    pub state: ConnectionState,
}

/// Out-of-band `* name: value` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolCommand {
    pub source: String,
    pub name: String,
    pub value: String,
}

impl ProtocolCommand {
    /// Parse a command line. The leading `*` is optional; a line without a
    /// colon yields an empty value.
    pub fn parse(source: &str, line: &str) -> Option<Self> {
        let body = line.trim().trim_start_matches('*').trim();
        if body.is_empty() {
            return None;
        }
        let (name, value) = match body.split_once(':') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (body, ""),
        };
        Some(Self {
            source: source.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

/// Asset directives other than add/replace.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetCommand {
    /// Tombstone one asset.
    Remove {
        asset_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Tombstone every asset of a type (or every asset) for a device.
    RemoveAll {
        asset_type: Option<String>,
        device_uuid: String,
        timestamp: DateTime<Utc>,
    },
    /// Merge properties into an existing asset, replacing it in place.
    Update {
        asset_id: String,
        properties: Properties,
        timestamp: DateTime<Utc>,
    },
}

/// A raw line split into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub tokens: Vec<String>,
}

/// Fields with the leading timestamp resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Timestamped {
    pub timestamp: DateTime<Utc>,
    /// Optional `@duration` suffix of the timestamp token, in seconds.
    pub duration: Option<f64>,
    /// Remaining fields, timestamp removed.
    pub tokens: Vec<String>,
}

/// The closed set of entities that flow between stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    ConnectionStatus(ConnectionStatus),
    Data(String),
    ProtocolCommand(ProtocolCommand),
    Tokens(Tokens),
    Timestamped(Timestamped),
    Observation(Observation),
    Asset(Asset),
    AssetCommand(AssetCommand),
}

impl Entity {
    #[inline]
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::ConnectionStatus(_) => EntityKind::ConnectionStatus,
            Entity::Data(_) => EntityKind::Data,
            Entity::ProtocolCommand(_) => EntityKind::ProtocolCommand,
            Entity::Tokens(_) => EntityKind::Tokens,
            Entity::Timestamped(_) => EntityKind::Timestamped,
            Entity::Observation(_) => EntityKind::Observation,
            Entity::Asset(_) => EntityKind::Asset,
            Entity::AssetCommand(_) => EntityKind::AssetCommand,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}
