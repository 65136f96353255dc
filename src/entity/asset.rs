//! Assets: durable, identity-keyed objects such as cutting tools or programs.

use crate::entity::value::{Properties, Value};
use crate::error::{AgentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An identity-keyed asset owned by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    asset_id: String,
    asset_type: String,
    device_uuid: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    removed: bool,
    #[serde(default)]
    properties: Properties,
}

impl Asset {
    /// Create an asset. The identity must be non-empty.
    pub fn new(
        asset_id: impl Into<String>,
        asset_type: impl Into<String>,
        device_uuid: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let asset_id = asset_id.into();
        if asset_id.trim().is_empty() {
            return Err(AgentError::InvalidAsset(
                "asset id must not be empty".to_string(),
            ));
        }
        let asset_type = asset_type.into();
        if asset_type.trim().is_empty() {
            return Err(AgentError::InvalidAsset(format!(
                "asset '{}' has no type",
                asset_id
            )));
        }
        Ok(Self {
            asset_id,
            asset_type,
            device_uuid: device_uuid.into(),
            timestamp,
            removed: false,
            properties: Properties::new(),
        })
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn asset_type(&self) -> &str {
        &self.asset_type
    }

    pub fn device_uuid(&self) -> &str {
        &self.device_uuid
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// A copy marked as removed at `timestamp`.
    pub fn tombstoned(&self, timestamp: DateTime<Utc>) -> Self {
        let mut asset = self.clone();
        asset.removed = true;
        asset.timestamp = timestamp;
        asset
    }

    /// A copy with `updates` merged into its properties and a new timestamp.
    pub fn updated(&self, updates: &Properties, timestamp: DateTime<Utc>) -> Self {
        let mut asset = self.clone();
        for (key, value) in updates {
            asset.properties.insert(key.clone(), value.clone());
        }
        asset.timestamp = timestamp;
        asset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 12, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_identity_rejected() {
        assert!(Asset::new("", "Tool", "D1", ts()).is_err());
        assert!(Asset::new("  ", "Tool", "D1", ts()).is_err());
        assert!(Asset::new("A1", "", "D1", ts()).is_err());
    }

    #[test]
    fn test_tombstone_keeps_identity() {
        let asset = Asset::new("A1", "Tool", "D1", ts())
            .unwrap()
            .with_property("body", "<Tool/>");
        let removed = asset.tombstoned(ts());
        assert!(removed.is_removed());
        assert_eq!(removed.asset_id(), "A1");
        assert_eq!(removed.property("body"), asset.property("body"));
        assert!(!asset.is_removed());
    }

    #[test]
    fn test_update_merges_properties() {
        let asset = Asset::new("A1", "Tool", "D1", ts())
            .unwrap()
            .with_property("ToolLife", "100")
            .with_property("Location", "3");
        let mut updates = Properties::new();
        updates.insert("ToolLife".to_string(), Value::from("90"));
        let updated = asset.updated(&updates, ts());
        assert_eq!(updated.property("ToolLife"), Some(&Value::from("90")));
        assert_eq!(updated.property("Location"), Some(&Value::from("3")));
    }
}
