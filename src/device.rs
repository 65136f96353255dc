//! Device and data-item definitions.
//!
//! The full device metadata model lives outside this crate. The pipeline only
//! needs to resolve a protocol key to a data-item identity, enumerate the
//! tracked data items, and find a device's UUID; [`DataItemLookup`] is that
//! seam. [`DeviceModel`] is a flat in-memory implementation built from the
//! agent configuration.

use crate::config::DeviceConfig;
use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How a data item reports values, which fixes how many protocol tokens its
/// value spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Continuous numeric value.
    Sample,
    /// Discrete string value.
    #[default]
    Event,
    /// Health state: level, native code, native severity, qualifier, text.
    Condition,
    /// Free text with a native code.
    Message,
}

impl Category {
    /// Number of value tokens following the key on a protocol line.
    pub fn arity(self) -> usize {
        match self {
            Category::Sample | Category::Event => 1,
            Category::Message => 2,
            Category::Condition => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Sample => "SAMPLE",
            Category::Event => "EVENT",
            Category::Condition => "CONDITION",
            Category::Message => "MESSAGE",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear conversion from the device's native units: `(value + offset) * factor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
}

impl UnitConversion {
    pub fn new(factor: f64, offset: f64) -> Self {
        Self { factor, offset }
    }

    #[inline]
    pub fn convert(&self, value: f64) -> f64 {
        (value + self.offset) * self.factor
    }
}

/// A data item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    /// Unique identity within the agent.
    pub id: String,

    /// Optional protocol name; the key may match either the id or the name.
    #[serde(default)]
    pub name: Option<String>,

    /// Owning device name (assigned when the device model is built).
    #[serde(skip)]
    pub device: String,

    #[serde(default)]
    pub category: Category,

    /// Vocabulary type, e.g. `POSITION` or `EXECUTION`.
    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub units: Option<String>,

    /// Conversion applied when the producer requires conversion.
    #[serde(default)]
    pub conversion: Option<UnitConversion>,

    /// Minimum period between forwarded observations, in milliseconds.
    #[serde(default)]
    pub minimum_period_ms: Option<u64>,
}

impl DataItem {
    pub fn new(id: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            name: None,
            device: String::new(),
            category,
            kind: String::new(),
            units: None,
            conversion: None,
            minimum_period_ms: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_conversion(mut self, conversion: UnitConversion) -> Self {
        self.conversion = Some(conversion);
        self
    }

    pub fn with_minimum_period(mut self, period: Duration) -> Self {
        self.minimum_period_ms = Some(period.as_millis() as u64);
        self
    }

    /// The name if present, otherwise the id.
    pub fn name_or_id(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn minimum_period(&self) -> Option<Duration> {
        self.minimum_period_ms.map(Duration::from_millis)
    }
}

/// Data-item resolution consumed by the pipeline.
pub trait DataItemLookup: Send + Sync {
    /// Resolve a protocol key (data item id or name) on a device.
    fn find_data_item(&self, device: &str, key: &str) -> Option<Arc<DataItem>>;

    /// Every data item tracked by the agent.
    fn each_data_item(&self) -> Vec<Arc<DataItem>>;

    /// Data items belonging to one device.
    fn device_data_items(&self, device: &str) -> Vec<Arc<DataItem>>;

    /// UUID of a device, used to attribute assets.
    fn device_uuid(&self, device: &str) -> Option<String>;
}

#[derive(Debug)]
struct Device {
    name: String,
    uuid: String,
    data_items: Vec<Arc<DataItem>>,
    /// id and name → index into `data_items`.
    by_key: HashMap<String, usize>,
}

/// Flat in-memory device model.
#[derive(Debug, Default)]
pub struct DeviceModel {
    devices: Vec<Device>,
    /// Device name and uuid → index into `devices`.
    by_name: HashMap<String, usize>,
}

impl DeviceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the model from configuration sections.
    pub fn from_config(devices: &[DeviceConfig]) -> Result<Self> {
        let mut model = Self::new();
        for device in devices {
            model.add_device(&device.name, &device.uuid, device.data_items.clone())?;
        }
        Ok(model)
    }

    /// Add a device and its data items. Data item ids must be unique across
    /// the whole model.
    pub fn add_device(
        &mut self,
        name: &str,
        uuid: &str,
        data_items: Vec<DataItem>,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(AgentError::Config("device name must not be empty".to_string()));
        }
        if self.by_name.contains_key(name) || self.by_name.contains_key(uuid) {
            return Err(AgentError::Config(format!("duplicate device '{}'", name)));
        }

        let mut device = Device {
            name: name.to_string(),
            uuid: uuid.to_string(),
            data_items: Vec::with_capacity(data_items.len()),
            by_key: HashMap::new(),
        };

        for mut item in data_items {
            if item.id.is_empty() {
                return Err(AgentError::Config(format!(
                    "data item on device '{}' has an empty id",
                    name
                )));
            }
            if self.find_by_id(&item.id).is_some() || device.by_key.contains_key(&item.id) {
                return Err(AgentError::Config(format!(
                    "duplicate data item id '{}'",
                    item.id
                )));
            }
            item.device = name.to_string();
            let idx = device.data_items.len();
            device.by_key.insert(item.id.clone(), idx);
            if let Some(item_name) = &item.name {
                device.by_key.entry(item_name.clone()).or_insert(idx);
            }
            device.data_items.push(Arc::new(item));
        }

        let idx = self.devices.len();
        self.by_name.insert(name.to_string(), idx);
        if !uuid.is_empty() {
            self.by_name.insert(uuid.to_string(), idx);
        }
        self.devices.push(device);
        Ok(())
    }

    /// Find a data item by id on any device.
    pub fn find_by_id(&self, id: &str) -> Option<Arc<DataItem>> {
        self.devices.iter().find_map(|d| {
            d.by_key
                .get(id)
                .map(|&idx| &d.data_items[idx])
                .filter(|item| item.id == id)
                .cloned()
        })
    }

    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.name.as_str())
    }

    pub fn contains_device(&self, device: &str) -> bool {
        self.by_name.contains_key(device)
    }

    fn device(&self, device: &str) -> Option<&Device> {
        self.by_name.get(device).map(|&idx| &self.devices[idx])
    }
}

impl DataItemLookup for DeviceModel {
    fn find_data_item(&self, device: &str, key: &str) -> Option<Arc<DataItem>> {
        let device = self.device(device)?;
        device
            .by_key
            .get(key)
            .map(|&idx| device.data_items[idx].clone())
    }

    fn each_data_item(&self) -> Vec<Arc<DataItem>> {
        self.devices
            .iter()
            .flat_map(|d| d.data_items.iter().cloned())
            .collect()
    }

    fn device_data_items(&self, device: &str) -> Vec<Arc<DataItem>> {
        self.device(device)
            .map(|d| d.data_items.clone())
            .unwrap_or_default()
    }

    fn device_uuid(&self, device: &str) -> Option<String> {
        self.device(device).map(|d| d.uuid.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> DeviceModel {
        let mut model = DeviceModel::new();
        model
            .add_device(
                "LinuxCNC",
                "000",
                vec![
                    DataItem::new("x1", Category::Sample).with_name("Xpos"),
                    DataItem::new("exec", Category::Event).with_name("execution"),
                ],
            )
            .unwrap();
        model
    }

    #[test]
    fn test_find_by_name_and_id() {
        let model = sample_model();
        let by_name = model.find_data_item("LinuxCNC", "Xpos").unwrap();
        let by_id = model.find_data_item("LinuxCNC", "x1").unwrap();
        assert_eq!(by_name.id, "x1");
        assert!(Arc::ptr_eq(&by_name, &by_id));
        assert_eq!(by_name.device, "LinuxCNC");
    }

    #[test]
    fn test_find_by_device_uuid() {
        let model = sample_model();
        assert!(model.find_data_item("000", "execution").is_some());
        assert_eq!(model.device_uuid("LinuxCNC").as_deref(), Some("000"));
    }

    #[test]
    fn test_unknown_key() {
        let model = sample_model();
        assert!(model.find_data_item("LinuxCNC", "Ypos").is_none());
        assert!(model.find_data_item("Mill", "Xpos").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut model = sample_model();
        let err = model
            .add_device("Mill", "001", vec![DataItem::new("x1", Category::Sample)])
            .unwrap_err();
        assert!(err.to_string().contains("duplicate data item id"));
    }

    #[test]
    fn test_each_data_item() {
        let model = sample_model();
        assert_eq!(model.each_data_item().len(), 2);
        assert_eq!(model.device_data_items("LinuxCNC").len(), 2);
        assert!(model.device_data_items("Mill").is_empty());
    }

    #[test]
    fn test_unit_conversion() {
        let conv = UnitConversion::new(25.4, 0.0);
        assert_eq!(conv.convert(2.0), 50.8);
        let kelvin = UnitConversion::new(1.0, 273.15);
        assert_eq!(kelvin.convert(0.0), 273.15);
    }
}
