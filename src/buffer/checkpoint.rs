//! Current-state snapshot: the latest observation per data item.

use crate::entity::Observation;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    observations: HashMap<String, Observation>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `observation` the current value of its data item.
    pub fn add_observation(&mut self, observation: &Observation) {
        match self.observations.get_mut(observation.data_item_id()) {
            Some(current) => *current = observation.clone(),
            None => {
                self.observations
                    .insert(observation.data_item_id().to_string(), observation.clone());
            }
        }
    }

    pub fn get(&self, data_item: &str) -> Option<&Observation> {
        self.observations.get(data_item)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Current observations in sequence order, optionally limited to a set of
    /// data item ids.
    pub fn observations(&self, filter: Option<&[&str]>) -> Vec<Observation> {
        let mut out: Vec<Observation> = self
            .observations
            .iter()
            .filter(|(id, _)| filter.map_or(true, |ids| ids.contains(&id.as_str())))
            .map(|(_, obs)| obs.clone())
            .collect();
        out.sort_by_key(Observation::sequence);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Category, DataItem};
    use crate::entity::Value;
    use chrono::Utc;
    use std::sync::Arc;

    fn observation(item: &Arc<DataItem>, seq: u64, value: f64) -> Observation {
        let mut obs = Observation::new(item.clone(), Utc::now(), Value::Double(value));
        obs.set_sequence(seq);
        obs
    }

    #[test]
    fn test_latest_wins() {
        let x = Arc::new(DataItem::new("x1", Category::Sample));
        let y = Arc::new(DataItem::new("y1", Category::Sample));
        let mut checkpoint = Checkpoint::new();
        checkpoint.add_observation(&observation(&x, 1, 1.0));
        checkpoint.add_observation(&observation(&y, 2, 2.0));
        checkpoint.add_observation(&observation(&x, 3, 3.0));

        assert_eq!(checkpoint.len(), 2);
        assert_eq!(checkpoint.get("x1").unwrap().value(), &Value::Double(3.0));

        let all = checkpoint.observations(None);
        assert_eq!(all.iter().map(Observation::sequence).collect::<Vec<_>>(), vec![2, 3]);

        let only_y = checkpoint.observations(Some(&["y1"]));
        assert_eq!(only_y.len(), 1);
    }
}
