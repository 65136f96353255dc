//! Identity-indexed, fixed-capacity asset store.
//!
//! Slots fill in insertion order and are reused as a ring, so once the store
//! is full the next insertion overwrites the oldest slot. Replacing an asset
//! keeps its slot, and removing one only tombstones it; neither changes the
//! eviction order. A tombstoned asset still occupies its slot, still resolves
//! by identity and still counts toward the per-type and per-device totals
//! until it is evicted. The `active_*` counts exclude it.

use crate::entity::{Asset, Properties};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Effect of [`AssetBuffer::add_asset`].
#[derive(Debug, Clone, PartialEq)]
pub enum AssetChange {
    /// Stored in a free slot.
    Inserted { index: usize },
    /// Replaced an asset with the same identity in place.
    Replaced { index: usize, previous: Arc<Asset> },
    /// Overwrote the oldest slot.
    Evicted { index: usize, evicted: Arc<Asset> },
}

impl AssetChange {
    pub fn index(&self) -> usize {
        match self {
            AssetChange::Inserted { index }
            | AssetChange::Replaced { index, .. }
            | AssetChange::Evicted { index, .. } => *index,
        }
    }
}

/// Filter for [`AssetBuffer::get_assets`].
#[derive(Debug, Clone, Default)]
pub struct AssetQuery {
    pub asset_type: Option<String>,
    pub device_uuid: Option<String>,
    pub include_removed: bool,
    pub count: Option<usize>,
}

impl AssetQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = Some(asset_type.into());
        self
    }

    pub fn device(mut self, device_uuid: impl Into<String>) -> Self {
        self.device_uuid = Some(device_uuid.into());
        self
    }

    pub fn include_removed(mut self, include: bool) -> Self {
        self.include_removed = include;
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    fn matches(&self, asset: &Asset) -> bool {
        (self.include_removed || !asset.is_removed())
            && self
                .asset_type
                .as_deref()
                .map_or(true, |t| asset.asset_type() == t)
            && self
                .device_uuid
                .as_deref()
                .map_or(true, |d| asset.device_uuid() == d)
    }
}

fn count_in(counts: &mut HashMap<String, usize>, key: &str) {
    match counts.get_mut(key) {
        Some(n) => *n += 1,
        None => {
            counts.insert(key.to_string(), 1);
        }
    }
}

fn count_out(counts: &mut HashMap<String, usize>, key: &str) {
    if let Some(n) = counts.get_mut(key) {
        *n -= 1;
        if *n == 0 {
            counts.remove(key);
        }
    }
}

#[derive(Default)]
struct Counts {
    total: HashMap<String, usize>,
    active: HashMap<String, usize>,
}

impl Counts {
    fn get(&self, key: &str) -> usize {
        self.total.get(key).copied().unwrap_or(0)
    }

    fn get_active(&self, key: &str) -> usize {
        self.active.get(key).copied().unwrap_or(0)
    }
}

struct Inner {
    slots: Vec<Option<Arc<Asset>>>,
    /// Occupied slots; slots `0..len` are in use.
    len: usize,
    /// Oldest slot once the store is full.
    next_evict: usize,
    index: HashMap<String, usize>,
    by_type: Counts,
    by_device: Counts,
    active: usize,
}

impl Inner {
    fn account(&mut self, asset: &Asset) {
        count_in(&mut self.by_type.total, asset.asset_type());
        count_in(&mut self.by_device.total, asset.device_uuid());
        if !asset.is_removed() {
            self.active += 1;
            count_in(&mut self.by_type.active, asset.asset_type());
            count_in(&mut self.by_device.active, asset.device_uuid());
        }
    }

    fn unaccount(&mut self, asset: &Asset) {
        count_out(&mut self.by_type.total, asset.asset_type());
        count_out(&mut self.by_device.total, asset.device_uuid());
        if !asset.is_removed() {
            self.active -= 1;
            count_out(&mut self.by_type.active, asset.asset_type());
            count_out(&mut self.by_device.active, asset.device_uuid());
        }
    }

    /// Swap the content of an occupied slot, keeping counts consistent.
    fn replace_slot(&mut self, idx: usize, asset: Arc<Asset>) -> Option<Arc<Asset>> {
        let previous = self.slots[idx].take();
        if let Some(previous) = &previous {
            self.unaccount(previous);
        }
        self.account(&asset);
        self.slots[idx] = Some(asset);
        previous
    }

    /// Occupied slot indices, newest insertion first.
    fn newest_first(&self) -> impl Iterator<Item = usize> + '_ {
        let cap = self.slots.len();
        let newest = if self.len < cap {
            self.len
        } else {
            self.next_evict + cap
        };
        (0..self.len).map(move |i| (newest - 1 - i) % cap)
    }
}

pub struct AssetBuffer {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl AssetBuffer {
    /// Create a store for `capacity` assets (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(Inner {
                slots: vec![None; capacity],
                len: 0,
                next_evict: 0,
                index: HashMap::new(),
                by_type: Counts::default(),
                by_device: Counts::default(),
                active: 0,
            }),
            capacity,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store an asset, replacing one with the same identity in place, or
    /// evicting the oldest slot when full.
    pub fn add_asset(&self, asset: Asset) -> AssetChange {
        let asset = Arc::new(asset);
        let mut inner = self.write();

        if let Some(&idx) = inner.index.get(asset.asset_id()) {
            return match inner.replace_slot(idx, asset.clone()) {
                Some(previous) => AssetChange::Replaced {
                    index: idx,
                    previous,
                },
                None => AssetChange::Inserted { index: idx },
            };
        }

        if inner.len < self.capacity {
            let idx = inner.len;
            inner.len += 1;
            inner.index.insert(asset.asset_id().to_string(), idx);
            inner.replace_slot(idx, asset);
            return AssetChange::Inserted { index: idx };
        }

        let idx = inner.next_evict;
        inner.next_evict = (idx + 1) % self.capacity;
        inner.index.insert(asset.asset_id().to_string(), idx);
        match inner.replace_slot(idx, asset) {
            Some(evicted) => {
                inner.index.remove(evicted.asset_id());
                AssetChange::Evicted {
                    index: idx,
                    evicted,
                }
            }
            None => AssetChange::Inserted { index: idx },
        }
    }

    /// Tombstone an asset. Returns false if the identity does not resolve or
    /// is already removed.
    pub fn remove_asset(&self, asset_id: &str, timestamp: DateTime<Utc>) -> bool {
        let mut inner = self.write();
        let Some(&idx) = inner.index.get(asset_id) else {
            return false;
        };
        let tombstone = match &inner.slots[idx] {
            Some(asset) if !asset.is_removed() => Arc::new(asset.tombstoned(timestamp)),
            _ => return false,
        };
        inner.replace_slot(idx, tombstone);
        true
    }

    /// Tombstone every active asset matching `asset_type` and `device_uuid`
    /// (`None` matches anything). Returns how many were removed.
    pub fn remove_all(
        &self,
        asset_type: Option<&str>,
        device_uuid: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> usize {
        let mut inner = self.write();
        let targets: Vec<(usize, Arc<Asset>)> = inner
            .slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let asset = slot.as_ref()?;
                let matches = !asset.is_removed()
                    && asset_type.map_or(true, |t| asset.asset_type() == t)
                    && device_uuid.map_or(true, |d| asset.device_uuid() == d);
                matches.then(|| (idx, Arc::new(asset.tombstoned(timestamp))))
            })
            .collect();

        let removed = targets.len();
        for (idx, tombstone) in targets {
            inner.replace_slot(idx, tombstone);
        }
        removed
    }

    /// Merge `properties` into an existing asset and replace it in place.
    pub fn update_asset(
        &self,
        asset_id: &str,
        properties: &Properties,
        timestamp: DateTime<Utc>,
    ) -> Option<Arc<Asset>> {
        let mut inner = self.write();
        let idx = *inner.index.get(asset_id)?;
        let updated = Arc::new(inner.slots[idx].as_ref()?.updated(properties, timestamp));
        inner.replace_slot(idx, updated.clone());
        Some(updated)
    }

    pub fn get_asset(&self, asset_id: &str) -> Option<Arc<Asset>> {
        let inner = self.read();
        let idx = *inner.index.get(asset_id)?;
        inner.slots[idx].clone()
    }

    /// Slot of the asset, including tombstoned ones; `None` once evicted.
    pub fn get_index(&self, asset_id: &str) -> Option<usize> {
        self.read().index.get(asset_id).copied()
    }

    /// Matching assets, most recently inserted first.
    pub fn get_assets(&self, query: &AssetQuery) -> Vec<Arc<Asset>> {
        let inner = self.read();
        let limit = query.count.unwrap_or(usize::MAX);
        inner
            .newest_first()
            .filter_map(|idx| inner.slots[idx].as_ref())
            .filter(|asset| query.matches(asset))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Occupied slots, tombstones included.
    pub fn count(&self) -> usize {
        self.read().len
    }

    /// Occupied slots holding an asset that is not removed.
    pub fn active_count(&self) -> usize {
        self.read().active
    }

    pub fn count_for_type(&self, asset_type: &str) -> usize {
        self.read().by_type.get(asset_type)
    }

    pub fn count_for_device(&self, device_uuid: &str) -> usize {
        self.read().by_device.get(device_uuid)
    }

    pub fn active_count_for_type(&self, asset_type: &str) -> usize {
        self.read().by_type.get_active(asset_type)
    }

    pub fn active_count_for_device(&self, device_uuid: &str) -> usize {
        self.read().by_device.get_active(device_uuid)
    }
}
