//! Per-agent pipeline context.
//!
//! Holds the collaborators every producer pipeline needs (data-item lookup,
//! delivery sink, clock) and the registry of named, shared filter state.
//!
//! Shared state is reference counted. The registry only keeps a weak handle,
//! so a state lives exactly as long as some pipeline holds it; the next
//! request for the same name after that creates a fresh one.

use crate::clock::Clock;
use crate::device::DataItemLookup;
use crate::entity::{Asset, AssetCommand, ConnectionStatus, Observation, ProtocolCommand};
use crate::pipeline::error::{PipelineError, PipelineResult};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Terminal delivery targets for finished entities.
///
/// Ownership of each entity moves to the sink.
pub trait EntitySink: Send + Sync {
    fn deliver_observation(&self, observation: Observation);

    fn deliver_asset(&self, asset: Asset);

    fn deliver_asset_command(&self, command: AssetCommand) {
        tracing::debug!("Ignoring asset command {:?}", command);
    }

    fn deliver_connection_status(&self, status: ConnectionStatus) {
        tracing::debug!(
            "Producer '{}' is {} (device {})",
            status.source,
            status.state,
            status.device
        );
    }

    fn deliver_command(&self, command: ProtocolCommand) {
        tracing::debug!(
            "Protocol command from '{}': {} = {}",
            command.source,
            command.name,
            command.value
        );
    }
}

type SharedState = Arc<dyn Any + Send + Sync>;

pub struct PipelineContext {
    lookup: Arc<dyn DataItemLookup>,
    sink: Arc<dyn EntitySink>,
    clock: Arc<dyn Clock>,
    shared: Mutex<HashMap<String, Weak<dyn Any + Send + Sync>>>,
}

impl PipelineContext {
    pub fn new(
        lookup: Arc<dyn DataItemLookup>,
        sink: Arc<dyn EntitySink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lookup,
            sink,
            clock,
            shared: Mutex::new(HashMap::new()),
        }
    }

    pub fn lookup(&self) -> &Arc<dyn DataItemLookup> {
        &self.lookup
    }

    pub fn sink(&self) -> &Arc<dyn EntitySink> {
        &self.sink
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Get the state registered under `name`, creating it on first request.
    ///
    /// The registry lock is held only for the lookup; the returned state
    /// synchronizes its own entries.
    pub fn shared_state<T>(&self, name: &str) -> PipelineResult<Arc<T>>
    where
        T: Default + Send + Sync + 'static,
    {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = shared.get(name).and_then(Weak::upgrade) {
            return existing
                .downcast::<T>()
                .map_err(|_| PipelineError::SharedStateType {
                    name: name.to_string(),
                });
        }

        shared.retain(|_, state| state.strong_count() > 0);

        let state = Arc::new(T::default());
        let erased: SharedState = state.clone();
        shared.insert(name.to_string(), Arc::downgrade(&erased));
        tracing::debug!("Created shared filter state '{}'", name);
        Ok(state)
    }

    /// Number of named states still held by some pipeline.
    pub fn live_state_count(&self) -> usize {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|state| state.strong_count() > 0)
            .count()
    }
}
