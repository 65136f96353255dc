//! Bounded in-memory stores for pipeline output.
//!
//! - [`ObservationBuffer`]: fixed-capacity ring indexed by sequence number,
//!   with checkpoints of current state.
//! - [`AssetBuffer`]: fixed-capacity, identity-indexed asset store with
//!   per-type and per-device counts and FIFO eviction.
//!
//! Both are written by producer pipelines and read by the query surface
//! concurrently. Each mutation happens under one write lock, so readers never
//! see a half-applied append or a count out of step with the slots.

pub mod asset_buffer;
pub mod checkpoint;
pub mod observation_buffer;

pub use asset_buffer::{AssetBuffer, AssetChange, AssetQuery};
pub use checkpoint::Checkpoint;
pub use observation_buffer::ObservationBuffer;
