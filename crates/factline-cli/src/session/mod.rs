//! Session state for one data directory.

pub mod manager;

pub use manager::{LaneSpec, TimelineSummary, WorkspaceSession};
