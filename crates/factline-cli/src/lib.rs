//! Factline CLI — inspect timelines, lay out lanes, and explore cross-lane correlations.

pub mod config;
pub mod repl;
pub mod session;

pub use config::{load_engine_config, resolve_data_dir, EngineConfig};
pub use session::{LaneSpec, WorkspaceSession};
