//! Factline — multi-lane timeline engine: fact loading, tag filtering, compressed layout, and cross-lane correlation.

pub mod cache;
pub mod correlate;
pub mod filter;
pub mod lanes;
pub mod layout;
pub mod schema;
pub mod store;
pub mod tags;
pub mod types;

pub use cache::DerivedCache;
pub use correlate::{common_time_range, correlate, correlate_with, CorrelationConfig, LaneFacts};
pub use filter::{coverage_gap, filter_facts, format_time_gap, has_media_coverage, FactQuery};
pub use lanes::{FilterMode, LaneConfig, LaneStore, ViewSettings, MAX_LANES};
pub use layout::{layout, Layout, LayoutConfig, SilenceGap, YearMarker};
pub use schema::validate_fact;
pub use store::{FactStore, LoadReport};
pub use tags::{classify, group_tags, tag_counts, TagGroups, TagInfo, TagType};
pub use types::*;
