//! Lane configuration store.
//!
//! Owns up to [`MAX_LANES`] lane configurations plus the shared view
//! settings. Every mutation replaces a lane as a whole and bumps a revision
//! counter, so a recomputation never sees a half-updated lane.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::filter::filter_facts;
use crate::schema::is_hex_color;
use crate::types::{Fact, FactlineError, FactlineResult};

/// Maximum number of lanes.
pub const MAX_LANES: usize = 4;

/// Version written into exported lane configurations.
pub const CONFIG_VERSION: &str = "1.0";

/// Lane color palette, assigned in rotation.
pub const LANE_COLORS: [&str; 16] = [
    "#ef4444", "#f97316", "#f59e0b", "#84cc16", "#22c55e", "#10b981", "#06b6d4", "#0ea5e9",
    "#3b82f6", "#6366f1", "#8b5cf6", "#a855f7", "#d946ef", "#ec4899", "#f43f5e", "#64748b",
];

/// A named, colored, filterable view over one timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneConfig {
    pub id: String,
    pub name: String,
    pub color: String,
    pub timeline_id: String,
    #[serde(default)]
    pub included_tags: Vec<String>,
    #[serde(default)]
    pub excluded_tags: Vec<String>,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

impl LaneConfig {
    /// Apply this lane's tag sets to a fact collection.
    pub fn filter(&self, facts: &[Arc<Fact>]) -> Vec<Arc<Fact>> {
        filter_facts(facts, &self.included_tags, &self.excluded_tags, None)
    }
}

/// Which tag set a tag is added to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Include,
    Exclude,
}

/// View toggles shared by all lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    #[serde(default = "default_true")]
    pub is_scroll_synced: bool,
    #[serde(default = "default_true")]
    pub show_correlations: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            is_scroll_synced: true,
            show_correlations: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Portable lane, without its session-local ID and visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedLane {
    #[serde(default = "unnamed_lane")]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub timeline_id: String,
    #[serde(default)]
    pub included_tags: Vec<String>,
    #[serde(default)]
    pub excluded_tags: Vec<String>,
}

fn unnamed_lane() -> String {
    "Unnamed Lane".to_string()
}

/// Exported lane configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneExport {
    pub version: String,
    pub lanes: Vec<ExportedLane>,
    #[serde(default)]
    pub settings: ViewSettings,
}

/// Mutable lane state with an explicit owner.
#[derive(Debug, Clone)]
pub struct LaneStore {
    lanes: Vec<LaneConfig>,
    active_lane_id: Option<String>,
    settings: ViewSettings,
    known_timelines: BTreeSet<String>,
    default_timeline: String,
    next_color: usize,
    revision: u64,
}

impl LaneStore {
    /// Create a store holding a single lane over `default_timeline`.
    ///
    /// `known_timelines` is the set imported configurations are checked against.
    pub fn new<I, S>(default_timeline: impl Into<String>, known_timelines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self {
            lanes: Vec::new(),
            active_lane_id: None,
            settings: ViewSettings::default(),
            known_timelines: known_timelines.into_iter().map(Into::into).collect(),
            default_timeline: default_timeline.into(),
            next_color: 0,
            revision: 0,
        };
        let lane = store.default_lane();
        store.lanes.push(lane);
        store
    }

    pub fn lanes(&self) -> &[LaneConfig] {
        &self.lanes
    }

    pub fn get(&self, lane_id: &str) -> Option<&LaneConfig> {
        self.lanes.iter().find(|l| l.id == lane_id)
    }

    /// Get a lane by ID or fail.
    pub fn require(&self, lane_id: &str) -> FactlineResult<&LaneConfig> {
        self.get(lane_id)
            .ok_or_else(|| FactlineError::LaneNotFound(lane_id.to_string()))
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn can_add_lane(&self) -> bool {
        self.lanes.len() < MAX_LANES
    }

    pub fn visible_lanes(&self) -> impl Iterator<Item = &LaneConfig> {
        self.lanes.iter().filter(|l| l.is_visible)
    }

    pub fn settings(&self) -> ViewSettings {
        self.settings
    }

    pub fn active_lane(&self) -> Option<&LaneConfig> {
        self.active_lane_id.as_deref().and_then(|id| self.get(id))
    }

    /// Incremented on every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_known_timeline(&self, timeline_id: &str) -> bool {
        self.known_timelines.contains(timeline_id)
    }

    /// Append an unfiltered lane over `timeline_id` and return its ID.
    ///
    /// At the lane limit, or for a timeline the store does not know, nothing
    /// changes and the last lane's ID is returned.
    pub fn add_lane(&mut self, timeline_id: &str) -> String {
        if let Some(existing) = self.refuse_at_limit() {
            return existing;
        }
        if !self.is_known_timeline(timeline_id) {
            tracing::warn!("Cannot add lane over unknown timeline {timeline_id}");
            return self.last_lane_id();
        }
        let lane = LaneConfig {
            id: new_lane_id(),
            name: format!("Lane {timeline_id}"),
            color: self.next_color(),
            timeline_id: timeline_id.to_string(),
            included_tags: Vec::new(),
            excluded_tags: Vec::new(),
            is_visible: true,
        };
        let id = lane.id.clone();
        self.lanes.push(lane);
        self.touch();
        tracing::debug!("Added lane {id} over {timeline_id}");
        id
    }

    /// Copy a lane under a new ID and color.
    ///
    /// At the lane limit nothing changes and the last lane's ID is returned.
    pub fn duplicate_lane(&mut self, lane_id: &str) -> FactlineResult<String> {
        let source = self.require(lane_id)?.clone();
        if let Some(existing) = self.refuse_at_limit() {
            return Ok(existing);
        }
        let lane = LaneConfig {
            id: new_lane_id(),
            name: format!("{} (copy)", source.name),
            color: self.next_color(),
            ..source
        };
        let id = lane.id.clone();
        self.lanes.push(lane);
        self.touch();
        Ok(id)
    }

    /// Remove a lane. The last remaining lane cannot be removed.
    pub fn remove_lane(&mut self, lane_id: &str) -> FactlineResult<()> {
        let index = self.index_of(lane_id)?;
        if self.lanes.len() <= 1 {
            tracing::warn!("Cannot remove the last lane");
            return Err(FactlineError::LastLane);
        }
        self.lanes.remove(index);
        if self.active_lane_id.as_deref() == Some(lane_id) {
            self.active_lane_id = None;
        }
        self.touch();
        Ok(())
    }

    /// Replace a lane wholesale, matched by `lane.id`.
    pub fn update_lane(&mut self, lane: LaneConfig) -> FactlineResult<()> {
        let index = self.index_of(&lane.id)?;
        if !self.is_known_timeline(&lane.timeline_id) {
            return Err(FactlineError::UnknownTimeline(lane.timeline_id));
        }
        self.lanes[index] = lane;
        self.touch();
        Ok(())
    }

    /// Reorder lanes. `lane_ids` must name every lane exactly once.
    pub fn reorder_lanes(&mut self, lane_ids: &[String]) -> FactlineResult<()> {
        let unique: BTreeSet<&str> = lane_ids.iter().map(String::as_str).collect();
        if unique.len() != lane_ids.len() || lane_ids.len() != self.lanes.len() {
            return Err(FactlineError::InvalidConfig(
                "reorder must list every lane exactly once".to_string(),
            ));
        }
        let reordered = lane_ids
            .iter()
            .map(|id| self.require(id).cloned())
            .collect::<FactlineResult<Vec<_>>>()?;
        self.lanes = reordered;
        self.touch();
        Ok(())
    }

    pub fn set_active_lane(&mut self, lane_id: Option<&str>) -> FactlineResult<()> {
        if let Some(id) = lane_id {
            self.require(id)?;
        }
        self.active_lane_id = lane_id.map(str::to_string);
        self.touch();
        Ok(())
    }

    /// Back to a single default lane.
    pub fn reset(&mut self) {
        self.next_color = 0;
        self.lanes = vec![self.default_lane()];
        self.active_lane_id = None;
        self.touch();
    }

    /// Add a tag to one set, removing it from the other.
    pub fn add_tag(&mut self, lane_id: &str, tag: &str, mode: FilterMode) -> FactlineResult<()> {
        let mut lane = self.require(lane_id)?.clone();
        let (target, other) = match mode {
            FilterMode::Include => (&mut lane.included_tags, &mut lane.excluded_tags),
            FilterMode::Exclude => (&mut lane.excluded_tags, &mut lane.included_tags),
        };
        if !target.iter().any(|t| t == tag) {
            target.push(tag.to_string());
        }
        other.retain(|t| t != tag);
        self.update_lane(lane)
    }

    /// Drop a tag from both sets.
    pub fn remove_tag(&mut self, lane_id: &str, tag: &str) -> FactlineResult<()> {
        let mut lane = self.require(lane_id)?.clone();
        lane.included_tags.retain(|t| t != tag);
        lane.excluded_tags.retain(|t| t != tag);
        self.update_lane(lane)
    }

    pub fn set_tags(
        &mut self,
        lane_id: &str,
        included: Vec<String>,
        excluded: Vec<String>,
    ) -> FactlineResult<()> {
        let mut lane = self.require(lane_id)?.clone();
        lane.included_tags = included;
        lane.excluded_tags = excluded;
        self.update_lane(lane)
    }

    /// Flip a lane's visibility and return the new value.
    pub fn toggle_visibility(&mut self, lane_id: &str) -> FactlineResult<bool> {
        let mut lane = self.require(lane_id)?.clone();
        lane.is_visible = !lane.is_visible;
        let visible = lane.is_visible;
        self.update_lane(lane)?;
        Ok(visible)
    }

    pub fn toggle_scroll_sync(&mut self) -> bool {
        self.settings.is_scroll_synced = !self.settings.is_scroll_synced;
        self.touch();
        self.settings.is_scroll_synced
    }

    pub fn toggle_correlations(&mut self) -> bool {
        self.settings.show_correlations = !self.settings.show_correlations;
        self.touch();
        self.settings.show_correlations
    }

    /// Snapshot the lanes and settings as a portable document.
    pub fn to_export(&self) -> LaneExport {
        LaneExport {
            version: CONFIG_VERSION.to_string(),
            lanes: self
                .lanes
                .iter()
                .map(|l| ExportedLane {
                    name: l.name.clone(),
                    color: Some(l.color.clone()),
                    timeline_id: l.timeline_id.clone(),
                    included_tags: l.included_tags.clone(),
                    excluded_tags: l.excluded_tags.clone(),
                })
                .collect(),
            settings: self.settings,
        }
    }

    /// Export the configuration as pretty-printed JSON.
    pub fn export_config(&self) -> FactlineResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_export())?)
    }

    /// Import a configuration, reporting failure as `false`.
    ///
    /// Nothing is modified unless the whole document is valid.
    pub fn import_config(&mut self, json: &str) -> bool {
        match self.try_import_config(json) {
            Ok(count) => {
                tracing::info!("Imported {count} lanes");
                true
            }
            Err(e) => {
                tracing::warn!("Failed to import lane config: {e}");
                false
            }
        }
    }

    /// Import a configuration and return the number of lanes, or the reason
    /// it was rejected. Lane IDs are regenerated.
    pub fn try_import_config(&mut self, json: &str) -> FactlineResult<usize> {
        let doc: LaneExport = serde_json::from_str(json)?;
        self.import(doc)
    }

    /// Replace all lanes and settings with an already-parsed document.
    pub fn import(&mut self, doc: LaneExport) -> FactlineResult<usize> {
        if doc.version != CONFIG_VERSION {
            return Err(FactlineError::InvalidConfig(format!(
                "unsupported version {}",
                doc.version
            )));
        }
        if doc.lanes.is_empty() {
            return Err(FactlineError::InvalidConfig("no lanes".to_string()));
        }
        if doc.lanes.len() > MAX_LANES {
            return Err(FactlineError::LaneLimit { max: MAX_LANES });
        }
        for lane in &doc.lanes {
            if !self.is_known_timeline(&lane.timeline_id) {
                return Err(FactlineError::UnknownTimeline(lane.timeline_id.clone()));
            }
            if let Some(color) = lane.color.as_deref().filter(|c| !is_hex_color(c)) {
                return Err(FactlineError::InvalidConfig(format!(
                    "lane {}: bad color {color}",
                    lane.name
                )));
            }
        }

        let lanes: Vec<LaneConfig> = doc
            .lanes
            .into_iter()
            .map(|l| LaneConfig {
                id: new_lane_id(),
                name: l.name,
                color: l.color.unwrap_or_else(|| self.next_color()),
                timeline_id: l.timeline_id,
                included_tags: l.included_tags,
                excluded_tags: l.excluded_tags,
                is_visible: true,
            })
            .collect();

        let count = lanes.len();
        self.lanes = lanes;
        self.settings = doc.settings;
        self.active_lane_id = None;
        self.touch();
        Ok(count)
    }

    fn index_of(&self, lane_id: &str) -> FactlineResult<usize> {
        self.lanes
            .iter()
            .position(|l| l.id == lane_id)
            .ok_or_else(|| FactlineError::LaneNotFound(lane_id.to_string()))
    }

    fn refuse_at_limit(&self) -> Option<String> {
        if self.can_add_lane() {
            return None;
        }
        tracing::warn!("Maximum {MAX_LANES} lanes allowed");
        Some(self.last_lane_id())
    }

    fn last_lane_id(&self) -> String {
        self.lanes
            .last()
            .map(|l| l.id.clone())
            .unwrap_or_default()
    }

    fn default_lane(&mut self) -> LaneConfig {
        LaneConfig {
            id: new_lane_id(),
            name: self.default_timeline.clone(),
            color: self.next_color(),
            timeline_id: self.default_timeline.clone(),
            included_tags: Vec::new(),
            excluded_tags: Vec::new(),
            is_visible: true,
        }
    }

    fn next_color(&mut self) -> String {
        let color = LANE_COLORS[self.next_color % LANE_COLORS.len()];
        self.next_color += 1;
        color.to_string()
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

fn new_lane_id() -> String {
    format!("lane-{}", uuid::Uuid::new_v4().simple())
}
