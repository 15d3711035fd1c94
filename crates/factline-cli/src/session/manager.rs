//! Workspace session: loaded facts, lane state, and derived-value cache.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Serialize;

use factline::cache::{CorrelationView, LaneView};
use factline::lanes::{ExportedLane, LaneExport, CONFIG_VERSION};
use factline::{
    group_tags, tag_counts, DerivedCache, Fact, FactQuery, FactStore, LaneConfig, LaneStore,
    LoadReport, TagGroups, ViewSettings, MAX_LANES,
};

use crate::config::EngineConfig;

/// Ad-hoc lane given on the command line as `timeline[=tag,!tag,...]`.
///
/// Tags prefixed with `!` are excluded, the rest included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSpec {
    pub timeline_id: String,
    pub included_tags: Vec<String>,
    pub excluded_tags: Vec<String>,
}

impl FromStr for LaneSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (timeline, tags) = s.split_once('=').unwrap_or((s, ""));
        let timeline = timeline.trim();
        if timeline.is_empty() {
            return Err(format!("missing timeline in lane '{s}'"));
        }

        let mut spec = LaneSpec {
            timeline_id: timeline.to_string(),
            included_tags: Vec::new(),
            excluded_tags: Vec::new(),
        };
        for tag in tags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match tag.strip_prefix('!') {
                Some(excluded) => spec.excluded_tags.push(excluded.to_string()),
                None => spec.included_tags.push(tag.to_string()),
            }
        }
        Ok(spec)
    }
}

/// Per-timeline summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSummary {
    pub id: String,
    pub name: String,
    pub color: String,
    pub facts: usize,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub tags: TagGroups,
}

/// Owns everything one user session works with.
pub struct WorkspaceSession {
    data_dir: PathBuf,
    store: FactStore,
    report: LoadReport,
    lanes: LaneStore,
    cache: DerivedCache,
    media_covered: Option<bool>,
}

impl WorkspaceSession {
    /// Load every timeline under `data_dir`.
    pub fn open(data_dir: &Path, config: EngineConfig) -> anyhow::Result<Self> {
        let (store, report) = FactStore::load_dir(data_dir)
            .with_context(|| format!("Failed to load facts from {}", data_dir.display()))?;

        let Some(default_timeline) = store.ids().next().map(str::to_string) else {
            bail!("No timelines found in {}", data_dir.display());
        };
        let lanes = LaneStore::new(default_timeline, store.ids());

        tracing::info!(
            "Session opened: {} timelines, {} facts ({} rejected)",
            store.count(),
            report.loaded,
            report.rejected
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            store,
            report,
            lanes,
            cache: DerivedCache::new(config.layout, config.correlation),
            media_covered: None,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn lanes(&self) -> &LaneStore {
        &self.lanes
    }

    /// Mutable lane state. Cached views follow lane changes through their keys.
    pub fn lanes_mut(&mut self) -> &mut LaneStore {
        &mut self.lanes
    }

    pub fn cache(&self) -> &DerivedCache {
        &self.cache
    }

    /// Restrict every lane to facts with (`Some(true)`) or without
    /// (`Some(false)`) media coverage.
    pub fn set_media_covered(&mut self, media_covered: Option<bool>) {
        self.media_covered = media_covered;
    }

    pub fn media_covered(&self) -> Option<bool> {
        self.media_covered
    }

    /// Summaries of every loaded timeline.
    pub fn summaries(&self) -> Vec<TimelineSummary> {
        self.store
            .timelines()
            .map(|t| TimelineSummary {
                id: t.id.clone(),
                name: t.name.clone(),
                color: t.color.clone(),
                facts: t.count(),
                start: t.facts.iter().map(|f| f.timestamp).min(),
                end: t.facts.iter().map(|f| f.timestamp).max(),
                tags: group_tags(&t.facts),
            })
            .collect()
    }

    /// Tag usage counts of one timeline.
    pub fn tag_counts(&self, timeline_id: &str) -> anyhow::Result<Vec<(String, usize)>> {
        let timeline = self.store.require(timeline_id)?;
        Ok(tag_counts(&timeline.facts).into_iter().collect())
    }

    /// Run a query against one timeline.
    pub fn query(&self, timeline_id: &str, query: &FactQuery) -> anyhow::Result<Vec<Arc<Fact>>> {
        let timeline = self.store.require(timeline_id)?;
        Ok(query.apply(&timeline.facts))
    }

    /// Replace all lanes with the given specs.
    pub fn apply_lane_specs(&mut self, specs: &[LaneSpec]) -> anyhow::Result<()> {
        if specs.is_empty() {
            return Ok(());
        }
        if specs.len() > MAX_LANES {
            bail!("At most {MAX_LANES} lanes can be shown, got {}", specs.len());
        }
        let doc = LaneExport {
            version: CONFIG_VERSION.to_string(),
            lanes: specs
                .iter()
                .map(|s| ExportedLane {
                    name: s.timeline_id.clone(),
                    color: None,
                    timeline_id: s.timeline_id.clone(),
                    included_tags: s.included_tags.clone(),
                    excluded_tags: s.excluded_tags.clone(),
                })
                .collect(),
            settings: self.lanes.settings(),
        };
        self.lanes.import(doc)?;
        Ok(())
    }

    /// Import a lane configuration file. Nothing changes on failure.
    pub fn import_lanes_file(&mut self, path: &Path) -> anyhow::Result<usize> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let count = self
            .lanes
            .try_import_config(&json)
            .with_context(|| format!("Rejected lane config {}", path.display()))?;
        Ok(count)
    }

    pub fn export_lanes(&self) -> anyhow::Result<String> {
        Ok(self.lanes.export_config()?)
    }

    pub fn settings(&self) -> ViewSettings {
        self.lanes.settings()
    }

    /// Filtered and laid-out facts of one lane.
    pub fn lane_view(&mut self, lane_id: &str) -> anyhow::Result<Arc<LaneView>> {
        let lane = self.lanes.require(lane_id)?;
        Ok(self.cache.lane_view(&self.store, lane, self.media_covered)?)
    }

    /// Views of every visible lane, in lane order.
    pub fn visible_lane_views(&mut self) -> anyhow::Result<Vec<Arc<LaneView>>> {
        let lanes: Vec<&LaneConfig> = self.lanes.visible_lanes().collect();
        lanes
            .into_iter()
            .map(|lane| -> anyhow::Result<Arc<LaneView>> {
                Ok(self.cache.lane_view(&self.store, lane, self.media_covered)?)
            })
            .collect()
    }

    /// Correlations between visible lanes.
    pub fn correlations(&mut self) -> anyhow::Result<Arc<CorrelationView>> {
        let lanes: Vec<&LaneConfig> = self.lanes.visible_lanes().collect();
        Ok(self
            .cache
            .correlations(&self.store, &lanes, self.media_covered)?)
    }

    /// Drop cache entries of lanes that no longer exist.
    pub fn prune_cache(&mut self) {
        let ids: Vec<&str> = self.lanes.lanes().iter().map(|l| l.id.as_str()).collect();
        self.cache.retain_lanes(&ids);
    }
}
