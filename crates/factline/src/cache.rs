//! Memoized per-lane filter/layout output and cross-lane correlations.
//!
//! Entries are keyed by a hash of everything the derivation reads: the
//! timeline and store generation, the lane's tag sets, the coverage filter,
//! and the pixel or correlation constants. A lookup whose key matches the
//! stored one is a hit; anything else recomputes and replaces the entry.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;

use crate::correlate::{common_time_range, correlate_with, CorrelationConfig, LaneFacts};
use crate::filter::filter_facts;
use crate::lanes::LaneConfig;
use crate::layout::{layout, Layout, LayoutConfig};
use crate::store::FactStore;
use crate::types::{Fact, FactCorrelation, FactlineResult, TimeRange};

/// Filtered and laid-out facts of one lane.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneView {
    pub lane_id: String,
    pub timeline_id: String,
    /// Facts passing the lane filter, in timeline order.
    #[serde(skip)]
    pub facts: Vec<Arc<Fact>>,
    pub filtered_count: usize,
    pub total_count: usize,
    pub layout: Layout,
}

/// Correlations across a set of lanes.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationView {
    pub time_range: Option<TimeRange>,
    pub correlations: Vec<FactCorrelation>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Explicitly invalidated cache of derived lane data.
#[derive(Debug, Default)]
pub struct DerivedCache {
    layout_config: LayoutConfig,
    correlation_config: CorrelationConfig,
    lanes: HashMap<String, (u64, Arc<LaneView>)>,
    correlations: Option<(u64, Arc<CorrelationView>)>,
    stats: CacheStats,
}

impl DerivedCache {
    pub fn new(layout_config: LayoutConfig, correlation_config: CorrelationConfig) -> Self {
        Self {
            layout_config,
            correlation_config,
            ..Self::default()
        }
    }

    pub fn layout_config(&self) -> &LayoutConfig {
        &self.layout_config
    }

    pub fn correlation_config(&self) -> &CorrelationConfig {
        &self.correlation_config
    }

    /// Changing the constants changes every key; old entries are dropped.
    pub fn set_layout_config(&mut self, config: LayoutConfig) {
        self.layout_config = config;
        self.invalidate();
    }

    /// Drop every entry.
    pub fn invalidate(&mut self) {
        self.lanes.clear();
        self.correlations = None;
    }

    /// Drop entries of lanes not in `lane_ids`.
    pub fn retain_lanes(&mut self, lane_ids: &[&str]) {
        self.lanes.retain(|id, _| lane_ids.contains(&id.as_str()));
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Filter and lay out one lane, reusing the previous result when its
    /// inputs are unchanged.
    pub fn lane_view(
        &mut self,
        store: &FactStore,
        lane: &LaneConfig,
        media_covered: Option<bool>,
    ) -> FactlineResult<Arc<LaneView>> {
        let mut hasher = DefaultHasher::new();
        hash_lane_inputs(&mut hasher, store, lane, media_covered);
        hash_layout_config(&mut hasher, &self.layout_config);
        let key = hasher.finish();

        if let Some((cached_key, view)) = self.lanes.get(&lane.id) {
            if *cached_key == key {
                self.stats.hits += 1;
                tracing::debug!("Lane view cache hit: {}", lane.id);
                return Ok(Arc::clone(view));
            }
        }

        self.stats.misses += 1;
        tracing::debug!("Lane view cache miss: {}", lane.id);

        let timeline = store.require(&lane.timeline_id)?;
        let facts = filter_facts(
            &timeline.facts,
            &lane.included_tags,
            &lane.excluded_tags,
            media_covered,
        );
        let view = Arc::new(LaneView {
            lane_id: lane.id.clone(),
            timeline_id: lane.timeline_id.clone(),
            filtered_count: facts.len(),
            total_count: timeline.count(),
            layout: layout(&facts, &self.layout_config),
            facts,
        });
        self.lanes.insert(lane.id.clone(), (key, Arc::clone(&view)));
        Ok(view)
    }

    /// Correlate the given lanes over their common time range.
    pub fn correlations(
        &mut self,
        store: &FactStore,
        lanes: &[&LaneConfig],
        media_covered: Option<bool>,
    ) -> FactlineResult<Arc<CorrelationView>> {
        let mut hasher = DefaultHasher::new();
        for lane in lanes {
            lane.id.hash(&mut hasher);
            hash_lane_inputs(&mut hasher, store, lane, media_covered);
        }
        hash_correlation_config(&mut hasher, &self.correlation_config);
        let key = hasher.finish();

        if let Some((cached_key, view)) = &self.correlations {
            if *cached_key == key {
                self.stats.hits += 1;
                tracing::debug!("Correlation cache hit");
                return Ok(Arc::clone(view));
            }
        }

        self.stats.misses += 1;
        tracing::debug!("Correlation cache miss ({} lanes)", lanes.len());

        let lane_facts = lanes
            .iter()
            .map(|lane| {
                let view = self.lane_view(store, lane, media_covered)?;
                Ok(LaneFacts::new(lane.id.clone(), view.facts.clone()))
            })
            .collect::<FactlineResult<Vec<_>>>()?;

        let time_range = common_time_range(&lane_facts);
        let correlations = match time_range {
            Some(range) => correlate_with(&lane_facts, range, &self.correlation_config),
            None => Vec::new(),
        };

        let view = Arc::new(CorrelationView {
            time_range,
            correlations,
        });
        self.correlations = Some((key, Arc::clone(&view)));
        Ok(view)
    }
}

fn hash_lane_inputs<H: Hasher>(
    hasher: &mut H,
    store: &FactStore,
    lane: &LaneConfig,
    media_covered: Option<bool>,
) {
    lane.timeline_id.hash(hasher);
    store.generation().hash(hasher);
    sorted(&lane.included_tags).hash(hasher);
    sorted(&lane.excluded_tags).hash(hasher);
    media_covered.hash(hasher);
}

fn hash_layout_config<H: Hasher>(hasher: &mut H, config: &LayoutConfig) {
    for value in [
        config.pixels_per_year,
        config.min_gap_px,
        config.base_padding,
        config.item_height,
        config.relevance_extra_height,
        config.silence_threshold_years,
    ] {
        value.to_bits().hash(hasher);
    }
    config.marker_interval_years.hash(hasher);
}

fn hash_correlation_config<H: Hasher>(hasher: &mut H, config: &CorrelationConfig) {
    config.max_delta_seconds.hash(hasher);
    config.coverage_gap_strength.to_bits().hash(hasher);
    config.link_threads.hash(hasher);
    config.thread_strength.to_bits().hash(hasher);
}

// Tag sets are unordered.
fn sorted(tags: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = tags.iter().map(String::as_str).collect();
    out.sort_unstable();
    out.dedup();
    out
}
