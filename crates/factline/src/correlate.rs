//! Cross-lane correlation: temporal proximity, explicit links, coverage delay.
//!
//! Every unordered pair of lanes is compared fact-by-fact, so the cost is
//! O(n·m) per lane pair. That is fine for tens to low hundreds of facts per
//! lane.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::filter::{coverage_gap, format_time_gap};
use crate::types::{CorrelationType, Fact, FactCorrelation, TimeRange, SECONDS_PER_DAY};

/// Default temporal window: 30 days.
pub const DEFAULT_MAX_DELTA_SECONDS: i64 = 30 * SECONDS_PER_DAY;

/// Fixed strength assigned to coverage-gap correlations.
pub const COVERAGE_GAP_STRENGTH: f64 = 0.8;

/// Filtered facts of one lane.
#[derive(Debug, Clone)]
pub struct LaneFacts {
    pub lane_id: String,
    pub facts: Vec<Arc<Fact>>,
}

impl LaneFacts {
    pub fn new(lane_id: impl Into<String>, facts: Vec<Arc<Fact>>) -> Self {
        Self {
            lane_id: lane_id.into(),
            facts,
        }
    }
}

/// Tuning for correlation detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorrelationConfig {
    pub max_delta_seconds: i64,
    pub coverage_gap_strength: f64,
    /// Also link facts that share a thread ID.
    pub link_threads: bool,
    pub thread_strength: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_delta_seconds: DEFAULT_MAX_DELTA_SECONDS,
            coverage_gap_strength: COVERAGE_GAP_STRENGTH,
            link_threads: false,
            thread_strength: 0.5,
        }
    }
}

impl CorrelationConfig {
    pub fn with_max_delta(max_delta_seconds: i64) -> Self {
        Self {
            max_delta_seconds,
            ..Self::default()
        }
    }
}

/// Find correlations between facts of different lanes, strongest first.
pub fn correlate(
    lanes: &[LaneFacts],
    time_range: TimeRange,
    max_delta_seconds: i64,
) -> Vec<FactCorrelation> {
    correlate_with(
        lanes,
        time_range,
        &CorrelationConfig::with_max_delta(max_delta_seconds),
    )
}

/// [`correlate`] with full configuration.
pub fn correlate_with(
    lanes: &[LaneFacts],
    time_range: TimeRange,
    config: &CorrelationConfig,
) -> Vec<FactCorrelation> {
    let mut correlations = Vec::new();

    for (i, lane1) in lanes.iter().enumerate() {
        for lane2 in &lanes[i + 1..] {
            for f1 in &lane1.facts {
                for f2 in &lane2.facts {
                    correlate_pair(
                        (&**f1, lane1.lane_id.as_str()),
                        (&**f2, lane2.lane_id.as_str()),
                        time_range,
                        config,
                        &mut correlations,
                    );
                }
            }
        }
    }

    correlations.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    tracing::debug!(
        "Correlated {} lanes: {} correlations",
        lanes.len(),
        correlations.len()
    );
    correlations
}

fn correlate_pair(
    (f1, lane1_id): (&Fact, &str),
    (f2, lane2_id): (&Fact, &str),
    time_range: TimeRange,
    config: &CorrelationConfig,
    out: &mut Vec<FactCorrelation>,
) {
    let max_delta = config.max_delta_seconds.max(0);
    let delta = (f1.timestamp - f2.timestamp).abs();
    let position = time_range.normalized_position(f1.timestamp);

    let make = |prefix: &str, kind, description: String, time_gap, strength| FactCorrelation {
        id: format!("{prefix}-{}-{}", f1.id, f2.id),
        fact1_id: f1.id.clone(),
        lane1_id: lane1_id.to_string(),
        fact2_id: f2.id.clone(),
        lane2_id: lane2_id.to_string(),
        kind,
        description,
        time_gap,
        position,
        strength,
    };

    let mut linked = false;

    if f1.references(&f2.id) || f2.references(&f1.id) {
        out.push(make(
            "xref",
            CorrelationType::Causal,
            "Explicit cross-reference".to_string(),
            Some(delta),
            1.0,
        ));
        linked = true;
    } else if delta <= max_delta {
        let strength = if max_delta == 0 {
            1.0
        } else {
            1.0 - delta as f64 / max_delta as f64
        };
        out.push(make(
            "corr",
            CorrelationType::Temporal,
            format!("Within {}", format_time_gap(delta)),
            Some(delta),
            strength,
        ));
        linked = true;
    }

    // Only one side may carry a coverage date; either side qualifies.
    let gap = match (coverage_gap(f1), coverage_gap(f2)) {
        (Some(g), None) | (None, Some(g)) => Some(g),
        _ => None,
    };
    if let Some(gap) = gap.filter(|g| g.seconds > max_delta) {
        out.push(make(
            "gap",
            CorrelationType::CoverageGap,
            format!("Coverage delayed by {}", format_time_gap(gap.seconds)),
            Some(gap.seconds),
            config.coverage_gap_strength,
        ));
        linked = true;
    }

    if config.link_threads
        && !linked
        && !f1.metadata.thread_id.is_empty()
        && f1.metadata.thread_id == f2.metadata.thread_id
    {
        out.push(make(
            "thread",
            CorrelationType::Thematic,
            format!("Same thread: {}", f1.metadata.thread_id),
            Some(delta),
            config.thread_strength,
        ));
    }
}

/// Span covered by all facts and their coverage dates, or `None` if empty.
pub fn common_time_range(lanes: &[LaneFacts]) -> Option<TimeRange> {
    let mut stamps = lanes.iter().flat_map(|lane| lane.facts.iter()).flat_map(|fact| {
        std::iter::once(fact.timestamp).chain(fact.metadata.media_coverage_date)
    });

    let first = stamps.next()?;
    let (start, end) = stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    Some(TimeRange::new(start, end))
}
