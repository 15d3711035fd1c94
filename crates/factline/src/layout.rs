//! Temporal layout: time-proportional positions with a minimum visual gap.
//!
//! Each fact gets an ideal position proportional to the time elapsed since
//! the earliest fact. Positions are then pushed forward so that consecutive
//! facts are at least `min_gap_px` apart. Gaps are only ever expanded, never
//! compressed, so spacing stays exactly proportional wherever the natural
//! gap already exceeds the minimum.
//!
//! The (ideal, actual) pairs produced by that pass form an [`AnchorTable`],
//! a monotonic piecewise-linear map used to place year markers in the same
//! adjusted coordinates as the facts around them.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Fact, PositionedFact, SECONDS_PER_YEAR};

/// Pixel constants driving the layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub pixels_per_year: f64,
    pub min_gap_px: f64,
    /// Offset of the earliest fact.
    pub base_padding: f64,
    /// Estimated extent of one fact card.
    pub item_height: f64,
    /// Extra extent added at relevance 100, scaled linearly.
    pub relevance_extra_height: f64,
    pub marker_interval_years: i32,
    pub silence_threshold_years: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            pixels_per_year: 200.0,
            min_gap_px: 120.0,
            base_padding: 64.0,
            item_height: 96.0,
            relevance_extra_height: 48.0,
            marker_interval_years: 5,
            silence_threshold_years: 2.0,
        }
    }
}

impl LayoutConfig {
    pub fn new(pixels_per_year: f64, min_gap_px: f64) -> Self {
        Self {
            pixels_per_year,
            min_gap_px,
            ..Self::default()
        }
    }

    /// Time-proportional position of `timestamp` relative to `origin`.
    pub fn ideal_position(&self, origin: i64, timestamp: i64) -> f64 {
        let years = (timestamp - origin) as f64 / SECONDS_PER_YEAR;
        self.base_padding + years * self.pixels_per_year
    }

    /// Cosmetic extent of a fact card, grown by its relevance score.
    pub fn estimated_item_height(&self, fact: &Fact) -> f64 {
        match fact.relevance_score {
            Some(score) => {
                let weight = f64::from(score.min(100)) / 100.0;
                self.item_height + weight * self.relevance_extra_height
            }
            None => self.item_height,
        }
    }
}

/// Monotonic piecewise-linear map from ideal to collision-adjusted positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorTable {
    anchors: Vec<(f64, f64)>,
}

impl AnchorTable {
    /// Build from (ideal, actual) pairs. Both coordinates must be non-decreasing.
    pub fn new(anchors: Vec<(f64, f64)>) -> Self {
        debug_assert!(anchors.windows(2).all(|w| w[0].0 <= w[1].0 && w[0].1 <= w[1].1));
        Self { anchors }
    }

    /// Map an ideal position into adjusted coordinates.
    ///
    /// Outside the anchored span the nearest anchor's offset is carried
    /// with slope 1.
    pub fn remap(&self, ideal: f64) -> f64 {
        let (Some(&(first_ideal, first_actual)), Some(&(last_ideal, last_actual))) =
            (self.anchors.first(), self.anchors.last())
        else {
            return ideal;
        };

        if ideal <= first_ideal {
            return ideal + (first_actual - first_ideal);
        }
        if ideal >= last_ideal {
            return ideal + (last_actual - last_ideal);
        }

        // first_ideal < ideal < last_ideal, so 1 <= upper <= len - 1
        let upper = self.anchors.partition_point(|&(x, _)| x <= ideal);
        let (x0, y0) = self.anchors[upper - 1];
        let (x1, y1) = self.anchors[upper];
        y0 + (ideal - x0) / (x1 - x0) * (y1 - y0)
    }
}

/// A periodic calendar marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearMarker {
    pub year: i32,
    pub timestamp: i64,
    pub position: f64,
}

/// A multi-year span with no recorded facts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceGap {
    pub after_fact_id: String,
    pub before_fact_id: String,
    /// Midpoint of the two adjusted positions.
    pub position: f64,
    pub years: i64,
    pub label: String,
}

/// Result of laying out one lane.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub positioned: Vec<PositionedFact>,
    pub total_height: f64,
    pub markers: Vec<YearMarker>,
    pub gaps: Vec<SilenceGap>,
    #[serde(skip)]
    pub anchors: AnchorTable,
}

impl Layout {
    pub fn is_empty(&self) -> bool {
        self.positioned.is_empty()
    }
}

/// Lay out facts along one axis.
///
/// Facts are stable-sorted by timestamp. Zero facts yield an empty layout
/// of zero extent.
pub fn layout(facts: &[Arc<Fact>], config: &LayoutConfig) -> Layout {
    if facts.is_empty() {
        return Layout::default();
    }

    let mut sorted = facts.to_vec();
    sorted.sort_by_key(|f| f.timestamp);
    let origin = sorted[0].timestamp;

    let mut positioned: Vec<PositionedFact> = Vec::with_capacity(sorted.len());
    let mut anchors = Vec::with_capacity(sorted.len());

    for (index, fact) in sorted.into_iter().enumerate() {
        let ideal = config.ideal_position(origin, fact.timestamp);
        let position = match positioned.last() {
            Some(prev) => ideal.max(prev.position + config.min_gap_px),
            None => ideal,
        };
        anchors.push((ideal, position));
        positioned.push(PositionedFact {
            fact,
            position,
            index,
        });
    }

    let anchors = AnchorTable::new(anchors);

    let total_height = positioned
        .last()
        .map(|p| p.position + config.estimated_item_height(&p.fact))
        .unwrap_or(0.0);

    let markers = if positioned.len() > 1 {
        year_markers(&positioned, &anchors, config, origin)
    } else {
        Vec::new()
    };
    let gaps = silence_gaps(&positioned, config);

    Layout {
        positioned,
        total_height,
        markers,
        gaps,
        anchors,
    }
}

/// Markers every `marker_interval_years` calendar years, from the first
/// fact's year through the ceiling of the last fact's year.
fn year_markers(
    positioned: &[PositionedFact],
    anchors: &AnchorTable,
    config: &LayoutConfig,
    origin: i64,
) -> Vec<YearMarker> {
    let (Some(first), Some(last)) = (positioned.first(), positioned.last()) else {
        return Vec::new();
    };
    let (Some(first_year), Some(last_year)) =
        (year_of(first.fact.timestamp), year_of(last.fact.timestamp))
    else {
        return Vec::new();
    };

    let end_year = if year_start(last_year) == Some(last.fact.timestamp) {
        last_year
    } else {
        last_year + 1
    };

    let interval = config.marker_interval_years.max(1);
    let mut year = first_year.div_euclid(interval) * interval;
    if year < first_year {
        year += interval;
    }

    let mut markers = Vec::new();
    while year <= end_year {
        if let Some(timestamp) = year_start(year) {
            let ideal = config.ideal_position(origin, timestamp);
            markers.push(YearMarker {
                year,
                timestamp,
                position: anchors.remap(ideal).max(0.0),
            });
        }
        year += interval;
    }
    markers
}

fn silence_gaps(positioned: &[PositionedFact], config: &LayoutConfig) -> Vec<SilenceGap> {
    positioned
        .windows(2)
        .filter_map(|pair| {
            let (before, after) = (&pair[0], &pair[1]);
            let elapsed = (after.fact.timestamp - before.fact.timestamp) as f64 / SECONDS_PER_YEAR;
            if elapsed <= config.silence_threshold_years {
                return None;
            }
            let years = elapsed.round() as i64;
            Some(SilenceGap {
                after_fact_id: before.fact.id.clone(),
                before_fact_id: after.fact.id.clone(),
                position: (before.position + after.position) / 2.0,
                years,
                label: if years == 1 {
                    "1 year".to_string()
                } else {
                    format!("{years} years")
                },
            })
        })
        .collect()
}

fn year_of(timestamp: i64) -> Option<i32> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.year())
}

fn year_start(year: i32) -> Option<i64> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fact_at;

    const Y2000: i64 = 946_684_800;
    const Y2000_JAN_02: i64 = 946_771_200;
    const Y2012: i64 = 1_325_376_000;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_empty() {
        let out = layout(&[], &LayoutConfig::default());
        assert!(out.is_empty());
        assert_eq!(out.total_height, 0.0);
        assert!(out.markers.is_empty());
        assert!(out.gaps.is_empty());
    }

    #[test]
    fn test_single_fact() {
        let config = LayoutConfig::default();
        let out = layout(&[fact_at("only", Y2000)], &config);
        assert_eq!(out.positioned.len(), 1);
        assert_eq!(out.positioned[0].position, config.base_padding);
        assert_eq!(out.positioned[0].index, 0);
        assert_eq!(out.total_height, config.base_padding + config.item_height);
        assert!(out.markers.is_empty());
        assert!(out.gaps.is_empty());
    }

    #[test]
    fn test_clustered_facts_respect_min_gap() {
        let config = LayoutConfig::new(100.0, 50.0);
        let facts: Vec<_> = (0..6).map(|i| fact_at(&format!("f{i}"), Y2000 + i * 60)).collect();
        let out = layout(&facts, &config);
        for pair in out.positioned.windows(2) {
            assert!(pair[1].position - pair[0].position >= config.min_gap_px - 1e-9);
        }
        assert!(approx(out.positioned[5].position, config.base_padding + 250.0));
    }

    #[test]
    fn test_proportional_spacing_preserved() {
        let config = LayoutConfig::new(200.0, 120.0);
        let facts = vec![fact_at("a", Y2000), fact_at("b", Y2012)];
        let out = layout(&facts, &config);
        let ideal_gap = config.ideal_position(Y2000, Y2012) - config.ideal_position(Y2000, Y2000);
        assert!(ideal_gap >= config.min_gap_px);
        assert!(approx(out.positioned[1].position - out.positioned[0].position, ideal_gap));
        assert!(approx(ideal_gap, 2400.0));
    }

    #[test]
    fn test_sorts_by_timestamp_stably() {
        let facts = vec![
            fact_at("late", Y2012),
            fact_at("tie-a", Y2000),
            fact_at("tie-b", Y2000),
        ];
        let out = layout(&facts, &LayoutConfig::default());
        let ids: Vec<_> = out.positioned.iter().map(|p| p.fact.id.as_str()).collect();
        assert_eq!(ids, vec!["tie-a", "tie-b", "late"]);
        let idx: Vec<_> = out.positioned.iter().map(|p| p.index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn test_total_height_uses_relevance() {
        let config = LayoutConfig::default();
        let mut fact = (*fact_at("a", Y2000)).clone();
        fact.relevance_score = Some(50);
        let out = layout(&[Arc::new(fact)], &config);
        assert!(approx(
            out.total_height,
            config.base_padding + config.item_height + config.relevance_extra_height / 2.0
        ));
    }

    #[test]
    fn test_markers_follow_adjusted_coordinates() {
        let config = LayoutConfig::default();
        let facts = vec![
            fact_at("a", Y2000),
            fact_at("b", Y2000_JAN_02),
            fact_at("c", Y2012),
        ];
        let out = layout(&facts, &config);

        let years: Vec<_> = out.markers.iter().map(|m| m.year).collect();
        assert_eq!(years, vec![2000, 2005, 2010]);

        assert!(approx(out.markers[0].position, config.base_padding));

        let m2005 = &out.markers[1];
        let raw = config.ideal_position(Y2000, m2005.timestamp);
        assert!(m2005.position > raw);
        assert!(m2005.position > out.positioned[1].position);
        assert!(m2005.position < out.positioned[2].position);
    }

    #[test]
    fn test_silence_gap_at_adjusted_midpoint() {
        let config = LayoutConfig::default();
        let facts = vec![
            fact_at("a", Y2000),
            fact_at("b", Y2000_JAN_02),
            fact_at("c", Y2012),
        ];
        let out = layout(&facts, &config);
        assert_eq!(out.gaps.len(), 1);
        let gap = &out.gaps[0];
        assert_eq!(gap.after_fact_id, "b");
        assert_eq!(gap.before_fact_id, "c");
        assert_eq!(gap.years, 12);
        assert_eq!(gap.label, "12 years");
        let expected = (out.positioned[1].position + out.positioned[2].position) / 2.0;
        assert!(approx(gap.position, expected));
    }

    #[test]
    fn test_anchor_remap() {
        let table = AnchorTable::new(vec![(0.0, 0.0), (10.0, 50.0), (110.0, 150.0)]);
        assert!(approx(table.remap(5.0), 25.0));
        assert!(approx(table.remap(60.0), 100.0));
        assert!(approx(table.remap(-5.0), -5.0));
        assert!(approx(table.remap(120.0), 160.0));
        assert!(approx(AnchorTable::default().remap(7.0), 7.0));
    }

    #[test]
    fn test_anchor_remap_duplicate_ideals_is_monotonic() {
        let table = AnchorTable::new(vec![(0.0, 0.0), (0.0, 40.0), (100.0, 140.0)]);
        let mut prev = f64::MIN;
        for step in 0..=20 {
            let y = table.remap(step as f64 * 5.0);
            assert!(y >= prev);
            prev = y;
        }
    }
}
