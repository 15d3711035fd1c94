//! Lane filtering by include/exclude tag sets and media coverage.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Fact, Importance, VerificationStatus, SECONDS_PER_DAY};

/// Filter facts for a lane.
///
/// Per fact, in order: any excluded tag rejects; with a non-empty include
/// set, at least one included tag is required; with `media_covered` set,
/// the fact's coverage must match it. An empty include set places no
/// constraint. Input order is preserved.
pub fn filter_facts(
    facts: &[Arc<Fact>],
    included_tags: &[String],
    excluded_tags: &[String],
    media_covered: Option<bool>,
) -> Vec<Arc<Fact>> {
    facts
        .iter()
        .filter(|fact| passes_lane_filter(fact, included_tags, excluded_tags, media_covered))
        .cloned()
        .collect()
}

fn passes_lane_filter(
    fact: &Fact,
    included_tags: &[String],
    excluded_tags: &[String],
    media_covered: Option<bool>,
) -> bool {
    if !excluded_tags.is_empty() && excluded_tags.iter().any(|t| fact.has_tag(t)) {
        return false;
    }
    if !included_tags.is_empty() && !included_tags.iter().any(|t| fact.has_tag(t)) {
        return false;
    }
    if let Some(wanted) = media_covered {
        if has_media_coverage(fact) != wanted {
            return false;
        }
    }
    true
}

/// A fact has coverage when it records a coverage date or any `coverage:` tag.
pub fn has_media_coverage(fact: &Fact) -> bool {
    fact.metadata.media_coverage_date.is_some()
        || fact.tags.iter().any(|t| t.starts_with("coverage:"))
}

/// Delay between an event and its first media coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoverageGap {
    /// Gap in seconds, never negative.
    pub seconds: i64,
    /// Coverage was dated before the event itself.
    pub inverted: bool,
}

/// Compute the coverage gap of a fact, if it has a coverage date.
pub fn coverage_gap(fact: &Fact) -> Option<CoverageGap> {
    let covered_at = fact.metadata.media_coverage_date?;
    let raw = covered_at - fact.timestamp;
    Some(CoverageGap {
        seconds: raw.max(0),
        inverted: raw < 0,
    })
}

/// Render a duration in seconds as a coarse human-readable span.
pub fn format_time_gap(seconds: i64) -> String {
    let days = seconds.max(0) / SECONDS_PER_DAY;
    let months = days / 30;
    let years = days / 365;

    if years > 0 {
        plural(years, "year")
    } else if months > 0 {
        plural(months, "month")
    } else if days > 0 {
        plural(days, "day")
    } else {
        "immediate".to_string()
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Ad-hoc query over a fact collection. Every criterion that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactQuery {
    #[serde(default)]
    pub start_date: Option<i64>,
    #[serde(default)]
    pub end_date: Option<i64>,
    /// Matches facts carrying any of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub importance: Option<Importance>,
    #[serde(default)]
    pub verification_status: Option<VerificationStatus>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub has_media_coverage: Option<bool>,
}

impl FactQuery {
    pub fn matches(&self, fact: &Fact) -> bool {
        if self.start_date.is_some_and(|start| fact.timestamp < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| fact.timestamp > end) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| fact.has_tag(t)) {
            return false;
        }
        if self.importance.is_some_and(|i| fact.metadata.importance != i) {
            return false;
        }
        if self
            .verification_status
            .is_some_and(|s| fact.metadata.verification_status != s)
        {
            return false;
        }
        if let Some(thread) = &self.thread_id {
            if &fact.metadata.thread_id != thread {
                return false;
            }
        }
        if self
            .has_media_coverage
            .is_some_and(|wanted| has_media_coverage(fact) != wanted)
        {
            return false;
        }
        true
    }

    /// Apply the query, preserving input order.
    pub fn apply(&self, facts: &[Arc<Fact>]) -> Vec<Arc<Fact>> {
        facts.iter().filter(|f| self.matches(f)).cloned().collect()
    }
}
