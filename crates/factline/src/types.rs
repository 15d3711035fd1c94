//! Core data types for facts, timelines, and derived layout/correlation output.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Seconds in a fixed 365.25-day year.
pub const SECONDS_PER_YEAR: f64 = 365.25 * SECONDS_PER_DAY as f64;

/// One immutable timeline event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub id: String,
    /// Seconds since the Unix epoch. The only ordering key.
    pub timestamp: i64,
    /// Human-readable rendering of `timestamp`, supplied by the data producer.
    pub date_label: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Legacy free-form categories, superseded by namespaced tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    pub source: FactSource,
    pub metadata: FactMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_awareness: Option<PublicAwareness>,
}

impl Fact {
    /// Whether the fact carries `tag` exactly.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether this fact lists `other_id` as a cross-reference.
    pub fn references(&self, other_id: &str) -> bool {
        self.metadata
            .cross_references
            .iter()
            .any(|r| r == other_id)
    }
}

/// Where a fact was sourced from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactSource {
    pub name: String,
    pub url: String,
    pub reliability_score: f64,
    /// RFC 3339 timestamp of when the source was accessed.
    pub accessed_at: String,
}

/// Editorial metadata attached to a fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactMetadata {
    pub importance: Importance,
    pub thread_id: String,
    pub verification_status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cross_references: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_coverage_date: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Confirmed,
    Disputed,
}

/// How visible the event was to the public when it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAwareness {
    pub was_public_at_time: bool,
    pub level: u32,
    pub description: String,
}

/// A display category declared by a timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineCategory {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// A named, colored collection of facts. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub color: String,
    #[serde(default)]
    pub categories: Vec<TimelineCategory>,
    #[serde(default)]
    pub available_tags: Vec<String>,
    #[serde(default)]
    pub facts: Vec<Arc<Fact>>,
}

impl Timeline {
    /// Return the number of facts.
    pub fn count(&self) -> usize {
        self.facts.len()
    }
}

/// A fact placed along the layout axis.
#[derive(Debug, Clone, Serialize)]
pub struct PositionedFact {
    pub fact: Arc<Fact>,
    /// Pixel offset along the layout axis.
    pub position: f64,
    /// Index in time-sorted order.
    pub index: usize,
}

/// Kind of relationship detected between two facts in different lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrelationType {
    Temporal,
    CoverageGap,
    Causal,
    Thematic,
}

impl CorrelationType {
    /// Wire name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "temporal",
            Self::CoverageGap => "coverage-gap",
            Self::Causal => "causal",
            Self::Thematic => "thematic",
        }
    }
}

/// A derived relationship between two facts of different lanes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactCorrelation {
    pub id: String,
    pub fact1_id: String,
    pub lane1_id: String,
    pub fact2_id: String,
    pub lane2_id: String,
    #[serde(rename = "type")]
    pub kind: CorrelationType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_gap: Option<i64>,
    /// Normalized 0-100 position within the shared time range.
    pub position: f64,
    pub strength: f64,
}

/// Inclusive time window in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Map a timestamp onto 0-100 within the range.
    ///
    /// A degenerate range (`end <= start`) places everything at 50.
    pub fn normalized_position(&self, timestamp: i64) -> f64 {
        if self.end <= self.start {
            return 50.0;
        }
        let span = (self.end - self.start) as f64;
        (((timestamp - self.start) as f64 / span) * 100.0).clamp(0.0, 100.0)
    }
}

/// Errors that can occur in the timeline engine.
#[derive(thiserror::Error, Debug)]
pub enum FactlineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Schema violation in {record}: {}", .issues.join("; "))]
    Schema { record: String, issues: Vec<String> },

    #[error("Timeline not found: {0}")]
    TimelineNotFound(String),

    #[error("Lane not found: {0}")]
    LaneNotFound(String),

    #[error("Maximum {max} lanes allowed")]
    LaneLimit { max: usize },

    #[error("Cannot remove the last lane")]
    LastLane,

    #[error("Invalid lane config: {0}")]
    InvalidConfig(String),

    #[error("Unknown timeline in lane config: {0}")]
    UnknownTimeline(String),
}

/// Convenience result type.
pub type FactlineResult<T> = Result<T, FactlineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_position_degenerate_range() {
        let range = TimeRange::new(100, 100);
        assert_eq!(range.normalized_position(100), 50.0);
        assert_eq!(range.normalized_position(0), 50.0);
    }

    #[test]
    fn test_normalized_position_clamps() {
        let range = TimeRange::new(0, 1000);
        assert_eq!(range.normalized_position(500), 50.0);
        assert_eq!(range.normalized_position(-10), 0.0);
        assert_eq!(range.normalized_position(2000), 100.0);
    }

    #[test]
    fn test_correlation_type_wire_names() {
        let json = serde_json::to_string(&CorrelationType::CoverageGap).unwrap();
        assert_eq!(json, "\"coverage-gap\"");

        for kind in [
            CorrelationType::Temporal,
            CorrelationType::CoverageGap,
            CorrelationType::Causal,
            CorrelationType::Thematic,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(format!("{:<12}|", kind.as_str()).len(), 13);
        }
    }
}
