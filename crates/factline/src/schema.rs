//! Load-time validation of fact and timeline records.
//!
//! Structural problems (missing fields, wrong types, unknown enum values)
//! surface from serde. Semantic rules are then checked field by field and
//! every violation of a record is reported together.

use chrono::DateTime;
use serde_json::Value;

use crate::types::{Fact, FactlineError, FactlineResult, Timeline};

/// Maximum title length in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Parse and validate one raw fact document.
pub fn validate_fact(raw: &Value) -> FactlineResult<Fact> {
    let record = raw
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();

    let fact: Fact = serde_json::from_value(raw.clone()).map_err(|e| FactlineError::Schema {
        record: record.clone(),
        issues: vec![e.to_string()],
    })?;

    let issues = fact_issues(&fact);
    if issues.is_empty() {
        Ok(fact)
    } else {
        Err(FactlineError::Schema { record, issues })
    }
}

/// Semantic rule violations of an already-parsed fact, as `field: message`.
pub fn fact_issues(fact: &Fact) -> Vec<String> {
    let mut issues = Vec::new();
    let mut check = |ok: bool, field: &str, message: &str| {
        if !ok {
            issues.push(format!("{field}: {message}"));
        }
    };

    check(is_uuid(&fact.id), "id", "must be a UUID");
    check(fact.timestamp > 0, "timestamp", "must be a positive integer");
    check(!fact.date_label.is_empty(), "dateLabel", "must not be empty");
    check(!fact.title.is_empty(), "title", "must not be empty");
    check(
        fact.title.chars().count() <= MAX_TITLE_CHARS,
        "title",
        "must not exceed 200 characters",
    );
    check(!fact.content.is_empty(), "content", "must not be empty");
    check(!fact.tags.is_empty(), "tags", "at least one tag is required");

    let source = &fact.source;
    check(!source.name.is_empty(), "source.name", "is required");
    check(is_url(&source.url), "source.url", "must be a valid URL");
    check(
        (0.0..=1.0).contains(&source.reliability_score),
        "source.reliabilityScore",
        "must be between 0 and 1",
    );
    check(
        DateTime::parse_from_rfc3339(&source.accessed_at).is_ok(),
        "source.accessedAt",
        "must be an ISO 8601 date-time",
    );

    let meta = &fact.metadata;
    check(!meta.thread_id.is_empty(), "metadata.threadId", "is required");
    check(
        meta.cross_references.iter().all(|r| is_uuid(r)),
        "metadata.crossReferences",
        "entries must be UUIDs",
    );
    check(
        meta.media_coverage_date.map_or(true, |d| d > 0),
        "metadata.mediaCoverageDate",
        "must be a positive integer",
    );

    check(
        fact.relevance_score.map_or(true, |s| s <= 100),
        "relevanceScore",
        "must be between 0 and 100",
    );
    check(
        fact.public_awareness
            .as_ref()
            .map_or(true, |p| p.level <= 100),
        "publicAwareness.level",
        "must be between 0 and 100",
    );

    issues
}

/// Rule violations of a timeline's descriptive fields.
pub fn timeline_issues(timeline: &Timeline) -> Vec<String> {
    let mut issues = Vec::new();
    if timeline.id.is_empty() {
        issues.push("id: must not be empty".to_string());
    }
    if timeline.name.is_empty() {
        issues.push("name: must not be empty".to_string());
    }
    if !is_hex_color(&timeline.color) {
        issues.push("color: must be a #RRGGBB hex color".to_string());
    }
    issues
}

/// `#RRGGBB`
pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn is_uuid(s: &str) -> bool {
    uuid::Uuid::try_parse(s).is_ok()
}

fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok_and(|u| u.has_host())
}
