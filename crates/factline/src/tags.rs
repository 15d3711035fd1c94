//! Tag classification and tag statistics.
//!
//! Tags are `"<namespace>:<value>"` strings. A fixed table of standard tags
//! carries curated labels and colors; any other namespaced tag is treated as
//! a custom tag with a label derived from its value.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::Fact;

/// Color used for tags outside the standard table.
pub const DEFAULT_TAG_COLOR: &str = "#6b7280";

/// Tag namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Source,
    Category,
    Coverage,
    Custom,
}

/// Display information for a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagInfo {
    #[serde(rename = "type")]
    pub tag_type: TagType,
    pub label: String,
    pub color: &'static str,
}

/// (tag, type, label, color)
const STANDARD_TAGS: &[(&str, TagType, &str, &str)] = &[
    ("source:official", TagType::Source, "Official", "#3b82f6"),
    ("source:media", TagType::Source, "Media", "#10b981"),
    ("source:leak", TagType::Source, "Leak", "#f59e0b"),
    ("source:testimony", TagType::Source, "Testimony", "#8b5cf6"),
    ("source:investigation", TagType::Source, "Investigation", "#06b6d4"),
    ("category:justice", TagType::Category, "Justice", "#3b82f6"),
    ("category:elite", TagType::Category, "Elite", "#a855f7"),
    ("category:victims", TagType::Category, "Victims", "#f97316"),
    ("category:network", TagType::Category, "Network", "#8b5cf6"),
    ("category:coverup", TagType::Category, "Cover-up", "#ef4444"),
    ("category:politics", TagType::Category, "Politics", "#6366f1"),
    ("category:crime", TagType::Category, "Crime", "#dc2626"),
    ("category:media", TagType::Category, "Media", "#22c55e"),
    ("category:technology", TagType::Category, "Technology", "#0ea5e9"),
    ("category:economy", TagType::Category, "Economy", "#84cc16"),
    ("category:regulation", TagType::Category, "Regulation", "#f43f5e"),
    ("category:society", TagType::Category, "Society", "#d946ef"),
    ("coverage:mainstream", TagType::Coverage, "Mainstream", "#10b981"),
    ("coverage:independent", TagType::Coverage, "Independent", "#14b8a6"),
    ("coverage:major", TagType::Coverage, "Major coverage", "#059669"),
    ("coverage:delayed", TagType::Coverage, "Delayed", "#f59e0b"),
    ("coverage:suppressed", TagType::Coverage, "Suppressed", "#ef4444"),
    ("coverage:none", TagType::Coverage, "No coverage", "#64748b"),
];

/// Classify a tag into its type, display label, and color.
///
/// Returns `None` for tags without a `namespace:value` shape that are not
/// in the standard table.
pub fn classify(tag: &str) -> Option<TagInfo> {
    if let Some(&(_, tag_type, label, color)) = STANDARD_TAGS.iter().find(|(t, ..)| *t == tag) {
        return Some(TagInfo {
            tag_type,
            label: label.to_string(),
            color,
        });
    }

    let (namespace, value) = tag.split_once(':')?;
    if namespace.is_empty() || value.is_empty() {
        return None;
    }

    Some(TagInfo {
        tag_type: TagType::Custom,
        label: value.replace('-', " "),
        color: DEFAULT_TAG_COLOR,
    })
}

/// Namespace grouping of a tag by its prefix alone.
pub fn namespace_of(tag: &str) -> TagType {
    match tag.split_once(':').map(|(ns, _)| ns) {
        Some("source") => TagType::Source,
        Some("category") => TagType::Category,
        Some("coverage") => TagType::Coverage,
        _ => TagType::Custom,
    }
}

/// Distinct tags of a fact collection grouped by namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagGroups {
    pub source: Vec<String>,
    pub category: Vec<String>,
    pub coverage: Vec<String>,
    pub custom: Vec<String>,
}

/// Group the distinct tags used by `facts` by namespace, each group sorted.
pub fn group_tags(facts: &[Arc<Fact>]) -> TagGroups {
    let distinct: BTreeSet<&str> = facts
        .iter()
        .flat_map(|f| f.tags.iter().map(String::as_str))
        .collect();

    let mut groups = TagGroups::default();
    for tag in distinct {
        let bucket = match namespace_of(tag) {
            TagType::Source => &mut groups.source,
            TagType::Category => &mut groups.category,
            TagType::Coverage => &mut groups.coverage,
            TagType::Custom => &mut groups.custom,
        };
        bucket.push(tag.to_string());
    }
    groups
}

/// Count how many facts carry each tag.
pub fn tag_counts(facts: &[Arc<Fact>]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for fact in facts {
        for tag in &fact.tags {
            *counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fact_with_tags;

    #[test]
    fn test_standard_tag() {
        let info = classify("coverage:suppressed").unwrap();
        assert_eq!(info.tag_type, TagType::Coverage);
        assert_eq!(info.label, "Suppressed");
        assert_eq!(info.color, "#ef4444");
    }

    #[test]
    fn test_custom_tag_label() {
        let info = classify("topic:model-release-cycle").unwrap();
        assert_eq!(info.tag_type, TagType::Custom);
        assert_eq!(info.label, "model release cycle");
        assert_eq!(info.color, DEFAULT_TAG_COLOR);
    }

    #[test]
    fn test_unknown_value_in_known_namespace_is_custom() {
        let info = classify("source:blog").unwrap();
        assert_eq!(info.tag_type, TagType::Custom);
        assert_eq!(info.label, "blog");
    }

    #[test]
    fn test_unclassifiable() {
        assert!(classify("legacy").is_none());
        assert!(classify(":value").is_none());
        assert!(classify("ns:").is_none());
    }

    #[test]
    fn test_split_on_first_colon() {
        let info = classify("a:b:c").unwrap();
        assert_eq!(info.label, "b:c");
    }

    #[test]
    fn test_group_and_count() {
        let facts = vec![
            fact_with_tags("a", 0, &["source:official", "category:justice", "legacy"]),
            fact_with_tags("b", 10, &["source:official", "coverage:delayed"]),
        ];

        let groups = group_tags(&facts);
        assert_eq!(groups.source, vec!["source:official"]);
        assert_eq!(groups.category, vec!["category:justice"]);
        assert_eq!(groups.coverage, vec!["coverage:delayed"]);
        assert_eq!(groups.custom, vec!["legacy"]);

        let counts = tag_counts(&facts);
        assert_eq!(counts["source:official"], 2);
        assert_eq!(counts["legacy"], 1);
    }
}
