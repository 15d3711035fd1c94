//! Fact store: timelines loaded once from JSON documents on disk.
//!
//! A data directory holds one sub-directory per timeline:
//!
//! ```text
//! facts/
//!   ai-evolution/
//!     timeline.json        optional manifest (name, color, categories, ...)
//!     001-gpt1-2018.json   one fact per document
//!     002-gpt2-2019.json
//!   epstein.json           a whole timeline with an embedded "facts" array
//! ```
//!
//! Malformed facts are skipped with a warning and never reach the engine.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::coverage_gap;
use crate::schema::{timeline_issues, validate_fact};
use crate::types::{FactlineError, FactlineResult, Timeline, TimelineCategory};

/// Manifest file name inside a timeline directory.
pub const MANIFEST_FILE: &str = "timeline.json";

const DEFAULT_TIMELINE_COLOR: &str = "#6366f1";

/// Outcome of a load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub timelines: usize,
    pub loaded: usize,
    pub rejected: usize,
    /// One line per rejected record.
    pub rejections: Vec<String>,
}

impl LoadReport {
    fn reject(&mut self, what: String) {
        tracing::warn!("Rejected {what}");
        self.rejected += 1;
        self.rejections.push(what);
    }

    fn merge(&mut self, other: LoadReport) {
        self.timelines += other.timelines;
        self.loaded += other.loaded;
        self.rejected += other.rejected;
        self.rejections.extend(other.rejections);
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineManifest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    categories: Vec<TimelineCategory>,
    #[serde(default)]
    available_tags: Vec<String>,
}

impl TimelineManifest {
    fn into_timeline(self, fallback_id: &str) -> Timeline {
        let id = self.id.unwrap_or_else(|| fallback_id.to_string());
        Timeline {
            name: self.name.unwrap_or_else(|| id.clone()),
            id,
            description: self.description,
            color: self
                .color
                .unwrap_or_else(|| DEFAULT_TIMELINE_COLOR.to_string()),
            categories: self.categories,
            available_tags: self.available_tags,
            facts: Vec::new(),
        }
    }
}

/// Read-only collection of timelines keyed by ID.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    timelines: BTreeMap<String, Arc<Timeline>>,
    generation: u64,
}

impl FactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every timeline found in a data directory.
    ///
    /// Timelines whose manifest is invalid are skipped like malformed facts.
    /// When two entries claim the same timeline ID the first one wins.
    pub fn load_dir(path: &Path) -> FactlineResult<(Self, LoadReport)> {
        let mut store = Self::new();
        let mut report = LoadReport::default();

        for entry in sorted_entries(path)? {
            let result = if entry.is_dir() {
                load_timeline_dir(&entry)
            } else if is_json(&entry) {
                load_timeline_file(&entry)
            } else {
                continue;
            };

            match result {
                Ok((timeline, _)) if store.contains(&timeline.id) => {
                    report.reject(format!(
                        "timeline {}: duplicate id {}",
                        entry.display(),
                        timeline.id
                    ));
                }
                Ok((timeline, sub)) => {
                    report.merge(sub);
                    store.insert(timeline);
                }
                Err(e) => report.reject(format!("timeline {}: {e}", entry.display())),
            }
        }

        tracing::info!(
            "Loaded {} timelines ({} facts, {} rejected) from {}",
            report.timelines,
            report.loaded,
            report.rejected,
            path.display()
        );
        Ok((store, report))
    }

    /// Add or replace a timeline.
    pub fn insert(&mut self, timeline: Timeline) {
        self.generation += 1;
        self.timelines
            .insert(timeline.id.clone(), Arc::new(timeline));
    }

    /// Get a timeline by ID.
    pub fn get(&self, id: &str) -> Option<&Arc<Timeline>> {
        self.timelines.get(id)
    }

    /// Get a timeline by ID or fail.
    pub fn require(&self, id: &str) -> FactlineResult<&Arc<Timeline>> {
        self.get(id)
            .ok_or_else(|| FactlineError::TimelineNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.timelines.contains_key(id)
    }

    /// Timeline IDs in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.timelines.keys().map(String::as_str)
    }

    pub fn timelines(&self) -> impl Iterator<Item = &Arc<Timeline>> {
        self.timelines.values()
    }

    /// Return the number of timelines.
    pub fn count(&self) -> usize {
        self.timelines.len()
    }

    /// Bumped on every insert; part of derived-value cache keys.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Load a timeline directory: optional manifest plus one document per fact.
pub fn load_timeline_dir(dir: &Path) -> FactlineResult<(Timeline, LoadReport)> {
    let dir_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest: TimelineManifest = if manifest_path.exists() {
        serde_json::from_slice(&std::fs::read(&manifest_path)?)?
    } else {
        TimelineManifest::default()
    };

    let mut raws = Vec::new();
    let mut report = LoadReport::default();
    for path in sorted_entries(dir)? {
        if !is_json(&path) || path == manifest_path {
            continue;
        }
        match read_json(&path) {
            Ok(value) => raws.push((path.display().to_string(), value)),
            Err(e) => report.reject(format!("fact {}: {e}", path.display())),
        }
    }

    let timeline = manifest.into_timeline(&dir_name);
    let (timeline, sub) = build_timeline(timeline, raws)?;
    report.merge(sub);
    Ok((timeline, report))
}

/// Load a single timeline document with an embedded `facts` array.
pub fn load_timeline_file(path: &Path) -> FactlineResult<(Timeline, LoadReport)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let doc = read_json(path)?;
    let manifest: TimelineManifest = serde_json::from_value(doc.clone())?;
    let facts = match doc.get("facts") {
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            return Err(FactlineError::Schema {
                record: stem,
                issues: vec!["facts: must be an array".to_string()],
            })
        }
        None => Vec::new(),
    };

    let raws = facts
        .into_iter()
        .enumerate()
        .map(|(i, v)| (format!("{}#{i}", path.display()), v))
        .collect();
    build_timeline(manifest.into_timeline(&stem), raws)
}

/// Validate raw fact documents into a timeline.
///
/// Invalid and duplicate facts are skipped; an invalid timeline header fails
/// the whole timeline.
pub fn build_timeline(
    mut timeline: Timeline,
    raws: Vec<(String, Value)>,
) -> FactlineResult<(Timeline, LoadReport)> {
    let issues = timeline_issues(&timeline);
    if !issues.is_empty() {
        return Err(FactlineError::Schema {
            record: format!("timeline {}", timeline.id),
            issues,
        });
    }

    let mut report = LoadReport {
        timelines: 1,
        ..LoadReport::default()
    };
    let mut seen = HashSet::new();

    for (origin, raw) in raws {
        let fact = match validate_fact(&raw) {
            Ok(fact) => fact,
            Err(e) => {
                report.reject(format!("fact {origin}: {e}"));
                continue;
            }
        };
        if !seen.insert(fact.id.clone()) {
            report.reject(format!("fact {origin}: duplicate id {}", fact.id));
            continue;
        }
        if coverage_gap(&fact).is_some_and(|g| g.inverted) {
            tracing::warn!(
                "Fact {} in {}: media coverage predates the event",
                fact.id,
                timeline.id
            );
        }
        timeline.facts.push(Arc::new(fact));
        report.loaded += 1;
    }

    tracing::debug!(
        "Timeline {}: {} facts loaded, {} rejected",
        timeline.id,
        report.loaded,
        report.rejected
    );
    Ok((timeline, report))
}

fn sorted_entries(dir: &Path) -> FactlineResult<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    Ok(entries)
}

fn is_json(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == "json")
}

fn read_json(path: &Path) -> FactlineResult<Value> {
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::raw_fact;
    use serde_json::json;

    fn write(path: &Path, value: &Value) {
        std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    }

    #[test]
    fn test_load_dir_skips_invalid_facts() {
        let dir = tempfile::tempdir().unwrap();
        let tl = dir.path().join("ai-evolution");
        std::fs::create_dir(&tl).unwrap();
        write(
            &tl.join(MANIFEST_FILE),
            &json!({ "name": "AI Evolution", "color": "#3b82f6" }),
        );
        write(&tl.join("001.json"), &raw_fact(1, 1_530_000_000, &["category:technology"]));
        write(&tl.join("002.json"), &raw_fact(2, 1_550_000_000, &[]));
        std::fs::write(tl.join("003.json"), b"{ not json").unwrap();

        let (store, report) = FactStore::load_dir(dir.path()).unwrap();
        assert_eq!(report.timelines, 1);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.rejected, 2);

        let timeline = store.require("ai-evolution").unwrap();
        assert_eq!(timeline.name, "AI Evolution");
        assert_eq!(timeline.count(), 1);
    }

    #[test]
    fn test_load_timeline_document() {
        let dir = tempfile::tempdir().unwrap();
        let doc = json!({
            "id": "epstein",
            "name": "Epstein case",
            "color": "#ef4444",
            "facts": [
                raw_fact(1, 1_100_000_000, &["category:justice"]),
                raw_fact(1, 1_200_000_000, &["category:justice"]),
            ]
        });
        write(&dir.path().join("epstein.json"), &doc);

        let (store, report) = FactStore::load_dir(dir.path()).unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.rejected, 1);
        assert!(report.rejections[0].contains("duplicate id"));
        assert!(store.contains("epstein"));
    }

    #[test]
    fn test_duplicate_timeline_id_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        for (name, n) in [("a", 1), ("b", 2)] {
            let tl = dir.path().join(name);
            std::fs::create_dir(&tl).unwrap();
            write(&tl.join(MANIFEST_FILE), &json!({ "id": "same", "name": name }));
            write(&tl.join("001.json"), &raw_fact(n, 1_530_000_000, &[]));
        }

        let (store, report) = FactStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.count(), 1);
        assert_eq!(report.timelines, 1);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.rejected, 1);
        assert!(report.rejections[0].contains("duplicate id same"));

        let timeline = store.require("same").unwrap();
        assert_eq!(timeline.name, "a");
        assert_eq!(timeline.count(), 1);
    }

    #[test]
    fn test_coverage_before_event_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut early = raw_fact(1, 1_530_000_000, &["coverage:mainstream"]);
        early["metadata"]["mediaCoverageDate"] = json!(1_520_000_000);
        write(
            &dir.path().join("press.json"),
            &json!({ "id": "press", "name": "Press", "facts": [early] }),
        );

        let (store, report) = FactStore::load_dir(dir.path()).unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.rejected, 0);

        let fact = &store.require("press").unwrap().facts[0];
        let gap = coverage_gap(fact).unwrap();
        assert!(gap.inverted);
        assert_eq!(gap.seconds, 0);
    }

    #[test]
    fn test_invalid_manifest_rejects_timeline() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("bad.json"),
            &json!({ "id": "bad", "name": "Bad", "color": "bg-red-500", "facts": [] }),
        );

        let (store, report) = FactStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.count(), 0);
        assert_eq!(report.rejected, 1);
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let result = FactStore::load_dir(Path::new("/nonexistent/factline/data"));
        assert!(matches!(result, Err(FactlineError::Io(_))));
    }

    #[test]
    fn test_generation_bumps_on_insert() {
        let mut store = FactStore::new();
        assert_eq!(store.generation(), 0);
        store.insert(Timeline {
            id: "t".to_string(),
            name: "T".to_string(),
            description: String::new(),
            color: "#000000".to_string(),
            categories: Vec::new(),
            available_tags: Vec::new(),
            facts: Vec::new(),
        });
        assert_eq!(store.generation(), 1);
        assert!(matches!(
            store.require("missing"),
            Err(FactlineError::TimelineNotFound(_))
        ));
    }
}
