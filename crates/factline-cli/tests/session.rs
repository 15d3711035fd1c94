//! End-to-end tests: fact documents on disk through the session, lane store,
//! layout, and correlation.

use std::path::Path;

use serde_json::{json, Value};

use factline::{CorrelationType, FactlineError, SECONDS_PER_DAY};
use factline_cli::config::EngineConfig;
use factline_cli::repl::execute;
use factline_cli::session::{LaneSpec, WorkspaceSession};

// ─────────────────────── helpers ───────────────────────

const Y2007: i64 = 1_167_609_600;

fn uuid(n: u32) -> String {
    format!("00000000-0000-4000-8000-{n:012}")
}

/// Build a valid fact document.
fn fact(n: u32, timestamp: i64, tags: &[&str]) -> Value {
    json!({
        "id": uuid(n),
        "timestamp": timestamp,
        "dateLabel": format!("day {}", timestamp / SECONDS_PER_DAY),
        "title": format!("Fact {n}"),
        "content": "Something happened.",
        "tags": tags,
        "source": {
            "name": "Archive",
            "url": "https://example.org/archive",
            "reliabilityScore": 0.8,
            "accessedAt": "2024-05-01T09:30:00Z"
        },
        "metadata": {
            "importance": "high",
            "threadId": "case",
            "verificationStatus": "confirmed"
        }
    })
}

fn write(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// Two timelines: a directory-style one and a single-document one.
fn data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();

    let epstein = dir.path().join("epstein");
    std::fs::create_dir(&epstein).unwrap();
    write(
        &epstein.join("timeline.json"),
        &json!({ "name": "Epstein case", "color": "#ef4444" }),
    );
    write(
        &epstein.join("001.json"),
        &fact(1, Y2007, &["source:official", "category:justice"]),
    );
    let mut covered = fact(2, Y2007 + 100, &["source:media", "coverage:mainstream"]);
    covered["metadata"]["mediaCoverageDate"] = json!(Y2007 + 100 + 90 * SECONDS_PER_DAY);
    write(&epstein.join("002.json"), &covered);
    write(
        &epstein.join("003.json"),
        &fact(3, Y2007 + 4 * 365 * SECONDS_PER_DAY, &["category:justice", "coverage:suppressed"]),
    );
    let mut broken = fact(4, Y2007, &["category:justice"]);
    broken["source"]["url"] = json!("not a url");
    write(&epstein.join("004.json"), &broken);

    write(
        &dir.path().join("ai-evolution.json"),
        &json!({
            "id": "ai-evolution",
            "name": "AI Evolution",
            "color": "#3b82f6",
            "facts": [
                fact(10, Y2007 + 86_500, &["category:technology"]),
                fact(11, Y2007 + 400 * SECONDS_PER_DAY, &["category:technology"]),
            ]
        }),
    );

    dir
}

fn open(dir: &tempfile::TempDir) -> WorkspaceSession {
    WorkspaceSession::open(dir.path(), EngineConfig::default()).unwrap()
}

fn specs(list: &[&str]) -> Vec<LaneSpec> {
    list.iter().map(|s| s.parse().unwrap()).collect()
}

// ─────────────────────── loading ───────────────────────

#[test]
fn test_invalid_facts_are_skipped() {
    let dir = data_dir();
    let session = open(&dir);

    assert_eq!(session.report().timelines, 2);
    assert_eq!(session.report().loaded, 5);
    assert_eq!(session.report().rejected, 1);
    assert!(session.report().rejections[0].contains("source.url"));

    let summaries = session.summaries();
    let ids: Vec<_> = summaries.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["ai-evolution", "epstein"]);
    assert_eq!(summaries[1].facts, 3);
    assert_eq!(summaries[1].tags.coverage, vec!["coverage:mainstream", "coverage:suppressed"]);
}

#[test]
fn test_empty_data_dir_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(WorkspaceSession::open(dir.path(), EngineConfig::default()).is_err());
}

// ─────────────────────── layout ───────────────────────

#[test]
fn test_lane_layout_respects_min_gap() {
    let dir = data_dir();
    let mut session = open(&dir);
    session.apply_lane_specs(&specs(&["epstein"])).unwrap();

    let views = session.visible_lane_views().unwrap();
    assert_eq!(views.len(), 1);
    let layout = &views[0].layout;
    assert_eq!(layout.positioned.len(), 3);

    let config = EngineConfig::default().layout;
    for pair in layout.positioned.windows(2) {
        assert!(pair[1].position - pair[0].position >= config.min_gap_px);
    }
    assert_eq!(layout.positioned[0].position, config.base_padding);
    // Four quiet years between the second and third fact.
    assert_eq!(layout.gaps.len(), 1);
    assert_eq!(layout.gaps[0].years, 4);
}

#[test]
fn test_exclusion_takes_precedence_in_lane() {
    let dir = data_dir();
    let mut session = open(&dir);
    session
        .apply_lane_specs(&specs(&["epstein=category:justice,!coverage:suppressed"]))
        .unwrap();

    let views = session.visible_lane_views().unwrap();
    let ids: Vec<_> = views[0].facts.iter().map(|f| f.id.clone()).collect();
    assert_eq!(ids, vec![uuid(1)]);
    assert_eq!(views[0].total_count, 3);
}

// ─────────────────────── correlation ───────────────────────

#[test]
fn test_correlations_between_timelines() {
    let dir = data_dir();
    let mut session = open(&dir);
    session
        .apply_lane_specs(&specs(&["epstein=source:official,source:media", "ai-evolution"]))
        .unwrap();

    let view = session.correlations().unwrap();
    let temporal: Vec<_> = view
        .correlations
        .iter()
        .filter(|c| c.kind == CorrelationType::Temporal)
        .collect();
    // Y2007 and Y2007+100 are each within 30 days of Y2007+86500.
    assert_eq!(temporal.len(), 2);

    let gaps: Vec<_> = view
        .correlations
        .iter()
        .filter(|c| c.kind == CorrelationType::CoverageGap)
        .collect();
    // The covered fact against both uncovered facts of the other lane.
    assert_eq!(gaps.len(), 2);
    assert!(gaps.iter().all(|c| c.time_gap == Some(90 * SECONDS_PER_DAY)));
    assert!(gaps.iter().all(|c| c.strength == 0.8));

    assert!(view
        .correlations
        .windows(2)
        .all(|w| w[0].strength >= w[1].strength));
}

// ─────────────────────── lane config ───────────────────────

#[test]
fn test_lane_config_round_trip_through_file() {
    let dir = data_dir();
    let mut session = open(&dir);
    session
        .apply_lane_specs(&specs(&["epstein=category:justice,!coverage:suppressed", "ai-evolution"]))
        .unwrap();
    let exported = session.export_lanes().unwrap();
    let path = dir.path().join("lanes.out");
    std::fs::write(&path, &exported).unwrap();

    let mut other = open(&dir);
    assert_eq!(other.import_lanes_file(&path).unwrap(), 2);
    assert_eq!(other.export_lanes().unwrap(), exported);
    assert_ne!(other.lanes().lanes()[0].id, session.lanes().lanes()[0].id);
}

#[test]
fn test_unknown_timeline_import_changes_nothing() {
    let dir = data_dir();
    let mut session = open(&dir);
    let before = session.export_lanes().unwrap();

    let path = dir.path().join("bad-lanes.out");
    std::fs::write(
        &path,
        r#"{"version":"1.0","lanes":[{"name":"x","timelineId":"moon-landing"}]}"#,
    )
    .unwrap();

    let err = session.import_lanes_file(&path).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FactlineError>(),
        Some(FactlineError::UnknownTimeline(_))
    ));
    assert_eq!(session.export_lanes().unwrap(), before);
}

#[test]
fn test_too_many_lane_specs() {
    let dir = data_dir();
    let mut session = open(&dir);
    let five = specs(&["epstein", "epstein", "epstein", "epstein", "ai-evolution"]);
    assert!(session.apply_lane_specs(&five).is_err());
    assert_eq!(session.lanes().lane_count(), 1);
}

#[test]
fn test_unknown_timeline_lane_leaves_views_intact() {
    let dir = data_dir();
    let mut session = open(&dir);
    session.lanes_mut().add_lane("moon-landing");
    assert_eq!(session.lanes().lane_count(), 1);

    session.lanes_mut().add_lane("epstein");
    assert_eq!(session.visible_lane_views().unwrap().len(), 2);
    assert!(session.correlations().is_ok());
}

// ─────────────────────── repl commands ───────────────────────

#[test]
fn test_repl_commands_drive_lane_store() {
    let dir = data_dir();
    let mut session = open(&dir);

    execute(&mut session, "add", "epstein").unwrap();
    assert_eq!(session.lanes().lane_count(), 2);

    execute(&mut session, "include", "2 category:justice").unwrap();
    execute(&mut session, "exclude", "2 coverage:suppressed").unwrap();
    let lane = &session.lanes().lanes()[1];
    assert_eq!(lane.included_tags, vec!["category:justice"]);
    assert_eq!(lane.excluded_tags, vec!["coverage:suppressed"]);

    execute(&mut session, "hide", "1").unwrap();
    assert_eq!(session.lanes().visible_lanes().count(), 1);

    assert!(execute(&mut session, "add", "moon-landing").is_err());
    assert!(execute(&mut session, "rm", "9").is_err());

    execute(&mut session, "rm", "1").unwrap();
    assert!(execute(&mut session, "rm", "1").is_err());
    assert_eq!(session.lanes().lane_count(), 1);

    execute(&mut session, "reset", "").unwrap();
    assert!(session.lanes().lanes()[0].included_tags.is_empty());
}

#[test]
fn test_repl_coverage_filter() {
    let dir = data_dir();
    let mut session = open(&dir);
    execute(&mut session, "reset", "").unwrap();
    let lane = factline::LaneConfig {
        timeline_id: "epstein".to_string(),
        ..session.lanes().lanes()[0].clone()
    };
    let first = lane.id.clone();
    session.lanes_mut().update_lane(lane).unwrap();

    execute(&mut session, "covered", "yes").unwrap();
    let view = session.lane_view(&first).unwrap();
    assert_eq!(view.filtered_count, 2);

    execute(&mut session, "covered", "no").unwrap();
    let view = session.lane_view(&first).unwrap();
    assert_eq!(view.filtered_count, 1);

    assert!(execute(&mut session, "covered", "maybe").is_err());
}
