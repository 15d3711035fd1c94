//! Interactive REPL over one data directory.
//!
//! Launch with `factline repl` to enter interactive mode.
//! Type `/help` for available commands, Tab for completion.
//! Lanes are addressed by their 1-based position or by ID.

use std::path::Path;

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use factline::{format_time_gap, FilterMode};

use crate::config::{home_dir, EngineConfig};
use crate::session::WorkspaceSession;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/timelines", "List loaded timelines"),
    ("/lanes", "Show lanes and view settings"),
    ("/add", "Add a lane: /add <timeline>"),
    ("/dup", "Duplicate a lane: /dup <lane>"),
    ("/rm", "Remove a lane: /rm <lane>"),
    ("/include", "Include a tag: /include <lane> <tag>"),
    ("/exclude", "Exclude a tag: /exclude <lane> <tag>"),
    ("/untag", "Drop a tag from a lane: /untag <lane> <tag>"),
    ("/hide", "Toggle lane visibility: /hide <lane>"),
    ("/active", "Set the active lane: /active <lane>"),
    ("/covered", "Coverage filter: /covered yes|no|any"),
    ("/layout", "Lay out visible lanes"),
    ("/correlate", "Correlate visible lanes"),
    ("/sync", "Toggle scroll sync"),
    ("/links", "Toggle correlation display"),
    ("/export", "Export lanes: /export [file]"),
    ("/import", "Import lanes: /import <file>"),
    ("/reset", "Reset to a single lane"),
    ("/stats", "Show load and cache statistics"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// REPL helper for tab completion.
struct FactlineHelper {
    timelines: Vec<String>,
}

impl Completer for FactlineHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];

        if !input.contains(' ') {
            let matches: Vec<Pair> = COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(input))
                .map(|(cmd, desc)| Pair {
                    display: format!("{cmd:<16} {desc}"),
                    replacement: format!("{cmd} "),
                })
                .collect();
            return Ok((0, matches));
        }

        // Timeline ID completion
        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        if cmd == "/add" {
            let prefix_start = input.len() - args.len();
            let matches: Vec<Pair> = self
                .timelines
                .iter()
                .filter(|t| t.starts_with(args.trim()))
                .map(|t| Pair {
                    display: t.clone(),
                    replacement: format!("{t} "),
                })
                .collect();
            return Ok((prefix_start, matches));
        }

        Ok((pos, Vec::new()))
    }
}

impl Hinter for FactlineHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        if line.starts_with('/') && !line.contains(' ') {
            for (cmd, _) in COMMANDS {
                if cmd.starts_with(line) && *cmd != line {
                    return Some(cmd[line.len()..].to_string());
                }
            }
        }
        None
    }
}

impl Highlighter for FactlineHelper {}
impl Validator for FactlineHelper {}
impl Helper for FactlineHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Run the interactive REPL.
pub fn run(data_dir: &Path, config: EngineConfig) -> anyhow::Result<()> {
    let mut session = WorkspaceSession::open(data_dir, config)?;

    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mfactline v{}\x1b[0m \x1b[90m\u{2014} {} timelines, {} facts\x1b[0m",
        env!("CARGO_PKG_VERSION"),
        session.store().count(),
        session.report().loaded
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(30)
        .build();

    let mut rl: Editor<FactlineHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(rl_config)?;
    rl.set_helper(Some(FactlineHelper {
        timelines: session.store().ids().map(str::to_string).collect(),
    }));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let hist_path = home_dir().join(".factline_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[36mfactline>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let input = line.strip_prefix('/').unwrap_or(line);
                if input.is_empty() {
                    cmd_help();
                    continue;
                }

                let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
                if matches!(cmd, "exit" | "quit") {
                    eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                    break;
                }
                if let Err(e) = execute(&mut session, cmd, args.trim()) {
                    eprintln!("  Error: {e}");
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or(Path::new(".")));
    let _ = rl.save_history(&hist_path);

    Ok(())
}

/// Run one REPL command against the session.
pub fn execute(session: &mut WorkspaceSession, cmd: &str, args: &str) -> anyhow::Result<()> {
    match cmd {
        "help" | "h" | "?" => cmd_help(),
        "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
        "timelines" => cmd_timelines(session),
        "lanes" => cmd_lanes(session),
        "add" => {
            let timeline = first_arg(args, "/add <timeline>")?;
            if !session.lanes().is_known_timeline(timeline) {
                anyhow::bail!("Unknown timeline '{timeline}'");
            }
            let id = session.lanes_mut().add_lane(timeline);
            eprintln!("  Lane {id}");
        }
        "dup" => {
            let lane = resolve_lane(session, first_arg(args, "/dup <lane>")?)?;
            let id = session.lanes_mut().duplicate_lane(&lane)?;
            eprintln!("  Lane {id}");
        }
        "rm" => {
            let lane = resolve_lane(session, first_arg(args, "/rm <lane>")?)?;
            session.lanes_mut().remove_lane(&lane)?;
            session.prune_cache();
        }
        "include" | "exclude" | "untag" => {
            let usage = format!("/{cmd} <lane> <tag>");
            let (lane, tag) = args
                .split_once(' ')
                .ok_or_else(|| anyhow::anyhow!("Usage: {usage}"))?;
            let lane = resolve_lane(session, lane)?;
            let tag = tag.trim();
            let lanes = session.lanes_mut();
            match cmd {
                "include" => lanes.add_tag(&lane, tag, FilterMode::Include)?,
                "exclude" => lanes.add_tag(&lane, tag, FilterMode::Exclude)?,
                _ => lanes.remove_tag(&lane, tag)?,
            }
        }
        "hide" => {
            let lane = resolve_lane(session, first_arg(args, "/hide <lane>")?)?;
            let visible = session.lanes_mut().toggle_visibility(&lane)?;
            eprintln!("  {}", if visible { "Visible" } else { "Hidden" });
        }
        "active" => {
            let lane = resolve_lane(session, first_arg(args, "/active <lane>")?)?;
            session.lanes_mut().set_active_lane(Some(&lane))?;
        }
        "covered" => {
            let value = match args {
                "yes" | "true" => Some(true),
                "no" | "false" => Some(false),
                "any" | "" => None,
                other => anyhow::bail!("Expected yes, no, or any, got '{other}'"),
            };
            session.set_media_covered(value);
        }
        "layout" => cmd_layout(session)?,
        "correlate" => cmd_correlate(session)?,
        "sync" => {
            let on = session.lanes_mut().toggle_scroll_sync();
            eprintln!("  Scroll sync {}", if on { "on" } else { "off" });
        }
        "links" => {
            let on = session.lanes_mut().toggle_correlations();
            eprintln!("  Correlations {}", if on { "shown" } else { "hidden" });
        }
        "export" => {
            let json = session.export_lanes()?;
            if args.is_empty() {
                println!("{json}");
            } else {
                std::fs::write(args, json)?;
                eprintln!("  Written to {args}");
            }
        }
        "import" => {
            let path = first_arg(args, "/import <file>")?;
            let count = session.import_lanes_file(Path::new(path))?;
            session.prune_cache();
            eprintln!("  Imported {count} lanes");
        }
        "reset" => {
            session.lanes_mut().reset();
            session.prune_cache();
        }
        "stats" => cmd_stats(session),
        _ => {
            eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
        }
    }
    Ok(())
}

fn first_arg<'a>(args: &'a str, usage: &str) -> anyhow::Result<&'a str> {
    args.split_whitespace()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Usage: {usage}"))
}

/// Resolve a 1-based lane position or a lane ID.
fn resolve_lane(session: &WorkspaceSession, key: &str) -> anyhow::Result<String> {
    let lanes = session.lanes().lanes();
    let lane = match key.parse::<usize>() {
        Ok(n) if n >= 1 => lanes.get(n - 1),
        _ => lanes.iter().find(|l| l.id == key),
    };
    lane.map(|l| l.id.clone())
        .ok_or_else(|| anyhow::anyhow!("No lane '{key}'"))
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Tip: Tab completion works for commands and timeline IDs.");
    eprintln!();
}

fn cmd_timelines(session: &WorkspaceSession) {
    eprintln!();
    for summary in session.summaries() {
        eprintln!(
            "    {:<20} {:>4} facts  {}",
            summary.id, summary.facts, summary.name
        );
    }
    eprintln!();
}

fn cmd_lanes(session: &WorkspaceSession) {
    let store = session.lanes();
    let active = store.active_lane().map(|l| l.id.as_str());
    eprintln!();
    for (i, lane) in store.lanes().iter().enumerate() {
        let marker = if Some(lane.id.as_str()) == active { "*" } else { " " };
        let hidden = if lane.is_visible { "" } else { " (hidden)" };
        eprintln!(
            "  {marker} {}. {} [{}] {}{hidden}",
            i + 1,
            lane.name,
            lane.timeline_id,
            lane.color
        );
        if !lane.included_tags.is_empty() {
            eprintln!("       + {}", lane.included_tags.join(", "));
        }
        if !lane.excluded_tags.is_empty() {
            eprintln!("       - {}", lane.excluded_tags.join(", "));
        }
    }
    let settings = store.settings();
    eprintln!();
    eprintln!(
        "    Scroll sync: {}  Correlations: {}  Coverage filter: {}",
        on_off(settings.is_scroll_synced),
        on_off(settings.show_correlations),
        match session.media_covered() {
            Some(true) => "covered",
            Some(false) => "uncovered",
            None => "any",
        }
    );
    eprintln!();
}

fn cmd_layout(session: &mut WorkspaceSession) -> anyhow::Result<()> {
    eprintln!();
    for view in session.visible_lane_views()? {
        eprintln!(
            "  {} ({}/{} facts, {:.0}px)",
            view.lane_id, view.filtered_count, view.total_count, view.layout.total_height
        );
        for placed in &view.layout.positioned {
            eprintln!(
                "    {:>8.1}  {:<16} {}",
                placed.position, placed.fact.date_label, placed.fact.title
            );
        }
        for gap in &view.layout.gaps {
            eprintln!("    {:>8.1}  ~ {}", gap.position, gap.label);
        }
    }
    eprintln!();
    Ok(())
}

fn cmd_correlate(session: &mut WorkspaceSession) -> anyhow::Result<()> {
    if !session.settings().show_correlations {
        eprintln!("  Correlations are hidden. Toggle with /links.");
        return Ok(());
    }
    let view = session.correlations()?;
    eprintln!();
    if view.correlations.is_empty() {
        eprintln!("  No correlations.");
    }
    for c in &view.correlations {
        let gap = c.time_gap.map(format_time_gap).unwrap_or_default();
        eprintln!(
            "    {:.2}  {:>5.1}%  {:<12} {} ~ {}  {gap}",
            c.strength,
            c.position,
            c.kind.as_str(),
            c.fact1_id,
            c.fact2_id
        );
    }
    eprintln!();
    Ok(())
}

fn cmd_stats(session: &WorkspaceSession) {
    let report = session.report();
    let cache = session.cache().stats();
    eprintln!();
    eprintln!("  Data:      {}", session.data_dir().display());
    eprintln!("  Timelines: {}", report.timelines);
    eprintln!("  Facts:     {} ({} rejected)", report.loaded, report.rejected);
    eprintln!(
        "  Lanes:     {} (revision {})",
        session.lanes().lane_count(),
        session.lanes().revision()
    );
    eprintln!("  Cache:     {} hits, {} misses", cache.hits, cache.misses);
    eprintln!();
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
