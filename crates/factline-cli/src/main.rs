//! Factline CLI — entry point.

use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::de::DeserializeOwned;
use serde::Serialize;

use factline::{classify, FactQuery, FactStore, Importance, VerificationStatus, SECONDS_PER_DAY};
use factline_cli::config::{load_engine_config, resolve_data_dir, EngineConfig};
use factline_cli::session::{LaneSpec, WorkspaceSession};

#[derive(Parser)]
#[command(
    name = "factline",
    about = "Multi-lane timeline engine — filter, lay out, and correlate sourced facts",
    version
)]
struct Cli {
    /// Fact data directory.
    #[arg(short, long, global = true)]
    data: Option<String>,

    /// Engine config file (JSON with "layout" and "correlation" sections).
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LaneArgs {
    /// Lane as `timeline[=tag,!excluded,...]`. Repeat for more lanes.
    #[arg(short, long = "lane")]
    lanes: Vec<LaneSpec>,

    /// Lane configuration file, as written by `lanes export`.
    #[arg(long, conflicts_with = "lanes")]
    lanes_file: Option<PathBuf>,

    /// Keep only facts with (true) or without (false) media coverage.
    #[arg(long)]
    covered: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every fact document in the data directory.
    Validate,

    /// Print loaded timelines as JSON.
    Info,

    /// Print tag usage of a timeline.
    Tags {
        /// Timeline ID.
        timeline: String,
    },

    /// Query facts of a timeline.
    Query {
        /// Timeline ID.
        timeline: String,

        /// Earliest timestamp (epoch seconds).
        #[arg(long)]
        from: Option<i64>,

        /// Latest timestamp (epoch seconds).
        #[arg(long)]
        to: Option<i64>,

        /// Match facts carrying any of these tags.
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// low, medium, or high.
        #[arg(long, value_parser = parse_enum::<Importance>)]
        importance: Option<Importance>,

        /// pending, confirmed, or disputed.
        #[arg(long, value_parser = parse_enum::<VerificationStatus>)]
        status: Option<VerificationStatus>,

        /// Thread ID.
        #[arg(long)]
        thread: Option<String>,

        #[arg(long)]
        covered: Option<bool>,
    },

    /// Lay out lanes and print positions, markers, and silence gaps.
    Layout {
        #[command(flatten)]
        lanes: LaneArgs,

        #[arg(long)]
        pixels_per_year: Option<f64>,

        #[arg(long)]
        min_gap: Option<f64>,
    },

    /// Find correlations between lanes.
    Correlate {
        #[command(flatten)]
        lanes: LaneArgs,

        /// Maximum distance in days for temporal correlations.
        #[arg(long)]
        max_delta_days: Option<i64>,

        /// Also link facts sharing a thread ID.
        #[arg(long)]
        threads: bool,
    },

    /// Export or import lane configurations.
    Lanes {
        #[command(subcommand)]
        action: LanesAction,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   factline completions bash > ~/.local/share/bash-completion/completions/factline
    ///   factline completions zsh > ~/.zfunc/_factline
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },

    /// Launch interactive REPL mode.
    Repl,
}

#[derive(Subcommand)]
enum LanesAction {
    /// Write a lane configuration document.
    Export {
        #[arg(short, long = "lane")]
        lanes: Vec<LaneSpec>,

        /// Output file (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a lane configuration document against the loaded timelines.
    Import {
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = resolve_data_dir(cli.data.as_deref());
    let mut config = load_engine_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate => {
            let (store, report) = FactStore::load_dir(&data_dir)?;
            println!("Data directory: {}", data_dir.display());
            println!("  Timelines: {}", store.count());
            println!("  Facts:     {}", report.loaded);
            println!("  Rejected:  {}", report.rejected);
            for rejection in &report.rejections {
                println!("    {rejection}");
            }
            if report.rejected > 0 {
                std::process::exit(1);
            }
        }

        Commands::Info => {
            let session = WorkspaceSession::open(&data_dir, config)?;
            let info = serde_json::json!({
                "dataDir": data_dir.display().to_string(),
                "timelines": session.summaries(),
                "loaded": session.report().loaded,
                "rejected": session.report().rejected,
            });
            print_json(&info)?;
        }

        Commands::Tags { timeline } => {
            let session = WorkspaceSession::open(&data_dir, config)?;
            let tags: Vec<_> = session
                .tag_counts(&timeline)?
                .into_iter()
                .map(|(tag, count)| {
                    serde_json::json!({ "tag": tag, "count": count, "info": classify(&tag) })
                })
                .collect();
            print_json(&tags)?;
        }

        Commands::Query {
            timeline,
            from,
            to,
            tags,
            importance,
            status,
            thread,
            covered,
        } => {
            let session = WorkspaceSession::open(&data_dir, config)?;
            let query = FactQuery {
                start_date: from,
                end_date: to,
                tags,
                importance,
                verification_status: status,
                thread_id: thread,
                has_media_coverage: covered,
            };
            print_json(&session.query(&timeline, &query)?)?;
        }

        Commands::Layout {
            lanes,
            pixels_per_year,
            min_gap,
        } => {
            if let Some(ppy) = pixels_per_year {
                config.layout.pixels_per_year = ppy;
            }
            if let Some(gap) = min_gap {
                config.layout.min_gap_px = gap;
            }
            let mut session = open_with_lanes(&data_dir, config, &lanes)?;
            print_json(&session.visible_lane_views()?)?;
        }

        Commands::Correlate {
            lanes,
            max_delta_days,
            threads,
        } => {
            if let Some(days) = max_delta_days {
                config.correlation.max_delta_seconds = days * SECONDS_PER_DAY;
            }
            config.correlation.link_threads |= threads;
            let mut session = open_with_lanes(&data_dir, config, &lanes)?;
            print_json(&*session.correlations()?)?;
        }

        Commands::Lanes { action } => match action {
            LanesAction::Export { lanes, output } => {
                let mut session = WorkspaceSession::open(&data_dir, config)?;
                session.apply_lane_specs(&lanes)?;
                let json = session.export_lanes()?;
                match output {
                    Some(path) => {
                        std::fs::write(&path, json)?;
                        eprintln!("Lane config written to {}", path.display());
                    }
                    None => println!("{json}"),
                }
            }
            LanesAction::Import { file } => {
                let mut session = WorkspaceSession::open(&data_dir, config)?;
                let count = session.import_lanes_file(&file)?;
                eprintln!("Valid lane config: {count} lanes");
                println!("{}", session.export_lanes()?);
            }
        },

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "factline", &mut std::io::stdout());
        }

        Commands::Repl => {
            factline_cli::repl::run(&data_dir, config)?;
        }
    }

    Ok(())
}

fn open_with_lanes(
    data_dir: &Path,
    config: EngineConfig,
    args: &LaneArgs,
) -> anyhow::Result<WorkspaceSession> {
    let mut session = WorkspaceSession::open(data_dir, config)?;
    session.set_media_covered(args.covered);
    if let Some(path) = &args.lanes_file {
        session.import_lanes_file(path)?;
    } else {
        session.apply_lane_specs(&args.lanes)?;
    }
    Ok(session)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_enum<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase())).map_err(|e| e.to_string())
}
