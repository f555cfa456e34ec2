use crate::commands::{self, IngestCommand, StoreOptions, SweepCommand};
use crate::config::MAX_RETENTION_DAYS;
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "eventpulse", version)]
#[command(
    about = "Ingest, deduplicate and clean up scraped event records",
    long_about = "eventpulse validates incoming event records, suppresses duplicates by natural key, stores the rest, and runs corrective sweeps over stored records."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "Examples:
  eventpulse ingest events.json
  scraper | eventpulse ingest - --log ingest.ndjson
  eventpulse sweep stale --dry-run
  eventpulse sweep keyword sample \"test event\"
  eventpulse sweep keyword sample --apply
  eventpulse duplicates
  eventpulse completion zsh > ~/.zsh/completions/_eventpulse")]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Directory holding .eventpulse/config.toml (default: current dir)"
    )]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Ingest one candidate or a batch from a JSON file",
        long_about = "Ingest candidates from a JSON file (or `-` for stdin). A JSON object is a single candidate; an array or an {\"events\": [...]} envelope is a batch processed in order."
    )]
    #[command(arg_required_else_help = true)]
    Ingest {
        #[arg(value_name = "FILE", help = "JSON input file, or `-` for stdin")]
        input: PathBuf,
        #[arg(
            long,
            value_name = "PATH",
            help = "Path to event DB (default: $XDG_STATE_HOME/eventpulse/events.db)"
        )]
        state_db: Option<PathBuf>,
        #[arg(long, value_name = "PATH", help = "Append per-candidate outcomes as NDJSON")]
        log: Option<PathBuf>,
    },
    #[command(about = "Run a corrective sweep over stored records")]
    #[command(arg_required_else_help = true)]
    Sweep {
        #[arg(
            long,
            global = true,
            value_name = "PATH",
            help = "Path to event DB (default: $XDG_STATE_HOME/eventpulse/events.db)"
        )]
        state_db: Option<PathBuf>,
        #[command(subcommand)]
        target: SweepTarget,
    },
    #[command(about = "List natural-key groups with more than one stored record")]
    Duplicates {
        #[arg(long, value_name = "PATH", help = "Path to event DB")]
        state_db: Option<PathBuf>,
    },
    #[command(about = "Summarize stored records by type and upcoming count")]
    Status {
        #[arg(long, value_name = "PATH", help = "Path to event DB")]
        state_db: Option<PathBuf>,
    },
    #[command(
        about = "Generate shell completion script",
        long_about = "Generate shell completion script for your shell. Redirect output to your shell completion directory."
    )]
    #[command(arg_required_else_help = true)]
    Completion {
        #[arg(value_enum, value_name = "SHELL", help = "Target shell")]
        shell: Shell,
    },
    #[command(about = "Generate a man page")]
    Man {
        #[arg(
            long,
            value_name = "PATH",
            help = "Write man page to file (stdout when omitted)"
        )]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum SweepTarget {
    #[command(about = "Delete records that started before the retention window")]
    Stale {
        #[arg(
            long,
            value_name = "N",
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_RETENTION_DAYS)),
            help = "Retention window in days (overrides config)"
        )]
        days: Option<u32>,
        #[arg(long, help = "Report matches without deleting")]
        dry_run: bool,
    },
    #[command(about = "Delete records that fail the current date and coordinate rules")]
    Invalid {
        #[arg(long, help = "Report matches without deleting")]
        dry_run: bool,
    },
    #[command(
        about = "Delete records whose title or description contains a keyword",
        long_about = "Match records whose title or description contains any keyword (case-insensitive). Runs as a dry run unless --apply is given. Keywords default to [maintenance].keywords."
    )]
    Keyword {
        #[arg(value_name = "KEYWORD")]
        keywords: Vec<String>,
        #[arg(long, help = "Actually delete the matched records")]
        apply: bool,
    },
    #[command(about = "Collapse natural-key duplicates, keeping the lowest id")]
    Duplicates {
        #[arg(long, help = "Report matches without deleting")]
        dry_run: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = cli.root.unwrap_or_else(|| PathBuf::from("."));
    match cli.command {
        Commands::Ingest {
            input,
            state_db,
            log,
        } => {
            let out = commands::execute_ingest(IngestCommand {
                input,
                store: StoreOptions { root, state_db },
                log,
            })?;
            print_json(&out)
        }
        Commands::Sweep { state_db, target } => {
            let sweep = match target {
                SweepTarget::Stale { days, dry_run } => SweepCommand::Stale { days, dry_run },
                SweepTarget::Invalid { dry_run } => SweepCommand::Invalid { dry_run },
                SweepTarget::Keyword { keywords, apply } => SweepCommand::Keyword { keywords, apply },
                SweepTarget::Duplicates { dry_run } => SweepCommand::Duplicates { dry_run },
            };
            let report = commands::execute_sweep(&StoreOptions { root, state_db }, sweep)?;
            print_json(&report)
        }
        Commands::Duplicates { state_db } => {
            let groups = commands::list_duplicates(&StoreOptions { root, state_db })?;
            print_json(&serde_json::json!({
                "duplicate_groups": groups,
                "total_duplicate_groups": groups.len()
            }))
        }
        Commands::Status { state_db } => {
            print_json(&commands::summarize_store(&StoreOptions { root, state_db })?)
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Man { output } => {
            let man = clap_mangen::Man::new(Cli::command());
            match output {
                Some(path) => {
                    let mut bytes = Vec::new();
                    man.render(&mut bytes)?;
                    fs::write(path, bytes)?;
                }
                None => {
                    man.render(&mut io::stdout())?;
                }
            }
            Ok(())
        }
    }
}
