use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::calendar::ViewMode;
use crate::navigation::MAX_STEPS;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

fn parse_view_mode(s: &str) -> anyhow::Result<ViewMode> {
    ViewMode::from_key(s).ok_or_else(|| anyhow!("unknown view '{s}', expected daily, weekly or monthly"))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "daybook",
    version,
    about = "Personal day planner with daily, weekly and monthly calendar views"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rcfile", global = true)]
    pub rcfile: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Greeting, clock and today's tasks.
    Dashboard,
    /// Add a task.
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// YYYY-MM-DD, today, tomorrow or yesterday. Defaults to the selected date.
        #[arg(long)]
        date: Option<String>,
        /// HH:MM, 24h.
        #[arg(long)]
        time: Option<String>,
    },
    /// Change a task's text, date or time.
    Edit {
        reference: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long, conflicts_with = "clear_time")]
        time: Option<String>,
        #[arg(long)]
        clear_time: bool,
    },
    /// Mark a task completed.
    Done(TaskRef),
    /// Mark a task not completed.
    Undone(TaskRef),
    /// Flip a task's completed flag.
    Toggle(TaskRef),
    /// Remove a task.
    Delete(TaskRef),
    /// Tasks on one date.
    List {
        #[arg(long)]
        date: Option<String>,
    },
    /// Tasks per day over an inclusive date range.
    Range { start: String, end: String },
    /// Render the current calendar view.
    Show,
    /// Switch the calendar view.
    View {
        #[arg(value_parser = clap::builder::ValueParser::new(parse_view_mode))]
        mode: ViewMode,
    },
    /// Select a date.
    Select { date: String },
    /// Select today.
    Today,
    /// Step the selected date back by one view period.
    Prev {
        #[arg(
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_STEPS))
        )]
        steps: u32,
    },
    /// Step the selected date forward by one view period.
    Next {
        #[arg(
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_STEPS))
        )]
        steps: u32,
    },
    /// Append tasks from a JSON array export.
    Import { path: PathBuf },
    /// Print all tasks as a JSON array.
    Export,
}

#[derive(Args, Debug, Clone)]
pub struct TaskRef {
    /// List position on the selected date (1-based) or a task id prefix.
    pub reference: String,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
