//! args.rs
//!
//! command line for the stock_events binary

use std::fmt;
use common_lib::event_generator::Rate;

pub const USAGE: &str = "\
usage:
    stock_events generate --rate <ops_per_sec> [--dry-run]
    stock_events load --record-count <n> [--dry-run]

    generate       continuously insert/update/delete random trades until Ctrl-C
    load           bulk insert <n> random trades and exit
    --dry-run      use an in-memory store instead of Postgres";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Generate { rate: Rate, dry_run: bool },
    Load { record_count: usize, dry_run: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgsError {
    Help,
    UnknownCommand(String),
    UnknownFlag(String),
    MissingValue(&'static str),
    Missing(&'static str),
    Invalid { flag: &'static str, value: String, reason: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::Help => write!(f, "{}", USAGE),
            ArgsError::UnknownCommand(c) => write!(f, "unknown command: {}", c),
            ArgsError::UnknownFlag(flag) => write!(f, "unknown argument: {}", flag),
            ArgsError::MissingValue(flag) => write!(f, "{} needs a value", flag),
            ArgsError::Missing(flag) => write!(f, "{} is required", flag),
            ArgsError::Invalid { flag, value, reason } => write!(f, "invalid {} '{}': {}", flag, value, reason),
        }
    }
}

impl std::error::Error for ArgsError {}

/// `args` excludes the program name. With no subcommand, flags are read as `generate`.
pub fn parse_args<I>(args: I) -> Result<Command, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().peekable();

    let command = match args.peek().map(|s| s.as_str()) {
        Some("generate") | Some("load") => args.next(),
        Some("-h") | Some("--help") | Some("help") => return Err(ArgsError::Help),
        Some(other) if !other.starts_with('-') => return Err(ArgsError::UnknownCommand(other.to_string())),
        _ => None,
    };

    let mut rate: Option<String> = None;
    let mut record_count: Option<String> = None;
    let mut dry_run = false;

    while let Some(arg) = args.next() {
        // accept both `--rate 2` and `--rate=2`
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg.clone(), None),
        };
        match flag.as_str() {
            "--rate" => rate = Some(value_of(inline, &mut args, "--rate")?),
            "--record-count" => record_count = Some(value_of(inline, &mut args, "--record-count")?),
            "--dry-run" => dry_run = true,
            "-h" | "--help" => return Err(ArgsError::Help),
            _ => return Err(ArgsError::UnknownFlag(flag)),
        }
    }

    match command.as_deref() {
        Some("load") => {
            if rate.is_some() {
                return Err(ArgsError::UnknownFlag("--rate".to_string()));
            }
            let value = record_count.ok_or(ArgsError::Missing("--record-count"))?;
            let record_count = value.parse::<usize>().map_err(|e| ArgsError::Invalid {
                flag: "--record-count",
                value: value.clone(),
                reason: e.to_string(),
            })?;
            Ok(Command::Load { record_count, dry_run })
        }
        _ => {
            if record_count.is_some() {
                return Err(ArgsError::UnknownFlag("--record-count".to_string()));
            }
            let value = rate.ok_or(ArgsError::Missing("--rate"))?;
            let ops = value.parse::<f64>().map_err(|e| ArgsError::Invalid {
                flag: "--rate",
                value: value.clone(),
                reason: e.to_string(),
            })?;
            let rate = Rate::new(ops).map_err(|e| ArgsError::Invalid {
                flag: "--rate",
                value: value.clone(),
                reason: e.to_string(),
            })?;
            Ok(Command::Generate { rate, dry_run })
        }
    }
}

fn value_of<I>(inline: Option<String>, args: &mut I, flag: &'static str) -> Result<String, ArgsError>
where
    I: Iterator<Item = String>,
{
    match inline {
        Some(v) => Ok(v),
        None => args.next().ok_or(ArgsError::MissingValue(flag)),
    }
}
