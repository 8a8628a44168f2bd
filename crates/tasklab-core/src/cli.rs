use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::sort::SortColumn;
use crate::status_filter::StatusChoice;

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

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tasklab",
    version,
    about = "Monitor and cancel tasks on a task execution service",
    disable_help_subcommand = true
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

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Login provider id; defaults to the first configured one.
    #[arg(long = "login", global = true)]
    pub login: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List tasks.
    List(ListArgs),
    /// Show one task of the current listing.
    Show {
        uuid: String,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Cancel tasks by id.
    Cancel {
        #[arg(required = true)]
        uuids: Vec<String>,
    },
    /// Cancel every task on the listed page that matches the filters.
    CancelPage(ListArgs),
    /// Print the masked credential in use.
    Whoami,
    /// List configured login providers.
    Providers,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Free-text search, at least `search.min_chars` long.
    #[arg(long = "search", short = 's')]
    pub search: Option<String>,

    /// `all` or one task status.
    #[arg(long = "status", value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<StatusChoice>()))]
    pub status: Option<StatusChoice>,

    /// Sort toggle clicks, applied in order (`uuid`, `submitted_at`).
    #[arg(
        long = "sort",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<SortColumn>()),
        action = ArgAction::Append
    )]
    pub sort: Vec<SortColumn>,

    /// Zero-based page index.
    #[arg(long = "page")]
    pub page: Option<u32>,
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
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli};
    use crate::sort::SortColumn;
    use crate::status_filter::StatusChoice;
    use crate::task::TaskStatus;

    #[test]
    fn parses_list_with_filters() {
        let cli = GlobalCli::try_parse_from([
            "tasklab",
            "-v",
            "--rc",
            "list.page_size=5",
            "list",
            "--search",
            "bwa",
            "--status",
            "running",
            "--sort",
            "submitted_at",
            "--sort",
            "submitted_at",
        ])
        .expect("parse");

        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.rc_overrides[0].key, "list.page_size");
        let Some(Command::List(args)) = cli.command else {
            panic!("expected list command");
        };
        assert_eq!(args.search.as_deref(), Some("bwa"));
        assert_eq!(args.status, Some(StatusChoice::Only(TaskStatus::Running)));
        assert_eq!(args.sort, vec![SortColumn::SubmittedAt, SortColumn::SubmittedAt]);
    }

    #[test]
    fn cancel_requires_an_id() {
        assert!(GlobalCli::try_parse_from(["tasklab", "cancel"]).is_err());
    }
}
