use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use regex::Regex;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::grid::{CalendarViewState, Direction};

/// A Hijri month given as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthArg(pub CalendarViewState);

impl std::str::FromStr for MonthArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = Regex::new(r"^(?P<year>\d{1,4})-(?P<month>\d{1,2})$")
            .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

        let caps = re
            .captures(s.trim())
            .ok_or_else(|| anyhow!("expected hijri month as YYYY-MM, got: {s}"))?;
        let year: i32 = caps["year"].parse()?;
        let month: u32 = caps["month"].parse()?;
        Ok(Self(CalendarViewState::new(year, month)?))
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mahal",
    version,
    about = "Hijri calendar with community observances",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "locale", global = true)]
    pub locale: Option<String>,

    /// Skip the remote religious events lookup.
    #[arg(long = "offline", global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show a Hijri month grid with its annotations.
    Month { month: Option<MonthArg> },

    /// Show today's date in both calendars.
    Today,

    /// Convert a date between calendars.
    Convert {
        date: String,

        /// Treat DATE as Hijri and convert to Gregorian.
        #[arg(long)]
        hijri: bool,
    },

    /// Step through months interactively (n, p, t, q on stdin).
    Browse { month: Option<MonthArg> },
}

impl GlobalCli {
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Month { month: None })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseInput {
    Navigate(Direction),
    Today,
    Quit,
}

pub fn parse_browse_input(line: &str) -> Option<BrowseInput> {
    match line.trim().to_ascii_lowercase().as_str() {
        "n" | "next" | ">" => Some(BrowseInput::Navigate(Direction::Next)),
        "p" | "prev" | "<" => Some(BrowseInput::Navigate(Direction::Prev)),
        "t" | "today" => Some(BrowseInput::Today),
        "q" | "quit" | "exit" => Some(BrowseInput::Quit),
        _ => None,
    }
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
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_month_arguments() {
        let arg: MonthArg = "1445-9".parse().expect("month");
        assert_eq!(arg.0, CalendarViewState::new(1445, 9).expect("view"));
        assert!("1445-13".parse::<MonthArg>().is_err());
        assert!("1445/09".parse::<MonthArg>().is_err());
        assert!("0-01".parse::<MonthArg>().is_err());
    }

    #[test]
    fn defaults_to_month_command() {
        let cli = GlobalCli::parse_from(["mahal", "-vv", "--offline"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.offline);
        assert!(matches!(cli.command(), Command::Month { month: None }));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = GlobalCli::parse_from(["mahal", "month", "1446-01", "--locale", "ar"]);
        assert_eq!(cli.locale.as_deref(), Some("ar"));
        match cli.command() {
            Command::Month { month: Some(MonthArg(view)) } => {
                assert_eq!(view, CalendarViewState::new(1446, 1).expect("view"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn browse_input_words() {
        assert_eq!(
            parse_browse_input(" N "),
            Some(BrowseInput::Navigate(Direction::Next))
        );
        assert_eq!(
            parse_browse_input("prev"),
            Some(BrowseInput::Navigate(Direction::Prev))
        );
        assert_eq!(parse_browse_input("t"), Some(BrowseInput::Today));
        assert_eq!(parse_browse_input("quit"), Some(BrowseInput::Quit));
        assert_eq!(parse_browse_input("jump"), None);
    }
}
