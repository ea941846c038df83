use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tracker", version, about = "Track tasks, routines and streaks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Show pending tasks and routines grouped by urgency.
    Agenda,
    /// Show routines split into due-soon and later.
    Routines,
    /// Mark a task done, or reopen it.
    ToggleTask { id: String },
    /// Check or uncheck a routine for today.
    ToggleRoutine { id: String },
    /// Put a task on hold.
    Hold { id: String },
    /// Return an on-hold task to pending.
    Resume { id: String },
    /// Record a weigh-in, today unless a date is given.
    Weigh {
        kilograms: f64,
        #[arg(long)]
        date: Option<String>,
    },
    /// Push the current document to storage and read it back.
    Sync,
    /// Apply the daily rollover on a timer, saving whenever it changes something.
    Watch {
        /// Stop after this many polls.
        #[arg(long)]
        ticks: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_agenda_subcommand() {
        let cli = Cli::parse_from(["tracker", "agenda"]);
        assert_eq!(cli.command, Command::Agenda);
    }

    #[test]
    fn parses_toggle_with_id() {
        let cli = Cli::parse_from(["tracker", "toggle-routine", "r42"]);
        assert_eq!(cli.command, Command::ToggleRoutine { id: "r42".into() });
    }

    #[test]
    fn parses_weigh_with_optional_date() {
        let cli = Cli::parse_from(["tracker", "weigh", "81.5", "--date", "2024-06-01"]);
        assert_eq!(
            cli.command,
            Command::Weigh {
                kilograms: 81.5,
                date: Some("2024-06-01".into())
            }
        );
    }
}
