//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};

use crate::state::Sound;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "one-timer")]
#[command(about = "A single countdown timer kept consistent across terminal, status card and commands")]
#[command(version)]
pub struct Config {
    /// SQLite database holding the timer record
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory holding the live status cards
    #[arg(long, global = true)]
    pub cards_dir: Option<PathBuf>,

    /// Directory holding the completion sounds
    #[arg(long, global = true)]
    pub sounds_dir: Option<PathBuf>,

    /// How completion notifications are delivered
    #[arg(long, global = true, value_enum, default_value_t = NotifierKind::Systemd)]
    pub notifier: NotifierKind,

    /// Re-read the record every N seconds while a context is alive (0 disables)
    #[arg(long, global = true, default_value = "5")]
    pub resync_secs: u64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the status-card context and its HTTP API
    Serve {
        /// Port to bind the server to
        #[arg(short, long, default_value = "20554")]
        port: u16,

        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Run the foreground terminal context
    Watch,
    /// Start or resume the timer
    #[command(alias = "start")]
    Resume,
    /// Pause the timer
    Pause,
    /// Reset the timer to its full duration
    #[command(alias = "reset")]
    Cancel,
    /// Set the duration (and optionally the sound) of an idle or paused timer
    Set {
        /// Duration in seconds
        seconds: u64,

        /// Completion sound
        #[arg(long)]
        sound: Option<Sound>,
    },
    /// Print the persisted record as JSON
    Status,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    /// Transient systemd user timers running notify-send
    Systemd,
    /// Log scheduling requests only
    Log,
    /// Disable notifications
    None,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| data_dir().join("timer.sqlite3"))
    }

    pub fn cards_dir(&self) -> PathBuf {
        self.cards_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("cards"))
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.sounds_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("sounds"))
    }

    pub fn resync_every(&self) -> Option<Duration> {
        (self.resync_secs > 0).then(|| Duration::from_secs(self.resync_secs))
    }
}

/// Per-user data directory, falling back to the working directory
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("one-timer")
}
