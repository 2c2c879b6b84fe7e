//! Foreground terminal context
//!
//! Renders the live countdown on one line and takes single-letter commands
//! on stdin. Becoming active again (SIGCONT after `fg`, or SIGUSR1) triggers
//! a reconciliation, as does the optional periodic resync.

use std::{
    io::{self, Write},
    sync::Arc,
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, info, warn};

use super::activation::{next_resync, reconcile_logged, resync_interval};
use crate::{
    error::{Result, TimerError},
    services::TimerEvent,
    state::{Sound, TimerContext, TimerRecord},
    utils::{activation_signals, format_remaining, next_activation, progress_bar, shutdown_signal},
};

const HELP: &str = "commands: [s]tart  [p]ause  [r]eset  set <seconds> [sound]  sound <name>  [q]uit";

/// One parsed line of terminal input
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Start,
    Pause,
    Reset,
    Set(Duration, Option<Sound>),
    Sound(Sound),
    Quit,
    Help,
}

impl Input {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let input = match words.next()?.to_lowercase().as_str() {
            "s" | "start" | "resume" => Input::Start,
            "p" | "pause" => Input::Pause,
            "r" | "reset" | "cancel" => Input::Reset,
            "q" | "quit" | "exit" => Input::Quit,
            "set" => {
                let seconds: u64 = words.next()?.parse().ok()?;
                let sound = match words.next() {
                    Some(name) => Some(name.parse().ok()?),
                    None => None,
                };
                Input::Set(Duration::from_secs(seconds), sound)
            }
            "sound" => Input::Sound(words.next()?.parse().ok()?),
            _ => Input::Help,
        };
        Some(input)
    }
}

/// Status line for the current record and remaining time
pub fn status_line(record: &TimerRecord, remaining: Duration) -> String {
    let total = record.total.as_secs_f64();
    let progress = if total > 0.0 {
        1.0 - remaining.as_secs_f64() / total
    } else {
        0.0
    };
    let label = if record.is_paused() {
        if remaining == record.total {
            "ready"
        } else {
            "paused"
        }
    } else {
        "running"
    };
    format!(
        "{:>7} {} {} / {}",
        label,
        progress_bar(progress, 24),
        format_remaining(remaining),
        format_remaining(record.total)
    )
}

fn render(ctx: &TimerContext, remaining: Duration) {
    let line = status_line(&ctx.record(), remaining);
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "\r\x1b[2K{}", line);
    let _ = stdout.flush();
}

fn announce(message: &str) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "\r\x1b[2K{}", message);
    let _ = stdout.flush();
}

/// Apply one input. Returns `false` when the user asked to quit.
fn handle_input(ctx: &Arc<TimerContext>, input: Input) -> bool {
    let result: Result<Option<TimerRecord>> = match input {
        Input::Start => ctx.start().map(Some),
        Input::Pause => ctx.pause().map(Some),
        Input::Reset => ctx.reset().map(Some),
        Input::Set(duration, sound) => ctx.set_duration(duration, sound).map(Some),
        Input::Sound(sound) => ctx.set_sound(sound).map(Some),
        Input::Help => {
            announce(HELP);
            Ok(None)
        }
        Input::Quit => return false,
    };

    match result {
        Ok(_) => {}
        Err(TimerError::InvalidTransition(e)) => announce(&e.to_string()),
        Err(e) => {
            warn!("Command failed: {}", e);
            announce(&format!("error: {}", e));
        }
    }
    true
}

/// Run the terminal context until quit, stdin-driven or signalled
pub async fn run_foreground(ctx: Arc<TimerContext>, resync_every: Option<Duration>) -> Result<()> {
    info!("Starting foreground context for '{}'", ctx.timer_id());
    ctx.reconcile()?;

    let mut remaining = ctx.subscribe_remaining();
    let mut events = ctx.services().subscribe();
    let mut signals = activation_signals();
    let mut resync = resync_interval(resync_every);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    announce(HELP);
    render(&ctx, *remaining.borrow_and_update());

    loop {
        tokio::select! {
            changed = remaining.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = *remaining.borrow_and_update();
                render(&ctx, value);
            }
            event = events.recv() => match event {
                Ok(TimerEvent::Finished) => {
                    announce("Timer finished!");
                    render(&ctx, ctx.remaining());
                }
                Ok(TimerEvent::StateChanged) => render(&ctx, ctx.remaining()),
                Err(RecvError::Lagged(_)) => reconcile_logged(&ctx, "lagged events"),
                Err(RecvError::Closed) => break,
            },
            signal = next_activation(&mut signals) => {
                debug!("Activation signal {}", signal);
                reconcile_logged(&ctx, "activation");
                render(&ctx, ctx.remaining());
            }
            _ = next_resync(&mut resync) => reconcile_logged(&ctx, "resync"),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if let Some(input) = Input::parse(&line) {
                        if !handle_input(&ctx, input) {
                            break;
                        }
                    }
                    render(&ctx, ctx.remaining());
                }
                Ok(None) => {
                    debug!("stdin closed, continuing without input");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    announce("");
    info!("Foreground context stopped");
    Ok(())
}
