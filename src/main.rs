//! One Timer - a single countdown timer shared by independent processes
//!
//! This is the main entry point for the one-timer application.

use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::info;

use one_timer::{
    api::{create_router, responses::TimerView, ServerState},
    commands::{self, TimerCommand},
    config::{Command, Config, NotifierKind},
    services::{
        CommandSoundPlayer, DisabledNotifier, FileSurface, LogNotifier, Notifier, Services,
        SqliteStore, SystemClock, SystemdNotifier,
    },
    state::{ContextSettings, TimerContext, DEFAULT_TIMER_ID},
    tasks::{activation_task, run_foreground},
    utils::shutdown_signal,
};

fn build_services(config: &Config) -> anyhow::Result<Arc<Services>> {
    // The store is the one thing no context can run without
    let store = SqliteStore::open(config.db_path())?;
    info!("Timer store at {}", store.path().display());

    let surface = FileSurface::new(config.cards_dir())?;
    let notifier: Arc<dyn Notifier> = match config.notifier {
        NotifierKind::Systemd => Arc::new(SystemdNotifier::new()),
        NotifierKind::Log => Arc::new(LogNotifier),
        NotifierKind::None => Arc::new(DisabledNotifier),
    };
    let sounds = CommandSoundPlayer::new(Some(config.sounds_dir()));

    Ok(Arc::new(Services::new(
        Arc::new(store),
        Arc::new(SystemClock),
        Arc::new(surface),
        notifier,
        Arc::new(sounds),
    )))
}

async fn serve(services: Arc<Services>, config: &Config, host: &str, port: u16) -> anyhow::Result<()> {
    let settings = ContextSettings {
        play_sound: false,
        ..ContextSettings::default()
    };
    let ctx = TimerContext::new(services, DEFAULT_TIMER_ID, settings)?;
    ctx.reconcile()?;

    // Keep the card in step with changes made here and elsewhere
    let activation_ctx = Arc::clone(&ctx);
    let resync = config.resync_every();
    tokio::spawn(async move {
        activation_task(activation_ctx, resync).await;
    });

    let state = Arc::new(ServerState::new(ctx, host, port));
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /card     - Live status card");
    info!("  GET  /status   - Persisted timer and derived status");
    info!("  POST /pause    - Pause the timer");
    info!("  POST /resume   - Start or resume the timer");
    info!("  POST /cancel   - Reset the timer");
    info!("  POST /duration - Set duration and sound");
    info!("  GET  /health   - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn watch(services: Arc<Services>, config: &Config) -> anyhow::Result<()> {
    let ctx = TimerContext::new(services, DEFAULT_TIMER_ID, ContextSettings::default())?;
    run_foreground(ctx, config.resync_every()).await?;
    Ok(())
}

/// Command handlers run one actuator and exit. A rejected transition is
/// reported, not treated as a crash.
fn run_command(services: &Services, command: TimerCommand) -> anyhow::Result<()> {
    match command.perform(services, DEFAULT_TIMER_ID) {
        Ok(record) => {
            let view = TimerView::new(&record, services.clock.now());
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        Err(e) if e.is_invalid_transition() => {
            eprintln!("{}: {}", command, e);
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Logs go to stderr; stdout belongs to the foreground surface
    tracing_subscriber::fmt()
        .with_env_filter(format!("one_timer={},tower_http=info", config.log_level()))
        .with_writer(std::io::stderr)
        .init();

    info!("Starting one-timer v{}", env!("CARGO_PKG_VERSION"));

    let services = build_services(&config)?;

    match &config.command {
        Command::Serve { host, port } => serve(services, &config, host, *port).await?,
        Command::Watch => watch(services, &config).await?,
        Command::Resume => run_command(&services, TimerCommand::Resume)?,
        Command::Pause => run_command(&services, TimerCommand::Pause)?,
        Command::Cancel => run_command(&services, TimerCommand::Cancel)?,
        Command::Set { seconds, sound } => {
            let record = commands::set_duration(
                &services,
                DEFAULT_TIMER_ID,
                Duration::from_secs(*seconds),
                *sound,
            )?;
            let view = TimerView::new(&record, services.clock.now());
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Status => {
            let record = services.store.load_or_create(DEFAULT_TIMER_ID, services.clock.now())?;
            let view = TimerView::new(&record, services.clock.now());
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }

    // Let fire-and-forget notifier processes get going before exit
    if !matches!(config.command, Command::Serve { .. } | Command::Watch) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    Ok(())
}
