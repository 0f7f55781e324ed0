//! Storytime Player - Main entry point
//!
//! Loads a story catalog, opens the default audio device and runs an
//! interactive transport on stdin. Everything runs on one tokio thread:
//! commands, voice completions, decode results and the fade-out tick are
//! all serialized through a single `select!` loop.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use storytime_common::config::PlayerConfig;
use storytime_common::events::{StoryEvent, TrackId, TransportState};
use storytime_player::audio::{CpalBackend, PcmFormat};
use storytime_player::catalog::StoryCatalog;
use storytime_player::commands::{Command, HELP};
use storytime_player::playback::{
    BackendEvent, DecodeOutcome, DecodeWorker, PlaybackController, Playlist, WakeLockManager,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for storytime-player
#[derive(Parser, Debug)]
#[command(name = "storytime-player")]
#[command(about = "Bedtime story narration player")]
#[command(version)]
struct Args {
    /// Story catalog (JSON)
    #[arg(short, long, env = "STORYTIME_CATALOG")]
    catalog: Option<PathBuf>,

    /// Configuration file (overrides STORYTIME_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Story to select at startup (default: first narrated story)
    #[arg(short, long)]
    story: Option<String>,

    /// Print output devices and exit
    #[arg(long)]
    list_devices: bool,
}

/// Controller, playlist and decoder wired together for the console loop
struct Player {
    controller: PlaybackController<CpalBackend>,
    playlist: Playlist,
    worker: DecodeWorker,
    catalog_path: PathBuf,
    autoplay: bool,
}

impl Player {
    /// Select a story and queue its narration for decoding
    fn select(&mut self, id: &TrackId) {
        let Some(entry) = self.playlist.select(id).cloned() else {
            println!("no story with id {}", id);
            return;
        };

        let ticket = self.controller.select_track(entry.id.clone());
        println!("> {} [{}]", entry.title, entry.id);

        match entry.audio {
            Some(payload) => {
                self.controller.begin_decode(&ticket);
                // Outcome arrives on the decode channel
                drop(self.worker.submit(ticket, payload));
            }
            None => println!("  (narration not available yet)"),
        }
    }

    fn on_decoded(&mut self, outcome: DecodeOutcome) {
        let applied = self
            .controller
            .apply_decoded(&outcome.ticket, outcome.result);

        if applied
            && self.autoplay
            && self.controller.state() == TransportState::Ready
            && self.controller.position() == 0.0
        {
            self.controller.play();
        }
    }

    fn on_event(&mut self, event: StoryEvent) {
        if let Ok(json) = serde_json::to_string(&event) {
            debug!("event: {}", json);
        }

        match event {
            StoryEvent::TrackEnded { track_id, .. } => {
                if self.controller.current_track() != Some(&track_id) {
                    debug!("Ignoring end of {}, another story is selected", track_id);
                    return;
                }
                let next = self
                    .playlist
                    .advance_after_end(&track_id)
                    .map(|entry| entry.id.clone());
                match next {
                    Some(next) => self.select(&next),
                    None => println!("  (the end)"),
                }
            }
            StoryEvent::DecodeFailed {
                track_id, message, ..
            } => {
                println!("  could not decode narration for {}: {}", track_id, message);
            }
            StoryEvent::TransportStateChanged { .. } | StoryEvent::TrackReady { .. } => {}
        }
    }

    /// Re-read the catalog and attach narration that arrived since startup
    fn reload(&mut self) {
        let catalog = match StoryCatalog::load(&self.catalog_path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Reload failed: {}", e);
                println!("  could not reload catalog: {}", e);
                return;
            }
        };

        let updated = catalog.refresh_playlist(&mut self.playlist);
        for id in &updated {
            self.worker.invalidate(id);
        }
        println!("  narration updated for {} stories", updated.len());

        // A selected story that was waiting for narration can decode now
        let waiting = self
            .controller
            .current_track()
            .filter(|id| {
                updated.contains(*id) && self.controller.state() == TransportState::Idle
            })
            .cloned();
        if let Some(id) = waiting {
            self.select(&id);
        }
    }

    /// Apply one console command; returns false to quit
    fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Play => self.controller.play(),
            Command::Pause => self.controller.pause(),
            Command::Stop => self.controller.stop(),
            Command::Forward => self.controller.skip_forward(),
            Command::Rewind => self.controller.skip_backward(),
            Command::Next => {
                if let Some(id) = self.playlist.next().map(|e| e.id.clone()) {
                    self.select(&id);
                }
            }
            Command::Previous => {
                if let Some(id) = self.playlist.previous().map(|e| e.id.clone()) {
                    self.select(&id);
                }
            }
            Command::Select(id) => self.select(&TrackId::new(id)),
            Command::List => self.print_list(),
            Command::Status => self.print_status(),
            Command::Reload => self.reload(),
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }

    fn print_list(&self) {
        let current = self.controller.current_track();
        for entry in self.playlist.entries() {
            let marker = if Some(&entry.id) == current { '*' } else { ' ' };
            let narrated = if entry.has_audio() { "" } else { " (no audio)" };
            println!("{} {:>3}  {}{}", marker, entry.id, entry.title, narrated);
        }
    }

    fn print_status(&self) {
        let title = self
            .playlist
            .current()
            .map(|e| e.title.as_str())
            .unwrap_or("-");
        println!(
            "{} | {} | {:.1}s / {:.1}s",
            title,
            self.controller.state(),
            self.controller.position(),
            self.controller.duration()
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storytime_player=info,storytime_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    info!(
        "Starting Storytime Player v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if args.list_devices {
        for device in CpalBackend::list_devices().context("Failed to list audio devices")? {
            println!("{}", device);
        }
        return Ok(());
    }

    let catalog_path = args
        .catalog
        .context("A story catalog is required (--catalog or STORYTIME_CATALOG)")?;

    let config =
        PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let catalog = StoryCatalog::load(&catalog_path).context("Failed to load story catalog")?;

    let (backend_tx, mut backend_rx) = mpsc::unbounded_channel::<BackendEvent>();
    let backend = CpalBackend::new(config.audio.output_device.as_deref(), backend_tx)
        .context("Failed to open audio output")?;

    let controller = PlaybackController::new(
        backend,
        WakeLockManager::from_config(&config.wake_lock),
        Default::default(),
        config.transport.clone(),
    );
    let mut events = controller.events().subscribe();

    let (worker, mut decode_rx) = DecodeWorker::channel(PcmFormat::from(&config.audio));
    let worker = worker.with_output_rate(controller.backend().sample_rate());

    let mut player = Player {
        controller,
        playlist: catalog.playlist(),
        worker,
        catalog_path,
        autoplay: config.transport.autoplay,
    };

    let initial = match args.story {
        Some(id) => Some(TrackId::new(id)),
        None => player.playlist.first_ready().map(|e| e.id.clone()),
    };
    match initial {
        Some(id) => player.select(&id),
        None => println!("no narrated stories yet; 'list' to see the catalog"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(Duration::from_millis(20));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        if !player.on_command(command) {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            Some(BackendEvent::VoiceEnded(voice)) = backend_rx.recv() => {
                player.controller.on_voice_ended(voice);
            }
            Some(outcome) = decode_rx.recv() => {
                player.on_decoded(outcome);
            }
            event = events.recv() => match event {
                Ok(event) => player.on_event(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event subscriber lagged, {} events dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tick.tick() => {
                player.controller.tick();
                if player.controller.backend().take_stream_error() {
                    warn!("Audio stream reported an error");
                }
            }
            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    player.controller.stop();
    info!("Storytime Player stopped");
    Ok(())
}
