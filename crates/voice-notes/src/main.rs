//! Voice-Notes: record, list, and play back short voice notes from a console.

mod app;
mod app_command;
mod config;
mod console;
mod error;
mod logging;
mod recording_state;
mod time_format;

pub(crate) use {
    app::App,
    app_command::AppCommand,
    console::Console,
    error::{AppError, Result as AppResult},
    recording_state::RecordingState,
};

use crate::config::Config;

use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use voice_notes_core::{
    AudioController, ControllerConfig, DesktopBackend, DesktopSession, EventBus, RecordStore,
    StoreLayout,
};

/// Time given to the stdin reader and other stragglers after the app exits.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(250);

/// Application entry point.
fn main() {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Dropping the guard flushes the log file.
    let _log_guard = logging::init(&config.logging);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {:?}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run(config));

    // Stdin reads block a runtime thread; don't wait on them forever.
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    if let Err(e) = result {
        error!(error = ?e, "App error");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> AppResult<()> {
    let store = Arc::new(RecordStore::open(StoreLayout::new(
        &config.storage.data_dir,
    )));

    if config.storage.sweep_orphans_on_startup {
        match store.sweep_orphaned_files() {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Removed orphaned audio files"),
            Err(e) => warn!(error = %e, "Orphan sweep failed"),
        }
    }

    let (controller, worker) = AudioController::spawn(
        Box::new(DesktopBackend::new()),
        Box::new(DesktopSession::new()),
        ControllerConfig {
            maximum_record_duration: config.recording.maximum_duration(),
        },
        EventBus::new(),
    );

    if !controller.supports_format(config.recording.format) {
        warn!(
            format = %config.recording.format,
            "Configured recording format has no encoder on this host"
        );
    }

    let (command_tx, command_rx) = mpsc::channel(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let console = Console::new(command_tx);
    tokio::spawn(async move {
        if let Err(e) = console.run(shutdown_rx).await {
            error!(error = ?e, "Console error");
        }
    });

    let app = App {
        store,
        controller,
        config,
        command_rx,
        shutdown_tx,
        recording: RecordingState::Idle,
        listing: Vec::new(),
    };

    let result = app.run().await;

    if let Err(e) = worker.await {
        error!(error = %e, "Audio controller task failed");
    }

    result
}
