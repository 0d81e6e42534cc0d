//! The audio session controller.
//!
//! [`AudioController`] is a cheap, cloneable handle. All state lives in a
//! single worker task that drains one inbox: commands from handles, device
//! callbacks, platform session notifications and the interruption grace
//! timer all arrive there and are handled strictly in order. The worker is
//! the only code that touches the devices or the [`AudioSession`].
//!
//! # Interruption Grace
//!
//! When an interruption ends the worker waits [`INTERRUPTION_GRACE_DELAY`]
//! before ending the paused work and resetting the session. A new
//! interruption, or returning to the foreground, cancels the pending reset.
//!
//! # Blocking Device Work
//!
//! Stopping a device blocks: capture encodes and writes its file, playback
//! joins its player thread, and a finished recording is probed from disk.
//! On a multi-thread runtime the worker runs that work under
//! [`block_in_place`](tokio::task::block_in_place) so other tasks keep
//! their thread; on a current-thread runtime it runs inline.

use crate::{
    CoreError, CoreResult, Record, RecordStore,
    audio::{
        AudioBackend, AudioFormat, AudioSession, AudioState, CaptureDevice, CaptureSettings,
        DeviceEvent, DeviceEvents, OutputPort, OutputRoute, PermissionState, PlaybackDevice,
        RecordingOutcome, SessionEvent, classify_recording,
    },
    events::{AudioEvent, EventBus, Subscription},
};

use std::{
    panic::Location,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use error_location::ErrorLocation;
use tokio::{
    runtime::{Handle, RuntimeFlavor},
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, instrument, warn};

/// Delay between the end of an interruption and the session reset.
pub const INTERRUPTION_GRACE_DELAY: Duration = Duration::from_secs(1);

/// Controller tuning.
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    /// Recording cutoff handed to capture devices. Zero records until stopped.
    pub maximum_record_duration: Duration,
}

/// Observable controller state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerSnapshot {
    /// Current state.
    pub state: AudioState,
    /// File being played, if playing.
    pub playing_target: Option<PathBuf>,
    /// File being recorded, if recording.
    pub recording_target: Option<PathBuf>,
}

/// Everything the worker inbox carries.
pub(crate) enum ControllerMessage {
    Play {
        path: PathBuf,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    StopPlaying {
        reply: oneshot::Sender<()>,
    },
    StartRecording {
        path: PathBuf,
        format: AudioFormat,
        reply: oneshot::Sender<CoreResult<()>>,
    },
    StopRecording {
        reply: oneshot::Sender<()>,
    },
    RecordingElapsed {
        reply: oneshot::Sender<Duration>,
    },
    PermissionState {
        reply: oneshot::Sender<PermissionState>,
    },
    RequestPermission {
        reply: oneshot::Sender<bool>,
    },
    PermissionResolved {
        granted: bool,
        reply: oneshot::Sender<bool>,
    },
    Device {
        session: u64,
        event: DeviceEvent,
    },
    Session(SessionEvent),
    GraceElapsed {
        generation: u64,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the controller worker.
///
/// Dropping every handle does not stop the worker; call
/// [`shutdown`](Self::shutdown) to release the hardware and end the task.
#[derive(Clone)]
pub struct AudioController {
    tx: mpsc::UnboundedSender<ControllerMessage>,
    snapshot: watch::Receiver<ControllerSnapshot>,
    events: EventBus,
    formats: Arc<[AudioFormat]>,
}

impl AudioController {
    /// Start the controller worker on the current tokio runtime.
    ///
    /// If microphone permission is already granted the session is configured
    /// and routed before the first command is handled.
    pub fn spawn(
        backend: Box<dyn AudioBackend>,
        session: Box<dyn AudioSession>,
        config: ControllerConfig,
        events: EventBus,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(ControllerSnapshot::default());
        let formats: Arc<[AudioFormat]> = AudioFormat::ALL
            .into_iter()
            .filter(|format| backend.supports_format(*format))
            .collect();

        let worker = ControllerWorker {
            backend,
            session,
            config,
            events: events.clone(),
            inbox: tx.clone(),
            snapshot: snapshot_tx,
            activity: Activity::Idle,
            device_session: 0,
            grace: None,
            grace_generation: 0,
        };
        let handle = tokio::spawn(worker.run(rx));

        (
            Self {
                tx,
                snapshot: snapshot_rx,
                events,
                formats,
            },
            handle,
        )
    }

    /// Play the audio file at `path`, replacing any current playback.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmptyTarget`] for an empty path
    /// - [`CoreError::Busy`] while recording
    /// - [`CoreError::DeviceUnavailable`] if the file cannot be played
    pub async fn play(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref().to_path_buf();
        self.request(|reply| ControllerMessage::Play { path, reply })
            .await?
    }

    /// Encodings the backend can record.
    pub fn supported_formats(&self) -> &[AudioFormat] {
        &self.formats
    }

    /// Whether `format` can be recorded.
    pub fn supports_format(&self, format: AudioFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Play a stored record.
    pub async fn play_record(&self, store: &RecordStore, record: &Record) -> CoreResult<()> {
        self.play(store.record_path(record)).await
    }

    /// Stop playback. Does nothing unless playing.
    pub async fn stop_playing(&self) -> CoreResult<()> {
        self.request(|reply| ControllerMessage::StopPlaying { reply })
            .await
    }

    /// Start recording `format` audio into `path`, stopping any playback.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmptyTarget`] for an empty path
    /// - [`CoreError::Busy`] while already recording
    /// - [`CoreError::DeviceUnavailable`] if capture cannot start or the
    ///   backend has no encoder for `format`
    pub async fn start_recording(
        &self,
        path: impl AsRef<Path>,
        format: AudioFormat,
    ) -> CoreResult<()> {
        let path = path.as_ref().to_path_buf();
        self.request(|reply| ControllerMessage::StartRecording {
            path,
            format,
            reply,
        })
        .await?
    }

    /// Stop recording. The outcome arrives as an [`AudioEvent`].
    /// Does nothing unless recording.
    pub async fn stop_recording(&self) -> CoreResult<()> {
        self.request(|reply| ControllerMessage::StopRecording { reply })
            .await
    }

    /// Audio captured so far, zero unless recording.
    pub async fn current_recording_elapsed(&self) -> CoreResult<Duration> {
        self.request(|reply| ControllerMessage::RecordingElapsed { reply })
            .await
    }

    /// Current microphone permission.
    pub async fn microphone_permission_state(&self) -> CoreResult<PermissionState> {
        self.request(|reply| ControllerMessage::PermissionState { reply })
            .await
    }

    /// Ask for microphone access. On grant the session is reset before
    /// this returns.
    pub async fn request_microphone_permission(&self) -> CoreResult<bool> {
        self.request(|reply| ControllerMessage::RequestPermission { reply })
            .await
    }

    /// Deliver a platform session notification.
    pub fn notify(&self, event: SessionEvent) {
        if self.tx.send(ControllerMessage::Session(event)).is_err() {
            debug!(event = ?event, "Session event dropped, controller gone");
        }
    }

    /// Current state.
    pub fn state(&self) -> AudioState {
        self.snapshot.borrow().state
    }

    /// Current state with the active target.
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch state changes.
    pub fn watch(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshot.clone()
    }

    /// Whether `path` is the file being played.
    pub fn is_playing(&self, path: &Path) -> bool {
        let snapshot = self.snapshot.borrow();
        snapshot.state == AudioState::Playing && snapshot.playing_target.as_deref() == Some(path)
    }

    /// Whether `record` is the record being played.
    pub fn is_playing_record(&self, store: &RecordStore, record: &Record) -> bool {
        self.is_playing(&store.record_path(record))
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Bus the controller publishes on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// End current work and stop the worker.
    pub async fn shutdown(&self) -> CoreResult<()> {
        self.request(|reply| ControllerMessage::Shutdown { reply })
            .await
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> ControllerMessage,
    ) -> CoreResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(message(reply_tx)).map_err(|_| closed())?;
        reply_rx.await.map_err(|_| closed())
    }
}

/// Run blocking device work, handing the thread over when the runtime can.
fn run_blocking<R>(work: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(work),
        _ => work(),
    }
}

#[track_caller]
fn closed() -> CoreError {
    CoreError::ControllerClosed {
        location: ErrorLocation::from(Location::caller()),
    }
}

/// What owns the hardware. At most one device exists at a time.
enum Activity {
    Idle,
    Recording {
        device: Box<dyn CaptureDevice>,
        target: PathBuf,
        session: u64,
    },
    Playing {
        device: Box<dyn PlaybackDevice>,
        target: PathBuf,
        session: u64,
    },
}

impl Activity {
    fn state(&self) -> AudioState {
        match self {
            Activity::Idle => AudioState::Idle,
            Activity::Recording { .. } => AudioState::Recording,
            Activity::Playing { .. } => AudioState::Playing,
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        match self {
            Activity::Idle => ControllerSnapshot::default(),
            Activity::Recording { target, .. } => ControllerSnapshot {
                state: AudioState::Recording,
                playing_target: None,
                recording_target: Some(target.clone()),
            },
            Activity::Playing { target, .. } => ControllerSnapshot {
                state: AudioState::Playing,
                playing_target: Some(target.clone()),
                recording_target: None,
            },
        }
    }
}

struct PendingGrace {
    generation: u64,
    task: JoinHandle<()>,
}

struct ControllerWorker {
    backend: Box<dyn AudioBackend>,
    session: Box<dyn AudioSession>,
    config: ControllerConfig,
    events: EventBus,
    inbox: mpsc::UnboundedSender<ControllerMessage>,
    snapshot: watch::Sender<ControllerSnapshot>,
    activity: Activity,
    device_session: u64,
    grace: Option<PendingGrace>,
    grace_generation: u64,
}

impl ControllerWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControllerMessage>) {
        info!("Audio controller started");

        if self.session.record_permission() == PermissionState::Granted {
            self.reset_session();
        }

        while let Some(message) = rx.recv().await {
            match message {
                ControllerMessage::Play { path, reply } => {
                    let _ = reply.send(self.play(path));
                }
                ControllerMessage::StopPlaying { reply } => {
                    self.stop_playing();
                    let _ = reply.send(());
                }
                ControllerMessage::StartRecording {
                    path,
                    format,
                    reply,
                } => {
                    let _ = reply.send(self.start_recording(path, format));
                }
                ControllerMessage::StopRecording { reply } => {
                    self.stop_recording();
                    let _ = reply.send(());
                }
                ControllerMessage::RecordingElapsed { reply } => {
                    let _ = reply.send(self.recording_elapsed());
                }
                ControllerMessage::PermissionState { reply } => {
                    let _ = reply.send(self.session.record_permission());
                }
                ControllerMessage::RequestPermission { reply } => {
                    self.request_permission(reply);
                }
                ControllerMessage::PermissionResolved { granted, reply } => {
                    info!(granted, "Microphone permission resolved");
                    if granted {
                        self.reset_session();
                    }
                    let _ = reply.send(granted);
                }
                ControllerMessage::Device { session, event } => {
                    self.handle_device_event(session, event);
                }
                ControllerMessage::Session(event) => self.handle_session_event(event),
                ControllerMessage::GraceElapsed { generation } => {
                    self.handle_grace_elapsed(generation);
                }
                ControllerMessage::Shutdown { reply } => {
                    self.cancel_grace();
                    self.end_current_work();
                    let _ = reply.send(());
                    break;
                }
            }
        }

        info!("Audio controller stopped");
    }

    fn transition(&mut self, next: Activity) -> Activity {
        let previous = std::mem::replace(&mut self.activity, next);
        self.snapshot.send_replace(self.activity.snapshot());
        debug!(from = %previous.state(), to = %self.activity.state(), "Audio state changed");
        previous
    }

    fn next_device_events(&mut self) -> DeviceEvents {
        self.device_session += 1;
        DeviceEvents::new(self.device_session, self.inbox.clone())
    }

    #[track_caller]
    #[instrument(skip(self))]
    fn play(&mut self, path: PathBuf) -> CoreResult<()> {
        if path.as_os_str().is_empty() {
            return Err(CoreError::EmptyTarget {
                location: ErrorLocation::from(Location::caller()),
            });
        }

        match self.activity {
            Activity::Recording { .. } => {
                return Err(CoreError::Busy {
                    reason: "recording in progress".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Activity::Playing { .. } => self.stop_playing(),
            Activity::Idle => {}
        }

        self.session
            .set_active(true)
            .map_err(|e| CoreError::DeviceUnavailable {
                reason: format!("Failed to activate audio session: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let events = self.next_device_events();
        let session = events.session();
        let mut device = match self.backend.open_playback(&path, events) {
            Ok(device) => device,
            Err(e) => {
                self.deactivate_session();
                return Err(e);
            }
        };

        if let Err(e) = device.play() {
            run_blocking(|| device.stop());
            self.deactivate_session();
            return Err(e);
        }

        info!(path = ?path, "Playback started");
        self.transition(Activity::Playing {
            device,
            target: path,
            session,
        });
        self.session.set_proximity_monitoring(true);
        self.events.publish(AudioEvent::DidStartPlaying);

        Ok(())
    }

    fn stop_playing(&mut self) {
        if let Some((mut device, target)) = self.take_playback() {
            run_blocking(|| device.stop());
            self.finish_playback(target);
        }
    }

    fn take_playback(&mut self) -> Option<(Box<dyn PlaybackDevice>, PathBuf)> {
        if !matches!(self.activity, Activity::Playing { .. }) {
            return None;
        }
        match self.transition(Activity::Idle) {
            Activity::Playing { device, target, .. } => Some((device, target)),
            _ => None,
        }
    }

    fn finish_playback(&mut self, target: PathBuf) {
        self.session.set_proximity_monitoring(false);
        self.deactivate_session();
        info!(path = ?target, "Playback ended");
        self.events.publish(AudioEvent::DidEndPlaying);
        self.update_output_route();
    }

    #[track_caller]
    #[instrument(skip(self))]
    fn start_recording(&mut self, path: PathBuf, format: AudioFormat) -> CoreResult<()> {
        if path.as_os_str().is_empty() {
            return Err(CoreError::EmptyTarget {
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if !self.backend.supports_format(format) {
            return Err(CoreError::DeviceUnavailable {
                reason: format!("No {} encoder on this host", format),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        match self.activity {
            Activity::Recording { .. } => {
                return Err(CoreError::Busy {
                    reason: "already recording".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Activity::Playing { .. } => self.stop_playing(),
            Activity::Idle => {}
        }

        let settings = CaptureSettings::new(format, self.config.maximum_record_duration);
        let events = self.next_device_events();
        let session = events.session();
        let mut device = self.backend.open_capture(&path, &settings, events)?;

        if let Err(e) = self.session.set_active(true) {
            run_blocking(|| device.stop());
            return Err(CoreError::DeviceUnavailable {
                reason: format!("Failed to activate audio session: {}", e),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Err(e) = device.record() {
            run_blocking(|| device.stop());
            self.deactivate_session();
            return Err(e);
        }

        info!(path = ?path, format = %format, "Recording started");
        self.transition(Activity::Recording {
            device,
            target: path,
            session,
        });

        Ok(())
    }

    fn stop_recording(&mut self) {
        if let Some((device, target)) = self.take_recording() {
            self.finish_recording(device, target, true, None);
        }
    }

    fn take_recording(&mut self) -> Option<(Box<dyn CaptureDevice>, PathBuf)> {
        if !matches!(self.activity, Activity::Recording { .. }) {
            return None;
        }
        match self.transition(Activity::Idle) {
            Activity::Recording { device, target, .. } => Some((device, target)),
            _ => None,
        }
    }

    fn finish_recording(
        &mut self,
        mut device: Box<dyn CaptureDevice>,
        target: PathBuf,
        reported_success: bool,
        encode_error: Option<String>,
    ) {
        let backend = &self.backend;
        let (finalized, probed) = run_blocking(|| {
            let finalized = device.stop();
            drop(device);
            (finalized, backend.probe_duration(&target))
        });
        self.deactivate_session();

        let duration = probed.unwrap_or(Duration::ZERO);

        match classify_recording(duration, reported_success && finalized, encode_error) {
            RecordingOutcome::Finished => {
                info!(path = ?target, duration_ms = duration.as_millis(), "Recording finished");
                self.events.publish(AudioEvent::DidFinishRecording);
            }
            RecordingOutcome::Failed(failure) => {
                warn!(path = ?target, error = %failure, "Recording failed");
                self.events.publish(AudioEvent::RecordingFailed(failure));
            }
        }
    }

    fn recording_elapsed(&self) -> Duration {
        match &self.activity {
            Activity::Recording { device, .. } => device.current_time(),
            _ => Duration::ZERO,
        }
    }

    fn request_permission(&mut self, reply: oneshot::Sender<bool>) {
        let inbox = self.inbox.clone();
        self.session
            .request_record_permission(Box::new(move |granted| {
                if inbox
                    .send(ControllerMessage::PermissionResolved { granted, reply })
                    .is_err()
                {
                    debug!("Permission answer dropped, controller gone");
                }
            }));
    }

    fn handle_device_event(&mut self, session: u64, event: DeviceEvent) {
        let current = match &self.activity {
            Activity::Recording {
                session: active, ..
            }
            | Activity::Playing {
                session: active, ..
            } => Some(*active),
            Activity::Idle => None,
        };
        if current != Some(session) {
            debug!(session, event = ?event, "Ignoring event from released device");
            return;
        }

        match event {
            DeviceEvent::RecordingFinished { success } => {
                if let Some((device, target)) = self.take_recording() {
                    info!(success, "Capture device finished on its own");
                    self.finish_recording(device, target, success, None);
                }
            }
            DeviceEvent::EncodeError { reason } => {
                if let Some((device, target)) = self.take_recording() {
                    warn!(error = %reason, "Capture device reported an encoder error");
                    self.finish_recording(device, target, false, Some(reason));
                }
            }
            DeviceEvent::PlaybackFinished { success } => {
                if let Some((mut device, target)) = self.take_playback() {
                    debug!(success, "Playback device finished");
                    run_blocking(|| device.stop());
                    self.finish_playback(target);
                }
            }
            DeviceEvent::DecodeError { reason } => {
                if let Some((mut device, target)) = self.take_playback() {
                    warn!(error = %reason, "Playback device reported a decode error");
                    run_blocking(|| device.stop());
                    self.finish_playback(target);
                }
            }
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        debug!(event = ?event, state = %self.activity.state(), "Session event");

        match event {
            SessionEvent::InterruptionBegan => {
                self.cancel_grace();
                self.hang_up_current_work();
            }
            SessionEvent::InterruptionEnded => self.schedule_grace(),
            SessionEvent::RouteChanged => {
                info!(output = %self.session.current_output(), "Audio route changed");
                self.update_output_route();
            }
            SessionEvent::EnteredBackground => self.hang_up_current_work(),
            SessionEvent::EnteredForeground => {
                self.cancel_grace();
                self.end_current_work();
                self.reset_session();
            }
            SessionEvent::ProximityChanged { near } => self.apply_output_route(near),
        }
    }

    fn schedule_grace(&mut self) {
        self.cancel_grace();
        self.grace_generation += 1;

        let generation = self.grace_generation;
        let inbox = self.inbox.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(INTERRUPTION_GRACE_DELAY).await;
            let _ = inbox.send(ControllerMessage::GraceElapsed { generation });
        });

        debug!(generation, "Interruption grace scheduled");
        self.grace = Some(PendingGrace { generation, task });
    }

    fn cancel_grace(&mut self) {
        if let Some(pending) = self.grace.take() {
            pending.task.abort();
            debug!(generation = pending.generation, "Interruption grace cancelled");
        }
    }

    fn handle_grace_elapsed(&mut self, generation: u64) {
        match &self.grace {
            Some(pending) if pending.generation == generation => {
                self.grace = None;
                info!("Interruption over, resetting audio session");
                self.end_current_work();
                self.reset_session();
            }
            _ => debug!(generation, "Ignoring superseded interruption grace"),
        }
    }

    /// Pause whatever is running without ending it.
    fn hang_up_current_work(&mut self) {
        match &mut self.activity {
            Activity::Recording { device, .. } => {
                device.pause();
                info!("Recording paused");
            }
            Activity::Playing { device, .. } => {
                device.pause();
                info!("Playback paused");
            }
            Activity::Idle => {}
        }
    }

    fn end_current_work(&mut self) {
        match self.activity {
            Activity::Recording { .. } => self.stop_recording(),
            Activity::Playing { .. } => self.stop_playing(),
            Activity::Idle => {}
        }
    }

    fn reset_session(&mut self) {
        if let Err(e) = self.session.configure() {
            warn!(error = %e, "Configuring audio session failed");
        }
        self.update_output_route();
    }

    fn deactivate_session(&mut self) {
        if let Err(e) = self.session.set_active(false) {
            warn!(error = %e, "Deactivating audio session failed");
        }
    }

    /// Re-evaluate the built-in output. Left alone during playback.
    fn update_output_route(&mut self) {
        if matches!(self.activity, Activity::Playing { .. }) {
            return;
        }
        let near = self.session.proximity_near();
        self.apply_output_route(near);
    }

    fn apply_output_route(&mut self, near: bool) {
        let current = self.session.current_output();
        if let OutputPort::External(_) = current {
            debug!(output = %current, "External output, route left unchanged");
            return;
        }

        let desired = if near {
            OutputRoute::Earpiece
        } else {
            OutputRoute::Speaker
        };
        if current == desired.port() {
            return;
        }

        if let Err(e) = self.session.override_output(desired) {
            warn!(error = %e, route = ?desired, "Overriding output route failed");
        }
    }
}
