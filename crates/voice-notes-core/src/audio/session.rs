//! Platform audio session: routing, proximity, permission, activation.

use crate::CoreResult;

use std::fmt;

use tracing::{debug, info};

/// Platform notifications the controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Another client (e.g. a phone call) seized the audio hardware.
    InterruptionBegan,
    /// The interruption is over.
    InterruptionEnded,
    /// Audio input/output hardware changed.
    RouteChanged,
    /// The application moved to the background.
    EnteredBackground,
    /// The application returned to the foreground.
    EnteredForeground,
    /// Proximity sensor state changed.
    ProximityChanged {
        /// Whether something (an ear) is near the sensor.
        near: bool,
    },
}

/// Current output hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPort {
    /// Built-in earpiece.
    BuiltInReceiver,
    /// Built-in loudspeaker.
    BuiltInSpeaker,
    /// Headphones, Bluetooth, line out, and anything else.
    External(String),
}

impl fmt::Display for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputPort::BuiltInReceiver => f.write_str("built-in receiver"),
            OutputPort::BuiltInSpeaker => f.write_str("built-in speaker"),
            OutputPort::External(name) => write!(f, "external ({})", name),
        }
    }
}

/// Built-in output the controller can force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRoute {
    /// Route to the earpiece.
    Earpiece,
    /// Route to the loudspeaker.
    Speaker,
}

impl OutputRoute {
    /// Port this route selects.
    pub fn port(self) -> OutputPort {
        match self {
            OutputRoute::Earpiece => OutputPort::BuiltInReceiver,
            OutputRoute::Speaker => OutputPort::BuiltInSpeaker,
        }
    }
}

/// Microphone permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// The user has not been asked yet.
    Undetermined,
    /// The user refused.
    Denied,
    /// Recording is allowed.
    Granted,
}

/// Called once with the user's answer to a permission request.
pub type PermissionCallback = Box<dyn FnOnce(bool) + Send>;

/// The hardware session owned by the controller.
///
/// Only the controller worker calls into the session, so implementations do
/// not need interior synchronization.
pub trait AudioSession: Send {
    /// Put the session into play-and-record mode.
    fn configure(&mut self) -> CoreResult<()>;

    /// Claim (`true`) or release (`false`) the hardware. Releasing notifies
    /// other audio clients that they may resume.
    fn set_active(&mut self, active: bool) -> CoreResult<()>;

    /// Where audio is currently going.
    fn current_output(&self) -> OutputPort;

    /// Force output to a built-in port.
    fn override_output(&mut self, route: OutputRoute) -> CoreResult<()>;

    /// Turn proximity sensor reporting on or off.
    fn set_proximity_monitoring(&mut self, enabled: bool);

    /// Whether the proximity sensor currently reports near.
    fn proximity_near(&self) -> bool;

    /// Current microphone permission.
    fn record_permission(&self) -> PermissionState;

    /// Ask the user for microphone access. `callback` may run on any thread.
    fn request_record_permission(&mut self, callback: PermissionCallback);
}

/// Session for desktop hosts: loudspeaker output, no proximity sensor, and
/// no microphone permission prompt.
#[derive(Debug)]
pub struct DesktopSession {
    output: OutputPort,
    active: bool,
}

impl DesktopSession {
    /// Create an inactive session routed to the speaker.
    pub fn new() -> Self {
        Self {
            output: OutputPort::BuiltInSpeaker,
            active: false,
        }
    }

    /// Whether the hardware is currently claimed.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for DesktopSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSession for DesktopSession {
    fn configure(&mut self) -> CoreResult<()> {
        debug!("Desktop audio session configured");
        Ok(())
    }

    fn set_active(&mut self, active: bool) -> CoreResult<()> {
        self.active = active;
        debug!(active, "Desktop audio session activation changed");
        Ok(())
    }

    fn current_output(&self) -> OutputPort {
        self.output.clone()
    }

    fn override_output(&mut self, route: OutputRoute) -> CoreResult<()> {
        self.output = route.port();
        info!(output = %self.output, "Output route overridden");
        Ok(())
    }

    fn set_proximity_monitoring(&mut self, enabled: bool) {
        debug!(enabled, "No proximity sensor on desktop");
    }

    fn proximity_near(&self) -> bool {
        false
    }

    fn record_permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn request_record_permission(&mut self, callback: PermissionCallback) {
        callback(true);
    }
}
