//! Event system for harness decoupling.
//!
//! Allows test harnesses, the CLI or any other front end to follow the
//! simulated device without scraping log output.

use std::fmt;

use crate::state::{Command, DeviceState};

/// Why a `start` command did not schedule a boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRefusal {
    /// Device is already running.
    AlreadyRunning,
    /// A boot is already in flight.
    BootPending,
    /// Firmware name does not resolve to a file.
    FirmwareNotFound,
}

impl fmt::Display for StartRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartRefusal::AlreadyRunning => write!(f, "already running"),
            StartRefusal::BootPending => write!(f, "boot already pending"),
            StartRefusal::FirmwareNotFound => write!(f, "firmware not found"),
        }
    }
}

/// Events emitted by the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// Device directory bootstrapped and watched.
    Initialized { device_dir: String },
    /// A command was read from the `state` file.
    CommandReceived { command: Command },
    /// A value on `state` was neither a command nor a state name.
    InvalidCommand { value: String },
    /// Lifecycle state changed.
    StateChanged { from: DeviceState, to: DeviceState },
    /// `start` was refused without a transition.
    StartRefused { reason: StartRefusal },
    /// Simulated boot delay started.
    BootScheduled { firmware: String },
    /// Simulated boot delay abandoned before completion.
    BootCancelled,
    /// Firmware selection accepted.
    FirmwareAccepted { firmware: String },
    /// Firmware write rejected, previous value restored.
    FirmwareRejected { requested: String, kept: String },
    /// Event loop stopped.
    Shutdown,
}

/// Observer trait for receiving simulator events.
///
/// Implement this trait in your harness to receive updates.
/// Called from the device's event loop thread.
pub trait SimObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &SimEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl SimObserver for NullObserver {
    fn on_event(&self, _event: &SimEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl SimObserver for TracingObserver {
    fn on_event(&self, event: &SimEvent) {
        match event {
            SimEvent::Initialized { device_dir } => {
                tracing::info!("Remoteproc initialized at {}", device_dir);
            }
            SimEvent::CommandReceived { command } => {
                tracing::debug!(command = %command, "Command received");
            }
            SimEvent::InvalidCommand { value } => {
                tracing::warn!(value = %value, "Invalid state command");
            }
            SimEvent::StateChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "State changed");
            }
            SimEvent::StartRefused { reason } => {
                tracing::info!(reason = %reason, "Start refused");
            }
            SimEvent::BootScheduled { firmware } => {
                tracing::info!(firmware = %firmware, "Booting remoteproc");
            }
            SimEvent::BootCancelled => {
                tracing::info!("Pending boot cancelled");
            }
            SimEvent::FirmwareAccepted { firmware } => {
                tracing::info!(firmware = %firmware, "Firmware set");
            }
            SimEvent::FirmwareRejected { requested, kept } => {
                tracing::warn!(requested = %requested, kept = %kept, "Cannot change firmware while running");
            }
            SimEvent::Shutdown => {
                tracing::info!("Remoteproc shutting down");
            }
        }
    }
}
