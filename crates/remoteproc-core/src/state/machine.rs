//! Device lifecycle state machine.

use std::fmt;

/// Lifecycle state of the simulated remote processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// Powered down; initial state.
    #[default]
    Offline,
    /// Firmware booted.
    Running,
    /// Start failed without firmware. Left via `stop` or a successful `start`.
    Crashed,
}

impl DeviceState {
    /// All states, in declaration order.
    pub const ALL: [DeviceState; 3] = [
        DeviceState::Offline,
        DeviceState::Running,
        DeviceState::Crashed,
    ];

    /// Canonical sysfs spelling, as published into the `state` file.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Offline => "offline",
            DeviceState::Running => "running",
            DeviceState::Crashed => "crashed",
        }
    }

    /// Parse a canonical state name. Case-sensitive.
    pub fn from_name(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands accepted on the `state` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Parse a command verb. Only the exact lowercase spellings are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simulated boot tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootStatus {
    /// No boot in flight.
    #[default]
    Idle,
    /// A boot timer is running; only a completion carrying `ticket` commits.
    Pending { ticket: u64 },
}

/// Runtime state of one device. Owned by the event loop.
#[derive(Debug, Default)]
pub struct DeviceContext {
    /// Current lifecycle state.
    pub state: DeviceState,
    /// Selected firmware file name, empty when none.
    pub firmware: String,
    /// In-flight boot, if any.
    pub boot: BootStatus,
    next_ticket: u64,
}

impl DeviceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition to a new state.
    pub fn goto_state(&mut self, new_state: DeviceState) {
        tracing::debug!(from = %self.state, to = %new_state, "State transition");
        self.state = new_state;
    }

    /// Mark a boot as pending and return its ticket.
    pub fn begin_boot(&mut self) -> u64 {
        self.next_ticket += 1;
        self.boot = BootStatus::Pending {
            ticket: self.next_ticket,
        };
        self.next_ticket
    }

    /// Clear a pending boot. Returns whether one was pending.
    pub fn cancel_boot(&mut self) -> bool {
        let was_pending = self.is_booting();
        self.boot = BootStatus::Idle;
        was_pending
    }

    /// Whether a boot timer is in flight.
    pub fn is_booting(&self) -> bool {
        matches!(self.boot, BootStatus::Pending { .. })
    }

    /// Whether `ticket` belongs to the boot currently pending.
    pub fn is_current_boot(&self, ticket: u64) -> bool {
        self.boot == BootStatus::Pending { ticket }
    }
}
