//! Change handlers - interpret one file change against the device state.
//!
//! Handlers never sleep and never spawn: a validated `start` returns
//! [`HandleResult::ScheduleBoot`] and the event loop owns the timer.

use anyhow::Result;
use tracing::{debug, info, trace, warn};

use crate::events::{SimEvent, SimObserver, StartRefusal};
use crate::state::machine::{Command, DeviceContext, DeviceState};
use crate::sysfs::{DeviceAttribute, DeviceFiles, FirmwareLocator};
use crate::watcher::FileChange;

/// Result of handling a change.
#[derive(Debug, PartialEq, Eq)]
pub enum HandleResult {
    /// Nothing left to do.
    Continue,
    /// Start the simulated boot delay for `ticket`.
    ScheduleBoot { ticket: u64 },
}

/// Handler context containing all resources.
pub struct HandlerContext<'a, F: DeviceFiles + FirmwareLocator, O: SimObserver> {
    pub files: &'a F,
    pub observer: &'a O,
    pub device: &'a mut DeviceContext,
}

impl<'a, F: DeviceFiles + FirmwareLocator, O: SimObserver> HandlerContext<'a, F, O> {
    fn emit(&self, event: SimEvent) {
        self.observer.on_event(&event);
    }

    /// Move to `to` and write it into the `state` file.
    fn transition(&mut self, to: DeviceState) -> Result<()> {
        let from = self.device.state;
        self.device.goto_state(to);
        if from != to {
            self.emit(SimEvent::StateChanged { from, to });
        }
        self.publish_state()
    }

    /// Write the current state into the `state` file.
    fn publish_state(&self) -> Result<()> {
        self.files
            .write_attr(DeviceAttribute::State, self.device.state.as_str())?;
        Ok(())
    }
}

/// Dispatch a change on any file of the device directory.
pub fn handle_change<F: DeviceFiles + FirmwareLocator, O: SimObserver>(
    change: &FileChange,
    ctx: &mut HandlerContext<'_, F, O>,
) -> Result<HandleResult> {
    match DeviceAttribute::from_file_name(&change.filename) {
        Some(DeviceAttribute::State) => handle_state_change(&change.value, ctx),
        Some(DeviceAttribute::Firmware) => handle_firmware_change(&change.value, ctx),
        Some(DeviceAttribute::Name) | None => {
            trace!(file = %change.filename, "Ignoring change");
            Ok(HandleResult::Continue)
        }
    }
}

/// Handle a value written into `state`.
pub fn handle_state_change<F: DeviceFiles + FirmwareLocator, O: SimObserver>(
    value: &str,
    ctx: &mut HandlerContext<'_, F, O>,
) -> Result<HandleResult> {
    // Our own write-back; never a command.
    if DeviceState::from_name(value).is_some() {
        trace!(value = %value, "Ignoring self-inflicted state write");
        return Ok(HandleResult::Continue);
    }

    let Some(command) = Command::parse(value) else {
        ctx.emit(SimEvent::InvalidCommand {
            value: value.to_string(),
        });
        return Ok(HandleResult::Continue);
    };

    info!(from = %ctx.device.state, command = %command, "State change request");
    ctx.emit(SimEvent::CommandReceived { command });

    match command {
        Command::Start => handle_start(ctx),
        Command::Stop => handle_stop(ctx),
    }
}

fn handle_start<F: DeviceFiles + FirmwareLocator, O: SimObserver>(
    ctx: &mut HandlerContext<'_, F, O>,
) -> Result<HandleResult> {
    if ctx.device.state == DeviceState::Running {
        ctx.emit(SimEvent::StartRefused {
            reason: StartRefusal::AlreadyRunning,
        });
        return Ok(HandleResult::Continue);
    }

    if ctx.device.is_booting() {
        ctx.emit(SimEvent::StartRefused {
            reason: StartRefusal::BootPending,
        });
        return Ok(HandleResult::Continue);
    }

    if ctx.device.firmware.is_empty() {
        warn!("Cannot start: no firmware specified");
        ctx.transition(DeviceState::Crashed)?;
        return Ok(HandleResult::Continue);
    }

    if !ctx.files.firmware_exists(&ctx.device.firmware) {
        warn!(firmware = %ctx.device.firmware, "Cannot start: firmware file not found");
        ctx.emit(SimEvent::StartRefused {
            reason: StartRefusal::FirmwareNotFound,
        });
        ctx.publish_state()?;
        return Ok(HandleResult::Continue);
    }

    let ticket = ctx.device.begin_boot();
    ctx.emit(SimEvent::BootScheduled {
        firmware: ctx.device.firmware.clone(),
    });
    Ok(HandleResult::ScheduleBoot { ticket })
}

fn handle_stop<F: DeviceFiles + FirmwareLocator, O: SimObserver>(
    ctx: &mut HandlerContext<'_, F, O>,
) -> Result<HandleResult> {
    if ctx.device.cancel_boot() {
        ctx.emit(SimEvent::BootCancelled);
    }

    if ctx.device.state == DeviceState::Offline {
        info!("Remoteproc is already stopped");
        return Ok(HandleResult::Continue);
    }

    ctx.transition(DeviceState::Offline)?;
    Ok(HandleResult::Continue)
}

/// Handle a value written into `firmware`.
pub fn handle_firmware_change<F: DeviceFiles + FirmwareLocator, O: SimObserver>(
    value: &str,
    ctx: &mut HandlerContext<'_, F, O>,
) -> Result<HandleResult> {
    // Also the echo of our own revert below.
    if value == ctx.device.firmware {
        trace!(firmware = %value, "Firmware unchanged");
        return Ok(HandleResult::Continue);
    }

    // A pending boot counts as running here: the firmware validated by
    // `start` is the one that boots.
    if ctx.device.state == DeviceState::Running || ctx.device.is_booting() {
        let kept = ctx.device.firmware.clone();
        ctx.emit(SimEvent::FirmwareRejected {
            requested: value.to_string(),
            kept: kept.clone(),
        });
        ctx.files.write_attr(DeviceAttribute::Firmware, &kept)?;
        return Ok(HandleResult::Continue);
    }

    ctx.device.firmware = value.to_string();
    ctx.emit(SimEvent::FirmwareAccepted {
        firmware: value.to_string(),
    });
    Ok(HandleResult::Continue)
}

/// Handle the end of the simulated boot delay for `ticket`.
///
/// The caller must have checked that shutdown was not requested.
pub fn handle_boot_elapsed<F: DeviceFiles + FirmwareLocator, O: SimObserver>(
    ticket: u64,
    ctx: &mut HandlerContext<'_, F, O>,
) -> Result<HandleResult> {
    if !ctx.device.is_current_boot(ticket) {
        debug!(ticket, "Ignoring stale boot completion");
        return Ok(HandleResult::Continue);
    }

    ctx.device.cancel_boot();
    info!(firmware = %ctx.device.firmware, "Firmware started successfully");
    ctx.transition(DeviceState::Running)?;
    Ok(HandleResult::Continue)
}
