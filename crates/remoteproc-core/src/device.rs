//! Simulated remoteproc device - owned handle and event loop.
//!
//! [`Remoteproc::new`] bootstraps the device directory, attaches a
//! [`DirWatcher`] and starts one event-loop thread. That thread is the only
//! place device state is mutated and the only writer of the device files.
//! Boot timers run on their own short-lived threads and report back into
//! the loop as messages.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, after, select, unbounded};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::SimulatorConfig;
use crate::error::SimulatorError;
use crate::events::{SimEvent, SimObserver, TracingObserver};
use crate::state::{DeviceContext, HandleResult, HandlerContext, handle_boot_elapsed, handle_change};
use crate::sysfs::{DeviceAttribute, DeviceFiles, FirmwareLocator, SysfsLayout};
use crate::watcher::{DirWatcher, FileChange};

/// Simulated firmware loading time.
pub const BOOT_DELAY: Duration = Duration::from_millis(100);

/// Messages posted back into the event loop.
#[derive(Debug)]
enum ControlMsg {
    BootElapsed { ticket: u64 },
}

/// A running simulated remoteproc device.
///
/// Call [`close`](Self::close) when finished; dropping the handle closes it too.
pub struct Remoteproc<O: SimObserver> {
    layout: SysfsLayout,
    cleanup_on_exit: bool,
    watcher: DirWatcher,
    observer: Arc<O>,
    /// Dropped to request shutdown.
    shutdown: Option<Sender<()>>,
    event_loop: Option<JoinHandle<()>>,
}

impl Remoteproc<TracingObserver> {
    /// Create a new device with the default tracing observer.
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: SimObserver + 'static> Remoteproc<O> {
    /// Create a new device with a custom observer.
    #[instrument(skip_all, fields(root = %config.root_dir.display(), index = config.device_index))]
    pub fn with_observer(config: SimulatorConfig, observer: Arc<O>) -> Result<Self, SimulatorError> {
        config.validate()?;

        let mut layout = config.layout();
        layout.bootstrap().map_err(SimulatorError::Bootstrap)?;

        match Self::start(&layout, &config.device_name, Arc::clone(&observer)) {
            Ok((watcher, shutdown, event_loop)) => {
                observer.on_event(&SimEvent::Initialized {
                    device_dir: layout.device_dir().display().to_string(),
                });
                Ok(Self {
                    layout,
                    cleanup_on_exit: config.cleanup_on_exit,
                    watcher,
                    observer,
                    shutdown: Some(shutdown),
                    event_loop: Some(event_loop),
                })
            }
            Err(e) => {
                if let Err(cleanup_err) = layout.cleanup() {
                    warn!(error = %cleanup_err, "Cleanup after failed start failed");
                }
                Err(e)
            }
        }
    }

    fn start(
        layout: &SysfsLayout,
        device_name: &str,
        observer: Arc<O>,
    ) -> Result<(DirWatcher, Sender<()>, JoinHandle<()>), SimulatorError> {
        let device = DeviceContext::new();
        for (attr, content) in [
            (DeviceAttribute::State, device.state.as_str()),
            (DeviceAttribute::Firmware, device.firmware.as_str()),
            (DeviceAttribute::Name, device_name),
        ] {
            layout
                .write_attr(attr, content)
                .map_err(SimulatorError::Bootstrap)?;
        }

        let watcher = DirWatcher::open(layout.device_dir())?;

        let (shutdown_tx, shutdown_rx) = unbounded::<()>();
        let event_loop = EventLoop::new(
            layout.clone(),
            observer,
            device,
            watcher.changes().clone(),
            shutdown_rx,
        );
        let handle = thread::Builder::new()
            .name("remoteproc".into())
            .spawn(move || event_loop.run())
            .map_err(SimulatorError::Spawn)?;

        Ok((watcher, shutdown_tx, handle))
    }
}

impl<O: SimObserver> Remoteproc<O> {
    pub fn device_dir(&self) -> &Path {
        self.layout.device_dir()
    }

    pub fn firmware_dir(&self) -> &Path {
        self.layout.firmware_dir()
    }

    pub fn search_path_file(&self) -> &Path {
        self.layout.search_path_file()
    }

    pub fn layout(&self) -> &SysfsLayout {
        &self.layout
    }

    pub fn observer(&self) -> &Arc<O> {
        &self.observer
    }

    /// Stop the event loop, cancel any pending boot and release the watch.
    ///
    /// No device file is written after this returns. Idempotent.
    pub fn close(&mut self) {
        self.shutdown.take();
        if let Some(event_loop) = self.event_loop.take() {
            if event_loop.join().is_err() {
                warn!("Remoteproc event loop panicked");
            }
            info!(device_dir = %self.layout.device_dir().display(), "Remoteproc closed");
        }
        self.watcher.close();

        if self.cleanup_on_exit {
            if let Err(e) = self.layout.cleanup() {
                warn!(error = %e, "Failed to clean up sysfs tree");
            }
        }
    }
}

impl<O: SimObserver> Drop for Remoteproc<O> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Single-writer loop for one device.
struct EventLoop<F: DeviceFiles + FirmwareLocator, O: SimObserver> {
    files: F,
    observer: Arc<O>,
    device: DeviceContext,
    changes: Receiver<FileChange>,
    control_tx: Sender<ControlMsg>,
    control_rx: Receiver<ControlMsg>,
    shutdown: Receiver<()>,
    boot_delay: Duration,
}

enum Input {
    Change(FileChange),
    Control(ControlMsg),
}

impl<F, O> EventLoop<F, O>
where
    F: DeviceFiles + FirmwareLocator,
    O: SimObserver + 'static,
{
    fn new(
        files: F,
        observer: Arc<O>,
        device: DeviceContext,
        changes: Receiver<FileChange>,
        shutdown: Receiver<()>,
    ) -> Self {
        let (control_tx, control_rx) = unbounded();
        Self {
            files,
            observer,
            device,
            changes,
            control_tx,
            control_rx,
            shutdown,
            boot_delay: BOOT_DELAY,
        }
    }

    fn run(mut self) {
        loop {
            let input = select! {
                recv(self.shutdown) -> _ => break,
                recv(self.changes) -> msg => match msg {
                    Ok(change) => Input::Change(change),
                    Err(_) => {
                        warn!("Change stream closed");
                        break;
                    }
                },
                recv(self.control_rx) -> msg => match msg {
                    Ok(control) => Input::Control(control),
                    Err(_) => break,
                },
            };

            // select! picks randomly among ready channels.
            if self.shutdown_requested() {
                break;
            }

            match input {
                Input::Change(change) => self.on_change(change),
                Input::Control(ControlMsg::BootElapsed { ticket }) => self.on_boot_elapsed(ticket),
            }
        }

        if self.device.cancel_boot() {
            self.observer.on_event(&SimEvent::BootCancelled);
        }
        self.observer.on_event(&SimEvent::Shutdown);
    }

    fn shutdown_requested(&self) -> bool {
        matches!(self.shutdown.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn on_change(&mut self, change: FileChange) {
        trace!(file = %change.filename, value = %change.value, "Change");
        let mut ctx = HandlerContext {
            files: &self.files,
            observer: self.observer.as_ref(),
            device: &mut self.device,
        };
        match handle_change(&change, &mut ctx) {
            Ok(HandleResult::Continue) => {}
            Ok(HandleResult::ScheduleBoot { ticket }) => self.schedule_boot(ticket),
            Err(e) => warn!(file = %change.filename, error = %e, "Failed to apply change"),
        }
    }

    fn on_boot_elapsed(&mut self, ticket: u64) {
        let mut ctx = HandlerContext {
            files: &self.files,
            observer: self.observer.as_ref(),
            device: &mut self.device,
        };
        if let Err(e) = handle_boot_elapsed(ticket, &mut ctx) {
            warn!(error = %e, "Failed to publish boot completion");
        }
    }

    fn schedule_boot(&mut self, ticket: u64) {
        let control = self.control_tx.clone();
        let shutdown = self.shutdown.clone();
        let delay = self.boot_delay;
        let spawned = thread::Builder::new()
            .name(format!("boot-timer-{}", ticket))
            .spawn(move || {
                select! {
                    recv(shutdown) -> _ => trace!(ticket, "Boot timer cancelled by shutdown"),
                    recv(after(delay)) -> _ => {
                        // Loop already gone if this fails.
                        let _ = control.send(ControlMsg::BootElapsed { ticket });
                    }
                }
            });

        match spawned {
            Ok(_) => debug!(ticket, delay_ms = delay.as_millis() as u64, "Boot timer started"),
            Err(e) => {
                warn!(error = %e, "Failed to start boot timer");
                self.device.cancel_boot();
                self.observer.on_event(&SimEvent::BootCancelled);
            }
        }
    }
}

impl<O: SimObserver> std::fmt::Debug for Remoteproc<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remoteproc")
            .field("device_dir", &self.layout.device_dir())
            .field("running", &self.event_loop.is_some())
            .finish()
    }
}
