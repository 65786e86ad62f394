//! remoteproc-core: a filesystem-backed simulator of the Linux remoteproc
//! sysfs interface.
//!
//! A simulated device exposes `state`, `firmware` and `name` as plain text
//! files. Test harnesses drive it exactly the way they would drive a real
//! remote processor: by writing `start`/`stop` into `state` and a firmware
//! file name into `firmware`.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Watcher**: directory change notifications turned into `(file, value)` events
//! - **Sysfs**: directory layout, bootstrap/cleanup and firmware search path
//! - **State**: device lifecycle state machine and change handlers
//! - **Events**: Observer pattern for harness/UI decoupling
//! - **Device**: owned handle running the single-writer event loop
//! - **Config**: simulator configuration (TOML)
//!
//! # Example
//!
//! ```no_run
//! use remoteproc_core::{Remoteproc, SimulatorConfig};
//!
//! let config = SimulatorConfig {
//!     root_dir: "/tmp/fake-root".into(),
//!     device_name: "dsp0".to_string(),
//!     ..Default::default()
//! };
//!
//! let mut device = Remoteproc::new(config).expect("simulator failed to start");
//! // ... drive the device through its files ...
//! device.close();
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod state;
pub mod sysfs;
pub mod watcher;

// Re-exports for convenience
pub use config::{ConfigError, SimulatorConfig};
pub use device::Remoteproc;
pub use error::SimulatorError;
pub use events::{NullObserver, SimEvent, SimObserver, TracingObserver};
pub use state::{BootStatus, Command, DeviceContext, DeviceState};
pub use sysfs::{DeviceAttribute, DeviceFiles, FirmwareLocator, FsError, MockFiles, SysfsLayout};
pub use watcher::{DirWatcher, FileChange, WatchError};
