//! Top-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::sysfs::FsError;
use crate::watcher::WatchError;

/// Errors that stop a simulated device from being constructed.
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bootstrap sysfs: {0}")]
    Bootstrap(#[source] FsError),

    #[error("failed to setup directory watcher: {0}")]
    Watch(#[from] WatchError),

    #[error("failed to spawn event loop: {0}")]
    Spawn(#[source] std::io::Error),
}
