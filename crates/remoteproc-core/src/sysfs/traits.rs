//! Device file abstraction.
//!
//! Defines the `DeviceFiles` and `FirmwareLocator` traits the state
//! handlers write through, allowing different implementations (real
//! directory tree, mock).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to remove directory {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
}

/// Files exposed in a remoteproc device directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAttribute {
    /// Lifecycle state, also the command input.
    State,
    /// Firmware file name.
    Firmware,
    /// Device identity, written once.
    Name,
}

impl DeviceAttribute {
    pub fn file_name(&self) -> &'static str {
        match self {
            DeviceAttribute::State => "state",
            DeviceAttribute::Firmware => "firmware",
            DeviceAttribute::Name => "name",
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "state" => Some(DeviceAttribute::State),
            "firmware" => Some(DeviceAttribute::Firmware),
            "name" => Some(DeviceAttribute::Name),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Write access to a device directory.
pub trait DeviceFiles: Send + Sync {
    /// Replace the full content of `attr`.
    fn write_attr(&self, attr: DeviceAttribute, content: &str) -> Result<(), FsError>;
}

/// Firmware presence lookup.
pub trait FirmwareLocator: Send + Sync {
    /// Whether `name` resolves to a firmware file right now.
    fn firmware_exists(&self, name: &str) -> bool;
}
