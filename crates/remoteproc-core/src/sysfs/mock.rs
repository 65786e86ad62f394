//! Mock device files for testing.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};

use super::traits::{DeviceAttribute, DeviceFiles, FirmwareLocator, FsError};

/// In-memory stand-in for a device directory and its firmware search path.
#[derive(Clone, Default)]
pub struct MockFiles {
    /// Captured writes, in order.
    write_log: Arc<Mutex<Vec<(DeviceAttribute, String)>>>,
    /// Firmware names that resolve.
    firmware: Arc<Mutex<HashSet<String>>>,
    /// Whether writes fail.
    fail_writes: Arc<Mutex<bool>>,
}

impl MockFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` resolvable as firmware.
    pub fn add_firmware(&self, name: &str) {
        self.firmware.lock().unwrap().insert(name.to_string());
    }

    /// Remove `name` from the resolvable firmware.
    pub fn remove_firmware(&self, name: &str) {
        self.firmware.lock().unwrap().remove(name);
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<(DeviceAttribute, String)> {
        self.write_log.lock().unwrap().clone()
    }

    /// Captured writes to a single attribute.
    pub fn writes_to(&self, attr: DeviceAttribute) -> Vec<String> {
        self.write_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == attr)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// Clear captured writes.
    pub fn clear_writes(&self) {
        self.write_log.lock().unwrap().clear();
    }

    /// Simulate a read-only device directory.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }
}

impl DeviceFiles for MockFiles {
    fn write_attr(&self, attr: DeviceAttribute, content: &str) -> Result<(), FsError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(FsError::Write {
                path: attr.file_name().into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.write_log
            .lock()
            .unwrap()
            .push((attr, content.to_string()));
        Ok(())
    }
}

impl FirmwareLocator for MockFiles {
    fn firmware_exists(&self, name: &str) -> bool {
        self.firmware.lock().unwrap().contains(name)
    }
}
