//! Simulated sysfs directory tree.
//!
//! Owns the paths of one device instance, creates the tree on startup
//! (remembering what did not exist before) and resolves firmware names
//! against the search path.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::traits::{DeviceAttribute, DeviceFiles, FirmwareLocator, FsError};

/// Directory holding all remoteproc instances, relative to the root.
const REMOTEPROC_CLASS_DIR: &str = "class/remoteproc";
/// Firmware search path override, relative to the root.
const SEARCH_PATH_FILE: &str = "module/firmware_class/parameters/path";
/// Fallback firmware directory, relative to the root.
const DEFAULT_FIRMWARE_DIR: &str = "lib/firmware";

/// Paths and bootstrap bookkeeping for one simulated device.
#[derive(Debug, Clone)]
pub struct SysfsLayout {
    device_dir: PathBuf,
    search_path_file: PathBuf,
    firmware_dir: PathBuf,
    created_dirs: Vec<PathBuf>,
}

impl SysfsLayout {
    /// Layout for `remoteproc<index>` under `root`, with the default firmware directory.
    pub fn new(root: &Path, index: u32) -> Self {
        Self {
            device_dir: root
                .join(REMOTEPROC_CLASS_DIR)
                .join(format!("remoteproc{}", index)),
            search_path_file: root.join(SEARCH_PATH_FILE),
            firmware_dir: root.join(DEFAULT_FIRMWARE_DIR),
            created_dirs: Vec::new(),
        }
    }

    /// Override the fallback firmware directory.
    pub fn with_firmware_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.firmware_dir = dir.into();
        self
    }

    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    pub fn search_path_file(&self) -> &Path {
        &self.search_path_file
    }

    pub fn firmware_dir(&self) -> &Path {
        &self.firmware_dir
    }

    /// Topmost directories this layout created, in creation order.
    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.created_dirs
    }

    pub fn attr_path(&self, attr: DeviceAttribute) -> PathBuf {
        self.device_dir.join(attr.file_name())
    }

    /// Ensure the device directory, the search path file and the default
    /// firmware directory exist.
    ///
    /// On failure everything created so far is removed again.
    pub fn bootstrap(&mut self) -> Result<(), FsError> {
        if let Err(e) = self.try_bootstrap() {
            if let Err(cleanup_err) = self.cleanup() {
                warn!(error = %cleanup_err, "Cleanup after failed bootstrap failed");
            }
            return Err(e);
        }
        info!(device_dir = %self.device_dir.display(), "Sysfs tree ready");
        Ok(())
    }

    fn try_bootstrap(&mut self) -> Result<(), FsError> {
        let device_dir = self.device_dir.clone();
        self.create_dir_tracked(&device_dir)?;

        if let Some(parameters_dir) = self.search_path_file.parent().map(Path::to_path_buf) {
            self.create_dir_tracked(&parameters_dir)?;
        }
        // Leave an existing override in place.
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.search_path_file)
            .map_err(|source| FsError::Write {
                path: self.search_path_file.clone(),
                source,
            })?;

        let firmware_dir = self.firmware_dir.clone();
        self.create_dir_tracked(&firmware_dir)?;
        Ok(())
    }

    fn create_dir_tracked(&mut self, path: &Path) -> Result<(), FsError> {
        let created = create_dir_all_tracked(path).map_err(|source| FsError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(dir) = created {
            debug!(dir = %dir.display(), "Created directory");
            self.created_dirs.push(dir);
        }
        Ok(())
    }

    /// Remove the directories created by [`bootstrap`](Self::bootstrap).
    ///
    /// Pre-existing directories are never touched. Idempotent.
    pub fn cleanup(&mut self) -> Result<(), FsError> {
        while let Some(dir) = self.created_dirs.pop() {
            match fs::remove_dir_all(&dir) {
                Ok(()) => debug!(dir = %dir.display(), "Removed directory"),
                // Already gone together with an enclosing created directory.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    self.created_dirs.push(dir.clone());
                    return Err(FsError::Remove { path: dir, source });
                }
            }
        }
        Ok(())
    }

    /// Directory named by the search path file, if set.
    fn custom_firmware_dir(&self) -> Option<PathBuf> {
        let content = fs::read_to_string(&self.search_path_file).ok()?;
        let dir = content.trim();
        if dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(dir))
        }
    }
}

impl DeviceFiles for SysfsLayout {
    fn write_attr(&self, attr: DeviceAttribute, content: &str) -> Result<(), FsError> {
        let path = self.attr_path(attr);
        fs::write(&path, content).map_err(|source| FsError::Write { path, source })
    }
}

impl FirmwareLocator for SysfsLayout {
    fn firmware_exists(&self, name: &str) -> bool {
        if !is_plain_file_name(name) {
            return false;
        }
        let in_custom = self
            .custom_firmware_dir()
            .is_some_and(|dir| dir.join(name).is_file());
        in_custom || self.firmware_dir.join(name).is_file()
    }
}

/// A firmware name must name a file inside a search directory, not a path.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// `create_dir_all` that reports the topmost directory it had to create.
///
/// Returns `None` when `path` already existed.
fn create_dir_all_tracked(path: &Path) -> io::Result<Option<PathBuf>> {
    let mut topmost_missing = None;
    let mut current = Some(path);
    while let Some(dir) = current {
        if dir.as_os_str().is_empty() {
            break;
        }
        match fs::metadata(dir) {
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                topmost_missing = Some(dir.to_path_buf());
                current = dir.parent();
            }
            Err(e) => return Err(e),
        }
    }

    if topmost_missing.is_some() {
        fs::create_dir_all(path)?;
    }
    Ok(topmost_missing)
}
