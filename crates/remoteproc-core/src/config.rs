//! Simulator configuration.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sysfs::SysfsLayout;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("root directory must be specified")]
    MissingRootDir,

    #[error("device name must be specified")]
    MissingDeviceName,

    #[error("Failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write config {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for one simulated remoteproc device.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Simulated sysfs root; `class/remoteproc` lives below it.
    pub root_dir: PathBuf,
    /// N in the `remoteprocN` device directory.
    pub device_index: u32,
    /// Identity written to the `name` file.
    pub device_name: String,
    /// Fallback firmware directory. Defaults to `<root_dir>/lib/firmware`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_dir: Option<PathBuf>,
    /// Remove freshly created directories when the device is closed.
    pub cleanup_on_exit: bool,
}

impl SimulatorConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject configurations a device cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingRootDir);
        }
        if self.device_name.is_empty() {
            return Err(ConfigError::MissingDeviceName);
        }
        Ok(())
    }

    /// Directory layout described by this configuration.
    pub fn layout(&self) -> SysfsLayout {
        let layout = SysfsLayout::new(&self.root_dir, self.device_index);
        match &self.firmware_dir {
            Some(dir) => layout.with_firmware_dir(dir),
            None => layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn valid() -> SimulatorConfig {
        SimulatorConfig {
            root_dir: "some/dir".into(),
            device_name: "dsp0".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_root_dir() {
        let config = SimulatorConfig {
            root_dir: PathBuf::new(),
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRootDir));
        assert!(err.to_string().contains("root directory must be specified"));
    }

    #[test]
    fn test_requires_device_name() {
        let config = SimulatorConfig {
            device_name: String::new(),
            ..valid()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("device name must be specified"));
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_toml_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        let config = SimulatorConfig {
            device_index: 4,
            firmware_dir: Some("/opt/firmware".into()),
            cleanup_on_exit: true,
            ..valid()
        };

        config.save_to_file(&path).unwrap();
        assert_eq!(SimulatorConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SimulatorConfig = toml::from_str(
            r#"
            root_dir = "/tmp/fake-root"
            device_name = "dsp1"
            "#,
        )
        .unwrap();
        assert_eq!(config.device_index, 0);
        assert_eq!(config.firmware_dir, None);
        assert!(!config.cleanup_on_exit);
    }

    #[test]
    fn test_malformed_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "device_index = \"three\"").unwrap();
        assert!(matches!(
            SimulatorConfig::load_from_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_layout_honors_firmware_override() {
        let config = SimulatorConfig {
            root_dir: "/fake".into(),
            device_index: 2,
            firmware_dir: Some("/opt/fw".into()),
            ..valid()
        };
        let layout = config.layout();
        assert_eq!(layout.firmware_dir(), Path::new("/opt/fw"));
        assert_eq!(
            layout.device_dir(),
            Path::new("/fake/class/remoteproc/remoteproc2")
        );
    }
}
