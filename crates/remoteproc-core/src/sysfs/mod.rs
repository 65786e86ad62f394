//! Simulated sysfs module.

pub mod layout;
pub mod mock;
pub mod traits;

pub use layout::SysfsLayout;
pub use mock::MockFiles;
pub use traits::{DeviceAttribute, DeviceFiles, FirmwareLocator, FsError};
