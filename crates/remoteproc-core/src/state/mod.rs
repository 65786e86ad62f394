//! State machine module.

pub mod handlers;
pub mod machine;

pub use handlers::{
    HandleResult, HandlerContext, handle_boot_elapsed, handle_change, handle_firmware_change,
    handle_state_change,
};
pub use machine::{BootStatus, Command, DeviceContext, DeviceState};
