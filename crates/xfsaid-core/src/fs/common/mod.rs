//! Device access and pre-flight checks shared by every command

mod device;
mod preflight;

pub use device::SourceDevice;
pub use preflight::{is_empty_directory, is_mounted_device, mounted_sources, table_mounts};
