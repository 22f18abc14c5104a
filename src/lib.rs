// re-exports
pub use unity_native_plugin;
#[cfg(windows)]
pub use windows;

pub mod config;
#[cfg(windows)]
pub mod d3d12;
pub mod plugin;
pub mod readback;

#[cfg_attr(not(windows), allow(dead_code))]
mod debug;
mod logging;
mod utils;
