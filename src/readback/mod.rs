pub mod host;
#[cfg_attr(not(windows), allow(dead_code))]
mod in_flight;
pub mod layout;

pub(crate) use in_flight::InFlight;
pub use host::{PixelBufferError, PixelBufferRegistry};
pub use layout::{
    BYTES_PER_PIXEL, PixelFormat, ROW_PITCH_ALIGNMENT, TextureDescription, TextureDimension,
    TextureLayout, TextureLayoutError,
};
