//! The ABI Unity sees: the plugin lifecycle hooks and the readback entry points.
//!
//! None of the exported functions panic or report errors across the boundary. A failed readback
//! is logged and comes back as null.

use std::ffi::c_void;

use thiserror::Error;
use unity_native_plugin::{interface::UnityInterfaces, unity_native_plugin_entry_point};

use crate::{
    config::PluginConfig,
    logging,
    readback::{PixelBufferError, PixelBufferRegistry},
    utils::{GlobalLock, GlobalRwLock},
};

#[cfg(windows)]
type GraphicsInterface = crate::d3d12::interface::UnityD3D12;
#[cfg(not(windows))]
type GraphicsInterface = std::convert::Infallible;

#[derive(Debug)]
struct PluginState {
    config: PluginConfig,
    // `None` when Unity does not run on D3D12, or when loaded outside of Unity
    graphics: Option<GraphicsInterface>,
}

#[cfg(windows)]
type NativeReadbackError = crate::d3d12::ReadbackError;
#[cfg(not(windows))]
type NativeReadbackError = std::convert::Infallible;

static PLUGIN: GlobalRwLock<Option<PluginState>> = GlobalRwLock::new(None);
static PIXEL_BUFFERS: GlobalLock<PixelBufferRegistry> = GlobalLock::new(PixelBufferRegistry::new());

#[derive(Debug, Error)]
pub enum PixelReadError {
    #[error("plugin is not loaded")]
    NotLoaded,

    #[error("texture pointer is null")]
    NullTexture,

    #[error("D3D12 readback is only available on Windows")]
    UnsupportedPlatform,

    #[error("texture readback failed")]
    Readback(#[from] NativeReadbackError),

    #[error("pixel buffer could not be handed out")]
    PixelBuffer(#[from] PixelBufferError),
}

unity_native_plugin_entry_point! {
    fn unity_plugin_load(interfaces: &UnityInterfaces) {
        load_with_graphics(PluginConfig::from_env(), resolve_graphics(interfaces));
    }
    fn unity_plugin_unload() {
        unload();
    }
}

#[cfg(windows)]
fn resolve_graphics(interfaces: &UnityInterfaces) -> Option<GraphicsInterface> {
    crate::d3d12::interface::UnityD3D12::resolve(interfaces)
}

#[cfg(not(windows))]
fn resolve_graphics(_interfaces: &UnityInterfaces) -> Option<GraphicsInterface> {
    None
}

/// Loads the plugin without any graphics interface: readbacks fail until Unity loads it.
pub fn load(config: PluginConfig) {
    load_with_graphics(config, None);
}

fn load_with_graphics(config: PluginConfig, graphics: Option<GraphicsInterface>) {
    logging::init(&config);
    log::info!(
        "{} {} loaded",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    for (var, value) in &config.unrecognized {
        log::warn!("ignoring unrecognized {var} value \"{value}\"");
    }
    log::debug!("configuration: {config:?}");
    if graphics.is_none() {
        log::warn!("no D3D12 graphics interface, every readback will return null");
    }

    *PLUGIN.write() = Some(PluginState { config, graphics });
}

pub fn unload() {
    match PLUGIN.write().take() {
        Some(state) => log::debug!("releasing plugin state loaded with {:?}", state.config),
        None => log::debug!("unload requested while not loaded"),
    }

    let registry = PIXEL_BUFFERS.lock();
    if registry.outstanding() > 0 {
        log::warn!(
            "unloading with {} pixel buffers ({} bytes) never freed",
            registry.outstanding(),
            registry.outstanding_bytes()
        );
    }
    drop(registry);

    log::info!("{} unloaded", env!("CARGO_PKG_NAME"));
    logging::flush();
}

pub fn is_loaded() -> bool {
    PLUGIN.read().is_some()
}

/// Reads back the texture and lends the packed pixels to the host.
///
/// # Safety
///
/// `texture` must be null or a native texture pointer obtained from Unity
/// (`Texture.GetNativeTexturePtr`) that stays alive for the duration of the call.
pub unsafe fn read_pixels(texture: *mut c_void) -> Result<*mut u8, PixelReadError> {
    // held for the whole readback, so unloading waits for it
    let plugin = PLUGIN.read();
    let state = plugin.as_ref().ok_or(PixelReadError::NotLoaded)?;
    if texture.is_null() {
        return Err(PixelReadError::NullTexture);
    }

    let pixels = unsafe { read_texture(state, texture) }?;
    drop(plugin);

    Ok(PIXEL_BUFFERS.lock().lend(pixels)?)
}

#[cfg(windows)]
unsafe fn read_texture(
    state: &PluginState,
    texture: *mut c_void,
) -> Result<Box<[u8]>, PixelReadError> {
    use crate::d3d12::{
        ReadbackError,
        interface::{GraphicsQueue, GraphicsQueueAcquireError},
        readback,
    };

    let d3d12 = state
        .graphics
        .as_ref()
        .ok_or(GraphicsQueueAcquireError::InterfaceUnavailable)
        .map_err(ReadbackError::from)?;
    let graphics = GraphicsQueue::acquire(d3d12).map_err(ReadbackError::from)?;

    Ok(unsafe { readback::read_texture(&graphics, texture) }?)
}

#[cfg(not(windows))]
unsafe fn read_texture(
    _state: &PluginState,
    _texture: *mut c_void,
) -> Result<Box<[u8]>, PixelReadError> {
    Err(PixelReadError::UnsupportedPlatform)
}

/// Releases a buffer returned by [`read_pixels`]. Returns whether anything was released.
pub fn free_pixels(pixels: *const u8) -> bool {
    if pixels.is_null() {
        return false;
    }

    match PIXEL_BUFFERS.lock().reclaim(pixels) {
        Some(len) => {
            log::trace!("freed {len} byte pixel buffer at {pixels:p}");
            true
        }
        None => {
            log::warn!("ignoring free of {pixels:p}, not a live pixel buffer");
            false
        }
    }
}

pub fn pixels_len(pixels: *const u8) -> Option<usize> {
    PIXEL_BUFFERS.lock().len_of(pixels)
}

/// Returns a buffer of `width * height * 4` bytes holding the texture's pixels, or null on failure.
/// The buffer must be released with `FreePixelData`.
///
/// # Safety
///
/// `texture` must be null or a live native texture pointer obtained from Unity.
#[unsafe(no_mangle)]
pub unsafe extern "system" fn GetPixelDataFromTexture(texture: *mut c_void) -> *mut c_void {
    match unsafe { read_pixels(texture) } {
        Ok(pixels) => pixels.cast(),
        Err(err) => {
            log_error_chain(&err);
            std::ptr::null_mut()
        }
    }
}

/// Frees a buffer returned by `GetPixelDataFromTexture`. Null and already freed pointers are
/// ignored.
#[unsafe(no_mangle)]
pub extern "system" fn FreePixelData(pixel_data: *mut c_void) {
    free_pixels(pixel_data.cast_const().cast());
}

/// Length in bytes of a buffer returned by `GetPixelDataFromTexture`, 0 if it is not live.
#[unsafe(no_mangle)]
pub extern "system" fn GetPixelDataLength(pixel_data: *const c_void) -> u64 {
    pixels_len(pixel_data.cast()).map_or(0, |len| len as u64)
}

fn log_error_chain(err: &dyn std::error::Error) {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    log::warn!("GetPixelDataFromTexture returned null: {message}");
}
