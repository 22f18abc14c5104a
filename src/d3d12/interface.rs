use std::ffi::c_void;

use thiserror::Error;
use unity_native_plugin::{d3d12::UnityGraphicsD3D12v5, interface::UnityInterfaces};
use windows::{
    Win32::Graphics::Direct3D12::{ID3D12CommandQueue, ID3D12Device},
    core::Interface,
};

/// Unity's D3D12 graphics interface, resolved once when the plugin is loaded.
///
/// The device behind it may only come up after load, so the device and queue are looked up per
/// readback through [`GraphicsQueue::acquire`].
pub(crate) struct UnityD3D12(UnityGraphicsD3D12v5);

// SAFETY: the interface is a table of function pointers that Unity keeps valid until the plugin
// is unloaded, and its getters may be called from any thread.
unsafe impl Send for UnityD3D12 {}
unsafe impl Sync for UnityD3D12 {}

impl UnityD3D12 {
    pub fn resolve(interfaces: &UnityInterfaces) -> Option<Self> {
        interfaces.interface::<UnityGraphicsD3D12v5>().map(Self)
    }
}

impl std::fmt::Debug for UnityD3D12 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UnityD3D12")
    }
}

/// Unity's D3D12 device and the queue it renders with.
///
/// Both are owned by Unity; the plugin holds its own reference for the duration of one readback so
/// Unity can not tear them down mid-copy.
pub(crate) struct GraphicsQueue {
    pub device: ID3D12Device,
    pub queue: ID3D12CommandQueue,
}

#[derive(Debug, Error)]
pub enum GraphicsQueueAcquireError {
    #[error("unity does not expose a D3D12 graphics interface (is the editor running on D3D12?)")]
    InterfaceUnavailable,

    #[error("unity D3D12 interface returned a null device")]
    NullDevice,

    #[error("unity D3D12 interface returned a null command queue")]
    NullCommandQueue,
}

impl GraphicsQueue {
    pub fn acquire(d3d12: &UnityD3D12) -> Result<Self, GraphicsQueueAcquireError> {
        let device_ptr: *mut c_void = unsafe { d3d12.0.device() }.cast();
        let queue_ptr: *mut c_void = unsafe { d3d12.0.command_queue() }.cast();

        // SAFETY: Unity hands out live COM pointers (or null); `clone` takes our own reference so
        // dropping `Self` releases only what we added.
        let device = unsafe { ID3D12Device::from_raw_borrowed(&device_ptr) }
            .ok_or(GraphicsQueueAcquireError::NullDevice)?
            .clone();
        let queue = unsafe { ID3D12CommandQueue::from_raw_borrowed(&queue_ptr) }
            .ok_or(GraphicsQueueAcquireError::NullCommandQueue)?
            .clone();

        Ok(Self { device, queue })
    }
}
