use thiserror::Error;
use windows::Win32::{
    Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0},
    Graphics::Direct3D12::{D3D12_FENCE_FLAG_NONE, ID3D12CommandQueue, ID3D12Device, ID3D12Fence},
    System::Threading::{CreateEventA, INFINITE, WaitForSingleObject},
};

/// Fence used to block the calling thread until the queue has executed everything submitted
/// before it was signaled.
///
/// The wait event is created up front, so that once work is submitted the only fallible steps
/// left are the signal and the wait themselves.
pub(crate) struct CompletionFence {
    handle: ID3D12Fence,
    event: WaitEvent,
}

#[derive(Debug, Error)]
pub enum FenceCreateError {
    #[error("d3d12 call to create fence failed")]
    Creation(#[source] windows::core::Error),

    #[error("wait event creation failed")]
    EventCreation(#[source] windows::core::Error),
}

#[derive(Debug, Error)]
pub enum FenceWaitError {
    #[error("signaling the fence on the command queue failed")]
    Signal(#[source] windows::core::Error),

    #[error("registering the fence completion event failed")]
    EventRegistration(#[source] windows::core::Error),

    #[error("waiting on the fence event failed (status {0:#x})")]
    Wait(u32),
}

impl CompletionFence {
    pub fn create(device: &ID3D12Device) -> Result<Self, FenceCreateError> {
        let handle: ID3D12Fence = unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }
            .map_err(FenceCreateError::Creation)?;
        let event = WaitEvent::create()?;

        Ok(Self { handle, event })
    }

    /// Signals `value` on `queue` and waits, without timeout, until the GPU reaches it.
    pub fn signal_and_wait(
        &self,
        queue: &ID3D12CommandQueue,
        value: u64,
    ) -> Result<(), FenceWaitError> {
        unsafe { queue.Signal(&self.handle, value) }.map_err(FenceWaitError::Signal)?;

        if unsafe { self.handle.GetCompletedValue() } >= value {
            log::trace!("fence value {value} already reached");
            return Ok(());
        }

        unsafe { self.handle.SetEventOnCompletion(value, self.event.0) }
            .map_err(FenceWaitError::EventRegistration)?;

        let status = unsafe { WaitForSingleObject(self.event.0, INFINITE) };
        if status != WAIT_OBJECT_0 {
            return Err(FenceWaitError::Wait(status.0));
        }

        Ok(())
    }
}

struct WaitEvent(HANDLE);

impl WaitEvent {
    fn create() -> Result<Self, FenceCreateError> {
        let handle = unsafe { CreateEventA(None, false, false, None) }
            .map_err(FenceCreateError::EventCreation)?;

        Ok(Self(handle))
    }
}

impl Drop for WaitEvent {
    fn drop(&mut self) {
        if let Err(err) = unsafe { CloseHandle(self.0) } {
            log::warn!("closing fence wait event failed: {err}");
        }
    }
}
