use std::{ffi::c_void, fmt::Debug, ops::Deref};

use thiserror::Error;
use windows::{
    Win32::Graphics::{
        Direct3D12::{
            D3D12_CPU_PAGE_PROPERTY_UNKNOWN, D3D12_HEAP_FLAG_NONE, D3D12_HEAP_PROPERTIES,
            D3D12_HEAP_TYPE_READBACK, D3D12_MEMORY_POOL_UNKNOWN, D3D12_RANGE,
            D3D12_RESOURCE_DESC, D3D12_RESOURCE_DIMENSION_BUFFER, D3D12_RESOURCE_FLAG_NONE,
            D3D12_RESOURCE_STATE_COPY_DEST, D3D12_TEXTURE_LAYOUT_ROW_MAJOR, ID3D12Device,
            ID3D12Resource,
        },
        Dxgi::Common::{DXGI_FORMAT_UNKNOWN, DXGI_SAMPLE_DESC},
    },
    core::Interface,
};

/// A buffer in the READBACK heap: GPU-writable as a copy destination, CPU-readable once mapped.
pub(crate) struct ReadbackBuffer {
    pub handle: ID3D12Resource,
    size: u64,
}

#[derive(Debug, Error)]
pub enum ReadbackBufferCreateError {
    #[error("committed resource creation failed")]
    Creation(#[source] windows::core::Error),

    #[error("committed resource creation returned no resource")]
    MissingResource,
}

#[derive(Debug, Error)]
pub enum ReadbackBufferMapError {
    #[error("buffer size {0} does not fit in host memory")]
    SizeConversion(u64),

    #[error("buffer memory mapping failed")]
    Mapping(#[source] windows::core::Error),

    #[error("buffer memory mapping returned a null pointer")]
    NullMapping,
}

impl ReadbackBuffer {
    pub fn create(device: &ID3D12Device, size: u64) -> Result<Self, ReadbackBufferCreateError> {
        let heap_properties = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_READBACK,
            CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
            MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
            CreationNodeMask: 0,
            VisibleNodeMask: 0,
        };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Alignment: 0,
            Width: size,
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DXGI_FORMAT_UNKNOWN,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            Flags: D3D12_RESOURCE_FLAG_NONE,
        };

        let mut handle: Option<ID3D12Resource> = None;
        unsafe {
            device.CreateCommittedResource(
                &heap_properties,
                D3D12_HEAP_FLAG_NONE,
                &desc,
                D3D12_RESOURCE_STATE_COPY_DEST,
                None,
                &mut handle,
            )
        }
        .map_err(ReadbackBufferCreateError::Creation)?;
        let handle = handle.ok_or(ReadbackBufferCreateError::MissingResource)?;

        log::trace!("created {size} byte readback buffer");

        Ok(Self { handle, size })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Maps the whole buffer for reading. Only valid once the GPU is done writing to it.
    pub fn map(&self) -> Result<MappedReadback<'_>, ReadbackBufferMapError> {
        let len = usize::try_from(self.size)
            .map_err(|_| ReadbackBufferMapError::SizeConversion(self.size))?;

        let read_range = D3D12_RANGE { Begin: 0, End: len };
        let mut data: *mut c_void = std::ptr::null_mut();
        unsafe {
            self.handle.Map(
                0,
                Some(&read_range as *const D3D12_RANGE),
                Some(&mut data as *mut *mut c_void),
            )
        }
        .map_err(ReadbackBufferMapError::Mapping)?;

        let mapped = MappedReadback {
            buffer: self,
            data: data.cast::<u8>().cast_const(),
            len,
        };
        if data.is_null() {
            // dropping `mapped` still balances the successful Map
            return Err(ReadbackBufferMapError::NullMapping);
        }

        Ok(mapped)
    }
}

impl Debug for ReadbackBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadbackBuffer")
            .field("handle", &self.handle.as_raw())
            .field("size", &self.size)
            .finish()
    }
}

/// CPU view of a mapped [`ReadbackBuffer`], unmapped on drop.
pub(crate) struct MappedReadback<'a> {
    buffer: &'a ReadbackBuffer,
    data: *const u8,
    len: usize,
}

impl Deref for MappedReadback<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        if self.data.is_null() {
            return &[];
        }

        // SAFETY: `data` points to `len` mapped bytes, which stay mapped as long as `self` lives
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }
}

impl Drop for MappedReadback<'_> {
    fn drop(&mut self) {
        // nothing was written by the CPU
        let written_range = D3D12_RANGE { Begin: 0, End: 0 };
        unsafe {
            self.buffer
                .handle
                .Unmap(0, Some(&written_range as *const D3D12_RANGE))
        };
    }
}
