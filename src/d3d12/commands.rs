use std::mem::ManuallyDrop;

use thiserror::Error;
use windows::{
    Win32::Graphics::{
        Direct3D12::{
            D3D12_COMMAND_LIST_TYPE_DIRECT, D3D12_PLACED_SUBRESOURCE_FOOTPRINT,
            D3D12_SUBRESOURCE_FOOTPRINT, D3D12_TEXTURE_COPY_LOCATION,
            D3D12_TEXTURE_COPY_LOCATION_0, D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX, ID3D12CommandAllocator,
            ID3D12CommandList, ID3D12CommandQueue, ID3D12Device, ID3D12GraphicsCommandList,
            ID3D12PipelineState, ID3D12Resource,
        },
        Dxgi::Common::DXGI_FORMAT,
    },
    core::Interface,
};

use crate::readback::TextureLayout;

use super::buffer::ReadbackBuffer;

/// A one-shot direct command list recording the texture-to-buffer copy.
pub(crate) struct CopyCommand {
    // the list must go before the allocator backing it
    list: ID3D12GraphicsCommandList,
    _allocator: ID3D12CommandAllocator,
}

#[derive(Debug, Error)]
pub enum CopyCommandCreateError {
    #[error("d3d12 call to create command allocator failed")]
    AllocatorCreation(#[source] windows::core::Error),

    #[error("d3d12 call to create command list failed")]
    ListCreation(#[source] windows::core::Error),
}

#[derive(Debug, Error)]
pub enum CopyCommandError {
    #[error("closing the copy command list failed")]
    Close(#[source] windows::core::Error),

    #[error("command list does not expose ID3D12CommandList")]
    ListCast(#[source] windows::core::Error),
}

impl CopyCommand {
    pub fn create(device: &ID3D12Device) -> Result<Self, CopyCommandCreateError> {
        let allocator: ID3D12CommandAllocator =
            unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }
                .map_err(CopyCommandCreateError::AllocatorCreation)?;

        let list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(
                0,
                D3D12_COMMAND_LIST_TYPE_DIRECT,
                &allocator,
                None::<&ID3D12PipelineState>,
            )
        }
        .map_err(CopyCommandCreateError::ListCreation)?;

        Ok(Self {
            list,
            _allocator: allocator,
        })
    }

    /// Records the copy of subresource 0 of `texture` into `destination` and closes the list.
    pub fn record_texture_copy(
        &self,
        texture: &ID3D12Resource,
        format: DXGI_FORMAT,
        layout: &TextureLayout,
        destination: &ReadbackBuffer,
    ) -> Result<(), CopyCommandError> {
        let source_location = D3D12_TEXTURE_COPY_LOCATION {
            pResource: ManuallyDrop::new(Some(texture.clone())),
            Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                SubresourceIndex: 0,
            },
        };
        let destination_location = D3D12_TEXTURE_COPY_LOCATION {
            pResource: ManuallyDrop::new(Some(destination.handle.clone())),
            Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                PlacedFootprint: D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
                    Offset: 0,
                    Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                        Format: format,
                        Width: layout.width,
                        Height: layout.height,
                        Depth: 1,
                        RowPitch: layout.row_pitch,
                    },
                },
            },
        };

        unsafe {
            self.list
                .CopyTextureRegion(&destination_location, 0, 0, 0, &source_location, None)
        };

        // give back the references taken for the copy locations
        drop(ManuallyDrop::into_inner(source_location.pResource));
        drop(ManuallyDrop::into_inner(destination_location.pResource));

        unsafe { self.list.Close() }.map_err(CopyCommandError::Close)
    }

    pub fn submit(&self, queue: &ID3D12CommandQueue) -> Result<(), CopyCommandError> {
        let list = self
            .list
            .cast::<ID3D12CommandList>()
            .map_err(CopyCommandError::ListCast)?;

        unsafe { queue.ExecuteCommandLists(&[Some(list)]) };

        Ok(())
    }
}
