use std::ffi::c_void;

use thiserror::Error;
use windows::{
    Win32::Graphics::Direct3D12::{D3D12_RESOURCE_DESC, ID3D12Resource},
    core::Interface,
};

use crate::{
    debug::ReadbackTimer,
    readback::{
        InFlight, TextureDescription, TextureDimension, TextureLayout, TextureLayoutError,
    },
};

use super::{
    buffer::{ReadbackBuffer, ReadbackBufferCreateError, ReadbackBufferMapError},
    commands::{CopyCommand, CopyCommandCreateError, CopyCommandError},
    fence::{CompletionFence, FenceCreateError, FenceWaitError},
    interface::{GraphicsQueue, GraphicsQueueAcquireError},
};

const COPY_FENCE_VALUE: u64 = 1;

#[derive(Debug, Error)]
pub enum ReadbackError {
    #[error("unity graphics interface is not usable")]
    GraphicsQueue(#[from] GraphicsQueueAcquireError),

    #[error("texture pointer is null")]
    NullTexture,

    #[error("texture cannot be read back")]
    Layout(#[from] TextureLayoutError),

    #[error("readback buffer creation failed")]
    BufferCreation(#[from] ReadbackBufferCreateError),

    #[error("copy command creation failed")]
    CommandCreation(#[from] CopyCommandCreateError),

    #[error("copy command recording failed")]
    Command(#[from] CopyCommandError),

    #[error("fence creation failed")]
    FenceCreation(#[from] FenceCreateError),

    #[error("waiting for the copy to complete failed")]
    FenceWait(#[from] FenceWaitError),

    #[error("readback buffer mapping failed")]
    Map(#[from] ReadbackBufferMapError),
}

pub(crate) fn describe(desc: &D3D12_RESOURCE_DESC) -> TextureDescription {
    TextureDescription {
        dimension: TextureDimension::from_d3d12(desc.Dimension.0),
        format: desc.Format.0 as u32,
        width: desc.Width,
        height: desc.Height,
        sample_count: desc.SampleDesc.Count,
    }
}

/// Copies subresource 0 of the texture behind `texture_ptr` into host memory, tightly packed.
///
/// Blocks until the GPU has finished the copy. Every D3D12 object created here is released before
/// returning, except when waiting for the copy fails: the GPU may still be running it, so its
/// resources are leaked rather than released under it.
///
/// # Safety
///
/// `texture_ptr` must be null or a live `ID3D12Resource` created on `graphics.device`.
pub(crate) unsafe fn read_texture(
    graphics: &GraphicsQueue,
    texture_ptr: *mut c_void,
) -> Result<Box<[u8]>, ReadbackError> {
    let texture = unsafe { ID3D12Resource::from_raw_borrowed(&texture_ptr) }
        .ok_or(ReadbackError::NullTexture)?;

    let desc = unsafe { texture.GetDesc() };
    let layout = TextureLayout::new(&describe(&desc))?;

    let mut timer = ReadbackTimer::start(format!(
        "readback of {}x{} {:?} texture",
        layout.width, layout.height, layout.format
    ));

    let staging = ReadbackBuffer::create(&graphics.device, layout.staging_size())?;
    let copy = CopyCommand::create(&graphics.device)?;
    copy.record_texture_copy(texture, desc.Format, &layout, &staging)?;
    let fence = CompletionFence::create(&graphics.device)?;
    timer.mark("record");

    // nothing past the submission may release these before the fence is reached
    copy.submit(&graphics.queue)?;
    let in_flight = InFlight::new("texture copy resources", (staging, copy, fence));
    in_flight
        .get()
        .2
        .signal_and_wait(&graphics.queue, COPY_FENCE_VALUE)?;
    let (staging, _copy, _fence) = in_flight.settle();
    timer.mark("gpu wait");

    let mapped = staging.map()?;
    let pixels = layout.pack_rows(&mapped)?;
    timer.mark("pack");

    log::trace!(
        "read back {} bytes through a {} byte staging buffer",
        pixels.len(),
        staging.size()
    );

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use windows::Win32::Graphics::{
        Direct3D12::{
            D3D12_RESOURCE_DIMENSION_TEXTURE2D, D3D12_RESOURCE_DIMENSION_TEXTURE3D,
            D3D12_TEXTURE_LAYOUT_UNKNOWN,
        },
        Dxgi::Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_SAMPLE_DESC},
    };

    use crate::readback::PixelFormat;

    use super::*;

    fn bgra_texture_desc(width: u64, height: u32) -> D3D12_RESOURCE_DESC {
        D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Width: width,
            Height: height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            ..Default::default()
        }
    }

    #[test]
    fn describes_a_bgra_2d_texture() {
        let description = describe(&bgra_texture_desc(640, 480));

        assert_eq!(
            description,
            TextureDescription {
                dimension: TextureDimension::Texture2D,
                format: 87,
                width: 640,
                height: 480,
                sample_count: 1,
            }
        );

        let layout = TextureLayout::new(&description).unwrap();
        assert_eq!(layout.format, PixelFormat::Bgra8);
        assert_eq!(layout.packed_size(), 640 * 480 * 4);
    }

    #[test]
    fn describes_dimension_and_samples_verbatim() {
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE3D,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 4,
                Quality: 0,
            },
            ..bgra_texture_desc(16, 16)
        };
        let description = describe(&desc);

        assert_eq!(description.dimension, TextureDimension::Texture3D);
        assert_eq!(description.sample_count, 4);
    }
}
