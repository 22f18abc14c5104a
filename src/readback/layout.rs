use thiserror::Error;

/// Every texture this plugin reads back stores one pixel in four bytes.
pub const BYTES_PER_PIXEL: u32 = 4;

/// `D3D12_TEXTURE_DATA_PITCH_ALIGNMENT`: rows of a placed footprint start on this boundary.
pub const ROW_PITCH_ALIGNMENT: u32 = 256;

// DXGI_FORMAT values of the formats with a 4-byte texel.
const DXGI_FORMAT_R10G10B10A2_TYPELESS: u32 = 23;
const DXGI_FORMAT_R10G10B10A2_UNORM: u32 = 24;
const DXGI_FORMAT_R10G10B10A2_UINT: u32 = 25;
const DXGI_FORMAT_R8G8B8A8_TYPELESS: u32 = 27;
const DXGI_FORMAT_R8G8B8A8_UNORM: u32 = 28;
const DXGI_FORMAT_R8G8B8A8_UNORM_SRGB: u32 = 29;
const DXGI_FORMAT_R8G8B8A8_UINT: u32 = 30;
const DXGI_FORMAT_R8G8B8A8_SNORM: u32 = 31;
const DXGI_FORMAT_R8G8B8A8_SINT: u32 = 32;
const DXGI_FORMAT_B8G8R8A8_UNORM: u32 = 87;
const DXGI_FORMAT_B8G8R8X8_UNORM: u32 = 88;
const DXGI_FORMAT_B8G8R8A8_TYPELESS: u32 = 90;
const DXGI_FORMAT_B8G8R8A8_UNORM_SRGB: u32 = 91;
const DXGI_FORMAT_B8G8R8X8_TYPELESS: u32 = 92;
const DXGI_FORMAT_B8G8R8X8_UNORM_SRGB: u32 = 93;

/// Channel order of the bytes handed back to the caller. The bytes are copied verbatim, no
/// swizzling happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
    Bgrx8,
    Rgb10A2,
}

impl PixelFormat {
    pub fn from_dxgi(format: u32) -> Option<Self> {
        match format {
            DXGI_FORMAT_R8G8B8A8_TYPELESS
            | DXGI_FORMAT_R8G8B8A8_UNORM
            | DXGI_FORMAT_R8G8B8A8_UNORM_SRGB
            | DXGI_FORMAT_R8G8B8A8_UINT
            | DXGI_FORMAT_R8G8B8A8_SNORM
            | DXGI_FORMAT_R8G8B8A8_SINT => Some(Self::Rgba8),
            DXGI_FORMAT_B8G8R8A8_TYPELESS
            | DXGI_FORMAT_B8G8R8A8_UNORM
            | DXGI_FORMAT_B8G8R8A8_UNORM_SRGB => Some(Self::Bgra8),
            DXGI_FORMAT_B8G8R8X8_TYPELESS
            | DXGI_FORMAT_B8G8R8X8_UNORM
            | DXGI_FORMAT_B8G8R8X8_UNORM_SRGB => Some(Self::Bgrx8),
            DXGI_FORMAT_R10G10B10A2_TYPELESS
            | DXGI_FORMAT_R10G10B10A2_UNORM
            | DXGI_FORMAT_R10G10B10A2_UINT => Some(Self::Rgb10A2),
            _ => None,
        }
    }
}

/// Mirror of `D3D12_RESOURCE_DIMENSION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    Unknown,
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

impl TextureDimension {
    pub fn from_d3d12(dimension: i32) -> Self {
        match dimension {
            1 => Self::Buffer,
            2 => Self::Texture1D,
            3 => Self::Texture2D,
            4 => Self::Texture3D,
            _ => Self::Unknown,
        }
    }
}

/// The parts of a resource description that decide whether and how it can be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescription {
    pub dimension: TextureDimension,
    pub format: u32,
    pub width: u64,
    pub height: u32,
    pub sample_count: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextureLayoutError {
    #[error("resource is a {0:?}, only 2D textures can be read back")]
    NotTexture2D(TextureDimension),

    #[error("DXGI format {0} does not have a 4-byte pixel")]
    UnsupportedFormat(u32),

    #[error("multisampled textures ({0} samples) cannot be copied to a buffer")]
    Multisampled(u32),

    #[error("texture has an empty extent ({width}x{height})")]
    EmptyExtent { width: u64, height: u32 },

    #[error("texture of {width}x{height} pixels does not fit in a copy footprint")]
    TooLarge { width: u64, height: u32 },

    #[error("staging data holds {actual} bytes, at least {expected} are needed")]
    StagingTooSmall { expected: usize, actual: usize },
}

/// Where the rows of a texture land in the staging buffer, and how large the packed result is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLayout {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Distance between the starts of two rows in the staging buffer.
    pub row_pitch: u32,
    /// Bytes of pixel data in one row, without padding.
    pub row_size: u32,
}

impl TextureLayout {
    pub fn new(description: &TextureDescription) -> Result<Self, TextureLayoutError> {
        if description.dimension != TextureDimension::Texture2D {
            return Err(TextureLayoutError::NotTexture2D(description.dimension));
        }

        let format = PixelFormat::from_dxgi(description.format)
            .ok_or(TextureLayoutError::UnsupportedFormat(description.format))?;

        if description.sample_count > 1 {
            return Err(TextureLayoutError::Multisampled(description.sample_count));
        }

        let (width, height) = (description.width, description.height);
        if width == 0 || height == 0 {
            return Err(TextureLayoutError::EmptyExtent { width, height });
        }

        let too_large = TextureLayoutError::TooLarge { width, height };
        let width = u32::try_from(width).map_err(|_| too_large.clone())?;
        let row_size = width
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or_else(|| too_large.clone())?;
        let row_pitch = row_size
            .checked_next_multiple_of(ROW_PITCH_ALIGNMENT)
            .ok_or_else(|| too_large.clone())?;

        let layout = Self {
            width,
            height,
            format,
            row_pitch,
            row_size,
        };

        // the packed copy has to be addressable on the host
        usize::try_from(layout.staging_size()).map_err(|_| too_large)?;

        Ok(layout)
    }

    /// Size of the readback buffer receiving the copy.
    pub fn staging_size(&self) -> u64 {
        u64::from(self.row_pitch) * u64::from(self.height)
    }

    /// Size of the tightly packed pixels handed to the caller: `width * height * 4`.
    pub fn packed_size(&self) -> usize {
        self.row_size as usize * self.height as usize
    }

    /// Copies the pixel rows out of `staging`, dropping the padding at the end of each row.
    pub fn pack_rows(&self, staging: &[u8]) -> Result<Box<[u8]>, TextureLayoutError> {
        let row_pitch = self.row_pitch as usize;
        let row_size = self.row_size as usize;
        if self.height == 0 {
            return Ok(Box::default());
        }

        // the last row does not need its padding to be present
        let expected = row_pitch * (self.height as usize - 1) + row_size;
        if staging.len() < expected {
            return Err(TextureLayoutError::StagingTooSmall {
                expected,
                actual: staging.len(),
            });
        }

        if row_pitch == row_size {
            return Ok(staging[..self.packed_size()].into());
        }

        let mut pixels = Vec::with_capacity(self.packed_size());
        for row in staging.chunks(row_pitch).take(self.height as usize) {
            pixels.extend_from_slice(&row[..row_size]);
        }

        Ok(pixels.into_boxed_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_texture(width: u64, height: u32) -> TextureDescription {
        TextureDescription {
            dimension: TextureDimension::Texture2D,
            format: DXGI_FORMAT_R8G8B8A8_UNORM,
            width,
            height,
            sample_count: 1,
        }
    }

    #[test]
    fn packed_size_is_four_bytes_per_pixel() {
        for (width, height) in [(1, 1), (3, 7), (64, 64), (100, 3), (1920, 1080)] {
            let layout = TextureLayout::new(&rgba_texture(width, height)).unwrap();
            assert_eq!(layout.packed_size(), width as usize * height as usize * 4);
        }
    }

    #[test]
    fn row_pitch_is_aligned_and_holds_a_row() {
        for width in [1, 63, 64, 65, 100, 1000, 4096] {
            let layout = TextureLayout::new(&rgba_texture(width, 2)).unwrap();
            assert_eq!(layout.row_pitch % ROW_PITCH_ALIGNMENT, 0);
            assert!(layout.row_pitch >= layout.row_size);
            assert!(layout.row_pitch - layout.row_size < ROW_PITCH_ALIGNMENT);
        }
    }

    #[test]
    fn staging_size_covers_every_padded_row() {
        let layout = TextureLayout::new(&rgba_texture(100, 3)).unwrap();
        assert_eq!(layout.row_size, 400);
        assert_eq!(layout.row_pitch, 512);
        assert_eq!(layout.staging_size(), 512 * 3);
    }

    #[test]
    fn packing_drops_row_padding() {
        let layout = TextureLayout::new(&rgba_texture(3, 2)).unwrap();
        let mut staging = vec![0xAA; layout.staging_size() as usize];
        staging[..12].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        staging[256..268].copy_from_slice(&[13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24]);

        let pixels = layout.pack_rows(&staging).unwrap();

        assert_eq!(pixels.len(), 24);
        assert_eq!(&pixels[..], (1..=24).collect::<Vec<u8>>().as_slice());
    }

    #[test]
    fn packing_without_padding_copies_straight_through() {
        let layout = TextureLayout::new(&rgba_texture(64, 2)).unwrap();
        assert_eq!(layout.row_pitch, layout.row_size);

        let staging: Vec<u8> = (0..layout.staging_size()).map(|i| i as u8).collect();
        let pixels = layout.pack_rows(&staging).unwrap();

        assert_eq!(&pixels[..], staging.as_slice());
    }

    #[test]
    fn last_row_padding_is_optional() {
        let layout = TextureLayout::new(&rgba_texture(2, 2)).unwrap();
        let staging = vec![7; 256 + 8];

        assert_eq!(layout.pack_rows(&staging).unwrap().len(), 16);
    }

    #[test]
    fn short_staging_is_rejected() {
        let layout = TextureLayout::new(&rgba_texture(2, 2)).unwrap();
        let staging = vec![0; 256 + 7];

        assert_eq!(
            layout.pack_rows(&staging),
            Err(TextureLayoutError::StagingTooSmall {
                expected: 264,
                actual: 263
            })
        );
    }

    #[test]
    fn accepts_four_byte_formats_only() {
        assert_eq!(PixelFormat::from_dxgi(28), Some(PixelFormat::Rgba8));
        assert_eq!(PixelFormat::from_dxgi(87), Some(PixelFormat::Bgra8));
        assert_eq!(PixelFormat::from_dxgi(93), Some(PixelFormat::Bgrx8));
        assert_eq!(PixelFormat::from_dxgi(24), Some(PixelFormat::Rgb10A2));

        // R16G16B16A16_FLOAT, R8_UNORM, BC1_UNORM, UNKNOWN
        for format in [10, 61, 71, 0] {
            let description = TextureDescription {
                format,
                ..rgba_texture(4, 4)
            };
            assert_eq!(
                TextureLayout::new(&description),
                Err(TextureLayoutError::UnsupportedFormat(format))
            );
        }
    }

    #[test]
    fn rejects_non_2d_resources() {
        for dimension in [0, 1, 2, 4] {
            let description = TextureDescription {
                dimension: TextureDimension::from_d3d12(dimension),
                ..rgba_texture(4, 4)
            };
            assert!(matches!(
                TextureLayout::new(&description),
                Err(TextureLayoutError::NotTexture2D(_))
            ));
        }
    }

    #[test]
    fn rejects_multisampled_and_empty_textures() {
        let description = TextureDescription {
            sample_count: 4,
            ..rgba_texture(4, 4)
        };
        assert_eq!(
            TextureLayout::new(&description),
            Err(TextureLayoutError::Multisampled(4))
        );

        assert_eq!(
            TextureLayout::new(&rgba_texture(0, 4)),
            Err(TextureLayoutError::EmptyExtent {
                width: 0,
                height: 4
            })
        );
        assert!(TextureLayout::new(&rgba_texture(4, 0)).is_err());
    }

    #[test]
    fn rejects_widths_overflowing_the_footprint() {
        let width = u64::from(u32::MAX / 4 + 1);
        assert_eq!(
            TextureLayout::new(&rgba_texture(width, 1)),
            Err(TextureLayoutError::TooLarge { width, height: 1 })
        );
        assert!(TextureLayout::new(&rgba_texture(u64::from(u32::MAX) + 1, 1)).is_err());
    }
}
