//! Texture handling for the rendering pipeline.
//!
//! `Texture` is the scene-side handle: an id plus an RGBA image that may still be
//! decoding. `GpuTexture` wraps the wgpu objects created from it, and also provides
//! the depth attachment used by the render pass.

use std::path::PathBuf;

use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::assets::{Asset, AssetState};
use crate::error::{EngineError, EngineResult};

/// Identity of a texture, usually the path it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub String);

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A texture referenced by materials.
#[derive(Debug, Clone)]
pub struct Texture {
    id: TextureId,
    image: Asset<RgbaImage>,
}

impl Texture {
    /// A texture from an already decoded image.
    pub fn from_rgba(id: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            id: TextureId(id.into()),
            image: Asset::ready(image),
        }
    }

    /// Decodes an encoded image (PNG) held in memory.
    ///
    /// # Returns
    /// The texture, or `TextureDecode` if the bytes are not a supported image.
    pub fn from_bytes(id: impl Into<String>, bytes: &[u8]) -> EngineResult<Self> {
        let id = id.into();
        let image = image::load_from_memory(bytes)
            .map_err(|source| EngineError::TextureDecode {
                id: id.clone(),
                source,
            })?
            .to_rgba8();
        Ok(Self::from_rgba(id, image))
    }

    /// Decodes the image at `path` on a loader thread. The texture is not ready
    /// until decoding finishes.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = TextureId(path.display().to_string());
        let image = Asset::load_with(move || {
            image::open(&path)
                .map(|decoded| decoded.to_rgba8())
                .map_err(|e| format!("{}: {e}", path.display()))
        });
        Self { id, image }
    }

    /// A texture whose image is completed later through its asset sender.
    pub fn with_image(id: impl Into<String>, image: Asset<RgbaImage>) -> Self {
        Self {
            id: TextureId(id.into()),
            image,
        }
    }

    /// A 1×1 texture of a single color.
    pub fn solid(id: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self::from_rgba(id, RgbaImage::from_pixel(1, 1, image::Rgba(rgba)))
    }

    pub fn id(&self) -> &TextureId {
        &self.id
    }

    /// Decoded pixels once available.
    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.get()
    }

    pub fn state(&self) -> AssetState {
        self.image.state()
    }

    /// Why decoding failed, once it has.
    pub fn load_error(&self) -> Option<&str> {
        self.image.error()
    }

    /// Whether the pixels can be uploaded.
    pub fn is_ready(&self) -> bool {
        self.image.state() == AssetState::Ready
    }
}

/// Represents a GPU texture with associated view and sampler.
pub struct GpuTexture {
    /// The underlying WebGPU texture resource.
    pub texture: wgpu::Texture,
    /// The texture view used for binding the texture to the pipeline.
    pub view: wgpu::TextureView,
    /// The sampler used for texture filtering and addressing.
    pub sampler: wgpu::Sampler,
}

impl GpuTexture {
    /// The texture format used for depth buffers.
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
    /// The format color textures are uploaded in.
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Creates a new depth texture.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `width`, `height` - Size of the render target
    /// * `label` - Debug label for the texture
    pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        };

        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            lod_min_clamp: 0.0,
            lod_max_clamp: 100.0,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Uploads an RGBA image. Pixel art atlases are sampled with nearest filtering.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &RgbaImage,
        label: &str,
    ) -> Self {
        let (width, height) = image.dimensions();
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: Self::COLOR_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            image.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decodes_png_bytes() {
        let mut png = Vec::new();
        RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let texture = Texture::from_bytes("tile", &png).unwrap();
        assert!(texture.is_ready());
        assert_eq!(texture.image().map(|i| i.dimensions()), Some((2, 3)));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let result = Texture::from_bytes("broken", b"not an image");
        assert!(matches!(result, Err(EngineError::TextureDecode { id, .. }) if id == "broken"));
    }

    #[test]
    fn missing_file_fails_asynchronously() {
        let texture = Texture::from_file("/nonexistent/atlas.png");
        let deadline = web_time::Instant::now() + std::time::Duration::from_secs(5);
        while texture.state() == AssetState::Pending && web_time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(texture.state(), AssetState::Failed);
        assert!(!texture.is_ready());
    }
}
