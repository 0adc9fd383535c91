//! Device texture cache for repeatedly drawn images.

use rustc_hash::FxHashMap;

use crate::device::{DeviceError, GpuDevice, TextureFormat, TextureId};

/// An image that can be uploaded and drawn. Sources are identified by a
/// stable id; a non-static source is re-uploaded on every draw so
/// animated content stays current.
pub trait ImageSource {
    fn source_id(&self) -> u64;
    fn size(&self) -> (u32, u32);
    /// Premultiplied RGBA bytes, rows top-down.
    fn rgba_pixels(&self) -> &[u8];
    fn is_static(&self) -> bool {
        true
    }
}

/// Owned bitmap image, the plain way to feed `draw_image`.
#[derive(Clone, Debug)]
pub struct BitmapImage {
    id: u64,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl BitmapImage {
    /// Fails if the byte length does not match the dimensions.
    pub fn new(id: u64, width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != (width * height * 4) as usize {
            return None;
        }
        Some(Self {
            id,
            width,
            height,
            pixels,
        })
    }
}

impl ImageSource for BitmapImage {
    fn source_id(&self) -> u64 {
        self.id
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn rgba_pixels(&self) -> &[u8] {
        &self.pixels
    }
}

struct CachedTexture {
    texture: TextureId,
    width: u32,
    height: u32,
}

/// Maps image source ids to live device textures.
#[derive(Default)]
pub struct TextureCache {
    entries: FxHashMap<u64, CachedTexture>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the device texture for a source, uploading on first use.
    /// Cached entries are refreshed for non-static sources, and replaced
    /// outright if the source changed dimensions.
    pub fn get_or_upload<D: GpuDevice>(
        &mut self,
        device: &mut D,
        source: &dyn ImageSource,
    ) -> Result<TextureId, DeviceError> {
        let id = source.source_id();
        let (width, height) = source.size();
        if let Some(entry) = self.entries.get(&id) {
            if entry.width == width && entry.height == height {
                let texture = entry.texture;
                if !source.is_static() {
                    device.update_texture(texture, source.rgba_pixels())?;
                }
                return Ok(texture);
            }
            device.delete_texture(entry.texture);
            self.entries.remove(&id);
        }
        let texture =
            device.create_texture(TextureFormat::Rgba8, width, height, source.rgba_pixels())?;
        self.entries.insert(
            id,
            CachedTexture {
                texture,
                width,
                height,
            },
        );
        Ok(texture)
    }

    pub fn evict<D: GpuDevice>(&mut self, device: &mut D, source_id: u64) {
        if let Some(entry) = self.entries.remove(&source_id) {
            device.delete_texture(entry.texture);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
