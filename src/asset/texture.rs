// asset/texture.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::renderer::{GraphicsDevice, TextureHandle};

/// Key of the 1x1 white texture every manager starts with.
pub const NULL_TEXTURE_KEY: u32 = 0;

#[derive(Debug)]
struct TextureEntry {
    handle: TextureHandle,
    width: u32,
    height: u32,
}

/// Maps material texture keys to uploaded device textures.
#[derive(Debug)]
pub struct TextureManager {
    entries: HashMap<u32, TextureEntry>,
    next_key: u32,
}

impl TextureManager {
    pub fn new(device: &mut dyn GraphicsDevice) -> Self {
        let white = device.create_texture(1, 1, &[255, 255, 255, 255]);
        let mut entries = HashMap::new();
        entries.insert(
            NULL_TEXTURE_KEY,
            TextureEntry {
                handle: white,
                width: 1,
                height: 1,
            },
        );
        Self {
            entries,
            next_key: NULL_TEXTURE_KEY + 1,
        }
    }

    pub fn load(&mut self, device: &mut dyn GraphicsDevice, path: impl AsRef<Path>) -> Result<u32> {
        let path = path.as_ref();
        log::info!("Loading texture: {:?}", path);

        let image = image::open(path).map_err(|source| EngineError::Texture {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        self.insert_rgba8(device, width, height, &rgba)
    }

    /// Decodes an in-memory image; `label` only shows up in errors.
    pub fn load_from_memory(
        &mut self,
        device: &mut dyn GraphicsDevice,
        label: &str,
        bytes: &[u8],
    ) -> Result<u32> {
        let image = image::load_from_memory(bytes).map_err(|source| EngineError::Texture {
            path: PathBuf::from(label),
            source,
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        self.insert_rgba8(device, width, height, &rgba)
    }

    pub fn insert_rgba8(
        &mut self,
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<u32> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected || expected == 0 {
            return Err(EngineError::TextureSize {
                expected,
                actual: rgba.len(),
            });
        }

        let key = self.next_key;
        self.next_key += 1;
        let handle = device.create_texture(width, height, rgba);
        self.entries.insert(
            key,
            TextureEntry {
                handle,
                width,
                height,
            },
        );
        log::debug!("Texture {} uploaded ({}x{})", key, width, height);
        Ok(key)
    }

    /// Device texture for `key`, or the white texture for unknown keys.
    pub fn resolve(&self, key: u32) -> Option<TextureHandle> {
        self.entries
            .get(&key)
            .or_else(|| self.entries.get(&NULL_TEXTURE_KEY))
            .map(|entry| entry.handle)
    }

    pub fn contains(&self, key: u32) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn size(&self, key: u32) -> Option<(u32, u32)> {
        self.entries.get(&key).map(|entry| (entry.width, entry.height))
    }

    /// The white texture cannot be released.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice, key: u32) {
        if key == NULL_TEXTURE_KEY {
            return;
        }
        if let Some(entry) = self.entries.remove(&key) {
            device.release_texture(entry.handle);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::soft::SoftDevice;

    #[test]
    fn starts_with_white_null_texture() {
        let mut device = SoftDevice::new(1, 1);
        let textures = TextureManager::new(&mut device);
        assert!(textures.contains(NULL_TEXTURE_KEY));
        assert_eq!(textures.size(NULL_TEXTURE_KEY), Some((1, 1)));
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn unknown_key_falls_back_to_white() {
        let mut device = SoftDevice::new(1, 1);
        let textures = TextureManager::new(&mut device);
        assert_eq!(textures.resolve(42), textures.resolve(NULL_TEXTURE_KEY));
    }

    #[test]
    fn insert_checks_byte_count() {
        let mut device = SoftDevice::new(1, 1);
        let mut textures = TextureManager::new(&mut device);

        let err = textures.insert_rgba8(&mut device, 2, 2, &[0; 12]).unwrap_err();
        assert!(matches!(err, EngineError::TextureSize { expected: 16, actual: 12 }));

        let key = textures.insert_rgba8(&mut device, 2, 2, &[0; 16]).unwrap();
        assert_ne!(key, NULL_TEXTURE_KEY);
        textures.release(&mut device, key);
        textures.release(&mut device, NULL_TEXTURE_KEY);
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn decodes_png_bytes() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let mut device = SoftDevice::new(1, 1);
        let mut textures = TextureManager::new(&mut device);
        let key = textures.load_from_memory(&mut device, "inline.png", &png).unwrap();
        assert_eq!(textures.size(key), Some((3, 2)));

        assert!(textures
            .load_from_memory(&mut device, "broken.png", &[1, 2, 3])
            .is_err());
    }
}
