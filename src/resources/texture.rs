use std::path::Path;

use image::imageops::FilterType;

use crate::{gpu::TextureData, resources::AssetSource};

/// Reads and decodes an image file into RGBA8 together with its full mip chain.
pub fn load_texture_data(source: &AssetSource, path: &Path) -> anyhow::Result<TextureData> {
    let bytes = source.load_binary(path)?;
    texture_from_bytes(&bytes)
}

/// Decodes raw image file contents. The format is guessed from the data.
pub fn texture_from_bytes(bytes: &[u8]) -> anyhow::Result<TextureData> {
    let img = image::load_from_memory(bytes)?;
    Ok(texture_from_rgba(img.to_rgba8()))
}

pub fn texture_from_rgba(base: image::RgbaImage) -> TextureData {
    let (width, height) = base.dimensions();
    TextureData {
        width,
        height,
        levels: mip_chain(base),
    }
}

/**
 * Builds all mip levels down to 1x1 with a linear filter.
 *
 * The GPU API has no automatic mipmap generation so the chain is produced here before upload.
 */
pub fn mip_chain(base: image::RgbaImage) -> Vec<image::RgbaImage> {
    let mut levels = vec![base];
    loop {
        let Some(prev) = levels.last() else { break };
        let (w, h) = prev.dimensions();
        if w <= 1 && h <= 1 {
            break;
        }
        let next = image::imageops::resize(prev, (w / 2).max(1), (h / 2).max(1), FilterType::Triangle);
        levels.push(next);
    }
    levels
}

/// Number of mip levels for a texture of the given size.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}
