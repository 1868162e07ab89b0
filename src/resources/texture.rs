use anyhow::Context;
use image::{ImageFormat, RgbaImage};

use crate::resources::load_binary;

/// Decode image bytes into RGBA8.
///
/// `file_name` is only used to guess the format from its extension; the bytes
/// are sniffed when the extension is unknown.
pub fn decode_image(bytes: &[u8], file_name: &str) -> anyhow::Result<RgbaImage> {
    let format = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension);
    let img = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    }
    .with_context(|| format!("could not decode {file_name}"))?;
    Ok(img.to_rgba8())
}

pub async fn load_baked_image(file_name: &str) -> anyhow::Result<RgbaImage> {
    let data = load_binary(file_name).await?;
    decode_image(&data, file_name)
}
