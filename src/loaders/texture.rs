use std::path::Path;

use anyhow::{Context, Result};

use crate::scene::Texture;

/// Decodes an image file into RGBA8
pub fn load_texture(path: impl AsRef<Path>, progress: &mut dyn FnMut(f32)) -> Result<Texture> {
    let path = path.as_ref();
    log::info!("Loading texture: {:?}", path);
    progress(0.0);

    let image = image::open(path)
        .with_context(|| format!("Failed to load texture: {:?}", path))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    progress(1.0);

    log::debug!("Texture {:?}: {}x{}", path, width, height);
    Ok(Texture {
        width,
        height,
        rgba: image.into_raw(),
    })
}
