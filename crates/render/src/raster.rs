use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg;

use crate::error::RenderError;

/// Rasterize an SVG document to PNG on a white background.
///
/// With `max_side`, the image is scaled down (never up) so its longest
/// side fits.
pub fn svg_to_png(svg: &[u8], max_side: Option<u32>) -> Result<Vec<u8>, RenderError> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_data(svg, &options)
        .map_err(|e| RenderError::Raster(format!("failed to parse SVG: {e}")))?;

    let size = tree.size();
    let longest = size.width().max(size.height());
    let scale = match max_side {
        Some(limit) if limit > 0 && longest > limit as f32 => limit as f32 / longest,
        _ => 1.0,
    };

    let width = (size.width() * scale).ceil().max(1.0) as u32;
    let height = (size.height() * scale).ceil().max(1.0) as u32;

    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        RenderError::Raster(format!("failed to allocate {width}x{height} surface"))
    })?;
    pixmap.fill(Color::WHITE);

    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| RenderError::Raster(format!("failed to encode PNG: {e}")))
}

/// Width and height of a PNG, if it decodes.
pub fn png_dimensions(png: &[u8]) -> Option<(u32, u32)> {
    Pixmap::decode_png(png).ok().map(|p| (p.width(), p.height()))
}
