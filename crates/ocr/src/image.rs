//! Turning a submitted drawing into a raster image a vision model can read.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use extract::ImageInput;
use resvg::tiny_skia::{Color, FilterQuality, Pixmap, PixmapPaint, Transform};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{info, warn};

use crate::error::DrawingError;

/// A decoded drawing submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawingInput {
    Png(Vec<u8>),
    Jpeg(Vec<u8>),
    Svg(Vec<u8>),
}

impl DrawingInput {
    /// Accepts PNG/JPEG data URLs, SVG data URLs (base64 or inline) and raw SVG markup.
    pub fn parse(raw: &str) -> Result<Self, DrawingError> {
        let trimmed = raw.trim();

        if trimmed.starts_with("blob:") {
            return Err(DrawingError::UnsupportedInput(
                "blob URLs cannot be fetched server-side, send the drawing content instead".to_string(),
            ));
        }

        if let Some(rest) = trimmed.strip_prefix("data:") {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                DrawingError::UnsupportedInput("data URL without a payload".to_string())
            })?;
            let mut parts = header.split(';');
            let mime = parts.next().unwrap_or_default().to_ascii_lowercase();
            let is_base64 = parts.any(|p| p.eq_ignore_ascii_case("base64"));

            let bytes = if is_base64 {
                STANDARD.decode(payload.trim())?
            } else {
                urlencoding::decode_binary(payload.as_bytes()).into_owned()
            };

            return match mime.as_str() {
                "image/png" => Ok(DrawingInput::Png(bytes)),
                "image/jpeg" | "image/jpg" => Ok(DrawingInput::Jpeg(bytes)),
                "image/svg+xml" => Ok(DrawingInput::Svg(bytes)),
                other => Err(DrawingError::UnsupportedInput(format!(
                    "unsupported data URL type '{}'",
                    other
                ))),
            };
        }

        if trimmed.starts_with("<svg") || trimmed.starts_with("<?xml") {
            return Ok(DrawingInput::Svg(trimmed.as_bytes().to_vec()));
        }

        Err(DrawingError::UnsupportedInput(
            "expected an image data URL or SVG markup".to_string(),
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DrawingInput::Png(_) => "png",
            DrawingInput::Jpeg(_) => "jpeg",
            DrawingInput::Svg(_) => "svg",
        }
    }
}

/// Which step produced the raster image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterStage {
    /// Submitted as a raster image.
    Original,
    Resvg,
    RsvgConvert,
    /// Every converter failed; a labeled blank image stands in.
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub image: ImageInput,
    pub stage: RasterStage,
}

#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Longest side of the image sent to the model.
    pub max_side: u32,
    /// `rsvg-convert` executable used when resvg fails; empty disables it.
    pub rsvg_convert: String,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            max_side: 768,
            rsvg_convert: "rsvg-convert".to_string(),
        }
    }
}

/// Decode, flatten and downscale the drawing.
///
/// Raster input that does not decode is an error; SVG input always
/// yields an image.
pub fn prepare_image(input: DrawingInput, options: &RasterOptions) -> Result<PreparedImage, DrawingError> {
    match input {
        DrawingInput::Png(bytes) => {
            let png = fit_png(&bytes, options.max_side)?;
            Ok(PreparedImage {
                image: ImageInput::png(png),
                stage: RasterStage::Original,
            })
        }
        DrawingInput::Jpeg(bytes) => {
            if !bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
                return Err(DrawingError::InvalidImage("data is not a JPEG image".to_string()));
            }
            // Passed through unscaled; only PNG is re-encoded here.
            Ok(PreparedImage {
                image: ImageInput {
                    mime_type: "image/jpeg".to_string(),
                    data: bytes,
                },
                stage: RasterStage::Original,
            })
        }
        DrawingInput::Svg(bytes) => Ok(rasterize_svg(&bytes, options)),
    }
}

/// resvg, then `rsvg-convert`, then a labeled blank image. First success wins.
pub fn rasterize_svg(svg: &[u8], options: &RasterOptions) -> PreparedImage {
    match render::svg_to_png(svg, Some(options.max_side)) {
        Ok(png) => {
            info!(bytes = png.len(), "Rasterized drawing with resvg");
            return PreparedImage {
                image: ImageInput::png(png),
                stage: RasterStage::Resvg,
            };
        }
        Err(e) => warn!(error = %e, "resvg could not rasterize drawing, trying rsvg-convert"),
    }

    if !options.rsvg_convert.is_empty() {
        match run_rsvg_convert(&options.rsvg_convert, svg).and_then(|png| fit_png(&png, options.max_side)) {
            Ok(png) => {
                info!(bytes = png.len(), "Rasterized drawing with rsvg-convert");
                return PreparedImage {
                    image: ImageInput::png(png),
                    stage: RasterStage::RsvgConvert,
                };
            }
            Err(e) => warn!(error = %e, "rsvg-convert failed, using placeholder image"),
        }
    }

    PreparedImage {
        image: placeholder_image(),
        stage: RasterStage::Placeholder,
    }
}

fn run_rsvg_convert(program: &str, svg: &[u8]) -> Result<Vec<u8>, DrawingError> {
    let mut child = Command::new(program)
        .args(["--format", "png"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| DrawingError::InvalidImage(format!("failed to start {}: {}", program, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(svg) {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            return Err(DrawingError::InvalidImage(format!("failed to write SVG: {}", e)));
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| DrawingError::InvalidImage(e.to_string()))?;
    if !output.status.success() {
        return Err(DrawingError::InvalidImage(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output.stdout)
}

/// Flatten onto white and shrink so the longest side is at most `max_side`.
pub fn fit_png(png: &[u8], max_side: u32) -> Result<Vec<u8>, DrawingError> {
    let source = Pixmap::decode_png(png)
        .map_err(|e| DrawingError::InvalidImage(format!("failed to decode PNG: {}", e)))?;

    let longest = source.width().max(source.height());
    let scale = if max_side > 0 && longest > max_side {
        max_side as f32 / longest as f32
    } else {
        1.0
    };
    let width = ((source.width() as f32 * scale).round() as u32).max(1);
    let height = ((source.height() as f32 * scale).round() as u32).max(1);

    let mut target = Pixmap::new(width, height)
        .ok_or_else(|| DrawingError::InvalidImage(format!("cannot allocate {}x{} image", width, height)))?;
    target.fill(Color::WHITE);

    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    target.draw_pixmap(0, 0, source.as_ref(), &paint, Transform::from_scale(scale, scale), None);

    if scale < 1.0 {
        info!(width, height, "Resized drawing for the vision model");
    }

    target
        .encode_png()
        .map_err(|e| DrawingError::InvalidImage(format!("failed to encode PNG: {}", e)))
}

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="800" height="600"><rect width="800" height="600" fill="#ffffff"/><text x="10" y="24" font-family="Helvetica, Arial, sans-serif" font-size="16" fill="#ff0000">SVG conversion failed</text><text x="10" y="48" font-family="Helvetica, Arial, sans-serif" font-size="16" fill="#000000">Please try again with a different drawing</text></svg>"##;

/// 800x600 white image noting the conversion failure.
pub fn placeholder_image() -> ImageInput {
    if let Ok(png) = render::svg_to_png(PLACEHOLDER_SVG.as_bytes(), None) {
        return ImageInput::png(png);
    }

    if let Some(mut blank) = Pixmap::new(800, 600) {
        blank.fill(Color::WHITE);
        if let Ok(png) = blank.encode_png() {
            return ImageInput::png(png);
        }
    }

    ImageInput {
        mime_type: "image/svg+xml".to_string(),
        data: PLACEHOLDER_SVG.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_of(width: u32, height: u32) -> Vec<u8> {
        let mut pixmap = Pixmap::new(width, height).unwrap();
        pixmap.fill(Color::from_rgba8(30, 80, 120, 255));
        pixmap.encode_png().unwrap()
    }

    fn dimensions(png: &[u8]) -> (u32, u32) {
        let pixmap = Pixmap::decode_png(png).unwrap();
        (pixmap.width(), pixmap.height())
    }

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50"><rect width="100" height="50" fill="blue"/></svg>"#;

    #[test]
    fn parses_png_data_url() {
        let png = png_of(4, 4);
        let url = format!("data:image/png;base64,{}", STANDARD.encode(&png));
        assert_eq!(DrawingInput::parse(&url).unwrap(), DrawingInput::Png(png));
    }

    #[test]
    fn parses_svg_variants() {
        let encoded = format!("data:image/svg+xml;base64,{}", STANDARD.encode(SVG));
        assert_eq!(DrawingInput::parse(&encoded).unwrap(), DrawingInput::Svg(SVG.as_bytes().to_vec()));

        let inline = "data:image/svg+xml;utf8,%3Csvg xmlns='http://www.w3.org/2000/svg'/%3E";
        assert_eq!(
            DrawingInput::parse(inline).unwrap(),
            DrawingInput::Svg(b"<svg xmlns='http://www.w3.org/2000/svg'/>".to_vec())
        );

        assert!(matches!(DrawingInput::parse(SVG).unwrap(), DrawingInput::Svg(_)));
        assert!(matches!(
            DrawingInput::parse("<?xml version=\"1.0\"?><svg/>").unwrap(),
            DrawingInput::Svg(_)
        ));
    }

    #[test]
    fn inline_svg_decodes_multibyte_and_keeps_stray_percent() {
        let inline = "data:image/svg+xml,%3Csvg%3E%3Ctext%3E%E2%9C%93 100%%3C/text%3E%3C/svg%3E";
        assert_eq!(
            DrawingInput::parse(inline).unwrap(),
            DrawingInput::Svg("<svg><text>✓ 100%</text></svg>".as_bytes().to_vec())
        );
    }

    #[test]
    fn rejects_blob_and_unknown_inputs() {
        assert!(matches!(
            DrawingInput::parse("blob:http://localhost/1234"),
            Err(DrawingError::UnsupportedInput(_))
        ));
        assert!(matches!(
            DrawingInput::parse("data:image/gif;base64,R0lGOD"),
            Err(DrawingError::UnsupportedInput(_))
        ));
        assert!(matches!(
            DrawingInput::parse("just some text"),
            Err(DrawingError::UnsupportedInput(_))
        ));
        assert!(matches!(
            DrawingInput::parse("data:image/png;base64,@@@"),
            Err(DrawingError::Base64(_))
        ));
    }

    #[test]
    fn large_png_is_downscaled() {
        let prepared = prepare_image(DrawingInput::Png(png_of(1536, 384)), &RasterOptions::default()).unwrap();
        assert_eq!(prepared.stage, RasterStage::Original);
        assert_eq!(dimensions(&prepared.image.data), (768, 192));
    }

    #[test]
    fn small_png_keeps_its_size() {
        let prepared = prepare_image(DrawingInput::Png(png_of(300, 200)), &RasterOptions::default()).unwrap();
        assert_eq!(dimensions(&prepared.image.data), (300, 200));
    }

    #[test]
    fn corrupt_png_is_an_error() {
        let result = prepare_image(DrawingInput::Png(b"nope".to_vec()), &RasterOptions::default());
        assert!(matches!(result, Err(DrawingError::InvalidImage(_))));
    }

    #[test]
    fn svg_is_rasterized_with_resvg() {
        let prepared = rasterize_svg(SVG.as_bytes(), &RasterOptions::default());
        assert_eq!(prepared.stage, RasterStage::Resvg);
        assert_eq!(prepared.image.mime_type, "image/png");
        assert_eq!(dimensions(&prepared.image.data), (100, 50));
    }

    #[test]
    fn broken_svg_falls_back_to_placeholder() {
        let options = RasterOptions {
            rsvg_convert: "/nonexistent/rsvg-convert".to_string(),
            ..RasterOptions::default()
        };
        let prepared = rasterize_svg(b"<svg><unclosed", &options);

        assert_eq!(prepared.stage, RasterStage::Placeholder);
        assert_eq!(dimensions(&prepared.image.data), (800, 600));
    }

    #[cfg(unix)]
    #[test]
    fn converter_that_ignores_stdin_is_reaped() {
        let svg = vec![b' '; 1 << 20];
        let result = run_rsvg_convert("true", &svg);
        assert!(matches!(result, Err(DrawingError::InvalidImage(_))));
    }
}
