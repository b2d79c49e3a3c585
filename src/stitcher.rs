//! Composite surface the tiles are stitched into.
//!
//! Layout math is done in CSS pixels while the capture primitive returns
//! images at device resolution. Each draw therefore samples a *device-pixel*
//! source rectangle from the decoded tile and scales it into a *CSS-pixel*
//! destination rectangle on the surface.

use crate::{CaptureError, CaptureTarget, CssRect, DeviceRect, OutputFormat, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageOutputFormat, RgbaImage};
use std::io::Cursor;

/// Source and destination of one tile draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGeometry {
    /// Region of the decoded tile, device px
    pub source: DeviceRect,
    /// Region of the surface, CSS px
    pub dest: CssRect,
}

impl TileGeometry {
    pub fn for_tile(target: &CaptureTarget, offset: u32, content_height: u32) -> Self {
        Self {
            source: target.crop_rect.to_device(target.device_pixel_ratio),
            dest: CssRect::new(
                0.0,
                offset as f64,
                target.viewport_width as f64,
                content_height as f64,
            ),
        }
    }
}

/// RGBA raster of `total_width x total_height` CSS pixels, transparent until
/// tiles are drawn. Rows whose tile failed stay transparent.
pub struct CompositeSurface {
    canvas: RgbaImage,
}

impl CompositeSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Decode `bytes` and draw it per `geometry`.
    ///
    /// The source rectangle is clipped to the decoded image, so an image that
    /// was already cropped to its content rows fills exactly the destination.
    pub fn draw_tile(&mut self, bytes: &[u8], geometry: &TileGeometry) -> Result<()> {
        let tile = image::load_from_memory(bytes)?;
        self.draw_image(&tile, geometry)
    }

    pub fn draw_image(&mut self, tile: &DynamicImage, geometry: &TileGeometry) -> Result<()> {
        let (tile_width, tile_height) = tile.dimensions();
        let source = geometry
            .source
            .clamp_to(tile_width, tile_height)
            .ok_or_else(|| {
                CaptureError::DecodeFailed(format!(
                    "source {:?} lies outside the {}x{} tile",
                    geometry.source, tile_width, tile_height
                ))
            })?;

        let dest_width = geometry.dest.width.round().max(0.0) as u32;
        let dest_height = geometry.dest.height.round().max(0.0) as u32;
        if dest_width == 0 || dest_height == 0 {
            return Ok(());
        }

        let region = tile
            .crop_imm(source.x, source.y, source.width, source.height)
            .to_rgba8();
        let scaled = if (source.width, source.height) == (dest_width, dest_height) {
            region
        } else {
            imageops::resize(&region, dest_width, dest_height, FilterType::Triangle)
        };

        imageops::replace(
            &mut self.canvas,
            &scaled,
            geometry.dest.x.round() as i64,
            geometry.dest.y.round() as i64,
        );
        Ok(())
    }

    /// Encode the finished surface. Quality is ignored by lossless codecs.
    pub fn encode(&self, format: OutputFormat, quality: f32) -> Result<Vec<u8>> {
        let limit = format.max_dimension();
        if self.width() > limit || self.height() > limit {
            return Err(CaptureError::EncodeFailed(format!(
                "{}x{} exceeds the {} limit of {}px",
                self.width(),
                self.height(),
                format.extension(),
                limit
            )));
        }

        let mut bytes = Vec::new();
        let mut cursor = Cursor::new(&mut bytes);
        let result = match format {
            OutputFormat::Png => self.canvas.write_to(&mut cursor, ImageOutputFormat::Png),
            OutputFormat::Jpeg => {
                let quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
                DynamicImage::ImageRgba8(self.canvas.clone())
                    .to_rgb8()
                    .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))
            }
            OutputFormat::Webp => self
                .canvas
                .write_to(&mut cursor, image::ImageFormat::WebP),
        };
        result.map_err(|e| CaptureError::EncodeFailed(e.to_string()))?;

        Ok(bytes)
    }
}

/// Keep the top `content_height` CSS rows of a full-viewport capture and
/// re-encode them as PNG.
///
/// The device scale is measured from the image itself
/// (`image_height / viewport_height`) rather than trusted from the page.
pub fn crop_top(bytes: &[u8], viewport_height: u32, content_height: u32) -> Result<Vec<u8>> {
    let tile = image::load_from_memory(bytes)?;
    let (width, height) = tile.dimensions();

    let scale = height as f64 / viewport_height.max(1) as f64;
    let keep = ((content_height as f64 * scale).round() as u32).clamp(1, height.max(1));

    let cropped = tile.crop_imm(0, 0, width, keep);
    let mut out = Vec::new();
    cropped.write_to(&mut Cursor::new(&mut out), ImageOutputFormat::Png)?;
    Ok(out)
}
