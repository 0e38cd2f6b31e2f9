use crate::error::{Result, SignError};
use crate::features::compositor::{scaled_height, signature_width, SignatureImages};
use crate::features::document::RasterFormat;
use crate::features::placement::PlacedSignature;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageOutputFormat};
use std::io::Cursor;

/// Flattens placements onto an image document at full resolution.
///
/// JPEG stays JPEG; anything else is written back as PNG.
pub fn composite_raster(
    original: &[u8],
    format: RasterFormat,
    placements: &[PlacedSignature],
    images: &SignatureImages,
) -> Result<(Vec<u8>, RasterFormat)> {
    if let Some(p) = placements.iter().find(|p| p.page != 1) {
        return Err(SignError::PageOutOfRange(p.page));
    }
    let mut base = image::load_from_memory(original)
        .map_err(|e| SignError::DocumentParse(e.to_string()))?
        .to_rgba8();
    let (doc_w, doc_h) = base.dimensions();

    for placement in placements {
        let sig = images.get(&placement.signature_id)?;
        let width = signature_width(placement.size_px, doc_w as f64);
        let height = scaled_height(sig, width);
        let target_w = width.round().max(1.0) as u32;
        let target_h = height.round().max(1.0) as u32;
        let scaled = imageops::resize(sig, target_w, target_h, FilterType::Triangle);

        let cx = placement.x_percent / 100.0 * doc_w as f64;
        let cy = placement.y_percent / 100.0 * doc_h as f64;
        let left = (cx - target_w as f64 / 2.0).round() as i64;
        let top = (cy - target_h as f64 / 2.0).round() as i64;
        imageops::overlay(&mut base, &scaled, left, top);
    }

    let mut out = Cursor::new(Vec::new());
    let out_format = match format {
        RasterFormat::Jpeg => {
            let flat = DynamicImage::ImageRgba8(base).into_rgb8();
            DynamicImage::ImageRgb8(flat)
                .write_to(&mut out, ImageOutputFormat::Jpeg(92))
                .map_err(|e| SignError::Encode(e.to_string()))?;
            RasterFormat::Jpeg
        }
        RasterFormat::Png | RasterFormat::Webp => {
            DynamicImage::ImageRgba8(base)
                .write_to(&mut out, ImageOutputFormat::Png)
                .map_err(|e| SignError::Encode(e.to_string()))?;
            RasterFormat::Png
        }
    };
    Ok((out.into_inner(), out_format))
}
