use crate::error::{Result, SignError};
use crate::features::document::DocumentKind;
use crate::features::placement::PlacedSignature;
use crate::features::store::{DocumentStore, Signature};
use crate::features::{pdf, raster};
use image::{Rgba, RgbaImage};
use log::debug;
use std::collections::HashMap;

/// Channels strictly above this on R, G and B count as paper, not ink.
pub const WHITE_THRESHOLD: u8 = 250;

/// A signature at size 100 spans this fraction of the document width.
pub const WIDTH_FACTOR: f64 = 0.4;

/// Makes near-white pixels fully transparent. Idempotent.
pub fn strip_background(img: &mut RgbaImage) {
    for pixel in img.pixels_mut() {
        let Rgba([r, g, b, _]) = *pixel;
        if r > WHITE_THRESHOLD && g > WHITE_THRESHOLD && b > WHITE_THRESHOLD {
            pixel[3] = 0;
        }
    }
}

pub fn signature_width(size_px: f64, document_width: f64) -> f64 {
    size_px / 100.0 * document_width * WIDTH_FACTOR
}

/// Height for `width` that keeps the image's aspect ratio.
pub fn scaled_height(img: &RgbaImage, width: f64) -> f64 {
    let (w, h) = img.dimensions();
    if w == 0 {
        return 0.0;
    }
    width * h as f64 / w as f64
}

/// Decoded, background-stripped signature images keyed by signature id.
#[derive(Debug, Default)]
pub struct SignatureImages {
    images: HashMap<String, RgbaImage>,
}

impl SignatureImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, signature_id: &str, mut img: RgbaImage) {
        strip_background(&mut img);
        self.images.insert(signature_id.to_string(), img);
    }

    pub fn get(&self, signature_id: &str) -> Result<&RgbaImage> {
        self.images
            .get(signature_id)
            .ok_or_else(|| SignError::SignatureNotFound(signature_id.to_string()))
    }

    pub(crate) fn len(&self) -> usize {
        self.images.len()
    }
}

/// Fetches and decodes every signature the placements use, each one once.
///
/// Fetches are independent so they run side by side; any failure aborts the
/// whole batch before any output exists.
pub fn load_signature_images(
    store: &dyn DocumentStore,
    signatures: &[Signature],
    placements: &[PlacedSignature],
) -> Result<SignatureImages> {
    let mut wanted: Vec<&Signature> = Vec::new();
    for placement in placements {
        if wanted.iter().any(|s| s.id == placement.signature_id) {
            continue;
        }
        let signature = signatures
            .iter()
            .find(|s| s.id == placement.signature_id)
            .ok_or_else(|| SignError::SignatureNotFound(placement.signature_id.clone()))?;
        wanted.push(signature);
    }

    let decoded: Vec<Result<RgbaImage>> = std::thread::scope(|scope| {
        let handles: Vec<_> = wanted
            .iter()
            .map(|signature| scope.spawn(move || fetch_signature_image(store, signature)))
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(SignError::Render("signature_worker_panicked".into())))
            })
            .collect()
    });

    let mut images = SignatureImages::new();
    for (signature, result) in wanted.iter().zip(decoded) {
        images.insert(&signature.id, result?);
    }
    debug!("loaded {} signature image(s) for {} placement(s)", images.len(), placements.len());
    Ok(images)
}

fn fetch_signature_image(store: &dyn DocumentStore, signature: &Signature) -> Result<RgbaImage> {
    let fetch_err = |reason: String| SignError::SignatureFetch {
        id: signature.id.clone(),
        reason,
    };
    let url = store
        .resolve_url(&signature.image_key)
        .map_err(|e| fetch_err(e.to_string()))?;
    let bytes = store.fetch(&url.url).map_err(|e| fetch_err(e.to_string()))?;
    let img = image::load_from_memory(&bytes).map_err(|e| fetch_err(e.to_string()))?;
    Ok(img.to_rgba8())
}

/// Result of merging placements into a document.
#[derive(Debug, Clone)]
pub struct CompositeOutput {
    pub bytes: Vec<u8>,
    pub kind: DocumentKind,
}

/// Embeds every placement, in insertion order, into `original`.
pub fn composite(
    original: &[u8],
    placements: &[PlacedSignature],
    images: &SignatureImages,
) -> Result<CompositeOutput> {
    if placements.is_empty() {
        return Err(SignError::NoPlacements);
    }
    match DocumentKind::detect(original)? {
        DocumentKind::Paged => Ok(CompositeOutput {
            bytes: pdf::composite_paged(original, placements, images)?,
            kind: DocumentKind::Paged,
        }),
        DocumentKind::Raster(format) => {
            let (bytes, out_format) =
                raster::composite_raster(original, format, placements, images)?;
            Ok(CompositeOutput {
                bytes,
                kind: DocumentKind::Raster(out_format),
            })
        }
    }
}
