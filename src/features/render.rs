use crate::error::{Result, SignError};
use crate::features::document::DocumentKind;
use crate::features::pdf;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Turns one page of a paged document into pixels.
///
/// Sizes are in logical units (PDF points); `render` returns a bitmap of
/// `size * scale`.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self, bytes: &[u8]) -> Result<u32>;
    fn page_size(&self, bytes: &[u8], page: u32) -> Result<(f64, f64)>;
    fn render(&self, bytes: &[u8], page: u32, scale: f64) -> Result<RgbaImage>;
}

/// Blank page canvas sized from the page's MediaBox.
///
/// Enough for placement geometry; shells with a real PDF engine plug their own
/// rasterizer in.
pub struct MediaBoxRasterizer;

impl PageRasterizer for MediaBoxRasterizer {
    fn page_count(&self, bytes: &[u8]) -> Result<u32> {
        pdf::page_count(bytes)
    }

    fn page_size(&self, bytes: &[u8], page: u32) -> Result<(f64, f64)> {
        pdf::page_size(bytes, page)
    }

    fn render(&self, bytes: &[u8], page: u32, scale: f64) -> Result<RgbaImage> {
        let (w, h) = self.page_size(bytes, page)?;
        let (pw, ph) = scaled_dimensions(w, h, scale);
        Ok(RgbaImage::from_pixel(pw, ph, Rgba([255, 255, 255, 255])))
    }
}

fn scaled_dimensions(w: f64, h: f64, scale: f64) -> (u32, u32) {
    (
        (w * scale).round().max(1.0) as u32,
        (h * scale).round().max(1.0) as u32,
    )
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub bitmap: RgbaImage,
    pub logical_width: f64,
    pub logical_height: f64,
    pub scale: f64,
}

#[derive(Clone)]
pub struct Renderer {
    rasterizer: Arc<dyn PageRasterizer>,
    scale: f64,
    timeout: Duration,
}

impl Renderer {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, scale: f64, timeout: Duration) -> Self {
        Self {
            rasterizer,
            scale,
            timeout,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn page_count(&self, bytes: &[u8], kind: DocumentKind) -> Result<u32> {
        match kind {
            DocumentKind::Paged => self.rasterizer.page_count(bytes),
            DocumentKind::Raster(_) => Ok(1),
        }
    }

    pub fn page_size(&self, bytes: &[u8], kind: DocumentKind, page: u32) -> Result<(f64, f64)> {
        match kind {
            DocumentKind::Paged => self.rasterizer.page_size(bytes, page),
            DocumentKind::Raster(_) => {
                if page != 1 {
                    return Err(SignError::PageOutOfRange(page));
                }
                let (w, h) = image::io::Reader::new(Cursor::new(bytes))
                    .with_guessed_format()?
                    .into_dimensions()
                    .map_err(|e| SignError::DocumentParse(e.to_string()))?;
                Ok((w as f64, h as f64))
            }
        }
    }

    /// Renders on a dedicated thread and gives up after the configured timeout.
    ///
    /// A timed-out thread is left to finish on its own; its result is dropped.
    pub fn render_page(
        &self,
        bytes: Arc<Vec<u8>>,
        kind: DocumentKind,
        page: u32,
    ) -> Result<RenderedPage> {
        let (tx, rx) = mpsc::channel();
        let this = self.clone();
        thread::Builder::new()
            .name("signdesk-render".into())
            .spawn(move || {
                let _ = tx.send(this.render_blocking(&bytes, kind, page));
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!("render of page {page} exceeded {:?}", self.timeout);
                Err(SignError::RenderTimeout)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(SignError::Render("render_thread_panicked".into()))
            }
        }
    }

    fn render_blocking(&self, bytes: &[u8], kind: DocumentKind, page: u32) -> Result<RenderedPage> {
        match kind {
            DocumentKind::Paged => {
                let (logical_width, logical_height) = self.rasterizer.page_size(bytes, page)?;
                let bitmap = self.rasterizer.render(bytes, page, self.scale)?;
                Ok(RenderedPage {
                    bitmap,
                    logical_width,
                    logical_height,
                    scale: self.scale,
                })
            }
            DocumentKind::Raster(_) => {
                if page != 1 {
                    return Err(SignError::PageOutOfRange(page));
                }
                let decoded = image::load_from_memory(bytes)
                    .map_err(|e| SignError::DocumentParse(e.to_string()))?
                    .to_rgba8();
                let (w, h) = decoded.dimensions();
                let (pw, ph) = scaled_dimensions(w as f64, h as f64, self.scale);
                let bitmap = imageops::resize(&decoded, pw, ph, FilterType::Triangle);
                Ok(RenderedPage {
                    bitmap,
                    logical_width: w as f64,
                    logical_height: h as f64,
                    scale: self.scale,
                })
            }
        }
    }
}

/// Where the current page render stands. Every request carries the generation
/// it was issued under so late results can be recognised and dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum RenderStatus {
    #[default]
    Idle,
    Loading {
        generation: u64,
        page: u32,
    },
    Ready {
        generation: u64,
        page: u32,
        logical_width: f64,
        logical_height: f64,
        bitmap_path: String,
    },
    Failed {
        generation: u64,
        page: u32,
        reason: String,
    },
}

impl RenderStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, RenderStatus::Loading { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub logical_width: f64,
    pub logical_height: f64,
    pub bitmap_path: PathBuf,
}

/// A page render to run off the command thread.
pub struct RenderJob {
    pub generation: u64,
    pub page: u32,
    pub kind: DocumentKind,
    pub bytes: Arc<Vec<u8>>,
    pub renderer: Renderer,
    pub output_dir: PathBuf,
}

impl std::fmt::Debug for RenderJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderJob")
            .field("generation", &self.generation)
            .field("page", &self.page)
            .field("kind", &self.kind)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

pub struct RenderOutcome {
    pub generation: u64,
    pub page: u32,
    pub result: Result<RenderedFrame>,
}

impl RenderJob {
    pub fn run(self) -> RenderOutcome {
        let result = self
            .renderer
            .render_page(self.bytes.clone(), self.kind, self.page)
            .and_then(|rendered| write_frame(&rendered, &self.output_dir));
        if let Err(e) = &result {
            debug!("render generation {} failed: {e}", self.generation);
        }
        RenderOutcome {
            generation: self.generation,
            page: self.page,
            result,
        }
    }
}

fn write_frame(rendered: &RenderedPage, dir: &Path) -> Result<RenderedFrame> {
    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(rendered.bitmap.clone())
        .write_to(&mut encoded, ImageOutputFormat::Png)
        .map_err(|e| SignError::Encode(e.to_string()))?;

    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix("signdesk_page_")
        .suffix(".png")
        .tempfile_in(dir)?;
    file.write_all(encoded.get_ref())?;
    let (_, path) = file.keep().map_err(|e| SignError::Io(e.error))?;
    Ok(RenderedFrame {
        logical_width: rendered.logical_width,
        logical_height: rendered.logical_height,
        bitmap_path: path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::{png_bytes, sample_pdf, solid};
    use crate::features::document::RasterFormat;

    struct SlowRasterizer(Duration);

    impl PageRasterizer for SlowRasterizer {
        fn page_count(&self, _bytes: &[u8]) -> Result<u32> {
            Ok(1)
        }

        fn page_size(&self, _bytes: &[u8], _page: u32) -> Result<(f64, f64)> {
            Ok((10.0, 10.0))
        }

        fn render(&self, _bytes: &[u8], _page: u32, _scale: f64) -> Result<RgbaImage> {
            thread::sleep(self.0);
            Ok(RgbaImage::new(1, 1))
        }
    }

    fn renderer(rasterizer: Arc<dyn PageRasterizer>, timeout_ms: u64) -> Renderer {
        Renderer::new(rasterizer, 2.0, Duration::from_millis(timeout_ms))
    }

    #[test]
    fn pdf_pages_render_at_twice_their_logical_size() {
        let r = renderer(Arc::new(MediaBoxRasterizer), 5_000);
        let bytes = Arc::new(sample_pdf(2));
        assert_eq!(r.page_count(&bytes, DocumentKind::Paged).unwrap(), 2);

        let page = r.render_page(bytes, DocumentKind::Paged, 2).unwrap();
        assert_eq!((page.logical_width, page.logical_height), (612.0, 792.0));
        assert_eq!(page.bitmap.dimensions(), (1224, 1584));
    }

    #[test]
    fn raster_documents_are_upscaled() {
        let r = renderer(Arc::new(MediaBoxRasterizer), 5_000);
        let bytes = Arc::new(png_bytes(solid(30, 20, [0, 0, 0, 255])));
        let kind = DocumentKind::Raster(RasterFormat::Png);
        let page = r.render_page(bytes.clone(), kind, 1).unwrap();
        assert_eq!(page.bitmap.dimensions(), (60, 40));
        assert_eq!(page.logical_width, 30.0);
        assert!(matches!(r.render_page(bytes, kind, 2), Err(SignError::PageOutOfRange(2))));
    }

    #[test]
    fn slow_render_times_out() {
        let r = renderer(Arc::new(SlowRasterizer(Duration::from_millis(500))), 20);
        let err = r
            .render_page(Arc::new(Vec::new()), DocumentKind::Paged, 1)
            .unwrap_err();
        assert!(matches!(err, SignError::RenderTimeout));
    }

    #[test]
    fn missing_page_fails_instead_of_hanging() {
        let r = renderer(Arc::new(MediaBoxRasterizer), 5_000);
        let err = r
            .render_page(Arc::new(sample_pdf(1)), DocumentKind::Paged, 4)
            .unwrap_err();
        assert!(matches!(err, SignError::PageOutOfRange(4)));
    }

    #[test]
    fn job_writes_a_png_frame() {
        let dir = tempfile::tempdir().unwrap();
        let job = RenderJob {
            generation: 7,
            page: 1,
            kind: DocumentKind::Paged,
            bytes: Arc::new(sample_pdf(1)),
            renderer: renderer(Arc::new(MediaBoxRasterizer), 5_000),
            output_dir: dir.path().to_path_buf(),
        };
        let outcome = job.run();
        assert_eq!(outcome.generation, 7);
        let frame = outcome.result.unwrap();
        let decoded = image::open(&frame.bitmap_path).unwrap();
        assert_eq!(decoded.width(), 1224);
    }
}
