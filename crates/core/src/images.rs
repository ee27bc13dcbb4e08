//! Assembles a sequence of images into one multi-page PDF.
//!
//! Unlike office conversion, the output is a single artifact: any image that
//! fails to load aborts the batch and nothing is written.

use crate::config::ImageConfig;
use crate::error::BatchError;
use crate::models::ImageBatchResult;
use crate::progress::{CancelToken, ProgressSink};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const CANCELLED_MESSAGE: &str = "Conversion cancelled by user";

#[derive(Debug, Error)]
enum ImageError {
    #[error("Error processing {name}: {reason}")]
    Load { name: String, reason: String },
    #[error("cannot build PDF: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("cannot write output: {0}")]
    Io(#[from] std::io::Error),
}

struct PreparedPage {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

pub struct ImageToDocumentWorker {
    config: ImageConfig,
    sink: Arc<dyn ProgressSink>,
    cancel: CancelToken,
}

impl ImageToDocumentWorker {
    pub fn new(config: &ImageConfig, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            config: config.clone(),
            sink,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Writes one page per image, in order, to `output`.
    pub fn run(&self, images: &[PathBuf], output: &Path) -> ImageBatchResult {
        if images.is_empty() {
            return ImageBatchResult::failed("no images selected");
        }
        let total = images.len();
        let mut pages = Vec::with_capacity(total);
        for (idx, path) in images.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(processed = idx, "image conversion cancelled");
                return ImageBatchResult::failed(CANCELLED_MESSAGE);
            }
            self.sink.on_progress(idx + 1, total, path);
            match load_page(path, self.config.jpeg_quality) {
                Ok(page) => pages.push(page),
                Err(e) => {
                    warn!(path = %path.display(), "{e}");
                    return ImageBatchResult::failed(e.to_string());
                }
            }
        }
        if self.cancel.is_cancelled() {
            return ImageBatchResult::failed(CANCELLED_MESSAGE);
        }

        match write_pdf(&pages, self.config.resolution_dpi, output) {
            Ok(()) => {
                info!(output = %output.display(), pages = pages.len(), "wrote PDF");
                ImageBatchResult::succeeded(output.to_path_buf(), pages.len())
            }
            Err(e) => {
                warn!(output = %output.display(), "{e}");
                ImageBatchResult::failed(e.to_string())
            }
        }
    }

    pub fn spawn(self, images: Vec<PathBuf>, output: PathBuf) -> Result<ImageBatchHandle, BatchError> {
        let cancel = self.cancel.clone();
        let join = thread::Builder::new()
            .name("image-worker".into())
            .spawn(move || self.run(&images, &output))
            .map_err(BatchError::Spawn)?;
        Ok(ImageBatchHandle { cancel, join })
    }
}

pub struct ImageBatchHandle {
    cancel: CancelToken,
    join: JoinHandle<ImageBatchResult>,
}

impl ImageBatchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn join(self) -> ImageBatchResult {
        self.join
            .join()
            .unwrap_or_else(|_| ImageBatchResult::failed(BatchError::WorkerPanicked.to_string()))
    }
}

fn load_page(path: &Path, quality: u8) -> Result<PreparedPage, ImageError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let load_err = |reason: String| ImageError::Load {
        name: name.clone(),
        reason,
    };
    let img = image::io::Reader::open(path)
        .map_err(|e| load_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| load_err(e.to_string()))?
        .decode()
        .map_err(|e| load_err(e.to_string()))?;
    debug!(path = %path.display(), color = ?img.color(), "decoded image");

    let rgb = flatten_to_rgb(img);
    let (width, height) = rgb.dimensions();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| load_err(e.to_string()))?;
    Ok(PreparedPage {
        width,
        height,
        jpeg,
    })
}

/// Converts any color mode to RGB8, compositing transparency onto white.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let p = rgba.get_pixel(x, y);
        let alpha = u32::from(p[3]);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

/// Page edge in points for `pixels` at `dpi`.
fn points(pixels: u32, dpi: u32) -> i64 {
    let dpi = u64::from(dpi.max(1));
    ((u64::from(pixels) * 72 + dpi / 2) / dpi).max(1) as i64
}

fn build_pdf(pages: &[PreparedPage], dpi: u32) -> Result<Vec<u8>, ImageError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let width = points(page.width, dpi);
        let height = points(page.height, dpi);
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(page.width),
                "Height" => i64::from(page.height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            page.jpeg.clone(),
        ));
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0.into(),
                        0.into(),
                        height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// Writes to a `.part` sibling and renames into place, so a failed write
/// never leaves something that looks like finished output.
fn write_pdf(pages: &[PreparedPage], dpi: u32, output: &Path) -> Result<(), ImageError> {
    let bytes = build_pdf(pages, dpi)?;
    let mut part: OsString = output.as_os_str().to_os_string();
    part.push(".part");
    let part = PathBuf::from(part);
    if let Err(e) = fs::write(&part, &bytes).and_then(|_| fs::rename(&part, output)) {
        let _ = fs::remove_file(&part);
        return Err(e.into());
    }
    Ok(())
}
