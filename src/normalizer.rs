//! Image normalization: decode an uploaded raster image, shrink it to fit the
//! configured bounding box, re-encode it as JPEG and hand back base64 that
//! can be stored inline in a company record.

use crate::config::NormalizerConfig;
use crate::util::JPEG_DATA_URI_PREFIX;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, warn};

/// Why a normalization failed. Every failure is terminal for that call
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// The input is not a decodable raster image
    #[error("could not decode image: {0}")]
    Decode(String),

    /// The resampled image could not be re-encoded
    #[error("could not encode image: {0}")]
    Encode(String),

    #[error("invalid normalizer configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

/// A user-selected file, as handed over by the file picker
#[derive(Clone)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,

    /// Declared content type. Advisory only: the format is sniffed from
    /// `bytes`
    pub mime_type: Option<String>,
}

impl ImageAsset {
    pub fn new(bytes: Vec<u8>, mime_type: Option<String>) -> Self {
        ImageAsset { bytes, mime_type }
    }
}

impl Debug for ImageAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ImageAsset {{ bytes: <{} bytes>, mime_type: {:?} }}",
            self.bytes.len(),
            self.mime_type
        )
    }
}

/// A normalized JPEG, encoded as base 64
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedImage {
    /// The JPEG body, without any `data:` prefix
    #[serde(rename = "image")]
    pub base64_data: String,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    /// The form the source application stores alongside company records for
    /// display
    pub fn to_data_uri(&self) -> String {
        format!("{JPEG_DATA_URI_PREFIX}{}", self.base64_data)
    }

    /// The raw JPEG bytes
    pub fn jpeg_bytes(&self) -> std::result::Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(&self.base64_data)
    }
}

impl Debug for NormalizedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NormalizedImage {{ image: <{} base64 chars>, width: {}, height: {} }}",
            self.base64_data.len(),
            self.width,
            self.height
        )
    }
}

/// Size of the output image for a `src_width` x `src_height` source. The long
/// edge is capped at `max_dimension`, the short edge follows the aspect ratio
/// (rounded, never below 1). Images that already fit are left alone.
pub fn target_dimensions(src_width: u32, src_height: u32, max_dimension: u32) -> (u32, u32) {
    if src_width <= max_dimension && src_height <= max_dimension {
        return (src_width, src_height);
    }

    let scale = |short: u32, long: u32| -> u32 {
        let scaled = (short as u64 * max_dimension as u64 + long as u64 / 2) / long as u64;
        scaled.clamp(1, max_dimension as u64) as u32
    };

    if src_width >= src_height {
        (max_dimension, scale(src_height, src_width))
    } else {
        (scale(src_width, src_height), max_dimension)
    }
}

/// Composite any alpha channel over opaque white
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let alpha = src[3] as u32;
        for c in 0..3 {
            let blended = (src[c] as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
            dst[c] = blended as u8;
        }
    }
    rgb
}

/// Turns arbitrary raster images into bounded, compressed, base64 JPEGs.
/// Holds no state beyond its configuration, so it is cheap to clone and safe
/// to share between threads.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer {
            config: NormalizerConfig::default(),
        }
    }
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        config.validate().map_err(NormalizeError::InvalidConfig)?;
        Ok(Normalizer { config })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Decode, shrink, re-encode and base64 the given image
    pub fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage> {
        let image = self.decode(bytes)?;
        let (src_width, src_height) = image.dimensions();
        let (width, height) =
            target_dimensions(src_width, src_height, self.config.max_dimension);

        debug!("resizing {src_width}x{src_height} -> {width}x{height}");
        let image = if (width, height) == (src_width, src_height) {
            image
        } else {
            image.resize_exact(width, height, FilterType::CatmullRom)
        };

        let jpeg = self.encode(&image)?;
        Ok(NormalizedImage {
            base64_data: general_purpose::STANDARD.encode(jpeg),
            width,
            height,
        })
    }

    /// Normalize a picked file, warning when its declared type disagrees with
    /// its contents
    #[tracing::instrument(skip(self))]
    pub fn normalize_asset(&self, asset: &ImageAsset) -> Result<NormalizedImage> {
        if let Some(mime) = asset.mime_type.as_deref() {
            let declared = ImageFormat::from_mime_type(mime);
            let sniffed = image::guess_format(&asset.bytes).ok();
            if sniffed.is_some() && declared != sniffed {
                warn!("declared type {mime} does not match detected format {sniffed:?}");
            }
        }
        self.normalize(&asset.bytes)
    }

    /// Run `normalize` on the blocking pool. The caller is suspended until
    /// every stage has finished or one has failed; there is no cancellation.
    pub async fn normalize_async(&self, bytes: Vec<u8>) -> Result<NormalizedImage> {
        self.normalize_asset_async(ImageAsset::new(bytes, None)).await
    }

    /// `normalize_asset` on the blocking pool
    pub async fn normalize_asset_async(&self, asset: ImageAsset) -> Result<NormalizedImage> {
        let normalizer = *self;
        match tokio::task::spawn_blocking(move || normalizer.normalize_asset(&asset)).await {
            Ok(res) => res,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(NormalizeError::Encode(format!(
                "normalization task did not complete: {e}"
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            warn!("refusing to decode an empty file");
            return Err(NormalizeError::Decode("input is empty".into()));
        }

        let format = image::guess_format(bytes).map_err(|e| {
            warn!("unrecognized image format: {e}");
            NormalizeError::Decode(e.to_string())
        })?;
        let image = image::load_from_memory_with_format(bytes, format).map_err(|e| {
            warn!("failed to decode {format:?} image: {e}");
            NormalizeError::Decode(e.to_string())
        })?;

        if image.width() == 0 || image.height() == 0 {
            return Err(NormalizeError::Decode(format!(
                "image has no area ({}x{})",
                image.width(),
                image.height()
            )));
        }

        debug!(
            "decoded {format:?} image, {}x{} {:?}",
            image.width(),
            image.height(),
            image.color()
        );
        Ok(image)
    }

    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let rgb = flatten_onto_white(image);
        let mut jpeg = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, self.config.encoder_quality());
        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| {
                warn!("failed to encode jpeg: {e}");
                NormalizeError::Encode(e.to_string())
            })?;

        if jpeg.is_empty() {
            return Err(NormalizeError::Encode("encoder produced no output".into()));
        }
        Ok(jpeg)
    }
}
