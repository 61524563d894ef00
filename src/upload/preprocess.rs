use crate::config::ImageConfig;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

/// Image ready to be sent as `image_base64`
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// JPEG quality used when re-encoded, `None` when the input was passed through
    pub quality: Option<u8>,
}

impl PreparedImage {
    pub fn was_reencoded(&self) -> bool {
        self.quality.is_some()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>`, the form the backend accepts for both
    /// of its vision providers
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }
}

pub struct ImagePreprocessor {
    config: ImageConfig,
}

impl ImagePreprocessor {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    /// Decode `raw` and bring it within the pixel and byte budget.
    ///
    /// Images already within budget come back byte-identical. Everything else
    /// is scaled down, flattened onto white and re-encoded as JPEG with
    /// decreasing quality until it fits or the quality floor is reached.
    pub fn prepare(&self, raw: &[u8]) -> Result<PreparedImage> {
        let format = image::guess_format(raw).map_err(|e| Error::ImageDecode(e.to_string()))?;
        let decoded = image::load_from_memory_with_format(raw, format)
            .map_err(|e| Error::ImageDecode(e.to_string()))?;
        let (width, height) = decoded.dimensions();

        if self.within_budget(width, height, raw.len()) {
            tracing::debug!(
                "[ImagePreprocessor] {}x{} {} bytes already within budget",
                width,
                height,
                raw.len()
            );
            return Ok(PreparedImage {
                mime: format.to_mime_type(),
                bytes: raw.to_vec(),
                width,
                height,
                quality: None,
            });
        }

        let (target_width, target_height) =
            target_dimensions(width, height, self.config.max_dimension);
        let canvas = flatten_onto_white(&decoded, target_width, target_height);
        let (bytes, quality) = self.encode_within_budget(&canvas)?;

        tracing::debug!(
            "[ImagePreprocessor] {}x{} ({} bytes) -> {}x{} ({} bytes, quality {})",
            width,
            height,
            raw.len(),
            target_width,
            target_height,
            bytes.len(),
            quality
        );

        Ok(PreparedImage {
            mime: "image/jpeg",
            bytes,
            width: target_width,
            height: target_height,
            quality: Some(quality),
        })
    }

    /// Like [`prepare`](Self::prepare), but an unreadable file means "no image"
    pub fn prepare_or_skip(&self, raw: &[u8]) -> Option<PreparedImage> {
        match self.prepare(raw) {
            Ok(prepared) => Some(prepared),
            Err(e) => {
                tracing::warn!("[ImagePreprocessor] Dropping attachment: {}", e);
                None
            }
        }
    }

    fn within_budget(&self, width: u32, height: u32, byte_len: usize) -> bool {
        width <= self.config.max_dimension
            && height <= self.config.max_dimension
            && byte_len <= self.config.max_bytes
    }

    fn encode_within_budget(&self, canvas: &RgbImage) -> Result<(Vec<u8>, u8)> {
        let floor = self.config.min_quality.clamp(1, 100);
        let step = self.config.quality_step.max(1);
        let mut quality = self.config.initial_quality.clamp(floor, 100);

        loop {
            let bytes = encode_jpeg(canvas, quality)?;
            if bytes.len() <= self.config.max_bytes || quality <= floor {
                return Ok((bytes, quality));
            }
            quality = quality.saturating_sub(step).max(floor);
        }
    }
}

/// Longer side scaled down to `max_dimension`, aspect ratio kept. Never upscales.
pub(crate) fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_dimension {
        return (width, height);
    }

    let scale = f64::from(max_dimension) / f64::from(longer);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_dimension);

    if width >= height {
        (max_dimension, scaled(height))
    } else {
        (scaled(width), max_dimension)
    }
}

fn flatten_onto_white(image: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let rgba = image.to_rgba8();
    let resized = if rgba.dimensions() == (width, height) {
        rgba
    } else {
        imageops::resize(&rgba, width, height, FilterType::Triangle)
    };

    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = resized.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

fn encode_jpeg(canvas: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder
            .encode_image(canvas)
            .map_err(|e| Error::ImageEncode(e.to_string()))?;
    }
    Ok(bytes)
}
