//! Trial watermarking.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// Decoding or re-encoding an image failed.
#[derive(Debug, thiserror::Error)]
#[error("image processing failed: {0}")]
pub struct WatermarkError(#[from] image::ImageError);

/// Marks trial output so it cannot pass for a paid result.
pub trait Watermarker: Send + Sync {
    /// Return the marked image, PNG-encoded.
    ///
    /// # Errors
    ///
    /// Returns `WatermarkError` if `image` cannot be decoded or re-encoded.
    fn apply(&self, image: &[u8]) -> Result<Vec<u8>, WatermarkError>;
}

/// Blends a translucent striped band across the middle of the image.
#[derive(Debug, Clone, Copy)]
pub struct BandWatermark {
    /// Band height as a fraction of the image height.
    pub height_ratio: f32,
    /// Stripe width in pixels.
    pub stripe_width: u32,
    /// Overlay opacity in `0.0..=1.0`.
    pub opacity: f32,
}

impl Default for BandWatermark {
    fn default() -> Self {
        Self {
            height_ratio: 0.12,
            stripe_width: 24,
            opacity: 0.5,
        }
    }
}

impl BandWatermark {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn mark(&self, canvas: &mut RgbaImage) {
        let (width, height) = canvas.dimensions();
        if width == 0 || height == 0 {
            return;
        }

        let band = ((height as f32 * self.height_ratio).round() as u32).clamp(1, height);
        let top = (height - band) / 2;
        let stripe = self.stripe_width.max(1);
        let overlay = Rgba([255u8, 255, 255, 255]);

        for y in top..top + band {
            for x in 0..width {
                if ((x + y) / stripe) % 2 == 0 {
                    let pixel = canvas.get_pixel_mut(x, y);
                    *pixel = blend(*pixel, overlay, self.opacity);
                }
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend(under: Rgba<u8>, over: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let a = opacity.clamp(0.0, 1.0);
    let mix = |u: u8, o: u8| (f32::from(u) * (1.0 - a) + f32::from(o) * a).round() as u8;
    Rgba([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
        under[3],
    ])
}

impl Watermarker for BandWatermark {
    fn apply(&self, image: &[u8]) -> Result<Vec<u8>, WatermarkError> {
        let mut canvas = image::load_from_memory(image)?.to_rgba8();
        self.mark(&mut canvas);
        encode_png(DynamicImage::ImageRgba8(canvas))
    }
}

/// Decode any supported format and re-encode it as PNG.
///
/// # Errors
///
/// Returns `WatermarkError` if `image` cannot be decoded or re-encoded.
pub fn to_png(image: &[u8]) -> Result<Vec<u8>, WatermarkError> {
    encode_png(image::load_from_memory(image)?)
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>, WatermarkError> {
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}
