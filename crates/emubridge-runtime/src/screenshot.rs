//! Screenshot decoding and per-action frame storage.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::RangeBounds;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use emubridge_syntax::{percent_unescape_bytes, BodyKind};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use smol_str::SmolStr;

use crate::error::RuntimeError;

/// ITU-R 601 luminance weights applied to R, G, B.
pub const LUMA_WEIGHTS: [f32; 3] = [0.2989, 0.5870, 0.1140];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Color(RgbImage),
    Gray(GrayImage),
}

impl Frame {
    /// Decodes raster bytes (PNG) into a frame. Alpha is dropped.
    pub fn decode(bytes: &[u8], grayscale: bool) -> Result<Self, RuntimeError> {
        let image = image::load_from_memory(bytes)
            .map_err(|err| screenshot_error(format!("image decode failed: {err}")))?;
        let rgb = image.to_rgb8();
        Ok(if grayscale {
            Self::Gray(to_grayscale(&rgb))
        } else {
            Self::Color(rgb)
        })
    }

    /// Decodes the data following `screenshot=`: percent-escaped base64.
    pub fn from_form_data(data: &[u8], grayscale: bool) -> Result<Self, RuntimeError> {
        let unescaped = percent_unescape_bytes(data);
        let encoded = unescaped.trim_ascii();
        let bytes = BASE64_STANDARD
            .decode(encoded)
            .map_err(|err| screenshot_error(format!("base64 decode failed: {err}")))?;
        Self::decode(&bytes, grayscale)
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Color(image) => image.dimensions(),
            Self::Gray(image) => image.dimensions(),
        }
    }

    #[must_use]
    pub fn channels(&self) -> u8 {
        match self {
            Self::Color(_) => 3,
            Self::Gray(_) => 1,
        }
    }

    #[must_use]
    pub fn as_gray(&self) -> Option<&GrayImage> {
        match self {
            Self::Gray(image) => Some(image),
            Self::Color(_) => None,
        }
    }

    #[must_use]
    pub fn to_dynamic(&self) -> DynamicImage {
        match self {
            Self::Color(image) => DynamicImage::ImageRgb8(image.clone()),
            Self::Gray(image) => DynamicImage::ImageLuma8(image.clone()),
        }
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>, RuntimeError> {
        let mut buffer = Cursor::new(Vec::new());
        self.to_dynamic()
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|err| screenshot_error(format!("png encode failed: {err}")))?;
        Ok(buffer.into_inner())
    }

    /// `screenshot=<percent-escaped base64 PNG>`, the body the emulator posts.
    pub fn to_form_body(&self) -> Result<String, RuntimeError> {
        let encoded = BASE64_STANDARD.encode(self.to_png_bytes()?);
        Ok(format!(
            "{}{}",
            BodyKind::Screenshot.marker(),
            urlencoding::encode(&encoded)
        ))
    }

    pub fn save_png(&self, path: &Path) -> Result<(), RuntimeError> {
        self.to_dynamic()
            .save_with_format(path, ImageFormat::Png)
            .map_err(|err| screenshot_error(format!("{}: {err}", path.display())))
    }
}

#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_grayscale(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let pixel = rgb.get_pixel(x, y).0;
        let luma = pixel
            .iter()
            .zip(LUMA_WEIGHTS)
            .map(|(channel, weight)| f32::from(*channel) * weight)
            .sum::<f32>();
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

fn screenshot_error(message: String) -> RuntimeError {
    RuntimeError::Screenshot(SmolStr::new(message))
}

/// Frames keyed by the action counter at the time they arrived.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotStore {
    frames: BTreeMap<u64, Frame>,
}

impl ScreenshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the frame previously stored at `action`, if any.
    pub fn insert(&mut self, action: u64, frame: Frame) -> Option<Frame> {
        self.frames.insert(action, frame)
    }

    #[must_use]
    pub fn get(&self, action: u64) -> Option<&Frame> {
        self.frames.get(&action)
    }

    #[must_use]
    pub fn latest(&self) -> Option<(u64, &Frame)> {
        self.frames
            .last_key_value()
            .map(|(action, frame)| (*action, frame))
    }

    pub fn range<R: RangeBounds<u64>>(&self, range: R) -> impl Iterator<Item = (u64, &Frame)> {
        self.frames
            .range(range)
            .map(|(action, frame)| (*action, frame))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn export_png(&self, action: u64, path: &Path) -> Result<(), RuntimeError> {
        let frame = self
            .get(action)
            .ok_or_else(|| screenshot_error(format!("no screenshot at action {action}")))?;
        frame.save_png(path)
    }

    /// Writes `<dir>/<action>.png` for every stored frame in `range`; returns the count.
    pub fn export_range<R: RangeBounds<u64>>(
        &self,
        range: R,
        dir: &Path,
    ) -> Result<usize, RuntimeError> {
        std::fs::create_dir_all(dir)?;
        let mut written = 0;
        for (action, frame) in self.range(range) {
            frame.save_png(&dir.join(format!("{action}.png")))?;
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8])
        })
    }

    #[test]
    fn form_body_round_trip_is_lossless() {
        let frame = Frame::Color(gradient(12, 9));
        let body = frame.to_form_body().expect("encode");
        let data = body
            .strip_prefix("screenshot=")
            .expect("marker")
            .as_bytes();
        let decoded = Frame::from_form_data(data, false).expect("decode");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn grayscale_uses_luminance_weights() {
        let rgb = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([255, 255, 255]),
        });
        let gray = to_grayscale(&rgb);
        assert_eq!(gray.get_pixel(0, 0).0, [76]);
        assert_eq!(gray.get_pixel(1, 0).0, [150]);
        assert_eq!(gray.get_pixel(2, 0).0, [255]);

        let frame = Frame::Color(rgb);
        let png = frame.to_png_bytes().expect("png");
        let decoded = Frame::decode(&png, true).expect("decode gray");
        assert_eq!(decoded.channels(), 1);
        assert_eq!(decoded.as_gray(), Some(&gray));
    }

    #[test]
    fn bad_payloads_are_screenshot_errors() {
        assert!(matches!(
            Frame::from_form_data(b"%%%not-base64", false),
            Err(RuntimeError::Screenshot(_))
        ));
        let not_png = BASE64_STANDARD.encode(b"definitely not a png");
        assert!(matches!(
            Frame::from_form_data(not_png.as_bytes(), false),
            Err(RuntimeError::Screenshot(_))
        ));
    }

    #[test]
    fn store_overwrites_and_ranges() {
        let mut store = ScreenshotStore::new();
        assert!(store.insert(0, Frame::Color(gradient(2, 2))).is_none());
        assert!(store.insert(1, Frame::Color(gradient(3, 3))).is_none());
        assert!(store.insert(1, Frame::Color(gradient(4, 4))).is_some());
        assert_eq!(store.len(), 2);
        assert_eq!(store.latest().map(|(action, _)| action), Some(1));
        assert_eq!(
            store.get(1).map(Frame::dimensions),
            Some((4, 4))
        );
        assert_eq!(store.range(..1).count(), 1);
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn export_writes_decodable_png() {
        let dir = std::env::temp_dir().join(format!("emubridge-export-{}", std::process::id()));
        let mut store = ScreenshotStore::new();
        let frame = Frame::Color(gradient(5, 4));
        store.insert(3, frame.clone());
        store.insert(4, Frame::Color(gradient(6, 4)));

        assert_eq!(store.export_range(3..=4, &dir).expect("export"), 2);
        let bytes = std::fs::read(dir.join("3.png")).expect("read export");
        assert_eq!(Frame::decode(&bytes, false).expect("decode export"), frame);
        assert!(store.export_png(9, &dir.join("9.png")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
