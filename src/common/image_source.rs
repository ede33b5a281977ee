use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use crate::error::DetectError;

/// Caller-owned handle to one photo. The pipeline only ever reads from it.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Path to an encoded image on disk.
    Path(PathBuf),
    /// Encoded image bytes (JPEG, PNG, ...).
    Bytes(Vec<u8>),
    /// Already decoded pixels.
    Decoded(DynamicImage),
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&str> for ImageSource {
    fn from(path: &str) -> Self {
        ImageSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        ImageSource::Decoded(image)
    }
}

impl From<RgbImage> for ImageSource {
    fn from(image: RgbImage) -> Self {
        ImageSource::Decoded(DynamicImage::from(image))
    }
}

impl From<RgbaImage> for ImageSource {
    fn from(image: RgbaImage) -> Self {
        ImageSource::Decoded(DynamicImage::from(image))
    }
}

impl From<GrayImage> for ImageSource {
    fn from(image: GrayImage) -> Self {
        ImageSource::Decoded(DynamicImage::from(image))
    }
}

impl ImageSource {
    /// Decodes the source to interleaved RGB8.
    ///
    /// Fails with [`DetectError::InvalidImage`] if the data cannot be decoded or the
    /// image has zero area.
    pub fn decode(&self) -> Result<RgbImage, DetectError> {
        let image = match self {
            ImageSource::Path(path) => image::ImageReader::open(path)
                .map_err(|e| DetectError::InvalidImage(format!("{}: {}", path.display(), e)))?
                .with_guessed_format()
                .map_err(|e| DetectError::InvalidImage(format!("{}: {}", path.display(), e)))?
                .decode()?
                .to_rgb8(),
            ImageSource::Bytes(bytes) => image::load_from_memory(bytes)?.to_rgb8(),
            ImageSource::Decoded(image) => image.to_rgb8(),
        };

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectError::InvalidImage(format!(
                "{} has zero area ({}x{})",
                self.describe(),
                width,
                height
            )));
        }
        Ok(image)
    }

    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes(bytes) => format!("<{} encoded bytes>", bytes.len()),
            ImageSource::Decoded(image) => format!("<decoded {}x{}>", image.width(), image.height()),
        }
    }
}
