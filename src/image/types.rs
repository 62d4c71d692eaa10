//! Core types for image generation.

use crate::error::{GraftError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
    /// GIF format.
    Gif,
    /// Windows bitmap.
    Bmp,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Maps a declared MIME type (parameters ignored) to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            "image/bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        // BMP: "BM", zeroed reserved words, then a known DIB header size
        if data.len() >= 26
            && data.starts_with(b"BM")
            && data[6..10] == [0, 0, 0, 0]
            && matches!(
                u32::from_le_bytes([data[14], data[15], data[16], data[17]]),
                12 | 40 | 52 | 56 | 64 | 108 | 124
            )
        {
            return Some(Self::Bmp);
        }

        None
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// An image supplied as input for editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type sent alongside the data.
    pub mime_type: String,
}

impl InputImage {
    /// Creates an input image with an explicit MIME type.
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Creates an input image, detecting the MIME type from magic bytes.
    ///
    /// Unrecognized data is labelled `image/png`.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        let mime_type = ImageFormat::from_magic_bytes(&data)
            .unwrap_or_default()
            .mime_type();
        Self::new(data, mime_type)
    }

    /// Returns the image as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// A request to generate or edit images.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// The text prompt. May be absent when an input image is given.
    pub prompt: Option<String>,
    /// Input image for editing.
    pub input_image: Option<InputImage>,
    /// Model override; the provider default applies when unset.
    pub model: Option<String>,
    /// Temperature override; the provider default applies when unset.
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Creates an image-only request with no text prompt.
    pub fn from_image(image: InputImage) -> Self {
        Self {
            input_image: Some(image),
            ..Self::default()
        }
    }

    /// Sets an input image for editing.
    pub fn with_input_image(mut self, image: InputImage) -> Self {
        self.input_image = Some(image);
        self
    }

    /// Overrides the model for this request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Overrides the temperature for this request.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Returns true if this is an image editing request (has input image).
    pub fn is_edit(&self) -> bool {
        self.input_image.is_some()
    }

    /// Checks that the request carries a prompt or an input image.
    pub fn validate(&self) -> Result<()> {
        let has_prompt = self
            .prompt
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if !has_prompt && self.input_image.is_none() {
            return Err(GraftError::MissingInput(
                "no prompt provided. Use -p, pipe text to stdin, or supply an input image".into(),
            ));
        }
        Ok(())
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Position of this image in the response.
    pub index: usize,
    /// Request duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format, from the declared MIME type.
    pub format: ImageFormat,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(data: Vec<u8>, format: ImageFormat, metadata: GenerationMetadata) -> Self {
        Self {
            data,
            format,
            metadata,
        }
    }

    /// Decodes an image from a `data:<mime>;base64,<payload>` URL.
    ///
    /// The declared MIME type decides the format; PNG is assumed when it
    /// is missing or unknown.
    pub fn from_data_url(url: &str, metadata: GenerationMetadata) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| GraftError::Decode("not a data URL".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| GraftError::Decode("data URL has no payload".into()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| GraftError::Decode("data URL is not base64-encoded".into()))?;

        let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let data = base64::engine::general_purpose::STANDARD
            .decode(&cleaned)
            .map_err(|e| GraftError::Decode(e.to_string()))?;

        let format = ImageFormat::from_mime_type(mime).unwrap_or_default();
        Ok(Self::new(data, format, metadata))
    }

    /// Returns the actual format detected from magic bytes.
    pub fn detected_format(&self) -> Option<ImageFormat> {
        ImageFormat::from_magic_bytes(&self.data)
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path, overwriting any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}
