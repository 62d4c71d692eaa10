//! Resolving the prompt and input image from flags, files, and stdin.

use crate::error::{GraftError, Result};
use crate::image::{GenerationRequest, ImageFormat, InputImage};
use std::io::{IsTerminal, Read};
use std::path::Path;

/// What was piped on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinPayload {
    /// Nothing usable (terminal, or empty input).
    Empty,
    /// UTF-8 text, trimmed.
    Text(String),
    /// Binary data, assumed to be an image.
    Image(Vec<u8>),
}

impl StdinPayload {
    /// Classifies raw stdin bytes.
    ///
    /// Known image signatures and non-UTF-8 data are images; everything
    /// else is text.
    pub fn classify(data: Vec<u8>) -> Self {
        if data.is_empty() {
            return Self::Empty;
        }
        if is_binary_data(&data) {
            return Self::Image(data);
        }
        match String::from_utf8(data) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    Self::Empty
                } else {
                    Self::Text(text.to_string())
                }
            }
            Err(e) => Self::Image(e.into_bytes()),
        }
    }

    /// Reads and classifies stdin unless it is a terminal.
    pub fn read() -> Result<Self> {
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Ok(Self::Empty);
        }
        let mut data = Vec::new();
        stdin.lock().read_to_end(&mut data)?;
        Ok(Self::classify(data))
    }
}

/// Returns true if `data` looks like an image rather than text.
pub fn is_binary_data(data: &[u8]) -> bool {
    ImageFormat::from_magic_bytes(data).is_some() || std::str::from_utf8(data).is_err()
}

/// Reads an image file for editing, checking it looks like an image.
pub fn read_image_file(path: impl AsRef<Path>) -> Result<InputImage> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(GraftError::InvalidRequest(format!(
            "input image file not found: {}",
            path.display()
        )));
    }

    let mime = mime_guess::from_path(path).first();
    let mime_type = match mime {
        Some(m) if m.type_() == mime_guess::mime::IMAGE => m.essence_str().to_string(),
        _ => {
            return Err(GraftError::InvalidRequest(format!(
                "file does not appear to be an image: {}",
                path.display()
            )))
        }
    };

    let data = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), bytes = data.len(), %mime_type, "read input image");
    Ok(InputImage::new(data, mime_type))
}

/// Combines flags and stdin into a request.
///
/// A prompt flag beats stdin text; an image file beats stdin image bytes.
pub fn resolve_request(
    prompt_flag: Option<String>,
    image_path: Option<&Path>,
    stdin: StdinPayload,
) -> Result<GenerationRequest> {
    let (stdin_text, stdin_image) = match stdin {
        StdinPayload::Empty => (None, None),
        StdinPayload::Text(text) => (Some(text), None),
        StdinPayload::Image(data) => (None, Some(data)),
    };

    let prompt = prompt_flag
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .or(stdin_text);

    let input_image = match image_path {
        Some(path) => Some(read_image_file(path)?),
        None => stdin_image.map(InputImage::from_bytes),
    };

    let request = GenerationRequest {
        prompt,
        input_image,
        ..GenerationRequest::default()
    };
    request.validate()?;
    Ok(request)
}
