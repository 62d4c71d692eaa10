//! Writing generated images to files or stdout.

use crate::error::Result;
use crate::image::{GeneratedImage, ImageFormat};
use chrono::{DateTime, Local};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Maximum number of prompt characters carried into a generated filename.
const MAX_SLUG_LEN: usize = 50;

/// Where generated images go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Raw bytes of the first image to stdout.
    Stdout,
    /// An explicit file name; extra images are numbered after it.
    File(PathBuf),
    /// A timestamped name derived from the prompt.
    Auto,
}

impl OutputTarget {
    /// Interprets an `-o` value: `-` is stdout, absent is auto-named.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("-") => Self::Stdout,
            Some(path) => Self::File(PathBuf::from(path)),
            None => Self::Auto,
        }
    }
}

/// Builds `graft_<timestamp>_<slug>.<ext>` from a prompt.
pub fn generate_filename(prompt: Option<&str>, now: DateTime<Local>, format: ImageFormat) -> String {
    let timestamp = now.format("%Y%m%d_%H%M%S");
    let slug = prompt.map(slugify).unwrap_or_default();
    if slug.is_empty() {
        format!("graft_{timestamp}.{}", format.extension())
    } else {
        format!("graft_{timestamp}_{slug}.{}", format.extension())
    }
}

/// Keeps word characters, turns runs of whitespace and hyphens into `_`.
fn slugify(prompt: &str) -> String {
    let mut slug = String::new();
    let mut pending_sep = false;
    for c in prompt.chars() {
        if c.is_whitespace() || c == '-' {
            pending_sep = !slug.is_empty();
        } else if c.is_alphanumeric() || c == '_' {
            if pending_sep {
                slug.push('_');
                pending_sep = false;
            }
            slug.push(c);
        }
    }
    slug.chars().take(MAX_SLUG_LEN).collect()
}

/// Path for the image at `index` (0-based) given the first image's path.
///
/// Index 0 keeps `base`; later images become `stem_2.ext`, `stem_3.ext`, ...
pub fn numbered_path(base: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{}.{}", index + 1, ext.to_string_lossy()),
        None => format!("{stem}_{}", index + 1),
    };
    base.with_file_name(name)
}

/// Resolves the first image's path for a file target.
///
/// Explicit names keep their extension; one is added when missing.
fn base_path(target: &OutputTarget, prompt: Option<&str>, format: ImageFormat) -> PathBuf {
    match target {
        OutputTarget::File(path) if path.extension().is_some() => path.clone(),
        OutputTarget::File(path) => path.with_extension(format.extension()),
        _ => PathBuf::from(generate_filename(prompt, Local::now(), format)),
    }
}

/// Writes the first image's raw bytes to `out`.
///
/// Returns the number of bytes written; later images are ignored.
pub fn write_first_to<W: Write>(images: &[GeneratedImage], out: &mut W) -> Result<usize> {
    let Some(first) = images.first() else {
        return Ok(0);
    };
    out.write_all(&first.data)?;
    out.flush()?;
    if images.len() > 1 {
        tracing::info!(skipped = images.len() - 1, "only the first image goes to stdout");
    }
    Ok(first.size())
}

/// Saves every image to disk using the numbering scheme.
///
/// Stops at the first failed write. Auto-named images each take their
/// extension from their own format.
pub fn save_images(
    images: &[GeneratedImage],
    target: &OutputTarget,
    prompt: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let Some(first) = images.first() else {
        return Ok(Vec::new());
    };
    let base = base_path(target, prompt, first.format);

    let mut written = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let mut path = numbered_path(&base, index);
        if *target == OutputTarget::Auto {
            path.set_extension(image.format.extension());
        }
        image.save(&path)?;
        tracing::debug!(path = %path.display(), bytes = image.size(), "saved image");
        written.push(path);
    }
    Ok(written)
}
