#![warn(missing_docs)]
//! Graft - image generation and editing through OpenRouter.
//!
//! One prompt (and optionally one input image) goes out as a single
//! chat-completions request; every inline image in the reply comes back
//! as a [`GeneratedImage`].
//!
//! # Quick Start
//!
//! ```no_run
//! use graft::{GenerationRequest, GraftConfig, ImageProvider, OpenRouterProvider};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> graft::Result<()> {
//!     let config = GraftConfig::load()?;
//!     let provider = OpenRouterProvider::builder().config(&config).build()?;
//!     let request = GenerationRequest::new("A lighthouse in a thunderstorm");
//!     for (i, image) in provider.generate(&request).await?.iter().enumerate() {
//!         image.save(format!("lighthouse_{i}.{}", image.format.extension()))?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Editing
//!
//! ```no_run
//! use graft::{GenerationRequest, ImageProvider, OpenRouterProvider};
//!
//! # async fn run() -> graft::Result<()> {
//! let provider = OpenRouterProvider::builder().api_key("sk-or-...").build()?;
//! let input = graft::input::read_image_file("bottle.png")?;
//! let request = GenerationRequest::new("make the bottle green").with_input_image(input);
//! let _images = provider.generate(&request).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `graft` command-line binary.

pub mod config;
mod error;
pub mod image;
pub mod input;
pub mod models;
pub mod output;

// Re-export error types at crate root
pub use error::{GraftError, Result};

pub use config::GraftConfig;
pub use image::providers::{OpenRouterProvider, OpenRouterProviderBuilder};
pub use image::{
    GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat, ImageProvider, InputImage,
};
pub use models::{ModelCatalog, ModelInfo};
pub use output::OutputTarget;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::GraftConfig;
    pub use crate::error::{GraftError, Result};
    pub use crate::image::providers::OpenRouterProvider;
    pub use crate::image::{GeneratedImage, GenerationRequest, ImageProvider, InputImage};
    pub use crate::output::OutputTarget;
}
