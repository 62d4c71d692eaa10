//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GeneratedImage, GenerationRequest};
use async_trait::async_trait;

/// Trait for image generation providers.
///
/// `generate` issues exactly one request and never retries.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates images from the given request, in response order.
    ///
    /// An empty result is reported as [`GraftError::NoImages`] rather than
    /// returned.
    ///
    /// [`GraftError::NoImages`]: crate::GraftError::NoImages
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedImage>>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and the key is accepted.
    async fn health_check(&self) -> Result<()>;
}
