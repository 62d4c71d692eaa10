//! Basic image generation example.
//!
//! Run with: `cargo run --example generate_image`
//!
//! Reads the API key from `~/.graft_cfg` or `OPENROUTER_API_KEY`.

use graft::output::{save_images, OutputTarget};
use graft::{GenerationRequest, GraftConfig, ImageProvider, OpenRouterProvider};

#[tokio::main(flavor = "current_thread")]
async fn main() -> graft::Result<()> {
    let config = GraftConfig::load()?;
    let provider = OpenRouterProvider::builder().config(&config).build()?;

    let request = GenerationRequest::new("A golden retriever puppy playing in snow");
    let images = provider.generate(&request).await?;

    let target = OutputTarget::File("output.png".into());
    for path in save_images(&images, &target, request.prompt.as_deref())? {
        println!("Saved {}", path.display());
    }

    Ok(())
}
