//! Image editing example - modifies an existing image with a text prompt.
//!
//! Run with: `cargo run --example edit_image -- <input_image.png>`
//!
//! Reads the API key from `~/.graft_cfg` or `OPENROUTER_API_KEY`.

use graft::{GenerationRequest, GraftConfig, ImageProvider, OpenRouterProvider};

#[tokio::main(flavor = "current_thread")]
async fn main() -> graft::Result<()> {
    let input_path = std::env::args()
        .nth(1)
        .expect("Usage: edit_image <input_image.png>");

    let config = GraftConfig::load()?;
    let provider = OpenRouterProvider::builder().config(&config).build()?;

    let input = graft::input::read_image_file(&input_path)?;
    let request =
        GenerationRequest::new("Make the colors more vibrant and add a warm sunset glow")
            .with_input_image(input);

    let images = provider.generate(&request).await?;
    let first = &images[0];
    let path = format!("edited.{}", first.format.extension());
    first.save(&path)?;
    println!("Edited image saved to {path} ({} bytes)", first.size());

    Ok(())
}
