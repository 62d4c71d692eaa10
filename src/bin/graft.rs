//! CLI for Graft - image generation via OpenRouter.

use clap::Parser;
use graft::input::{resolve_request, StdinPayload};
use graft::output::{save_images, write_first_to, OutputTarget};
use graft::{
    GeneratedImage, GraftConfig, GraftError, ImageProvider, ModelCatalog, OpenRouterProvider,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXAMPLES: &str = "\
Examples:
  graft -p \"A sunset over mountains\"
  echo \"A futuristic city\" | graft
  graft -p \"Abstract art\" -m google/gemini-2.5-flash-image-preview -t 0.8
  graft -i bottle.png -p \"make the bottle green\"
  cat bottle.png | graft -p \"make the bottle green\"
  graft -p \"street scene\" -o street.png
  graft -p \"vintage car\" -o - > car.png";

#[derive(Parser)]
#[command(name = "graft")]
#[command(about = "Generate images using OpenRouter image generation models")]
#[command(version)]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Prompt for image generation or editing
    #[arg(short, long)]
    prompt: Option<String>,

    /// Input image file for editing
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Output filename, or `-` for stdout (default: auto-generated)
    #[arg(short, long)]
    output: Option<String>,

    /// Override the model specified in config
    #[arg(short, long)]
    model: Option<String>,

    /// Override the temperature setting (clamped to 0.0-2.0)
    #[arg(short, long, allow_negative_numbers = true)]
    temperature: Option<f32>,

    /// List all available OpenRouter image generation model names
    #[arg(long)]
    list_models: bool,

    /// List image generation models with detailed information
    #[arg(long, conflicts_with = "list_models")]
    list_models_with_details: bool,

    /// Check that the configured API key is accepted
    #[arg(long)]
    check_key: bool,

    /// Config file (default: ~/.graft_cfg)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print a JSON summary instead of text
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<GraftError>()
                .map(GraftError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> graft::Result<GraftConfig> {
    match path {
        Some(path) => GraftConfig::load_from(path),
        None => GraftConfig::load(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.list_models || cli.list_models_with_details {
        return list_models(&cli).await;
    }

    let config = load_config(cli.config.as_deref())?;
    let provider = OpenRouterProvider::builder().config(&config).build()?;

    if cli.check_key {
        return check_key(&provider, cli.json).await;
    }

    let stdin = StdinPayload::read()?;
    let mut request = resolve_request(cli.prompt, cli.image.as_deref(), stdin)?;
    if let Some(model) = cli.model {
        request = request.with_model(model);
    }
    if let Some(temperature) = cli.temperature {
        request = request.with_temperature(temperature);
    }

    let target = OutputTarget::from_arg(cli.output.as_deref());
    let images = provider.generate(&request).await?;

    if target == OutputTarget::Stdout {
        let mut stdout = std::io::stdout().lock();
        write_first_to(&images, &mut stdout)?;
        return Ok(());
    }

    let paths = save_images(&images, &target, request.prompt.as_deref())?;
    report_saved(&images, &paths, provider.resolve_model(&request), cli.json)
}

fn report_saved(
    images: &[GeneratedImage],
    paths: &[PathBuf],
    model: &str,
    json_output: bool,
) -> anyhow::Result<()> {
    if json_output {
        let entries: Vec<_> = images
            .iter()
            .zip(paths)
            .map(|(image, path)| {
                serde_json::json!({
                    "output": path.display().to_string(),
                    "size_bytes": image.size(),
                    "format": image.format.extension(),
                })
            })
            .collect();
        let result = serde_json::json!({
            "success": true,
            "model": model,
            "duration_ms": images.first().and_then(|i| i.metadata.duration_ms),
            "images": entries,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for (i, (image, path)) in images.iter().zip(paths).enumerate() {
            eprintln!(
                "Image {} saved: {} ({} bytes)",
                i + 1,
                path.display(),
                image.size()
            );
        }
        println!("Generated {} image(s) with {}", images.len(), model);
    }
    Ok(())
}

async fn check_key(provider: &OpenRouterProvider, json_output: bool) -> anyhow::Result<()> {
    provider.health_check().await?;
    if json_output {
        let result = serde_json::json!({ "success": true, "provider": provider.name() });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("API key is valid ({})", provider.name());
    }
    Ok(())
}

async fn list_models(cli: &Cli) -> anyhow::Result<()> {
    // Listing works without a key, so a broken config only loses the key.
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::debug!(error = %e, "listing models without configuration");
            None
        }
    };
    let models = ModelCatalog::from_config(config.as_ref())?
        .image_models()
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!(
        "Available OpenRouter Image Generation Models ({} total):",
        models.len()
    );
    if cli.list_models_with_details {
        println!("{}", "=".repeat(70));
        for model in &models {
            println!("{}", model.details());
            println!("{}", "-".repeat(70));
        }
    } else {
        for model in &models {
            println!("{}", model.id);
        }
    }
    Ok(())
}
