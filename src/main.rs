use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nanogen::{
    logger::{self, LoggerConfig},
    AspectRatio, Config, GeminiClient, GenerationSettings, ImageBlob, PromptingCredentialProvider,
    ReferenceImageSet, Resolution,
};

#[derive(Debug, Parser)]
#[command(name = "nanogen", version, about = "Generate images with Gemini")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Prompt describing the image
    prompt: Option<String>,

    /// Reference image (repeatable, up to 10)
    #[arg(short, long = "image")]
    images: Vec<PathBuf>,

    /// Auto, 1:1, 3:4, 4:3, 9:16 or 16:9
    #[arg(long, default_value = "Auto", value_parser = parse_aspect_ratio)]
    aspect_ratio: AspectRatio,

    /// 1K, 2K or 4K
    #[arg(long, default_value = "1K", value_parser = parse_resolution)]
    resolution: Resolution,

    #[arg(long, default_value_t = 1.0)]
    temperature: f32,

    /// Directory the generated image is saved into
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the /api/generate relay and CORS passthrough
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn parse_aspect_ratio(value: &str) -> Result<AspectRatio, String> {
    AspectRatio::parse(value).ok_or_else(|| format!("unsupported aspect ratio: {}", value))
}

fn parse_resolution(value: &str) -> Result<Resolution, String> {
    Resolution::parse(value).ok_or_else(|| format!("unsupported resolution: {}", value))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let cli = Cli::parse();

    let logger_config = if cli.verbose {
        LoggerConfig::development()
    } else {
        LoggerConfig::default()
    };
    logger::init_with_config(logger_config.with_env_level())?;

    if dotenv_loaded {
        log::debug!("✅ .env file loaded");
    }

    let config = Config::from_env();
    logger::log_config_info(&config);

    match cli.command {
        Some(Command::Serve { port }) => serve(config, port).await,
        None => generate(cli, config).await,
    }
}

#[cfg(feature = "server")]
async fn serve(config: Config, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match port {
        Some(port) => config.with_port(port),
        None => config,
    };
    nanogen::server::run(config).await?;
    Ok(())
}

#[cfg(not(feature = "server"))]
async fn serve(_config: Config, _port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    Err("this build has no relay server; rebuild with --features server".into())
}

async fn generate(cli: Cli, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let prompt = cli.prompt.unwrap_or_default();

    let mut references = ReferenceImageSet::new();
    if !cli.images.is_empty() {
        let mut blobs = Vec::with_capacity(cli.images.len());
        for path in &cli.images {
            blobs.push(ImageBlob::from_path(path).await?);
        }
        let admission = references.admit(blobs).await?;
        if let Some(warning) = admission.warning {
            log::warn!("⚠️  {}", warning);
        }
    }

    let settings = GenerationSettings::new()
        .with_aspect_ratio(cli.aspect_ratio)
        .with_resolution(cli.resolution)
        .with_temperature(cli.temperature);

    let client = GeminiClient::with_credentials(
        config.gemini,
        Arc::new(PromptingCredentialProvider::new()),
    )?;

    let response = client.generate(&prompt, &references, settings).await?;
    let path = nanogen::media::save_image(&response.image_data, &cli.out).await?;

    if let Some(rate_limit) = response.rate_limit {
        log::info!(
            "📊 Rate limit: {}/{} used, {} remaining",
            rate_limit.used,
            rate_limit.limit,
            rate_limit.remaining
        );
    }
    println!("{}", path.display());
    Ok(())
}
