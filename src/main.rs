use clap::{Args, Parser, Subcommand};
use sdgen::{
    logger::{self, LogLevel, LoggerConfig},
    ClientConfig, Gallery, GallerySource, GenerationController, GenerationState, HttpImageApi,
    ImageApi, ImageDimension,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sdgen", version, about = "Generate and browse Stable Diffusion images")]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8000
    #[arg(long, global = true, env = "SDGEN_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, global = true, env = "SDGEN_LOG", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate one image from a prompt
    Generate(GenerateArgs),
    /// Browse or delete stored images
    #[command(subcommand)]
    Gallery(GalleryCommand),
    /// Check whether the backend and its model are up
    Health,
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(long, required_unless_present = "example")]
    prompt: Option<String>,

    /// Use one of the built-in example prompts (0-based)
    #[arg(long, conflicts_with = "prompt")]
    example: Option<usize>,

    #[arg(long)]
    negative_prompt: Option<String>,

    /// Inference steps, 5 to 20
    #[arg(long)]
    steps: Option<u32>,

    /// Guidance scale, 3 to 10 in steps of 0.5
    #[arg(long)]
    guidance_scale: Option<f32>,

    /// 256, 512, 768 or 1024
    #[arg(long)]
    width: Option<u32>,

    /// 256, 512, 768 or 1024
    #[arg(long)]
    height: Option<u32>,

    #[arg(long, conflicts_with = "random_seed")]
    seed: Option<String>,

    #[arg(long)]
    random_seed: bool,

    /// Save the generated image locally
    #[arg(long)]
    download: bool,

    #[arg(long, env = "SDGEN_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum GalleryCommand {
    /// List stored images
    List {
        /// Case-insensitive prompt filter
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Delete one stored image by file name
    Delete { filename: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let cli = Cli::parse();

    let level = LogLevel::parse(&cli.log_level)
        .ok_or_else(|| format!("unknown log level {:?}", cli.log_level))?;
    let logger_config = if cli.json_logs {
        LoggerConfig::production().with_level(level)
    } else {
        LoggerConfig::new().with_level(level)
    };
    logger::init_with_config(logger_config)?;

    if !dotenv_loaded {
        log::debug!("No .env file found, using process environment");
    }

    let mut config = ClientConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    logger::log_config_info(&config);

    let api = Arc::new(HttpImageApi::new(config.clone())?);

    match cli.command {
        Command::Generate(args) => generate(api, config, args).await,
        Command::Gallery(cmd) => gallery(api, cmd).await,
        Command::Health => health(api).await,
    }
}

async fn generate(
    api: Arc<HttpImageApi>,
    config: ClientConfig,
    args: GenerateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let download_dir = args
        .download_dir
        .unwrap_or_else(|| config.download_dir.clone());
    let mut controller = GenerationController::new(api, config);

    match (args.prompt, args.example) {
        (Some(prompt), _) => controller.set_prompt(prompt)?,
        (None, Some(index)) => controller.use_example_prompt(index)?,
        (None, None) => return Err("either --prompt or --example is required".into()),
    }
    if let Some(negative) = args.negative_prompt {
        controller.set_negative_prompt(negative)?;
    }
    if let Some(steps) = args.steps {
        controller.set_steps(steps)?;
    }
    if let Some(scale) = args.guidance_scale {
        controller.set_guidance_scale(scale)?;
    }
    if let Some(width) = args.width {
        controller.set_width(ImageDimension::try_from(width)?)?;
    }
    if let Some(height) = args.height {
        controller.set_height(ImageDimension::try_from(height)?)?;
    }
    if let Some(seed) = args.seed {
        controller.set_seed(seed)?;
    } else if args.random_seed {
        let seed = controller.randomize_seed()?;
        println!("seed: {}", seed);
    }

    match controller.submit().await? {
        GenerationState::Succeeded { result, .. } => {
            println!("{}", result.image_url);
            println!("{}", result.params_pretty());
        }
        GenerationState::Failed { message, .. } => return Err(message.clone().into()),
        other => return Err(format!("unexpected state: {}", other.name()).into()),
    }

    if args.download {
        let path = controller.download(&download_dir).await?;
        println!("saved: {}", path.display());
    }
    Ok(())
}

async fn gallery(
    api: Arc<HttpImageApi>,
    cmd: GalleryCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut gallery = Gallery::new(api);

    match cmd {
        GalleryCommand::List { search, page } => {
            if gallery.refresh().await == GallerySource::Sample {
                if let Some(notice) = gallery.notice() {
                    eprintln!("{}", notice);
                }
            }
            if let Some(term) = search {
                gallery.set_search(term);
            }
            gallery.set_page(page);

            let visible = gallery.visible();
            if visible.is_empty() {
                println!("No images found. Try a different search term or generate some new images.");
                return Ok(());
            }
            for item in visible {
                println!(
                    "{:>4}  {:<40}  {:<16}  {}",
                    item.id,
                    item.filename,
                    item.display_date(),
                    item.prompt
                );
            }
            println!("page {} of {}", gallery.page(), gallery.total_pages().max(1));
        }
        GalleryCommand::Delete { filename } => {
            gallery.delete(&filename).await?;
            println!("{} deleted", filename);
        }
    }
    Ok(())
}

async fn health(api: Arc<HttpImageApi>) -> Result<(), Box<dyn std::error::Error>> {
    let status = api.health().await?;
    println!(
        "status: {}  model loaded: {}  device: {}",
        status.status, status.model_loaded, status.device
    );
    if !status.is_ready() {
        return Err("backend is not ready".into());
    }
    Ok(())
}
