use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use papiers::config::ImagingConfig;
use papiers::pipeline::import::mime_from_path;
use papiers::{DeidentifiedImages, DocumentImageProcessor, ImagePipeline, RawImageInput};

#[derive(Parser)]
#[command(version, about = "De-identify document photos before they are published")]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Produce the public and private artifacts for a photo
    Process {
        /// Photo to process
        file: PathBuf,
        /// Keep the public artifact unblurred
        #[arg(long)]
        no_blur: bool,
        /// Declared MIME type; guessed from the extension when omitted
        #[arg(long = "type")]
        declared_type: Option<String>,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// JSON file with imaging settings; `PAPIERS_*` variables still apply
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Check type and size only, without decoding
    Validate {
        file: PathBuf,
        #[arg(long = "type")]
        declared_type: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    papiers::init_tracing();
    if let Err(e) = run(Opts::parse()).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    match opts.command {
        Command::Process {
            file,
            no_blur,
            declared_type,
            out,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let input = read_input(&file, declared_type)?;
            let pipeline = Arc::new(ImagePipeline::from_config(&config));

            let images = pipeline.process_async(input, !no_blur).await?;
            let written = write_outputs(&out, &images)?;

            info!(
                source = %file.display(),
                out = %out.display(),
                files = written.len(),
                "Artifacts written"
            );
            println!("{}", serde_json::to_string_pretty(&images.summary())?);
        }
        Command::Validate {
            file,
            declared_type,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let input = read_input(&file, declared_type)?;
            let result = ImagePipeline::from_config(&config).validate(&input);

            println!("{}", serde_json::to_string_pretty(&result)?);
            if let Some(message) = result.message() {
                bail!("{message}");
            }
        }
    }
    Ok(())
}

/// Defaults, then the JSON file if given, then environment overrides.
fn load_config(path: Option<&Path>) -> anyhow::Result<ImagingConfig> {
    let base = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ImagingConfig::default(),
    };
    Ok(base.with_overrides(|key| std::env::var(key).ok()))
}

fn read_input(path: &Path, declared_type: Option<String>) -> anyhow::Result<RawImageInput> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let declared = declared_type.unwrap_or_else(|| mime_from_path(path));
    Ok(RawImageInput::new(bytes, declared))
}

/// Writes `public.<ext>`, `private.<ext>` and `summary.json` into `dir`.
fn write_outputs(dir: &Path, images: &DeidentifiedImages) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut written = Vec::with_capacity(3);
    for (stem, artifact) in [("public", &images.public), ("private", &images.private)] {
        let path = dir.join(format!("{stem}.{}", artifact.media_type.extension()));
        fs::write(&path, &artifact.bytes).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }

    let summary_path = dir.join("summary.json");
    fs::write(&summary_path, serde_json::to_vec_pretty(&images.summary())?)
        .with_context(|| format!("writing {}", summary_path.display()))?;
    written.push(summary_path);

    Ok(written)
}
