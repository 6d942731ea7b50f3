use anyhow::Result;
use clap::{Parser, Subcommand};
use listing_uploader::app::{App, UploadField, UploadRequest};
use listing_uploader::uploader::DEFAULT_MAX_IMAGES;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "listing-uploader")]
#[command(about = "Compress and upload listing images")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,

    /// Confirm the committed URLs actually resolve after the upload.
    #[arg(long, global = true)]
    verify: bool,

    /// Retry a failed selection this many times (2s fixed interval).
    #[arg(long, global = true, default_value_t = 0)]
    retries: usize,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a building cover photo (single-image field).
    Cover {
        file: PathBuf,

        /// URL currently committed to the field; kept on failure.
        #[arg(long)]
        existing_url: Option<String>,
    },
    /// Upload photos into a unit gallery (multi-image field).
    Gallery {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_MAX_IMAGES)]
        max_images: usize,

        /// URLs already committed to the gallery (repeatable).
        #[arg(long)]
        existing: Vec<String>,
    },
}

impl CliArgs {
    fn into_request(self) -> UploadRequest {
        let field = match self.command {
            Command::Cover { file, existing_url } => UploadField::Cover { file, existing_url },
            Command::Gallery {
                files,
                max_images,
                existing,
            } => UploadField::Gallery {
                files,
                existing,
                max_images,
            },
        };
        UploadRequest {
            field,
            verify: self.verify,
            retries: self.retries,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_uploader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    let request = args.into_request();

    match App::new().await {
        Ok(app) => match app.run(request).await {
            Ok(report) => {
                info!("Upload completed successfully");
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
            Err(e) => {
                error!("Upload failed: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    }
}
