//! `convertkit` -- command-line client for the file-conversion service.
//!
//! Uploads a file, shows conversion progress and downloads the result.
//! Configuration comes from the environment (see [`CliConfig::from_env`])
//! and can be overridden per invocation with command-line flags.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default | Description                           |
//! |-------------------------|----------|---------|---------------------------------------|
//! | `CONVERTER_API_URL`     | no       | --      | Service address, e.g. `http://host:8000` |
//! | `CONVERTER_PAGE_ORIGIN` | no       | --      | Origin used to derive the address     |
//! | `MAX_UPLOAD_MB`         | no       | `100`   | Largest file accepted, in MiB         |
//! | `SUBMIT_TIMEOUT_SECS`   | no       | `1800`  | Budget for one conversion             |
//! | `INFO_TIMEOUT_SECS`     | no       | `5`     | Budget for the server-info ping       |
//! | `ENABLE_VIDEO`          | no       | `false` | Offer video conversions               |
//! | `DOWNLOAD_DIR`          | no       | `.`     | Where converted files are saved       |

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use convertkit_cli::commands::{self, ConvertOptions};
use convertkit_cli::config::CliConfig;
use convertkit_cli::error::CliError;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "convertkit", version, about = "Convert files with a remote conversion service")]
struct Cli {
    /// Service address; overrides CONVERTER_API_URL and origin-based resolution.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Include the video category.
    #[arg(long, global = true)]
    video: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert FILE to FORMAT and download the result.
    Convert {
        file: PathBuf,
        format: String,

        /// Directory for the converted file (default: DOWNLOAD_DIR or `.`).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Largest accepted file in MiB (default: MAX_UPLOAD_MB or 100).
        #[arg(long)]
        max_mb: Option<u64>,

        /// Never fall back to opening the download link externally.
        #[arg(long)]
        no_open_fallback: bool,

        /// Print the download location instead of downloading.
        #[arg(long)]
        no_download: bool,
    },
    /// List supported input extensions and output formats.
    Formats {
        /// Ask the service instead of using the built-in catalog.
        #[arg(long)]
        remote: bool,
    },
    /// Show what the service reports about itself.
    Info,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convertkit_cli=info,convertkit_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match CliConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Some(api_url) = cli.api_url {
        config.api_url = Some(api_url);
    }
    config.enable_video |= cli.video;

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "convertkit failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, mut config: CliConfig) -> Result<(), CliError> {
    match command {
        Command::Convert {
            file,
            format,
            out_dir,
            max_mb,
            no_open_fallback,
            no_download,
        } => {
            if let Some(dir) = out_dir {
                config.download_dir = dir;
            }
            if let Some(mb) = max_mb {
                config.max_upload_mb = mb;
            }
            let options = ConvertOptions {
                file,
                format,
                no_open_fallback,
                skip_download: no_download,
            };
            commands::convert(&config, &options).await?;
            Ok(())
        }
        Command::Formats { remote } => commands::formats(&config, remote).await,
        Command::Info => commands::info(&config).await,
    }
}
