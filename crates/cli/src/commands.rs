//! Command implementations behind the `convertkit` binary.

use std::io::Write;
use std::path::{Path, PathBuf};

use convertkit_client::download::{FetchToDirectory, SaveStrategy};
use convertkit_client::{ConversionController, SavedArtifact};
use convertkit_core::catalog::FormatCatalog;
use convertkit_core::outcome::ConversionOutcome;
use convertkit_core::SourceFile;
use tokio_stream::StreamExt;

use crate::config::CliConfig;
use crate::error::CliError;
use crate::render;

const BAR_WIDTH: usize = 30;

/// Options for a single conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub file: PathBuf,
    pub format: String,
    /// Only fetch the artifact; never hand it to the system opener.
    pub no_open_fallback: bool,
    /// Leave the artifact on the service instead of downloading it.
    pub skip_download: bool,
}

/// Convert one file and download the result.
///
/// Returns the saved artifact, or `None` when the download was skipped.
pub async fn convert(
    config: &CliConfig,
    options: &ConvertOptions,
) -> Result<Option<SavedArtifact>, CliError> {
    let api = config.build_api();
    tracing::info!(base_url = api.base_url(), "Using conversion service");

    if let Some(info) = api.server_info().await {
        tracing::debug!(
            status = info.status.as_deref().unwrap_or("unknown"),
            access_url = info.access_url.as_deref().unwrap_or("-"),
            "Service reachable",
        );
    }

    let mut controller = ConversionController::new(api.clone(), config.catalog(), config.limits());
    if options.no_open_fallback {
        let strategies: Vec<Box<dyn SaveStrategy>> = vec![Box::new(FetchToDirectory::new(api))];
        controller = controller.with_strategies(strategies);
    }

    let source = SourceFile::from_path(&options.file).map_err(|source| CliError::Source {
        path: options.file.clone(),
        source,
    })?;
    let category = controller.select_file(source)?;
    controller.select_format(&options.format);
    tracing::debug!(%category, formats = ?controller.available_formats(), "Selection ready");

    let mut stream = controller.submit()?;
    let mut terminal = None;
    while let Some(outcome) = stream.next().await {
        draw(&outcome);
        if outcome.is_terminal() {
            terminal = Some(outcome);
        }
    }
    eprintln!();

    match terminal {
        Some(ConversionOutcome::Succeeded { download_location }) => {
            if options.skip_download {
                println!("{download_location}");
                return Ok(None);
            }
            let saved = download(&mut controller, &config.download_dir).await?;
            Ok(Some(saved))
        }
        Some(ConversionOutcome::Failed { kind, message }) => Err(CliError::Failed { kind, message }),
        Some(ConversionOutcome::Pending { .. }) | None => Err(CliError::Abandoned),
    }
}

/// Print the catalog, optionally as reported by the service.
pub async fn formats(config: &CliConfig, remote: bool) -> Result<(), CliError> {
    let catalog = if remote {
        let remote = config.build_api().formats().await?;
        FormatCatalog::from_remote(&remote)
    } else {
        config.catalog()
    };

    for entry in catalog.entries() {
        println!(
            "{:<9} {} -> {}",
            entry.category.as_str(),
            entry.inputs.join(","),
            entry.outputs.join(",")
        );
    }
    Ok(())
}

/// Print the service's self-description.
pub async fn info(config: &CliConfig) -> Result<(), CliError> {
    let api = config.build_api();
    match api.server_info().await {
        Some(info) => {
            println!("service:    {}", api.base_url());
            println!("status:     {}", info.status.as_deref().unwrap_or("unknown"));
            if let Some(message) = info.message {
                println!("message:    {message}");
            }
            if let Some(url) = info.access_url {
                println!("access url: {url}");
            }
        }
        None => println!("service:    {} (unavailable)", api.base_url()),
    }
    Ok(())
}

async fn download(
    controller: &mut ConversionController,
    dest_dir: &Path,
) -> Result<SavedArtifact, CliError> {
    let saved = controller.download(dest_dir).await?;
    match &saved.path {
        Some(path) => println!("{}", path.display()),
        None => println!("opened {}", saved.filename),
    }
    Ok(saved)
}

fn draw(outcome: &ConversionOutcome) {
    let mut stderr = std::io::stderr().lock();
    let _ = write!(stderr, "{}", render::redraw(&render::status_line(outcome, BAR_WIDTH)));
    let _ = stderr.flush();
}
