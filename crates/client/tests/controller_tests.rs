mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use convertkit_client::download::{FetchToDirectory, Launcher, OpenExternally, SaveStrategy};
use convertkit_client::{ConversionApi, ConversionController, OutcomeStream};
use convertkit_core::catalog::FormatCatalog;
use convertkit_core::error::{ConversionError, ErrorKind};
use convertkit_core::outcome::ConversionOutcome;
use convertkit_core::validation::UploadLimits;
use convertkit_core::SourceFile;
use serde_json::json;
use tokio_stream::StreamExt;

use common::{ConvertBehavior, DownloadBehavior};

fn controller(base_url: &str) -> ConversionController {
    ConversionController::new(
        ConversionApi::new(base_url),
        FormatCatalog::default(),
        UploadLimits::default(),
    )
}

/// Drain a submission's stream, failing the test if it never ends.
async fn collect(stream: OutcomeStream) -> Vec<ConversionOutcome> {
    tokio::time::timeout(Duration::from_secs(10), stream.collect::<Vec<_>>())
        .await
        .expect("outcome stream did not finish")
}

fn pending_percents(outcomes: &[ConversionOutcome]) -> Vec<f32> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            ConversionOutcome::Pending { percent } => Some(*percent),
            _ => None,
        })
        .collect()
}

/// Launcher that records the URLs it was asked to open.
#[derive(Clone, Default)]
struct RecordingLauncher {
    opened: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn open(&self, url: &str) -> Result<(), String> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

// -- submission --------------------------------------------------------------

#[tokio::test]
async fn audio_conversion_succeeds() {
    let mock = common::spawn(
        ConvertBehavior::succeed("/download/abc.mp3"),
        DownloadBehavior::NotFound,
    )
    .await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("song.wav", vec![1u8; 2048])).unwrap();
    ctl.select_format("mp3");

    let outcomes = collect(ctl.submit().unwrap()).await;

    let expected_location = format!("{}/download/abc.mp3", mock.base_url);
    let n = outcomes.len();
    assert_eq!(outcomes[0], ConversionOutcome::Pending { percent: 0.0 });
    assert_eq!(outcomes[n - 2], ConversionOutcome::Pending { percent: 100.0 });
    assert_eq!(
        outcomes[n - 1],
        ConversionOutcome::Succeeded {
            download_location: expected_location.clone()
        }
    );

    let percents = pending_percents(&outcomes);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));

    assert_eq!(ctl.download_location(), Some(expected_location));
    assert_eq!(ctl.progress(), 100.0);
    assert!(!ctl.is_running());
}

#[tokio::test(start_paused = true)]
async fn audio_progress_crawls_to_85_and_holds_until_response() {
    let response_delay = Duration::from_secs(400);
    let mock = common::spawn(
        ConvertBehavior::succeed_after(response_delay, "/download/abc.mp3"),
        DownloadBehavior::NotFound,
    )
    .await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("song.wav", vec![1u8; 1024])).unwrap();
    ctl.select_format("mp3");

    let started = tokio::time::Instant::now();
    let mut stream = ctl.submit().unwrap();
    let mut timeline = Vec::new();
    while let Some(outcome) = tokio::time::timeout(Duration::from_secs(3600), stream.next())
        .await
        .expect("outcome stream did not finish")
    {
        timeline.push((started.elapsed(), outcome));
    }

    let outcomes: Vec<ConversionOutcome> = timeline.iter().map(|(_, o)| o.clone()).collect();
    let n = outcomes.len();
    assert_eq!(outcomes[0], ConversionOutcome::Pending { percent: 0.0 });
    assert_eq!(outcomes[n - 3], ConversionOutcome::Pending { percent: 85.0 });
    assert_eq!(outcomes[n - 2], ConversionOutcome::Pending { percent: 100.0 });
    assert_matches!(&outcomes[n - 1], ConversionOutcome::Succeeded { .. });

    // After the upload share, every synthetic step is +0.5.
    let crawl: Vec<f32> = pending_percents(&outcomes)
        .into_iter()
        .filter(|p| (20.0..100.0).contains(p))
        .collect();
    assert_eq!(crawl.first(), Some(&20.0));
    assert!(crawl.windows(2).all(|w| w[1] - w[0] == 0.5), "{crawl:?}");

    // 130 steps of 500 ms at the earliest; then held until the response.
    let reached_ceiling = timeline[n - 3].0;
    let answered = timeline[n - 1].0;
    assert!(reached_ceiling >= Duration::from_secs(65), "{reached_ceiling:?}");
    assert!(reached_ceiling < response_delay);
    assert!(answered >= response_delay);
}

#[tokio::test]
async fn image_progress_crawls_but_stays_below_ceiling() {
    let mock = common::spawn(
        ConvertBehavior::succeed_after(Duration::from_millis(900), "/download/out.webp"),
        DownloadBehavior::NotFound,
    )
    .await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("photo.png", vec![1u8; 512])).unwrap();
    ctl.select_format("webp");

    let outcomes = collect(ctl.submit().unwrap()).await;
    let percents = pending_percents(&outcomes);

    let before_completion: Vec<f32> = percents.iter().copied().filter(|p| *p < 100.0).collect();
    assert!(before_completion.iter().any(|p| *p > 20.0), "no synthetic ticks: {percents:?}");
    assert!(before_completion.iter().all(|p| *p <= 90.0));
    assert_matches!(outcomes.last(), Some(ConversionOutcome::Succeeded { .. }));
}

#[tokio::test]
async fn server_failure_resets_progress() {
    let mock = common::spawn(
        ConvertBehavior::fail(500, json!({ "detail": "conversion engine crashed" })),
        DownloadBehavior::NotFound,
    )
    .await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("notes.txt", b"hello".to_vec())).unwrap();
    ctl.select_format("pdf");

    let outcomes = collect(ctl.submit().unwrap()).await;

    assert_eq!(
        outcomes.last(),
        Some(&ConversionOutcome::Failed {
            kind: ErrorKind::ServerError,
            message: "conversion engine crashed".into(),
        })
    );
    assert_eq!(ctl.progress(), 0.0);
    assert!(ctl.download_location().is_none());
}

#[tokio::test]
async fn unreachable_service_reports_network_error() {
    let base = common::unreachable_base_url().await;
    let mut ctl = controller(&base);
    ctl.select_file(SourceFile::from_bytes("notes.txt", b"hello".to_vec())).unwrap();
    ctl.select_format("pdf");

    let outcomes = collect(ctl.submit().unwrap()).await;

    assert_eq!(
        outcomes.last().and_then(ConversionOutcome::error_kind),
        Some(ErrorKind::NetworkUnreachable)
    );
}

#[tokio::test]
async fn vanished_source_file_is_unreadable() {
    let mock = common::spawn(ConvertBehavior::succeed("/download/a.mp3"), DownloadBehavior::NotFound).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.wav");
    std::fs::write(&path, [0u8; 64]).unwrap();

    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_path(&path).unwrap()).unwrap();
    ctl.select_format("mp3");
    std::fs::remove_file(&path).unwrap();

    let outcomes = collect(ctl.submit().unwrap()).await;

    assert_eq!(
        outcomes.last().and_then(ConversionOutcome::error_kind),
        Some(ErrorKind::SourceUnreadable)
    );
    assert!(mock.conversions().is_empty());
}

#[tokio::test]
async fn source_grown_past_ceiling_never_reaches_service() {
    let mock = common::spawn(ConvertBehavior::succeed("/download/a.mp3"), DownloadBehavior::NotFound).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.wav");
    std::fs::write(&path, [0u8; 10]).unwrap();

    let mut ctl = ConversionController::new(
        ConversionApi::new(&mock.base_url),
        FormatCatalog::default(),
        UploadLimits { max_bytes: 50 },
    );
    ctl.select_file(SourceFile::from_path(&path).unwrap()).unwrap();
    ctl.select_format("mp3");
    std::fs::write(&path, [0u8; 5000]).unwrap();

    let outcomes = collect(ctl.submit().unwrap()).await;

    assert_eq!(
        outcomes.last().and_then(ConversionOutcome::error_kind),
        Some(ErrorKind::FileTooLarge)
    );
    assert!(ctl.download_location().is_none());
    assert!(mock.conversions().is_empty());
}

#[tokio::test]
async fn validation_failure_never_reaches_service() {
    let mock = common::spawn(ConvertBehavior::succeed("/download/a.jpg"), DownloadBehavior::NotFound).await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("photo.jpeg", vec![0u8; 8])).unwrap();
    ctl.select_format("jpg");

    assert_matches!(ctl.submit(), Err(ConversionError::SameFormat(_)));

    ctl.select_file(SourceFile::from_bytes("setup.exe", vec![0u8; 8])).unwrap();
    ctl.select_format("pdf");

    assert_matches!(ctl.submit(), Err(ConversionError::UnsupportedExtension(_)));
    assert!(mock.conversions().is_empty());
}

// -- supersession ------------------------------------------------------------

#[tokio::test]
async fn new_submission_supersedes_previous() {
    let mock = common::spawn(ConvertBehavior::Hang, DownloadBehavior::NotFound).await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("song.wav", vec![0u8; 64])).unwrap();
    ctl.select_format("mp3");

    let first = ctl.submit().unwrap();
    let second = ctl.submit().unwrap();

    let first_outcomes = collect(first).await;
    assert!(first_outcomes.iter().all(|o| !o.is_terminal()));
    assert!(ctl.is_running());

    drop(ctl);
    let second_outcomes = collect(second).await;
    assert!(second_outcomes.iter().all(|o| !o.is_terminal()));
}

#[tokio::test]
async fn selecting_new_file_cancels_and_clears() {
    let mock = common::spawn(ConvertBehavior::Hang, DownloadBehavior::NotFound).await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("song.wav", vec![0u8; 64])).unwrap();
    ctl.select_format("mp3");

    let stream = ctl.submit().unwrap();
    ctl.select_file(SourceFile::from_bytes("photo.png", vec![0u8; 64])).unwrap();

    let outcomes = collect(stream).await;
    assert!(outcomes.iter().all(|o| !o.is_terminal()));
    assert!(ctl.outcome().is_none());
    assert!(ctl.selection().target_format.is_none());
}

#[tokio::test]
async fn watch_receiver_sees_terminal_outcome() {
    let mock = common::spawn(ConvertBehavior::succeed("/download/a.txt"), DownloadBehavior::NotFound).await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("report.pdf", vec![0u8; 64])).unwrap();
    ctl.select_format("txt");

    let mut rx = ctl.subscribe();
    let _stream = ctl.submit().unwrap();

    let terminal = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(o) = rx.borrow_and_update().clone().filter(ConversionOutcome::is_terminal) {
                return o;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    assert_matches!(terminal, ConversionOutcome::Succeeded { .. });
}

// -- download ----------------------------------------------------------------

#[tokio::test]
async fn download_writes_artifact() {
    let mock = common::spawn(
        ConvertBehavior::succeed("/download/abc.mp3"),
        DownloadBehavior::Bytes(b"ID3 converted audio".to_vec()),
    )
    .await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("song.wav", vec![0u8; 64])).unwrap();
    ctl.select_format("mp3");
    collect(ctl.submit().unwrap()).await;

    let dir = tempfile::tempdir().unwrap();
    let saved = ctl.download(dir.path()).await.unwrap();

    assert_eq!(saved.filename, "abc.mp3");
    assert_eq!(saved.strategy, "fetch");
    let path = saved.path.unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"ID3 converted audio");
    assert!(ctl.download_location().is_some());
}

#[tokio::test]
async fn expired_artifact_clears_location() {
    let mock = common::spawn(
        ConvertBehavior::succeed("/download/abc.mp3"),
        DownloadBehavior::NotFound,
    )
    .await;
    let launcher = RecordingLauncher::default();
    let api = ConversionApi::new(&mock.base_url);
    let strategies: Vec<Box<dyn SaveStrategy>> = vec![
        Box::new(FetchToDirectory::new(api.clone())),
        Box::new(OpenExternally::new(Box::new(launcher.clone()))),
    ];
    let mut ctl = ConversionController::new(api, FormatCatalog::default(), UploadLimits::default())
        .with_strategies(strategies);
    ctl.select_file(SourceFile::from_bytes("song.wav", vec![0u8; 64])).unwrap();
    ctl.select_format("mp3");
    collect(ctl.submit().unwrap()).await;
    assert!(ctl.download_location().is_some());

    let dir = tempfile::tempdir().unwrap();
    let result = ctl.download(dir.path()).await;

    assert_matches!(result, Err(ConversionError::ArtifactExpired));
    assert!(ctl.download_location().is_none());
    assert_eq!(
        ctl.outcome().and_then(|o| o.error_kind()),
        Some(ErrorKind::ArtifactExpired)
    );
    assert!(launcher.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_artifact_falls_back_to_opener() {
    let mock = common::spawn(
        ConvertBehavior::succeed("/download/doc.pdf"),
        DownloadBehavior::Empty,
    )
    .await;
    let launcher = RecordingLauncher::default();
    let api = ConversionApi::new(&mock.base_url);
    let strategies: Vec<Box<dyn SaveStrategy>> = vec![
        Box::new(FetchToDirectory::new(api.clone())),
        Box::new(OpenExternally::new(Box::new(launcher.clone()))),
    ];
    let mut ctl = ConversionController::new(api, FormatCatalog::default(), UploadLimits::default())
        .with_strategies(strategies);
    ctl.select_file(SourceFile::from_bytes("notes.txt", b"hello".to_vec())).unwrap();
    ctl.select_format("pdf");
    collect(ctl.submit().unwrap()).await;

    let dir = tempfile::tempdir().unwrap();
    let saved = ctl.download(dir.path()).await.unwrap();

    assert_eq!(saved.strategy, "open");
    assert!(saved.path.is_none());
    assert_eq!(
        *launcher.opened.lock().unwrap(),
        vec![format!("{}/download/doc.pdf", mock.base_url)]
    );
    assert!(!dir.path().join("doc.pdf").exists());
}

#[tokio::test]
async fn aborted_transfer_leaves_no_partial_file() {
    let mock = common::spawn(
        ConvertBehavior::succeed("/download/clip.mp3"),
        DownloadBehavior::Truncated(vec![7u8; 4096]),
    )
    .await;
    let launcher = RecordingLauncher::default();
    let api = ConversionApi::new(&mock.base_url);
    let strategies: Vec<Box<dyn SaveStrategy>> = vec![
        Box::new(FetchToDirectory::new(api.clone())),
        Box::new(OpenExternally::new(Box::new(launcher.clone()))),
    ];
    let mut ctl = ConversionController::new(api, FormatCatalog::default(), UploadLimits::default())
        .with_strategies(strategies);
    ctl.select_file(SourceFile::from_bytes("song.wav", vec![0u8; 64])).unwrap();
    ctl.select_format("mp3");
    collect(ctl.submit().unwrap()).await;

    let dir = tempfile::tempdir().unwrap();
    let saved = ctl.download(dir.path()).await.unwrap();

    assert_eq!(saved.strategy, "open");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn download_keeps_existing_file() {
    let mock = common::spawn(
        ConvertBehavior::succeed("/download/abc.mp3"),
        DownloadBehavior::Bytes(b"new audio".to_vec()),
    )
    .await;
    let mut ctl = controller(&mock.base_url);
    ctl.select_file(SourceFile::from_bytes("song.wav", vec![0u8; 64])).unwrap();
    ctl.select_format("mp3");
    collect(ctl.submit().unwrap()).await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("abc.mp3"), b"earlier result").unwrap();

    let saved = ctl.download(dir.path()).await.unwrap();

    assert_eq!(saved.path, Some(dir.path().join("abc (1).mp3")));
    assert_eq!(std::fs::read(dir.path().join("abc.mp3")).unwrap(), b"earlier result");
    assert_eq!(std::fs::read(dir.path().join("abc (1).mp3")).unwrap(), b"new audio");
}
