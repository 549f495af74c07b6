//! Conversion request lifecycle.
//!
//! [`ConversionController`] owns the user's selection, validates it,
//! runs at most one submission at a time and exposes the outcome both as
//! a per-submission stream and as a `watch` value for presentation
//! layers.
//!
//! Each submission runs in its own task with a [`CancellationToken`].
//! Superseding a submission cancels the token: the task stops its
//! progress timer, drops the in-flight HTTP request and closes its
//! outcome stream without a terminal value. Anything the old task tries
//! to publish after cancellation is discarded.

use std::path::Path;
use std::sync::Arc;

use convertkit_core::catalog::Category;
use convertkit_core::outcome::ConversionOutcome;
use convertkit_core::progress::{ProgressProfile, ProgressTracker};
use convertkit_core::validation::{check_size, validate, UploadLimits};
use convertkit_core::{ConversionError, ConversionRequest, FormatCatalog, Selection, SourceFile};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::api::ConversionApi;
use crate::download::{default_strategies, run_strategies, SaveStrategy, SavedArtifact};

/// Outcomes of one submission, in order. Ends after a terminal outcome,
/// or early if the submission is superseded.
pub type OutcomeStream = UnboundedReceiverStream<ConversionOutcome>;

/// Handle on the running submission task.
struct ActiveSubmission {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the user's selection and drives at most one conversion at a time.
///
/// Dropping the controller cancels the running submission.
pub struct ConversionController {
    api: Arc<ConversionApi>,
    catalog: FormatCatalog,
    limits: UploadLimits,
    strategies: Vec<Box<dyn SaveStrategy>>,
    selection: Selection,
    active: Option<ActiveSubmission>,
    state: Arc<watch::Sender<Option<ConversionOutcome>>>,
}

impl ConversionController {
    /// Create a controller using the default download strategies
    /// (fetch to directory, then the system opener).
    pub fn new(api: ConversionApi, catalog: FormatCatalog, limits: UploadLimits) -> Self {
        let strategies = default_strategies(&api);
        let (state, _) = watch::channel(None);
        Self {
            api: Arc::new(api),
            catalog,
            limits,
            strategies,
            selection: Selection::default(),
            active: None,
            state: Arc::new(state),
        }
    }

    /// Replace the download strategy chain.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn SaveStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// The client submissions go through.
    pub fn api(&self) -> &ConversionApi {
        &self.api
    }

    /// The catalog used to classify files and offer targets.
    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    /// The current file and target format.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    // ---- selection ----

    /// Select a new source file.
    ///
    /// Supersedes any submission or outcome and clears the chosen target
    /// format. The size ceiling is enforced here so an oversize file is
    /// rejected before it can ever be submitted; in that case no file
    /// remains selected. Returns the file's category.
    pub fn select_file(&mut self, file: SourceFile) -> Result<Category, ConversionError> {
        self.supersede();
        self.selection.target_format = None;
        self.selection.file = None;

        check_size(&file, &self.limits)?;

        let category = self.catalog.classify(file.name());
        tracing::debug!(file = file.name(), size = file.size(), %category, "File selected");
        self.selection.file = Some(file);
        Ok(category)
    }

    /// Drop the selected file and everything derived from it.
    pub fn clear_file(&mut self) {
        self.supersede();
        self.selection = Selection::default();
    }

    /// Choose the target format. The selected file is left untouched.
    pub fn select_format(&mut self, format: &str) {
        let format = format.trim().to_lowercase();
        self.selection.target_format = (!format.is_empty()).then_some(format);
    }

    /// Category of the selected file, if any.
    pub fn category(&self) -> Option<Category> {
        self.selection
            .file
            .as_ref()
            .map(|f| self.catalog.classify(f.name()))
    }

    /// Targets selectable for the current file (empty without a file or
    /// for unknown types).
    pub fn available_formats(&self) -> &[String] {
        match self.category() {
            Some(category) => self.catalog.output_formats(category),
            None => &[],
        }
    }

    // ---- submission ----

    /// Validate the selection and start converting it.
    ///
    /// Validation failures are returned directly and leave any running
    /// submission alone. Otherwise the previous submission (if any) is
    /// superseded and the returned stream yields `Pending` values followed
    /// by exactly one terminal outcome.
    pub fn submit(&mut self) -> Result<OutcomeStream, ConversionError> {
        let request = validate(&self.selection, &self.catalog, &self.limits)?;

        self.supersede();

        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let publisher = Publisher {
            state: self.state.clone(),
            events: events_tx,
            cancel: cancel.clone(),
        };
        publisher.publish(ConversionOutcome::Pending { percent: 0.0 });

        tracing::info!(
            filename = request.source.name(),
            target_format = %request.target_format,
            category = %request.category,
            "Submitting conversion",
        );

        let task = tokio::spawn(drive_submission(
            self.api.clone(),
            request,
            self.limits,
            publisher,
        ));
        self.active = Some(ActiveSubmission { cancel, task });

        Ok(UnboundedReceiverStream::new(events_rx))
    }

    /// Abandon the running submission, if any. The stored outcome is
    /// cleared.
    pub fn cancel(&mut self) {
        if self.active.is_some() {
            tracing::info!("Conversion cancelled");
        }
        self.supersede();
    }

    /// Whether a submission task is still running.
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }

    // ---- observation ----

    /// Latest outcome of the current submission.
    pub fn outcome(&self) -> Option<ConversionOutcome> {
        self.state.borrow().clone()
    }

    /// Progress as shown to the user (0 without an outcome).
    pub fn progress(&self) -> f32 {
        self.state
            .borrow()
            .as_ref()
            .map(ConversionOutcome::percent)
            .unwrap_or(0.0)
    }

    /// Watch the latest outcome. `None` means nothing has been submitted
    /// since the last selection change.
    pub fn subscribe(&self) -> watch::Receiver<Option<ConversionOutcome>> {
        self.state.subscribe()
    }

    /// Location of the converted artifact, present only after success.
    pub fn download_location(&self) -> Option<String> {
        self.state
            .borrow()
            .as_ref()
            .and_then(|o| o.download_location().map(str::to_string))
    }

    // ---- download ----

    /// Retrieve the converted artifact into `dest_dir`.
    ///
    /// Any failure replaces the stored outcome with `Failed`, which also
    /// clears the download location: retrying means converting again.
    pub async fn download(&mut self, dest_dir: &Path) -> Result<SavedArtifact, ConversionError> {
        let Some(location) = self.download_location() else {
            return Err(ConversionError::DownloadFailed(
                "there is no converted file to download".into(),
            ));
        };

        match run_strategies(&self.strategies, &location, dest_dir).await {
            Ok(saved) => Ok(saved),
            Err(e) => {
                tracing::warn!(location = %location, error = %e, "Download failed");
                self.state.send_replace(Some(ConversionOutcome::from(&e)));
                Err(e)
            }
        }
    }

    // ---- private helpers ----

    /// Cancel the running submission and clear the stored outcome.
    fn supersede(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
        self.state.send_replace(None);
    }
}

impl Drop for ConversionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

/// Publishes outcomes for one submission unless it has been cancelled.
struct Publisher {
    state: Arc<watch::Sender<Option<ConversionOutcome>>>,
    events: mpsc::UnboundedSender<ConversionOutcome>,
    cancel: CancellationToken,
}

impl Publisher {
    fn publish(&self, outcome: ConversionOutcome) {
        // The cancellation check runs under the watch lock, so a
        // superseding reset can never be overwritten by a stale value.
        let accepted = self.state.send_if_modified(|current| {
            if self.cancel.is_cancelled() {
                return false;
            }
            *current = Some(outcome.clone());
            true
        });
        if accepted {
            let _ = self.events.send(outcome);
        }
    }
}

/// Run one submission: the HTTP call plus the synthetic progress timer.
async fn drive_submission(
    api: Arc<ConversionApi>,
    request: ConversionRequest,
    limits: UploadLimits,
    publisher: Publisher,
) {
    let profile = ProgressProfile::for_category(request.category);
    let mut tracker = ProgressTracker::new(profile);

    let (upload_tx, mut upload_rx) = mpsc::unbounded_channel();
    let convert = api.convert(&request, &limits, upload_tx);
    tokio::pin!(convert);

    let mut ticker =
        tokio::time::interval_at(tokio::time::Instant::now() + profile.interval, profile.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            biased;
            _ = publisher.cancel.cancelled() => {
                tracing::debug!(filename = request.source.name(), "Submission superseded");
                return;
            }
            result = &mut convert => break result,
            Some(upload) = upload_rx.recv() => {
                if tracker.record_upload(upload.loaded, upload.total) {
                    publisher.publish(ConversionOutcome::Pending { percent: tracker.percent() });
                }
            }
            _ = ticker.tick() => {
                if tracker.tick() {
                    tracing::trace!(percent = tracker.percent(), "Synthetic progress");
                    publisher.publish(ConversionOutcome::Pending { percent: tracker.percent() });
                }
            }
        }
    };

    match result {
        Ok(download_location) => {
            tracker.complete();
            publisher.publish(ConversionOutcome::Pending { percent: tracker.percent() });
            tracing::info!(
                filename = request.source.name(),
                download_location = %download_location,
                "Conversion succeeded",
            );
            publisher.publish(ConversionOutcome::Succeeded { download_location });
        }
        Err(e) => {
            tracker.reset();
            tracing::warn!(
                filename = request.source.name(),
                kind = ?e.kind(),
                error = %e,
                "Conversion failed",
            );
            publisher.publish(ConversionOutcome::from(&e));
        }
    }
}
