use crate::core::error::WorkflowError;
use crate::core::events::WorkflowEvent;
use crate::core::model::*;
use crate::core::progress::ProgressReporter;
use crate::core::saver::BinarySaver;
use crate::plugins::registry::{CompressionDriver, DriverContext};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Owns the input, loading flag, progress and error of one compression form.
///
/// Only one request can be in flight: `submit` takes `&mut self`. Selecting a
/// file or changing the target size clears a previously recorded error.
pub struct CompressionWorkflow {
    driver: Arc<dyn CompressionDriver>,
    saver: Arc<dyn BinarySaver>,
    driver_ctx: DriverContext,
    event_tx: broadcast::Sender<WorkflowEvent>,
    file: Option<SourceFile>,
    target_size: String,
    loading: Arc<AtomicBool>,
    progress: Arc<AtomicU8>,
    error: Option<WorkflowError>,
}

/// Marks a request as in flight. Dropping it resets loading and progress and
/// publishes `Idle`, whichever way `submit` exits (including cancellation).
struct InFlight {
    loading: Arc<AtomicBool>,
    progress: Arc<AtomicU8>,
    event_tx: broadcast::Sender<WorkflowEvent>,
}

impl InFlight {
    fn begin(loading: Arc<AtomicBool>, progress: Arc<AtomicU8>, event_tx: broadcast::Sender<WorkflowEvent>) -> Self {
        loading.store(true, Ordering::SeqCst);
        progress.store(0, Ordering::SeqCst);
        let _ = event_tx.send(WorkflowEvent::StateChanged { state: WorkflowState::Submitting });
        Self { loading, progress, event_tx }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.loading.store(false, Ordering::SeqCst);
        self.progress.store(0, Ordering::SeqCst);
        let _ = self.event_tx.send(WorkflowEvent::StateChanged { state: WorkflowState::Idle });
    }
}

impl CompressionWorkflow {
    pub fn new(driver: Arc<dyn CompressionDriver>, saver: Arc<dyn BinarySaver>, driver_ctx: DriverContext) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            driver,
            saver,
            driver_ctx,
            event_tx,
            file: None,
            target_size: DEFAULT_TARGET_SIZE_KB.to_string(),
            loading: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(AtomicU8::new(0)),
            error: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.event_tx.subscribe()
    }

    pub fn select_file(&mut self, file: SourceFile) {
        tracing::debug!(name = %file.name, media_type = %file.media_type, bytes = file.len(), "file selected");
        self.file = Some(file);
        self.error = None;
    }

    pub fn clear_selection(&mut self) {
        self.file = None;
        self.error = None;
    }

    /// Stored verbatim; the service decides what it accepts.
    pub fn set_target_size(&mut self, value: impl Into<String>) {
        self.target_size = value.into();
        self.error = None;
    }

    pub fn file(&self) -> Option<&SourceFile> {
        self.file.as_ref()
    }

    pub fn target_size(&self) -> &str {
        &self.target_size
    }

    pub fn state(&self) -> WorkflowState {
        if self.is_loading() { WorkflowState::Submitting } else { WorkflowState::Idle }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    pub fn error(&self) -> Option<&WorkflowError> {
        self.error.as_ref()
    }

    pub fn can_submit(&self) -> bool {
        self.file.is_some() && !self.is_loading()
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    pub async fn submit(&mut self) -> Result<CompressionOutcome, WorkflowError> {
        let Some(source) = self.file.clone().filter(|f| !f.is_empty()) else {
            let err = WorkflowError::select_image();
            self.record_error(&err);
            return Err(err);
        };

        let request = CompressionRequest {
            id: Uuid::new_v4(),
            source,
            target_size_kb: self.target_size.clone(),
        };

        self.error = None;
        let _in_flight = InFlight::begin(self.loading.clone(), self.progress.clone(), self.event_tx.clone());
        tracing::info!(
            request_id = %request.id,
            driver = self.driver.name(),
            saver = self.saver.name(),
            file = %request.source.name,
            target_size_kb = %request.target_size_kb,
            "compression submitted"
        );

        match self.run(&request).await {
            Ok(outcome) => {
                tracing::info!(request_id = %request.id, path = %outcome.saved_to.display(), bytes = outcome.bytes, "compression succeeded");
                let _ = self.event_tx.send(WorkflowEvent::Saved {
                    request_id: request.id,
                    path: outcome.saved_to.clone(),
                    bytes: outcome.bytes,
                });
                let _ = self.event_tx.send(WorkflowEvent::StateChanged { state: WorkflowState::Succeeded });
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(request_id = %request.id, kind = ?err.kind, error = %err, "compression failed");
                self.record_error(&err);
                let _ = self.event_tx.send(WorkflowEvent::StateChanged { state: WorkflowState::Failed });
                Err(err)
            }
        }
    }

    async fn run(&self, request: &CompressionRequest) -> Result<CompressionOutcome, WorkflowError> {
        let reporter = ProgressReporter::new(request.id, self.progress.clone(), self.event_tx.clone());
        let body = self.driver.compress(request, &self.driver_ctx, reporter).await?;

        let result = CompressionResult::from_response(body);
        let saved_to = self
            .saver
            .save_binary_as(&result.data, result.media_type, RESULT_FILE_NAME)
            .await
            .map_err(|e| WorkflowError::save(format!("{:#}", e)))?;

        Ok(CompressionOutcome {
            request_id: request.id,
            saved_to,
            bytes: result.data.len() as u64,
        })
    }

    fn record_error(&mut self, err: &WorkflowError) {
        self.error = Some(err.clone());
        let _ = self.event_tx.send(WorkflowEvent::Error { message: err.message.clone() });
    }
}
