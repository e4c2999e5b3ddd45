use crate::error::{TransportError, ValidationError};
use crate::state::{JobState, JobStateCell};
use crate::transport::{Transport, UploadRequest};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inputs for one transcription request. Fields are trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParameters {
    pub credential: String,
    pub model: String,
    pub file_path: String,
}

impl JobParameters {
    pub fn new(
        credential: impl Into<String>,
        model: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            credential: credential.into().trim().to_string(),
            model: model.into().trim().to_string(),
            file_path: file_path.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.credential.trim().is_empty() {
            return Err(ValidationError::MissingCredential);
        }
        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingModel);
        }
        if self.file_path.trim().is_empty() {
            return Err(ValidationError::MissingFilePath);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    /// The endpoint answered; any status code lands here
    Success { status_code: u16, body: Vec<u8> },
    TransportFailure(TransportError),
    Cancelled,
}

impl JobOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Monotonic cancellation flag: once set it stays set.
#[derive(Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The runner's view of a live job: identity, cancellation and state.
#[derive(Clone)]
pub struct JobHandle {
    id: u64,
    cancel: CancelFlag,
    state: JobStateCell,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request cancellation. Does not interrupt a request already on the wire.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            log::info!("Cancellation requested for job {}", self.id);
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> JobState {
        self.state.get()
    }
}

pub struct Job {
    id: u64,
    endpoint: String,
    params: JobParameters,
    cancel: CancelFlag,
    state: JobStateCell,
    clock: Arc<dyn Clock>,
}

impl Job {
    pub fn new(id: u64, endpoint: &str, params: JobParameters, clock: Arc<dyn Clock>) -> Self {
        Self {
            id,
            endpoint: endpoint.to_string(),
            params,
            cancel: CancelFlag::new(),
            state: JobStateCell::new(),
            clock,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            cancel: self.cancel.clone(),
            state: self.state.clone(),
        }
    }

    pub fn upload_request(&self) -> UploadRequest {
        UploadRequest::transcription(
            &self.endpoint,
            &self.params.credential,
            &self.params.model,
            &PathBuf::from(&self.params.file_path),
        )
    }

    /// Run the job to a terminal state on the calling thread.
    ///
    /// The cancellation flag is checked before the transport call and again right after
    /// it returns; a result that arrives after cancellation is discarded. Elapsed time is
    /// only meaningful for non-cancelled outcomes and is zero otherwise.
    pub fn run(self, transport: &dyn Transport) -> (JobOutcome, Duration) {
        if !self.state.transition_to_running() {
            log::warn!("Job {} was already started, not running it again", self.id);
            return (JobOutcome::Cancelled, Duration::ZERO);
        }
        let started = self.clock.now();

        if self.cancel.is_cancelled() {
            log::info!("Job {} cancelled before upload", self.id);
            self.state.transition_to_cancelled();
            return (JobOutcome::Cancelled, Duration::ZERO);
        }

        let request = self.upload_request();
        let result = panic::catch_unwind(AssertUnwindSafe(|| transport.send(&request)))
            .unwrap_or_else(|payload| Err(TransportError::Panicked(panic_message(payload))));
        let elapsed = self.clock.now().saturating_duration_since(started);

        if self.cancel.is_cancelled() {
            log::info!(
                "Job {} cancelled while in flight, discarding result after {:.2}s",
                self.id,
                elapsed.as_secs_f64()
            );
            self.state.transition_to_cancelled();
            return (JobOutcome::Cancelled, Duration::ZERO);
        }

        self.state.transition_to_completed();
        let outcome = match result {
            Ok(response) => {
                log::info!(
                    "Job {} finished with status {} in {:.2}s",
                    self.id,
                    response.status_code,
                    elapsed.as_secs_f64()
                );
                JobOutcome::Success {
                    status_code: response.status_code,
                    body: response.body,
                }
            }
            Err(e) => {
                log::error!("Job {} failed: {}", self.id, e);
                JobOutcome::TransportFailure(e)
            }
        };
        (outcome, elapsed)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
