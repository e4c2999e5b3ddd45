use crate::error::SubmitError;
use crate::job::{JobOutcome, JobParameters};
use crate::runner::JobRunner;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const STATUS_READY: &str = "Ready";
pub const STATUS_IN_PROGRESS: &str = "Request in progress...";
pub const STATUS_CANCELLING: &str = "Cancelling...";
pub const NO_TEXT_RETURNED: &str = "No transcription text returned.";
pub const CANCELLED_NOTICE: &str = "Request cancelled by user.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub is_running: bool,
    pub status_text: String,
    pub result_text: String,
    pub cancel_requested: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            is_running: false,
            status_text: STATUS_READY.to_string(),
            result_text: String::new(),
            cancel_requested: false,
        }
    }
}

impl DisplayState {
    pub fn can_submit(&self) -> bool {
        !self.is_running
    }

    pub fn can_cancel(&self) -> bool {
        self.is_running && !self.cancel_requested
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Fold a delivered outcome into the display state.
pub fn apply_outcome(display: &mut DisplayState, outcome: JobOutcome, elapsed: Duration) {
    display.is_running = false;
    display.cancel_requested = false;

    let (status_code, body) = match outcome {
        JobOutcome::Cancelled => {
            display.status_text = STATUS_READY.to_string();
            if display.result_text.is_empty() {
                display.result_text = CANCELLED_NOTICE.to_string();
            } else {
                display.result_text.push('\n');
                display.result_text.push_str(CANCELLED_NOTICE);
            }
            return;
        }
        JobOutcome::TransportFailure(e) => {
            display.status_text = ready_with_elapsed(elapsed);
            display.result_text = format!("Request error: {}", e);
            return;
        }
        JobOutcome::Success { status_code, body } => (status_code, body),
    };

    display.status_text = ready_with_elapsed(elapsed);
    display.result_text = if status_code == 200 {
        match serde_json::from_slice::<TranscriptionResponse>(&body) {
            Ok(TranscriptionResponse { text: Some(text) }) if !text.is_empty() => text,
            Ok(_) => NO_TEXT_RETURNED.to_string(),
            Err(e) => {
                log::warn!("Unparsable transcription response: {}", e);
                format!(
                    "Failed to parse response: {}\nResponse body: {}",
                    e,
                    String::from_utf8_lossy(&body)
                )
            }
        }
    } else {
        format!(
            "Request failed with status code {}\nResponse body: {}",
            status_code,
            String::from_utf8_lossy(&body)
        )
    };
}

fn ready_with_elapsed(elapsed: Duration) -> String {
    format!("{} | elapsed: {:.2}s", STATUS_READY, elapsed.as_secs_f64())
}

/// Show why a submit was refused. A busy runner leaves the display as it is.
pub fn apply_submit_error(display: &mut DisplayState, err: &SubmitError) {
    match err {
        SubmitError::AlreadyRunning => {}
        SubmitError::Invalid(_) | SubmitError::WorkerUnavailable => {
            display.status_text = err.to_string();
        }
    }
}

/// Turns user actions into runner calls and runner outcomes into [`DisplayState`].
///
/// Outcomes arrive on the runner's delivery context. `submit` may be called from any
/// thread: the display lock is held while the runner accepts the job, so the outcome
/// cannot be applied before the running state it ends.
pub struct Controller {
    runner: Arc<JobRunner>,
    display: Arc<Mutex<DisplayState>>,
}

impl Controller {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        let display = Arc::new(Mutex::new(DisplayState::default()));

        let listener_display = display.clone();
        runner.on_outcome(move |outcome, elapsed| {
            apply_outcome(&mut listener_display.lock(), outcome, elapsed);
        });

        Self { runner, display }
    }

    pub fn submit(&self, params: JobParameters) -> Result<(), SubmitError> {
        let mut display = self.display.lock();

        let accepted = params
            .validate()
            .map_err(SubmitError::from)
            .and_then(|()| self.runner.submit(params));

        if let Err(e) = accepted {
            log::warn!("Not submitting: {}", e);
            apply_submit_error(&mut display, &e);
            return Err(e);
        }

        display.is_running = true;
        display.cancel_requested = false;
        display.status_text = STATUS_IN_PROGRESS.to_string();
        Ok(())
    }

    pub fn cancel(&self) {
        if !self.runner.cancel() {
            return;
        }
        let mut display = self.display.lock();
        display.cancel_requested = true;
        display.status_text = STATUS_CANCELLING.to_string();
    }

    pub fn display(&self) -> DisplayState {
        self.display.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.display.lock().is_running
    }

    /// Replace the result text with a user edit.
    pub fn set_result_text(&self, text: impl Into<String>) {
        self.display.lock().result_text = text.into();
    }

    pub fn clear_results(&self) {
        self.display.lock().result_text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::io;
    use std::path::PathBuf;

    fn running() -> DisplayState {
        DisplayState {
            is_running: true,
            status_text: STATUS_IN_PROGRESS.to_string(),
            result_text: String::new(),
            cancel_requested: false,
        }
    }

    fn success(status_code: u16, body: &str) -> JobOutcome {
        JobOutcome::Success {
            status_code,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_success_sets_result_text() {
        let mut display = running();
        apply_outcome(&mut display, success(200, r#"{"text":"hello"}"#), Duration::from_millis(1234));

        assert_eq!(display.result_text, "hello");
        assert_eq!(display.status_text, "Ready | elapsed: 1.23s");
        assert!(!display.is_running);
    }

    #[test]
    fn test_missing_text_field_is_empty_result() {
        for body in [r#"{}"#, r#"{"text":""}"#, r#"{"text":null}"#] {
            let mut display = running();
            apply_outcome(&mut display, success(200, body), Duration::ZERO);
            assert_eq!(display.result_text, NO_TEXT_RETURNED, "body {}", body);
        }
    }

    #[test]
    fn test_unparsable_body_is_rendered() {
        let mut display = running();
        apply_outcome(&mut display, success(200, "<html>oops</html>"), Duration::ZERO);

        assert!(display.result_text.starts_with("Failed to parse response"));
        assert!(display.result_text.contains("<html>oops</html>"));
        assert!(!display.is_running);
    }

    #[test]
    fn test_error_status_renders_code_and_body() {
        let mut display = running();
        apply_outcome(&mut display, success(429, "rate limited"), Duration::from_secs(1));

        assert!(display.result_text.contains("429"));
        assert!(display.result_text.contains("rate limited"));
        assert!(!display.is_running);
    }

    #[test]
    fn test_transport_failure_renders_error() {
        let mut display = running();
        let outcome = JobOutcome::TransportFailure(TransportError::FileOpen {
            path: PathBuf::from("/tmp/gone.wav"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        });
        apply_outcome(&mut display, outcome, Duration::from_millis(10));

        assert!(display.result_text.starts_with("Request error:"));
        assert!(display.result_text.contains("/tmp/gone.wav"));
        assert!(!display.is_running);
    }

    #[test]
    fn test_cancelled_appends_notice_and_keeps_text() {
        let mut display = running();
        display.result_text = "previous transcript".to_string();
        display.cancel_requested = true;

        apply_outcome(&mut display, JobOutcome::Cancelled, Duration::ZERO);

        assert_eq!(display.result_text, format!("previous transcript\n{}", CANCELLED_NOTICE));
        assert_eq!(display.status_text, STATUS_READY);
        assert!(!display.is_running);
        assert!(!display.cancel_requested);
    }

    #[test]
    fn test_cancelled_on_empty_result() {
        let mut display = running();
        apply_outcome(&mut display, JobOutcome::Cancelled, Duration::ZERO);
        assert_eq!(display.result_text, CANCELLED_NOTICE);
    }

    #[test]
    fn test_button_enablement() {
        let mut display = DisplayState::default();
        assert!(display.can_submit());
        assert!(!display.can_cancel());

        display.is_running = true;
        assert!(!display.can_submit());
        assert!(display.can_cancel());

        display.cancel_requested = true;
        assert!(!display.can_cancel());
    }

    #[test]
    fn test_unavailable_worker_is_shown() {
        let mut display = DisplayState::default();
        apply_submit_error(&mut display, &SubmitError::WorkerUnavailable);

        assert_eq!(display.status_text, SubmitError::WorkerUnavailable.to_string());
        assert!(!display.is_running);
    }

    #[test]
    fn test_busy_runner_leaves_display_alone() {
        let mut display = running();
        apply_submit_error(&mut display, &SubmitError::AlreadyRunning);
        assert_eq!(display, running());
    }
}
