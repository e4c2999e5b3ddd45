use crate::delivery::DeliveryContext;
use crate::error::SubmitError;
use crate::job::{Clock, Job, JobHandle, JobOutcome, JobParameters, SystemClock};
use crate::state::JobState;
use crate::transport::Transport;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub type OutcomeListener = Box<dyn FnMut(JobOutcome, Duration) + Send + 'static>;

/// Listener slot plus outcomes that arrived before any listener was registered.
#[derive(Default)]
struct Outbox {
    listener: Mutex<Option<OutcomeListener>>,
    pending: Mutex<VecDeque<(JobOutcome, Duration)>>,
}

impl Outbox {
    /// Hand queued outcomes to the listener. Runs on the delivery context.
    fn flush(&self) {
        // Take the listener out so it may call back into the runner
        let taken = self.listener.lock().take();
        let mut callback = match taken {
            Some(callback) => callback,
            None => {
                let queued = self.pending.lock().len();
                if queued > 0 {
                    log::debug!("{} outcome(s) waiting for a listener", queued);
                }
                return;
            }
        };

        loop {
            let next = self.pending.lock().pop_front();
            match next {
                Some((outcome, elapsed)) => callback(outcome, elapsed),
                None => break,
            }
        }

        let mut slot = self.listener.lock();
        if slot.is_none() {
            *slot = Some(callback);
        }
    }
}

/// Runs at most one transcription job at a time on a background worker thread.
///
/// Every accepted `submit` produces exactly one call to the registered listener, made on
/// the delivery context. The live job handle is released on the delivery context right
/// before that call, so a new submit is only accepted once the previous outcome has
/// been handed over. Outcomes produced before a listener is registered are held until
/// one is.
pub struct JobRunner {
    request_tx: Sender<Job>,
    active: Arc<Mutex<Option<JobHandle>>>,
    outbox: Arc<Outbox>,
    delivery: DeliveryContext,
    clock: Arc<dyn Clock>,
    endpoint: String,
    next_id: AtomicU64,
}

impl JobRunner {
    pub fn new(transport: Arc<dyn Transport>, endpoint: &str, delivery: DeliveryContext) -> Self {
        Self::with_clock(transport, endpoint, delivery, Arc::new(SystemClock))
    }

    pub fn with_clock(
        transport: Arc<dyn Transport>,
        endpoint: &str,
        delivery: DeliveryContext,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Capacity 1: submit only sends while no job is live, so the slot is never contended
        let (request_tx, request_rx) = bounded::<Job>(1);
        let active: Arc<Mutex<Option<JobHandle>>> = Arc::new(Mutex::new(None));
        let outbox = Arc::new(Outbox::default());

        let worker_active = active.clone();
        let worker_outbox = outbox.clone();
        let worker_delivery = delivery.clone();
        thread::spawn(move || {
            log::info!("Transcription worker started");

            // Channel closes when the runner is dropped
            while let Ok(job) = request_rx.recv() {
                Self::process_job(
                    job,
                    transport.as_ref(),
                    &worker_delivery,
                    &worker_active,
                    &worker_outbox,
                );
            }

            log::info!("Transcription worker shutting down");
        });

        Self {
            request_tx,
            active,
            outbox,
            delivery,
            clock,
            endpoint: endpoint.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register the outcome listener, replacing any previous one. Outcomes already
    /// waiting are handed to it on the next pump of the delivery context.
    pub fn on_outcome<F>(&self, listener: F)
    where
        F: FnMut(JobOutcome, Duration) + Send + 'static,
    {
        *self.outbox.listener.lock() = Some(Box::new(listener));

        // Later outcomes flush themselves on delivery; only a backlog needs a nudge
        if self.outbox.pending.lock().is_empty() {
            return;
        }
        let outbox = self.outbox.clone();
        if !self.delivery.post(move || outbox.flush()) {
            log::warn!("Delivery context closed, queued outcomes will never be delivered");
        }
    }

    /// Start a job in the background. Returns immediately.
    pub fn submit(&self, params: JobParameters) -> Result<(), SubmitError> {
        params.validate()?;

        let mut active = self.active.lock();
        if active.is_some() {
            log::warn!("Submit rejected, a job is already running");
            return Err(SubmitError::AlreadyRunning);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = Job::new(id, &self.endpoint, params, self.clock.clone());
        let handle = job.handle();

        match self.request_tx.try_send(job) {
            Ok(()) => {
                log::info!("Job {} submitted", id);
                *active = Some(handle);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("Worker still holds a queued job, rejecting job {}", id);
                Err(SubmitError::AlreadyRunning)
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("Transcription worker disconnected");
                Err(SubmitError::WorkerUnavailable)
            }
        }
    }

    /// Ask the live job to cancel. Returns false when nothing is running.
    ///
    /// A job that already finished but whose outcome has not been delivered yet still
    /// counts as live; its result is discarded at delivery.
    pub fn cancel(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => {
                log::debug!("Cancel ignored, no job running");
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn active_state(&self) -> Option<JobState> {
        self.active.lock().as_ref().map(|handle| handle.state())
    }

    fn process_job(
        job: Job,
        transport: &dyn Transport,
        delivery: &DeliveryContext,
        active: &Arc<Mutex<Option<JobHandle>>>,
        outbox: &Arc<Outbox>,
    ) {
        let id = job.id();
        let (outcome, elapsed) = job.run(transport);

        let delivery_active = active.clone();
        let delivery_outbox = outbox.clone();
        let posted = delivery.post(move || {
            Self::deliver(id, outcome, elapsed, &delivery_active, &delivery_outbox);
        });

        if !posted {
            log::warn!("Delivery context closed, dropping outcome of job {}", id);
            active.lock().take();
        }
    }

    /// Runs on the delivery context.
    fn deliver(
        id: u64,
        mut outcome: JobOutcome,
        mut elapsed: Duration,
        active: &Mutex<Option<JobHandle>>,
        outbox: &Outbox,
    ) {
        {
            let mut slot = active.lock();
            match slot.take() {
                Some(handle) if handle.id() == id => {
                    if handle.is_cancelled() && !outcome.is_cancelled() {
                        log::info!("Job {} cancelled before delivery, discarding its result", id);
                        outcome = JobOutcome::Cancelled;
                        elapsed = Duration::ZERO;
                    }
                }
                Some(handle) => {
                    log::warn!("Delivering job {} but job {} is active", id, handle.id());
                    *slot = Some(handle);
                }
                None => log::warn!("Delivering job {} with no active handle", id),
            }
        }

        outbox.pending.lock().push_back((outcome, elapsed));
        outbox.flush();
    }
}
