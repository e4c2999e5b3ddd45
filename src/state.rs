use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobState {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
}

impl From<u8> for JobState {
    fn from(v: u8) -> Self {
        match v {
            0 => JobState::Pending,
            1 => JobState::Running,
            2 => JobState::Completed,
            3 => JobState::Cancelled,
            _ => JobState::Pending,
        }
    }
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled)
    }
}

/// Shared state cell for one job. The worker drives the transitions,
/// the runner and front end only read it.
#[derive(Clone)]
pub struct JobStateCell {
    state: Arc<AtomicU8>,
}

impl JobStateCell {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(JobState::Pending as u8)),
        }
    }

    pub fn get(&self) -> JobState {
        JobState::from(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: JobState, to: JobState) -> bool {
        let moved = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if moved {
            log::debug!("Job state {:?} -> {:?}", from, to);
        }
        moved
    }

    /// Pending -> Running. Fails if the job was already started.
    pub fn transition_to_running(&self) -> bool {
        self.transition(JobState::Pending, JobState::Running)
    }

    pub fn transition_to_completed(&self) -> bool {
        self.transition(JobState::Running, JobState::Completed)
    }

    /// Running -> Cancelled, or Pending -> Cancelled for a job that never got going.
    pub fn transition_to_cancelled(&self) -> bool {
        self.transition(JobState::Running, JobState::Cancelled)
            || self.transition(JobState::Pending, JobState::Cancelled)
    }
}

impl Default for JobStateCell {
    fn default() -> Self {
        Self::new()
    }
}
