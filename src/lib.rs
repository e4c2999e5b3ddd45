pub mod config;
pub mod console;
pub mod controller;
pub mod delivery;
pub mod error;
pub mod events;
pub mod job;
pub mod output;
pub mod runner;
pub mod state;
pub mod transport;

pub use controller::{Controller, DisplayState};
pub use delivery::{DeliveryContext, DeliveryLoop};
pub use error::{SubmitError, TransportError, ValidationError};
pub use job::{JobOutcome, JobParameters};
pub use runner::JobRunner;
pub use transport::{HttpTransport, Transport, TransportResponse, UploadRequest};
