use crate::error::TransportError;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.siliconflow.cn/v1/audio/transcriptions";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Everything needed for one multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub form_fields: Vec<(String, String)>,
    pub file_field: String,
    pub file_path: PathBuf,
}

impl UploadRequest {
    /// Build the transcription upload: bearer auth, `model` text field, `file` part.
    pub fn transcription(url: &str, credential: &str, model: &str, file_path: &Path) -> Self {
        Self {
            url: url.to_string(),
            headers: vec![("Authorization".to_string(), format!("Bearer {}", credential))],
            form_fields: vec![("model".to_string(), model.to_string())],
            file_field: "file".to_string(),
            file_path: file_path.to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
}

/// One blocking upload. Implementations must report every failure as a `TransportError`.
pub trait Transport: Send + Sync {
    fn send(&self, request: &UploadRequest) -> Result<TransportResponse, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        log::debug!("HTTP transport ready, timeout {:?}", timeout);
        Ok(Self { client, timeout })
    }

    fn map_request_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Request(err)
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &UploadRequest) -> Result<TransportResponse, TransportError> {
        let open_error = |source| TransportError::FileOpen {
            path: request.file_path.clone(),
            source,
        };
        let file = File::open(&request.file_path).map_err(open_error)?;
        let length = file.metadata().map_err(open_error)?.len();

        let file_name = request
            .file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let mut form = Form::new();
        for (name, value) in &request.form_fields {
            form = form.text(name.clone(), value.clone());
        }
        let part = Part::reader_with_length(file, length).file_name(file_name);
        form = form.part(request.file_field.clone(), part);

        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        log::info!(
            "Uploading {:?} ({} bytes) to {}",
            request.file_path,
            length,
            request.url
        );

        let response = builder
            .multipart(form)
            .send()
            .map_err(|e| self.map_request_error(e))?;
        let status_code = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| self.map_request_error(e))?
            .to_vec();

        log::debug!("Response status {}, {} body bytes", status_code, body.len());
        Ok(TransportResponse { status_code, body })
    }
}
