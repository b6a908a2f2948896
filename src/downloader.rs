use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::models::DownloadTask;

/// Errors a single transfer can end with.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("download cancelled")]
    Cancelled,
}

/// Byte progress of an in-flight transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTick {
    pub bytes_received: u64,
    pub bytes_total: Option<u64>,
}

pub type TickSender = mpsc::UnboundedSender<ProgressTick>;

/// Network seam for a single GET. The real implementation streams the
/// response; tests substitute a mock.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, reporting byte progress through `ticks`, and
    /// returns the full response body.
    async fn fetch(&self, url: &str, ticks: &TickSender) -> Result<Vec<u8>, DownloadError>;
}

/// Fetcher backed by reqwest. TLS certificate errors are accepted by
/// policy; the application trusts its fixed content hosts.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap();
        Self { client }
    }

    /// The underlying client, shared with the version check.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, ticks: &TickSender) -> Result<Vec<u8>, DownloadError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(DownloadError::Status(resp.status()));
        }

        let total = resp.content_length();
        let mut body = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            body.extend_from_slice(&bytes);
            let _ = ticks.send(ProgressTick {
                bytes_received: body.len() as u64,
                bytes_total: total,
            });
        }

        Ok(body)
    }
}

/// States a task transfer moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Fetching,
    Saved,
    Cancelled,
    Failed,
}

/// Executes exactly one [`DownloadTask`]: issues the fetch, forwards
/// byte progress, writes the body to the destination and reports the
/// terminal state.
pub struct TaskDownloader {
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<TaskState>,
}

impl TaskDownloader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            state: Mutex::new(TaskState::Idle),
        }
    }

    pub async fn state(&self) -> TaskState {
        *self.state.lock().await
    }

    /// Runs the transfer to a terminal state. Cancellation aborts the
    /// in-flight request by dropping it rather than awaiting completion.
    /// The destination's parent directory must already exist.
    pub async fn run(
        &self,
        task: &DownloadTask,
        cancel: &CancellationToken,
        ticks: TickSender,
    ) -> Result<(), DownloadError> {
        self.set_state(TaskState::Fetching).await;

        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                self.set_state(TaskState::Cancelled).await;
                return Err(DownloadError::Cancelled);
            }
            res = self.fetcher.fetch(&task.url, &ticks) => res,
        };

        let body = match fetched {
            Ok(body) => body,
            Err(e) => {
                self.set_state(TaskState::Failed).await;
                return Err(e);
            }
        };

        // Overwrite whatever is at the destination; the existence
        // short-circuit already decided this task must run.
        if let Err(e) = tokio::fs::write(&task.destination, &body).await {
            warn!("couldn't write {}: {e}", task.destination.display());
            self.set_state(TaskState::Failed).await;
            return Err(e.into());
        }

        self.set_state(TaskState::Saved).await;
        Ok(())
    }

    async fn set_state(&self, state: TaskState) {
        *self.state.lock().await = state;
    }
}
