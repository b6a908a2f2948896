pub mod dirs;
pub mod downloader;
pub mod jobs;
pub mod manager;
pub mod models;
pub mod registry;
pub mod version;

/// Convenient re-exports of the commonly used types.
pub mod prelude {
    pub use crate::dirs::DownloadDirs;
    pub use crate::downloader::{DownloadError, Fetcher, HttpFetcher, TaskDownloader, TaskState};
    pub use crate::jobs::{Job, JobError};
    pub use crate::manager::{ActiveJob, JobManager};
    pub use crate::models::{
        ContentKind, DownloadEvent, DownloadTask, JobKind, Speed, SpeedUnit, TaskMeta,
    };
    pub use crate::registry::{ContentEntry, Reciter, Registry};
}
