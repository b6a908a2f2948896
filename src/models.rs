use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The logical category of a download job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// The 604-page QCF V2 font set.
    Qcf,
    /// Per-verse audio recitations for one surah.
    Recitation,
    /// A single auxiliary file (tafsir, translation or named asset).
    ContentFile,
}

/// Sub-category of a content-file job, stored in the first meta slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Tafsir,
    Translation,
    Asset,
}

impl ContentKind {
    pub fn code(self) -> u32 {
        match self {
            ContentKind::Tafsir => 0,
            ContentKind::Translation => 1,
            ContentKind::Asset => 2,
        }
    }
}

/// Fixed three-slot metadata identifying what a task's file represents.
///
/// Slot semantics depend on the owning job kind:
/// Recitation `[reciter, surah, verse]`, Qcf `[0, 0, page]`,
/// ContentFile `[content_kind, index, 0]`.
pub type TaskMeta = [u32; 3];

/// One remote-to-local file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
    pub meta: TaskMeta,
}

/// Unit label for a reported transfer speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedUnit {
    Bytes,
    Kilobytes,
    Megabytes,
}

impl fmt::Display for SpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SpeedUnit::Bytes => "bytes",
            SpeedUnit::Kilobytes => "KB",
            SpeedUnit::Megabytes => "MB",
        };
        f.write_str(label)
    }
}

/// A transfer speed sample derived from a progress tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Speed {
    pub value: u64,
    pub unit: SpeedUnit,
}

impl Speed {
    /// Derives a speed sample from bytes received since the task was
    /// dispatched. Elapsed time is clamped to a minimum of one second so
    /// sub-second ticks never divide by zero; the unit ladder is
    /// bytes -> KB -> MB and stops at MB.
    pub fn compute(bytes_received: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs().max(1);
        let mut value = bytes_received / secs;
        let mut unit = SpeedUnit::Bytes;
        if value >= 1024 {
            value /= 1024;
            unit = SpeedUnit::Kilobytes;
        }
        if value >= 1024 {
            value /= 1024;
            unit = SpeedUnit::Megabytes;
        }
        Speed { value, unit }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/s", self.value, self.unit)
    }
}

/// Fire-and-forget notifications published by the job manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// A job moved from the queue into the active slot.
    JobStarted { kind: JobKind, name: String },
    /// A task of the active job finished (saved or already on disk).
    Progress { completed: usize, total: usize },
    /// Transfer speed sample for the in-flight task.
    Speed(Speed),
    /// The active job drained with every task saved.
    JobCompleted { kind: JobKind, meta: TaskMeta },
    /// A task (or job activation) failed; the queue keeps advancing.
    JobFailed { kind: JobKind, meta: TaskMeta },
    /// The queue was stopped; active transfer aborted, queue cleared.
    Aborted,
}
