use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::downloader::{DownloadError, Fetcher, TaskDownloader};
use crate::jobs::Job;
use crate::models::{DownloadEvent, JobKind, Speed};

/// Read-only snapshot of the currently running job, for progress display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJob {
    pub kind: JobKind,
    pub name: String,
    pub completed: usize,
    pub total: usize,
}

enum JobOutcome {
    Drained,
    Aborted,
}

/// Serial download scheduler: a FIFO queue of [`Job`]s, at most one of
/// which is active at any instant, drained one task at a time through a
/// [`TaskDownloader`]. Progress, speed and terminal notifications are
/// published on the event channel handed out by [`JobManager::new`].
///
/// A task whose destination file already exists is counted as completed
/// without a network request. That check is an existence heuristic, not
/// a content check: re-enqueueing an interrupted job skips everything
/// already on disk, but a corrupt file has to be deleted to be fetched
/// again.
pub struct JobManager {
    fetcher: Arc<dyn Fetcher>,
    queue: Mutex<VecDeque<Job>>,
    active: Mutex<Option<ActiveJob>>,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
    event_tx: mpsc::Sender<DownloadEvent>,
}

impl JobManager {
    /// Creates the manager and the receiving end of its event channel.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> (Arc<Self>, mpsc::Receiver<DownloadEvent>) {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let manager = Arc::new(Self {
            fetcher,
            queue: Mutex::new(VecDeque::new()),
            active: Mutex::new(None),
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            event_tx,
        });
        (manager, event_rx)
    }

    /// Appends a job to the tail of the queue.
    pub async fn add_job(&self, job: Job) {
        self.queue.lock().await.push_back(job);
    }

    /// Activates the head job and begins draining the queue. No-op if
    /// already running; silently does nothing if the queue is empty.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.queue.lock().await.is_empty() {
            self.running.store(false, Ordering::SeqCst);
            return;
        }

        let token = CancellationToken::new();
        *self.cancel.lock().await = token.clone();

        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.drive(token).await });
    }

    /// Aborts the in-flight transfer and discards the entire queue,
    /// both the active job's remaining tasks and every queued job. The
    /// drive loop emits exactly one [`DownloadEvent::Aborted`]. No-op
    /// when nothing is running.
    pub async fn stop(&self) {
        if self.running.load(Ordering::SeqCst) {
            self.cancel.lock().await.cancel();
        }
    }

    /// True iff a job is currently active.
    pub fn is_on(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the currently running job, if any.
    pub async fn active(&self) -> Option<ActiveJob> {
        self.active.lock().await.clone()
    }

    /// Number of jobs waiting behind the active one.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    async fn drive(self: Arc<Self>, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                self.abort_queue().await;
                return;
            }

            let job = self.queue.lock().await.pop_front();
            let Some(mut job) = job else { break };

            if let Err(e) = job.activate().await {
                warn!("couldn't prepare {}: {e}", job.name());
                self.emit(DownloadEvent::JobFailed {
                    kind: job.kind(),
                    meta: job.last_meta(),
                })
                .await;
                continue;
            }

            info!("job started: {}", job.name());
            self.emit(DownloadEvent::JobStarted {
                kind: job.kind(),
                name: job.name().to_string(),
            })
            .await;
            self.update_active(&job).await;

            let outcome = self.run_job(&mut job, &token).await;
            self.active.lock().await.take();

            match outcome {
                JobOutcome::Drained => {
                    // A job that saw task failures already reported each
                    // of them; only a fully saved job completes.
                    if job.completed() == job.total() {
                        info!("job completed: {}", job.name());
                        self.emit(DownloadEvent::JobCompleted {
                            kind: job.kind(),
                            meta: job.last_meta(),
                        })
                        .await;
                    }
                }
                JobOutcome::Aborted => {
                    self.abort_queue().await;
                    return;
                }
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Drains the active job serially: a task's terminal event is fully
    /// processed before the next task is dispatched.
    async fn run_job(&self, job: &mut Job, token: &CancellationToken) -> JobOutcome {
        while let Some(task) = job.next_task() {
            if token.is_cancelled() {
                return JobOutcome::Aborted;
            }

            // Existence short-circuit, in task order.
            if task.destination.exists() {
                job.mark_done(&task);
                self.progress(job).await;
                continue;
            }

            let downloader = TaskDownloader::new(Arc::clone(&self.fetcher));
            let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
            let started = Instant::now();

            let run = downloader.run(&task, token, tick_tx);
            tokio::pin!(run);
            let result = loop {
                tokio::select! {
                    res = &mut run => break res,
                    Some(tick) = tick_rx.recv() => {
                        let speed = Speed::compute(tick.bytes_received, started.elapsed());
                        self.emit(DownloadEvent::Speed(speed)).await;
                    }
                }
            };

            match result {
                Ok(()) => {
                    job.mark_done(&task);
                    self.progress(job).await;
                }
                Err(DownloadError::Cancelled) => return JobOutcome::Aborted,
                Err(e) => {
                    warn!("task {:?} of {} failed: {e}", task.meta, job.name());
                    job.mark_failed(&task);
                    self.emit(DownloadEvent::JobFailed {
                        kind: job.kind(),
                        meta: task.meta,
                    })
                    .await;
                }
            }
        }
        JobOutcome::Drained
    }

    async fn abort_queue(&self) {
        self.queue.lock().await.clear();
        self.active.lock().await.take();
        self.running.store(false, Ordering::SeqCst);
        info!("download queue aborted");
        self.emit(DownloadEvent::Aborted).await;
    }

    async fn progress(&self, job: &Job) {
        self.update_active(job).await;
        self.emit(DownloadEvent::Progress {
            completed: job.completed(),
            total: job.total(),
        })
        .await;
    }

    async fn update_active(&self, job: &Job) {
        *self.active.lock().await = Some(ActiveJob {
            kind: job.kind(),
            name: job.name().to_string(),
            completed: job.completed(),
            total: job.total(),
        });
    }

    async fn emit(&self, event: DownloadEvent) {
        let _ = self.event_tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirs::DownloadDirs;
    use crate::downloader::tests::MockFetcher;
    use crate::registry::Registry;
    use std::time::Duration;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    async fn next_event(rx: &mut mpsc::Receiver<DownloadEvent>) -> DownloadEvent {
        timeout(RECV_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Receives events until the predicate matches, returning everything
    /// seen on the way (speed samples included).
    async fn events_until(
        rx: &mut mpsc::Receiver<DownloadEvent>,
        mut done: impl FnMut(&DownloadEvent) -> bool,
    ) -> Vec<DownloadEvent> {
        let mut seen = Vec::new();
        loop {
            let event = next_event(rx).await;
            let stop = done(&event);
            seen.push(event);
            if stop {
                return seen;
            }
        }
    }

    fn progress_counts(events: &[DownloadEvent]) -> Vec<(usize, usize)> {
        events
            .iter()
            .filter_map(|e| match e {
                DownloadEvent::Progress { completed, total } => Some((*completed, *total)),
                _ => None,
            })
            .collect()
    }

    async fn wait_until_off(manager: &JobManager) {
        for _ in 0..100 {
            if !manager.is_on() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("manager never stopped");
    }

    #[tokio::test]
    async fn scenario_recitation_runs_to_completion() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = DownloadDirs::new(tmp.path());
        let registry = Registry::bundled();
        let fetcher = Arc::new(MockFetcher::ok());
        let (manager, mut rx) = JobManager::new(fetcher.clone());

        manager
            .add_job(Job::recitation(&registry, &dirs, 0, 1).unwrap())
            .await;
        manager.start().await;

        let events = events_until(&mut rx, |e| {
            matches!(e, DownloadEvent::JobCompleted { .. })
        })
        .await;

        assert_eq!(
            events[0],
            DownloadEvent::JobStarted {
                kind: JobKind::Recitation,
                name: "Abdul Basit Abdul Samad (Murattal) - Surah 1".into(),
            }
        );
        assert_eq!(
            progress_counts(&events),
            (1..=7).map(|c| (c, 7)).collect::<Vec<_>>()
        );
        assert_eq!(
            events.last().unwrap(),
            &DownloadEvent::JobCompleted {
                kind: JobKind::Recitation,
                meta: [0, 1, 7],
            }
        );
        assert_eq!(fetcher.call_count(), 7);

        wait_until_off(&manager).await;
        assert!(manager.active().await.is_none());
        for verse in 1..=7 {
            assert!(dirs
                .recitation_file("abdul_basit_murattal", 1, verse)
                .is_file());
        }
    }

    #[tokio::test]
    async fn scenario_existing_file_short_circuits_the_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = DownloadDirs::new(tmp.path());
        let registry = Registry::bundled();
        let fetcher = Arc::new(MockFetcher::ok());
        let (manager, mut rx) = JobManager::new(fetcher.clone());

        // Verse 3 is already on disk from an earlier, interrupted run.
        let existing = dirs.recitation_file("abdul_basit_murattal", 1, 3);
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"already here").unwrap();

        manager
            .add_job(Job::recitation(&registry, &dirs, 0, 1).unwrap())
            .await;
        manager.start().await;

        let events = events_until(&mut rx, |e| {
            matches!(e, DownloadEvent::JobCompleted { .. })
        })
        .await;

        assert_eq!(progress_counts(&events).len(), 7);
        assert_eq!(fetcher.call_count(), 6);
        assert!(!fetcher.calls().iter().any(|url| url.ends_with("001003.mp3")));
        // Short-circuit is existence only: the stale body is untouched.
        assert_eq!(std::fs::read(&existing).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn scenario_fully_present_job_completes_without_network() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = DownloadDirs::new(tmp.path());
        let registry = Registry::bundled();
        let fetcher = Arc::new(MockFetcher::ok());
        let (manager, mut rx) = JobManager::new(fetcher.clone());

        std::fs::create_dir_all(dirs.recitation_dir("abdul_basit_murattal")).unwrap();
        for verse in 1..=7 {
            std::fs::write(dirs.recitation_file("abdul_basit_murattal", 1, verse), b"x").unwrap();
        }

        manager
            .add_job(Job::recitation(&registry, &dirs, 0, 1).unwrap())
            .await;
        manager.start().await;

        let events = events_until(&mut rx, |e| {
            matches!(e, DownloadEvent::JobCompleted { .. })
        })
        .await;

        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(progress_counts(&events).len(), 7);
        assert_eq!(
            events.last().unwrap(),
            &DownloadEvent::JobCompleted {
                kind: JobKind::Recitation,
                meta: [0, 1, 7],
            }
        );
    }

    #[tokio::test]
    async fn scenario_cancel_clears_the_whole_queue() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = DownloadDirs::new(tmp.path());
        let registry = Registry::bundled();
        // Task 11 hangs until cancelled, so the cut point is exact.
        let fetcher = Arc::new(MockFetcher {
            stall_suffixes: vec!["QCF2011.ttf".into()],
            ..MockFetcher::ok()
        });
        let (manager, mut rx) = JobManager::new(fetcher.clone());

        manager.add_job(Job::qcf(&dirs)).await;
        manager
            .add_job(Job::recitation(&registry, &dirs, 0, 1).unwrap())
            .await;
        manager.start().await;

        let before = events_until(&mut rx, |e| {
            matches!(e, DownloadEvent::Progress { completed: 10, .. })
        })
        .await;
        assert_eq!(progress_counts(&before).len(), 10);

        manager.stop().await;
        let after = events_until(&mut rx, |e| matches!(e, DownloadEvent::Aborted)).await;

        // Exactly one aborted notification and nothing else after the
        // tenth completion; the queued recitation job never starts.
        assert!(progress_counts(&after).is_empty());
        assert!(!after
            .iter()
            .any(|e| matches!(e, DownloadEvent::JobStarted { .. })));

        wait_until_off(&manager).await;
        assert!(!manager.is_on());
        assert_eq!(manager.pending().await, 0);
        assert!(manager.active().await.is_none());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_task_is_reported_and_the_job_keeps_going() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = DownloadDirs::new(tmp.path());
        let registry = Registry::bundled();
        let fetcher = Arc::new(MockFetcher {
            fail_suffixes: vec!["001002.mp3".into()],
            ..MockFetcher::ok()
        });
        let (manager, mut rx) = JobManager::new(fetcher.clone());

        manager
            .add_job(Job::recitation(&registry, &dirs, 0, 1).unwrap())
            .await;
        manager.start().await;

        let events = events_until(&mut rx, |e| {
            matches!(e, DownloadEvent::Progress { completed: 6, .. })
        })
        .await;
        wait_until_off(&manager).await;

        let failures: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, DownloadEvent::JobFailed { .. }))
            .collect();
        assert_eq!(
            failures,
            vec![&DownloadEvent::JobFailed {
                kind: JobKind::Recitation,
                meta: [0, 1, 2],
            }]
        );
        // All seven tasks were attempted despite the failure.
        assert_eq!(fetcher.call_count(), 7);
        // Partial jobs never report completion.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn start_is_idempotent_and_silent_on_an_empty_queue() {
        let fetcher = Arc::new(MockFetcher::ok());
        let (manager, mut rx) = JobManager::new(fetcher.clone());

        manager.start().await;
        assert!(!manager.is_on());

        manager.stop().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn queued_jobs_run_in_fifo_order() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = DownloadDirs::new(tmp.path());
        let registry = Registry::bundled();
        let fetcher = Arc::new(MockFetcher::ok());
        let (manager, mut rx) = JobManager::new(fetcher.clone());

        manager
            .add_job(Job::translation(&registry, &dirs, 0).unwrap())
            .await;
        manager
            .add_job(Job::tafsir(&registry, &dirs, 0).unwrap())
            .await;
        assert_eq!(manager.pending().await, 2);
        manager.start().await;

        let events = events_until(&mut rx, |e| {
            matches!(
                e,
                DownloadEvent::JobCompleted { meta: [0, 0, 0], .. }
            )
        })
        .await;

        let names: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                DownloadEvent::JobStarted { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            names,
            vec![
                registry.translations[0].display_name.clone(),
                registry.tafasir[0].display_name.clone(),
            ]
        );
        assert_eq!(fetcher.call_count(), 2);
    }
}
