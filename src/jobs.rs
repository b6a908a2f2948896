use std::collections::VecDeque;
use std::io;

use thiserror::Error;

use crate::dirs::DownloadDirs;
use crate::models::{ContentKind, DownloadTask, JobKind, TaskMeta};
use crate::registry::{self, ContentEntry, Reciter, Registry};

/// Pages in the QCF V2 font set.
pub const QCF_PAGE_COUNT: u32 = 604;

/// Base url the page fonts are served from.
pub const QCF_BASE_URL: &str =
    "https://raw.githubusercontent.com/0xzer0x/quran-companion/main/assets/fonts/";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("no reciter at index {0}")]
    UnknownReciter(usize),
    #[error("surah number {0} is out of range")]
    UnknownSurah(u32),
    #[error("no tafsir at index {0}")]
    UnknownTafsir(usize),
    #[error("no translation at index {0}")]
    UnknownTranslation(usize),
}

/// Parameters a job expands from when it is activated.
#[derive(Debug, Clone)]
enum Expansion {
    Recitation {
        reciter: Reciter,
        reciter_idx: u32,
        surah: u32,
    },
    Qcf,
    Content {
        entry: ContentEntry,
        kind: ContentKind,
        index: u32,
    },
}

/// One logical unit of download work: a surah's verse recitations, the
/// full QCF font set, or a single content file.
///
/// A job knows its task count up front but expands into concrete
/// [`DownloadTask`]s only when the manager activates it. Expansion is a
/// pure function of the parameters captured at construction.
#[derive(Debug)]
pub struct Job {
    kind: JobKind,
    name: String,
    dirs: DownloadDirs,
    expansion: Expansion,
    tasks: VecDeque<DownloadTask>,
    total: usize,
    completed: usize,
    failed: usize,
    active: bool,
    last_meta: TaskMeta,
}

impl Job {
    /// Job for every verse recitation of `surah` by the reciter at
    /// `reciter_idx` in the registry.
    pub fn recitation(
        registry: &Registry,
        dirs: &DownloadDirs,
        reciter_idx: usize,
        surah: u32,
    ) -> Result<Self, JobError> {
        let reciter = registry
            .reciters
            .get(reciter_idx)
            .ok_or(JobError::UnknownReciter(reciter_idx))?
            .clone();
        let verses = registry::verse_count(surah).ok_or(JobError::UnknownSurah(surah))?;

        Ok(Self::new(
            JobKind::Recitation,
            format!("{} - Surah {}", reciter.display_name, surah),
            dirs.clone(),
            Expansion::Recitation {
                reciter,
                reciter_idx: reciter_idx as u32,
                surah,
            },
            verses as usize,
        ))
    }

    /// Job for the complete 604-page QCF V2 font set.
    pub fn qcf(dirs: &DownloadDirs) -> Self {
        Self::new(
            JobKind::Qcf,
            "QCF V2".into(),
            dirs.clone(),
            Expansion::Qcf,
            QCF_PAGE_COUNT as usize,
        )
    }

    /// Job for the tafsir at `index` in the registry.
    pub fn tafsir(registry: &Registry, dirs: &DownloadDirs, index: usize) -> Result<Self, JobError> {
        let entry = registry
            .tafasir
            .get(index)
            .ok_or(JobError::UnknownTafsir(index))?
            .clone();
        Ok(Self::content(dirs, entry, ContentKind::Tafsir, index))
    }

    /// Job for the translation at `index` in the registry.
    pub fn translation(
        registry: &Registry,
        dirs: &DownloadDirs,
        index: usize,
    ) -> Result<Self, JobError> {
        let entry = registry
            .translations
            .get(index)
            .ok_or(JobError::UnknownTranslation(index))?
            .clone();
        Ok(Self::content(dirs, entry, ContentKind::Translation, index))
    }

    /// Job for a single arbitrary named asset.
    pub fn asset(dirs: &DownloadDirs, display_name: &str, filename: &str, url: &str) -> Self {
        let entry = ContentEntry {
            display_name: display_name.into(),
            filename: filename.into(),
            url: url.into(),
        };
        Self::content(dirs, entry, ContentKind::Asset, 0)
    }

    fn content(dirs: &DownloadDirs, entry: ContentEntry, kind: ContentKind, index: usize) -> Self {
        Self::new(
            JobKind::ContentFile,
            entry.display_name.clone(),
            dirs.clone(),
            Expansion::Content {
                entry,
                kind,
                index: index as u32,
            },
            1,
        )
    }

    fn new(
        kind: JobKind,
        name: String,
        dirs: DownloadDirs,
        expansion: Expansion,
        total: usize,
    ) -> Self {
        Self {
            kind,
            name,
            dirs,
            expansion,
            tasks: VecDeque::new(),
            total,
            completed: 0,
            failed: 0,
            active: false,
            last_meta: [0, 0, 0],
        }
    }

    /// Expands the job into its ordered task list and creates the
    /// destination directory. Tasks never create directories themselves.
    pub async fn activate(&mut self) -> io::Result<()> {
        let dest_dir = match &self.expansion {
            Expansion::Recitation { reciter, .. } => {
                self.dirs.recitation_dir(&reciter.base_dir_name)
            }
            Expansion::Qcf => self.dirs.qcf_dir(),
            Expansion::Content { .. } => self.dirs.root().to_path_buf(),
        };
        tokio::fs::create_dir_all(&dest_dir).await?;

        self.tasks = self.expand().into();
        self.active = true;
        Ok(())
    }

    /// The expansion rule for this job's parameters; pure, in task order.
    fn expand(&self) -> Vec<DownloadTask> {
        match &self.expansion {
            Expansion::Recitation {
                reciter,
                reciter_idx,
                surah,
            } => recitation_tasks(reciter, *reciter_idx, *surah, &self.dirs),
            Expansion::Qcf => qcf_tasks(&self.dirs),
            Expansion::Content { entry, kind, index } => {
                vec![content_task(entry, *kind, *index, &self.dirs)]
            }
        }
    }

    pub(crate) fn next_task(&mut self) -> Option<DownloadTask> {
        self.tasks.pop_front()
    }

    pub(crate) fn mark_done(&mut self, task: &DownloadTask) {
        debug_assert!(self.completed + self.failed < self.total);
        self.completed += 1;
        self.last_meta = task.meta;
    }

    pub(crate) fn mark_failed(&mut self, task: &DownloadTask) {
        debug_assert!(self.completed + self.failed < self.total);
        self.failed += 1;
        self.last_meta = task.meta;
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// True while the job is active and still has outstanding or
    /// in-flight tasks.
    pub fn is_downloading(&self) -> bool {
        self.active && self.completed + self.failed < self.total
    }

    /// Meta of the most recently finished task, reported with the job's
    /// terminal event.
    pub fn last_meta(&self) -> TaskMeta {
        self.last_meta
    }
}

fn recitation_tasks(
    reciter: &Reciter,
    reciter_idx: u32,
    surah: u32,
    dirs: &DownloadDirs,
) -> Vec<DownloadTask> {
    let verses = registry::verse_count(surah).unwrap_or(0);
    (1..=verses)
        .map(|verse| {
            let url = if reciter.use_id {
                // constructors validated the surah, so every pair here
                // resolves to an id
                let id = registry::verse_id(surah, verse).unwrap_or(0);
                format!("{}{}.mp3", reciter.base_url, id)
            } else {
                format!("{}{surah:03}{verse:03}.mp3", reciter.base_url)
            };
            DownloadTask {
                url,
                destination: dirs.recitation_file(&reciter.base_dir_name, surah, verse),
                meta: [reciter_idx, surah, verse],
            }
        })
        .collect()
}

fn qcf_tasks(dirs: &DownloadDirs) -> Vec<DownloadTask> {
    (1..=QCF_PAGE_COUNT)
        .map(|page| DownloadTask {
            url: format!("{QCF_BASE_URL}QCFV2/QCF2{page:03}.ttf"),
            destination: dirs.qcf_file(page),
            meta: [0, 0, page],
        })
        .collect()
}

fn content_task(
    entry: &ContentEntry,
    kind: ContentKind,
    index: u32,
    dirs: &DownloadDirs,
) -> DownloadTask {
    DownloadTask {
        url: entry.url.clone(),
        destination: dirs.content_file(&entry.filename),
        meta: [kind.code(), index, 0],
    }
}
