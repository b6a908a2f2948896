use std::path::{Path, PathBuf};

/// Layout of the downloads tree. All destination paths handed to tasks
/// are derived from one root:
///
/// ```text
/// <root>/recitations/<reciter_base_dir>/<surah:3><verse:3>.mp3
/// <root>/QCFV2/QCF2<page:3>.ttf
/// <root>/<filename>           (tafsir/translation/asset files)
/// ```
#[derive(Debug, Clone)]
pub struct DownloadDirs {
    root: PathBuf,
}

impl DownloadDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one reciter's verse files.
    pub fn recitation_dir(&self, base_dir_name: &str) -> PathBuf {
        self.root.join("recitations").join(base_dir_name)
    }

    /// Destination for one verse recitation file.
    pub fn recitation_file(&self, base_dir_name: &str, surah: u32, verse: u32) -> PathBuf {
        self.recitation_dir(base_dir_name)
            .join(format!("{surah:03}{verse:03}.mp3"))
    }

    /// Directory holding the QCF V2 page fonts.
    pub fn qcf_dir(&self) -> PathBuf {
        self.root.join("QCFV2")
    }

    /// Destination for one QCF page font.
    pub fn qcf_file(&self, page: u32) -> PathBuf {
        self.qcf_dir().join(format!("QCF2{page:03}.ttf"))
    }

    /// Destination for a tafsir/translation/asset file.
    pub fn content_file(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }
}
