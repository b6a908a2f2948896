use serde::Deserialize;

/// Number of surahs in the mushaf.
pub const SURAH_COUNT: usize = 114;

/// Verse count per surah, indexed by `surah - 1`.
const VERSE_COUNTS: [u32; SURAH_COUNT] = [
    7, 286, 200, 176, 120, 165, 206, 75, 129, 109, 123, 111, 43, 52, 99, 128,
    111, 110, 98, 135, 112, 78, 118, 64, 77, 227, 93, 88, 69, 60, 34, 30, 73,
    54, 45, 83, 182, 88, 75, 85, 54, 53, 89, 59, 37, 35, 38, 29, 18, 45, 60,
    49, 62, 55, 78, 96, 29, 22, 24, 13, 14, 11, 11, 18, 12, 12, 30, 52, 52,
    44, 28, 28, 20, 56, 40, 31, 50, 40, 46, 42, 29, 19, 36, 25, 22, 17, 19,
    26, 30, 20, 15, 21, 11, 8, 8, 19, 5, 8, 8, 11, 11, 8, 3, 9, 5, 4, 7, 3,
    6, 3, 5, 4, 5, 6,
];

/// Number of verses in `surah` (1-based). Returns `None` for a surah
/// number outside `1..=114`.
pub fn verse_count(surah: u32) -> Option<u32> {
    VERSE_COUNTS.get(surah.checked_sub(1)? as usize).copied()
}

/// Global verse id relative to the beginning of the mushaf, used by
/// reciters whose URL scheme addresses verses by a single number.
/// `verse_id(1, 1) == 1`, `verse_id(2, 1) == 8`.
pub fn verse_id(surah: u32, verse: u32) -> Option<u32> {
    if verse == 0 || verse > verse_count(surah)? {
        return None;
    }
    let preceding: u32 = VERSE_COUNTS[..surah as usize - 1].iter().sum();
    Some(preceding + verse)
}

/// A reciter supported by the application.
#[derive(Debug, Clone, Deserialize)]
pub struct Reciter {
    /// Directory under `recitations/` that holds this reciter's files.
    pub base_dir_name: String,
    /// Name shown in the UI.
    pub display_name: String,
    /// Url prefix recitation files are downloaded from.
    pub base_url: String,
    /// Whether verse files are addressed by global verse id rather than
    /// a surah/verse number pair.
    #[serde(default)]
    pub use_id: bool,
}

/// A downloadable tafsir, translation or extra asset.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub display_name: String,
    pub filename: String,
    pub url: String,
}

/// Read-only snapshot of the content registries. Loaded once, injected
/// where needed, and never mutated while downloads run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub reciters: Vec<Reciter>,
    #[serde(default)]
    pub tafasir: Vec<ContentEntry>,
    #[serde(default)]
    pub translations: Vec<ContentEntry>,
}

impl Registry {
    /// Parses a registry snapshot from its JSON representation.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// The registry entries bundled with the application.
    pub fn bundled() -> Self {
        Registry {
            reciters: vec![
                Reciter {
                    base_dir_name: "abdul_basit_murattal".into(),
                    display_name: "Abdul Basit Abdul Samad (Murattal)".into(),
                    base_url: "https://everyayah.com/data/Abdul_Basit_Murattal_192kbps/".into(),
                    use_id: false,
                },
                Reciter {
                    base_dir_name: "alafasy".into(),
                    display_name: "Mishary Rashid Alafasy".into(),
                    base_url: "https://everyayah.com/data/Alafasy_128kbps/".into(),
                    use_id: false,
                },
                Reciter {
                    base_dir_name: "husary".into(),
                    display_name: "Mahmoud Khalil Al-Husary".into(),
                    base_url: "https://cdn.islamic.network/quran/audio/128/ar.husary/".into(),
                    use_id: true,
                },
            ],
            tafasir: vec![
                ContentEntry {
                    display_name: "Tafsir Ibn Kathir".into(),
                    filename: "ar_ibn_kathir.db".into(),
                    url: "https://raw.githubusercontent.com/0xzer0x/quran-companion/main/assets/tafasir/ar_ibn_kathir.db".into(),
                },
                ContentEntry {
                    display_name: "Tafsir Al-Saadi".into(),
                    filename: "ar_saadi.db".into(),
                    url: "https://raw.githubusercontent.com/0xzer0x/quran-companion/main/assets/tafasir/ar_saadi.db".into(),
                },
            ],
            translations: vec![
                ContentEntry {
                    display_name: "English - Saheeh International".into(),
                    filename: "en_sahih.db".into(),
                    url: "https://raw.githubusercontent.com/0xzer0x/quran-companion/main/assets/translations/en_sahih.db".into(),
                },
                ContentEntry {
                    display_name: "Turkish - Diyanet".into(),
                    filename: "tr_diyanet.db".into(),
                    url: "https://raw.githubusercontent.com/0xzer0x/quran-companion/main/assets/translations/tr_diyanet.db".into(),
                },
            ],
        }
    }
}
