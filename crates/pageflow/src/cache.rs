use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::paginate::{Cursor, LayoutConfig, Page};

pub const QUALIFIER: &str = "io";
pub const ORGANIZATION: &str = "pageflow";
pub const APPLICATION: &str = "pageflow";

/// Bumped whenever the persisted schema or the break policy changes in a
/// way that invalidates old entries.
pub const CACHE_FORMAT_VERSION: u32 = 1;

impl LayoutConfig {
    /// Deterministic fingerprint of every measurement-affecting parameter.
    /// Entries written under a different key are simply never read.
    pub fn layout_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(CACHE_FORMAT_VERSION.to_le_bytes());
        hasher.update(self.base_style.family.as_bytes());
        hasher.update([0u8]);
        for v in [
            self.base_style.font_size,
            self.base_style.line_height,
            self.width,
            self.height,
            self.viewport_inset,
            self.bottom_margin_factor,
            self.break_margin_factor,
            self.min_bottom_margin,
            self.max_bottom_margin,
            self.fit_tolerance,
            self.max_image_height,
        ] {
            hasher.update(v.to_bits().to_le_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// Persisted pagination state for one `(document, layout key)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub layout_key: String,
    pub pages: Vec<Page>,
    pub is_complete: bool,
    pub total_characters: usize,
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no cache directory available")]
    NoCacheDir,
}

/// On-disk page cache, one JSON record per `(document, layout key)`.
pub struct PageStore {
    root: PathBuf,
}

impl PageStore {
    /// Store rooted at the platform cache directory.
    pub fn open_default() -> Result<Self, CacheError> {
        let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or(CacheError::NoCacheDir)?;
        Ok(Self {
            root: dirs.cache_dir().to_path_buf(),
        })
    }

    /// Store rooted at an explicit directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, document_id: &str, layout_key: &str) -> PathBuf {
        self.root
            .join("pages")
            .join(sanitize(document_id))
            .join(format!("{layout_key}.json"))
    }

    /// Loads the record matching this document and layout, if any. A
    /// missing file is normal; a corrupt or key-mismatched record is
    /// ignored so the caller falls back to a fresh cursor.
    pub fn load(&self, document_id: &str, config: &LayoutConfig) -> Option<CacheRecord> {
        let key = config.layout_key();
        let path = self.record_path(document_id, &key);
        let data = fs::read(&path).ok()?;
        let record: CacheRecord = match serde_json::from_slice(&data) {
            Ok(record) => record,
            Err(err) => {
                log::warn!("ignoring unreadable page cache at {}: {err}", path.display());
                return None;
            }
        };
        if record.layout_key != key {
            return None;
        }
        Some(record)
    }

    pub fn save(&self, document_id: &str, record: &CacheRecord) -> Result<(), CacheError> {
        let path = self.record_path(document_id, &record.layout_key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(record)?;
        fs::write(path, data)?;
        Ok(())
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paginate::Cursor;

    #[test]
    fn layout_key_is_deterministic() {
        let a = LayoutConfig::new(300.0, 500.0);
        let b = LayoutConfig::new(300.0, 500.0);
        assert_eq!(a.layout_key(), b.layout_key());
    }

    #[test]
    fn layout_key_changes_with_width() {
        let a = LayoutConfig::new(300.0, 500.0);
        let b = LayoutConfig::new(320.0, 500.0);
        assert_ne!(a.layout_key(), b.layout_key());
    }

    #[test]
    fn layout_key_changes_with_font_size() {
        let a = LayoutConfig::new(300.0, 500.0);
        let mut b = LayoutConfig::new(300.0, 500.0);
        b.base_style.font_size = 18.0;
        assert_ne!(a.layout_key(), b.layout_key());
    }

    #[test]
    fn layout_key_changes_with_viewport_inset() {
        let a = LayoutConfig::new(300.0, 500.0);
        let mut b = LayoutConfig::new(300.0, 500.0);
        b.viewport_inset = 40.0;
        assert_ne!(a.layout_key(), b.layout_key());
    }

    fn record_for(config: &LayoutConfig) -> CacheRecord {
        CacheRecord {
            layout_key: config.layout_key(),
            pages: Vec::new(),
            is_complete: false,
            total_characters: 0,
            cursor: Some(Cursor::start()),
        }
    }

    #[test]
    fn store_roundtrips_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PageStore::at(dir.path());
        let config = LayoutConfig::new(300.0, 500.0);
        store
            .save("doc-1", &record_for(&config))
            .expect("save record");
        let loaded = store.load("doc-1", &config).expect("load record");
        assert_eq!(loaded.layout_key, config.layout_key());
        assert!(!loaded.is_complete);
        assert_eq!(loaded.cursor, Some(Cursor::start()));
    }

    #[test]
    fn mismatched_layout_is_never_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PageStore::at(dir.path());
        let config = LayoutConfig::new(300.0, 500.0);
        store
            .save("doc-1", &record_for(&config))
            .expect("save record");
        let changed = LayoutConfig::new(320.0, 500.0);
        assert!(store.load("doc-1", &changed).is_none());
    }

    #[test]
    fn missing_record_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PageStore::at(dir.path());
        assert!(store.load("doc-1", &LayoutConfig::new(300.0, 500.0)).is_none());
    }

    #[test]
    fn corrupt_record_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PageStore::at(dir.path());
        let config = LayoutConfig::new(300.0, 500.0);
        let path = store.record_path("doc-1", &config.layout_key());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, b"not json").expect("write");
        assert!(store.load("doc-1", &config).is_none());
    }
}
