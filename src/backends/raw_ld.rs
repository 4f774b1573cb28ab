//! Uncompressed dictionaries (`RawLD`, `RawLD4`).
//!
//! `module.idx` holds one `(offset, size)` record per entry, sorted by headword;
//! the size is 2 bytes wide for `RawLD` and 4 for `RawLD4`. Each record points at
//! `headword\nbody` in `module.dat`.

use std::fs::File;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::backends::dictionary::{DatRecord, DictionaryIndex, EntryBody};
use crate::backends::{Backend, ModuleContext};
use crate::config::ModuleConfig;
use crate::keys::{IndexKey, Key, KeyList};
use crate::storage::{open_module_file, OpenState, SizeWidth};
use crate::utils::read_region;
use crate::{ModuleError, Result};

struct LdFiles {
    idx: File,
    dat: File,
}

struct RawLDState {
    files: OpenState<LdFiles>,
    index: Option<Arc<DictionaryIndex>>,
}

pub struct RawLDBackend {
    context: ModuleContext,
    width: SizeWidth,
    state: Mutex<RawLDState>,
}

impl RawLDBackend {
    /// # Errors
    ///
    /// Returns a `Configuration` error when `module.idx` or `module.dat` is missing.
    pub fn new(config: ModuleConfig) -> Result<Self> {
        for extension in ["idx", "dat"] {
            let path = config.stem_file(extension);
            if !path.is_file() {
                return Err(ModuleError::configuration(format!("{}: {} not found", config.name, path.display())));
            }
        }
        let width = config.driver.size_width();
        Ok(Self {
            context: ModuleContext::new(config),
            width,
            state: Mutex::new(RawLDState { files: OpenState::Closed, index: None }),
        })
    }

    fn open_files(&self) -> Result<LdFiles> {
        let config = &self.context.config;
        Ok(LdFiles {
            idx: open_module_file(&config.stem_file("idx"), false)?,
            dat: open_module_file(&config.stem_file("dat"), false)?,
        })
    }

    /// The headword index, built on first use and kept until the backend is dropped.
    fn dictionary(&self, state: &mut RawLDState) -> Result<Arc<DictionaryIndex>> {
        if let Some(index) = &state.index {
            return Ok(Arc::clone(index));
        }
        let files = state.files.get_or_open(|| self.open_files())?;
        let index = Arc::new(DictionaryIndex::build(&self.context, &mut files.idx, &mut files.dat, self.width)?);
        state.index = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Finds the key for `text`, normalizing case, Strong's numbers and dates.
    pub fn find_key(&self, text: &str) -> Result<Option<IndexKey>> {
        let mut state = self.state.lock();
        Ok(self.dictionary(&mut state)?.find(text).cloned())
    }

    fn read_entry(&self, start: &IndexKey) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        let index = self.dictionary(&mut state)?;
        let files = state.files.get_or_open(|| self.open_files())?;

        let mut body = index.follow_links(start, |key| {
            self.context.stats.record_data_read();
            let record = read_region(&mut files.dat, key.index.offset as u64, key.index.size as i64)?;
            let record = DatRecord::split(record)
                .ok_or_else(|| ModuleError::read_failure(&key.name, "entry has no headword separator"))?;
            Ok(match record.link_target(&self.context) {
                Some(target) => EntryBody::Link(target),
                None => EntryBody::Content(record.body),
            })
        })?;
        self.context.decipher(&mut body);
        debug!("{}: read {} bytes for {}", self.context.name(), body.len(), start.name);
        Ok(body)
    }
}

impl Backend for RawLDBackend {
    fn context(&self) -> &ModuleContext {
        &self.context
    }

    fn activate(&self) -> Result<()> {
        self.state.lock().files.get_or_open(|| self.open_files())?;
        Ok(())
    }

    fn deactivate(&self) {
        self.state.lock().files.close();
    }

    fn is_active(&self) -> bool {
        self.state.lock().files.is_open()
    }

    fn read_index(&self) -> Result<KeyList> {
        let mut state = self.state.lock();
        Ok(KeyList::Entries(self.dictionary(&mut state)?.entries()))
    }

    fn contains(&self, key: &Key) -> bool {
        let Key::Index(key) = key else { return false };
        let mut state = self.state.lock();
        self.dictionary(&mut state)
            .map(|index| index.get(&key.name).is_some_and(|found| !found.index.is_empty()))
            .unwrap_or(false)
    }

    fn get_raw_bytes(&self, key: &Key) -> Result<Vec<u8>> {
        let Key::Index(entry) = key else {
            return Err(ModuleError::read_failure(key.name(), "not a dictionary key"));
        };
        if entry.index.is_empty() {
            return Ok(Vec::new());
        }
        self.read_entry(entry).map_err(|e| e.into_read_failure(key.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BookCategory, BookType, Feature};
    use crate::storage::DataIndex;
    use std::path::{Path, PathBuf};

    /// Writes `entries` (headword, body) in order and returns the data stem.
    fn write_ld(dir: &Path, entries: &[(&str, &str)], width: SizeWidth) -> PathBuf {
        let stem = dir.join("dict");
        let (mut idx, mut dat) = (Vec::new(), Vec::new());
        for (headword, body) in entries {
            let record = format!("{}\n{}", headword, body);
            idx.extend(DataIndex::new(dat.len() as u32, record.len() as i32).encode(width).unwrap());
            dat.extend(record.as_bytes());
        }
        std::fs::write(stem.with_extension("idx"), idx).unwrap();
        std::fs::write(stem.with_extension("dat"), dat).unwrap();
        stem
    }

    fn backend(stem: PathBuf, driver: BookType) -> RawLDBackend {
        RawLDBackend::new(ModuleConfig::new("Dict", driver, stem)).unwrap()
    }

    fn names(list: KeyList) -> Vec<String> {
        match list {
            KeyList::Entries(keys) => keys.into_iter().map(|k| k.name).collect(),
            other => panic!("unexpected key list {:?}", other),
        }
    }

    #[test]
    fn test_lookup_and_links() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let entries = [("AARON", "Brother of Moses"), ("ARON", "@LINK AARON"), ("MOSES\\", "Lawgiver")];
        let backend = backend(write_ld(dir.path(), &entries, SizeWidth::U16), BookType::RawLd);

        assert_eq!(names(backend.read_index().unwrap()), ["AARON", "ARON", "MOSES"]);
        let aron = backend.find_key("aron").unwrap().unwrap();
        assert_eq!(backend.get_raw_text(&Key::Index(aron)).unwrap(), "Brother of Moses");
        let moses = backend.find_key("Moses").unwrap().unwrap();
        assert!(backend.contains(&Key::Index(moses.clone())));
        assert_eq!(backend.get_raw_text(&Key::Index(moses)).unwrap(), "Lawgiver");
        assert!(backend.find_key("PHARAOH").unwrap().is_none());
    }

    #[test]
    fn test_wide_index() {
        let dir = tempfile::tempdir().unwrap();
        let body = "x".repeat(70_000);
        let stem = write_ld(dir.path(), &[("LONG", &body)], SizeWidth::U32);
        let backend = backend(stem, BookType::RawLd4);
        let key = backend.find_key("LONG").unwrap().unwrap();
        assert_eq!(backend.get_raw_bytes(&Key::Index(key)).unwrap().len(), 70_000);
    }

    #[test]
    fn test_cyclic_links_fail() {
        let dir = tempfile::tempdir().unwrap();
        let stem = write_ld(dir.path(), &[("A", "@LINK B"), ("B", "@LINK\nA")], SizeWidth::U16);
        let backend = backend(stem, BookType::RawLd);
        let a = backend.find_key("A").unwrap().unwrap();
        let err = backend.get_raw_text(&Key::Index(a)).unwrap_err();
        assert!(err.is_read_failure());
    }

    #[test]
    fn test_dangling_link_fails() {
        let dir = tempfile::tempdir().unwrap();
        let stem = write_ld(dir.path(), &[("A", "@LINK NOWHERE")], SizeWidth::U16);
        let backend = backend(stem, BookType::RawLd);
        let a = backend.find_key("A").unwrap().unwrap();
        assert!(backend.get_raw_text(&Key::Index(a)).unwrap_err().is_read_failure());
    }

    #[test]
    fn test_strongs_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let stem = write_ld(dir.path(), &[("00026", "agape"), ("03588", "ho")], SizeWidth::U16);
        let config = ModuleConfig::new("StrongsGreek", BookType::RawLd, stem).with_feature(Feature::GreekDef);
        let backend = RawLDBackend::new(config).unwrap();
        let key = backend.find_key("G26").unwrap().unwrap();
        assert_eq!(key.name, "00026");
        assert_eq!(backend.get_raw_text(&Key::Index(key)).unwrap(), "agape");
    }

    #[test]
    fn test_devotional_headwords() {
        let dir = tempfile::tempdir().unwrap();
        let stem = write_ld(dir.path(), &[("01.01", "New year"), ("01.02", "Second day")], SizeWidth::U16);
        let config = ModuleConfig::new("Daily", BookType::RawLd, stem).with_category(BookCategory::DailyDevotions);
        let backend = RawLDBackend::new(config).unwrap();

        let key = backend.find_key("01.02").unwrap().unwrap();
        assert_eq!(key.internal_name, "01.02");
        assert!(key.name.starts_with("Jan 2, "));
        assert_eq!(backend.find_key(&key.name).unwrap().unwrap(), key);
        assert_eq!(backend.get_raw_text(&Key::Index(key)).unwrap(), "Second day");
    }

    #[test]
    fn test_missing_files_and_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let err = RawLDBackend::new(ModuleConfig::new("None", BookType::RawLd, dir.path().join("none"))).err().unwrap();
        assert!(matches!(err, ModuleError::Configuration { .. }));

        let backend = backend(write_ld(dir.path(), &[("A", "a")], SizeWidth::U16), BookType::RawLd);
        assert!(!backend.is_active());
        backend.activate().unwrap();
        assert!(backend.is_active());
        backend.deactivate();
        backend.deactivate();
        assert!(!backend.is_active());
        let a = backend.find_key("A").unwrap().unwrap();
        assert_eq!(backend.get_raw_text(&Key::Index(a.clone())).unwrap(), "a");
        assert!(backend.set_raw_text(&Key::Index(a), "b").is_err());
    }
}
