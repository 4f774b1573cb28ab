//! One-file-per-verse modules (`RawFiles`).
//!
//! The testament index files have the `RawText` layout, but each data region holds
//! only a 7-digit file name; the verse text lives in that file inside the module
//! directory. This is the one writable layout. New storage is allocated from the
//! counter kept in `incfile`, a 4-byte little-endian integer that starts at 1.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info};
use parking_lot::Mutex;

use crate::backends::raw_verse::{enumerate_verses, present_testaments, verse_key, TestamentFiles, VerseFiles};
use crate::backends::{Backend, ModuleContext};
use crate::config::ModuleConfig;
use crate::keys::{Key, KeyList, Testament, VerseKey, Versification};
use crate::storage::{DataIndex, OpenState, SizeWidth};
use crate::utils::{decode_le32, read_region};
use crate::{ModuleError, Result};

const INCFILE: &str = "incfile";
const FILE_NAME_LEN: usize = 7;

struct RawFileState {
    files: VerseFiles,
    writable: bool,
    /// Next file number to allocate.
    incfile_value: u32,
}

pub struct RawFileBackend {
    context: ModuleContext,
    versification: Arc<dyn Versification>,
    width: SizeWidth,
    present: Vec<Testament>,
    state: Mutex<OpenState<RawFileState>>,
}

impl RawFileBackend {
    pub fn new(config: ModuleConfig, versification: Arc<dyn Versification>) -> Result<Self> {
        let present = present_testaments(&config, ".vss", "")?;
        let width = config.driver.size_width();
        Ok(Self {
            context: ModuleContext::new(config),
            versification,
            width,
            present,
            state: Mutex::new(OpenState::Closed),
        })
    }

    /// Creates an empty module: zeroed index files sized by the versification,
    /// empty data files and a counter of 1. The New Testament index gets one
    /// spare record past its last verse.
    pub fn create(config: ModuleConfig, versification: Arc<dyn Versification>) -> Result<Self> {
        fs::create_dir_all(&config.data_path)?;
        let width = config.driver.size_width();
        for testament in [Testament::Old, Testament::New] {
            let Some(prefix) = testament.file_prefix() else { continue };
            let mut count = versification.verse_count(testament) as usize;
            if testament == Testament::New {
                count += 1;
            }
            fs::write(config.module_file(prefix), b"")?;
            fs::write(config.module_file(&format!("{}.vss", prefix)), vec![0u8; count * width.record_len()])?;
        }
        fs::write(config.module_file(INCFILE), 1u32.to_le_bytes())?;
        info!("Created empty RawFiles module {} at {}", config.name, config.data_path.display());
        Self::new(config, versification)
    }

    fn open_state(&self) -> Result<RawFileState> {
        let config = &self.context.config;
        let (files, writable) = match VerseFiles::open(config, &self.present, ".vss", "", true) {
            Ok(files) => (files, true),
            Err(e) => {
                debug!("{} opened read-only: {}", config.name, e);
                (VerseFiles::open(config, &self.present, ".vss", "", false)?, false)
            }
        };

        let incfile = config.module_file(INCFILE);
        let incfile_value = if incfile.is_file() {
            let bytes = fs::read(&incfile)?;
            decode_le32(&bytes, 0).unwrap_or_else(|e| {
                error!("Unreadable {}: {}", incfile.display(), e);
                1
            })
        } else {
            1
        };
        Ok(RawFileState { files, writable, incfile_value })
    }

    fn verse_file(&self, name: &str) -> PathBuf {
        self.context.config.module_file(name)
    }

    /// Reads the 7-digit file name a data region points at.
    fn read_file_name(&self, data: &mut File, index: DataIndex) -> Result<String> {
        self.context.stats.record_data_read();
        let mut name = read_region(data, index.offset as u64, index.size as i64)?;
        self.context.decipher(&mut name);
        if name.len() != FILE_NAME_LEN || !name.iter().all(u8::is_ascii_digit) {
            return Err(ModuleError::invalid_data_format(format!(
                "expected a {} digit file name, found {:?}",
                FILE_NAME_LEN,
                String::from_utf8_lossy(&name)
            )));
        }
        Ok(String::from_utf8_lossy(&name).into_owned())
    }

    fn locate_in<'a>(
        &self,
        state: &'a mut RawFileState,
        verse: &VerseKey,
    ) -> Result<(Option<&'a mut TestamentFiles>, u32)> {
        let (testament, ordinal) = self.versification.locate(verse)?;
        Ok((state.files.get_mut(testament), ordinal))
    }

    fn read_verse(&self, verse: &VerseKey) -> Result<Vec<u8>> {
        let mut guard = self.state.lock();
        let state = guard.get_or_open(|| self.open_state())?;
        let (files, ordinal) = self.locate_in(state, verse)?;
        let Some(files) = files else { return Ok(Vec::new()) };

        self.context.stats.record_index_read();
        let index = DataIndex::read_record(&mut files.index, ordinal as u64, self.width)?;
        if index.size == 0 {
            return Ok(Vec::new());
        }
        if index.size < 0 {
            error!("In {}: verse {} has a bad index size of {}", self.context.name(), verse, index.size);
            return Ok(Vec::new());
        }

        let name = self.read_file_name(&mut files.data, index)?;
        let mut text = fs::read(self.verse_file(&name))?;
        self.context.decipher(&mut text);
        Ok(text)
    }

    fn write_verse(&self, verse: &VerseKey, text: &str) -> Result<()> {
        let mut guard = self.state.lock();
        let state = guard.get_or_open(|| self.open_state())?;
        if !state.writable {
            return Err(ModuleError::read_only(format!("{} files are not writable", self.context.name())));
        }
        let next_value = state.incfile_value;
        let (files, ordinal) = self.locate_in(state, verse)?;
        let Some(files) = files else {
            return Err(ModuleError::invalid_parameter(format!("{} has no files for the testament of {}", self.context.name(), verse)));
        };

        let mut body = self.context.encode(text);
        self.context.encipher(&mut body);

        let index = DataIndex::read_record(&mut files.index, ordinal as u64, self.width)?;
        if index.size > 0 {
            let name = self.read_file_name(&mut files.data, index)?;
            fs::write(self.verse_file(&name), &body)?;
            return Ok(());
        }

        // New storage: verse file, then its name in the data file, then the index
        // record, and only then the counter.
        let name = format!("{:07}", next_value);
        fs::write(self.verse_file(&name), &body)?;

        let data_len = files.data.seek(SeekFrom::End(0))?;
        let mut stored_name = name.clone().into_bytes();
        self.context.encipher(&mut stored_name);
        files.data.write_all(&stored_name)?;
        files.data.write_all(b"\r\n")?;

        DataIndex::new(data_len as u32, FILE_NAME_LEN as i32).write_record(&mut files.index, ordinal as u64, self.width)?;

        state.incfile_value = next_value + 1;
        fs::write(self.verse_file(INCFILE), state.incfile_value.to_le_bytes())?;
        debug!("Allocated {} for {}", name, verse);
        Ok(())
    }

    fn alias_verse(&self, alias: &VerseKey, source: &VerseKey) -> Result<()> {
        let (alias_testament, alias_ordinal) = self.versification.locate(alias)?;
        let (source_testament, source_ordinal) = self.versification.locate(source)?;
        if alias_testament != source_testament {
            return Err(ModuleError::unsupported(format!(
                "cannot alias {} to {} across testaments",
                alias, source
            )));
        }

        let mut guard = self.state.lock();
        let state = guard.get_or_open(|| self.open_state())?;
        if !state.writable {
            return Err(ModuleError::read_only(format!("{} files are not writable", self.context.name())));
        }
        let Some(files) = state.files.get_mut(alias_testament) else {
            return Err(ModuleError::invalid_parameter(format!("{} has no files for the testament of {}", self.context.name(), alias)));
        };
        let source_index = DataIndex::read_record(&mut files.index, source_ordinal as u64, self.width)?;
        source_index.write_record(&mut files.index, alias_ordinal as u64, self.width)
    }
}

impl Backend for RawFileBackend {
    fn context(&self) -> &ModuleContext {
        &self.context
    }

    fn activate(&self) -> Result<()> {
        self.state.lock().get_or_open(|| self.open_state())?;
        Ok(())
    }

    fn deactivate(&self) {
        self.state.lock().close();
    }

    fn is_active(&self) -> bool {
        self.state.lock().is_open()
    }

    fn read_index(&self) -> Result<KeyList> {
        let mut guard = self.state.lock();
        let state = guard.get_or_open(|| self.open_state())?;
        let width = self.width;
        let mut keys = Vec::new();
        for testament in [Testament::Old, Testament::New] {
            if let Some(files) = state.files.get_mut(testament) {
                keys.extend(enumerate_verses(
                    self.versification.as_ref(),
                    testament,
                    &mut files.index,
                    width.record_len(),
                    |buf, pos| Ok(DataIndex::decode(buf, pos, width)?.size as i64),
                )?);
            }
        }
        Ok(KeyList::Verses(keys))
    }

    fn contains(&self, key: &Key) -> bool {
        let result = verse_key(key).and_then(|verse| {
            let mut guard = self.state.lock();
            let state = guard.get_or_open(|| self.open_state())?;
            let (files, ordinal) = self.locate_in(state, verse)?;
            match files {
                Some(files) => Ok(DataIndex::read_record(&mut files.index, ordinal as u64, self.width)?.size > 0),
                None => Ok(false),
            }
        });
        result.unwrap_or(false)
    }

    fn get_raw_bytes(&self, key: &Key) -> Result<Vec<u8>> {
        let verse = verse_key(key)?;
        self.read_verse(verse).map_err(|e| e.into_read_failure(key.name()))
    }

    fn set_raw_text(&self, key: &Key, text: &str) -> Result<()> {
        self.write_verse(verse_key(key)?, text)
    }

    fn set_alias_key(&self, alias: &Key, source: &Key) -> Result<()> {
        self.alias_verse(verse_key(alias)?, verse_key(source)?)
    }

    fn is_writable(&self) -> bool {
        let config = &self.context.config;
        self.present.iter().filter_map(Testament::file_prefix).all(|prefix| {
            [config.module_file(prefix), config.module_file(&format!("{}.vss", prefix))]
                .iter()
                .all(|path| fs::metadata(path).is_ok_and(|meta| !meta.permissions().readonly()))
        })
    }
}
