//! Headword index shared by the dictionary backends.
//!
//! Both dictionary layouts store, for every entry, a record in `module.dat` that
//! starts with the headword and a newline. The index is built by walking
//! `module.idx` once and reading each record's headword; the rest of the record is
//! layout specific. A record body of `@LINK target` points at another headword.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use chrono::{Datelike, Days, Local, NaiveDate};
use log::{debug, warn};
use regex::Regex;

use crate::backends::ModuleContext;
use crate::config::Feature;
use crate::keys::IndexKey;
use crate::storage::{DataIndex, SizeWidth};
use crate::utils::{find_byte, read_region};
use crate::{ModuleError, Result};

const LINK_PREFIX: &[u8] = b"@LINK";
const DEVOTIONAL_FORMAT: &str = "%b %-d, %Y";

/// The body of a `.dat` record, after the headword separator.
pub(crate) struct DatRecord {
    pub body: Vec<u8>,
}

impl DatRecord {
    pub fn split(mut record: Vec<u8>) -> Option<Self> {
        let separator = find_byte(&record, b'\n')?;
        Some(Self { body: record.split_off(separator + 1) })
    }

    /// The target headword when the body is an `@LINK`.
    ///
    /// The separator after `@LINK` may be a space or a newline.
    pub fn link_target(&self, context: &ModuleContext) -> Option<String> {
        let rest = self.body.strip_prefix(LINK_PREFIX)?;
        let rest = match rest.first() {
            Some(b' ' | b'\n' | b'\r' | b'\t') => &rest[1..],
            _ => rest,
        };
        let target = context.decode("@LINK", rest);
        let target = target.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        Some(target.to_string())
    }
}

/// What one step of reading a dictionary entry found.
pub(crate) enum EntryBody<T> {
    Link(String),
    Content(T),
}

/// Module whose prefixed Strong's headwords carry a trailing letter.
const LETTERED_STRONGS_MODULE: &str = "naslex";

/// How Strong's numbers are written as headwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrongsStyle {
    /// `G0001`: module defines both Greek and Hebrew numbers
    Prefixed,
    /// `G0001A`: prefixed, keeping a trailing letter
    PrefixedLettered,
    /// `00001`: module defines one language
    Padded,
}

/// Headwords of a dictionary, ordered by display name.
#[derive(Debug)]
pub struct DictionaryIndex {
    keys: BTreeMap<String, IndexKey>,
    devotional: bool,
    strongs: Option<(Regex, StrongsStyle)>,
}

impl DictionaryIndex {
    /// Reads every record of `idx` and the headword each one points at in `dat`.
    ///
    /// A later record whose display name equals an earlier one replaces it.
    pub fn build(context: &ModuleContext, idx: &mut File, dat: &mut File, width: SizeWidth) -> Result<Self> {
        let mut index = Self::empty(context)?;
        let year = Local::now().year();

        let mut records = Vec::new();
        idx.seek(SeekFrom::Start(0))?;
        idx.read_to_end(&mut records)?;
        let record_len = width.record_len();
        if records.len() % record_len != 0 {
            warn!("{}: index has {} trailing bytes", context.name(), records.len() % record_len);
        }

        for pos in (0..records.len() / record_len).map(|i| i * record_len) {
            let data_index = DataIndex::decode(&records, pos, width)?;
            context.stats.record_data_read();
            let record = read_region(dat, data_index.offset as u64, data_index.size as i64)?;
            let headword = match find_byte(&record, b'\n') {
                Some(separator) => &record[..separator],
                None => {
                    warn!("{}: entry at {} has no headword separator", context.name(), data_index.offset);
                    &record[..]
                }
            };
            let internal_name = clean_headword(&context.decode("headword", headword));
            let name = if index.devotional {
                devotional_display_name(&internal_name, year).unwrap_or_else(|| internal_name.clone())
            } else {
                internal_name.clone()
            };
            index.keys.insert(name.clone(), IndexKey { name, internal_name, index: data_index });
        }
        debug!("{}: indexed {} headwords", context.name(), index.keys.len());
        Ok(index)
    }

    fn empty(context: &ModuleContext) -> Result<Self> {
        let config = &context.config;
        let greek = config.has_feature(Feature::GreekDef);
        let hebrew = config.has_feature(Feature::HebrewDef);
        let strongs = if greek || hebrew {
            let style = match (greek && hebrew, config.name.eq_ignore_ascii_case(LETTERED_STRONGS_MODULE)) {
                (true, true) => StrongsStyle::PrefixedLettered,
                (true, false) => StrongsStyle::Prefixed,
                (false, _) => StrongsStyle::Padded,
            };
            Some((Regex::new(r"(?i)^([GH])(\d+)((!)?([a-z])?)$")?, style))
        } else {
            None
        };
        Ok(Self { keys: BTreeMap::new(), devotional: config.is_daily_devotional(), strongs })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn entries(&self) -> Vec<IndexKey> {
        self.keys.values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&IndexKey> {
        self.keys.get(name)
    }

    /// Looks a headword up by display name, then by its normalized search form.
    pub fn find(&self, text: &str) -> Option<&IndexKey> {
        if let Some(key) = self.keys.get(text) {
            return Some(key);
        }
        let target = self.search_form(text);
        self.keys
            .values()
            .find(|key| self.search_form(&key.name) == target || self.search_form(&key.internal_name) == target)
    }

    /// Upper-cased form used for lookups. Strong's numbers are padded the way
    /// the module stores them, dropping any `!` or trailing letter, and
    /// devotional dates become `MM.DD`.
    fn search_form(&self, text: &str) -> String {
        let text = text.trim();
        if self.devotional {
            return devotional_internal_name(text).unwrap_or_else(|| text.to_string());
        }
        if let Some((pattern, style)) = &self.strongs {
            if let Some(caps) = pattern.captures(text) {
                let number: u64 = caps[2].parse().unwrap_or(0);
                let padded = match style {
                    StrongsStyle::Prefixed => format!("{}{:04}", &caps[1], number),
                    StrongsStyle::PrefixedLettered => {
                        let letter = caps.get(5).map_or("", |m| m.as_str());
                        format!("{}{:04}{}", &caps[1], number, letter)
                    }
                    StrongsStyle::Padded => format!("{:05}", number),
                };
                return padded.to_uppercase();
            }
        }
        text.to_uppercase()
    }

    /// Reads an entry, following `@LINK` bodies through this index.
    ///
    /// # Errors
    ///
    /// Returns a `ReadFailure` for a link to a missing headword, or for a chain of
    /// links that comes back to an entry already visited.
    pub(crate) fn follow_links<T>(
        &self,
        start: &IndexKey,
        mut read: impl FnMut(&IndexKey) -> Result<EntryBody<T>>,
    ) -> Result<T> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut chain: Vec<String> = Vec::new();
        let mut current = start.clone();
        loop {
            if !visited.insert(current.name.clone()) {
                chain.push(current.name.clone());
                return Err(ModuleError::read_failure(
                    &start.name,
                    format!("cyclic link: {}", chain.join(" -> ")),
                ));
            }
            chain.push(current.name.clone());

            match read(&current)? {
                EntryBody::Content(content) => return Ok(content),
                EntryBody::Link(target) => {
                    let next = self.find(&target).ok_or_else(|| {
                        ModuleError::read_failure(&start.name, format!("can't resolve link target: {}", target))
                    })?;
                    debug!("{} links to {}", current.name, next.name);
                    current = next.clone();
                }
            }
        }
    }
}

/// Trims the headword and drops a trailing backslash.
fn clean_headword(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix('\\').unwrap_or(trimmed).trim_end().to_string()
}

/// `MM.DD` as a medium date in `year`. Out-of-range days roll into the next month.
pub fn devotional_display_name(internal: &str, year: i32) -> Option<String> {
    let (month, day) = internal.split_once('.')?;
    let month: u32 = month.trim().parse().ok()?;
    let day: u64 = day.trim().parse().ok()?;
    if day == 0 {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_days(Days::new(day - 1))?;
    Some(date.format(DEVOTIONAL_FORMAT).to_string())
}

/// Inverse of [`devotional_display_name`]; also accepts `MM.DD` itself.
pub fn devotional_internal_name(text: &str) -> Option<String> {
    if let Ok(date) = NaiveDate::parse_from_str(text, DEVOTIONAL_FORMAT) {
        return Some(format!("{:02}.{:02}", date.month(), date.day()));
    }
    let (month, day) = text.split_once('.')?;
    let month: u32 = month.trim().parse().ok()?;
    let day: u32 = day.trim().parse().ok()?;
    Some(format!("{:02}.{:02}", month, day))
}
