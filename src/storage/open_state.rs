//! Lazily opened file handle sets.
//!
//! A backend keeps its open files in an [`OpenState`]. Handles are opened the first
//! time a lookup needs them, dropped (and so closed) on deactivation, and reopened
//! transparently by the next lookup.

use std::fs::{File, OpenOptions};
use std::path::Path;

use log::debug;

use crate::{ModuleError, Result};

#[derive(Debug)]
pub enum OpenState<F> {
    Closed,
    Open(F),
}

impl<F> Default for OpenState<F> {
    fn default() -> Self {
        OpenState::Closed
    }
}

impl<F> OpenState<F> {
    pub fn is_open(&self) -> bool {
        matches!(self, OpenState::Open(_))
    }

    /// Returns the open handle set, opening it first if needed.
    pub fn get_or_open(&mut self, open: impl FnOnce() -> Result<F>) -> Result<&mut F> {
        if matches!(self, OpenState::Closed) {
            *self = OpenState::Open(open()?);
        }
        match self {
            OpenState::Open(files) => Ok(files),
            OpenState::Closed => Err(ModuleError::invalid_data_format("file set failed to open")),
        }
    }

    /// Drops the handle set. Returns whether anything was open.
    pub fn close(&mut self) -> bool {
        matches!(std::mem::take(self), OpenState::Open(_))
    }
}

/// Opens a module file for reading, or for reading and writing.
pub fn open_module_file(path: &Path, writable: bool) -> Result<File> {
    debug!("Opening {} ({})", path.display(), if writable { "rw" } else { "ro" });
    let file = OpenOptions::new().read(true).write(writable).open(path)?;
    Ok(file)
}
