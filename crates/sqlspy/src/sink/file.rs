use super::EventSink;
use super::format::format_event;
use crate::config::SpyConfig;
use crate::error::SinkError;
use crate::event::ExecutionEvent;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A sink appending one formatted event per line to a file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    auto_flush: bool,
}

impl FileSink {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::open_with(path, true)
    }

    /// Open `path`, truncating any existing content.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::open_with(path, false)
    }

    fn open_with(path: impl AsRef<Path>, append: bool) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            auto_flush: true,
        })
    }

    /// Flush after every event (default) or only on [`EventSink::flush`].
    pub fn auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileSink {
    fn publish(&self, event: &ExecutionEvent, config: &SpyConfig) -> Result<(), SinkError> {
        let line = format_event(event, config)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Unavailable(format!("{} writer poisoned", self.path.display())))?;
        writeln!(writer, "{line}")?;
        if self.auto_flush {
            writer.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::Unavailable(format!("{} writer poisoned", self.path.display())))?;
        writer.flush()?;
        Ok(())
    }
}
