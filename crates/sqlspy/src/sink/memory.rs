use super::EventSink;
use super::format::format_event;
use crate::config::SpyConfig;
use crate::error::SinkError;
use crate::event::ExecutionEvent;
use std::sync::Mutex;

/// A sink that keeps events and their formatted lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(ExecutionEvent, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far.
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(e, _)| e.clone())
            .collect()
    }

    /// All formatted lines received so far.
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| l.clone())
            .collect()
    }

    pub fn last_event(&self) -> Option<ExecutionEvent> {
        self.entries.lock().unwrap().last().map(|(e, _)| e.clone())
    }

    pub fn last_line(&self) -> Option<String> {
        self.entries.lock().unwrap().last().map(|(_, l)| l.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &ExecutionEvent, config: &SpyConfig) -> Result<(), SinkError> {
        let line = format_event(event, config)?;
        self.entries.lock().unwrap().push((event.clone(), line));
        Ok(())
    }
}
