//! In-memory sources and sinks for pipeline tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::{StorageError, TransportError};
use crate::models::{Macro, MacroImage};
use crate::sink::Sink;
use crate::source::MacroSource;

/// Serves a fixed listing; bodies are keyed by macro name.
pub struct FakeSource {
    macros: Vec<Macro>,
    bodies: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    fail_listing: bool,
    delay: Option<Duration>,
    pub list_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        let macros = entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| Macro::new(*name, format!("id{}", i + 1)))
            .collect();
        let bodies = entries
            .iter()
            .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
            .collect();
        Self {
            macros,
            bodies,
            failing: HashSet::new(),
            fail_listing: false,
            delay: None,
            list_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MacroSource for FakeSource {
    async fn list_macros(&self) -> Result<Vec<Macro>, TransportError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(TransportError::InvalidResponse("listing unavailable".into()));
        }
        Ok(self.macros.clone())
    }

    async fn fetch_image(&self, entry: &Macro) -> Result<MacroImage, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&entry.name) {
            return Err(TransportError::Api {
                code: "ERR-CONDUIT-CORE".into(),
                info: format!("cannot load {}", entry.remote_id),
            });
        }
        let body = self.bodies.get(&entry.name).cloned().unwrap_or_default();
        Ok(MacroImage::new(entry.clone(), body))
    }
}

/// Keeps persisted images in a shared map so tests can inspect it after the
/// collector has consumed the sink.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub writes: Arc<AtomicUsize>,
    reject: Arc<HashSet<String>>,
    unwritable: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(names: &[&str]) -> Self {
        Self {
            reject: Arc::new(names.iter().map(|n| n.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn unwritable() -> Self {
        Self {
            unwritable: true,
            ..Self::default()
        }
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn probe_writable(&self) -> Result<(), StorageError> {
        if self.unwritable {
            return Err(StorageError::Write {
                path: "memory/test".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(())
    }

    async fn persist(&mut self, image: &MacroImage) -> Result<(), StorageError> {
        if self.reject.contains(image.name()) {
            return Err(StorageError::Write {
                path: format!("memory/{}.gif", image.name()).into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .insert(image.name().to_string(), image.body.clone());
        Ok(())
    }
}

/// Panics on the first write, taking the collector task down with it.
pub struct PanickingSink;

#[async_trait]
impl Sink for PanickingSink {
    async fn probe_writable(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn persist(&mut self, image: &MacroImage) -> Result<(), StorageError> {
        panic!("sink exploded while writing {}", image.name());
    }
}
