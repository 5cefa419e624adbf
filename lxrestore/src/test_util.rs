//! Test utilities
//!
//! In-memory collaborators used to test the restore pipeline.
//! These are not part of the supported api and are subject to change.
//!
#![doc(hidden)]

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{
    Result,
    error::{RestoreError, ToolError},
    lxc::InstanceManager,
    progress::{ProgressState, TransferProgress},
    status::{StatusRenderer, UiOutcome},
    storage::{ObjectInfo, ObjectReader, ObjectStore},
};

// =============================================================================
// MemoryStore
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Stat(String),
    Open(String),
}

/// Single-bucket object store held in memory. Clones share objects and call log.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    bucket: String,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    reported_sizes: Arc<Mutex<HashMap<String, u64>>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: Arc::default(),
            reported_sizes: Arc::default(),
            calls: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_object(self, key: &str, data: Vec<u8>) -> Self {
        self.objects.lock().insert(key.to_string(), data);
        self
    }

    /// Makes stat report `size` for `key`, regardless of the stored length.
    #[must_use]
    pub fn with_reported_size(self, key: &str, size: u64) -> Self {
        self.reported_sizes.lock().insert(key.to_string(), size);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn size_of(&self, key: &str) -> Option<u64> {
        self.objects.lock().get(key).map(|data| data.len() as u64)
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let data = (bucket == self.bucket)
            .then(|| self.objects.lock().get(key).cloned())
            .flatten();
        data.ok_or_else(|| RestoreError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl ObjectStore for MemoryStore {
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        self.calls.lock().push(StoreCall::Stat(key.to_string()));
        let data = self.lookup(bucket, key)?;
        let size_bytes = self
            .reported_sizes
            .lock()
            .get(key)
            .copied()
            .unwrap_or(data.len() as u64);
        Ok(ObjectInfo { size_bytes })
    }

    async fn open(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        self.calls.lock().push(StoreCall::Open(key.to_string()));
        let data = self.lookup(bucket, key)?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }
}

// =============================================================================
// RecordingManager
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCall {
    Check(String),
    /// Import of `path`; `archive_bytes` is the file size seen at call time, if the file existed.
    Import {
        path: PathBuf,
        archive_bytes: Option<u64>,
    },
    Start(String),
}

/// Instance manager that records calls and fails on request.
#[derive(Debug, Default)]
pub struct RecordingManager {
    calls: Mutex<Vec<ManagerCall>>,
    existing: HashSet<String>,
    import_error: Option<String>,
    start_error: Option<String>,
    consume_archive: bool,
}

impl RecordingManager {
    /// The pre-check fails for `name`.
    #[must_use]
    pub fn existing(mut self, name: &str) -> Self {
        self.existing.insert(name.to_string());
        self
    }

    #[must_use]
    pub fn fail_import(mut self, message: &str) -> Self {
        self.import_error = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn fail_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    /// Import deletes the archive it was given.
    #[must_use]
    pub fn consume_archive(mut self) -> Self {
        self.consume_archive = true;
        self
    }

    pub fn calls(&self) -> Vec<ManagerCall> {
        self.calls.lock().clone()
    }
}

fn external(message: Option<&String>) -> Result<(), ToolError> {
    message.map_or(Ok(()), |message| {
        Err(ToolError::External {
            message: message.clone(),
        })
    })
}

impl InstanceManager for RecordingManager {
    async fn check_instance(&self, name: &str) -> Result<(), ToolError> {
        self.calls.lock().push(ManagerCall::Check(name.to_string()));
        if self.existing.contains(name) {
            return Err(ToolError::InstanceExists {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn import_archive(&self, archive: &Path) -> Result<(), ToolError> {
        let archive_bytes = std::fs::metadata(archive).ok().map(|meta| meta.len());
        self.calls.lock().push(ManagerCall::Import {
            path: archive.to_path_buf(),
            archive_bytes,
        });
        if self.consume_archive {
            let _ = std::fs::remove_file(archive);
        }
        external(self.import_error.as_ref())
    }

    async fn start_instance(&self, name: &str) -> Result<(), ToolError> {
        self.calls.lock().push(ManagerCall::Start(name.to_string()));
        external(self.start_error.as_ref())
    }
}

// =============================================================================
// Renderers
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RenderLog {
    pub started: Vec<String>,
    pub ticks: usize,
    pub stopped: Vec<UiOutcome>,
}

/// Status renderer that records calls. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    log: Arc<Mutex<RenderLog>>,
}

impl RecordingRenderer {
    pub fn log(&self) -> RenderLog {
        self.log.lock().clone()
    }
}

impl StatusRenderer for RecordingRenderer {
    fn start(&mut self, message: &str) {
        self.log.lock().started.push(message.to_string());
    }

    fn tick(&mut self) {
        self.log.lock().ticks += 1;
    }

    fn stop(&mut self, outcome: &UiOutcome) {
        self.log.lock().stopped.push(outcome.clone());
    }
}

/// Transfer progress that records every update.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    pub total: Option<u64>,
    pub updates: Vec<u64>,
    pub finished: Vec<bool>,
}

impl TransferProgress for RecordingProgress {
    fn begin(&mut self, total: u64) {
        self.total = Some(total);
    }

    fn advance(&mut self, state: &ProgressState) {
        self.updates.push(state.transferred());
    }

    fn finish(&mut self, completed: bool) {
        self.finished.push(completed);
    }
}
