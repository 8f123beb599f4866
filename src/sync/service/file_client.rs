//! Document-file data service (async implementation).
//!
//! Implements `DataService` with a Tokio background task that owns the JSON
//! document. The orchestrator side is a non-blocking facade.
//!
//! # Architecture
//! * **Request channel**: The facade sends requests over an unbounded channel.
//! * **Ready queue**: The task pushes completions into `Arc<Mutex<VecDeque<_>>>`;
//!   the owning thread drains it with `poll_completion`, so list state is never
//!   touched from the background thread.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::persistence::Document;
use crate::sync::error::ServiceError;
use crate::sync::service::api::{Completion, DataService, RequestId, ServiceReply};
use crate::sync::types::{Record, RecordId, RecordKind};

// =====================================================================
// Types
// =====================================================================

#[derive(Debug)]
enum FileRequest {
    Fetch,
    Write(Record),
    Delete { kind: RecordKind, id: RecordId },
}

type ReadyQueue = Arc<Mutex<VecDeque<Completion>>>;

fn lock(queue: &ReadyQueue) -> MutexGuard<'_, VecDeque<Completion>> {
    // A panicked writer cannot leave a half-pushed completion behind
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =====================================================================
// Public Client (non-blocking facade)
// =====================================================================

pub struct FileDataService {
    requests: mpsc::UnboundedSender<(RequestId, FileRequest)>,
    ready: ReadyQueue,
    next_id: u64,
}

impl FileDataService {
    /// Starts the background task for the document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let ready: ReadyQueue = Arc::new(Mutex::new(VecDeque::new()));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building data service runtime")?;

        let bg_ready = ready.clone();
        std::thread::Builder::new()
            .name("sees-data-service".into())
            .spawn(move || {
                runtime.block_on(FileTask::new(path, bg_ready).run(rx));
            })
            .context("spawning data service thread")?;

        Ok(Self {
            requests: tx,
            ready,
            next_id: 1,
        })
    }

    fn submit(&mut self, request: FileRequest) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;

        log::debug!("[FILE] submit {:?} {:?}", id, request);
        if self.requests.send((id, request)).is_err() {
            log::error!("[FILE] background task is gone");
            lock(&self.ready).push_back(Completion {
                request: id,
                outcome: Err(ServiceError::Disconnected),
            });
        }
        id
    }
}

impl DataService for FileDataService {
    fn request_fetch(&mut self) -> RequestId {
        self.submit(FileRequest::Fetch)
    }

    fn request_write(&mut self, record: Record) -> RequestId {
        self.submit(FileRequest::Write(record))
    }

    fn request_delete(&mut self, kind: RecordKind, id: RecordId) -> RequestId {
        self.submit(FileRequest::Delete { kind, id })
    }

    fn poll_completion(&mut self) -> Option<Completion> {
        lock(&self.ready).pop_front()
    }
}

// =====================================================================
// Async Task
// =====================================================================

struct FileTask {
    path: PathBuf,
    ready: ReadyQueue,
    document: Option<Document>,
}

impl FileTask {
    fn new(path: PathBuf, ready: ReadyQueue) -> Self {
        Self {
            path,
            ready,
            document: None,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<(RequestId, FileRequest)>) {
        log::info!("[FILE] serving {}", self.path.display());

        while let Some((request, req)) = rx.recv().await {
            let outcome = self.handle(req).await;
            if let Err(e) = &outcome {
                log::warn!("[FILE] {:?} failed: {}", request, e);
            }
            lock(&self.ready).push_back(Completion { request, outcome });
        }

        log::info!("[FILE] request channel closed, stopping");
    }

    async fn handle(&mut self, req: FileRequest) -> Result<ServiceReply, ServiceError> {
        match req {
            FileRequest::Fetch => {
                // Always re-read so edits made outside the app are picked up
                self.document = None;
                let doc = self
                    .document()
                    .await
                    .map_err(|e| ServiceError::Fetch(format!("{e:#}")))?;

                let grouped = RecordKind::ALL
                    .into_iter()
                    .map(|kind| (kind, doc.records(kind)))
                    .collect();
                Ok(ServiceReply::Fetched(grouped))
            }

            FileRequest::Write(record) => {
                let id = record.id.clone();
                let write_err = |e: anyhow::Error| ServiceError::Write {
                    id: id.clone(),
                    reason: format!("{e:#}"),
                };

                let mut staged = self.document().await.map_err(write_err)?.clone();
                staged.upsert(&record);
                self.commit(staged).await.map_err(write_err)?;
                Ok(ServiceReply::Written(record))
            }

            FileRequest::Delete { kind, id } => {
                let delete_err = |reason: String| ServiceError::Delete {
                    id: id.clone(),
                    reason,
                };

                let mut staged = self
                    .document()
                    .await
                    .map_err(|e| delete_err(format!("{e:#}")))?
                    .clone();
                if !staged.remove(kind, &id) {
                    return Err(delete_err("no such record".into()));
                }
                self.commit(staged)
                    .await
                    .map_err(|e| delete_err(format!("{e:#}")))?;
                Ok(ServiceReply::Deleted { kind, id })
            }
        }
    }

    /// Loads the document on first use.
    async fn document(&mut self) -> Result<&mut Document> {
        if self.document.is_none() {
            let doc = match tokio::fs::read_to_string(&self.path).await {
                Ok(text) => Document::from_json(&text)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
                Err(e) => {
                    return Err(e).with_context(|| format!("reading {}", self.path.display()))
                }
            };
            self.document = Some(doc);
        }
        Ok(self.document.get_or_insert_with(Document::default))
    }

    /// Persists `staged` and only then makes it the cached document.
    ///
    /// A failed write leaves both the file and the cache as they were, so a
    /// rejected edit never reaches disk with a later flush.
    async fn commit(&mut self, staged: Document) -> Result<()> {
        self.flush(&staged).await?;
        self.document = Some(staged);
        Ok(())
    }

    /// Writes through a temp file so a crash never leaves a torn document.
    async fn flush(&self, doc: &Document) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, doc.to_json()?)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;

        log::trace!("[FILE] flushed {}", self.path.display());
        Ok(())
    }
}
