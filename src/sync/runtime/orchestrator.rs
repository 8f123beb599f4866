use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::sync::domain::SectionedStore;
use crate::sync::engine::{EngineConfig, ListSyncEngine, SyncCommand, SyncEvent};
use crate::sync::error::SyncError;
use crate::sync::runtime::presenter::Presenter;
use crate::sync::service::{Completion, DataService, RequestId, ServiceReply};
use crate::sync::types::{Record, RecordId, RecordKind};

/// What an in-flight request will reconcile once acknowledged.
#[derive(Debug, Clone)]
enum PendingOp {
    Fetch,
    Add,
    Update,
    Delete,
}

/// **ListOrchestrator**
///
/// The imperative shell around the list engines. It:
/// 1. **Issues requests** to the data service (remote first, never optimistic).
/// 2. **Drains completions** on the thread that owns it, in arrival order.
/// 3. **Drives the engines** (one per kind) and executes their commands on the presenter.
///
/// Nothing here is shared across threads; a service that completes work on
/// another thread hands results over through `poll_completion`.
pub struct ListOrchestrator<S, P> {
    engines: BTreeMap<RecordKind, ListSyncEngine>,
    service: S,
    presenter: P,

    /// Requests sent but not yet acknowledged.
    pending: HashMap<RequestId, PendingOp>,

    /// Optional callback fired once the first full load has been rendered.
    on_initial_load: Option<Box<dyn FnOnce() + Send>>,

    t0: Instant,
}

impl<S, P> ListOrchestrator<S, P>
where
    S: DataService,
    P: Presenter,
{
    /// Creates an orchestrator with one empty engine per record kind.
    ///
    /// # Arguments
    /// * `service` - The data service every edit goes through first.
    /// * `presenter` - Receives rebuilds, edit scripts and alerts.
    /// * `config` - Reconciliation settings shared by all engines.
    pub fn new(service: S, presenter: P, config: EngineConfig) -> Self {
        let engines = RecordKind::ALL
            .into_iter()
            .map(|kind| (kind, ListSyncEngine::with_config(kind, config)))
            .collect();

        Self {
            engines,
            service,
            presenter,
            pending: HashMap::new(),
            on_initial_load: None,
            t0: Instant::now(),
        }
    }

    /// Register a callback to be called once the initial fetch is rendered.
    pub fn with_initial_load_notifier<F: FnOnce() + Send + 'static>(mut self, f: F) -> Self {
        self.on_initial_load = Some(Box::new(f));
        self
    }

    // ================================
    // Requests
    // ================================

    /// Requests the full record set; every list is rebuilt on arrival.
    pub fn bootstrap(&mut self) -> RequestId {
        self.info("fetching all records");
        let id = self.service.request_fetch();
        self.pending.insert(id, PendingOp::Fetch);
        id
    }

    /// Writes a new record. The list changes only once the write is acknowledged.
    pub fn add(&mut self, record: Record) -> RequestId {
        self.debug(&format!("add {} {}", record.kind, record.id));
        let id = self.service.request_write(record);
        self.pending.insert(id, PendingOp::Add);
        id
    }

    /// Writes changed fields of a listed record.
    ///
    /// The previous section is read from the engine when the acknowledgment
    /// arrives, so the last acknowledged write wins.
    pub fn update(&mut self, record: Record) -> RequestId {
        self.debug(&format!("update {} {}", record.kind, record.id));
        let id = self.service.request_write(record);
        self.pending.insert(id, PendingOp::Update);
        id
    }

    /// Deletes a record remotely, then removes its row and clears its detail view.
    pub fn delete(&mut self, kind: RecordKind, record_id: RecordId) -> RequestId {
        self.debug(&format!("delete {} {}", kind, record_id));
        let id = self.service.request_delete(kind, record_id);
        self.pending.insert(id, PendingOp::Delete);
        id
    }

    // ================================
    // Completion loop
    // ================================

    /// Handles every completion currently queued. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(completion) = self.service.poll_completion() {
            self.handle_completion(completion);
            handled += 1;
        }
        handled
    }

    /// Processes completions until nothing is in flight.
    ///
    /// Without a timeout this waits as long as the service takes.
    pub fn run_until_settled(&mut self, timeout: Option<Duration>) -> Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);

        while !self.pending.is_empty() {
            if self.process_pending() == 0 {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    bail!(
                        "timed out with {} request(s) in flight",
                        self.pending.len()
                    );
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        Ok(())
    }

    fn handle_completion(&mut self, completion: Completion) {
        let Completion { request, outcome } = completion;

        let Some(op) = self.pending.remove(&request) else {
            log::warn!("[ORCH] completion for unknown request {:?}", request);
            return;
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("[ORCH] {:?} {:?} failed: {}", op, request, e);
                let (title, message) = e.user_message();
                self.presenter.show_error(title, &message);
                return;
            }
        };

        match (op, reply) {
            (PendingOp::Fetch, ServiceReply::Fetched(groups)) => {
                for (kind, records) in groups {
                    self.dispatch(kind, SyncEvent::Loaded(records));
                }
                if let Some(cb) = self.on_initial_load.take() {
                    self.info("initial load finished");
                    cb();
                }
            }

            (PendingOp::Add, ServiceReply::Written(record)) => {
                self.dispatch(record.kind, SyncEvent::Added(record));
            }

            (PendingOp::Update, ServiceReply::Written(record)) => {
                // The list's own view of where the record sits, read at ack time
                let previous_section = self
                    .engines
                    .get(&record.kind)
                    .and_then(|e| e.section_of(&record.id))
                    .cloned();
                self.dispatch(
                    record.kind,
                    SyncEvent::Updated {
                        record,
                        previous_section,
                    },
                );
            }

            (PendingOp::Delete, ServiceReply::Deleted { kind, id }) => {
                let section = self
                    .engines
                    .get(&kind)
                    .and_then(|e| e.section_of(&id))
                    .cloned();
                self.dispatch(kind, SyncEvent::Deleted { id, section });
            }

            (op, reply) => {
                log::error!("[ORCH] reply {:?} does not match {:?}", reply, op);
            }
        }
    }

    /// Feeds an event into one kind's engine and executes the resulting commands.
    fn dispatch(&mut self, kind: RecordKind, event: SyncEvent) {
        self.trace(&format!("engine[{}].handle_event({:?})", kind, event));

        let Some(engine) = self.engines.get_mut(&kind) else {
            log::error!("[ORCH] no engine for {}", kind);
            return;
        };

        match engine.handle_event(event) {
            Ok(cmds) => {
                for cmd in cmds {
                    execute_command(&mut self.presenter, engine.store(), cmd);
                }
            }
            Err(e) => report(&mut self.presenter, &e),
        }
    }

    // ================================
    // Accessors
    // ================================

    pub fn engine(&self, kind: RecordKind) -> Option<&ListSyncEngine> {
        self.engines.get(&kind)
    }

    pub fn store(&self, kind: RecordKind) -> Option<&SectionedStore> {
        self.engines.get(&kind).map(ListSyncEngine::store)
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// Requests sent but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn t(&self) -> u128 {
        self.t0.elapsed().as_micros()
    }

    fn info(&self, msg: &str) {
        log::info!("[ORCH] {:>8}us: {}", self.t(), msg);
    }

    fn debug(&self, msg: &str) {
        log::debug!("[ORCH] {:>8}us: {}", self.t(), msg);
    }

    fn trace(&self, msg: &str) {
        log::trace!("[ORCH] {:>8}us: {}", self.t(), msg);
    }
}

fn execute_command<P: Presenter>(presenter: &mut P, store: &SectionedStore, cmd: SyncCommand) {
    match cmd {
        SyncCommand::Rebuild { .. } => presenter.rebuild(store),
        SyncCommand::Apply(script) => presenter.apply(&script, store),
        SyncCommand::Reselect { kind, id } => presenter.reselect(kind, &id),
        SyncCommand::ClearDetail { kind, id } => presenter.clear_detail(kind, &id),
    }
}

/// A failed reconciliation leaves the rendered list as it was.
fn report<P: Presenter>(presenter: &mut P, error: &SyncError) {
    log::error!("[ORCH] reconciliation failed: {}", error);
    let (title, message) = error.user_message();
    presenter.show_error(title, &message);
}

// Helper methods for testing interaction
#[cfg(test)]
impl<S, P> ListOrchestrator<S, P> {
    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }
}
