//! List reconciliation engine.
//!
//! This module is the **Functional Core** of list synchronization.
//! It acts as a pure state machine:
//! - **Input**: `SyncEvent` (an acknowledged change from the data service).
//! - **Output**: `Vec<SyncCommand>` (view updates for the presentation layer).
//!
//! # Guarantees
//! * **No IO**: The engine never talks to the data service or the UI.
//! * **Single owner**: One engine per record kind, mutated only by the thread that owns it.
//! * **All or nothing**: A failed reconciliation returns an error and leaves the list untouched.
//! * **Minimal edits**: An update that keeps its section only reloads (and, if needed, moves) one row.

pub mod state;
mod logic;
pub mod types;

#[cfg(test)]
mod tests;

pub use crate::sync::engine::state::EngineConfig;
pub use crate::sync::engine::types::{EditOp, EditScript, SyncCommand, SyncEvent};

use std::collections::{BTreeSet, HashMap};

use crate::sync::domain::{SectionKey, SectionedStore};
use crate::sync::error::SyncError;
use crate::sync::types::{Record, RecordId, RecordKind};

use state::EngineState;

/// Keeps one kind's list sorted and describes every change as an edit script.
#[derive(Debug)]
pub struct ListSyncEngine {
    state: EngineState,
}

impl ListSyncEngine {
    /// Creates an empty, not yet loaded engine for one record kind.
    ///
    /// # Arguments
    /// * `kind` - The record kind this engine lists; records of any other kind are rejected.
    pub fn new(kind: RecordKind) -> Self {
        Self::with_config(kind, EngineConfig::default())
    }

    /// Same as [`ListSyncEngine::new`] with explicit reconciliation settings.
    ///
    /// # Arguments
    /// * `kind` - The record kind this engine lists.
    /// * `config` - Controls how a wrong previous-section hint is handled.
    pub fn with_config(kind: RecordKind, config: EngineConfig) -> Self {
        Self {
            state: EngineState {
                store: SectionedStore::new(kind),
                section_by_id: HashMap::new(),
                malformed: BTreeSet::new(),
                config,
                loaded: false,
            },
        }
    }

    /// The main event handler.
    ///
    /// Consumes an acknowledged change and returns the commands the
    /// presentation layer must execute, in order.
    /// On error nothing has been mutated and no command should be executed.
    pub fn handle_event(&mut self, event: SyncEvent) -> Result<Vec<SyncCommand>, SyncError> {
        match event {
            SyncEvent::Loaded(records) => logic::on_loaded(&mut self.state, records),
            SyncEvent::Added(record) => logic::on_added(&mut self.state, record),
            SyncEvent::Updated {
                record,
                previous_section,
            } => logic::on_updated(&mut self.state, record, previous_section),
            SyncEvent::Deleted { id, section } => logic::on_deleted(&mut self.state, id, section),
        }
    }

    /// The record kind this engine lists.
    pub fn kind(&self) -> RecordKind {
        self.state.store.kind()
    }

    /// Read-only view of the sectioned list, for rendering.
    pub fn store(&self) -> &SectionedStore {
        &self.state.store
    }

    /// Current fields of a listed record.
    pub fn record(&self, id: &str) -> Option<&Record> {
        self.state.store.get(id)
    }

    /// Section the record is currently listed under.
    pub fn section_of(&self, id: &str) -> Option<&SectionKey> {
        self.state.section_by_id.get(id)
    }

    /// Records that were filed under sentinel keys because of missing or
    /// unparseable fields.
    pub fn malformed_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.state.malformed.iter()
    }

    /// True once the initial fetch has been partitioned.
    pub fn is_loaded(&self) -> bool {
        self.state.loaded
    }

    pub fn config(&self) -> EngineConfig {
        self.state.config
    }
}
