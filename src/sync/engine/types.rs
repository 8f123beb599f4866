use crate::sync::domain::{SectionKey, SectionSnapshot};
use crate::sync::types::{Record, RecordId, RecordKind};

/// Inputs to the engine, one per acknowledged data change.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Full record set delivered by the data service.
    Loaded(Vec<Record>),
    /// A new record was created remotely.
    Added(Record),
    /// An existing record was saved. `previous_section` is the section the
    /// caller last saw it in; when present it is authoritative.
    Updated {
        record: Record,
        previous_section: Option<SectionKey>,
    },
    /// A record was deleted remotely.
    Deleted {
        id: RecordId,
        section: Option<SectionKey>,
    },
}

/// Outputs of the engine, executed by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    /// Replace the whole list (initial load).
    Rebuild {
        kind: RecordKind,
        sections: Vec<SectionSnapshot>,
    },
    /// Apply an incremental edit.
    Apply(EditScript),
    /// Re-select the row once the edit settles.
    Reselect { kind: RecordKind, id: RecordId },
    /// Dismiss any detail view showing this record.
    ClearDetail { kind: RecordKind, id: RecordId },
}

/// Primitive list mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    InsertSectionBefore {
        section: SectionKey,
        before: SectionKey,
    },
    InsertSectionAfter {
        section: SectionKey,
        after: SectionKey,
    },
    /// Insert into an otherwise empty list.
    AppendSection {
        section: SectionKey,
    },
    DeleteSection {
        section: SectionKey,
    },
    InsertRecord {
        id: RecordId,
        section: SectionKey,
        index: usize,
    },
    DeleteRecord {
        id: RecordId,
        section: SectionKey,
    },
    /// Reorder inside one section.
    MoveRecord {
        id: RecordId,
        section: SectionKey,
        from: usize,
        to: usize,
    },
    /// Content-only refresh.
    ReloadRecord {
        id: RecordId,
    },
}

impl EditOp {
    /// True for operations that insert or delete sections or rows.
    pub fn is_structural(&self) -> bool {
        !matches!(self, EditOp::ReloadRecord { .. } | EditOp::MoveRecord { .. })
    }
}

/// Ordered edit operations for one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditScript {
    pub kind: RecordKind,
    pub ops: Vec<EditOp>,
}

impl EditScript {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: EditOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of section-level or row insert/delete operations.
    pub fn structural_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_structural()).count()
    }

    /// Number of content-only row refreshes.
    pub fn reload_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, EditOp::ReloadRecord { .. }))
            .count()
    }
}
