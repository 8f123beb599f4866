use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;

use crate::sync::domain::{SectionKey, SectionedStore};
use crate::sync::types::RecordId;

/// Engine tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Resolve a wrong previous-section hint through the id index instead
    /// of failing with `StaleSection`.
    #[serde(default)]
    pub fallback_scan: bool,
}

#[derive(Debug)]
pub struct EngineState {
    pub store: SectionedStore,

    /// record id -> section it is filed under
    pub section_by_id: HashMap<RecordId, SectionKey>,

    /// ids whose order key needed a sentinel
    pub malformed: BTreeSet<RecordId>,

    pub config: EngineConfig,
    pub loaded: bool,
}
