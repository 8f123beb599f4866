use crate::sync::domain::{Entry, OrderKey, Placement, SectionKey, SectionedStore};
use crate::sync::engine::state::EngineState;
use crate::sync::engine::types::{EditOp, EditScript, SyncCommand};
use crate::sync::error::SyncError;
use crate::sync::types::{Record, RecordId};

pub fn on_loaded(state: &mut EngineState, records: Vec<Record>) -> Result<Vec<SyncCommand>, SyncError> {
    let kind = state.store.kind();
    log::info!("[ENGINE] loading {} {} records", records.len(), kind);

    // Build aside so a rejected set leaves the current list alone
    let (store, defects) = SectionedStore::build(kind, records)?;

    state.section_by_id = store
        .sections()
        .iter()
        .flat_map(|s| s.entries().iter().map(move |e| (e.key.id.clone(), s.key().clone())))
        .collect();
    state.malformed = defects.into_iter().map(|d| d.id).collect();
    state.store = store;
    state.loaded = true;

    if !state.malformed.is_empty() {
        log::warn!(
            "[ENGINE] {} {} records filed under sentinel keys",
            state.malformed.len(),
            kind
        );
    }

    Ok(vec![SyncCommand::Rebuild {
        kind,
        sections: state.store.snapshot(),
    }])
}

pub fn on_added(state: &mut EngineState, record: Record) -> Result<Vec<SyncCommand>, SyncError> {
    let kind = state.store.kind();
    check_kind(state, &record)?;
    if state.section_by_id.contains_key(&record.id) {
        return Err(SyncError::DuplicateRecord { id: record.id });
    }

    let id = record.id.clone();
    let entry = derive_entry(state, record);
    log::debug!("[ENGINE] add {} into {}", id, entry.key.section);

    let mut script = EditScript::new(kind);
    insert_phase(state, entry, &mut script);

    Ok(vec![
        SyncCommand::Apply(script),
        SyncCommand::Reselect { kind, id },
    ])
}

pub fn on_updated(
    state: &mut EngineState,
    record: Record,
    previous_section: Option<SectionKey>,
) -> Result<Vec<SyncCommand>, SyncError> {
    let kind = state.store.kind();
    check_kind(state, &record)?;

    let id = record.id.clone();

    // Locate before touching anything: a failed lookup must not mutate
    let old_section = match previous_section {
        Some(hint) => Some(resolve_hint(state, &id, hint)?),
        None => state.section_by_id.get(&id).cloned(),
    };

    let entry = derive_entry(state, record);
    let new_section = entry.key.section.clone();
    let mut script = EditScript::new(kind);

    match old_section {
        Some(old) if old == new_section => {
            let (from, to) = state.store.refile(entry)?;
            if from != to {
                log::debug!("[ENGINE] move {} in {}: {} -> {}", id, old, from, to);
                script.push(EditOp::MoveRecord {
                    id: id.clone(),
                    section: old,
                    from,
                    to,
                });
            }
        }
        Some(old) => {
            log::debug!("[ENGINE] update {}: {} -> {}", id, old, new_section);
            delete_phase(state, &id, &old, &mut script)?;
            insert_phase(state, entry, &mut script);
        }
        None => {
            log::debug!("[ENGINE] update of unlisted {}, inserting", id);
            insert_phase(state, entry, &mut script);
        }
    }

    script.push(EditOp::ReloadRecord { id: id.clone() });

    Ok(vec![
        SyncCommand::Apply(script),
        SyncCommand::Reselect { kind, id },
    ])
}

pub fn on_deleted(
    state: &mut EngineState,
    id: RecordId,
    section: Option<SectionKey>,
) -> Result<Vec<SyncCommand>, SyncError> {
    let kind = state.store.kind();

    let section = match section {
        Some(hint) => resolve_hint(state, &id, hint)?,
        None => state
            .section_by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownRecord { id: id.clone() })?,
    };

    log::debug!("[ENGINE] delete {} from {}", id, section);

    let mut script = EditScript::new(kind);
    delete_phase(state, &id, &section, &mut script)?;
    state.malformed.remove(&id);

    Ok(vec![
        SyncCommand::Apply(script),
        SyncCommand::ClearDetail { kind, id },
    ])
}

// ================================
// Phases
// ================================

fn delete_phase(
    state: &mut EngineState,
    id: &str,
    section: &SectionKey,
    script: &mut EditScript,
) -> Result<(), SyncError> {
    let removal = state.store.delete(id, section)?;
    state.section_by_id.remove(id);

    script.push(EditOp::DeleteRecord {
        id: id.to_string(),
        section: section.clone(),
    });
    if removal.removed_section {
        script.push(EditOp::DeleteSection {
            section: section.clone(),
        });
    }
    Ok(())
}

fn insert_phase(state: &mut EngineState, entry: Entry, script: &mut EditScript) {
    let id = entry.key.id.clone();
    let section = entry.key.section.clone();

    let placement = state.store.insert_entry(entry);
    state.section_by_id.insert(id.clone(), section.clone());

    if placement.created_section {
        script.push(section_insert_op(&state.store, &section, placement));
    }
    script.push(EditOp::InsertRecord {
        id,
        section,
        index: placement.row,
    });
}

/// Positions a freshly created section relative to its neighbours.
fn section_insert_op(store: &SectionedStore, section: &SectionKey, placement: Placement) -> EditOp {
    let keys = store.sections();
    let si = placement.section_index;

    if keys.len() == 1 {
        EditOp::AppendSection {
            section: section.clone(),
        }
    } else if si == 0 {
        EditOp::InsertSectionBefore {
            section: section.clone(),
            before: keys[1].key().clone(),
        }
    } else {
        EditOp::InsertSectionAfter {
            section: section.clone(),
            after: keys[si - 1].key().clone(),
        }
    }
}

// ================================
// Helpers
// ================================

/// Confirms the record is filed under `hint`.
///
/// With `fallback_scan` a wrong hint is corrected from the id index;
/// otherwise it is reported as `StaleSection`.
fn resolve_hint(state: &EngineState, id: &str, hint: SectionKey) -> Result<SectionKey, SyncError> {
    if state.store.row_in(id, &hint).is_some() {
        return Ok(hint);
    }

    if state.config.fallback_scan {
        if let Some(actual) = state.section_by_id.get(id) {
            log::warn!(
                "[ENGINE] stale section hint for {}: {} (found in {})",
                id,
                hint,
                actual
            );
            return Ok(actual.clone());
        }
    }

    log::error!("[ENGINE] record {} not found in section {}", id, hint);
    Err(SyncError::StaleSection {
        id: id.to_string(),
        section: hint,
    })
}

fn check_kind(state: &EngineState, record: &Record) -> Result<(), SyncError> {
    let expected = state.store.kind();
    if record.kind != expected {
        return Err(SyncError::KindMismatch {
            id: record.id.clone(),
            expected,
            found: record.kind,
        });
    }
    Ok(())
}

fn derive_entry(state: &mut EngineState, record: Record) -> Entry {
    let derived = OrderKey::derive(&record);
    if derived.is_clean() {
        state.malformed.remove(&record.id);
    } else {
        state.malformed.insert(record.id.clone());
    }
    Entry {
        key: derived.key,
        record,
    }
}
