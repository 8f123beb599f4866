#![cfg(test)]
use crate::sync::domain::{SectionKey, SectionSnapshot};
use crate::sync::engine::{EditOp, EngineConfig, ListSyncEngine, SyncCommand, SyncEvent};
use crate::sync::error::SyncError;
use crate::sync::types::fields::{contact, event, option, student};
use crate::sync::types::{Record, RecordKind};

// =========================================================================
// Helpers
// =========================================================================

fn student(id: &str, last: &str, first: &str) -> Record {
    Record::with_id(id, RecordKind::Students)
        .field_set(student::LAST_NAME, last)
        .field_set(student::FIRST_NAME, first)
}

fn contact(id: &str, name: &str, order: i64) -> Record {
    Record::with_id(id, RecordKind::Contacts)
        .field_set(contact::NAME, name)
        .field_set(contact::ORDER, order.to_string())
}

fn event(id: &str, name: &str, start: &str) -> Record {
    Record::with_id(id, RecordKind::Events)
        .field_set(event::EVENT_NAME, name)
        .field_set(event::START_DATE, start)
}

fn option(id: &str, major: &str, name: &str) -> Record {
    Record::with_id(id, RecordKind::DegreeOptions)
        .field_set(option::MAJOR_NAME, major)
        .field_set(option::OPTION_NAME, name)
}

fn loaded(kind: RecordKind, records: Vec<Record>) -> ListSyncEngine {
    let mut engine = ListSyncEngine::new(kind);
    engine
        .handle_event(SyncEvent::Loaded(records))
        .expect("initial load");
    engine
}

fn ids_in(engine: &ListSyncEngine, key: &SectionKey) -> Vec<String> {
    engine.store().section(key).map(|s| s.ids()).unwrap_or_default()
}

fn only_script(cmds: &[SyncCommand]) -> &crate::sync::engine::EditScript {
    cmds.iter()
        .find_map(|c| match c {
            SyncCommand::Apply(script) => Some(script),
            _ => None,
        })
        .expect("an Apply command")
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn initial_load_emits_rebuild() {
    let mut engine = ListSyncEngine::new(RecordKind::Students);
    let cmds = engine
        .handle_event(SyncEvent::Loaded(vec![
            student("1", "Smith", "John"),
            student("2", "Zane", "Amy"),
        ]))
        .unwrap();

    assert_eq!(
        cmds,
        vec![SyncCommand::Rebuild {
            kind: RecordKind::Students,
            sections: vec![
                SectionSnapshot {
                    key: SectionKey::Letter('s'),
                    ids: vec!["1".into()]
                },
                SectionSnapshot {
                    key: SectionKey::Letter('z'),
                    ids: vec!["2".into()]
                },
            ],
        }]
    );
    assert!(engine.is_loaded());
}

#[test]
fn contacts_reorder_on_order_change() {
    let contacts = SectionKey::text("contacts");
    let mut engine = loaded(
        RecordKind::Contacts,
        vec![contact("dora", "Dora", 2), contact("alas", "Alas", 1)],
    );
    assert_eq!(ids_in(&engine, &contacts), vec!["alas", "dora"]);

    let cmds = engine
        .handle_event(SyncEvent::Updated {
            record: contact("alas", "Alas", 3),
            previous_section: Some(contacts.clone()),
        })
        .unwrap();

    assert_eq!(ids_in(&engine, &contacts), vec!["dora", "alas"]);

    let script = only_script(&cmds);
    assert_eq!(script.structural_count(), 0, "no section churn");
    assert_eq!(
        script.ops,
        vec![
            EditOp::MoveRecord {
                id: "alas".into(),
                section: contacts,
                from: 0,
                to: 1
            },
            EditOp::ReloadRecord { id: "alas".into() },
        ]
    );
}

#[test]
fn unchanged_section_only_reloads() {
    let mut engine = loaded(
        RecordKind::Students,
        vec![student("1", "Smith", "John"), student("2", "Stone", "Bea")],
    );

    // email edit does not affect ordering
    let record = student("1", "Smith", "John").field_set(student::EMAIL, "js@example.edu");
    let cmds = engine
        .handle_event(SyncEvent::Updated {
            record,
            previous_section: Some(SectionKey::Letter('s')),
        })
        .unwrap();

    let script = only_script(&cmds);
    assert_eq!(script.reload_count(), 1);
    assert_eq!(script.structural_count(), 0);
    assert_eq!(script.ops, vec![EditOp::ReloadRecord { id: "1".into() }]);
    assert_eq!(
        engine.record("1").and_then(|r| r.field(student::EMAIL)),
        Some("js@example.edu")
    );
    assert!(cmds.contains(&SyncCommand::Reselect {
        kind: RecordKind::Students,
        id: "1".into()
    }));
}

#[test]
fn add_into_existing_section_keeps_neighbours() {
    let mut engine = loaded(
        RecordKind::Students,
        vec![student("john", "Smith", "John"), student("amy", "Zane", "Amy")],
    );

    let cmds = engine
        .handle_event(SyncEvent::Added(student("amanda", "Smith", "Amanda")))
        .unwrap();

    assert_eq!(ids_in(&engine, &SectionKey::Letter('s')), vec!["amanda", "john"]);
    assert_eq!(ids_in(&engine, &SectionKey::Letter('z')), vec!["amy"]);
    assert_eq!(
        only_script(&cmds).ops,
        vec![EditOp::InsertRecord {
            id: "amanda".into(),
            section: SectionKey::Letter('s'),
            index: 0
        }]
    );
}

#[test]
fn section_change_moves_record_and_prunes() {
    let mut engine = loaded(
        RecordKind::Students,
        vec![student("1", "Adams", "Lee"), student("2", "Zane", "Amy")],
    );

    // Lee marries and becomes "Miller"
    let cmds = engine
        .handle_event(SyncEvent::Updated {
            record: student("1", "Miller", "Lee"),
            previous_section: Some(SectionKey::Letter('a')),
        })
        .unwrap();

    assert_eq!(
        only_script(&cmds).ops,
        vec![
            EditOp::DeleteRecord {
                id: "1".into(),
                section: SectionKey::Letter('a')
            },
            EditOp::DeleteSection {
                section: SectionKey::Letter('a')
            },
            EditOp::InsertSectionBefore {
                section: SectionKey::Letter('m'),
                before: SectionKey::Letter('z')
            },
            EditOp::InsertRecord {
                id: "1".into(),
                section: SectionKey::Letter('m'),
                index: 0
            },
            EditOp::ReloadRecord { id: "1".into() },
        ]
    );
    assert_eq!(
        engine.store().section_keys(),
        vec![SectionKey::Letter('m'), SectionKey::Letter('z')]
    );
    assert_eq!(engine.section_of("1"), Some(&SectionKey::Letter('m')));
    assert!(engine.store().is_consistent());
}

#[test]
fn new_section_after_last() {
    let mut engine = loaded(RecordKind::Students, vec![student("1", "Adams", "Lee")]);

    let cmds = engine
        .handle_event(SyncEvent::Added(student("2", "Young", "Kim")))
        .unwrap();

    assert_eq!(
        only_script(&cmds).ops[0],
        EditOp::InsertSectionAfter {
            section: SectionKey::Letter('y'),
            after: SectionKey::Letter('a')
        }
    );
}

#[test]
fn first_record_appends_section() {
    let mut engine = loaded(RecordKind::Events, vec![]);

    let cmds = engine
        .handle_event(SyncEvent::Added(event("e1", "Orientation", "2023-08-20 09:00")))
        .unwrap();

    assert_eq!(
        only_script(&cmds).ops[0],
        EditOp::AppendSection {
            section: SectionKey::month(2023, 8)
        }
    );
}

#[test]
fn event_sections_are_chronological() {
    let engine = loaded(
        RecordKind::Events,
        vec![
            event("a", "Fair", "2023-01-10 10:00"),
            event("b", "Mixer", "2022-03-02 18:00"),
            event("c", "Talk", "2023-02-01 12:00"),
        ],
    );

    let labels: Vec<_> = engine
        .store()
        .section_keys()
        .iter()
        .map(SectionKey::label)
        .collect();
    assert_eq!(labels, vec!["March 2022", "January 2023", "February 2023"]);
}

#[test]
fn stale_hint_leaves_store_untouched() {
    let mut engine = loaded(
        RecordKind::Students,
        vec![student("1", "Adams", "Lee"), student("2", "Zane", "Amy")],
    );
    let before = engine.store().snapshot();

    let err = engine
        .handle_event(SyncEvent::Updated {
            record: student("1", "Miller", "Lee"),
            previous_section: Some(SectionKey::Letter('q')),
        })
        .unwrap_err();

    assert_eq!(
        err,
        SyncError::StaleSection {
            id: "1".into(),
            section: SectionKey::Letter('q')
        }
    );
    assert_eq!(engine.store().snapshot(), before);
    assert_eq!(
        engine.record("1").map(Record::display_text),
        Some("Adams, Lee".to_string())
    );
}

#[test]
fn fallback_scan_recovers_from_stale_hint() {
    let mut engine = ListSyncEngine::with_config(
        RecordKind::Students,
        EngineConfig {
            fallback_scan: true,
        },
    );
    engine
        .handle_event(SyncEvent::Loaded(vec![student("1", "Adams", "Lee")]))
        .unwrap();

    engine
        .handle_event(SyncEvent::Updated {
            record: student("1", "Miller", "Lee"),
            previous_section: Some(SectionKey::Letter('q')),
        })
        .unwrap();

    assert_eq!(engine.store().section_keys(), vec![SectionKey::Letter('m')]);
}

#[test]
fn delete_clears_detail_and_prunes() {
    let mut engine = loaded(
        RecordKind::Students,
        vec![student("1", "Adams", "Lee"), student("2", "Zane", "Amy")],
    );

    let cmds = engine
        .handle_event(SyncEvent::Deleted {
            id: "2".into(),
            section: None,
        })
        .unwrap();

    assert!(cmds.contains(&SyncCommand::ClearDetail {
        kind: RecordKind::Students,
        id: "2".into()
    }));
    assert_eq!(only_script(&cmds).ops.len(), 2);
    assert_eq!(engine.store().section_keys(), vec![SectionKey::Letter('a')]);
    assert!(engine.record("2").is_none());
}

#[test]
fn delete_unknown_record_is_reported() {
    let mut engine = loaded(RecordKind::Students, vec![student("1", "Adams", "Lee")]);

    let err = engine
        .handle_event(SyncEvent::Deleted {
            id: "nope".into(),
            section: None,
        })
        .unwrap_err();
    assert_eq!(err, SyncError::UnknownRecord { id: "nope".into() });
    assert_eq!(engine.store().len(), 1);
}

#[test]
fn duplicate_add_is_rejected() {
    let mut engine = loaded(RecordKind::Students, vec![student("1", "Adams", "Lee")]);

    let err = engine
        .handle_event(SyncEvent::Added(student("1", "Brown", "Sam")))
        .unwrap_err();
    assert_eq!(err, SyncError::DuplicateRecord { id: "1".into() });
    assert_eq!(engine.store().section_keys(), vec![SectionKey::Letter('a')]);
}

#[test]
fn malformed_records_are_tracked() {
    let mut engine = loaded(
        RecordKind::Contacts,
        vec![
            contact("a", "Alas", 1),
            Record::with_id("b", RecordKind::Contacts).field_set(contact::NAME, "Bo"),
        ],
    );
    let malformed: Vec<_> = engine.malformed_ids().cloned().collect();
    assert_eq!(malformed, vec!["b".to_string()]);

    // sentinel sort key keeps it after the valid contact
    assert_eq!(ids_in(&engine, &SectionKey::text("contacts")), vec!["a", "b"]);

    engine
        .handle_event(SyncEvent::Updated {
            record: contact("b", "Bo", 0),
            previous_section: None,
        })
        .unwrap();
    assert_eq!(engine.malformed_ids().count(), 0);
    assert_eq!(ids_in(&engine, &SectionKey::text("contacts")), vec!["b", "a"]);
}

#[test]
fn wrong_kind_is_rejected() {
    let mut engine = loaded(RecordKind::Contacts, vec![]);
    let err = engine
        .handle_event(SyncEvent::Added(student("1", "Adams", "Lee")))
        .unwrap_err();
    assert!(matches!(err, SyncError::KindMismatch { .. }));
}

#[test]
fn option_moves_to_another_major() {
    let cs = SectionKey::text("Computer Science");
    let math = SectionKey::text("Mathematics");
    let mut engine = loaded(
        RecordKind::DegreeOptions,
        vec![
            option("se", "Computer Science", "Software Engineering"),
            option("ai", "Computer Science", "Artificial Intelligence"),
            option("st", "Mathematics", "Statistics"),
            Record::with_id("un", RecordKind::DegreeOptions)
                .field_set(option::OPTION_NAME, "Undeclared Track"),
        ],
    );
    assert_eq!(
        engine.store().section_keys(),
        vec![cs.clone(), math.clone(), SectionKey::Error]
    );
    assert_eq!(ids_in(&engine, &cs), vec!["ai", "se"]);

    let cmds = engine
        .handle_event(SyncEvent::Updated {
            record: option("ai", "Mathematics", "Artificial Intelligence"),
            previous_section: Some(cs.clone()),
        })
        .unwrap();

    assert_eq!(
        only_script(&cmds).ops,
        vec![
            EditOp::DeleteRecord {
                id: "ai".into(),
                section: cs.clone()
            },
            EditOp::InsertRecord {
                id: "ai".into(),
                section: math.clone(),
                index: 0
            },
            EditOp::ReloadRecord { id: "ai".into() },
        ]
    );
    assert_eq!(ids_in(&engine, &cs), vec!["se"]);
    assert_eq!(ids_in(&engine, &math), vec!["ai", "st"]);
    assert_eq!(engine.malformed_ids().cloned().collect::<Vec<_>>(), vec!["un"]);
}
