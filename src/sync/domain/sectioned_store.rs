// Ordered, section-keyed record storage

use std::collections::HashSet;

use crate::sync::domain::order_key::{OrderKey, SectionKey};
use crate::sync::error::{MissingFieldError, SyncError};
use crate::sync::types::{Record, RecordId, RecordKind};

/// Lower-bound search over an already sorted slice.
///
/// Returns the first index at which `key` can be inserted without breaking
/// the order: every element before it is `< key`, every element at or after
/// it is `>= key`. Equal keys are therefore inserted before the first match.
pub fn insertion_index<T: Ord>(sorted: &[T], key: &T) -> usize {
    insertion_index_by_key(sorted, key, |item| item)
}

/// Same as [`insertion_index`], comparing a projection of each element.
pub fn insertion_index_by_key<T, K, F>(sorted: &[T], key: &K, project: F) -> usize
where
    K: Ord + ?Sized,
    F: Fn(&T) -> &K,
{
    sorted.partition_point(|probe| project(probe) < key)
}

/// A record together with the key it is currently filed under.
#[derive(Debug, Clone)]
pub struct Entry {
    pub key: OrderKey,
    pub record: Record,
}

impl Entry {
    pub fn id(&self) -> &str {
        &self.key.id
    }
}

/// One non-empty, sorted section.
#[derive(Debug, Clone)]
pub struct Section {
    key: SectionKey,
    entries: Vec<Entry>,
}

impl Section {
    /// Key shared by every record in this section.
    pub fn key(&self) -> &SectionKey {
        &self.key
    }

    /// Entries in display order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().map(|e| &e.record)
    }

    /// Record ids in display order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.entries.iter().map(|e| e.key.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row of `id`, found by linear scan.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.key.id == id)
    }
}

/// Plain view of one section, for rendering and comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSnapshot {
    pub key: SectionKey,
    pub ids: Vec<RecordId>,
}

/// Where an insert landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub section_index: usize,
    pub row: usize,
    pub created_section: bool,
}

/// What a delete removed.
#[derive(Debug, Clone)]
pub struct Removal {
    pub section_index: usize,
    pub row: usize,
    pub removed_section: bool,
    pub entry: Entry,
}

/// Records of one kind, partitioned into sorted sections.
///
/// Invariants:
/// - sections are sorted by `SectionKey` and keys are unique
/// - no section is empty
/// - entries inside a section are sorted by `OrderKey`
#[derive(Debug, Clone)]
pub struct SectionedStore {
    kind: RecordKind,
    sections: Vec<Section>,
}

impl SectionedStore {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            sections: Vec::new(),
        }
    }

    /// Partitions a flat, unordered record set.
    ///
    /// Returns the field defects found while deriving keys; those records are
    /// still filed (under sentinel keys).
    pub fn build(
        kind: RecordKind,
        records: Vec<Record>,
    ) -> Result<(Self, Vec<MissingFieldError>), SyncError> {
        let mut seen = HashSet::new();
        let mut defects = Vec::new();
        let mut entries = Vec::with_capacity(records.len());

        for record in records {
            check_kind(kind, &record)?;
            if !seen.insert(record.id.clone()) {
                return Err(SyncError::DuplicateRecord { id: record.id });
            }

            let derived = OrderKey::derive(&record);
            defects.extend(derived.defects);
            entries.push(Entry {
                key: derived.key,
                record,
            });
        }

        // OrderKey sorts by section first, so one pass groups everything
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let mut sections: Vec<Section> = Vec::new();
        for entry in entries {
            if let Some(section) = sections.last_mut().filter(|s| s.key == entry.key.section) {
                section.entries.push(entry);
                continue;
            }
            sections.push(Section {
                key: entry.key.section.clone(),
                entries: vec![entry],
            });
        }

        log::debug!(
            "[STORE] built {} list: {} sections",
            kind,
            sections.len()
        );

        Ok((Self { kind, sections }, defects))
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Sections in display order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Binary search for a section by key.
    pub fn section(&self, key: &SectionKey) -> Option<&Section> {
        self.find_section(key).ok().map(|i| &self.sections[i])
    }

    /// Section keys in display order.
    pub fn section_keys(&self) -> Vec<SectionKey> {
        self.sections.iter().map(|s| s.key.clone()).collect()
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.sections.iter().map(Section::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Looks a record up by id across every section.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.locate(id)
            .map(|(s, r)| &self.sections[s].entries[r].record)
    }

    /// Full scan for a record id; returns (section index, row).
    pub fn locate(&self, id: &str) -> Option<(usize, usize)> {
        self.sections
            .iter()
            .enumerate()
            .find_map(|(si, section)| section.position(id).map(|row| (si, row)))
    }

    /// Row of `id` inside the named section, if it is filed there.
    pub fn row_in(&self, id: &str, key: &SectionKey) -> Option<(usize, usize)> {
        let si = self.find_section(key).ok()?;
        self.sections[si].position(id).map(|row| (si, row))
    }

    /// Derives the record's key and files it.
    pub fn insert(&mut self, record: Record) -> Result<Placement, SyncError> {
        check_kind(self.kind, &record)?;
        let key = OrderKey::derive(&record).key;
        Ok(self.insert_entry(Entry { key, record }))
    }

    /// Files an entry whose key has already been derived.
    ///
    /// A missing section is created at its sorted position.
    pub fn insert_entry(&mut self, entry: Entry) -> Placement {
        match self.find_section(&entry.key.section) {
            Ok(si) => {
                let section = &mut self.sections[si];
                let row = insertion_index_by_key(&section.entries, &entry.key, |e| &e.key);
                section.entries.insert(row, entry);
                Placement {
                    section_index: si,
                    row,
                    created_section: false,
                }
            }
            Err(si) => {
                log::trace!("[STORE] new section {} at {}", entry.key.section, si);
                self.sections.insert(
                    si,
                    Section {
                        key: entry.key.section.clone(),
                        entries: vec![entry],
                    },
                );
                Placement {
                    section_index: si,
                    row: 0,
                    created_section: true,
                }
            }
        }
    }

    /// Removes `id` from the named section, dropping the section if it
    /// becomes empty.
    ///
    /// Fails with `StaleSection` if the record is not filed there; the store
    /// is unchanged in that case.
    pub fn delete(&mut self, id: &str, section: &SectionKey) -> Result<Removal, SyncError> {
        let (si, row) = self.row_in(id, section).ok_or_else(|| SyncError::StaleSection {
            id: id.to_string(),
            section: section.clone(),
        })?;

        let entry = self.sections[si].entries.remove(row);
        let removed_section = self.sections[si].is_empty();
        if removed_section {
            log::trace!("[STORE] section {} emptied, removing", section);
            self.sections.remove(si);
        }

        Ok(Removal {
            section_index: si,
            row,
            removed_section,
            entry,
        })
    }

    /// Replaces a record in place within its section, moving it to the row
    /// its (possibly changed) sort key dictates. Returns `(from, to)` rows.
    ///
    /// The section is never emptied, so no section churn happens here.
    pub fn refile(&mut self, entry: Entry) -> Result<(usize, usize), SyncError> {
        let section = entry.key.section.clone();
        let (si, from) = self
            .row_in(entry.id(), &section)
            .ok_or_else(|| SyncError::StaleSection {
                id: entry.key.id.clone(),
                section,
            })?;

        let entries = &mut self.sections[si].entries;
        entries.remove(from);
        let to = insertion_index_by_key(&entries[..], &entry.key, |e| &e.key);
        entries.insert(to, entry);

        Ok((from, to))
    }

    /// Copies the current arrangement as plain section/id lists.
    pub fn snapshot(&self) -> Vec<SectionSnapshot> {
        self.sections
            .iter()
            .map(|s| SectionSnapshot {
                key: s.key.clone(),
                ids: s.ids(),
            })
            .collect()
    }

    /// Checks the ordering invariants; used by tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        let sections_sorted = self.sections.windows(2).all(|w| w[0].key < w[1].key);
        let sections_valid = self.sections.iter().all(|s| {
            !s.is_empty()
                && s.entries.iter().all(|e| e.key.section == s.key)
                && s.entries.windows(2).all(|w| w[0].key < w[1].key)
        });
        sections_sorted && sections_valid
    }

    fn find_section(&self, key: &SectionKey) -> Result<usize, usize> {
        self.sections.binary_search_by(|s| s.key.cmp(key))
    }
}

fn check_kind(expected: RecordKind, record: &Record) -> Result<(), SyncError> {
    if record.kind == expected {
        Ok(())
    } else {
        Err(SyncError::KindMismatch {
            id: record.id.clone(),
            expected,
            found: record.kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::types::fields::student::{FIRST_NAME, LAST_NAME};

    fn student(id: &str, last: &str, first: &str) -> Record {
        Record::with_id(id, RecordKind::Students)
            .field_set(LAST_NAME, last)
            .field_set(FIRST_NAME, first)
    }

    #[test]
    fn insertion_index_is_lower_bound() {
        let empty: [i32; 0] = [];
        assert_eq!(insertion_index(&empty, &5), 0);

        let v = [1, 3, 3, 3, 7];
        assert_eq!(insertion_index(&v, &0), 0);
        assert_eq!(insertion_index(&v, &3), 1, "equal keys go before the first match");
        assert_eq!(insertion_index(&v, &4), 4);
        assert_eq!(insertion_index(&v, &9), 5);

        for k in 0..10 {
            let i = insertion_index(&v, &k);
            assert!(v[..i].iter().all(|x| *x < k));
            assert!(v[i..].iter().all(|x| *x >= k));
        }
    }

    #[test]
    fn build_partitions_and_sorts() {
        let (store, defects) = SectionedStore::build(
            RecordKind::Students,
            vec![
                student("3", "Zane", "Amy"),
                student("1", "Smith", "John"),
                student("2", "Adams", "Lee"),
            ],
        )
        .unwrap();

        assert!(defects.is_empty());
        assert!(store.is_consistent());
        assert_eq!(
            store.section_keys(),
            vec![
                SectionKey::Letter('a'),
                SectionKey::Letter('s'),
                SectionKey::Letter('z')
            ]
        );
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn build_rejects_duplicate_ids() {
        let err = SectionedStore::build(
            RecordKind::Students,
            vec![student("1", "Smith", "John"), student("1", "Zane", "Amy")],
        )
        .unwrap_err();
        assert_eq!(err, SyncError::DuplicateRecord { id: "1".into() });
    }

    #[test]
    fn insert_places_new_section_in_order() {
        let (mut store, _) = SectionedStore::build(
            RecordKind::Students,
            vec![student("1", "Adams", "Lee"), student("2", "Zane", "Amy")],
        )
        .unwrap();

        let placement = store.insert(student("3", "Miller", "Ann")).unwrap();
        assert_eq!(
            placement,
            Placement {
                section_index: 1,
                row: 0,
                created_section: true
            }
        );
        assert!(store.is_consistent());
    }

    #[test]
    fn delete_drops_emptied_section() {
        let (mut store, _) = SectionedStore::build(
            RecordKind::Students,
            vec![student("1", "Adams", "Lee"), student("2", "Zane", "Amy")],
        )
        .unwrap();

        let removal = store.delete("1", &SectionKey::Letter('a')).unwrap();
        assert!(removal.removed_section);
        assert_eq!(store.section_keys(), vec![SectionKey::Letter('z')]);
    }

    #[test]
    fn delete_from_wrong_section_is_reported() {
        let (mut store, _) = SectionedStore::build(
            RecordKind::Students,
            vec![student("1", "Adams", "Lee")],
        )
        .unwrap();

        let err = store.delete("1", &SectionKey::Letter('b')).unwrap_err();
        assert!(matches!(err, SyncError::StaleSection { .. }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_rejects_other_kinds() {
        let mut store = SectionedStore::new(RecordKind::Contacts);
        let err = store.insert(student("1", "Adams", "Lee")).unwrap_err();
        assert!(matches!(err, SyncError::KindMismatch { .. }));
        assert!(store.is_empty());
    }
}
