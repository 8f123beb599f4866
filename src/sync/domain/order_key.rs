//! Section and sort keys derived from a record's fields.
//!
//! Derivation is pure and never fails: a missing or unparseable field is
//! replaced by a sentinel (`SectionKey::Error` / `SortKey::Error`) and the
//! defect is returned alongside the key so callers can report it.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::sync::error::{FieldDefect, MissingFieldError};
use crate::sync::types::{fields, Record, RecordId, RecordKind};

/// Label of the sentinel section.
pub const ERROR_SECTION_LABEL: &str = "section-error";

/// Section label shared by every contact.
pub const CONTACTS_SECTION: &str = "contacts";

/// Identifies the section a record is listed under.
///
/// The derived ordering compares variants first, so the error sentinel
/// always sorts last. Letters and text compare lexicographically, months
/// chronologically (year, then month).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionKey {
    /// Lowercased initial of a student's last name.
    Letter(char),
    Text(String),
    /// Calendar month of an event's start date.
    Month { year: i32, month: u32 },
    Error,
}

impl SectionKey {
    pub fn text(s: impl Into<String>) -> Self {
        SectionKey::Text(s.into())
    }

    pub fn month(year: i32, month: u32) -> Self {
        SectionKey::Month { year, month }
    }

    /// Stable label; `SectionKey::parse` reverses it.
    pub fn label(&self) -> String {
        match self {
            SectionKey::Letter(c) => c.to_string(),
            SectionKey::Text(s) => s.clone(),
            SectionKey::Month { year, month } => NaiveDate::from_ymd_opt(*year, *month, 1)
                .map(|d| d.format("%B %Y").to_string())
                .unwrap_or_else(|| ERROR_SECTION_LABEL.to_string()),
            SectionKey::Error => ERROR_SECTION_LABEL.to_string(),
        }
    }

    /// Header text shown above the section.
    pub fn title(&self) -> String {
        match self {
            SectionKey::Letter(c) => c.to_uppercase().collect(),
            other => other.label(),
        }
    }

    /// Reads a section label back into a key for the given kind.
    ///
    /// Event labels must look like "March 2022"; anything else maps to the
    /// error section so that ordering stays chronological.
    pub fn parse(kind: RecordKind, label: &str) -> Self {
        if label == ERROR_SECTION_LABEL {
            return SectionKey::Error;
        }

        match kind {
            RecordKind::Students => {
                let mut chars = label.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => SectionKey::Letter(lower(c)),
                    _ => SectionKey::Error,
                }
            }
            RecordKind::Events => {
                match NaiveDate::parse_from_str(&format!("1 {}", label.trim()), "%d %B %Y") {
                    Ok(date) => SectionKey::month(date.year(), date.month()),
                    Err(_) => SectionKey::Error,
                }
            }
            RecordKind::DegreeOptions | RecordKind::Contacts => SectionKey::text(label),
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Position of a record inside its section.
///
/// One list only ever holds one real variant plus the sentinel, which sorts
/// after every real value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortKey {
    Order(i64),
    Date(NaiveDateTime),
    Text(String),
    Error,
}

/// Derived (section, sort) pair for one record.
///
/// Ordering is by section, then sort key, then id, which makes it a strict
/// total order over records of one kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    pub section: SectionKey,
    pub sort: SortKey,
    pub id: RecordId,
}

/// Result of deriving an order key.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub key: OrderKey,
    pub defects: Vec<MissingFieldError>,
}

impl Derivation {
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }
}

impl OrderKey {
    /// Derives the order key from the record's current fields.
    pub fn derive(record: &Record) -> Derivation {
        let mut defects = Vec::new();
        let mut missing = |field: &'static str, defect: FieldDefect| {
            defects.push(MissingFieldError {
                kind: record.kind,
                id: record.id.clone(),
                field,
                defect,
            })
        };

        let (section, sort) = match record.kind {
            RecordKind::Students => {
                use fields::student::*;

                let last = record.text_field(LAST_NAME);
                let first = record.text_field(FIRST_NAME);
                if last.is_none() {
                    missing(LAST_NAME, FieldDefect::Absent);
                }
                if first.is_none() {
                    missing(FIRST_NAME, FieldDefect::Absent);
                }

                let section = last
                    .and_then(|l| l.chars().next())
                    .map(|c| SectionKey::Letter(lower(c)))
                    .unwrap_or(SectionKey::Error);
                let sort = match last {
                    Some(last) => SortKey::Text(format!("{}, {}", last, first.unwrap_or(""))),
                    None => SortKey::Error,
                };
                (section, sort)
            }

            RecordKind::DegreeOptions => {
                use fields::option::*;

                let section = match record.text_field(MAJOR_NAME) {
                    Some(major) => SectionKey::text(major),
                    None => {
                        missing(MAJOR_NAME, FieldDefect::Absent);
                        SectionKey::Error
                    }
                };
                let sort = match record.text_field(OPTION_NAME) {
                    Some(name) => SortKey::Text(name.to_string()),
                    None => {
                        missing(OPTION_NAME, FieldDefect::Absent);
                        SortKey::Error
                    }
                };
                (section, sort)
            }

            RecordKind::Events => {
                use fields::event::START_DATE;

                match record.date_field(START_DATE) {
                    Some(start) => (month_of(start), SortKey::Date(start)),
                    None => {
                        let defect = if record.text_field(START_DATE).is_some() {
                            FieldDefect::Unparseable
                        } else {
                            FieldDefect::Absent
                        };
                        missing(START_DATE, defect);
                        (SectionKey::Error, SortKey::Error)
                    }
                }
            }

            RecordKind::Contacts => {
                use fields::contact::ORDER;

                let sort = match record.int_field(ORDER) {
                    Some(order) => SortKey::Order(order),
                    None => {
                        let defect = if record.text_field(ORDER).is_some() {
                            FieldDefect::Unparseable
                        } else {
                            FieldDefect::Absent
                        };
                        missing(ORDER, defect);
                        SortKey::Error
                    }
                };
                (SectionKey::text(CONTACTS_SECTION), sort)
            }
        };

        for defect in &defects {
            log::warn!("[ORDER] {}; using sentinel", defect);
        }

        Derivation {
            key: OrderKey {
                section,
                sort,
                id: record.id.clone(),
            },
            defects,
        }
    }
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn month_of(date: NaiveDateTime) -> SectionKey {
    SectionKey::month(date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: &str, last: &str, first: &str) -> Record {
        Record::with_id(id, RecordKind::Students)
            .field_set(fields::student::LAST_NAME, last)
            .field_set(fields::student::FIRST_NAME, first)
    }

    #[test]
    fn student_keys_use_last_name_initial() {
        let d = OrderKey::derive(&student("1", "Smith", "John"));
        assert!(d.is_clean());
        assert_eq!(d.key.section, SectionKey::Letter('s'));
        assert_eq!(d.key.section.title(), "S");
        assert_eq!(d.key.sort, SortKey::Text("Smith, John".into()));
    }

    #[test]
    fn empty_last_name_goes_to_error_section() {
        let d = OrderKey::derive(&student("1", "  ", "John"));
        assert_eq!(d.key.section, SectionKey::Error);
        assert_eq!(d.key.sort, SortKey::Error);
        assert_eq!(d.defects.len(), 1);
        assert_eq!(d.defects[0].field, fields::student::LAST_NAME);
    }

    #[test]
    fn event_keys_are_chronological() {
        let event = Record::with_id("e", RecordKind::Events)
            .field_set(fields::event::START_DATE, "2022-03-05 10:00");
        let d = OrderKey::derive(&event);
        assert_eq!(d.key.section, SectionKey::month(2022, 3));
        assert_eq!(d.key.section.label(), "March 2022");
    }

    #[test]
    fn unparseable_event_date_is_flagged() {
        let event = Record::with_id("e", RecordKind::Events)
            .field_set(fields::event::START_DATE, "next tuesday");
        let d = OrderKey::derive(&event);
        assert_eq!(d.key.section, SectionKey::Error);
        assert_eq!(d.defects[0].defect, FieldDefect::Unparseable);
    }

    #[test]
    fn contact_order_sorts_numerically() {
        let a = Record::with_id("a", RecordKind::Contacts).field_set(fields::contact::ORDER, "2");
        let b = Record::with_id("b", RecordKind::Contacts).field_set(fields::contact::ORDER, "10");
        let ka = OrderKey::derive(&a).key;
        let kb = OrderKey::derive(&b).key;
        assert_eq!(ka.section, SectionKey::text(CONTACTS_SECTION));
        assert!(ka < kb);
    }

    #[test]
    fn event_labels_sort_chronologically() {
        let mut keys: Vec<_> = ["January 2023", "March 2022", "February 2023"]
            .iter()
            .map(|l| SectionKey::parse(RecordKind::Events, l))
            .collect();
        keys.sort();

        let labels: Vec<_> = keys.iter().map(SectionKey::label).collect();
        assert_eq!(labels, vec!["March 2022", "January 2023", "February 2023"]);
    }

    #[test]
    fn error_section_sorts_last() {
        let mut keys = vec![
            SectionKey::Error,
            SectionKey::Letter('z'),
            SectionKey::Letter('a'),
        ];
        keys.sort();
        assert_eq!(keys.last(), Some(&SectionKey::Error));
        assert_eq!(keys[0], SectionKey::Letter('a'));
    }

    fn degree_option(id: &str, major: Option<&str>, name: &str) -> Record {
        let record = Record::with_id(id, RecordKind::DegreeOptions)
            .field_set(fields::option::OPTION_NAME, name);
        match major {
            Some(major) => record.field_set(fields::option::MAJOR_NAME, major),
            None => record,
        }
    }

    #[test]
    fn option_majors_sort_lexicographically() {
        let math = OrderKey::derive(&degree_option("m", Some("Mathematics"), "Applied")).key;
        let cs = OrderKey::derive(&degree_option("c", Some("Computer Science"), "Systems")).key;

        assert_eq!(cs.section, SectionKey::text("Computer Science"));
        assert_eq!(cs.section.title(), "Computer Science");
        assert!(cs.section < math.section);
        assert!(cs < math, "section decides before option name");
    }

    #[test]
    fn options_sort_by_name_within_major() {
        let se = OrderKey::derive(&degree_option("1", Some("Computer Science"), "Software Engineering"));
        let ai = OrderKey::derive(&degree_option("2", Some("Computer Science"), "Artificial Intelligence"));

        assert!(se.is_clean() && ai.is_clean());
        assert_eq!(se.key.section, ai.key.section);
        assert_eq!(ai.key.sort, SortKey::Text("Artificial Intelligence".into()));
        assert!(ai.key < se.key);
    }

    #[test]
    fn option_without_major_goes_to_error_section() {
        let orphan = OrderKey::derive(&degree_option("o", None, "Undeclared Track"));
        assert_eq!(orphan.key.section, SectionKey::Error);
        assert_eq!(orphan.key.sort, SortKey::Text("Undeclared Track".into()));
        assert_eq!(orphan.defects.len(), 1);
        assert_eq!(orphan.defects[0].field, fields::option::MAJOR_NAME);
        assert_eq!(orphan.defects[0].defect, FieldDefect::Absent);

        let zoology = OrderKey::derive(&degree_option("z", Some("Zoology"), "Marine")).key;
        assert!(zoology.section < orphan.key.section);
    }

    #[test]
    fn ties_break_on_id() {
        let a = student("a", "Smith", "John");
        let b = student("b", "Smith", "John");
        assert!(OrderKey::derive(&a).key < OrderKey::derive(&b).key);
    }
}
